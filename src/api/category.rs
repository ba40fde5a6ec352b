use actix_web::{get, post, web, HttpRequest, HttpResponse, Responder};
use serde::{Deserialize, Serialize};

use super::manager::current_manager;
use super::restaurant::restaurant_views;
use super::{parse_id, AppResult, AppState};
use crate::db::Category;
use crate::service::category;

#[derive(Deserialize)]
struct NewCategory {
    name: String,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct CategoryResponse {
    pub id: String,
    pub name: String,
}

impl From<Category> for CategoryResponse {
    fn from(category: Category) -> Self {
        CategoryResponse {
            id: category.id.to_hex(),
            name: category.name,
        }
    }
}

#[get("/api/categories")]
async fn list_categories(state: web::Data<AppState>) -> AppResult<impl Responder> {
    let categories: Vec<CategoryResponse> = category::list(state.store())
        .await?
        .into_iter()
        .map(Into::into)
        .collect();
    Ok(HttpResponse::Ok().json(categories))
}

/// Crea una categoría. Requiere token de gestor; el nombre es único.
#[post("/api/categories")]
async fn create_category(
    state: web::Data<AppState>,
    data: web::Json<NewCategory>,
    req: HttpRequest,
) -> AppResult<impl Responder> {
    current_manager(&state, &req).await?;
    let created = category::create(state.store(), &data.name).await?;
    Ok(HttpResponse::Created().json(CategoryResponse::from(created)))
}

#[get("/api/categories/{id}/restaurants")]
async fn category_restaurants(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> AppResult<impl Responder> {
    let category_id = parse_id(&path.into_inner(), "categoría")?;
    let restaurants = category::restaurants_of(state.store(), category_id).await?;
    Ok(HttpResponse::Ok().json(restaurant_views(&state, restaurants).await?))
}

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(list_categories);
    cfg.service(create_category);
    cfg.service(category_restaurants);
}
