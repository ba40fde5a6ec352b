//! # API de Restaurantes
//!
//! Este módulo maneja todas las operaciones relacionadas con restaurantes:
//! - Listado público, con filtros por categoría y cercanía
//! - Detalle con categorías y reservas
//! - Alta, edición y baja por parte del gestor
//! - Asociación con categorías

use std::collections::HashMap;

use actix_web::{delete, get, post, put, web, HttpRequest, HttpResponse, Responder};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::manager::current_manager;
use super::reservation::ReservationResponse;
use super::{parse_id, AppError, AppResult, AppState};
use crate::db::{Category, Restaurant};
use crate::geocoding::Coordinates;
use crate::service::restaurant::{self, NearFilter, RestaurantDetail, RestaurantInput};

const DEFAULT_RADIUS_KM: f64 = 10.0;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RestaurantPayload {
    name: String,
    address: String,
    phone_number: String,
    description: Option<String>,
    /// IDs de categoría
    #[serde(default)]
    categories: Vec<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListQuery {
    category: Option<String>,
    lat: Option<f64>,
    lon: Option<f64>,
    radius_km: Option<f64>,
}

/// Vista JSON de un restaurante
#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct RestaurantResponse {
    pub id: String,
    pub name: String,
    pub address: String,
    pub phone_number: String,
    pub description: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// Nombres de las categorías
    pub categories: Vec<String>,
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct RestaurantDetailResponse {
    #[serde(flatten)]
    pub restaurant: RestaurantResponse,
    pub reservations: Vec<ReservationResponse>,
}

impl RestaurantResponse {
    fn new(restaurant: Restaurant, names: &HashMap<ObjectId, String>) -> Self {
        let categories = restaurant
            .category_ids
            .iter()
            .filter_map(|id| names.get(id).cloned())
            .collect();

        RestaurantResponse {
            id: restaurant.id.to_hex(),
            name: restaurant.name,
            address: restaurant.address,
            phone_number: restaurant.phone_number,
            description: restaurant.description,
            latitude: restaurant.latitude,
            longitude: restaurant.longitude,
            categories,
        }
    }
}

impl From<RestaurantDetail> for RestaurantDetailResponse {
    fn from(detail: RestaurantDetail) -> Self {
        let names = category_names(detail.categories);
        RestaurantDetailResponse {
            restaurant: RestaurantResponse::new(detail.restaurant, &names),
            reservations: detail.reservations.into_iter().map(Into::into).collect(),
        }
    }
}

fn category_names(categories: Vec<Category>) -> HashMap<ObjectId, String> {
    categories.into_iter().map(|c| (c.id, c.name)).collect()
}

/// Serializa una lista de restaurantes resolviendo los nombres de categoría
/// con una sola consulta
pub(crate) async fn restaurant_views(
    state: &AppState,
    restaurants: Vec<Restaurant>,
) -> AppResult<Vec<RestaurantResponse>> {
    let names = category_names(state.store().list_categories().await?);
    Ok(restaurants
        .into_iter()
        .map(|r| RestaurantResponse::new(r, &names))
        .collect())
}

async fn single_view(state: &AppState, restaurant: Restaurant) -> AppResult<RestaurantResponse> {
    let names = category_names(state.store().find_categories(&restaurant.category_ids).await?);
    Ok(RestaurantResponse::new(restaurant, &names))
}

impl RestaurantPayload {
    fn into_input(self) -> AppResult<RestaurantInput> {
        let category_ids = self
            .categories
            .iter()
            .map(|raw| parse_id(raw, "categoría"))
            .collect::<AppResult<Vec<_>>>()?;

        Ok(RestaurantInput {
            name: self.name,
            address: self.address,
            phone_number: self.phone_number,
            description: self.description,
            category_ids,
        })
    }
}

impl ListQuery {
    fn near(&self) -> AppResult<Option<NearFilter>> {
        match (self.lat, self.lon) {
            (None, None) => Ok(None),
            (Some(latitude), Some(longitude)) => {
                if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
                    return Err(AppError::Validation("Coordenadas fuera de rango".to_string()));
                }
                let radius_km = self.radius_km.unwrap_or(DEFAULT_RADIUS_KM);
                if !radius_km.is_finite() || radius_km <= 0.0 {
                    return Err(AppError::validation_field("radiusKm", "debe ser mayor que 0"));
                }
                Ok(Some(NearFilter {
                    center: Coordinates {
                        latitude,
                        longitude,
                    },
                    radius_km,
                }))
            }
            _ => Err(AppError::Validation(
                "lat y lon deben indicarse juntos".to_string(),
            )),
        }
    }
}

/// Lista los restaurantes
///
/// # Filtros
/// - `category`: ID de categoría
/// - `lat`, `lon`, `radiusKm`: búsqueda por cercanía (radio por defecto 10 km),
///   ordenada por distancia
#[get("/api/restaurants")]
async fn list_restaurants(
    state: web::Data<AppState>,
    query: web::Query<ListQuery>,
) -> AppResult<impl Responder> {
    let category_id = query
        .category
        .as_deref()
        .map(|raw| parse_id(raw, "categoría"))
        .transpose()?;
    let near = query.near()?;

    let restaurants = restaurant::list(state.store(), category_id, near).await?;
    Ok(HttpResponse::Ok().json(restaurant_views(&state, restaurants).await?))
}

#[get("/api/restaurants/{id}")]
async fn get_restaurant(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> AppResult<impl Responder> {
    let restaurant_id = parse_id(&path.into_inner(), "restaurante")?;
    let detail = restaurant::detail(state.store(), restaurant_id).await?;
    Ok(HttpResponse::Ok().json(RestaurantDetailResponse::from(detail)))
}

/// Crea el restaurante del gestor autenticado
///
/// # Errores
/// - `400 Bad Request`: Datos inválidos, el gestor ya tiene restaurante o la
///   dirección no se pudo geocodificar (si `GEOCODE_REQUIRED=true`)
/// - `401 Unauthorized`: Token inválido
/// - `404 Not Found`: Alguna categoría no existe
#[post("/api/restaurants")]
async fn create_restaurant(
    state: web::Data<AppState>,
    data: web::Json<RestaurantPayload>,
    req: HttpRequest,
) -> AppResult<impl Responder> {
    let manager = current_manager(&state, &req).await?;
    let input = data.into_inner().into_input()?;

    let created = restaurant::create(
        state.store(),
        &state.geocoder,
        state.geocode_policy,
        &manager,
        &input,
    )
    .await?;

    Ok(HttpResponse::Created().json(single_view(&state, created).await?))
}

#[put("/api/restaurants/{id}")]
async fn update_restaurant(
    state: web::Data<AppState>,
    path: web::Path<String>,
    data: web::Json<RestaurantPayload>,
    req: HttpRequest,
) -> AppResult<impl Responder> {
    let manager = current_manager(&state, &req).await?;
    let restaurant_id = parse_id(&path.into_inner(), "restaurante")?;
    let input = data.into_inner().into_input()?;

    let updated = restaurant::update(
        state.store(),
        &state.geocoder,
        state.geocode_policy,
        &manager,
        restaurant_id,
        &input,
    )
    .await?;

    Ok(HttpResponse::Ok().json(single_view(&state, updated).await?))
}

/// Borra el restaurante y, en cascada, todas sus reservas
#[delete("/api/restaurants/{id}")]
async fn delete_restaurant(
    state: web::Data<AppState>,
    path: web::Path<String>,
    req: HttpRequest,
) -> AppResult<impl Responder> {
    let manager = current_manager(&state, &req).await?;
    let restaurant_id = parse_id(&path.into_inner(), "restaurante")?;

    restaurant::delete(state.store(), &manager, restaurant_id).await?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "Restaurante eliminado correctamente",
        "id": restaurant_id.to_hex(),
    })))
}

#[put("/api/restaurants/{id}/categories/{category_id}")]
async fn add_category(
    state: web::Data<AppState>,
    path: web::Path<(String, String)>,
    req: HttpRequest,
) -> AppResult<impl Responder> {
    let manager = current_manager(&state, &req).await?;
    let (restaurant_id, category_id) = path.into_inner();
    let restaurant_id = parse_id(&restaurant_id, "restaurante")?;
    let category_id = parse_id(&category_id, "categoría")?;

    let updated = restaurant::add_category(state.store(), &manager, restaurant_id, category_id).await?;
    Ok(HttpResponse::Ok().json(single_view(&state, updated).await?))
}

#[delete("/api/restaurants/{id}/categories/{category_id}")]
async fn remove_category(
    state: web::Data<AppState>,
    path: web::Path<(String, String)>,
    req: HttpRequest,
) -> AppResult<impl Responder> {
    let manager = current_manager(&state, &req).await?;
    let (restaurant_id, category_id) = path.into_inner();
    let restaurant_id = parse_id(&restaurant_id, "restaurante")?;
    let category_id = parse_id(&category_id, "categoría")?;

    let updated =
        restaurant::remove_category(state.store(), &manager, restaurant_id, category_id).await?;
    Ok(HttpResponse::Ok().json(single_view(&state, updated).await?))
}

/// Configura las rutas relacionadas con restaurantes
///
/// # Rutas disponibles
/// - `GET /api/restaurants` - Listado con filtros
/// - `GET /api/restaurants/{id}` - Detalle con categorías y reservas
/// - `POST /api/restaurants` - Alta (gestor)
/// - `PUT /api/restaurants/{id}` - Edición (gestor)
/// - `DELETE /api/restaurants/{id}` - Baja en cascada (gestor)
/// - `PUT|DELETE /api/restaurants/{id}/categories/{category_id}` - Categorías (gestor)
pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(list_restaurants);
    cfg.service(get_restaurant);
    cfg.service(create_restaurant);
    cfg.service(update_restaurant);
    cfg.service(delete_restaurant);
    cfg.service(add_category);
    cfg.service(remove_category);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(lat: Option<f64>, lon: Option<f64>, radius_km: Option<f64>) -> ListQuery {
        ListQuery {
            category: None,
            lat,
            lon,
            radius_km,
        }
    }

    #[test]
    fn near_filter_needs_both_coordinates() {
        assert!(query(None, None, None).near().unwrap().is_none());
        assert!(query(Some(46.5), None, None).near().is_err());

        let near = query(Some(46.5), Some(11.35), None).near().unwrap().unwrap();
        assert_eq!(near.radius_km, DEFAULT_RADIUS_KM);
    }

    #[test]
    fn near_filter_rejects_bad_values() {
        assert!(query(Some(91.0), Some(0.0), None).near().is_err());
        assert!(query(Some(46.5), Some(11.35), Some(0.0)).near().is_err());
    }

    #[test]
    fn response_uses_category_names_in_order() {
        let (italian, buffet) = (ObjectId::new(), ObjectId::new());
        let names: HashMap<ObjectId, String> = [
            (italian, "Italian".to_string()),
            (buffet, "Buffet".to_string()),
        ]
        .into_iter()
        .collect();

        let restaurant = Restaurant {
            id: ObjectId::new(),
            name: "Luigi's".to_string(),
            address: "Via Madonna del Suffragio, 17, 39011 Lana BZ, Italy".to_string(),
            phone_number: "0123456789".to_string(),
            description: None,
            latitude: None,
            longitude: None,
            manager_id: ObjectId::new(),
            category_ids: vec![italian, buffet],
            created_at: 0,
        };

        let view = RestaurantResponse::new(restaurant, &names);
        assert_eq!(view.categories, vec!["Italian", "Buffet"]);

        let json = serde_json::to_value(&view).unwrap();
        assert!(json.get("phoneNumber").is_some());
    }
}
