use mongodb::bson::oid::ObjectId;

use crate::api::{AppError, AppResult};
use crate::db::{Category, Restaurant, Store};

const MAX_NAME: usize = 64;

pub async fn create(store: &dyn Store, name: &str) -> AppResult<Category> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::validation_field("name", "es obligatorio"));
    }
    if name.chars().count() > MAX_NAME {
        return Err(AppError::validation_field(
            "name",
            &format!("máximo {} caracteres", MAX_NAME),
        ));
    }

    let category = Category {
        id: ObjectId::new(),
        name: name.to_string(),
    };
    store.insert_category(&category).await?;
    tracing::info!(category_id = %category.id, name = %category.name, "Category created");
    Ok(category)
}

pub async fn list(store: &dyn Store) -> AppResult<Vec<Category>> {
    store.list_categories().await
}

/// Restaurantes asociados a la categoría; `NotFound` si la categoría no existe
pub async fn restaurants_of(store: &dyn Store, category_id: ObjectId) -> AppResult<Vec<Restaurant>> {
    if store.find_category(category_id).await?.is_none() {
        return Err(AppError::not_found_id("Categoría", &category_id.to_hex()));
    }
    store.list_restaurants(Some(category_id)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryRepo;
    use tokio_test::assert_err;

    #[tokio::test]
    async fn names_are_unique_and_trimmed() {
        let repo = MemoryRepo::new();
        let created = create(&repo, "  Seafood ").await.unwrap();
        assert_eq!(created.name, "Seafood");

        let err = assert_err!(create(&repo, "Seafood").await);
        assert!(err.is_validation());
        let err = assert_err!(create(&repo, "").await);
        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn categories_are_listed_by_name() {
        let repo = MemoryRepo::new();
        for name in ["Thai", "BBQ", "Italian"] {
            create(&repo, name).await.unwrap();
        }
        let names: Vec<String> = list(&repo).await.unwrap().into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["BBQ", "Italian", "Thai"]);
    }

    #[tokio::test]
    async fn unknown_category_has_no_restaurant_list() {
        let repo = MemoryRepo::new();
        let err = assert_err!(restaurants_of(&repo, ObjectId::new()).await);
        assert!(err.is_not_found());

        let bar = create(&repo, "Bar").await.unwrap();
        assert!(restaurants_of(&repo, bar.id).await.unwrap().is_empty());
    }
}
