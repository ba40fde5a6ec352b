use async_trait::async_trait;
use mongodb::bson::{doc, oid::ObjectId, Document};
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::{IndexOptions, ReturnDocument};
use mongodb::{Client, Collection, Cursor, Database, IndexModel};
use serde::de::DeserializeOwned;

use super::models::{
    current_timestamp, datetime_format, Category, FrontendUser, Reservation, ReservationFilter,
    ReservationStatus, Restaurant, User,
};
use super::Store;
use crate::api::middleware::ErrorLogExt;
use crate::api::{AppError, AppResult};
use crate::config::MongoSettings;

const DUPLICATE_KEY: i32 = 11000;

#[derive(Debug, Clone)]
pub struct MongoRepo {
    pub client: Client,
    pub database: Database,
}

/// `true` si el error es una violación de índice único
fn is_duplicate_key(error: &mongodb::error::Error) -> bool {
    matches!(
        *error.kind,
        ErrorKind::Write(WriteFailure::WriteError(ref e)) if e.code == DUPLICATE_KEY
    )
}

async fn collect<T>(mut cursor: Cursor<T>, operation: &str) -> AppResult<Vec<T>>
where
    T: DeserializeOwned + Send + Sync,
{
    let mut results = Vec::new();
    while cursor
        .advance()
        .await
        .map_err(|e| AppError::database(operation, e))?
    {
        let item = cursor
            .deserialize_current()
            .map_err(|e| AppError::database(operation, e))?;
        results.push(item);
    }
    Ok(results)
}

impl MongoRepo {
    pub async fn init(settings: &MongoSettings) -> AppResult<MongoRepo> {
        let client = Client::with_uri_str(&settings.uri)
            .await
            .map_err(|e| AppError::database("connect", e))?;

        let database = client.database(&settings.database);

        database
            .run_command(doc! {"ping": 1})
            .await
            .map_err(|e| AppError::database("ping", e))?;

        tracing::info!(database = %settings.database, "MongoDB connection established");

        Ok(MongoRepo { client, database })
    }

    pub fn users(&self) -> Collection<User> {
        self.database.collection("users")
    }

    pub fn frontend_users(&self) -> Collection<FrontendUser> {
        self.database.collection("frontend_users")
    }

    pub fn categories(&self) -> Collection<Category> {
        self.database.collection("categories")
    }

    pub fn restaurants(&self) -> Collection<Restaurant> {
        self.database.collection("restaurants")
    }

    pub fn reservations(&self) -> Collection<Reservation> {
        self.database.collection("reservations")
    }

    /// Índices únicos que sostienen las invariantes del modelo, más los de
    /// las búsquedas por clave foránea
    pub async fn create_indexes(&self) -> AppResult<()> {
        let unique = || IndexOptions::builder().unique(true).build();

        self.users()
            .create_indexes(vec![
                IndexModel::builder()
                    .keys(doc! { "email": 1 })
                    .options(unique())
                    .build(),
                IndexModel::builder()
                    .keys(doc! { "access_token": 1 })
                    .options(unique())
                    .build(),
            ])
            .await
            .map_err(|e| AppError::database("create_indexes_users", e))?;

        self.frontend_users()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "user_id": 1 })
                    .options(unique())
                    .build(),
            )
            .await
            .map_err(|e| AppError::database("create_indexes_frontend_users", e))?;

        self.categories()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "name": 1 })
                    .options(unique())
                    .build(),
            )
            .await
            .map_err(|e| AppError::database("create_indexes_categories", e))?;

        self.restaurants()
            .create_indexes(vec![
                IndexModel::builder()
                    .keys(doc! { "manager_id": 1 })
                    .options(unique())
                    .build(),
                IndexModel::builder()
                    .keys(doc! { "category_ids": 1 })
                    .build(),
            ])
            .await
            .map_err(|e| AppError::database("create_indexes_restaurants", e))?;

        self.reservations()
            .create_indexes(vec![
                IndexModel::builder()
                    .keys(doc! { "restaurant_id": 1, "reservation_datetime": 1 })
                    .build(),
                IndexModel::builder()
                    .keys(doc! { "frontend_user_id": 1 })
                    .build(),
                IndexModel::builder().keys(doc! { "status": 1 }).build(),
            ])
            .await
            .map_err(|e| AppError::database("create_indexes_reservations", e))?;

        tracing::info!("MongoDB indexes created");
        Ok(())
    }
}

fn reservation_filter_doc(filter: &ReservationFilter) -> Document {
    let mut query = Document::new();
    if let Some(id) = filter.restaurant_id {
        query.insert("restaurant_id", id);
    }
    if let Some(id) = filter.frontend_user_id {
        query.insert("frontend_user_id", id);
    }
    if let Some(status) = filter.status {
        query.insert("status", status.as_str());
    }
    if let Some(from) = filter.from {
        query.insert(
            "reservation_datetime",
            doc! { "$gte": datetime_format::format(&from) },
        );
    }
    query
}

#[async_trait]
impl Store for MongoRepo {
    async fn insert_user(&self, user: &User) -> AppResult<()> {
        match self.users().insert_one(user).await {
            Ok(_) => Ok(()),
            Err(e) if is_duplicate_key(&e) => {
                Err(AppError::validation_field("email", "ya está registrado"))
            }
            Err(e) => Err(AppError::database("insert_user", e)),
        }
    }

    async fn find_user(&self, id: ObjectId) -> AppResult<Option<User>> {
        self.users()
            .find_one(doc! { "_id": id })
            .await
            .map_err(|e| AppError::database("find_user", e))
    }

    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<User>> {
        self.users()
            .find_one(doc! { "email": email })
            .await
            .map_err(|e| AppError::database("find_user_by_email", e))
    }

    async fn find_user_by_token(&self, token: &str) -> AppResult<Option<User>> {
        self.users()
            .find_one(doc! { "access_token": token })
            .await
            .log_error_context("validating access token")
            .map_err(|e| AppError::database("validate_token", e))
    }

    async fn find_or_create_frontend_user(&self, user_id: &str) -> AppResult<FrontendUser> {
        let user = self
            .frontend_users()
            .find_one_and_update(
                doc! { "user_id": user_id },
                doc! {
                    "$setOnInsert": {
                        "_id": ObjectId::new(),
                        "user_id": user_id,
                        "email": null,
                        "name": null,
                        "created_at": current_timestamp(),
                    }
                },
            )
            .upsert(true)
            .return_document(ReturnDocument::After)
            .await
            .log_error_context("upserting frontend user")
            .map_err(|e| AppError::database("find_or_create_frontend_user", e))?;

        user.ok_or_else(|| {
            AppError::internal_trace("upsert de usuario frontend sin documento", None)
        })
    }

    async fn find_frontend_user(&self, user_id: &str) -> AppResult<Option<FrontendUser>> {
        self.frontend_users()
            .find_one(doc! { "user_id": user_id })
            .await
            .map_err(|e| AppError::database("find_frontend_user", e))
    }

    async fn insert_category(&self, category: &Category) -> AppResult<()> {
        match self.categories().insert_one(category).await {
            Ok(_) => Ok(()),
            Err(e) if is_duplicate_key(&e) => {
                Err(AppError::validation_field("name", "la categoría ya existe"))
            }
            Err(e) => Err(AppError::database("insert_category", e)),
        }
    }

    async fn find_category(&self, id: ObjectId) -> AppResult<Option<Category>> {
        self.categories()
            .find_one(doc! { "_id": id })
            .await
            .map_err(|e| AppError::database("find_category", e))
    }

    async fn find_categories(&self, ids: &[ObjectId]) -> AppResult<Vec<Category>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let cursor = self
            .categories()
            .find(doc! { "_id": { "$in": ids.to_vec() } })
            .sort(doc! { "name": 1 })
            .await
            .map_err(|e| AppError::database("find_categories", e))?;
        collect(cursor, "find_categories").await
    }

    async fn list_categories(&self) -> AppResult<Vec<Category>> {
        let cursor = self
            .categories()
            .find(doc! {})
            .sort(doc! { "name": 1 })
            .await
            .map_err(|e| AppError::database("list_categories", e))?;
        collect(cursor, "list_categories").await
    }

    async fn insert_restaurant(&self, restaurant: &Restaurant) -> AppResult<()> {
        match self.restaurants().insert_one(restaurant).await {
            Ok(_) => Ok(()),
            Err(e) if is_duplicate_key(&e) => Err(AppError::Validation(
                "El gestor ya tiene un restaurante".to_string(),
            )),
            Err(e) => Err(AppError::database("insert_restaurant", e)),
        }
    }

    async fn find_restaurant(&self, id: ObjectId) -> AppResult<Option<Restaurant>> {
        self.restaurants()
            .find_one(doc! { "_id": id })
            .await
            .map_err(|e| AppError::database("find_restaurant", e))
    }

    async fn find_restaurant_by_manager(
        &self,
        manager_id: ObjectId,
    ) -> AppResult<Option<Restaurant>> {
        self.restaurants()
            .find_one(doc! { "manager_id": manager_id })
            .await
            .map_err(|e| AppError::database("find_restaurant_by_manager", e))
    }

    async fn list_restaurants(&self, category_id: Option<ObjectId>) -> AppResult<Vec<Restaurant>> {
        let filter = match category_id {
            Some(id) => doc! { "category_ids": id },
            None => doc! {},
        };
        let cursor = self
            .restaurants()
            .find(filter)
            .sort(doc! { "name": 1 })
            .await
            .log_error_context("listing restaurants")
            .map_err(|e| AppError::database("list_restaurants", e))?;
        collect(cursor, "list_restaurants").await
    }

    async fn replace_restaurant(&self, restaurant: &Restaurant) -> AppResult<bool> {
        let result = self
            .restaurants()
            .replace_one(doc! { "_id": restaurant.id }, restaurant)
            .await
            .map_err(|e| AppError::database("replace_restaurant", e))?;
        Ok(result.matched_count > 0)
    }

    async fn add_restaurant_category(
        &self,
        restaurant_id: ObjectId,
        category_id: ObjectId,
    ) -> AppResult<bool> {
        let result = self
            .restaurants()
            .update_one(
                doc! { "_id": restaurant_id },
                doc! { "$addToSet": { "category_ids": category_id } },
            )
            .await
            .map_err(|e| AppError::database("add_restaurant_category", e))?;
        Ok(result.matched_count > 0)
    }

    async fn remove_restaurant_category(
        &self,
        restaurant_id: ObjectId,
        category_id: ObjectId,
    ) -> AppResult<bool> {
        let result = self
            .restaurants()
            .update_one(
                doc! { "_id": restaurant_id },
                doc! { "$pull": { "category_ids": category_id } },
            )
            .await
            .map_err(|e| AppError::database("remove_restaurant_category", e))?;
        Ok(result.matched_count > 0)
    }

    async fn delete_restaurant(&self, id: ObjectId) -> AppResult<bool> {
        let deleted = self
            .restaurants()
            .delete_one(doc! { "_id": id })
            .await
            .log_error_context("deleting restaurant")
            .map_err(|e| AppError::database("delete_restaurant", e))?;
        Ok(deleted.deleted_count > 0)
    }

    async fn delete_reservations_of(&self, restaurant_id: ObjectId) -> AppResult<u64> {
        let deleted = self
            .reservations()
            .delete_many(doc! { "restaurant_id": restaurant_id })
            .await
            .log_error_context("deleting restaurant reservations")
            .map_err(|e| AppError::database("delete_reservations_of", e))?;
        Ok(deleted.deleted_count)
    }

    async fn insert_reservation(&self, reservation: &Reservation) -> AppResult<()> {
        self.reservations()
            .insert_one(reservation)
            .await
            .log_error_context("inserting reservation")
            .map_err(|e| AppError::database("insert_reservation", e))?;
        Ok(())
    }

    async fn find_reservation(&self, id: ObjectId) -> AppResult<Option<Reservation>> {
        self.reservations()
            .find_one(doc! { "_id": id })
            .await
            .map_err(|e| AppError::database("find_reservation", e))
    }

    async fn list_reservations(&self, filter: &ReservationFilter) -> AppResult<Vec<Reservation>> {
        let cursor = self
            .reservations()
            .find(reservation_filter_doc(filter))
            .sort(doc! { "reservation_datetime": 1 })
            .await
            .map_err(|e| AppError::database("list_reservations", e))?;
        collect(cursor, "list_reservations").await
    }

    async fn transition_reservation(
        &self,
        id: ObjectId,
        from: ReservationStatus,
        to: ReservationStatus,
    ) -> AppResult<bool> {
        let result = self
            .reservations()
            .update_one(
                doc! { "_id": id, "status": from.as_str() },
                doc! {
                    "$set": {
                        "status": to.as_str(),
                        "updated_at": current_timestamp(),
                    }
                },
            )
            .await
            .log_error_context("updating reservation status")
            .map_err(|e| AppError::database("transition_reservation", e))?;
        Ok(result.modified_count == 1)
    }
}
