//! # Capa de persistencia
//!
//! [`Store`] define las búsquedas por clave foránea que usan los servicios.
//! Hay dos implementaciones:
//!
//! - [`MongoRepo`] - MongoDB, para producción
//! - [`MemoryRepo`] - en memoria, para tests y desarrollo local

pub mod memory;
pub mod models;
pub mod mongodb;
#[cfg(test)]
pub(crate) mod testing;

use ::mongodb::bson::oid::ObjectId;
use async_trait::async_trait;

use crate::api::AppResult;

pub use self::memory::MemoryRepo;
pub use self::models::{
    Category, FrontendUser, Reservation, ReservationFilter, ReservationStatus, Restaurant, User,
};
pub use self::mongodb::MongoRepo;

#[async_trait]
pub trait Store: Send + Sync {
    /// Falla con error de validación si el email ya está registrado
    async fn insert_user(&self, user: &User) -> AppResult<()>;
    async fn find_user(&self, id: ObjectId) -> AppResult<Option<User>>;
    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<User>>;
    async fn find_user_by_token(&self, token: &str) -> AppResult<Option<User>>;

    /// Devuelve el usuario con ese identificador externo, creándolo si no existe
    async fn find_or_create_frontend_user(&self, user_id: &str) -> AppResult<FrontendUser>;
    async fn find_frontend_user(&self, user_id: &str) -> AppResult<Option<FrontendUser>>;

    /// Falla con error de validación si el nombre ya existe
    async fn insert_category(&self, category: &Category) -> AppResult<()>;
    async fn find_category(&self, id: ObjectId) -> AppResult<Option<Category>>;
    async fn find_categories(&self, ids: &[ObjectId]) -> AppResult<Vec<Category>>;
    async fn list_categories(&self) -> AppResult<Vec<Category>>;

    async fn insert_restaurant(&self, restaurant: &Restaurant) -> AppResult<()>;
    async fn find_restaurant(&self, id: ObjectId) -> AppResult<Option<Restaurant>>;
    async fn find_restaurant_by_manager(&self, manager_id: ObjectId)
        -> AppResult<Option<Restaurant>>;
    /// Todos los restaurantes, o solo los asociados a `category_id`
    async fn list_restaurants(&self, category_id: Option<ObjectId>) -> AppResult<Vec<Restaurant>>;
    /// Sustituye el documento completo; `false` si no existía
    async fn replace_restaurant(&self, restaurant: &Restaurant) -> AppResult<bool>;
    async fn add_restaurant_category(
        &self,
        restaurant_id: ObjectId,
        category_id: ObjectId,
    ) -> AppResult<bool>;
    async fn remove_restaurant_category(
        &self,
        restaurant_id: ObjectId,
        category_id: ObjectId,
    ) -> AppResult<bool>;
    /// Borra solo el documento del restaurante; `false` si no existía
    async fn delete_restaurant(&self, id: ObjectId) -> AppResult<bool>;
    /// Borra las reservas del restaurante y devuelve cuántas había
    async fn delete_reservations_of(&self, restaurant_id: ObjectId) -> AppResult<u64>;

    async fn insert_reservation(&self, reservation: &Reservation) -> AppResult<()>;
    async fn find_reservation(&self, id: ObjectId) -> AppResult<Option<Reservation>>;
    /// Ordenadas por fecha de reserva ascendente
    async fn list_reservations(&self, filter: &ReservationFilter) -> AppResult<Vec<Reservation>>;
    /// Cambia el estado solo si sigue siendo `from`; `false` si no se aplicó
    async fn transition_reservation(
        &self,
        id: ObjectId,
        from: ReservationStatus,
        to: ReservationStatus,
    ) -> AppResult<bool>;
}
