//! [`Store`] para tests que envuelve un [`MemoryRepo`] e inyecta fallos y
//! carreras en puntos concretos.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use ::mongodb::bson::oid::ObjectId;
use async_trait::async_trait;

use super::{
    Category, FrontendUser, MemoryRepo, Reservation, ReservationFilter, ReservationStatus,
    Restaurant, Store, User,
};
use crate::api::{AppError, AppResult};

#[derive(Default)]
pub(crate) struct FaultyRepo {
    pub inner: MemoryRepo,
    restaurant_delete_failures: AtomicUsize,
    competing_decision: Mutex<Option<ReservationStatus>>,
}

impl FaultyRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn wrap(inner: MemoryRepo) -> Self {
        Self {
            inner,
            ..Self::default()
        }
    }

    /// Las próximas `times` llamadas a `delete_restaurant` fallan sin borrar nada
    pub fn fail_restaurant_delete(&self, times: usize) {
        self.restaurant_delete_failures.store(times, Ordering::SeqCst);
    }

    /// Otra petición aplica `status` justo antes de la próxima transición
    pub fn decide_first(&self, status: ReservationStatus) {
        *self.competing_decision.lock().unwrap() = Some(status);
    }
}

#[async_trait]
impl Store for FaultyRepo {
    async fn insert_user(&self, user: &User) -> AppResult<()> {
        self.inner.insert_user(user).await
    }

    async fn find_user(&self, id: ObjectId) -> AppResult<Option<User>> {
        self.inner.find_user(id).await
    }

    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<User>> {
        self.inner.find_user_by_email(email).await
    }

    async fn find_user_by_token(&self, token: &str) -> AppResult<Option<User>> {
        self.inner.find_user_by_token(token).await
    }

    async fn find_or_create_frontend_user(&self, user_id: &str) -> AppResult<FrontendUser> {
        self.inner.find_or_create_frontend_user(user_id).await
    }

    async fn find_frontend_user(&self, user_id: &str) -> AppResult<Option<FrontendUser>> {
        self.inner.find_frontend_user(user_id).await
    }

    async fn insert_category(&self, category: &Category) -> AppResult<()> {
        self.inner.insert_category(category).await
    }

    async fn find_category(&self, id: ObjectId) -> AppResult<Option<Category>> {
        self.inner.find_category(id).await
    }

    async fn find_categories(&self, ids: &[ObjectId]) -> AppResult<Vec<Category>> {
        self.inner.find_categories(ids).await
    }

    async fn list_categories(&self) -> AppResult<Vec<Category>> {
        self.inner.list_categories().await
    }

    async fn insert_restaurant(&self, restaurant: &Restaurant) -> AppResult<()> {
        self.inner.insert_restaurant(restaurant).await
    }

    async fn find_restaurant(&self, id: ObjectId) -> AppResult<Option<Restaurant>> {
        self.inner.find_restaurant(id).await
    }

    async fn find_restaurant_by_manager(
        &self,
        manager_id: ObjectId,
    ) -> AppResult<Option<Restaurant>> {
        self.inner.find_restaurant_by_manager(manager_id).await
    }

    async fn list_restaurants(&self, category_id: Option<ObjectId>) -> AppResult<Vec<Restaurant>> {
        self.inner.list_restaurants(category_id).await
    }

    async fn replace_restaurant(&self, restaurant: &Restaurant) -> AppResult<bool> {
        self.inner.replace_restaurant(restaurant).await
    }

    async fn add_restaurant_category(
        &self,
        restaurant_id: ObjectId,
        category_id: ObjectId,
    ) -> AppResult<bool> {
        self.inner
            .add_restaurant_category(restaurant_id, category_id)
            .await
    }

    async fn remove_restaurant_category(
        &self,
        restaurant_id: ObjectId,
        category_id: ObjectId,
    ) -> AppResult<bool> {
        self.inner
            .remove_restaurant_category(restaurant_id, category_id)
            .await
    }

    async fn delete_restaurant(&self, id: ObjectId) -> AppResult<bool> {
        let pending = self.restaurant_delete_failures.load(Ordering::SeqCst);
        if pending > 0 {
            self.restaurant_delete_failures
                .store(pending - 1, Ordering::SeqCst);
            return Err(AppError::Storage("connection reset".to_string()));
        }
        self.inner.delete_restaurant(id).await
    }

    async fn delete_reservations_of(&self, restaurant_id: ObjectId) -> AppResult<u64> {
        self.inner.delete_reservations_of(restaurant_id).await
    }

    async fn insert_reservation(&self, reservation: &Reservation) -> AppResult<()> {
        self.inner.insert_reservation(reservation).await
    }

    async fn find_reservation(&self, id: ObjectId) -> AppResult<Option<Reservation>> {
        self.inner.find_reservation(id).await
    }

    async fn list_reservations(&self, filter: &ReservationFilter) -> AppResult<Vec<Reservation>> {
        self.inner.list_reservations(filter).await
    }

    async fn transition_reservation(
        &self,
        id: ObjectId,
        from: ReservationStatus,
        to: ReservationStatus,
    ) -> AppResult<bool> {
        let competing = self.competing_decision.lock().unwrap().take();
        if let Some(status) = competing {
            self.inner
                .transition_reservation(id, ReservationStatus::Pending, status)
                .await?;
        }
        self.inner.transition_reservation(id, from, to).await
    }
}
