//! Implementación en memoria de [`Store`].
//!
//! Sin persistencia: todo se pierde al parar el proceso. Se usa en los tests
//! y con `STORAGE_BACKEND=memory` para desarrollo local sin MongoDB.

use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use mongodb::bson::oid::ObjectId;

use super::models::{
    current_timestamp, Category, FrontendUser, Reservation, ReservationFilter, ReservationStatus,
    Restaurant, User,
};
use super::Store;
use crate::api::{AppError, AppResult};

#[derive(Debug, Default)]
struct Tables {
    users: BTreeMap<ObjectId, User>,
    frontend_users: BTreeMap<ObjectId, FrontendUser>,
    categories: BTreeMap<ObjectId, Category>,
    restaurants: BTreeMap<ObjectId, Restaurant>,
    reservations: BTreeMap<ObjectId, Reservation>,
}

#[derive(Debug, Default)]
pub struct MemoryRepo {
    tables: RwLock<Tables>,
}

fn poison_err<T>(_: PoisonError<T>) -> AppError {
    AppError::Storage("lock poisoned".to_string())
}

impl MemoryRepo {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryRepo {
    async fn insert_user(&self, user: &User) -> AppResult<()> {
        let mut tables = self.tables.write().map_err(poison_err)?;
        if tables.users.values().any(|u| u.email == user.email) {
            return Err(AppError::validation_field("email", "ya está registrado"));
        }
        tables.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn find_user(&self, id: ObjectId) -> AppResult<Option<User>> {
        let tables = self.tables.read().map_err(poison_err)?;
        Ok(tables.users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let tables = self.tables.read().map_err(poison_err)?;
        Ok(tables.users.values().find(|u| u.email == email).cloned())
    }

    async fn find_user_by_token(&self, token: &str) -> AppResult<Option<User>> {
        let tables = self.tables.read().map_err(poison_err)?;
        Ok(tables
            .users
            .values()
            .find(|u| u.access_token == token)
            .cloned())
    }

    async fn find_or_create_frontend_user(&self, user_id: &str) -> AppResult<FrontendUser> {
        let mut tables = self.tables.write().map_err(poison_err)?;
        if let Some(existing) = tables.frontend_users.values().find(|u| u.user_id == user_id) {
            return Ok(existing.clone());
        }

        let created = FrontendUser {
            id: ObjectId::new(),
            user_id: user_id.to_string(),
            email: None,
            name: None,
            created_at: current_timestamp(),
        };
        tables.frontend_users.insert(created.id, created.clone());
        Ok(created)
    }

    async fn find_frontend_user(&self, user_id: &str) -> AppResult<Option<FrontendUser>> {
        let tables = self.tables.read().map_err(poison_err)?;
        Ok(tables
            .frontend_users
            .values()
            .find(|u| u.user_id == user_id)
            .cloned())
    }

    async fn insert_category(&self, category: &Category) -> AppResult<()> {
        let mut tables = self.tables.write().map_err(poison_err)?;
        if tables.categories.values().any(|c| c.name == category.name) {
            return Err(AppError::validation_field("name", "la categoría ya existe"));
        }
        tables.categories.insert(category.id, category.clone());
        Ok(())
    }

    async fn find_category(&self, id: ObjectId) -> AppResult<Option<Category>> {
        let tables = self.tables.read().map_err(poison_err)?;
        Ok(tables.categories.get(&id).cloned())
    }

    async fn find_categories(&self, ids: &[ObjectId]) -> AppResult<Vec<Category>> {
        let tables = self.tables.read().map_err(poison_err)?;
        Ok(ids
            .iter()
            .filter_map(|id| tables.categories.get(id).cloned())
            .collect())
    }

    async fn list_categories(&self) -> AppResult<Vec<Category>> {
        let tables = self.tables.read().map_err(poison_err)?;
        let mut categories: Vec<Category> = tables.categories.values().cloned().collect();
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
    }

    async fn insert_restaurant(&self, restaurant: &Restaurant) -> AppResult<()> {
        let mut tables = self.tables.write().map_err(poison_err)?;
        if tables
            .restaurants
            .values()
            .any(|r| r.manager_id == restaurant.manager_id)
        {
            return Err(AppError::Validation(
                "El gestor ya tiene un restaurante".to_string(),
            ));
        }
        tables.restaurants.insert(restaurant.id, restaurant.clone());
        Ok(())
    }

    async fn find_restaurant(&self, id: ObjectId) -> AppResult<Option<Restaurant>> {
        let tables = self.tables.read().map_err(poison_err)?;
        Ok(tables.restaurants.get(&id).cloned())
    }

    async fn find_restaurant_by_manager(
        &self,
        manager_id: ObjectId,
    ) -> AppResult<Option<Restaurant>> {
        let tables = self.tables.read().map_err(poison_err)?;
        Ok(tables
            .restaurants
            .values()
            .find(|r| r.manager_id == manager_id)
            .cloned())
    }

    async fn list_restaurants(&self, category_id: Option<ObjectId>) -> AppResult<Vec<Restaurant>> {
        let tables = self.tables.read().map_err(poison_err)?;
        Ok(tables
            .restaurants
            .values()
            .filter(|r| category_id.map_or(true, |id| r.category_ids.contains(&id)))
            .cloned()
            .collect())
    }

    async fn replace_restaurant(&self, restaurant: &Restaurant) -> AppResult<bool> {
        let mut tables = self.tables.write().map_err(poison_err)?;
        match tables.restaurants.get_mut(&restaurant.id) {
            Some(slot) => {
                *slot = restaurant.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn add_restaurant_category(
        &self,
        restaurant_id: ObjectId,
        category_id: ObjectId,
    ) -> AppResult<bool> {
        let mut tables = self.tables.write().map_err(poison_err)?;
        match tables.restaurants.get_mut(&restaurant_id) {
            Some(restaurant) => {
                if !restaurant.category_ids.contains(&category_id) {
                    restaurant.category_ids.push(category_id);
                }
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn remove_restaurant_category(
        &self,
        restaurant_id: ObjectId,
        category_id: ObjectId,
    ) -> AppResult<bool> {
        let mut tables = self.tables.write().map_err(poison_err)?;
        match tables.restaurants.get_mut(&restaurant_id) {
            Some(restaurant) => {
                restaurant.category_ids.retain(|id| *id != category_id);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_restaurant(&self, id: ObjectId) -> AppResult<bool> {
        let mut tables = self.tables.write().map_err(poison_err)?;
        Ok(tables.restaurants.remove(&id).is_some())
    }

    async fn delete_reservations_of(&self, restaurant_id: ObjectId) -> AppResult<u64> {
        let mut tables = self.tables.write().map_err(poison_err)?;
        let before = tables.reservations.len();
        tables.reservations.retain(|_, r| r.restaurant_id != restaurant_id);
        Ok((before - tables.reservations.len()) as u64)
    }

    async fn insert_reservation(&self, reservation: &Reservation) -> AppResult<()> {
        let mut tables = self.tables.write().map_err(poison_err)?;
        tables.reservations.insert(reservation.id, reservation.clone());
        Ok(())
    }

    async fn find_reservation(&self, id: ObjectId) -> AppResult<Option<Reservation>> {
        let tables = self.tables.read().map_err(poison_err)?;
        Ok(tables.reservations.get(&id).cloned())
    }

    async fn list_reservations(&self, filter: &ReservationFilter) -> AppResult<Vec<Reservation>> {
        let tables = self.tables.read().map_err(poison_err)?;
        let mut reservations: Vec<Reservation> = tables
            .reservations
            .values()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();
        reservations.sort_by_key(|r| r.reservation_datetime);
        Ok(reservations)
    }

    async fn transition_reservation(
        &self,
        id: ObjectId,
        from: ReservationStatus,
        to: ReservationStatus,
    ) -> AppResult<bool> {
        let mut tables = self.tables.write().map_err(poison_err)?;
        match tables.reservations.get_mut(&id) {
            Some(reservation) if reservation.status == from => {
                reservation.status = to;
                reservation.updated_at = current_timestamp();
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tokio_test::{assert_err, assert_ok};

    fn user(email: &str) -> User {
        User {
            id: ObjectId::new(),
            name: "Gestor".to_string(),
            email: email.to_string(),
            password_hash: "hash".to_string(),
            access_token: ObjectId::new().to_hex(),
            created_at: 0,
        }
    }

    fn reservation(restaurant_id: ObjectId, hour: u32) -> Reservation {
        Reservation {
            id: ObjectId::new(),
            restaurant_id,
            name: "Cliente".to_string(),
            person_count: 2,
            reservation_datetime: NaiveDate::from_ymd_opt(2030, 6, 1)
                .and_then(|d| d.and_hms_opt(hour, 0, 0))
                .unwrap(),
            status: ReservationStatus::Pending,
            frontend_user_id: None,
            created_at: 0,
            updated_at: 0,
        }
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected() {
        let repo = MemoryRepo::new();
        assert_ok!(repo.insert_user(&user("a@b.com")).await);
        let err = assert_err!(repo.insert_user(&user("a@b.com")).await);
        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn transition_applies_only_from_expected_state() {
        let repo = MemoryRepo::new();
        let r = reservation(ObjectId::new(), 20);
        repo.insert_reservation(&r).await.unwrap();

        let first = repo
            .transition_reservation(r.id, ReservationStatus::Pending, ReservationStatus::Accepted)
            .await
            .unwrap();
        let second = repo
            .transition_reservation(r.id, ReservationStatus::Pending, ReservationStatus::Declined)
            .await
            .unwrap();

        assert!(first);
        assert!(!second);
        let stored = repo.find_reservation(r.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ReservationStatus::Accepted);
    }

    #[tokio::test]
    async fn reservations_are_listed_by_datetime() {
        let repo = MemoryRepo::new();
        let restaurant = ObjectId::new();
        for hour in [22, 13, 19] {
            repo.insert_reservation(&reservation(restaurant, hour))
                .await
                .unwrap();
        }

        let listed = repo
            .list_reservations(&ReservationFilter::default())
            .await
            .unwrap();
        let hours: Vec<String> = listed
            .iter()
            .map(|r| r.reservation_datetime.format("%H").to_string())
            .collect();
        assert_eq!(hours, vec!["13", "19", "22"]);
    }

    #[tokio::test]
    async fn frontend_user_is_created_once() {
        let repo = MemoryRepo::new();
        let first = repo.find_or_create_frontend_user("user_001").await.unwrap();
        let again = repo.find_or_create_frontend_user("user_001").await.unwrap();
        assert_eq!(first.id, again.id);
    }
}
