//! # Restaurantes
//!
//! Alta, edición y baja de restaurantes por parte de su gestor, asociación
//! con categorías y búsqueda por categoría o cercanía.

use mongodb::bson::oid::ObjectId;

use crate::api::{AppError, AppResult};
use crate::config::GeocodePolicy;
use crate::db::models::current_timestamp;
use crate::db::{Category, Reservation, ReservationFilter, Restaurant, Store, User};
use crate::geocoding::{Coordinates, Geocoder};

const MAX_NAME: usize = 100;
const MAX_ADDRESS: usize = 200;
const MAX_PHONE: usize = 20;
const MAX_DESCRIPTION: usize = 500;

/// Datos editables de un restaurante
#[derive(Debug, Clone, Default)]
pub struct RestaurantInput {
    pub name: String,
    pub address: String,
    pub phone_number: String,
    pub description: Option<String>,
    pub category_ids: Vec<ObjectId>,
}

/// Restaurante con sus relaciones ya resueltas
#[derive(Debug, Clone)]
pub struct RestaurantDetail {
    pub restaurant: Restaurant,
    pub categories: Vec<Category>,
    pub reservations: Vec<Reservation>,
}

/// Centro y radio de una búsqueda por cercanía
#[derive(Debug, Clone, Copy)]
pub struct NearFilter {
    pub center: Coordinates,
    pub radius_km: f64,
}

fn required(field: &str, value: &str, max: usize) -> AppResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::validation_field(field, "es obligatorio"));
    }
    if value.chars().count() > max {
        return Err(AppError::validation_field(
            field,
            &format!("máximo {} caracteres", max),
        ));
    }
    Ok(value.to_string())
}

impl RestaurantInput {
    /// Devuelve una copia con los campos recortados y validados
    fn validated(&self) -> AppResult<RestaurantInput> {
        let description = match self.description.as_deref().map(str::trim) {
            Some(d) if d.chars().count() > MAX_DESCRIPTION => {
                return Err(AppError::validation_field(
                    "description",
                    &format!("máximo {} caracteres", MAX_DESCRIPTION),
                ))
            }
            Some(d) if !d.is_empty() => Some(d.to_string()),
            _ => None,
        };

        let mut category_ids: Vec<ObjectId> = Vec::with_capacity(self.category_ids.len());
        for id in &self.category_ids {
            if !category_ids.contains(id) {
                category_ids.push(*id);
            }
        }

        Ok(RestaurantInput {
            name: required("name", &self.name, MAX_NAME)?,
            address: required("address", &self.address, MAX_ADDRESS)?,
            phone_number: required("phoneNumber", &self.phone_number, MAX_PHONE)?,
            description,
            category_ids,
        })
    }
}

async fn ensure_categories_exist(store: &dyn Store, ids: &[ObjectId]) -> AppResult<()> {
    let found = store.find_categories(ids).await?;
    match ids.iter().find(|id| !found.iter().any(|c| c.id == **id)) {
        Some(missing) => Err(AppError::not_found_id("Categoría", &missing.to_hex())),
        None => Ok(()),
    }
}

async fn locate(
    geocoder: &Geocoder,
    policy: GeocodePolicy,
    address: &str,
) -> AppResult<Option<Coordinates>> {
    let coordinates = geocoder.geocode(address).await;
    if coordinates.is_none() {
        match policy {
            GeocodePolicy::Required => {
                return Err(AppError::validation_field(
                    "address",
                    "no se pudo geocodificar la dirección",
                ))
            }
            GeocodePolicy::BestEffort => {
                tracing::warn!(address = %address, "Storing restaurant without coordinates");
            }
        }
    }
    Ok(coordinates)
}

/// Busca el restaurante y comprueba que pertenece a `manager`
pub async fn owned_by(
    store: &dyn Store,
    manager: &User,
    restaurant_id: ObjectId,
    operation: &str,
) -> AppResult<Restaurant> {
    let restaurant = get(store, restaurant_id).await?;
    if restaurant.manager_id != manager.id {
        return Err(AppError::unauthorized_operation(
            operation,
            "el restaurante pertenece a otro gestor",
        ));
    }
    Ok(restaurant)
}

pub async fn create(
    store: &dyn Store,
    geocoder: &Geocoder,
    policy: GeocodePolicy,
    manager: &User,
    input: &RestaurantInput,
) -> AppResult<Restaurant> {
    let input = input.validated()?;

    if store.find_restaurant_by_manager(manager.id).await?.is_some() {
        return Err(AppError::Validation(
            "El gestor ya tiene un restaurante".to_string(),
        ));
    }
    ensure_categories_exist(store, &input.category_ids).await?;

    let coordinates = locate(geocoder, policy, &input.address).await?;

    let restaurant = Restaurant {
        id: ObjectId::new(),
        name: input.name,
        address: input.address,
        phone_number: input.phone_number,
        description: input.description,
        latitude: coordinates.map(|c| c.latitude),
        longitude: coordinates.map(|c| c.longitude),
        manager_id: manager.id,
        category_ids: input.category_ids,
        created_at: current_timestamp(),
    };
    store.insert_restaurant(&restaurant).await?;

    tracing::info!(
        restaurant_id = %restaurant.id,
        manager_id = %manager.id,
        geocoded = coordinates.is_some(),
        "Restaurant created"
    );
    Ok(restaurant)
}

/// Sustituye los datos editables; vuelve a geocodificar solo si cambia la dirección
pub async fn update(
    store: &dyn Store,
    geocoder: &Geocoder,
    policy: GeocodePolicy,
    manager: &User,
    restaurant_id: ObjectId,
    input: &RestaurantInput,
) -> AppResult<Restaurant> {
    let input = input.validated()?;
    let mut restaurant = owned_by(store, manager, restaurant_id, "update_restaurant").await?;
    ensure_categories_exist(store, &input.category_ids).await?;

    if input.address != restaurant.address {
        let coordinates = locate(geocoder, policy, &input.address).await?;
        restaurant.latitude = coordinates.map(|c| c.latitude);
        restaurant.longitude = coordinates.map(|c| c.longitude);
    }

    restaurant.name = input.name;
    restaurant.address = input.address;
    restaurant.phone_number = input.phone_number;
    restaurant.description = input.description;
    restaurant.category_ids = input.category_ids;

    if !store.replace_restaurant(&restaurant).await? {
        return Err(AppError::not_found_id("Restaurante", &restaurant_id.to_hex()));
    }
    Ok(restaurant)
}

/// Borra el restaurante junto con todas sus reservas.
///
/// Las reservas se borran primero: si el segundo paso falla, el restaurante
/// sigue existiendo y el borrado se puede repetir.
pub async fn delete(store: &dyn Store, manager: &User, restaurant_id: ObjectId) -> AppResult<()> {
    owned_by(store, manager, restaurant_id, "delete_restaurant").await?;
    let cascaded = store.delete_reservations_of(restaurant_id).await?;
    if !store.delete_restaurant(restaurant_id).await? {
        return Err(AppError::not_found_id("Restaurante", &restaurant_id.to_hex()));
    }
    tracing::info!(
        restaurant_id = %restaurant_id,
        reservations = cascaded,
        "Restaurant deleted with its reservations"
    );
    Ok(())
}

pub async fn add_category(
    store: &dyn Store,
    manager: &User,
    restaurant_id: ObjectId,
    category_id: ObjectId,
) -> AppResult<Restaurant> {
    owned_by(store, manager, restaurant_id, "add_category").await?;
    ensure_categories_exist(store, &[category_id]).await?;
    if !store.add_restaurant_category(restaurant_id, category_id).await? {
        return Err(AppError::not_found_id("Restaurante", &restaurant_id.to_hex()));
    }
    get(store, restaurant_id).await
}

pub async fn remove_category(
    store: &dyn Store,
    manager: &User,
    restaurant_id: ObjectId,
    category_id: ObjectId,
) -> AppResult<Restaurant> {
    owned_by(store, manager, restaurant_id, "remove_category").await?;
    if !store
        .remove_restaurant_category(restaurant_id, category_id)
        .await?
    {
        return Err(AppError::not_found_id("Restaurante", &restaurant_id.to_hex()));
    }
    get(store, restaurant_id).await
}

pub async fn get(store: &dyn Store, restaurant_id: ObjectId) -> AppResult<Restaurant> {
    store
        .find_restaurant(restaurant_id)
        .await?
        .ok_or_else(|| AppError::not_found_id("Restaurante", &restaurant_id.to_hex()))
}

pub async fn detail(store: &dyn Store, restaurant_id: ObjectId) -> AppResult<RestaurantDetail> {
    let restaurant = get(store, restaurant_id).await?;
    let categories = store.find_categories(&restaurant.category_ids).await?;
    let reservations = store
        .list_reservations(&ReservationFilter {
            restaurant_id: Some(restaurant_id),
            ..Default::default()
        })
        .await?;

    Ok(RestaurantDetail {
        restaurant,
        categories,
        reservations,
    })
}

/// Lista restaurantes con filtros opcionales de categoría y cercanía.
/// Los restaurantes sin coordenadas quedan fuera de las búsquedas por cercanía.
pub async fn list(
    store: &dyn Store,
    category_id: Option<ObjectId>,
    near: Option<NearFilter>,
) -> AppResult<Vec<Restaurant>> {
    let restaurants = store.list_restaurants(category_id).await?;
    let Some(near) = near else {
        return Ok(restaurants);
    };

    let mut located: Vec<(f64, Restaurant)> = restaurants
        .into_iter()
        .filter_map(|r| {
            let here = Coordinates {
                latitude: r.latitude?,
                longitude: r.longitude?,
            };
            let distance = near.center.distance_km(&here);
            (distance <= near.radius_km).then_some((distance, r))
        })
        .collect();
    located.sort_by(|a, b| a.0.total_cmp(&b.0));
    Ok(located.into_iter().map(|(_, r)| r).collect())
}
