//! # Módulo API
//!
//! Handlers HTTP de la API REST. Traducen JSON a llamadas a los
//! [servicios](crate::service) y los resultados a las vistas JSON.
//!
//! ## Módulos principales
//!
//! - [`manager`] - Registro y login de gestores, autenticación Bearer
//! - [`restaurant`] - Restaurantes y sus categorías
//! - [`category`] - Catálogo de categorías
//! - [`reservation`] - Reservas (crear, aceptar/rechazar, listar)
//! - [`errors`] - Manejo de errores de la aplicación

pub mod category;
pub mod errors;
pub mod manager;
pub(crate) mod middleware;
pub mod reservation;
pub mod restaurant;

pub use errors::{AppError, AppResult, ErrorResponse};

use std::sync::Arc;

use actix_web::web;
use mongodb::bson::oid::ObjectId;

use crate::config::GeocodePolicy;
use crate::db::Store;
use crate::geocoding::Geocoder;

/// Estado compartido por todos los handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub geocoder: Geocoder,
    pub geocode_policy: GeocodePolicy,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, geocoder: Geocoder, geocode_policy: GeocodePolicy) -> Self {
        Self {
            store,
            geocoder,
            geocode_policy,
        }
    }

    pub fn store(&self) -> &dyn Store {
        self.store.as_ref()
    }
}

/// Convierte un ID hexadecimal de la URL o del cuerpo en `ObjectId`
pub(crate) fn parse_id(raw: &str, resource: &str) -> AppResult<ObjectId> {
    ObjectId::parse_str(raw.trim())
        .map_err(|_| AppError::Validation(format!("ID de {} inválido", resource)))
}

/// Los errores de extracción (JSON mal formado, query inválida) se
/// responden con el mismo formato que el resto de errores de validación
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| {
        AppError::Validation(format!("Cuerpo JSON inválido: {}", err)).into()
    })
}

pub fn query_config() -> web::QueryConfig {
    web::QueryConfig::default().error_handler(|err, _req| {
        AppError::Validation(format!("Parámetros de consulta inválidos: {}", err)).into()
    })
}

/// Configura todas las rutas de la API
///
/// ## Rutas configuradas
///
/// - `/api/managers/*` - Ver [`manager::routes`]
/// - `/api/restaurants/*` - Ver [`restaurant::routes`]
/// - `/api/categories/*` - Ver [`category::routes`]
/// - `/api/reservations/*`, `/api/frontend-users/*` - Ver [`reservation::routes`]
pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.app_data(json_config());
    cfg.app_data(query_config());
    manager::routes(cfg);
    restaurant::routes(cfg);
    category::routes(cfg);
    reservation::routes(cfg);
}
