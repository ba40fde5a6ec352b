//! # Restaurant Reservation
//!
//! Backend de reservas de restaurantes: los gestores registran su
//! restaurante y aceptan o rechazan las peticiones de reserva que envían los
//! usuarios del frontend.
//!
//! ## Arquitectura
//!
//! ```text
//! Frontend (cliente externo)
//!     ↓ HTTP/JSON
//! api      (Actix Web: handlers y vistas JSON)
//!     ↓
//! service  (reglas de negocio, ciclo de vida de reservas)
//!     ↓                    ↘
//! db::Store (MongoDB | memoria)   geocoding (Nominatim)
//! ```

pub mod api;
pub mod config;
pub mod db;
pub mod geocoding;
pub mod service;

pub use api::{AppError, AppResult, AppState};
