//! # Servicios
//!
//! Reglas de negocio independientes de HTTP. Reciben el [`Store`](crate::db::Store)
//! y el resto de colaboradores como parámetros explícitos.
//!
//! - [`reservation`] - ciclo de vida de las reservas
//! - [`restaurant`] - restaurantes, categorías asociadas y búsqueda
//! - [`category`] - catálogo de categorías
//! - [`manager`] - cuentas de gestor

pub mod category;
pub mod manager;
pub mod reservation;
pub mod restaurant;
