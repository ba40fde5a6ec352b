//! # Restaurant Reservation Server
//!
//! ## Configuración
//!
//! El servidor se configura mediante variables de entorno (archivo `.env`),
//! ver [`restaurant_reservation::config`]. Las más habituales:
//!
//! ```env
//! MONGODB_URI=mongodb://localhost:27017
//! MONGODB_DATABASE=restaurant_reservation
//! BIND_ADDRESS=0.0.0.0:8080
//! RUST_LOG=debug,mongodb=info
//! ```
//!
//! ## Ejecución
//!
//! ```bash
//! # Con MongoDB local
//! docker run -d --name mongo -p 27017:27017 mongo:latest
//! cargo run
//!
//! # Sin MongoDB, todo en memoria
//! STORAGE_BACKEND=memory cargo run
//! ```

use std::sync::Arc;

use actix_web::{middleware::Logger, web, App, HttpServer};

use restaurant_reservation::api::{self, AppState};
use restaurant_reservation::config::{Settings, StorageBackend};
use restaurant_reservation::db::{MemoryRepo, MongoRepo, Store};
use restaurant_reservation::geocoding::Geocoder;

fn startup_error(context: &str, error: impl std::fmt::Display) -> std::io::Error {
    let message = format!("{}: {}", context, error);
    tracing::error!("{}", message);
    std::io::Error::other(message)
}

async fn build_store(settings: &Settings) -> std::io::Result<Arc<dyn Store>> {
    match settings.storage {
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage, data will be lost on shutdown");
            Ok(Arc::new(MemoryRepo::new()))
        }
        StorageBackend::MongoDb => {
            let repo = MongoRepo::init(&settings.mongo)
                .await
                .map_err(|e| startup_error("Error conectando a MongoDB", e))?;

            // Sin índices únicos las invariantes solo se comprueban en la aplicación
            if let Err(e) = repo.create_indexes().await {
                tracing::warn!("Advertencia creando índices: {}", e);
            }

            Ok(Arc::new(repo))
        }
    }
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "restaurant_reservation=debug,mongodb=info,actix_web=info".into()),
        )
        .init();

    let settings =
        Settings::from_env().map_err(|e| startup_error("Configuración inválida", e))?;

    tracing::info!(
        storage = ?settings.storage,
        geocoding = settings.geocoder.enabled,
        geocode_policy = ?settings.geocoder.policy,
        "Iniciando Restaurant Reservation Server"
    );

    let store = build_store(&settings).await?;
    let geocoder = Geocoder::from_settings(&settings.geocoder)
        .map_err(|e| startup_error("Error creando el cliente de geocodificación", e))?;
    let state = web::Data::new(AppState::new(store, geocoder, settings.geocoder.policy));

    tracing::info!("Servidor iniciando en {}", settings.bind_address);

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(Logger::default())
            .configure(api::init_routes)
    })
    .bind(&settings.bind_address)?
    .run()
    .await
}
