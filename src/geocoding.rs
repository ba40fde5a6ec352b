//! # Geocodificación de direcciones
//!
//! [`Geocoder`] resuelve una dirección a coordenadas con un número acotado de
//! intentos. Nunca devuelve error: si todos los intentos fallan, o el
//! servicio no encuentra la dirección, el resultado es `None`.
//!
//! El proveedor real es [`NominatimProvider`] (OpenStreetMap). Los tests usan
//! proveedores falsos a través del trait [`GeocodeProvider`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::GeocoderSettings;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    const EARTH_RADIUS_KM: f64 = 6371.0;

    /// Distancia haversine en kilómetros
    pub fn distance_km(&self, other: &Coordinates) -> f64 {
        let (lat1, lat2) = (self.latitude.to_radians(), other.latitude.to_radians());
        let dlat = lat2 - lat1;
        let dlon = (other.longitude - self.longitude).to_radians();

        let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
        2.0 * Self::EARTH_RADIUS_KM * a.sqrt().asin()
    }
}

#[derive(Error, Debug)]
pub enum GeocodeError {
    #[error("Error de red consultando el geocodificador: {0}")]
    Request(#[from] reqwest::Error),

    #[error("El geocodificador respondió con estado {0}")]
    Status(u16),

    #[error("Coordenadas inválidas en la respuesta: {0}")]
    InvalidCoordinates(String),
}

/// Una consulta al servicio externo. `Ok(None)` significa "sin coincidencias".
#[async_trait]
pub trait GeocodeProvider: Send + Sync {
    async fn lookup(&self, address: &str) -> Result<Option<Coordinates>, GeocodeError>;
}

#[derive(Deserialize)]
struct NominatimPlace {
    lat: String,
    lon: String,
}

pub struct NominatimProvider {
    client: reqwest::Client,
    base_url: String,
}

impl NominatimProvider {
    pub fn new(settings: &GeocoderSettings) -> Result<Self, GeocodeError> {
        // Nominatim exige un User-Agent que identifique la aplicación
        let client = reqwest::Client::builder()
            .user_agent(settings.user_agent.clone())
            .timeout(settings.timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl GeocodeProvider for NominatimProvider {
    async fn lookup(&self, address: &str) -> Result<Option<Coordinates>, GeocodeError> {
        let response = self
            .client
            .get(format!("{}/search", self.base_url))
            .query(&[("q", address), ("format", "json"), ("limit", "1")])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(GeocodeError::Status(response.status().as_u16()));
        }

        let places: Vec<NominatimPlace> = response.json().await?;
        let Some(place) = places.into_iter().next() else {
            return Ok(None);
        };

        let latitude = place
            .lat
            .parse()
            .map_err(|_| GeocodeError::InvalidCoordinates(place.lat.clone()))?;
        let longitude = place
            .lon
            .parse()
            .map_err(|_| GeocodeError::InvalidCoordinates(place.lon.clone()))?;

        Ok(Some(Coordinates {
            latitude,
            longitude,
        }))
    }
}

/// Proveedor para cuando la geocodificación está deshabilitada
pub struct DisabledProvider;

#[async_trait]
impl GeocodeProvider for DisabledProvider {
    async fn lookup(&self, _address: &str) -> Result<Option<Coordinates>, GeocodeError> {
        Ok(None)
    }
}

#[derive(Clone)]
pub struct Geocoder {
    provider: Arc<dyn GeocodeProvider>,
    max_attempts: u32,
    retry_delay: Duration,
}

impl Geocoder {
    pub fn new(provider: Arc<dyn GeocodeProvider>, max_attempts: u32, retry_delay: Duration) -> Self {
        Self {
            provider,
            max_attempts: max_attempts.max(1),
            retry_delay,
        }
    }

    pub fn from_settings(settings: &GeocoderSettings) -> Result<Self, GeocodeError> {
        let provider: Arc<dyn GeocodeProvider> = if settings.enabled {
            Arc::new(NominatimProvider::new(settings)?)
        } else {
            Arc::new(DisabledProvider)
        };
        Ok(Self::new(provider, settings.max_attempts, settings.retry_delay))
    }

    pub fn disabled() -> Self {
        Self::new(Arc::new(DisabledProvider), 1, Duration::ZERO)
    }

    pub async fn geocode(&self, address: &str) -> Option<Coordinates> {
        for attempt in 1..=self.max_attempts {
            match self.provider.lookup(address).await {
                Ok(found) => {
                    if found.is_none() {
                        tracing::info!(address = %address, "No geocoding match for address");
                    }
                    return found;
                }
                Err(e) => {
                    tracing::error!(
                        address = %address,
                        attempt,
                        max_attempts = self.max_attempts,
                        error = %e,
                        "Geocoding error"
                    );
                    if attempt < self.max_attempts {
                        tokio::time::sleep(self.retry_delay).await;
                    }
                }
            }
        }

        tracing::warn!(address = %address, "Geocoding gave up after all attempts");
        None
    }
}
