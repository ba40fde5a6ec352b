//! # Configuración
//!
//! Toda la configuración llega por variables de entorno (opcionalmente desde
//! un archivo `.env`, cargado en `main` con `dotenvy`):
//!
//! ```env
//! BIND_ADDRESS=0.0.0.0:8080
//! STORAGE_BACKEND=mongodb            # o "memory"
//! MONGODB_URI=mongodb://localhost:27017
//! MONGODB_DATABASE=restaurant_reservation
//!
//! GEOCODING_ENABLED=true
//! GEOCODER_URL=https://nominatim.openstreetmap.org
//! GEOCODER_USER_AGENT=restaurant_reservation_app
//! GEOCODER_MAX_ATTEMPTS=3
//! GEOCODER_RETRY_DELAY_MS=1000
//! GEOCODER_TIMEOUT_SECS=10
//! GEOCODE_REQUIRED=false
//!
//! RUST_LOG=debug,mongodb=info
//! ```

use std::env;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("Valor inválido para {name}: '{value}'")]
    InvalidValue { name: String, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    MongoDb,
    Memory,
}

impl FromStr for StorageBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mongodb" | "mongo" => Ok(Self::MongoDb),
            "memory" => Ok(Self::Memory),
            _ => Err(invalid("STORAGE_BACKEND", s)),
        }
    }
}

/// Qué hacer cuando la dirección de un restaurante no se puede geocodificar
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeocodePolicy {
    /// Se guarda el restaurante sin coordenadas
    BestEffort,
    /// Se rechaza la creación/actualización
    Required,
}

#[derive(Debug, Clone)]
pub struct MongoSettings {
    pub uri: String,
    pub database: String,
}

#[derive(Debug, Clone)]
pub struct GeocoderSettings {
    pub enabled: bool,
    pub base_url: String,
    pub user_agent: String,
    pub max_attempts: u32,
    pub retry_delay: Duration,
    pub timeout: Duration,
    pub policy: GeocodePolicy,
}

impl Default for GeocoderSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "https://nominatim.openstreetmap.org".to_string(),
            user_agent: "restaurant_reservation_app".to_string(),
            max_attempts: 3,
            retry_delay: Duration::from_secs(1),
            timeout: Duration::from_secs(10),
            policy: GeocodePolicy::BestEffort,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub bind_address: String,
    pub storage: StorageBackend,
    pub mongo: MongoSettings,
    pub geocoder: GeocoderSettings,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Igual que [`from_env`](Self::from_env) pero con una fuente de variables arbitraria
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = GeocoderSettings::default();
        let string = |name: &str, default: &str| lookup(name).unwrap_or_else(|| default.to_string());

        let storage = match lookup("STORAGE_BACKEND") {
            Some(raw) => raw.parse()?,
            None => StorageBackend::MongoDb,
        };

        let required: bool = parse_or(&lookup, "GEOCODE_REQUIRED", false)?;
        let max_attempts: u32 = parse_or(&lookup, "GEOCODER_MAX_ATTEMPTS", defaults.max_attempts)?;
        if max_attempts == 0 {
            return Err(invalid("GEOCODER_MAX_ATTEMPTS", "0"));
        }

        Ok(Settings {
            bind_address: string("BIND_ADDRESS", "0.0.0.0:8080"),
            storage,
            mongo: MongoSettings {
                uri: string("MONGODB_URI", "mongodb://localhost:27017"),
                database: string("MONGODB_DATABASE", "restaurant_reservation"),
            },
            geocoder: GeocoderSettings {
                enabled: parse_or(&lookup, "GEOCODING_ENABLED", defaults.enabled)?,
                base_url: string("GEOCODER_URL", &defaults.base_url),
                user_agent: string("GEOCODER_USER_AGENT", &defaults.user_agent),
                max_attempts,
                retry_delay: Duration::from_millis(parse_or(
                    &lookup,
                    "GEOCODER_RETRY_DELAY_MS",
                    1000u64,
                )?),
                timeout: Duration::from_secs(parse_or(&lookup, "GEOCODER_TIMEOUT_SECS", 10u64)?),
                policy: if required {
                    GeocodePolicy::Required
                } else {
                    GeocodePolicy::BestEffort
                },
            },
        })
    }
}

fn invalid(name: &str, value: &str) -> ConfigError {
    ConfigError::InvalidValue {
        name: name.to_string(),
        value: value.to_string(),
    }
}

fn parse_or<F, T>(lookup: &F, name: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(name) {
        Some(raw) => raw.trim().parse().map_err(|_| invalid(name, &raw)),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(vars: &[(&str, &str)]) -> Result<Settings, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_apply_without_variables() {
        let settings = settings(&[]).unwrap();
        assert_eq!(settings.bind_address, "0.0.0.0:8080");
        assert_eq!(settings.storage, StorageBackend::MongoDb);
        assert_eq!(settings.geocoder.max_attempts, 3);
        assert_eq!(settings.geocoder.retry_delay, Duration::from_secs(1));
        assert_eq!(settings.geocoder.policy, GeocodePolicy::BestEffort);
    }

    #[test]
    fn variables_override_defaults() {
        let settings = settings(&[
            ("STORAGE_BACKEND", "memory"),
            ("GEOCODE_REQUIRED", "true"),
            ("GEOCODER_RETRY_DELAY_MS", "250"),
            ("MONGODB_DATABASE", "reservas_test"),
        ])
        .unwrap();
        assert_eq!(settings.storage, StorageBackend::Memory);
        assert_eq!(settings.geocoder.policy, GeocodePolicy::Required);
        assert_eq!(settings.geocoder.retry_delay, Duration::from_millis(250));
        assert_eq!(settings.mongo.database, "reservas_test");
    }

    #[test]
    fn storage_backend_names() {
        assert_eq!(" Mongo ".parse::<StorageBackend>(), Ok(StorageBackend::MongoDb));
        assert_eq!("MEMORY".parse::<StorageBackend>(), Ok(StorageBackend::Memory));
        assert!("sqlite".parse::<StorageBackend>().is_err());
    }

    #[test]
    fn malformed_values_are_reported() {
        let err = settings(&[("GEOCODER_MAX_ATTEMPTS", "tres")]).unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidValue {
                name: "GEOCODER_MAX_ATTEMPTS".to_string(),
                value: "tres".to_string(),
            }
        );
        assert_eq!(
            settings(&[("STORAGE_BACKEND", "postgres")]).unwrap_err(),
            ConfigError::InvalidValue {
                name: "STORAGE_BACKEND".to_string(),
                value: "postgres".to_string(),
            }
        );
        assert!(settings(&[("GEOCODER_MAX_ATTEMPTS", "0")]).is_err());
    }
}
