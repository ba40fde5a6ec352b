//! Registros persistidos. Las relaciones son claves foráneas explícitas
//! (`ObjectId`) y se resuelven con búsquedas indexadas en el [`Store`](super::Store).

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

/// Cuenta de gestor de restaurante
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub access_token: String,
    pub created_at: i64, // timestamp unix
}

/// Identidad de un usuario final, proporcionada por el cliente externo
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct FrontendUser {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub user_id: String,
    pub email: Option<String>,
    pub name: Option<String>,
    pub created_at: i64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Category {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Restaurant {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub name: String,
    pub address: String,
    pub phone_number: String,
    pub description: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub manager_id: ObjectId,
    #[serde(default)]
    pub category_ids: Vec<ObjectId>,
    pub created_at: i64,
}

/// Estado de una reserva. Solo `Pending` admite transición, y solo una vez.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReservationStatus {
    Pending,
    Accepted,
    Declined,
}

impl ReservationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Declined => "declined",
        }
    }

    /// Estados a los que un gestor puede mover una reserva pendiente
    pub fn is_decision(&self) -> bool {
        matches!(self, Self::Accepted | Self::Declined)
    }
}

impl fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReservationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "accepted" => Ok(Self::Accepted),
            "declined" => Ok(Self::Declined),
            other => Err(format!("estado desconocido '{}'", other)),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Reservation {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub restaurant_id: ObjectId,
    pub name: String,
    pub person_count: i32,
    #[serde(with = "datetime_format")]
    pub reservation_datetime: NaiveDateTime,
    pub status: ReservationStatus,
    pub frontend_user_id: Option<ObjectId>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Filtro de listado de reservas; los campos `None` no filtran
#[derive(Debug, Clone, Default)]
pub struct ReservationFilter {
    pub restaurant_id: Option<ObjectId>,
    pub frontend_user_id: Option<ObjectId>,
    pub status: Option<ReservationStatus>,
    /// Solo reservas con fecha igual o posterior
    pub from: Option<NaiveDateTime>,
}

impl ReservationFilter {
    pub fn matches(&self, reservation: &Reservation) -> bool {
        self.restaurant_id.map_or(true, |id| reservation.restaurant_id == id)
            && self
                .frontend_user_id
                .map_or(true, |id| reservation.frontend_user_id == Some(id))
            && self.status.map_or(true, |s| reservation.status == s)
            && self.from.map_or(true, |from| reservation.reservation_datetime >= from)
    }
}

/// Las fechas se guardan como texto de ancho fijo para que el orden
/// lexicográfico en MongoDB coincida con el cronológico.
pub mod datetime_format {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub const FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

    pub fn format(value: &NaiveDateTime) -> String {
        value.format(FORMAT).to_string()
    }

    pub fn serialize<S>(value: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format(value))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&raw, FORMAT).map_err(serde::de::Error::custom)
    }
}

pub fn current_timestamp() -> i64 {
    chrono::Utc::now().timestamp()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn reservation_at(restaurant_id: ObjectId, day: u32) -> Reservation {
        Reservation {
            id: ObjectId::new(),
            restaurant_id,
            name: "Ana".to_string(),
            person_count: 2,
            reservation_datetime: NaiveDate::from_ymd_opt(2030, 1, day)
                .and_then(|d| d.and_hms_opt(20, 0, 0))
                .unwrap(),
            status: ReservationStatus::Pending,
            frontend_user_id: None,
            created_at: 0,
            updated_at: 0,
        }
    }

    #[test]
    fn status_parses_known_values_only() {
        assert_eq!(
            "accepted".parse::<ReservationStatus>(),
            Ok(ReservationStatus::Accepted)
        );
        assert_eq!(
            "declined".parse::<ReservationStatus>(),
            Ok(ReservationStatus::Declined)
        );
        assert!("confirmed".parse::<ReservationStatus>().is_err());
        assert!(!ReservationStatus::Pending.is_decision());
    }

    #[test]
    fn reservation_serializes_fixed_width_datetime() {
        let reservation = reservation_at(ObjectId::new(), 5);
        let json = serde_json::to_value(&reservation).unwrap();
        assert_eq!(json["reservation_datetime"], "2030-01-05T20:00:00");
        assert_eq!(json["status"], "pending");
    }

    #[test]
    fn filter_combines_all_fields() {
        let restaurant = ObjectId::new();
        let reservation = reservation_at(restaurant, 10);

        let by_restaurant = ReservationFilter {
            restaurant_id: Some(restaurant),
            ..Default::default()
        };
        assert!(by_restaurant.matches(&reservation));

        let later = ReservationFilter {
            restaurant_id: Some(restaurant),
            from: Some(reservation_at(restaurant, 11).reservation_datetime),
            ..Default::default()
        };
        assert!(!later.matches(&reservation));

        let accepted = ReservationFilter {
            status: Some(ReservationStatus::Accepted),
            ..Default::default()
        };
        assert!(!accepted.matches(&reservation));
    }
}
