//! # Ciclo de vida de las reservas
//!
//! Una reserva nace siempre en `pending` y cambia de estado una sola vez,
//! a `accepted` o a `declined`. Después ya no admite más transiciones.

use chrono::{Local, NaiveDateTime};
use mongodb::bson::oid::ObjectId;

use crate::api::{AppError, AppResult};
use crate::db::models::current_timestamp;
use crate::db::{Reservation, ReservationFilter, ReservationStatus, Store};

/// Formatos de fecha aceptados, en orden de preferencia
const DATETIME_FORMATS: &[&str] = &[
    "%d/%m/%Y %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

#[derive(Debug, Clone)]
pub struct NewReservation {
    pub restaurant_id: ObjectId,
    pub requester_name: String,
    pub party_size: i64,
    /// Fecha y hora tal como llegan del cliente (`DD/MM/YYYY HH:MM` o ISO-8601)
    pub when: String,
    /// Identificador externo del usuario frontend, si lo hay
    pub frontend_user_id: Option<String>,
}

pub fn parse_datetime(raw: &str) -> AppResult<NaiveDateTime> {
    let raw = raw.trim();
    DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .ok_or_else(|| {
            AppError::validation_field(
                "reservationDatetime",
                "formato de fecha inválido, use DD/MM/YYYY HH:MM",
            )
        })
}

/// Crea una reserva en estado `pending` y devuelve su identificador.
///
/// # Errores
/// - `Validation`: nombre vacío, número de personas no positivo o fecha ilegible
/// - `NotFound`: el restaurante no existe
pub async fn create(store: &dyn Store, request: NewReservation) -> AppResult<ObjectId> {
    let name = request.requester_name.trim();
    if name.is_empty() {
        return Err(AppError::validation_field("name", "el nombre es obligatorio"));
    }
    if request.party_size <= 0 {
        return Err(AppError::validation_field(
            "personCount",
            "el número de personas debe ser mayor que 0",
        ));
    }
    let person_count = i32::try_from(request.party_size).map_err(|_| {
        AppError::validation_field("personCount", "el número de personas es demasiado grande")
    })?;
    let reservation_datetime = parse_datetime(&request.when)?;

    if store.find_restaurant(request.restaurant_id).await?.is_none() {
        return Err(AppError::not_found_id(
            "Restaurante",
            &request.restaurant_id.to_hex(),
        ));
    }

    let frontend_user_id = match request.frontend_user_id.as_deref().map(str::trim) {
        Some(user_id) if !user_id.is_empty() => {
            Some(store.find_or_create_frontend_user(user_id).await?.id)
        }
        _ => None,
    };

    let now = current_timestamp();
    let reservation = Reservation {
        id: ObjectId::new(),
        restaurant_id: request.restaurant_id,
        name: name.to_string(),
        person_count,
        reservation_datetime,
        status: ReservationStatus::Pending,
        frontend_user_id,
        created_at: now,
        updated_at: now,
    };
    store.insert_reservation(&reservation).await?;

    tracing::info!(
        reservation_id = %reservation.id,
        restaurant_id = %reservation.restaurant_id,
        person_count,
        "Reservation created"
    );
    Ok(reservation.id)
}

/// Acepta o rechaza una reserva pendiente.
///
/// # Errores
/// - `NotFound`: la reserva no existe
/// - `InvalidTransition`: la reserva ya no está pendiente, o `new_status`
///   no es `accepted` ni `declined`
pub async fn update_status(
    store: &dyn Store,
    reservation_id: ObjectId,
    new_status: &str,
) -> AppResult<Reservation> {
    let mut reservation = get(store, reservation_id).await?;
    let current = reservation.status;

    let target = new_status
        .parse::<ReservationStatus>()
        .ok()
        .filter(ReservationStatus::is_decision)
        .ok_or_else(|| AppError::invalid_transition(current.as_str(), new_status))?;

    if current != ReservationStatus::Pending {
        return Err(AppError::invalid_transition(current.as_str(), target.as_str()));
    }

    // Otra petición pudo decidir la reserva entre la lectura y la escritura
    if !store
        .transition_reservation(reservation_id, ReservationStatus::Pending, target)
        .await?
    {
        let latest = get(store, reservation_id).await?;
        return Err(AppError::invalid_transition(
            latest.status.as_str(),
            target.as_str(),
        ));
    }

    tracing::info!(
        reservation_id = %reservation_id,
        status = %target,
        "Reservation status updated"
    );
    reservation.status = target;
    Ok(reservation)
}

pub async fn get(store: &dyn Store, reservation_id: ObjectId) -> AppResult<Reservation> {
    store
        .find_reservation(reservation_id)
        .await?
        .ok_or_else(|| AppError::not_found_id("Reserva", &reservation_id.to_hex()))
}

/// Reservas de un restaurante por fecha ascendente; con `upcoming_only`
/// solo las de ahora en adelante.
pub async fn list_for_restaurant(
    store: &dyn Store,
    restaurant_id: ObjectId,
    upcoming_only: bool,
    status: Option<ReservationStatus>,
) -> AppResult<Vec<Reservation>> {
    let filter = ReservationFilter {
        restaurant_id: Some(restaurant_id),
        status,
        from: upcoming_only.then(|| Local::now().naive_local()),
        ..Default::default()
    };
    store.list_reservations(&filter).await
}

pub async fn list_for_frontend_user(
    store: &dyn Store,
    user_id: &str,
) -> AppResult<Vec<Reservation>> {
    let frontend_user = store
        .find_frontend_user(user_id)
        .await?
        .ok_or_else(|| AppError::not_found_id("Usuario frontend", user_id))?;

    let filter = ReservationFilter {
        frontend_user_id: Some(frontend_user.id),
        ..Default::default()
    };
    store.list_reservations(&filter).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testing::FaultyRepo;
    use crate::db::{MemoryRepo, Restaurant};
    use tokio_test::assert_err;

    async fn repo_with_restaurant() -> (MemoryRepo, ObjectId) {
        let repo = MemoryRepo::new();
        let restaurant = Restaurant {
            id: ObjectId::new(),
            name: "Dragon Palace".to_string(),
            address: "Via Argentieri, 16, 39100 Bolzano BZ, Italy".to_string(),
            phone_number: "0123456789".to_string(),
            description: None,
            latitude: None,
            longitude: None,
            manager_id: ObjectId::new(),
            category_ids: vec![],
            created_at: 0,
        };
        repo.insert_restaurant(&restaurant).await.unwrap();
        (repo, restaurant.id)
    }

    fn request(restaurant_id: ObjectId) -> NewReservation {
        NewReservation {
            restaurant_id,
            requester_name: "Customer 1".to_string(),
            party_size: 4,
            when: "24/12/2030 20:30".to_string(),
            frontend_user_id: None,
        }
    }

    #[tokio::test]
    async fn new_reservation_starts_pending() {
        let (repo, restaurant_id) = repo_with_restaurant().await;
        let id = create(&repo, request(restaurant_id)).await.unwrap();

        let stored = get(&repo, id).await.unwrap();
        assert_eq!(stored.status, ReservationStatus::Pending);
        assert_eq!(stored.person_count, 4);
        assert_eq!(
            stored.reservation_datetime,
            parse_datetime("2030-12-24T20:30").unwrap()
        );
    }

    #[tokio::test]
    async fn unknown_restaurant_is_not_found() {
        let (repo, _) = repo_with_restaurant().await;
        let err = assert_err!(create(&repo, request(ObjectId::new())).await);
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn invalid_input_is_rejected() {
        let (repo, restaurant_id) = repo_with_restaurant().await;

        for party_size in [0, -2] {
            let err = assert_err!(
                create(
                    &repo,
                    NewReservation {
                        party_size,
                        ..request(restaurant_id)
                    }
                )
                .await
            );
            assert!(err.is_validation());
        }

        let err = assert_err!(
            create(
                &repo,
                NewReservation {
                    when: "tomorrow at eight".to_string(),
                    ..request(restaurant_id)
                }
            )
            .await
        );
        assert!(err.is_validation());

        let err = assert_err!(
            create(
                &repo,
                NewReservation {
                    requester_name: "   ".to_string(),
                    ..request(restaurant_id)
                }
            )
            .await
        );
        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn pending_reservation_can_be_accepted_once() {
        let (repo, restaurant_id) = repo_with_restaurant().await;
        let id = create(&repo, request(restaurant_id)).await.unwrap();

        let accepted = update_status(&repo, id, "accepted").await.unwrap();
        assert_eq!(accepted.status, ReservationStatus::Accepted);

        for next in ["accepted", "declined", "pending"] {
            let err = assert_err!(update_status(&repo, id, next).await);
            assert!(err.is_invalid_transition(), "{next} should be rejected");
        }
        assert_eq!(
            get(&repo, id).await.unwrap().status,
            ReservationStatus::Accepted
        );
    }

    #[tokio::test]
    async fn losing_a_concurrent_decision_keeps_the_first_one() {
        let (inner, restaurant_id) = repo_with_restaurant().await;
        let repo = FaultyRepo::wrap(inner);
        let id = create(&repo, request(restaurant_id)).await.unwrap();

        repo.decide_first(ReservationStatus::Declined);
        let err = assert_err!(update_status(&repo, id, "accepted").await);

        assert!(matches!(
            err,
            AppError::InvalidTransition { ref from, ref to } if from == "declined" && to == "accepted"
        ));
        assert_eq!(
            get(&repo, id).await.unwrap().status,
            ReservationStatus::Declined
        );
    }

    #[tokio::test]
    async fn declined_reservation_is_final() {
        let (repo, restaurant_id) = repo_with_restaurant().await;
        let id = create(&repo, request(restaurant_id)).await.unwrap();

        update_status(&repo, id, "declined").await.unwrap();
        let err = assert_err!(update_status(&repo, id, "accepted").await);
        assert!(err.is_invalid_transition());
    }

    #[tokio::test]
    async fn only_decisions_are_valid_targets() {
        let (repo, restaurant_id) = repo_with_restaurant().await;
        let id = create(&repo, request(restaurant_id)).await.unwrap();

        for target in ["pending", "confirmed", "canceled", ""] {
            let err = assert_err!(update_status(&repo, id, target).await);
            assert!(err.is_invalid_transition());
        }
        assert_eq!(
            get(&repo, id).await.unwrap().status,
            ReservationStatus::Pending
        );
    }

    #[tokio::test]
    async fn missing_reservation_is_not_found() {
        let (repo, _) = repo_with_restaurant().await;
        let err = assert_err!(update_status(&repo, ObjectId::new(), "accepted").await);
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn frontend_user_is_created_lazily_and_reused() {
        let (repo, restaurant_id) = repo_with_restaurant().await;
        let with_user = |when: &str| NewReservation {
            when: when.to_string(),
            frontend_user_id: Some("user_001".to_string()),
            ..request(restaurant_id)
        };

        assert!(repo.find_frontend_user("user_001").await.unwrap().is_none());
        create(&repo, with_user("01/01/2031 13:00")).await.unwrap();
        create(&repo, with_user("02/01/2031 13:00")).await.unwrap();

        let listed = list_for_frontend_user(&repo, "user_001").await.unwrap();
        assert_eq!(listed.len(), 2);
        assert!(listed[0].reservation_datetime < listed[1].reservation_datetime);

        let err = assert_err!(list_for_frontend_user(&repo, "user_999").await);
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn upcoming_listing_skips_past_reservations() {
        let (repo, restaurant_id) = repo_with_restaurant().await;
        create(
            &repo,
            NewReservation {
                when: "01/01/2001 12:00".to_string(),
                ..request(restaurant_id)
            },
        )
        .await
        .unwrap();
        let future = create(&repo, request(restaurant_id)).await.unwrap();

        let upcoming = list_for_restaurant(&repo, restaurant_id, true, None)
            .await
            .unwrap();
        assert_eq!(upcoming.len(), 1);
        assert_eq!(upcoming[0].id, future);

        let all = list_for_restaurant(&repo, restaurant_id, false, None)
            .await
            .unwrap();
        assert_eq!(all.len(), 2);
    }
}
