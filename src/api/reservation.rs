//! # API de Reservas
//!
//! Este módulo maneja todas las operaciones relacionadas con reservas:
//! - Crear nuevas reservas (clientes del frontend, sin autenticación)
//! - Aceptar o rechazar reservas pendientes (gestor del restaurante)
//! - Consultar reservas por restaurante o por usuario frontend

use actix_web::{get, patch, post, web, HttpRequest, HttpResponse, Responder};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::manager::current_manager;
use super::{parse_id, AppError, AppResult, AppState};
use crate::db::models::datetime_format;
use crate::db::{Reservation, ReservationStatus};
use crate::service::reservation::{self, NewReservation};
use crate::service::restaurant;

/// Petición de reserva enviada por el frontend.
///
/// Todos los campos son opcionales a nivel de deserialización para poder
/// responder con un error de validación propio cuando falta alguno.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MakeReservation {
    restaurant_id: Option<String>,
    name: Option<String>,
    person_count: Option<i64>,
    /// `DD/MM/YYYY HH:MM` o ISO-8601
    reservation_datetime: Option<String>,
    /// Identificador externo del usuario frontend
    user_id: Option<String>,
    /// Solo se admite ausente o `pending`
    status: Option<String>,
}

#[derive(Deserialize)]
struct StatusUpdate {
    status: Option<String>,
}

#[derive(Deserialize)]
struct RestaurantReservationsQuery {
    upcoming: Option<bool>,
    status: Option<String>,
}

/// Vista JSON de una reserva
#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ReservationResponse {
    pub id: String,
    pub restaurant_id: String,
    pub name: String,
    pub person_count: i32,
    pub reservation_datetime: String,
    pub status: ReservationStatus,
    /// Momento de creación (timestamp unix)
    pub timestamp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frontend_user_id: Option<String>,
}

impl From<Reservation> for ReservationResponse {
    fn from(reservation: Reservation) -> Self {
        ReservationResponse {
            id: reservation.id.to_hex(),
            restaurant_id: reservation.restaurant_id.to_hex(),
            name: reservation.name,
            person_count: reservation.person_count,
            reservation_datetime: datetime_format::format(&reservation.reservation_datetime),
            status: reservation.status,
            timestamp: reservation.created_at,
            frontend_user_id: reservation.frontend_user_id.map(|id| id.to_hex()),
        }
    }
}

fn required<T>(value: Option<T>, field: &str) -> AppResult<T> {
    value.ok_or_else(|| AppError::validation_field(field, "campo obligatorio"))
}

/// Crea una nueva reserva en estado `pending`
///
/// # Respuesta (`201 Created`)
/// ```json
/// {
///   "message": "Reserva creada correctamente",
///   "reservationId": "507f1f77bcf86cd799439011",
///   "status": "pending"
/// }
/// ```
///
/// # Errores
/// - `400 Bad Request`: Falta algún campo, fecha inválida, número de personas
///   no positivo o se envió un `status` distinto de `pending`
/// - `404 Not Found`: Restaurante no encontrado
/// - `500 Internal Server Error`: Error de base de datos
#[post("/api/reservations")]
async fn make_reservation(
    state: web::Data<AppState>,
    data: web::Json<MakeReservation>,
) -> AppResult<impl Responder> {
    let data = data.into_inner();

    if let Some(status) = data.status.as_deref() {
        if status != ReservationStatus::Pending.as_str() {
            return Err(AppError::validation_field(
                "status",
                "una reserva nueva siempre empieza como 'pending'",
            ));
        }
    }

    let restaurant_id = parse_id(&required(data.restaurant_id, "restaurantId")?, "restaurante")?;
    let request = NewReservation {
        restaurant_id,
        requester_name: required(data.name, "name")?,
        party_size: required(data.person_count, "personCount")?,
        when: required(data.reservation_datetime, "reservationDatetime")?,
        frontend_user_id: data.user_id,
    };

    let id = reservation::create(state.store(), request).await?;

    Ok(HttpResponse::Created().json(json!({
        "message": "Reserva creada correctamente",
        "reservationId": id.to_hex(),
        "status": ReservationStatus::Pending,
    })))
}

#[get("/api/reservations/{id}")]
async fn get_reservation(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> AppResult<impl Responder> {
    let reservation_id = parse_id(&path.into_inner(), "reserva")?;
    let reservation = reservation::get(state.store(), reservation_id).await?;
    Ok(HttpResponse::Ok().json(ReservationResponse::from(reservation)))
}

/// Acepta o rechaza una reserva pendiente
///
/// # Autenticación
/// Requiere token Bearer del gestor del restaurante de la reserva.
///
/// # Cuerpo
/// `{"status": "accepted"}` o `{"status": "declined"}`
///
/// # Errores
/// - `400 Bad Request`: Estado destino inválido o la reserva ya no está pendiente
/// - `401 Unauthorized`: Token inválido o la reserva es de otro restaurante
/// - `404 Not Found`: Reserva no encontrada
#[patch("/api/reservations/{id}")]
async fn update_reservation_status(
    state: web::Data<AppState>,
    path: web::Path<String>,
    data: web::Json<StatusUpdate>,
    req: HttpRequest,
) -> AppResult<impl Responder> {
    let manager = current_manager(&state, &req).await?;
    let reservation_id = parse_id(&path.into_inner(), "reserva")?;
    let new_status = required(data.into_inner().status, "status")?;

    let existing = reservation::get(state.store(), reservation_id).await?;
    restaurant::owned_by(
        state.store(),
        &manager,
        existing.restaurant_id,
        "update_reservation_status",
    )
    .await?;

    let updated = reservation::update_status(state.store(), reservation_id, &new_status).await?;

    Ok(HttpResponse::Ok().json(json!({
        "message": format!("Reservation {} successfully", updated.status),
        "reservation": ReservationResponse::from(updated),
    })))
}

/// Reservas de un restaurante, ordenadas por fecha
///
/// # Filtros
/// - `upcoming` (por defecto `true`): solo reservas de ahora en adelante
/// - `status`: `pending`, `accepted` o `declined`
#[get("/api/restaurants/{id}/reservations")]
async fn restaurant_reservations(
    state: web::Data<AppState>,
    path: web::Path<String>,
    query: web::Query<RestaurantReservationsQuery>,
    req: HttpRequest,
) -> AppResult<impl Responder> {
    let manager = current_manager(&state, &req).await?;
    let restaurant_id = parse_id(&path.into_inner(), "restaurante")?;
    restaurant::owned_by(state.store(), &manager, restaurant_id, "list_reservations").await?;

    let status = query
        .status
        .as_deref()
        .map(str::parse::<ReservationStatus>)
        .transpose()
        .map_err(|e| AppError::validation_field("status", &e))?;

    let reservations = reservation::list_for_restaurant(
        state.store(),
        restaurant_id,
        query.upcoming.unwrap_or(true),
        status,
    )
    .await?;

    let body: Vec<ReservationResponse> = reservations.into_iter().map(Into::into).collect();
    Ok(HttpResponse::Ok().json(body))
}

#[get("/api/frontend-users/{user_id}/reservations")]
async fn frontend_user_reservations(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> AppResult<impl Responder> {
    let reservations = reservation::list_for_frontend_user(state.store(), &path).await?;
    let body: Vec<ReservationResponse> = reservations.into_iter().map(Into::into).collect();
    Ok(HttpResponse::Ok().json(body))
}

/// Configura las rutas relacionadas con reservas
///
/// # Rutas disponibles
/// - `POST /api/reservations` - Crear nueva reserva
/// - `GET /api/reservations/{id}` - Consultar una reserva
/// - `PATCH /api/reservations/{id}` - Aceptar o rechazar (gestor)
/// - `GET /api/restaurants/{id}/reservations` - Reservas del restaurante (gestor)
/// - `GET /api/frontend-users/{user_id}/reservations` - Reservas de un usuario frontend
pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(make_reservation);
    cfg.service(get_reservation);
    cfg.service(update_reservation_status);
    cfg.service(restaurant_reservations);
    cfg.service(frontend_user_reservations);
}
