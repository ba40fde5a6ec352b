//! # API de Gestores
//!
//! Registro y login de las cuentas que administran restaurantes, y la
//! extracción del token Bearer que usan el resto de rutas protegidas.

use actix_web::{post, web, HttpRequest, HttpResponse, Responder};
use serde::Deserialize;
use serde_json::json;

use super::{AppError, AppResult, AppState};
use crate::db::User;
use crate::service::manager;

#[derive(Deserialize)]
struct RegisterManager {
    name: String,
    email: String,
    password: String,
}

#[derive(Deserialize)]
struct LoginRequest {
    email: String,
    password: String,
}

/// Extrae el token Bearer del header Authorization
///
/// # Errores
/// - `Unauthorized`: Si falta el header, es inválido o no tiene el formato correcto
fn extract_token(req: &HttpRequest) -> AppResult<&str> {
    let auth_header = req
        .headers()
        .get("authorization")
        .ok_or(AppError::Unauthorized("Falta header Authorization".to_string()))?;

    let auth_str = auth_header
        .to_str()
        .map_err(|_| AppError::Unauthorized("Header Authorization inválido".to_string()))?;

    auth_str
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(AppError::Unauthorized("Formato de token inválido".to_string()))
}

/// Gestor autenticado por el token Bearer de la petición
pub(crate) async fn current_manager(state: &AppState, req: &HttpRequest) -> AppResult<User> {
    let token = extract_token(req)?;
    manager::authenticate(state.store(), token).await
}

/// Registra un nuevo gestor
///
/// # Respuesta
///
/// ```json
/// {
///   "message": "Gestor registrado correctamente",
///   "id": "mongodb-object-id",
///   "accessToken": "uuid-token"
/// }
/// ```
///
/// # Errores
///
/// - `400 Bad Request`: Datos inválidos o email ya registrado
/// - `500 Internal Server Error`: Error de base de datos
#[post("/api/managers/register")]
async fn register_manager(
    state: web::Data<AppState>,
    data: web::Json<RegisterManager>,
) -> AppResult<impl Responder> {
    let user = manager::register(state.store(), &data.name, &data.email, &data.password).await?;

    Ok(HttpResponse::Created().json(json!({
        "message": "Gestor registrado correctamente",
        "id": user.id.to_hex(),
        "accessToken": user.access_token,
    })))
}

#[post("/api/managers/login")]
async fn login_manager(
    state: web::Data<AppState>,
    data: web::Json<LoginRequest>,
) -> AppResult<impl Responder> {
    let user = manager::login(state.store(), &data.email, &data.password).await?;
    let restaurant = state.store().find_restaurant_by_manager(user.id).await?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "Login exitoso",
        "id": user.id.to_hex(),
        "accessToken": user.access_token,
        "restaurantId": restaurant.map(|r| r.id.to_hex()),
    })))
}

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(register_manager);
    cfg.service(login_manager);
}
