//! # Gestores
//!
//! Registro, login y autenticación por token de las cuentas de gestor.
//! Las contraseñas se guardan con argon2; el token de acceso es un UUID v4
//! que se emite al registrarse.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use mongodb::bson::oid::ObjectId;
use uuid::Uuid;

use crate::api::{AppError, AppResult};
use crate::db::models::current_timestamp;
use crate::db::{Store, User};

const MIN_PASSWORD: usize = 6;

/// Validación básica, igual de permisiva que la de los formularios
fn validate_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.ends_with('.'),
        None => false,
    }
}

fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::internal_trace(&format!("hash de contraseña: {}", e), None))
}

fn verify_password(password: &str, stored: &str) -> bool {
    match PasswordHash::new(stored) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            tracing::error!(error = %e, "Stored password hash is not a valid PHC string");
            false
        }
    }
}

pub async fn register(store: &dyn Store, name: &str, email: &str, password: &str) -> AppResult<User> {
    let name = name.trim();
    let email = email.trim().to_lowercase();

    if name.is_empty() {
        return Err(AppError::validation_field("name", "es obligatorio"));
    }
    if !validate_email(&email) {
        return Err(AppError::validation_field("email", "email inválido"));
    }
    if password.chars().count() < MIN_PASSWORD {
        return Err(AppError::validation_field(
            "password",
            &format!("debe tener al menos {} caracteres", MIN_PASSWORD),
        ));
    }

    if store.find_user_by_email(&email).await?.is_some() {
        return Err(AppError::validation_field("email", "ya está registrado"));
    }

    let user = User {
        id: ObjectId::new(),
        name: name.to_string(),
        email,
        password_hash: hash_password(password)?,
        access_token: Uuid::new_v4().to_string(),
        created_at: current_timestamp(),
    };
    store.insert_user(&user).await?;

    tracing::info!(user_id = %user.id, "Manager registered");
    Ok(user)
}

/// Devuelve el gestor si las credenciales son correctas
pub async fn login(store: &dyn Store, email: &str, password: &str) -> AppResult<User> {
    let email = email.trim().to_lowercase();
    if email.is_empty() || password.is_empty() {
        return Err(AppError::Validation(
            "Email y contraseña son requeridos".to_string(),
        ));
    }

    match store.find_user_by_email(&email).await? {
        Some(user) if verify_password(password, &user.password_hash) => Ok(user),
        _ => Err(AppError::Unauthorized("Credenciales incorrectas".to_string())),
    }
}

pub async fn authenticate(store: &dyn Store, token: &str) -> AppResult<User> {
    store
        .find_user_by_token(token)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Token inválido".to_string()))
}
