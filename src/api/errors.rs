//! # Errores de la aplicación
//!
//! Todas las capas (almacenamiento, servicios y handlers HTTP) devuelven
//! [`AppError`]. La conversión a respuesta HTTP ocurre en un único sitio,
//! la implementación de [`ResponseError`].

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use std::error::Error;
use thiserror::Error;

/// Tipos de error de la aplicación
#[derive(Error, Debug)]
pub enum AppError {
    /// Error del driver de MongoDB, con la operación que lo produjo
    #[error("Error de base de datos en operación '{operation}': {source}")]
    Database {
        operation: String,
        #[source]
        source: mongodb::error::Error,
    },

    /// Error del almacenamiento que no proviene de MongoDB (p. ej. lock envenenado)
    #[error("Error de almacenamiento: {0}")]
    Storage(String),

    #[error("Error de validación en campo '{field}': {message}")]
    ValidationWithField { field: String, message: String },

    #[error("Error de validación: {0}")]
    Validation(String),

    /// Cambio de estado de reserva no permitido
    #[error("Transición inválida de '{from}' a '{to}'")]
    InvalidTransition { from: String, to: String },

    #[error("No autorizado para operación '{operation}': {reason}")]
    UnauthorizedWithContext { operation: String, reason: String },

    #[error("No autorizado: {0}")]
    Unauthorized(String),

    #[error("No encontrado: {resource_type} con ID '{id}'")]
    NotFoundWithId { resource_type: String, id: String },

    #[error("Error interno (trace: {trace_id}): {message}")]
    InternalWithTrace { trace_id: String, message: String },
}

impl AppError {
    pub fn database(operation: &str, source: mongodb::error::Error) -> Self {
        Self::Database {
            operation: operation.to_string(),
            source,
        }
    }

    pub fn validation_field(field: &str, message: &str) -> Self {
        Self::ValidationWithField {
            field: field.to_string(),
            message: message.to_string(),
        }
    }

    pub fn invalid_transition(from: &str, to: &str) -> Self {
        Self::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    pub fn unauthorized_operation(operation: &str, reason: &str) -> Self {
        Self::UnauthorizedWithContext {
            operation: operation.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn not_found_id(resource_type: &str, id: &str) -> Self {
        Self::NotFoundWithId {
            resource_type: resource_type.to_string(),
            id: id.to_string(),
        }
    }

    /// Crea un error interno con trace ID (se genera uno si no se proporciona)
    pub fn internal_trace(message: &str, trace_id: Option<String>) -> Self {
        Self::InternalWithTrace {
            trace_id: trace_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            message: message.to_string(),
        }
    }

    /// Categoría del error tal como se expone en el campo `error` de la respuesta
    pub fn category(&self) -> &'static str {
        match self {
            Self::Database { .. } | Self::Storage(_) => "storage_error",
            Self::ValidationWithField { .. } | Self::Validation(_) => "validation_error",
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::UnauthorizedWithContext { .. } | Self::Unauthorized(_) => "unauthorized",
            Self::NotFoundWithId { .. } => "not_found",
            Self::InternalWithTrace { .. } => "internal_error",
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFoundWithId { .. })
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::ValidationWithField { .. } | Self::Validation(_))
    }

    pub fn is_invalid_transition(&self) -> bool {
        matches!(self, Self::InvalidTransition { .. })
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::ValidationWithField { .. }
            | Self::Validation(_)
            | Self::InvalidTransition { .. } => StatusCode::BAD_REQUEST,
            Self::UnauthorizedWithContext { .. } | Self::Unauthorized(_) => {
                StatusCode::UNAUTHORIZED
            }
            Self::NotFoundWithId { .. } => StatusCode::NOT_FOUND,
            Self::Database { .. } | Self::Storage(_) | Self::InternalWithTrace { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = match self {
            Self::Database { operation, source } => {
                tracing::error!(
                    operation = %operation,
                    error = %source,
                    error_chain = ?source.source(),
                    "Database error occurred"
                );
                "Error interno del servidor".to_string()
            }
            Self::Storage(detail) => {
                tracing::error!(detail = %detail, "Storage error occurred");
                "Error interno del servidor".to_string()
            }
            Self::InternalWithTrace { trace_id, message } => {
                tracing::error!(
                    trace_id = %trace_id,
                    message = %message,
                    "Internal error with trace"
                );
                format!("Error interno (trace: {})", trace_id)
            }
            Self::ValidationWithField { field, message } => {
                tracing::warn!(field = %field, message = %message, "Validation error");
                format!("Campo '{}': {}", field, message)
            }
            Self::InvalidTransition { from, to } => {
                tracing::warn!(from = %from, to = %to, "Rejected reservation status transition");
                self.to_string()
            }
            Self::UnauthorizedWithContext { operation, reason } => {
                tracing::warn!(
                    operation = %operation,
                    reason = %reason,
                    "Unauthorized access attempt"
                );
                format!("Operación '{}': {}", operation, reason)
            }
            Self::NotFoundWithId { resource_type, id } => {
                tracing::info!(resource_type = %resource_type, id = %id, "Resource not found");
                format!("{} con ID '{}' no encontrado", resource_type, id)
            }
            error => {
                tracing::info!(error = %error, "Request rejected");
                error.to_string()
            }
        };

        HttpResponse::build(self.status_code()).json(ErrorResponse {
            error: self.category().to_string(),
            message,
        })
    }
}

#[derive(serde::Serialize, serde::Deserialize, Debug)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

pub type AppResult<T> = Result<T, AppError>;

impl From<mongodb::error::Error> for AppError {
    fn from(error: mongodb::error::Error) -> Self {
        Self::Database {
            operation: "database_operation".to_string(),
            source: error,
        }
    }
}

impl From<mongodb::bson::oid::Error> for AppError {
    fn from(e: mongodb::bson::oid::Error) -> Self {
        Self::validation_field("id", &e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_error_category() {
        assert_eq!(
            AppError::Validation("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::invalid_transition("accepted", "declined").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::not_found_id("Reserva", "abc").status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::Unauthorized("x".into()).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AppError::Storage("lock".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn storage_errors_hide_details_from_clients() {
        let response = AppError::Storage("lock poisoned".into()).error_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn categories_are_stable() {
        assert_eq!(AppError::not_found_id("Reserva", "x").category(), "not_found");
        assert_eq!(
            AppError::validation_field("email", "x").category(),
            "validation_error"
        );
        assert_eq!(
            AppError::invalid_transition("pending", "pending").category(),
            "invalid_transition"
        );
    }
}
