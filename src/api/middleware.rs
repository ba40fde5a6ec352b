//! # Registro de cadenas de error
//!
//! Utilidades para volcar en los logs la cadena completa (`source()`) de un
//! error antes de convertirlo en [`AppError`](super::AppError).

use std::error::Error as StdError;

/// Recorre `source()` y devuelve los mensajes de la cadena, del más externo al más interno
pub fn error_chain<E>(error: &E) -> Vec<String>
where
    E: StdError + 'static,
{
    let mut chain = Vec::new();
    let mut current: Option<&dyn StdError> = Some(error);

    while let Some(err) = current {
        chain.push(err.to_string());
        current = err.source();
    }

    chain
}

pub fn log_error_chain<E>(error: &E, context: Option<&str>)
where
    E: StdError + 'static,
{
    let chain = error_chain(error);

    match context {
        Some(ctx) => tracing::error!(
            context = %ctx,
            depth = chain.len(),
            error_chain = ?chain,
            "Error with full chain (with context)"
        ),
        None => tracing::error!(
            depth = chain.len(),
            error_chain = ?chain,
            "Error with full chain"
        ),
    }
}

/// Extension trait para `Result` que registra la cadena de errores sin consumirla
///
/// ```ignore
/// collection
///     .insert_one(reservation)
///     .await
///     .log_error_context("inserting reservation")
///     .map_err(|e| AppError::database("insert_reservation", e))?;
/// ```
pub trait ErrorLogExt<T, E> {
    fn log_error_context(self, context: &str) -> Result<T, E>;
}

impl<T, E> ErrorLogExt<T, E> for Result<T, E>
where
    E: StdError + 'static,
{
    fn log_error_context(self, context: &str) -> Result<T, E> {
        if let Err(ref error) = self {
            log_error_chain(error, Some(context));
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fmt;

    #[derive(Debug)]
    struct Outer(Inner);

    #[derive(Debug)]
    struct Inner;

    impl fmt::Display for Outer {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "outer")
        }
    }

    impl fmt::Display for Inner {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "inner")
        }
    }

    impl StdError for Inner {}

    impl StdError for Outer {
        fn source(&self) -> Option<&(dyn StdError + 'static)> {
            Some(&self.0)
        }
    }

    #[test]
    fn chain_lists_every_source() {
        assert_eq!(error_chain(&Outer(Inner)), vec!["outer", "inner"]);
    }

    #[test]
    fn logging_passes_the_result_through() {
        let result: Result<u8, Outer> = Err(Outer(Inner));
        assert!(result.log_error_context("test").is_err());

        let ok: Result<u8, Outer> = Ok(7);
        assert_eq!(ok.log_error_context("test").ok(), Some(7));
    }
}
