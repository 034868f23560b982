//! Error tracing extensions
//!
//! Log a [`TerminalError`] once, with its kind, retryability and source
//! chain as structured fields.

use std::error::Error as StdError;

use crate::types::TerminalError;

/// Extension trait for adding tracing context to errors
pub trait ErrorTraceExt {
    /// Log the error with its kind, retryable status and error chain
    fn trace_error(&self) -> &Self;
}

impl ErrorTraceExt for TerminalError {
    fn trace_error(&self) -> &Self {
        let kind = self.kind();

        let mut error_chain = Vec::new();
        let mut current_source = self.source();
        while let Some(source) = current_source {
            error_chain.push(source.to_string());
            current_source = source.source();
        }

        tracing::error!(
            error = %self,
            error_kind = kind.as_str(),
            is_retryable = self.is_retryable(),
            is_not_found = self.is_not_found(),
            error_chain_len = error_chain.len(),
            error_chain = ?error_chain,
            "Terminal operation failed"
        );

        self
    }
}

/// Extension trait for Result types
pub trait ResultTraceExt<T, E>: Sized {
    /// Convert the error to a [`TerminalError`] and log it
    fn trace_context(self) -> Result<T, TerminalError>
    where
        E: StdError + Send + Sync + 'static;
}

impl<T, E> ResultTraceExt<T, E> for Result<T, E>
where
    E: StdError + Send + Sync + 'static,
    TerminalError: From<E>,
{
    fn trace_context(self) -> Result<T, TerminalError> {
        self.map_err(|e| {
            let error = TerminalError::from(e);
            error.trace_error();
            error
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_trace_ext_returns_self() {
        let error = TerminalError::spawn("agent-1", TerminalError::PoolTimeout);
        let traced = error.trace_error();
        assert!(std::ptr::eq(traced, &error));
    }

    #[test]
    fn test_result_trace_ext() {
        let result: Result<(), std::io::Error> = Err(std::io::Error::new(
            std::io::ErrorKind::BrokenPipe,
            "shell exited",
        ));
        let traced = result.trace_context();
        assert!(matches!(traced, Err(TerminalError::Io(_))));
    }

    #[test]
    fn test_result_trace_ext_ok_passthrough() {
        let result: Result<u32, serde_json::Error> = Ok(7);
        assert_eq!(result.trace_context().unwrap(), 7);
    }
}
