//! Diagnostics helpers built on `tracing`

mod error_ext;

pub use error_ext::{ErrorTraceExt, ResultTraceExt};
