//! # rclink-core - Core Domain Types
//!
//! Foundation crate for rclink. Provides the shared key vocabulary, table
//! values, telemetry classification, error handling and logging setup.
//!
//! This crate has **zero internal dependencies** -- it only depends on external
//! crates (serde, thiserror, tracing).
//!
//! ## Public API
//!
//! ### Vocabulary (`keys`)
//! - [`CommandKey`] - Controls sent to the vehicle (`forward`, `lights`, ...)
//! - [`TelemetryKey`] - Readings reported by the vehicle (`distance`, `speed`, `line`)
//!
//! ### Values (`value`)
//! - [`Value`] - A flag or number stored in either table
//!
//! ### Telemetry (`telemetry`)
//! - [`Telemetry`] - Snapshot of the reported readings
//! - [`Severity`] - Normal / warning / critical classification
//!
//! ### Error Handling (`error`)
//! - [`Error`] - Custom error enum with `fatal` vs `recoverable` classification
//! - [`Result`] - Type alias for `std::result::Result<T, Error>`
//! - [`ResultExt`] - Extension trait for adding error context
//!
//! ## Prelude
//!
//! Import commonly used types with:
//! ```rust
//! use rclink_core::prelude::*;
//! ```

pub mod error;
pub mod keys;
pub mod logging;
pub mod telemetry;
pub mod value;

/// Prelude for common imports used throughout all rclink crates
pub mod prelude {
    pub use super::error::{Error, Result, ResultExt};
    pub use tracing::{debug, error, info, instrument, trace, warn};
}

pub use error::{Error, Result, ResultExt};
pub use keys::{CommandKey, TelemetryKey};
pub use telemetry::{Severity, Telemetry};
pub use value::Value;
