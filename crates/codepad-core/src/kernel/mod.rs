//! # Codepad Core Kernel
//!
//! Crate-wide plumbing shared by every subsystem.
//!
//! - **Core Constants**: fixed file names, fallback entry points and default
//!   directory names via the `constants` submodule.
//! - **Error Handling**: the aggregating [`Error`](error::Error) type and the
//!   `Result` alias in the `error` submodule. Subsystem errors
//!   ([`PluginSystemError`](crate::plugin_system::error::PluginSystemError),
//!   [`StorageSystemError`](crate::storage::error::StorageSystemError)) convert
//!   into it with `?`.
pub mod constants;
pub mod error;

pub use error::{Error, Result};
