//! GDB Chat server binary support.
//!
//! - **cli**: command-line and environment configuration
//! - **app**: component wiring, serving, and orderly shutdown

pub mod app;
pub mod cli;
pub mod error;

pub use app::{shutdown_signal, App, Paths};
pub use cli::Cli;
pub use error::{AppError, Result};
