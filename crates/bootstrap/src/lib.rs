//! # Launchpad Bootstrap
//!
//! The composition root. `initialize_application` loads the configuration,
//! warns about destructive settings, then builds every client and manager in
//! dependency order. Each acquired resource registers a release action; a
//! failing step releases what came before it, and a successful start hands
//! back a single `Release` for shutdown.

// Declare the modules that make up this crate.
pub mod alerts;
pub mod application;
pub mod lifecycle;
pub mod teardown;

// Re-export the core types to provide a clean public API.
pub use application::{Application, InitOptions, ROOT_CONTEXT, initialize_application};
pub use lifecycle::wait_for_shutdown;
pub use teardown::{Release, Startup};
