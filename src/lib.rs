// Library surface for headless/integration tests and reuse.
// Keep this lean to avoid coupling to bin-only types in main.rs.
pub mod admin;
pub mod app_dirs;
pub mod attempt;
pub mod auth;
pub mod catalog;
pub mod config;
pub mod logging;
pub mod profile;
pub mod rewards;
pub mod runtime;
pub mod session;
