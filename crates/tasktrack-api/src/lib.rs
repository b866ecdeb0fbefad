// Tasktrack API library
// Decision: Shared library for the server binary and integration tests

// HTTP application
pub mod app;
pub use app::build_app;

// Authentication module
pub mod auth;

// Server configuration
pub mod config;

// OpenAPI spec generation
pub mod openapi;

// Storage layer
pub mod storage;
