//! Domain layer for the neurohost agent server
//!
//! This module contains the registry, request and message models, the error
//! taxonomy, and the ports external collaborators implement.

pub mod errors;
pub mod models;
pub mod ports;

// Re-export error types for convenient access
pub use errors::{AdmissionError, EngineError, RegistryError, ServiceError, StreamError};
