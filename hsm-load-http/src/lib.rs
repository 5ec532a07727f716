//! HTTP client for the encryption service under test
//!
//! This crate provides the typed request/response schemas of the `/encrypt`,
//! `/decrypt` and `/health` endpoints, the [`HsmClient`] trait the load
//! runtime is written against, and a reqwest implementation speaking mutual
//! TLS through rustls.

pub mod client;
pub mod config;
pub mod errors;
pub mod types;

// Re-export main types for convenience
pub use client::{HsmClient, ReqwestHsmClient};
pub use config::{ClientConfig, ClientTls};
pub use errors::HttpError;
pub use types::{
    ApiResponse, DecryptRequest, DecryptResponse, EncryptRequest, EncryptResponse, Endpoint,
    HealthResponse,
};
