//! Aroma Network Library
//!
//! HTTP access to the remote catalog service.
//!
//! # Architecture
//!
//! - **Contracts**: [`AuthApi`], [`CatalogApi`], [`UploadApi`], [`UserApi`]
//! - **Client**: [`HttpClient`] implements all four over reqwest
//! - **Protocol**: JSON request and response envelopes
//!
//! # Usage
//!
//! ```ignore
//! let credentials = Credentials::new();
//! let client = HttpClient::new(ClientConfig::default(), credentials.clone())?;
//!
//! let login = client.login("admin", "admin123").await?;
//! credentials.set(Some(login.token));
//!
//! let brands = client.brands().await?;
//! ```

pub mod api;
pub mod client;
pub mod error;
pub mod protocol;

use std::time::Duration;

pub use api::{AuthApi, CatalogApi, Credentials, UploadApi, UserApi};
pub use client::{ClientConfig, HttpClient, ReadScope};
pub use error::{Error, Result};
pub use protocol::{LoginRequest, LoginResponse, UploadedFile};

/// Default service root
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080/api";

/// Default per-request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
