//! HTTP dispatcher that delivers queued mutations to the field-service API.

pub mod client;
pub mod error;

pub use client::{CredentialSource, HttpDispatcher, StaticCredentials, COMPANY_ID_HEADER};
pub use error::{ApiRetryClass, RemoteError, Result};
