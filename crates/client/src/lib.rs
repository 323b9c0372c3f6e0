//! `client` crate — authenticated access to the Feishu Project open API.
//!
//! Provides the credential/token layer and the generic request helper that
//! every operation handler goes through. No operation-specific logic lives here.

pub mod client;
pub mod credentials;
pub mod error;
pub mod request;
pub mod token;

pub use client::{ProjectClient, Requester};
pub use credentials::{Credentials, TokenType};
pub use error::ClientError;
pub use request::{FilePart, FormData, RawResponse, RequestOptions, DEFAULT_MIME_TYPE};

pub use reqwest::Method;
