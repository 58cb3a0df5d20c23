//! # Camunda Core
//!
//! Building blocks shared by the Camunda 8 client libraries.
//!
//! ## Modules
//!
//! - [`codec`] - Lossless JSON codec: exact numeric literals, field directives,
//!   schema factories for job and process-instance envelopes
//! - [`auth`] - Authentication providers, OAuth token caching and renewal
//! - [`config`] - OAuth configuration and auth strategy selection
//! - [`error`] - Core error types

pub mod auth;
pub mod codec;
pub mod config;
pub mod error;

pub use auth::{
    build_auth_provider, Audience, AuthProvider, BasicAuthProvider, FileTokenStore,
    MemoryTokenStore, NullAuthProvider, OAuthProvider, Token, TokenStore,
};
pub use codec::{FieldDirective, LosslessDto, LosslessNumber, Schema, SchemaRef};
pub use config::{AudienceConfig, AuthStrategy, OAuthConfig};
pub use error::{CoreError, CoreResult, TokenEndpointError};
