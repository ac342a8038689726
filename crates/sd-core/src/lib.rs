//! sd-core: Core types, errors and configuration for syno-deploy
//!
//! This crate provides the error taxonomy, the remote endpoint description
//! and the client configuration shared by the channel, compose, deploy and
//! CLI crates.

pub mod config;
pub mod endpoint;
pub mod error;

pub use endpoint::{CredentialRef, RemoteEndpoint};
pub use error::SdError;
