//! Shared types and clients for talking to the S³I platform.
//!
//! * [`objects`] holds the wire format: identifiers, broker messages and
//!   events, identity provider responses.
//! * [`config`] holds the validated runtime configuration.
//! * [`client`] (feature `client`) holds the Keycloak authenticator and the
//!   broker client.

#![forbid(unsafe_code)]

pub mod config;
pub mod objects;

#[cfg(feature = "client")]
pub mod client;
