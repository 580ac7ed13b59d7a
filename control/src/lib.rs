//! Knative Ingress → OpenShift Route controller
//!
//! Exposes the reconciler, its store and translator seams, configuration and
//! metrics for the binary and for tests.

pub mod apis;
pub mod config;
pub mod error;
pub mod server;

pub use error::Error;
