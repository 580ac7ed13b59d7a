//! Kubernetes API integrations
//!
//! This module contains the Ingress reconciler and controller metrics.

pub mod ingress;
pub mod metrics;
