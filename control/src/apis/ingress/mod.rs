//! Knative Ingress support
//!
//! Reconciles `networking.internal.knative.dev` Ingresses into OpenShift Routes:
//! - store: versioned reads and status-only writes of Ingresses
//! - translator: Route generation and status computation
//! - controller: the reconcile loop and its watch wiring

pub mod controller;
pub mod store;
#[cfg(test)]
pub(crate) mod testing;
pub mod translator;

pub use controller::{IngressReconciler, ReconcileOutcome, StatusWrite};
pub use store::{IngressStore, KubeIngressStore};
pub use translator::{IngressTranslator, KubeRouteClient, RouteClient, RouteTranslator};
