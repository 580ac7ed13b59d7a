//! Route controller common types
//!
//! Resource types shared by the controller and its tests:
//! - `Ingress`: the Knative networking intent object (spec + status)
//! - `Route`: the OpenShift route derived from an Ingress
//! - `IngressKey`: the (namespace, name) identity a reconcile is keyed on

use kube::{Resource, ResourceExt};
use std::fmt;

pub mod condition;
pub mod ingress;
pub mod route;

pub use condition::{Condition, ConditionStatus};
pub use ingress::{
    status_semantically_equal, HttpIngressPath, HttpIngressRuleValue, Ingress, IngressBackendSplit,
    IngressRule, IngressSpec, IngressStatus, IngressTls, IngressVisibility,
    LoadBalancerIngressStatus, LoadBalancerStatus,
};
pub use route::{
    Route, RouteIngress, RouteIngressCondition, RoutePort, RouteSpec, RouteStatus,
    RouteTargetReference, TlsConfig,
};

/// Label carrying the name of the Ingress that generated a Route
pub const INGRESS_NAME_LABEL: &str = "networking.internal.knative.dev/ingress.name";

/// Label carrying the namespace of the Ingress that generated a Route
pub const INGRESS_NAMESPACE_LABEL: &str = "networking.internal.knative.dev/ingress.namespace";

/// Namespace used for resources that do not carry one
pub const DEFAULT_NAMESPACE: &str = "default";

/// Reconcile key: (namespace, name)
///
/// Carries no payload. Every reconcile keyed on it fetches the object fresh.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IngressKey {
    pub namespace: String,
    pub name: String,
}

impl IngressKey {
    #[inline]
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Build the key of any namespaced resource
    pub fn from_resource<K: Resource>(obj: &K) -> Self {
        Self {
            namespace: obj
                .namespace()
                .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string()),
            name: obj.name_any(),
        }
    }
}

impl fmt::Display for IngressKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}
