//! Knative networking Ingress
//!
//! The intent object. `spec` is authored by the owner and never written by
//! the controller; `status` is written by the controller only.

use crate::condition::{Condition, CONDITION_READY};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Desired routing configuration
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "networking.internal.knative.dev",
    version = "v1alpha1",
    kind = "Ingress",
    namespaced,
    status = "IngressStatus",
    shortname = "kingress",
    derive = "PartialEq"
)]
#[serde(rename_all = "camelCase")]
pub struct IngressSpec {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<IngressRule>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tls: Vec<IngressTls>,

    /// Ingress-wide visibility. `ClusterLocal` here overrides every rule.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<IngressVisibility>,
}

/// Where an Ingress rule is reachable from
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum IngressVisibility {
    #[default]
    ExternalIP,
    ClusterLocal,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IngressRule {
    #[serde(default)]
    pub hosts: Vec<String>,

    #[serde(default)]
    pub visibility: IngressVisibility,

    #[serde(default)]
    pub http: HttpIngressRuleValue,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct HttpIngressRuleValue {
    #[serde(default)]
    pub paths: Vec<HttpIngressPath>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HttpIngressPath {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    #[serde(default)]
    pub splits: Vec<IngressBackendSplit>,
}

/// Weighted backend of a path
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IngressBackendSplit {
    pub service_namespace: String,
    pub service_name: String,
    pub service_port: i32,
    #[serde(default = "default_percent")]
    pub percent: i32,
}

fn default_percent() -> i32 {
    100
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IngressTls {
    #[serde(default)]
    pub hosts: Vec<String>,
    pub secret_name: String,
    pub secret_namespace: String,
}

/// Observed condition of an Ingress
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IngressStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load_balancer: Option<LoadBalancerStatus>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct LoadBalancerStatus {
    #[serde(default)]
    pub ingress: Vec<LoadBalancerIngressStatus>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "camelCase")]
pub struct LoadBalancerIngressStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain_internal: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,

    #[serde(default)]
    pub mesh_only: bool,
}

impl IngressStatus {
    pub fn condition(&self, type_: &str) -> Option<&Condition> {
        self.conditions.iter().find(|c| c.type_ == type_)
    }

    /// Set a condition, replacing any condition of the same type.
    ///
    /// An existing condition in the same state is left untouched, so its
    /// transition time survives repeated reconciles.
    pub fn set_condition(&mut self, condition: Condition) {
        match self
            .conditions
            .iter_mut()
            .find(|c| c.type_ == condition.type_)
        {
            Some(existing) if existing.same_state(&condition) => {}
            Some(existing) => *existing = condition,
            None => self.conditions.push(condition),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.condition(CONDITION_READY)
            .map(Condition::is_true)
            .unwrap_or(false)
    }

    /// Structural equality that ignores the order of conditions and of
    /// load balancer entries. Condition transition times are not compared.
    pub fn semantically_equals(&self, other: &IngressStatus) -> bool {
        if self.observed_generation != other.observed_generation {
            return false;
        }
        if self.conditions.len() != other.conditions.len() {
            return false;
        }
        let mut ours: Vec<&Condition> = self.conditions.iter().collect();
        let mut theirs: Vec<&Condition> = other.conditions.iter().collect();
        ours.sort_by(|a, b| a.type_.cmp(&b.type_));
        theirs.sort_by(|a, b| a.type_.cmp(&b.type_));
        if !ours.iter().zip(&theirs).all(|(a, b)| a.same_state(b)) {
            return false;
        }
        sorted_lb_entries(self.load_balancer.as_ref())
            == sorted_lb_entries(other.load_balancer.as_ref())
    }
}

fn sorted_lb_entries(lb: Option<&LoadBalancerStatus>) -> Vec<&LoadBalancerIngressStatus> {
    let mut entries: Vec<_> = lb.map(|lb| lb.ingress.iter().collect()).unwrap_or_default();
    entries.sort();
    entries
}

/// Compare two optional statuses. A missing status equals an empty one.
pub fn status_semantically_equal(a: Option<&IngressStatus>, b: Option<&IngressStatus>) -> bool {
    let empty = IngressStatus::default();
    a.unwrap_or(&empty).semantically_equals(b.unwrap_or(&empty))
}
