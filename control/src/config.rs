//! Configuration for the route controller
//!
//! Defaults are usable as-is; environment variables override them.

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

/// Controller configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ControllerConfig {
    /// Field manager used for server-side apply of Routes
    #[serde(default = "default_controller_name")]
    pub controller_name: String,

    /// Namespace to watch (None = all namespaces)
    pub watch_namespace: Option<String>,

    /// Ingress gateway that generated Routes point at
    #[serde(default)]
    pub gateway: GatewayConfig,

    #[serde(default)]
    pub requeue: RequeueConfig,

    /// Bind address for the /metrics and /healthz endpoint
    #[serde(default = "default_metrics_bind_addr")]
    pub metrics_bind_addr: String,

    /// "text" or "json"
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

/// Ingress gateway service configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GatewayConfig {
    #[serde(default = "default_gateway_service_name")]
    pub service_name: String,

    #[serde(default = "default_gateway_service_namespace")]
    pub service_namespace: String,

    /// Port name on the gateway service (default: http2)
    #[serde(default = "default_gateway_target_port")]
    pub target_port: String,
}

impl GatewayConfig {
    /// Cluster-local DNS name of the gateway service
    pub fn internal_domain(&self) -> String {
        format!(
            "{}.{}.svc.cluster.local",
            self.service_name, self.service_namespace
        )
    }
}

fn default_gateway_service_name() -> String {
    "istio-ingressgateway".to_string()
}

fn default_gateway_service_namespace() -> String {
    "istio-system".to_string()
}

fn default_gateway_target_port() -> String {
    "http2".to_string()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            service_name: default_gateway_service_name(),
            service_namespace: default_gateway_service_namespace(),
            target_port: default_gateway_target_port(),
        }
    }
}

/// Requeue delays handed to the controller runtime after a failed reconcile
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RequeueConfig {
    /// Delay after a failed reconcile (default: 60s)
    #[serde(default = "default_error_requeue")]
    pub error_requeue_secs: u64,

    /// Delay after a status write conflict (default: 1s)
    #[serde(default = "default_conflict_requeue")]
    pub conflict_requeue_secs: u64,
}

fn default_error_requeue() -> u64 {
    60
}

fn default_conflict_requeue() -> u64 {
    1
}

impl Default for RequeueConfig {
    fn default() -> Self {
        Self {
            error_requeue_secs: default_error_requeue(),
            conflict_requeue_secs: default_conflict_requeue(),
        }
    }
}

impl RequeueConfig {
    pub fn error_delay(&self) -> Duration {
        Duration::from_secs(self.error_requeue_secs)
    }

    pub fn conflict_delay(&self) -> Duration {
        Duration::from_secs(self.conflict_requeue_secs)
    }
}

fn default_controller_name() -> String {
    "knative-openshift-ingress".to_string()
}

fn default_metrics_bind_addr() -> String {
    "0.0.0.0:9090".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            controller_name: default_controller_name(),
            watch_namespace: None,
            gateway: GatewayConfig::default(),
            requeue: RequeueConfig::default(),
            metrics_bind_addr: default_metrics_bind_addr(),
            log_format: default_log_format(),
        }
    }
}

impl ControllerConfig {
    /// Load configuration from `ROUTE_CONTROLLER_*` environment variables
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, Error> {
        let mut config = Self::default();

        if let Some(val) = lookup("ROUTE_CONTROLLER_NAME") {
            config.controller_name = val;
        }
        if let Some(val) = lookup("ROUTE_CONTROLLER_WATCH_NAMESPACE") {
            if !val.is_empty() {
                config.watch_namespace = Some(val);
            }
        }
        if let Some(val) = lookup("ROUTE_CONTROLLER_GATEWAY_SERVICE") {
            config.gateway.service_name = val;
        }
        if let Some(val) = lookup("ROUTE_CONTROLLER_GATEWAY_NAMESPACE") {
            config.gateway.service_namespace = val;
        }
        if let Some(val) = lookup("ROUTE_CONTROLLER_GATEWAY_PORT") {
            config.gateway.target_port = val;
        }
        if let Some(val) = lookup("ROUTE_CONTROLLER_ERROR_REQUEUE_SECS") {
            config.requeue.error_requeue_secs =
                parse_secs("ROUTE_CONTROLLER_ERROR_REQUEUE_SECS", &val)?;
        }
        if let Some(val) = lookup("ROUTE_CONTROLLER_CONFLICT_REQUEUE_SECS") {
            config.requeue.conflict_requeue_secs =
                parse_secs("ROUTE_CONTROLLER_CONFLICT_REQUEUE_SECS", &val)?;
        }
        if let Some(val) = lookup("ROUTE_CONTROLLER_METRICS_ADDR") {
            config.metrics_bind_addr = val;
        }
        if let Some(val) = lookup("ROUTE_CONTROLLER_LOG_FORMAT") {
            match val.as_str() {
                "text" | "json" => config.log_format = val,
                other => {
                    return Err(Error::Config(format!(
                        "ROUTE_CONTROLLER_LOG_FORMAT must be 'text' or 'json', got '{}'",
                        other
                    )))
                }
            }
        }

        Ok(config)
    }
}

fn parse_secs(name: &str, val: &str) -> Result<u64, Error> {
    val.parse::<u64>()
        .map_err(|e| Error::Config(format!("{} must be a number of seconds: {}", name, e)))
}
