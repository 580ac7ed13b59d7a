//! Ingress → Route translation
//!
//! The base reconciler: realizes an Ingress as one OpenShift Route per
//! externally visible host, all pointing at the ingress gateway service, and
//! records the result in the Ingress' in-memory status.

use crate::config::GatewayConfig;
use crate::error::{map_kube_error, Error};
use async_trait::async_trait;
use common::condition::{
    CONDITION_LOAD_BALANCER_READY, CONDITION_NETWORK_CONFIGURED, CONDITION_READY,
};
use common::{
    Condition, ConditionStatus, Ingress, IngressKey, IngressStatus, IngressVisibility,
    LoadBalancerIngressStatus, LoadBalancerStatus, Route, RoutePort, RouteSpec,
    RouteTargetReference, TlsConfig, DEFAULT_NAMESPACE, INGRESS_NAMESPACE_LABEL,
    INGRESS_NAME_LABEL,
};
use kube::api::{Api, DeleteParams, ListParams, Patch, PatchParams};
use kube::{Client, Resource, ResourceExt};
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info, warn};

const REASON_ROUTE_CREATION_FAILED: &str = "RouteCreationFailed";
const REASON_ROUTE_DELETION_FAILED: &str = "RouteDeletionFailed";
const REASON_ROUTE_NOT_ADMITTED: &str = "RouteNotAdmitted";
const REASON_ROUTE_REJECTED: &str = "RouteRejected";

/// Computes and applies the dependents of an Ingress.
///
/// Implementations mutate `ingress.status` in place to reflect what they
/// observed, including on failure, then report success or the failure.
#[async_trait]
pub trait IngressTranslator: Send + Sync {
    async fn reconcile_ingress(&self, ingress: &mut Ingress) -> Result<(), Error>;
}

/// Route persistence used by `RouteTranslator`
#[async_trait]
pub trait RouteClient: Send + Sync {
    /// Create or update a Route, returning the persisted object
    async fn apply(&self, route: &Route) -> Result<Route, Error>;

    /// Routes labelled as generated for `owner`
    async fn list_owned(&self, owner: &IngressKey) -> Result<Vec<Route>, Error>;

    /// Delete a Route. Deleting a missing Route succeeds.
    async fn delete(&self, namespace: &str, name: &str) -> Result<(), Error>;
}

/// `RouteClient` backed by the Kubernetes API, applying with server-side apply
pub struct KubeRouteClient {
    client: Client,
    field_manager: String,
}

impl KubeRouteClient {
    pub fn new(client: Client, field_manager: impl Into<String>) -> Self {
        Self {
            client,
            field_manager: field_manager.into(),
        }
    }

    fn api(&self, namespace: &str) -> Api<Route> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

#[async_trait]
impl RouteClient for KubeRouteClient {
    async fn apply(&self, route: &Route) -> Result<Route, Error> {
        let namespace = route
            .namespace()
            .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string());
        let name = route.name_any();

        self.api(&namespace)
            .patch(
                &name,
                &PatchParams::apply(&self.field_manager).force(),
                &Patch::Apply(route),
            )
            .await
            .map_err(|e| map_kube_error(e, "Route", format!("{}/{}", namespace, name)))
    }

    async fn list_owned(&self, owner: &IngressKey) -> Result<Vec<Route>, Error> {
        let selector = format!(
            "{}={},{}={}",
            INGRESS_NAME_LABEL, owner.name, INGRESS_NAMESPACE_LABEL, owner.namespace
        );
        let list = self
            .api(&owner.namespace)
            .list(&ListParams::default().labels(&selector))
            .await?;
        Ok(list.items)
    }

    async fn delete(&self, namespace: &str, name: &str) -> Result<(), Error> {
        match self.api(namespace).delete(name, &DeleteParams::default()).await {
            Ok(_) => Ok(()),
            Err(e) => match map_kube_error(e, "Route", format!("{}/{}", namespace, name)) {
                err if err.is_not_found() => Ok(()),
                err => Err(err),
            },
        }
    }
}

/// Hosts only reachable from inside the cluster never get a Route
fn is_cluster_local(host: &str) -> bool {
    host.ends_with(".svc.cluster.local") || host.ends_with(".svc") || !host.contains('.')
}

/// Name of the n-th Route generated for an Ingress
pub fn route_name(ingress_name: &str, index: usize) -> String {
    if index == 0 {
        format!("{}-route", ingress_name)
    } else {
        format!("{}-route-{}", ingress_name, index)
    }
}

/// Compute the Routes an Ingress needs.
///
/// Pure: the same Ingress always yields the same Routes, in the same order.
pub fn desired_routes(ingress: &Ingress, gateway: &GatewayConfig) -> Result<Vec<Route>, Error> {
    let key = IngressKey::from_resource(ingress);
    let owner = ingress.controller_owner_ref(&()).ok_or_else(|| {
        Error::translation(format!("Ingress {} has no uid, cannot own Routes", key))
    })?;

    let tls_hosts: HashSet<&str> = ingress
        .spec
        .tls
        .iter()
        .flat_map(|t| t.hosts.iter().map(String::as_str))
        .collect();

    if ingress.spec.visibility == Some(IngressVisibility::ClusterLocal) {
        return Ok(Vec::new());
    }

    let mut seen = HashSet::new();
    let mut routes = Vec::new();

    for rule in &ingress.spec.rules {
        if rule.visibility == IngressVisibility::ClusterLocal {
            continue;
        }
        for host in &rule.hosts {
            if is_cluster_local(host) || !seen.insert(host.as_str()) {
                continue;
            }

            let mut route = Route::new(
                &route_name(&key.name, routes.len()),
                RouteSpec {
                    host: host.clone(),
                    path: None,
                    to: RouteTargetReference {
                        kind: "Service".to_string(),
                        name: gateway.service_name.clone(),
                        weight: Some(100),
                    },
                    port: Some(RoutePort {
                        target_port: gateway.target_port.clone(),
                    }),
                    tls: tls_hosts.contains(host.as_str()).then(|| TlsConfig {
                        termination: "edge".to_string(),
                        insecure_edge_termination_policy: Some("Redirect".to_string()),
                    }),
                    wildcard_policy: Some("None".to_string()),
                },
            );
            route.metadata.namespace = Some(key.namespace.clone());
            route.metadata.labels = Some(BTreeMap::from([
                (INGRESS_NAME_LABEL.to_string(), key.name.clone()),
                (INGRESS_NAMESPACE_LABEL.to_string(), key.namespace.clone()),
            ]));
            route.metadata.owner_references = Some(vec![owner.clone()]);
            routes.push(route);
        }
    }

    Ok(routes)
}

/// Whether `route` is controlled by `ingress`
fn is_controlled_by(route: &Route, ingress: &Ingress) -> bool {
    let uid = ingress.metadata.uid.as_deref();
    route
        .owner_references()
        .iter()
        .any(|o| o.controller == Some(true) && o.kind == "Ingress" && Some(o.uid.as_str()) == uid)
}

/// The base reconciler turning Ingresses into Routes
pub struct RouteTranslator<C> {
    routes: C,
    gateway: GatewayConfig,
}

impl<C: RouteClient> RouteTranslator<C> {
    pub fn new(routes: C, gateway: GatewayConfig) -> Self {
        Self { routes, gateway }
    }

    /// Delete generated Routes that are no longer desired
    async fn prune(&self, ingress: &Ingress, desired: &[Route]) -> Result<usize, Error> {
        let key = IngressKey::from_resource(ingress);
        let keep: HashSet<String> = desired.iter().map(ResourceExt::name_any).collect();
        let mut removed = 0;

        for route in self.routes.list_owned(&key).await? {
            let name = route.name_any();
            if keep.contains(&name) || !is_controlled_by(&route, ingress) {
                continue;
            }
            info!(ingress = %key, route = %name, "Deleting stale Route");
            self.routes.delete(&key.namespace, &name).await?;
            removed += 1;
        }

        Ok(removed)
    }

    /// Nothing is advertised while the Routes are in an unknown state
    fn mark_failed(status: &mut IngressStatus, reason: &str, message: String) {
        for type_ in [
            CONDITION_NETWORK_CONFIGURED,
            CONDITION_LOAD_BALANCER_READY,
            CONDITION_READY,
        ] {
            status.set_condition(Condition::new(
                type_,
                ConditionStatus::False,
                reason,
                message.clone(),
            ));
        }
        status.load_balancer = None;
    }

    fn mark_applied(&self, status: &mut IngressStatus, applied: &[Route]) {
        status.set_condition(Condition::new(
            CONDITION_NETWORK_CONFIGURED,
            ConditionStatus::True,
            "",
            "",
        ));

        let rejected = applied
            .iter()
            .find_map(|r| r.rejection().map(|msg| (r.name_any(), msg)));
        let pending = applied.iter().find(|r| !r.is_admitted());

        let lb_ready = match (rejected, pending) {
            (Some((name, msg)), _) => Condition::new(
                CONDITION_LOAD_BALANCER_READY,
                ConditionStatus::False,
                REASON_ROUTE_REJECTED,
                format!("Route {} was rejected: {}", name, msg),
            ),
            (None, Some(route)) => Condition::new(
                CONDITION_LOAD_BALANCER_READY,
                ConditionStatus::Unknown,
                REASON_ROUTE_NOT_ADMITTED,
                format!("Waiting for Route {} to be admitted", route.name_any()),
            ),
            (None, None) => Condition::new(
                CONDITION_LOAD_BALANCER_READY,
                ConditionStatus::True,
                "",
                "",
            ),
        };

        let ready = Condition::new(
            CONDITION_READY,
            lb_ready.status,
            lb_ready.reason.clone(),
            lb_ready.message.clone(),
        );

        status.load_balancer = lb_ready.is_true().then(|| LoadBalancerStatus {
            ingress: vec![LoadBalancerIngressStatus {
                domain_internal: Some(self.gateway.internal_domain()),
                ..Default::default()
            }],
        });
        status.set_condition(lb_ready);
        status.set_condition(ready);
    }
}

#[async_trait]
impl<C: RouteClient> IngressTranslator for RouteTranslator<C> {
    async fn reconcile_ingress(&self, ingress: &mut Ingress) -> Result<(), Error> {
        let key = IngressKey::from_resource(ingress);
        let generation = ingress.metadata.generation;

        let outcome = self.apply_routes(ingress).await;

        let status = ingress.status.get_or_insert_with(IngressStatus::default);
        status.observed_generation = generation;

        match outcome {
            Ok(applied) => {
                debug!(ingress = %key, routes = applied.len(), "Routes applied");
                self.mark_applied(status, &applied);
                Ok(())
            }
            Err((reason, e)) => {
                warn!(ingress = %key, reason, error = %e, "Failed to reconcile Routes");
                Self::mark_failed(status, reason, e.to_string());
                Err(Error::translation(format!(
                    "failed to reconcile routes for {}: {}",
                    key, e
                )))
            }
        }
    }
}

impl<C: RouteClient> RouteTranslator<C> {
    /// Apply every desired Route, then prune. A failure carries the
    /// condition reason naming the step that failed.
    async fn apply_routes(&self, ingress: &Ingress) -> Result<Vec<Route>, (&'static str, Error)> {
        let creation_failed = |e: Error| (REASON_ROUTE_CREATION_FAILED, e);
        let desired = desired_routes(ingress, &self.gateway).map_err(creation_failed)?;

        let mut applied = Vec::with_capacity(desired.len());
        for route in &desired {
            applied.push(self.routes.apply(route).await.map_err(creation_failed)?);
        }

        self.prune(ingress, &desired)
            .await
            .map_err(|e| (REASON_ROUTE_DELETION_FAILED, e))?;
        Ok(applied)
    }
}
