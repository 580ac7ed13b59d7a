//! In-memory collaborators for reconciler tests

use crate::apis::ingress::store::IngressStore;
use crate::apis::ingress::translator::{IngressTranslator, RouteClient};
use crate::error::Error;
use async_trait::async_trait;
use common::condition::CONDITION_READY;
use common::route::ROUTE_ADMITTED;
use common::{
    Condition, ConditionStatus, Ingress, IngressKey, IngressSpec, IngressStatus, Route,
    RouteIngress, RouteIngressCondition, RouteStatus, DEFAULT_NAMESPACE, INGRESS_NAMESPACE_LABEL,
    INGRESS_NAME_LABEL,
};
use kube::ResourceExt;
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Ingress with a uid and generation, ready to own Routes
pub(crate) fn ingress(namespace: &str, name: &str) -> Ingress {
    let mut ingress = Ingress::new(name, IngressSpec::default());
    ingress.metadata.namespace = Some(namespace.to_string());
    ingress.metadata.uid = Some(format!("uid-{}", name));
    ingress.metadata.generation = Some(1);
    ingress
}

/// Status with only a Ready condition
pub(crate) fn ready_status(status: ConditionStatus) -> IngressStatus {
    IngressStatus {
        conditions: vec![Condition {
            type_: CONDITION_READY.to_string(),
            status,
            ..Default::default()
        }],
        ..Default::default()
    }
}

fn api_error(code: u16, reason: &str, message: &str) -> Error {
    Error::Kube(kube::Error::Api(kube::core::ErrorResponse {
        status: "Failure".to_string(),
        message: message.to_string(),
        reason: reason.to_string(),
        code,
    }))
}

type ExternalWrite = Box<dyn FnOnce(&mut Ingress) + Send>;

#[derive(Default)]
struct StoreState {
    objects: BTreeMap<IngressKey, Ingress>,
    next_version: u64,
    gets: usize,
    status_write_attempts: usize,
    status_writes: usize,
    after_get: VecDeque<ExternalWrite>,
    fail_gets: Option<String>,
}

impl StoreState {
    fn bump(&mut self, ingress: &mut Ingress) {
        self.next_version += 1;
        ingress.metadata.resource_version = Some(self.next_version.to_string());
    }
}

/// Versioned in-memory Ingress store with API server status semantics:
/// status writes are checked against resourceVersion and never touch spec.
#[derive(Default)]
pub(crate) struct MemoryIngressStore {
    state: Mutex<StoreState>,
}

impl MemoryIngressStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with(ingress: Ingress) -> Self {
        let store = Self::new();
        store.insert(ingress);
        store
    }

    pub(crate) fn insert(&self, mut ingress: Ingress) {
        let mut state = self.state.lock().unwrap();
        state.bump(&mut ingress);
        state
            .objects
            .insert(IngressKey::from_resource(&ingress), ingress);
    }

    pub(crate) fn remove(&self, key: &IngressKey) {
        self.state.lock().unwrap().objects.remove(key);
    }

    pub(crate) fn current(&self, key: &IngressKey) -> Option<Ingress> {
        self.state.lock().unwrap().objects.get(key).cloned()
    }

    /// Apply a write by another actor right after the next `get` is served
    pub(crate) fn after_next_get(&self, write: impl FnOnce(&mut Ingress) + Send + 'static) {
        self.state
            .lock()
            .unwrap()
            .after_get
            .push_back(Box::new(write));
    }

    pub(crate) fn fail_gets(&self, message: &str) {
        self.state.lock().unwrap().fail_gets = Some(message.to_string());
    }

    pub(crate) fn gets(&self) -> usize {
        self.state.lock().unwrap().gets
    }

    pub(crate) fn status_write_attempts(&self) -> usize {
        self.state.lock().unwrap().status_write_attempts
    }

    pub(crate) fn status_writes(&self) -> usize {
        self.state.lock().unwrap().status_writes
    }
}

#[async_trait]
impl IngressStore for MemoryIngressStore {
    async fn get(&self, key: &IngressKey) -> Result<Ingress, Error> {
        let mut state = self.state.lock().unwrap();
        state.gets += 1;
        if let Some(message) = &state.fail_gets {
            return Err(api_error(503, "ServiceUnavailable", message));
        }

        let served = state
            .objects
            .get(key)
            .cloned()
            .ok_or_else(|| Error::not_found("Ingress", key))?;

        if let Some(write) = state.after_get.pop_front() {
            let mut stored = served.clone();
            write(&mut stored);
            state.bump(&mut stored);
            state.objects.insert(key.clone(), stored);
        }

        Ok(served)
    }

    async fn update_status(&self, ingress: &Ingress) -> Result<Ingress, Error> {
        let key = IngressKey::from_resource(ingress);
        let mut state = self.state.lock().unwrap();
        state.status_write_attempts += 1;

        let mut stored = state
            .objects
            .get(&key)
            .cloned()
            .ok_or_else(|| Error::not_found("Ingress", &key))?;

        if stored.metadata.resource_version != ingress.metadata.resource_version {
            return Err(Error::conflict(
                &key,
                "the object has been modified; please apply your changes to the latest version",
            ));
        }

        stored.status = ingress.status.clone();
        state.bump(&mut stored);
        state.status_writes += 1;
        state.objects.insert(key, stored.clone());
        Ok(stored)
    }
}

/// Translator driven by a closure, counting invocations
pub(crate) struct FnTranslator<F> {
    f: F,
    calls: AtomicUsize,
}

impl<F> FnTranslator<F>
where
    F: Fn(&mut Ingress) -> Result<(), Error> + Send + Sync,
{
    pub(crate) fn new(f: F) -> Self {
        Self {
            f,
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<F> IngressTranslator for FnTranslator<F>
where
    F: Fn(&mut Ingress) -> Result<(), Error> + Send + Sync,
{
    async fn reconcile_ingress(&self, ingress: &mut Ingress) -> Result<(), Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        (self.f)(ingress)
    }
}

#[derive(Clone, Default)]
enum Admission {
    #[default]
    Pending,
    Admit,
    Reject(String),
}

#[derive(Default)]
struct RouteState {
    routes: BTreeMap<(String, String), Route>,
    admission: Admission,
    apply_error: Option<String>,
    delete_error: Option<String>,
}

/// In-memory `RouteClient` simulating a router's admission
#[derive(Clone, Default)]
pub(crate) struct MemoryRouteClient {
    state: Arc<Mutex<RouteState>>,
}

impl MemoryRouteClient {
    /// Routes are stored but never admitted
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Routes are admitted as soon as they are applied
    pub(crate) fn admitting() -> Self {
        let client = Self::default();
        client.state.lock().unwrap().admission = Admission::Admit;
        client
    }

    /// Routes are rejected with `reason` as soon as they are applied
    pub(crate) fn rejecting(reason: &str) -> Self {
        let client = Self::default();
        client.state.lock().unwrap().admission = Admission::Reject(reason.to_string());
        client
    }

    pub(crate) fn fail_applies(&self, message: &str) {
        self.state.lock().unwrap().apply_error = Some(message.to_string());
    }

    pub(crate) fn fail_deletes(&self, message: &str) {
        self.state.lock().unwrap().delete_error = Some(message.to_string());
    }

    pub(crate) fn route(&self, namespace: &str, name: &str) -> Option<Route> {
        self.state
            .lock()
            .unwrap()
            .routes
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }

    pub(crate) fn route_names(&self, namespace: &str) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .routes
            .keys()
            .filter(|(ns, _)| ns == namespace)
            .map(|(_, name)| name.clone())
            .collect()
    }
}

fn admission_status(host: &str, status: &str, reason: Option<String>) -> RouteStatus {
    RouteStatus {
        ingress: vec![RouteIngress {
            host: host.to_string(),
            router_name: Some("default".to_string()),
            conditions: vec![RouteIngressCondition {
                type_: ROUTE_ADMITTED.to_string(),
                status: status.to_string(),
                reason,
                ..Default::default()
            }],
        }],
    }
}

#[async_trait]
impl RouteClient for MemoryRouteClient {
    async fn apply(&self, route: &Route) -> Result<Route, Error> {
        let mut state = self.state.lock().unwrap();
        if let Some(message) = &state.apply_error {
            return Err(api_error(422, "Invalid", message));
        }

        let mut stored = route.clone();
        stored.status = match &state.admission {
            Admission::Pending => None,
            Admission::Admit => Some(admission_status(&route.spec.host, "True", None)),
            Admission::Reject(reason) => Some(admission_status(
                &route.spec.host,
                "False",
                Some(reason.clone()),
            )),
        };

        let namespace = route
            .namespace()
            .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string());
        state
            .routes
            .insert((namespace, route.name_any()), stored.clone());
        Ok(stored)
    }

    async fn list_owned(&self, owner: &IngressKey) -> Result<Vec<Route>, Error> {
        let state = self.state.lock().unwrap();
        Ok(state
            .routes
            .values()
            .filter(|r| {
                let labels = r.labels();
                labels.get(INGRESS_NAME_LABEL) == Some(&owner.name)
                    && labels.get(INGRESS_NAMESPACE_LABEL) == Some(&owner.namespace)
            })
            .cloned()
            .collect())
    }

    async fn delete(&self, namespace: &str, name: &str) -> Result<(), Error> {
        let mut state = self.state.lock().unwrap();
        if let Some(message) = &state.delete_error {
            return Err(api_error(503, "ServiceUnavailable", message));
        }
        state
            .routes
            .remove(&(namespace.to_string(), name.to_string()));
        Ok(())
    }
}
