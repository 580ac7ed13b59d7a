//! Ingress object store
//!
//! The reconciler only reads Ingresses and writes their status subresource.
//! Writes carry the resourceVersion of the object they were based on, so the
//! API server rejects any write built from a stale read with 409 Conflict.

use crate::error::{map_kube_error, Error};
use async_trait::async_trait;
use common::{Ingress, IngressKey};
use kube::api::{Api, PostParams};
use kube::{Client, ResourceExt};

#[cfg(test)]
use mockall::automock;

const KIND: &str = "Ingress";

/// Versioned Ingress store with status-only writes
#[cfg_attr(test, automock)]
#[async_trait]
pub trait IngressStore: Send + Sync {
    /// Fetch the latest persisted Ingress.
    ///
    /// Returns `Error::NotFound` when the Ingress does not exist.
    async fn get(&self, key: &IngressKey) -> Result<Ingress, Error>;

    /// Persist only the status of `ingress`.
    ///
    /// The write is checked against `ingress.metadata.resource_version` and
    /// fails with `Error::Conflict` when the stored object has moved on.
    /// Spec and metadata on the server are left as they are.
    async fn update_status(&self, ingress: &Ingress) -> Result<Ingress, Error>;
}

/// `IngressStore` backed by the Kubernetes API
pub struct KubeIngressStore {
    client: Client,
}

impl KubeIngressStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api(&self, namespace: &str) -> Api<Ingress> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

#[async_trait]
impl IngressStore for KubeIngressStore {
    async fn get(&self, key: &IngressKey) -> Result<Ingress, Error> {
        self.api(&key.namespace)
            .get(&key.name)
            .await
            .map_err(|e| map_kube_error(e, KIND, key))
    }

    async fn update_status(&self, ingress: &Ingress) -> Result<Ingress, Error> {
        let key = IngressKey::from_resource(ingress);
        let data = serde_json::to_vec(ingress)?;

        self.api(&key.namespace)
            .replace_status(&ingress.name_any(), &PostParams::default(), data)
            .await
            .map_err(|e| map_kube_error(e, KIND, &key))
    }
}
