//! Ingress reconciler
//!
//! One reconcile per key: fetch the Ingress, let the translator realize its
//! Routes on a private copy, and persist the copy's status only when it
//! differs from what was fetched. Status writes are always based on a fresh
//! read of the Ingress, and a conflicting write fails the whole reconcile so
//! the next attempt recomputes from newer state.

use crate::apis::ingress::store::IngressStore;
use crate::apis::ingress::translator::IngressTranslator;
use crate::apis::metrics::{record_ingress_reconciliation, record_status_update};
use crate::config::RequeueConfig;
use crate::error::Error;
use common::{status_semantically_equal, Ingress, IngressKey, Route};
use futures::StreamExt;
use kube::api::Api;
use kube::runtime::controller::{Action, Controller};
use kube::runtime::watcher::Config as WatcherConfig;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// What happened to the status during a reconcile
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusWrite {
    /// The Ingress no longer exists
    NotAttempted,
    /// Computed status matched the fetched status
    Skipped,
    /// The freshly re-read Ingress already carried the computed status
    AlreadyCurrent,
    Written,
}

/// Result of a reconcile that did not fail.
///
/// A successful reconcile never asks to be run again; Route changes come
/// back through the owner watch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub status: StatusWrite,
}

/// Ingress reconciler
pub struct IngressReconciler<S, T> {
    store: S,
    translator: T,
    requeue: RequeueConfig,
}

impl<S, T> IngressReconciler<S, T>
where
    S: IngressStore,
    T: IngressTranslator,
{
    pub fn new(store: S, translator: T, requeue: RequeueConfig) -> Self {
        Self {
            store,
            translator,
            requeue,
        }
    }

    /// Reconcile the Ingress identified by `key`.
    ///
    /// Safe to call any number of times for the same key: a run that computes
    /// the status already stored performs no write.
    pub async fn reconcile(&self, key: &IngressKey) -> Result<ReconcileOutcome, Error> {
        let start = Instant::now();
        let result = self.reconcile_key(key).await;

        let label = match &result {
            Ok(outcome) if outcome.status == StatusWrite::NotAttempted => "deleted",
            Ok(_) => "success",
            Err(e) if e.is_conflict() => "conflict",
            Err(_) => "error",
        };
        record_ingress_reconciliation(&key.namespace, start.elapsed().as_secs_f64(), label);

        result
    }

    async fn reconcile_key(&self, key: &IngressKey) -> Result<ReconcileOutcome, Error> {
        let original = match self.store.get(key).await {
            Ok(ingress) => ingress,
            Err(e) if e.is_not_found() => {
                // Deleted after the key was queued; owned Routes are garbage
                // collected by the API server.
                debug!(ingress = %key, "Ingress no longer exists");
                return Ok(ReconcileOutcome {
                    status: StatusWrite::NotAttempted,
                });
            }
            Err(e) => return Err(e),
        };

        info!(ingress = %key, "Reconciling Ingress");

        // Never mutate the fetched object
        let mut ingress = original.clone();
        let translated = self.translator.reconcile_ingress(&mut ingress).await;

        // A failed translation still persists the status it produced so the
        // failure is visible on the Ingress.
        let status_write =
            if status_semantically_equal(original.status.as_ref(), ingress.status.as_ref()) {
                // The fetched copy may be stale; writing an unchanged status
                // could overwrite a newer one.
                record_status_update("skipped");
                StatusWrite::Skipped
            } else {
                match self.update_status(&ingress).await {
                    Ok((_, write)) => write,
                    Err(e) => {
                        if e.is_conflict() {
                            info!(ingress = %key, error = %e, "Ingress status write conflicted");
                            record_status_update("conflict");
                        } else {
                            warn!(ingress = %key, error = %e, "Failed to update Ingress status");
                            record_status_update("error");
                        }
                        return Err(match translated {
                            Err(translation_error) => translation_error,
                            Ok(()) => e,
                        });
                    }
                }
            };

        translated?;
        Ok(ReconcileOutcome {
            status: status_write,
        })
    }

    /// Persist the status of `desired` on top of the latest stored Ingress.
    ///
    /// Only the status is taken from `desired`; the write is based on a fresh
    /// read so a concurrent spec or metadata change is never overwritten.
    pub async fn update_status(&self, desired: &Ingress) -> Result<(Ingress, StatusWrite), Error> {
        let key = IngressKey::from_resource(desired);
        let latest = self.store.get(&key).await?;

        if status_semantically_equal(latest.status.as_ref(), desired.status.as_ref()) {
            debug!(ingress = %key, "Ingress status already current");
            record_status_update("current");
            return Ok((latest, StatusWrite::AlreadyCurrent));
        }

        let mut existing = latest.clone();
        existing.status = desired.status.clone();
        let updated = self.store.update_status(&existing).await?;

        info!(
            ingress = %key,
            ready = updated.status.as_ref().map(|s| s.is_ready()).unwrap_or(false),
            "Updated Ingress status"
        );
        record_status_update("written");
        Ok((updated, StatusWrite::Written))
    }
}

impl<S, T> IngressReconciler<S, T>
where
    S: IngressStore + 'static,
    T: IngressTranslator + 'static,
{
    async fn reconcile_object(ingress: Arc<Ingress>, ctx: Arc<Self>) -> Result<Action, Error> {
        // The cached object only identifies the key; the reconcile reads fresh.
        let key = IngressKey::from_resource(ingress.as_ref());
        ctx.reconcile(&key).await?;
        Ok(Action::await_change())
    }

    /// Error handler for controller
    fn error_policy(ingress: Arc<Ingress>, error: &Error, ctx: Arc<Self>) -> Action {
        let key = IngressKey::from_resource(ingress.as_ref());
        if error.is_conflict() {
            debug!(ingress = %key, "Requeueing after status conflict");
            Action::requeue(ctx.requeue.conflict_delay())
        } else {
            if error.is_retryable() {
                warn!(ingress = %key, error = %error, "Ingress reconciliation failed");
            } else {
                error!(ingress = %key, error = %error, "Ingress reconciliation failed permanently");
            }
            Action::requeue(ctx.requeue.error_delay())
        }
    }

    /// Run the controller: Ingress changes enqueue their own key, Route
    /// changes enqueue the key of their controlling Ingress.
    pub async fn run(self, ingresses: Api<Ingress>, routes: Api<Route>) {
        let ctx = Arc::new(self);

        info!("Starting Ingress controller");

        Controller::new(ingresses, WatcherConfig::default())
            .owns(routes, WatcherConfig::default())
            .shutdown_on_signal()
            .run(Self::reconcile_object, Self::error_policy, ctx)
            .for_each(|res| async move {
                match res {
                    Ok((obj, _)) => debug!("Reconciled Ingress: {}", obj),
                    Err(e) => debug!("Reconciliation error: {:?}", e),
                }
            })
            .await;

        info!("Ingress controller stopped");
    }
}
