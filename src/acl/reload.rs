//! Hot-reloadable handle to the active policy.
//!
//! Holds the [`RoleAclStore`] behind an `ArcSwap`. Authorization calls take a
//! single atomic load and evaluate against that snapshot, so a concurrent
//! reload never shows a caller half of one store and half of another. A
//! reload builds the replacement completely before swapping it in; if the
//! build fails the current store stays in effect. Reloads run one at a time
//! under a writer mutex that readers never touch.

use std::fmt;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use arc_swap::ArcSwap;
use tracing::{info, warn};

use super::authorizer::{AuthorizationDecision, MetricAuthorizer};
use super::principal::RoleSet;
use super::store::RoleAclStore;
use super::{load_policy_file, load_policy_str};
use crate::errors::PolicyError;

#[derive(Clone)]
pub struct PolicyHandle {
    current: Arc<ArcSwap<RoleAclStore>>,
    writer: Arc<Mutex<()>>,
}

impl PolicyHandle {
    pub fn new(store: RoleAclStore) -> Self {
        Self {
            current: Arc::new(ArcSwap::from_pointee(store)),
            writer: Arc::new(Mutex::new(())),
        }
    }

    /// Load the initial policy from a file. Fails instead of starting with an
    /// empty or partial policy.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, PolicyError> {
        let path = path.as_ref();
        let store = load_policy_file(path)?;
        let summary = store.summary();
        info!(
            path = %path.display(),
            digest = %summary.digest,
            roles = summary.roles,
            exact_rules = summary.exact_rules,
            pattern_rules = summary.pattern_rules,
            "policy loaded"
        );
        Ok(Self::new(store))
    }

    /// Current store. Callers holding the returned `Arc` keep using it even if
    /// a reload happens meanwhile.
    pub fn snapshot(&self) -> Arc<RoleAclStore> {
        self.current.load_full()
    }

    /// Publish an already compiled store.
    pub fn install(&self, store: RoleAclStore) -> Arc<RoleAclStore> {
        let _writer = self.lock_writer();
        self.publish(store)
    }

    fn publish(&self, store: RoleAclStore) -> Arc<RoleAclStore> {
        let store = Arc::new(store);
        self.current.store(Arc::clone(&store));
        store
    }

    // The guarded state is `()`, so a poisoned lock carries nothing stale.
    fn lock_writer(&self) -> MutexGuard<'_, ()> {
        self.writer.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn reload_from_path(&self, path: impl AsRef<Path>) -> Result<Arc<RoleAclStore>, PolicyError> {
        let path = path.as_ref();
        self.reload_with(&path.display().to_string(), || load_policy_file(path))
    }

    pub fn reload_from_str(&self, text: &str) -> Result<Arc<RoleAclStore>, PolicyError> {
        self.reload_with("inline document", || load_policy_str(text))
    }

    fn reload_with<F>(&self, origin: &str, load: F) -> Result<Arc<RoleAclStore>, PolicyError>
    where
        F: FnOnce() -> Result<RoleAclStore, PolicyError>,
    {
        let _writer = self.lock_writer();
        let previous = self.current.load().digest().to_string();

        match load() {
            Ok(store) => {
                let store = self.publish(store);
                let summary = store.summary();
                info!(
                    origin = %origin,
                    previous = %previous,
                    digest = %summary.digest,
                    roles = summary.roles,
                    exact_rules = summary.exact_rules,
                    pattern_rules = summary.pattern_rules,
                    "policy reloaded"
                );
                Ok(store)
            }
            Err(err) => {
                warn!(
                    origin = %origin,
                    digest = %previous,
                    error = %err,
                    "policy reload rejected, keeping current policy"
                );
                Err(err)
            }
        }
    }
}

impl MetricAuthorizer for PolicyHandle {
    fn authorize(&self, roles: &RoleSet, metric: &str) -> AuthorizationDecision {
        self.current.load().authorize(roles, metric)
    }
}

impl fmt::Debug for PolicyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PolicyHandle")
            .field("digest", &self.current.load().digest())
            .finish()
    }
}
