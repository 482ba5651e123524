//! Shared service context
//!
//! Holds the store, the optional audit journal, configuration, and the
//! per-customer append locks. Every service borrows one context.

use crate::config::LoyaltyConfig;
use crate::error::{LoyaltyError, LoyaltyResult};
use loyalty_core::{CredentialVerifier, LedgerEvent, PinDigest, PinHasher, PointsPolicy};
use loyalty_persistence::{AuditJournal, Database, LedgerStore, PersistenceResult};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::warn;

/// Idle lock entries are pruned once the map grows past this size
const LOCK_PRUNE_THRESHOLD: usize = 1024;

/// Context for business operations
pub struct ServiceContext {
    store: Arc<dyn LedgerStore>,
    journal: Option<Arc<AuditJournal>>,
    config: LoyaltyConfig,
    policy: PointsPolicy,
    verifier: CredentialVerifier,
    append_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ServiceContext {
    /// Build a context over any store. The configuration is validated here.
    pub fn new(store: Arc<dyn LedgerStore>, config: LoyaltyConfig) -> LoyaltyResult<Self> {
        config.validate()?;
        let policy = config.points_policy()?;
        let verifier = CredentialVerifier::new(config.scheme());

        Ok(Self {
            store,
            journal: None,
            config,
            policy,
            verifier,
            append_locks: Mutex::new(HashMap::new()),
        })
    }

    /// Create from an opened database (store + journal)
    pub fn from_database(db: &Database, config: LoyaltyConfig) -> LoyaltyResult<Self> {
        Ok(Self::new(db.store(), config)?.with_journal(db.journal()))
    }

    pub fn with_journal(mut self, journal: Arc<AuditJournal>) -> Self {
        self.journal = Some(journal);
        self
    }

    pub fn store(&self) -> &dyn LedgerStore {
        self.store.as_ref()
    }

    pub fn config(&self) -> &LoyaltyConfig {
        &self.config
    }

    pub fn policy(&self) -> &PointsPolicy {
        &self.policy
    }

    /// Run one store call under the configured timeout.
    ///
    /// An elapsed timeout is reported as `StoreUnavailable`; the store's
    /// per-write atomicity means no partial record is left behind.
    pub async fn call<T, F>(&self, operation: &str, fut: F) -> LoyaltyResult<T>
    where
        F: Future<Output = PersistenceResult<T>>,
    {
        match tokio::time::timeout(self.config.store_timeout(), fut).await {
            Ok(result) => result.map_err(LoyaltyError::from),
            Err(_) => {
                warn!(operation, timeout_ms = self.config.store_timeout_ms, "Store call timed out");
                Err(LoyaltyError::StoreUnavailable(format!(
                    "{} timed out after {}ms",
                    operation, self.config.store_timeout_ms
                )))
            }
        }
    }

    /// Hash a PIN on the blocking pool; the KDF is CPU-bound
    pub async fn hash_pin(&self, pin: &str) -> LoyaltyResult<PinDigest> {
        let verifier = self.verifier;
        let pin = pin.to_string();
        run_blocking(move || verifier.hash(&pin)).await?.map_err(LoyaltyError::from)
    }

    /// Verify a PIN on the blocking pool. A failed task counts as a mismatch.
    pub async fn verify_pin_digest(&self, pin: &str, digest: &PinDigest) -> bool {
        let verifier = self.verifier;
        let pin = pin.to_string();
        let digest = digest.clone();
        run_blocking(move || verifier.verify(&pin, &digest))
            .await
            .unwrap_or(false)
    }

    /// Append an event to the journal. Failures are logged and never
    /// propagate: the store already holds the authoritative record.
    pub fn record(&self, event: &LedgerEvent) {
        if let Some(journal) = &self.journal {
            if let Err(e) = journal.append(event) {
                warn!(
                    event_type = %event.event_type,
                    subject = %event.subject_id,
                    error = %e,
                    "Failed to write audit journal"
                );
            }
        }
    }

    /// Serialize appends for one customer within this process
    pub async fn lock_customer(&self, customer_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.append_locks.lock().await;
            if locks.len() >= LOCK_PRUNE_THRESHOLD && !locks.contains_key(customer_id) {
                locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            }
            Arc::clone(locks.entry(customer_id.to_string()).or_default())
        };
        lock.lock_owned().await
    }
}

async fn run_blocking<T, F>(f: F) -> LoyaltyResult<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| LoyaltyError::Configuration(format!("credential task failed: {}", e)))
}
