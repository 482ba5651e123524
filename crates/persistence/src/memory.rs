//! In-memory ledger store
//!
//! Dùng cho tests và chạy thử không cần SQLite. Toàn bộ state nằm sau một
//! `Mutex`, nên mọi operation (kể cả conditional append) là atomic.

use crate::error::{PersistenceError, PersistenceResult, UniqueKey};
use crate::store::{AppendCondition, AppendOutcome, LedgerStore};
use async_trait::async_trait;
use loyalty_core::{
    normalize_email, Identity, IdentityField, IdentityKind, LedgerEntry, Transaction,
    TransactionKey,
};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

#[derive(Default)]
struct MemoryState {
    identities: Vec<Identity>,
    ledgers: HashMap<String, Vec<LedgerEntry>>,
    next_key: i64,
}

/// Store lưu trong bộ nhớ process
#[derive(Default)]
pub struct MemoryLedgerStore {
    state: Mutex<MemoryState>,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> PersistenceResult<MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|_| PersistenceError::Unavailable("memory store lock poisoned".to_string()))
    }

    /// Ghi entry thô, bỏ qua mọi kiểm tra. Dùng để dựng history cũ (e.g. entry
    /// thiếu `points`) trong tests.
    pub fn insert_raw(&self, customer_id: &str, transaction: Transaction) -> PersistenceResult<TransactionKey> {
        let mut state = self.lock()?;
        Ok(push_entry(&mut state, customer_id, transaction))
    }
}

fn push_entry(state: &mut MemoryState, customer_id: &str, transaction: Transaction) -> TransactionKey {
    state.next_key += 1;
    let key = TransactionKey(state.next_key);
    state
        .ledgers
        .entry(customer_id.to_string())
        .or_default()
        .push(LedgerEntry {
            key,
            customer_id: customer_id.to_string(),
            transaction,
        });
    key
}

fn insert_checked(state: &mut MemoryState, identity: &Identity) -> PersistenceResult<()> {
    let email = normalize_email(&identity.email);
    if state
        .identities
        .iter()
        .any(|i| i.kind == identity.kind && i.email == email)
    {
        return Err(PersistenceError::unique(
            UniqueKey::IdentityEmail,
            format!("{} email {}", identity.kind, email),
        ));
    }
    if state.identities.iter().any(|i| i.id == identity.id) {
        return Err(PersistenceError::unique(UniqueKey::IdentityId, identity.id.clone()));
    }
    state.identities.push(identity.clone());
    Ok(())
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn get_identity(&self, kind: IdentityKind, id: &str) -> PersistenceResult<Option<Identity>> {
        let state = self.lock()?;
        Ok(state
            .identities
            .iter()
            .find(|i| i.kind == kind && i.id == id)
            .cloned())
    }

    async fn query_by_field(
        &self,
        kind: IdentityKind,
        field: IdentityField,
        value: &str,
    ) -> PersistenceResult<Vec<Identity>> {
        let state = self.lock()?;
        Ok(state
            .identities
            .iter()
            .filter(|i| i.kind == kind)
            .filter(|i| match field {
                IdentityField::Email => i.email == value,
                IdentityField::Name => i.name == value,
            })
            .cloned()
            .collect())
    }

    async fn count_identities(&self, kind: IdentityKind) -> PersistenceResult<i64> {
        let state = self.lock()?;
        Ok(state.identities.iter().filter(|i| i.kind == kind).count() as i64)
    }

    async fn insert_identity(&self, identity: &Identity) -> PersistenceResult<()> {
        let mut state = self.lock()?;
        insert_checked(&mut state, identity)
    }

    async fn insert_bootstrap_admin(&self, admin: &Identity) -> PersistenceResult<bool> {
        let mut state = self.lock()?;
        if state.identities.iter().any(Identity::is_admin) {
            return Ok(false);
        }
        insert_checked(&mut state, admin)?;
        Ok(true)
    }

    async fn last_transaction(&self, customer_id: &str) -> PersistenceResult<Option<LedgerEntry>> {
        let state = self.lock()?;
        Ok(state
            .ledgers
            .get(customer_id)
            .and_then(|entries| entries.last())
            .cloned())
    }

    async fn transactions(&self, customer_id: &str) -> PersistenceResult<Vec<LedgerEntry>> {
        let state = self.lock()?;
        Ok(state.ledgers.get(customer_id).cloned().unwrap_or_default())
    }

    async fn find_transaction(
        &self,
        customer_id: &str,
        transaction_id: &str,
    ) -> PersistenceResult<Option<LedgerEntry>> {
        let state = self.lock()?;
        Ok(state.ledgers.get(customer_id).and_then(|entries| {
            entries
                .iter()
                .find(|e| e.transaction.transaction_id == transaction_id)
                .cloned()
        }))
    }

    async fn append_transaction(
        &self,
        customer_id: &str,
        transaction: &Transaction,
        condition: AppendCondition,
    ) -> PersistenceResult<AppendOutcome> {
        let mut state = self.lock()?;
        let entries = state.ledgers.get(customer_id);

        if let Some(existing) = entries.and_then(|entries| {
            entries
                .iter()
                .find(|e| e.transaction.transaction_id == transaction.transaction_id)
        }) {
            return Ok(AppendOutcome::Duplicate(existing.clone()));
        }

        let actual_tail = entries.and_then(|entries| entries.last()).map(|e| e.key);
        if !condition.matches(actual_tail) {
            return Ok(AppendOutcome::Conflict { actual_tail });
        }

        let key = push_entry(&mut state, customer_id, transaction.clone());
        Ok(AppendOutcome::Appended(key))
    }
}
