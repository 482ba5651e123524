//! Balance reads - current balance, history, reconciliation
//!
//! The current balance is the `resulting_balance` of the newest entry. Reads
//! fetch only the last entry and fall back to a full scan when that entry
//! has no `points`.

use crate::error::{LoyaltyError, LoyaltyResult};
use crate::services::ServiceContext;
use loyalty_core::{
    derive_balance, reconcile, BalanceView, IdentityKind, LedgerEntry, LedgerEvent,
    ReconciliationReport,
};
use tracing::{debug, warn};

/// Balance Service - read side of the ledger
pub struct BalanceService<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> BalanceService<'a> {
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    /// Current balance of an existing customer
    pub async fn get_balance(&self, customer_id: &str) -> LoyaltyResult<BalanceView> {
        self.require_customer(customer_id).await?;
        let view = self.current_view(customer_id).await?;
        debug!(customer_id, balance = view.balance, "Balance read");
        Ok(view)
    }

    /// Full history, ascending by insertion key
    pub async fn history(&self, customer_id: &str) -> LoyaltyResult<Vec<LedgerEntry>> {
        self.require_customer(customer_id).await?;
        self.ctx
            .call("transactions", self.ctx.store().transactions(customer_id))
            .await
    }

    /// Replay the history and compare each recorded balance
    pub async fn reconcile(&self, customer_id: &str) -> LoyaltyResult<ReconciliationReport> {
        let entries = self.history(customer_id).await?;
        let report = reconcile(customer_id, &entries);

        if !report.is_consistent() {
            warn!(
                customer_id,
                derived = report.derived_balance,
                replayed = report.replayed_balance,
                divergences = report.divergences.len(),
                "Ledger reconciliation found divergence"
            );
            self.ctx.record(&LedgerEvent::reconciliation_divergence(&report));
        } else if !report.malformed.is_empty() {
            warn!(customer_id, malformed = report.malformed.len(), "Ledger has malformed entries");
        }

        Ok(report)
    }

    /// Balance view without the existence check. `tail_key` is the key the
    /// next conditional append must expect.
    pub(crate) async fn current_view(&self, customer_id: &str) -> LoyaltyResult<BalanceView> {
        let store = self.ctx.store();
        let last = self
            .ctx
            .call("last_transaction", store.last_transaction(customer_id))
            .await?;

        match last {
            None => Ok(BalanceView::empty()),
            Some(entry) => match entry.transaction.points {
                Some(points) => Ok(BalanceView {
                    balance: points.resulting_balance,
                    last_transaction_at: Some(entry.transaction.timestamp),
                    tail_key: Some(entry.key),
                }),
                None => {
                    debug!(customer_id, key = %entry.key, "Newest entry has no points, scanning history");
                    let entries = self
                        .ctx
                        .call("transactions", store.transactions(customer_id))
                        .await?;
                    Ok(derive_balance(&entries))
                }
            },
        }
    }

    pub(crate) async fn require_customer(&self, customer_id: &str) -> LoyaltyResult<()> {
        self.ctx
            .call(
                "get_identity",
                self.ctx.store().get_identity(IdentityKind::Customer, customer_id),
            )
            .await?
            .map(|_| ())
            .ok_or_else(|| LoyaltyError::customer_not_found(customer_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LoyaltyConfig;
    use loyalty_core::{Identity, OperationKind, PinDigest, Transaction, TransactionKey};
    use loyalty_persistence::{LedgerStore, MemoryLedgerStore};
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    async fn setup() -> (Arc<MemoryLedgerStore>, ServiceContext, String) {
        let store = Arc::new(MemoryLedgerStore::new());
        let customer = Identity::customer("Alice", "alice@shop.com", PinDigest::new("x")).unwrap();
        store.insert_identity(&customer).await.unwrap();
        let ctx = ServiceContext::new(store.clone(), LoyaltyConfig::default()).unwrap();
        (store, ctx, customer.id)
    }

    #[tokio::test]
    async fn test_empty_history_and_unknown_customer() {
        let (_store, ctx, customer_id) = setup().await;
        let service = BalanceService::new(&ctx);

        let view = service.get_balance(&customer_id).await.unwrap();
        assert_eq!(view.balance, 0);
        assert_eq!(view.last_transaction_at, None);

        assert!(matches!(
            service.get_balance("missing").await,
            Err(LoyaltyError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_newest_entry_without_points_falls_back_to_scan() {
        let (store, ctx, customer_id) = setup().await;
        let credit = Transaction::new("t1", OperationKind::Credit, 0, 7, dec!(700), "Cash", "A").unwrap();
        store.insert_raw(&customer_id, credit).unwrap();

        let mut legacy = Transaction::new("t2", OperationKind::Credit, 7, 1, dec!(100), "Cash", "A").unwrap();
        legacy.points = None;
        store.insert_raw(&customer_id, legacy).unwrap();

        let view = BalanceService::new(&ctx).get_balance(&customer_id).await.unwrap();
        assert_eq!(view.balance, 7);
        assert_eq!(view.tail_key, Some(TransactionKey(2)));
    }

    #[tokio::test]
    async fn test_reconcile_reports_stale_chain() {
        let (store, ctx, customer_id) = setup().await;
        let seed = Transaction::new("t1", OperationKind::Credit, 0, 10, dec!(1000), "Cash", "A").unwrap();
        store.insert_raw(&customer_id, seed).unwrap();
        // Two debits computed from the same stale balance
        for id in ["t2", "t3"] {
            let debit = Transaction::new(id, OperationKind::Debit, 10, 10, dec!(10), "Cash", "A").unwrap();
            store.insert_raw(&customer_id, debit).unwrap();
        }

        let report = BalanceService::new(&ctx).reconcile(&customer_id).await.unwrap();
        assert!(!report.is_consistent());
        assert_eq!(report.divergences.len(), 1);
        assert_eq!(report.replayed_balance, -10);
    }
}
