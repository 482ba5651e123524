//! Ledger append protocol
//!
//! Read the fresh balance, build the next transaction, and append it only if
//! the customer's tail is still the one that was read. Appends for one
//! customer are also serialized in-process, so a conflict means another
//! process wrote first; the loop re-reads and retries a bounded number of
//! times.
//!
//! The transaction id doubles as an idempotency token: a retried append
//! with the same id returns the entry already recorded instead of writing
//! a second one.

use crate::auth::{AdminCredentials, CredentialGate};
use crate::balance::BalanceService;
use crate::error::{LoyaltyError, LoyaltyResult};
use crate::services::ServiceContext;
use loyalty_core::{LedgerEntry, LedgerEvent, OperationKind, Transaction};
use loyalty_persistence::{AppendCondition, AppendOutcome};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, info, warn};

/// A credit or debit to apply
#[derive(Debug, Clone)]
pub struct AppendRequest {
    pub customer_id: String,
    pub kind: OperationKind,
    pub amount: Decimal,
    /// Defaults to the configured payment method
    pub payment_method: Option<String>,
    /// Idempotency token; generated when absent
    pub transaction_id: Option<String>,
}

impl AppendRequest {
    pub fn new(customer_id: &str, kind: OperationKind, amount: Decimal) -> Self {
        Self {
            customer_id: customer_id.to_string(),
            kind,
            amount,
            payment_method: None,
            transaction_id: None,
        }
    }

    pub fn credit(customer_id: &str, amount: Decimal) -> Self {
        Self::new(customer_id, OperationKind::Credit, amount)
    }

    pub fn debit(customer_id: &str, amount: Decimal) -> Self {
        Self::new(customer_id, OperationKind::Debit, amount)
    }

    pub fn with_payment_method(mut self, method: &str) -> Self {
        self.payment_method = Some(method.to_string());
        self
    }

    pub fn with_transaction_id(mut self, transaction_id: &str) -> Self {
        self.transaction_id = Some(transaction_id.to_string());
        self
    }
}

/// Result of an append
#[derive(Debug, Clone, Serialize)]
pub struct AppendReceipt {
    pub entry: LedgerEntry,
    pub new_balance: i64,
    /// The token was already recorded; nothing new was written
    pub duplicate: bool,
    /// Store round trips used (0 for a duplicate found before the first attempt)
    pub attempts: u32,
}

impl AppendReceipt {
    fn recorded(entry: LedgerEntry, duplicate: bool, attempts: u32) -> Self {
        let new_balance = entry.transaction.resulting_balance().unwrap_or_default();
        Self {
            entry,
            new_balance,
            duplicate,
            attempts,
        }
    }
}

/// Ledger Service - credit/debit appends
pub struct LedgerService<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> LedgerService<'a> {
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    /// Gate on the administrator's PIN, then append
    pub async fn append(
        &self,
        credentials: AdminCredentials<'_>,
        request: AppendRequest,
    ) -> LoyaltyResult<AppendReceipt> {
        let points = self.ctx.policy().points_for(request.kind, request.amount)?;
        let admin = CredentialGate::new(self.ctx)
            .authorize_admin(credentials)
            .await?;

        let balances = BalanceService::new(self.ctx);
        balances.require_customer(&request.customer_id).await?;

        let transaction_id = request
            .transaction_id
            .clone()
            .unwrap_or_else(Transaction::generate_id);
        let payment_method = request
            .payment_method
            .clone()
            .unwrap_or_else(|| self.ctx.config().payment_method.clone());
        let customer_id = request.customer_id.as_str();
        let store = self.ctx.store();

        let _guard = self.ctx.lock_customer(customer_id).await;

        if let Some(existing) = self
            .ctx
            .call("find_transaction", store.find_transaction(customer_id, &transaction_id))
            .await?
        {
            info!(customer_id, transaction_id = %transaction_id, "Append already recorded");
            return Ok(AppendReceipt::recorded(existing, true, 0));
        }

        let max_attempts = self.ctx.config().max_append_attempts;
        for attempt in 1..=max_attempts {
            let view = balances.current_view(customer_id).await?;
            let transaction = Transaction::new(
                &transaction_id,
                request.kind,
                view.balance,
                points,
                request.amount,
                &payment_method,
                &admin.id,
            )?;

            let outcome = self
                .ctx
                .call(
                    "append_transaction",
                    store.append_transaction(
                        customer_id,
                        &transaction,
                        AppendCondition::ExpectTail(view.tail_key),
                    ),
                )
                .await?;

            match outcome {
                AppendOutcome::Appended(key) => {
                    let entry = LedgerEntry {
                        key,
                        customer_id: customer_id.to_string(),
                        transaction,
                    };
                    info!(
                        customer_id,
                        admin_id = %admin.id,
                        kind = %request.kind,
                        amount = %request.amount,
                        points,
                        balance = entry.transaction.resulting_balance().unwrap_or_default(),
                        key = %key,
                        "Transaction appended"
                    );
                    self.ctx.record(&LedgerEvent::transaction_recorded(&entry));
                    return Ok(AppendReceipt::recorded(entry, false, attempt));
                }
                AppendOutcome::Duplicate(existing) => {
                    info!(customer_id, transaction_id = %transaction_id, "Append already recorded");
                    return Ok(AppendReceipt::recorded(existing, true, attempt));
                }
                AppendOutcome::Conflict { actual_tail } => {
                    warn!(
                        customer_id,
                        attempt,
                        expected = ?view.tail_key,
                        actual = ?actual_tail,
                        "Ledger tail moved, retrying append"
                    );
                }
            }
        }

        warn!(customer_id, attempts = max_attempts, "Append gave up after repeated conflicts");
        Err(LoyaltyError::Conflict {
            customer_id: customer_id.to_string(),
            attempts: max_attempts,
        })
    }

    /// Earn points: `floor(amount * credit_rate)`
    pub async fn credit(
        &self,
        credentials: AdminCredentials<'_>,
        customer_id: &str,
        amount: Decimal,
    ) -> LoyaltyResult<AppendReceipt> {
        debug!(customer_id, amount = %amount, "Credit requested");
        self.append(credentials, AppendRequest::credit(customer_id, amount))
            .await
    }

    /// Redeem points: `floor(amount * debit_rate)`, never below zero
    pub async fn debit(
        &self,
        credentials: AdminCredentials<'_>,
        customer_id: &str,
        amount: Decimal,
    ) -> LoyaltyResult<AppendReceipt> {
        debug!(customer_id, amount = %amount, "Debit requested");
        self.append(credentials, AppendRequest::debit(customer_id, amount))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{LoyaltyConfig, PinSchemeKind};
    use loyalty_core::{CredentialVerifier, Identity, PinHasher};
    use loyalty_persistence::{LedgerStore, MemoryLedgerStore};
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    struct Fixture {
        ctx: ServiceContext,
        admin_id: String,
        customer_id: String,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(MemoryLedgerStore::new());
        let verifier = CredentialVerifier::legacy();
        let admin = Identity::admin("Root", "root@shop.com", verifier.hash("1234").unwrap()).unwrap();
        let customer =
            Identity::customer("Alice", "alice@shop.com", verifier.hash("5555").unwrap()).unwrap();
        store.insert_identity(&admin).await.unwrap();
        store.insert_identity(&customer).await.unwrap();

        let mut config = LoyaltyConfig::default();
        config.pin_scheme = PinSchemeKind::Legacy;
        Fixture {
            ctx: ServiceContext::new(store, config).unwrap(),
            admin_id: admin.id,
            customer_id: customer.id,
        }
    }

    #[tokio::test]
    async fn test_credit_then_debit() {
        let f = fixture().await;
        let ledger = LedgerService::new(&f.ctx);
        let creds = AdminCredentials::new(&f.admin_id, "1234");

        let receipt = ledger.credit(creds, &f.customer_id, dec!(500)).await.unwrap();
        assert_eq!(receipt.new_balance, 5);
        assert_eq!(receipt.attempts, 1);
        assert!(!receipt.duplicate);
        assert_eq!(receipt.entry.transaction.payment_method, "Cash");
        assert_eq!(receipt.entry.transaction.acting_admin_id, f.admin_id);

        let receipt = ledger.debit(creds, &f.customer_id, dec!(5)).await.unwrap();
        assert_eq!(receipt.new_balance, 0);
        let points = receipt.entry.transaction.points.unwrap();
        assert_eq!((points.added, points.deducted), (0, 5));
    }

    #[tokio::test]
    async fn test_debit_boundary() {
        let f = fixture().await;
        let ledger = LedgerService::new(&f.ctx);
        let creds = AdminCredentials::new(&f.admin_id, "1234");
        ledger.credit(creds, &f.customer_id, dec!(1000)).await.unwrap();

        let err = ledger.debit(creds, &f.customer_id, dec!(11)).await.unwrap_err();
        assert!(matches!(err, LoyaltyError::InsufficientBalance { needed: 11, available: 10 }));

        let receipt = ledger.debit(creds, &f.customer_id, dec!(10)).await.unwrap();
        assert_eq!(receipt.new_balance, 0);
    }

    #[tokio::test]
    async fn test_wrong_pin_writes_nothing() {
        let f = fixture().await;
        let ledger = LedgerService::new(&f.ctx);

        let err = ledger
            .credit(AdminCredentials::new(&f.admin_id, "0000"), &f.customer_id, dec!(500))
            .await
            .unwrap_err();
        assert!(matches!(err, LoyaltyError::InvalidPin));
        assert!(f.ctx.store().transactions(&f.customer_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_customer_cannot_authorize() {
        let f = fixture().await;
        let ledger = LedgerService::new(&f.ctx);
        let err = ledger
            .credit(AdminCredentials::new(&f.customer_id, "5555"), &f.customer_id, dec!(500))
            .await
            .unwrap_err();
        assert!(matches!(err, LoyaltyError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_same_token_is_recorded_once() {
        let f = fixture().await;
        let ledger = LedgerService::new(&f.ctx);
        let creds = AdminCredentials::new(&f.admin_id, "1234");
        let request = AppendRequest::credit(&f.customer_id, dec!(500))
            .with_transaction_id("pos-42")
            .with_payment_method("Card");

        let first = ledger.append(creds, request.clone()).await.unwrap();
        let second = ledger.append(creds, request).await.unwrap();

        assert!(!first.duplicate);
        assert!(second.duplicate);
        assert_eq!(first.entry.key, second.entry.key);
        assert_eq!(second.new_balance, 5);
        assert_eq!(second.entry.transaction.payment_method, "Card");
        assert_eq!(f.ctx.store().transactions(&f.customer_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_amount_worth_no_points() {
        let f = fixture().await;
        let ledger = LedgerService::new(&f.ctx);
        let err = ledger
            .credit(AdminCredentials::new(&f.admin_id, "1234"), &f.customer_id, dec!(50))
            .await
            .unwrap_err();
        assert!(matches!(err, LoyaltyError::InvalidAmount(_)));
    }
}
