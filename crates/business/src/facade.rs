//! `LoyaltyService` - the operations a terminal drives
//!
//! Thin wrapper that parses caller input and dispatches to the services.
//! Every call receives the ids it acts on; nothing is remembered between
//! calls.

use crate::auth::{AdminCredentials, CredentialGate};
use crate::balance::BalanceService;
use crate::error::LoyaltyResult;
use crate::ledger::{AppendReceipt, AppendRequest, LedgerService};
use crate::registration::{NewIdentity, RegistrationService};
use crate::resolver::{IdentityResolver, StoreResolver};
use crate::services::ServiceContext;
use loyalty_core::{
    parse_amount, BalanceView, Identity, IdentityKind, LedgerEntry, OperationKind, PinDigest,
    ReconciliationReport,
};

pub struct LoyaltyService {
    ctx: ServiceContext,
}

impl LoyaltyService {
    pub fn new(ctx: ServiceContext) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &ServiceContext {
        &self.ctx
    }

    // === Reads ===

    pub async fn get_balance(&self, customer_id: &str) -> LoyaltyResult<BalanceView> {
        BalanceService::new(&self.ctx).get_balance(customer_id).await
    }

    pub async fn history(&self, customer_id: &str) -> LoyaltyResult<Vec<LedgerEntry>> {
        BalanceService::new(&self.ctx).history(customer_id).await
    }

    pub async fn reconcile(&self, customer_id: &str) -> LoyaltyResult<ReconciliationReport> {
        BalanceService::new(&self.ctx).reconcile(customer_id).await
    }

    pub async fn resolve(&self, scanned: &str) -> LoyaltyResult<String> {
        StoreResolver::new(&self.ctx).resolve(scanned).await
    }

    // === Mutations ===

    /// Credit from a typed amount string (e.g. keypad input)
    pub async fn credit(
        &self,
        customer_id: &str,
        admin_id: &str,
        admin_pin: &str,
        amount: &str,
    ) -> LoyaltyResult<AppendReceipt> {
        self.append_parsed(customer_id, admin_id, admin_pin, OperationKind::Credit, amount)
            .await
    }

    pub async fn debit(
        &self,
        customer_id: &str,
        admin_id: &str,
        admin_pin: &str,
        amount: &str,
    ) -> LoyaltyResult<AppendReceipt> {
        self.append_parsed(customer_id, admin_id, admin_pin, OperationKind::Debit, amount)
            .await
    }

    /// Full-control append (payment method, idempotency token)
    pub async fn append(
        &self,
        admin_id: &str,
        admin_pin: &str,
        request: AppendRequest,
    ) -> LoyaltyResult<AppendReceipt> {
        LedgerService::new(&self.ctx)
            .append(AdminCredentials::new(admin_id, admin_pin), request)
            .await
    }

    async fn append_parsed(
        &self,
        customer_id: &str,
        admin_id: &str,
        admin_pin: &str,
        kind: OperationKind,
        amount: &str,
    ) -> LoyaltyResult<AppendReceipt> {
        let amount = parse_amount(amount)?;
        self.append(admin_id, admin_pin, AppendRequest::new(customer_id, kind, amount))
            .await
    }

    // === Identities ===

    pub async fn verify_pin(&self, identity_id: &str, pin: &str) -> LoyaltyResult<Identity> {
        CredentialGate::new(&self.ctx).verify_pin(identity_id, pin).await
    }

    pub async fn register(
        &self,
        kind: IdentityKind,
        name: &str,
        email: &str,
        pin: &str,
        actor: Option<AdminCredentials<'_>>,
    ) -> LoyaltyResult<Identity> {
        let input = NewIdentity {
            kind,
            name,
            email,
            pin,
        };
        RegistrationService::new(&self.ctx).register(input, actor).await
    }

    pub async fn login(&self, email: &str, pin: &str) -> LoyaltyResult<Identity> {
        RegistrationService::new(&self.ctx).login(email, pin).await
    }

    pub async fn resume_session(&self, email: &str, cached: &PinDigest) -> LoyaltyResult<Identity> {
        RegistrationService::new(&self.ctx)
            .resume_session(email, cached)
            .await
    }
}
