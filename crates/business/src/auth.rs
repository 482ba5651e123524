//! Credential gate
//!
//! Mutations (credit, debit, administrator registration) proceed only after
//! the acting administrator's PIN verifies against the stored digest.
//! PINs and digests never reach logs, errors, or the journal.

use crate::error::{LoyaltyError, LoyaltyResult};
use crate::services::ServiceContext;
use loyalty_core::{Identity, IdentityKind, LedgerEvent};
use tracing::{debug, warn};

/// Admin id + PIN presented for a gated operation
#[derive(Clone, Copy)]
pub struct AdminCredentials<'p> {
    pub admin_id: &'p str,
    pub pin: &'p str,
}

impl<'p> AdminCredentials<'p> {
    pub fn new(admin_id: &'p str, pin: &'p str) -> Self {
        Self { admin_id, pin }
    }
}

impl std::fmt::Debug for AdminCredentials<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminCredentials")
            .field("admin_id", &self.admin_id)
            .field("pin", &"<redacted>")
            .finish()
    }
}

/// Credential gate - PIN verification for identities
pub struct CredentialGate<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> CredentialGate<'a> {
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    /// Verify `pin` for any identity id (administrator first, then customer)
    pub async fn verify_pin(&self, identity_id: &str, pin: &str) -> LoyaltyResult<Identity> {
        let store = self.ctx.store();
        let identity = match self
            .ctx
            .call("get_identity", store.get_identity(IdentityKind::Admin, identity_id))
            .await?
        {
            Some(admin) => admin,
            None => self
                .ctx
                .call("get_identity", store.get_identity(IdentityKind::Customer, identity_id))
                .await?
                .ok_or_else(|| LoyaltyError::not_found("Identity", identity_id))?,
        };

        self.check(&identity, pin).await?;
        Ok(identity)
    }

    /// Gate for mutations: `credentials` must name an administrator whose PIN verifies
    pub async fn authorize_admin(&self, credentials: AdminCredentials<'_>) -> LoyaltyResult<Identity> {
        let admin = self
            .ctx
            .call(
                "get_identity",
                self.ctx
                    .store()
                    .get_identity(IdentityKind::Admin, credentials.admin_id),
            )
            .await?
            .ok_or_else(|| LoyaltyError::admin_not_found(credentials.admin_id))?;

        self.check(&admin, credentials.pin).await?;
        Ok(admin)
    }

    /// Compare a PIN against an already loaded identity
    pub async fn check(&self, identity: &Identity, pin: &str) -> LoyaltyResult<()> {
        if self.ctx.verify_pin_digest(pin, &identity.pin_digest).await {
            debug!(identity_id = %identity.id, kind = %identity.kind, "PIN verified");
            return Ok(());
        }

        warn!(identity_id = %identity.id, kind = %identity.kind, "PIN rejected");
        self.ctx
            .record(&LedgerEvent::pin_rejected(&identity.id, Some(identity.kind)));
        Err(LoyaltyError::InvalidPin)
    }
}
