//! Registration, login, and session resume
//!
//! Customers register freely. The first administrator bootstraps the
//! system; every later administrator needs an existing administrator's PIN.

use crate::auth::{AdminCredentials, CredentialGate};
use crate::error::{LoyaltyError, LoyaltyResult};
use crate::services::ServiceContext;
use loyalty_core::{
    digests_match, normalize_email, validate_email, validate_pin_format, Identity, IdentityField,
    IdentityKind, LedgerEvent, PinDigest, PinHasher,
};
use tracing::{info, warn};

/// Registration input
#[derive(Clone)]
pub struct NewIdentity<'p> {
    pub kind: IdentityKind,
    pub name: &'p str,
    pub email: &'p str,
    pub pin: &'p str,
}

impl<'p> NewIdentity<'p> {
    pub fn customer(name: &'p str, email: &'p str, pin: &'p str) -> Self {
        Self {
            kind: IdentityKind::Customer,
            name,
            email,
            pin,
        }
    }

    pub fn admin(name: &'p str, email: &'p str, pin: &'p str) -> Self {
        Self {
            kind: IdentityKind::Admin,
            name,
            email,
            pin,
        }
    }
}

/// Registration Service - identities and administrator sessions
pub struct RegistrationService<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> RegistrationService<'a> {
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    /// Register a customer or administrator.
    ///
    /// `actor` is required for administrators once one exists.
    pub async fn register(
        &self,
        input: NewIdentity<'_>,
        actor: Option<AdminCredentials<'_>>,
    ) -> LoyaltyResult<Identity> {
        let actor_id = match input.kind {
            IdentityKind::Customer => None,
            IdentityKind::Admin => self.authorize_admin_registration(actor).await?,
        };

        let config = self.ctx.config();
        validate_pin_format(input.pin, config.min_pin_length, config.max_pin_length)?;
        let email = normalize_email(input.email);
        validate_email(&email)?;

        let existing = self
            .ctx
            .call(
                "query_by_field",
                self.ctx
                    .store()
                    .query_by_field(input.kind, IdentityField::Email, &email),
            )
            .await?;
        if !existing.is_empty() {
            warn!(kind = %input.kind, "Registration rejected: duplicate email");
            return Err(LoyaltyError::DuplicateEmail(email));
        }

        let digest = self.ctx.hash_pin(input.pin).await?;
        let identity = Identity::new(input.kind, input.name, &email, digest)?;
        let store = self.ctx.store();
        let duplicate_email = |e: LoyaltyError| match e {
            LoyaltyError::DuplicateEmail(_) => LoyaltyError::DuplicateEmail(email.clone()),
            other => other,
        };

        if input.kind == IdentityKind::Admin && actor_id.is_none() {
            // Only lands while the store still holds no administrator
            let inserted = self
                .ctx
                .call("insert_bootstrap_admin", store.insert_bootstrap_admin(&identity))
                .await
                .map_err(duplicate_email)?;
            if !inserted {
                warn!("Bootstrap administrator rejected: an administrator already exists");
                return Err(admin_required());
            }
        } else {
            // The unique index still catches a concurrent registration
            self.ctx
                .call("insert_identity", store.insert_identity(&identity))
                .await
                .map_err(duplicate_email)?;
        }

        info!(identity_id = %identity.id, kind = %identity.kind, "Identity registered");
        self.ctx
            .record(&LedgerEvent::identity_registered(&identity, actor_id.as_deref()));
        Ok(identity)
    }

    /// Administrator login by email + PIN
    pub async fn login(&self, email: &str, pin: &str) -> LoyaltyResult<Identity> {
        let admin = self.admin_by_email(email).await?;
        CredentialGate::new(self.ctx).check(&admin, pin).await?;
        info!(admin_id = %admin.id, "Administrator logged in");
        Ok(admin)
    }

    /// Resume a session from a digest cached at login, without the raw PIN
    pub async fn resume_session(&self, email: &str, cached: &PinDigest) -> LoyaltyResult<Identity> {
        let admin = self.admin_by_email(email).await?;
        if !digests_match(cached, &admin.pin_digest) {
            warn!(admin_id = %admin.id, "Cached credential rejected");
            self.ctx
                .record(&LedgerEvent::pin_rejected(&admin.id, Some(IdentityKind::Admin)));
            return Err(LoyaltyError::InvalidPin);
        }
        info!(admin_id = %admin.id, "Administrator session resumed");
        Ok(admin)
    }

    async fn admin_by_email(&self, email: &str) -> LoyaltyResult<Identity> {
        let email = normalize_email(email);
        self.ctx
            .call(
                "query_by_field",
                self.ctx
                    .store()
                    .query_by_field(IdentityKind::Admin, IdentityField::Email, &email),
            )
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| LoyaltyError::admin_not_found(&email))
    }

    /// Returns the authorizing admin id, or `None` for the bootstrap admin.
    ///
    /// The count is only an early rejection; the bootstrap insert itself is
    /// conditional in the store.
    async fn authorize_admin_registration(
        &self,
        actor: Option<AdminCredentials<'_>>,
    ) -> LoyaltyResult<Option<String>> {
        let admins = self
            .ctx
            .call("count_identities", self.ctx.store().count_identities(IdentityKind::Admin))
            .await?;

        match actor {
            Some(credentials) => {
                let admin = CredentialGate::new(self.ctx)
                    .authorize_admin(credentials)
                    .await?;
                Ok(Some(admin.id))
            }
            None if admins == 0 => {
                info!("Registering bootstrap administrator");
                Ok(None)
            }
            None => Err(admin_required()),
        }
    }
}

fn admin_required() -> LoyaltyError {
    LoyaltyError::Unauthorized(
        "registering an administrator requires an acting administrator".to_string(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{LoyaltyConfig, PinSchemeKind};
    use loyalty_persistence::MemoryLedgerStore;
    use std::sync::Arc;

    fn context() -> ServiceContext {
        let mut config = LoyaltyConfig::default();
        config.pin_scheme = PinSchemeKind::Salted;
        config.pbkdf2_iterations = 1_000;
        ServiceContext::new(Arc::new(MemoryLedgerStore::new()), config).unwrap()
    }

    #[tokio::test]
    async fn test_register_customer() {
        let ctx = context();
        let service = RegistrationService::new(&ctx);

        let alice = service
            .register(NewIdentity::customer(" Alice ", "Alice@Shop.com", "1234"), None)
            .await
            .unwrap();
        assert_eq!(alice.name, "Alice");
        assert_eq!(alice.email, "alice@shop.com");
        assert!(alice.pin_digest.as_str().starts_with("pbkdf2-sha256$1000$"));

        let err = service
            .register(NewIdentity::customer("Other", "alice@shop.com", "9999"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, LoyaltyError::DuplicateEmail(_)));
    }

    #[tokio::test]
    async fn test_register_validation() {
        let ctx = context();
        let service = RegistrationService::new(&ctx);

        let err = service
            .register(NewIdentity::customer("Bob", "bob-at-shop", "1234"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, LoyaltyError::InvalidEmail(_)));

        let err = service
            .register(NewIdentity::customer("Bob", "bob@shop.com", "12a4"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, LoyaltyError::InvalidPinFormat(_)));

        let err = service
            .register(NewIdentity::customer("Bob", "bob@shop.com", "12"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, LoyaltyError::InvalidPinFormat(_)));

        let err = service
            .register(NewIdentity::customer("  ", "bob@shop.com", "1234"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, LoyaltyError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_admin_bootstrap_then_gated() {
        let ctx = context();
        let service = RegistrationService::new(&ctx);

        let root = service
            .register(NewIdentity::admin("Root", "root@shop.com", "1234"), None)
            .await
            .unwrap();

        let err = service
            .register(NewIdentity::admin("Second", "second@shop.com", "4321"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, LoyaltyError::Unauthorized(_)));

        let err = service
            .register(
                NewIdentity::admin("Second", "second@shop.com", "4321"),
                Some(AdminCredentials::new(&root.id, "0000")),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, LoyaltyError::InvalidPin));

        let second = service
            .register(
                NewIdentity::admin("Second", "second@shop.com", "4321"),
                Some(AdminCredentials::new(&root.id, "1234")),
            )
            .await
            .unwrap();
        assert!(second.is_admin());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_bootstrap_admits_one_admin() {
        let ctx = Arc::new(context());

        let mut handles = Vec::new();
        for i in 0..8 {
            let ctx = Arc::clone(&ctx);
            handles.push(tokio::spawn(async move {
                let email = format!("root{i}@shop.com");
                RegistrationService::new(&ctx)
                    .register(NewIdentity::admin("Root", &email, "1234"), None)
                    .await
            }));
        }

        let (mut ok, mut refused) = (0, 0);
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => ok += 1,
                Err(LoyaltyError::Unauthorized(_)) => refused += 1,
                Err(other) => panic!("unexpected error: {other:?}"),
            }
        }
        assert_eq!(ok, 1);
        assert_eq!(refused, 7);
        assert_eq!(ctx.store().count_identities(IdentityKind::Admin).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_login_and_resume() {
        let ctx = context();
        let service = RegistrationService::new(&ctx);
        service
            .register(NewIdentity::admin("Root", "root@shop.com", "1234"), None)
            .await
            .unwrap();

        let admin = service.login("ROOT@shop.com", "1234").await.unwrap();
        assert!(matches!(
            service.login("root@shop.com", "9999").await,
            Err(LoyaltyError::InvalidPin)
        ));
        assert!(matches!(
            service.login("ghost@shop.com", "1234").await,
            Err(LoyaltyError::NotFound { .. })
        ));

        let resumed = service
            .resume_session("root@shop.com", &admin.pin_digest)
            .await
            .unwrap();
        assert_eq!(resumed.id, admin.id);
        assert!(matches!(
            service
                .resume_session("root@shop.com", &PinDigest::new("stale"))
                .await,
            Err(LoyaltyError::InvalidPin)
        ));
    }
}
