//! Identity resolver
//!
//! Maps a scanned code to a customer id. The code printed on a customer
//! card is the customer id itself.

use crate::error::{LoyaltyError, LoyaltyResult};
use crate::services::ServiceContext;
use async_trait::async_trait;
use loyalty_core::IdentityKind;
use tracing::debug;

#[async_trait]
pub trait IdentityResolver: Send + Sync {
    /// Resolve a scanned payload to an existing customer id
    async fn resolve(&self, scanned: &str) -> LoyaltyResult<String>;
}

/// Resolver backed by the ledger store
pub struct StoreResolver<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> StoreResolver<'a> {
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl IdentityResolver for StoreResolver<'_> {
    async fn resolve(&self, scanned: &str) -> LoyaltyResult<String> {
        let customer_id = scanned.trim();
        if customer_id.is_empty() {
            return Err(LoyaltyError::InvalidInput("scanned code is empty".to_string()));
        }

        let customer = self
            .ctx
            .call(
                "get_identity",
                self.ctx.store().get_identity(IdentityKind::Customer, customer_id),
            )
            .await?
            .ok_or_else(|| LoyaltyError::customer_not_found(customer_id))?;

        debug!(customer_id = %customer.id, "Scanned code resolved");
        Ok(customer.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LoyaltyConfig;
    use loyalty_core::{Identity, PinDigest};
    use loyalty_persistence::{LedgerStore, MemoryLedgerStore};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_resolve() {
        let store = Arc::new(MemoryLedgerStore::new());
        let alice = Identity::customer("Alice", "alice@shop.com", PinDigest::new("d")).unwrap();
        let root = Identity::admin("Root", "root@shop.com", PinDigest::new("d")).unwrap();
        store.insert_identity(&alice).await.unwrap();
        store.insert_identity(&root).await.unwrap();

        let ctx = ServiceContext::new(store, LoyaltyConfig::default()).unwrap();
        let resolver = StoreResolver::new(&ctx);

        let scanned = format!("  {}\n", alice.id);
        assert_eq!(resolver.resolve(&scanned).await.unwrap(), alice.id);
        assert!(matches!(
            resolver.resolve("   ").await,
            Err(LoyaltyError::InvalidInput(_))
        ));
        assert!(matches!(
            resolver.resolve("unknown").await,
            Err(LoyaltyError::NotFound { .. })
        ));
        // Admin cards do not resolve to a customer
        assert!(resolver.resolve(&root.id).await.is_err());
    }
}
