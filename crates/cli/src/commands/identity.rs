//! Registration, login, and PIN commands

use anyhow::Result;
use loyalty_business::{AdminCredentials, LoyaltyService};
use loyalty_core::{IdentityKind, PinDigest};

use crate::RegisterKind;

pub async fn register(service: &LoyaltyService, kind: RegisterKind) -> Result<()> {
    let identity = match kind {
        RegisterKind::Customer { name, email, pin } => {
            service
                .register(IdentityKind::Customer, &name, &email, &pin, None)
                .await?
        }
        RegisterKind::Admin {
            name,
            email,
            pin,
            admin,
            admin_pin,
        } => {
            let actor = match (admin.as_deref(), admin_pin.as_deref()) {
                (Some(admin_id), Some(admin_pin)) => Some(AdminCredentials::new(admin_id, admin_pin)),
                _ => None,
            };
            service
                .register(IdentityKind::Admin, &name, &email, &pin, actor)
                .await?
        }
    };

    println!("✅ Registered {}", identity.kind);
    println!("   ID:    {}", identity.id);
    println!("   Name:  {}", identity.name);
    println!("   Email: {}", identity.email);
    Ok(())
}

pub async fn login(
    service: &LoyaltyService,
    email: &str,
    pin: Option<&str>,
    cached_digest: Option<&str>,
) -> Result<()> {
    let admin = match (pin, cached_digest) {
        (Some(pin), _) => service.login(email, pin).await?,
        (None, Some(digest)) => {
            service
                .resume_session(email, &PinDigest::new(digest))
                .await?
        }
        (None, None) => anyhow::bail!("either --pin or --cached-digest is required"),
    };

    println!("✅ Logged in as {} ({})", admin.name, admin.id);
    if pin.is_some() {
        // Terminal caches this to resume without asking for the PIN again
        println!("   Session digest: {}", admin.pin_digest.as_str());
    }
    Ok(())
}

pub async fn verify_pin(service: &LoyaltyService, identity_id: &str, pin: &str) -> Result<()> {
    let identity = service.verify_pin(identity_id, pin).await?;
    println!("✅ PIN accepted for {} {}", identity.kind, identity.name);
    Ok(())
}

pub async fn scan(service: &LoyaltyService, code: &str) -> Result<()> {
    let customer_id = service.resolve(code).await?;
    let view = service.get_balance(&customer_id).await?;
    println!("🔎 Customer {}", customer_id);
    println!("   Balance: {} points", view.balance);
    Ok(())
}
