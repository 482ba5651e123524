//! # Loyalty Business
//!
//! Service layer over the ledger store: balance reads, the credit/debit
//! append protocol, the PIN gate, and registration.

pub mod auth;
pub mod balance;
pub mod config;
pub mod error;
pub mod facade;
pub mod ledger;
pub mod registration;
pub mod resolver;
pub mod services;

pub use auth::{AdminCredentials, CredentialGate};
pub use balance::BalanceService;
pub use config::{LoyaltyConfig, PinSchemeKind};
pub use error::{LoyaltyError, LoyaltyResult};
pub use facade::LoyaltyService;
pub use ledger::{AppendReceipt, AppendRequest, LedgerService};
pub use registration::{NewIdentity, RegistrationService};
pub use resolver::{IdentityResolver, StoreResolver};
pub use services::ServiceContext;
