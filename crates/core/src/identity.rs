//! # Identity Module
//!
//! Định nghĩa IdentityKind và Identity cho hai vai trò trong hệ thống.
//! - Customer: tích điểm / tiêu điểm, sở hữu transaction history
//! - Admin: người thực hiện giao dịch, là chủ thể của PIN gate

use crate::credential::PinDigest;
use crate::error::{CoreError, CoreResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Loại identity trong hệ thống.
///
/// Customer và Admin đối xứng nhau, chỉ Customer có transaction history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentityKind {
    /// Khách hàng - có ledger điểm
    Customer,
    /// Quản trị viên - thực hiện credit/debit, đăng ký admin mới
    Admin,
}

impl IdentityKind {
    /// Trả về code string cho DB
    pub fn as_str(&self) -> &'static str {
        match self {
            IdentityKind::Customer => "customer",
            IdentityKind::Admin => "admin",
        }
    }

    /// Parse từ string
    pub fn parse(s: &str) -> CoreResult<Self> {
        match s.to_lowercase().as_str() {
            "customer" => Ok(IdentityKind::Customer),
            "admin" => Ok(IdentityKind::Admin),
            other => Err(CoreError::UnknownIdentityKind(other.to_string())),
        }
    }

    /// Kiểm tra identity có sở hữu ledger không
    pub fn has_ledger(&self) -> bool {
        matches!(self, IdentityKind::Customer)
    }
}

impl fmt::Display for IdentityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Các field có thể query trên collection identities (`queryByField`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityField {
    Email,
    Name,
}

impl IdentityField {
    /// Tên column trong DB
    pub fn column(&self) -> &'static str {
        match self {
            IdentityField::Email => "email",
            IdentityField::Name => "name",
        }
    }
}

/// Thông tin một Customer hoặc Administrator.
///
/// `id` được sinh một lần khi đăng ký và không đổi. `pin_digest` cũng chỉ
/// được ghi lúc đăng ký.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Opaque id (UUID v4)
    pub id: String,
    /// Customer hoặc Admin
    pub kind: IdentityKind,
    /// Tên hiển thị
    pub name: String,
    /// Email liên hệ (đã normalize)
    pub email: String,
    /// PIN digest - không bao giờ là PIN thô
    pub pin_digest: PinDigest,
    /// Thời gian đăng ký
    pub created_at: DateTime<Utc>,
}

impl Identity {
    /// Tạo Identity mới với id ngẫu nhiên.
    ///
    /// Name và email được validate; email được normalize (trim + lowercase).
    pub fn new(
        kind: IdentityKind,
        name: &str,
        email: &str,
        pin_digest: PinDigest,
    ) -> CoreResult<Self> {
        let name = name.trim();
        if name.is_empty() {
            return Err(CoreError::InvalidName("name cannot be empty".to_string()));
        }
        let email = normalize_email(email);
        validate_email(&email)?;

        Ok(Self {
            id: Self::generate_id(),
            kind,
            name: name.to_string(),
            email,
            pin_digest,
            created_at: Utc::now(),
        })
    }

    /// Tạo Customer
    pub fn customer(name: &str, email: &str, pin_digest: PinDigest) -> CoreResult<Self> {
        Self::new(IdentityKind::Customer, name, email, pin_digest)
    }

    /// Tạo Admin
    pub fn admin(name: &str, email: &str, pin_digest: PinDigest) -> CoreResult<Self> {
        Self::new(IdentityKind::Admin, name, email, pin_digest)
    }

    /// Generate opaque id mới
    pub fn generate_id() -> String {
        Uuid::new_v4().to_string()
    }

    pub fn is_admin(&self) -> bool {
        self.kind == IdentityKind::Admin
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}, {})", self.name, self.kind, self.id)
    }
}

/// Normalize email để so sánh uniqueness: trim + lowercase
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Validate email ở mức cú pháp: đúng một `@`, local part không rỗng,
/// domain có dấu chấm, không có khoảng trắng.
pub fn validate_email(email: &str) -> CoreResult<()> {
    let invalid = || CoreError::InvalidEmail(email.to_string());

    if email.is_empty() || email.chars().any(char::is_whitespace) {
        return Err(invalid());
    }

    let mut parts = email.split('@');
    let (local, domain) = match (parts.next(), parts.next(), parts.next()) {
        (Some(local), Some(domain), None) => (local, domain),
        _ => return Err(invalid()),
    };

    if local.is_empty()
        || domain.starts_with('.')
        || domain.ends_with('.')
        || !domain.contains('.')
        || domain.contains("..")
    {
        return Err(invalid());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn digest() -> PinDigest {
        PinDigest::new("03ac674216f3e15c761ee1a5e255f067953623c8b388b4459e13f978d7c846f4")
    }

    #[test]
    fn test_identity_kind_roundtrip() {
        assert_eq!(IdentityKind::parse("customer").unwrap(), IdentityKind::Customer);
        assert_eq!(IdentityKind::parse("ADMIN").unwrap(), IdentityKind::Admin);
        assert!(IdentityKind::parse("auditor").is_err());
        assert_eq!(IdentityKind::Admin.to_string(), "admin");
        assert!(IdentityKind::Customer.has_ledger());
        assert!(!IdentityKind::Admin.has_ledger());
    }

    #[test]
    fn test_identity_new_normalizes_email() {
        let customer = Identity::customer(" Alice ", "  Alice@Shop.COM ", digest()).unwrap();
        assert_eq!(customer.name, "Alice");
        assert_eq!(customer.email, "alice@shop.com");
        assert_eq!(customer.kind, IdentityKind::Customer);
        assert!(Uuid::parse_str(&customer.id).is_ok());
    }

    #[test]
    fn test_identity_ids_are_unique() {
        let a = Identity::admin("Bob", "bob@shop.com", digest()).unwrap();
        let b = Identity::admin("Bob", "bob2@shop.com", digest()).unwrap();
        assert_ne!(a.id, b.id);
        assert!(a.is_admin());
    }

    #[test]
    fn test_identity_rejects_empty_name() {
        let err = Identity::customer("   ", "a@b.co", digest()).unwrap_err();
        assert!(matches!(err, CoreError::InvalidName(_)));
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email("alice@shop.com").is_ok());
        assert!(validate_email("a.b+c@mail.shop.vn").is_ok());

        for bad in [
            "",
            "alice",
            "alice@",
            "@shop.com",
            "alice@shop",
            "alice@@shop.com",
            "al ice@shop.com",
            "alice@.shop.com",
            "alice@shop..com",
        ] {
            assert!(validate_email(bad).is_err(), "expected invalid: {bad:?}");
        }
    }
}
