//! # Credential Module
//!
//! Hash và verify PIN. PIN thô không bao giờ được lưu.
//!
//! Hai scheme:
//! - `legacy`: SHA-256 không salt, hex lowercase 64 ký tự (tương thích dữ liệu cũ)
//! - `salted`: PBKDF2-HMAC-SHA256 với salt ngẫu nhiên,
//!   format `pbkdf2-sha256$<iterations>$<salt hex>$<hash hex>`
//!
//! [`CredentialVerifier::verify`] nhận diện scheme từ format của digest, nên
//! đổi scheme cho PIN mới không ảnh hưởng digest đã lưu.

use crate::error::{CoreError, CoreResult};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use subtle::ConstantTimeEq;

const PBKDF2_PREFIX: &str = "pbkdf2-sha256";
const SALT_LEN: usize = 16;

/// PIN digest đã lưu.
///
/// `Debug`/`Display` không in giá trị thật để digest không lọt vào log.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PinDigest(String);

impl PinDigest {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Digest có phải legacy SHA-256 không
    pub fn is_legacy(&self) -> bool {
        self.0.len() == 64 && self.0.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
    }
}

impl fmt::Debug for PinDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PinDigest(<redacted>)")
    }
}

impl fmt::Display for PinDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<redacted>")
    }
}

/// Scheme dùng để hash PIN mới.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PinScheme {
    Legacy,
    Salted { iterations: u32 },
}

impl Default for PinScheme {
    fn default() -> Self {
        PinScheme::Salted {
            iterations: Pbkdf2PinHasher::DEFAULT_ITERATIONS,
        }
    }
}

/// Hash/verify contract. Đổi implementation không đổi caller.
pub trait PinHasher: Send + Sync {
    fn hash(&self, pin: &str) -> CoreResult<PinDigest>;

    fn verify(&self, pin: &str, stored: &PinDigest) -> bool;
}

/// SHA-256 không salt: cùng PIN luôn cho cùng digest.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256PinHasher;

impl PinHasher for Sha256PinHasher {
    fn hash(&self, pin: &str) -> CoreResult<PinDigest> {
        let mut hasher = Sha256::new();
        hasher.update(pin.as_bytes());
        Ok(PinDigest(hex::encode(hasher.finalize())))
    }

    fn verify(&self, pin: &str, stored: &PinDigest) -> bool {
        match self.hash(pin) {
            Ok(computed) => digests_match(&computed, stored),
            Err(_) => false,
        }
    }
}

/// PBKDF2-HMAC-SHA256, output 32 bytes, salt ngẫu nhiên 16 bytes.
#[derive(Debug, Clone, Copy)]
pub struct Pbkdf2PinHasher {
    iterations: u32,
}

impl Pbkdf2PinHasher {
    pub const DEFAULT_ITERATIONS: u32 = 100_000;
    /// Digest có iterations lớn hơn bị coi là hỏng
    pub const MAX_ITERATIONS: u32 = 10 * Self::DEFAULT_ITERATIONS;

    pub fn new(iterations: u32) -> Self {
        Self {
            iterations: iterations.clamp(1, Self::MAX_ITERATIONS),
        }
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    /// Hash với salt cho trước (deterministic)
    pub fn hash_with_salt(&self, pin: &str, salt: &[u8]) -> CoreResult<PinDigest> {
        let derived = pbkdf2_sha256(pin.as_bytes(), salt, self.iterations);
        Ok(PinDigest(format!(
            "{}${}${}${}",
            PBKDF2_PREFIX,
            self.iterations,
            hex::encode(salt),
            hex::encode(derived)
        )))
    }
}

impl Default for Pbkdf2PinHasher {
    fn default() -> Self {
        Self::new(Self::DEFAULT_ITERATIONS)
    }
}

impl PinHasher for Pbkdf2PinHasher {
    fn hash(&self, pin: &str) -> CoreResult<PinDigest> {
        let mut salt = [0u8; SALT_LEN];
        rand::thread_rng().fill_bytes(&mut salt);
        self.hash_with_salt(pin, &salt)
    }

    fn verify(&self, pin: &str, stored: &PinDigest) -> bool {
        let Some((iterations, salt, expected)) = parse_pbkdf2(stored.as_str()) else {
            return false;
        };
        let derived = pbkdf2_sha256(pin.as_bytes(), &salt, iterations);
        derived.as_slice().ct_eq(expected.as_slice()).into()
    }
}

/// PIN verifier: hash theo scheme đã cấu hình, verify mọi scheme đã biết.
#[derive(Debug, Clone, Copy, Default)]
pub struct CredentialVerifier {
    scheme: PinScheme,
}

impl CredentialVerifier {
    pub fn new(scheme: PinScheme) -> Self {
        Self { scheme }
    }

    /// Verifier dùng SHA-256 không salt
    pub fn legacy() -> Self {
        Self::new(PinScheme::Legacy)
    }

    pub fn scheme(&self) -> PinScheme {
        self.scheme
    }
}

impl PinHasher for CredentialVerifier {
    fn hash(&self, pin: &str) -> CoreResult<PinDigest> {
        match self.scheme {
            PinScheme::Legacy => Sha256PinHasher.hash(pin),
            PinScheme::Salted { iterations } => Pbkdf2PinHasher::new(iterations).hash(pin),
        }
    }

    fn verify(&self, pin: &str, stored: &PinDigest) -> bool {
        if stored.as_str().starts_with(PBKDF2_PREFIX) {
            // iterations lấy từ digest, không phải từ config
            Pbkdf2PinHasher::default().verify(pin, stored)
        } else if stored.is_legacy() {
            Sha256PinHasher.verify(pin, stored)
        } else {
            false
        }
    }
}

/// So sánh hai digest constant-time (dùng khi resume session từ digest cache)
pub fn digests_match(a: &PinDigest, b: &PinDigest) -> bool {
    let (a, b) = (a.as_str().as_bytes(), b.as_str().as_bytes());
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

/// PIN phải là chữ số ASCII, độ dài trong `[min_len, max_len]`.
pub fn validate_pin_format(pin: &str, min_len: usize, max_len: usize) -> CoreResult<()> {
    if !pin.bytes().all(|b| b.is_ascii_digit()) {
        return Err(CoreError::InvalidPinFormat(
            "PIN must contain digits only".to_string(),
        ));
    }
    if pin.len() < min_len || pin.len() > max_len {
        return Err(CoreError::InvalidPinFormat(format!(
            "PIN must be {}-{} digits",
            min_len, max_len
        )));
    }
    Ok(())
}

fn parse_pbkdf2(digest: &str) -> Option<(u32, Vec<u8>, Vec<u8>)> {
    let mut parts = digest.split('$');
    if parts.next()? != PBKDF2_PREFIX {
        return None;
    }
    let iterations = parts
        .next()?
        .parse::<u32>()
        .ok()
        .filter(|i| (1..=Pbkdf2PinHasher::MAX_ITERATIONS).contains(i))?;
    let salt = hex::decode(parts.next()?).ok()?;
    let hash = hex::decode(parts.next()?).ok()?;
    if parts.next().is_some() || hash.len() != 32 {
        return None;
    }
    Some((iterations, salt, hash))
}

/// PBKDF2-HMAC-SHA256, dkLen = 32
fn pbkdf2_sha256(password: &[u8], salt: &[u8], iterations: u32) -> [u8; 32] {
    let mut out = [0u8; 32];
    pbkdf2::pbkdf2_hmac::<Sha256>(password, salt, iterations, &mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHA256_1234: &str = "03ac674216f3e15c761ee1a5e255f067953623c8b388b4459e13f978d7c846f4";

    #[test]
    fn test_legacy_hash_is_deterministic() {
        let first = Sha256PinHasher.hash("1234").unwrap();
        let second = Sha256PinHasher.hash("1234").unwrap();

        assert_eq!(first, second);
        assert_eq!(first.as_str(), SHA256_1234);
        assert!(first.is_legacy());
    }

    #[test]
    fn test_legacy_verify() {
        let stored = PinDigest::new(SHA256_1234);
        assert!(Sha256PinHasher.verify("1234", &stored));
        assert!(!Sha256PinHasher.verify("4321", &stored));
    }

    #[test]
    fn test_pbkdf2_known_vector() {
        // PBKDF2-HMAC-SHA256("password", "salt", 1), dkLen = 32
        let derived = pbkdf2_sha256(b"password", b"salt", 1);
        assert_eq!(
            hex::encode(derived),
            "120fb6cffcf8b32c43e7225256c4f837a86548c92ccc35480805987cb70be17b"
        );
    }

    #[test]
    fn test_pbkdf2_known_vectors_multiple_iterations() {
        assert_eq!(
            hex::encode(pbkdf2_sha256(b"password", b"salt", 2)),
            "ae4d0c95af6b46d32d0adff928f06dd02a303f8ef3c251dfd6e2d85a95474c43"
        );
        assert_eq!(
            hex::encode(pbkdf2_sha256(b"password", b"salt", 4096)),
            "c5e478d59288c841aa530db6845c4c8d962893a001ce4e11a4963873aa98134a"
        );
    }

    #[test]
    fn test_iteration_count_is_bounded() {
        let verifier = CredentialVerifier::default();
        let hash = "00".repeat(32);

        let huge = PinDigest::new(format!("pbkdf2-sha256$4294967295$00${hash}"));
        assert!(parse_pbkdf2(huge.as_str()).is_none());
        assert!(!verifier.verify("1234", &huge));

        let over = Pbkdf2PinHasher::MAX_ITERATIONS + 1;
        assert!(parse_pbkdf2(&format!("pbkdf2-sha256${over}$00${hash}")).is_none());
        let at_cap = Pbkdf2PinHasher::MAX_ITERATIONS;
        assert!(parse_pbkdf2(&format!("pbkdf2-sha256${at_cap}$00${hash}")).is_some());

        assert_eq!(Pbkdf2PinHasher::new(u32::MAX).iterations(), Pbkdf2PinHasher::MAX_ITERATIONS);
    }

    #[test]
    fn test_salted_hash_with_fixed_salt_is_deterministic() {
        let hasher = Pbkdf2PinHasher::new(10);
        let a = hasher.hash_with_salt("1234", b"fixed-salt").unwrap();
        let b = hasher.hash_with_salt("1234", b"fixed-salt").unwrap();
        assert_eq!(a, b);
        assert!(a.as_str().starts_with("pbkdf2-sha256$10$"));
        assert!(!a.is_legacy());
    }

    #[test]
    fn test_salted_hash_uses_fresh_salt() {
        let hasher = Pbkdf2PinHasher::new(10);
        let a = hasher.hash("1234").unwrap();
        let b = hasher.hash("1234").unwrap();

        assert_ne!(a, b);
        assert!(hasher.verify("1234", &a));
        assert!(hasher.verify("1234", &b));
        assert!(!hasher.verify("0000", &a));
    }

    #[test]
    fn test_verifier_accepts_both_schemes() {
        let verifier = CredentialVerifier::new(PinScheme::Salted { iterations: 10 });
        let salted = verifier.hash("2468").unwrap();
        let legacy = PinDigest::new(SHA256_1234);

        assert!(verifier.verify("2468", &salted));
        assert!(verifier.verify("1234", &legacy));
        assert!(!verifier.verify("1234", &salted));
        assert!(!verifier.verify("2468", &legacy));
    }

    #[test]
    fn test_verifier_rejects_malformed_digest() {
        let verifier = CredentialVerifier::default();
        assert!(!verifier.verify("1234", &PinDigest::new("")));
        assert!(!verifier.verify("1234", &PinDigest::new("pbkdf2-sha256$0$00$00")));
        assert!(!verifier.verify("1234", &PinDigest::new("pbkdf2-sha256$10$zz$00")));
        assert!(!verifier.verify("1234", &PinDigest::new("1234")));
    }

    #[test]
    fn test_legacy_verifier_hashes_legacy() {
        let verifier = CredentialVerifier::legacy();
        assert_eq!(verifier.hash("1234").unwrap().as_str(), SHA256_1234);
    }

    #[test]
    fn test_digest_is_redacted_in_debug() {
        let digest = PinDigest::new(SHA256_1234);
        assert!(!format!("{:?}", digest).contains("03ac"));
        assert!(!digest.to_string().contains("03ac"));
    }

    #[test]
    fn test_digests_match() {
        let a = PinDigest::new(SHA256_1234);
        assert!(digests_match(&a, &a.clone()));
        assert!(!digests_match(&a, &PinDigest::new("03ac")));
    }

    #[test]
    fn test_validate_pin_format() {
        assert!(validate_pin_format("1234", 4, 8).is_ok());
        assert!(validate_pin_format("12345678", 4, 8).is_ok());
        assert!(validate_pin_format("123", 4, 8).is_err());
        assert!(validate_pin_format("123456789", 4, 8).is_err());
        assert!(validate_pin_format("12a4", 4, 8).is_err());
        assert!(validate_pin_format("", 4, 8).is_err());
    }
}
