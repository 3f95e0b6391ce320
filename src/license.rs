//! License gate checked before every viewer operation.
//!
//! # Key format
//!
//! ```text
//! {licensee}:{expiry}:{signature}
//! signature = hex(HMAC-SHA256(secret, "{licensee}:{expiry}"))
//! ```
//!
//! `expiry` is a Unix timestamp in seconds. The licensee may itself contain
//! `:`; the last two fields are always expiry and signature.

use std::time::{SystemTime, UNIX_EPOCH};

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use tracing::debug;

use crate::error::LicenseError;

type HmacSha256 = Hmac<Sha256>;

/// Gate consulted by the viewer before touching any document.
pub trait LicenseGate: Send + Sync {
    fn check(&self) -> Result<(), LicenseError>;
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn compute_signature(secret: &[u8], licensee: &str, expiry: u64) -> Result<Vec<u8>, LicenseError> {
    let mut mac = HmacSha256::new_from_slice(secret).map_err(|_| LicenseError::Malformed)?;
    mac.update(format!("{}:{}", licensee, expiry).as_bytes());
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Create a license key for `licensee` valid until `expiry` (Unix seconds).
pub fn issue_license(secret: impl AsRef<[u8]>, licensee: &str, expiry: u64) -> Result<String, LicenseError> {
    if licensee.is_empty() {
        return Err(LicenseError::Malformed);
    }
    let signature = compute_signature(secret.as_ref(), licensee, expiry)?;
    Ok(format!("{}:{}:{}", licensee, expiry, hex::encode(signature)))
}

/// Parsed, not yet verified, license key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LicenseKey {
    pub licensee: String,
    pub expiry: u64,
    signature: Vec<u8>,
}

impl LicenseKey {
    pub fn parse(key: &str) -> Result<Self, LicenseError> {
        let mut parts = key.trim().rsplitn(3, ':');
        let signature = parts.next().ok_or(LicenseError::Malformed)?;
        let expiry = parts.next().ok_or(LicenseError::Malformed)?;
        let licensee = parts.next().ok_or(LicenseError::Malformed)?;

        if licensee.is_empty() {
            return Err(LicenseError::Malformed);
        }
        Ok(Self {
            licensee: licensee.to_string(),
            expiry: expiry.parse().map_err(|_| LicenseError::Malformed)?,
            signature: hex::decode(signature).map_err(|_| LicenseError::Malformed)?,
        })
    }
}

/// HMAC-signed license verified against a shared secret.
#[derive(Clone)]
pub struct SignedLicense {
    secret: Vec<u8>,
    key: Option<String>,
}

impl SignedLicense {
    /// `key` is `None` when no license was configured.
    pub fn new(secret: impl AsRef<[u8]>, key: Option<String>) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
            key,
        }
    }

    /// Verify the configured key at time `now`.
    pub fn check_at(&self, now: u64) -> Result<LicenseKey, LicenseError> {
        let raw = self.key.as_deref().ok_or(LicenseError::Missing)?;
        let key = LicenseKey::parse(raw)?;

        if now > key.expiry {
            return Err(LicenseError::Expired {
                expired_at: key.expiry,
                current_time: now,
            });
        }

        let expected = compute_signature(&self.secret, &key.licensee, key.expiry)?;
        if key.signature.ct_eq(&expected).into() {
            Ok(key)
        } else {
            Err(LicenseError::InvalidSignature)
        }
    }
}

impl std::fmt::Debug for SignedLicense {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignedLicense")
            .field("configured", &self.key.is_some())
            .finish()
    }
}

impl LicenseGate for SignedLicense {
    fn check(&self) -> Result<(), LicenseError> {
        let key = self.check_at(now_secs())?;
        debug!(licensee = %key.licensee, expiry = key.expiry, "License verified");
        Ok(())
    }
}
