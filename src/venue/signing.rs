//! Wallet-signing collaborator seam.
//!
//! The core never holds private keys. Adapters construct a chain-tagged
//! [`SigningPayload`] and hand it to a host-supplied [`WalletSigner`], which
//! returns an opaque signature (or signed transaction body). Key custody,
//! hardware wallets, and derivation paths are entirely the collaborator's
//! concern.

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

use super::error::VenueError;

type HmacSha256 = Hmac<Sha256>;

/// Chain-specific payload handed to the wallet signer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "chain", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SigningPayload {
    /// Unsigned Cardano transaction body to witness
    CardanoTransaction {
        /// CBOR-encoded unsigned transaction, hex
        cbor_hex: String,
    },
    /// EVM venue action to sign as a structured message
    EvmAction {
        /// Canonical JSON action body
        action: serde_json::Value,
        /// Monotonic nonce, milliseconds
        nonce: u64,
    },
}

/// Signature (or witnessed transaction) produced by the collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signature {
    /// Opaque signature bytes, hex-encoded
    pub signature: String,
}

/// Failure inside the wallet-signing collaborator.
#[derive(Error, Debug, Clone)]
pub enum SigningError {
    /// Signer refused the payload
    #[error("Signer rejected payload: {0}")]
    Rejected(String),
    /// Signer unreachable
    #[error("Signer unavailable: {0}")]
    Unavailable(String),
}

impl From<SigningError> for VenueError {
    fn from(err: SigningError) -> Self {
        VenueError::Signing(err.to_string())
    }
}

/// Host-supplied signing service.
#[async_trait]
pub trait WalletSigner: Send + Sync {
    /// Sign a chain-tagged payload.
    async fn sign(&self, payload: &SigningPayload) -> Result<Signature, SigningError>;

    /// Public address of the signing wallet.
    fn address(&self) -> &str;
}

/// Deterministic digest identifying a signing request.
///
/// Used to correlate submitted payloads with audit records without ever
/// logging the payload body itself.
pub fn payload_digest(payload: &SigningPayload, key: &str) -> String {
    let body = serde_json::to_vec(payload).unwrap_or_default();
    let mut mac = HmacSha256::new_from_slice(key.as_bytes()).expect("HMAC can take any size");
    mac.update(&body);
    hex::encode(mac.finalize().into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_digest_deterministic() {
        let payload = SigningPayload::CardanoTransaction {
            cbor_hex: "84a4008182".to_string(),
        };
        let a = payload_digest(&payload, "wallet-1");
        let b = payload_digest(&payload, "wallet-1");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_payload_digest_varies_by_key() {
        let payload = SigningPayload::EvmAction {
            action: serde_json::json!({"type": "order"}),
            nonce: 1,
        };
        assert_ne!(
            payload_digest(&payload, "wallet-1"),
            payload_digest(&payload, "wallet-2")
        );
    }

    #[test]
    fn test_payload_serialization_tags_chain() {
        let payload = SigningPayload::EvmAction {
            action: serde_json::json!({"type": "cancel"}),
            nonce: 42,
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["chain"], "EVM_ACTION");
        assert_eq!(json["nonce"], 42);
    }
}
