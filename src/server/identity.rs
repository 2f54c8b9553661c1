// SPDX-License-Identifier: GPL-3.0-only

//! Wallet sign-in support
//!
//! Nonces are handed out together with a cookie holding
//! `<nonce>.<expiry>.<hmac>`, so completing sign-in needs no server-side
//! session. A sign-in attempt is first checked structurally (nonce, address,
//! validity window), then a [`SiweVerifier`] checks that the signature was
//! made by the address in the message. The default verifier recovers the
//! signer of an EIP-191 `personal_sign` signature.

use crate::api::VerifyRequest;
use crate::constants::identity::{NONCE_COOKIE, NONCE_TTL_SECS, VERIFY_ENDPOINT};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use serde_json::{Map, Value, json};
use sha2::Sha256;
use sha3::{Digest, Keccak256};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

type HmacSha256 = Hmac<Sha256>;

/// Fresh alphanumeric nonce
pub fn generate_nonce() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Signs and checks nonce cookies
#[derive(Clone)]
pub struct NonceSigner {
    key: Vec<u8>,
    ttl_secs: i64,
}

impl std::fmt::Debug for NonceSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NonceSigner")
            .field("ttl_secs", &self.ttl_secs)
            .finish_non_exhaustive()
    }
}

impl NonceSigner {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            key: secret.to_vec(),
            ttl_secs: NONCE_TTL_SECS,
        }
    }

    /// Signer with a random key; cookies do not survive a restart
    pub fn ephemeral() -> Self {
        let key = format!(
            "{}{}",
            uuid::Uuid::new_v4().simple(),
            uuid::Uuid::new_v4().simple()
        );
        Self::new(key.as_bytes())
    }

    pub fn with_ttl(mut self, ttl_secs: i64) -> Self {
        self.ttl_secs = ttl_secs;
        self
    }

    fn mac(&self, payload: &str) -> HmacSha256 {
        // HMAC accepts keys of any length
        let mut mac = match HmacSha256::new_from_slice(&self.key) {
            Ok(mac) => mac,
            Err(_) => unreachable!("HMAC-SHA256 takes keys of any size"),
        };
        mac.update(payload.as_bytes());
        mac
    }

    /// Cookie value for `nonce`, valid for the signer's lifetime from `now`
    pub fn sign(&self, nonce: &str, now: DateTime<Utc>) -> String {
        let expiry = now.timestamp() + self.ttl_secs;
        let payload = format!("{}.{}", nonce, expiry);
        let signature = hex::encode(self.mac(&payload).finalize().into_bytes());
        format!("{}.{}", payload, signature)
    }

    /// Nonce inside a cookie value, if the signature holds and it has not expired
    pub fn verify(&self, cookie: &str, now: DateTime<Utc>) -> Option<String> {
        let mut parts = cookie.trim().rsplitn(3, '.');
        let signature = parts.next()?;
        let expiry = parts.next()?;
        let nonce = parts.next()?;

        let payload = format!("{}.{}", nonce, expiry);
        let signature = hex::decode(signature).ok()?;
        if self.mac(&payload).verify_slice(&signature).is_err() {
            debug!("Nonce cookie signature mismatch");
            return None;
        }
        let expiry: i64 = expiry.parse().ok()?;
        if now.timestamp() > expiry {
            debug!("Nonce cookie expired");
            return None;
        }
        Some(nonce.to_string())
    }

    /// `Set-Cookie` header value
    pub fn set_cookie_header(&self, value: &str) -> String {
        format!(
            "{}={}; Path=/; Max-Age={}; Secure; HttpOnly; SameSite=Lax",
            NONCE_COOKIE, value, self.ttl_secs
        )
    }
}

/// Value of a named cookie in a `Cookie` header
pub fn cookie_value<'a>(header: &'a str, name: &str) -> Option<&'a str> {
    header.split(';').find_map(|pair| {
        let (key, value) = pair.trim().split_once('=')?;
        (key == name).then_some(value)
    })
}

/// Why a sign-in message was rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SiweError {
    #[error("Missing sign-in message")]
    MissingMessage,
    #[error("Malformed sign-in message: {0}")]
    Malformed(String),
    #[error("Nonce mismatch")]
    NonceMismatch,
    #[error("Address mismatch")]
    AddressMismatch,
    #[error("Missing signature")]
    MissingSignature,
    #[error("Invalid signature: {0}")]
    InvalidSignature(String),
    #[error("Signature was not made by {0}")]
    SignerMismatch(String),
    #[error("Sign-in message has expired")]
    Expired,
    #[error("Sign-in message is not yet valid")]
    NotYetValid,
}

/// Parsed sign-in message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiweMessage {
    pub domain: String,
    pub address: String,
    pub statement: Option<String>,
    pub uri: String,
    pub version: String,
    pub chain_id: String,
    pub nonce: String,
    pub issued_at: DateTime<Utc>,
    pub expiration_time: Option<DateTime<Utc>>,
    pub not_before: Option<DateTime<Utc>>,
}

const HEADER_SUFFIX: &str = " wants you to sign in with your Ethereum account:";

fn parse_time(field: &str, value: &str) -> Result<DateTime<Utc>, SiweError> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| SiweError::Malformed(format!("{}: {}", field, e)))
}

impl SiweMessage {
    /// Parse the text form of a sign-in message
    pub fn parse(text: &str) -> Result<Self, SiweError> {
        let mut lines = text.lines();
        let domain = lines
            .next()
            .and_then(|l| l.strip_suffix(HEADER_SUFFIX))
            .filter(|d| !d.is_empty())
            .ok_or_else(|| SiweError::Malformed("header".to_string()))?
            .to_string();
        let address = lines
            .next()
            .map(str::trim)
            .filter(|a| a.starts_with("0x") && a.len() > 2)
            .ok_or_else(|| SiweError::Malformed("address".to_string()))?
            .to_string();

        let mut statement = None;
        let mut fields = HashMap::new();
        for line in lines {
            if line.trim().is_empty() || line.starts_with("- ") {
                continue;
            }
            match line.split_once(": ") {
                Some((key, value)) if is_field(key) => {
                    fields.insert(key, value.trim());
                }
                _ if fields.is_empty() && statement.is_none() => {
                    statement = Some(line.trim().to_string());
                }
                _ => {}
            }
        }

        let required = |key: &str| {
            fields
                .get(key)
                .map(|v| v.to_string())
                .ok_or_else(|| SiweError::Malformed(key.to_string()))
        };

        Ok(Self {
            domain,
            address,
            statement,
            uri: required("URI")?,
            version: required("Version")?,
            chain_id: required("Chain ID")?,
            nonce: required("Nonce")?,
            issued_at: parse_time("Issued At", &required("Issued At")?)?,
            expiration_time: fields
                .get("Expiration Time")
                .map(|v| parse_time("Expiration Time", v))
                .transpose()?,
            not_before: fields
                .get("Not Before")
                .map(|v| parse_time("Not Before", v))
                .transpose()?,
        })
    }
}

fn is_field(key: &str) -> bool {
    matches!(
        key,
        "URI"
            | "Version"
            | "Chain ID"
            | "Nonce"
            | "Issued At"
            | "Expiration Time"
            | "Not Before"
            | "Request ID"
            | "Resources"
    )
}

/// A sign-in attempt that passed the structural checks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiweAttempt {
    pub message: SiweMessage,
    /// Message text exactly as signed
    pub text: String,
    pub signature: String,
}

/// Check a wallet auth payload `{message, signature, address, ...}` against `nonce`
pub fn check_siwe_payload(
    payload: &Value,
    nonce: &str,
    now: DateTime<Utc>,
) -> Result<SiweAttempt, SiweError> {
    let text = payload
        .get("message")
        .and_then(Value::as_str)
        .ok_or(SiweError::MissingMessage)?;
    let message = SiweMessage::parse(text)?;

    if message.nonce != nonce {
        return Err(SiweError::NonceMismatch);
    }
    if let Some(address) = payload.get("address").and_then(Value::as_str) {
        if !address.eq_ignore_ascii_case(&message.address) {
            return Err(SiweError::AddressMismatch);
        }
    }
    let signature = payload
        .get("signature")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or(SiweError::MissingSignature)?
        .to_string();
    if message.expiration_time.is_some_and(|t| now >= t) {
        return Err(SiweError::Expired);
    }
    if message.not_before.is_some_and(|t| now < t) {
        return Err(SiweError::NotYetValid);
    }
    Ok(SiweAttempt {
        message,
        text: text.to_string(),
        signature,
    })
}

/// EIP-191 `personal_sign` digest of a text message
pub fn personal_message_hash(message: &str) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(format!("\x19Ethereum Signed Message:\n{}", message.len()).as_bytes());
    hasher.update(message.as_bytes());
    hasher.finalize().into()
}

/// Lowercase `0x` address of a secp256k1 public key
pub fn address_of(key: &VerifyingKey) -> String {
    let point = key.as_affine().to_encoded_point(false);
    let hash = Keccak256::digest(&point.as_bytes()[1..]);
    format!("0x{}", hex::encode(&hash[12..]))
}

/// Address that produced a 65-byte `r || s || v` signature over `message`
pub fn recover_signer(message: &str, signature: &str) -> Result<String, SiweError> {
    let invalid = |reason: String| SiweError::InvalidSignature(reason);

    let raw = hex::decode(signature.trim().trim_start_matches("0x"))
        .map_err(|e| invalid(e.to_string()))?;
    if raw.len() != 65 {
        return Err(invalid(format!("expected 65 bytes, got {}", raw.len())));
    }
    let parsed = Signature::from_slice(&raw[..64]).map_err(|e| invalid(e.to_string()))?;
    let v = match raw[64] {
        v @ (27 | 28) => v - 27,
        v @ (0 | 1) => v,
        v => return Err(invalid(format!("unexpected recovery byte {}", v))),
    };
    let recovery_id =
        RecoveryId::from_byte(v).ok_or_else(|| invalid(format!("recovery byte {}", v)))?;

    // Recovery expects low-s; flipping s flips the parity of R
    let (parsed, recovery_id) = match parsed.normalize_s() {
        Some(low) => (
            low,
            RecoveryId::new(!recovery_id.is_y_odd(), recovery_id.is_x_reduced()),
        ),
        None => (parsed, recovery_id),
    };

    let key =
        VerifyingKey::recover_from_prehash(&personal_message_hash(message), &parsed, recovery_id)
            .map_err(|e| invalid(e.to_string()))?;
    Ok(address_of(&key))
}

/// Signature check for sign-in attempts
#[async_trait]
pub trait SiweVerifier: Send + Sync {
    /// Succeeds if the attempt's signature was made by its message address
    async fn verify(&self, attempt: &SiweAttempt) -> Result<(), SiweError>;
}

/// Verifier for externally owned accounts (`personal_sign` + key recovery)
#[derive(Debug, Clone, Copy, Default)]
pub struct EcdsaSiweVerifier;

#[async_trait]
impl SiweVerifier for EcdsaSiweVerifier {
    async fn verify(&self, attempt: &SiweAttempt) -> Result<(), SiweError> {
        let signer = recover_signer(&attempt.text, &attempt.signature)?;
        if !signer.eq_ignore_ascii_case(&attempt.message.address) {
            debug!(signer = %signer, claimed = %attempt.message.address, "Signer mismatch");
            return Err(SiweError::SignerMismatch(attempt.message.address.clone()));
        }
        Ok(())
    }
}

/// Verification result from the identity provider
#[derive(Debug, Clone, PartialEq)]
pub struct ProofVerdict {
    pub success: bool,
    /// Provider response, with `success` set
    pub body: Value,
}

/// Cloud proof verification
#[async_trait]
pub trait ProofVerifier: Send + Sync {
    async fn verify(&self, app_id: &str, request: &VerifyRequest) -> Result<ProofVerdict, String>;
}

/// Verifier calling the provider's HTTP endpoint
#[derive(Debug, Clone)]
pub struct HttpProofVerifier {
    http: reqwest::Client,
    endpoint: String,
}

impl HttpProofVerifier {
    pub fn new() -> Result<Self, String> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| e.to_string())?;
        Ok(Self {
            http,
            endpoint: VERIFY_ENDPOINT.to_string(),
        })
    }

    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = endpoint.trim_end_matches('/').to_string();
        self
    }
}

/// Request body: the proof fields plus action and signal
fn proof_body(request: &VerifyRequest) -> Value {
    let mut body = match &request.payload {
        Value::Object(map) => map.clone(),
        _ => Map::new(),
    };
    body.insert("action".to_string(), json!(request.action));
    if let Some(signal) = &request.signal {
        body.insert("signal".to_string(), json!(signal));
    }
    Value::Object(body)
}

#[async_trait]
impl ProofVerifier for HttpProofVerifier {
    async fn verify(&self, app_id: &str, request: &VerifyRequest) -> Result<ProofVerdict, String> {
        let url = format!("{}/{}", self.endpoint, app_id);
        let response = self
            .http
            .post(url)
            .json(&proof_body(request))
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let success = response.status().is_success();
        let mut body = response
            .json::<Value>()
            .await
            .unwrap_or_else(|_| Value::Object(Map::new()));
        if !body.is_object() {
            body = json!({ "detail": body });
        }
        if let Some(map) = body.as_object_mut() {
            map.insert("success".to_string(), Value::Bool(success));
        }
        if !success {
            warn!(action = %request.action, "Proof verification rejected");
        }
        Ok(ProofVerdict { success, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    fn message(nonce: &str, expires: &str) -> String {
        format!(
            "app.ping.example wants you to sign in with your Ethereum account:\n\
             0xAbC0000000000000000000000000000000000001\n\
             \n\
             Sign in to Ping!\n\
             \n\
             URI: https://app.ping.example\n\
             Version: 1\n\
             Chain ID: 480\n\
             Nonce: {}\n\
             Issued At: 2026-03-01T11:59:00Z\n\
             Expiration Time: {}",
            nonce, expires
        )
    }

    fn payload(nonce: &str, expires: &str) -> Value {
        json!({
            "status": "success",
            "message": message(nonce, expires),
            "signature": "0xdeadbeef",
            "address": "0xabc0000000000000000000000000000000000001",
            "version": 1,
        })
    }

    #[test]
    fn test_nonce_is_alphanumeric() {
        let nonce = generate_nonce();
        assert_eq!(nonce.len(), 32);
        assert!(nonce.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_cookie_round_trip() {
        let signer = NonceSigner::new(b"secret");
        let cookie = signer.sign("abc123", now());
        assert_eq!(signer.verify(&cookie, now()).as_deref(), Some("abc123"));
    }

    #[test]
    fn test_tampered_cookie_rejected() {
        let signer = NonceSigner::new(b"secret");
        let cookie = signer.sign("abc123", now());
        let tampered = cookie.replacen("abc123", "abc124", 1);
        assert_eq!(signer.verify(&tampered, now()), None);
        assert_eq!(NonceSigner::new(b"other").verify(&cookie, now()), None);
        assert_eq!(signer.verify("garbage", now()), None);
    }

    #[test]
    fn test_expired_cookie_rejected() {
        let signer = NonceSigner::new(b"secret");
        let cookie = signer.sign("abc123", now());
        let later = now() + chrono::Duration::seconds(NONCE_TTL_SECS + 1);
        assert_eq!(signer.verify(&cookie, later), None);
    }

    #[test]
    fn test_cookie_header_parsing() {
        let header = "theme=dark; siwe=abc.1.ff; other=1";
        assert_eq!(cookie_value(header, "siwe"), Some("abc.1.ff"));
        assert_eq!(cookie_value(header, "missing"), None);
        let set = NonceSigner::new(b"k").set_cookie_header("v");
        assert!(set.starts_with("siwe=v;"));
        assert!(set.contains("HttpOnly") && set.contains("Secure"));
    }

    #[test]
    fn test_siwe_message_parse() {
        let parsed = SiweMessage::parse(&message("n1", "2026-03-01T12:05:00Z")).unwrap();
        assert_eq!(parsed.domain, "app.ping.example");
        assert_eq!(parsed.statement.as_deref(), Some("Sign in to Ping!"));
        assert_eq!(parsed.chain_id, "480");
        assert_eq!(parsed.nonce, "n1");
        assert!(parsed.expiration_time.is_some());
    }

    #[test]
    fn test_siwe_checks() {
        let ok = payload("n1", "2026-03-01T12:05:00Z");
        assert!(check_siwe_payload(&ok, "n1", now()).is_ok());
        assert_eq!(
            check_siwe_payload(&ok, "n2", now()),
            Err(SiweError::NonceMismatch)
        );

        let expired = payload("n1", "2026-03-01T11:59:30Z");
        assert_eq!(
            check_siwe_payload(&expired, "n1", now()),
            Err(SiweError::Expired)
        );

        let mut unsigned = ok.clone();
        unsigned["signature"] = json!("");
        assert_eq!(
            check_siwe_payload(&unsigned, "n1", now()),
            Err(SiweError::MissingSignature)
        );

        assert_eq!(
            check_siwe_payload(&json!({}), "n1", now()),
            Err(SiweError::MissingMessage)
        );
    }

    fn signing_key(byte: u8) -> k256::ecdsa::SigningKey {
        let mut secret = [0u8; 32];
        secret[31] = byte;
        k256::ecdsa::SigningKey::from_slice(&secret).unwrap()
    }

    fn personal_sign(key: &k256::ecdsa::SigningKey, message: &str) -> String {
        let (signature, recovery_id) = key
            .sign_prehash_recoverable(&personal_message_hash(message))
            .unwrap();
        let mut raw = signature.to_bytes().to_vec();
        raw.push(27 + recovery_id.to_byte());
        format!("0x{}", hex::encode(raw))
    }

    #[test]
    fn test_address_derivation() {
        // Well-known address of private key 1
        assert_eq!(
            address_of(signing_key(1).verifying_key()),
            "0x7e5f4552091a69125d5dfcb7b8c2659029395bdf"
        );
    }

    #[test]
    fn test_recover_signer() {
        let key = signing_key(9);
        let address = address_of(key.verifying_key());
        let signature = personal_sign(&key, "hello ping");

        assert_eq!(recover_signer("hello ping", &signature).unwrap(), address);
        assert_ne!(recover_signer("hello pong", &signature).unwrap(), address);
        assert!(matches!(
            recover_signer("hello ping", "not-a-signature"),
            Err(SiweError::InvalidSignature(_))
        ));
        assert!(matches!(
            recover_signer("hello ping", "0xdeadbeef"),
            Err(SiweError::InvalidSignature(_))
        ));
    }

    #[tokio::test]
    async fn test_ecdsa_verifier_checks_signer() {
        let key = signing_key(5);
        let address = address_of(key.verifying_key());
        let text = message("n1", "2026-03-01T12:05:00Z").replace(
            "0xAbC0000000000000000000000000000000000001",
            &address,
        );
        let payload = json!({ "message": text, "signature": personal_sign(&key, &text) });
        let attempt = check_siwe_payload(&payload, "n1", now()).unwrap();
        assert_eq!(EcdsaSiweVerifier.verify(&attempt).await, Ok(()));

        // Same message signed by somebody else
        let forged = json!({ "message": text, "signature": personal_sign(&signing_key(6), &text) });
        let attempt = check_siwe_payload(&forged, "n1", now()).unwrap();
        assert_eq!(
            EcdsaSiweVerifier.verify(&attempt).await,
            Err(SiweError::SignerMismatch(address))
        );
    }

    #[test]
    fn test_proof_body_merges_fields() {
        let body = proof_body(&VerifyRequest {
            payload: json!({ "proof": "0x1", "nullifier_hash": "0x2" }),
            action: "daily-ping".into(),
            signal: Some("0xabc".into()),
        });
        assert_eq!(body["proof"], "0x1");
        assert_eq!(body["action"], "daily-ping");
        assert_eq!(body["signal"], "0xabc");
    }
}
