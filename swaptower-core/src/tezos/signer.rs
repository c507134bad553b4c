//! Operation signing.
//!
//! Tezos signs `blake2b-256(0x03 || forged_bytes)`; the 64-byte signature
//! is appended to the forged hex before injection.

use blake2::digest::consts::{U20, U32};
use blake2::{Blake2b, Digest};
use ed25519_dalek::{Signer, SigningKey};
use thiserror::Error;

/// Environment variable holding the account secret.
pub const SECRET_ENV_VAR: &str = "TEZOS_PRIVATE";

/// Watermark prepended to generic operations before hashing.
const OPERATION_WATERMARK: u8 = 0x03;

/// Base58 prefixes.
const TZ1_PREFIX: [u8; 3] = [6, 161, 159];
const EDSK_SEED_PREFIX: [u8; 4] = [13, 15, 58, 7];
const EDSK_SECRET_PREFIX: [u8; 4] = [43, 246, 78, 7];

type Blake2b256 = Blake2b<U32>;
type Blake2b160 = Blake2b<U20>;

/// Errors produced while loading a key or signing.
#[derive(Debug, Error)]
pub enum SignError {
    #[error("environment variable {0} is not set")]
    MissingSecret(&'static str),

    #[error("invalid secret key: {0}")]
    InvalidSecret(String),

    #[error("forged operation is not valid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),
}

/// Signs forged operations for one account.
pub trait OperationSigner: Send + Sync {
    /// Address of the signing account.
    fn address(&self) -> &str;

    /// Sign a forged operation and return the signature as hex.
    fn sign_forged(&self, forged_hex: &str) -> Result<String, SignError>;
}

/// Ed25519 (`tz1`) account signer.
pub struct Ed25519Signer {
    key: SigningKey,
    address: String,
}

impl Ed25519Signer {
    pub fn from_seed(seed: [u8; 32]) -> Self {
        let key = SigningKey::from_bytes(&seed);
        let address = tz1_address(key.verifying_key().as_bytes());
        Self { key, address }
    }

    /// Parse a secret given as a hex seed or a base58 `edsk` key.
    pub fn from_secret(secret: &str) -> Result<Self, SignError> {
        let secret = secret.trim();
        let seed = if secret.starts_with("edsk") {
            decode_edsk(secret)?
        } else {
            let bytes = hex::decode(secret)
                .map_err(|e| SignError::InvalidSecret(format!("not hex: {e}")))?;
            seed_from_slice(&bytes)?
        };
        Ok(Self::from_seed(seed))
    }

    /// Load the secret from [`SECRET_ENV_VAR`].
    pub fn from_env() -> Result<Self, SignError> {
        let secret =
            std::env::var(SECRET_ENV_VAR).map_err(|_| SignError::MissingSecret(SECRET_ENV_VAR))?;
        Self::from_secret(&secret)
    }

    pub fn public_key(&self) -> [u8; 32] {
        self.key.verifying_key().to_bytes()
    }
}

impl OperationSigner for Ed25519Signer {
    fn address(&self) -> &str {
        &self.address
    }

    fn sign_forged(&self, forged_hex: &str) -> Result<String, SignError> {
        let forged = hex::decode(forged_hex)?;
        let mut hasher = Blake2b256::new();
        hasher.update([OPERATION_WATERMARK]);
        hasher.update(&forged);
        let digest = hasher.finalize();
        let signature = self.key.sign(&digest);
        Ok(hex::encode(signature.to_bytes()))
    }
}

fn tz1_address(public_key: &[u8]) -> String {
    let hash = Blake2b160::digest(public_key);
    let mut payload = TZ1_PREFIX.to_vec();
    payload.extend_from_slice(&hash);
    bs58::encode(payload).with_check().into_string()
}

fn decode_edsk(secret: &str) -> Result<[u8; 32], SignError> {
    let bytes = bs58::decode(secret)
        .with_check(None)
        .into_vec()
        .map_err(|e| SignError::InvalidSecret(format!("bad base58: {e}")))?;
    if let Some(seed) = bytes.strip_prefix(&EDSK_SEED_PREFIX) {
        return seed_from_slice(seed);
    }
    if let Some(secret_key) = bytes.strip_prefix(&EDSK_SECRET_PREFIX) {
        // 64-byte form: seed followed by the public key
        return seed_from_slice(secret_key.get(..32).unwrap_or_default());
    }
    Err(SignError::InvalidSecret("unknown edsk prefix".to_string()))
}

fn seed_from_slice(bytes: &[u8]) -> Result<[u8; 32], SignError> {
    bytes
        .try_into()
        .map_err(|_| SignError::InvalidSecret(format!("expected 32 bytes, got {}", bytes.len())))
}
