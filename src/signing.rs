use std::fmt;

use anyhow::{anyhow, Context, Result};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use rand::RngCore;

use crate::error::StrKeyError;
use crate::strkey::{self, KeyKind};

/// Ed25519 keypair for a ledger account, derived from its secret seed.
#[derive(Clone)]
pub struct Keypair {
    signing: SigningKey,
}

impl Keypair {
    pub fn from_seed_bytes(seed: [u8; 32]) -> Self {
        Self {
            signing: SigningKey::from_bytes(&seed),
        }
    }

    pub fn from_secret_seed(secret: &str) -> Result<Self, StrKeyError> {
        let seed = strkey::decode(KeyKind::SecretSeed, secret)?;
        Ok(Self::from_seed_bytes(seed))
    }

    pub fn random() -> Self {
        let mut rng = OsRng;
        let mut seed = [0_u8; 32];
        rng.fill_bytes(&mut seed);
        Self::from_seed_bytes(seed)
    }

    pub fn public_key(&self) -> [u8; 32] {
        self.signing.verifying_key().to_bytes()
    }

    pub fn address(&self) -> String {
        strkey::encode(KeyKind::AccountId, &self.public_key())
    }

    pub fn secret_seed(&self) -> String {
        strkey::encode(KeyKind::SecretSeed, &self.signing.to_bytes())
    }

    /// Last four bytes of the public key, used by verifiers to pick the key
    /// a decorated signature belongs to.
    pub fn signature_hint(&self) -> [u8; 4] {
        signature_hint(&self.public_key())
    }

    pub fn sign(&self, message: &[u8]) -> [u8; 64] {
        self.signing.sign(message).to_bytes()
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keypair")
            .field("address", &self.address())
            .finish_non_exhaustive()
    }
}

pub fn signature_hint(public_key: &[u8; 32]) -> [u8; 4] {
    let mut hint = [0_u8; 4];
    hint.copy_from_slice(&public_key[28..]);
    hint
}

/// Verify a raw ed25519 signature over `message`.
pub fn verify(public_key: &[u8; 32], message: &[u8], signature: &[u8]) -> Result<()> {
    let verifying = VerifyingKey::from_bytes(public_key).context("invalid ed25519 public key")?;
    let signature = Signature::from_slice(signature).context("invalid ed25519 signature bytes")?;
    verifying
        .verify(message, &signature)
        .map_err(|err| anyhow!("signature verification failed: {err}"))
}
