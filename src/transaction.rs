//! SetOptions(inflationDest) transactions: construction, signing, envelope
//! encoding, and decoding of envelopes with exactly that shape.

use anyhow::{anyhow, Context, Result};
use base64::Engine;
use sha2::{Digest, Sha256};

use crate::accounts::AccountRecord;
use crate::error::{BuildError, StrKeyError};
use crate::signing::{self, Keypair};
use crate::strkey;
use crate::xdr::{XdrReader, XdrWriter};

pub const B64: base64::engine::GeneralPurpose = base64::engine::general_purpose::STANDARD;

/// Fee per operation, in stroops.
pub const BASE_FEE: u32 = 100;

const ENVELOPE_TYPE_TX: u32 = 2;
const KEY_TYPE_ED25519: u32 = 0;
const PUBLIC_KEY_TYPE_ED25519: u32 = 0;
const PRECOND_NONE: u32 = 0;
const MEMO_NONE: u32 = 0;
const OPERATION_SET_OPTIONS: u32 = 5;
// clearFlags, setFlags, masterWeight, low/med/high thresholds, homeDomain, signer
const SET_OPTIONS_TRAILING_OPTIONALS: usize = 8;
const MAX_SIGNATURES: u32 = 20;

/// One signed transaction ready for the submission pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionTask {
    pub index: usize,
    pub address: String,
    /// Base64 of the XDR transaction envelope.
    pub envelope: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetInflationDestination {
    pub source: [u8; 32],
    pub fee: u32,
    pub sequence: i64,
    pub inflation_dest: [u8; 32],
}

impl SetInflationDestination {
    pub fn to_xdr(&self) -> Vec<u8> {
        let mut w = XdrWriter::new();
        self.write_xdr(&mut w);
        w.into_bytes()
    }

    fn write_xdr(&self, w: &mut XdrWriter) {
        w.u32(KEY_TYPE_ED25519).fixed_opaque(&self.source);
        w.u32(self.fee);
        w.i64(self.sequence);
        w.u32(PRECOND_NONE);
        w.u32(MEMO_NONE);

        w.u32(1);
        w.none(); // operation source account
        w.u32(OPERATION_SET_OPTIONS);
        w.u32(1)
            .u32(PUBLIC_KEY_TYPE_ED25519)
            .fixed_opaque(&self.inflation_dest);
        for _ in 0..SET_OPTIONS_TRAILING_OPTIONALS {
            w.none();
        }

        w.u32(0); // ext
    }

    fn read_xdr(r: &mut XdrReader<'_>) -> Result<Self> {
        r.expect_u32(KEY_TYPE_ED25519, "source account key type")?;
        let source = r.fixed_opaque::<32>()?;
        let fee = r.u32()?;
        let sequence = r.i64()?;
        r.expect_u32(PRECOND_NONE, "precondition type")?;
        r.expect_u32(MEMO_NONE, "memo type")?;

        r.expect_u32(1, "operation count")?;
        r.expect_u32(0, "operation source account presence")?;
        r.expect_u32(OPERATION_SET_OPTIONS, "operation type")?;
        r.expect_u32(1, "inflation destination presence")?;
        r.expect_u32(PUBLIC_KEY_TYPE_ED25519, "inflation destination key type")?;
        let inflation_dest = r.fixed_opaque::<32>()?;
        for _ in 0..SET_OPTIONS_TRAILING_OPTIONALS {
            r.expect_u32(0, "optional set-options field")?;
        }

        r.expect_u32(0, "transaction ext")?;
        Ok(Self {
            source,
            fee,
            sequence,
            inflation_dest,
        })
    }

    /// Hash that gets signed: `sha256(network_id || ENVELOPE_TYPE_TX || tx)`.
    pub fn signature_base_hash(&self, network_id: &[u8; 32]) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(network_id);
        hasher.update(ENVELOPE_TYPE_TX.to_be_bytes());
        hasher.update(self.to_xdr());
        hasher.finalize().into()
    }
}

pub fn network_id(passphrase: &str) -> [u8; 32] {
    Sha256::digest(passphrase.as_bytes()).into()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecoratedSignature {
    pub hint: [u8; 4],
    pub signature: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedEnvelope {
    pub tx: SetInflationDestination,
    pub signatures: Vec<DecoratedSignature>,
}

impl SignedEnvelope {
    pub fn to_xdr(&self) -> Vec<u8> {
        let mut w = XdrWriter::new();
        w.u32(ENVELOPE_TYPE_TX);
        self.tx.write_xdr(&mut w);
        w.u32(self.signatures.len() as u32);
        for sig in &self.signatures {
            w.fixed_opaque(&sig.hint).var_opaque(&sig.signature);
        }
        w.into_bytes()
    }

    pub fn to_base64(&self) -> String {
        B64.encode(self.to_xdr())
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut r = XdrReader::new(bytes);
        r.expect_u32(ENVELOPE_TYPE_TX, "envelope type")?;
        let tx = SetInflationDestination::read_xdr(&mut r)?;
        let count = r.u32()?;
        if count > MAX_SIGNATURES {
            return Err(anyhow!("too many signatures ({count})"));
        }
        let mut signatures = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let hint = r.fixed_opaque::<4>()?;
            let signature = r.var_opaque(64)?.to_vec();
            signatures.push(DecoratedSignature { hint, signature });
        }
        r.finish()?;
        Ok(Self { tx, signatures })
    }

    pub fn decode_base64(text: &str) -> Result<Self> {
        let bytes = B64
            .decode(text.trim().as_bytes())
            .context("envelope is not valid base64")?;
        Self::decode(&bytes)
    }

    pub fn source_address(&self) -> String {
        strkey::encode_account_id(&self.tx.source)
    }

    pub fn inflation_dest_address(&self) -> String {
        strkey::encode_account_id(&self.tx.inflation_dest)
    }

    /// Require a valid signature from the source account.
    pub fn verify(&self, network_passphrase: &str) -> Result<()> {
        let hash = self.tx.signature_base_hash(&network_id(network_passphrase));
        let hint = signing::signature_hint(&self.tx.source);
        let sig = self
            .signatures
            .iter()
            .find(|s| s.hint == hint)
            .ok_or_else(|| anyhow!("no signature from source account"))?;
        signing::verify(&self.tx.source, &hash, &sig.signature)
    }
}

/// Turns an account plus the configured target into a signed envelope.
#[derive(Debug, Clone)]
pub struct TransactionBuilder {
    network_id: [u8; 32],
    inflation_dest: [u8; 32],
    fee: u32,
}

impl TransactionBuilder {
    pub fn new(network_passphrase: &str, inflation_dest: &str) -> Result<Self, StrKeyError> {
        Ok(Self {
            network_id: network_id(network_passphrase),
            inflation_dest: strkey::decode_account_id(inflation_dest)?,
            fee: BASE_FEE,
        })
    }

    /// Canonical strkey form of the target account.
    pub fn inflation_dest_address(&self) -> String {
        strkey::encode_account_id(&self.inflation_dest)
    }

    /// Build and sign for `account`, whose current ledger sequence is
    /// `current_sequence`. The transaction uses the next sequence number.
    pub fn build(
        &self,
        index: usize,
        account: &AccountRecord,
        current_sequence: i64,
    ) -> Result<SubmissionTask, BuildError> {
        let keypair = Keypair::from_secret_seed(&account.secret).map_err(BuildError::InvalidSecret)?;
        let derived = keypair.address();
        if derived != account.address {
            return Err(BuildError::AddressMismatch {
                address: account.address.clone(),
                derived,
            });
        }
        let sequence = current_sequence
            .checked_add(1)
            .ok_or(BuildError::SequenceOverflow(current_sequence))?;

        let tx = SetInflationDestination {
            source: keypair.public_key(),
            fee: self.fee,
            sequence,
            inflation_dest: self.inflation_dest,
        };
        let hash = tx.signature_base_hash(&self.network_id);
        let envelope = SignedEnvelope {
            tx,
            signatures: vec![DecoratedSignature {
                hint: keypair.signature_hint(),
                signature: keypair.sign(&hash).to_vec(),
            }],
        };

        Ok(SubmissionTask {
            index,
            address: account.address.clone(),
            envelope: envelope.to_base64(),
        })
    }
}
