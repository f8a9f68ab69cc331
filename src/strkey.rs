//! Stellar "strkey" encoding for account ids (`G...`) and secret seeds (`S...`).
//!
//! Layout: `base32(version_byte || key[32] || crc16_xmodem_le)`, RFC 4648
//! alphabet, no padding. 35 bytes always encode to 56 characters.

use crate::error::StrKeyError;

const ALPHABET: &[u8; 32] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";
const DECODED_LEN: usize = 35;
const ENCODED_LEN: usize = 56;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    AccountId,
    SecretSeed,
}

impl KeyKind {
    fn version_byte(self) -> u8 {
        match self {
            KeyKind::AccountId => 6 << 3,
            KeyKind::SecretSeed => 18 << 3,
        }
    }

    fn prefix(self) -> char {
        match self {
            KeyKind::AccountId => 'G',
            KeyKind::SecretSeed => 'S',
        }
    }
}

pub fn encode(kind: KeyKind, key: &[u8; 32]) -> String {
    let mut payload = Vec::with_capacity(DECODED_LEN);
    payload.push(kind.version_byte());
    payload.extend_from_slice(key);
    let crc = crc16_xmodem(&payload);
    payload.extend_from_slice(&crc.to_le_bytes());
    base32_encode(&payload)
}

pub fn decode(kind: KeyKind, text: &str) -> Result<[u8; 32], StrKeyError> {
    let raw = base32_decode(text)?;
    // Only 56 characters map onto 35 bytes with no bits left over.
    if text.len() != ENCODED_LEN {
        return Err(StrKeyError::InvalidLength(text.len()));
    }
    if raw[0] != kind.version_byte() {
        return Err(StrKeyError::InvalidVersion {
            expected: kind.prefix(),
        });
    }
    let (body, checksum) = raw.split_at(DECODED_LEN - 2);
    let expected = crc16_xmodem(body).to_le_bytes();
    if checksum != expected {
        return Err(StrKeyError::InvalidChecksum);
    }
    let mut key = [0_u8; 32];
    key.copy_from_slice(&body[1..]);
    Ok(key)
}

pub fn decode_account_id(address: &str) -> Result<[u8; 32], StrKeyError> {
    decode(KeyKind::AccountId, address)
}

pub fn encode_account_id(key: &[u8; 32]) -> String {
    encode(KeyKind::AccountId, key)
}

fn crc16_xmodem(data: &[u8]) -> u16 {
    let mut crc: u16 = 0;
    for &byte in data {
        crc ^= u16::from(byte) << 8;
        for _ in 0..8 {
            crc = if crc & 0x8000 != 0 {
                (crc << 1) ^ 0x1021
            } else {
                crc << 1
            };
        }
    }
    crc
}

fn base32_encode(data: &[u8]) -> String {
    let mut out = String::with_capacity((data.len() * 8).div_ceil(5));
    let mut buffer: u32 = 0;
    let mut bits = 0_u32;
    for &byte in data {
        buffer = (buffer << 8) | u32::from(byte);
        bits += 8;
        while bits >= 5 {
            bits -= 5;
            out.push(ALPHABET[((buffer >> bits) & 0x1f) as usize] as char);
        }
        buffer &= (1 << bits) - 1;
    }
    if bits > 0 {
        out.push(ALPHABET[((buffer << (5 - bits)) & 0x1f) as usize] as char);
    }
    out
}

fn base32_decode(text: &str) -> Result<Vec<u8>, StrKeyError> {
    let mut out = Vec::with_capacity(text.len() * 5 / 8);
    let mut buffer: u32 = 0;
    let mut bits = 0_u32;
    for c in text.chars() {
        let value = match c {
            'A'..='Z' => c as u32 - 'A' as u32,
            '2'..='7' => c as u32 - '2' as u32 + 26,
            other => return Err(StrKeyError::InvalidCharacter(other)),
        };
        buffer = (buffer << 5) | value;
        bits += 5;
        if bits >= 8 {
            bits -= 8;
            out.push((buffer >> bits) as u8);
            buffer &= (1 << bits) - 1;
        }
    }
    Ok(out)
}
