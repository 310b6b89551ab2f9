//! Device ID: the stable textual node identifier derived from a certificate.
//!
//! `DeviceId = SHA-256(leaf certificate DER)`. Display form is the 52-char
//! base32 encoding split into four 13-char groups, each followed by a Luhn
//! mod-32 check character, then chunked into eight dash-separated groups of
//! seven:
//!
//! ```text
//! XXXXXXX-XXXXXXX-XXXXXXX-XXXXXXX-XXXXXXX-XXXXXXX-XXXXXXX-XXXXXXX
//! ```

use std::fmt;
use std::str::FromStr;

use data_encoding::BASE32_NOPAD;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::AppError;

const BASE32_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";

/// Base32 characters in the unchecked form (32 bytes → 52 chars).
const PLAIN_LEN: usize = 52;
/// Data characters covered by one check character.
const LUHN_GROUP: usize = 13;
/// Characters in the checked form (52 + 4 check chars).
const CHECKED_LEN: usize = 56;
const CHUNK: usize = 7;

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DeviceId([u8; 32]);

impl DeviceId {
    /// Derive the ID from a DER-encoded certificate.
    pub fn from_certificate(der: &[u8]) -> Self {
        Self(Sha256::digest(der).into())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let plain = BASE32_NOPAD.encode(&self.0);
        let mut checked = String::with_capacity(CHECKED_LEN);
        for group in plain.as_bytes().chunks(LUHN_GROUP) {
            // Output of the encoder is always in the alphabet.
            let group = std::str::from_utf8(group).map_err(|_| fmt::Error)?;
            checked.push_str(group);
            checked.push(luhn32(group).map_err(|_| fmt::Error)?);
        }
        let chunks: Vec<&str> = (0..CHECKED_LEN / CHUNK)
            .map(|i| &checked[i * CHUNK..(i + 1) * CHUNK])
            .collect();
        f.write_str(&chunks.join("-"))
    }
}

impl fmt::Debug for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DeviceId({self})")
    }
}

impl FromStr for DeviceId {
    type Err = AppError;

    /// Accepts the checked form (with or without dashes or spaces) and the
    /// bare 52-char base32 form. Commonly mistyped digits `0`, `1` and `8` are
    /// read as `O`, `I` and `B`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let cleaned: String = s
            .chars()
            .filter(|c| *c != '-' && *c != ' ')
            .map(|c| match c.to_ascii_uppercase() {
                '0' => 'O',
                '1' => 'I',
                '8' => 'B',
                other => other,
            })
            .collect();

        // Everything past this point indexes by byte.
        if let Some(bad) = cleaned
            .chars()
            .find(|c| !u8::try_from(*c).is_ok_and(|b| BASE32_ALPHABET.contains(&b)))
        {
            return Err(AppError::Identity(format!("invalid device ID character {bad:?}")));
        }

        let plain = match cleaned.len() {
            CHECKED_LEN => strip_check_chars(&cleaned)?,
            PLAIN_LEN => cleaned,
            n => {
                return Err(AppError::Identity(format!(
                    "device ID has {n} characters, expected {CHECKED_LEN} or {PLAIN_LEN}"
                )));
            }
        };

        let bytes = BASE32_NOPAD
            .decode(plain.as_bytes())
            .map_err(|e| AppError::Identity(format!("device ID base32 decode: {e}")))?;
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|_| AppError::Identity("device ID does not decode to 32 bytes".into()))?;
        Ok(Self(bytes))
    }
}

impl TryFrom<String> for DeviceId {
    type Error = AppError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<DeviceId> for String {
    fn from(id: DeviceId) -> Self {
        id.to_string()
    }
}

/// Validate and drop the four check characters of a 56-char ID.
fn strip_check_chars(checked: &str) -> Result<String, AppError> {
    let mut plain = String::with_capacity(PLAIN_LEN);
    for group in checked.as_bytes().chunks(LUHN_GROUP + 1) {
        let group = std::str::from_utf8(group)
            .map_err(|_| AppError::Identity("device ID is not ASCII".into()))?;
        let (data, check) = group.split_at(LUHN_GROUP);
        let expected = luhn32(data)?;
        if !check.starts_with(expected) {
            return Err(AppError::Identity(format!(
                "device ID check character mismatch in group {data}{check}"
            )));
        }
        plain.push_str(data);
    }
    Ok(plain)
}

/// Luhn mod-32 check character, weighting factors 1,2,1,2… from the left.
fn luhn32(s: &str) -> Result<char, AppError> {
    let n = BASE32_ALPHABET.len() as u32;
    let mut factor = 1;
    let mut sum = 0;
    for c in s.bytes() {
        let codepoint = BASE32_ALPHABET
            .iter()
            .position(|&a| a == c)
            .ok_or_else(|| AppError::Identity(format!("invalid base32 character {:?}", c as char)))?
            as u32;
        let addend = factor * codepoint;
        factor = if factor == 2 { 1 } else { 2 };
        sum += addend / n + addend % n;
    }
    let check = (n - sum % n) % n;
    Ok(BASE32_ALPHABET[check as usize] as char)
}
