//! Federation and invite identifiers.
//!
//! Both identifiers are opaque and non-cryptographic. They exist for routing
//! and lookup, never as proof of authorization.
//!
//! # Format
//!
//! | Type | Format | Example |
//! |------|--------|---------|
//! | [`FederationId`] | `fed_<unix-ms>_<suffix>` | `fed_1760400000000_k3j9x0a2m` |
//! | [`InviteCode`] | `fed_invite_<unix-ms base36>_<suffix>` | `fed_invite_mgpxw4cg_0a9zzq1bc` |
//!
//! The suffix is [`SUFFIX_LEN`] lowercase base36 characters.

use std::fmt;
use std::str::FromStr;

use rand::Rng;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Prefix of every federation id.
pub const FEDERATION_PREFIX: &str = "fed_";

/// Prefix of every invite code.
pub const INVITE_PREFIX: &str = "fed_invite_";

/// Length of the random suffix.
pub const SUFFIX_LEN: usize = 9;

const BASE36: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

// ---------------------------------------------------------------------------
// IdError
// ---------------------------------------------------------------------------

/// Errors from parsing identifiers and enum names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdError {
    /// The string does not start with the expected prefix.
    BadPrefix,
    /// The timestamp segment is missing or not in the expected radix.
    BadTimestamp,
    /// The random suffix is missing or contains non-base36 characters.
    BadSuffix,
    /// The name does not match any known variant.
    UnknownName(String),
}

impl fmt::Display for IdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadPrefix => write!(f, "identifier has an unexpected prefix"),
            Self::BadTimestamp => write!(f, "identifier has an invalid timestamp segment"),
            Self::BadSuffix => write!(f, "identifier has an invalid random suffix"),
            Self::UnknownName(name) => write!(f, "unknown name: {name}"),
        }
    }
}

impl std::error::Error for IdError {}

// ---------------------------------------------------------------------------
// FederationId
// ---------------------------------------------------------------------------

/// Unique federation identifier: `fed_<unix-ms>_<suffix>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FederationId(String);

impl FederationId {
    /// Allocates a fresh id stamped with `now_ms`.
    pub fn generate<R: Rng + ?Sized>(now_ms: u64, rng: &mut R) -> Self {
        Self(format!(
            "{FEDERATION_PREFIX}{now_ms}_{}",
            random_suffix(rng)
        ))
    }

    /// Parses and validates a federation id.
    ///
    /// # Errors
    ///
    /// Fails on a missing prefix (an invite code is rejected here too), a
    /// non-decimal timestamp, or a malformed suffix.
    pub fn parse(s: &str) -> Result<Self, IdError> {
        if s.starts_with(INVITE_PREFIX) {
            return Err(IdError::BadPrefix);
        }
        let rest = s.strip_prefix(FEDERATION_PREFIX).ok_or(IdError::BadPrefix)?;
        let (ts, suffix) = rest.split_once('_').ok_or(IdError::BadTimestamp)?;
        if ts.is_empty() || !ts.bytes().all(|b| b.is_ascii_digit()) {
            return Err(IdError::BadTimestamp);
        }
        ts.parse::<u64>().map_err(|_| IdError::BadTimestamp)?;
        validate_suffix(suffix)?;
        Ok(Self(s.to_owned()))
    }

    /// Creation time encoded in the id, in unix milliseconds.
    pub fn timestamp_ms(&self) -> u64 {
        self.0[FEDERATION_PREFIX.len()..]
            .split('_')
            .next()
            .and_then(|ts| ts.parse().ok())
            .unwrap_or(0)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FederationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for FederationId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for FederationId {
    type Error = IdError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<FederationId> for String {
    fn from(id: FederationId) -> Self {
        id.0
    }
}

impl AsRef<str> for FederationId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ---------------------------------------------------------------------------
// InviteCode
// ---------------------------------------------------------------------------

/// Federation invite code: `fed_invite_<unix-ms base36>_<suffix>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct InviteCode(String);

impl InviteCode {
    /// Allocates a fresh invite code stamped with `now_ms`.
    pub fn generate<R: Rng + ?Sized>(now_ms: u64, rng: &mut R) -> Self {
        Self(format!(
            "{INVITE_PREFIX}{}_{}",
            to_base36(now_ms),
            random_suffix(rng)
        ))
    }

    /// Parses and validates an invite code.
    pub fn parse(s: &str) -> Result<Self, IdError> {
        let rest = s.strip_prefix(INVITE_PREFIX).ok_or(IdError::BadPrefix)?;
        let (ts, suffix) = rest.split_once('_').ok_or(IdError::BadTimestamp)?;
        from_base36(ts).ok_or(IdError::BadTimestamp)?;
        validate_suffix(suffix)?;
        Ok(Self(s.to_owned()))
    }

    /// Creation time encoded in the code, in unix milliseconds.
    pub fn timestamp_ms(&self) -> u64 {
        self.0[INVITE_PREFIX.len()..]
            .split('_')
            .next()
            .and_then(from_base36)
            .unwrap_or(0)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InviteCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for InviteCode {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for InviteCode {
    type Error = IdError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<InviteCode> for String {
    fn from(code: InviteCode) -> Self {
        code.0
    }
}

impl AsRef<str> for InviteCode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ---------------------------------------------------------------------------
// Base36 helpers
// ---------------------------------------------------------------------------

/// Lowercase base36 rendering of `n`.
pub fn to_base36(mut n: u64) -> String {
    if n == 0 {
        return "0".to_owned();
    }
    let mut digits = Vec::with_capacity(13);
    while n > 0 {
        digits.push(BASE36[(n % 36) as usize]);
        n /= 36;
    }
    digits.reverse();
    // Every byte comes from the ASCII alphabet above.
    digits.into_iter().map(char::from).collect()
}

/// Parses a lowercase base36 string. Returns `None` on empty input,
/// invalid characters, or overflow.
pub fn from_base36(s: &str) -> Option<u64> {
    if s.is_empty() {
        return None;
    }
    s.bytes().try_fold(0u64, |acc, b| {
        let digit = match b {
            b'0'..=b'9' => b - b'0',
            b'a'..=b'z' => b - b'a' + 10,
            _ => return None,
        };
        acc.checked_mul(36)?.checked_add(u64::from(digit))
    })
}

fn random_suffix<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..SUFFIX_LEN)
        .map(|_| char::from(BASE36[rng.gen_range(0..BASE36.len())]))
        .collect()
}

fn validate_suffix(suffix: &str) -> Result<(), IdError> {
    let valid = suffix.len() == SUFFIX_LEN
        && suffix
            .bytes()
            .all(|b| b.is_ascii_digit() || b.is_ascii_lowercase());
    if valid { Ok(()) } else { Err(IdError::BadSuffix) }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
