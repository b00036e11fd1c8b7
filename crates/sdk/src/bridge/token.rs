//! E-cash token encodings.
//!
//! Accepted forms:
//!
//! | Form | Example |
//! |------|---------|
//! | prefix | `fedimint:1000:<payload>`, `cashu:21:<payload>` |
//! | Cashu v3 | `cashuA<base64url JSON>` |
//! | bare JSON | `{"amount": 1000}` |
//! | bare base64 JSON | `eyJhbW91bnQiOjEwMDB9` |
//!
//! The JSON carries a top-level `amount`, or `token[].proofs[].amount`, or
//! `proofs[].amount`. Anything else is rejected; there is no default amount.

use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use hearth_core::EcashProtocol;
use serde::{Deserialize, Serialize};

use crate::SdkError;
use crate::utils::random_hex;

const CASHU_V3_PREFIX: &str = "cashuA";

const LENIENT: GeneralPurposeConfig =
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent);
const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(&alphabet::URL_SAFE, LENIENT);
const STANDARD_LENIENT: GeneralPurpose = GeneralPurpose::new(&alphabet::STANDARD, LENIENT);

/// Amount and (when detectable) protocol of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedToken {
    pub amount_sats: u64,
    pub protocol: Option<EcashProtocol>,
}

// ---------------------------------------------------------------------------
// JSON shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct TokenJson {
    amount: Option<u64>,
    token: Option<Vec<TokenEntryJson>>,
    proofs: Option<Vec<ProofJson>>,
}

#[derive(Debug, Deserialize)]
struct TokenEntryJson {
    #[serde(default)]
    proofs: Vec<ProofJson>,
}

#[derive(Debug, Deserialize)]
struct ProofJson {
    amount: u64,
}

#[derive(Debug, Serialize)]
struct CashuToken<'a> {
    token: Vec<CashuEntry<'a>>,
    unit: &'a str,
}

#[derive(Debug, Serialize)]
struct CashuEntry<'a> {
    mint: &'a str,
    proofs: Vec<CashuProof<'a>>,
}

#[derive(Debug, Serialize)]
struct CashuProof<'a> {
    amount: u64,
    id: &'a str,
    secret: String,
    #[serde(rename = "C")]
    c: String,
}

fn sum_proofs<'a>(proofs: impl IntoIterator<Item = &'a ProofJson>) -> Option<u64> {
    proofs
        .into_iter()
        .try_fold(0u64, |acc, proof| acc.checked_add(proof.amount))
}

impl TokenJson {
    fn amount(&self) -> Option<u64> {
        if let Some(amount) = self.amount {
            return Some(amount);
        }
        if let Some(entries) = &self.token {
            return sum_proofs(entries.iter().flat_map(|e| e.proofs.iter()));
        }
        self.proofs.as_ref().and_then(|proofs| sum_proofs(proofs))
    }
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Extracts the amount from any accepted token form.
///
/// # Errors
///
/// [`SdkError::InvalidToken`] for unrecognised encodings, malformed JSON,
/// missing amounts, overflowing sums and zero amounts.
pub fn parse_token(token: &str) -> Result<ParsedToken, SdkError> {
    let token = token.trim();
    if token.is_empty() {
        return Err(SdkError::InvalidToken);
    }

    let parsed = if let Some(encoded) = token.strip_prefix(CASHU_V3_PREFIX) {
        ParsedToken {
            amount_sats: json_amount(&decode_base64(encoded)?)?,
            protocol: Some(EcashProtocol::Cashu),
        }
    } else if let Some(parsed) = parse_prefixed(token)? {
        parsed
    } else if token.starts_with('{') {
        ParsedToken {
            amount_sats: json_amount(token.as_bytes())?,
            protocol: None,
        }
    } else {
        ParsedToken {
            amount_sats: json_amount(&decode_base64(token)?)?,
            protocol: None,
        }
    };

    if parsed.amount_sats == 0 {
        return Err(SdkError::InvalidToken);
    }
    Ok(parsed)
}

/// `<protocol>:<amount>:<payload>`. `Ok(None)` when the token does not start
/// with a known protocol name.
fn parse_prefixed(token: &str) -> Result<Option<ParsedToken>, SdkError> {
    let mut parts = token.splitn(3, ':');
    let protocol = match parts.next() {
        Some("fedimint") => EcashProtocol::Fedimint,
        Some("cashu") => EcashProtocol::Cashu,
        _ => return Ok(None),
    };
    let (Some(amount), Some(payload)) = (parts.next(), parts.next()) else {
        return Err(SdkError::InvalidToken);
    };
    if payload.is_empty() || amount.is_empty() || !amount.bytes().all(|b| b.is_ascii_digit()) {
        return Err(SdkError::InvalidToken);
    }
    let amount_sats = amount.parse().map_err(|_| SdkError::InvalidToken)?;
    Ok(Some(ParsedToken {
        amount_sats,
        protocol: Some(protocol),
    }))
}

fn decode_base64(encoded: &str) -> Result<Vec<u8>, SdkError> {
    URL_SAFE_LENIENT
        .decode(encoded)
        .or_else(|_| STANDARD_LENIENT.decode(encoded))
        .map_err(|_| SdkError::InvalidToken)
}

fn json_amount(bytes: &[u8]) -> Result<u64, SdkError> {
    let json: TokenJson = serde_json::from_slice(bytes).map_err(|_| SdkError::InvalidToken)?;
    json.amount().ok_or(SdkError::InvalidToken)
}

// ---------------------------------------------------------------------------
// Synthesis
// ---------------------------------------------------------------------------

/// Powers of two summing to `amount`, largest first.
pub(crate) fn split_powers_of_two(amount: u64) -> Vec<u64> {
    (0..u64::BITS)
        .rev()
        .map(|bit| 1u64 << bit)
        .filter(|value| amount & value != 0)
        .collect()
}

/// A `cashuA` token worth `amount_sats`.
pub(crate) fn mint_cashu(
    amount_sats: u64,
    mint_url: &str,
    keyset_id: &str,
) -> Result<String, SdkError> {
    let proofs = split_powers_of_two(amount_sats)
        .into_iter()
        .map(|amount| CashuProof {
            amount,
            id: keyset_id,
            secret: random_hex(32),
            c: format!("02{}", random_hex(32)),
        })
        .collect();
    let token = CashuToken {
        token: vec![CashuEntry {
            mint: mint_url,
            proofs,
        }],
        unit: "sat",
    };
    let json = serde_json::to_vec(&token).map_err(|_| SdkError::InvalidToken)?;
    Ok(format!(
        "{CASHU_V3_PREFIX}{}",
        base64::engine::general_purpose::URL_SAFE.encode(json)
    ))
}

/// A `fedimint:<amount>:<payload>` token worth `amount_sats`.
pub(crate) fn mint_fedimint(amount_sats: u64) -> String {
    format!("fedimint:{amount_sats}:{}", random_hex(32))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
