//! # KRMA Amount Types
//!
//! Every balance, cost, and valuation in the ledger is an integer number of
//! KRMA. There are no fractional units and no floating point anywhere near
//! token math -- the economy is integer-valued by construction.
//!
//! Two widths cover every use:
//!
//! - [`Krma`] (`u128`) -- balances and magnitudes, which are never negative.
//! - [`SignedKrma`] (`i128`) -- transaction deltas, valuation components,
//!   and differences, which carry a sign.
//!
//! Total supply is 10^11, so 128 bits leaves more than 10^27 of headroom
//! over any value the system can reach, including sums over every wallet.
//!
//! ## Boundary Encoding
//!
//! JSON has no safe integer beyond 2^53, so amounts cross the presentation
//! boundary as decimal strings. The [`krma_string`] and [`signed_krma_string`]
//! serde modules implement that encoding; deserialization accepts either a
//! string or a plain number for convenience when reading hand-written
//! fixtures.

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serializer};

/// A non-negative KRMA amount: balances, costs, asset values.
pub type Krma = u128;

/// A signed KRMA amount: transaction deltas, differences, valuation totals.
pub type SignedKrma = i128;

// ---------------------------------------------------------------------------
// Serde helpers
// ---------------------------------------------------------------------------

/// Serde module for `Krma` fields: serializes as a decimal string,
/// deserializes from a string or a number.
///
/// # Usage
///
/// ```ignore
/// #[derive(Serialize, Deserialize)]
/// struct Wallet {
///     #[serde(with = "crate::krma::krma_string")]
///     liquid: Krma,
/// }
/// ```
pub mod krma_string {
    use super::*;

    pub fn serialize<S>(value: &Krma, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(value)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Krma, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Input {
            String(String),
            Number(u64),
        }

        match Input::deserialize(deserializer)? {
            Input::String(raw) => raw.parse::<Krma>().map_err(D::Error::custom),
            Input::Number(value) => Ok(Krma::from(value)),
        }
    }
}

/// Serde module for `SignedKrma` fields. Same encoding as [`krma_string`],
/// with a sign.
pub mod signed_krma_string {
    use super::*;

    pub fn serialize<S>(value: &SignedKrma, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(value)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<SignedKrma, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Input {
            String(String),
            Number(i64),
        }

        match Input::deserialize(deserializer)? {
            Input::String(raw) => raw.parse::<SignedKrma>().map_err(D::Error::custom),
            Input::Number(value) => Ok(SignedKrma::from(value)),
        }
    }
}

// ---------------------------------------------------------------------------
// Display formatting
// ---------------------------------------------------------------------------

/// Formats an amount with thousands separators and the unit suffix,
/// e.g. `1_234_567` becomes `"1,234,567 KRMA"`. Display only -- the
/// grouped form is never parsed back.
pub fn format_krma(amount: Krma) -> String {
    let digits = amount.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 5);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped.push_str(" KRMA");
    grouped
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
