//! Field value formats and validation.
//!
//! A matched value that fails its format is demoted to null by the caller;
//! `FieldValidationFailure` never leaves the extraction layer.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

static SSN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{3}-\d{2}-\d{4}$").unwrap());

static EIN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{2}-\d{7}$").unwrap());

static ROUTING_NUMBER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{9}$").unwrap());

static ACCOUNT_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9Xx*]{4,17}$").unwrap());

static MONEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{1,3}(,\d{3})+|\d+)(\.\d{1,2})?$").unwrap());

/// Numeric dates (01/31/2024, 1-31-24) and written dates (January 31, 2024).
static DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b\d{1,2}[/-]\d{1,2}[/-](\d{4}|\d{2})\b|\b(jan|feb|mar|apr|may|jun|jul|aug|sep|sept|oct|nov|dec)[a-z]*\.?\s+\d{1,2},?\s+\d{4}\b",
    )
    .unwrap()
});

/// A matched value that does not satisfy its field's format.
#[derive(Debug, Error)]
#[error("value {value:?} is not a valid {format}")]
pub struct FieldValidationFailure {
    pub format: FieldFormat,
    pub value: String,
}

/// Exact money amount in cents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Amount {
    cents: i64,
}

impl Amount {
    pub const ZERO: Amount = Amount { cents: 0 };

    pub fn from_cents(cents: i64) -> Self {
        Self { cents }
    }

    pub fn cents(&self) -> i64 {
        self.cents
    }

    pub fn is_negative(&self) -> bool {
        self.cents < 0
    }

    pub fn abs(&self) -> Self {
        Self {
            cents: self.cents.saturating_abs(),
        }
    }

    pub fn saturating_add(&self, other: Amount) -> Self {
        Self {
            cents: self.cents.saturating_add(other.cents),
        }
    }

    /// Parse a printed amount: `$1,234.56`, `-12.00`, `(12.00)`, `12.00-`.
    pub fn parse(raw: &str) -> Option<Self> {
        let mut s = raw.trim();
        let mut negative = false;

        if let Some(inner) = s.strip_prefix('(').and_then(|r| r.strip_suffix(')')) {
            negative = true;
            s = inner.trim();
        }
        if let Some(rest) = s.strip_suffix('-') {
            negative = !negative;
            s = rest.trim_end();
        }
        if let Some(rest) = s.strip_prefix('+') {
            s = rest.trim_start();
        } else if let Some(rest) = s.strip_prefix('-') {
            negative = !negative;
            s = rest.trim_start();
        }
        if let Some(rest) = s.strip_prefix('$') {
            s = rest.trim_start();
            if let Some(rest) = s.strip_prefix('-') {
                negative = !negative;
                s = rest.trim_start();
            }
        }

        if !MONEY.is_match(s) {
            return None;
        }

        let digits: String = s.chars().filter(|c| *c != ',').collect();
        let (whole, fraction) = digits.split_once('.').unwrap_or((digits.as_str(), ""));
        let whole: i64 = whole.parse().ok()?;
        let fraction: i64 = match fraction.len() {
            0 => 0,
            1 => fraction.parse::<i64>().ok()? * 10,
            _ => fraction.parse().ok()?,
        };

        let cents = whole.checked_mul(100)?.checked_add(fraction)?;
        Some(Self {
            cents: if negative { -cents } else { cents },
        })
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.cents < 0 { "-" } else { "" };
        let abs = self.cents.unsigned_abs();
        write!(f, "{}{}.{:02}", sign, abs / 100, abs % 100)
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Amount::parse(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid amount: {}", raw)))
    }
}

/// An extracted field value.
///
/// Serializes as a bare string. Reading one back needs the field's format,
/// so canonical fields deserialize through `text_field` or `amount_field`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Amount(Amount),
    Text(String),
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            FieldValue::Amount(_) => None,
        }
    }

    pub fn as_amount(&self) -> Option<Amount> {
        match self {
            FieldValue::Amount(a) => Some(*a),
            FieldValue::Text(_) => None,
        }
    }
}

/// Deserialize a text-valued canonical field.
pub(crate) fn text_field<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<FieldValue>, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.map(FieldValue::Text))
}

/// Deserialize a money-valued canonical field.
pub(crate) fn amount_field<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<FieldValue>, D::Error> {
    Ok(Option::<Amount>::deserialize(deserializer)?.map(FieldValue::Amount))
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Amount(a) => write!(f, "{}", a),
            FieldValue::Text(s) => write!(f, "{}", s),
        }
    }
}

/// Format rule applied to a matched value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldFormat {
    /// Free text, kept as printed.
    Text,
    /// Social security number, `123-45-6789`.
    Ssn,
    /// Employer identification number, `12-3456789`.
    Ein,
    Money,
    /// ABA routing number, nine digits.
    RoutingNumber,
    /// Account number, possibly masked (`XXXX1234`).
    AccountNumber,
    /// First date appearing in the value.
    FirstDate,
    /// Last date appearing in the value.
    LastDate,
}

impl FieldFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldFormat::Text => "text",
            FieldFormat::Ssn => "SSN",
            FieldFormat::Ein => "EIN",
            FieldFormat::Money => "money amount",
            FieldFormat::RoutingNumber => "routing number",
            FieldFormat::AccountNumber => "account number",
            FieldFormat::FirstDate | FieldFormat::LastDate => "date",
        }
    }

    /// Validate and normalize a raw value.
    pub fn apply(&self, raw: &str) -> Result<FieldValue, FieldValidationFailure> {
        let value = raw.trim();
        let normalized = match self {
            FieldFormat::Text => Some(FieldValue::Text(value.to_string())),
            FieldFormat::Ssn => SSN
                .is_match(value)
                .then(|| FieldValue::Text(value.to_string())),
            FieldFormat::Ein => EIN
                .is_match(value)
                .then(|| FieldValue::Text(value.to_string())),
            FieldFormat::Money => Amount::parse(value).map(FieldValue::Amount),
            FieldFormat::RoutingNumber => {
                let compact = strip_separators(value);
                ROUTING_NUMBER
                    .is_match(&compact)
                    .then_some(FieldValue::Text(compact))
            }
            FieldFormat::AccountNumber => {
                let compact = strip_separators(value);
                let digits = compact.chars().filter(|c| c.is_ascii_digit()).count();
                (ACCOUNT_NUMBER.is_match(&compact) && digits >= 4)
                    .then_some(FieldValue::Text(compact))
            }
            FieldFormat::FirstDate => DATE
                .find(value)
                .map(|m| FieldValue::Text(m.as_str().to_string())),
            FieldFormat::LastDate => DATE
                .find_iter(value)
                .last()
                .map(|m| FieldValue::Text(m.as_str().to_string())),
        };

        normalized.ok_or_else(|| FieldValidationFailure {
            format: *self,
            value: value.to_string(),
        })
    }
}

impl fmt::Display for FieldFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

fn strip_separators(value: &str) -> String {
    value
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .collect()
}
