//! Quantity parses Kubernetes resource quantities well enough to compare them.
//!
//! Values are held as `f64` in base units. This loses precision on huge or very fine-grained
//! numbers, which is fine for ordering requests against limits.

use std::{cmp::Ordering, fmt, num::ParseFloatError, str::FromStr};

use k8s_openapi::apimachinery::pkg::api::resource::Quantity as K8sQuantity;

/// ParseQuantityError enumerates the ways a quantity string can be malformed.
#[derive(thiserror::Error, Debug, PartialEq)]
pub enum ParseQuantityError {
    /// The input was empty or not ASCII.
    #[error("input is either empty or contains non-ascii characters")]
    InvalidFormat,
    /// The numeric part failed to parse.
    #[error("failed to parse floating point number: {0}")]
    InvalidFloat(#[from] ParseFloatError),
    /// The suffix is not one Kubernetes understands.
    #[error("failed to parse {0:?} as quantity suffix")]
    InvalidSuffix(String),
}

/// Binary multiples, powers of 2.
#[derive(Clone, Copy, Debug, PartialEq, strum::Display, strum::EnumString)]
enum BinaryMultiple {
    #[strum(serialize = "Ki")]
    Kibi,
    #[strum(serialize = "Mi")]
    Mebi,
    #[strum(serialize = "Gi")]
    Gibi,
    #[strum(serialize = "Ti")]
    Tebi,
    #[strum(serialize = "Pi")]
    Pebi,
    #[strum(serialize = "Ei")]
    Exbi,
}

impl BinaryMultiple {
    fn factor(self) -> f64 {
        match self {
            BinaryMultiple::Kibi => 2f64.powi(10),
            BinaryMultiple::Mebi => 2f64.powi(20),
            BinaryMultiple::Gibi => 2f64.powi(30),
            BinaryMultiple::Tebi => 2f64.powi(40),
            BinaryMultiple::Pebi => 2f64.powi(50),
            BinaryMultiple::Exbi => 2f64.powi(60),
        }
    }
}

/// Decimal SI multiples, powers of 10.
#[derive(Clone, Copy, Debug, PartialEq, strum::Display, strum::EnumString)]
enum DecimalMultiple {
    #[strum(serialize = "n")]
    Nano,
    #[strum(serialize = "u")]
    Micro,
    #[strum(serialize = "m")]
    Milli,
    #[strum(serialize = "k")]
    Kilo,
    #[strum(serialize = "M")]
    Mega,
    #[strum(serialize = "G")]
    Giga,
    #[strum(serialize = "T")]
    Tera,
    #[strum(serialize = "P")]
    Peta,
    #[strum(serialize = "E")]
    Exa,
}

impl DecimalMultiple {
    fn factor(self) -> f64 {
        match self {
            DecimalMultiple::Nano => 10f64.powi(-9),
            DecimalMultiple::Micro => 10f64.powi(-6),
            DecimalMultiple::Milli => 10f64.powi(-3),
            DecimalMultiple::Kilo => 10f64.powi(3),
            DecimalMultiple::Mega => 10f64.powi(6),
            DecimalMultiple::Giga => 10f64.powi(9),
            DecimalMultiple::Tera => 10f64.powi(12),
            DecimalMultiple::Peta => 10f64.powi(15),
            DecimalMultiple::Exa => 10f64.powi(18),
        }
    }
}

fn suffix_factor(suffix: &str) -> Result<f64, ParseQuantityError> {
    if suffix.is_empty() {
        return Ok(1.0);
    }
    if let Ok(m) = BinaryMultiple::from_str(suffix) {
        return Ok(m.factor());
    }
    if let Ok(m) = DecimalMultiple::from_str(suffix) {
        return Ok(m.factor());
    }
    if let Some(exp) = suffix.strip_prefix(['e', 'E'])
        && let Ok(exp) = f64::from_str(exp)
    {
        return Ok(10f64.powf(exp));
    }
    Err(ParseQuantityError::InvalidSuffix(suffix.to_string()))
}

/// Quantity is a parsed resource quantity.
///
/// The original string is kept so that a quantity picked by comparison can be written back
/// unchanged.
#[derive(Clone, Debug)]
pub struct Quantity {
    value: f64,
    raw: String,
}

impl Quantity {
    /// Returns the value in base units (cores, bytes).
    pub fn value(&self) -> f64 {
        self.value
    }
}

impl FromStr for Quantity {
    type Err = ParseQuantityError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let input = input.trim();
        if input.is_empty() || !input.is_ascii() {
            return Err(ParseQuantityError::InvalidFormat);
        }
        let split = input
            .char_indices()
            .find(|(i, c)| !(c.is_ascii_digit() || *c == '.' || (*i == 0 && matches!(c, '+' | '-'))))
            .map(|(i, _)| i)
            .unwrap_or(input.len());
        let (number, suffix) = input.split_at(split);
        let number = f64::from_str(number)?;
        Ok(Self {
            value: number * suffix_factor(suffix)?,
            raw: input.to_string(),
        })
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl PartialEq for Quantity {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl PartialOrd for Quantity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.value.partial_cmp(&other.value)
    }
}

impl TryFrom<&K8sQuantity> for Quantity {
    type Error = ParseQuantityError;

    fn try_from(value: &K8sQuantity) -> Result<Self, Self::Error> {
        Quantity::from_str(&value.0)
    }
}

impl From<Quantity> for K8sQuantity {
    fn from(value: Quantity) -> Self {
        K8sQuantity(value.raw)
    }
}

/// Compares two Kubernetes quantities numerically.
///
/// Returns `None` if either fails to parse.
pub fn compare(a: &K8sQuantity, b: &K8sQuantity) -> Option<Ordering> {
    let a = Quantity::try_from(a).ok()?;
    let b = Quantity::try_from(b).ok()?;
    a.partial_cmp(&b)
}
