use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

const DECIMAL_PLACES: u32 = 2;

/// Largest amount representable with ten digits, two of them decimal.
fn max_amount() -> Decimal {
    Decimal::new(9_999_999_999, DECIMAL_PLACES)
}

/// Non-negative amount with at most ten digits, two of them after the point.
/// Always held at scale 2, so it prints as `5000.00`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Salary(#[serde(serialize_with = "rust_decimal::serde::str::serialize")] Decimal);

impl Salary {
    pub fn whole(units: u64) -> Result<Self, SalaryError> {
        Self::try_from(Decimal::from(units))
    }

    pub fn amount(self) -> Decimal {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SalaryError {
    #[error("salary must be a non-negative decimal with at most two decimal places")]
    Malformed,
    #[error("salary must have at most 10 digits")]
    TooLarge,
}

impl TryFrom<Decimal> for Salary {
    type Error = SalaryError;

    fn try_from(mut amount: Decimal) -> Result<Self, Self::Error> {
        if amount < Decimal::ZERO || amount.scale() > DECIMAL_PLACES {
            return Err(SalaryError::Malformed);
        }
        if amount > max_amount() {
            return Err(SalaryError::TooLarge);
        }
        amount.set_sign_positive(true);
        amount.rescale(DECIMAL_PLACES);
        Ok(Self(amount))
    }
}

impl FromStr for Salary {
    type Err = SalaryError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let amount = Decimal::from_str(raw.trim()).map_err(|_| SalaryError::Malformed)?;
        Self::try_from(amount)
    }
}

impl fmt::Display for Salary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Accepts JSON numbers as well as decimal strings.
impl<'de> Deserialize<'de> for Salary {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let amount = <Decimal as Deserialize>::deserialize(deserializer)?;
        Self::try_from(amount).map_err(serde::de::Error::custom)
    }
}

/// Salary as presented to a particular actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SalaryView {
    Disclosed(Salary),
    Confidential,
}

impl SalaryView {
    pub const SENTINEL: &'static str = "confidential";
}

impl Serialize for SalaryView {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            SalaryView::Disclosed(salary) => salary.serialize(serializer),
            SalaryView::Confidential => serializer.serialize_str(Self::SENTINEL),
        }
    }
}
