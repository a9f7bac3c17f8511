//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely, plus the
//! two scalar types that multiply it: [`Rate`] (commission / fee percentages)
//! and [`ExchangeRate`] (fixed FX for cash consolidation).
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  In binary floating point:                                              │
//! │    24.90 × 0.05 = 1.2450000000000001  → rounds to 1.25 by luck         │
//! │    1.005 × 100  = 100.49999999999999  → rounds to 1.00, not 1.01       │
//! │                                                                         │
//! │  OUR SOLUTION: Integer Centavos                                         │
//! │    2490 × 500 bps = 1_245_000 → (1_245_000 + 5_000) / 10_000 = 125     │
//! │    Half-up rounding, exact, same result on every machine               │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use psiuu_core::money::{Money, Rate};
//!
//! let gross = Money::from_cents(2490); // R$ 24,90
//! let agent = gross.apply_rate(Rate::from_bps(500));
//! assert_eq!(agent.cents(), 125); // R$ 1,25
//! ```

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};

/// Largest magnitude accepted from a decimal (keeps `value * 100` exact in f64).
const MAX_DECIMAL_MAGNITUDE: f64 = 1e13;

/// Scale of [`ExchangeRate`]: four decimal places.
const FX_SCALE: i128 = 10_000;

/// Largest exchange rate accepted into BRL.
const MAX_EXCHANGE_RATE: f64 = 10_000.0;

/// Narrows an i128 result to centavos, pinned at the i64 bounds.
#[inline]
fn saturate(value: i128) -> i64 {
    value.clamp(i128::from(i64::MIN), i128::from(i64::MAX)) as i64
}

// =============================================================================
// Currency
// =============================================================================

/// Currencies a bank account can hold.
///
/// BRL is the local (reporting) currency; everything else is converted with
/// a configured [`ExchangeRate`] before being added to the cash position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum Currency {
    #[default]
    #[serde(rename = "BRL")]
    Brl,
    #[serde(rename = "USD")]
    Usd,
}

impl Currency {
    /// Returns true for the reporting currency.
    #[inline]
    pub const fn is_local(&self) -> bool {
        matches!(*self, crate::LOCAL_CURRENCY)
    }

    /// Display prefix used by the dashboard.
    pub const fn symbol(&self) -> &'static str {
        match self {
            Currency::Brl => "R$",
            Currency::Usd => "US$",
        }
    }

    /// ISO 4217 code.
    pub const fn code(&self) -> &'static str {
        match self {
            Currency::Brl => "BRL",
            Currency::Usd => "USD",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl std::str::FromStr for Currency {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "BRL" => Ok(Currency::Brl),
            "USD" => Ok(Currency::Usd),
            other => Err(CoreError::invalid_input(
                "currency",
                format!("unsupported currency '{}'", other),
            )),
        }
    }
}

// =============================================================================
// Money Type
// =============================================================================

/// Represents a monetary value in centavos (1/100 of the currency unit).
///
/// ## Design Decisions
/// - **i64 (signed)**: bank balances can be overdrawn
/// - **Saturating**: arithmetic pins at the i64 bounds instead of wrapping
/// - **Single field tuple struct**: zero-cost abstraction over i64
/// - **Currency-agnostic**: the owning record carries the currency
///
/// ## Where Money is Used
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  Tier price ──► Sale.gross ──┬──► store fee        (× store rate)      │
/// │                              ├──► influencer cut   (× 20%)             │
/// │                              └──► agent cut        (× 5%)              │
/// │                                                                         │
/// │  Sale commissions ──► beneficiary balance ──► Payout.amount (snapshot) │
/// │                                                                         │
/// │  Sales / infra / opex / bank balances ──► DashboardSummary KPIs        │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from centavos.
    ///
    /// ## Example
    /// ```rust
    /// use psiuu_core::money::Money;
    ///
    /// let price = Money::from_cents(2490); // R$ 24,90
    /// assert_eq!(price.cents(), 2490);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Creates a Money value from major and minor units.
    ///
    /// ## Example
    /// ```rust
    /// use psiuu_core::money::Money;
    ///
    /// assert_eq!(Money::from_major_minor(24, 90).cents(), 2490);
    /// assert_eq!(Money::from_major_minor(-5, 50).cents(), -550);
    /// ```
    #[inline]
    pub const fn from_major_minor(major: i64, minor: i64) -> Self {
        if major < 0 {
            Money(major * 100 - minor)
        } else {
            Money(major * 100 + minor)
        }
    }

    /// Parses a decimal amount coming from an external payload.
    ///
    /// This is the only place a float becomes Money. NaN and infinities are
    /// rejected; the value is rounded to the nearest centavo.
    ///
    /// ## Example
    /// ```rust
    /// use psiuu_core::money::Money;
    ///
    /// assert_eq!(Money::try_from_decimal("valorBruto", 24.9).unwrap().cents(), 2490);
    /// assert!(Money::try_from_decimal("valorBruto", f64::NAN).is_err());
    /// ```
    pub fn try_from_decimal(field: &str, value: f64) -> CoreResult<Self> {
        if !value.is_finite() {
            return Err(CoreError::invalid_input(field, "amount is not a finite number"));
        }
        if value.abs() >= MAX_DECIMAL_MAGNITUDE {
            return Err(CoreError::invalid_input(field, "amount is out of range"));
        }
        Ok(Money((value * 100.0).round() as i64))
    }

    /// Same as [`Money::try_from_decimal`] but rejects negative amounts.
    pub fn try_from_non_negative_decimal(field: &str, value: f64) -> CoreResult<Self> {
        let money = Self::try_from_decimal(field, value)?;
        if money.is_negative() {
            return Err(CoreError::invalid_input(field, "amount cannot be negative"));
        }
        Ok(money)
    }

    /// Returns the value as a decimal, for wire payloads only.
    #[inline]
    pub fn to_decimal(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// Returns the value in centavos.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the major unit (reais) portion.
    #[inline]
    pub const fn major(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the minor unit portion (always 0-99).
    #[inline]
    pub const fn cents_part(&self) -> i64 {
        (self.0 % 100).abs()
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Checks if the value is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checks if the value is positive (greater than zero).
    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Checks if the value is negative (less than zero).
    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Returns the absolute value.
    #[inline]
    pub const fn abs(&self) -> Self {
        Money(self.0.abs())
    }

    /// Applies a percentage rate, rounding half-up to the centavo.
    ///
    /// ## Rounding
    /// ```text
    /// ┌─────────────────────────────────────────────────────────────────────┐
    /// │  HALF-UP (half away from zero)                                      │
    /// │                                                                     │
    /// │    24,90 × 20% = 4,980  → 4,98                                      │
    /// │    24,90 ×  5% = 1,245  → 1,25   (half goes up)                     │
    /// │    14,90 × 15% = 2,235  → 2,24                                      │
    /// │                                                                     │
    /// │  Integer form: (cents × bps ± 5000) / 10000                        │
    /// └─────────────────────────────────────────────────────────────────────┘
    /// ```
    ///
    /// ## Example
    /// ```rust
    /// use psiuu_core::money::{Money, Rate};
    ///
    /// let gross = Money::from_cents(2490);
    /// assert_eq!(gross.apply_rate(Rate::from_bps(2000)).cents(), 498);
    /// assert_eq!(gross.apply_rate(Rate::from_bps(500)).cents(), 125);
    /// ```
    pub fn apply_rate(&self, rate: Rate) -> Money {
        let product = i128::from(self.0) * i128::from(rate.bps());
        let rounded = if product >= 0 {
            (product + 5000) / 10000
        } else {
            (product - 5000) / 10000
        };
        Money(saturate(rounded))
    }

    /// Converts an amount held in a foreign currency into local currency.
    ///
    /// ## Example
    /// ```rust
    /// use psiuu_core::money::{ExchangeRate, Money};
    ///
    /// let usd = Money::from_cents(100_000); // US$ 1.000,00
    /// let brl = usd.convert(ExchangeRate::from_scaled(55_000)); // 5.5000
    /// assert_eq!(brl.cents(), 550_000);
    /// ```
    pub fn convert(&self, rate: ExchangeRate) -> Money {
        let product = i128::from(self.0) * i128::from(rate.scaled());
        let half = FX_SCALE / 2;
        let rounded = if product >= 0 {
            (product + half) / FX_SCALE
        } else {
            (product - half) / FX_SCALE
        };
        Money(saturate(rounded))
    }

    /// Formats with a currency prefix in the dashboard's pt-BR style.
    ///
    /// ## Example
    /// ```rust
    /// use psiuu_core::money::{Currency, Money};
    ///
    /// let m = Money::from_cents(125_000);
    /// assert_eq!(m.format(Currency::Brl), "R$ 1.250,00");
    /// assert_eq!(m.format(Currency::Usd), "US$ 1.250,00");
    /// ```
    pub fn format(&self, currency: Currency) -> String {
        let sign = if self.0 < 0 { "-" } else { "" };
        let major = (self.0 / 100).unsigned_abs();
        format!(
            "{}{} {},{:02}",
            sign,
            currency.symbol(),
            group_thousands(major),
            self.cents_part()
        )
    }
}

/// Inserts `.` every three digits: 1250000 → "1.250.000".
fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push('.');
        }
        out.push(ch);
    }
    out
}

// =============================================================================
// Rate
// =============================================================================

/// A percentage in basis points (1 bps = 0.01%).
///
/// 2000 bps = 20% (influencer), 500 bps = 5% (agent), 1500 bps = 15% (store).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Rate(u32);

impl Rate {
    /// Creates a rate from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        Rate(bps)
    }

    /// Creates a rate from a percentage (config convenience).
    pub fn from_percentage(pct: f64) -> Self {
        Rate((pct * 100.0).round().max(0.0) as u32)
    }

    /// Returns the rate in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the rate as a percentage (display only).
    #[inline]
    pub fn percentage(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// Zero rate.
    #[inline]
    pub const fn zero() -> Self {
        Rate(0)
    }

    /// Label shown next to extract lines: "20%", "5%", "2.5%".
    pub fn label(&self) -> String {
        if self.0 % 100 == 0 {
            format!("{}%", self.0 / 100)
        } else {
            let text = format!("{:.2}", self.percentage());
            format!("{}%", text.trim_end_matches('0'))
        }
    }
}

impl Default for Rate {
    fn default() -> Self {
        Rate::zero()
    }
}

// =============================================================================
// Exchange Rate
// =============================================================================

/// Fixed conversion rate from a foreign currency into BRL, four decimals.
///
/// Serialized as a plain decimal (`5.5`) so it reads naturally in
/// `finance.toml`; stored scaled by 10 000 so conversions stay integral.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ExchangeRate(u64);

impl ExchangeRate {
    /// Creates a rate from its scaled representation (5.5 → 55_000).
    #[inline]
    pub const fn from_scaled(scaled: u64) -> Self {
        ExchangeRate(scaled)
    }

    /// Creates a rate from a decimal, rejecting NaN, infinities, negatives
    /// and anything above 10 000.
    pub fn try_from_decimal(value: f64) -> CoreResult<Self> {
        if !value.is_finite() || value < 0.0 || value > MAX_EXCHANGE_RATE {
            return Err(CoreError::invalid_input(
                "exchange rate",
                format!("{} is not a valid rate", value),
            ));
        }
        Ok(ExchangeRate((value * FX_SCALE as f64).round() as u64))
    }

    /// Returns the scaled value.
    #[inline]
    pub const fn scaled(&self) -> u64 {
        self.0
    }

    /// Returns the rate as a decimal (display only).
    #[inline]
    pub fn as_decimal(&self) -> f64 {
        self.0 as f64 / FX_SCALE as f64
    }
}

impl Serialize for ExchangeRate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_decimal())
    }
}

impl<'de> Deserialize<'de> for ExchangeRate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = f64::deserialize(deserializer)?;
        ExchangeRate::try_from_decimal(value).map_err(serde::de::Error::custom)
    }
}

impl fmt::Display for ExchangeRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4}", self.as_decimal())
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Displays in the reporting currency.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.format(crate::LOCAL_CURRENCY))
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0.saturating_add(other.0))
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 = self.0.saturating_add(other.0);
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0.saturating_sub(other.0))
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 = self.0.saturating_sub(other.0);
    }
}

impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0.saturating_mul(qty))
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), Add::add)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_cents() {
        let money = Money::from_cents(2490);
        assert_eq!(money.cents(), 2490);
        assert_eq!(money.major(), 24);
        assert_eq!(money.cents_part(), 90);
    }

    #[test]
    fn test_display_pt_br() {
        assert_eq!(Money::from_cents(2490).to_string(), "R$ 24,90");
        assert_eq!(Money::from_cents(0).to_string(), "R$ 0,00");
        assert_eq!(Money::from_cents(-550).to_string(), "-R$ 5,50");
        assert_eq!(Money::from_cents(123_456_789).to_string(), "R$ 1.234.567,89");
        assert_eq!(Money::from_cents(100_000).to_string(), "R$ 1.000,00");
    }

    #[test]
    fn test_try_from_decimal() {
        assert_eq!(Money::try_from_decimal("x", 24.9).unwrap().cents(), 2490);
        assert_eq!(Money::try_from_decimal("x", 1.005).unwrap().cents(), 100);
        assert_eq!(Money::try_from_decimal("x", -3.2).unwrap().cents(), -320);
        assert!(Money::try_from_decimal("x", f64::NAN).is_err());
        assert!(Money::try_from_decimal("x", f64::INFINITY).is_err());
        assert!(Money::try_from_non_negative_decimal("x", -0.01).is_err());
        assert!(Money::try_from_non_negative_decimal("x", 0.0).is_ok());
    }

    #[test]
    fn test_apply_rate_half_up() {
        let gross = Money::from_cents(2490);
        assert_eq!(gross.apply_rate(Rate::from_bps(2000)).cents(), 498);
        assert_eq!(gross.apply_rate(Rate::from_bps(500)).cents(), 125);
        assert_eq!(gross.apply_rate(Rate::from_bps(1500)).cents(), 374);

        // 14,90 × 15% = 2,235 → 2,24
        assert_eq!(Money::from_cents(1490).apply_rate(Rate::from_bps(1500)).cents(), 224);
        // Symmetric for negatives
        assert_eq!(Money::from_cents(-2490).apply_rate(Rate::from_bps(500)).cents(), -125);
    }

    #[test]
    fn test_convert() {
        let rate = ExchangeRate::try_from_decimal(5.5).unwrap();
        assert_eq!(rate.scaled(), 55_000);
        assert_eq!(Money::from_cents(1).convert(rate).cents(), 6); // 5.5 → 6
        assert_eq!(Money::from_cents(10_000).convert(rate).cents(), 55_000);
        assert!(ExchangeRate::try_from_decimal(-1.0).is_err());
        assert!(ExchangeRate::try_from_decimal(f64::NAN).is_err());
        assert!(ExchangeRate::try_from_decimal(10_000.0).is_ok());
        assert!(ExchangeRate::try_from_decimal(10_000.5).is_err());
        assert!(ExchangeRate::try_from_decimal(1e12).is_err());
    }

    #[test]
    fn test_conversions_saturate() {
        let top = ExchangeRate::try_from_decimal(10_000.0).unwrap();
        assert_eq!(Money::from_cents(i64::MAX).convert(top).cents(), i64::MAX);
        assert_eq!(Money::from_cents(i64::MIN).convert(top).cents(), i64::MIN);
        assert_eq!(
            Money::from_cents(i64::MAX).apply_rate(Rate::from_bps(20_000)).cents(),
            i64::MAX
        );
    }

    #[test]
    fn test_arithmetic_saturates() {
        let max = Money::from_cents(i64::MAX);
        let min = Money::from_cents(i64::MIN);
        assert_eq!(max + Money::from_cents(1), max);
        assert_eq!(min - Money::from_cents(1), min);
        assert_eq!(max * 2, max);
        assert_eq!([max, max, Money::from_cents(-5)].iter().sum::<Money>(), max - Money::from_cents(5));

        let mut total = max;
        total += Money::from_cents(100);
        assert_eq!(total, max);
    }

    #[test]
    fn test_display_uses_local_currency() {
        assert!(crate::LOCAL_CURRENCY.is_local());
        assert!(!Currency::Usd.is_local());
        assert_eq!(
            Money::from_cents(125_000).to_string(),
            Money::from_cents(125_000).format(crate::LOCAL_CURRENCY)
        );
    }

    #[test]
    fn test_exchange_rate_serde() {
        let rate: ExchangeRate = serde_json::from_str("5.5").unwrap();
        assert_eq!(rate, ExchangeRate::from_scaled(55_000));
        assert_eq!(serde_json::to_string(&rate).unwrap(), "5.5");
        assert!(serde_json::from_str::<ExchangeRate>("-2.0").is_err());
    }

    #[test]
    fn test_rate_label() {
        assert_eq!(Rate::from_bps(2000).label(), "20%");
        assert_eq!(Rate::from_bps(500).label(), "5%");
        assert_eq!(Rate::from_bps(250).label(), "2.5%");
        assert_eq!(Rate::from_percentage(15.0).bps(), 1500);
    }

    #[test]
    fn test_sum() {
        let amounts = [Money::from_cents(100), Money::from_cents(250)];
        let total: Money = amounts.iter().sum();
        assert_eq!(total.cents(), 350);
        let empty: Vec<Money> = Vec::new();
        assert!(empty.into_iter().sum::<Money>().is_zero());
    }

    #[test]
    fn test_currency_parse() {
        assert_eq!("brl".parse::<Currency>().unwrap(), Currency::Brl);
        assert_eq!("USD".parse::<Currency>().unwrap(), Currency::Usd);
        assert!("EUR".parse::<Currency>().is_err());
    }
}
