//! Parsing of the portal's Dutch-formatted values.
//!
//! The portal renders amounts as `€ 1.234,56`, quantities as `1.000` and
//! dates as `31/12/2023`. Everything is parsed into typed values before it
//! reaches a sheet.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::{Error, Result};

/// Parse a locale-formatted number.
///
/// Spaces (including non-breaking ones) are ignored. When both `.` and `,`
/// occur the rightmost one is the decimal separator. A lone `,` is decimal
/// when it occurs once. A lone `.` is decimal only when it occurs once and
/// is followed by one or two digits (`12.50`), otherwise it groups
/// thousands (`1.000`). Thousands groups must be three digits wide, and
/// the decimal separator may occur only once.
pub fn parse_decimal(input: &str) -> Result<Decimal> {
    let invalid = || Error::InvalidNumber(input.to_string());

    let compact: String = input.chars().filter(|c| !c.is_whitespace()).collect();
    let (negative, unsigned) = match compact.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, compact.strip_prefix('+').unwrap_or(&compact)),
    };

    let (integer, fraction) = match decimal_separator(unsigned) {
        Some(separator) => {
            if unsigned.matches(separator).count() != 1 {
                return Err(invalid());
            }
            let (integer, fraction) = unsigned.split_once(separator).ok_or_else(invalid)?;
            (integer, Some(fraction))
        }
        None => (unsigned, None),
    };
    if fraction.is_some_and(|f| f.contains([',', '.'])) {
        return Err(invalid());
    }
    let integer = ungroup(integer).ok_or_else(invalid)?;

    let mut normalized = String::with_capacity(compact.len());
    if negative {
        normalized.push('-');
    }
    normalized.push_str(&integer);
    if let Some(fraction) = fraction {
        normalized.push('.');
        normalized.push_str(fraction);
    }

    if !normalized.chars().any(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }
    Decimal::from_str(&normalized).map_err(|_| invalid())
}

fn decimal_separator(number: &str) -> Option<char> {
    match (number.rfind(','), number.rfind('.')) {
        (Some(comma), Some(period)) => Some(if comma > period { ',' } else { '.' }),
        (Some(_), None) => (number.matches(',').count() == 1).then_some(','),
        (None, Some(period)) => {
            let fraction = number.len() - period - 1;
            (number.matches('.').count() == 1 && (1..=2).contains(&fraction)).then_some('.')
        }
        (None, None) => None,
    }
}

/// Strip thousands separators, or `None` when the grouping is malformed.
fn ungroup(integer: &str) -> Option<String> {
    let Some(separator) = integer.chars().find(|c| matches!(c, ',' | '.')) else {
        return Some(integer.to_string());
    };
    let groups: Vec<&str> = integer.split(separator).collect();
    let well_formed = groups.iter().enumerate().all(|(i, group)| {
        let width_ok = if i == 0 {
            (1..=3).contains(&group.len())
        } else {
            group.len() == 3
        };
        width_ok && group.chars().all(|c| c.is_ascii_digit())
    });
    well_formed.then(|| groups.concat())
}

/// Currencies the portal quotes prices in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Currency {
    #[default]
    Eur,
    Usd,
}

impl Currency {
    pub fn symbol(self) -> char {
        match self {
            Currency::Eur => '€',
            Currency::Usd => '$',
        }
    }

    fn from_symbol(c: char) -> Option<Self> {
        match c {
            '€' => Some(Currency::Eur),
            '$' => Some(Currency::Usd),
            _ => None,
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Currency::Eur => "EUR",
            Currency::Usd => "USD",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Money {
    pub amount: Decimal,
    pub currency: Currency,
}

impl Money {
    pub fn new(amount: Decimal, currency: Currency) -> Self {
        Self { amount, currency }
    }

    pub fn eur(amount: Decimal) -> Self {
        Self::new(amount, Currency::Eur)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.amount.is_sign_negative() && !self.amount.is_zero() {
            write!(f, "-{}{:.2}", self.currency.symbol(), self.amount.abs())
        } else {
            write!(f, "{}{:.2}", self.currency.symbol(), self.amount)
        }
    }
}

/// Parse an amount like `€ 1.234,56`, `-€12,00` or `$ 12.00`.
///
/// The currency glyph may be preceded by a sign and followed by spaces.
/// Amounts without a glyph are in euro.
pub fn parse_money(input: &str) -> Result<Money> {
    let trimmed = input.trim();
    let (negative, rest) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest.trim_start()),
        None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed).trim_start()),
    };

    let mut chars = rest.chars();
    let (currency, number) = match chars.next().and_then(Currency::from_symbol) {
        Some(currency) => (currency, chars.as_str()),
        None => (Currency::Eur, rest),
    };

    let amount = parse_decimal(number).map_err(|_| Error::InvalidNumber(input.to_string()))?;
    let amount = if negative { -amount } else { amount };
    Ok(Money::new(amount, currency))
}

/// Parse a `dd/mm/yyyy` date.
pub fn parse_date(input: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(input.trim(), "%d/%m/%Y")
        .map_err(|_| Error::InvalidDate(input.to_string()))
}

/// Kinds of position mutations, in English.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionType {
    Purchase,
    Deposit,
    Delisting,
    Sale,
}

impl TransactionType {
    /// Translate the portal's Dutch label.
    pub fn translate(label: &str) -> Result<Self> {
        match label.trim() {
            "Aankoop" => Ok(TransactionType::Purchase),
            "Deponering" => Ok(TransactionType::Deposit),
            "Lichting" => Ok(TransactionType::Delisting),
            "Verkoop" => Ok(TransactionType::Sale),
            other => Err(Error::UnknownTransactionType(other.to_string())),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TransactionType::Purchase => "Purchase",
            TransactionType::Deposit => "Deposit",
            TransactionType::Delisting => "Delisting",
            TransactionType::Sale => "Sale",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Drop items with a repeated key.
///
/// The last item seen for a key wins but keeps the position where the key
/// first occurred.
pub fn dedupe_by_key<T, K, F>(items: impl IntoIterator<Item = T>, key: F) -> Vec<T>
where
    K: Eq + Hash,
    F: Fn(&T) -> K,
{
    let mut positions: HashMap<K, usize> = HashMap::new();
    let mut out: Vec<T> = Vec::new();
    for item in items {
        match positions.get(&key(&item)) {
            Some(&index) => out[index] = item,
            None => {
                positions.insert(key(&item), out.len());
                out.push(item);
            }
        }
    }
    out
}

/// The issuer of a security, taken to be the first word of its name.
pub fn company_name(security: &str) -> &str {
    security.split_whitespace().next().unwrap_or("")
}
