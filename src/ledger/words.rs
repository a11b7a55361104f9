//! English words for invoice amounts
//!
//! "One Thousand Two Hundred and Thirty Four": title case, "and" between a
//! hundreds digit and its remainder, no "and" between scale groups.

use crate::validation::ValidationError;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Deserialize;
use std::str::FromStr;

const ONES: [&str; 10] = [
    "", "One", "Two", "Three", "Four", "Five", "Six", "Seven", "Eight", "Nine",
];

const TEENS: [&str; 10] = [
    "Ten",
    "Eleven",
    "Twelve",
    "Thirteen",
    "Fourteen",
    "Fifteen",
    "Sixteen",
    "Seventeen",
    "Eighteen",
    "Nineteen",
];

const TENS: [&str; 10] = [
    "", "", "Twenty", "Thirty", "Forty", "Fifty", "Sixty", "Seventy", "Eighty", "Ninety",
];

// One name per group of three digits in a u128 (max ~3.4e38)
const SCALES: [&str; 13] = [
    "",
    "Thousand",
    "Million",
    "Billion",
    "Trillion",
    "Quadrillion",
    "Quintillion",
    "Sextillion",
    "Septillion",
    "Octillion",
    "Nonillion",
    "Decillion",
    "Undecillion",
];

/// What to do with the fractional part of an amount before spelling it out
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AmountWordsMode {
    #[default]
    Truncate,
    Round,
    Reject,
}

impl FromStr for AmountWordsMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "truncate" => Ok(AmountWordsMode::Truncate),
            "round" => Ok(AmountWordsMode::Round),
            "reject" => Ok(AmountWordsMode::Reject),
            other => Err(format!("unknown amount words mode '{}'", other)),
        }
    }
}

/// Spell out a whole number. Zero yields an empty string.
pub fn number_to_words(n: u128) -> String {
    if n == 0 {
        return String::new();
    }

    let mut groups: Vec<String> = Vec::new();
    let mut rest = n;
    let mut scale = 0;
    while rest > 0 {
        let chunk = (rest % 1000) as usize;
        if chunk != 0 {
            let mut words = below_thousand(chunk);
            if !SCALES[scale].is_empty() {
                words.push(' ');
                words.push_str(SCALES[scale]);
            }
            groups.push(words);
        }
        rest /= 1000;
        scale += 1;
    }

    groups.reverse();
    groups.join(" ")
}

/// Spell out a decimal amount. Negative amounts yield an empty string.
pub fn amount_in_words(amount: Decimal, mode: AmountWordsMode) -> Result<String, ValidationError> {
    if amount <= Decimal::ZERO {
        return Ok(String::new());
    }

    let whole = match mode {
        AmountWordsMode::Truncate => amount.trunc(),
        AmountWordsMode::Round => amount.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero),
        AmountWordsMode::Reject => {
            if !amount.fract().is_zero() {
                return Err(ValidationError::FractionalAmount { amount });
            }
            amount
        }
    };

    Ok(whole.to_u128().map(number_to_words).unwrap_or_default())
}

fn below_thousand(n: usize) -> String {
    match n {
        0 => String::new(),
        1..=9 => ONES[n].to_string(),
        10..=19 => TEENS[n - 10].to_string(),
        20..=99 => {
            let mut words = TENS[n / 10].to_string();
            if n % 10 != 0 {
                words.push(' ');
                words.push_str(ONES[n % 10]);
            }
            words
        }
        _ => {
            let mut words = format!("{} Hundred", ONES[n / 100]);
            if n % 100 != 0 {
                words.push_str(" and ");
                words.push_str(&below_thousand(n % 100));
            }
            words
        }
    }
}
