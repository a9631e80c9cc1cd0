//! Price text parsing and denomination classification.

use crate::models::{Denomination, Price, RIALS_PER_TOMAN};

use super::text::normalize_digits;

/// Unit-less amounts below this are read as toman; anything else as rial.
///
/// A magnitude guess carried over from the vendors' habits with no
/// per-vendor confirmation.
pub const TOMAN_MAGNITUDE_THRESHOLD: i64 = 100_000_000;

const THOUSAND_TOMAN: &[&str] = &["هزار تومان", "هزارتومان", "thousand toman"];
const TOMAN: &[&str] = &["تومان", "toman", "tmn"];
const RIAL: &[&str] = &["ریال", "ريال", "rial", "irr"];

/// Parse raw price text into both denominations.
///
/// Returns `None` when no positive amount is present.
pub fn parse_price(raw: &str) -> Option<Price> {
    let text = normalize_digits(raw);
    let amount = leading_amount(&text)?;
    if amount <= 0 {
        return None;
    }

    let lower = text.to_lowercase();
    let (natural, denomination) = match unit_keyword(&lower) {
        Some(Unit::ThousandToman) => (amount.checked_mul(1000)?, Denomination::Toman),
        Some(Unit::Toman) => (amount, Denomination::Toman),
        Some(Unit::Rial) => (amount, Denomination::Rial),
        None if amount < TOMAN_MAGNITUDE_THRESHOLD => (amount, Denomination::Toman),
        None => (amount, Denomination::Rial),
    };
    if denomination == Denomination::Toman {
        natural.checked_mul(RIALS_PER_TOMAN)?;
    }
    Some(Price::from_natural(natural, denomination))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Unit {
    ThousandToman,
    Toman,
    Rial,
}

/// Earliest unit keyword in the text; thousand-toman beats a bare toman at the same spot.
fn unit_keyword(lower: &str) -> Option<Unit> {
    let mut best: Option<(usize, Unit)> = None;
    for (unit, words) in [
        (Unit::ThousandToman, THOUSAND_TOMAN),
        (Unit::Toman, TOMAN),
        (Unit::Rial, RIAL),
    ] {
        for word in words {
            if let Some(pos) = lower.find(word) {
                if best.map_or(true, |(p, _)| pos < p) {
                    best = Some((pos, unit));
                }
            }
        }
    }
    best.map(|(_, unit)| unit)
}

/// First run of ASCII digits with thousands separators, as an integer.
///
/// Separators are `,`, the Arabic thousands sign and the Arabic comma, plus
/// `.` when it groups exactly three digits. The Arabic decimal separator ends
/// the run.
fn leading_amount(text: &str) -> Option<i64> {
    let chars: Vec<char> = text.chars().collect();
    let start = chars.iter().position(|c| c.is_ascii_digit())?;

    let mut digits = String::new();
    let mut i = start;
    while i < chars.len() {
        let c = chars[i];
        if c.is_ascii_digit() {
            digits.push(c);
        } else if matches!(c, ',' | '\u{066C}' | '\u{060C}') || (c == '.' && groups_three(&chars, i)) {
            if !chars.get(i + 1).is_some_and(|n| n.is_ascii_digit()) {
                break;
            }
        } else {
            break;
        }
        i += 1;
    }
    digits.parse::<i64>().ok()
}

fn groups_three(chars: &[char], dot: usize) -> bool {
    let run = chars[dot + 1..]
        .iter()
        .take_while(|c| c.is_ascii_digit())
        .count();
    run == 3
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn persian_toman_price() {
        let price = parse_price("۲۵۰,۰۰۰ تومان").unwrap();
        assert_eq!(price.natural, Denomination::Toman);
        assert_eq!(price.natural_amount(), 250_000);
        assert_eq!(price.derived_amount(), 2_500_000);
    }

    #[test]
    fn rial_keyword_wins_over_magnitude() {
        let price = parse_price("۱٬۲۰۰٬۰۰۰ ریال").unwrap();
        assert_eq!(price.natural, Denomination::Rial);
        assert_eq!(price.rial, 1_200_000);
        assert_eq!(price.toman, 120_000);
    }

    #[test]
    fn thousand_toman_is_scaled() {
        let price = parse_price("۸۵۰ هزار تومان").unwrap();
        assert_eq!(price.toman, 850_000);
        assert_eq!(price.rial, 8_500_000);
    }

    #[test]
    fn magnitude_heuristic_without_unit() {
        let small = parse_price("12,990,000").unwrap();
        assert_eq!(small.natural, Denomination::Toman);
        assert_eq!(small.rial, 129_900_000);

        let large = parse_price("459,900,000").unwrap();
        assert_eq!(large.natural, Denomination::Rial);
        assert_eq!(large.toman, 45_990_000);
    }

    #[test]
    fn takes_only_the_leading_run() {
        // Discounted price followed by the original one.
        let price = parse_price("قیمت: 1,250,000 تومان 1,500,000").unwrap();
        assert_eq!(price.toman, 1_250_000);
    }

    #[test]
    fn decimal_separator_ends_the_amount() {
        let price = parse_price("۱۲٫۵ toman").unwrap();
        assert_eq!(price.toman, 12);
    }

    #[test]
    fn dot_grouping() {
        assert_eq!(parse_price("3.490.000 تومان").unwrap().toman, 3_490_000);
    }

    #[test]
    fn no_amount_is_none() {
        assert!(parse_price("تماس بگیرید").is_none());
        assert!(parse_price("").is_none());
        assert!(parse_price("0 تومان").is_none());
    }

    #[test]
    fn denominations_are_always_paired() {
        for raw in ["100 تومان", "100 ریال", "100", "999999999999"] {
            let p = parse_price(raw).unwrap();
            assert_eq!(
                p.rial,
                match p.natural {
                    Denomination::Toman => p.toman * 10,
                    Denomination::Rial => p.rial,
                }
            );
            assert_eq!(p.toman, p.rial / 10);
        }
    }
}
