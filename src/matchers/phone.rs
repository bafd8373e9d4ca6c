use serde::Deserialize;

use super::Comparison;
use crate::record::Scalar;

const LOCAL_DIGITS: usize = 7;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PhoneMatcher {}

impl PhoneMatcher {
    pub fn compare(&self, gold: &Scalar, predicted: &Scalar) -> Comparison {
        let (Some(gold_digits), Some(predicted_digits)) = (digits(gold), digits(predicted)) else {
            return Comparison::Unparseable {
                gold: digits(gold).is_none(),
                predicted: digits(predicted).is_none(),
            };
        };

        let same_local = local_part(&gold_digits) == local_part(&predicted_digits);
        let nested =
            gold_digits.contains(&predicted_digits) || predicted_digits.contains(&gold_digits);

        if gold_digits == predicted_digits || (nested && same_local) {
            Comparison::scored(1.0, gold_digits)
        } else if same_local {
            Comparison::scored(0.7, format!("partial {gold_digits} vs {predicted_digits}"))
        } else {
            Comparison::scored(0.0, format!("{gold_digits} vs {predicted_digits}"))
        }
    }
}

/// Digits of a plausible phone number: 7 to 15 digits, not all zeros or eights.
fn digits(value: &Scalar) -> Option<String> {
    let digits = value
        .display_value()
        .chars()
        .filter(char::is_ascii_digit)
        .collect::<String>();

    if !(7..=15).contains(&digits.len()) {
        return None;
    }
    if digits.chars().all(|ch| ch == '0') || digits.chars().all(|ch| ch == '8') {
        return None;
    }
    Some(digits)
}

fn local_part(digits: &str) -> &str {
    &digits[digits.len().saturating_sub(LOCAL_DIGITS)..]
}
