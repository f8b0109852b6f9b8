//! Kubernetes resource quantities (`500m`, `2Gi`, `1e3`, `0.5`).

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("quantities must match the regular expression '^([+-]?[0-9.]+)([eEinumkKMGTP]*[-+]?[0-9]*)$': {0:?}")]
pub struct QuantityError(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantityFormat {
    BinarySi,
    DecimalSi,
    DecimalExponent,
}

/// A validated quantity. `value` is an approximation in base units and is
/// only meant for comparisons and display.
#[derive(Debug, Clone, PartialEq)]
pub struct Quantity {
    raw: String,
    pub value: f64,
    pub format: QuantityFormat,
}

impl Quantity {
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

fn suffix_multiplier(suffix: &str) -> Option<(f64, QuantityFormat)> {
    use QuantityFormat::*;
    let m = match suffix {
        "Ki" => (2f64.powi(10), BinarySi),
        "Mi" => (2f64.powi(20), BinarySi),
        "Gi" => (2f64.powi(30), BinarySi),
        "Ti" => (2f64.powi(40), BinarySi),
        "Pi" => (2f64.powi(50), BinarySi),
        "Ei" => (2f64.powi(60), BinarySi),
        "n" => (1e-9, DecimalSi),
        "u" => (1e-6, DecimalSi),
        "m" => (1e-3, DecimalSi),
        "" => (1.0, DecimalSi),
        "k" => (1e3, DecimalSi),
        "M" => (1e6, DecimalSi),
        "G" => (1e9, DecimalSi),
        "T" => (1e12, DecimalSi),
        "P" => (1e15, DecimalSi),
        "E" => (1e18, DecimalSi),
        _ => return None,
    };
    Some(m)
}

/// `e`/`E` followed by an optionally signed integer.
fn exponent(suffix: &str) -> Option<i32> {
    let rest = suffix.strip_prefix(['e', 'E'])?;
    let digits = rest.strip_prefix(['+', '-']).unwrap_or(rest);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    rest.parse().ok()
}

pub fn parse_quantity(input: &str) -> Result<Quantity, QuantityError> {
    let err = || QuantityError(input.to_string());
    let s = input.trim();
    if s.is_empty() {
        return Err(err());
    }

    let (sign, body) = match s.as_bytes()[0] {
        b'-' => (-1.0, &s[1..]),
        b'+' => (1.0, &s[1..]),
        _ => (1.0, s),
    };

    let num_end = body.find(|c: char| !(c.is_ascii_digit() || c == '.')).unwrap_or(body.len());
    let (number, suffix) = body.split_at(num_end);
    if number.is_empty() || number == "." || number.matches('.').count() > 1 {
        return Err(err());
    }
    let magnitude: f64 = number.parse().map_err(|_| err())?;

    let (multiplier, format) = match suffix_multiplier(suffix) {
        Some(m) => m,
        None => {
            let exp = exponent(suffix).ok_or_else(err)?;
            (10f64.powi(exp), QuantityFormat::DecimalExponent)
        }
    };

    Ok(Quantity { raw: s.to_string(), value: sign * magnitude * multiplier, format })
}
