//! Number formatting for printed and inline values.
//!
//! Numbers print with up to seven significant digits and no trailing zeros.
//! Whole numbers below 1e15 print without a decimal point. Very large and very
//! small magnitudes switch to scientific notation (`1.5e-07`). Nothing is
//! rounded beyond the significant-digit limit; authors round explicitly with
//! `round()`, `signif()` or `format()`.

pub const SIGNIFICANT_DIGITS: usize = 7;

/// The missing value: a quiet NaN whose low word is 1954. Arithmetic on it
/// keeps the payload, so missingness propagates like any other NaN while
/// still printing as `NA`.
pub const NA: f64 = f64::from_bits(0x7FF8_0000_0000_07A2);

pub fn is_na(n: f64) -> bool {
    n.is_nan() && (n.to_bits() & 0xFFFF_FFFF) == 1954
}

pub fn format_number(n: f64) -> String {
    format_significant(n, SIGNIFICANT_DIGITS)
}

pub fn format_significant(n: f64, digits: usize) -> String {
    if is_na(n) {
        return "NA".to_string();
    }
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Inf" } else { "-Inf" }.to_string();
    }
    if n == 0.0 {
        return "0".to_string();
    }
    if n.fract() == 0.0 && n.abs() < 1e15 {
        return format!("{}", n as i64);
    }

    let digits = digits.max(1);
    let magnitude = n.abs().log10().floor() as i32;
    if magnitude >= 15 || magnitude < -4 {
        return format_scientific(n, digits);
    }

    let decimals = (digits as i32 - 1 - magnitude).max(0) as usize;
    trim_zeros(format!("{:.*}", decimals, n))
}

/// Format with at least `min_decimals` digits after the decimal point.
pub fn format_with_decimals(n: f64, min_decimals: usize) -> String {
    let formatted = format_number(n);
    if !n.is_finite() || formatted.contains('e') {
        return formatted;
    }
    let current = decimals_of(&formatted);
    if current >= min_decimals {
        return formatted;
    }
    let mut padded = formatted;
    if current == 0 {
        padded.push('.');
    }
    padded.extend(std::iter::repeat_n('0', min_decimals - current));
    padded
}

/// Number of digits after the decimal point in a formatted number.
pub fn decimals_of(formatted: &str) -> usize {
    formatted.find('.').map(|dot| formatted.len() - dot - 1).unwrap_or(0)
}

/// Round to `digits` decimal places, ties to even.
pub fn round_to(n: f64, digits: i32) -> f64 {
    if !n.is_finite() {
        return n;
    }
    let factor = 10f64.powi(digits);
    (n * factor).round_ties_even() / factor
}

fn format_scientific(n: f64, digits: usize) -> String {
    let raw = format!("{:.*e}", digits - 1, n);
    let Some((mantissa, exponent)) = raw.split_once('e') else {
        return raw;
    };
    let mantissa = trim_zeros(mantissa.to_string());
    let exponent: i32 = exponent.parse().unwrap_or(0);
    let sign = if exponent < 0 { '-' } else { '+' };
    format!("{}e{}{:02}", mantissa, sign, exponent.abs())
}

fn trim_zeros(s: String) -> String {
    if !s.contains('.') {
        return s;
    }
    s.trim_end_matches('0').trim_end_matches('.').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integers() {
        assert_eq!(format_number(4.0), "4");
        assert_eq!(format_number(-12.0), "-12");
        assert_eq!(format_number(0.0), "0");
    }

    #[test]
    fn seven_significant_digits() {
        assert_eq!(format_number(std::f64::consts::PI), "3.141593");
        assert_eq!(format_number(1.0 / 3.0), "0.3333333");
        assert_eq!(format_number(123456.789), "123456.8");
        assert_eq!(format_number(0.1 + 0.2), "0.3");
        assert_eq!(format_number(2.5), "2.5");
    }

    #[test]
    fn scientific_for_extreme_magnitudes() {
        assert_eq!(format_number(0.0000123), "1.23e-05");
        assert_eq!(format_number(1e15), "1e+15");
    }

    #[test]
    fn non_finite() {
        assert_eq!(format_number(f64::NAN), "NaN");
        assert_eq!(format_number(NA), "NA");
        assert_eq!(format_number(NA + 1.0), "NA");
        assert!(!is_na(f64::NAN));
        assert_eq!(format_number(f64::INFINITY), "Inf");
        assert_eq!(format_number(f64::NEG_INFINITY), "-Inf");
    }

    #[test]
    fn minimum_decimals() {
        assert_eq!(format_with_decimals(3.0, 2), "3.00");
        assert_eq!(format_with_decimals(3.1, 2), "3.10");
        assert_eq!(format_with_decimals(3.14159, 2), "3.14159");
    }

    #[test]
    fn rounding() {
        assert_eq!(round_to(2.5, 0), 2.0);
        assert_eq!(round_to(3.5, 0), 4.0);
        assert_eq!(round_to(3.14159, 2), 3.14);
        assert_eq!(round_to(-1.005, 1), -1.0);
    }
}
