/// Parses the longest decimal literal at the start of `s` (after leading
/// whitespace), ignoring whatever trails it: `"20.0 m^2"` gives `20.0`.
/// Returns `None` when no digits lead the string.
pub fn parse_leading_float(s: &str) -> Option<f64> {
    let s = s.trim_start();
    let bytes = s.as_bytes();
    let len = bytes.len();
    let mut i = 0;
    let mut negative = false;
    if i < len && (bytes[i] == b'+' || bytes[i] == b'-') {
        negative = bytes[i] == b'-';
        i += 1;
    }
    let sign = if negative { -1.0 } else { 1.0 };
    if s[i..].starts_with("Infinity") {
        return Some(sign * f64::INFINITY);
    }

    let int_start = i;
    while i < len && bytes[i].is_ascii_digit() {
        i += 1;
    }
    let int_digits = &s[int_start..i];
    let mut frac_digits = "";
    if i < len && bytes[i] == b'.' {
        let frac_start = i + 1;
        let mut j = frac_start;
        while j < len && bytes[j].is_ascii_digit() {
            j += 1;
        }
        frac_digits = &s[frac_start..j];
        i = j;
    }
    if int_digits.is_empty() && frac_digits.is_empty() {
        return None;
    }

    let mut literal = String::with_capacity(i + 8);
    literal.push_str(if int_digits.is_empty() { "0" } else { int_digits });
    if !frac_digits.is_empty() {
        literal.push('.');
        literal.push_str(frac_digits);
    }
    // exponent only counts when at least one digit follows it
    if i < len && (bytes[i] == b'e' || bytes[i] == b'E') {
        let mut j = i + 1;
        if j < len && (bytes[j] == b'+' || bytes[j] == b'-') {
            j += 1;
        }
        let exp_digits = j;
        while j < len && bytes[j].is_ascii_digit() {
            j += 1;
        }
        if j > exp_digits {
            literal.push_str(&s[i..j]);
        }
    }
    literal.parse::<f64>().ok().map(|v| sign * v)
}

/// Shortest textual form of a number: `20.0` renders as `"20"`.
///
/// Magnitudes outside `[1e-6, 1e21)` use exponent notation with a signed
/// exponent (`1e+21`, `1.5e-7`).
pub fn format_number(v: f64) -> String {
    if v.is_nan() {
        "NaN".to_string()
    } else if v.is_infinite() {
        if v > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if v == 0.0 {
        "0".to_string()
    } else if (1e-6..1e21).contains(&v.abs()) {
        v.to_string()
    } else {
        let s = format!("{v:e}");
        match s.split_once('e') {
            Some((mantissa, exp)) if !exp.starts_with('-') => format!("{mantissa}e+{exp}"),
            _ => s,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_numbers() {
        assert_eq!(parse_leading_float("20"), Some(20.0));
        assert_eq!(parse_leading_float("20.0"), Some(20.0));
        assert_eq!(parse_leading_float("-4.5"), Some(-4.5));
        assert_eq!(parse_leading_float("+7"), Some(7.0));
        assert_eq!(parse_leading_float(".5"), Some(0.5));
        assert_eq!(parse_leading_float("5."), Some(5.0));
    }

    #[test]
    fn parses_numeric_prefix_with_units() {
        assert_eq!(parse_leading_float("20.0 m^2"), Some(20.0));
        assert_eq!(parse_leading_float("  12.5 m^2"), Some(12.5));
        assert_eq!(parse_leading_float("-3e2x"), Some(-300.0));
        assert_eq!(parse_leading_float("4e"), Some(4.0));
        assert_eq!(parse_leading_float("4e+"), Some(4.0));
    }

    #[test]
    fn rejects_non_numeric_prefixes() {
        assert_eq!(parse_leading_float(""), None);
        assert_eq!(parse_leading_float("Level 1"), None);
        assert_eq!(parse_leading_float("."), None);
        assert_eq!(parse_leading_float("-"), None);
        assert_eq!(parse_leading_float("e5"), None);
    }

    #[test]
    fn parses_infinity() {
        assert_eq!(parse_leading_float("Infinity"), Some(f64::INFINITY));
        assert_eq!(parse_leading_float("-Infinity m"), Some(f64::NEG_INFINITY));
    }

    #[test]
    fn formats_numbers_shortest() {
        assert_eq!(format_number(20.0), "20");
        assert_eq!(format_number(20.5), "20.5");
        assert_eq!(format_number(-0.0), "0");
        assert_eq!(format_number(f64::INFINITY), "Infinity");
    }

    #[test]
    fn formats_extreme_magnitudes_with_exponent() {
        assert_eq!(format_number(1e20), "100000000000000000000");
        assert_eq!(format_number(1e21), "1e+21");
        assert_eq!(format_number(-2.5e25), "-2.5e+25");
        assert_eq!(format_number(0.000001), "0.000001");
        assert_eq!(format_number(1.5e-7), "1.5e-7");
    }
}
