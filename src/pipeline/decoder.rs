//! Telemetry token extraction
//!
//! A telemetry line carries any number of `name:value` tokens, for example
//! `temp: 23.5 hum:61`. Every token is matched independently: a token whose
//! number does not parse (`v:1.2.3`) is skipped without affecting the others,
//! and a line with no tokens decodes to an empty mapping.
//!
//! Grammar of one token:
//!
//! ```text
//! identifier ':' whitespace* number
//! number := [+-]? (digits | '.')+ ([eE] [+-]? digits)?
//! ```
//!
//! The number pattern is deliberately loose so malformed literals are still
//! recognised as tokens and then rejected by the float parser.

use crate::types::SampleValues;
use regex::Regex;
use std::sync::LazyLock;

static TOKEN_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\w+):\s*([+-]?[0-9.]+(?:[eE][+-]?[0-9]+)?)").expect("Invalid token regex")
});

/// Result of decoding one line
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodedLine {
    /// Values that parsed
    pub values: SampleValues,
    /// Tokens whose number failed to parse
    pub skipped_tokens: usize,
}

/// Decode a line, reporting skipped tokens
pub fn decode_line(line: &str) -> DecodedLine {
    let mut decoded = DecodedLine::default();

    for caps in TOKEN_PATTERN.captures_iter(line) {
        let (name, literal) = (&caps[1], &caps[2]);
        match literal.parse::<f64>() {
            Ok(value) => decoded.values.insert(name, value),
            Err(_) => {
                tracing::trace!(name, literal, "Skipping unparsable token");
                decoded.skipped_tokens += 1;
            }
        }
    }

    decoded
}

/// Decode a line into its `name -> value` mapping
pub fn decode(line: &str) -> SampleValues {
    decode_line(line).values
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_two_tokens() {
        let values = decode("temp: 23.5 hum:61");
        assert_eq!(values.len(), 2);
        assert_eq!(values.get("temp"), Some(23.5));
        assert_eq!(values.get("hum"), Some(61.0));
        assert_eq!(values.names().collect::<Vec<_>>(), vec!["temp", "hum"]);
    }

    #[test]
    fn test_no_tokens_is_empty() {
        assert!(decode("no numbers here").is_empty());
        assert!(decode("").is_empty());
    }

    #[test]
    fn test_sign_and_exponent() {
        let values = decode("a:-1.5 b:+2 c:3e2 d:4.5E-1");
        assert_eq!(values.get("a"), Some(-1.5));
        assert_eq!(values.get("b"), Some(2.0));
        assert_eq!(values.get("c"), Some(300.0));
        assert_eq!(values.get("d"), Some(0.45));
    }

    #[test]
    fn test_bad_token_does_not_abort_line() {
        let decoded = decode_line("x:1.2.3 y:7 z:. w:8");
        assert_eq!(decoded.skipped_tokens, 2);
        assert_eq!(decoded.values.get("x"), None);
        assert_eq!(decoded.values.get("y"), Some(7.0));
        assert_eq!(decoded.values.get("w"), Some(8.0));
    }

    #[test]
    fn test_separators_and_noise() {
        let values = decode("[42] adc0:512,adc1:  1023;status=ok\r");
        assert_eq!(values.get("adc0"), Some(512.0));
        assert_eq!(values.get("adc1"), Some(1023.0));
        assert_eq!(values.len(), 2);
    }

    #[test]
    fn test_repeated_name_last_value_wins() {
        let values = decode("v:1 v:2");
        assert_eq!(values.len(), 1);
        assert_eq!(values.get("v"), Some(2.0));
    }

    #[test]
    fn test_leading_dot_decimal() {
        assert_eq!(decode("ratio:.25").get("ratio"), Some(0.25));
    }
}
