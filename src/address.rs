//! Strict dotted-quad IPv4 parsing.
//!
//! [`parse_ipv4`] turns a user-supplied string into the big-endian `u32` used
//! as the key of the range index. Unlike [`std::net::Ipv4Addr`]'s `FromStr`,
//! every failure is classified so callers can report *why* the input was
//! rejected:
//!
//! | input               | kind                                  |
//! |---------------------|---------------------------------------|
//! | `""`                | [`ParseErrorKind::MissingInput`]      |
//! | `"invalid.ip"`      | [`ParseErrorKind::MalformedFormat`]   |
//! | `"1..2.3"`          | [`ParseErrorKind::MalformedFormat`]   |
//! | `"1.2.3.4."`        | [`ParseErrorKind::MalformedFormat`]   |
//! | `"1.2.3"`           | [`ParseErrorKind::WrongOctetCount`]   |
//! | `"256.256.256.256"` | [`ParseErrorKind::OctetOutOfRange`]   |
//!
//! Octets may carry leading zeros (`"010"` is ten). Whitespace, signs and any
//! other non-digit character are malformed. An empty octet, including one left
//! by a leading or trailing dot, is malformed before the octet count is
//! checked, so only well-formed but short or long addresses are
//! `WrongOctetCount`.

use std::fmt;
use std::net::Ipv4Addr;

use thiserror::Error;

/// Classification of a rejected address string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParseErrorKind {
    MissingInput,
    MalformedFormat,
    OctetOutOfRange,
    WrongOctetCount,
}

impl ParseErrorKind {
    /// Stable machine-readable name, used in logs.
    pub fn as_str(self) -> &'static str {
        match self {
            ParseErrorKind::MissingInput => "missing_input",
            ParseErrorKind::MalformedFormat => "malformed_format",
            ParseErrorKind::OctetOutOfRange => "octet_out_of_range",
            ParseErrorKind::WrongOctetCount => "wrong_octet_count",
        }
    }
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An address string that could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ParseError {
    kind: ParseErrorKind,
    message: String,
}

impl ParseError {
    fn new(kind: ParseErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ParseErrorKind {
        self.kind
    }

    /// Human-readable reason, suitable for an API error body.
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Parse a dotted-quad IPv4 address into its big-endian numeric form.
///
/// # Examples
/// ```
/// use ip_geo_lookup::{parse_ipv4, ParseErrorKind};
///
/// assert_eq!(parse_ipv4("8.8.8.8").unwrap(), 134_744_072);
/// assert_eq!(parse_ipv4("1.2.3").unwrap_err().kind(), ParseErrorKind::WrongOctetCount);
/// ```
pub fn parse_ipv4(input: &str) -> Result<u32, ParseError> {
    if input.is_empty() {
        return Err(ParseError::new(
            ParseErrorKind::MissingInput,
            "IP address is required",
        ));
    }

    if let Some(bad) = input.chars().find(|c| !c.is_ascii_digit() && *c != '.') {
        return Err(ParseError::new(
            ParseErrorKind::MalformedFormat,
            format!("invalid IP format: unexpected character {bad:?}"),
        ));
    }

    let parts: Vec<&str> = input.split('.').collect();
    if let Some(i) = parts.iter().position(|part| part.is_empty()) {
        return Err(ParseError::new(
            ParseErrorKind::MalformedFormat,
            format!("invalid IP format: octet {} is empty", i + 1),
        ));
    }
    if parts.len() != 4 {
        return Err(ParseError::new(
            ParseErrorKind::WrongOctetCount,
            format!("invalid IP format: expected 4 octets, got {}", parts.len()),
        ));
    }

    let mut address: u32 = 0;
    for (i, part) in parts.iter().enumerate() {
        // Only ASCII digits remain here, so the only failure is magnitude.
        let value = part
            .bytes()
            .try_fold(0u32, |acc, b| {
                let next = acc * 10 + u32::from(b - b'0');
                (next <= 255).then_some(next)
            })
            .ok_or_else(|| {
                ParseError::new(
                    ParseErrorKind::OctetOutOfRange,
                    format!("octet {} out of range: {} (must be 0-255)", i + 1, part),
                )
            })?;

        address = (address << 8) | value;
    }

    Ok(address)
}

/// Same as [`parse_ipv4`], returning a typed [`Ipv4Addr`].
pub fn parse_ipv4_addr(input: &str) -> Result<Ipv4Addr, ParseError> {
    parse_ipv4(input).map(Ipv4Addr::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kind_of(input: &str) -> ParseErrorKind {
        parse_ipv4(input).unwrap_err().kind()
    }

    #[test]
    fn test_valid_addresses() {
        assert_eq!(parse_ipv4("8.8.8.8").unwrap(), 134_744_072);
        assert_eq!(parse_ipv4("192.168.1.1").unwrap(), 3_232_235_777);
        assert_eq!(parse_ipv4("0.0.0.0").unwrap(), 0);
        assert_eq!(parse_ipv4("255.255.255.255").unwrap(), u32::MAX);
        assert_eq!(parse_ipv4("10.0.0.1").unwrap(), 167_772_161);
        assert_eq!(parse_ipv4("1.0.0.100").unwrap(), 16_777_316);
    }

    #[test]
    fn test_matches_std_big_endian() {
        for s in ["1.2.3.4", "46.4.0.1", "127.0.0.1", "223.255.255.0"] {
            let std_value: u32 = s.parse::<Ipv4Addr>().unwrap().into();
            assert_eq!(parse_ipv4(s).unwrap(), std_value, "{s}");
        }
    }

    #[test]
    fn test_leading_zeros_are_decimal() {
        assert_eq!(parse_ipv4("010.000.000.001").unwrap(), parse_ipv4("10.0.0.1").unwrap());
        assert_eq!(parse_ipv4("0000255.0.0.0").unwrap(), 0xFF00_0000);
    }

    #[test]
    fn test_harness_rejections_are_distinguishable() {
        assert_eq!(kind_of(""), ParseErrorKind::MissingInput);
        assert_eq!(kind_of("invalid.ip"), ParseErrorKind::MalformedFormat);
        assert_eq!(kind_of("256.256.256.256"), ParseErrorKind::OctetOutOfRange);
        assert_eq!(kind_of("1.2.3"), ParseErrorKind::WrongOctetCount);
    }

    #[test]
    fn test_octet_count() {
        assert_eq!(kind_of("192.168.1.1.1"), ParseErrorKind::WrongOctetCount);
        assert_eq!(kind_of("1"), ParseErrorKind::WrongOctetCount);
        assert_eq!(kind_of("1.2.3.4.5.6"), ParseErrorKind::WrongOctetCount);
    }

    #[test]
    fn test_empty_octet_is_malformed_regardless_of_count() {
        for input in ["1.2.3.4.", ".1.2.3.4", "1.2.3.", "1..2.3", "1.2..3.4", "...."] {
            assert_eq!(kind_of(input), ParseErrorKind::MalformedFormat, "{input}");
        }

        let err = parse_ipv4("1.2.3.4.").unwrap_err();
        assert_eq!(err.message(), "invalid IP format: octet 5 is empty");
    }

    #[test]
    fn test_malformed() {
        assert_eq!(kind_of("192.168.a.1"), ParseErrorKind::MalformedFormat);
        assert_eq!(kind_of("192.168.-1.1"), ParseErrorKind::MalformedFormat);
        assert_eq!(kind_of("  8.8.8.8  "), ParseErrorKind::MalformedFormat);
        assert_eq!(kind_of("8.8.8.8\n"), ParseErrorKind::MalformedFormat);
        assert_eq!(kind_of("1..2.3"), ParseErrorKind::MalformedFormat);
        assert_eq!(kind_of("...."), ParseErrorKind::MalformedFormat);
        assert_eq!(kind_of("..."), ParseErrorKind::MalformedFormat);
        assert_eq!(kind_of("+1.2.3.4"), ParseErrorKind::MalformedFormat);
        assert_eq!(kind_of("::1"), ParseErrorKind::MalformedFormat);
    }

    #[test]
    fn test_out_of_range() {
        assert_eq!(kind_of("192.168.256.1"), ParseErrorKind::OctetOutOfRange);
        assert_eq!(kind_of("1.2.3.99999999999999999999"), ParseErrorKind::OctetOutOfRange);
    }

    #[test]
    fn test_messages() {
        let err = parse_ipv4("").unwrap_err();
        assert_eq!(err.message(), "IP address is required");
        assert_eq!(err.to_string(), "IP address is required");

        let err = parse_ipv4("1.2.3").unwrap_err();
        assert!(err.message().contains("expected 4 octets, got 3"));

        let err = parse_ipv4("1.2.300.4").unwrap_err();
        assert!(err.message().contains("octet 3 out of range"));
    }

    #[test]
    fn test_typed_addr() {
        assert_eq!(parse_ipv4_addr("46.4.0.1").unwrap(), Ipv4Addr::new(46, 4, 0, 1));
    }
}
