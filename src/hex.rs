use std::fmt;

/// Formats bytes as lowercase hex.
///
/// The alternate form (`{:#}`) separates bytes with spaces, which is what packet dumps in the
/// logs use.
pub(crate) struct Hex<'a>(pub &'a [u8]);

impl<'a> fmt::Display for Hex<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, byte) in self.0.iter().enumerate() {
            if f.alternate() && i != 0 {
                f.write_str(" ")?;
            }
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

/// Parses a hex string into bytes, ignoring whitespace.
#[cfg(test)]
pub(crate) fn parse(s: &str) -> Vec<u8> {
    let digits = s
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>();
    assert!(digits.len() % 2 == 0, "odd number of hex digits");

    (0..digits.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&digits[i..i + 2], 16).unwrap())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        assert_eq!(parse("00abff"), &[0x00, 0xab, 0xff]);
        assert_eq!(parse("00 ab\nff"), &[0x00, 0xab, 0xff]);
    }

    #[test]
    fn display() {
        assert_eq!(Hex(&[0x00, 0x7f, 0xff]).to_string(), "007fff");
        assert_eq!(format!("{:#}", Hex(&[0x00, 0x7f, 0xff])), "00 7f ff");
        assert_eq!(Hex(&[]).to_string(), "");
    }
}
