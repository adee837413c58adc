//! Domain names and labels.

use std::{
    fmt::{self, Write},
    str::FromStr,
};

use super::Error;

/// A `.`-separated component of a [`DomainName`].
///
/// Labels consist of arbitrary bytes and have a maximum length of 63 bytes. This type can only
/// represent non-empty labels, so the minimum length is 1 byte.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Label {
    // Guaranteed to contain >0 and at most `Label::MAX_LEN` bytes.
    bytes: Box<[u8]>,
}

impl Label {
    /// The maximum length of a domain label.
    pub const MAX_LEN: usize = 0b0011_1111;

    /// Creates a [`Label`] from raw bytes or a string slice, returning an error if the bytes are
    /// an invalid label.
    pub fn try_new(label: impl AsRef<[u8]>) -> Result<Self, Error> {
        let label = label.as_ref();
        if label.is_empty() {
            return Err(Error::InvalidEmptyLabel);
        }
        if label.len() > Self::MAX_LEN {
            return Err(Error::LabelTooLong);
        }

        Ok(Self {
            bytes: label.into(),
        })
    }

    /// Returns the raw bytes of this label.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Compares two labels the way DNS does: ASCII letters match regardless of case.
    pub fn eq_ignore_ascii_case(&self, other: &Label) -> bool {
        self.bytes.eq_ignore_ascii_case(&other.bytes)
    }
}

impl fmt::Debug for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, r#""{}""#, self.as_bytes().escape_ascii())
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.as_bytes().escape_ascii(), f)
    }
}

impl FromStr for Label {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::try_new(s)
    }
}

/// A domain name, represented as a list of [`Label`]s.
///
/// On the wire, names end with an empty root label. This type leaves that label implicit, and
/// always displays names fully-qualified (with a trailing `.`).
#[derive(PartialEq, Eq, Clone, Hash)]
pub struct DomainName {
    labels: Vec<Label>,
}

impl DomainName {
    /// The root domain `.`.
    pub const ROOT: Self = Self { labels: Vec::new() };

    /// Maximum length of a name in wire format, including length bytes and the root label.
    pub const MAX_WIRE_LEN: usize = 255;

    /// The multicast DNS domain, `local.`.
    pub fn local() -> Self {
        Self {
            labels: vec![Label {
                bytes: Box::from(&b"local"[..]),
            }],
        }
    }

    /// Parses a domain name as a string of `.`-separated labels.
    ///
    /// A trailing `.` is allowed but not required.
    pub fn from_str(s: &str) -> Result<Self, Error> {
        s.parse()
    }

    /// Returns the labels making up this domain name, not including the root label.
    #[inline]
    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    /// Appends a [`Label`] to the end of this domain name.
    ///
    /// Fails with [`Error::NameTooLong`] if the result would not fit in a DNS message.
    pub fn push_label(&mut self, label: Label) -> Result<(), Error> {
        if self.wire_len() + 1 + label.as_bytes().len() > Self::MAX_WIRE_LEN {
            return Err(Error::NameTooLong);
        }
        self.labels.push(label);
        Ok(())
    }

    /// Returns the number of bytes this name occupies in an uncompressed DNS message.
    pub fn wire_len(&self) -> usize {
        self.labels
            .iter()
            .map(|l| 1 + l.as_bytes().len())
            .sum::<usize>()
            + 1
    }

    /// Returns whether `self` is equal to `parent` or lies below it.
    ///
    /// Labels are compared ASCII case-insensitively. Every name is a subdomain of the root.
    pub fn is_subdomain_of(&self, parent: &DomainName) -> bool {
        if parent.labels.len() > self.labels.len() {
            return false;
        }
        let suffix = &self.labels[self.labels.len() - parent.labels.len()..];
        suffix
            .iter()
            .zip(&parent.labels)
            .all(|(a, b)| a.eq_ignore_ascii_case(b))
    }
}

impl fmt::Debug for DomainName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for DomainName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.labels.is_empty() {
            return f.write_char('.');
        }
        for label in &self.labels {
            fmt::Display::fmt(label, f)?;
            f.write_char('.')?;
        }
        Ok(())
    }
}

impl FromStr for DomainName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            // `split_terminator` returns an empty label for this, so special-case it
            "." => return Ok(Self::ROOT),
            "" => return Err(Error::InvalidEmptyLabel),
            _ => {}
        }

        let mut name = DomainName::ROOT;
        for label in s.split_terminator('.') {
            name.push_label(label.parse()?)?;
        }
        Ok(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> DomainName {
        s.parse().unwrap()
    }

    #[test]
    fn display_label() {
        assert_eq!(format!(" {} ", Label::try_new("\0").unwrap()), r#" \x00 "#);
        assert_eq!(format!(" {} ", Label::try_new("a").unwrap()), r#" a "#);
        assert_eq!(format!(" {:?} ", Label::try_new("\n").unwrap()), r#" "\n" "#);
    }

    #[test]
    fn string_conversion() {
        assert_eq!("..".parse::<DomainName>(), Err(Error::InvalidEmptyLabel));
        assert_eq!(".com".parse::<DomainName>(), Err(Error::InvalidEmptyLabel));
        assert_eq!("".parse::<DomainName>(), Err(Error::InvalidEmptyLabel));
        assert_eq!(".".parse::<DomainName>(), Ok(DomainName::ROOT));
        assert_eq!(name("example.com").to_string(), "example.com.");
        assert_eq!(name("example.com."), name("example.com"));
        assert_eq!(name("com.").labels().len(), 1);
        assert_eq!(DomainName::ROOT.to_string(), ".");
    }

    #[test]
    fn length_limits() {
        let long = "a".repeat(64);
        assert_eq!(long.parse::<DomainName>(), Err(Error::LabelTooLong));

        // 4 * 64 wire bytes plus the root label is just over the limit.
        let label = "b".repeat(63);
        let too_long = [&*label, &*label, &*label, &*label].join(".");
        assert_eq!(too_long.parse::<DomainName>(), Err(Error::NameTooLong));

        let fits = [&*label, &*label, &*label, "c".repeat(61).as_str()].join(".");
        assert_eq!(fits.parse::<DomainName>().unwrap().wire_len(), 255);
    }

    #[test]
    fn subdomain() {
        let local = DomainName::local();
        assert_eq!(local, name("local."));
        assert!(name("foo.local.").is_subdomain_of(&local));
        assert!(name("a.b.LOCAL").is_subdomain_of(&local));
        assert!(local.is_subdomain_of(&local));
        assert!(!name("foo.example.").is_subdomain_of(&local));
        assert!(!name("local.example.").is_subdomain_of(&local));
        assert!(!name("notlocal.").is_subdomain_of(&local));
        assert!(name("anything.").is_subdomain_of(&DomainName::ROOT));
    }
}
