use std::{fmt, io};

/// Non-I/O errors that may occur while decoding or encoding a DNS message.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[non_exhaustive]
pub enum Error {
    /// The end of the message was reached while more data was expected.
    Eof,
    /// A domain name pointer pointed into itself or further into the message.
    PointerLoop,
    /// A field was set to an invalid (reserved or illegal) value.
    InvalidValue,
    /// Only returned from [`MessageEncoder::finish`]: the provided buffer was too small for the
    /// entire message.
    ///
    /// [`MessageEncoder::finish`]: super::encoder::MessageEncoder::finish
    Truncated,
    /// An empty label was encountered where it is not allowed.
    InvalidEmptyLabel,
    /// A label exceeded the maximum allowable length of a label.
    LabelTooLong,
    /// A domain name exceeded 255 bytes in wire format.
    NameTooLong,
}

impl Error {
    fn description(&self) -> &str {
        match self {
            Error::Eof => "unexpected end of data",
            Error::PointerLoop => "encountered domain name pointer loop",
            Error::InvalidValue => "invalid value",
            Error::Truncated => "packet truncated",
            Error::InvalidEmptyLabel => "invalid empty label",
            Error::LabelTooLong => "label too long",
            Error::NameTooLong => "domain name too long",
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

impl std::error::Error for Error {}

impl From<Error> for io::Error {
    fn from(e: Error) -> io::Error {
        let kind = match e {
            Error::Eof => io::ErrorKind::UnexpectedEof,
            Error::PointerLoop | Error::InvalidValue => io::ErrorKind::InvalidData,
            Error::InvalidEmptyLabel | Error::LabelTooLong | Error::NameTooLong => {
                io::ErrorKind::InvalidInput
            }
            Error::Truncated => io::ErrorKind::OutOfMemory,
        };
        io::Error::new(kind, e)
    }
}
