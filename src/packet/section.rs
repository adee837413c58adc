//! Marker types for the sections of a DNS message.
//!
//! [`MessageDecoder`] and [`MessageEncoder`] carry one of these as a type parameter, so reading or
//! writing out of section order does not compile.
//!
//! [`MessageDecoder`]: super::decoder::MessageDecoder
//! [`MessageEncoder`]: super::encoder::MessageEncoder

mod sealed {
    pub trait Sealed: 'static {
        /// Position of the section in the message, and index into per-section counters.
        const INDEX: usize;
    }
}

/// Trait implemented by the DNS section types.
pub trait Section: sealed::Sealed {}

/// The *Question* section.
pub enum Question {}

/// The *Answer* section.
pub enum Answer {}

macro_rules! sections {
    ($($s:ident = $index:literal),+) => {
        $(
            impl sealed::Sealed for $s {
                const INDEX: usize = $index;
            }
            impl Section for $s {}
        )+
    };
}

sections!(Question = 0, Answer = 1);
