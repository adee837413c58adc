/// Declares a transparent newtype over a wire integer with a set of named values.
///
/// Unlike a Rust `enum`, the type can hold any value of `$native`, so unassigned codes decoded
/// from a packet survive until something decides what to do with them.
macro_rules! ffi_enum {
    (
        $( #[$attrs:meta] )*
        $v:vis enum $name:ident: $native:ty {
            $(
                $( #[$variant_attrs:meta] )*
                $variant:ident = $value:expr
            ),+
            $(,)?
        }
    ) => {
        $( #[$attrs] )*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, bytemuck::Pod, bytemuck::Zeroable)]
        #[repr(transparent)]
        $v struct $name(pub(crate) $native);

        impl $name {
            $(
                $( #[$variant_attrs] )*
                $v const $variant: Self = Self($value);
            )+

            /// Returns the raw numeric value.
            #[inline]
            $v fn to_raw(self) -> $native {
                self.0
            }

            /// Returns the mnemonic of a named value, or `None` if the value has no name.
            #[allow(unreachable_patterns)]
            $v fn mnemonic(&self) -> Option<&'static str> {
                Some(match *self {
                    $( Self::$variant => stringify!($variant), )+
                    _ => return None,
                })
            }
        }

        impl From<$native> for $name {
            #[inline]
            fn from(raw: $native) -> Self {
                Self(raw)
            }
        }

        impl core::fmt::Debug for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                match self.mnemonic() {
                    Some(name) => f.write_str(name),
                    None => write!(f, "(unknown {}: {:#x})", stringify!($name), self.0),
                }
            }
        }
    };
}
