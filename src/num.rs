//! Big-endian integers as they appear on the wire.

macro_rules! be_int {
    ($($name:ident($native:ty)),+ $(,)?) => {
        $(
            #[derive(Clone, Copy, Default, PartialEq, Eq, bytemuck::Pod, bytemuck::Zeroable)]
            #[repr(transparent)]
            pub(crate) struct $name($native);

            impl $name {
                #[inline]
                pub(crate) fn get(self) -> $native {
                    <$native>::from_be(self.0)
                }
            }

            impl From<$native> for $name {
                #[inline]
                fn from(value: $native) -> Self {
                    Self(value.to_be())
                }
            }
        )+
    };
}

be_int!(U16(u16), U32(u32));

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_byte_order() {
        assert_eq!(bytemuck::bytes_of(&U16::from(0x1234)), &[0x12, 0x34]);
        assert_eq!(
            bytemuck::bytes_of(&U32::from(0xdead_beef)),
            &[0xde, 0xad, 0xbe, 0xef]
        );
        assert_eq!(U32::from(120).get(), 120);
    }
}
