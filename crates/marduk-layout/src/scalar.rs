use std::fmt;
use std::str::FromStr;

use bytemuck::Pod;

use crate::error::{LayoutError, Result};
use crate::value::Value;

/// Primitive numeric kinds that may appear in a host-shareable struct.
///
/// Natural alignment always equals [`ScalarKind::size`].
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ScalarKind {
    F32,
    I32,
    U32,
    F64,
}

impl ScalarKind {
    pub const ALL: [ScalarKind; 4] = [Self::F32, Self::I32, Self::U32, Self::F64];

    #[inline]
    pub const fn size(self) -> usize {
        match self {
            Self::F32 | Self::I32 | Self::U32 => 4,
            Self::F64 => 8,
        }
    }

    #[inline]
    pub const fn alignment(self) -> usize {
        self.size()
    }

    /// WGSL spelling of the kind.
    #[inline]
    pub const fn name(self) -> &'static str {
        match self {
            Self::F32 => "f32",
            Self::I32 => "i32",
            Self::U32 => "u32",
            Self::F64 => "f64",
        }
    }

    /// Parses a WGSL scalar name.
    ///
    /// Names outside the supported set (`bool`, `f16`, abstract types, …)
    /// fail with [`LayoutError::UnsupportedKind`].
    pub fn from_name(name: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|k| k.name() == name)
            .ok_or_else(|| LayoutError::UnsupportedKind { name: name.to_string() })
    }
}

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ScalarKind {
    type Err = LayoutError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_name(s)
    }
}

/// A single decoded scalar.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum ScalarValue {
    F32(f32),
    I32(i32),
    U32(u32),
    F64(f64),
}

impl ScalarValue {
    #[inline]
    pub fn kind(self) -> ScalarKind {
        match self {
            Self::F32(_) => ScalarKind::F32,
            Self::I32(_) => ScalarKind::I32,
            Self::U32(_) => ScalarKind::U32,
            Self::F64(_) => ScalarKind::F64,
        }
    }

    /// Decodes one scalar of `kind` from the front of `bytes`.
    ///
    /// Values are stored in native byte order, which is little-endian on every
    /// target wgpu supports.
    pub(crate) fn decode(kind: ScalarKind, bytes: &[u8]) -> Self {
        let raw = &bytes[..kind.size()];
        match kind {
            ScalarKind::F32 => Self::F32(bytemuck::pod_read_unaligned(raw)),
            ScalarKind::I32 => Self::I32(bytemuck::pod_read_unaligned(raw)),
            ScalarKind::U32 => Self::U32(bytemuck::pod_read_unaligned(raw)),
            ScalarKind::F64 => Self::F64(bytemuck::pod_read_unaligned(raw)),
        }
    }

    /// Encodes into the front of `out`. `out` must hold at least `kind().size()` bytes.
    pub(crate) fn encode(self, out: &mut [u8]) {
        match self {
            Self::F32(v) => out[..4].copy_from_slice(bytemuck::bytes_of(&v)),
            Self::I32(v) => out[..4].copy_from_slice(bytemuck::bytes_of(&v)),
            Self::U32(v) => out[..4].copy_from_slice(bytemuck::bytes_of(&v)),
            Self::F64(v) => out[..8].copy_from_slice(bytemuck::bytes_of(&v)),
        }
    }
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::F32(v) => write!(f, "{v}"),
            Self::I32(v) => write!(f, "{v}i"),
            Self::U32(v) => write!(f, "{v}u"),
            Self::F64(v) => write!(f, "{v}"),
        }
    }
}

/// Rust types that map one-to-one onto a [`ScalarKind`].
///
/// Used by the typed `read` / `write` view accessors.
pub trait Scalar: Pod {
    const KIND: ScalarKind;

    fn into_value(self) -> ScalarValue;
}

macro_rules! impl_scalar {
    ($ty:ty, $kind:ident) => {
        impl Scalar for $ty {
            const KIND: ScalarKind = ScalarKind::$kind;

            #[inline]
            fn into_value(self) -> ScalarValue {
                ScalarValue::$kind(self)
            }
        }

        impl From<$ty> for ScalarValue {
            #[inline]
            fn from(v: $ty) -> Self {
                ScalarValue::$kind(v)
            }
        }

        impl From<$ty> for Value {
            #[inline]
            fn from(v: $ty) -> Self {
                Value::Scalar(ScalarValue::$kind(v))
            }
        }
    };
}

impl_scalar!(f32, F32);
impl_scalar!(i32, I32);
impl_scalar!(u32, U32);
impl_scalar!(f64, F64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes_match_rust_types() {
        assert_eq!(ScalarKind::F32.size(), size_of::<f32>());
        assert_eq!(ScalarKind::I32.size(), size_of::<i32>());
        assert_eq!(ScalarKind::U32.size(), size_of::<u32>());
        assert_eq!(ScalarKind::F64.size(), size_of::<f64>());
    }

    #[test]
    fn parse_known_names() {
        for kind in ScalarKind::ALL {
            assert_eq!(kind.name().parse::<ScalarKind>().unwrap(), kind);
        }
    }

    #[test]
    fn parse_unsupported_names() {
        for name in ["bool", "f16", "abstract_int", "vec2<f32>", ""] {
            assert!(matches!(
                ScalarKind::from_name(name),
                Err(LayoutError::UnsupportedKind { .. })
            ));
        }
    }

    #[test]
    fn encode_decode_at_unaligned_offset() {
        let mut buf = [0u8; 9];
        ScalarValue::F64(-2.5).encode(&mut buf[1..]);
        assert_eq!(ScalarValue::decode(ScalarKind::F64, &buf[1..]), ScalarValue::F64(-2.5));
    }

    #[test]
    fn decode_reads_only_kind_size() {
        let mut buf = [0xffu8; 8];
        ScalarValue::U32(7).encode(&mut buf);
        assert_eq!(ScalarValue::decode(ScalarKind::U32, &buf), ScalarValue::U32(7));
        assert_eq!(&buf[4..], &[0xff; 4]);
    }
}
