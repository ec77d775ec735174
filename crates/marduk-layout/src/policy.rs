//! Target layout rules.
//!
//! Different consumers of the packed bytes disagree on alignment: GPU uniform
//! buffers, GPU storage buffers and plain C structs each round differently.
//! A [`LayoutPolicy`] captures one set of rules and is handed to every
//! descriptor constructor, so the same struct definition can be laid out for
//! several targets side by side.

use crate::error::{LayoutError, Result};
use crate::scalar::ScalarKind;

/// Rounds `value` up to the next multiple of `alignment`.
///
/// `alignment` must be a non-zero power of two.
pub fn align_up(value: usize, alignment: usize) -> Result<usize> {
    if !alignment.is_power_of_two() {
        return Err(LayoutError::InvalidAlignment { alignment });
    }
    value
        .checked_add(alignment - 1)
        .map(|v| v & !(alignment - 1))
        .ok_or(LayoutError::SizeOverflow { what: "aligned offset" })
}

/// How vector alignment is derived from arity.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub enum VectorAlignment {
    /// `vec2` aligns to two scalars; `vec3` and `vec4` (and wider) to four.
    #[default]
    Gpu,
    /// Every vector aligns to its scalar.
    Packed,
}

impl VectorAlignment {
    #[inline]
    pub fn alignment(self, kind: ScalarKind, arity: usize) -> usize {
        let s = kind.alignment();
        match self {
            Self::Packed => s,
            Self::Gpu => match arity {
                0 | 1 => s,
                2 => 2 * s,
                _ => 4 * s,
            },
        }
    }
}

/// Layout rules applied when descriptors are constructed.
///
/// Presets:
/// - [`LayoutPolicy::gpu`] (default): vector table only, no minimums. Matches
///   WGSL storage-address-space layout.
/// - [`LayoutPolicy::uniform`]: vector table plus a 16-byte minimum alignment
///   for structs and array elements (the uniform-address-space rule).
/// - [`LayoutPolicy::packed`]: natural scalar alignment only, as a `#[repr(C)]`
///   struct of scalars and `[T; N]` arrays would be laid out.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct LayoutPolicy {
    vector_alignment: VectorAlignment,
    struct_min_alignment: usize,
    array_element_min_alignment: usize,
}

impl Default for LayoutPolicy {
    fn default() -> Self {
        Self::gpu()
    }
}

impl LayoutPolicy {
    pub const fn gpu() -> Self {
        Self {
            vector_alignment: VectorAlignment::Gpu,
            struct_min_alignment: 1,
            array_element_min_alignment: 1,
        }
    }

    pub const fn uniform() -> Self {
        Self {
            vector_alignment: VectorAlignment::Gpu,
            struct_min_alignment: 16,
            array_element_min_alignment: 16,
        }
    }

    pub const fn packed() -> Self {
        Self {
            vector_alignment: VectorAlignment::Packed,
            struct_min_alignment: 1,
            array_element_min_alignment: 1,
        }
    }

    #[inline]
    pub fn with_vector_alignment(mut self, rule: VectorAlignment) -> Self {
        self.vector_alignment = rule;
        self
    }

    /// Raises every struct's alignment to at least `alignment`.
    pub fn with_struct_min_alignment(mut self, alignment: usize) -> Result<Self> {
        check_power_of_two(alignment)?;
        self.struct_min_alignment = alignment;
        Ok(self)
    }

    /// Raises every array element's alignment (and therefore stride) to at least `alignment`.
    pub fn with_array_element_min_alignment(mut self, alignment: usize) -> Result<Self> {
        check_power_of_two(alignment)?;
        self.array_element_min_alignment = alignment;
        Ok(self)
    }

    #[inline]
    pub fn vector_alignment(&self) -> VectorAlignment {
        self.vector_alignment
    }

    #[inline]
    pub fn struct_min_alignment(&self) -> usize {
        self.struct_min_alignment
    }

    #[inline]
    pub fn array_element_min_alignment(&self) -> usize {
        self.array_element_min_alignment
    }
}

pub(crate) fn check_power_of_two(alignment: usize) -> Result<()> {
    if alignment.is_power_of_two() {
        Ok(())
    } else {
        Err(LayoutError::InvalidAlignment { alignment })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── align_up ──────────────────────────────────────────────────────────

    #[test]
    fn align_up_rounds_to_multiple() {
        assert_eq!(align_up(0, 4).unwrap(), 0);
        assert_eq!(align_up(1, 4).unwrap(), 4);
        assert_eq!(align_up(4, 4).unwrap(), 4);
        assert_eq!(align_up(5, 4).unwrap(), 8);
        assert_eq!(align_up(20, 16).unwrap(), 32);
        assert_eq!(align_up(255, 256).unwrap(), 256);
    }

    #[test]
    fn align_up_rejects_non_power_of_two() {
        assert_eq!(align_up(3, 0), Err(LayoutError::InvalidAlignment { alignment: 0 }));
        assert_eq!(align_up(3, 12), Err(LayoutError::InvalidAlignment { alignment: 12 }));
    }

    #[test]
    fn align_up_reports_overflow() {
        assert!(matches!(align_up(usize::MAX, 8), Err(LayoutError::SizeOverflow { .. })));
    }

    // ── vector table ──────────────────────────────────────────────────────

    #[test]
    fn gpu_vector_table() {
        let r = VectorAlignment::Gpu;
        assert_eq!(r.alignment(ScalarKind::F32, 1), 4);
        assert_eq!(r.alignment(ScalarKind::F32, 2), 8);
        assert_eq!(r.alignment(ScalarKind::F32, 3), 16);
        assert_eq!(r.alignment(ScalarKind::F32, 4), 16);
        assert_eq!(r.alignment(ScalarKind::F64, 3), 32);
    }

    #[test]
    fn packed_vector_table() {
        let r = VectorAlignment::Packed;
        for n in 1..=4 {
            assert_eq!(r.alignment(ScalarKind::U32, n), 4);
        }
    }

    // ── builder ───────────────────────────────────────────────────────────

    #[test]
    fn default_is_gpu() {
        assert_eq!(LayoutPolicy::default(), LayoutPolicy::gpu());
    }

    #[test]
    fn min_alignment_setters_validate() {
        let p = LayoutPolicy::packed().with_struct_min_alignment(8).unwrap();
        assert_eq!(p.struct_min_alignment(), 8);
        assert!(LayoutPolicy::gpu().with_array_element_min_alignment(24).is_err());
    }
}
