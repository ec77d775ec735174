/// Errors produced while building descriptors or accessing buffers through views.
///
/// Construction-time variants come from the descriptor builders on
/// [`LayoutPolicy`](crate::LayoutPolicy); access-time variants come from
/// [`View`](crate::View) / [`ViewMut`](crate::ViewMut).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LayoutError {
    // ── construction ──────────────────────────────────────────────────────
    #[error("unsupported scalar kind `{name}`")]
    UnsupportedKind { name: String },

    #[error("invalid {what}: {value} (must be at least 1)")]
    InvalidArity { what: &'static str, value: usize },

    #[error("duplicate field `{name}`")]
    DuplicateField { name: String },

    #[error("alignment {alignment} is not a power of two")]
    InvalidAlignment { alignment: usize },

    #[error("layout size overflows usize while computing {what}")]
    SizeOverflow { what: &'static str },

    // ── access ────────────────────────────────────────────────────────────
    #[error("view of {size} bytes at offset {offset} exceeds buffer length {len}")]
    OutOfBounds { offset: usize, size: usize, len: usize },

    #[error("unknown field `{name}`")]
    UnknownField { name: String },

    #[error("index {index} out of range for array of {count} elements")]
    IndexOutOfRange { index: usize, count: usize },

    #[error("expected {expected} components, got {found}")]
    ArityMismatch { expected: usize, found: usize },

    #[error("shape mismatch at {path}: expected {expected}, found {found}")]
    ShapeMismatch {
        path: String,
        expected: String,
        found: String,
    },

    // ── reflection ────────────────────────────────────────────────────────
    #[error("layout cannot be declared in WGSL: {reason}")]
    NotWgsl { reason: String },
}

impl LayoutError {
    pub(crate) fn shape(
        path: impl Into<String>,
        expected: impl Into<String>,
        found: impl Into<String>,
    ) -> Self {
        Self::ShapeMismatch {
            path: path.into(),
            expected: expected.into(),
            found: found.into(),
        }
    }

    /// `true` for errors raised while building descriptors.
    pub fn is_construction(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedKind { .. }
                | Self::InvalidArity { .. }
                | Self::DuplicateField { .. }
                | Self::InvalidAlignment { .. }
                | Self::SizeOverflow { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, LayoutError>;
