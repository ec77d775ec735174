//! Byte layouts for GPU-shared structs.
//!
//! Describes scalars, vectors, structs and fixed-size arrays, computes their
//! offsets under a selectable [`LayoutPolicy`], and reads / writes them in
//! caller-owned byte buffers through typed views. No GPU code lives here;
//! `marduk-gpu` consumes the computed sizes to allocate and fill buffers.
//!
//! # Structure
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`policy`] | `LayoutPolicy`, `VectorAlignment`, `align_up` |
//! | [`scalar`] | `ScalarKind`, `ScalarValue`, `Scalar` |
//! | [`descriptor`] | `Descriptor`, struct / array / vector descriptors, constructors |
//! | [`value`] | `Value` trees for bulk reads and writes |
//! | [`view`] | `View`, `ViewMut`, element iterators |
//! | [`reflect`] | WGSL type names, `MemberInfo`, `to_wgsl`, `LayoutReport` |
//! | [`error`] | `LayoutError` |
//!
//! # Quick start
//!
//! ```rust
//! use marduk_layout::{LayoutPolicy, ScalarKind, Value, View, ViewMut};
//!
//! let policy = LayoutPolicy::gpu();
//! let vertex = policy
//!     .struct_of([
//!         ("position", policy.vector(ScalarKind::F32, 2).unwrap()),
//!         ("color", policy.vector(ScalarKind::F32, 3).unwrap()),
//!     ])
//!     .unwrap();
//! assert_eq!(vertex.byte_size(), 32);
//!
//! let mut buf = vec![0u8; vertex.byte_size()];
//! ViewMut::new(&vertex, &mut buf, 0)
//!     .unwrap()
//!     .set(&Value::record([
//!         ("position", Value::vector([0.0f32, 1.0])),
//!         ("color", Value::vector([1.0f32, 0.5, 0.25])),
//!     ]))
//!     .unwrap();
//!
//! let view = View::new(&vertex, &buf, 0).unwrap();
//! assert_eq!(view.field("color").unwrap().read::<f32>().unwrap(), vec![1.0, 0.5, 0.25]);
//! ```

pub mod descriptor;
pub mod error;
pub mod policy;
pub mod reflect;
pub mod scalar;
pub mod value;
pub mod view;

pub use descriptor::{
    ArrayDescriptor, Descriptor, Field, FieldLayout, StructDescriptor, VectorDescriptor,
};
pub use error::{LayoutError, Result};
pub use policy::{align_up, LayoutPolicy, VectorAlignment};
pub use reflect::{to_wgsl, LayoutReport, MemberInfo};
pub use scalar::{Scalar, ScalarKind, ScalarValue};
pub use value::Value;
pub use view::{Elements, ElementsMut, View, ViewMut};
