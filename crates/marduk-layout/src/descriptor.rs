//! Immutable layout descriptors and their constructors.
//!
//! Every descriptor knows its byte size and alignment from the moment it is
//! built. Struct and array descriptors are reference counted so a single
//! definition can be embedded in many parents and shared between threads.

use std::sync::Arc;

use crate::error::{LayoutError, Result};
use crate::policy::{align_up, check_power_of_two, LayoutPolicy};
use crate::scalar::ScalarKind;

/// Layout of one value: scalar, vector, struct or fixed-size array.
#[derive(Debug, Clone, PartialEq)]
pub enum Descriptor {
    Scalar(ScalarKind),
    Vector(VectorDescriptor),
    Struct(Arc<StructDescriptor>),
    Array(Arc<ArrayDescriptor>),
}

impl Descriptor {
    #[inline]
    pub fn byte_size(&self) -> usize {
        match self {
            Self::Scalar(k) => k.size(),
            Self::Vector(v) => v.byte_size(),
            Self::Struct(s) => s.byte_size(),
            Self::Array(a) => a.byte_size(),
        }
    }

    #[inline]
    pub fn alignment(&self) -> usize {
        match self {
            Self::Scalar(k) => k.alignment(),
            Self::Vector(v) => v.alignment(),
            Self::Struct(s) => s.alignment(),
            Self::Array(a) => a.alignment(),
        }
    }

    #[inline]
    pub fn as_struct(&self) -> Option<&StructDescriptor> {
        match self {
            Self::Struct(s) => Some(s),
            _ => None,
        }
    }

    #[inline]
    pub fn as_array(&self) -> Option<&ArrayDescriptor> {
        match self {
            Self::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Scalar kind and component count for scalar / vector descriptors.
    #[inline]
    pub fn components(&self) -> Option<(ScalarKind, usize)> {
        match self {
            Self::Scalar(k) => Some((*k, 1)),
            Self::Vector(v) => Some((v.kind, v.arity)),
            _ => None,
        }
    }

    /// Byte offset of a dotted / indexed path such as `lights[2].color`.
    ///
    /// The empty path resolves to `0`.
    pub fn offset_of(&self, path: &str) -> Result<usize> {
        let mut desc = self;
        let mut offset = 0;
        for segment in path_segments(path) {
            let (next, rel) = match segment {
                Segment::Field(name) => {
                    let s = desc
                        .as_struct()
                        .ok_or_else(|| LayoutError::shape(path, "struct", desc.type_name()))?;
                    let f = s
                        .field(name)
                        .ok_or_else(|| LayoutError::UnknownField { name: name.to_string() })?;
                    (&f.descriptor, f.offset)
                }
                Segment::Index(index) => {
                    let a = desc
                        .as_array()
                        .ok_or_else(|| LayoutError::shape(path, "array", desc.type_name()))?;
                    (&a.element, a.element_offset(index)?)
                }
                Segment::Invalid(raw) => {
                    return Err(LayoutError::shape(path, "field name or [index]", raw));
                }
            };
            desc = next;
            offset += rel;
        }
        Ok(offset)
    }

    /// `true` when `part` is this descriptor itself (at offset 0) or one of the
    /// fields / elements nested in it, starting at byte `offset`.
    pub fn contains_at(&self, offset: usize, part: &Descriptor) -> bool {
        if offset == 0 && self == part {
            return true;
        }
        match self {
            Self::Struct(s) => s
                .fields()
                .iter()
                .find(|f| f.offset <= offset && offset < f.end())
                .is_some_and(|f| f.descriptor.contains_at(offset - f.offset, part)),
            Self::Array(a) => {
                let index = offset / a.stride();
                index < a.count() && a.element.contains_at(offset % a.stride(), part)
            }
            _ => false,
        }
    }
}

// ── vector ────────────────────────────────────────────────────────────────

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct VectorDescriptor {
    kind: ScalarKind,
    arity: usize,
    alignment: usize,
}

impl VectorDescriptor {
    #[inline]
    pub fn kind(&self) -> ScalarKind {
        self.kind
    }

    #[inline]
    pub fn arity(&self) -> usize {
        self.arity
    }

    #[inline]
    pub fn byte_size(&self) -> usize {
        self.arity * self.kind.size()
    }

    #[inline]
    pub fn alignment(&self) -> usize {
        self.alignment
    }
}

// ── struct ────────────────────────────────────────────────────────────────

/// A field as declared, before layout.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub descriptor: Descriptor,
    /// Explicit minimum alignment (WGSL `@align(n)`).
    pub align: Option<usize>,
}

impl Field {
    pub fn new(name: impl Into<String>, descriptor: Descriptor) -> Self {
        Self { name: name.into(), descriptor, align: None }
    }

    pub fn aligned(name: impl Into<String>, descriptor: Descriptor, align: usize) -> Self {
        Self { name: name.into(), descriptor, align: Some(align) }
    }
}

impl<S: Into<String>> From<(S, Descriptor)> for Field {
    fn from((name, descriptor): (S, Descriptor)) -> Self {
        Field::new(name, descriptor)
    }
}

/// A field after layout.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldLayout {
    pub name: String,
    pub descriptor: Descriptor,
    pub offset: usize,
    /// Effective alignment: the descriptor's, raised by any explicit `align`.
    pub alignment: usize,
    pub explicit_align: Option<usize>,
}

impl FieldLayout {
    #[inline]
    pub fn byte_size(&self) -> usize {
        self.descriptor.byte_size()
    }

    #[inline]
    pub fn end(&self) -> usize {
        self.offset + self.byte_size()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructDescriptor {
    name: Option<String>,
    fields: Vec<FieldLayout>,
    byte_size: usize,
    alignment: usize,
}

impl StructDescriptor {
    #[inline]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    #[inline]
    pub fn fields(&self) -> &[FieldLayout] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldLayout> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub(crate) fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    #[inline]
    pub fn byte_size(&self) -> usize {
        self.byte_size
    }

    #[inline]
    pub fn alignment(&self) -> usize {
        self.alignment
    }

    /// Total bytes not covered by any field (interior gaps plus tail padding).
    pub fn padding(&self) -> usize {
        self.byte_size - self.fields.iter().map(FieldLayout::byte_size).sum::<usize>()
    }
}

// ── array ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct ArrayDescriptor {
    element: Descriptor,
    count: usize,
    stride: usize,
    alignment: usize,
}

impl ArrayDescriptor {
    #[inline]
    pub fn element(&self) -> &Descriptor {
        &self.element
    }

    #[inline]
    pub fn count(&self) -> usize {
        self.count
    }

    #[inline]
    pub fn stride(&self) -> usize {
        self.stride
    }

    #[inline]
    pub fn byte_size(&self) -> usize {
        self.stride * self.count
    }

    #[inline]
    pub fn alignment(&self) -> usize {
        self.alignment
    }

    /// Offset of element `index` relative to the array start.
    pub fn element_offset(&self, index: usize) -> Result<usize> {
        if index >= self.count {
            return Err(LayoutError::IndexOutOfRange { index, count: self.count });
        }
        Ok(index * self.stride)
    }
}

// ── construction ──────────────────────────────────────────────────────────

impl LayoutPolicy {
    #[inline]
    pub fn scalar(&self, kind: ScalarKind) -> Descriptor {
        Descriptor::Scalar(kind)
    }

    /// Scalar from its WGSL name (`"f32"`, `"u32"`, …).
    pub fn scalar_named(&self, name: &str) -> Result<Descriptor> {
        ScalarKind::from_name(name).map(Descriptor::Scalar)
    }

    pub fn vector(&self, kind: ScalarKind, arity: usize) -> Result<Descriptor> {
        if arity < 1 {
            return Err(LayoutError::InvalidArity { what: "vector arity", value: arity });
        }
        arity
            .checked_mul(kind.size())
            .ok_or(LayoutError::SizeOverflow { what: "vector size" })?;
        Ok(Descriptor::Vector(VectorDescriptor {
            kind,
            arity,
            alignment: self.vector_alignment().alignment(kind, arity),
        }))
    }

    /// Lays out `fields` in declared order.
    pub fn struct_of<I, F>(&self, fields: I) -> Result<Descriptor>
    where
        I: IntoIterator<Item = F>,
        F: Into<Field>,
    {
        self.layout_struct(None, fields)
    }

    /// Same as [`struct_of`](Self::struct_of) with a type name used by reflection.
    pub fn named_struct<I, F>(&self, name: impl Into<String>, fields: I) -> Result<Descriptor>
    where
        I: IntoIterator<Item = F>,
        F: Into<Field>,
    {
        self.layout_struct(Some(name.into()), fields)
    }

    fn layout_struct<I, F>(&self, name: Option<String>, fields: I) -> Result<Descriptor>
    where
        I: IntoIterator<Item = F>,
        F: Into<Field>,
    {
        let mut laid_out: Vec<FieldLayout> = Vec::new();
        let mut cursor = 0usize;
        let mut alignment = self.struct_min_alignment();

        for field in fields {
            let Field { name: field_name, descriptor, align } = field.into();

            if laid_out.iter().any(|f| f.name == field_name) {
                return Err(LayoutError::DuplicateField { name: field_name });
            }
            if let Some(a) = align {
                check_power_of_two(a)?;
            }

            let field_align = descriptor.alignment().max(align.unwrap_or(1));
            let offset = align_up(cursor, field_align)?;
            cursor = offset
                .checked_add(descriptor.byte_size())
                .ok_or(LayoutError::SizeOverflow { what: "struct size" })?;
            alignment = alignment.max(field_align);

            laid_out.push(FieldLayout {
                name: field_name,
                descriptor,
                offset,
                alignment: field_align,
                explicit_align: align,
            });
        }

        if laid_out.is_empty() {
            return Err(LayoutError::InvalidArity { what: "struct field count", value: 0 });
        }

        let byte_size = align_up(cursor, alignment)?;
        log::trace!(
            "struct {} laid out: {} fields, size={byte_size}, align={alignment}",
            name.as_deref().unwrap_or("<anon>"),
            laid_out.len(),
        );

        Ok(Descriptor::Struct(Arc::new(StructDescriptor {
            name,
            fields: laid_out,
            byte_size,
            alignment,
        })))
    }

    pub fn array_of(&self, element: Descriptor, count: usize) -> Result<Descriptor> {
        if count < 1 {
            return Err(LayoutError::InvalidArity { what: "array count", value: count });
        }
        let alignment = element.alignment().max(self.array_element_min_alignment());
        let stride = align_up(element.byte_size(), alignment)?;
        stride
            .checked_mul(count)
            .ok_or(LayoutError::SizeOverflow { what: "array size" })?;

        Ok(Descriptor::Array(Arc::new(ArrayDescriptor {
            element,
            count,
            stride,
            alignment,
        })))
    }
}

// ── paths ─────────────────────────────────────────────────────────────────

#[derive(Debug, PartialEq)]
enum Segment<'p> {
    Field(&'p str),
    Index(usize),
    Invalid(&'p str),
}

/// Splits `a.b[3].c` into `Field(a) Field(b) Index(3) Field(c)`.
fn path_segments(path: &str) -> impl Iterator<Item = Segment<'_>> {
    path.split('.')
        .filter(|part| !part.is_empty())
        .flat_map(|part| {
            let (head, rest) = match part.find('[') {
                Some(i) => part.split_at(i),
                None => (part, ""),
            };
            let head = (!head.is_empty()).then_some(Segment::Field(head));
            let indices = rest
                .split_inclusive(']')
                .filter(|s| !s.is_empty())
                .map(|s| {
                    s.strip_prefix('[')
                        .and_then(|s| s.strip_suffix(']'))
                        .and_then(|s| s.parse().ok())
                        .map_or(Segment::Invalid(s), Segment::Index)
                });
            head.into_iter().chain(indices)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ScalarKind::*;

    fn gpu() -> LayoutPolicy {
        LayoutPolicy::gpu()
    }

    fn vertex(policy: &LayoutPolicy) -> Descriptor {
        policy
            .struct_of([
                ("position", policy.vector(F32, 2).unwrap()),
                ("color", policy.vector(F32, 3).unwrap()),
            ])
            .unwrap()
    }

    // ── vector ────────────────────────────────────────────────────────────

    #[test]
    fn vector_zero_arity_rejected() {
        assert_eq!(
            gpu().vector(F32, 0),
            Err(LayoutError::InvalidArity { what: "vector arity", value: 0 })
        );
    }

    #[test]
    fn vector_sizes() {
        let v3 = gpu().vector(F32, 3).unwrap();
        assert_eq!(v3.byte_size(), 12);
        assert_eq!(v3.alignment(), 16);
        let v8 = gpu().vector(U32, 8).unwrap();
        assert_eq!(v8.byte_size(), 32);
        assert_eq!(v8.alignment(), 16);
    }

    // ── struct ────────────────────────────────────────────────────────────

    #[test]
    fn struct_vertex_gpu_layout() {
        let d = vertex(&gpu());
        let s = d.as_struct().unwrap();
        let pos = s.field("position").unwrap();
        let col = s.field("color").unwrap();
        assert_eq!((pos.offset, pos.byte_size(), pos.alignment), (0, 8, 8));
        assert_eq!((col.offset, col.byte_size(), col.alignment), (16, 12, 16));
        assert_eq!(s.alignment(), 16);
        assert_eq!(s.byte_size(), 32);
    }

    #[test]
    fn struct_vertex_packed_layout() {
        let d = vertex(&LayoutPolicy::packed());
        let s = d.as_struct().unwrap();
        assert_eq!(s.field("color").unwrap().offset, 8);
        assert_eq!(s.alignment(), 4);
        assert_eq!(s.byte_size(), 20);
        assert_eq!(s.padding(), 0);
    }

    #[test]
    fn struct_duplicate_field_rejected() {
        let p = gpu();
        let err = p
            .struct_of([("x", p.scalar(F32)), ("x", p.scalar(U32))])
            .unwrap_err();
        assert_eq!(err, LayoutError::DuplicateField { name: "x".into() });
    }

    #[test]
    fn struct_empty_rejected() {
        let err = gpu().struct_of(Vec::<Field>::new()).unwrap_err();
        assert!(matches!(err, LayoutError::InvalidArity { value: 0, .. }));
    }

    #[test]
    fn struct_field_order_determines_packing() {
        let p = gpu();
        let a = p.struct_of([("a", p.scalar(F32)), ("v", p.vector(F32, 4).unwrap())]).unwrap();
        let b = p.struct_of([("v", p.vector(F32, 4).unwrap()), ("a", p.scalar(F32))]).unwrap();
        assert_eq!(a.as_struct().unwrap().field("v").unwrap().offset, 16);
        assert_eq!(b.as_struct().unwrap().field("a").unwrap().offset, 16);
        assert_eq!(a.byte_size(), 32);
        assert_eq!(b.byte_size(), 32);
    }

    #[test]
    fn struct_explicit_align() {
        let p = gpu();
        let d = p
            .struct_of([
                Field::new("a", p.scalar(U32)),
                Field::aligned("b", p.scalar(U32), 16),
            ])
            .unwrap();
        let s = d.as_struct().unwrap();
        assert_eq!(s.field("b").unwrap().offset, 16);
        assert_eq!(s.alignment(), 16);
        assert_eq!(s.byte_size(), 32);
    }

    #[test]
    fn struct_explicit_align_must_be_power_of_two() {
        let p = gpu();
        let err = p.struct_of([Field::aligned("a", p.scalar(U32), 6)]).unwrap_err();
        assert_eq!(err, LayoutError::InvalidAlignment { alignment: 6 });
    }

    #[test]
    fn uniform_policy_raises_struct_alignment() {
        let p = LayoutPolicy::uniform();
        let d = p.struct_of([("t", p.scalar(F32))]).unwrap();
        assert_eq!(d.alignment(), 16);
        assert_eq!(d.byte_size(), 16);
    }

    // ── array ─────────────────────────────────────────────────────────────

    #[test]
    fn array_of_vertex() {
        let p = gpu();
        let a = p.array_of(vertex(&p), 4).unwrap();
        let arr = a.as_array().unwrap();
        assert_eq!(arr.stride(), 32);
        assert_eq!(a.byte_size(), 128);
        assert_eq!(a.alignment(), 16);
    }

    #[test]
    fn array_zero_count_rejected() {
        let p = gpu();
        assert_eq!(
            p.array_of(p.scalar(F32), 0),
            Err(LayoutError::InvalidArity { what: "array count", value: 0 })
        );
    }

    #[test]
    fn array_vec3_stride_padded() {
        let p = gpu();
        let a = p.array_of(p.vector(F32, 3).unwrap(), 2).unwrap();
        assert_eq!(a.as_array().unwrap().stride(), 16);
        assert_eq!(a.byte_size(), 32);
    }

    #[test]
    fn uniform_policy_pads_scalar_array_stride() {
        let p = LayoutPolicy::uniform();
        let a = p.array_of(p.scalar(F32), 4).unwrap();
        assert_eq!(a.as_array().unwrap().stride(), 16);
        assert_eq!(a.byte_size(), 64);
    }

    #[test]
    fn array_size_overflow() {
        let p = gpu();
        let err = p.array_of(p.vector(F32, 4).unwrap(), usize::MAX).unwrap_err();
        assert!(matches!(err, LayoutError::SizeOverflow { .. }));
    }

    // ── paths ─────────────────────────────────────────────────────────────

    #[test]
    fn offset_of_nested_path() {
        let p = gpu();
        let scene = p
            .struct_of([
                ("time", p.scalar(F32)),
                ("verts", p.array_of(vertex(&p), 4).unwrap()),
            ])
            .unwrap();
        assert_eq!(scene.offset_of("").unwrap(), 0);
        assert_eq!(scene.offset_of("verts").unwrap(), 16);
        assert_eq!(scene.offset_of("verts[2].color").unwrap(), 16 + 64 + 16);
    }

    #[test]
    fn offset_of_errors() {
        let p = gpu();
        let d = p.array_of(vertex(&p), 4).unwrap();
        assert!(matches!(d.offset_of("[4]"), Err(LayoutError::IndexOutOfRange { .. })));
        assert!(matches!(d.offset_of("[0].normal"), Err(LayoutError::UnknownField { .. })));
        assert!(matches!(d.offset_of("position"), Err(LayoutError::ShapeMismatch { .. })));
        assert!(matches!(d.offset_of("[x]"), Err(LayoutError::ShapeMismatch { .. })));
    }

    #[test]
    fn contains_at_finds_nested_parts() {
        let p = gpu();
        let vert = vertex(&p);
        let scene = p
            .struct_of([
                ("time", p.scalar(F32)),
                ("verts", p.array_of(vert.clone(), 4).unwrap()),
            ])
            .unwrap();
        let vec3 = p.vector(F32, 3).unwrap();
        assert!(scene.contains_at(0, &scene));
        assert!(scene.contains_at(0, &p.scalar(F32)));
        assert!(scene.contains_at(16 + 32, &vert));
        assert!(scene.contains_at(16 + 32 + 16, &vec3));
        assert!(!scene.contains_at(16 + 32 + 8, &vec3));
        assert!(!scene.contains_at(4, &p.scalar(F32)));
        assert!(!scene.contains_at(16 + 128, &vert));
        assert!(!scene.contains_at(16, &p.scalar(U32)));
    }

    #[test]
    fn path_segments_split() {
        let segs: Vec<_> = path_segments("a.b[3][1].c").collect();
        assert_eq!(
            segs,
            vec![
                Segment::Field("a"),
                Segment::Field("b"),
                Segment::Index(3),
                Segment::Index(1),
                Segment::Field("c"),
            ]
        );
    }

    #[test]
    fn descriptors_are_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Descriptor>();
    }
}
