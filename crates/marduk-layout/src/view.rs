//! Typed, non-owning access to caller-owned byte buffers.
//!
//! A view is a descriptor plus the exact byte range it describes. Sub-views
//! (`field`, `at`, `elements`) narrow that range without copying. Views never
//! allocate, resize, or outlive the buffer they borrow.
//!
//! Writes follow normal borrowing rules: a [`ViewMut`] holds the only mutable
//! borrow of its range, so concurrent writers must partition the buffer first
//! (for example with `split_at_mut`).

use crate::descriptor::Descriptor;
use crate::error::{LayoutError, Result};
use crate::scalar::{Scalar, ScalarKind, ScalarValue};
use crate::value::{self, Value};

// ── shared lookup ─────────────────────────────────────────────────────────

fn bounds(descriptor: &Descriptor, len: usize, offset: usize) -> Result<std::ops::Range<usize>> {
    let size = descriptor.byte_size();
    match offset.checked_add(size) {
        Some(end) if end <= len => Ok(offset..end),
        _ => {
            log::debug!("view out of bounds: offset={offset} size={size} len={len}");
            Err(LayoutError::OutOfBounds { offset, size, len })
        }
    }
}

/// Resolves a struct field to `(descriptor, relative range)`.
fn locate_field<'d>(descriptor: &'d Descriptor, name: &str) -> Result<(&'d Descriptor, usize)> {
    let s = descriptor
        .as_struct()
        .ok_or_else(|| LayoutError::shape(name, "struct", descriptor.type_name()))?;
    let f = s
        .field(name)
        .ok_or_else(|| LayoutError::UnknownField { name: name.to_string() })?;
    Ok((&f.descriptor, f.offset))
}

fn locate_element(descriptor: &Descriptor, index: usize) -> Result<(&Descriptor, usize)> {
    let a = descriptor
        .as_array()
        .ok_or_else(|| LayoutError::shape(format!("[{index}]"), "array", descriptor.type_name()))?;
    Ok((a.element(), a.element_offset(index)?))
}

fn read_components<T: Scalar>(descriptor: &Descriptor, bytes: &[u8]) -> Result<Vec<T>> {
    let (kind, arity) = components_of(descriptor, T::KIND.name())?;
    if kind != T::KIND {
        return Err(LayoutError::shape("value", kind.name(), T::KIND.name()));
    }
    Ok(bytes
        .chunks_exact(kind.size())
        .take(arity)
        .map(bytemuck::pod_read_unaligned)
        .collect())
}

fn components_of(descriptor: &Descriptor, found: &str) -> Result<(ScalarKind, usize)> {
    descriptor
        .components()
        .ok_or_else(|| LayoutError::shape("value", descriptor.type_name(), found))
}

// ── View ──────────────────────────────────────────────────────────────────

/// Read-only view.
#[derive(Debug, Clone, Copy)]
pub struct View<'a> {
    descriptor: &'a Descriptor,
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> View<'a> {
    /// Binds `descriptor` to `buffer[offset..offset + descriptor.byte_size()]`.
    pub fn new(descriptor: &'a Descriptor, buffer: &'a [u8], offset: usize) -> Result<Self> {
        let range = bounds(descriptor, buffer.len(), offset)?;
        Ok(Self { descriptor, bytes: &buffer[range], offset })
    }

    #[inline]
    pub fn descriptor(&self) -> &'a Descriptor {
        self.descriptor
    }

    /// Absolute offset of this view within the buffer it was created from.
    #[inline]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Exactly the bytes this view describes.
    #[inline]
    pub fn bytes(&self) -> &'a [u8] {
        self.bytes
    }

    /// Decodes the full value tree.
    pub fn get(&self) -> Value {
        value::decode(self.descriptor, self.bytes)
    }

    /// Components of a scalar / vector view as `T`.
    pub fn read<T: Scalar>(&self) -> Result<Vec<T>> {
        read_components(self.descriptor, self.bytes)
    }

    /// Components of a scalar / vector view as dynamically typed scalars.
    pub fn scalars(&self) -> Result<Vec<ScalarValue>> {
        let (kind, arity) = components_of(self.descriptor, "scalar or vector")?;
        Ok(self
            .bytes
            .chunks_exact(kind.size())
            .take(arity)
            .map(|chunk| ScalarValue::decode(kind, chunk))
            .collect())
    }

    pub fn field(&self, name: &str) -> Result<View<'a>> {
        let (descriptor, rel) = locate_field(self.descriptor, name)?;
        Ok(self.narrow(descriptor, rel))
    }

    pub fn at(&self, index: usize) -> Result<View<'a>> {
        let (descriptor, rel) = locate_element(self.descriptor, index)?;
        Ok(self.narrow(descriptor, rel))
    }

    /// Element sub-views of an array view, in index order.
    ///
    /// The iterator is `Clone`, so it can be restarted from any point.
    pub fn elements(&self) -> Result<Elements<'a>> {
        let a = self
            .descriptor
            .as_array()
            .ok_or_else(|| LayoutError::shape("value", "array", self.descriptor.type_name()))?;
        Ok(Elements {
            element: a.element(),
            bytes: self.bytes,
            stride: a.stride(),
            base: self.offset,
            next: 0,
            count: a.count(),
        })
    }

    fn narrow(&self, descriptor: &'a Descriptor, rel: usize) -> View<'a> {
        let end = rel + descriptor.byte_size();
        View {
            descriptor,
            bytes: &self.bytes[rel..end],
            offset: self.offset + rel,
        }
    }
}

/// Iterator over the elements of an array view.
#[derive(Debug, Clone)]
pub struct Elements<'a> {
    element: &'a Descriptor,
    bytes: &'a [u8],
    stride: usize,
    base: usize,
    next: usize,
    count: usize,
}

impl<'a> Iterator for Elements<'a> {
    type Item = View<'a>;

    fn next(&mut self) -> Option<View<'a>> {
        if self.next >= self.count {
            return None;
        }
        let start = self.next * self.stride;
        self.next += 1;
        Some(View {
            descriptor: self.element,
            bytes: &self.bytes[start..start + self.element.byte_size()],
            offset: self.base + start,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.count - self.next;
        (n, Some(n))
    }
}

impl ExactSizeIterator for Elements<'_> {}

// ── ViewMut ───────────────────────────────────────────────────────────────

/// Read/write view.
#[derive(Debug)]
pub struct ViewMut<'a> {
    descriptor: &'a Descriptor,
    bytes: &'a mut [u8],
    offset: usize,
}

impl<'a> ViewMut<'a> {
    pub fn new(descriptor: &'a Descriptor, buffer: &'a mut [u8], offset: usize) -> Result<Self> {
        let range = bounds(descriptor, buffer.len(), offset)?;
        Ok(Self { descriptor, bytes: &mut buffer[range], offset })
    }

    #[inline]
    pub fn descriptor(&self) -> &'a Descriptor {
        self.descriptor
    }

    #[inline]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Reborrows as a read-only view.
    #[inline]
    pub fn as_view(&self) -> View<'_> {
        View { descriptor: self.descriptor, bytes: self.bytes, offset: self.offset }
    }

    pub fn get(&self) -> Value {
        self.as_view().get()
    }

    pub fn read<T: Scalar>(&self) -> Result<Vec<T>> {
        read_components(self.descriptor, self.bytes)
    }

    /// Bulk write of a value tree shaped like the descriptor.
    ///
    /// The whole tree is checked before any byte is written: on
    /// [`LayoutError::ShapeMismatch`] the buffer is unchanged. A component
    /// vector of the wrong length on a scalar / vector view is reported as
    /// [`LayoutError::ArityMismatch`], as with [`set_scalars`](Self::set_scalars).
    pub fn set(&mut self, value: &Value) -> Result<()> {
        if let (Some((_, arity)), Value::Vector(components)) =
            (self.descriptor.components(), value)
        {
            if components.len() != arity {
                return Err(LayoutError::ArityMismatch {
                    expected: arity,
                    found: components.len(),
                });
            }
        }
        value::match_shape(self.descriptor, value, "value")?;
        value::encode(self.descriptor, value, self.bytes);
        Ok(())
    }

    /// Writes the components of a scalar / vector view.
    pub fn set_scalars(&mut self, values: &[ScalarValue]) -> Result<()> {
        let (kind, arity) = components_of(self.descriptor, "scalar values")?;
        if values.len() != arity {
            return Err(LayoutError::ArityMismatch { expected: arity, found: values.len() });
        }
        if let Some((i, bad)) = values.iter().enumerate().find(|(_, v)| v.kind() != kind) {
            return Err(LayoutError::shape(format!("value[{i}]"), kind.name(), bad.kind().name()));
        }
        for (chunk, v) in self.bytes.chunks_exact_mut(kind.size()).zip(values) {
            v.encode(chunk);
        }
        Ok(())
    }

    /// Typed variant of [`set_scalars`](Self::set_scalars).
    pub fn write<T: Scalar>(&mut self, values: &[T]) -> Result<()> {
        let (kind, arity) = components_of(self.descriptor, T::KIND.name())?;
        if kind != T::KIND {
            return Err(LayoutError::shape("value", kind.name(), T::KIND.name()));
        }
        if values.len() != arity {
            return Err(LayoutError::ArityMismatch { expected: arity, found: values.len() });
        }
        self.bytes.copy_from_slice(bytemuck::cast_slice(values));
        Ok(())
    }

    pub fn field(&mut self, name: &str) -> Result<ViewMut<'_>> {
        let (descriptor, rel) = locate_field(self.descriptor, name)?;
        let end = rel + descriptor.byte_size();
        Ok(ViewMut {
            descriptor,
            bytes: &mut self.bytes[rel..end],
            offset: self.offset + rel,
        })
    }

    pub fn at(&mut self, index: usize) -> Result<ViewMut<'_>> {
        let (descriptor, rel) = locate_element(self.descriptor, index)?;
        let end = rel + descriptor.byte_size();
        Ok(ViewMut {
            descriptor,
            bytes: &mut self.bytes[rel..end],
            offset: self.offset + rel,
        })
    }

    /// Consuming variant of [`field`](Self::field) that keeps the buffer lifetime.
    pub fn into_field(self, name: &str) -> Result<ViewMut<'a>> {
        let (descriptor, rel) = locate_field(self.descriptor, name)?;
        let ViewMut { bytes, offset, .. } = self;
        let end = rel + descriptor.byte_size();
        Ok(ViewMut { descriptor, bytes: &mut bytes[rel..end], offset: offset + rel })
    }

    /// Disjoint mutable element sub-views of an array view, in index order.
    pub fn elements_mut(&mut self) -> Result<ElementsMut<'_>> {
        let a = self
            .descriptor
            .as_array()
            .ok_or_else(|| LayoutError::shape("value", "array", self.descriptor.type_name()))?;
        Ok(ElementsMut {
            element: a.element(),
            rest: &mut *self.bytes,
            stride: a.stride(),
            next_offset: self.offset,
            remaining: a.count(),
        })
    }
}

/// Iterator over mutable element sub-views of an array view.
#[derive(Debug)]
pub struct ElementsMut<'a> {
    element: &'a Descriptor,
    rest: &'a mut [u8],
    stride: usize,
    next_offset: usize,
    remaining: usize,
}

impl<'a> Iterator for ElementsMut<'a> {
    type Item = ViewMut<'a>;

    fn next(&mut self) -> Option<ViewMut<'a>> {
        if self.remaining == 0 {
            return None;
        }
        let rest = std::mem::take(&mut self.rest);
        let (slot, tail) = rest.split_at_mut(self.stride.min(rest.len()));
        let (bytes, _) = slot.split_at_mut(self.element.byte_size());
        self.rest = tail;
        self.remaining -= 1;

        let offset = self.next_offset;
        self.next_offset += self.stride;
        Some(ViewMut { descriptor: self.element, bytes, offset })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for ElementsMut<'_> {}
