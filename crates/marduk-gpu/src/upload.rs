//! GPU buffers allocated and filled from layout descriptors.
//!
//! The layout engine only computes offsets; this module turns those numbers
//! into wgpu allocations, bind-group layout entries and `write_buffer` calls.

use anyhow::{Context, Result};
use marduk_layout::{align_up, Descriptor, Value, View, ViewMut};

/// How a layout buffer is bound in shaders.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum BufferRole {
    Uniform,
    Storage { read_only: bool },
}

impl BufferRole {
    pub fn usage(self) -> wgpu::BufferUsages {
        match self {
            Self::Uniform => wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            Self::Storage { read_only: true } => {
                wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST
            }
            Self::Storage { read_only: false } => {
                wgpu::BufferUsages::STORAGE
                    | wgpu::BufferUsages::COPY_DST
                    | wgpu::BufferUsages::COPY_SRC
            }
        }
    }

    pub fn binding_type(self) -> wgpu::BufferBindingType {
        match self {
            Self::Uniform => wgpu::BufferBindingType::Uniform,
            Self::Storage { read_only } => wgpu::BufferBindingType::Storage { read_only },
        }
    }
}

// ── sizing ────────────────────────────────────────────────────────────────

/// Allocation size for `descriptor` in a buffer bound as `role`.
///
/// Rounded to `COPY_BUFFER_ALIGNMENT`; uniform buffers additionally round to 16.
pub fn padded_size(descriptor: &Descriptor, role: BufferRole) -> u64 {
    let size = descriptor.byte_size() as u64;
    let granule = match role {
        BufferRole::Uniform => 16,
        BufferRole::Storage { .. } => wgpu::COPY_BUFFER_ALIGNMENT,
    };
    let rounded = size.div_ceil(granule) * granule;
    rounded.max(wgpu::COPY_BUFFER_ALIGNMENT)
}

/// Minimum binding size to declare in the bind-group layout.
///
/// Descriptors always have a non-zero size, so this is `Some` in practice.
pub fn min_binding_size(descriptor: &Descriptor) -> Option<wgpu::BufferSize> {
    wgpu::BufferSize::new(descriptor.byte_size() as u64)
}

/// Bind-group layout entry for a buffer holding `descriptor`.
pub fn layout_entry(
    binding: u32,
    visibility: wgpu::ShaderStages,
    descriptor: &Descriptor,
    role: BufferRole,
) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: role.binding_type(),
            has_dynamic_offset: false,
            min_binding_size: min_binding_size(descriptor),
        },
        count: None,
    }
}

/// Validates a `write_buffer` range against wgpu's copy alignment rules.
pub fn check_copy_range(offset: usize, len: usize, capacity: u64) -> Result<()> {
    let align = wgpu::COPY_BUFFER_ALIGNMENT as usize;
    anyhow::ensure!(
        offset % align == 0 && len % align == 0,
        "copy range {offset}+{len} is not {align}-byte aligned"
    );
    let end = (offset as u64)
        .checked_add(len as u64)
        .context("copy range overflows")?;
    anyhow::ensure!(
        end <= capacity,
        "copy range {offset}+{len} exceeds buffer size {capacity}"
    );
    Ok(())
}

/// Checks that `view` describes a part of `layout` placed at the view's offset.
///
/// Views are expected to come from a buffer laid out by `layout` starting at
/// byte 0, so their absolute offsets are buffer offsets.
pub fn check_view_placement(layout: &Descriptor, view: &View<'_>) -> Result<()> {
    anyhow::ensure!(
        layout.contains_at(view.offset(), view.descriptor()),
        "{} at offset {} is not part of {}",
        view.descriptor().type_name(),
        view.offset(),
        layout.type_name()
    );
    Ok(())
}

/// Checks that `descriptor` can be bound as `role` under `limits`.
pub fn check_binding_limits(
    descriptor: &Descriptor,
    role: BufferRole,
    limits: &wgpu::Limits,
) -> Result<()> {
    let size = padded_size(descriptor, role);
    let max = match role {
        BufferRole::Uniform => limits.max_uniform_buffer_binding_size as u64,
        BufferRole::Storage { .. } => limits.max_storage_buffer_binding_size as u64,
    };
    anyhow::ensure!(
        size <= max,
        "{} needs {size} bytes, device allows {max} for {role:?} bindings",
        descriptor.type_name()
    );
    Ok(())
}

// ── LayoutBuffer ──────────────────────────────────────────────────────────

/// A wgpu buffer whose contents follow a layout descriptor.
pub struct LayoutBuffer {
    buffer: wgpu::Buffer,
    descriptor: Descriptor,
    role: BufferRole,
}

impl LayoutBuffer {
    pub fn new(
        device: &wgpu::Device,
        label: &str,
        descriptor: &Descriptor,
        role: BufferRole,
    ) -> Self {
        let size = padded_size(descriptor, role);
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size,
            usage: role.usage(),
            mapped_at_creation: false,
        });
        log::debug!("{label}: allocated {size} bytes for {}", descriptor.type_name());

        Self {
            buffer,
            descriptor: descriptor.clone(),
            role,
        }
    }

    /// Allocates and uploads `value` in one step.
    pub fn with_value(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        label: &str,
        descriptor: &Descriptor,
        role: BufferRole,
        value: &Value,
    ) -> Result<Self> {
        let buf = Self::new(device, label, descriptor, role);
        buf.write_value(queue, value)?;
        Ok(buf)
    }

    #[inline]
    pub fn buffer(&self) -> &wgpu::Buffer {
        &self.buffer
    }

    #[inline]
    pub fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    #[inline]
    pub fn role(&self) -> BufferRole {
        self.role
    }

    pub fn binding(&self) -> wgpu::BindingResource<'_> {
        self.buffer.as_entire_binding()
    }

    pub fn layout_entry(
        &self,
        binding: u32,
        visibility: wgpu::ShaderStages,
    ) -> wgpu::BindGroupLayoutEntry {
        layout_entry(binding, visibility, &self.descriptor, self.role)
    }

    /// Uploads the bytes covered by `view` at the view's own offset.
    ///
    /// Pass a field or element sub-view to update only that range. The view
    /// must describe this buffer's layout or a part of it at the same offset.
    pub fn write(&self, queue: &wgpu::Queue, view: &View<'_>) -> Result<()> {
        check_view_placement(&self.descriptor, view)?;
        check_copy_range(view.offset(), view.bytes().len(), self.buffer.size())
            .with_context(|| format!("uploading {}", view.descriptor().type_name()))?;
        queue.write_buffer(&self.buffer, view.offset() as u64, view.bytes());
        log::trace!("wrote {} bytes at {}", view.bytes().len(), view.offset());
        Ok(())
    }

    /// Encodes a whole value tree and uploads it.
    pub fn write_value(&self, queue: &wgpu::Queue, value: &Value) -> Result<()> {
        let mut staging = vec![0u8; self.descriptor.byte_size()];
        ViewMut::new(&self.descriptor, &mut staging, 0)?
            .set(value)
            .context("value does not match buffer layout")?;
        let view = View::new(&self.descriptor, &staging, 0)?;
        self.write(queue, &view)
    }
}

/// Byte offset of a uniform block inside a dynamic-offset buffer.
///
/// `index` blocks of `descriptor`, each rounded to `alignment`
/// (`min_uniform_buffer_offset_alignment` from the device limits).
pub fn dynamic_offset(descriptor: &Descriptor, index: usize, alignment: u32) -> Result<u64> {
    let block = align_up(descriptor.byte_size(), alignment as usize)?;
    let offset = block
        .checked_mul(index)
        .context("dynamic offset overflows")?;
    Ok(offset as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use marduk_layout::{LayoutPolicy, ScalarKind};

    fn vertex() -> Descriptor {
        let p = LayoutPolicy::gpu();
        p.struct_of([
            ("position", p.vector(ScalarKind::F32, 2).unwrap()),
            ("color", p.vector(ScalarKind::F32, 3).unwrap()),
        ])
        .unwrap()
    }

    // ── sizing ────────────────────────────────────────────────────────────

    #[test]
    fn padded_size_rounds_by_role() {
        let p = LayoutPolicy::packed();
        let d = p.vector(ScalarKind::F32, 3).unwrap();
        assert_eq!(padded_size(&d, BufferRole::Storage { read_only: true }), 12);
        assert_eq!(padded_size(&d, BufferRole::Uniform), 16);
        assert_eq!(padded_size(&vertex(), BufferRole::Uniform), 32);
    }

    #[test]
    fn min_binding_size_matches_descriptor() {
        assert_eq!(min_binding_size(&vertex()).map(|s| s.get()), Some(32));
    }

    #[test]
    fn layout_entry_carries_role() {
        let e = layout_entry(
            2,
            wgpu::ShaderStages::COMPUTE,
            &vertex(),
            BufferRole::Storage { read_only: false },
        );
        assert_eq!(e.binding, 2);
        match e.ty {
            wgpu::BindingType::Buffer { ty, min_binding_size, .. } => {
                assert_eq!(ty, wgpu::BufferBindingType::Storage { read_only: false });
                assert_eq!(min_binding_size.map(|s| s.get()), Some(32));
            }
            other => panic!("unexpected binding type {other:?}"),
        }
    }

    #[test]
    fn usage_flags() {
        assert!(BufferRole::Uniform.usage().contains(wgpu::BufferUsages::UNIFORM));
        assert!(!BufferRole::Storage { read_only: true }
            .usage()
            .contains(wgpu::BufferUsages::COPY_SRC));
        assert!(BufferRole::Storage { read_only: false }
            .usage()
            .contains(wgpu::BufferUsages::COPY_SRC));
    }

    // ── copy ranges ───────────────────────────────────────────────────────

    #[test]
    fn copy_range_checks() {
        assert!(check_copy_range(8, 12, 32).is_ok());
        assert!(check_copy_range(2, 4, 32).is_err());
        assert!(check_copy_range(0, 6, 32).is_err());
        assert!(check_copy_range(24, 12, 32).is_err());
    }

    #[test]
    fn field_subview_range_is_copyable() {
        let d = vertex();
        let buf = vec![0u8; 32];
        let color = View::new(&d, &buf, 0).unwrap().field("color").unwrap();
        assert!(check_copy_range(color.offset(), color.bytes().len(), 32).is_ok());
    }

    #[test]
    fn view_placement_must_match_layout() {
        let d = vertex();
        let buf = vec![0u8; 64];
        let whole = View::new(&d, &buf, 0).unwrap();
        assert!(check_view_placement(&d, &whole).is_ok());
        assert!(check_view_placement(&d, &whole.field("color").unwrap()).is_ok());

        let shifted = View::new(&d, &buf, 16).unwrap();
        assert!(check_view_placement(&d, &shifted).is_err());

        let other = LayoutPolicy::gpu().vector(ScalarKind::U32, 2).unwrap();
        let foreign = View::new(&other, &buf, 0).unwrap();
        assert!(check_view_placement(&d, &foreign).is_err());
    }

    #[test]
    fn binding_limits() {
        let p = LayoutPolicy::gpu();
        let big = p.array_of(p.vector(ScalarKind::F32, 4).unwrap(), 8192).unwrap();
        let limits = wgpu::Limits::downlevel_defaults();
        assert!(check_binding_limits(&big, BufferRole::Uniform, &limits).is_err());
        assert!(check_binding_limits(&vertex(), BufferRole::Uniform, &limits).is_ok());
    }

    #[test]
    fn dynamic_offsets_round_to_device_alignment() {
        let d = vertex();
        assert_eq!(dynamic_offset(&d, 0, 256).unwrap(), 0);
        assert_eq!(dynamic_offset(&d, 3, 256).unwrap(), 768);
        assert!(dynamic_offset(&d, 1, 48).is_err());
    }
}
