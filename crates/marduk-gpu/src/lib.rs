//! Marduk GPU crate.
//!
//! Bridges `marduk-layout` descriptors to wgpu: logger bootstrap, a headless
//! device, and buffers allocated, bound and filled from layout descriptors.

pub mod device;
pub mod logging;
pub mod upload;

pub use device::{DeviceInit, GpuContext};
pub use logging::{init_logging, LoggingConfig};
pub use upload::{
    check_binding_limits, check_copy_range, check_view_placement, dynamic_offset, layout_entry,
    min_binding_size, padded_size, BufferRole, LayoutBuffer,
};
