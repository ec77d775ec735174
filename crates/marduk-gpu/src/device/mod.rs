//! Headless GPU device management.
//!
//! This module is responsible for:
//! - creating the wgpu Instance/Adapter/Device/Queue without a surface
//! - exposing the device and queue to buffer uploaders

mod context;

pub use context::{DeviceInit, GpuContext};
