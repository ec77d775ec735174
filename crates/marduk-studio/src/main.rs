use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use marduk_gpu::{init_logging, BufferRole, DeviceInit, GpuContext, LayoutBuffer, LoggingConfig};
use marduk_layout::{
    to_wgsl, Descriptor, Field, LayoutPolicy, LayoutReport, ScalarKind, Value, View, ViewMut,
};

#[derive(Parser, Debug)]
#[command(
    name = "marduk-studio",
    about = "Print GPU struct layouts, round-trip a sample scene and optionally upload it."
)]
struct Args {
    /// Layout rules used to build the scene
    #[arg(long, value_enum, default_value_t = Policy::Gpu)]
    policy: Policy,

    /// Create a headless device and upload the scene into a storage buffer
    #[arg(long, action = clap::ArgAction::SetTrue)]
    upload: bool,
}

#[derive(ValueEnum, Copy, Clone, Debug, Eq, PartialEq)]
enum Policy {
    /// vec3/vec4 align to four scalars (WGSL storage layout)
    Gpu,
    /// `gpu` plus 16-byte struct and array element alignment
    Uniform,
    /// Scalar alignment only
    Packed,
}

impl Policy {
    fn layout(self) -> LayoutPolicy {
        match self {
            Self::Gpu => LayoutPolicy::gpu(),
            Self::Uniform => LayoutPolicy::uniform(),
            Self::Packed => LayoutPolicy::packed(),
        }
    }
}

// ── scene layout ──────────────────────────────────────────────────────────

struct SceneTypes {
    light: Descriptor,
    scene: Descriptor,
}

fn scene_types(p: &LayoutPolicy) -> Result<SceneTypes> {
    use ScalarKind::*;

    let vertex = p.named_struct(
        "Vertex",
        [
            ("position", p.vector(F32, 2)?),
            ("color", p.vector(F32, 3)?),
        ],
    )?;
    let light = p.named_struct(
        "Light",
        [
            Field::new("direction", p.vector(F32, 3)?),
            Field::new("intensity", p.scalar(F32)),
            Field::new("color", p.vector(F32, 4)?),
            Field::aligned("enabled", p.scalar(U32), 16),
        ],
    )?;
    let scene = p.named_struct(
        "Scene",
        [
            ("time", p.scalar(F32)),
            ("frame", p.scalar(U32)),
            ("lights", p.array_of(light.clone(), 2)?),
            ("triangle", p.array_of(vertex, 3)?),
        ],
    )?;
    Ok(SceneTypes { light, scene })
}

fn light_value(direction: [f32; 3], intensity: f32, color: [f32; 4], enabled: bool) -> Value {
    Value::record([
        ("direction", Value::vector(direction)),
        ("intensity", Value::from(intensity)),
        ("color", Value::vector(color)),
        ("enabled", Value::from(enabled as u32)),
    ])
}

fn vertex_value(position: [f32; 2], color: [f32; 3]) -> Value {
    Value::record([
        ("position", Value::vector(position)),
        ("color", Value::vector(color)),
    ])
}

fn scene_value() -> Value {
    Value::record([
        ("time", Value::from(0.5f32)),
        ("frame", Value::from(42u32)),
        (
            "lights",
            Value::array([
                light_value([0.0, -1.0, 0.0], 1.0, [1.0, 1.0, 1.0, 1.0], true),
                light_value([1.0, 0.0, 0.0], 0.25, [1.0, 0.5, 0.0, 1.0], false),
            ]),
        ),
        (
            "triangle",
            Value::array([
                vertex_value([0.0, 0.5], [1.0, 0.0, 0.0]),
                vertex_value([-0.5, -0.5], [0.0, 1.0, 0.0]),
                vertex_value([0.5, -0.5], [0.0, 0.0, 1.0]),
            ]),
        ),
    ])
}

fn main() -> Result<()> {
    init_logging(LoggingConfig::default());
    let args = Args::parse();

    println!();
    println!("  ╔════════════════════════════════════════╗");
    println!("  ║        MARDUK LAYOUT STUDIO v0.1       ║");
    println!("  ║   struct layouts  ·  wgpu uploads      ║");
    println!("  ╚════════════════════════════════════════╝");
    println!();
    println!("  policy: {:?}", args.policy);
    println!();

    let types = scene_types(&args.policy.layout()).context("failed to build scene layout")?;
    let scene = types.scene.as_struct().context("scene is not a struct")?;

    // ── LAYOUT ────────────────────────────────────────────────────────────
    print!("{}", LayoutReport::new(&types.light));
    println!();
    print!("{}", LayoutReport::new(&types.scene));
    println!();
    match to_wgsl(scene) {
        Ok(wgsl) => print!("{wgsl}"),
        Err(e) => log::warn!("no WGSL declaration for this policy: {e}"),
    }
    println!();

    // ── ENCODE ────────────────────────────────────────────────────────────
    let mut bytes = vec![0u8; types.scene.byte_size()];
    let mut view = ViewMut::new(&types.scene, &mut bytes, 0)?;
    view.set(&scene_value()).context("failed to encode scene")?;

    // Dim the second light in place.
    view.field("lights")?.at(1)?.field("intensity")?.write(&[0.1f32])?;

    let frozen = View::new(&types.scene, &bytes, 0)?;
    let sun = frozen.field("lights")?.at(0)?;
    println!("  lights[0]        = {}", sun.get());
    println!(
        "  lights[1].intensity @ {}",
        types.scene.offset_of("lights[1].intensity")?
    );
    for (i, v) in frozen.field("triangle")?.elements()?.enumerate() {
        println!("  triangle[{i}]      @ {:>3}  {}", v.offset(), v.get());
    }
    println!();

    if !args.upload {
        log::info!("run with --upload to write the scene into a GPU buffer");
        return Ok(());
    }

    // ── UPLOAD ────────────────────────────────────────────────────────────
    let gpu = GpuContext::headless_blocking(DeviceInit::default())
        .context("failed to create headless GPU device")?;
    let info = gpu.adapter_info();
    println!("  adapter: {} ({:?})", info.name, info.backend);

    let role = BufferRole::Storage { read_only: true };
    marduk_gpu::check_binding_limits(&types.scene, role, &gpu.limits())?;

    let buffer = LayoutBuffer::new(gpu.device(), "scene", &types.scene, role);
    buffer.write(gpu.queue(), &frozen)?;
    buffer.write(gpu.queue(), &frozen.field("frame")?)?;

    let entry = buffer.layout_entry(0, wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT);
    let bind_layout = gpu
        .device()
        .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("scene layout"),
            entries: &[entry],
        });
    let _bind_group = gpu.device().create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("scene"),
        layout: &bind_layout,
        entries: &[wgpu::BindGroupEntry {
            binding: 0,
            resource: buffer.binding(),
        }],
    });

    println!("  uploaded {} bytes to buffer 'scene'", buffer.buffer().size());
    println!();
    Ok(())
}
