//! Reflection over descriptors: WGSL type names, per-member metadata, WGSL
//! struct declarations and a printable offset table.

use std::fmt::{self, Write as _};

use crate::descriptor::{Descriptor, StructDescriptor};
use crate::error::{LayoutError, Result};
use crate::policy::{align_up, VectorAlignment};

impl Descriptor {
    /// WGSL spelling of the type (`f32`, `vec3<f32>`, `array<Light, 4>`, …).
    ///
    /// Unnamed structs are reported as `struct`.
    pub fn type_name(&self) -> String {
        match self {
            Self::Scalar(k) => k.name().to_string(),
            Self::Vector(v) if v.arity() == 1 => v.kind().name().to_string(),
            Self::Vector(v) => format!("vec{}<{}>", v.arity(), v.kind().name()),
            Self::Struct(s) => s.name().unwrap_or("struct").to_string(),
            Self::Array(a) => format!("array<{}, {}>", a.element().type_name(), a.count()),
        }
    }
}

/// Layout metadata for one struct member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberInfo {
    pub name: String,
    pub type_name: String,
    pub offset: usize,
    pub size: usize,
    pub alignment: usize,
    /// Gap between the previous member's end and this member's offset.
    pub padding_before: usize,
}

impl StructDescriptor {
    pub fn members(&self) -> Vec<MemberInfo> {
        let mut cursor = 0;
        self.fields()
            .iter()
            .map(|f| {
                let info = MemberInfo {
                    name: f.name.clone(),
                    type_name: f.descriptor.type_name(),
                    offset: f.offset,
                    size: f.byte_size(),
                    alignment: f.alignment,
                    padding_before: f.offset - cursor,
                };
                cursor = f.end();
                info
            })
            .collect()
    }

    /// Bytes between the last member's end and the struct's padded size.
    pub fn tail_padding(&self) -> usize {
        let end = self.fields().last().map_or(0, |f| f.end());
        self.byte_size() - end
    }
}

// ── WGSL ──────────────────────────────────────────────────────────────────

/// Renders WGSL `struct` declarations for `root` and every struct it embeds.
///
/// Dependencies are emitted before their users, and equal structs are
/// declared once. Structs without a name are given `Struct0`, `Struct1`, …
/// skipping any name already used in the tree.
///
/// The declarations reproduce the computed layout exactly. A member gets
/// `@align(n)` when its alignment exceeds the WGSL default for its type, and
/// the first member of a struct whose alignment was raised by the policy
/// carries the struct alignment. Sizes then follow from the same rounding
/// rules, so `@size` is never required. Layouts WGSL cannot express fail with
/// [`LayoutError::NotWgsl`]:
///
/// - vectors wider than 4 components;
/// - alignments below the WGSL default (packed vectors);
/// - array strides padded beyond the element alignment;
/// - two different structs sharing a name.
pub fn to_wgsl(root: &StructDescriptor) -> Result<String> {
    let mut names = Names::default();
    collect_names(root, &mut names.reserved);
    let mut out = String::new();
    emit_struct(root, &mut names, &mut out)?;
    Ok(out)
}

fn not_wgsl(reason: String) -> LayoutError {
    LayoutError::NotWgsl { reason }
}

#[derive(Default)]
struct Names<'d> {
    emitted: Vec<(&'d StructDescriptor, String)>,
    /// Names chosen by the caller anywhere in the tree.
    reserved: Vec<String>,
    anon: usize,
}

impl<'d> Names<'d> {
    fn lookup(&self, s: &StructDescriptor) -> Option<&str> {
        self.emitted
            .iter()
            .find(|(e, _)| std::ptr::eq(*e, s) || *e == s)
            .map(|(_, name)| name.as_str())
    }

    fn assign(&mut self, s: &StructDescriptor) -> Result<String> {
        match s.name() {
            Some(name) => {
                if self.emitted.iter().any(|(_, n)| n == name) {
                    return Err(not_wgsl(format!("two different structs are named `{name}`")));
                }
                Ok(name.to_string())
            }
            None => loop {
                let candidate = format!("Struct{}", self.anon);
                self.anon += 1;
                if !self.reserved.contains(&candidate) {
                    return Ok(candidate);
                }
            },
        }
    }
}

fn collect_names(s: &StructDescriptor, out: &mut Vec<String>) {
    if let Some(name) = s.name() {
        out.push(name.to_string());
    }
    for f in s.fields() {
        let mut d = &f.descriptor;
        while let Descriptor::Array(a) = d {
            d = a.element();
        }
        if let Descriptor::Struct(inner) = d {
            collect_names(inner, out);
        }
    }
}

/// Alignment WGSL gives `d` as declared by [`to_wgsl`], checked against the
/// computed one.
fn wgsl_alignment(d: &Descriptor) -> Result<usize> {
    match d {
        Descriptor::Scalar(k) => Ok(k.alignment()),
        Descriptor::Vector(v) => {
            if v.arity() > 4 {
                return Err(not_wgsl(format!("{} has no WGSL vector type", d.type_name())));
            }
            let natural = VectorAlignment::Gpu.alignment(v.kind(), v.arity());
            if v.alignment() != natural {
                return Err(not_wgsl(format!(
                    "{} aligned to {} (WGSL requires {natural})",
                    d.type_name(),
                    v.alignment()
                )));
            }
            Ok(natural)
        }
        Descriptor::Struct(s) => Ok(s.alignment()),
        Descriptor::Array(a) => {
            let element = wgsl_alignment(a.element())?;
            if a.alignment() != element {
                return Err(not_wgsl(format!(
                    "{} has stride {} (WGSL derives {})",
                    d.type_name(),
                    a.stride(),
                    align_up(a.element().byte_size(), element)?
                )));
            }
            Ok(element)
        }
    }
}

fn emit_struct<'d>(
    s: &'d StructDescriptor,
    names: &mut Names<'d>,
    out: &mut String,
) -> Result<String> {
    if let Some(name) = names.lookup(s) {
        return Ok(name.to_string());
    }

    let member_max = s.fields().iter().map(|f| f.alignment).max().unwrap_or(1);
    let mut body = String::new();
    for (i, f) in s.fields().iter().enumerate() {
        let ty = wgsl_type(&f.descriptor, names, out)?;
        let natural = wgsl_alignment(&f.descriptor)?;
        let align = if i == 0 && s.alignment() > member_max {
            s.alignment()
        } else {
            f.alignment
        };
        if align == natural {
            let _ = writeln!(body, "    {}: {ty},", f.name);
        } else {
            let _ = writeln!(body, "    @align({align}) {}: {ty},", f.name);
        }
    }

    let name = names.assign(s)?;
    if !out.is_empty() {
        out.push('\n');
    }
    let _ = write!(out, "struct {name} {{\n{body}}}\n");
    names.emitted.push((s, name.clone()));
    Ok(name)
}

fn wgsl_type<'d>(d: &'d Descriptor, names: &mut Names<'d>, out: &mut String) -> Result<String> {
    match d {
        Descriptor::Struct(s) => emit_struct(s, names, out),
        Descriptor::Array(a) => {
            let element = wgsl_type(a.element(), names, out)?;
            Ok(format!("array<{element}, {}>", a.count()))
        }
        other => Ok(other.type_name()),
    }
}

// ── report ────────────────────────────────────────────────────────────────

/// Human-readable offset table.
///
/// ```text
/// Vertex  size=32 align=16
///   offset  size  align  pad  field
///        0     8      8    0  position: vec2<f32>
///       16    12     16    8  color: vec3<f32>
///   tail padding: 4
/// ```
pub struct LayoutReport<'a> {
    descriptor: &'a Descriptor,
}

impl<'a> LayoutReport<'a> {
    pub fn new(descriptor: &'a Descriptor) -> Self {
        Self { descriptor }
    }
}

impl fmt::Display for LayoutReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let d = self.descriptor;
        write!(f, "{}  size={} align={}", d.type_name(), d.byte_size(), d.alignment())?;
        match d {
            Descriptor::Array(a) => {
                writeln!(f, " stride={}", a.stride())?;
                if a.element().as_struct().is_some() {
                    write!(f, "{}", LayoutReport::new(a.element()))?;
                }
                Ok(())
            }
            Descriptor::Struct(s) => {
                writeln!(f)?;
                writeln!(f, "  offset  size  align  pad  field")?;
                for m in s.members() {
                    writeln!(
                        f,
                        "  {:>6}  {:>4}  {:>5}  {:>3}  {}: {}",
                        m.offset, m.size, m.alignment, m.padding_before, m.name, m.type_name
                    )?;
                }
                writeln!(f, "  tail padding: {}", s.tail_padding())
            }
            _ => writeln!(f),
        }
    }
}
