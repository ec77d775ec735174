//! Value trees for bulk reads and writes.
//!
//! A [`Value`] mirrors the shape of a [`Descriptor`]. Bulk writes first run
//! [`match_shape`] over the whole tree and only touch the buffer once every
//! leaf has been accepted, so a rejected write leaves the bytes untouched.

use std::fmt;

use crate::descriptor::Descriptor;
use crate::error::{LayoutError, Result};
use crate::scalar::{ScalarKind, ScalarValue};

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Scalar(ScalarValue),
    Vector(Vec<ScalarValue>),
    /// Named fields. Order is free; the set of names must match the struct exactly.
    Struct(Vec<(String, Value)>),
    Array(Vec<Value>),
}

impl Value {
    pub fn vector<T: Into<ScalarValue>>(components: impl IntoIterator<Item = T>) -> Self {
        Self::Vector(components.into_iter().map(Into::into).collect())
    }

    pub fn record<S: Into<String>>(fields: impl IntoIterator<Item = (S, Value)>) -> Self {
        Self::Struct(fields.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn array(elements: impl IntoIterator<Item = Value>) -> Self {
        Self::Array(elements.into_iter().collect())
    }

    /// Looks up a named field of a struct value.
    pub fn get(&self, name: &str) -> Option<&Value> {
        match self {
            Self::Struct(fields) => fields.iter().find(|(k, _)| k == name).map(|(_, v)| v),
            _ => None,
        }
    }

    fn shape_name(&self) -> String {
        match self {
            Self::Scalar(s) => s.kind().name().to_string(),
            Self::Vector(c) => format!("vector of {} components", c.len()),
            Self::Struct(f) => format!("struct with {} fields", f.len()),
            Self::Array(e) => format!("array of {} elements", e.len()),
        }
    }
}

impl From<ScalarValue> for Value {
    fn from(v: ScalarValue) -> Self {
        Self::Scalar(v)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(s) => write!(f, "{s}"),
            Self::Vector(c) => {
                f.write_str("(")?;
                for (i, s) in c.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{s}")?;
                }
                f.write_str(")")
            }
            Self::Struct(fields) => {
                f.write_str("{ ")?;
                for (i, (k, v)) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                f.write_str(" }")
            }
            Self::Array(elems) => {
                f.write_str("[")?;
                for (i, v) in elems.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{v}")?;
                }
                f.write_str("]")
            }
        }
    }
}

// ── shape matching ────────────────────────────────────────────────────────

/// Checks that `value` has exactly the shape of `desc`.
///
/// `path` names the root in error messages (`"value"` for a whole-view write).
pub(crate) fn match_shape(desc: &Descriptor, value: &Value, path: &str) -> Result<()> {
    match (desc, value) {
        (Descriptor::Scalar(kind), Value::Scalar(s)) => match_kind(*kind, *s, path),

        (Descriptor::Vector(v), Value::Vector(components)) => {
            if components.len() != v.arity() {
                return Err(LayoutError::shape(
                    path,
                    desc.type_name(),
                    value.shape_name(),
                ));
            }
            for (i, s) in components.iter().enumerate() {
                match_kind(v.kind(), *s, &format!("{path}[{i}]"))?;
            }
            Ok(())
        }

        (Descriptor::Struct(s), Value::Struct(entries)) => {
            let mut seen = vec![false; s.fields().len()];
            for (name, child) in entries {
                let child_path = format!("{path}.{name}");
                let Some(index) = s.field_index(name) else {
                    return Err(LayoutError::shape(child_path, "no such field", child.shape_name()));
                };
                if std::mem::replace(&mut seen[index], true) {
                    return Err(LayoutError::shape(child_path, "one value", "duplicate entry"));
                }
                match_shape(&s.fields()[index].descriptor, child, &child_path)?;
            }
            if let Some(missing) = s.fields().iter().zip(&seen).find(|(_, seen)| !**seen) {
                return Err(LayoutError::shape(
                    format!("{path}.{}", missing.0.name),
                    missing.0.descriptor.type_name(),
                    "missing",
                ));
            }
            Ok(())
        }

        (Descriptor::Array(a), Value::Array(elements)) => {
            if elements.len() != a.count() {
                return Err(LayoutError::shape(path, desc.type_name(), value.shape_name()));
            }
            for (i, child) in elements.iter().enumerate() {
                match_shape(a.element(), child, &format!("{path}[{i}]"))?;
            }
            Ok(())
        }

        _ => Err(LayoutError::shape(path, desc.type_name(), value.shape_name())),
    }
}

fn match_kind(expected: ScalarKind, found: ScalarValue, path: &str) -> Result<()> {
    if found.kind() == expected {
        Ok(())
    } else {
        Err(LayoutError::shape(path, expected.name(), found.kind().name()))
    }
}

// ── encode / decode ───────────────────────────────────────────────────────

/// Writes a tree that already passed [`match_shape`] into `bytes` (sized to `desc`).
pub(crate) fn encode(desc: &Descriptor, value: &Value, bytes: &mut [u8]) {
    match (desc, value) {
        (Descriptor::Scalar(_), Value::Scalar(s)) => s.encode(bytes),
        (Descriptor::Vector(v), Value::Vector(components)) => {
            let size = v.kind().size();
            for (chunk, s) in bytes.chunks_exact_mut(size).zip(components) {
                s.encode(chunk);
            }
        }
        (Descriptor::Struct(s), Value::Struct(entries)) => {
            for (name, child) in entries {
                if let Some(f) = s.field(name) {
                    encode(&f.descriptor, child, &mut bytes[f.offset..f.end()]);
                }
            }
        }
        (Descriptor::Array(a), Value::Array(elements)) => {
            let size = a.element().byte_size();
            for (i, child) in elements.iter().enumerate() {
                let start = i * a.stride();
                encode(a.element(), child, &mut bytes[start..start + size]);
            }
        }
        _ => log::warn!("encode called on a value that does not match {}", desc.type_name()),
    }
}

/// Reads the full value tree described by `desc` from `bytes`.
pub(crate) fn decode(desc: &Descriptor, bytes: &[u8]) -> Value {
    match desc {
        Descriptor::Scalar(kind) => Value::Scalar(ScalarValue::decode(*kind, bytes)),
        Descriptor::Vector(v) => Value::Vector(
            bytes
                .chunks_exact(v.kind().size())
                .take(v.arity())
                .map(|chunk| ScalarValue::decode(v.kind(), chunk))
                .collect(),
        ),
        Descriptor::Struct(s) => Value::Struct(
            s.fields()
                .iter()
                .map(|f| (f.name.clone(), decode(&f.descriptor, &bytes[f.offset..f.end()])))
                .collect(),
        ),
        Descriptor::Array(a) => Value::Array(
            (0..a.count())
                .map(|i| {
                    let start = i * a.stride();
                    decode(a.element(), &bytes[start..start + a.element().byte_size()])
                })
                .collect(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LayoutPolicy;
    use ScalarKind::*;

    fn light(p: &LayoutPolicy) -> Descriptor {
        p.struct_of([("pos", p.vector(F32, 3).unwrap()), ("id", p.scalar(U32))])
            .unwrap()
    }

    fn light_value(id: u32) -> Value {
        Value::record([("pos", Value::vector([1.0f32, 2.0, 3.0])), ("id", Value::from(id))])
    }

    #[test]
    fn matching_tree_accepted() {
        let p = LayoutPolicy::gpu();
        let d = p.array_of(light(&p), 2).unwrap();
        let v = Value::array([light_value(1), light_value(2)]);
        match_shape(&d, &v, "value").unwrap();
    }

    #[test]
    fn field_order_is_free() {
        let p = LayoutPolicy::gpu();
        let v = Value::record([("id", Value::from(9u32)), ("pos", Value::vector([0.0f32; 3]))]);
        match_shape(&light(&p), &v, "value").unwrap();
    }

    #[test]
    fn wrong_scalar_kind_names_path() {
        let p = LayoutPolicy::gpu();
        let v = Value::record([
            ("pos", Value::vector([1.0f32, 2.0, 3.0])),
            ("id", Value::from(1.0f32)),
        ]);
        let err = match_shape(&light(&p), &v, "value").unwrap_err();
        assert_eq!(err, LayoutError::shape("value.id", "u32", "f32"));
    }

    #[test]
    fn missing_field_rejected() {
        let p = LayoutPolicy::gpu();
        let v = Value::record([("pos", Value::vector([1.0f32, 2.0, 3.0]))]);
        let err = match_shape(&light(&p), &v, "value").unwrap_err();
        assert_eq!(err, LayoutError::shape("value.id", "u32", "missing"));
    }

    #[test]
    fn extra_and_duplicate_fields_rejected() {
        let p = LayoutPolicy::gpu();
        let extra = Value::record([
            ("pos", Value::vector([1.0f32, 2.0, 3.0])),
            ("id", Value::from(1u32)),
            ("radius", Value::from(1.0f32)),
        ]);
        assert!(matches!(
            match_shape(&light(&p), &extra, "value"),
            Err(LayoutError::ShapeMismatch { path, .. }) if path == "value.radius"
        ));

        let dup = Value::record([
            ("id", Value::from(1u32)),
            ("id", Value::from(2u32)),
            ("pos", Value::vector([1.0f32, 2.0, 3.0])),
        ]);
        assert!(matches!(
            match_shape(&light(&p), &dup, "value"),
            Err(LayoutError::ShapeMismatch { found, .. }) if found == "duplicate entry"
        ));
    }

    #[test]
    fn array_length_and_vector_arity_checked() {
        let p = LayoutPolicy::gpu();
        let d = p.array_of(light(&p), 2).unwrap();
        assert!(match_shape(&d, &Value::array([light_value(1)]), "value").is_err());

        let short = Value::record([
            ("pos", Value::vector([1.0f32, 2.0])),
            ("id", Value::from(1u32)),
        ]);
        let err = match_shape(&light(&p), &short, "value").unwrap_err();
        assert_eq!(err, LayoutError::shape("value.pos", "vec3<f32>", "vector of 2 components"));
    }

    #[test]
    fn encode_then_decode() {
        let p = LayoutPolicy::gpu();
        let d = p.array_of(light(&p), 2).unwrap();
        let v = Value::array([light_value(7), light_value(8)]);
        let mut bytes = vec![0u8; d.byte_size()];
        encode(&d, &v, &mut bytes);
        assert_eq!(decode(&d, &bytes), v);
    }

    #[test]
    fn display_is_compact() {
        let v = light_value(3);
        assert_eq!(v.to_string(), "{ pos: (1, 2, 3), id: 3u }");
    }
}
