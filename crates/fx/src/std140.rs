//! Explicit std140 layout builder.
//!
//! Offsets are computed from per-type size and alignment rules rather than
//! from the memory layout of a Rust struct, so one field list drives the
//! GLSL struct text, the packed byte buffer and the per-field fallback
//! uniforms.

use std::fmt::Write as _;

use glam::{Mat4, Vec2, Vec3, Vec4};
use serde::Serialize;

use crate::error::Std140Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Std140Type {
    Mat4,
    Vec4,
    Vec3,
    Vec2,
    Float,
    Int,
    UInt,
    Bool,
}

impl Std140Type {
    pub const fn size(self) -> usize {
        match self {
            Std140Type::Mat4 => 64,
            Std140Type::Vec4 => 16,
            Std140Type::Vec3 => 12,
            Std140Type::Vec2 => 8,
            Std140Type::Float | Std140Type::Int | Std140Type::UInt | Std140Type::Bool => 4,
        }
    }

    pub const fn align(self) -> usize {
        match self {
            Std140Type::Mat4 | Std140Type::Vec4 | Std140Type::Vec3 => 16,
            Std140Type::Vec2 => 8,
            Std140Type::Float | Std140Type::Int | Std140Type::UInt | Std140Type::Bool => 4,
        }
    }

    pub const fn glsl_name(self) -> &'static str {
        match self {
            Std140Type::Mat4 => "mat4",
            Std140Type::Vec4 => "vec4",
            Std140Type::Vec3 => "vec3",
            Std140Type::Vec2 => "vec2",
            Std140Type::Float => "float",
            Std140Type::Int => "int",
            Std140Type::UInt => "uint",
            Std140Type::Bool => "bool",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Std140Value {
    Mat4(Mat4),
    Vec4(Vec4),
    Vec3(Vec3),
    Vec2(Vec2),
    Float(f32),
    Int(i32),
    UInt(u32),
    Bool(bool),
}

impl Std140Value {
    pub fn ty(&self) -> Std140Type {
        match self {
            Std140Value::Mat4(_) => Std140Type::Mat4,
            Std140Value::Vec4(_) => Std140Type::Vec4,
            Std140Value::Vec3(_) => Std140Type::Vec3,
            Std140Value::Vec2(_) => Std140Type::Vec2,
            Std140Value::Float(_) => Std140Type::Float,
            Std140Value::Int(_) => Std140Type::Int,
            Std140Value::UInt(_) => Std140Type::UInt,
            Std140Value::Bool(_) => Std140Type::Bool,
        }
    }

    fn write(&self, out: &mut [u8]) {
        let bool_word;
        let bytes: &[u8] = match self {
            Std140Value::Mat4(v) => bytemuck::bytes_of(v),
            Std140Value::Vec4(v) => bytemuck::bytes_of(v),
            Std140Value::Vec3(v) => bytemuck::bytes_of(v),
            Std140Value::Vec2(v) => bytemuck::bytes_of(v),
            Std140Value::Float(v) => bytemuck::bytes_of(v),
            Std140Value::Int(v) => bytemuck::bytes_of(v),
            Std140Value::UInt(v) => bytemuck::bytes_of(v),
            Std140Value::Bool(v) => {
                bool_word = u32::from(*v);
                bytemuck::bytes_of(&bool_word)
            }
        };
        out[..bytes.len()].copy_from_slice(bytes);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Std140Field {
    pub name: String,
    pub ty: Std140Type,
    pub offset: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Std140Layout {
    fields: Vec<Std140Field>,
    size: usize,
}

#[derive(Debug, Default)]
pub struct LayoutBuilder {
    fields: Vec<Std140Field>,
    cursor: usize,
}

const fn round_up(value: usize, align: usize) -> usize {
    value.div_ceil(align) * align
}

impl LayoutBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: impl Into<String>, ty: Std140Type) -> Self {
        let offset = round_up(self.cursor, ty.align());
        self.cursor = offset + ty.size();
        self.fields.push(Std140Field {
            name: name.into(),
            ty,
            offset,
        });
        self
    }

    /// Finishes the layout; the block size is padded to a vec4 boundary.
    pub fn build(self) -> Std140Layout {
        Std140Layout {
            size: round_up(self.cursor, 16),
            fields: self.fields,
        }
    }
}

impl Std140Layout {
    pub fn fields(&self) -> &[Std140Field] {
        &self.fields
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn field(&self, name: &str) -> Option<&Std140Field> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// GLSL `struct` declaration matching the layout.
    pub fn definition(&self, struct_name: &str) -> String {
        let mut out = format!("struct {struct_name} {{\n");
        for field in &self.fields {
            let _ = writeln!(out, "    {} {};", field.ty.glsl_name(), field.name);
        }
        out.push_str("};");
        out
    }

    /// Packs `values`, given in field order, into a std140 buffer.
    pub fn pack(&self, values: &[Std140Value]) -> Result<Vec<u8>, Std140Error> {
        if values.len() != self.fields.len() {
            return Err(Std140Error::ValueCount {
                expected: self.fields.len(),
                actual: values.len(),
            });
        }
        let mut buffer = vec![0u8; self.size];
        for (field, value) in self.fields.iter().zip(values) {
            if value.ty() != field.ty {
                return Err(Std140Error::TypeMismatch {
                    field: field.name.clone(),
                    expected: field.ty.glsl_name(),
                });
            }
            value.write(&mut buffer[field.offset..]);
        }
        Ok(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offsets(layout: &Std140Layout) -> Vec<usize> {
        layout.fields().iter().map(|f| f.offset).collect()
    }

    #[test]
    fn scalar_packs_into_vec3_tail() {
        let layout = LayoutBuilder::new()
            .field("a", Std140Type::Vec3)
            .field("b", Std140Type::Float)
            .build();
        assert_eq!(offsets(&layout), vec![0, 12]);
        assert_eq!(layout.size(), 16);
    }

    #[test]
    fn vec3_after_scalar_is_realigned() {
        let layout = LayoutBuilder::new()
            .field("a", Std140Type::Float)
            .field("b", Std140Type::Vec3)
            .field("c", Std140Type::Vec2)
            .field("d", Std140Type::Mat4)
            .build();
        assert_eq!(offsets(&layout), vec![0, 16, 32, 48]);
        assert_eq!(layout.size(), 112);
    }

    #[test]
    fn vec2_aligns_to_eight() {
        let layout = LayoutBuilder::new()
            .field("a", Std140Type::Float)
            .field("b", Std140Type::Vec2)
            .field("c", Std140Type::Bool)
            .build();
        assert_eq!(offsets(&layout), vec![0, 8, 16]);
        assert_eq!(layout.size(), 32);
    }

    #[test]
    fn definition_lists_fields_in_order() {
        let layout = LayoutBuilder::new()
            .field("eye", Std140Type::Vec4)
            .field("near", Std140Type::Float)
            .build();
        assert_eq!(
            layout.definition("_data"),
            "struct _data {\n    vec4 eye;\n    float near;\n};"
        );
    }

    #[test]
    fn pack_writes_values_at_offsets() {
        let layout = LayoutBuilder::new()
            .field("a", Std140Type::Float)
            .field("b", Std140Type::Vec2)
            .field("c", Std140Type::Bool)
            .build();
        let bytes = layout
            .pack(&[
                Std140Value::Float(1.0),
                Std140Value::Vec2(Vec2::new(2.0, 3.0)),
                Std140Value::Bool(true),
            ])
            .expect("pack");
        assert_eq!(bytes.len(), 32);
        assert_eq!(&bytes[0..4], &1.0_f32.to_ne_bytes());
        assert_eq!(&bytes[8..12], &2.0_f32.to_ne_bytes());
        assert_eq!(&bytes[12..16], &3.0_f32.to_ne_bytes());
        assert_eq!(&bytes[16..20], &1_u32.to_ne_bytes());
    }

    #[test]
    fn pack_rejects_mismatched_values() {
        let layout = LayoutBuilder::new().field("a", Std140Type::Float).build();
        assert!(matches!(
            layout.pack(&[Std140Value::Int(1)]),
            Err(Std140Error::TypeMismatch { .. })
        ));
        assert!(matches!(
            layout.pack(&[]),
            Err(Std140Error::ValueCount { .. })
        ));
    }
}
