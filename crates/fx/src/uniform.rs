use std::fmt;

use fxconfig::{SettingValue, SettingsMode, ShaderSettings};
use glam::{Vec2, Vec3, Vec4};
use serde::Serialize;

use crate::error::UniformError;
use crate::types::SamplerType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UniformType {
    Bool,
    Int,
    Float,
    Vec2,
    Vec3,
    Vec4,
}

impl UniformType {
    pub const fn glsl_name(self) -> &'static str {
        match self {
            UniformType::Bool => "bool",
            UniformType::Int => "int",
            UniformType::Float => "float",
            UniformType::Vec2 => "vec2",
            UniformType::Vec3 => "vec3",
            UniformType::Vec4 => "vec4",
        }
    }

    pub const fn block_name(self) -> &'static str {
        match self {
            UniformType::Bool => "uniform_bool",
            UniformType::Int => "uniform_int",
            UniformType::Float => "uniform_float",
            UniformType::Vec2 => "uniform_vec2",
            UniformType::Vec3 => "uniform_vec3",
            UniformType::Vec4 => "uniform_vec4",
        }
    }

    pub fn zero(self) -> UniformValue {
        match self {
            UniformType::Bool => UniformValue::Bool(false),
            UniformType::Int => UniformValue::Int(0),
            UniformType::Float => UniformValue::Float(0.0),
            UniformType::Vec2 => UniformValue::Vec2(Vec2::ZERO),
            UniformType::Vec3 => UniformValue::Vec3(Vec3::ZERO),
            UniformType::Vec4 => UniformValue::Vec4(Vec4::ZERO),
        }
    }
}

impl fmt::Display for UniformType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.glsl_name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum UniformValue {
    Bool(bool),
    Int(i32),
    Float(f32),
    Vec2(Vec2),
    Vec3(Vec3),
    Vec4(Vec4),
}

impl UniformValue {
    pub fn ty(&self) -> UniformType {
        match self {
            UniformValue::Bool(_) => UniformType::Bool,
            UniformValue::Int(_) => UniformType::Int,
            UniformValue::Float(_) => UniformType::Float,
            UniformValue::Vec2(_) => UniformType::Vec2,
            UniformValue::Vec3(_) => UniformType::Vec3,
            UniformValue::Vec4(_) => UniformType::Vec4,
        }
    }

    /// GLSL constant expression for this value.
    pub fn glsl_literal(&self) -> String {
        match self {
            UniformValue::Bool(v) => v.to_string(),
            UniformValue::Int(v) => v.to_string(),
            UniformValue::Float(v) => float_literal(*v),
            UniformValue::Vec2(v) => vector_literal("vec2", &v.to_array()),
            UniformValue::Vec3(v) => vector_literal("vec3", &v.to_array()),
            UniformValue::Vec4(v) => vector_literal("vec4", &v.to_array()),
        }
    }

    pub fn from_setting(ty: UniformType, value: &SettingValue) -> Option<Self> {
        use fxconfig::FromSettingValue;
        Some(match ty {
            UniformType::Bool => UniformValue::Bool(bool::from_setting(value)?),
            UniformType::Int => UniformValue::Int(i32::from_setting(value)?),
            UniformType::Float => UniformValue::Float(f32::from_setting(value)?),
            UniformType::Vec2 => UniformValue::Vec2(Vec2::from_array(<[f32; 2]>::from_setting(value)?)),
            UniformType::Vec3 => UniformValue::Vec3(Vec3::from_array(<[f32; 3]>::from_setting(value)?)),
            UniformType::Vec4 => UniformValue::Vec4(Vec4::from_array(<[f32; 4]>::from_setting(value)?)),
        })
    }

    pub fn to_setting(&self) -> SettingValue {
        match self {
            UniformValue::Bool(v) => SettingValue::from(*v),
            UniformValue::Int(v) => SettingValue::from(*v),
            UniformValue::Float(v) => SettingValue::from(*v),
            UniformValue::Vec2(v) => SettingValue::from(v.to_array()),
            UniformValue::Vec3(v) => SettingValue::from(v.to_array()),
            UniformValue::Vec4(v) => SettingValue::from(v.to_array()),
        }
    }
}

impl From<bool> for UniformValue {
    fn from(value: bool) -> Self {
        UniformValue::Bool(value)
    }
}

impl From<i32> for UniformValue {
    fn from(value: i32) -> Self {
        UniformValue::Int(value)
    }
}

impl From<f32> for UniformValue {
    fn from(value: f32) -> Self {
        UniformValue::Float(value)
    }
}

impl From<Vec2> for UniformValue {
    fn from(value: Vec2) -> Self {
        UniformValue::Vec2(value)
    }
}

impl From<Vec3> for UniformValue {
    fn from(value: Vec3) -> Self {
        UniformValue::Vec3(value)
    }
}

impl From<Vec4> for UniformValue {
    fn from(value: Vec4) -> Self {
        UniformValue::Vec4(value)
    }
}

fn float_literal(value: f32) -> String {
    // Debug formatting always keeps a decimal point or exponent.
    format!("{value:?}")
}

fn vector_literal(constructor: &str, components: &[f32]) -> String {
    let parts: Vec<String> = components.iter().map(|c| float_literal(*c)).collect();
    format!("{constructor}({})", parts.join(","))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValueUniform {
    pub default: UniformValue,
    pub min: Option<UniformValue>,
    pub max: Option<UniformValue>,
    value: Option<UniformValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum UniformKind {
    Sampler(SamplerType),
    Value(ValueUniform),
}

/// A user-declared uniform or sampler of a technique.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UniformBase {
    pub name: String,
    pub technique: String,
    pub description: Option<String>,
    pub header: Option<String>,
    pub is_static: bool,
    pub step: Option<f32>,
    pub kind: UniformKind,
}

impl UniformBase {
    pub fn sampler(technique: &str, name: &str, kind: SamplerType) -> Self {
        Self {
            name: name.to_owned(),
            technique: technique.to_owned(),
            description: None,
            header: None,
            is_static: false,
            step: None,
            kind: UniformKind::Sampler(kind),
        }
    }

    pub fn value(
        technique: &str,
        name: &str,
        default: UniformValue,
        min: Option<UniformValue>,
        max: Option<UniformValue>,
    ) -> Self {
        Self {
            name: name.to_owned(),
            technique: technique.to_owned(),
            description: None,
            header: None,
            is_static: false,
            step: None,
            kind: UniformKind::Value(ValueUniform {
                default,
                min,
                max,
                value: None,
            }),
        }
    }

    pub fn is_sampler(&self) -> bool {
        matches!(self.kind, UniformKind::Sampler(_))
    }

    pub fn uniform_type(&self) -> Option<UniformType> {
        match &self.kind {
            UniformKind::Value(v) => Some(v.default.ty()),
            UniformKind::Sampler(_) => None,
        }
    }

    /// The live value, falling back to the declared default.
    pub fn current(&self) -> Option<UniformValue> {
        match &self.kind {
            UniformKind::Value(v) => Some(v.value.unwrap_or(v.default)),
            UniformKind::Sampler(_) => None,
        }
    }

    pub fn set_value(&mut self, value: UniformValue) -> Result<(), UniformError> {
        let UniformKind::Value(uniform) = &mut self.kind else {
            return Err(UniformError::Sampler(self.name.clone()));
        };
        let expected = uniform.default.ty();
        if value.ty() != expected {
            return Err(UniformError::TypeMismatch {
                name: self.name.clone(),
                expected: expected.glsl_name(),
                actual: value.ty().glsl_name(),
            });
        }
        uniform.value = Some(value);
        Ok(())
    }

    pub fn reset(&mut self) {
        if let UniformKind::Value(uniform) = &mut self.kind {
            uniform.value = None;
        }
    }

    /// Applies the persisted override for this uniform, if one of the right
    /// shape exists.
    pub fn seed_from(&mut self, settings: &ShaderSettings) {
        let Some(ty) = self.uniform_type() else {
            return;
        };
        let Some(stored) = settings.get(&self.technique, &self.name) else {
            return;
        };
        match UniformValue::from_setting(ty, stored) {
            Some(value) => {
                let _ = self.set_value(value);
            }
            None => tracing::warn!(
                technique = %self.technique,
                uniform = %self.name,
                expected = %ty,
                "ignoring stored setting of the wrong type"
            ),
        }
    }

    /// GLSL declaration injected into every pass of the technique.
    ///
    /// Static uniforms are folded into constants except in debug mode, where
    /// they stay live so they can be tweaked without recompiling.
    pub fn glsl(&self, mode: SettingsMode) -> String {
        let declaration = match &self.kind {
            UniformKind::Sampler(kind) => format!("uniform {} {};", kind.glsl_name(), self.name),
            UniformKind::Value(uniform) => {
                let ty = uniform.default.ty().glsl_name();
                if self.is_static && mode == SettingsMode::Normal {
                    let value = uniform.value.unwrap_or(uniform.default);
                    format!("const {ty} {} = {};", self.name, value.glsl_literal())
                } else {
                    format!("uniform {ty} {};", self.name)
                }
            }
        };
        match &self.header {
            Some(header) => format!("{declaration}\n{header}"),
            None => declaration,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strength() -> UniformBase {
        UniformBase::value(
            "bloom",
            "strength",
            UniformValue::Float(0.5),
            Some(UniformValue::Float(0.0)),
            Some(UniformValue::Float(1.0)),
        )
    }

    #[test]
    fn current_falls_back_to_default() {
        let mut uniform = strength();
        assert_eq!(uniform.current(), Some(UniformValue::Float(0.5)));
        uniform.set_value(UniformValue::Float(0.8)).unwrap();
        assert_eq!(uniform.current(), Some(UniformValue::Float(0.8)));
        uniform.reset();
        assert_eq!(uniform.current(), Some(UniformValue::Float(0.5)));
    }

    #[test]
    fn rejects_values_of_another_type() {
        let mut uniform = strength();
        let err = uniform.set_value(UniformValue::Int(1)).unwrap_err();
        assert!(matches!(err, UniformError::TypeMismatch { .. }));
    }

    #[test]
    fn static_uniforms_become_constants_outside_debug_mode() {
        let mut uniform = strength();
        uniform.is_static = true;
        assert_eq!(
            uniform.glsl(SettingsMode::Normal),
            "const float strength = 0.5;"
        );
        assert_eq!(uniform.glsl(SettingsMode::Debug), "uniform float strength;");
    }

    #[test]
    fn vector_literals_are_valid_glsl() {
        let value = UniformValue::Vec3(Vec3::new(1.0, 0.25, -2.0));
        assert_eq!(value.glsl_literal(), "vec3(1.0,0.25,-2.0)");
    }

    #[test]
    fn seeds_from_settings() {
        let mut settings = ShaderSettings::new();
        settings.set_value("bloom", "strength", 0.9_f32);
        let mut uniform = strength();
        uniform.seed_from(&settings);
        assert_eq!(uniform.current(), Some(UniformValue::Float(0.9)));
    }

    #[test]
    fn samplers_declare_their_type() {
        let sampler = UniformBase::sampler("bloom", "noise", SamplerType::Sampler3D);
        assert_eq!(sampler.glsl(SettingsMode::Normal), "uniform sampler3D noise;");
        assert!(sampler.current().is_none());
    }
}
