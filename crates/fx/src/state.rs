//! The engine-provided uniform block (`omw.*`) shared by every pass.

use std::sync::OnceLock;

use glam::{Mat4, Vec2, Vec3, Vec4};

use crate::error::Std140Error;
use crate::std140::{LayoutBuilder, Std140Layout, Std140Type, Std140Value};

pub const UNIFORM_BLOCK_STRUCT: &str = "_omw_data";
pub const UNIFORM_BLOCK_NAME: &str = "_data";
pub const UNIFORM_BLOCK_INSTANCE: &str = "omw";
pub const UNIFORM_BLOCK_BINDING: u32 = 0;

const FIELDS: &[(&str, Std140Type)] = &[
    ("projectionMatrix", Std140Type::Mat4),
    ("invProjectionMatrix", Std140Type::Mat4),
    ("viewMatrix", Std140Type::Mat4),
    ("prevViewMatrix", Std140Type::Mat4),
    ("invViewMatrix", Std140Type::Mat4),
    ("eyePos", Std140Type::Vec4),
    ("eyeVec", Std140Type::Vec4),
    ("fogColor", Std140Type::Vec4),
    ("sunColor", Std140Type::Vec4),
    ("sunPos", Std140Type::Vec4),
    ("resolution", Std140Type::Vec2),
    ("rcpResolution", Std140Type::Vec2),
    ("fogNear", Std140Type::Float),
    ("fogFar", Std140Type::Float),
    ("near", Std140Type::Float),
    ("far", Std140Type::Float),
    ("fov", Std140Type::Float),
    ("gameHour", Std140Type::Float),
    ("sunVis", Std140Type::Float),
    ("waterHeight", Std140Type::Float),
    ("isUnderwater", Std140Type::Bool),
    ("isInterior", Std140Type::Bool),
    ("simulationTime", Std140Type::Float),
    ("deltaSimulationTime", Std140Type::Float),
];

/// Layout of the shared block, built once from the field table.
pub fn uniform_block_layout() -> &'static Std140Layout {
    static LAYOUT: OnceLock<Std140Layout> = OnceLock::new();
    LAYOUT.get_or_init(|| {
        FIELDS
            .iter()
            .fold(LayoutBuilder::new(), |builder, (name, ty)| {
                builder.field(*name, *ty)
            })
            .build()
    })
}

/// GLSL declaration of the block struct and its binding.
pub fn uniform_block_glsl(use_ubo: bool) -> String {
    let definition = uniform_block_layout().definition(UNIFORM_BLOCK_STRUCT);
    let binding = if use_ubo {
        format!(
            "layout(std140) uniform {UNIFORM_BLOCK_NAME} {{ {UNIFORM_BLOCK_STRUCT} {UNIFORM_BLOCK_INSTANCE}; }};"
        )
    } else {
        format!("uniform {UNIFORM_BLOCK_STRUCT} {UNIFORM_BLOCK_INSTANCE};")
    };
    format!("{definition}\n\n{binding}")
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UniformData {
    pub projection_matrix: Mat4,
    pub inv_projection_matrix: Mat4,
    pub view_matrix: Mat4,
    pub prev_view_matrix: Mat4,
    pub inv_view_matrix: Mat4,
    pub eye_pos: Vec4,
    pub eye_vec: Vec4,
    pub fog_color: Vec4,
    pub sun_color: Vec4,
    pub sun_pos: Vec4,
    pub resolution: Vec2,
    pub rcp_resolution: Vec2,
    pub fog_near: f32,
    pub fog_far: f32,
    pub near: f32,
    pub far: f32,
    pub fov: f32,
    pub game_hour: f32,
    pub sun_vis: f32,
    pub water_height: f32,
    pub is_underwater: bool,
    pub is_interior: bool,
    pub simulation_time: f32,
    pub delta_simulation_time: f32,
}

impl Default for UniformData {
    fn default() -> Self {
        Self {
            projection_matrix: Mat4::IDENTITY,
            inv_projection_matrix: Mat4::IDENTITY,
            view_matrix: Mat4::IDENTITY,
            prev_view_matrix: Mat4::IDENTITY,
            inv_view_matrix: Mat4::IDENTITY,
            eye_pos: Vec4::W,
            eye_vec: Vec4::ZERO,
            fog_color: Vec4::ZERO,
            sun_color: Vec4::ZERO,
            sun_pos: Vec4::ZERO,
            resolution: Vec2::ONE,
            rcp_resolution: Vec2::ONE,
            fog_near: 0.0,
            fog_far: 0.0,
            near: 0.0,
            far: 0.0,
            fov: 0.0,
            game_hour: 0.0,
            sun_vis: 0.0,
            water_height: 0.0,
            is_underwater: false,
            is_interior: false,
            simulation_time: 0.0,
            delta_simulation_time: 0.0,
        }
    }
}

impl UniformData {
    /// Values in block field order.
    pub fn values(&self) -> [Std140Value; 24] {
        [
            Std140Value::Mat4(self.projection_matrix),
            Std140Value::Mat4(self.inv_projection_matrix),
            Std140Value::Mat4(self.view_matrix),
            Std140Value::Mat4(self.prev_view_matrix),
            Std140Value::Mat4(self.inv_view_matrix),
            Std140Value::Vec4(self.eye_pos),
            Std140Value::Vec4(self.eye_vec),
            Std140Value::Vec4(self.fog_color),
            Std140Value::Vec4(self.sun_color),
            Std140Value::Vec4(self.sun_pos),
            Std140Value::Vec2(self.resolution),
            Std140Value::Vec2(self.rcp_resolution),
            Std140Value::Float(self.fog_near),
            Std140Value::Float(self.fog_far),
            Std140Value::Float(self.near),
            Std140Value::Float(self.far),
            Std140Value::Float(self.fov),
            Std140Value::Float(self.game_hour),
            Std140Value::Float(self.sun_vis),
            Std140Value::Float(self.water_height),
            Std140Value::Bool(self.is_underwater),
            Std140Value::Bool(self.is_interior),
            Std140Value::Float(self.simulation_time),
            Std140Value::Float(self.delta_simulation_time),
        ]
    }
}

/// How the block reaches the GPU.
#[derive(Debug, Clone, PartialEq)]
pub enum UniformUpload {
    Block(Vec<u8>),
    Individual(Vec<(String, Std140Value)>),
}

/// Owns the per-frame values of the shared uniform block.
#[derive(Debug, Clone)]
pub struct StateUpdater {
    data: UniformData,
    use_ubo: bool,
}

impl StateUpdater {
    pub fn new(use_ubo: bool) -> Self {
        Self {
            data: UniformData::default(),
            use_ubo,
        }
    }

    pub fn data(&self) -> &UniformData {
        &self.data
    }

    pub fn uses_ubo(&self) -> bool {
        self.use_ubo
    }

    pub fn set_projection_matrix(&mut self, projection: Mat4) {
        self.data.projection_matrix = projection;
        self.data.inv_projection_matrix = projection.inverse();
    }

    pub fn set_view_matrix(&mut self, view: Mat4) {
        self.data.view_matrix = view;
        self.data.inv_view_matrix = view.inverse();
    }

    pub fn set_prev_view_matrix(&mut self, view: Mat4) {
        self.data.prev_view_matrix = view;
    }

    pub fn set_eye_pos(&mut self, pos: Vec3) {
        self.data.eye_pos = pos.extend(1.0);
    }

    pub fn set_eye_vec(&mut self, dir: Vec3) {
        self.data.eye_vec = dir.extend(0.0);
    }

    pub fn set_fog_color(&mut self, color: Vec4) {
        self.data.fog_color = color;
    }

    pub fn set_fog_range(&mut self, near: f32, far: f32) {
        self.data.fog_near = near;
        self.data.fog_far = far;
    }

    pub fn set_sun_color(&mut self, color: Vec4) {
        self.data.sun_color = color;
    }

    /// At night the sun is below the horizon, which shaders detect through
    /// a negative z.
    pub fn set_sun_pos(&mut self, pos: Vec4, night: bool) {
        self.data.sun_pos = pos;
        if night {
            self.data.sun_pos.z = -self.data.sun_pos.z;
        }
    }

    pub fn set_sun_vis(&mut self, visibility: f32) {
        self.data.sun_vis = visibility;
        if visibility <= 0.0 {
            self.data.sun_pos.z = -self.data.sun_pos.z.abs();
        }
    }

    pub fn set_resolution(&mut self, resolution: Vec2) {
        self.data.resolution = resolution;
        self.data.rcp_resolution = resolution.max(Vec2::ONE).recip();
    }

    pub fn set_near_far(&mut self, near: f32, far: f32) {
        self.data.near = near;
        self.data.far = far;
    }

    pub fn set_fov(&mut self, fov: f32) {
        self.data.fov = fov;
    }

    /// Stored normalised to `[0, 1)` over a 24 hour day.
    pub fn set_game_hour(&mut self, hour: f32) {
        self.data.game_hour = hour / 24.0;
    }

    pub fn set_water_height(&mut self, height: f32) {
        self.data.water_height = height;
    }

    pub fn set_is_underwater(&mut self, underwater: bool) {
        self.data.is_underwater = underwater;
    }

    pub fn set_is_interior(&mut self, interior: bool) {
        self.data.is_interior = interior;
    }

    pub fn set_simulation_time(&mut self, time: f32, delta: f32) {
        self.data.simulation_time = time;
        self.data.delta_simulation_time = delta;
    }

    pub fn pack(&self) -> Result<Vec<u8>, Std140Error> {
        uniform_block_layout().pack(&self.data.values())
    }

    /// Per-field uniforms (`omw.<field>`) for drivers without UBOs.
    pub fn individual_uniforms(&self) -> Vec<(String, Std140Value)> {
        uniform_block_layout()
            .fields()
            .iter()
            .zip(self.data.values())
            .map(|(field, value)| (format!("{UNIFORM_BLOCK_INSTANCE}.{}", field.name), value))
            .collect()
    }

    pub fn upload(&self) -> Result<UniformUpload, Std140Error> {
        if self.use_ubo {
            self.pack().map(UniformUpload::Block)
        } else {
            Ok(UniformUpload::Individual(self.individual_uniforms()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_offsets_follow_std140() {
        let expected = [
            ("projectionMatrix", 0),
            ("invProjectionMatrix", 64),
            ("viewMatrix", 128),
            ("prevViewMatrix", 192),
            ("invViewMatrix", 256),
            ("eyePos", 320),
            ("eyeVec", 336),
            ("fogColor", 352),
            ("sunColor", 368),
            ("sunPos", 384),
            ("resolution", 400),
            ("rcpResolution", 408),
            ("fogNear", 416),
            ("fogFar", 420),
            ("near", 424),
            ("far", 428),
            ("fov", 432),
            ("gameHour", 436),
            ("sunVis", 440),
            ("waterHeight", 444),
            ("isUnderwater", 448),
            ("isInterior", 452),
            ("simulationTime", 456),
            ("deltaSimulationTime", 460),
        ];
        let layout = uniform_block_layout();
        assert_eq!(layout.fields().len(), expected.len());
        for (field, (name, offset)) in layout.fields().iter().zip(expected) {
            assert_eq!(field.name, name);
            assert_eq!(field.offset, offset, "offset of {name}");
        }
        assert_eq!(layout.size(), 464);
    }

    #[test]
    fn values_match_field_types() {
        let values = UniformData::default().values();
        for (field, value) in uniform_block_layout().fields().iter().zip(values.iter()) {
            assert_eq!(field.ty, value.ty(), "type of {}", field.name);
        }
    }

    #[test]
    fn packs_resolution_and_reciprocal() {
        let mut state = StateUpdater::new(true);
        state.set_resolution(Vec2::new(800.0, 400.0));
        let bytes = state.pack().expect("pack");
        assert_eq!(bytes.len(), 464);
        assert_eq!(&bytes[400..404], &800.0_f32.to_ne_bytes());
        assert_eq!(&bytes[412..416], &(1.0_f32 / 400.0).to_ne_bytes());
    }

    #[test]
    fn view_matrix_updates_inverse() {
        let mut state = StateUpdater::new(true);
        let view = Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0));
        state.set_view_matrix(view);
        let roundtrip = state.data().inv_view_matrix * view;
        assert!(roundtrip.abs_diff_eq(Mat4::IDENTITY, 1e-6));
    }

    #[test]
    fn game_hour_is_normalised() {
        let mut state = StateUpdater::new(false);
        state.set_game_hour(12.0);
        assert_eq!(state.data().game_hour, 0.5);
    }

    #[test]
    fn invisible_sun_sits_below_horizon() {
        let mut state = StateUpdater::new(false);
        state.set_sun_pos(Vec4::new(0.0, 0.0, 5.0, 0.0), false);
        state.set_sun_vis(0.0);
        assert_eq!(state.data().sun_pos.z, -5.0);
        state.set_sun_vis(0.0);
        assert_eq!(state.data().sun_pos.z, -5.0);
    }

    #[test]
    fn fallback_uses_prefixed_names() {
        let state = StateUpdater::new(false);
        let UniformUpload::Individual(uniforms) = state.upload().unwrap() else {
            panic!("expected individual uniforms");
        };
        assert_eq!(uniforms[0].0, "omw.projectionMatrix");
        assert_eq!(uniforms[4].0, "omw.invViewMatrix");
        assert_eq!(uniforms.len(), 24);
    }

    #[test]
    fn block_glsl_declares_binding() {
        let ubo = uniform_block_glsl(true);
        assert!(ubo.starts_with("struct _omw_data {\n    mat4 projectionMatrix;"));
        assert!(ubo.ends_with("layout(std140) uniform _data { _omw_data omw; };"));
        assert!(uniform_block_glsl(false).ends_with("uniform _omw_data omw;"));
    }
}
