//! Boundary between the dispatch engine and a graphics API.
//!
//! Types:
//!
//! - `RenderBackend` is the set of calls the engine issues while walking a
//!   dispatch plan. Handles are opaque ids chosen by the backend.
//! - `Capabilities` describes what the driver supports; the registry uses it
//!   to gate features.
//! - `RecordingBackend` records every call as a [`Command`], which is what the
//!   CLI prints and what the tests assert against.

use std::collections::{BTreeMap, BTreeSet};

use fx::{BlendState, ProgramDesc, TextureTemplate, UniformUpload, UniformValue};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TextureId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct FramebufferId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ProgramId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Capabilities {
    /// Highest GLSL version the driver compiles, e.g. `330`.
    pub glsl_version: u32,
    pub uniform_buffers: bool,
    pub framebuffers: bool,
    pub multisample_renderbuffers: bool,
    pub float_depth_buffer: bool,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            glsl_version: 330,
            uniform_buffers: true,
            framebuffers: true,
            multisample_renderbuffers: true,
            float_depth_buffer: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TextureSource {
    Blank { width: u32, height: u32 },
    /// Image file resolved by the backend.
    Image(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextureDesc {
    pub label: String,
    pub source: TextureSource,
    pub template: TextureTemplate,
    pub mip_levels: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Attachment {
    Texture(TextureId),
    /// Multisampled renderbuffer with the format of the template.
    Renderbuffer {
        width: u32,
        height: u32,
        template: TextureTemplate,
        samples: u32,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FramebufferDesc {
    pub label: String,
    pub color: Option<Attachment>,
    pub depth: Option<Attachment>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    #[error("failed to build program '{label}': {message}")]
    Program { label: String, message: String },
}

/// Calls issued by the engine. `None` as a framebuffer means the default
/// framebuffer.
pub trait RenderBackend {
    fn capabilities(&self) -> Capabilities;

    fn create_texture(&mut self, desc: &TextureDesc) -> TextureId;

    fn create_framebuffer(&mut self, desc: &FramebufferDesc) -> FramebufferId;

    fn create_program(&mut self, desc: &ProgramDesc) -> Result<ProgramId, BackendError>;

    /// Pass-through program used when a technique program fails to build.
    fn fallback_program(&mut self) -> ProgramId;

    fn bind_framebuffer(&mut self, framebuffer: Option<FramebufferId>);

    fn set_viewport(&mut self, width: u32, height: u32);

    fn clear(&mut self, color: [f32; 4]);

    fn blit_to_default(&mut self, source: FramebufferId, width: u32, height: u32);

    fn bind_texture(&mut self, unit: u32, texture: TextureId);

    fn generate_mipmap(&mut self, texture: TextureId);

    fn use_program(&mut self, program: ProgramId);

    fn set_blend(&mut self, blend: Option<BlendState>);

    fn upload_uniform_block(&mut self, upload: &UniformUpload);

    fn set_sampler(&mut self, name: &str, unit: u32);

    fn set_uniform(&mut self, name: &str, value: UniformValue);

    fn draw_fullscreen(&mut self);

    fn dispatch_compute(&mut self, width: u32, height: u32);
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Command {
    CreateTexture { id: TextureId, desc: TextureDesc },
    CreateFramebuffer { id: FramebufferId, desc: FramebufferDesc },
    CreateProgram { id: ProgramId, label: String },
    ProgramFailed { label: String },
    BindFramebuffer { framebuffer: Option<FramebufferId> },
    Viewport { width: u32, height: u32 },
    Clear { color: [f32; 4] },
    BlitToDefault { source: FramebufferId, width: u32, height: u32 },
    BindTexture { unit: u32, texture: TextureId },
    GenerateMipmap { texture: TextureId },
    UseProgram { program: ProgramId },
    Blend { state: Option<BlendState> },
    UploadBlock { bytes: usize },
    UploadUniforms { count: usize },
    Sampler { name: String, unit: u32 },
    Uniform { name: String, value: UniformValue },
    Draw,
    Dispatch { width: u32, height: u32 },
}

/// Backend that performs no GPU work and records the calls it receives.
#[derive(Debug, Default)]
pub struct RecordingBackend {
    capabilities: Capabilities,
    commands: Vec<Command>,
    textures: BTreeMap<TextureId, TextureDesc>,
    programs: BTreeMap<ProgramId, String>,
    failing_programs: BTreeSet<String>,
    fallback: Option<ProgramId>,
    next_id: u32,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capabilities(capabilities: Capabilities) -> Self {
        Self {
            capabilities,
            ..Self::default()
        }
    }

    /// Programs with this label will fail to build.
    pub fn fail_program(&mut self, label: impl Into<String>) {
        self.failing_programs.insert(label.into());
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn take_commands(&mut self) -> Vec<Command> {
        std::mem::take(&mut self.commands)
    }

    pub fn texture(&self, id: TextureId) -> Option<&TextureDesc> {
        self.textures.get(&id)
    }

    pub fn program_label(&self, id: ProgramId) -> Option<&str> {
        self.programs.get(&id).map(String::as_str)
    }

    pub fn draw_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, Command::Draw | Command::Dispatch { .. }))
            .count()
    }

    fn allocate(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }
}

impl RenderBackend for RecordingBackend {
    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    fn create_texture(&mut self, desc: &TextureDesc) -> TextureId {
        let id = TextureId(self.allocate());
        self.textures.insert(id, desc.clone());
        self.commands.push(Command::CreateTexture {
            id,
            desc: desc.clone(),
        });
        id
    }

    fn create_framebuffer(&mut self, desc: &FramebufferDesc) -> FramebufferId {
        let id = FramebufferId(self.allocate());
        self.commands.push(Command::CreateFramebuffer {
            id,
            desc: desc.clone(),
        });
        id
    }

    fn create_program(&mut self, desc: &ProgramDesc) -> Result<ProgramId, BackendError> {
        if self.failing_programs.contains(&desc.label) {
            self.commands.push(Command::ProgramFailed {
                label: desc.label.clone(),
            });
            return Err(BackendError::Program {
                label: desc.label.clone(),
                message: "rejected by recording backend".into(),
            });
        }
        let id = ProgramId(self.allocate());
        self.programs.insert(id, desc.label.clone());
        self.commands.push(Command::CreateProgram {
            id,
            label: desc.label.clone(),
        });
        Ok(id)
    }

    fn fallback_program(&mut self) -> ProgramId {
        if let Some(id) = self.fallback {
            return id;
        }
        let id = ProgramId(self.allocate());
        self.programs.insert(id, "fallback".into());
        self.commands.push(Command::CreateProgram {
            id,
            label: "fallback".into(),
        });
        self.fallback = Some(id);
        id
    }

    fn bind_framebuffer(&mut self, framebuffer: Option<FramebufferId>) {
        self.commands.push(Command::BindFramebuffer { framebuffer });
    }

    fn set_viewport(&mut self, width: u32, height: u32) {
        self.commands.push(Command::Viewport { width, height });
    }

    fn clear(&mut self, color: [f32; 4]) {
        self.commands.push(Command::Clear { color });
    }

    fn blit_to_default(&mut self, source: FramebufferId, width: u32, height: u32) {
        self.commands.push(Command::BlitToDefault {
            source,
            width,
            height,
        });
    }

    fn bind_texture(&mut self, unit: u32, texture: TextureId) {
        self.commands.push(Command::BindTexture { unit, texture });
    }

    fn generate_mipmap(&mut self, texture: TextureId) {
        self.commands.push(Command::GenerateMipmap { texture });
    }

    fn use_program(&mut self, program: ProgramId) {
        self.commands.push(Command::UseProgram { program });
    }

    fn set_blend(&mut self, state: Option<BlendState>) {
        self.commands.push(Command::Blend { state });
    }

    fn upload_uniform_block(&mut self, upload: &UniformUpload) {
        let command = match upload {
            UniformUpload::Block(bytes) => Command::UploadBlock { bytes: bytes.len() },
            UniformUpload::Individual(values) => Command::UploadUniforms {
                count: values.len(),
            },
        };
        self.commands.push(command);
    }

    fn set_sampler(&mut self, name: &str, unit: u32) {
        self.commands.push(Command::Sampler {
            name: name.to_owned(),
            unit,
        });
    }

    fn set_uniform(&mut self, name: &str, value: UniformValue) {
        self.commands.push(Command::Uniform {
            name: name.to_owned(),
            value,
        });
    }

    fn draw_fullscreen(&mut self) {
        self.commands.push(Command::Draw);
    }

    fn dispatch_compute(&mut self, width: u32, height: u32) {
        self.commands.push(Command::Dispatch { width, height });
    }
}
