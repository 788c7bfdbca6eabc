//! Technique compiler for `.omwfx` post-processing files.
//!
//! The crate turns technique text into passes whose GLSL is ready to hand to
//! a graphics backend:
//!
//! ```text
//!   SourceProvider ──▶ Lexer ──▶ Technique::compile ──▶ Pass::compile
//!   (library/memory)     │            │                      │
//!                        │            ├─ uniforms (seeded     └─▶ header + shared
//!                        │            │  from ShaderSettings)      + body per stage
//!                        └─ tokens    └─ render targets, samplers
//! ```
//!
//! `StateUpdater` owns the engine-provided `omw` uniform block; its layout is
//! computed by the explicit std140 builder in [`std140`] so that the GLSL
//! declaration, the packed byte buffer and the per-field fallback never drift
//! apart.

pub mod error;
pub mod lexer;
pub mod pass;
pub mod source;
pub mod state;
pub mod std140;
pub mod technique;
pub mod types;
pub mod uniform;

pub use error::{LexerError, PassError, Std140Error, TechniqueError, UniformError};
pub use lexer::{JumpBlock, Lexer, Token};
pub use pass::{Pass, PassState, PassType, ProgramDesc, ShaderStage, StageSource};
pub use source::{
    technique_file_name, MemorySource, SourceProvider, TechniqueFile, TechniqueLibrary,
};
pub use state::{StateUpdater, UniformData, UniformUpload};
pub use std140::{LayoutBuilder, Std140Layout, Std140Type, Std140Value};
pub use technique::{CompileOptions, Status, Technique, MAIN_TECHNIQUE};
pub use types::{
    BlendEquation, BlendFunc, BlendState, FilterMode, InternalFormat, RenderTarget, Sampler,
    SamplerType, SizeProxy, SourceFormat, SourceType, TechniqueFlags, TextureTemplate, WrapMode,
};
pub use uniform::{UniformBase, UniformKind, UniformType, UniformValue, ValueUniform};
