//! Runtime for `.omwfx` post-processing chains.
//!
//! The update side ([`PostProcessor`]) owns techniques and decides what runs;
//! the render side ([`PingPongCanvas`]) owns GPU resources and walks the
//! plan. They only meet through a channel:
//!
//! ```text
//!   PostProcessor::update ──FrameMessage──▶ PingPongCanvas::draw ──▶ RenderBackend
//!        ▲                                        ▲
//!   ShaderHandle (Action queue)            PingPongCull (per-view uniforms)
//! ```

pub mod actions;
pub mod attachments;
pub mod backend;
pub mod canvas;
pub mod cull;
pub mod dispatch;
pub mod frame;
pub mod hdr;
pub mod postprocessor;

pub use actions::{Action, ActionSender, ShaderHandle};
pub use attachments::{AttachmentSpec, FrameAttachments};
pub use backend::{
    Capabilities, Command, FramebufferId, ProgramId, RecordingBackend, RenderBackend, TextureId,
};
pub use canvas::{DrawOutcome, PingPongCanvas};
pub use cull::{PingPongCull, SceneTarget, ViewInfo};
pub use dispatch::{DispatchArray, DispatchNode, RenderTargetDesc, SubPass};
pub use frame::FrameMessage;
pub use hdr::HdrDriver;
pub use postprocessor::{PostProcessor, TechniqueId};
