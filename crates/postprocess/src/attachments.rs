//! Scene attachments owned by each frame slot.

use fx::{FilterMode, InternalFormat, SourceFormat, SourceType, TextureTemplate, WrapMode};

use crate::backend::{
    Attachment, FramebufferDesc, FramebufferId, RenderBackend, TextureDesc, TextureId,
    TextureSource,
};

/// Everything needed to (re)create the attachments of both slots.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AttachmentSpec {
    pub width: u32,
    pub height: u32,
    /// Format of the scene colour texture.
    pub main_template: TextureTemplate,
    pub depth_format: InternalFormat,
    pub samples: u32,
    /// Opaque depth copies are only needed by soft particles and the
    /// transparent depth post-pass.
    pub opaque_depth: bool,
}

impl AttachmentSpec {
    pub fn depth_template(&self) -> TextureTemplate {
        let floating = matches!(
            self.depth_format,
            InternalFormat::DepthComponent32f | InternalFormat::DepthComponent32
        );
        TextureTemplate {
            min_filter: FilterMode::Linear,
            mag_filter: FilterMode::Linear,
            wrap_s: WrapMode::ClampToEdge,
            wrap_t: WrapMode::ClampToEdge,
            wrap_r: WrapMode::ClampToEdge,
            internal_format: self.depth_format,
            source_type: if floating {
                SourceType::Float
            } else {
                SourceType::UnsignedInt24_8
            },
            source_format: SourceFormat::DepthStencil,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FrameAttachments {
    pub width: u32,
    pub height: u32,
    pub scene: TextureId,
    pub scene_ldr: TextureId,
    pub scene_ldr_template: TextureTemplate,
    pub depth: TextureId,
    pub opaque_depth: Option<TextureId>,
    pub primary: FramebufferId,
    pub multisample: Option<FramebufferId>,
    pub first_person: FramebufferId,
    pub opaque_depth_fbo: Option<FramebufferId>,
}

impl FrameAttachments {
    pub fn create(backend: &mut dyn RenderBackend, spec: &AttachmentSpec, slot: usize) -> Self {
        let (width, height) = (spec.width.max(1), spec.height.max(1));
        let ldr_template = TextureTemplate::scene();
        let label = |name: &str| format!("{name}[{slot}]");
        let scene = blank_texture(backend, label("scene"), width, height, spec.main_template);
        let scene_ldr = blank_texture(backend, label("scene_ldr"), width, height, ldr_template);
        let depth_template = spec.depth_template();
        let depth = blank_texture(backend, label("depth"), width, height, depth_template);
        let opaque_depth = spec.opaque_depth.then(|| {
            blank_texture(backend, label("opaque_depth"), width, height, depth_template)
        });

        let primary = backend.create_framebuffer(&FramebufferDesc {
            label: format!("primary[{slot}]"),
            color: Some(Attachment::Texture(scene)),
            depth: Some(Attachment::Texture(depth)),
        });

        let multisampled = |template: TextureTemplate| Attachment::Renderbuffer {
            width,
            height,
            template,
            samples: spec.samples,
        };

        let multisample = (spec.samples > 1).then(|| {
            backend.create_framebuffer(&FramebufferDesc {
                label: format!("multisample[{slot}]"),
                color: Some(multisampled(spec.main_template)),
                depth: Some(multisampled(depth_template)),
            })
        });

        let first_person_color = if spec.samples > 1 {
            multisampled(spec.main_template)
        } else {
            Attachment::Texture(scene)
        };
        let first_person = backend.create_framebuffer(&FramebufferDesc {
            label: format!("first_person[{slot}]"),
            color: Some(first_person_color),
            depth: Some(Attachment::Renderbuffer {
                width,
                height,
                template: depth_template,
                samples: if spec.samples > 1 { spec.samples } else { 0 },
            }),
        });

        let opaque_depth_fbo = opaque_depth.map(|texture| {
            backend.create_framebuffer(&FramebufferDesc {
                label: format!("opaque_depth[{slot}]"),
                color: None,
                depth: Some(Attachment::Texture(texture)),
            })
        });

        tracing::debug!(slot, width, height, samples = spec.samples, "created frame attachments");

        Self {
            width,
            height,
            scene,
            scene_ldr,
            scene_ldr_template: ldr_template,
            depth,
            opaque_depth,
            primary,
            multisample,
            first_person,
            opaque_depth_fbo,
        }
    }

    /// Framebuffer the scene is drawn into: the multisampled one when present.
    pub fn scene_framebuffer(&self) -> FramebufferId {
        self.multisample.unwrap_or(self.primary)
    }
}

pub(crate) fn blank_texture(
    backend: &mut dyn RenderBackend,
    label: String,
    width: u32,
    height: u32,
    template: TextureTemplate,
) -> TextureId {
    backend.create_texture(&TextureDesc {
        label,
        source: TextureSource::Blank { width, height },
        template,
        mip_levels: 1,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{Command, RecordingBackend};

    fn spec(samples: u32, opaque_depth: bool) -> AttachmentSpec {
        AttachmentSpec {
            width: 640,
            height: 480,
            main_template: TextureTemplate::scene(),
            depth_format: InternalFormat::DepthComponent24,
            samples,
            opaque_depth,
        }
    }

    #[test]
    fn single_sample_renders_into_primary() {
        let mut backend = RecordingBackend::new();
        let attachments = FrameAttachments::create(&mut backend, &spec(1, false), 0);
        assert!(attachments.multisample.is_none());
        assert!(attachments.opaque_depth.is_none());
        assert_eq!(attachments.scene_framebuffer(), attachments.primary);
        let depth = backend.texture(attachments.depth).expect("depth texture");
        assert_eq!(depth.template.source_type, SourceType::UnsignedInt24_8);
    }

    #[test]
    fn multisampling_adds_resolve_framebuffer() {
        let mut backend = RecordingBackend::new();
        let attachments = FrameAttachments::create(&mut backend, &spec(4, true), 1);
        let multisample = attachments.multisample.expect("multisample fbo");
        assert_eq!(attachments.scene_framebuffer(), multisample);
        assert!(attachments.opaque_depth_fbo.is_some());
        let framebuffers = backend
            .commands()
            .iter()
            .filter(|c| matches!(c, Command::CreateFramebuffer { .. }))
            .count();
        assert_eq!(framebuffers, 4);
    }

    #[test]
    fn float_depth_uses_float_source_type() {
        let mut spec = spec(1, false);
        spec.depth_format = InternalFormat::DepthComponent32f;
        assert_eq!(spec.depth_template().source_type, SourceType::Float);
    }
}
