//! Double-buffered execution of the dispatch plan.
//!
//! The canvas owns everything on the render side: frame attachments, the
//! three scratch buffers passes ping-pong between, lazily created programs
//! and render targets, and the HDR luminance chain. It learns about chain
//! changes only through the [`FrameMessage`] channel.

use std::collections::HashMap;

use crossbeam_channel::Receiver;
use fx::{Sampler, StateUpdater, TechniqueFlags, UniformUpload};
use serde::Serialize;

use crate::attachments::{blank_texture, AttachmentSpec, FrameAttachments};
use crate::backend::{
    Attachment, FramebufferDesc, FramebufferId, ProgramId, RenderBackend, TextureDesc, TextureId,
    TextureSource,
};
use crate::dispatch::{filter_nodes, DispatchArray, DispatchNode, RenderTargetDesc, SubPass};
use crate::frame::{slot_index, FrameMessage};
use crate::hdr::HdrDriver;

pub const UNIT_LAST_SHADER: u32 = 0;
pub const UNIT_LAST_PASS: u32 = 1;
pub const UNIT_DEPTH: u32 = 2;
pub const UNIT_EYE_ADAPTATION: u32 = 3;
/// First unit handed out to technique samplers and render targets.
pub const UNIT_NEXT_FREE: u32 = 4;

pub const SAMPLER_LAST_SHADER: &str = "omw_SamplerLastShader";
pub const SAMPLER_LAST_PASS: &str = "omw_SamplerLastPass";
pub const SAMPLER_DEPTH: &str = "omw_SamplerDepth";
pub const SAMPLER_EYE_ADAPTATION: &str = "omw_EyeAdaptation";

/// For each scratch buffer, the two buffers that may be written while it
/// holds the last shader output.
const BUFFERS: [[usize; 2]; 3] = [[1, 2], [0, 2], [0, 1]];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DrawOutcome {
    /// The chain ran and issued `passes` draws or dispatches.
    Rendered { passes: usize },
    /// No technique survived; the scene was blitted to the default
    /// framebuffer.
    Blit,
    /// Attachments have not been created yet.
    NoSurface,
}

#[derive(Debug, Default)]
struct FrameSlot {
    data: DispatchArray,
    next: Option<DispatchArray>,
    mask: TechniqueFlags,
    destination: Option<FramebufferId>,
    attachments: Option<FrameAttachments>,
    dirty: bool,
}

#[derive(Debug, Clone, Copy)]
struct Scratch {
    texture: TextureId,
    framebuffer: FramebufferId,
}

#[derive(Debug)]
struct TargetResource {
    desc: RenderTargetDesc,
    texture: TextureId,
    framebuffer: FramebufferId,
}

/// `(technique, resource name, generation)`
type ResourceKey = (String, String, u64);

#[derive(Debug, Default)]
struct ResourceCache {
    programs: HashMap<ResourceKey, ProgramId>,
    samplers: HashMap<ResourceKey, TextureId>,
    targets: HashMap<ResourceKey, TargetResource>,
}

impl ResourceCache {
    fn key(node: &DispatchNode, name: &str) -> ResourceKey {
        (node.technique.clone(), name.to_owned(), node.generation)
    }

    fn program(
        &mut self,
        backend: &mut dyn RenderBackend,
        node: &DispatchNode,
        pass: &SubPass,
    ) -> ProgramId {
        let key = Self::key(node, &pass.state.pass);
        if let Some(id) = self.programs.get(&key) {
            return *id;
        }
        let id = match backend.create_program(&pass.state.program) {
            Ok(id) => id,
            Err(err) => {
                tracing::error!(
                    technique = %node.technique,
                    pass = %pass.state.pass,
                    %err,
                    "failed to link pass program; using fallback"
                );
                backend.fallback_program()
            }
        };
        self.programs.insert(key, id);
        id
    }

    fn sampler(
        &mut self,
        backend: &mut dyn RenderBackend,
        node: &DispatchNode,
        sampler: &Sampler,
    ) -> TextureId {
        *self
            .samplers
            .entry(Self::key(node, &sampler.name))
            .or_insert_with(|| {
                backend.create_texture(&TextureDesc {
                    label: format!("{}/{}", node.technique, sampler.name),
                    source: TextureSource::Image(sampler.source.clone()),
                    template: sampler.template,
                    mip_levels: 1,
                })
            })
    }

    /// Render target textures are recreated when their size changes.
    fn render_target(
        &mut self,
        backend: &mut dyn RenderBackend,
        node: &DispatchNode,
        desc: &RenderTargetDesc,
    ) -> (TextureId, FramebufferId) {
        let key = Self::key(node, &desc.name);
        if let Some(existing) = self.targets.get(&key) {
            if existing.desc == *desc {
                return (existing.texture, existing.framebuffer);
            }
        }
        let label = format!("{}/{}", node.technique, desc.name);
        let texture = backend.create_texture(&TextureDesc {
            label: label.clone(),
            source: TextureSource::Blank {
                width: desc.width,
                height: desc.height,
            },
            template: desc.template,
            mip_levels: desc.mip_levels,
        });
        let framebuffer = backend.create_framebuffer(&FramebufferDesc {
            label,
            color: Some(Attachment::Texture(texture)),
            depth: None,
        });
        tracing::debug!(
            technique = %node.technique,
            target = %desc.name,
            width = desc.width,
            height = desc.height,
            "created render target"
        );
        self.targets.insert(
            key,
            TargetResource {
                desc: desc.clone(),
                texture,
                framebuffer,
            },
        );
        (texture, framebuffer)
    }
}

fn scratch_buffer(
    backend: &mut dyn RenderBackend,
    attachments: &FrameAttachments,
    index: usize,
) -> Scratch {
    let texture = blank_texture(
        backend,
        format!("pingpong[{index}]"),
        attachments.width,
        attachments.height,
        attachments.scene_ldr_template,
    );
    let framebuffer = backend.create_framebuffer(&FramebufferDesc {
        label: format!("pingpong[{index}]"),
        color: Some(Attachment::Texture(texture)),
        depth: None,
    });
    backend.bind_framebuffer(Some(framebuffer));
    backend.clear([0.0; 4]);
    Scratch {
        texture,
        framebuffer,
    }
}

/// Render-side half of the post-processor.
#[derive(Debug)]
pub struct PingPongCanvas {
    receiver: Receiver<FrameMessage>,
    slots: [FrameSlot; 2],
    pending_attachments: Option<AttachmentSpec>,
    scratch: Option<[Scratch; 3]>,
    hdr: HdrDriver,
    cache: ResourceCache,
    use_postprocessing: bool,
    logged_failure: bool,
}

impl PingPongCanvas {
    pub(crate) fn new(receiver: Receiver<FrameMessage>, use_postprocessing: bool) -> Self {
        Self {
            receiver,
            slots: Default::default(),
            pending_attachments: None,
            scratch: None,
            hdr: HdrDriver::new(),
            cache: ResourceCache::default(),
            use_postprocessing,
            logged_failure: false,
        }
    }

    /// Framebuffer the resolve pass writes to; `None` is the default one.
    pub fn set_destination(&mut self, frame: u64, destination: Option<FramebufferId>) {
        self.slots[slot_index(frame)].destination = destination;
    }

    pub fn attachments(&self, frame: u64) -> Option<&FrameAttachments> {
        self.slots[slot_index(frame)].attachments.as_ref()
    }

    pub fn dispatch(&self, frame: u64) -> &[DispatchNode] {
        &self.slots[slot_index(frame)].data
    }

    pub fn mask(&self, frame: u64) -> TechniqueFlags {
        self.slots[slot_index(frame)].mask
    }

    pub fn is_dirty(&self, frame: u64) -> bool {
        self.slots[slot_index(frame)].dirty
    }

    /// Applies everything the update side published and creates pending
    /// attachments. Called by [`draw`](Self::draw); hosts that cull before
    /// drawing call it first so attachments exist.
    pub fn prepare(&mut self, frame: u64, backend: &mut dyn RenderBackend) {
        while let Ok(message) = self.receiver.try_recv() {
            self.apply_message(message);
        }

        if let Some(spec) = self.pending_attachments.take() {
            for (index, slot) in self.slots.iter_mut().enumerate() {
                slot.attachments = Some(FrameAttachments::create(backend, &spec, index));
                slot.dirty = true;
            }
        }

        let slot = &mut self.slots[slot_index(frame)];
        if let Some(next) = slot.next.take() {
            slot.data = next;
        }
    }

    fn apply_message(&mut self, message: FrameMessage) {
        match message {
            FrameMessage::Dispatch { frame, data } => {
                let slot = slot_index(frame);
                self.slots[1 - slot].next = Some(data.clone());
                self.slots[slot].data = data;
                self.slots[slot].next = None;
            }
            FrameMessage::Mask { frame, mask } => {
                self.slots[slot_index(frame)].mask = mask;
            }
            FrameMessage::Dirty => {
                for slot in &mut self.slots {
                    slot.dirty = true;
                }
            }
            FrameMessage::Attachments(spec) => self.pending_attachments = Some(spec),
            FrameMessage::Uniform {
                technique,
                name,
                value,
            } => {
                for slot in &mut self.slots {
                    let queued = slot.next.iter_mut().flatten();
                    for node in slot.data.iter_mut().chain(queued) {
                        if node.technique == technique {
                            node.set_uniform(&name, value);
                        }
                    }
                }
            }
        }
    }

    pub fn draw(
        &mut self,
        frame: u64,
        state: &StateUpdater,
        backend: &mut dyn RenderBackend,
    ) -> DrawOutcome {
        self.prepare(frame, backend);
        let slot = slot_index(frame);

        let Some(attachments) = self.slots[slot].attachments.clone() else {
            if !self.logged_failure {
                tracing::error!("frame attachments not set; no surface to render to");
                self.logged_failure = true;
            }
            return DrawOutcome::NoSurface;
        };
        let (width, height) = (attachments.width, attachments.height);

        let active = filter_nodes(&self.slots[slot].data, self.slots[slot].mask);
        if active.is_empty() {
            if self.use_postprocessing && !self.logged_failure {
                tracing::error!("post-processing chain failed to compile; falling back to blit");
                self.logged_failure = true;
            }
            backend.blit_to_default(attachments.primary, width, height);
            return DrawOutcome::Blit;
        }
        self.logged_failure = false;

        let hdr = self.slots[slot].data.iter().any(|node| node.hdr);
        let rebuild = self.slots[slot].dirty || self.scratch.is_none();
        let scratch = match self.scratch {
            Some(scratch) if !rebuild => scratch,
            _ => {
                let scratch = [
                    scratch_buffer(backend, &attachments, 0),
                    scratch_buffer(backend, &attachments, 1),
                    scratch_buffer(backend, &attachments, 2),
                ];
                self.scratch = Some(scratch);
                scratch
            }
        };
        if hdr && (rebuild || !self.hdr.is_compiled_for(width, height)) {
            self.hdr
                .compile(backend, fx::types::mip_levels(width, height), width, height);
        }
        self.slots[slot].dirty = false;

        let upload = match state.upload() {
            Ok(upload) => Some(upload),
            Err(err) => {
                tracing::error!(%err, "failed to pack shared uniform block");
                None
            }
        };
        if let Some(block @ UniformUpload::Block(_)) = &upload {
            backend.upload_uniform_block(block);
        }

        let eye_adaptation = if hdr {
            self.hdr.draw(backend, attachments.scene, slot);
            self.hdr.luminance_texture(slot)
        } else {
            None
        };

        let data = &self.slots[slot].data;
        let destination = self.slots[slot].destination;
        let resolve = active
            .iter()
            .rev()
            .find_map(|&index| data[index].resolve_pass().map(|pass| (index, pass)));

        let texture_of =
            |buffer: Option<usize>| buffer.map_or(attachments.scene, |b| scratch[b].texture);
        let mut buffer = BUFFERS[0];
        let mut last_shader: Option<usize> = None;
        let mut last_draw: Option<usize> = None;
        let mut last_applied: Option<Option<FramebufferId>> = None;
        let mut passes = 0;

        for &index in &active {
            let node = &data[index];
            for (pass_index, pass) in node.passes.iter().enumerate() {
                let last_pass = pass_index + 1 == node.passes.len();

                backend.bind_texture(UNIT_LAST_SHADER, texture_of(last_shader));
                backend.bind_texture(UNIT_LAST_PASS, texture_of(last_draw));
                backend.bind_texture(UNIT_DEPTH, attachments.depth);
                if let Some(texture) = eye_adaptation {
                    backend.bind_texture(UNIT_EYE_ADAPTATION, texture);
                }

                let mut mipmap = None;
                let (viewport_width, viewport_height) = if let Some(target) = &pass.target {
                    let (texture, framebuffer) = self.cache.render_target(backend, node, target);
                    backend.bind_framebuffer(Some(framebuffer));
                    last_applied = Some(Some(framebuffer));
                    if target.is_mipmapped() {
                        mipmap = Some(texture);
                    }
                    (target.width, target.height)
                } else if resolve == Some((index, pass_index)) {
                    backend.bind_framebuffer(destination);
                    last_applied = Some(destination);
                    (width, height)
                } else if last_pass {
                    let output = buffer[0];
                    backend.bind_framebuffer(Some(scratch[output].framebuffer));
                    last_applied = Some(Some(scratch[output].framebuffer));
                    last_draw = Some(output);
                    last_shader = Some(output);
                    buffer = BUFFERS[output];
                    (width, height)
                } else {
                    let output = buffer[0];
                    backend.bind_framebuffer(Some(scratch[output].framebuffer));
                    last_applied = Some(Some(scratch[output].framebuffer));
                    last_draw = Some(output);
                    buffer.swap(0, 1);
                    (width, height)
                };
                backend.set_viewport(viewport_width, viewport_height);

                let program = self.cache.program(backend, node, pass);
                backend.use_program(program);
                if let Some(individual @ UniformUpload::Individual(_)) = &upload {
                    backend.upload_uniform_block(individual);
                }

                backend.set_sampler(SAMPLER_LAST_SHADER, UNIT_LAST_SHADER);
                backend.set_sampler(SAMPLER_LAST_PASS, UNIT_LAST_PASS);
                backend.set_sampler(SAMPLER_DEPTH, UNIT_DEPTH);
                if eye_adaptation.is_some() {
                    backend.set_sampler(SAMPLER_EYE_ADAPTATION, UNIT_EYE_ADAPTATION);
                }

                let mut unit = UNIT_NEXT_FREE;
                for sampler in &node.samplers {
                    let texture = self.cache.sampler(backend, node, sampler);
                    backend.bind_texture(unit, texture);
                    backend.set_sampler(&sampler.name, unit);
                    unit += 1;
                }
                for target in &node.render_targets {
                    if pass.target.as_ref().is_some_and(|t| t.name == target.name) {
                        continue;
                    }
                    let (texture, _) = self.cache.render_target(backend, node, target);
                    backend.bind_texture(unit, texture);
                    backend.set_sampler(&target.name, unit);
                    unit += 1;
                }
                for (name, value) in &node.uniforms {
                    backend.set_uniform(name, *value);
                }

                if let Some(color) = pass.state.clear_color {
                    backend.clear(color);
                }
                backend.set_blend(pass.state.blend);

                if pass.is_compute() {
                    backend.dispatch_compute(viewport_width, viewport_height);
                } else {
                    backend.draw_fullscreen();
                }
                if let Some(texture) = mipmap {
                    backend.generate_mipmap(texture);
                }
                passes += 1;
            }
        }

        if last_applied != Some(destination) {
            backend.bind_framebuffer(destination);
        }

        DrawOutcome::Rendered { passes }
    }
}
