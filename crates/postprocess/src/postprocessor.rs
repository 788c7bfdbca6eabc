//! Technique registry and update-side driver of the effect chain.
//!
//! Types:
//!
//! - `PostProcessor` owns every loaded technique, the enabled chain and the
//!   persisted uniform settings. Chain changes are turned into a
//!   [`DispatchArray`] and published to the canvas.
//! - `TechniqueId` indexes a technique owned by the registry.

use std::path::Path;
use std::time::Instant;

use crossbeam_channel::{unbounded, Receiver, Sender};
use fx::pass::MODERN_GLSL_VERSION;
use fx::{
    CompileOptions, InternalFormat, SourceProvider, Status, Technique, TechniqueFlags,
    TextureTemplate, UniformValue, MAIN_TECHNIQUE,
};
use fxconfig::{ConfigError, FxConfig, SettingsMode, ShaderSettings};
use serde::Serialize;

use crate::actions::{Action, ActionSender, ShaderHandle};
use crate::attachments::AttachmentSpec;
use crate::backend::Capabilities;
use crate::canvas::PingPongCanvas;
use crate::dispatch::{frame_mask, DispatchArray, DispatchNode};
use crate::frame::{frame_channel, FrameMessage, FramePublisher};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TechniqueId(pub usize);

pub struct PostProcessor {
    config: FxConfig,
    settings: ShaderSettings,
    source: Box<dyn SourceProvider>,
    capabilities: Capabilities,
    options: CompileOptions,

    /// Rendering goes through offscreen framebuffers.
    active: bool,
    /// Techniques may be loaded and run.
    enabled: bool,
    depth_format: InternalFormat,
    samples: u32,
    opaque_depth: bool,
    width: u32,
    height: u32,

    techniques: Vec<Technique>,
    chain: Vec<TechniqueId>,
    templates: Vec<TechniqueId>,
    main_template: TextureTemplate,
    dispatch: DispatchArray,
    hdr: bool,
    sunglare: bool,
    underwater: bool,
    exterior: bool,

    frame: u64,
    reload: bool,
    last_reload_check: Option<Instant>,
    pending_uniforms: Vec<FrameMessage>,
    publisher: FramePublisher,
    action_sender: Sender<Action>,
    actions: Receiver<Action>,
}

impl PostProcessor {
    /// Creates the registry and the canvas it feeds. Capabilities the
    /// configuration needs but the driver lacks disable post-processing with
    /// a warning.
    pub fn new(
        config: FxConfig,
        settings: ShaderSettings,
        source: Box<dyn SourceProvider>,
        capabilities: Capabilities,
        width: u32,
        height: u32,
    ) -> (Self, PingPongCanvas) {
        let use_ubo =
            capabilities.uniform_buffers && capabilities.glsl_version >= MODERN_GLSL_VERSION;
        let samples = config.samples();

        let wanted = config.enabled || config.reverse_z || config.soft_particles;
        let active = if !wanted {
            tracing::info!("rendering to default framebuffer");
            false
        } else if !capabilities.framebuffers {
            tracing::warn!("post processing and reverse-z disabled, framebuffers unsupported");
            false
        } else if samples > 1 && !capabilities.multisample_renderbuffers {
            tracing::warn!(
                samples,
                "post processing and reverse-z disabled, multisample renderbuffers unsupported; disabling antialiasing may resolve this"
            );
            false
        } else {
            true
        };

        let depth_format = if active && config.reverse_z {
            if capabilities.float_depth_buffer {
                InternalFormat::DepthComponent32f
            } else {
                tracing::warn!(
                    "floating point depth buffer unsupported; reverse-z will not benefit the scene"
                );
                InternalFormat::DepthComponent24
            }
        } else {
            InternalFormat::DepthComponent24
        };

        let enabled = active && config.enabled;
        let options = CompileOptions {
            use_ubo,
            reverse_z: config.reverse_z,
            radial_fog: config.radial_fog,
        };

        let (publisher, receiver) = frame_channel();
        let (action_sender, actions) = unbounded();
        let canvas = PingPongCanvas::new(receiver, enabled);

        let processor = Self {
            opaque_depth: config.enabled || config.soft_particles,
            config,
            settings,
            source,
            capabilities,
            options,
            active,
            enabled,
            depth_format,
            samples,
            width: width.max(1),
            height: height.max(1),
            techniques: Vec::new(),
            chain: Vec::new(),
            templates: Vec::new(),
            main_template: TextureTemplate::scene(),
            dispatch: Vec::new(),
            hdr: false,
            sunglare: true,
            underwater: false,
            exterior: false,
            frame: 0,
            reload: active,
            last_reload_check: None,
            pending_uniforms: Vec::new(),
            publisher,
            action_sender,
            actions,
        };

        if active {
            processor
                .publisher
                .send(FrameMessage::Attachments(processor.attachment_spec()));
        }

        (processor, canvas)
    }

    /// Post-processing is usable: techniques can be loaded and enabled.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// The scene renders into offscreen attachments, which reverse-z and
    /// soft particles need even without post-processing.
    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn uses_ubo(&self) -> bool {
        self.options.use_ubo
    }

    pub fn hdr(&self) -> bool {
        self.hdr
    }

    pub fn sunglare(&self) -> bool {
        self.sunglare
    }

    pub fn config(&self) -> &FxConfig {
        &self.config
    }

    pub fn settings(&self) -> &ShaderSettings {
        &self.settings
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn main_template(&self) -> TextureTemplate {
        self.main_template
    }

    pub fn chain(&self) -> &[TechniqueId] {
        &self.chain
    }

    pub fn templates(&self) -> &[TechniqueId] {
        &self.templates
    }

    /// Last plan published to the canvas.
    pub fn dispatch(&self) -> &[DispatchNode] {
        &self.dispatch
    }

    pub fn technique(&self, id: TechniqueId) -> Option<&Technique> {
        self.techniques.get(id.0)
    }

    pub fn find_template(&self, name: &str) -> Option<TechniqueId> {
        self.templates
            .iter()
            .copied()
            .find(|id| self.techniques[id.0].name() == name)
    }

    pub fn attachment_spec(&self) -> AttachmentSpec {
        AttachmentSpec {
            width: self.width,
            height: self.height,
            main_template: self.main_template,
            depth_format: self.depth_format,
            samples: self.samples,
            opaque_depth: self.opaque_depth,
        }
    }

    pub fn set_underwater(&mut self, underwater: bool) {
        self.underwater = underwater;
    }

    pub fn set_exterior(&mut self, exterior: bool) {
        self.exterior = exterior;
    }

    /// Returns the cached template called `name`, or compiles a new
    /// technique. With `insert` the technique becomes a template and may
    /// change the main pass format.
    pub fn load_technique(&mut self, name: &str, insert: bool) -> Option<TechniqueId> {
        if !self.enabled {
            return None;
        }
        if let Some(id) = self.find_template(name) {
            return Some(id);
        }

        let mut technique = Technique::new(name, self.options);
        technique.compile(&*self.source, &self.settings);

        let id = TechniqueId(self.techniques.len());
        self.techniques.push(technique);

        if insert {
            self.reload_main_pass(id);
            self.templates.push(id);
        }
        Some(id)
    }

    pub fn add_template(&mut self, id: TechniqueId) {
        if !self.enabled || id.0 >= self.techniques.len() || self.templates.contains(&id) {
            return;
        }
        self.templates.push(id);
    }

    /// Inserts a technique into the chain at `position`, or at the end.
    /// `main` and positions below 1 are rejected.
    pub fn enable_technique(&mut self, id: TechniqueId, position: Option<i32>) -> bool {
        let Some(technique) = self.techniques.get(id.0) else {
            return false;
        };
        if technique.name() == MAIN_TECHNIQUE || position.is_some_and(|p| p <= 0) {
            return false;
        }

        self.disable_technique(id, false);

        let len = self.chain.len();
        let position = position.map_or(len, |p| (p as usize).min(len));
        self.chain.insert(position, id);
        self.dirty_techniques();
        true
    }

    pub fn disable_technique(&mut self, id: TechniqueId, rebuild: bool) -> bool {
        let Some(index) = self.chain.iter().skip(1).position(|&t| t == id) else {
            return false;
        };
        self.chain.remove(index + 1);
        if rebuild {
            self.dirty_techniques();
        }
        true
    }

    pub fn is_technique_enabled(&self, id: TechniqueId) -> bool {
        self.chain.contains(&id) && self.techniques.get(id.0).is_some_and(Technique::is_valid)
    }

    /// Sets a uniform, persists it and queues it for the render side.
    /// Static uniforms and values of the wrong type are rejected.
    pub fn set_uniform(&mut self, id: TechniqueId, name: &str, value: UniformValue) -> bool {
        if !self.enabled {
            return false;
        }
        let Some(technique) = self.techniques.get_mut(id.0) else {
            return false;
        };
        let technique_name = technique.name().to_owned();
        let Some(uniform) = technique.uniform_mut(name) else {
            tracing::debug!(technique = %technique_name, uniform = name, "no such uniform");
            return false;
        };
        if uniform.is_static {
            tracing::warn!(
                technique = %technique_name,
                uniform = name,
                "attempting to set a configuration variable as a uniform"
            );
            return false;
        }
        if let Err(err) = uniform.set_value(value) {
            tracing::warn!(technique = %technique_name, uniform = name, %err, "rejected uniform value");
            return false;
        }

        self.settings
            .set_value(&technique_name, name, value.to_setting());
        if let Some(node) = self.dispatch.iter_mut().find(|n| n.id == id) {
            node.set_uniform(name, value);
        }
        self.pending_uniforms.push(FrameMessage::Uniform {
            technique: technique_name,
            name: name.to_owned(),
            value,
        });
        true
    }

    /// Rebuilds the plan from the chain and publishes it for the current
    /// frame.
    pub fn dirty_techniques(&mut self) {
        if !self.enabled {
            return;
        }

        let mut data = DispatchArray::new();
        let mut sunglare = true;
        self.hdr = false;

        for &id in &self.chain {
            let technique = &self.techniques[id.0];
            if !technique.is_valid() {
                continue;
            }
            if technique.glsl_version() > self.capabilities.glsl_version {
                tracing::warn!(
                    technique = technique.name(),
                    required = technique.glsl_version(),
                    supported = self.capabilities.glsl_version,
                    "technique requires a newer GLSL version; skipping"
                );
                continue;
            }
            if technique.hdr() {
                self.hdr = true;
            }
            if technique.flags().contains(TechniqueFlags::DISABLE_SUNGLARE) {
                sunglare = false;
            }
            data.push(DispatchNode::build(id, technique, self.width, self.height));
        }

        self.sunglare = sunglare;
        self.dispatch = data.clone();
        tracing::debug!(frame = self.frame, techniques = data.len(), "published dispatch");
        self.publisher.send(FrameMessage::Dispatch {
            frame: self.frame,
            data,
        });
    }

    /// Per-frame update: applies queued actions, live reloads changed
    /// techniques and publishes the frame mask.
    pub fn update(&mut self, frame: u64, now: Instant) {
        self.frame = frame;
        if !self.active {
            return;
        }

        self.apply_actions();

        if self.enabled && self.config.live_reload && self.reload_due(now) {
            self.last_reload_check = Some(now);
            self.live_reload();
        }

        if self.reload {
            self.reload = false;
            self.reload_techniques();
        }

        self.publisher.send(FrameMessage::Mask {
            frame,
            mask: frame_mask(self.underwater, self.exterior),
        });
        for message in self.pending_uniforms.drain(..) {
            self.publisher.send(message);
        }
    }

    fn reload_due(&self, now: Instant) -> bool {
        self.last_reload_check.map_or(true, |last| {
            now.saturating_duration_since(last) >= self.config.live_reload_interval
        })
    }

    fn live_reload(&mut self) {
        let mut needs_reload = false;
        for &id in &self.chain {
            let technique = &mut self.techniques[id.0];
            if technique.status() == Status::FileNotExists {
                continue;
            }
            technique.set_last_modified(self.source.modified(technique.name()));
            needs_reload |= technique.is_dirty();
        }
        if !needs_reload {
            return;
        }

        for id in self.chain.clone() {
            let technique = &mut self.techniques[id.0];
            if technique.is_valid() && !technique.is_dirty() {
                continue;
            }
            if technique.compile(&*self.source, &self.settings) {
                tracing::info!(file = technique.file_name(), "reloaded technique");
                self.reload_main_pass(id);
            } else {
                tracing::error!(
                    file = technique.file_name(),
                    error = technique.last_error().unwrap_or_default(),
                    "failed reloading technique"
                );
            }
        }
        self.dirty_techniques();
    }

    /// Rebuilds the chain from the configuration; `main` always comes first.
    pub fn reload_techniques(&mut self) {
        if !self.enabled {
            return;
        }
        self.chain.clear();

        let names: Vec<String> = std::iter::once(MAIN_TECHNIQUE.to_owned())
            .chain(self.config.chain.iter().cloned())
            .collect();

        for (index, name) in names.iter().enumerate() {
            let name = name.trim();
            if name.is_empty() {
                continue;
            }
            if index > 0 && name.eq_ignore_ascii_case(MAIN_TECHNIQUE) {
                tracing::warn!(
                    "'{MAIN_TECHNIQUE}' technique specified in chain, this is not allowed; it will be ignored"
                );
                continue;
            }
            if let Some(id) = self.load_technique(name, true) {
                self.chain.push(id);
            }
        }

        self.dirty_techniques();
    }

    /// Adopts the main pass format of `id` and recreates the attachments
    /// when it differs from the current one.
    fn reload_main_pass(&mut self, id: TechniqueId) {
        let Some(template) = self.techniques[id.0].main_template().copied() else {
            return;
        };
        if template == self.main_template {
            return;
        }
        tracing::debug!(?template, "main pass format changed");
        self.main_template = template;
        self.resize(self.width, self.height, true);
    }

    pub fn resize(&mut self, width: u32, height: u32, resize_attachments: bool) {
        let (width, height) = (width.max(1), height.max(1));
        let resized = (width, height) != (self.width, self.height);
        self.width = width;
        self.height = height;

        if !self.active {
            return;
        }
        if resize_attachments || resized {
            self.publisher
                .send(FrameMessage::Attachments(self.attachment_spec()));
        }
        self.dirty_techniques();
        self.publisher.send(FrameMessage::Dirty);
    }

    /// Flips between normal and debug settings mode and recompiles every
    /// template.
    pub fn toggle_mode(&mut self) -> SettingsMode {
        let mode = self.settings.toggle_mode();
        for &id in &self.templates {
            let technique = &mut self.techniques[id.0];
            technique.set_dirty(true);
            technique.compile(&*self.source, &self.settings);
        }
        tracing::info!(?mode, "toggled shader settings mode");
        self.dirty_techniques();
        mode
    }

    pub fn save_settings(&self, path: &Path) -> Result<(), ConfigError> {
        self.settings.save(path)
    }

    pub fn action_sender(&self) -> ActionSender {
        ActionSender::new(self.action_sender.clone())
    }

    /// Loads a technique for a script without adding it to the chain; it
    /// becomes a template once queued actions are applied.
    pub fn load_shader(&mut self, name: &str) -> Option<ShaderHandle> {
        let id = self.load_technique(name, false)?;
        let technique = &self.techniques[id.0];
        let sender = self.action_sender();
        sender.send(Action::AddTemplate(id));
        Some(ShaderHandle::new(
            id,
            technique.name(),
            technique.file_name(),
            technique.is_valid(),
            sender,
        ))
    }

    /// Applies every action queued since the last call.
    pub fn apply_actions(&mut self) {
        while let Ok(action) = self.actions.try_recv() {
            tracing::trace!(?action, "applying action");
            match action {
                Action::Toggle {
                    id,
                    enable: true,
                    position,
                } => {
                    self.enable_technique(id, position);
                }
                Action::Toggle { id, enable: false, .. } => {
                    self.disable_technique(id, true);
                }
                Action::SetUniform { id, name, value } => {
                    self.set_uniform(id, &name, value);
                }
                Action::AddTemplate(id) => self.add_template(id),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fx::{MemorySource, WrapMode};
    use std::time::Duration;

    const MAIN: &str = "fragment one { void main() {} } technique { passes = one; }";

    fn source() -> MemorySource {
        let mut source = MemorySource::new();
        source.insert("main", MAIN);
        source.insert(
            "tint",
            "uniform_float gain { default = 1.0; min = 0.0; max = 4.0; } \
             uniform_bool fast { default = true; static = true; } \
             fragment one { void main() {} } technique { passes = one; }",
        );
        source.insert(
            "bloom",
            "fragment one { void main() {} } technique { passes = one; hdr = true; flags = disable_sunglare; }",
        );
        source.insert("broken", "technique { passes = missing; }");
        source
    }

    fn processor_with(config: FxConfig, capabilities: Capabilities) -> (PostProcessor, PingPongCanvas) {
        PostProcessor::new(
            config,
            ShaderSettings::new(),
            Box::new(source()),
            capabilities,
            1280,
            720,
        )
    }

    fn processor(chain: &[&str]) -> PostProcessor {
        let config = FxConfig {
            chain: chain.iter().map(|s| s.to_string()).collect(),
            ..FxConfig::default()
        };
        let (mut processor, _canvas) = processor_with(config, Capabilities::default());
        processor.update(1, Instant::now());
        processor
    }

    fn names(processor: &PostProcessor) -> Vec<&str> {
        processor
            .chain()
            .iter()
            .map(|&id| processor.technique(id).expect("technique").name())
            .collect()
    }

    #[test]
    fn initial_load_puts_main_first() {
        let processor = processor(&["tint", "main", "bloom"]);
        assert_eq!(names(&processor), vec!["main", "tint", "bloom"]);
        assert_eq!(processor.dispatch().len(), 3);
        assert!(processor.hdr());
        assert!(!processor.sunglare());
    }

    #[test]
    fn invalid_techniques_stay_in_chain_but_not_in_dispatch() {
        let processor = processor(&["broken"]);
        assert_eq!(names(&processor), vec!["main", "broken"]);
        assert_eq!(processor.dispatch().len(), 1);
        let broken = processor.chain()[1];
        assert!(!processor.is_technique_enabled(broken));
    }

    #[test]
    fn enable_rejects_main_and_non_positive_positions() {
        let mut processor = processor(&[]);
        let main = processor.chain()[0];
        let tint = processor.load_technique("tint", true).expect("tint");
        assert!(!processor.enable_technique(main, None));
        assert!(!processor.enable_technique(tint, Some(0)));
        assert!(processor.enable_technique(tint, Some(10)));
        assert_eq!(names(&processor), vec!["main", "tint"]);

        let bloom = processor.load_technique("bloom", true).expect("bloom");
        assert!(processor.enable_technique(bloom, Some(1)));
        assert_eq!(names(&processor), vec!["main", "bloom", "tint"]);

        // re-enabling moves instead of duplicating
        assert!(processor.enable_technique(tint, Some(1)));
        assert_eq!(names(&processor), vec!["main", "tint", "bloom"]);
    }

    #[test]
    fn disable_never_removes_main() {
        let mut processor = processor(&["tint"]);
        let main = processor.chain()[0];
        let tint = processor.chain()[1];
        assert!(!processor.disable_technique(main, true));
        assert!(processor.disable_technique(tint, true));
        assert!(!processor.disable_technique(tint, true));
        assert_eq!(names(&processor), vec!["main"]);
        assert_eq!(processor.dispatch().len(), 1);
    }

    #[test]
    fn templates_are_cached_by_name() {
        let mut processor = processor(&["tint"]);
        let first = processor.load_technique("tint", true);
        assert_eq!(first, Some(processor.chain()[1]));
        let detached = processor.load_technique("bloom", false).expect("bloom");
        assert!(processor.find_template("bloom").is_none());
        processor.add_template(detached);
        processor.add_template(detached);
        assert_eq!(processor.find_template("bloom"), Some(detached));
        assert_eq!(
            processor.templates().iter().filter(|&&id| id == detached).count(),
            1
        );
    }

    #[test]
    fn set_uniform_persists_and_rejects_static() {
        let mut processor = processor(&["tint"]);
        let tint = processor.chain()[1];
        assert!(processor.set_uniform(tint, "gain", UniformValue::Float(2.0)));
        assert_eq!(processor.settings().get_value::<f32>("tint", "gain"), Some(2.0));
        assert!(processor.dispatch()[1]
            .uniforms
            .contains(&("gain".to_owned(), UniformValue::Float(2.0))));

        assert!(!processor.set_uniform(tint, "fast", UniformValue::Bool(false)));
        assert!(!processor.set_uniform(tint, "gain", UniformValue::Int(3)));
        assert!(!processor.set_uniform(tint, "nope", UniformValue::Float(1.0)));
    }

    #[test]
    fn missing_framebuffers_disable_everything() {
        let capabilities = Capabilities {
            framebuffers: false,
            ..Capabilities::default()
        };
        let (mut processor, _canvas) = processor_with(FxConfig::default(), capabilities);
        processor.update(1, Instant::now());
        assert!(!processor.is_active());
        assert!(!processor.is_enabled());
        assert!(processor.chain().is_empty());
        assert!(processor.load_technique("tint", true).is_none());
    }

    #[test]
    fn multisampling_without_support_disables() {
        let config = FxConfig {
            antialiasing: 4,
            ..FxConfig::default()
        };
        let capabilities = Capabilities {
            multisample_renderbuffers: false,
            ..Capabilities::default()
        };
        let (processor, _canvas) = processor_with(config, capabilities);
        assert!(!processor.is_enabled());
    }

    #[test]
    fn reverse_z_prefers_float_depth() {
        let config = FxConfig {
            reverse_z: true,
            ..FxConfig::default()
        };
        let (processor, _canvas) = processor_with(config.clone(), Capabilities::default());
        assert_eq!(
            processor.attachment_spec().depth_format,
            InternalFormat::DepthComponent32f
        );

        let capabilities = Capabilities {
            float_depth_buffer: false,
            ..Capabilities::default()
        };
        let (processor, _canvas) = processor_with(config, capabilities);
        assert_eq!(
            processor.attachment_spec().depth_format,
            InternalFormat::DepthComponent24
        );
    }

    #[test]
    fn ubo_requires_modern_glsl() {
        let capabilities = Capabilities {
            glsl_version: 120,
            ..Capabilities::default()
        };
        let (processor, _canvas) = processor_with(FxConfig::default(), capabilities);
        assert!(!processor.uses_ubo());
        let (processor, _canvas) = processor_with(FxConfig::default(), Capabilities::default());
        assert!(processor.uses_ubo());
    }

    #[test]
    fn techniques_above_supported_glsl_are_skipped() {
        let mut source = source();
        source.insert(
            "modern",
            "fragment one { void main() {} } technique { passes = one; glsl_version = 450; }",
        );
        let config = FxConfig {
            chain: vec!["modern".into()],
            ..FxConfig::default()
        };
        let (mut processor, _canvas) = PostProcessor::new(
            config,
            ShaderSettings::new(),
            Box::new(source),
            Capabilities::default(),
            640,
            480,
        );
        processor.update(1, Instant::now());
        assert_eq!(processor.chain().len(), 2);
        assert_eq!(processor.dispatch().len(), 1);
    }

    #[test]
    fn main_pass_template_changes_attachments() {
        let mut source = source();
        source.insert(
            "main",
            "main_pass { wrap_s = repeat; } fragment one { void main() {} } technique { passes = one; }",
        );
        let (mut processor, _canvas) = PostProcessor::new(
            FxConfig::default(),
            ShaderSettings::new(),
            Box::new(source),
            Capabilities::default(),
            640,
            480,
        );
        processor.update(1, Instant::now());
        assert_eq!(processor.main_template().wrap_s, WrapMode::Repeat);
        assert_eq!(
            processor.attachment_spec().main_template.wrap_s,
            WrapMode::Repeat
        );
    }

    #[test]
    fn toggle_mode_recompiles_templates() {
        let mut processor = processor(&["tint"]);
        let tint = processor.chain()[1];
        let generation = processor.technique(tint).expect("tint").generation();
        assert_eq!(processor.toggle_mode(), SettingsMode::Debug);
        assert!(processor.technique(tint).expect("tint").generation() > generation);
        assert_eq!(processor.toggle_mode(), SettingsMode::Normal);
    }

    #[test]
    fn live_reload_waits_for_interval() {
        let config = FxConfig {
            live_reload: true,
            live_reload_interval: Duration::from_secs(5),
            ..FxConfig::default()
        };
        let (mut processor, _canvas) = processor_with(config, Capabilities::default());
        let start = Instant::now();
        processor.update(1, start);
        assert!(!processor.reload_due(start + Duration::from_secs(1)));
        assert!(processor.reload_due(start + Duration::from_secs(5)));
    }

    #[test]
    fn queued_actions_apply_on_update() {
        let mut processor = processor(&[]);
        let mut handle = processor.load_shader("tint").expect("handle");
        assert_eq!(handle.to_string(), "Shader(tint, shaders/tint.omwfx)");
        handle.enable(None);
        handle.set_uniform("gain", UniformValue::Float(3.0));
        assert!(handle.is_enabled());
        assert!(processor.find_template("tint").is_none());

        processor.update(2, Instant::now());
        assert!(processor.find_template("tint").is_some());
        assert_eq!(names(&processor), vec!["main", "tint"]);
        assert_eq!(processor.settings().get_value::<f32>("tint", "gain"), Some(3.0));

        handle.disable();
        assert!(!handle.is_enabled());
        processor.update(3, Instant::now());
        assert_eq!(names(&processor), vec!["main"]);
    }
}
