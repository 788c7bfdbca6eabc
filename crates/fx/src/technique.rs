//! Technique files: parsing, validation and compilation into passes.
//!
//! A technique is a sequence of top-level blocks. `technique` lists the
//! passes and metadata, `shared` holds GLSL prepended to every stage,
//! `vertex`/`fragment`/`compute` define pass stages, `render_target` and
//! `sampler_*` declare textures, `uniform_*` declare tweakable values and
//! `main_pass` (only in the technique named `main`) configures the scene
//! texture.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::time::SystemTime;

use fxconfig::ShaderSettings;
use glam::{Vec2, Vec3, Vec4};
use serde::Serialize;

use crate::error::{LexerError, TechniqueError};
use crate::lexer::{Lexer, Token};
use crate::pass::{Pass, PassType, ShaderStage};
use crate::source::{technique_file_name, SourceProvider};
use crate::types::{
    lookup, lookup_ignore_case, BlendState, RenderTarget, Sampler, SamplerType, TechniqueFlags,
    TextureTemplate, BLEND_EQUATIONS, BLEND_FUNCS, FILTER_MODES, INTERNAL_FORMATS, SOURCE_FORMATS,
    SOURCE_TYPES, TECHNIQUE_FLAGS, WRAP_MODES,
};
use crate::uniform::{UniformBase, UniformType, UniformValue};

/// Name of the technique that always heads the chain.
pub const MAIN_TECHNIQUE: &str = "main";

pub const DEFAULT_GLSL_PROFILE: &str = "compatibility";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Status {
    Success,
    Uncompiled,
    FileNotExists,
    ParseError,
}

/// Driver-dependent switches baked into generated headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CompileOptions {
    pub use_ubo: bool,
    pub reverse_z: bool,
    pub radial_fog: bool,
}

impl CompileOptions {
    pub fn default_glsl_version(&self) -> u32 {
        if self.use_ubo {
            330
        } else {
            120
        }
    }
}

#[derive(Debug, Clone)]
pub struct Technique {
    name: String,
    file_name: String,
    options: CompileOptions,
    status: Status,
    valid: bool,
    dirty: bool,
    generation: u64,
    last_modified: Option<SystemTime>,
    last_error: Option<String>,

    shared: String,
    author: String,
    description: String,
    version: String,
    glsl_version: u32,
    glsl_profile: String,
    glsl_extensions: BTreeSet<String>,
    flags: TechniqueFlags,
    hdr: bool,
    main_template: Option<TextureTemplate>,
    render_targets: BTreeMap<String, RenderTarget>,
    samplers: Vec<Sampler>,
    uniforms: Vec<UniformBase>,
    passes: Vec<Pass>,
}

impl Technique {
    pub fn new(name: impl Into<String>, options: CompileOptions) -> Self {
        let name = name.into();
        let mut technique = Self {
            file_name: technique_file_name(&name),
            name,
            options,
            status: Status::Uncompiled,
            valid: false,
            dirty: false,
            generation: 0,
            last_modified: None,
            last_error: None,
            shared: String::new(),
            author: String::new(),
            description: String::new(),
            version: String::new(),
            glsl_version: options.default_glsl_version(),
            glsl_profile: DEFAULT_GLSL_PROFILE.to_owned(),
            glsl_extensions: BTreeSet::new(),
            flags: TechniqueFlags::empty(),
            hdr: false,
            main_template: None,
            render_targets: BTreeMap::new(),
            samplers: Vec::new(),
            uniforms: Vec::new(),
            passes: Vec::new(),
        };
        technique.clear();
        technique
    }

    /// Drops everything parsed from the file.
    fn clear(&mut self) {
        self.status = Status::Uncompiled;
        self.valid = false;
        self.last_error = None;
        self.shared.clear();
        self.author.clear();
        self.description.clear();
        self.version.clear();
        self.glsl_version = self.options.default_glsl_version();
        self.glsl_profile = DEFAULT_GLSL_PROFILE.to_owned();
        self.glsl_extensions.clear();
        self.flags = TechniqueFlags::empty();
        self.hdr = false;
        self.main_template = None;
        self.render_targets.clear();
        self.samplers.clear();
        self.uniforms.clear();
        self.passes.clear();
    }

    /// Parses and compiles the technique. Returns whether it is usable.
    ///
    /// A valid technique that has not been marked dirty is left untouched.
    pub fn compile(&mut self, source: &dyn SourceProvider, settings: &ShaderSettings) -> bool {
        if self.valid && !self.dirty {
            return true;
        }

        self.clear();
        self.dirty = false;

        let Some(file) = source.load(&self.name) else {
            self.status = Status::FileNotExists;
            let message = format!("Could not find technique file '{}'", self.file_name);
            tracing::error!(technique = %self.name, file = %self.file_name, "technique file does not exist");
            self.last_error = Some(message);
            return false;
        };
        self.last_modified = file.modified;

        match self.compile_source(&file.contents, settings) {
            Ok(()) => {
                self.status = Status::Success;
                self.valid = true;
                self.generation += 1;
                tracing::debug!(
                    technique = %self.name,
                    passes = self.passes.len(),
                    generation = self.generation,
                    "compiled technique"
                );
                true
            }
            Err(err) => {
                self.clear();
                self.status = Status::ParseError;
                let message = format!("Failed parsing technique '{}' {err}", self.name);
                tracing::error!("{message}");
                self.last_error = Some(message);
                false
            }
        }
    }

    fn compile_source(
        &mut self,
        contents: &str,
        settings: &ShaderSettings,
    ) -> Result<(), TechniqueError> {
        let normalized = contents.replace("\r\n", "\n");
        let mut parser = Parser::new(&normalized, self, settings);
        parser.parse()?;
        let Parser {
            pass_keys,
            pass_map,
            ..
        } = parser;

        if pass_keys.is_empty() {
            return Err(TechniqueError::Validation(
                "no pass list found, ensure you define one in a 'technique' block".into(),
            ));
        }

        let mode = settings.mode();
        let mut passes = Vec::with_capacity(pass_keys.len());
        let mut last_kind: Option<PassType> = None;
        let mut swaps = 0;

        for key in &pass_keys {
            let mut pass = pass_map.get(key).cloned().ok_or_else(|| {
                TechniqueError::Validation(format!(
                    "pass '{key}' was found in the pass list, but there was no matching 'fragment', 'vertex' or 'compute' block"
                ))
            })?;

            if let Some(previous) = last_kind {
                if previous != pass.kind() {
                    swaps += 1;
                    if swaps == 2 {
                        tracing::warn!(
                            technique = %self.name,
                            "multiple pixel and compute shader swaps; consider reordering passes for performance"
                        );
                    }
                }
            }
            last_kind = Some(pass.kind());

            if let Some(target) = &pass.target {
                if !self.render_targets.contains_key(target) {
                    return Err(TechniqueError::Validation(format!(
                        "target '{target}' not defined"
                    )));
                }
            }

            pass.compile(self, mode)?;
            passes.push(pass);
        }

        self.passes = passes;
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn options(&self) -> CompileOptions {
        self.options
    }

    /// Changing driver options invalidates compiled output.
    pub fn set_options(&mut self, options: CompileOptions) {
        if self.options != options {
            self.options = options;
            self.dirty = true;
        }
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn set_dirty(&mut self, dirty: bool) {
        self.dirty = dirty;
    }

    /// Incremented on every successful compile.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn last_modified(&self) -> Option<SystemTime> {
        self.last_modified
    }

    /// Records the file timestamp; a change marks the technique dirty.
    pub fn set_last_modified(&mut self, modified: Option<SystemTime>) {
        if modified != self.last_modified {
            self.dirty = true;
        }
        self.last_modified = modified;
    }

    pub fn shared(&self) -> &str {
        &self.shared
    }

    pub fn author(&self) -> &str {
        &self.author
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn glsl_version(&self) -> u32 {
        self.glsl_version
    }

    pub fn glsl_profile(&self) -> &str {
        &self.glsl_profile
    }

    pub fn glsl_extensions(&self) -> &BTreeSet<String> {
        &self.glsl_extensions
    }

    pub fn flags(&self) -> TechniqueFlags {
        self.flags
    }

    pub fn hdr(&self) -> bool {
        self.hdr
    }

    pub fn main_template(&self) -> Option<&TextureTemplate> {
        self.main_template.as_ref()
    }

    pub fn render_targets(&self) -> &BTreeMap<String, RenderTarget> {
        &self.render_targets
    }

    pub fn samplers(&self) -> &[Sampler] {
        &self.samplers
    }

    pub fn uniforms(&self) -> &[UniformBase] {
        &self.uniforms
    }

    pub fn uniform(&self, name: &str) -> Option<&UniformBase> {
        self.uniforms.iter().find(|u| u.name == name)
    }

    pub fn uniform_mut(&mut self, name: &str) -> Option<&mut UniformBase> {
        self.uniforms.iter_mut().find(|u| u.name == name)
    }

    pub fn passes(&self) -> &[Pass] {
        &self.passes
    }
}

/// Values accepted by a pass block header.
#[derive(Debug, Default)]
struct BlockHeader {
    target: Option<String>,
    blend: Option<BlendState>,
    clear: Option<bool>,
    clear_color: Option<[f32; 4]>,
}

impl BlockHeader {
    fn apply(self, pass: &mut Pass) {
        if let Some(target) = self.target {
            pass.target = Some(target);
        }
        if let Some(blend) = self.blend {
            pass.blend = Some(blend);
        }
        // A clear colour alone implies clearing; `clear = false` wins.
        let clear = self.clear.unwrap_or(self.clear_color.is_some());
        if clear {
            pass.clear_color = Some(self.clear_color.unwrap_or([0.0; 4]));
        } else if self.clear == Some(false) {
            pass.clear_color = None;
        }
    }
}

struct Parser<'a> {
    lexer: Lexer<'a>,
    technique: &'a mut Technique,
    settings: &'a ShaderSettings,
    pass_keys: Vec<String>,
    pass_map: HashMap<String, Pass>,
    seen_shared: bool,
    seen_technique: bool,
}

impl<'a> Parser<'a> {
    fn new(source: &'a str, technique: &'a mut Technique, settings: &'a ShaderSettings) -> Self {
        Self {
            lexer: Lexer::new(source),
            technique,
            settings,
            pass_keys: Vec::new(),
            pass_map: HashMap::new(),
            seen_shared: false,
            seen_technique: false,
        }
    }

    fn parse(&mut self) -> Result<(), LexerError> {
        loop {
            let token = self.lexer.next()?;
            match token {
                Token::Eof => return Ok(()),
                Token::Shared => self.parse_shared()?,
                Token::Technique => self.parse_technique()?,
                Token::MainPass => self.parse_main_pass()?,
                Token::RenderTarget => self.parse_render_target()?,
                Token::Vertex => self.parse_shader(ShaderStage::Vertex)?,
                Token::Fragment => self.parse_shader(ShaderStage::Fragment)?,
                Token::Compute => self.parse_shader(ShaderStage::Compute)?,
                Token::Sampler1D => self.parse_sampler(SamplerType::Sampler1D)?,
                Token::Sampler2D => self.parse_sampler(SamplerType::Sampler2D)?,
                Token::Sampler3D => self.parse_sampler(SamplerType::Sampler3D)?,
                Token::UniformBool => self.parse_uniform(UniformType::Bool)?,
                Token::UniformInt => self.parse_uniform(UniformType::Int)?,
                Token::UniformFloat => self.parse_uniform(UniformType::Float)?,
                Token::UniformVec2 => self.parse_uniform(UniformType::Vec2)?,
                Token::UniformVec3 => self.parse_uniform(UniformType::Vec3)?,
                Token::UniformVec4 => self.parse_uniform(UniformType::Vec4)?,
                other => {
                    return Err(self
                        .lexer
                        .error(format!("invalid top level block, found {other}")))
                }
            }
        }
    }

    fn error(&self, message: impl Into<String>) -> LexerError {
        self.lexer.error(message)
    }

    fn expect(&mut self, expected: Token) -> Result<(), LexerError> {
        let token = self.lexer.next()?;
        if token == expected {
            Ok(())
        } else {
            Err(self.error(format!("expected {expected}, found {token}")))
        }
    }

    fn expect_literal(&mut self, what: &str) -> Result<String, LexerError> {
        match self.lexer.next()? {
            Token::Literal(value) => Ok(value),
            other => Err(self.error(format!("{what}, found {other}"))),
        }
    }

    fn parse_string(&mut self) -> Result<String, LexerError> {
        match self.lexer.next()? {
            Token::String(value) => Ok(value),
            other => Err(self.error(format!("expected a string, found {other}"))),
        }
    }

    fn parse_bool(&mut self) -> Result<bool, LexerError> {
        match self.lexer.next()? {
            Token::True => Ok(true),
            Token::False => Ok(false),
            other => Err(self.error(format!("expected 'true' or 'false', found {other}"))),
        }
    }

    fn parse_int(&mut self) -> Result<i32, LexerError> {
        match self.lexer.next()? {
            Token::Integer(value) => i32::try_from(value)
                .map_err(|_| self.error(format!("integer {value} is out of range"))),
            other => Err(self.error(format!("expected an integer, found {other}"))),
        }
    }

    fn parse_unsigned(&mut self) -> Result<u32, LexerError> {
        let value = self.parse_int()?;
        u32::try_from(value).map_err(|_| self.error(format!("expected a positive integer, found {value}")))
    }

    /// Floats accept integer literals too.
    fn parse_float(&mut self) -> Result<f32, LexerError> {
        match self.lexer.next()? {
            Token::Float(value) => Ok(value as f32),
            Token::Integer(value) => Ok(value as f32),
            other => Err(self.error(format!("expected a float, found {other}"))),
        }
    }

    fn parse_vector<const N: usize>(&mut self) -> Result<[f32; N], LexerError> {
        let (keyword, name) = match N {
            2 => (Token::Vec2, "vec2"),
            3 => (Token::Vec3, "vec3"),
            _ => (Token::Vec4, "vec4"),
        };
        let token = self.lexer.next()?;
        if token != keyword {
            return Err(self.error(format!("expected {name}, found {token}")));
        }
        self.expect(Token::OpenParen)?;
        let mut out = [0.0; N];
        for (index, slot) in out.iter_mut().enumerate() {
            if index > 0 {
                self.expect(Token::Comma)?;
            }
            *slot = self.parse_float()?;
        }
        self.expect(Token::CloseParen)?;
        Ok(out)
    }

    fn parse_value(&mut self, ty: UniformType) -> Result<UniformValue, LexerError> {
        Ok(match ty {
            UniformType::Bool => UniformValue::Bool(self.parse_bool()?),
            UniformType::Int => UniformValue::Int(self.parse_int()?),
            UniformType::Float => UniformValue::Float(self.parse_float()?),
            UniformType::Vec2 => UniformValue::Vec2(Vec2::from_array(self.parse_vector::<2>()?)),
            UniformType::Vec3 => UniformValue::Vec3(Vec3::from_array(self.parse_vector::<3>()?)),
            UniformType::Vec4 => UniformValue::Vec4(Vec4::from_array(self.parse_vector::<4>()?)),
        })
    }

    /// Resolves an identifier through one of the constant tables.
    fn parse_constant<T: Copy>(&mut self, table: &[(&str, T)], what: &str) -> Result<T, LexerError> {
        let name = self.expect_literal(&format!("expected {what}"))?;
        lookup(table, &name).ok_or_else(|| self.error(format!("unrecognized {what} '{name}'")))
    }

    /// `a, b, c` terminated by anything other than a comma.
    fn parse_literal_list(&mut self, what: &str) -> Result<Vec<String>, LexerError> {
        let mut items = vec![self.expect_literal(&format!("expected {what}"))?];
        while self.lexer.peek()? == Token::Comma {
            self.lexer.next()?;
            items.push(self.expect_literal(&format!("expected {what}"))?);
        }
        Ok(items)
    }

    /// Walks `key = value;` entries until the closing brace.
    fn parse_entries<F>(&mut self, mut entry: F) -> Result<(), LexerError>
    where
        F: FnMut(&mut Self, &str) -> Result<(), LexerError>,
    {
        while self.lexer.peek()? != Token::CloseBrace {
            let key = self.expect_literal("expected a key")?;
            self.expect(Token::Equal)?;
            entry(self, &key)?;
            self.expect(Token::SemiColon)?;
        }
        Ok(())
    }

    fn unexpected_key(&self, key: &str) -> LexerError {
        self.error(format!("unexpected key '{key}'"))
    }

    fn block_name(&mut self) -> Result<String, LexerError> {
        self.expect_literal("name is required for preceding block declaration")
    }

    fn parse_block_header(&mut self) -> Result<BlockHeader, LexerError> {
        let mut header = BlockHeader::default();
        self.expect(Token::OpenParen)?;
        if self.lexer.peek()? == Token::CloseParen {
            self.lexer.next()?;
            return Ok(header);
        }

        loop {
            let key = self.expect_literal("expected a key in block header")?;
            self.expect(Token::Equal)?;
            match key.as_str() {
                "target" => header.target = Some(self.expect_literal("expected a render target name")?),
                "blend" => {
                    self.expect(Token::OpenParen)?;
                    let equation = self.parse_constant(BLEND_EQUATIONS, "blend equation")?;
                    self.expect(Token::Comma)?;
                    let source = self.parse_constant(BLEND_FUNCS, "blend function")?;
                    self.expect(Token::Comma)?;
                    let destination = self.parse_constant(BLEND_FUNCS, "blend function")?;
                    self.expect(Token::CloseParen)?;
                    header.blend = Some(BlendState {
                        equation,
                        source,
                        destination,
                    });
                }
                "clear" => header.clear = Some(self.parse_bool()?),
                "clear_color" => header.clear_color = Some(self.parse_vector::<4>()?),
                other => {
                    return Err(self.error(format!("unrecognized key '{other}' in block header")))
                }
            }

            match self.lexer.next()? {
                Token::Comma => {
                    if self.lexer.peek()? == Token::CloseParen {
                        return Err(self.error("trailing comma in block header"));
                    }
                }
                Token::CloseParen => return Ok(header),
                other => {
                    return Err(self.error(format!("expected ',' or ')' in block header, found {other}")))
                }
            }
        }
    }

    fn parse_shared(&mut self) -> Result<(), LexerError> {
        if self.seen_shared {
            return Err(self.error("repeated 'shared' block, only one allowed per technique file"));
        }
        self.seen_shared = true;
        self.expect(Token::OpenBrace)?;
        self.technique.shared = self.jump_block()?;
        self.expect(Token::CloseBrace)
    }

    /// Captures a raw GLSL body, prefixed with a `#line` directive pointing
    /// back into the technique file.
    fn jump_block(&mut self) -> Result<String, LexerError> {
        if !self.lexer.jump() {
            return Err(self.error("unterminated block, missing closing '}'"));
        }
        let block = self
            .lexer
            .last_jump_block()
            .ok_or_else(|| self.error("unterminated block, missing closing '}'"))?;
        Ok(format!("\n#line {}\n{}\n", block.line + 1, block.content))
    }

    fn parse_technique(&mut self) -> Result<(), LexerError> {
        if self.seen_technique {
            return Err(self.error("exactly one 'technique' block can appear per file"));
        }
        self.seen_technique = true;
        self.expect(Token::OpenBrace)?;

        self.parse_entries(|p, key| {
            match key {
                "passes" => p.pass_keys = p.parse_literal_list("a pass name")?,
                "version" => p.technique.version = p.parse_string()?,
                "description" => p.technique.description = p.parse_string()?,
                "author" => p.technique.author = p.parse_string()?,
                "glsl_version" => p.technique.glsl_version = p.parse_unsigned()?,
                "glsl_profile" => p.technique.glsl_profile = p.parse_string()?,
                "glsl_extensions" => {
                    let parenthesised = p.lexer.peek()? == Token::OpenParen;
                    if parenthesised {
                        p.lexer.next()?;
                    }
                    let extensions = p.parse_literal_list("an extension name")?;
                    if parenthesised {
                        p.expect(Token::CloseParen)?;
                    }
                    p.technique.glsl_extensions.extend(extensions);
                }
                "flags" => {
                    for name in p.parse_literal_list("a flag")? {
                        let flag = lookup_ignore_case(TECHNIQUE_FLAGS, &name)
                            .ok_or_else(|| p.error(format!("unrecognized flag '{name}'")))?;
                        p.technique.flags |= flag;
                    }
                }
                "hdr" => p.technique.hdr = p.parse_bool()?,
                other => return Err(p.unexpected_key(other)),
            }
            Ok(())
        })?;

        if self.pass_keys.is_empty() {
            return Err(self.error("pass list in 'technique' block cannot be empty"));
        }
        self.expect(Token::CloseBrace)
    }

    fn parse_main_pass(&mut self) -> Result<(), LexerError> {
        if self.technique.main_template.is_some() {
            return Err(self.error("repeated 'main_pass' block, only one allowed per technique file"));
        }
        if self.technique.name != MAIN_TECHNIQUE {
            return Err(self.error(format!(
                "'main_pass' block can only be defined in the '{MAIN_TECHNIQUE}' technique"
            )));
        }
        self.expect(Token::OpenBrace)?;

        let mut template = TextureTemplate::scene();
        self.parse_entries(|p, key| {
            match key {
                "wrap_s" => template.wrap_s = p.parse_constant(WRAP_MODES, "wrap mode")?,
                "wrap_t" => template.wrap_t = p.parse_constant(WRAP_MODES, "wrap mode")?,
                "internal_format" => {
                    template.internal_format = p.parse_constant(INTERNAL_FORMATS, "internal format")?
                }
                "source_type" => template.source_type = p.parse_constant(SOURCE_TYPES, "source type")?,
                "source_format" => {
                    template.source_format = p.parse_constant(SOURCE_FORMATS, "source format")?
                }
                other => return Err(p.unexpected_key(other)),
            }
            Ok(())
        })?;

        self.technique.main_template = Some(template);
        self.expect(Token::CloseBrace)
    }

    fn parse_render_target(&mut self) -> Result<(), LexerError> {
        let name = self.block_name()?;
        if self.technique.render_targets.contains_key(&name) {
            return Err(self.error(format!("redeclaration of render target '{name}'")));
        }
        self.expect(Token::OpenBrace)?;

        let mut target = RenderTarget::new(name.clone());
        self.parse_entries(|p, key| {
            match key {
                "min_filter" => target.template.min_filter = p.parse_constant(FILTER_MODES, "filter mode")?,
                "mag_filter" => target.template.mag_filter = p.parse_constant(FILTER_MODES, "filter mode")?,
                "wrap_s" => target.template.wrap_s = p.parse_constant(WRAP_MODES, "wrap mode")?,
                "wrap_t" => target.template.wrap_t = p.parse_constant(WRAP_MODES, "wrap mode")?,
                "width_ratio" => target.size.width_ratio = Some(p.parse_float()?),
                "height_ratio" => target.size.height_ratio = Some(p.parse_float()?),
                "width" => target.size.width = Some(p.parse_unsigned()?),
                "height" => target.size.height = Some(p.parse_unsigned()?),
                "internal_format" => {
                    target.template.internal_format =
                        p.parse_constant(INTERNAL_FORMATS, "internal format")?
                }
                "source_type" => {
                    target.template.source_type = p.parse_constant(SOURCE_TYPES, "source type")?
                }
                "source_format" => {
                    target.template.source_format = p.parse_constant(SOURCE_FORMATS, "source format")?
                }
                "mipmaps" => target.mipmaps = p.parse_bool()?,
                other => return Err(p.unexpected_key(other)),
            }
            Ok(())
        })?;

        self.technique.render_targets.insert(name, target);
        self.expect(Token::CloseBrace)
    }

    fn parse_shader(&mut self, stage: ShaderStage) -> Result<(), LexerError> {
        let name = self.block_name()?;
        let header = if self.lexer.peek()? == Token::OpenParen {
            Some(self.parse_block_header()?)
        } else {
            None
        };

        if let Some(existing) = self.pass_map.get(&name) {
            if existing.has_stage(stage) {
                return Err(self.error(format!(
                    "duplicate '{}' block for pass '{name}'",
                    stage.block_name()
                )));
            }
            let mixes_compute = match stage {
                ShaderStage::Compute => {
                    existing.has_stage(ShaderStage::Vertex) || existing.has_stage(ShaderStage::Fragment)
                }
                _ => existing.has_stage(ShaderStage::Compute),
            };
            if mixes_compute {
                return Err(self.error(format!(
                    "pass '{name}' is ambiguous, 'compute' blocks cannot share a name with 'vertex' or 'fragment' blocks"
                )));
            }
        }

        self.expect(Token::OpenBrace)?;
        let body = self.jump_block()?;

        let pass = self
            .pass_map
            .entry(name.clone())
            .or_insert_with(|| Pass::new(name));
        if let Some(header) = header {
            header.apply(pass);
        }
        pass.set_stage_source(stage, body);

        self.expect(Token::CloseBrace)
    }

    fn ensure_unique_uniform(&self, name: &str) -> Result<(), LexerError> {
        if self.technique.uniforms.iter().any(|u| u.name == name) {
            return Err(self.error(format!("redeclaration of uniform '{name}'")));
        }
        Ok(())
    }

    fn parse_sampler(&mut self, kind: SamplerType) -> Result<(), LexerError> {
        let name = self.block_name()?;
        self.ensure_unique_uniform(&name)?;
        self.expect(Token::OpenBrace)?;

        let mut template = TextureTemplate::sampler();
        let mut source = None;
        self.parse_entries(|p, key| {
            match key {
                "min_filter" if kind != SamplerType::Sampler1D => {
                    template.min_filter = p.parse_constant(FILTER_MODES, "filter mode")?
                }
                "mag_filter" if kind != SamplerType::Sampler1D => {
                    template.mag_filter = p.parse_constant(FILTER_MODES, "filter mode")?
                }
                "wrap_s" => template.wrap_s = p.parse_constant(WRAP_MODES, "wrap mode")?,
                "wrap_t" => template.wrap_t = p.parse_constant(WRAP_MODES, "wrap mode")?,
                "wrap_r" if kind == SamplerType::Sampler3D => {
                    template.wrap_r = p.parse_constant(WRAP_MODES, "wrap mode")?
                }
                "source" => source = Some(p.parse_string()?),
                other => return Err(p.unexpected_key(other)),
            }
            Ok(())
        })?;

        let Some(source) = source else {
            return Err(self.error(format!("{kind} '{name}' requires a filename")));
        };

        let technique = self.technique.name.clone();
        self.technique
            .uniforms
            .push(UniformBase::sampler(&technique, &name, kind));
        self.technique.samplers.push(Sampler {
            name,
            kind,
            source,
            template,
        });
        self.expect(Token::CloseBrace)
    }

    fn parse_uniform(&mut self, ty: UniformType) -> Result<(), LexerError> {
        let name = self.block_name()?;
        self.ensure_unique_uniform(&name)?;
        self.expect(Token::OpenBrace)?;

        let mut default = None;
        let mut min = None;
        let mut max = None;
        let mut step = (ty == UniformType::Int).then_some(1.0);
        let mut is_static = false;
        let mut description = None;
        let mut header = None;

        self.parse_entries(|p, key| {
            match key {
                "default" => default = Some(p.parse_value(ty)?),
                "min" => min = Some(p.parse_value(ty)?),
                "max" => max = Some(p.parse_value(ty)?),
                "step" => step = Some(p.parse_float()?),
                "static" => is_static = p.parse_bool()?,
                "description" => description = Some(p.parse_string()?),
                "header" => header = Some(p.parse_string()?),
                other => return Err(p.unexpected_key(other)),
            }
            Ok(())
        })?;

        let technique = self.technique.name.clone();
        let mut uniform =
            UniformBase::value(&technique, &name, default.unwrap_or_else(|| ty.zero()), min, max);
        uniform.step = step;
        uniform.is_static = is_static;
        uniform.description = description;
        uniform.header = header;
        uniform.seed_from(self.settings);
        self.technique.uniforms.push(uniform);

        self.expect(Token::CloseBrace)
    }
}
