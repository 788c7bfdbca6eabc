//! Per-frame execution plan.
//!
//! A `DispatchArray` is an owned snapshot built by the registry from the
//! enabled chain. The render side never reaches back into techniques; all it
//! needs to draw a node is copied in here.

use fx::{PassState, PassType, Sampler, Technique, TechniqueFlags, TextureTemplate, UniformValue};
use serde::Serialize;

use crate::postprocessor::TechniqueId;

/// A technique render target resolved against the back buffer size.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderTargetDesc {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub mip_levels: u32,
    pub template: TextureTemplate,
}

impl RenderTargetDesc {
    pub fn is_mipmapped(&self) -> bool {
        self.mip_levels > 1
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubPass {
    pub state: PassState,
    /// Explicit render target; `None` means the engine picks a scratch
    /// buffer or the destination.
    pub target: Option<RenderTargetDesc>,
}

impl SubPass {
    pub fn is_compute(&self) -> bool {
        self.state.kind == PassType::Compute
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DispatchNode {
    pub id: TechniqueId,
    pub technique: String,
    /// Compile generation of the technique; keys cached GPU programs.
    pub generation: u64,
    pub flags: TechniqueFlags,
    pub hdr: bool,
    pub samplers: Vec<Sampler>,
    pub render_targets: Vec<RenderTargetDesc>,
    pub uniforms: Vec<(String, UniformValue)>,
    pub passes: Vec<SubPass>,
}

pub type DispatchArray = Vec<DispatchNode>;

impl DispatchNode {
    /// Snapshots a compiled technique, sizing its render targets for a
    /// `width` x `height` back buffer.
    pub fn build(id: TechniqueId, technique: &Technique, width: u32, height: u32) -> Self {
        let render_targets: Vec<RenderTargetDesc> = technique
            .render_targets()
            .values()
            .map(|target| {
                let (w, h) = target.size.get(width, height);
                RenderTargetDesc {
                    name: target.name.clone(),
                    width: w,
                    height: h,
                    mip_levels: target.mip_levels(w, h),
                    template: target.template,
                }
            })
            .collect();

        let passes = technique
            .passes()
            .iter()
            .map(|pass| SubPass {
                state: pass.prepare_state(technique.name()),
                target: pass.target.as_ref().and_then(|name| {
                    render_targets.iter().find(|rt| &rt.name == name).cloned()
                }),
            })
            .collect();

        let uniforms = technique
            .uniforms()
            .iter()
            .filter(|u| !u.is_sampler())
            .filter_map(|u| u.current().map(|value| (u.name.clone(), value)))
            .collect();

        Self {
            id,
            technique: technique.name().to_owned(),
            generation: technique.generation(),
            flags: technique.flags(),
            hdr: technique.hdr(),
            samplers: technique.samplers().to_vec(),
            render_targets,
            uniforms,
            passes,
        }
    }

    /// Index of the last pass that does not draw into a named render target.
    pub fn resolve_pass(&self) -> Option<usize> {
        self.passes.iter().rposition(|pass| pass.target.is_none())
    }

    pub fn set_uniform(&mut self, name: &str, value: UniformValue) -> bool {
        match self.uniforms.iter_mut().find(|(n, _)| n == name) {
            Some(slot) => {
                slot.1 = value;
                true
            }
            None => false,
        }
    }
}

/// Flags that disable a technique under the given world conditions.
pub fn frame_mask(underwater: bool, exterior: bool) -> TechniqueFlags {
    let water = if underwater {
        TechniqueFlags::DISABLE_UNDERWATER
    } else {
        TechniqueFlags::DISABLE_ABOVEWATER
    };
    let location = if exterior {
        TechniqueFlags::DISABLE_EXTERIORS
    } else {
        TechniqueFlags::DISABLE_INTERIORS
    };
    water | location
}

/// Indices of the nodes that survive `mask`, in chain order.
pub fn filter_nodes(data: &[DispatchNode], mask: TechniqueFlags) -> Vec<usize> {
    data.iter()
        .enumerate()
        .filter(|(_, node)| !node.flags.intersects(mask))
        .map(|(index, _)| index)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use fx::{CompileOptions, MemorySource};
    use fxconfig::ShaderSettings;

    fn node(name: &str, flags: TechniqueFlags) -> DispatchNode {
        DispatchNode {
            id: TechniqueId(0),
            technique: name.into(),
            generation: 1,
            flags,
            hdr: false,
            samplers: Vec::new(),
            render_targets: Vec::new(),
            uniforms: Vec::new(),
            passes: Vec::new(),
        }
    }

    #[test]
    fn mask_picks_one_flag_per_condition() {
        assert_eq!(
            frame_mask(true, true),
            TechniqueFlags::DISABLE_UNDERWATER | TechniqueFlags::DISABLE_EXTERIORS
        );
        assert_eq!(
            frame_mask(false, false),
            TechniqueFlags::DISABLE_ABOVEWATER | TechniqueFlags::DISABLE_INTERIORS
        );
    }

    #[test]
    fn filtering_drops_masked_nodes() {
        let data = vec![
            node("main", TechniqueFlags::empty()),
            node("caustics", TechniqueFlags::DISABLE_ABOVEWATER),
            node("rain", TechniqueFlags::DISABLE_UNDERWATER | TechniqueFlags::HIDDEN),
        ];
        assert_eq!(filter_nodes(&data, frame_mask(true, true)), vec![0, 1]);
        assert_eq!(filter_nodes(&data, frame_mask(false, true)), vec![0, 2]);
    }

    #[test]
    fn build_resolves_targets_and_resolve_pass() {
        let mut source = MemorySource::new();
        source.insert(
            "blur",
            r#"
render_target RT_Quarter { width_ratio = 0.25; height_ratio = 0.25; mipmaps = true; }
uniform_float radius { default = 3.0; }
fragment down(target = RT_Quarter) { void main() {} }
fragment up { void main() {} }
fragment overlay(target = RT_Quarter) { void main() {} }
technique { passes = down, up, overlay; }
"#,
        );
        let mut technique = fx::Technique::new(
            "blur",
            CompileOptions {
                use_ubo: true,
                ..CompileOptions::default()
            },
        );
        assert!(technique.compile(&source, &ShaderSettings::new()));

        let node = DispatchNode::build(TechniqueId(3), &technique, 1600, 900);
        assert_eq!(node.passes.len(), 3);
        let target = node.passes[0].target.as_ref().expect("target");
        assert_eq!((target.width, target.height), (400, 225));
        assert!(target.is_mipmapped());
        assert_eq!(node.resolve_pass(), Some(1));
        assert_eq!(node.uniforms, vec![("radius".to_owned(), UniformValue::Float(3.0))]);
    }
}
