//! Per-view updates made while the scene is culled.

use fx::StateUpdater;
use glam::{Mat4, Vec2, Vec3};

use crate::attachments::FrameAttachments;
use crate::backend::FramebufferId;

/// Camera state of the view being culled.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewInfo {
    pub view_matrix: Mat4,
    pub eye_pos: Vec3,
    /// Look direction in view-local space.
    pub look: Vec3,
    pub viewport: (u32, u32),
}

/// Where the scene of a view is rendered. With multisampling the scene is
/// drawn into `draw` and resolved into `resolve`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SceneTarget {
    pub draw: FramebufferId,
    pub resolve: Option<FramebufferId>,
}

impl SceneTarget {
    pub fn for_attachments(attachments: &FrameAttachments) -> Self {
        match attachments.multisample {
            Some(multisample) => Self {
                draw: multisample,
                resolve: Some(attachments.primary),
            },
            None => Self {
                draw: attachments.primary,
                resolve: None,
            },
        }
    }
}

#[derive(Debug, Default)]
pub struct PingPongCull {
    last_frame: Option<u64>,
    last_simulation_time: f64,
    last_view_matrix: Mat4,
}

impl PingPongCull {
    pub fn new() -> Self {
        Self::default()
    }

    /// Picks the scene target and, when post-processing is `enabled`,
    /// refreshes the per-view fields of the shared uniform block. Time
    /// fields change once per frame no matter how many views are culled.
    pub fn cull(
        &mut self,
        frame: u64,
        simulation_time: f64,
        view: &ViewInfo,
        attachments: Option<&FrameAttachments>,
        enabled: bool,
        state: &mut StateUpdater,
    ) -> Option<SceneTarget> {
        let target = attachments.map(SceneTarget::for_attachments);
        if !enabled {
            return target;
        }

        state.set_view_matrix(view.view_matrix);
        state.set_prev_view_matrix(self.last_view_matrix);
        self.last_view_matrix = view.view_matrix;
        state.set_eye_pos(view.eye_pos);
        state.set_eye_vec(view.look);
        state.set_resolution(Vec2::new(view.viewport.0 as f32, view.viewport.1 as f32));

        if self.last_frame != Some(frame) {
            self.last_frame = Some(frame);
            let delta = simulation_time - self.last_simulation_time;
            state.set_simulation_time(simulation_time as f32, delta as f32);
            self.last_simulation_time = simulation_time;
        }

        target
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attachments::AttachmentSpec;
    use crate::backend::RecordingBackend;
    use fx::{InternalFormat, TextureTemplate};

    fn view(x: f32) -> ViewInfo {
        ViewInfo {
            view_matrix: Mat4::from_translation(Vec3::new(x, 0.0, 0.0)),
            eye_pos: Vec3::new(-x, 0.0, 0.0),
            look: Vec3::NEG_Z,
            viewport: (1280, 720),
        }
    }

    #[test]
    fn previous_view_trails_by_one_cull() {
        let mut cull = PingPongCull::new();
        let mut state = StateUpdater::new(true);
        cull.cull(1, 0.5, &view(1.0), None, true, &mut state);
        assert_eq!(state.data().prev_view_matrix, Mat4::IDENTITY);

        cull.cull(2, 0.6, &view(2.0), None, true, &mut state);
        assert_eq!(state.data().prev_view_matrix, view(1.0).view_matrix);
        assert_eq!(state.data().resolution, Vec2::new(1280.0, 720.0));
        assert_eq!(state.data().eye_vec.z, -1.0);
    }

    #[test]
    fn time_advances_once_per_frame() {
        let mut cull = PingPongCull::new();
        let mut state = StateUpdater::new(true);
        cull.cull(1, 2.0, &view(0.0), None, true, &mut state);
        cull.cull(2, 2.5, &view(0.0), None, true, &mut state);
        assert_eq!(state.data().simulation_time, 2.5);
        assert_eq!(state.data().delta_simulation_time, 0.5);

        // second view of the same frame
        cull.cull(2, 9.0, &view(0.0), None, true, &mut state);
        assert_eq!(state.data().simulation_time, 2.5);
    }

    #[test]
    fn disabled_only_selects_the_target() {
        let mut backend = RecordingBackend::new();
        let spec = AttachmentSpec {
            width: 64,
            height: 64,
            main_template: TextureTemplate::scene(),
            depth_format: InternalFormat::DepthComponent24,
            samples: 4,
            opaque_depth: false,
        };
        let attachments = FrameAttachments::create(&mut backend, &spec, 0);
        let mut cull = PingPongCull::new();
        let mut state = StateUpdater::new(true);
        let target = cull
            .cull(1, 1.0, &view(3.0), Some(&attachments), false, &mut state)
            .expect("scene target");
        assert_eq!(target.resolve, Some(attachments.primary));
        assert_eq!(Some(target.draw), attachments.multisample);
        assert_eq!(state.data().view_matrix, Mat4::IDENTITY);
    }
}
