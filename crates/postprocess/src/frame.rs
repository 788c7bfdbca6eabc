//! Hand-off between the update phase and the render phase.
//!
//! The registry never touches backend resources. Everything it decides is
//! sent as a [`FrameMessage`] and applied by the canvas at the start of its
//! next draw, which transfers ownership of the dispatch snapshot instead of
//! sharing it.

use crossbeam_channel::{unbounded, Receiver, Sender};
use fx::{TechniqueFlags, UniformValue};

use crate::attachments::AttachmentSpec;
use crate::dispatch::DispatchArray;

#[derive(Debug, Clone, PartialEq)]
pub enum FrameMessage {
    /// New plan for the slot of `frame`; also queued for the other slot.
    Dispatch { frame: u64, data: DispatchArray },
    Mask { frame: u64, mask: TechniqueFlags },
    /// Scratch buffers and HDR resources must be rebuilt.
    Dirty,
    Attachments(AttachmentSpec),
    Uniform {
        technique: String,
        name: String,
        value: UniformValue,
    },
}

/// Update-side end of the frame channel.
#[derive(Debug, Clone)]
pub struct FramePublisher {
    sender: Sender<FrameMessage>,
}

impl FramePublisher {
    pub fn send(&self, message: FrameMessage) {
        if self.sender.send(message).is_err() {
            tracing::debug!("render side dropped; frame message discarded");
        }
    }
}

pub fn frame_channel() -> (FramePublisher, Receiver<FrameMessage>) {
    let (sender, receiver) = unbounded();
    (FramePublisher { sender }, receiver)
}

/// Slot of the double buffer used for `frame`.
pub fn slot_index(frame: u64) -> usize {
    (frame % 2) as usize
}
