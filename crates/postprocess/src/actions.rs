//! Deferred chain edits requested by scripts.
//!
//! Scripts never touch the registry directly. They hold a [`ShaderHandle`]
//! and queue [`Action`]s that [`PostProcessor::apply_actions`] applies at the
//! start of the next update.
//!
//! [`PostProcessor::apply_actions`]: crate::PostProcessor::apply_actions

use std::fmt;

use crossbeam_channel::Sender;
use fx::UniformValue;

use crate::postprocessor::TechniqueId;

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Toggle {
        id: TechniqueId,
        enable: bool,
        position: Option<i32>,
    },
    SetUniform {
        id: TechniqueId,
        name: String,
        value: UniformValue,
    },
    AddTemplate(TechniqueId),
}

#[derive(Debug, Clone)]
pub struct ActionSender {
    sender: Sender<Action>,
}

impl ActionSender {
    pub(crate) fn new(sender: Sender<Action>) -> Self {
        Self { sender }
    }

    pub fn send(&self, action: Action) {
        if self.sender.send(action).is_err() {
            tracing::warn!("post processor dropped; action discarded");
        }
    }
}

/// A technique as seen by a script.
#[derive(Debug, Clone)]
pub struct ShaderHandle {
    id: TechniqueId,
    name: String,
    file_name: String,
    valid: bool,
    queued: bool,
    sender: ActionSender,
}

impl ShaderHandle {
    pub(crate) fn new(
        id: TechniqueId,
        name: &str,
        file_name: &str,
        valid: bool,
        sender: ActionSender,
    ) -> Self {
        Self {
            id,
            name: name.to_owned(),
            file_name: file_name.to_owned(),
            valid,
            queued: false,
            sender,
        }
    }

    pub fn id(&self) -> TechniqueId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Queues insertion into the chain. Invalid techniques are still sent but
    /// never report as enabled.
    pub fn enable(&mut self, position: Option<i32>) {
        if self.valid {
            self.queued = true;
        }
        self.sender.send(Action::Toggle {
            id: self.id,
            enable: true,
            position,
        });
    }

    pub fn disable(&mut self) {
        self.queued = false;
        self.sender.send(Action::Toggle {
            id: self.id,
            enable: false,
            position: None,
        });
    }

    /// State as last requested by this handle, not as applied.
    pub fn is_enabled(&self) -> bool {
        self.queued
    }

    pub fn set_uniform(&self, name: &str, value: impl Into<UniformValue>) {
        self.sender.send(Action::SetUniform {
            id: self.id,
            name: name.to_owned(),
            value: value.into(),
        });
    }
}

impl fmt::Display for ShaderHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Shader({}, {})", self.name, self.file_name)
    }
}
