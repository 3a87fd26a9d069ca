use scenedeck_types::scene::SceneRecord;

/// External confirmation dialog. When the user confirms, the host calls
/// `QuickLoadPanel::delete_scene(scene, true)` with the same scene.
pub trait ConfirmPrompt: Send + Sync {
    fn initiate_action(&self, scene: SceneRecord);
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DeletePhase {
    #[default]
    Idle,
    AwaitingConfirmation {
        scene: SceneRecord,
    },
    RequestSent {
        path: String,
    },
}

/// Two-phase deletion: nothing reaches the host until confirmation.
#[derive(Debug, Default)]
pub struct DeleteFlow {
    phase: DeletePhase,
}

impl DeleteFlow {
    pub fn phase(&self) -> &DeletePhase {
        &self.phase
    }

    pub fn begin(&mut self, scene: SceneRecord) {
        self.phase = DeletePhase::AwaitingConfirmation { scene };
    }

    pub fn awaiting(&self) -> Option<&SceneRecord> {
        match &self.phase {
            DeletePhase::AwaitingConfirmation { scene } => Some(scene),
            _ => None,
        }
    }

    pub fn sent(&mut self, path: impl Into<String>) {
        self.phase = DeletePhase::RequestSent { path: path.into() };
    }

    /// Only a pending confirmation can be cancelled.
    pub fn cancel(&mut self) -> bool {
        if matches!(self.phase, DeletePhase::AwaitingConfirmation { .. }) {
            self.phase = DeletePhase::Idle;
            true
        } else {
            false
        }
    }

    /// Completion notices are not scoped to a scene, so any sent request is
    /// considered finished. A pending confirmation is left alone.
    pub fn complete(&mut self) -> bool {
        if matches!(self.phase, DeletePhase::RequestSent { .. }) {
            self.phase = DeletePhase::Idle;
            true
        } else {
            false
        }
    }
}
