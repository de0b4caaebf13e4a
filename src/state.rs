use std::path::PathBuf;
use std::sync::Mutex;

use crate::models::plan::Plan;
use crate::scope_path::SandboxRoot;
use crate::services::organize_service::Synthesizer;

#[derive(Debug, Default)]
struct StoredPlan {
    version: u64,
    plan: Plan,
}

/// Single-slot holder for the current plan.
///
/// Every write bumps the version, so a reader can later clear the slot only
/// if nobody replaced the plan in the meantime.
#[derive(Debug, Default)]
pub struct PlanStore {
    slot: Mutex<StoredPlan>,
}

impl PlanStore {
    fn lock(&self) -> std::sync::MutexGuard<'_, StoredPlan> {
        self.slot
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Last write wins.
    pub fn replace(&self, plan: Plan) -> u64 {
        let mut slot = self.lock();
        slot.version += 1;
        slot.plan = plan;
        slot.version
    }

    pub fn current(&self) -> (u64, Plan) {
        let slot = self.lock();
        (slot.version, slot.plan.clone())
    }

    pub fn clear(&self) {
        self.replace(Plan::default());
    }

    /// Clears the plan only if it is still the one read at `version`.
    pub fn clear_if_current(&self, version: u64) -> bool {
        let mut slot = self.lock();
        if slot.version != version {
            return false;
        }
        slot.version += 1;
        slot.plan = Plan::default();
        true
    }
}

pub struct AppState {
    pub sandbox: SandboxRoot,
    pub template_dir: PathBuf,
    pub plans: PlanStore,
    pub synthesizer: Synthesizer,
    /// Serializes the writers of the sandbox (apply and reset).
    pub write_lock: tokio::sync::Mutex<()>,
}

impl AppState {
    pub fn new(sandbox: SandboxRoot, template_dir: PathBuf, synthesizer: Synthesizer) -> Self {
        Self {
            sandbox,
            template_dir,
            plans: PlanStore::default(),
            synthesizer,
            write_lock: tokio::sync::Mutex::new(()),
        }
    }
}
