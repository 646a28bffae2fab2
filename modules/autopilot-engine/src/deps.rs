use std::sync::Arc;

use autopilot_common::Config;

use crate::brief::GenerationCapability;
use crate::pacer::CallPacer;
use crate::traits::{
    DraftStore, LocationDirectory, PlanGate, TenantDirectory, TriggerSource, VisibilityChecker,
};

/// Central dependency container for a sweep. Every collaborator is injected
/// here; nothing in the engine reaches for globals.
#[derive(Clone)]
pub struct AutopilotDeps {
    pub store: Arc<dyn DraftStore>,
    pub triggers: Arc<dyn TriggerSource>,
    pub locations: Arc<dyn LocationDirectory>,
    pub tenants: Arc<dyn TenantDirectory>,
    pub plan_gate: Arc<dyn PlanGate>,
    pub generation: GenerationCapability,
    /// None disables the recheck pass.
    pub visibility: Option<Arc<dyn VisibilityChecker>>,
    /// Shared by generation and visibility calls for the whole sweep.
    pub pacer: Arc<CallPacer>,
    pub config: Config,
}

impl AutopilotDeps {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn DraftStore>,
        triggers: Arc<dyn TriggerSource>,
        locations: Arc<dyn LocationDirectory>,
        tenants: Arc<dyn TenantDirectory>,
        plan_gate: Arc<dyn PlanGate>,
        generation: GenerationCapability,
        visibility: Option<Arc<dyn VisibilityChecker>>,
        config: Config,
    ) -> Self {
        let pacer = Arc::new(CallPacer::new(config.call_delay));
        Self {
            store,
            triggers,
            locations,
            tenants,
            plan_gate,
            generation,
            visibility,
            pacer,
            config,
        }
    }

    /// Replace the pacer, e.g. with `CallPacer::unpaced()` in tests.
    pub fn with_pacer(mut self, pacer: Arc<CallPacer>) -> Self {
        self.pacer = pacer;
        self
    }
}
