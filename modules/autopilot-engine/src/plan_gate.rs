use autopilot_common::{Feature, Plan};

use crate::traits::PlanGate;

/// Static plan-tier table.
#[derive(Debug, Clone, Copy, Default)]
pub struct TierPlanGate;

impl PlanGate for TierPlanGate {
    fn allows(&self, plan: Plan, feature: Feature) -> bool {
        match feature {
            Feature::ContentAutopilot => matches!(plan, Plan::Growth | Plan::Agency),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn autopilot_requires_growth_or_above() {
        let gate = TierPlanGate;
        assert!(!gate.allows(Plan::Trial, Feature::ContentAutopilot));
        assert!(!gate.allows(Plan::Starter, Feature::ContentAutopilot));
        assert!(gate.allows(Plan::Growth, Feature::ContentAutopilot));
        assert!(gate.allows(Plan::Agency, Feature::ContentAutopilot));
    }
}
