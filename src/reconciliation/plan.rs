use crate::membership::MembershipSet;

/// The add/remove diff between a group's current and desired membership.
///
/// Built fresh for every reconciliation and never cached.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconciliationPlan {
    /// In desired but not in current
    pub to_add: Vec<String>,

    /// In current but not in desired
    pub to_remove: Vec<String>,

    /// Present in both
    pub unchanged: Vec<String>,
}

impl ReconciliationPlan {
    /// Check if the group already matches the desired membership
    pub fn is_converged(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }

    /// Number of add and remove operations the plan calls for
    pub fn operation_count(&self) -> usize {
        self.to_add.len() + self.to_remove.len()
    }
}

/// Build the plan for one group.
///
/// Both sets are already normalized, so membership is exact string equality.
pub fn build_reconciliation_plan(
    current: &MembershipSet,
    desired: &MembershipSet,
) -> ReconciliationPlan {
    ReconciliationPlan {
        to_add: desired.difference(current).map(str::to_string).collect(),
        to_remove: current.difference(desired).map(str::to_string).collect(),
        unchanged: desired.intersection(current).map(str::to_string).collect(),
    }
}
