//! Provision state transition table

use hwsync_types::ProvisionState;
use std::fmt;

/// Remediation applied to a node in a given provision state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Remediation {
    /// Bind a profile, register the boot MAC, then request `manage`
    EnrollRemediation,
    /// Request `provide`, or `inspect` when hardware properties are missing
    ManageableAdvance,
    /// Request `manage` again when inspection failed because the hardware
    /// was already claimed
    InspectFailedRecovery,
}

impl fmt::Display for Remediation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Remediation::EnrollRemediation => write!(f, "enroll_remediation"),
            Remediation::ManageableAdvance => write!(f, "manageable_advance"),
            Remediation::InspectFailedRecovery => write!(f, "inspect_failed_recovery"),
        }
    }
}

/// States hwsync acts on. Any state not listed is left alone.
pub const TRANSITIONS: [(ProvisionState, Remediation); 3] = [
    (ProvisionState::Enroll, Remediation::EnrollRemediation),
    (ProvisionState::Manageable, Remediation::ManageableAdvance),
    (ProvisionState::InspectFailed, Remediation::InspectFailedRecovery),
];

/// Remediation for `state`, if hwsync acts on it
pub fn remediation_for(state: &ProvisionState) -> Option<Remediation> {
    TRANSITIONS
        .iter()
        .find(|(s, _)| s == state)
        .map(|(_, remediation)| *remediation)
}
