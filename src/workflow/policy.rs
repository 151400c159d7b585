// Transition policy - the fixed table of legal status changes
//
// Built once per process and only ever read. Lookups are pure functions.

use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::LazyLock;

use super::types::{ApprovalType, Role, StoryStatus};

/// A legal (from, to) move and the guards attached to it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionRule {
    pub from: StoryStatus,
    pub to: StoryStatus,
    pub allowed_roles: &'static [Role],
    pub approval_type: Option<ApprovalType>,
    pub requires_notes: bool,
    pub label: &'static str,
}

impl TransitionRule {
    fn new(
        from: StoryStatus,
        to: StoryStatus,
        allowed_roles: &'static [Role],
        label: &'static str,
    ) -> Self {
        Self {
            from,
            to,
            allowed_roles,
            approval_type: None,
            requires_notes: false,
            label,
        }
    }

    fn with_notes(mut self) -> Self {
        self.requires_notes = true;
        self
    }

    fn with_approval(mut self, approval_type: ApprovalType) -> Self {
        self.approval_type = Some(approval_type);
        self
    }

    pub fn requires_approval(&self) -> bool {
        self.approval_type.is_some()
    }

    pub fn allows(&self, role: Role) -> bool {
        self.allowed_roles.contains(&role)
    }
}

/// Outgoing rules of one status
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusConfig {
    pub status: Option<StoryStatus>,
    pub label: String,
    pub transitions: Vec<TransitionRule>,
}

impl StatusConfig {
    /// Fallback for a status string outside the enum: nothing is permitted
    pub fn empty(raw: &str) -> Self {
        Self {
            status: None,
            label: raw.to_string(),
            transitions: Vec::new(),
        }
    }
}

const SENIOR: &[Role] = &[Role::Admin, Role::PortfolioManager];
const MANAGERS: &[Role] = &[Role::Admin, Role::PortfolioManager, Role::ProgramManager];
const AUTHORS: &[Role] = &[
    Role::Admin,
    Role::PortfolioManager,
    Role::ProgramManager,
    Role::BusinessAnalyst,
];
const DELIVERY: &[Role] = &[
    Role::Admin,
    Role::PortfolioManager,
    Role::ProgramManager,
    Role::Developer,
];
const ACCEPTANCE: &[Role] = &[
    Role::Admin,
    Role::PortfolioManager,
    Role::ProgramManager,
    Role::UatManager,
];

fn rules_for(status: StoryStatus) -> Vec<TransitionRule> {
    use StoryStatus::*;

    match status {
        Draft => vec![
            TransitionRule::new(Draft, InternalReview, AUTHORS, "Submit for Internal Review"),
            TransitionRule::new(Draft, NeedsDiscussion, AUTHORS, "Flag for Discussion").with_notes(),
            TransitionRule::new(Draft, OutOfScope, MANAGERS, "Mark Out of Scope").with_notes(),
        ],
        InternalReview => vec![
            TransitionRule::new(InternalReview, PendingClientReview, MANAGERS, "Send to Client")
                .with_approval(ApprovalType::InternalReview),
            TransitionRule::new(InternalReview, Draft, AUTHORS, "Return to Draft").with_notes(),
            TransitionRule::new(InternalReview, NeedsDiscussion, AUTHORS, "Flag for Discussion"),
        ],
        PendingClientReview => vec![
            TransitionRule::new(PendingClientReview, Approved, MANAGERS, "Record Client Approval")
                .with_approval(ApprovalType::Stakeholder),
            TransitionRule::new(PendingClientReview, NeedsDiscussion, MANAGERS, "Flag for Discussion"),
            TransitionRule::new(PendingClientReview, InternalReview, MANAGERS, "Return to Internal Review"),
        ],
        Approved => vec![
            TransitionRule::new(Approved, InDevelopment, DELIVERY, "Start Development"),
            TransitionRule::new(Approved, NeedsDiscussion, MANAGERS, "Flag for Discussion"),
        ],
        InDevelopment => vec![
            TransitionRule::new(InDevelopment, InUat, DELIVERY, "Ready for UAT"),
            TransitionRule::new(InDevelopment, NeedsDiscussion, DELIVERY, "Flag for Discussion"),
        ],
        InUat => vec![
            TransitionRule::new(InUat, Approved, ACCEPTANCE, "Accept UAT"),
            TransitionRule::new(InUat, InDevelopment, ACCEPTANCE, "Return to Development"),
            TransitionRule::new(InUat, NeedsDiscussion, ACCEPTANCE, "Flag for Discussion"),
        ],
        NeedsDiscussion => vec![
            TransitionRule::new(NeedsDiscussion, Draft, AUTHORS, "Return to Draft"),
            TransitionRule::new(NeedsDiscussion, InternalReview, AUTHORS, "Resume Internal Review"),
            TransitionRule::new(NeedsDiscussion, PendingClientReview, MANAGERS, "Resume Client Review"),
            TransitionRule::new(NeedsDiscussion, OutOfScope, MANAGERS, "Mark Out of Scope").with_notes(),
        ],
        OutOfScope => vec![
            TransitionRule::new(OutOfScope, Draft, SENIOR, "Reopen as Draft").with_notes(),
        ],
    }
}

static POLICY: LazyLock<HashMap<StoryStatus, StatusConfig>> = LazyLock::new(|| {
    StoryStatus::ALL
        .into_iter()
        .map(|status| {
            let config = StatusConfig {
                status: Some(status),
                label: status.label().to_string(),
                transitions: rules_for(status),
            };
            (status, config)
        })
        .collect()
});

/// Rule set for a status
pub fn get_config(status: StoryStatus) -> &'static StatusConfig {
    // every variant is inserted when the table is built
    &POLICY[&status]
}

/// Rule set for a status given as a raw string. Unknown strings get the
/// empty fallback instead of an error.
pub fn get_config_raw(raw: &str) -> Cow<'static, StatusConfig> {
    match raw.parse::<StoryStatus>() {
        Ok(status) => Cow::Borrowed(get_config(status)),
        Err(_) => Cow::Owned(StatusConfig::empty(raw)),
    }
}

/// Rules out of `status` the given role may take. `None` never gets any.
pub fn get_allowed_transitions(
    status: StoryStatus,
    role: Option<Role>,
) -> Vec<&'static TransitionRule> {
    let Some(role) = role else {
        return Vec::new();
    };
    get_config(status)
        .transitions
        .iter()
        .filter(|rule| rule.allows(role))
        .collect()
}

pub fn can_transition(from: StoryStatus, to: StoryStatus, role: Option<Role>) -> bool {
    get_allowed_transitions(from, role)
        .iter()
        .any(|rule| rule.to == to)
}

/// String form of [`can_transition`]; unknown statuses are never legal
pub fn can_transition_raw(from: &str, to: &str, role: Option<Role>) -> bool {
    match (from.parse::<StoryStatus>(), to.parse::<StoryStatus>()) {
        (Ok(from), Ok(to)) => can_transition(from, to, role),
        _ => false,
    }
}

/// The rule for (from, to) regardless of role
pub fn find_rule(from: StoryStatus, to: StoryStatus) -> Option<&'static TransitionRule> {
    get_config(from).transitions.iter().find(|rule| rule.to == to)
}

/// Every rule, grouped by source status in lifecycle order
pub fn all_rules() -> impl Iterator<Item = &'static TransitionRule> {
    StoryStatus::ALL
        .into_iter()
        .flat_map(|status| get_config(status).transitions.iter())
}
