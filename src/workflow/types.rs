// Core types for the story workflow
//
// Statuses and roles are closed enums. Adding a variant breaks every
// exhaustive match (policy table, timestamp slots, notification routing)
// until it is handled.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Lifecycle states of a story
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoryStatus {
    Draft,
    InternalReview,
    PendingClientReview,
    Approved,
    InDevelopment,
    InUat,
    NeedsDiscussion,
    OutOfScope,
}

impl StoryStatus {
    pub const ALL: [StoryStatus; 8] = [
        StoryStatus::Draft,
        StoryStatus::InternalReview,
        StoryStatus::PendingClientReview,
        StoryStatus::Approved,
        StoryStatus::InDevelopment,
        StoryStatus::InUat,
        StoryStatus::NeedsDiscussion,
        StoryStatus::OutOfScope,
    ];

    /// Storage tag, e.g. `internal_review`
    pub fn as_str(&self) -> &'static str {
        match self {
            StoryStatus::Draft => "draft",
            StoryStatus::InternalReview => "internal_review",
            StoryStatus::PendingClientReview => "pending_client_review",
            StoryStatus::Approved => "approved",
            StoryStatus::InDevelopment => "in_development",
            StoryStatus::InUat => "in_uat",
            StoryStatus::NeedsDiscussion => "needs_discussion",
            StoryStatus::OutOfScope => "out_of_scope",
        }
    }

    /// Human-readable name, e.g. `Internal Review`
    pub fn label(&self) -> &'static str {
        match self {
            StoryStatus::Draft => "Draft",
            StoryStatus::InternalReview => "Internal Review",
            StoryStatus::PendingClientReview => "Pending Client Review",
            StoryStatus::Approved => "Approved",
            StoryStatus::InDevelopment => "In Development",
            StoryStatus::InUat => "In UAT",
            StoryStatus::NeedsDiscussion => "Needs Discussion",
            StoryStatus::OutOfScope => "Out of Scope",
        }
    }

    /// Column holding the first-entry timestamp for this status
    pub fn timestamp_column(&self) -> &'static str {
        match self {
            StoryStatus::Draft => "draft_at",
            StoryStatus::InternalReview => "internal_review_at",
            StoryStatus::PendingClientReview => "pending_client_review_at",
            StoryStatus::Approved => "approved_at",
            StoryStatus::InDevelopment => "in_development_at",
            StoryStatus::InUat => "in_uat_at",
            StoryStatus::NeedsDiscussion => "needs_discussion_at",
            StoryStatus::OutOfScope => "out_of_scope_at",
        }
    }
}

impl fmt::Display for StoryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown story status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for StoryStatus {
    type Err = UnknownStatus;

    /// Accepts either the label (`In UAT`) or the storage tag (`in_uat`),
    /// case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace([' ', '-'], "_");
        StoryStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == normalized)
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

/// Caller roles, most senior first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    PortfolioManager,
    ProgramManager,
    BusinessAnalyst,
    Developer,
    UatManager,
    Viewer,
}

impl Role {
    pub const ALL: [Role; 7] = [
        Role::Admin,
        Role::PortfolioManager,
        Role::ProgramManager,
        Role::BusinessAnalyst,
        Role::Developer,
        Role::UatManager,
        Role::Viewer,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::PortfolioManager => "portfolio_manager",
            Role::ProgramManager => "program_manager",
            Role::BusinessAnalyst => "business_analyst",
            Role::Developer => "developer",
            Role::UatManager => "uat_manager",
            Role::Viewer => "viewer",
        }
    }

    /// Program-scoped roles only see stories of programs they are assigned to
    pub fn is_program_scoped(&self) -> bool {
        match self {
            Role::Admin | Role::PortfolioManager | Role::Viewer => false,
            Role::ProgramManager | Role::BusinessAnalyst | Role::Developer | Role::UatManager => {
                true
            }
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown role: {0}")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace([' ', '-'], "_");
        Role::ALL
            .into_iter()
            .find(|role| role.as_str() == normalized)
            .ok_or_else(|| UnknownRole(s.to_string()))
    }
}

/// Kind of sign-off a regulated transition records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalType {
    InternalReview,
    Stakeholder,
}

impl ApprovalType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalType::InternalReview => "internal_review",
            ApprovalType::Stakeholder => "stakeholder",
        }
    }
}

impl FromStr for ApprovalType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "internal_review" => Ok(ApprovalType::InternalReview),
            "stakeholder" => Ok(ApprovalType::Stakeholder),
            other => Err(format!("unknown approval type: {other}")),
        }
    }
}

impl fmt::Display for ApprovalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome recorded on an approval ledger entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalDecision {
    Approved,
    Rejected,
    NeedsDiscussion,
}

impl ApprovalDecision {
    /// The decision a move into `target` implies
    pub fn for_target(target: StoryStatus) -> Self {
        match target {
            StoryStatus::NeedsDiscussion => ApprovalDecision::NeedsDiscussion,
            StoryStatus::Draft | StoryStatus::OutOfScope => ApprovalDecision::Rejected,
            StoryStatus::InternalReview
            | StoryStatus::PendingClientReview
            | StoryStatus::Approved
            | StoryStatus::InDevelopment
            | StoryStatus::InUat => ApprovalDecision::Approved,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalDecision::Approved => "approved",
            ApprovalDecision::Rejected => "rejected",
            ApprovalDecision::NeedsDiscussion => "needs_discussion",
        }
    }
}

impl FromStr for ApprovalDecision {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "approved" => Ok(ApprovalDecision::Approved),
            "rejected" => Ok(ApprovalDecision::Rejected),
            "needs_discussion" => Ok(ApprovalDecision::NeedsDiscussion),
            other => Err(format!("unknown approval decision: {other}")),
        }
    }
}

impl fmt::Display for ApprovalDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
