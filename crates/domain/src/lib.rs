//! Domain entities and invariants.

#![forbid(unsafe_code)]

mod activity;
mod application;
mod eligibility;
mod notification;
mod policy;

pub use activity::{ActivityKind, ActivityLogEntry};
pub use application::{
    ApplicationNote, ApplicationStatus, DecisionKind, MembershipApplication, Priority,
    SubmitApplicationInput,
};
pub use eligibility::{ReapplicationBlock, ReapplicationDecision, evaluate_reapplication};
pub use notification::{NotificationJob, NotificationPayload};
pub use policy::{
    ApplicationTypePolicy, ApplicationTypeRegistry, Capability, RoleSet, StaffRolePolicy,
};
