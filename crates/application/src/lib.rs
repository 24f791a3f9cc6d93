//! Application services and ports for the review and notification core.

#![forbid(unsafe_code)]

mod dispatch_service;
mod reactor_service;
mod review_ports;
mod review_service;
mod role_service;

pub use dispatch_service::{DispatchStats, NotificationDispatcher};
pub use reactor_service::{ReactorOutcome, RoleChangeReactor};
pub use review_ports::{
    ActivityLog, ApplicationStore, ChatGateway, Clock, RoleChangeEvent, RoleChangeFeed,
    SystemClock,
};
pub use review_service::{
    BulkAction, BulkOutcome, DecisionOutcome, ReviewActor, ReviewService, SubmitApplication,
};
pub use role_service::RoleResolver;
