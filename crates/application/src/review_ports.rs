mod chat;
mod clock;
mod store;

pub use chat::{ChatGateway, RoleChangeEvent, RoleChangeFeed};
pub use clock::{Clock, SystemClock};
pub use store::{ActivityLog, ApplicationStore};
