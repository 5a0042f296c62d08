// Events module - Typed publish/subscribe fabric
pub mod bus;
pub mod event;

pub use bus::{EventBus, SubscriptionToken};
pub use event::{Event, EventKind};
