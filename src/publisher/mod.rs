//! Publisher — fan-out bus to dashboard subscribers (spec §4.E).

pub mod actor;
pub mod subscriber;

pub use actor::{Publish, PublisherActor, RemoveSubscriber, Subscribe, SubscriberCount};
pub use subscriber::Subscriber;
