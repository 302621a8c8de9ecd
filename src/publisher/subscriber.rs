//! A single dashboard subscriber connection handle (spec §3 "Subscriber").

use tokio::sync::mpsc::UnboundedSender;
use uuid::Uuid;

/// The publisher only ever hands a subscriber a serialized frame; the actual
/// socket write happens on a dedicated per-connection task (owned by
/// [`crate::connection::run_subscriber`]) that drains this channel in order.
/// This keeps every [`crate::publisher::PublisherActor`] handler
/// non-suspending (spec §5) while still guaranteeing that frames reach one
/// subscriber's socket in the order they were published.
#[derive(Clone)]
pub struct Subscriber {
    pub id: Uuid,
    pub tx: UnboundedSender<String>,
}
