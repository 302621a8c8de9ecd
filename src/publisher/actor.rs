//! `PublisherActor` — the fan-out bus (spec §4.E). Holds the live subscriber
//! set; `publish` serializes an event once and enqueues it onto every
//! subscriber's outbound channel. Every handler here is synchronous and
//! non-suspending (spec §5) — the actual socket write, and therefore failure
//! detection, happens on each subscriber's own drain task (see
//! [`crate::publisher::Subscriber`], [`crate::connection::run_subscriber`]),
//! which evicts itself via [`RemoveSubscriber`] on the first write error.
//! Because delivery is a plain channel send in mailbox order, two events
//! published back-to-back reach one subscriber's socket in that same order —
//! unlike a design that spawns one write task per (event, subscriber) pair,
//! which races across publishes.

use std::collections::HashMap;

use actix::prelude::*;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::codec::ServerEvent;
use crate::publisher::subscriber::Subscriber;

pub struct PublisherActor {
    subscribers: HashMap<Uuid, Subscriber>,
}

impl PublisherActor {
    pub fn new() -> Self {
        Self { subscribers: HashMap::new() }
    }
}

impl Default for PublisherActor {
    fn default() -> Self {
        Self::new()
    }
}

impl Actor for PublisherActor {
    type Context = Context<Self>;
}

/// Adds `subscriber` to the set and enqueues `initial` ahead of the set
/// insertion, so it is the first frame the subscriber's drain task ever sees
/// regardless of any `Publish` processed immediately after (spec §4.E,
/// testable property 6).
#[derive(Message)]
#[rtype(result = "()")]
pub struct Subscribe {
    pub subscriber: Subscriber,
    pub initial: ServerEvent,
}

impl Handler<Subscribe> for PublisherActor {
    type Result = ();

    fn handle(&mut self, msg: Subscribe, _ctx: &mut Self::Context) {
        let frame = match serde_json::to_string(&msg.initial) {
            Ok(f) => f,
            Err(e) => {
                warn!(error = %e, "failed to serialize initial event");
                return;
            }
        };
        if msg.subscriber.tx.send(frame).is_err() {
            debug!(subscriber = %msg.subscriber.id, "subscriber closed before initial frame could be enqueued");
            return;
        }
        self.subscribers.insert(msg.subscriber.id, msg.subscriber);
    }
}

#[derive(Message)]
#[rtype(result = "()")]
pub struct RemoveSubscriber {
    pub id: Uuid,
}

impl Handler<RemoveSubscriber> for PublisherActor {
    type Result = ();

    fn handle(&mut self, msg: RemoveSubscriber, _ctx: &mut Self::Context) {
        if self.subscribers.remove(&msg.id).is_some() {
            debug!(subscriber = %msg.id, "evicted subscriber");
        }
    }
}

/// Serializes `event` once and enqueues it to every current subscriber (spec
/// §4.E `publish`). A subscriber whose channel is already closed (its drain
/// task exited after a failed write) is evicted immediately, synchronously,
/// rather than waiting on a follow-up message (spec testable property 11).
#[derive(Message)]
#[rtype(result = "()")]
pub struct Publish(pub ServerEvent);

impl Handler<Publish> for PublisherActor {
    type Result = ();

    fn handle(&mut self, msg: Publish, _ctx: &mut Self::Context) {
        let frame = match serde_json::to_string(&msg.0) {
            Ok(f) => f,
            Err(e) => {
                warn!(error = %e, "failed to serialize event for publish");
                return;
            }
        };
        self.subscribers.retain(|id, subscriber| {
            let delivered = subscriber.tx.send(frame.clone()).is_ok();
            if !delivered {
                debug!(subscriber = %id, "evicted subscriber with closed channel");
            }
            delivered
        });
    }
}

#[derive(Message)]
#[rtype(result = "usize")]
pub struct SubscriberCount;

impl Handler<SubscriberCount> for PublisherActor {
    type Result = usize;

    fn handle(&mut self, _msg: SubscriberCount, _ctx: &mut Self::Context) -> usize {
        self.subscribers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn subscriber() -> (Subscriber, mpsc::UnboundedReceiver<String>) {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        (Subscriber { id, tx }, rx)
    }

    #[actix::test]
    async fn subscribe_delivers_initial_before_any_publish() {
        let publisher = PublisherActor::new().start();
        let (sub, mut rx) = subscriber();

        publisher
            .send(Subscribe {
                subscriber: sub,
                initial: ServerEvent::Error { error: "initial-marker".into() },
            })
            .await
            .unwrap();
        publisher
            .send(Publish(ServerEvent::Error { error: "second".into() }))
            .await
            .unwrap();

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert!(first.contains("initial-marker"));
        assert!(second.contains("second"));
    }

    #[actix::test]
    async fn publish_order_is_preserved_per_subscriber() {
        let publisher = PublisherActor::new().start();
        let (sub, mut rx) = subscriber();
        publisher
            .send(Subscribe { subscriber: sub, initial: ServerEvent::Error { error: "init".into() } })
            .await
            .unwrap();

        for i in 0..20 {
            publisher.send(Publish(ServerEvent::Error { error: i.to_string() })).await.unwrap();
        }

        let _ = rx.recv().await.unwrap(); // initial
        for i in 0..20 {
            let frame = rx.recv().await.unwrap();
            assert!(frame.contains(&format!("\"{i}\"")), "expected event {i}, got {frame}");
        }
    }

    #[actix::test]
    async fn dropping_receiver_evicts_subscriber_on_next_publish() {
        let publisher = PublisherActor::new().start();
        let (sub, rx) = subscriber();
        publisher
            .send(Subscribe { subscriber: sub, initial: ServerEvent::Error { error: "init".into() } })
            .await
            .unwrap();
        drop(rx);

        publisher.send(Publish(ServerEvent::Error { error: "x".into() })).await.unwrap();
        let count = publisher.send(SubscriberCount).await.unwrap();
        assert_eq!(count, 0);
    }
}
