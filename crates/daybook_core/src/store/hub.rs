//! Fan-out of snapshots to live subscribers.

use super::{EventSink, StoreEvent, StorePayload, SubscriptionKey};
use crate::model::record::RecordKind;
use log::debug;

struct Subscriber {
    token: u64,
    key: SubscriptionKey,
    sink: EventSink,
}

/// Subscriber registry shared by the store adapters.
///
/// Subscribers whose receiving end is gone are pruned on the next publish.
#[derive(Default)]
pub(crate) struct SubscriberHub {
    next_token: u64,
    subscribers: Vec<Subscriber>,
}

impl SubscriberHub {
    /// Registers a sink and returns the token used to remove it.
    pub(crate) fn add(&mut self, key: SubscriptionKey, sink: EventSink) -> u64 {
        self.next_token += 1;
        self.subscribers.push(Subscriber {
            token: self.next_token,
            key,
            sink,
        });
        self.next_token
    }

    pub(crate) fn remove(&mut self, token: u64) {
        self.subscribers.retain(|subscriber| subscriber.token != token);
    }

    pub(crate) fn len(&self) -> usize {
        self.subscribers.len()
    }

    /// Sends one delivery to `token` only.
    pub(crate) fn send_to(&mut self, token: u64, payload: StorePayload) {
        let mut closed = false;
        if let Some(subscriber) = self.subscribers.iter().find(|s| s.token == token) {
            closed = subscriber
                .sink
                .send(StoreEvent {
                    key: subscriber.key.clone(),
                    payload,
                })
                .is_err();
        }
        if closed {
            self.remove(token);
        }
    }

    /// Sends a fresh payload to every subscriber of `kind` for `owner_id`.
    ///
    /// Returns the number of deliveries made.
    pub(crate) fn publish(
        &mut self,
        kind: RecordKind,
        owner_id: &str,
        mut payload: impl FnMut() -> StorePayload,
    ) -> usize {
        let mut delivered = 0;
        let before = self.subscribers.len();
        self.subscribers.retain(|subscriber| {
            if subscriber.key.kind != kind || subscriber.key.owner_id != owner_id {
                return true;
            }
            let event = StoreEvent {
                key: subscriber.key.clone(),
                payload: payload(),
            };
            let alive = subscriber.sink.send(event).is_ok();
            if alive {
                delivered += 1;
            }
            alive
        });

        let pruned = before - self.subscribers.len();
        if pruned > 0 {
            debug!(
                "event=subscriber_prune module=store status=ok kind={} pruned={}",
                kind.as_str(),
                pruned
            );
        }
        delivered
    }
}
