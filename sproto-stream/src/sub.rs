//! SUB: filtered broadcast receiver. Holds the subscription prefix
//! list itself (built via `setsockopt(SUBSCRIBE/UNSUBSCRIBE)`, not a
//! protocol message) and drops any inbound body that matches no
//! subscription, via `sproto_core::subscription::SubscriptionTrie` — the
//! same topic-matching structure works regardless of who propagates it
//! upstream.

use crate::base::{PipeId, RawBase};
use crate::protocol_ids;
use crate::socket_trait::{Protocol, Readiness, StopOutcome};
use sproto_core::error::{Error, Result};
use sproto_core::message::Message;
use sproto_core::pipe::Priority;
use sproto_core::subscription::SubscriptionTrie;

const ACCEPTED_PEERS: [u16; 1] = [protocol_ids::PUB];

pub struct SubProtocol {
    base: RawBase,
    subscriptions: SubscriptionTrie,
    send_hwm: usize,
    recv_hwm: usize,
}

impl Default for SubProtocol {
    fn default() -> Self {
        Self::new(crate::DEFAULT_HWM, crate::DEFAULT_HWM)
    }
}

impl SubProtocol {
    #[must_use]
    pub fn new(send_hwm: usize, recv_hwm: usize) -> Self {
        Self {
            base: RawBase::new(),
            subscriptions: SubscriptionTrie::new(),
            send_hwm,
            recv_hwm,
        }
    }

    pub fn subscribe(&mut self, prefix: impl Into<bytes::Bytes>) {
        self.subscriptions.subscribe(prefix.into());
    }

    pub fn unsubscribe(&mut self, prefix: impl Into<bytes::Bytes>) {
        self.subscriptions.unsubscribe(&prefix.into());
    }
}

impl Protocol for SubProtocol {
    fn protocol_id(&self) -> u16 {
        protocol_ids::SUB
    }

    fn accepted_peers(&self) -> &'static [u16] {
        &ACCEPTED_PEERS
    }

    fn add_pipe(&mut self) -> PipeId {
        self.base.add_pipe(self.send_hwm, self.recv_hwm, Priority::default())
    }

    fn rm_pipe(&mut self, id: PipeId) {
        self.base.rm_pipe(id);
    }

    fn stop(&mut self) -> StopOutcome {
        if self.base.is_empty() {
            StopOutcome::Idle
        } else {
            StopOutcome::Pending
        }
    }

    fn in_event(&mut self, _id: PipeId) {}

    fn out_event(&mut self, _id: PipeId) {}

    fn events(&self) -> Readiness {
        Readiness {
            readable: self.base.any_readable(),
            writable: false,
        }
    }

    fn send(&mut self, _msg: Message) -> Result<()> {
        Err(Self::unsupported("send"))
    }

    fn pipe_deliver_inbound(&mut self, id: PipeId, msg: Message) -> Result<bool> {
        self.base.get_mut(id).map_or(Ok(false), |p| p.deliver_inbound(msg))
    }

    fn pipe_take_outbound(&mut self, id: PipeId) -> Option<Message> {
        self.base.get_mut(id).and_then(sproto_core::pipe::Pipe::next_outbound)
    }

    fn pipe_mark_flushed(&mut self, id: PipeId) {
        if let Some(p) = self.base.get_mut(id) {
            p.mark_flushed();
        }
    }

    fn recv(&mut self) -> Result<Message> {
        loop {
            match self.base.recv_fair() {
                Some((_, msg)) => {
                    if self.subscriptions.matches(msg.body()) {
                        return Ok(msg);
                    }
                    // No subscription matches: drop silently and keep
                    // looking at the next ready pipe this tick.
                }
                None => return Err(Error::Again),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsubscribed_topics_are_dropped() {
        let mut sub = SubProtocol::new(crate::DEFAULT_HWM, crate::DEFAULT_HWM);
        sub.add_pipe();
        let id = sub.base.pipe_ids()[0];
        sub.subscribe(&b"topic."[..]);

        sub.base.get_mut(id).unwrap().deliver_inbound(Message::from_body("other.x")).unwrap();
        assert!(matches!(sub.recv(), Err(Error::Again)));

        sub.base.get_mut(id).unwrap().deliver_inbound(Message::from_body("topic.y")).unwrap();
        assert_eq!(sub.recv().unwrap().body(), b"topic.y");
    }

    #[test]
    fn no_subscriptions_means_nothing_delivered() {
        let mut sub = SubProtocol::new(crate::DEFAULT_HWM, crate::DEFAULT_HWM);
        sub.add_pipe();
        let id = sub.base.pipe_ids()[0];
        sub.base.get_mut(id).unwrap().deliver_inbound(Message::from_body("anything")).unwrap();
        assert!(matches!(sub.recv(), Err(Error::Again)));
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let mut sub = SubProtocol::new(crate::DEFAULT_HWM, crate::DEFAULT_HWM);
        sub.add_pipe();
        let id = sub.base.pipe_ids()[0];
        sub.subscribe(&b"a"[..]);
        sub.unsubscribe(&b"a"[..]);
        sub.base.get_mut(id).unwrap().deliver_inbound(Message::from_body("abc")).unwrap();
        assert!(matches!(sub.recv(), Err(Error::Again)));
    }
}
