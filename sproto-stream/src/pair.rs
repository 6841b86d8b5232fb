//! PAIR: strict one-to-one connection. A second pipe attaching while
//! already paired is dropped rather than adopted — a single-peer
//! assumption made explicit here instead of implicit in a one-slot
//! `Option`.

use crate::base::{PipeId, RawBase};
use crate::protocol_ids;
use crate::socket_trait::{Protocol, Readiness, StopOutcome};
use sproto_core::error::{Error, Result};
use sproto_core::message::Message;
use sproto_core::pipe::{PipeResult, PipeResult2, Priority};

const ACCEPTED_PEERS: [u16; 1] = [protocol_ids::PAIR];

pub struct PairProtocol {
    base: RawBase,
    peer: Option<PipeId>,
    send_hwm: usize,
    recv_hwm: usize,
}

impl Default for PairProtocol {
    fn default() -> Self {
        Self::new(crate::DEFAULT_HWM, crate::DEFAULT_HWM)
    }
}

impl PairProtocol {
    #[must_use]
    pub fn new(send_hwm: usize, recv_hwm: usize) -> Self {
        Self {
            base: RawBase::new(),
            peer: None,
            send_hwm,
            recv_hwm,
        }
    }
}

impl Protocol for PairProtocol {
    fn protocol_id(&self) -> u16 {
        protocol_ids::PAIR
    }

    fn accepted_peers(&self) -> &'static [u16] {
        &ACCEPTED_PEERS
    }

    fn add_pipe(&mut self) -> PipeId {
        if self.peer.is_some() {
            // Already paired: mint and immediately evict an id distinct
            // from the real peer's, so the caller gets a valid but inert
            // handle for the connection it must now tear back down rather
            // than one that collides with the pipe already in use.
            let rejected = self.base.add_pipe(self.send_hwm, self.recv_hwm, Priority::default());
            self.base.rm_pipe(rejected);
            return rejected;
        }
        let id = self.base.add_pipe(self.send_hwm, self.recv_hwm, Priority::default());
        self.peer = Some(id);
        id
    }

    fn rm_pipe(&mut self, id: PipeId) {
        self.base.rm_pipe(id);
        if self.peer == Some(id) {
            self.peer = None;
        }
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
        match self.peer.and_then(|id| self.base.get(id)) {
            Some(pipe) => Readiness {
                readable: pipe.is_readable(),
                writable: pipe.is_writable(),
            },
            None => Readiness::default(),
        }
    }

    fn send(&mut self, msg: Message) -> Result<()> {
        let id = self.peer.ok_or(Error::Again)?;
        let pipe = self.base.get_mut(id).expect("peer id always has a pipe");
        match pipe.send(msg) {
            PipeResult::Ok => Ok(()),
            PipeResult::Again => Err(Error::Again),
        }
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
        let id = self.peer.ok_or(Error::Again)?;
        let pipe = self.base.get_mut(id).expect("peer id always has a pipe");
        match pipe.recv() {
            PipeResult2::Ok(msg) => Ok(msg),
            PipeResult2::Again => Err(Error::Again),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_connection_is_rejected() {
        let mut pair = PairProtocol::new(crate::DEFAULT_HWM, crate::DEFAULT_HWM);
        let first = pair.add_pipe();
        assert_eq!(pair.peer, Some(first));
        let second = pair.add_pipe();
        assert_ne!(second, first);
        assert_eq!(pair.peer, Some(first));
        assert_eq!(pair.base.len(), 1);
    }

    #[test]
    fn send_recv_round_trip() {
        let mut pair = PairProtocol::new(crate::DEFAULT_HWM, crate::DEFAULT_HWM);
        let id = pair.add_pipe();

        pair.send(Message::from_body("ABC")).unwrap();
        pair.base.get_mut(id).unwrap().next_outbound();

        pair.base.get_mut(id).unwrap().deliver_inbound(Message::from_body("DEFG")).unwrap();
        let got = pair.recv().unwrap();
        assert_eq!(got.body(), b"DEFG");
    }

    #[test]
    fn send_without_peer_is_again() {
        let mut pair = PairProtocol::new(crate::DEFAULT_HWM, crate::DEFAULT_HWM);
        assert!(matches!(pair.send(Message::from_body("x")), Err(Error::Again)));
    }
}
