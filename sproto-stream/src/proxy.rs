//! Devices: raw forwarders bridging two sockets.
//!
//! `device(a, b)` never runs a protocol FSM of its own — it operates on
//! `SP_RAW` sockets and just copies messages, decrementing each message's
//! hop count along the way. A plain frontend/backend forwarding loop,
//! using the flat TTL-byte scheme rather than ZMTP's
//! XSUB/XPUB/ROUTER/DEALER-specific envelope handling.

use sproto_core::error::{Error, Result};
use sproto_core::message::Message;

/// Bare message transport a device forwards between — implemented by
/// whatever owns a socket's raw pipes (the facade's `RawSocket`, see
/// `sproto::socket`).
pub trait RawEndpoint {
    fn try_recv(&mut self) -> Result<Message>;
    fn try_send(&mut self, msg: Message) -> Result<()>;
    /// `true` once the underlying socket has been closed — `device` exits
    /// with `Error::BadFd` when either side reports this.
    fn is_closed(&self) -> bool;
}

const FINAL_HOP: u8 = 0x80;
const TTL_MASK: u8 = 0x7F;

/// Decrement the leading hop byte of `msg`'s header. Returns `None` if the
/// header is empty (nothing to decrement — treated as TTL already
/// exhausted, per the forwarder's "drop when it reaches zero" rule) or if
/// the TTL has reached zero.
fn decrement_ttl(msg: Message) -> Option<Message> {
    let header = msg.header();
    if header.is_empty() {
        return None;
    }
    let hop = header[0];
    let final_hop = hop & FINAL_HOP;
    let ttl = hop & TTL_MASK;
    if ttl == 0 {
        return None;
    }
    let mut new_header = header.to_vec();
    new_header[0] = final_hop | (ttl - 1);
    Some(Message::with_header(new_header, msg.body().to_vec()))
}

/// Forward every message currently available from `src` into `dst`,
/// decrementing TTL and dropping exhausted ones. Returns the count
/// forwarded.
fn pump_once(src: &mut dyn RawEndpoint, dst: &mut dyn RawEndpoint) -> Result<usize> {
    let mut forwarded = 0;
    loop {
        match src.try_recv() {
            Ok(msg) => match decrement_ttl(msg) {
                Some(decremented) => {
                    if dst.try_send(decremented).is_ok() {
                        forwarded += 1;
                    }
                }
                None => {
                    // TTL exhausted: silently dropped.
                }
            },
            Err(Error::Again) => break,
            Err(err) => return Err(err),
        }
    }
    Ok(forwarded)
}

/// Forward messages bidirectionally between `a` and `b` until either
/// reports closed. The caller is expected to invoke this repeatedly (once
/// per readiness tick) rather than spin — it is not itself blocking.
pub fn pump(a: &mut dyn RawEndpoint, b: &mut dyn RawEndpoint) -> Result<()> {
    if a.is_closed() || b.is_closed() {
        return Err(Error::BadFd);
    }
    pump_once(a, b)?;
    pump_once(b, a)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    struct Fake {
        inbound: VecDeque<Message>,
        outbound: Vec<Message>,
        closed: bool,
    }

    impl Fake {
        fn new() -> Self {
            Self {
                inbound: VecDeque::new(),
                outbound: Vec::new(),
                closed: false,
            }
        }
    }

    impl RawEndpoint for Fake {
        fn try_recv(&mut self) -> Result<Message> {
            self.inbound.pop_front().ok_or(Error::Again)
        }
        fn try_send(&mut self, msg: Message) -> Result<()> {
            self.outbound.push(msg);
            Ok(())
        }
        fn is_closed(&self) -> bool {
            self.closed
        }
    }

    #[test]
    fn forwards_and_decrements_ttl() {
        let mut a = Fake::new();
        let mut b = Fake::new();
        a.inbound.push_back(Message::with_header(vec![2u8], b"request".to_vec()));

        pump(&mut a, &mut b).unwrap();

        assert_eq!(b.outbound.len(), 1);
        assert_eq!(b.outbound[0].header()[0] & TTL_MASK, 1);
    }

    #[test]
    fn drops_message_with_exhausted_ttl() {
        let mut a = Fake::new();
        let mut b = Fake::new();
        a.inbound.push_back(Message::with_header(vec![0u8], b"dead".to_vec()));

        pump(&mut a, &mut b).unwrap();

        assert!(b.outbound.is_empty());
    }

    #[test]
    fn preserves_final_hop_marker() {
        let mut a = Fake::new();
        let mut b = Fake::new();
        a.inbound.push_back(Message::with_header(vec![FINAL_HOP | 1], b"x".to_vec()));

        pump(&mut a, &mut b).unwrap();

        assert_eq!(b.outbound[0].header()[0], FINAL_HOP);
    }

    #[test]
    fn closed_endpoint_returns_ebadf() {
        let mut a = Fake::new();
        let mut b = Fake::new();
        a.closed = true;
        assert!(matches!(pump(&mut a, &mut b), Err(Error::BadFd)));
    }
}
