//! Protocol identifiers exchanged in the stream handshake and
//! returned by the facade's `symbol`/`symbol_info` enumeration.

pub const PAIR: u16 = 16;
pub const PUB: u16 = 32;
pub const SUB: u16 = 33;
pub const REQ: u16 = 48;
pub const REP: u16 = 49;
pub const PUSH: u16 = 80;
pub const PULL: u16 = 81;
pub const SURVEYOR: u16 = 98;
pub const RESPONDENT: u16 = 99;
pub const BUS: u16 = 112;

#[must_use]
pub const fn name(id: u16) -> &'static str {
    match id {
        PAIR => "PAIR",
        PUB => "PUB",
        SUB => "SUB",
        REQ => "REQ",
        REP => "REP",
        PUSH => "PUSH",
        PULL => "PULL",
        SURVEYOR => "SURVEYOR",
        RESPONDENT => "RESPONDENT",
        BUS => "BUS",
        _ => "UNKNOWN",
    }
}
