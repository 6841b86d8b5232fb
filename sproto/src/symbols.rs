//! Symbol enumeration: `symbol(i)`/`symbol_info(i)` iterate a static
//! table of (name, value, namespace, type, unit) tuples, the surface
//! language bindings walk to build their own constant tables without
//! hard-coding SP's numeric values. The enumeration shape mirrors
//! `sproto_stream::protocol_ids::name`'s match-on-constant style.

use sproto_stream::protocol_ids;

/// Which table a symbol belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Namespace {
    Protocol,
    Transport,
    Option,
    Error,
}

/// What kind of value a symbol carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolType {
    Protocol,
    Scheme,
    Integer,
    Boolean,
    Duration,
}

/// One entry of the symbol table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SymbolInfo {
    pub name: &'static str,
    pub value: i32,
    pub namespace: Namespace,
    pub kind: SymbolType,
    pub unit: &'static str,
}

const TABLE: &[SymbolInfo] = &[
    SymbolInfo { name: "PAIR", value: protocol_ids::PAIR as i32, namespace: Namespace::Protocol, kind: SymbolType::Protocol, unit: "" },
    SymbolInfo { name: "PUB", value: protocol_ids::PUB as i32, namespace: Namespace::Protocol, kind: SymbolType::Protocol, unit: "" },
    SymbolInfo { name: "SUB", value: protocol_ids::SUB as i32, namespace: Namespace::Protocol, kind: SymbolType::Protocol, unit: "" },
    SymbolInfo { name: "REQ", value: protocol_ids::REQ as i32, namespace: Namespace::Protocol, kind: SymbolType::Protocol, unit: "" },
    SymbolInfo { name: "REP", value: protocol_ids::REP as i32, namespace: Namespace::Protocol, kind: SymbolType::Protocol, unit: "" },
    SymbolInfo { name: "PUSH", value: protocol_ids::PUSH as i32, namespace: Namespace::Protocol, kind: SymbolType::Protocol, unit: "" },
    SymbolInfo { name: "PULL", value: protocol_ids::PULL as i32, namespace: Namespace::Protocol, kind: SymbolType::Protocol, unit: "" },
    SymbolInfo { name: "SURVEYOR", value: protocol_ids::SURVEYOR as i32, namespace: Namespace::Protocol, kind: SymbolType::Protocol, unit: "" },
    SymbolInfo { name: "RESPONDENT", value: protocol_ids::RESPONDENT as i32, namespace: Namespace::Protocol, kind: SymbolType::Protocol, unit: "" },
    SymbolInfo { name: "BUS", value: protocol_ids::BUS as i32, namespace: Namespace::Protocol, kind: SymbolType::Protocol, unit: "" },
    SymbolInfo { name: "TCP", value: 0, namespace: Namespace::Transport, kind: SymbolType::Scheme, unit: "" },
    SymbolInfo { name: "IPC", value: 1, namespace: Namespace::Transport, kind: SymbolType::Scheme, unit: "" },
    SymbolInfo { name: "INPROC", value: 2, namespace: Namespace::Transport, kind: SymbolType::Scheme, unit: "" },
    SymbolInfo { name: "WS", value: 3, namespace: Namespace::Transport, kind: SymbolType::Scheme, unit: "" },
    SymbolInfo { name: "RCVTIMEO", value: 10, namespace: Namespace::Option, kind: SymbolType::Duration, unit: "ms" },
    SymbolInfo { name: "SNDTIMEO", value: 11, namespace: Namespace::Option, kind: SymbolType::Duration, unit: "ms" },
    SymbolInfo { name: "LINGER", value: 12, namespace: Namespace::Option, kind: SymbolType::Duration, unit: "ms" },
    SymbolInfo { name: "RECONNECT_IVL", value: 13, namespace: Namespace::Option, kind: SymbolType::Duration, unit: "ms" },
    SymbolInfo { name: "RECONNECT_IVL_MAX", value: 14, namespace: Namespace::Option, kind: SymbolType::Duration, unit: "ms" },
    SymbolInfo { name: "RCVBUF", value: 15, namespace: Namespace::Option, kind: SymbolType::Integer, unit: "bytes" },
    SymbolInfo { name: "SNDBUF", value: 16, namespace: Namespace::Option, kind: SymbolType::Integer, unit: "bytes" },
    SymbolInfo { name: "RCVMAXSIZE", value: 17, namespace: Namespace::Option, kind: SymbolType::Integer, unit: "bytes" },
    SymbolInfo { name: "SNDPRIO", value: 18, namespace: Namespace::Option, kind: SymbolType::Integer, unit: "" },
    SymbolInfo { name: "RCVPRIO", value: 19, namespace: Namespace::Option, kind: SymbolType::Integer, unit: "" },
    SymbolInfo { name: "IPV4ONLY", value: 20, namespace: Namespace::Option, kind: SymbolType::Boolean, unit: "" },
    SymbolInfo { name: "MAXTTL", value: 21, namespace: Namespace::Option, kind: SymbolType::Integer, unit: "hops" },
    SymbolInfo { name: "EINVAL", value: 1, namespace: Namespace::Error, kind: SymbolType::Integer, unit: "" },
    SymbolInfo { name: "EAGAIN", value: 2, namespace: Namespace::Error, kind: SymbolType::Integer, unit: "" },
    SymbolInfo { name: "ETIMEDOUT", value: 3, namespace: Namespace::Error, kind: SymbolType::Integer, unit: "" },
    SymbolInfo { name: "EFSM", value: 4, namespace: Namespace::Error, kind: SymbolType::Integer, unit: "" },
    SymbolInfo { name: "ETERM", value: 5, namespace: Namespace::Error, kind: SymbolType::Integer, unit: "" },
    SymbolInfo { name: "EBADF", value: 6, namespace: Namespace::Error, kind: SymbolType::Integer, unit: "" },
];

/// The name of the `i`-th symbol, or `None` past the end of the table —
/// language bindings call this in a loop until it returns `None` to build
/// their own constant tables.
#[must_use]
pub fn symbol(i: usize) -> Option<&'static str> {
    TABLE.get(i).map(|s| s.name)
}

/// The full record for the `i`-th symbol.
#[must_use]
pub fn symbol_info(i: usize) -> Option<SymbolInfo> {
    TABLE.get(i).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enumerates_until_exhausted() {
        let mut count = 0;
        while symbol(count).is_some() {
            count += 1;
        }
        assert_eq!(count, TABLE.len());
        assert!(symbol(count).is_none());
    }

    #[test]
    fn protocol_symbols_match_wire_ids() {
        let info = symbol_info(3).unwrap();
        assert_eq!(info.name, "REQ");
        assert_eq!(info.value, i32::from(protocol_ids::REQ));
        assert_eq!(info.namespace, Namespace::Protocol);
    }
}
