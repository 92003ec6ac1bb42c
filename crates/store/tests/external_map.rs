#![forbid(unsafe_code)]

use tekdash_core::ExternalMapEntry;
use tekdash_store::{AppKey, ExternalMap};

fn map() -> ExternalMap {
    ExternalMap::new(vec![
        ExternalMapEntry::new("ws-a", "web", 18080),
        ExternalMapEntry::new("ws-b", "api", 18001),
    ])
}

#[test]
fn other_pair_cannot_claim_owned_port() {
    let m = map();
    let err = m.check_claim("ws-b", "web", 18080).unwrap_err();
    assert_eq!(err.port, 18080);
    assert_eq!(err.owner, AppKey::new("ws-a", "web"));
    assert_eq!(err.to_string(), "external port 18080 already owned by ws-a::web");
}

#[test]
fn same_pair_may_reclaim_and_free_ports_are_open() {
    let m = map();
    assert!(m.check_claim("ws-a", "web", 18080).is_ok());
    assert!(m.check_claim("ws-c", "new", 18999).is_ok());
    // a pair may move to a free port even when it already owns one
    assert!(m.check_claim("ws-a", "web", 18081).is_ok());
}

#[test]
fn port_lookup_by_pair() {
    let m = map();
    assert_eq!(m.port_for("ws-b", "api"), Some(18001));
    assert_eq!(m.port_for("ws-b", "web"), None);
    assert_eq!(m.len(), 2);
    assert!(ExternalMap::default().is_empty());
}
