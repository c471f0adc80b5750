// tests/unit_target_parse_test.rs

mod common;

use common::{EDIT_NS, test_datastores};
use ofcd::core::datastore::locks::Datastore;
use ofcd::core::edit::DefaultOperation;
use ofcd::core::ovsdb::render::parse_target;

/// S4: `protocol:address[:port]` splits into its three leaves.
#[test]
fn test_ipv4_target() {
    let (proto, addr, port) = parse_target("tcp:192.0.2.1:6633");
    assert_eq!(proto.as_deref(), Some("tcp"));
    assert_eq!(addr.as_deref(), Some("192.0.2.1"));
    assert_eq!(port.as_deref(), Some("6633"));
}

/// S4: the bracketed IPv6 form loses its brackets on the way out.
#[test]
fn test_ipv6_target() {
    let (proto, addr, port) = parse_target("ssl:[2001:db8::1]:6653");
    assert_eq!(proto.as_deref(), Some("ssl"));
    assert_eq!(addr.as_deref(), Some("2001:db8::1"));
    assert_eq!(port.as_deref(), Some("6653"));
}

#[test]
fn test_target_without_port() {
    let (proto, addr, port) = parse_target("tcp:192.0.2.7");
    assert_eq!(proto.as_deref(), Some("tcp"));
    assert_eq!(addr.as_deref(), Some("192.0.2.7"));
    assert!(port.is_none());
}

/// The round trip through the controller row: an IPv6 controller renders
/// its three leaves separately, address unbracketed.
#[test]
fn test_controller_rendering_round_trip() {
    let (mut ds, _db, _of, _dir) = test_datastores();
    let edit = format!(
        "<capable-switch {EDIT_NS} nc:operation=\"create\"><logical-switches>\
         <switch><id>br0</id><controllers><controller><id>c1</id>\
         <ip-address>2001:db8::1</ip-address><port>6653</port><protocol>tcp</protocol>\
         </controller></controllers></switch></logical-switches></capable-switch>"
    );
    ds.edit_config(
        Datastore::Running,
        &edit,
        DefaultOperation::Merge,
        Default::default(),
        "s1",
    )
    .unwrap();

    let config = ds.get_config(Datastore::Running).unwrap();
    assert!(config.contains("<ip-address>2001:db8::1</ip-address>"));
    assert!(config.contains("<port>6653</port>"));
    assert!(config.contains("<protocol>tcp</protocol>"));
    assert!(!config.contains('['));
}

/// Controller defaults: port 6633 and the tls protocol are filled in when
/// the client leaves them out.
#[test]
fn test_controller_defaults() {
    let (mut ds, _db, _of, _dir) = test_datastores();
    let edit = format!(
        "<capable-switch {EDIT_NS} nc:operation=\"create\"><logical-switches>\
         <switch><id>br0</id><controllers><controller><id>c1</id>\
         <ip-address>192.0.2.1</ip-address>\
         </controller></controllers></switch></logical-switches></capable-switch>"
    );
    ds.edit_config(
        Datastore::Running,
        &edit,
        DefaultOperation::Merge,
        Default::default(),
        "s1",
    )
    .unwrap();

    let config = ds.get_config(Datastore::Running).unwrap();
    assert!(config.contains("<port>6633</port>"));
    assert!(config.contains("<protocol>tls</protocol>"));
}
