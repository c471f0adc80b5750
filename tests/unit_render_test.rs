// tests/unit_render_test.rs

mod common;

use common::{EDIT_NS, test_datastores};
use ofcd::core::datastore::locks::Datastore;
use ofcd::core::edit::DefaultOperation;

fn edit(ds: &mut ofcd::core::datastore::Datastores, body: &str) {
    ds.edit_config(
        Datastore::Running,
        body,
        DefaultOperation::Merge,
        Default::default(),
        "s1",
    )
    .unwrap();
}

/// Tunnel ports render their sub-element according to the interface type,
/// with the model's endpoint leaf spelling kept as-is.
#[test]
fn test_tunnel_rendering() {
    let (mut ds, db, _of, _dir) = test_datastores();
    let create = format!(
        "<capable-switch {EDIT_NS} nc:operation=\"create\"><resources>\
         <port><name>gre0</name><ipgre-tunnel>\
         <local-endpoint-ipv4-adress>10.0.0.1</local-endpoint-ipv4-adress>\
         <remote-endpoint-ipv4-adress>10.0.0.2</remote-endpoint-ipv4-adress>\
         <checksum-present>true</checksum-present><key>42</key>\
         </ipgre-tunnel></port>\
         <port><name>vx0</name><vxlan-tunnel>\
         <local-endpoint-ipv4-adress>10.0.1.1</local-endpoint-ipv4-adress>\
         <remote-endpoint-ipv4-adress>10.0.1.2</remote-endpoint-ipv4-adress>\
         <vni>7</vni></vxlan-tunnel></port>\
         </resources></capable-switch>"
    );
    edit(&mut ds, &create);

    let snapshot = db.snapshot();
    assert_eq!(snapshot.interface_by_name("gre0").unwrap().kind, "gre");
    assert_eq!(snapshot.interface_by_name("vx0").unwrap().kind, "vxlan");

    let config = ds.get_config(Datastore::Running).unwrap();
    assert!(config.contains("<ipgre-tunnel>"));
    assert!(config.contains("<local-endpoint-ipv4-adress>10.0.0.1</local-endpoint-ipv4-adress>"));
    assert!(config.contains("<key>42</key>"));
    assert!(config.contains("<vxlan-tunnel>"));
    assert!(config.contains("<vni>7</vni>"));

    // dropping the tunnel reverts the port to a system interface
    let delete = format!(
        "<capable-switch {EDIT_NS}><resources><port><name>gre0</name>\
         <ipgre-tunnel nc:operation=\"delete\">\
         <local-endpoint-ipv4-adress>10.0.0.1</local-endpoint-ipv4-adress>\
         </ipgre-tunnel></port></resources></capable-switch>"
    );
    edit(&mut ds, &delete);
    assert_eq!(db.snapshot().interface_by_name("gre0").unwrap().kind, "");
    assert!(!ds
        .get_config(Datastore::Running)
        .unwrap()
        .contains("<ipgre-tunnel>"));
}

/// The state document carries the fixed capability block for each bridge.
#[test]
fn test_state_capabilities_block() {
    let (mut ds, _db, _of, _dir) = test_datastores();
    let create = format!(
        "<capable-switch {EDIT_NS} nc:operation=\"create\">\
         <logical-switches><switch><id>br0</id></switch></logical-switches>\
         </capable-switch>"
    );
    edit(&mut ds, &create);

    let state = ds.get().unwrap();
    assert!(state.contains("<max-buffered-packets>256</max-buffered-packets>"));
    assert!(state.contains("<max-ports>255</max-ports>"));
    assert!(state.contains("<flow-statistics>true</flow-statistics>"));
    assert!(state.contains("<reserved-port-types>"));
    assert!(state.contains("<type>fast-failover</type>"));
    assert!(state.contains("<capability>chaining-check</capability>"));
    assert!(state.contains("<type>goto-table</type>"));
}

/// Queues land on their port's QoS map and render with id, port, and
/// properties.
#[test]
fn test_queue_rendering() {
    let (mut ds, _db, _of, _dir) = test_datastores();
    let create = format!(
        "<capable-switch {EDIT_NS} nc:operation=\"create\">\
         <resources><port><name>eth0</name></port></resources>\
         <logical-switches><switch><id>br0</id>\
         <resources><port>eth0</port></resources></switch></logical-switches>\
         </capable-switch>"
    );
    edit(&mut ds, &create);

    let add_queue = format!(
        "<capable-switch {EDIT_NS}><resources>\
         <queue nc:operation=\"create\"><resource-id>q1</resource-id>\
         <id>3</id><port>eth0</port>\
         <properties><min-rate>100</min-rate><max-rate>500</max-rate></properties>\
         </queue></resources></capable-switch>"
    );
    edit(&mut ds, &add_queue);

    let config = ds.get_config(Datastore::Running).unwrap();
    assert!(config.contains("<resource-id>q1</resource-id>"));
    assert!(config.contains("<id>3</id>"));
    assert!(config.contains("<port>eth0</port>"));
    assert!(config.contains("<min-rate>100</min-rate>"));
    assert!(config.contains("<max-rate>500</max-rate>"));
    // the bridge references the queue through its resources
    assert!(config.contains("<queue>q1</queue>"));
}
