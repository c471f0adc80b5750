// tests/unit_comm_codec_test.rs

use bytes::BytesMut;
use ofcd::core::comm::{AgentCodec, AgentRequest, ServerCodec, ServerReply};
use tokio_util::codec::{Decoder, Encoder};

#[test]
fn test_set_session_crosses_the_wire() {
    let request = AgentRequest::SetSession {
        ncsid: "4711".into(),
        pid: 4711,
        username: "admin".into(),
        cpblts: vec![
            "urn:ietf:params:netconf:base:1.0".into(),
            "urn:onf:config:yang".into(),
        ],
    };

    let mut buf = BytesMut::new();
    AgentCodec.encode(request.clone(), &mut buf).unwrap();
    let decoded = ServerCodec.decode(&mut buf).unwrap().expect("complete");
    assert_eq!(decoded, request);
    assert!(buf.is_empty());
}

#[test]
fn test_generic_reply_crosses_the_wire() {
    let reply = ServerReply::GenericReply {
        reply: "<rpc-reply message-id=\"1\"><ok/></rpc-reply>".into(),
    };
    let mut buf = BytesMut::new();
    ServerCodec.encode(reply.clone(), &mut buf).unwrap();
    assert_eq!(AgentCodec.decode(&mut buf).unwrap(), Some(reply));
}

/// A partial frame decodes to nothing and consumes nothing until the rest
/// arrives.
#[test]
fn test_incremental_decode() {
    let request = AgentRequest::GenericOp {
        rpc: "<rpc message-id=\"2\"><get/></rpc>".into(),
    };
    let mut full = BytesMut::new();
    AgentCodec.encode(request.clone(), &mut full).unwrap();

    let mut feed = BytesMut::new();
    let mut codec = ServerCodec;
    for chunk in full.chunks(5) {
        let before = feed.len();
        feed.extend_from_slice(chunk);
        if feed.len() < full.len() {
            assert_eq!(codec.decode(&mut feed).unwrap(), None);
            assert_eq!(feed.len(), before + chunk.len());
        }
    }
    assert_eq!(codec.decode(&mut feed).unwrap(), Some(request));
}

/// Two messages back to back decode one at a time.
#[test]
fn test_pipelined_messages() {
    let mut buf = BytesMut::new();
    AgentCodec.encode(AgentRequest::GetCpblts, &mut buf).unwrap();
    AgentCodec
        .encode(
            AgentRequest::KillSession {
                ncsid: "99".into(),
            },
            &mut buf,
        )
        .unwrap();

    let mut codec = ServerCodec;
    assert_eq!(codec.decode(&mut buf).unwrap(), Some(AgentRequest::GetCpblts));
    assert_eq!(
        codec.decode(&mut buf).unwrap(),
        Some(AgentRequest::KillSession { ncsid: "99".into() })
    );
    assert_eq!(codec.decode(&mut buf).unwrap(), None);
}

#[test]
fn test_error_reply() {
    let mut buf = BytesMut::new();
    ServerCodec
        .encode(
            ServerReply::Error {
                message: "killing own session requested".into(),
            },
            &mut buf,
        )
        .unwrap();
    match AgentCodec.decode(&mut buf).unwrap() {
        Some(ServerReply::Error { message }) => {
            assert_eq!(message, "killing own session requested");
        }
        other => panic!("decoded {other:?}"),
    }
}
