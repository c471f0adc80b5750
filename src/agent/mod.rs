// src/agent/mod.rs

//! The per-session agent front-end.
//!
//! One agent process serves exactly one NETCONF session: the SSH transport
//! launches it as the `netconf` subsystem, so the session stream is stdio.
//! The agent announces the server's capabilities, registers the session
//! over IPC, and from then on forwards RPCs to the server, special-casing
//! close-session and kill-session onto their dedicated IPC messages.

use crate::config::Config;
use crate::core::comm::{AgentCodec, AgentRequest, ServerReply};
use crate::core::errors::OfcError;
use crate::core::rpc::{self, RpcOp};
use anyhow::{Context, Result, anyhow};
use bytes::BytesMut;
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncReadExt, AsyncWriteExt, Stdin, Stdout};
use tokio::net::UnixStream;
use tokio_util::codec::Framed;
use tracing::{debug, info, warn};

/// End-of-message delimiter of the base:1.0 framing.
const EOM: &[u8] = b"]]>]]>";

type ServerChannel = Framed<UnixStream, AgentCodec>;

/// Reads one delimited NETCONF message from the session stream. `None`
/// means the peer closed the stream.
async fn read_frame(stdin: &mut Stdin, buf: &mut BytesMut) -> Result<Option<String>> {
    loop {
        if let Some(pos) = buf.windows(EOM.len()).position(|w| w == EOM) {
            let frame = buf.split_to(pos);
            let _ = buf.split_to(EOM.len());
            return Ok(Some(String::from_utf8(frame.to_vec())?));
        }
        if stdin.read_buf(buf).await? == 0 {
            return Ok(None);
        }
    }
}

async fn write_frame(stdout: &mut Stdout, msg: &str) -> Result<()> {
    stdout.write_all(msg.as_bytes()).await?;
    stdout.write_all(EOM).await?;
    stdout.flush().await?;
    Ok(())
}

/// One request/reply round trip with the server.
async fn roundtrip(channel: &mut ServerChannel, request: AgentRequest) -> Result<ServerReply> {
    channel.send(request).await?;
    match channel.next().await {
        Some(Ok(reply)) => Ok(reply),
        Some(Err(e)) => Err(anyhow!("server channel failed: {e}")),
        None => Err(anyhow!("server closed the channel")),
    }
}

/// The agent main: connect, hello exchange, session registration, forward
/// loop.
pub async fn run(config: Config) -> Result<()> {
    let stream = UnixStream::connect(&config.sock_path)
        .await
        .with_context(|| format!("unable to connect to the ofcd server at {}", config.sock_path))?;
    let mut channel = Framed::new(stream, AgentCodec);
    info!("agent connected to the server via UNIX socket");

    let cpblts = match roundtrip(&mut channel, AgentRequest::GetCpblts).await? {
        ServerReply::Cpblts(c) => c,
        other => return Err(anyhow!("unexpected reply to GET_CPBLTS: {other:?}")),
    };

    let mut stdin = tokio::io::stdin();
    let mut stdout = tokio::io::stdout();
    let mut inbuf = BytesMut::with_capacity(8 * 1024);

    // hello exchange on the session stream; ours carries the session id
    let session_id = std::process::id().to_string();
    write_frame(&mut stdout, &rpc::hello(&session_id, &cpblts)).await?;
    let Some(client_hello) = read_frame(&mut stdin, &mut inbuf).await? else {
        return Err(anyhow!("session closed before the hello exchange"));
    };
    if !client_hello.contains("<hello") {
        return Err(anyhow!("the peer did not send a NETCONF hello"));
    }

    let username = std::env::var("USER")
        .or_else(|_| std::env::var("LOGNAME"))
        .unwrap_or_else(|_| "unknown".to_string());
    let registered = roundtrip(
        &mut channel,
        AgentRequest::SetSession {
            ncsid: session_id.clone(),
            pid: std::process::id() as u16,
            username,
            cpblts,
        },
    )
    .await?;
    if registered != ServerReply::SetSessionOk {
        return Err(anyhow!("session registration refused: {registered:?}"));
    }

    loop {
        let Some(rpc_text) = read_frame(&mut stdin, &mut inbuf).await? else {
            debug!("session stream closed, detaching from server");
            let _ = roundtrip(&mut channel, AgentRequest::CloseSession).await;
            break;
        };
        if rpc_text.trim().is_empty() {
            continue;
        }
        let mid = rpc::message_id_of(&rpc_text);

        match rpc::parse_rpc(&rpc_text) {
            Ok(RpcOp::CloseSession) => {
                let _ = roundtrip(&mut channel, AgentRequest::CloseSession).await;
                write_frame(&mut stdout, &rpc::reply_ok(&mid)).await?;
                info!("session {session_id} closed");
                break;
            }
            Ok(RpcOp::KillSession { session_id: victim }) => {
                let reply =
                    match roundtrip(&mut channel, AgentRequest::KillSession { ncsid: victim })
                        .await?
                    {
                        ServerReply::KillSessionOk => rpc::reply_ok(&mid),
                        ServerReply::Error { message } => {
                            rpc::reply_error(&mid, &OfcError::OperationFailed(message))
                        }
                        other => {
                            warn!("unexpected reply to KILL_SESSION: {other:?}");
                            rpc::reply_error(
                                &mid,
                                &OfcError::OperationFailed(
                                    "agent-server communication failed".into(),
                                ),
                            )
                        }
                    };
                write_frame(&mut stdout, &reply).await?;
            }
            // everything else, including requests this agent cannot parse,
            // goes to the server verbatim
            _ => {
                let reply = match roundtrip(
                    &mut channel,
                    AgentRequest::GenericOp { rpc: rpc_text },
                )
                .await
                {
                    Ok(ServerReply::GenericReply { reply }) => reply,
                    Ok(ServerReply::Error { message }) => {
                        rpc::reply_error(&mid, &OfcError::OperationFailed(message))
                    }
                    Ok(other) => {
                        warn!("unexpected reply to GENERICOP: {other:?}");
                        rpc::reply_error(
                            &mid,
                            &OfcError::OperationFailed("agent-server communication failed".into()),
                        )
                    }
                    Err(e) => rpc::reply_error(
                        &mid,
                        &OfcError::OperationFailed(format!(
                            "agent-server communication failed: {e}"
                        )),
                    ),
                };
                write_frame(&mut stdout, &reply).await?;
            }
        }
    }

    Ok(())
}
