// src/server/comm.rs

//! The server side of the agent↔server channel: the rendezvous socket and
//! the per-agent request loop.
//!
//! All datastore work funnels through one async mutex, so requests from
//! concurrent agents are applied strictly one at a time — the same ordering
//! a single-threaded poll loop would give.

use crate::config::Config;
use crate::core::comm::{AgentRequest, ServerCodec, ServerReply};
use crate::core::datastore::Datastores;
use crate::core::errors::OfcError;
use crate::core::rpc::{self, NOTIFICATIONS_CAP, RpcOp};
use crate::server::sessions::SessionTable;
use anyhow::{Context, Result, anyhow};
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use std::ffi::CString;
use std::path::Path;
use std::sync::Arc;
use tokio::net::{UnixListener, UnixStream};
use tokio_util::codec::Framed;
use tracing::{info, warn};

/// Marker file that outlives a crashed server; its presence on startup
/// authorizes removal of a stale rendezvous socket.
fn lock_path(sock_path: &str) -> String {
    format!("{sock_path}.lock")
}

/// Binds the rendezvous socket, refusing to clobber a live instance: a
/// leftover socket is only removed when the crash marker proves no clean
/// shutdown happened.
pub fn bind_socket(config: &Config) -> Result<UnixListener> {
    let sock = Path::new(&config.sock_path);
    let lock = lock_path(&config.sock_path);

    if sock.exists() {
        if Path::new(&lock).exists() {
            warn!(
                "removing leftover communication socket '{}' from a crashed run",
                config.sock_path
            );
            std::fs::remove_file(sock).with_context(|| {
                format!(
                    "failed to remove leftover socket, please remove '{}' manually",
                    config.sock_path
                )
            })?;
        } else {
            return Err(anyhow!(
                "communication socket '{}' already exists; another instance of ofcd is running. \
                 If not, please remove the file manually",
                config.sock_path
            ));
        }
    }

    // restrict the socket mode while binding
    let mode = config.sock_mode_bits();
    let old_mask = unsafe { libc::umask(!mode & 0o777) };
    let listener = UnixListener::bind(sock);
    unsafe { libc::umask(old_mask) };
    let listener =
        listener.with_context(|| format!("unable to bind UNIX socket '{}'", config.sock_path))?;

    if let Some(group) = &config.sock_group {
        chown_group(&config.sock_path, group)
            .with_context(|| format!("setting socket group '{group}' failed"))?;
    }

    std::fs::write(&lock, std::process::id().to_string())
        .context("failed to write the crash marker")?;
    info!("listening for agents on {}", config.sock_path);
    Ok(listener)
}

/// Removes the socket and crash marker after a clean shutdown.
pub fn cleanup_socket(config: &Config) {
    let _ = std::fs::remove_file(&config.sock_path);
    let _ = std::fs::remove_file(lock_path(&config.sock_path));
}

fn chown_group(path: &str, group: &str) -> Result<()> {
    let cgroup = CString::new(group)?;
    let grp = unsafe { libc::getgrnam(cgroup.as_ptr()) };
    if grp.is_null() {
        return Err(anyhow!("unknown group '{group}'"));
    }
    let gid = unsafe { (*grp).gr_gid };
    std::os::unix::fs::chown(path, None, Some(gid)).map_err(Into::into)
}

/// Serves one agent connection until it closes or fails.
pub async fn handle_agent(
    stream: UnixStream,
    agent_id: u64,
    datastores: Arc<tokio::sync::Mutex<Datastores>>,
    sessions: Arc<Mutex<SessionTable>>,
) {
    let mut framed = Framed::new(stream, ServerCodec);

    while let Some(next) = framed.next().await {
        let request = match next {
            Ok(r) => r,
            Err(e) => {
                warn!("agent {agent_id}: unreadable message ({e}), closing");
                break;
            }
        };
        let reply = match request {
            AgentRequest::GetCpblts => ServerReply::Cpblts(rpc::default_capabilities()),
            AgentRequest::SetSession {
                ncsid,
                pid,
                username,
                cpblts,
            } => {
                info!("new agent {agent_id} (PID {pid}, NCSID {ncsid})");
                sessions
                    .lock()
                    .register(agent_id, ncsid, username, pid, cpblts);
                ServerReply::SetSessionOk
            }
            AgentRequest::CloseSession => {
                let _ = framed.send(ServerReply::CloseSessionOk).await;
                info!("agent {agent_id} removed");
                break;
            }
            AgentRequest::KillSession { ncsid } => {
                match kill_session(agent_id, &ncsid, &datastores, &sessions).await {
                    Ok(()) => ServerReply::KillSessionOk,
                    Err(e) => ServerReply::Error {
                        message: e.to_string(),
                    },
                }
            }
            AgentRequest::GenericOp { rpc } => {
                let reply = dispatch_rpc(&rpc, agent_id, &datastores, &sessions).await;
                ServerReply::GenericReply { reply }
            }
        };
        if let Err(e) = framed.send(reply).await {
            warn!("agent {agent_id}: reply failed ({e}), closing");
            break;
        }
    }

    // whatever happens to the socket, the session and its locks go with it
    let unregistered = sessions.lock().unregister(agent_id);
    if let Some(info) = unregistered {
        datastores.lock().await.locks.release_session(&info.ncsid);
    }
}

/// Terminates the agent owning the given NETCONF session. Killing one's
/// own session is refused.
async fn kill_session(
    sender_agent: u64,
    ncsid: &str,
    datastores: &Arc<tokio::sync::Mutex<Datastores>>,
    sessions: &Arc<Mutex<SessionTable>>,
) -> Result<(), OfcError> {
    let (target_agent, target_pid) = {
        let table = sessions.lock();
        let sender = table
            .get(sender_agent)
            .ok_or_else(|| OfcError::OperationFailed("you are an unknown client".into()))?;
        let target = table
            .by_ncsid(ncsid)
            .ok_or_else(|| OfcError::OperationFailed("session to kill does not exist".into()))?;
        if sender.ncsid == target.ncsid {
            warn!("killing own session requested");
            return Err(OfcError::OperationFailed(
                "killing own session requested".into(),
            ));
        }
        (target.agent_id, target.pid)
    };

    unsafe { libc::kill(target_pid as libc::pid_t, libc::SIGTERM) };
    let unregistered = sessions.lock().unregister(target_agent);
    if let Some(info) = unregistered {
        datastores.lock().await.locks.release_session(&info.ncsid);
    }
    info!("session {ncsid} killed");
    Ok(())
}

/// Parses a forwarded RPC, runs it against the datastores bound to the
/// caller's session, and returns the serialized rpc-reply.
pub async fn dispatch_rpc(
    rpc_text: &str,
    agent_id: u64,
    datastores: &Arc<tokio::sync::Mutex<Datastores>>,
    sessions: &Arc<Mutex<SessionTable>>,
) -> String {
    let mid = rpc::message_id_of(rpc_text);
    let Some(sid) = sessions.lock().get(agent_id).map(|a| a.ncsid.clone()) else {
        return rpc::reply_error(
            &mid,
            &OfcError::OperationFailed("request from unknown agent".into()),
        );
    };

    let op = match rpc::parse_rpc(rpc_text) {
        Ok(op) => op,
        Err(e) => return rpc::reply_error(&mid, &e),
    };

    let result: Result<String, OfcError> = match op {
        RpcOp::Get => datastores.lock().await.get().map(|d| rpc::reply_data(&mid, &d)),
        RpcOp::GetConfig { source } => datastores
            .lock()
            .await
            .get_config(source)
            .map(|d| rpc::reply_data(&mid, &d)),
        RpcOp::EditConfig {
            target,
            default_op,
            error_op,
            config,
        } => datastores
            .lock()
            .await
            .edit_config(target, &config, default_op, error_op, &sid)
            .map(|()| rpc::reply_ok(&mid)),
        RpcOp::CopyConfig { target, source } => datastores
            .lock()
            .await
            .copy_config(target, source.into(), &sid)
            .map(|()| rpc::reply_ok(&mid)),
        RpcOp::DeleteConfig { target } => datastores
            .lock()
            .await
            .delete_config(target, &sid)
            .map(|()| rpc::reply_ok(&mid)),
        RpcOp::Lock { target } => datastores
            .lock()
            .await
            .lock(target, &sid)
            .map(|()| rpc::reply_ok(&mid)),
        RpcOp::Unlock { target } => datastores
            .lock()
            .await
            .unlock(target, &sid)
            .map(|()| rpc::reply_ok(&mid)),
        RpcOp::CloseSession => Ok(rpc::reply_ok(&mid)),
        RpcOp::KillSession { session_id } => {
            kill_session(agent_id, &session_id, datastores, sessions)
                .await
                .map(|()| rpc::reply_ok(&mid))
        }
        RpcOp::CreateSubscription => subscribe(agent_id, sessions).map(|()| rpc::reply_ok(&mid)),
    };

    result.unwrap_or_else(|e| rpc::reply_error(&mid, &e))
}

/// Activates the notification subscription for a session: requires the
/// negotiated capability, and at most one subscription per session.
fn subscribe(agent_id: u64, sessions: &Arc<Mutex<SessionTable>>) -> Result<(), OfcError> {
    let mut table = sessions.lock();
    let agent = table
        .get_mut(agent_id)
        .ok_or_else(|| OfcError::OperationFailed("request from unknown agent".into()))?;
    if !agent.cpblts.iter().any(|c| c.starts_with(NOTIFICATIONS_CAP)) {
        return Err(OfcError::OperationNotSupported("notifications".into()));
    }
    if agent.subscribed {
        return Err(OfcError::OperationFailed(
            "subscription already active on this session".into(),
        ));
    }
    agent.subscribed = true;
    Ok(())
}
