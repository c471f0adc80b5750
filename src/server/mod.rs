// src/server/mod.rs

//! The server process: module initialization in its fixed order, the agent
//! accept loop, signal handling, and teardown.

pub mod comm;
pub mod sessions;
pub mod sshd;

use crate::config::Config;
use crate::core::datastore::Datastores;
use crate::core::edit::WithDefaults;
use crate::core::openflow::MgmtChannel;
use crate::core::ovsdb::OvsdbClient;
use anyhow::Result;
use parking_lot::Mutex;
use sessions::SessionTable;
use sshd::SshdManager;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal::unix::{SignalKind, signal};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{filter::EnvFilter, reload};

/// Wake period of the main loop, also used to service the DB client.
const LOOP_TICK: Duration = Duration::from_millis(500);

/// Waits for the first shutdown request. Any of INT/TERM/QUIT counts.
async fn await_shutdown_signal() {
    let mut sigint = signal(SignalKind::interrupt()).expect("Failed to create SIGINT stream");
    let mut sigterm = signal(SignalKind::terminate()).expect("Failed to create SIGTERM stream");
    let mut sigquit = signal(SignalKind::quit()).expect("Failed to create SIGQUIT stream");
    tokio::select! {
        _ = sigint.recv() => info!("SIGINT received, initiating shutdown."),
        _ = sigterm.recv() => info!("SIGTERM received, initiating shutdown."),
        _ = sigquit.recv() => info!("SIGQUIT received, initiating shutdown."),
    }
}

/// The main server function: brings the modules up in order and runs the
/// agent loop until a shutdown signal arrives.
pub async fn run(
    config: Config,
    log_reload_handle: Arc<reload::Handle<EnvFilter, tracing_subscriber::Registry>>,
) -> Result<()> {
    // 1. connect to the switch database
    let db = OvsdbClient::connect(&config.db_uri)?;

    // 2. the DB client may have reconfigured process-wide logging on
    //    connect; re-assert ours
    if let Err(e) = log_reload_handle.reload(EnvFilter::new(config.log_level.clone())) {
        warn!("could not re-assert log filter: {e}");
    }

    // 3. datastores (loads the startup file)
    let of = Arc::new(MgmtChannel::new(&config.rundir, db.clone()));
    let datastores = Datastores::init(db.clone(), of, &config.datadir, WithDefaults::default())?;
    let datastores = Arc::new(tokio::sync::Mutex::new(datastores));

    // 4. data models
    register_models(&config);

    // 5. consolidate
    debug!("data models consolidated");

    // 6. devices: bring up the NETCONF transport
    let mut sshd = SshdManager::new(&config.confdir, &config.datadir, &config.sshd_exec);
    if let Err(e) = sshd.configure().await {
        error!("SSH transport initialization failed: {e}");
        return Err(anyhow::anyhow!("{e}"));
    }

    // 7. agent rendezvous socket
    let listener = match comm::bind_socket(&config) {
        Ok(l) => l,
        Err(e) => {
            sshd.shutdown();
            error!("communication subsystem not initiated: {e}");
            return Err(e);
        }
    };

    info!("OF-CONFIG server successfully initialized");

    // 8. main loop
    let sessions = Arc::new(Mutex::new(SessionTable::default()));
    let mut agent_tasks: JoinSet<()> = JoinSet::new();
    let mut agent_id: u64 = 0;
    let mut tick = tokio::time::interval(LOOP_TICK);

    loop {
        tokio::select! {
            biased;

            _ = await_shutdown_signal() => {
                // a second signal must not be ignored while cleanup runs
                tokio::spawn(async {
                    await_shutdown_signal().await;
                    error!("second signal received, exiting immediately");
                    std::process::exit(1);
                });
                break;
            },

            _ = tick.tick() => {
                db.run();
            },

            // while the agent table is full the listen socket is withdrawn
            // from the poll set; further peers wait in the kernel backlog
            // until a slot frees up
            accepted = listener.accept(), if agent_tasks.len() < config.agent_limit => {
                match accepted {
                    Ok((stream, _addr)) => {
                        agent_id = agent_id.wrapping_add(1);
                        debug!("an agent connected to the UNIX socket");
                        agent_tasks.spawn(comm::handle_agent(
                            stream,
                            agent_id,
                            datastores.clone(),
                            sessions.clone(),
                        ));
                        if agent_tasks.len() == config.agent_limit {
                            warn!(
                                "agent limit ({}) reached, withdrawing the listen socket",
                                config.agent_limit
                            );
                        }
                    }
                    Err(e) => error!("failed to accept agent connection: {e}"),
                }
            },

            Some(res) = agent_tasks.join_next() => {
                if let Err(e) = res {
                    warn!("agent task panicked: {e:?}");
                }
            },
        }
    }

    // teardown: persist startup, stop the transport, remove the socket
    agent_tasks.abort_all();
    datastores.lock().await.free();
    sshd.shutdown();
    comm::cleanup_socket(&config);
    info!("OF-CONFIG server shut down cleanly");
    Ok(())
}

/// Registers the two data models. Schema validation is the concern of the
/// session library; here the models only need to be present and readable.
fn register_models(config: &Config) {
    for rel in [
        "ietf-netconf-server/ietf-netconf-server.yin",
        "of-config/of-config.yin",
    ] {
        let path = std::path::Path::new(&config.datadir).join(rel);
        match std::fs::metadata(&path) {
            Ok(_) => debug!("registered data model {}", path.display()),
            Err(_) => warn!(
                "data model {} is missing; schema-aware clients may complain",
                path.display()
            ),
        }
    }
}
