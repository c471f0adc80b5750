// src/server/sshd.rs

//! Supervision of the SSH transport daemon.
//!
//! The NETCONF transport is an external sshd: a templated configuration is
//! copied to a running file, the listen directives from the transport
//! datastore are appended together with the `netconf` subsystem line
//! pointing back at this binary in agent mode, and the daemon is either
//! started or told to reload.

use crate::core::errors::OfcError;
use crate::core::xml::{XmlDoc, child, element_children, text_of};
use std::path::PathBuf;
use std::time::Duration;
use tokio::process::{Child, Command};
use tracing::{info, warn};

/// Environment variable under which the sshd process id is published for
/// other modules.
pub const SSHD_PID_ENV: &str = "SSHD_PID";

const TEMPLATE_FILE: &str = "sshd_config";
const RUNNING_FILE: &str = "sshd_config.running";
const TRANSPORT_DATASTORE: &str = "ietf-netconf-server/datastore.xml";

/// How long a running sshd gets to settle after a reload signal.
const RELOAD_GRACE: Duration = Duration::from_millis(500);

pub struct SshdManager {
    confdir: PathBuf,
    datadir: PathBuf,
    sshd_exec: String,
    child: Option<Child>,
}

impl SshdManager {
    pub fn new(confdir: impl Into<PathBuf>, datadir: impl Into<PathBuf>, sshd_exec: &str) -> Self {
        Self {
            confdir: confdir.into(),
            datadir: datadir.into(),
            sshd_exec: sshd_exec.to_string(),
            child: None,
        }
    }

    /// Listen directives derived from the transport datastore; an absent or
    /// empty datastore yields the model's default port 830 on all
    /// addresses.
    fn listen_directives(&self) -> String {
        let default = "Port 830\nListenAddress 0.0.0.0\nListenAddress ::\n".to_string();
        let path = self.datadir.join(TRANSPORT_DATASTORE);
        let Ok(text) = std::fs::read_to_string(&path) else {
            return default;
        };
        let Ok(doc) = XmlDoc::parse(&text) else {
            warn!("transport datastore at {} is not well-formed", path.display());
            return default;
        };
        let listen = doc
            .root
            .as_ref()
            .and_then(|r| child(r, "ssh"))
            .and_then(|ssh| child(ssh, "listen"));
        let Some(listen) = listen else {
            return default;
        };
        let mut out = String::new();
        for (_, el) in element_children(listen) {
            match el.name.as_str() {
                "port" => {
                    if let Some(port) = text_of(el) {
                        out.push_str(&format!(
                            "Port {port}\nListenAddress 0.0.0.0\nListenAddress ::\n"
                        ));
                    }
                }
                "interface" => {
                    let addr = child(el, "address").and_then(text_of);
                    let port = child(el, "port").and_then(text_of);
                    if let (Some(addr), Some(port)) = (addr, port) {
                        out.push_str(&format!("ListenAddress {addr}:{port}\n"));
                    }
                }
                _ => {}
            }
        }
        if out.is_empty() { default } else { out }
    }

    /// Regenerates the running sshd configuration and starts or reloads the
    /// daemon.
    pub async fn configure(&mut self) -> Result<(), OfcError> {
        let template = self.confdir.join(TEMPLATE_FILE);
        let running = self.confdir.join(RUNNING_FILE);

        let base = std::fs::read_to_string(&template).map_err(|e| {
            OfcError::OperationFailed(format!(
                "unable to open SSH server configuration template {}: {e}",
                template.display()
            ))
        })?;
        let exe = std::env::current_exe()
            .map_err(|e| OfcError::OperationFailed(format!("cannot resolve own path: {e}")))?;
        let mut generated = base;
        generated.push_str("\n# NETCONF listening settings\n");
        generated.push_str(&self.listen_directives());
        generated.push_str(&format!("Subsystem netconf {} --agent\n", exe.display()));
        std::fs::write(&running, generated).map_err(|e| {
            OfcError::OperationFailed(format!("unable to prepare SSH server configuration: {e}"))
        })?;

        match self.child.as_ref().and_then(|c| c.id()) {
            Some(pid) => {
                // tell the running daemon to reconfigure, and give it a
                // moment to do so
                unsafe { libc::kill(pid as libc::pid_t, libc::SIGHUP) };
                tokio::time::sleep(RELOAD_GRACE).await;
                info!("sshd (PID {pid}) reloaded");
            }
            None => {
                let child = Command::new(&self.sshd_exec)
                    .arg("-D")
                    .arg("-f")
                    .arg(&running)
                    .spawn()
                    .map_err(|e| {
                        OfcError::OperationFailed(format!(
                            "starting '{}' failed: {e}",
                            self.sshd_exec
                        ))
                    })?;
                if let Some(pid) = child.id() {
                    // publish for other modules
                    unsafe { std::env::set_var(SSHD_PID_ENV, pid.to_string()) };
                    info!("started sshd (PID {pid})");
                }
                self.child = Some(child);
            }
        }
        Ok(())
    }

    /// Stops the transport daemon.
    pub fn shutdown(&mut self) {
        if let Some(child) = self.child.take() {
            if let Some(pid) = child.id() {
                unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
                info!("sshd (PID {pid}) terminated");
            }
        }
    }
}
