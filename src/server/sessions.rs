// src/server/sessions.rs

//! The server's per-agent session registry. Each connected agent fronts
//! exactly one NETCONF session; the registry maps the agent connection to
//! its session id, username, process id, and negotiated capabilities.

use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct AgentInfo {
    pub agent_id: u64,
    /// The NETCONF session id owned by the agent.
    pub ncsid: String,
    pub username: String,
    /// The agent's process id, used for kill-session.
    pub pid: u16,
    pub cpblts: Vec<String>,
    /// Whether a notification subscription is active on this session.
    pub subscribed: bool,
}

#[derive(Debug, Default)]
pub struct SessionTable {
    agents: HashMap<u64, AgentInfo>,
}

impl SessionTable {
    pub fn register(
        &mut self,
        agent_id: u64,
        ncsid: String,
        username: String,
        pid: u16,
        cpblts: Vec<String>,
    ) {
        self.agents.insert(
            agent_id,
            AgentInfo {
                agent_id,
                ncsid,
                username,
                pid,
                cpblts,
                subscribed: false,
            },
        );
    }

    pub fn unregister(&mut self, agent_id: u64) -> Option<AgentInfo> {
        self.agents.remove(&agent_id)
    }

    pub fn get(&self, agent_id: u64) -> Option<&AgentInfo> {
        self.agents.get(&agent_id)
    }

    pub fn get_mut(&mut self, agent_id: u64) -> Option<&mut AgentInfo> {
        self.agents.get_mut(&agent_id)
    }

    pub fn by_ncsid(&self, ncsid: &str) -> Option<&AgentInfo> {
        self.agents.values().find(|a| a.ncsid == ncsid)
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}
