//! Authorization allow list.

use serde::{Deserialize, Serialize};

/// Authorized owners/channels plus sudo users who may manage the list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AllowList {
    /// Owner/channel IDs allowed to use tracking commands
    #[serde(default)]
    pub authorized: Vec<String>,

    /// IDs allowed to modify the allow list
    #[serde(default)]
    pub sudo: Vec<String>,
}

impl AllowList {
    /// Whether an owner may issue tracking commands.
    pub fn is_authorized(&self, id: &str) -> bool {
        self.authorized.iter().any(|a| a == id) || self.is_sudo(id)
    }

    /// Whether an actor may manage the allow list.
    ///
    /// An empty sudo list means the store is unprovisioned; the first
    /// `authorize` call bootstraps it.
    pub fn is_sudo(&self, id: &str) -> bool {
        self.sudo.iter().any(|s| s == id)
    }

    pub fn add(&mut self, id: &str) -> bool {
        if self.authorized.iter().any(|a| a == id) {
            return false;
        }
        self.authorized.push(id.to_string());
        true
    }

    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.authorized.len();
        self.authorized.retain(|a| a != id);
        self.authorized.len() != before
    }
}
