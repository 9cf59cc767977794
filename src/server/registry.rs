use dashmap::DashMap;
use ftpgate_core::account::AccountSummary;
use serde::Serialize;
use std::net::{IpAddr, SocketAddr};
use uuid::Uuid;

/// A live session as reported by [`ServerController::list_connections`](crate::ServerController::list_connections).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionInfo {
    /// The client's IP address
    pub ip: IpAddr,
    /// The client's address and port
    pub remote_address: SocketAddr,
    /// The account the session logged in as, if it has
    pub account: Option<AccountSummary>,
}

/// The live sessions, keyed by session id. Every operation touches a single entry.
#[derive(Debug, Default)]
pub(crate) struct ConnectionRegistry {
    connections: DashMap<Uuid, ConnectionInfo>,
}

impl ConnectionRegistry {
    pub fn insert(&self, id: Uuid, remote_address: SocketAddr) {
        self.connections.insert(
            id,
            ConnectionInfo {
                ip: remote_address.ip(),
                remote_address,
                account: None,
            },
        );
    }

    pub fn bind(&self, id: &Uuid, account: AccountSummary) {
        if let Some(mut info) = self.connections.get_mut(id) {
            info.account = Some(account);
        }
    }

    pub fn remove(&self, id: &Uuid) {
        self.connections.remove(id);
    }

    pub fn list(&self) -> Vec<ConnectionInfo> {
        let mut list: Vec<ConnectionInfo> = self.connections.iter().map(|e| e.value().clone()).collect();
        list.sort_by_key(|c| c.remote_address);
        list
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.connections.len()
    }
}
