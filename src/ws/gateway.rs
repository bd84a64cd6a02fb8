//! Connection registry and per-team broadcast groups

use std::collections::HashSet;

use dashmap::DashMap;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::ws::protocol::ServerMsg;

pub type ConnectionId = Uuid;

/// Realtime gateway shared by both request surfaces and the broadcast scheduler.
///
/// Every connection gets its own bounded outbound queue. Fan-out uses
/// `try_send`, so a stalled client loses messages instead of holding up
/// delivery to anyone else.
pub struct Gateway {
    outbound_buffer: usize,
    connections: DashMap<ConnectionId, mpsc::Sender<ServerMsg>>,
    /// Group name -> member connections
    groups: DashMap<String, HashSet<ConnectionId>>,
    /// Connection -> groups it joined, for disconnect cleanup
    memberships: DashMap<ConnectionId, HashSet<String>>,
}

impl Gateway {
    pub fn new(outbound_buffer: usize) -> Self {
        Self {
            outbound_buffer: outbound_buffer.max(1),
            connections: DashMap::new(),
            groups: DashMap::new(),
            memberships: DashMap::new(),
        }
    }

    /// Register a new connection and hand back the receiving end of its queue
    pub fn register(&self) -> (ConnectionId, mpsc::Receiver<ServerMsg>) {
        let conn_id = Uuid::new_v4();
        let (tx, rx) = mpsc::channel(self.outbound_buffer);
        self.connections.insert(conn_id, tx);
        debug!(conn_id = %conn_id, "Connection registered");
        (conn_id, rx)
    }

    /// Drop a connection and every group membership it held
    pub fn unregister(&self, conn_id: ConnectionId) {
        self.connections.remove(&conn_id);

        let Some((_, joined)) = self.memberships.remove(&conn_id) else {
            return;
        };
        for group in joined {
            // Remove the group itself once its last member leaves
            self.groups.remove_if_mut(&group, |_, members| {
                members.remove(&conn_id);
                members.is_empty()
            });
        }
        debug!(conn_id = %conn_id, "Connection unregistered");
    }

    /// Add a connection to a group. Returns false if it was already a member.
    pub fn join(&self, conn_id: ConnectionId, group: &str) -> bool {
        let newly_joined = self
            .groups
            .entry(group.to_string())
            .or_default()
            .insert(conn_id);

        if newly_joined {
            self.memberships
                .entry(conn_id)
                .or_default()
                .insert(group.to_string());
            info!(conn_id = %conn_id, team = %group, "Connection joined team group");
        }
        newly_joined
    }

    /// Queue a message for one connection
    pub fn send_to(&self, conn_id: ConnectionId, msg: ServerMsg) -> bool {
        let Some(tx) = self.connections.get(&conn_id).map(|tx| tx.value().clone()) else {
            return false;
        };
        deliver(conn_id, &tx, msg)
    }

    /// Queue a message for every member of a group; returns how many accepted it
    pub fn emit_to_group(&self, group: &str, msg: &ServerMsg) -> usize {
        let members: Vec<ConnectionId> = match self.groups.get(group) {
            Some(members) => members.iter().copied().collect(),
            None => return 0,
        };
        self.deliver_many(members, msg)
    }

    /// Queue a message for every connection
    pub fn emit_all(&self, msg: &ServerMsg) -> usize {
        let all: Vec<ConnectionId> = self.connections.iter().map(|entry| *entry.key()).collect();
        self.deliver_many(all, msg)
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    pub fn group_size(&self, group: &str) -> usize {
        self.groups.get(group).map(|members| members.len()).unwrap_or(0)
    }

    fn deliver_many(&self, targets: Vec<ConnectionId>, msg: &ServerMsg) -> usize {
        // Sender handles are cloned out first so no map shard stays locked while sending
        let senders: Vec<(ConnectionId, mpsc::Sender<ServerMsg>)> = targets
            .into_iter()
            .filter_map(|id| self.connections.get(&id).map(|tx| (id, tx.value().clone())))
            .collect();

        senders
            .iter()
            .filter(|(id, tx)| deliver(*id, tx, msg.clone()))
            .count()
    }
}

fn deliver(conn_id: ConnectionId, tx: &mpsc::Sender<ServerMsg>, msg: ServerMsg) -> bool {
    match tx.try_send(msg) {
        Ok(()) => true,
        Err(TrySendError::Full(_)) => {
            warn!(conn_id = %conn_id, "Outbound queue full, dropping message");
            false
        }
        Err(TrySendError::Closed(_)) => {
            debug!(conn_id = %conn_id, "Outbound queue closed");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pong(t: u64) -> ServerMsg {
        ServerMsg::Pong { t }
    }

    #[test]
    fn join_is_idempotent() {
        let gateway = Gateway::new(8);
        let (conn, _rx) = gateway.register();

        assert!(gateway.join(conn, "Red"));
        assert!(!gateway.join(conn, "Red"));
        assert_eq!(gateway.group_size("Red"), 1);
        assert_eq!(gateway.group_count(), 1);
    }

    #[test]
    fn group_emit_reaches_only_members() {
        let gateway = Gateway::new(8);
        let (red, mut red_rx) = gateway.register();
        let (blue, mut blue_rx) = gateway.register();
        gateway.join(red, "Red");
        gateway.join(blue, "Blue");

        assert_eq!(gateway.emit_to_group("Red", &pong(1)), 1);
        assert!(matches!(red_rx.try_recv(), Ok(ServerMsg::Pong { t: 1 })));
        assert!(blue_rx.try_recv().is_err());
        assert_eq!(gateway.emit_to_group("Nobody", &pong(2)), 0);
    }

    #[test]
    fn emit_all_reaches_every_connection() {
        let gateway = Gateway::new(8);
        let (_a, mut a_rx) = gateway.register();
        let (_b, mut b_rx) = gateway.register();

        assert_eq!(gateway.emit_all(&pong(3)), 2);
        assert!(a_rx.try_recv().is_ok());
        assert!(b_rx.try_recv().is_ok());
    }

    #[test]
    fn unregister_clears_memberships_and_empty_groups() {
        let gateway = Gateway::new(8);
        let (a, _a_rx) = gateway.register();
        let (b, _b_rx) = gateway.register();
        gateway.join(a, "Red");
        gateway.join(a, "Blue");
        gateway.join(b, "Red");

        gateway.unregister(a);

        assert_eq!(gateway.connection_count(), 1);
        assert_eq!(gateway.group_size("Red"), 1);
        assert_eq!(gateway.group_size("Blue"), 0);
        assert_eq!(gateway.group_count(), 1);
        assert!(!gateway.send_to(a, pong(4)));
    }

    #[test]
    fn full_queue_does_not_block_other_connections() {
        let gateway = Gateway::new(1);
        let (slow, _slow_rx) = gateway.register();
        let (fast, mut fast_rx) = gateway.register();
        gateway.join(slow, "Red");
        gateway.join(fast, "Red");

        assert_eq!(gateway.emit_to_group("Red", &pong(1)), 2);
        assert!(fast_rx.try_recv().is_ok());

        // slow never drained its single slot
        assert_eq!(gateway.emit_to_group("Red", &pong(2)), 1);
        assert!(matches!(fast_rx.try_recv(), Ok(ServerMsg::Pong { t: 2 })));
    }
}
