//! Builds outbound event payloads from engine results

use chrono::{DateTime, Utc};

use crate::store::Team;
use crate::ws::protocol::ServerMsg;

use super::elimination::EliminationRecord;
use super::proximity::Neighborhood;

/// Periodic proximity snapshot for one team's group
pub fn nearby_snapshot(hood: Neighborhood, timestamp: DateTime<Utc>) -> ServerMsg {
    ServerMsg::NearbyTeams {
        team_name: hood.team_name,
        nearby_teams: hood.nearby,
        timestamp,
    }
}

/// Global location broadcast; `None` when the team has no location yet
pub fn location_updated(team: &Team) -> Option<ServerMsg> {
    team.location.map(|location| ServerMsg::LocationUpdated {
        team_name: team.team_name.clone(),
        location,
    })
}

/// Private confirmation for the reporter of a location
pub fn location_confirmed(team: &Team) -> Option<ServerMsg> {
    team.location.map(|location| ServerMsg::LocationUpdateConfirmed {
        team_name: team.team_name.clone(),
        location,
    })
}

/// Global elimination broadcast
pub fn team_killed(record: &EliminationRecord) -> ServerMsg {
    ServerMsg::TeamKilled {
        killer_team: record.killer.clone(),
        killed_team: record.target.clone(),
        timestamp: record.timestamp,
    }
}

/// Notice addressed to the eliminated team's group
pub fn you_were_killed(record: &EliminationRecord) -> ServerMsg {
    ServerMsg::YouWereKilled {
        killer_team: record.killer.clone(),
        timestamp: record.timestamp,
    }
}

/// Counters for the broadcast loop, logged periodically
#[derive(Debug, Default)]
pub struct SnapshotStats {
    pub ticks: u64,
    pub failed_ticks: u64,
    pub deliveries: u64,
}

impl SnapshotStats {
    pub fn record(&mut self, deliveries: usize) {
        self.ticks += 1;
        self.deliveries += deliveries as u64;
    }

    pub fn record_failure(&mut self) {
        self.ticks += 1;
        self.failed_ticks += 1;
    }
}
