//! WebSocket protocol message definitions
//! These are the wire types for client-server communication

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::game::GameError;
use crate::store::Location;

/// Messages sent from client to server.
///
/// Payload fields are optional on the wire so that a missing field surfaces as
/// a validation error event instead of an unparsable frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ClientMsg {
    /// Subscribe this connection to a team's broadcast group
    JoinTeam { team_name: Option<String> },

    /// Report the team's current position
    UpdateLocation {
        team_name: Option<String>,
        latitude: Option<f64>,
        longitude: Option<f64>,
    },

    /// Attempt to eliminate another team
    KillTeam {
        team_name: Option<String>,
        target_team_name: Option<String>,
    },

    /// Ping for latency measurement
    Ping {
        /// Client timestamp
        t: u64,
    },
}

/// A neighbor entry in a proximity listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NearbyTeam {
    pub team_name: String,
    pub location: Location,
    /// Distance from the listing team in meters
    pub distance: f64,
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ServerMsg {
    /// Welcome message after connection
    Welcome {
        connection_id: Uuid,
        server_time: u64,
    },

    /// Acknowledges a group join (sent only to the joiner)
    JoinedTeam { team_name: String, message: String },

    /// A team moved (sent to every connection)
    LocationUpdated { team_name: String, location: Location },

    /// Private confirmation of the sender's own location write
    LocationUpdateConfirmed { team_name: String, location: Location },

    /// A team was eliminated (sent to every connection)
    TeamKilled {
        killer_team: String,
        killed_team: String,
        timestamp: DateTime<Utc>,
    },

    /// Sent only to the eliminated team's group
    YouWereKilled {
        killer_team: String,
        timestamp: DateTime<Utc>,
    },

    /// Periodic proximity snapshot for one team's group
    NearbyTeams {
        team_name: String,
        nearby_teams: Vec<NearbyTeam>,
        timestamp: DateTime<Utc>,
    },

    /// Error message
    Error {
        code: String,
        message: String,
        /// Measured distance when an elimination was out of range
        #[serde(skip_serializing_if = "Option::is_none")]
        distance: Option<f64>,
    },

    /// Pong response
    Pong {
        /// Echo back client timestamp
        t: u64,
    },
}

impl ServerMsg {
    pub fn error(code: &str, message: impl Into<String>) -> Self {
        Self::Error {
            code: code.to_string(),
            message: message.into(),
            distance: None,
        }
    }
}

impl From<&GameError> for ServerMsg {
    fn from(err: &GameError) -> Self {
        Self::Error {
            code: err.code().to_string(),
            message: err.to_string(),
            distance: err.distance(),
        }
    }
}
