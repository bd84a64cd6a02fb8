//! Team store contract and backends

pub mod memory;
pub mod supabase;

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

use crate::geo::Coordinate;

pub use memory::MemoryTeamStore;
pub use supabase::SupabaseTeamStore;

/// Last reported position of a team
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    pub updated_at: DateTime<Utc>,
}

impl Location {
    pub fn new(coordinate: Coordinate, updated_at: DateTime<Utc>) -> Self {
        Self {
            latitude: coordinate.latitude,
            longitude: coordinate.longitude,
            updated_at,
        }
    }

    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.latitude, self.longitude)
    }
}

/// A team record as owned by the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Team {
    pub team_name: String,
    /// `None` until the first location write lands
    pub location: Option<Location>,
    pub active: bool,
}

impl Team {
    pub fn coordinate(&self) -> Option<Coordinate> {
        self.location.as_ref().map(Location::coordinate)
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Authoritative storage for team records.
///
/// Every call is atomic on its own. Sequences of calls are not: callers that
/// read and then write must tolerate the record changing in between.
pub trait TeamStore: Send + Sync {
    /// Create the team as active if missing, otherwise overwrite only its location.
    fn upsert_location<'a>(
        &'a self,
        name: &'a str,
        coordinate: Coordinate,
    ) -> BoxFuture<'a, StoreResult<Team>>;

    fn find_active<'a>(&'a self, name: &'a str) -> BoxFuture<'a, StoreResult<Option<Team>>>;

    fn list_active(&self) -> BoxFuture<'_, StoreResult<Vec<Team>>>;

    /// Flip `active` to false.
    ///
    /// Returns the record only when this call made the transition; a missing
    /// or already inactive team yields `None`.
    fn set_inactive<'a>(&'a self, name: &'a str) -> BoxFuture<'a, StoreResult<Option<Team>>>;
}

/// Team store errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store rejected request (status {status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("failed to decode store response: {0}")]
    Decode(String),
}
