//! Distance-gated elimination between two teams

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::geo::distance_meters;
use crate::store::{Team, TeamStore};

use super::error::{GameError, GameResult};
use super::proximity::within_threshold;

/// Outcome of a successful elimination, for the caller to broadcast
#[derive(Debug, Clone, PartialEq)]
pub struct EliminationRecord {
    pub killer: String,
    pub target: String,
    pub distance: f64,
    pub timestamp: DateTime<Utc>,
}

/// Eliminate `target_name` on behalf of `killer_name`.
///
/// Lookup and write are separate store calls, so another caller can take the
/// same target in between. `set_inactive` only hands back a record to the
/// caller that actually flipped it; everyone else gets `AlreadyEliminated`.
pub async fn kill(
    store: &dyn TeamStore,
    killer_name: &str,
    target_name: &str,
    threshold: f64,
) -> GameResult<EliminationRecord> {
    let killer = located_active(store, killer_name).await?;
    let target = located_active(store, target_name).await?;

    let (Some(killer_at), Some(target_at)) = (killer.coordinate(), target.coordinate()) else {
        return Err(GameError::Internal("located team lost its location".to_string()));
    };
    let distance = distance_meters(killer_at, target_at);
    if !within_threshold(distance, threshold) {
        debug!(killer = %killer_name, target = %target_name, distance, "Elimination out of range");
        return Err(GameError::TooFar { distance });
    }

    if store.set_inactive(target_name).await?.is_none() {
        return Err(GameError::AlreadyEliminated(target_name.to_string()));
    }

    info!(killer = %killer_name, target = %target_name, distance, "Team eliminated");
    Ok(EliminationRecord {
        killer: killer_name.to_string(),
        target: target_name.to_string(),
        distance,
        timestamp: Utc::now(),
    })
}

/// Active team that has reported a location; anything else counts as absent
async fn located_active(store: &dyn TeamStore, name: &str) -> GameResult<Team> {
    store
        .find_active(name)
        .await?
        .filter(|team| team.location.is_some())
        .ok_or_else(|| GameError::NotFound(name.to_string()))
}
