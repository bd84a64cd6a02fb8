//! Team service - the one place inbound mutations are validated and applied
//!
//! The HTTP routes and the WebSocket handler are thin adapters over this type.

use std::sync::Arc;

use tracing::debug;

use crate::geo::Coordinate;
use crate::store::{Team, TeamStore};
use crate::ws::gateway::Gateway;
use crate::ws::protocol::NearbyTeam;

use super::elimination::{self, EliminationRecord};
use super::error::{GameError, GameResult};
use super::proximity::nearby_from;
use super::snapshot;

/// Team service
pub struct TeamService {
    store: Arc<dyn TeamStore>,
    gateway: Arc<Gateway>,
    threshold: f64,
}

impl TeamService {
    pub fn new(store: Arc<dyn TeamStore>, gateway: Arc<Gateway>, threshold: f64) -> Self {
        Self {
            store,
            gateway,
            threshold,
        }
    }

    /// Validate and store a location report, then tell every connection
    pub async fn report_location(
        &self,
        team_name: Option<&str>,
        latitude: Option<f64>,
        longitude: Option<f64>,
    ) -> GameResult<Team> {
        let (Some(name), Some(latitude), Some(longitude)) =
            (present(team_name), latitude, longitude)
        else {
            return Err(GameError::validation(
                "Team name, latitude, and longitude are required",
            ));
        };
        let coordinate = Coordinate::new(latitude, longitude);
        coordinate.validate().map_err(GameError::validation)?;

        let team = self.store.upsert_location(name, coordinate).await?;
        debug!(team = %name, latitude, longitude, active = team.active, "Location stored");

        if let Some(msg) = snapshot::location_updated(&team) {
            self.gateway.emit_all(&msg);
        }
        Ok(team)
    }

    /// Active teams within `max_distance` (default threshold when `None`) of `team_name`
    pub async fn nearby(
        &self,
        team_name: &str,
        max_distance: Option<f64>,
    ) -> GameResult<Vec<NearbyTeam>> {
        let max_distance = max_distance.unwrap_or(self.threshold);
        if !max_distance.is_finite() || max_distance < 0.0 {
            return Err(GameError::validation(
                "maxDistance must be a non-negative number",
            ));
        }

        let name = present(Some(team_name))
            .ok_or_else(|| GameError::validation("Team name is required"))?;
        // An unlocated team has nothing to measure from
        let origin = self
            .store
            .find_active(name)
            .await?
            .filter(|team| team.location.is_some())
            .ok_or_else(|| GameError::NotFound(name.to_string()))?;
        let others = self.store.list_active().await?;

        Ok(nearby_from(&origin, &others, max_distance))
    }

    /// Validate and resolve an elimination, then broadcast it
    pub async fn eliminate(
        &self,
        killer_name: Option<&str>,
        target_name: Option<&str>,
    ) -> GameResult<EliminationRecord> {
        let (Some(killer), Some(target)) = (present(killer_name), present(target_name)) else {
            return Err(GameError::validation(
                "Team name and target team name are required",
            ));
        };
        if killer == target {
            return Err(GameError::validation("A team cannot eliminate itself"));
        }

        let record = elimination::kill(self.store.as_ref(), killer, target, self.threshold).await?;

        self.gateway.emit_all(&snapshot::team_killed(&record));
        self.gateway
            .emit_to_group(&record.target, &snapshot::you_were_killed(&record));
        Ok(record)
    }

    pub async fn active_teams(&self) -> GameResult<Vec<Team>> {
        Ok(self.store.list_active().await?)
    }
}

/// Treat empty and whitespace-only names as missing
fn present(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::proximity::DEFAULT_THRESHOLD_METERS;
    use crate::store::{MemoryTeamStore, StoreError, StoreResult};
    use crate::ws::protocol::ServerMsg;
    use futures::future::{self, BoxFuture, FutureExt};
    use tokio_test::{assert_err, assert_ok};

    /// Knows one active team that has never reported a position
    struct UnlocatedStore;

    impl TeamStore for UnlocatedStore {
        fn upsert_location<'a>(
            &'a self,
            _name: &'a str,
            _coordinate: Coordinate,
        ) -> BoxFuture<'a, StoreResult<Team>> {
            future::ready(Err(StoreError::Unavailable("read only".into()))).boxed()
        }

        fn find_active<'a>(&'a self, name: &'a str) -> BoxFuture<'a, StoreResult<Option<Team>>> {
            let team = Team {
                team_name: name.to_string(),
                location: None,
                active: true,
            };
            future::ready(Ok(Some(team))).boxed()
        }

        fn list_active(&self) -> BoxFuture<'_, StoreResult<Vec<Team>>> {
            future::ready(Ok(Vec::new())).boxed()
        }

        fn set_inactive<'a>(&'a self, _name: &'a str) -> BoxFuture<'a, StoreResult<Option<Team>>> {
            future::ready(Ok(None)).boxed()
        }
    }

    fn service() -> (TeamService, Arc<Gateway>) {
        let gateway = Arc::new(Gateway::new(16));
        let store: Arc<dyn TeamStore> = Arc::new(MemoryTeamStore::new());
        (
            TeamService::new(store, gateway.clone(), DEFAULT_THRESHOLD_METERS),
            gateway,
        )
    }

    #[tokio::test]
    async fn missing_fields_never_reach_the_store() {
        let (service, _) = service();

        let err = assert_err!(service.report_location(Some("Red"), Some(40.0), None).await);
        assert!(matches!(err, GameError::Validation(_)));
        let err = assert_err!(service.report_location(Some("  "), Some(40.0), Some(-75.0)).await);
        assert!(matches!(err, GameError::Validation(_)));
        let err = assert_err!(service.report_location(Some("Red"), Some(123.0), Some(-75.0)).await);
        assert!(matches!(err, GameError::Validation(_)));

        assert!(assert_ok!(service.active_teams().await).is_empty());
    }

    #[tokio::test]
    async fn zero_coordinates_are_valid() {
        let (service, _) = service();
        let team = assert_ok!(service.report_location(Some("Null"), Some(0.0), Some(0.0)).await);
        assert_eq!(team.coordinate(), Some(Coordinate::new(0.0, 0.0)));
    }

    #[tokio::test]
    async fn location_report_is_broadcast_to_everyone() {
        let (service, gateway) = service();
        let (_a, mut a_rx) = gateway.register();
        let (_b, mut b_rx) = gateway.register();

        assert_ok!(service.report_location(Some("Red"), Some(40.0), Some(-75.0)).await);

        for rx in [&mut a_rx, &mut b_rx] {
            assert!(matches!(
                rx.try_recv(),
                Ok(ServerMsg::LocationUpdated { ref team_name, .. }) if team_name == "Red"
            ));
        }
    }

    #[tokio::test]
    async fn nearby_for_unknown_team_is_not_found() {
        let (service, _) = service();
        let err = assert_err!(service.nearby("Ghost", None).await);
        assert!(matches!(err, GameError::NotFound(_)));
    }

    #[tokio::test]
    async fn nearby_trims_the_origin_name() {
        let (service, _) = service();
        assert_ok!(service.report_location(Some(" Red "), Some(40.0), Some(-75.0)).await);
        assert_ok!(service.report_location(Some("Blue"), Some(40.00005), Some(-75.0)).await);

        let nearby = assert_ok!(service.nearby(" Red", None).await);
        assert_eq!(nearby.len(), 1);
        assert_eq!(nearby[0].team_name, "Blue");
    }

    #[tokio::test]
    async fn nearby_for_unlocated_team_is_not_found() {
        let store: Arc<dyn TeamStore> = Arc::new(UnlocatedStore);
        let gateway = Arc::new(Gateway::new(16));
        let service = TeamService::new(store, gateway, DEFAULT_THRESHOLD_METERS);

        let err = assert_err!(service.nearby("Lost", None).await);
        assert!(matches!(err, GameError::NotFound(_)));
    }

    #[tokio::test]
    async fn nearby_honours_max_distance_override() {
        let (service, _) = service();
        assert_ok!(service.report_location(Some("Red"), Some(40.0), Some(-75.0)).await);
        assert_ok!(service.report_location(Some("Blue"), Some(40.0005), Some(-75.0)).await);

        assert!(assert_ok!(service.nearby("Red", None).await).is_empty());
        let wide = assert_ok!(service.nearby("Red", Some(100.0)).await);
        assert_eq!(wide.len(), 1);
        assert_eq!(wide[0].team_name, "Blue");

        let err = assert_err!(service.nearby("Red", Some(-1.0)).await);
        assert!(matches!(err, GameError::Validation(_)));
    }

    #[tokio::test]
    async fn elimination_broadcasts_globally_and_to_target_group() {
        let (service, gateway) = service();
        assert_ok!(service.report_location(Some("Red"), Some(40.0), Some(-75.0)).await);
        assert_ok!(service.report_location(Some("Blue"), Some(40.00005), Some(-75.0)).await);

        let (red_conn, mut red_rx) = gateway.register();
        let (blue_conn, mut blue_rx) = gateway.register();
        gateway.join(red_conn, "Red");
        gateway.join(blue_conn, "Blue");

        assert_ok!(service.eliminate(Some("Red"), Some("Blue")).await);

        assert!(matches!(red_rx.try_recv(), Ok(ServerMsg::TeamKilled { .. })));
        assert!(red_rx.try_recv().is_err());
        assert!(matches!(blue_rx.try_recv(), Ok(ServerMsg::TeamKilled { .. })));
        assert!(matches!(
            blue_rx.try_recv(),
            Ok(ServerMsg::YouWereKilled { ref killer_team, .. }) if killer_team == "Red"
        ));

        let active = assert_ok!(service.active_teams().await);
        assert_eq!(active.len(), 1);
    }

    #[tokio::test]
    async fn self_elimination_is_rejected() {
        let (service, _) = service();
        assert_ok!(service.report_location(Some("Red"), Some(40.0), Some(-75.0)).await);
        let err = assert_err!(service.eliminate(Some("Red"), Some("Red")).await);
        assert!(matches!(err, GameError::Validation(_)));
    }
}
