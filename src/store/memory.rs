//! In-process team store backed by a concurrent map

use chrono::Utc;
use dashmap::DashMap;
use futures::future::{self, BoxFuture, FutureExt};

use crate::geo::Coordinate;

use super::{Location, StoreResult, Team, TeamStore};

/// Team store kept entirely in memory.
///
/// Each operation holds the map's per-key lock for its duration, which is what
/// makes `set_inactive` a true compare-and-set.
#[derive(Default)]
pub struct MemoryTeamStore {
    teams: DashMap<String, Team>,
}

impl MemoryTeamStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of records, including eliminated teams
    pub fn len(&self) -> usize {
        self.teams.len()
    }

    fn upsert(&self, name: &str, coordinate: Coordinate) -> Team {
        let location = Location::new(coordinate, Utc::now());
        let entry = self
            .teams
            .entry(name.to_string())
            .and_modify(|team| team.location = Some(location))
            .or_insert_with(|| Team {
                team_name: name.to_string(),
                location: Some(location),
                active: true,
            });
        entry.value().clone()
    }

    fn deactivate(&self, name: &str) -> Option<Team> {
        let mut team = self.teams.get_mut(name)?;
        if !team.active {
            return None;
        }
        team.active = false;
        Some(team.value().clone())
    }
}

impl TeamStore for MemoryTeamStore {
    fn upsert_location<'a>(
        &'a self,
        name: &'a str,
        coordinate: Coordinate,
    ) -> BoxFuture<'a, StoreResult<Team>> {
        future::ready(Ok(self.upsert(name, coordinate))).boxed()
    }

    fn find_active<'a>(&'a self, name: &'a str) -> BoxFuture<'a, StoreResult<Option<Team>>> {
        let team = self
            .teams
            .get(name)
            .filter(|team| team.active)
            .map(|team| team.value().clone());
        future::ready(Ok(team)).boxed()
    }

    fn list_active(&self) -> BoxFuture<'_, StoreResult<Vec<Team>>> {
        let teams = self
            .teams
            .iter()
            .filter(|entry| entry.active)
            .map(|entry| entry.value().clone())
            .collect();
        future::ready(Ok(teams)).boxed()
    }

    fn set_inactive<'a>(&'a self, name: &'a str) -> BoxFuture<'a, StoreResult<Option<Team>>> {
        future::ready(Ok(self.deactivate(name))).boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::assert_ok;

    #[tokio::test]
    async fn upsert_creates_active_team() {
        let store = MemoryTeamStore::new();
        let team = assert_ok!(store.upsert_location("Red", Coordinate::new(40.0, -75.0)).await);

        assert_eq!(team.team_name, "Red");
        assert!(team.active);
        assert_eq!(team.coordinate(), Some(Coordinate::new(40.0, -75.0)));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn upsert_overwrites_location_and_refreshes_timestamp() {
        let store = MemoryTeamStore::new();
        let first = assert_ok!(store.upsert_location("Red", Coordinate::new(40.0, -75.0)).await);
        let second = assert_ok!(store.upsert_location("Red", Coordinate::new(41.0, -74.0)).await);

        let (first_loc, second_loc) = (first.location.unwrap(), second.location.unwrap());
        assert_eq!(second_loc.coordinate(), Coordinate::new(41.0, -74.0));
        assert!(second_loc.updated_at >= first_loc.updated_at);
        assert!(second.active);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn upsert_never_reactivates_an_eliminated_team() {
        let store = MemoryTeamStore::new();
        assert_ok!(store.upsert_location("Blue", Coordinate::new(40.0, -75.0)).await);
        assert!(assert_ok!(store.set_inactive("Blue").await).is_some());

        let team = assert_ok!(store.upsert_location("Blue", Coordinate::new(40.5, -75.5)).await);
        assert!(!team.active);
        assert_eq!(team.coordinate(), Some(Coordinate::new(40.5, -75.5)));
        assert!(assert_ok!(store.find_active("Blue").await).is_none());
    }

    #[tokio::test]
    async fn set_inactive_reports_only_the_transition() {
        let store = MemoryTeamStore::new();
        assert_ok!(store.upsert_location("Blue", Coordinate::new(40.0, -75.0)).await);

        let first = assert_ok!(store.set_inactive("Blue").await);
        assert_eq!(first.map(|t| t.active), Some(false));
        assert!(assert_ok!(store.set_inactive("Blue").await).is_none());
        assert!(assert_ok!(store.set_inactive("Nobody").await).is_none());
    }

    #[tokio::test]
    async fn active_views_exclude_eliminated_teams() {
        let store = MemoryTeamStore::new();
        assert_ok!(store.upsert_location("Red", Coordinate::new(40.0, -75.0)).await);
        assert_ok!(store.upsert_location("Blue", Coordinate::new(40.0, -75.0)).await);
        assert_ok!(store.set_inactive("Blue").await);

        let active = assert_ok!(store.list_active().await);
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].team_name, "Red");
        assert!(assert_ok!(store.find_active("Red").await).is_some());
        assert!(assert_ok!(store.find_active("Blue").await).is_none());
        assert_eq!(store.len(), 2);
    }
}
