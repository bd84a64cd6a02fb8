//! Team store on Supabase's PostgREST API using the service_role key
//!
//! Expects a `teams` table:
//!
//! ```sql
//! create table teams (
//!     team_name text primary key,
//!     latitude double precision,
//!     longitude double precision,
//!     location_updated_at timestamptz,
//!     active boolean not null default true
//! );
//! ```

use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt};
use reqwest::{Client, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::debug;

use crate::geo::Coordinate;

use super::{Location, StoreError, StoreResult, Team, TeamStore};

const TEAMS_TABLE: &str = "teams";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Row shape of the `teams` table
#[derive(Debug, Clone, Serialize, Deserialize)]
struct TeamRow {
    team_name: String,
    latitude: Option<f64>,
    longitude: Option<f64>,
    location_updated_at: Option<DateTime<Utc>>,
    active: bool,
}

impl From<TeamRow> for Team {
    fn from(row: TeamRow) -> Self {
        let location = match (row.latitude, row.longitude, row.location_updated_at) {
            (Some(latitude), Some(longitude), Some(updated_at)) => Some(Location {
                latitude,
                longitude,
                updated_at,
            }),
            _ => None,
        };
        Team {
            team_name: row.team_name,
            location,
            active: row.active,
        }
    }
}

/// Location write; omits `active` so conflicting rows keep their flag and new
/// rows take the column default
#[derive(Debug, Serialize)]
struct LocationWrite<'a> {
    team_name: &'a str,
    latitude: f64,
    longitude: f64,
    location_updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
struct ActiveUpdate {
    active: bool,
}

/// Supabase-backed team store
#[derive(Clone)]
pub struct SupabaseTeamStore {
    client: Client,
    base_url: String,
    service_role_key: String,
}

impl SupabaseTeamStore {
    pub fn new(base_url: &str, service_role_key: &str) -> StoreResult<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            service_role_key: service_role_key.to_string(),
        })
    }

    /// Get the REST API URL for a table
    fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.service_role_key)
            .header("Authorization", format!("Bearer {}", self.service_role_key))
    }

    async fn send_rows<T: DeserializeOwned>(&self, request: RequestBuilder) -> StoreResult<Vec<T>> {
        let response = request
            .send()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        let response = check_status(response).await?;
        response
            .json()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))
    }

    /// Insert or merge on `team_name`; the body never carries `active`
    fn upsert_request(&self, write: &LocationWrite<'_>) -> RequestBuilder {
        self.authorized(
            self.client
                .post(self.rest_url(TEAMS_TABLE))
                .query(&[("on_conflict", "team_name")])
                .header("Prefer", "resolution=merge-duplicates,return=representation")
                .json(write),
        )
    }

    fn select_active_request(&self, name: Option<&str>) -> RequestBuilder {
        let mut request = self
            .client
            .get(self.rest_url(TEAMS_TABLE))
            .query(&[("active", "is.true")]);
        if let Some(name) = name {
            request = request.query(&[("team_name", format!("eq.{}", name))]);
        }
        self.authorized(request)
    }

    /// Conditional on active=true so only the caller that flips the row gets it back
    fn deactivate_request(&self, name: &str) -> RequestBuilder {
        self.authorized(
            self.client
                .patch(self.rest_url(TEAMS_TABLE))
                .query(&[("team_name", format!("eq.{}", name))])
                .query(&[("active", "is.true")])
                .header("Prefer", "return=representation")
                .json(&ActiveUpdate { active: false }),
        )
    }

    async fn upsert(&self, name: &str, coordinate: Coordinate) -> StoreResult<Team> {
        let write = LocationWrite {
            team_name: name,
            latitude: coordinate.latitude,
            longitude: coordinate.longitude,
            location_updated_at: Utc::now(),
        };

        // PostgREST returns an array, get first element
        let rows: Vec<TeamRow> = self.send_rows(self.upsert_request(&write)).await?;
        rows.into_iter()
            .next()
            .map(Team::from)
            .ok_or_else(|| StoreError::Decode("no row returned from upsert".to_string()))
    }

    async fn select_active(&self, name: Option<&str>) -> StoreResult<Vec<Team>> {
        let rows: Vec<TeamRow> = self.send_rows(self.select_active_request(name)).await?;
        Ok(rows.into_iter().map(Team::from).collect())
    }

    async fn deactivate(&self, name: &str) -> StoreResult<Option<Team>> {
        let rows: Vec<TeamRow> = self.send_rows(self.deactivate_request(name)).await?;
        let team = rows.into_iter().next().map(Team::from);
        debug!(team = %name, transitioned = team.is_some(), "Conditional deactivate");
        Ok(team)
    }
}

async fn check_status(response: Response) -> StoreResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    if status.is_server_error() {
        Err(StoreError::Unavailable(format!("status {}: {}", status.as_u16(), body)))
    } else {
        Err(StoreError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}

impl TeamStore for SupabaseTeamStore {
    fn upsert_location<'a>(
        &'a self,
        name: &'a str,
        coordinate: Coordinate,
    ) -> BoxFuture<'a, StoreResult<Team>> {
        self.upsert(name, coordinate).boxed()
    }

    fn find_active<'a>(&'a self, name: &'a str) -> BoxFuture<'a, StoreResult<Option<Team>>> {
        async move { Ok(self.select_active(Some(name)).await?.into_iter().next()) }.boxed()
    }

    fn list_active(&self) -> BoxFuture<'_, StoreResult<Vec<Team>>> {
        self.select_active(None).boxed()
    }

    fn set_inactive<'a>(&'a self, name: &'a str) -> BoxFuture<'a, StoreResult<Option<Team>>> {
        self.deactivate(name).boxed()
    }
}
