//! Application state shared across routes and sockets

use std::sync::Arc;

use tracing::info;

use crate::config::{Config, StoreBackend};
use crate::game::{BroadcastScheduler, TeamService};
use crate::store::{MemoryTeamStore, StoreError, SupabaseTeamStore, TeamStore};
use crate::ws::gateway::Gateway;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<dyn TeamStore>,
    pub gateway: Arc<Gateway>,
    pub teams: Arc<TeamService>,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self, StoreError> {
        let store: Arc<dyn TeamStore> = match &config.store {
            StoreBackend::Memory => {
                info!("Using in-memory team store");
                Arc::new(MemoryTeamStore::new())
            }
            StoreBackend::Supabase {
                url,
                service_role_key,
            } => {
                info!(url = %url, "Using Supabase team store");
                Arc::new(SupabaseTeamStore::new(url, service_role_key)?)
            }
        };

        Ok(Self::with_store(config, store))
    }

    /// Wire the gateway and service around an already built store
    pub fn with_store(config: Config, store: Arc<dyn TeamStore>) -> Self {
        let config = Arc::new(config);
        let gateway = Arc::new(Gateway::new(config.ws_outbound_buffer));
        let teams = Arc::new(TeamService::new(
            store.clone(),
            gateway.clone(),
            config.proximity_threshold_m,
        ));

        Self {
            config,
            store,
            gateway,
            teams,
        }
    }

    /// Scheduler bound to this state's store and gateway
    pub fn broadcast_scheduler(&self) -> BroadcastScheduler {
        BroadcastScheduler::new(
            self.store.clone(),
            self.gateway.clone(),
            self.config.broadcast_interval,
            self.config.proximity_threshold_m,
        )
    }
}
