pub mod config;
pub mod controller;
pub mod error;
pub mod model;
pub mod repository;
pub mod service;
pub mod util;

use crate::config::config::Config;
use crate::repository::gateway::PersistenceGateway;
use crate::repository::redis::StandingsCache;
use crate::service::clock::Clock;
use std::sync::Arc;

pub struct AppState {
    pub gateway: Arc<dyn PersistenceGateway>,
    pub clock: Arc<dyn Clock>,
    pub cache: Option<StandingsCache>,
    pub config: Config,
}
