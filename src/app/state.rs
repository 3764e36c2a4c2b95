use crate::adapters::{leaderboard, met::MetClient, nominatim::NominatimGeocoder};
use crate::config::TomlConfig;
use crate::core::candidates::CandidateProvider;
use crate::core::leaderboard::LeaderboardService;
use crate::core::rounds::RoundStore;
use crate::domain::ports::{Geocoder, LeaderboardStore, MuseumApi};
use crate::utils::error::Result;
use std::sync::Arc;

/// 所有 handler 共用的服務；clone 只複製 Arc
#[derive(Clone)]
pub struct AppState {
    pub candidates: Arc<CandidateProvider>,
    pub rounds: Arc<RoundStore>,
    pub leaderboard: Arc<LeaderboardService>,
    pub geocoder: Option<Arc<dyn Geocoder>>,
    pub allowed_origins: Vec<String>,
}

impl AppState {
    /// 依設定建立真實的上游客戶端 (需在 tokio runtime 內呼叫)
    pub fn from_config(config: &TomlConfig) -> Result<Self> {
        let museum: Arc<dyn MuseumApi> =
            Arc::new(MetClient::from_config(&config.museum, &config.circuit_breaker)?);
        let store = leaderboard::from_config(&config.leaderboard)?;
        let geocoder: Option<Arc<dyn Geocoder>> = if config.geocoder.enabled {
            Some(Arc::new(NominatimGeocoder::from_config(&config.geocoder)?))
        } else {
            tracing::info!("Guess snapping disabled");
            None
        };

        Ok(Self::with_ports(config, museum, store, geocoder))
    }

    pub fn with_ports(
        config: &TomlConfig,
        museum: Arc<dyn MuseumApi>,
        store: Arc<dyn LeaderboardStore>,
        geocoder: Option<Arc<dyn Geocoder>>,
    ) -> Self {
        let candidates =
            CandidateProvider::from_config(&config.museum, &config.fallback, museum.clone());
        let rounds =
            RoundStore::from_config(&config.rounds, museum).with_catalogue(candidates.catalogue());

        Self {
            candidates: Arc::new(candidates),
            rounds: Arc::new(rounds),
            leaderboard: Arc::new(LeaderboardService::new(store, config.leaderboard.size)),
            geocoder,
            allowed_origins: config.server.allowed_origins.clone(),
        }
    }
}
