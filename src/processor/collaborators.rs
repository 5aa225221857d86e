use futures::future::BoxFuture;
use serde::Serialize;
use std::{
    collections::HashMap,
    fs,
    path::Path,
    sync::{Mutex, PoisonError}
};
use tracing::info;

use crate::{
    error::{ConfigError, ProgressionError, SessionError},
    model::structures::{
        chart::{Chart, ChartKey},
        performance::RatedPlay,
        player_rating::PlayerRatingState,
        session::{SessionBinding, SessionKind}
    }
};

/// Read-only chart reference data.
pub trait ChartCatalog: Send + Sync {
    fn chart(&self, key: &ChartKey) -> Option<Chart>;
}

/// A catalog loaded once, from memory or a JSON array of charts.
#[derive(Debug, Clone, Default)]
pub struct StaticChartCatalog {
    charts: HashMap<ChartKey, Chart>
}

impl StaticChartCatalog {
    pub fn new(charts: impl IntoIterator<Item = Chart>) -> StaticChartCatalog {
        StaticChartCatalog {
            charts: charts.into_iter().map(|c| (c.key.clone(), c)).collect()
        }
    }

    pub fn from_json(json: &str) -> Result<StaticChartCatalog, ConfigError> {
        let charts: Vec<Chart> = serde_json::from_str(json)?;
        Ok(StaticChartCatalog::new(charts))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<StaticChartCatalog, ConfigError> {
        let catalog = StaticChartCatalog::from_json(&fs::read_to_string(path)?)?;
        info!("Loaded {} charts", catalog.len());
        Ok(catalog)
    }

    pub fn len(&self) -> usize {
        self.charts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.charts.is_empty()
    }
}

impl ChartCatalog for StaticChartCatalog {
    fn chart(&self, key: &ChartKey) -> Option<Chart> {
        self.charts.get(key).cloned()
    }
}

/// Looks up what a song token was issued for.
pub trait SessionService: Send + Sync {
    /// `None` means the token is unknown; the play is then treated as a plain play.
    fn resolve<'a>(
        &'a self,
        song_token: &'a str,
        player_id: i32
    ) -> BoxFuture<'a, Result<Option<SessionBinding>, SessionError>>;
}

/// Sessions registered up front, keyed by token.
#[derive(Default)]
pub struct StaticSessionService {
    bindings: Mutex<HashMap<String, SessionBinding>>
}

impl StaticSessionService {
    pub fn new() -> StaticSessionService {
        StaticSessionService::default()
    }

    pub fn insert(&self, song_token: impl Into<String>, binding: SessionBinding) {
        self.bindings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(song_token.into(), binding);
    }
}

impl SessionService for StaticSessionService {
    fn resolve<'a>(
        &'a self,
        song_token: &'a str,
        _player_id: i32
    ) -> BoxFuture<'a, Result<Option<SessionBinding>, SessionError>> {
        let binding = self
            .bindings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(song_token)
            .cloned();

        Box::pin(async move { Ok(binding) })
    }
}

/// The slice of a player account the engine is allowed to touch.
pub trait PlayerCapability: Send + Sync {
    fn player_id(&self) -> i32;

    fn stamina(&self) -> i32;

    /// Returns the stamina left afterwards.
    fn spend_stamina(&self, amount: i32) -> Result<i32, ProgressionError>;

    fn rating_state(&self) -> Option<PlayerRatingState>;

    /// Called once the new potential is committed.
    fn update_rating_state(&self, state: PlayerRatingState);
}

/// Everything a progression handler learns about a committed play.
pub struct ProgressionHandoff<'a> {
    pub player: &'a dyn PlayerCapability,
    pub play: &'a RatedPlay,
    pub session: &'a SessionKind,
    pub potential: f64,
    pub play_value: f64
}

/// Opaque result of a world or course update, passed through to the client.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressionOutcome {
    pub session: &'static str,
    pub data: serde_json::Value
}

/// World map or course progression, run after the rating aggregates are committed.
pub trait ProgressionHandler: Send + Sync {
    fn update<'a>(&'a self, handoff: ProgressionHandoff<'a>) -> BoxFuture<'a, Result<ProgressionOutcome, ProgressionError>>;
}
