pub mod collaborators;
pub mod tasks;

use chrono::{DateTime, Utc};
use futures::{stream, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use self::{
    collaborators::{
        ChartCatalog, PlayerCapability, ProgressionHandler, ProgressionHandoff, ProgressionOutcome, SessionService,
        StaticSessionService
    },
    tasks::{BackgroundTask, TaskDispatcher}
};
use crate::{
    config::RatingConfig,
    database::store::{Store, StoreTransaction},
    error::{IntegrityFailure, StoreError, SubmissionError, ValidationFailure},
    model::{
        best_scores::{is_protected, BestScoreStore, MergeOutcome},
        integrity,
        potential::PotentialCalculator,
        rating::{self, Grade},
        recent_window::PushOutcome,
        structures::{
            chart::Chart,
            performance::{RatedPlay, Submission, ValidatedPlay},
            play_log::{PlayLogEntry, RatingSnapshot},
            player_rating::{rating_ptt, PlayerRatingState},
            recent_slot::RecentEntry,
            session::{SessionKind, SessionProof}
        },
        validator,
        window_cache::{WindowCache, WindowCaches}
    },
    utils::progress_utils::progress_bar
};

/// What a client is told about an accepted submission.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmissionOutcome {
    /// 0 for unranked charts
    pub rating: f64,
    pub score_v2: f64,
    pub grade: Grade,
    pub is_new_best: bool,
    pub unranked: bool,
    pub player_potential: f64,
    pub previous_potential: f64,
    pub rating_ptt: i32,
    pub play_value: f64,
    /// The play rated above the player's potential after it
    pub challenge_higher: bool,
    pub progression: Option<ProgressionOutcome>
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecalculationSummary {
    pub updated: usize,
    pub failed: usize
}

/// What the transactional section produced.
struct Applied {
    merge: MergeOutcome,
    window: Option<PushOutcome>,
    previous_potential: f64,
    play_value: f64,
    state: PlayerRatingState,
    progression: Option<ProgressionOutcome>
}

/// Turns submissions into committed rating aggregates.
///
/// One processor serves every player. Submissions for the same player are
/// serialized through the window cache registry; different players proceed
/// in parallel.
pub struct SubmissionProcessor<S: Store> {
    store: Arc<S>,
    config: RatingConfig,
    catalog: Arc<dyn ChartCatalog>,
    sessions: Arc<dyn SessionService>,
    dispatcher: Arc<dyn TaskDispatcher>,
    world: Option<Arc<dyn ProgressionHandler>>,
    course: Option<Arc<dyn ProgressionHandler>>,
    potential: PotentialCalculator,
    caches: WindowCaches
}

impl<S: Store> SubmissionProcessor<S> {
    pub fn new(
        store: Arc<S>,
        config: RatingConfig,
        catalog: Arc<dyn ChartCatalog>,
        dispatcher: Arc<dyn TaskDispatcher>
    ) -> SubmissionProcessor<S> {
        SubmissionProcessor {
            potential: PotentialCalculator::new(&config),
            store,
            config,
            catalog,
            sessions: Arc::new(StaticSessionService::new()),
            dispatcher,
            world: None,
            course: None,
            caches: WindowCaches::new()
        }
    }

    pub fn with_sessions(mut self, sessions: Arc<dyn SessionService>) -> Self {
        self.sessions = sessions;
        self
    }

    pub fn with_world_progression(mut self, handler: Arc<dyn ProgressionHandler>) -> Self {
        self.world = Some(handler);
        self
    }

    pub fn with_course_progression(mut self, handler: Arc<dyn ProgressionHandler>) -> Self {
        self.course = Some(handler);
        self
    }

    pub fn config(&self) -> &RatingConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub async fn submit(
        &self,
        submission: &Submission,
        player: &dyn PlayerCapability
    ) -> Result<SubmissionOutcome, SubmissionError> {
        self.submit_at(submission, player, Utc::now()).await
    }

    /// [`submit`](Self::submit) with an explicit server time for the play.
    pub async fn submit_at(
        &self,
        submission: &Submission,
        player: &dyn PlayerCapability,
        now: DateTime<Utc>
    ) -> Result<SubmissionOutcome, SubmissionError> {
        let player_id = player.player_id();
        let play = validator::validate(submission)?;

        let chart = self.catalog.chart(&play.chart);
        if chart.is_none() && !self.config.allow_unknown_charts {
            return Err(ValidationFailure::UnknownChart(play.chart).into());
        }

        let session = match &submission.session {
            Some(proof) => self.resolve_session(player_id, &play, proof, chart.as_ref()).await?,
            None => SessionKind::Plain
        };

        let rated = rate(play, chart.as_ref(), now);
        debug!(
            "Player {} scored {} on {} (rating {:.4}, {} session)",
            player_id,
            rated.score(),
            rated.chart,
            rated.rating,
            session.name()
        );

        self.dispatcher
            .dispatch(BackgroundTask::RecordPlay(PlayLogEntry::new(Uuid::new_v4(), player_id, &rated)));

        let applied = {
            let mut cache = self.caches.acquire(player_id).await;
            match self.apply(&mut cache, player, &rated, &session, now).await {
                Ok(applied) => applied,
                Err(e) => {
                    cache.invalidate();
                    warn!("Submission for player {} rolled back: {}", player_id, e);
                    return Err(e);
                }
            }
        };

        let potential = applied.state.potential;
        info!(
            "Player {} potential {:.4} -> {:.4} (new best: {}, window: {:?})",
            player_id, applied.previous_potential, potential, applied.merge.is_new_best, applied.window
        );

        self.dispatcher
            .dispatch(BackgroundTask::RecordRatingSnapshot(RatingSnapshot::for_time(player_id, now, potential)));
        player.update_rating_state(applied.state.clone());

        Ok(SubmissionOutcome {
            rating: rated.rating,
            score_v2: rated.score_v2,
            grade: rating::grade(rated.score()),
            is_new_best: applied.merge.is_new_best,
            unranked: rated.unranked,
            player_potential: potential,
            previous_potential: applied.previous_potential,
            rating_ptt: rating_ptt(potential),
            play_value: applied.play_value,
            challenge_higher: !rated.unranked && rated.rating > potential,
            progression: applied.progression
        })
    }

    /// Recomputes a player's potential from stored aggregates, e.g. after a
    /// formula change.
    pub async fn recalculate_player(&self, player_id: i32) -> Result<PlayerRatingState, StoreError> {
        let mut cache = self.caches.acquire(player_id).await;

        let mut tx = self.store.begin(player_id).await?;
        let result = async {
            let revision = tx.player_rating().await?.map(|s| s.revision).unwrap_or(0);
            cache.sync(revision);

            let window = cache.load(&mut tx, &self.config.recent_window).await?;
            let potential = self.potential.compute(&mut tx, Some(window)).await?;
            cache.flush(&mut tx).await?;

            let state = PlayerRatingState {
                player_id,
                potential,
                updated_at: Utc::now(),
                revision: revision + 1
            };
            tx.save_player_rating(&state).await?;
            Ok::<_, StoreError>(state)
        }
        .await;

        let state = match result {
            Ok(state) => state,
            Err(e) => {
                cache.invalidate();
                rollback(tx).await;
                return Err(e);
            }
        };

        if let Err(e) = tx.commit().await {
            cache.invalidate();
            return Err(e);
        }
        cache.mark_committed(state.revision);

        Ok(state)
    }

    /// Recalculates every player with stored best records, `concurrency` at a time.
    pub async fn recalculate_all(&self, concurrency: usize) -> Result<RecalculationSummary, StoreError> {
        let player_ids = self.store.player_ids().await?;
        info!("Recalculating potential for {} players", player_ids.len());

        let bar = progress_bar(player_ids.len() as u64, "Recalculating potential");
        let mut summary = RecalculationSummary::default();

        let mut results = stream::iter(player_ids)
            .map(|player_id| async move { (player_id, self.recalculate_player(player_id).await) })
            .buffer_unordered(concurrency.max(1));

        while let Some((player_id, result)) = results.next().await {
            match result {
                Ok(_) => summary.updated += 1,
                Err(e) => {
                    warn!("Failed to recalculate player {}: {}", player_id, e);
                    summary.failed += 1;
                }
            }
            bar.inc(1);
        }

        bar.finish_with_message(format!("Recalculated {} players ({} failed)", summary.updated, summary.failed));
        Ok(summary)
    }

    async fn resolve_session(
        &self,
        player_id: i32,
        play: &ValidatedPlay,
        proof: &SessionProof,
        chart: Option<&Chart>
    ) -> Result<SessionKind, SubmissionError> {
        if self.config.session_bypass_token.as_deref() == Some(proof.song_token.as_str()) {
            debug!("Bypass token used by player {}, skipping session checks", player_id);
            return Ok(SessionKind::Plain);
        }

        let binding = self.sessions.resolve(&proof.song_token, player_id).await?;
        if let Some(binding) = &binding {
            if binding.chart != play.chart {
                return Err(IntegrityFailure::SessionChartMismatch {
                    bound: binding.chart.clone(),
                    submitted: play.chart.clone()
                }
                .into());
            }
        }

        integrity::verify(player_id, play, proof, chart)?;

        Ok(binding.map(|b| b.kind).unwrap_or(SessionKind::Plain))
    }

    /// One transaction: aggregates, then the progression hand-off, then commit.
    /// Nothing is committed if any step fails.
    async fn apply(
        &self,
        cache: &mut WindowCache,
        player: &dyn PlayerCapability,
        play: &RatedPlay,
        session: &SessionKind,
        now: DateTime<Utc>
    ) -> Result<Applied, SubmissionError> {
        let mut tx = self.store.begin(player.player_id()).await?;

        let result = async {
            let mut applied = self.apply_in(&mut tx, cache, player.player_id(), play, now).await?;
            applied.progression = self
                .progress(player, play, session, applied.state.potential, applied.play_value)
                .await?;
            Ok::<_, SubmissionError>(applied)
        }
        .await;

        match result {
            Ok(applied) => {
                tx.commit().await?;
                cache.mark_committed(applied.state.revision);
                Ok(applied)
            }
            Err(e) => {
                rollback(tx).await;
                Err(e)
            }
        }
    }

    async fn apply_in(
        &self,
        tx: &mut S::Transaction,
        cache: &mut WindowCache,
        player_id: i32,
        play: &RatedPlay,
        now: DateTime<Utc>
    ) -> Result<Applied, StoreError> {
        let window_config = &self.config.recent_window;
        let previous = tx.player_rating().await?;
        let previous_potential = previous.as_ref().map(|s| s.potential).unwrap_or(0.0);
        let revision = previous.as_ref().map(|s| s.revision).unwrap_or(0);

        // Another writer may have committed since the mirror was filled
        cache.sync(revision);

        let merge = BestScoreStore::merge(tx, player_id, play).await?;

        // Unranked plays never enter the window
        let window = if play.unranked {
            None
        } else {
            let protected = is_protected(play, merge.is_new_best);
            let outcome = cache
                .push(tx, window_config, RecentEntry::from(play), protected)
                .await?;
            cache.flush(tx).await?;
            Some(outcome)
        };

        let loaded = cache.load(tx, window_config).await?;
        let potential = self.potential.compute(tx, Some(loaded)).await?;

        let state = PlayerRatingState {
            player_id,
            potential,
            updated_at: now,
            revision: revision + 1
        };
        tx.save_player_rating(&state).await?;

        Ok(Applied {
            merge,
            window,
            previous_potential,
            play_value: rating::play_value(play.rating),
            state,
            progression: None
        })
    }

    async fn progress(
        &self,
        player: &dyn PlayerCapability,
        play: &RatedPlay,
        session: &SessionKind,
        potential: f64,
        play_value: f64
    ) -> Result<Option<ProgressionOutcome>, SubmissionError> {
        let handler = match session {
            SessionKind::Plain => return Ok(None),
            SessionKind::World(_) => self.world.as_ref(),
            SessionKind::Course(_) => self.course.as_ref()
        };

        let Some(handler) = handler else {
            debug!("No {} progression handler registered", session.name());
            return Ok(None);
        };

        let handoff = ProgressionHandoff {
            player,
            play,
            session,
            potential,
            play_value
        };

        match handler.update(handoff).await {
            Ok(outcome) => Ok(Some(outcome)),
            Err(e) => {
                error!(
                    "{} progression failed for player {}, rolling back: {}",
                    session.name(),
                    player.player_id(),
                    e
                );
                Err(e.into())
            }
        }
    }
}

async fn rollback<T: StoreTransaction>(tx: T) {
    if let Err(e) = tx.rollback().await {
        warn!("Rollback failed: {}", e);
    }
}

/// Derives rating and score_v2. Unranked plays are rated 0.
fn rate(play: ValidatedPlay, chart: Option<&Chart>, now: DateTime<Utc>) -> RatedPlay {
    let chart_const = chart.and_then(|c| c.chart_const);
    let unranked = !chart.is_some_and(Chart::is_ranked);

    let record = &play.record;
    let score_v2 = rating::score_v2(
        chart_const,
        record.shiny_perfect_count,
        record.perfect_count,
        record.near_count,
        record.miss_count
    );

    RatedPlay {
        rating: if unranked { 0.0 } else { rating::rating(chart_const, record.score) },
        score_v2,
        unranked,
        chart: play.chart,
        record: play.record,
        clear_type: play.clear_type,
        played_at: now
    }
}
