use clap::Parser;
use score_processor::{
    args::{Args, Command},
    config::RatingConfig,
    database::db::DbClient,
    error::ProgressionError,
    model::structures::{performance::Submission, player_rating::PlayerRatingState},
    processor::{
        collaborators::{PlayerCapability, StaticChartCatalog},
        tasks::TokioDispatcher,
        SubmissionProcessor
    }
};
use std::{
    error::Error,
    fs,
    process,
    sync::{Arc, Mutex, PoisonError}
};
use tracing::{error, info};
use tracing_indicatif::IndicatifLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Player account as seen from the command line: no stamina bookkeeping.
struct CliPlayer {
    player_id: i32,
    rating: Mutex<Option<PlayerRatingState>>
}

impl PlayerCapability for CliPlayer {
    fn player_id(&self) -> i32 {
        self.player_id
    }

    fn stamina(&self) -> i32 {
        i32::MAX
    }

    fn spend_stamina(&self, _amount: i32) -> Result<i32, ProgressionError> {
        Ok(i32::MAX)
    }

    fn rating_state(&self) -> Option<PlayerRatingState> {
        self.rating.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn update_rating_state(&self, state: PlayerRatingState) {
        *self.rating.lock().unwrap_or_else(PoisonError::into_inner) = Some(state);
    }
}

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    let args = Args::parse();

    let indicatif_layer = IndicatifLayer::new();
    tracing_subscriber::registry()
        .with(EnvFilter::new(&args.log_level))
        .with(tracing_subscriber::fmt::layer().with_writer(indicatif_layer.get_stderr_writer()))
        .with(indicatif_layer)
        .init();

    if let Err(e) = run(args).await {
        error!("{}", e);
        process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), Box<dyn Error>> {
    let config = match &args.config {
        Some(path) => RatingConfig::from_file(path)?,
        None => RatingConfig::default()
    };

    let store = match DbClient::connect_sharded(&args.connection_string, args.connections).await {
        Ok(client) => Arc::new(client),
        Err(e) => {
            error!("Failed to connect to database: {}", e);
            error!("Application cannot start without a valid database connection");
            return Err(e.into());
        }
    };

    match args.command {
        Command::Migrate => store.migrate().await?,
        Command::Submit {
            player_id,
            charts,
            submission
        } => {
            let catalog = Arc::new(StaticChartCatalog::from_file(charts)?);
            let submission: Submission = serde_json::from_str(&fs::read_to_string(submission)?)?;
            let dispatcher = Arc::new(TokioDispatcher::new(Arc::clone(&store), config.background.clone()));

            let processor = SubmissionProcessor::new(store, config, catalog, dispatcher.clone());
            let player = CliPlayer {
                player_id,
                rating: Mutex::new(None)
            };

            let result = processor.submit(&submission, &player).await;
            dispatcher.drain().await;

            match result {
                Ok(outcome) => println!("{}", serde_json::to_string_pretty(&outcome)?),
                Err(e) => {
                    error!("Submission rejected ({}): {}", e.reason_code(), e);
                    return Err(e.into());
                }
            }
        }
        Command::Recalculate { concurrency } => {
            let dispatcher = Arc::new(TokioDispatcher::new(Arc::clone(&store), config.background.clone()));
            let catalog = Arc::new(StaticChartCatalog::default());
            let processor = SubmissionProcessor::new(store, config, catalog, dispatcher);

            let summary = processor.recalculate_all(concurrency).await?;
            info!("Recalculation complete: {} updated, {} failed", summary.updated, summary.failed);
        }
    }

    Ok(())
}
