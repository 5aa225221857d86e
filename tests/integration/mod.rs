use score_processor::{
    config::RatingConfig,
    database::memory::MemoryStore,
    processor::{collaborators::StaticChartCatalog, SubmissionProcessor},
    utils::test_utils::{generate_catalog, RecordingDispatcher}
};
use std::sync::Arc;

mod main_flow_tests;
mod recalculation_tests;
mod session_tests;

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub dispatcher: Arc<RecordingDispatcher>,
    pub processor: SubmissionProcessor<MemoryStore>
}

pub fn harness_with(config: RatingConfig, catalog: StaticChartCatalog) -> Harness {
    let store = Arc::new(MemoryStore::new());
    let dispatcher = Arc::new(RecordingDispatcher::new());
    let processor = SubmissionProcessor::new(Arc::clone(&store), config, Arc::new(catalog), dispatcher.clone());

    Harness {
        store,
        dispatcher,
        processor
    }
}

/// Default configuration over `song0..song49`
pub fn harness() -> Harness {
    harness_with(RatingConfig::default(), generate_catalog(50))
}
