pub mod best_record;
pub mod chart;
pub mod clear_type;
pub mod difficulty;
pub mod formula;
pub mod performance;
pub mod play_log;
pub mod player_rating;
pub mod recent_slot;
pub mod session;
