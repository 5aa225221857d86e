pub mod best_scores;
pub mod constants;
pub mod integrity;
pub mod potential;
pub mod rating;
pub mod recent_window;
pub mod structures;
pub mod validator;
pub mod window_cache;
