// Score scale
pub const MAX_BASE_SCORE: f64 = 10_000_000.0;
pub const RATING_CAP_SCORE: i32 = 10_000_000;
pub const EX_SCORE: i32 = 9_800_000;
pub const AA_SCORE: i32 = 9_500_000;
pub const HIGH_SCORE_SPAN: f64 = 200_000.0;
pub const LOW_SCORE_SPAN: f64 = 300_000.0;
// Grade floors
pub const GRADE_EX_PLUS: i32 = 9_900_000;
pub const GRADE_EX: i32 = EX_SCORE;
pub const GRADE_AA: i32 = AA_SCORE;
pub const GRADE_A: i32 = 9_200_000;
pub const GRADE_B: i32 = 8_900_000;
pub const GRADE_C: i32 = 8_600_000;
// score_v2
pub const SHINY_RATIO_FLOOR: f64 = 0.9;
pub const SHINY_RATIO_SPAN: f64 = 0.095;
pub const ACC_RATING_DIVISOR: f64 = 9.5;
pub const ACC_RATING_MULTIPLIER: f64 = 25.0;
pub const SCORE_RATIO_FLOOR: f64 = 0.99;
pub const SCORE_RATIO_SPAN: f64 = 0.01;
pub const SCORE_RATING_SCALE: f64 = 75.0;
pub const PLAY_VALUE_FACTOR: f64 = 9.065;
// Validation
pub const SCORE_TOLERANCE: f64 = 5.0;
pub const NOTES_PER_COMBO_INTERVAL: f64 = 150.0;
pub const MAX_FEVER_LEVEL: i64 = 5;
// Protection
pub const PROTECTED_HEALTH: i32 = -1;
pub const UNRANKED_RATING: f64 = -1.0;
// Recent window
pub const RECENT_WINDOW_CAPACITY: usize = 30;
pub const RECENT_DIVERSITY_FLOOR: usize = 10;
/// Registered players before idle window caches are dropped
pub const WINDOW_CACHE_PLAYERS: usize = 10_000;
// Default potential formula
pub const BEST_AMOUNT: usize = 30;
pub const RECENT_AMOUNT: usize = 10;
pub const FORMULA_WEIGHT: f64 = 1.0 / 40.0;
