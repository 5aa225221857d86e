use serde::Serialize;

use super::constants::*;

/// Letter grade shown for a score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Grade {
    D,
    C,
    B,
    A,
    Aa,
    Ex,
    ExPlus
}

/// Rating of a single play.
///
/// Returns [`UNRANKED_RATING`] when the chart has no usable constant.
/// The curve is piecewise linear: one point per 300k below EX, one point per
/// 200k between EX and the 10M cap, and a flat `+2` at or above 10M.
/// Only the low branch is clamped at zero.
pub fn rating(chart_const: Option<f64>, score: i32) -> f64 {
    let chart_const = match chart_const {
        Some(c) if c > 0.0 => c,
        _ => return UNRANKED_RATING
    };

    if score >= RATING_CAP_SCORE {
        chart_const + 2.0
    } else if score < EX_SCORE {
        (chart_const + (score - AA_SCORE) as f64 / LOW_SCORE_SPAN).max(0.0)
    } else {
        chart_const + 1.0 + (score - EX_SCORE) as f64 / HIGH_SCORE_SPAN
    }
}

/// Accuracy-weighted score metric used to break ties in global ranking.
/// Lies in `[0, chart_const]`; zero for unranked charts or empty records.
pub fn score_v2(chart_const: Option<f64>, shiny: i32, perfect: i32, near: i32, miss: i32) -> f64 {
    let chart_const = match chart_const {
        Some(c) if c > 0.0 => c,
        _ => return 0.0
    };

    let total = perfect as f64 + near as f64 + miss as f64;
    if total == 0.0 {
        return 0.0;
    }

    let shiny_ratio = shiny as f64 / total;
    let score_ratio = (perfect as f64 + near as f64 / 2.0) / total + shiny as f64 / MAX_BASE_SCORE;

    let acc_rating =
        (shiny_ratio - SHINY_RATIO_FLOOR).clamp(0.0, SHINY_RATIO_SPAN) / ACC_RATING_DIVISOR * ACC_RATING_MULTIPLIER;
    let score_rating = (score_ratio - SCORE_RATIO_FLOOR).clamp(0.0, SCORE_RATIO_SPAN) * SCORE_RATING_SCALE;

    chart_const * (acc_rating + score_rating)
}

pub fn grade(score: i32) -> Grade {
    match score {
        s if s >= GRADE_EX_PLUS => Grade::ExPlus,
        s if s >= GRADE_EX => Grade::Ex,
        s if s >= GRADE_AA => Grade::Aa,
        s if s >= GRADE_A => Grade::A,
        s if s >= GRADE_B => Grade::B,
        s if s >= GRADE_C => Grade::C,
        _ => Grade::D
    }
}

/// Value a single play contributes to finale challenge progress.
pub fn play_value(rating: f64) -> f64 {
    PLAY_VALUE_FACTOR * rating.max(0.0).sqrt()
}
