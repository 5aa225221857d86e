use tracing::warn;

use super::recent_window::RecentWindow;
use crate::{
    config::RatingConfig,
    database::store::StoreTransaction,
    error::StoreError,
    model::structures::formula::{AggregateKind, FormulaTerm}
};

/// Evaluates the potential formula:
/// `Σ weight × (sum of the top `amount` ratings of the term's aggregate)`.
#[derive(Debug, Clone)]
pub struct PotentialCalculator {
    terms: Vec<FormulaTerm>
}

impl PotentialCalculator {
    /// Logs every configuration anomaly once; they are never corrected.
    pub fn new(config: &RatingConfig) -> PotentialCalculator {
        for anomaly in config.anomalies() {
            warn!("Potential formula: {}", anomaly);
        }

        PotentialCalculator {
            terms: config.potential_formula.clone()
        }
    }

    pub fn terms(&self) -> &[FormulaTerm] {
        &self.terms
    }

    /// Largest best-record amount any term asks for.
    pub fn best_depth(&self) -> usize {
        self.terms
            .iter()
            .filter(|t| t.kind == AggregateKind::Best)
            .map(|t| t.amount)
            .max()
            .unwrap_or(0)
    }

    /// `best` holds best ratings sorted highest first, at least
    /// [`best_depth`](Self::best_depth) of them when the player has that many.
    pub fn value(&self, best: &[f64], window: Option<&RecentWindow>) -> f64 {
        let recent = window.map(|w| w.best_per_chart()).unwrap_or_default();

        self.terms
            .iter()
            .map(|term| {
                let sum = match term.kind {
                    AggregateKind::Best => best_n(best, term.amount),
                    AggregateKind::Recent => best_n(&recent, term.amount)
                };
                term.weight * sum
            })
            .sum()
    }

    /// Reads the best ratings the formula needs through `tx` and evaluates it.
    pub async fn compute<T: StoreTransaction>(
        &self,
        tx: &mut T,
        window: Option<&RecentWindow>
    ) -> Result<f64, StoreError> {
        let best = match self.best_depth() {
            0 => Vec::new(),
            depth => tx.top_best_ratings(depth).await?
        };

        Ok(self.value(&best, window))
    }
}

/// Sum of the first `n` values of a descending list.
fn best_n(sorted: &[f64], n: usize) -> f64 {
    sorted.iter().take(n).sum()
}
