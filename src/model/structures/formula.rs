use serde::{Deserialize, Serialize};

/// Which per-player aggregate a formula term sums over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregateKind {
    Best,
    Recent
}

/// `weight × (sum of the top `amount` ratings of `kind`)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormulaTerm {
    pub kind: AggregateKind,
    pub amount: usize,
    pub weight: f64
}

impl FormulaTerm {
    pub fn new(kind: AggregateKind, amount: usize, weight: f64) -> FormulaTerm {
        FormulaTerm { kind, amount, weight }
    }
}
