use ledger_load_core::{ConfigError, MixWeights, OperationKind};
use rand::Rng;

/// Operation mix as cumulative upper bounds partitioning `[0, 1)`.
///
/// Selection is a single uniform draw: the first entry whose upper bound exceeds the draw wins.
/// Zero-weight entries own an empty interval and are never selected.
#[derive(Debug, Clone, PartialEq)]
pub struct MixPolicy {
    bounds: Vec<(OperationKind, f64)>,
}

impl MixPolicy {
    pub fn new(weights: &MixWeights) -> Result<Self, ConfigError> {
        weights.validate()?;

        let mut acc = 0.;
        let mut bounds: Vec<_> = weights
            .entries
            .iter()
            .map(|(kind, weight)| {
                acc += weight;
                (*kind, acc)
            })
            .collect();

        // Absorb rounding error so the last non-empty interval closes at exactly 1.0
        if let Some(last) = weights.entries.iter().rposition(|(_, w)| *w > 0.) {
            for bound in &mut bounds[last..] {
                bound.1 = 1.;
            }
        }

        Ok(Self { bounds })
    }

    pub fn select<R: Rng + ?Sized>(&self, rng: &mut R) -> OperationKind {
        self.kind_for(rng.gen::<f64>())
    }

    /// Operation owning `draw`, which must lie in `[0, 1)`.
    pub fn kind_for(&self, draw: f64) -> OperationKind {
        let idx = self.bounds.partition_point(|(_, upper)| *upper <= draw);
        let idx = idx.min(self.bounds.len() - 1);
        self.bounds[idx].0
    }

    /// Probability assigned to `kind`.
    pub fn probability(&self, kind: OperationKind) -> f64 {
        let mut lower = 0.;
        for (k, upper) in &self.bounds {
            if *k == kind {
                return upper - lower;
            }
            lower = *upper;
        }
        0.
    }
}

impl Default for MixPolicy {
    fn default() -> Self {
        Self {
            bounds: vec![
                (OperationKind::Charge, 0.60),
                (OperationKind::GetBalance, 0.75),
                (OperationKind::GetTransactions, 0.90),
                (OperationKind::Withdraw, 1.),
            ],
        }
    }
}
