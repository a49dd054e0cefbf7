#![doc = include_str!("../README.md")]

pub mod cli;
pub mod client;
pub mod error;
pub mod evaluator;
pub mod measurement;
pub mod mix;
pub mod payload;
pub mod runner;
pub mod scenario;
pub mod token;

pub(crate) mod timer;
pub(crate) mod transaction;

pub use error::{PayloadError, RunError};
pub use scenario::LoadTest;

pub mod prelude {
    pub use crate::runner::StopHandle;
    pub use crate::scenario::{ConfigurableLoadTest, LoadTest};
    pub use ledger_load_core::{
        Comparator, Metric, MixWeights, OperationKind, RunConfig, RunReport, SloVerdict,
        Threshold,
    };
}
