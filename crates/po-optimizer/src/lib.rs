//! # po-optimizer
//!
//! Sequential model-based optimization with an ask/tell interface.
//!
//! [`Optimizer::ask`] returns the next point(s) to evaluate and
//! [`Optimizer::tell`] records what the caller observed. The first
//! `warmup_count` observations come from random sampling; after that a
//! [`Surrogate`](po_learning::Surrogate) is refitted on the full history and
//! the [`CandidateProposer`] maximizes an acquisition function (EI, LCB or
//! PI) over the encoded space to pick new points.
//!
//! [`gp_minimize`] and [`dummy_minimize`] wrap the loop for objectives that
//! can be called in-process.

pub mod acquisition;
mod config;
mod minimize;
mod optimizer;
mod proposer;
mod result;

pub use acquisition::{AcquisitionConfig, AcquisitionKind};
pub use config::{OptimizerConfig, DEFAULT_WARMUP_COUNT};
pub use minimize::{dummy_minimize, gp_minimize, MinimizeConfig};
pub use optimizer::{Optimizer, OptimizerSnapshot, Phase};
pub use proposer::{CandidateProposer, EncodedHistory, ProposerConfig};
pub use result::OptimizeResult;
