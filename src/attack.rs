//! Key recovery and forgery against a SPHINCS+ signer that can be faulted.
//!
//! The attack asks a [`SigningOracle`] for one honest signature of a fixed
//! message, which discloses the top-layer W-OTS+ public key that message
//! always uses when signing is deterministic. Faulty signatures of the same
//! message then make that key sign unknown messages, and every chain value
//! they reveal that sits earlier in its chain than anything seen before is
//! kept by [`ChainRecovery`]. Once enough chains are short, [`Forger`]
//! produces signatures of new messages that verify under the victim's key.
//!
//! [`AttackPipeline`] runs the whole protocol, either against the single key
//! the target message hits or against every key of the top tree at once.

pub mod forge;
pub mod oracle;
pub mod pipeline;
pub mod recovery;
pub mod stats;

pub use crate::attack::forge::{ForgeCandidate, Forger, Forgery};
pub use crate::attack::oracle::{LocalOracle, SigningOracle};
pub use crate::attack::pipeline::{
    run_stats_trials, AttackConfig, AttackMode, AttackPipeline, AttackReport, STATS_QUERY_CAP,
};
pub use crate::attack::recovery::{ChainRecovery, DigitRow, LeafRecovery, Observation};
