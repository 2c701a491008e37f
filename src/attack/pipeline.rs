use crate::attack::forge::{Forger, Forgery};
use crate::attack::oracle::{LocalOracle, SigningOracle};
use crate::attack::recovery::{ChainRecovery, DigitRow, Observation};
use crate::attack::stats::append_count;
use crate::error::{Error, Result};
use crate::params::Params;
use log::{info, warn};
use rand::rngs::OsRng;
use rand::RngCore;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

/// Faulty queries a statistics trial spends before giving up.
pub const STATS_QUERY_CAP: usize = 2000;

/// Which top-layer W-OTS+ keys are attacked.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AttackMode {
    /// The key behind the first honest signature only.
    #[default]
    SingleSubtree,
    /// Every key of the top tree. Honest signatures are collected until all
    /// `2^h'` leaves are known, which needs randomized signing.
    ParallelSubtree,
}

#[derive(Clone, Debug)]
pub struct AttackConfig {
    pub mode: AttackMode,
    /// Stop after this many faulty queries; `None` runs until cancelled.
    /// In statistics runs it replaces [`STATS_QUERY_CAP`].
    pub max_queries: Option<usize>,
    /// Throwaway key pairs the forger may try.
    pub forge_attempts: usize,
    /// Message to forge a signature for once recovery stops.
    pub forge_target: Option<Vec<u8>>,
    /// File that statistics runs append their results to.
    pub stats_path: Option<PathBuf>,
}

impl Default for AttackConfig {
    fn default() -> Self {
        Self {
            mode: AttackMode::SingleSubtree,
            max_queries: None,
            forge_attempts: 10_000,
            forge_target: None,
            stats_path: None,
        }
    }
}

impl AttackConfig {
    pub fn with_mode(mut self, mode: AttackMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_max_queries(mut self, max_queries: Option<usize>) -> Self {
        self.max_queries = max_queries;
        self
    }

    pub fn with_forge_attempts(mut self, forge_attempts: usize) -> Self {
        self.forge_attempts = forge_attempts;
        self
    }

    pub fn with_forge_target(mut self, forge_target: Option<Vec<u8>>) -> Self {
        self.forge_target = forge_target;
        self
    }

    pub fn with_stats_path(mut self, stats_path: Option<PathBuf>) -> Self {
        self.stats_path = stats_path;
        self
    }
}

/// Outcome of [`AttackPipeline::run`].
pub struct AttackReport {
    pub honest_queries: usize,
    pub faulty_queries: usize,
    /// Faulty signatures that shortened at least one chain.
    pub improvements: usize,
    pub inconclusive: usize,
    pub recovery: ChainRecovery,
    /// `None` if no target was configured or the forger ran out of attempts.
    pub forgery: Option<Forgery>,
}

/// Drives the fault attack against one oracle.
pub struct AttackPipeline<O: SigningOracle> {
    oracle: O,
    config: AttackConfig,
}

impl<O: SigningOracle> AttackPipeline<O> {
    pub fn new(oracle: O, config: AttackConfig) -> Result<Self> {
        if config.mode == AttackMode::ParallelSubtree && !oracle.params().randomize {
            return Err(Error::InvalidParams(
                "parallel-subtree mode needs randomized signing".to_owned(),
            ));
        }
        Ok(Self { oracle, config })
    }

    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    pub fn oracle_mut(&mut self) -> &mut O {
        &mut self.oracle
    }

    pub fn into_oracle(self) -> O {
        self.oracle
    }

    pub fn config(&self) -> &AttackConfig {
        &self.config
    }

    fn new_recovery(&self) -> ChainRecovery {
        ChainRecovery::new(*self.oracle.params(), self.oracle.public_key().clone())
    }

    /// Requests honest signatures of `message` until the leaves the mode
    /// attacks are recorded. Returns the number of requests made.
    fn collect_honest(&mut self, message: &[u8], recovery: &mut ChainRecovery, cancel: &AtomicBool) -> Result<usize> {
        let wanted = match self.config.mode {
            AttackMode::SingleSubtree => 1,
            AttackMode::ParallelSubtree => self.oracle.params().xmss_leaves(),
        };
        let mut queries = 0;
        while recovery.tracked() < wanted {
            if queries > 0 && cancel.load(Ordering::Relaxed) {
                break;
            }
            let signature = self.oracle.sign(message)?;
            queries += 1;
            recovery.record_honest(message, &signature)?;
        }
        info!("Signed message: {} of {wanted} top leaves known after {queries} honest signatures", recovery.tracked());
        Ok(queries)
    }

    /// The leaf forgeries are restricted to.
    fn target_leaf(&self, recovery: &ChainRecovery) -> Option<u32> {
        match self.config.mode {
            AttackMode::SingleSubtree => recovery.leaves().next().map(|state| state.leaf()),
            AttackMode::ParallelSubtree => None,
        }
    }

    /// Collects honest signatures, then requests faulty signatures of
    /// `message` until `cancel` is set or the query limit is reached, and
    /// finally forges a signature of the configured target, if any.
    pub fn run(&mut self, message: &[u8], cancel: &AtomicBool) -> Result<AttackReport> {
        let mut recovery = self.new_recovery();
        let honest_queries = self.collect_honest(message, &mut recovery, cancel)?;

        info!("Signing faulty messages");
        let mut faulty_queries = 0;
        let mut improvements = 0;
        let mut inconclusive = 0;
        while !cancel.load(Ordering::Relaxed)
            && self.config.max_queries.map_or(true, |max| faulty_queries < max)
        {
            let signature = self.oracle.sign_faulty(message)?;
            faulty_queries += 1;
            match recovery.observe_faulty(message, &signature)? {
                (leaf, Observation::Improved(_)) => {
                    improvements += 1;
                    if let Some(state) = recovery.leaf(leaf) {
                        info!("New shortest set of hash chains for leaf {leaf}: {}", DigitRow {
                            known: state.hash_count(),
                            required: None,
                        });
                    }
                }
                (_, Observation::Inconclusive) => inconclusive += 1,
                (_, Observation::Unchanged) | (_, Observation::Untracked) => {}
            }
        }
        info!("Recovery stopped after {faulty_queries} faulty signatures, {improvements} of them useful");

        let forgery = match &self.config.forge_target {
            Some(target) => {
                let leaf = self.target_leaf(&recovery);
                match Forger::new(&recovery, self.config.forge_attempts).forge(target, leaf) {
                    Ok(forgery) => Some(forgery),
                    Err(Error::ForgeryNotFound(attempts)) => {
                        warn!("no forgery found within {attempts} attempts");
                        None
                    }
                    Err(e) => return Err(e),
                }
            }
            None => None,
        };

        Ok(AttackReport {
            honest_queries,
            faulty_queries,
            improvements,
            inconclusive,
            recovery,
            forgery,
        })
    }

    /// Counts the faulty signatures of `message` needed until a signature of
    /// `forge_target` becomes forgeable. A candidate for the target is fixed
    /// up front; `None` means no candidate was found or the query cap ran out
    /// first.
    pub fn run_stats(&mut self, message: &[u8], forge_target: &[u8]) -> Result<Option<usize>> {
        let mut recovery = self.new_recovery();
        self.collect_honest(message, &mut recovery, &AtomicBool::new(false))?;

        let leaf = self.target_leaf(&recovery);
        let candidate = match Forger::new(&recovery, self.config.forge_attempts).find_candidate(forge_target, leaf) {
            Ok(candidate) => candidate,
            Err(Error::ForgeryNotFound(attempts)) => {
                warn!("no candidate for the forgery target within {attempts} key pairs");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        let cap = self.config.max_queries.unwrap_or(STATS_QUERY_CAP);
        for query in 1..=cap {
            let signature = self.oracle.sign_faulty(message)?;
            let (hit, observation) = recovery.observe_faulty(message, &signature)?;
            if hit == candidate.leaf
                && matches!(observation, Observation::Improved(_))
                && Forger::new(&recovery, 0).is_forgeable(&candidate)
            {
                return Ok(Some(query));
            }
        }
        Ok(None)
    }
}

/// Runs statistics trials, each against a fresh [`LocalOracle`] with random
/// messages, until `trials` are done or `cancel` is set. Results are
/// appended to the configured statistics file as they come in.
pub fn run_stats_trials(
    params: Params,
    config: &AttackConfig,
    trials: Option<usize>,
    cancel: &AtomicBool,
) -> Result<Vec<Option<usize>>> {
    let mut results = Vec::new();
    while !cancel.load(Ordering::Relaxed) && trials.map_or(true, |trials| results.len() < trials) {
        let mut message = vec![0u8; params.n];
        let mut target = vec![0u8; params.n];
        OsRng.fill_bytes(&mut message);
        OsRng.fill_bytes(&mut target);

        let oracle = LocalOracle::new(params)?;
        let mut pipeline = AttackPipeline::new(oracle, config.clone())?;
        let required = pipeline.run_stats(&message, &target)?;
        pipeline.oracle_mut().shutdown();

        match required {
            Some(count) => info!("{count} faulty signatures required"),
            None => warn!("trial gave up, recorded as -1"),
        }
        if let Some(path) = &config.stats_path {
            append_count(path, required)?;
        }
        results.push(required);
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attack::stats::read_counts;
    use crate::params::{HashVariant, ParamSet};
    use crate::sphincs_plus::SphincsPlus;
    use tempfile::tempdir;

    fn params(randomize: bool) -> Params {
        ParamSet::Test.params(HashVariant::Simple).with_randomize(randomize)
    }

    #[test]
    fn test_parallel_needs_randomize() {
        let oracle = LocalOracle::new(params(false)).unwrap();
        let config = AttackConfig::default().with_mode(AttackMode::ParallelSubtree);
        assert!(matches!(
            AttackPipeline::new(oracle, config),
            Err(Error::InvalidParams(_))
        ));
    }

    #[test]
    fn test_single_subtree_run() {
        let oracle = LocalOracle::new(params(false)).unwrap();
        let config = AttackConfig::default()
            .with_max_queries(Some(300))
            .with_forge_attempts(400)
            .with_forge_target(Some(b"forge me".to_vec()));
        let mut pipeline = AttackPipeline::new(oracle, config).unwrap();

        let report = pipeline.run(b"sign me", &AtomicBool::new(false)).unwrap();
        assert_eq!(report.honest_queries, 1);
        assert_eq!(report.faulty_queries, 300);
        assert_eq!(report.inconclusive, 0);
        assert!(report.improvements > 0);
        assert_eq!(report.recovery.tracked(), 1);

        let forgery = report.forgery.unwrap();
        let sp = SphincsPlus::new(params(false));
        assert!(sp.verify(&forgery.signature, b"forge me", pipeline.oracle().public_key()));
        assert_eq!(pipeline.oracle().faulty_count(), 300);
    }

    #[test]
    fn test_cancelled_run_still_reports() {
        let oracle = LocalOracle::new(params(false)).unwrap();
        let mut pipeline = AttackPipeline::new(oracle, AttackConfig::default()).unwrap();
        let report = pipeline.run(b"sign me", &AtomicBool::new(true)).unwrap();
        assert_eq!(report.honest_queries, 1);
        assert_eq!(report.faulty_queries, 0);
        assert!(report.forgery.is_none());
    }

    #[test]
    fn test_exhausted_forger_keeps_report() {
        let oracle = LocalOracle::new(params(false)).unwrap();
        let config = AttackConfig::default()
            .with_max_queries(Some(5))
            .with_forge_attempts(0)
            .with_forge_target(Some(b"forge me".to_vec()));
        let mut pipeline = AttackPipeline::new(oracle, config).unwrap();
        let report = pipeline.run(b"sign me", &AtomicBool::new(false)).unwrap();
        assert_eq!(report.faulty_queries, 5);
        assert!(report.forgery.is_none());
    }

    #[test]
    fn test_parallel_subtree_run() {
        let oracle = LocalOracle::new(params(true)).unwrap();
        let config = AttackConfig::default()
            .with_mode(AttackMode::ParallelSubtree)
            .with_max_queries(Some(200));
        let mut pipeline = AttackPipeline::new(oracle, config).unwrap();

        let report = pipeline.run(b"sign me", &AtomicBool::new(false)).unwrap();
        let params = params(true);
        assert_eq!(report.recovery.tracked(), params.xmss_leaves());
        assert!(report.honest_queries >= params.xmss_leaves());
        // Every faulty signature lands on some tracked leaf.
        assert_eq!(report.inconclusive, 0);
        for state in report.recovery.leaves() {
            assert!(state.is_consistent(report.recovery.wots()));
        }
    }

    #[test]
    fn test_stats_trials() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("singleNodeFaultyRequires.csv");
        let config = AttackConfig::default()
            .with_forge_attempts(400)
            .with_stats_path(Some(path.clone()));

        let results = run_stats_trials(params(false), &config, Some(2), &AtomicBool::new(false)).unwrap();
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.map_or(true, |count| count <= STATS_QUERY_CAP)));
        assert_eq!(read_counts(&path).unwrap(), results);
    }

    #[test]
    fn test_stats_trials_without_candidate_are_recorded() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("singleNodeFaultyRequires.csv");
        let config = AttackConfig::default()
            .with_forge_attempts(0)
            .with_stats_path(Some(path.clone()));

        let results = run_stats_trials(params(false), &config, Some(3), &AtomicBool::new(false)).unwrap();
        assert_eq!(results, vec![None; 3]);
        assert_eq!(read_counts(&path).unwrap(), results);
        assert_eq!(std::fs::read_to_string(&path).unwrap().lines().count(), 3);
    }
}
