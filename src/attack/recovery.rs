//! Recovery of W-OTS+ chain values from faulty signatures.
//!
//! For every top-layer leaf under attack, [`LeafRecovery`] keeps per chain
//! the fewest-hashed value disclosed so far (`shortest_sig`) together with
//! its position in the chain (`hash_count`). A chain can only be walked
//! forward, so with those values any message whose digits are all
//! `>= hash_count` can be signed with that leaf.

use crate::error::{Error, Result};
use crate::hypertree::Hypertree;
use crate::params::Params;
use crate::sphincs_plus::{SphincsPlus, SphincsPlusPublicKey, SphincsPlusSignature};
use crate::wots_plus::adrs::Adrs;
use crate::wots_plus::WotsPlus;
use crate::xmss::Xmss;
use log::{debug, info, warn};
use std::collections::BTreeMap;
use std::fmt;

/// Outcome of feeding one faulty signature into the recovery state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Observation {
    /// The signature belongs to a top leaf that is not tracked.
    Untracked,
    /// Some chain matched no position of the known public key; the fault
    /// did not produce a usable signature.
    Inconclusive,
    /// Every chain matched, none was shorter than what is known.
    Unchanged,
    /// The given number of chains got shorter.
    Improved(usize),
}

/// Recovery state of one top-layer W-OTS+ key.
#[derive(Clone, Debug)]
pub struct LeafRecovery {
    leaf: u32,
    adrs: Adrs,
    ots_pk: Vec<u8>,
    hash_count: Vec<u32>,
    shortest_sig: Vec<u8>,
    auth: Vec<u8>,
}

impl LeafRecovery {
    /// Starts from an honest top-layer signature `ots_sig` of `ots_msg`.
    pub fn from_honest(
        wots: &WotsPlus,
        leaf: u32,
        ots_msg: &[u8],
        ots_sig: &[u8],
        auth: &[u8],
    ) -> Self {
        let top = wots.params().d - 1;
        let adrs = Xmss::wots_adrs(&Hypertree::layer_adrs(top, 0), leaf);
        Self {
            leaf,
            adrs,
            ots_pk: wots.pk_from_sig(ots_sig, ots_msg, adrs),
            hash_count: wots.chain_lengths(ots_msg),
            shortest_sig: ots_sig.to_vec(),
            auth: auth.to_vec(),
        }
    }

    pub fn leaf(&self) -> u32 {
        self.leaf
    }

    /// Uncompressed W-OTS+ public key of the leaf.
    pub fn ots_pk(&self) -> &[u8] {
        &self.ots_pk
    }

    pub fn hash_count(&self) -> &[u32] {
        &self.hash_count
    }

    pub fn shortest_sig(&self) -> &[u8] {
        &self.shortest_sig
    }

    /// Authentication path of the leaf in the top tree.
    pub fn auth(&self) -> &[u8] {
        &self.auth
    }

    /// Takes the chains of `bad_sig` that are strictly shorter than the
    /// known ones.
    pub fn observe(&mut self, wots: &WotsPlus, bad_sig: &[u8]) -> Observation {
        let n = wots.params().n;
        let Some(positions) = wots.message_from_sig(bad_sig, &self.ots_pk, self.adrs) else {
            return Observation::Inconclusive;
        };

        let mut improved = 0;
        for (block, &position) in positions.iter().enumerate() {
            if position < self.hash_count[block] {
                self.hash_count[block] = position;
                self.shortest_sig[block * n..(block + 1) * n]
                    .copy_from_slice(&bad_sig[block * n..(block + 1) * n]);
                improved += 1;
            }
        }

        if improved == 0 {
            Observation::Unchanged
        } else {
            Observation::Improved(improved)
        }
    }

    /// Every stored chain value, walked to the end, hits the public key.
    pub fn is_consistent(&self, wots: &WotsPlus) -> bool {
        let n = wots.params().n;
        let w = wots.params().w as u32;
        let mut adrs = self.adrs;
        self.hash_count.iter().enumerate().all(|(i, &count)| {
            adrs.set_chain_addr(i as u32);
            let end = wots.chain(&self.shortest_sig[i * n..(i + 1) * n], count, w - 1 - count, adrs);
            end == self.ots_pk[i * n..(i + 1) * n]
        })
    }

    /// Whether a message with the given chain lengths can be signed.
    pub fn can_sign(&self, digits: &[u32]) -> bool {
        digits.len() == self.hash_count.len()
            && digits.iter().zip(&self.hash_count).all(|(digit, count)| digit >= count)
    }

    /// W-OTS+ signature for a message with the given chain lengths, or
    /// `None` if some digit lies before the known position.
    pub fn forge_wots(&self, wots: &WotsPlus, digits: &[u32]) -> Option<Vec<u8>> {
        if !self.can_sign(digits) {
            return None;
        }
        let n = wots.params().n;
        let mut adrs = self.adrs;
        let mut sig = Vec::with_capacity(self.shortest_sig.len());
        for (i, (&digit, &count)) in digits.iter().zip(&self.hash_count).enumerate() {
            adrs.set_chain_addr(i as u32);
            sig.extend(wots.chain(&self.shortest_sig[i * n..(i + 1) * n], count, digit - count, adrs));
        }
        Some(sig)
    }
}

/// Two digit rows printed as zero-padded columns, the second one marking
/// with `!` every digit that lies before the matching one in the first.
pub struct DigitRow<'a> {
    pub known: &'a [u32],
    pub required: Option<&'a [u32]>,
}

impl fmt::Display for DigitRow<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for digit in self.known {
            write!(f, "{digit:02} ")?;
        }
        write!(f, "]")?;
        if let Some(required) = self.required {
            write!(f, "\n[")?;
            for (digit, known) in required.iter().zip(self.known) {
                let mark = if digit < known { "!" } else { " " };
                write!(f, "{digit:02}{mark}")?;
            }
            write!(f, "]")?;
        }
        Ok(())
    }
}

/// Recovery state of all attacked top-layer leaves of one public key.
pub struct ChainRecovery {
    sphincs: SphincsPlus,
    pk: SphincsPlusPublicKey,
    wots: WotsPlus,
    leaves: BTreeMap<u32, LeafRecovery>,
}

impl ChainRecovery {
    pub fn new(params: Params, pk: SphincsPlusPublicKey) -> Self {
        let wots = WotsPlus::new(&params, pk.pk_seed());
        Self {
            sphincs: SphincsPlus::new(params),
            pk,
            wots,
            leaves: BTreeMap::new(),
        }
    }

    pub fn params(&self) -> &Params {
        self.sphincs.params()
    }

    pub fn sphincs(&self) -> &SphincsPlus {
        &self.sphincs
    }

    pub fn public_key(&self) -> &SphincsPlusPublicKey {
        &self.pk
    }

    pub fn wots(&self) -> &WotsPlus {
        &self.wots
    }

    pub fn leaf(&self, leaf: u32) -> Option<&LeafRecovery> {
        self.leaves.get(&leaf)
    }

    pub fn leaves(&self) -> impl Iterator<Item = &LeafRecovery> {
        self.leaves.values()
    }

    pub fn tracked(&self) -> usize {
        self.leaves.len()
    }

    /// Records an honest signature of `message`. Returns the top leaf it
    /// used and whether that leaf was new.
    pub fn record_honest(&mut self, message: &[u8], sig: &SphincsPlusSignature) -> Result<(u32, bool)> {
        let view = self.sphincs.verify_get_msg_sig_tree(message, sig, &self.pk)?;
        if !view.valid {
            return Err(Error::InvariantViolation(
                "honest signature does not verify".to_owned(),
            ));
        }
        let leaf = self.sphincs.top_leaf_index(&sig.r, &self.pk, message);
        if self.leaves.contains_key(&leaf) {
            return Ok((leaf, false));
        }

        let top = self.params().d - 1;
        let state = LeafRecovery::from_honest(
            &self.wots,
            leaf,
            &view.msg,
            &view.wots_sig,
            &sig.sig_ht.layer(top).auth,
        );
        info!("recorded W-OTS+ public key of top leaf {leaf}");
        debug!("{}", DigitRow { known: state.hash_count(), required: None });
        self.leaves.insert(leaf, state);
        Ok((leaf, true))
    }

    /// Feeds a faulty signature of `message` to the leaf it was made with.
    pub fn observe_faulty(&mut self, message: &[u8], sig: &SphincsPlusSignature) -> Result<(u32, Observation)> {
        let leaf = self.sphincs.top_leaf_index(&sig.r, &self.pk, message);
        let Some(state) = self.leaves.get_mut(&leaf) else {
            return Ok((leaf, Observation::Untracked));
        };
        let Some(top) = sig.sig_ht.top() else {
            return Ok((leaf, Observation::Inconclusive));
        };

        let observation = state.observe(&self.wots, &top.wots_sig);
        match observation {
            Observation::Improved(blocks) => {
                if !state.is_consistent(&self.wots) {
                    return Err(Error::InvariantViolation(format!(
                        "recovered chains of leaf {leaf} no longer reach the public key"
                    )));
                }
                debug!("leaf {leaf}: {blocks} shorter chains");
                debug!("{}", DigitRow { known: state.hash_count(), required: None });
            }
            Observation::Inconclusive => warn!("leaf {leaf}: faulty signature matched no chain position"),
            Observation::Unchanged | Observation::Untracked => {}
        }
        Ok((leaf, observation))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attack::forge::Forger;
    use crate::attack::oracle::{LocalOracle, SigningOracle};
    use crate::params::{HashVariant, ParamSet};

    fn setup() -> (LocalOracle, ChainRecovery, Vec<u8>, u32) {
        let params = ParamSet::Test.params(HashVariant::Simple).with_randomize(false);
        let mut oracle = LocalOracle::new(params).unwrap();
        let mut recovery = ChainRecovery::new(params, oracle.public_key().clone());
        let message = b"target message".to_vec();
        let good = oracle.sign(&message).unwrap();
        let (leaf, new) = recovery.record_honest(&message, &good).unwrap();
        assert!(new);
        (oracle, recovery, message, leaf)
    }

    #[test]
    fn test_recovery_monotone_and_consistent() {
        let (mut oracle, mut recovery, message, leaf) = setup();
        let w = recovery.params().w as u32;
        let mut previous = recovery.leaf(leaf).unwrap().hash_count().to_vec();
        assert!(recovery.leaf(leaf).unwrap().is_consistent(recovery.wots()));

        let mut improved = false;
        for _ in 0..40 {
            let bad = oracle.sign_faulty(&message).unwrap();
            let (hit, observation) = recovery.observe_faulty(&message, &bad).unwrap();
            assert_eq!(hit, leaf);
            assert_ne!(observation, Observation::Untracked);
            improved |= matches!(observation, Observation::Improved(_));

            let state = recovery.leaf(leaf).unwrap();
            assert!(state.hash_count().iter().all(|&c| c < w));
            for (now, before) in state.hash_count().iter().zip(&previous) {
                assert!(now <= before);
            }
            assert!(state.is_consistent(recovery.wots()));
            previous = state.hash_count().to_vec();
        }
        assert!(improved);
    }

    #[test]
    fn test_repeated_honest_signature_is_unchanged() {
        let (mut oracle, mut recovery, message, leaf) = setup();
        let good = oracle.sign(&message).unwrap();
        assert_eq!(recovery.record_honest(&message, &good), Ok((leaf, false)));
        assert_eq!(
            recovery.observe_faulty(&message, &good),
            Ok((leaf, Observation::Unchanged))
        );
    }

    #[test]
    fn test_garbage_is_inconclusive() {
        let (mut oracle, mut recovery, message, leaf) = setup();
        let mut bad = oracle.sign_faulty(&message).unwrap();
        let top = recovery.params().d - 1;
        bad.sig_ht.layer_mut(top).wots_sig.iter_mut().for_each(|b| *b = 0xa5);
        assert_eq!(
            recovery.observe_faulty(&message, &bad),
            Ok((leaf, Observation::Inconclusive))
        );
    }

    #[test]
    fn test_invalid_honest_signature_is_fatal() {
        let (mut oracle, mut recovery, message, _) = setup();
        let top = recovery.params().d - 1;
        let mut tampered = oracle.sign(&message).unwrap();
        tampered.sig_ht.layer_mut(top).auth[0] ^= 1;
        assert!(matches!(
            recovery.record_honest(&message, &tampered),
            Err(Error::InvariantViolation(_))
        ));

        let bad = oracle.sign_faulty(&message).unwrap();
        assert!(matches!(
            recovery.record_honest(&message, &bad),
            Err(Error::InvariantViolation(_))
        ));
    }

    #[test]
    fn test_forge_wots_precondition() {
        let (_, recovery, _, leaf) = setup();
        let wots = recovery.wots();
        let params = *recovery.params();
        let state = recovery.leaf(leaf).unwrap().clone();

        // Without any fault the only signable digits are those at or after
        // the honest ones.
        let mut stuck = state.clone();
        stuck.hash_count.iter_mut().for_each(|c| *c = params.w as u32 - 1);
        let below = vec![params.w as u32 - 2; params.len];
        assert!(!stuck.can_sign(&below));
        assert_eq!(stuck.forge_wots(wots, &below), None);

        // Walking every chain to its end yields the public key itself.
        let end = vec![params.w as u32 - 1; params.len];
        assert_eq!(state.forge_wots(wots, &end).as_deref(), Some(state.ots_pk()));
        assert!(!state.can_sign(&end[1..]));
    }

    #[test]
    fn test_forger_rejects_chains_known_only_at_their_end() {
        let (_, mut recovery, _, leaf) = setup();
        let end = recovery.params().w as u32 - 1;
        let state = recovery.leaves.get_mut(&leaf).unwrap();
        state.hash_count.iter_mut().for_each(|c| *c = end);

        // A checksum of all-maximal digits is zero, so no message reaches
        // the end of every chain and each candidate is rejected.
        let forger = Forger::new(&recovery, 25);
        assert_eq!(
            forger.forge(b"anything", Some(leaf)).unwrap_err(),
            Error::ForgeryNotFound(25)
        );
    }

    #[test]
    fn test_digit_row_display() {
        let row = DigitRow {
            known: &[1, 12, 3],
            required: Some(&[2, 11, 3]),
        };
        assert_eq!(row.to_string(), "[01 12 03 ]\n[02 11!03 ]");
    }
}
