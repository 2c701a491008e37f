//! A SPHINCS+ signer with an injected fault.
//!
//! The faulty signer behaves like [`SphincsPlus::sign`] except that one
//! uniformly random bit of the message of hypertree layer `d - 2` is flipped
//! after that layer signed it and before its tree root is recomputed. The
//! layer's own signature stays honest, but the root handed up to layer
//! `d - 1` is effectively random, so the top-layer W-OTS+ key that the signing
//! position selects signs an unpredictable message. Repeating the same
//! message repeats the same key, which turns that one-time key into a
//! many-time one. Faulty signatures do not verify: a verifier recomputes the
//! genuine root from the honest lower layers.
//!
//! When `d == 2` the faulted message is the FORS public key itself. A private
//! copy is flipped; nothing the caller owns is touched.

use crate::error::{Error, Result};
use crate::hypertree::{HtSignature, Hypertree};
use crate::params::Params;
use crate::sphincs_plus::{SphincsPlus, SphincsPlusSecretKey, SphincsPlusSignature};
use log::trace;
use rand::rngs::{OsRng, StdRng};
use rand::{Rng, RngCore, SeedableRng};

/// Flips one uniformly chosen bit of `bits` and returns its index.
pub fn flip_random_bit<R: RngCore>(rng: &mut R, bits: &mut [u8]) -> Option<usize> {
    if bits.is_empty() {
        return None;
    }
    let target = rng.gen_range(0..8 * bits.len());
    bits[target >> 3] ^= 1 << (target % 8);
    Some(target)
}

pub struct FaultInjector<R: RngCore = StdRng> {
    sphincs: SphincsPlus,
    rng: R,
}

impl FaultInjector<StdRng> {
    pub fn new(params: Params) -> Result<Self> {
        Self::with_rng(params, StdRng::from_entropy())
    }
}

impl<R: RngCore> FaultInjector<R> {
    /// Uses `rng` to pick the faulted bit. Fails for hypertrees with fewer
    /// than two layers, which have no layer below the top one.
    pub fn with_rng(params: Params, rng: R) -> Result<Self> {
        if params.d < 2 {
            return Err(Error::InvalidParams(format!(
                "fault injection needs at least 2 hypertree layers, got {}",
                params.d
            )));
        }
        Ok(Self {
            sphincs: SphincsPlus::new(params),
            rng,
        })
    }

    pub fn params(&self) -> &Params {
        self.sphincs.params()
    }

    /// The faulted layer.
    pub fn target_layer(&self) -> usize {
        self.params().d - 2
    }

    /// Hypertree signature with the fault applied to the root layer `d - 2`
    /// hands up.
    pub fn ht_sign_faulty(
        &mut self,
        ht: &Hypertree,
        message: &[u8],
        sk_seed: &[u8],
        idx_tree: u64,
        idx_leaf: u32,
    ) -> HtSignature {
        let target = self.target_layer();
        let rng = &mut self.rng;
        ht.sign_with_hook(message, sk_seed, idx_tree, idx_leaf, |layer, root| {
            if layer == target {
                if let Some(bit) = flip_random_bit(rng, root) {
                    trace!("flipped bit {bit} of the layer {layer} message");
                }
            }
        })
    }

    /// Full SPHINCS+ signature of `message` whose hypertree part is faulted.
    pub fn sign_faulty(&mut self, message: &[u8], sk: &SphincsPlusSecretKey) -> Result<SphincsPlusSignature> {
        let sphincs = self.sphincs.clone();
        sphincs.sign_with_ht(message, sk, &mut OsRng, |ht, pk_fors, sk_seed, idx_tree, idx_leaf| {
            self.ht_sign_faulty(ht, pk_fors, sk_seed, idx_tree, idx_leaf)
        })
    }
}
