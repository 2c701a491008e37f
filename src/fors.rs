//! FORS, the few-time signature that signs the message digest.
//!
//! `k` trees of height `a` share one key pair address. The `a`-bit slices of
//! the digest select one leaf per tree; the signature reveals that leaf's
//! secret and its authentication path. The FORS public key is `T_k` over the
//! `k` roots.

use crate::error::{Error, Result};
use crate::hash::TweakableHash;
use crate::params::Params;
use crate::wots_plus::adrs::{Adrs, AdrsType};
use zeroize::Zeroize;

#[cfg(feature = "serialization")]
use serde::{Deserialize, Serialize};

/// `k` blocks of `(secret, auth path)`, each `(a + 1) * n` bytes.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub struct ForsSignature(Vec<u8>);

impl AsRef<[u8]> for ForsSignature {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl ForsSignature {
    pub fn from_bytes(params: &Params, bytes: &[u8]) -> Result<Self> {
        if bytes.len() != params.fors_sig_bytes() {
            return Err(Error::BadLength(params.fors_sig_bytes(), bytes.len()));
        }
        Ok(Self(bytes.to_vec()))
    }
}

#[derive(Clone, Debug)]
pub struct Fors {
    params: Params,
    hasher: TweakableHash,
}

impl Fors {
    pub fn new(params: &Params, pub_seed: &[u8]) -> Self {
        Self::with_hasher(params, TweakableHash::new(params, pub_seed))
    }

    pub(crate) fn with_hasher(params: &Params, hasher: TweakableHash) -> Self {
        Self {
            params: *params,
            hasher,
        }
    }

    /// Splits the first `k * a` bits of `md` into `k` leaf indices. Bits are
    /// consumed least significant first within each byte.
    pub fn message_to_indices(&self, md: &[u8]) -> Vec<u32> {
        let (k, a) = (self.params.k, self.params.a);
        let mut offset = 0;
        (0..k)
            .map(|_| {
                let mut index = 0_u32;
                for j in 0..a {
                    let bit = (md[offset >> 3] >> (offset & 7)) & 1;
                    index ^= (bit as u32) << j;
                    offset += 1;
                }
                index
            })
            .collect()
    }

    /// FORS tree address for node `index` at `height`, keeping the key pair of `adrs`.
    fn tree_adrs(adrs: &Adrs, height: u32, index: u32) -> Adrs {
        let mut tree_adrs = *adrs;
        tree_adrs.set_type(AdrsType::ForsTree);
        tree_adrs.set_keypair_addr(adrs.get_keypair_addr());
        tree_adrs.set_tree_height(height);
        tree_adrs.set_tree_index(index);
        tree_adrs
    }

    /// Secret value of the leaf with global index `idx`.
    fn sk_gen(&self, sk_seed: &[u8], adrs: &Adrs, idx: u32) -> Vec<u8> {
        let mut sk = vec![0u8; self.params.n];
        self.hasher.prf(&mut sk, sk_seed, &Self::tree_adrs(adrs, 0, idx));
        sk
    }

    fn leaf_from_sk(&self, sk: &[u8], adrs: &Adrs, idx: u32) -> Vec<u8> {
        let mut leaf = vec![0u8; self.params.n];
        self.hasher.f(&mut leaf, sk, 1, &Self::tree_adrs(adrs, 0, idx));
        leaf
    }

    /// Node of height `height` covering the leaves starting at global index `start`.
    fn treehash(&self, sk_seed: &[u8], start: u32, height: u32, adrs: &Adrs) -> Vec<u8> {
        if height == 0 {
            let mut sk = self.sk_gen(sk_seed, adrs, start);
            let leaf = self.leaf_from_sk(&sk, adrs, start);
            sk.zeroize();
            return leaf;
        }
        let left = self.treehash(sk_seed, start, height - 1, adrs);
        let right = self.treehash(sk_seed, start + (1 << (height - 1)), height - 1, adrs);

        let mut node = vec![0u8; self.params.n];
        let node_adrs = Self::tree_adrs(adrs, height, start >> height);
        self.hasher.h(&mut node, &left, &right, &node_adrs);
        node
    }

    /// Signs the FORS part `md` of a message digest.
    pub fn sign(&self, md: &[u8], sk_seed: &[u8], adrs: &Adrs) -> ForsSignature {
        let a = self.params.a as u32;
        let mut sig = Vec::with_capacity(self.params.fors_sig_bytes());

        for (i, idx) in self.message_to_indices(md).into_iter().enumerate() {
            let offset = (i as u32) << a;
            let mut sk = self.sk_gen(sk_seed, adrs, offset + idx);
            sig.extend_from_slice(&sk);
            sk.zeroize();

            for j in 0..a {
                let sibling = (idx >> j) ^ 1;
                sig.extend(self.treehash(sk_seed, offset + (sibling << j), j, adrs));
            }
        }
        ForsSignature(sig)
    }

    /// Recomputes the FORS public key from a signature of `md`.
    pub fn pk_from_sig(&self, sig: &ForsSignature, md: &[u8], adrs: &Adrs) -> Vec<u8> {
        let n = self.params.n;
        let a = self.params.a;
        let mut roots = Vec::with_capacity(self.params.k * n);
        let mut parent = vec![0u8; n];

        for (i, (idx, block)) in self
            .message_to_indices(md)
            .into_iter()
            .zip(sig.0.chunks_exact((a + 1) * n))
            .enumerate()
        {
            let offset = (i as u32) << a;
            let (sk, auth) = block.split_at(n);
            let mut node = self.leaf_from_sk(sk, adrs, offset + idx);

            for (j, auth_node) in auth.chunks_exact(n).enumerate() {
                let height = j as u32 + 1;
                let node_adrs = Self::tree_adrs(adrs, height, (offset + idx) >> height);
                if (idx >> j) & 1 == 0 {
                    self.hasher.h(&mut parent, &node, auth_node, &node_adrs);
                } else {
                    self.hasher.h(&mut parent, auth_node, &node, &node_adrs);
                }
                node.copy_from_slice(&parent);
            }
            roots.extend_from_slice(&node);
        }

        let mut roots_adrs = *adrs;
        roots_adrs.set_type(AdrsType::ForsRoots);
        roots_adrs.set_keypair_addr(adrs.get_keypair_addr());

        let mut pk = vec![0u8; n];
        self.hasher.t_l(&mut pk, &roots, self.params.k, &roots_adrs);
        pk
    }

    /// FORS public key computed from the secret seed alone.
    pub fn pk_gen(&self, sk_seed: &[u8], adrs: &Adrs) -> Vec<u8> {
        let n = self.params.n;
        let a = self.params.a as u32;
        let mut roots = Vec::with_capacity(self.params.k * n);
        for i in 0..self.params.k as u32 {
            roots.extend(self.treehash(sk_seed, i << a, a, adrs));
        }

        let mut roots_adrs = *adrs;
        roots_adrs.set_type(AdrsType::ForsRoots);
        roots_adrs.set_keypair_addr(adrs.get_keypair_addr());

        let mut pk = vec![0u8; n];
        self.hasher.t_l(&mut pk, &roots, self.params.k, &roots_adrs);
        pk
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{HashVariant, ParamSet};
    use rand::prelude::*;
    use rand::rngs::OsRng;

    fn setup(set: ParamSet) -> (Fors, Vec<u8>, Adrs) {
        let params = set.params(HashVariant::Simple);
        let mut pub_seed = vec![0; params.n];
        let mut sk_seed = vec![0; params.n];
        OsRng.fill_bytes(&mut pub_seed);
        OsRng.fill_bytes(&mut sk_seed);

        let mut adrs = Adrs::default();
        adrs.set_tree_addr(12);
        adrs.set_type(AdrsType::ForsTree);
        adrs.set_keypair_addr(1);
        (Fors::new(&params, &pub_seed), sk_seed, adrs)
    }

    #[test]
    fn test_message_to_indices() {
        let (fors, _, _) = setup(ParamSet::Test);
        // k = 4, a = 3, bits read LSB first: 0b1010_1100, 0b0000_0001
        let indices = fors.message_to_indices(&[0xac, 0x01]);
        assert_eq!(indices, vec![0b100, 0b101, 0b110, 0b000]);
    }

    #[test]
    fn test_fors_round_trip() {
        let (fors, sk_seed, adrs) = setup(ParamSet::Sha256_128f);
        let params = fors.params;
        let mut md = vec![0u8; params.fors_msg_bytes()];
        OsRng.fill_bytes(&mut md);

        let pk = fors.pk_gen(&sk_seed, &adrs);
        let sig = fors.sign(&md, &sk_seed, &adrs);
        assert_eq!(sig.as_ref().len(), params.fors_sig_bytes());
        assert_eq!(fors.pk_from_sig(&sig, &md, &adrs), pk);

        let mut other_md = md.clone();
        other_md[0] ^= 1;
        assert_ne!(fors.pk_from_sig(&sig, &other_md, &adrs), pk);

        let mut other_adrs = adrs;
        other_adrs.set_keypair_addr(2);
        assert_ne!(fors.pk_gen(&sk_seed, &other_adrs), pk);

        assert_eq!(ForsSignature::from_bytes(&params, sig.as_ref()), Ok(sig.clone()));
        assert!(ForsSignature::from_bytes(&params, &sig.as_ref()[1..]).is_err());
    }
}
