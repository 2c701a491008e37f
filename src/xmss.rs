//! XMSS trees of height `h'` whose leaves are compressed W-OTS+ public keys.
//!
//! The caller hands in an [`Adrs`] with layer and tree address set; the type
//! and type-dependent words are managed here on local copies.

use crate::error::{Error, Result};
use crate::hash::TweakableHash;
use crate::params::Params;
use crate::wots_plus::adrs::{Adrs, AdrsType};
use crate::wots_plus::WotsPlus;

#[cfg(feature = "serialization")]
use serde::{Deserialize, Serialize};

/// A W-OTS+ signature (`len * n` bytes) followed by the authentication path
/// (`h' * n` bytes, leaf level first).
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub struct XmssSignature {
    pub wots_sig: Vec<u8>,
    pub auth: Vec<u8>,
}

impl XmssSignature {
    /// Whether both parts have the lengths `params` prescribes.
    pub fn has_shape(&self, params: &Params) -> bool {
        self.wots_sig.len() == params.wots_bytes() && self.auth.len() == params.h_prime * params.n
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.wots_sig.len() + self.auth.len());
        bytes.extend_from_slice(&self.wots_sig);
        bytes.extend_from_slice(&self.auth);
        bytes
    }

    pub fn from_bytes(params: &Params, bytes: &[u8]) -> Result<Self> {
        if bytes.len() != params.xmss_sig_bytes() {
            return Err(Error::BadLength(params.xmss_sig_bytes(), bytes.len()));
        }
        let (wots_sig, auth) = bytes.split_at(params.wots_bytes());
        Ok(Self {
            wots_sig: wots_sig.to_vec(),
            auth: auth.to_vec(),
        })
    }
}

#[derive(Clone, Debug)]
pub struct Xmss {
    params: Params,
    wots: WotsPlus,
}

impl Xmss {
    pub fn new(params: &Params, pub_seed: &[u8]) -> Self {
        Self::with_hasher(params, TweakableHash::new(params, pub_seed))
    }

    pub(crate) fn with_hasher(params: &Params, hasher: TweakableHash) -> Self {
        Self {
            params: *params,
            wots: WotsPlus::with_hasher(params, hasher),
        }
    }

    pub fn wots(&self) -> &WotsPlus {
        &self.wots
    }

    /// Address of the W-OTS+ key behind leaf `idx` of the tree `adrs` points to.
    pub fn wots_adrs(adrs: &Adrs, idx: u32) -> Adrs {
        let mut wots_adrs = *adrs;
        wots_adrs.set_type(AdrsType::WotsHash);
        wots_adrs.set_keypair_addr(idx);
        wots_adrs
    }

    /// Leaf `idx`: the compressed W-OTS+ public key of key pair `idx`.
    fn leaf(&self, sk_seed: &[u8], idx: u32, adrs: &Adrs) -> Vec<u8> {
        let wots_adrs = Self::wots_adrs(adrs, idx);
        let pk = self.wots.pk_gen(sk_seed, wots_adrs);
        self.wots.compress_pk(&pk, &wots_adrs)
    }

    /// Computes the node of height `height` covering the `2^height` leaves
    /// starting at `start`. `start` must be a multiple of `2^height`.
    pub fn treehash(&self, sk_seed: &[u8], start: u32, height: u32, adrs: &Adrs) -> Vec<u8> {
        debug_assert_eq!(start % (1 << height), 0);
        if height == 0 {
            return self.leaf(sk_seed, start, adrs);
        }

        let left = self.treehash(sk_seed, start, height - 1, adrs);
        let right = self.treehash(sk_seed, start + (1 << (height - 1)), height - 1, adrs);

        let mut node_adrs = *adrs;
        node_adrs.set_type(AdrsType::Tree);
        node_adrs.set_tree_height(height);
        node_adrs.set_tree_index(start >> height);

        let mut node = vec![0u8; self.params.n];
        self.wots.hasher().h(&mut node, &left, &right, &node_adrs);
        node
    }

    /// Root of the tree `adrs` points to.
    pub fn pk_gen(&self, sk_seed: &[u8], adrs: &Adrs) -> Vec<u8> {
        self.treehash(sk_seed, 0, self.params.h_prime as u32, adrs)
    }

    /// Signs an `n`-byte message with leaf `idx`.
    pub fn sign(&self, message: &[u8], sk_seed: &[u8], idx: u32, adrs: &Adrs) -> XmssSignature {
        let n = self.params.n;
        let mut auth = Vec::with_capacity(self.params.h_prime * n);
        for i in 0..self.params.h_prime as u32 {
            let sibling = (idx >> i) ^ 1;
            auth.extend(self.treehash(sk_seed, sibling << i, i, adrs));
        }

        let wots_sig = self.wots.sign(message, sk_seed, Self::wots_adrs(adrs, idx));
        XmssSignature { wots_sig, auth }
    }

    /// Recomputes the root from a signature of `message` by leaf `idx`.
    pub fn pk_from_sig(&self, idx: u32, sig: &XmssSignature, message: &[u8], adrs: &Adrs) -> Vec<u8> {
        let n = self.params.n;
        let wots_adrs = Self::wots_adrs(adrs, idx);
        let pk = self.wots.pk_from_sig(&sig.wots_sig, message, wots_adrs);
        let mut node = self.wots.compress_pk(&pk, &wots_adrs);

        let mut node_adrs = *adrs;
        node_adrs.set_type(AdrsType::Tree);

        let mut parent = vec![0u8; n];
        for (k, auth_node) in sig.auth.chunks_exact(n).take(self.params.h_prime).enumerate() {
            let height = k as u32 + 1;
            node_adrs.set_tree_height(height);
            node_adrs.set_tree_index(idx >> height);
            if (idx >> k) & 1 == 0 {
                self.wots.hasher().h(&mut parent, &node, auth_node, &node_adrs);
            } else {
                self.wots.hasher().h(&mut parent, auth_node, &node, &node_adrs);
            }
            node.copy_from_slice(&parent);
        }
        node
    }
}
