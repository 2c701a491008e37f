//! The hypertree: `d` layers of XMSS trees.
//!
//! Layer 0 signs the caller's message, and every layer above signs the root
//! of the tree below it. The single tree of layer `d - 1` has the public root
//! `PK.root`.
//!
//! A signing position is given as `(idx_tree, idx_leaf)` for layer 0. The
//! position in every following layer is derived by
//! `idx_leaf = idx_tree mod 2^h'` and `idx_tree >>= h'`, see
//! [`Hypertree::layer_indices`].

use crate::error::{Error, Result, VerificationError};
use crate::hash::TweakableHash;
use crate::params::Params;
use crate::utils::mask_u64;
use crate::wots_plus::adrs::Adrs;
use crate::xmss::{Xmss, XmssSignature};

#[cfg(feature = "serialization")]
use serde::{Deserialize, Serialize};

/// One [`XmssSignature`] per layer, layer 0 first.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub struct HtSignature {
    pub xmss_sigs: Vec<XmssSignature>,
}

impl HtSignature {
    pub fn layer(&self, layer: usize) -> &XmssSignature {
        &self.xmss_sigs[layer]
    }

    pub fn layer_mut(&mut self, layer: usize) -> &mut XmssSignature {
        &mut self.xmss_sigs[layer]
    }

    /// The signature of the top layer.
    pub fn top(&self) -> Option<&XmssSignature> {
        self.xmss_sigs.last()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.xmss_sigs.iter().flat_map(XmssSignature::to_bytes).collect()
    }

    pub fn from_bytes(params: &Params, bytes: &[u8]) -> Result<Self> {
        if bytes.len() != params.ht_sig_bytes() {
            return Err(Error::BadLength(params.ht_sig_bytes(), bytes.len()));
        }
        let xmss_sigs = bytes
            .chunks_exact(params.xmss_sig_bytes())
            .map(|chunk| XmssSignature::from_bytes(params, chunk))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { xmss_sigs })
    }
}

#[derive(Clone, Debug)]
pub struct Hypertree {
    params: Params,
    xmss: Xmss,
}

impl Hypertree {
    pub fn new(params: &Params, pub_seed: &[u8]) -> Self {
        Self::with_hasher(params, TweakableHash::new(params, pub_seed))
    }

    pub(crate) fn with_hasher(params: &Params, hasher: TweakableHash) -> Self {
        Self {
            params: *params,
            xmss: Xmss::with_hasher(params, hasher),
        }
    }

    pub fn xmss(&self) -> &Xmss {
        &self.xmss
    }

    /// Address of tree `tree` in layer `layer`.
    pub fn layer_adrs(layer: usize, tree: u64) -> Adrs {
        let mut adrs = Adrs::default();
        adrs.set_layer_addr(layer as u32);
        adrs.set_tree_addr(tree);
        adrs
    }

    /// The `(idx_tree, idx_leaf)` pair of every layer, layer 0 first.
    pub fn layer_indices(&self, idx_tree: u64, idx_leaf: u32) -> Vec<(u64, u32)> {
        let h_prime = self.params.h_prime;
        let mut indices = Vec::with_capacity(self.params.d);
        let mut tree = idx_tree;
        indices.push((tree, idx_leaf));
        for _ in 1..self.params.d {
            let leaf = mask_u64(tree, h_prime) as u32;
            tree = tree.checked_shr(h_prime as u32).unwrap_or(0);
            indices.push((tree, leaf));
        }
        indices
    }

    /// Computes `PK.root`, the root of the single tree in layer `d - 1`.
    pub fn pk_gen(&self, sk_seed: &[u8]) -> Vec<u8> {
        let adrs = Self::layer_adrs(self.params.d - 1, 0);
        self.xmss.pk_gen(sk_seed, &adrs)
    }

    pub fn sign(&self, message: &[u8], sk_seed: &[u8], idx_tree: u64, idx_leaf: u32) -> HtSignature {
        self.sign_with_hook(message, sk_seed, idx_tree, idx_leaf, |_, _| {})
    }

    /// Signs like [`Hypertree::sign`], but hands every layer's message to
    /// `after_layer` right after that layer signed it. The root handed up to
    /// the next layer is computed from the signature and the buffer as the
    /// hook left it, so a hook that corrupts the buffer makes the next layer
    /// sign a root that no verifier recomputes. The buffer is a private copy;
    /// the caller's message is never touched.
    pub(crate) fn sign_with_hook<F>(
        &self,
        message: &[u8],
        sk_seed: &[u8],
        idx_tree: u64,
        idx_leaf: u32,
        mut after_layer: F,
    ) -> HtSignature
    where
        F: FnMut(usize, &mut Vec<u8>),
    {
        let indices = self.layer_indices(idx_tree, idx_leaf);
        let mut xmss_sigs = Vec::with_capacity(self.params.d);
        let mut root = message[..self.params.n].to_vec();

        for (layer, &(tree, leaf)) in indices.iter().enumerate() {
            let adrs = Self::layer_adrs(layer, tree);
            let sig = self.xmss.sign(&root, sk_seed, leaf, &adrs);
            after_layer(layer, &mut root);
            if layer + 1 < self.params.d {
                root = self.xmss.pk_from_sig(leaf, &sig, &root, &adrs);
            }
            xmss_sigs.push(sig);
        }
        HtSignature { xmss_sigs }
    }

    /// Walks the layers bottom up, returning the computed top root together
    /// with the message and W-OTS+ signature consumed at `layer`.
    fn walk(
        &self,
        message: &[u8],
        sig: &HtSignature,
        idx_tree: u64,
        idx_leaf: u32,
        layer: usize,
    ) -> (Vec<u8>, Vec<u8>, Vec<u8>) {
        let mut node = message[..self.params.n].to_vec();
        let mut layer_msg = Vec::new();
        let mut layer_sig = Vec::new();

        for (j, &(tree, leaf)) in self.layer_indices(idx_tree, idx_leaf).iter().enumerate() {
            let xmss_sig = sig.layer(j);
            if j == layer {
                layer_msg = node.clone();
                layer_sig = xmss_sig.wots_sig.clone();
            }
            let adrs = Self::layer_adrs(j, tree);
            node = self.xmss.pk_from_sig(leaf, xmss_sig, &node, &adrs);
        }
        (node, layer_msg, layer_sig)
    }

    /// Checks the layer count and the length of every layer's parts.
    fn check_shape(&self, sig: &HtSignature) -> Result<()> {
        if sig.xmss_sigs.len() != self.params.d {
            return Err(Error::BadLength(self.params.d, sig.xmss_sigs.len()));
        }
        match sig.xmss_sigs.iter().position(|s| !s.has_shape(&self.params)) {
            Some(layer) => Err(VerificationError::MalformedLayer { layer }.into()),
            None => Ok(()),
        }
    }

    pub fn verify(
        &self,
        message: &[u8],
        sig: &HtSignature,
        idx_tree: u64,
        idx_leaf: u32,
        pk_root: &[u8],
    ) -> bool {
        self.verify_strict(message, sig, idx_tree, idx_leaf, pk_root).is_ok()
    }

    pub fn verify_strict(
        &self,
        message: &[u8],
        sig: &HtSignature,
        idx_tree: u64,
        idx_leaf: u32,
        pk_root: &[u8],
    ) -> Result<()> {
        self.check_shape(sig)?;
        let (root, _, _) = self.walk(message, sig, idx_tree, idx_leaf, self.params.d);
        if root.as_slice() == &pk_root[..self.params.n] {
            Ok(())
        } else {
            Err(VerificationError::RootMismatch {
                layer: self.params.d - 1,
            }
            .into())
        }
    }

    /// Verifies and additionally returns the message and the W-OTS+
    /// signature that `layer` consumed during verification.
    pub fn verify_get_msg_sig(
        &self,
        message: &[u8],
        sig: &HtSignature,
        idx_tree: u64,
        idx_leaf: u32,
        pk_root: &[u8],
        layer: usize,
    ) -> (bool, Vec<u8>, Vec<u8>) {
        if layer >= self.params.d || self.check_shape(sig).is_err() {
            return (false, Vec::new(), Vec::new());
        }
        let (root, msg, wots_sig) = self.walk(message, sig, idx_tree, idx_leaf, layer);
        (root.as_slice() == &pk_root[..self.params.n], msg, wots_sig)
    }
}
