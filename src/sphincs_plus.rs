//! # SPHINCS+ (SHA-256)
//!
//! Stateless hash-based signatures built from the pieces of this crate: a
//! message is hashed together with a randomizer `R` into a digest, which
//! selects a FORS key pair in the bottom layer of the hypertree and is signed
//! by it. The FORS public key is then signed by the hypertree, whose top root
//! is the public key.
//!
//! `SphincsPlus` is a plain value holding the [`Params`]; keys and signatures
//! are owned byte buffers. Signing and verification only read the key
//! buffers, so a key is never changed by using it.
//!
//! ## Usage Example
//!
//! ```rust
//! use sphincs_fault::params::{HashVariant, ParamSet};
//! use sphincs_fault::sphincs_plus::SphincsPlus;
//!
//! let sp = SphincsPlus::new(ParamSet::Sha256_128f.params(HashVariant::Simple));
//! let (pk, sk) = sp.keygen().expect("Key generation failed");
//!
//! let message = b"SPHINCS+ fault attack message";
//! let signature = sp.sign(message, &sk).expect("Signing failed");
//! assert!(sp.verify(&signature, message, &pk));
//! ```
//!
//! ## Secret Key Handling
//!
//! `SphincsPlusSecretKey` is wiped from memory when dropped. Key generation
//! draws its seeds from `OsRng`. Fixed seeds are only accepted through the
//! explicit [`SphincsPlus::keygen_from_seeds`].

use crate::error::{Error, Result, VerificationError};
use crate::fors::{Fors, ForsSignature};
use crate::hash::TweakableHash;
use crate::hypertree::{HtSignature, Hypertree};
use crate::params::Params;
use crate::utils::{bytes_to_u64, mask_u64};
use crate::wots_plus::adrs::{Adrs, AdrsType};
use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

#[cfg(feature = "serialization")]
use serde::{Deserialize, Serialize};

/// `PK = (PK.seed, PK.root)`.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub struct SphincsPlusPublicKey {
    pk_seed: Vec<u8>,
    pk_root: Vec<u8>,
}

impl SphincsPlusPublicKey {
    pub fn pk_seed(&self) -> &[u8] {
        &self.pk_seed
    }

    pub fn pk_root(&self) -> &[u8] {
        &self.pk_root
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        [self.pk_seed.as_slice(), self.pk_root.as_slice()].concat()
    }

    pub fn from_bytes(params: &Params, bytes: &[u8]) -> Result<Self> {
        if bytes.len() != params.pk_bytes() {
            return Err(Error::BadLength(params.pk_bytes(), bytes.len()));
        }
        let (pk_seed, pk_root) = bytes.split_at(params.n);
        Ok(Self {
            pk_seed: pk_seed.to_vec(),
            pk_root: pk_root.to_vec(),
        })
    }
}

/// `SK = (SK.seed, SK.prf, PK.seed, PK.root)`, zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub struct SphincsPlusSecretKey {
    sk_seed: Vec<u8>,
    sk_prf: Vec<u8>,
    pk_seed: Vec<u8>,
    pk_root: Vec<u8>,
}

impl fmt::Debug for SphincsPlusSecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SphincsPlusSecretKey")
            .field("pk_seed", &self.pk_seed)
            .field("pk_root", &self.pk_root)
            .finish_non_exhaustive()
    }
}

impl SphincsPlusSecretKey {
    pub fn sk_seed(&self) -> &[u8] {
        &self.sk_seed
    }

    pub fn sk_prf(&self) -> &[u8] {
        &self.sk_prf
    }

    pub fn pk_seed(&self) -> &[u8] {
        &self.pk_seed
    }

    pub fn pk_root(&self) -> &[u8] {
        &self.pk_root
    }

    pub fn public_key(&self) -> SphincsPlusPublicKey {
        SphincsPlusPublicKey {
            pk_seed: self.pk_seed.clone(),
            pk_root: self.pk_root.clone(),
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        [
            self.sk_seed.as_slice(),
            self.sk_prf.as_slice(),
            self.pk_seed.as_slice(),
            self.pk_root.as_slice(),
        ]
        .concat()
    }

    pub fn from_bytes(params: &Params, bytes: &[u8]) -> Result<Self> {
        if bytes.len() != params.sk_bytes() {
            return Err(Error::BadLength(params.sk_bytes(), bytes.len()));
        }
        let mut parts = bytes.chunks_exact(params.n).map(<[u8]>::to_vec);
        let mut next = || parts.next().unwrap_or_default();
        Ok(Self {
            sk_seed: next(),
            sk_prf: next(),
            pk_seed: next(),
            pk_root: next(),
        })
    }
}

/// `SIG = (R, SIG_FORS, SIG_HT)`.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub struct SphincsPlusSignature {
    pub r: Vec<u8>,
    pub sig_fors: ForsSignature,
    pub sig_ht: HtSignature,
}

impl SphincsPlusSignature {
    /// `R || SIG_FORS || SIG_HT`.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = self.r.clone();
        bytes.extend_from_slice(self.sig_fors.as_ref());
        bytes.extend(self.sig_ht.to_bytes());
        bytes
    }

    pub fn from_bytes(params: &Params, bytes: &[u8]) -> Result<Self> {
        if bytes.len() != params.sig_bytes() {
            return Err(Error::BadLength(params.sig_bytes(), bytes.len()));
        }
        let (r, rest) = bytes.split_at(params.n);
        let (sig_fors, sig_ht) = rest.split_at(params.fors_sig_bytes());
        Ok(Self {
            r: r.to_vec(),
            sig_fors: ForsSignature::from_bytes(params, sig_fors)?,
            sig_ht: HtSignature::from_bytes(params, sig_ht)?,
        })
    }
}

/// `H_msg` output split into the FORS digest and the signing position.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageDigest {
    pub md: Vec<u8>,
    pub idx_tree: u64,
    pub idx_leaf: u32,
}

/// Result of [`SphincsPlus::verify_get_msg_sig_tree`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TopLayerView {
    /// Whether the whole signature verified.
    pub valid: bool,
    /// Message signed by the top-layer W-OTS+ key.
    pub msg: Vec<u8>,
    /// The top-layer W-OTS+ signature.
    pub wots_sig: Vec<u8>,
    /// Layer-0 tree index of the signature.
    pub idx_tree: u64,
}

#[derive(Clone, Debug, Default)]
pub struct SphincsPlus {
    params: Params,
}

impl SphincsPlus {
    pub fn new(params: Params) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    fn check_len(&self, found: usize) -> Result<()> {
        if found != self.params.n {
            return Err(Error::BadLength(self.params.n, found));
        }
        Ok(())
    }

    /// Generate (pk, sk) keypair of SPHINCS+ with seeds drawn from `OsRng`.
    pub fn keygen(&self) -> Result<(SphincsPlusPublicKey, SphincsPlusSecretKey)> {
        self.keygen_with_rng(&mut OsRng)
    }

    pub fn keygen_with_rng<R: RngCore + CryptoRng>(
        &self,
        rng: &mut R,
    ) -> Result<(SphincsPlusPublicKey, SphincsPlusSecretKey)> {
        let n = self.params.n;
        let mut seeds = vec![0u8; 3 * n];
        rng.fill_bytes(&mut seeds);
        let keys = self.keygen_from_seeds(&seeds[..n], &seeds[n..2 * n], &seeds[2 * n..]);
        seeds.zeroize();
        keys
    }

    /// Deterministic key generation from explicit seeds.
    pub fn keygen_from_seeds(
        &self,
        sk_seed: &[u8],
        sk_prf: &[u8],
        pk_seed: &[u8],
    ) -> Result<(SphincsPlusPublicKey, SphincsPlusSecretKey)> {
        self.check_len(sk_seed.len())?;
        self.check_len(sk_prf.len())?;
        self.check_len(pk_seed.len())?;

        let pk_root = Hypertree::new(&self.params, pk_seed).pk_gen(sk_seed);
        let sk = SphincsPlusSecretKey {
            sk_seed: sk_seed.to_vec(),
            sk_prf: sk_prf.to_vec(),
            pk_seed: pk_seed.to_vec(),
            pk_root,
        };
        Ok((sk.public_key(), sk))
    }

    /// Computes `H_msg(R, PK.seed, PK.root, M)` and splits it into
    /// `(md, idx_tree, idx_leaf)`.
    pub fn message_digest(&self, r: &[u8], pk_seed: &[u8], pk_root: &[u8], message: &[u8]) -> MessageDigest {
        let p = &self.params;
        let digest = TweakableHash::h_msg(p, r, pk_seed, pk_root, message);
        let (md, rest) = digest.split_at(p.fors_msg_bytes());
        let (tree, rest) = rest.split_at(p.tree_bytes());
        let leaf = &rest[..p.leaf_bytes()];

        MessageDigest {
            md: md.to_vec(),
            idx_tree: mask_u64(bytes_to_u64(tree), p.tree_bits()),
            idx_leaf: mask_u64(bytes_to_u64(leaf), p.leaf_bits()) as u32,
        }
    }

    /// Layer-0 tree index a signature with randomizer `r` uses under `pk`.
    pub fn tree_index(&self, r: &[u8], pk: &SphincsPlusPublicKey, message: &[u8]) -> u64 {
        self.message_digest(r, pk.pk_seed(), pk.pk_root(), message).idx_tree
    }

    /// Leaf of the single top-layer tree that signs on behalf of `digest`.
    pub fn top_leaf(&self, digest: &MessageDigest) -> u32 {
        let p = &self.params;
        if p.d < 2 {
            return digest.idx_leaf;
        }
        mask_u64(digest.idx_tree >> (p.h_prime * (p.d - 2)), p.h_prime) as u32
    }

    /// Top-layer leaf a signature with randomizer `r` uses under `pk`.
    pub fn top_leaf_index(&self, r: &[u8], pk: &SphincsPlusPublicKey, message: &[u8]) -> u32 {
        self.top_leaf(&self.message_digest(r, pk.pk_seed(), pk.pk_root(), message))
    }

    fn fors_adrs(idx_tree: u64, idx_leaf: u32) -> Adrs {
        let mut adrs = Adrs::default();
        adrs.set_layer_addr(0);
        adrs.set_tree_addr(idx_tree);
        adrs.set_type(AdrsType::ForsTree);
        adrs.set_keypair_addr(idx_leaf);
        adrs
    }

    /// Calculate the SPHINCS+ signature of `message`; `opt_rand` comes from `OsRng`.
    pub fn sign(&self, message: &[u8], sk: &SphincsPlusSecretKey) -> Result<SphincsPlusSignature> {
        self.sign_with_rng(message, sk, &mut OsRng)
    }

    pub fn sign_with_rng<R: RngCore + CryptoRng>(
        &self,
        message: &[u8],
        sk: &SphincsPlusSecretKey,
        rng: &mut R,
    ) -> Result<SphincsPlusSignature> {
        self.sign_with_ht(message, sk, rng, |ht, pk_fors, sk_seed, idx_tree, idx_leaf| {
            ht.sign(pk_fors, sk_seed, idx_tree, idx_leaf)
        })
    }

    /// Signs with a caller-supplied hypertree signing step, which receives
    /// the hypertree, `PK_FORS`, `SK.seed` and the signing position.
    pub(crate) fn sign_with_ht<R, F>(
        &self,
        message: &[u8],
        sk: &SphincsPlusSecretKey,
        rng: &mut R,
        ht_sign: F,
    ) -> Result<SphincsPlusSignature>
    where
        R: RngCore + CryptoRng,
        F: FnOnce(&Hypertree, &[u8], &[u8], u64, u32) -> HtSignature,
    {
        let p = &self.params;
        for part in [sk.sk_seed(), sk.sk_prf(), sk.pk_seed(), sk.pk_root()] {
            self.check_len(part.len())?;
        }

        let mut opt_rand = vec![0u8; p.n];
        if p.randomize {
            rng.fill_bytes(&mut opt_rand);
        }
        let mut r = vec![0u8; p.n];
        TweakableHash::prf_msg(p, &mut r, sk.sk_prf(), &opt_rand, message);

        let digest = self.message_digest(&r, sk.pk_seed(), sk.pk_root(), message);
        let hasher = TweakableHash::new(p, sk.pk_seed());
        let adrs = Self::fors_adrs(digest.idx_tree, digest.idx_leaf);

        let fors = Fors::with_hasher(p, hasher.clone());
        let sig_fors = fors.sign(&digest.md, sk.sk_seed(), &adrs);
        let pk_fors = fors.pk_from_sig(&sig_fors, &digest.md, &adrs);

        let ht = Hypertree::with_hasher(p, hasher);
        let sig_ht = ht_sign(&ht, &pk_fors, sk.sk_seed(), digest.idx_tree, digest.idx_leaf);

        Ok(SphincsPlusSignature { r, sig_fors, sig_ht })
    }

    /// Recomputes the digest and `PK_FORS` of a signature under `pk`.
    fn recompute(
        &self,
        signature: &SphincsPlusSignature,
        message: &[u8],
        pk: &SphincsPlusPublicKey,
    ) -> Result<(MessageDigest, Hypertree, Vec<u8>)> {
        let p = &self.params;
        if pk.pk_seed().len() != p.n || pk.pk_root().len() != p.n {
            return Err(Error::BadLength(p.pk_bytes(), pk.pk_seed().len() + pk.pk_root().len()));
        }
        if signature.r.len() != p.n
            || signature.sig_fors.as_ref().len() != p.fors_sig_bytes()
            || signature.sig_ht.xmss_sigs.len() != p.d
            || signature.sig_ht.xmss_sigs.iter().any(|layer| !layer.has_shape(p))
        {
            return Err(VerificationError::SphincsPlusVerificationFailed(
                "malformed signature".to_owned(),
            )
            .into());
        }

        let digest = self.message_digest(&signature.r, pk.pk_seed(), pk.pk_root(), message);
        let hasher = TweakableHash::new(p, pk.pk_seed());
        let adrs = Self::fors_adrs(digest.idx_tree, digest.idx_leaf);
        let pk_fors = Fors::with_hasher(p, hasher.clone()).pk_from_sig(&signature.sig_fors, &digest.md, &adrs);
        Ok((digest, Hypertree::with_hasher(p, hasher), pk_fors))
    }

    /// Verify the SPHINCS+ signature of `message` under `pk`.
    pub fn verify(&self, signature: &SphincsPlusSignature, message: &[u8], pk: &SphincsPlusPublicKey) -> bool {
        self.verify_strict(signature, message, pk).is_ok()
    }

    /// Like [`SphincsPlus::verify`], but reports why verification failed.
    pub fn verify_strict(
        &self,
        signature: &SphincsPlusSignature,
        message: &[u8],
        pk: &SphincsPlusPublicKey,
    ) -> Result<()> {
        let (digest, ht, pk_fors) = self.recompute(signature, message, pk)?;
        ht.verify_strict(&pk_fors, &signature.sig_ht, digest.idx_tree, digest.idx_leaf, pk.pk_root())
    }

    /// Verifies and exposes what the top-layer W-OTS+ key signed.
    pub fn verify_get_msg_sig_tree(
        &self,
        message: &[u8],
        signature: &SphincsPlusSignature,
        pk: &SphincsPlusPublicKey,
    ) -> Result<TopLayerView> {
        let (digest, ht, pk_fors) = self.recompute(signature, message, pk)?;
        let (valid, msg, wots_sig) = ht.verify_get_msg_sig(
            &pk_fors,
            &signature.sig_ht,
            digest.idx_tree,
            digest.idx_leaf,
            pk.pk_root(),
            self.params.d - 1,
        );
        Ok(TopLayerView {
            valid,
            msg,
            wots_sig,
            idx_tree: digest.idx_tree,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{HashVariant, ParamSet};
    use rand::prelude::*;

    #[test]
    fn test_sphincs_plus() {
        let sp = SphincsPlus::default();

        let kg = sp.keygen();
        assert!(kg.is_ok());
        let (pk, sk) = kg.unwrap();

        let mut rng = thread_rng();
        let len: u16 = rng.gen();
        let message = (0..len).map(|_| rng.gen::<u8>()).collect::<Vec<_>>();

        let signing = sp.sign(&message, &sk);
        assert!(signing.is_ok());
        let signature = signing.unwrap();
        assert_eq!(signature.to_bytes().len(), 49_856);

        assert!(sp.verify(&signature, &message, &pk));

        let mut fake_signature = signature.clone();
        fake_signature.r[0] ^= 1;

        assert!(matches!(
            sp.verify_strict(&fake_signature, &message, &pk),
            Err(Error::VerificationFailed(_))
        ));
    }

    fn test_sp(variant: HashVariant) -> SphincsPlus {
        SphincsPlus::new(ParamSet::Test.params(variant))
    }

    #[test]
    fn test_tamper_sensitivity() {
        let sp = test_sp(HashVariant::Robust);
        let (pk, sk) = sp.keygen().unwrap();
        let message = b"tamper".to_vec();
        let signature = sp.sign(&message, &sk).unwrap();
        assert!(sp.verify(&signature, &message, &pk));

        let n = sp.params().n;
        let top = sp.params().d - 1;

        let mut m = message.clone();
        m[0] ^= 1;
        assert!(!sp.verify(&signature, &m, &pk));

        let mut s = signature.clone();
        s.sig_ht.layer_mut(top).wots_sig[n] ^= 0x40;
        assert!(!sp.verify(&s, &message, &pk));

        let mut s = signature.clone();
        s.sig_ht.layer_mut(0).auth[0] ^= 1;
        assert!(!sp.verify(&s, &message, &pk));

        let mut bytes = signature.to_bytes();
        bytes[n + 1] ^= 2;
        let s = SphincsPlusSignature::from_bytes(sp.params(), &bytes).unwrap();
        assert!(!sp.verify(&s, &message, &pk));

        let mut s = signature.clone();
        s.sig_ht.layer_mut(1).wots_sig.truncate(3);
        assert!(!sp.verify(&s, &message, &pk));
        assert!(sp.verify_get_msg_sig_tree(&message, &s, &pk).is_err());

        let mut s = signature.clone();
        s.sig_ht.layer_mut(top).auth.truncate(n);
        assert!(!sp.verify(&s, &message, &pk));

        let mut s = signature.clone();
        s.sig_ht.xmss_sigs.pop();
        assert!(matches!(
            sp.verify_strict(&s, &message, &pk),
            Err(Error::VerificationFailed(
                VerificationError::SphincsPlusVerificationFailed(_)
            ))
        ));
    }

    #[test]
    fn test_keys_are_not_modified() {
        let sp = test_sp(HashVariant::Simple);
        let (pk, sk) = sp.keygen().unwrap();
        let (pk_before, sk_before) = (pk.to_bytes(), sk.to_bytes());

        let signature = sp.sign(b"msg", &sk).unwrap();
        assert!(sp.verify(&signature, b"msg", &pk));
        sp.verify_get_msg_sig_tree(b"msg", &signature, &pk).unwrap();

        assert_eq!(pk.to_bytes(), pk_before);
        assert_eq!(sk.to_bytes(), sk_before);
        assert_eq!(sk.public_key(), pk);
    }

    #[test]
    fn test_deterministic_keys_and_signatures() {
        let params = ParamSet::Test.params(HashVariant::Simple).with_randomize(false);
        let sp = SphincsPlus::new(params);
        let (pk1, sk1) = sp.keygen_from_seeds(&[1; 16], &[2; 16], &[3; 16]).unwrap();
        let (pk2, _) = sp.keygen_from_seeds(&[1; 16], &[2; 16], &[3; 16]).unwrap();
        assert_eq!(pk1, pk2);

        let s1 = sp.sign(b"same", &sk1).unwrap();
        let s2 = sp.sign(b"same", &sk1).unwrap();
        assert_eq!(s1, s2);

        assert_eq!(
            sp.keygen_from_seeds(&[1; 15], &[2; 16], &[3; 16]).unwrap_err(),
            Error::BadLength(16, 15)
        );
    }

    #[test]
    fn test_serialization() {
        let sp = test_sp(HashVariant::Robust);
        let params = *sp.params();
        let (pk, sk) = sp.keygen().unwrap();
        let signature = sp.sign(b"bytes", &sk).unwrap();

        let bytes = signature.to_bytes();
        assert_eq!(bytes.len(), params.sig_bytes());
        assert_eq!(SphincsPlusSignature::from_bytes(&params, &bytes), Ok(signature));
        assert!(SphincsPlusSignature::from_bytes(&params, &bytes[..bytes.len() - 1]).is_err());

        assert_eq!(SphincsPlusPublicKey::from_bytes(&params, &pk.to_bytes()), Ok(pk.clone()));
        let sk2 = SphincsPlusSecretKey::from_bytes(&params, &sk.to_bytes()).unwrap();
        assert_eq!(sk2.to_bytes(), sk.to_bytes());
        assert!(!format!("{sk:?}").contains("sk_seed"));
    }

    #[test]
    fn test_digest_split_and_top_leaf() {
        let sp = test_sp(HashVariant::Simple);
        let params = *sp.params();
        let (pk, sk) = sp.keygen().unwrap();

        for _ in 0..8 {
            let signature = sp.sign(b"index", &sk).unwrap();
            let digest = sp.message_digest(&signature.r, pk.pk_seed(), pk.pk_root(), b"index");
            assert_eq!(digest.md.len(), params.fors_msg_bytes());
            assert!(digest.idx_tree < 1 << params.tree_bits());
            assert!(digest.idx_leaf < 1 << params.leaf_bits());

            let ht = Hypertree::new(&params, pk.pk_seed());
            let indices = ht.layer_indices(digest.idx_tree, digest.idx_leaf);
            assert_eq!(indices[params.d - 1], (0, sp.top_leaf(&digest)));
            assert_eq!(sp.top_leaf_index(&signature.r, &pk, b"index"), sp.top_leaf(&digest));
            assert_eq!(sp.tree_index(&signature.r, &pk, b"index"), digest.idx_tree);
        }
    }

    #[test]
    fn test_verify_get_msg_sig_tree() {
        let sp = test_sp(HashVariant::Robust);
        let params = *sp.params();
        let (pk, sk) = sp.keygen().unwrap();
        let signature = sp.sign(b"top", &sk).unwrap();

        let view = sp.verify_get_msg_sig_tree(b"top", &signature, &pk).unwrap();
        assert!(view.valid);
        assert_eq!(view.wots_sig, signature.sig_ht.layer(params.d - 1).wots_sig);
        assert_eq!(view.idx_tree, sp.tree_index(&signature.r, &pk, b"top"));

        // The top W-OTS+ signature over `msg` reproduces the top root.
        let leaf = sp.top_leaf_index(&signature.r, &pk, b"top");
        let ht = Hypertree::new(&params, pk.pk_seed());
        let root = ht.xmss().pk_from_sig(
            leaf,
            signature.sig_ht.layer(params.d - 1),
            &view.msg,
            &Hypertree::layer_adrs(params.d - 1, 0),
        );
        assert_eq!(root, pk.pk_root());

        let view = sp.verify_get_msg_sig_tree(b"tor", &signature, &pk).unwrap();
        assert!(!view.valid);
    }
}
