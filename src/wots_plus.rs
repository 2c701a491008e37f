//! # Winternitz One-Time Signature Scheme Plus (W-OTS+)
//!
//! This module implements W-OTS+ as used inside SPHINCS+: every XMSS leaf is
//! the compressed public key of one W-OTS+ key pair, and each hypertree layer
//! signs the root of the layer below it with one of those keys.
//!
//! A W-OTS+ key consists of `len` hash chains of length `w`. Signing a message
//! reveals, for each base-`w` digit `d_i` of the message and its checksum, the
//! `d_i`-th value of chain `i`. Anybody can walk a revealed value forward to
//! the end of its chain, which is how the public key is recovered from a
//! signature.
//!
//! ## Chain algebra
//!
//! [`WotsPlus::chain`] is composable:
//! `chain(x, 0, a + b) == chain(chain(x, 0, a), a, b)`. A value revealed at
//! position `p` therefore signs every digit `>= p` of the same chain. The
//! checksum normally prevents anyone from using that, as long as each key
//! signs a single message. The fault attack in [`crate::attack`] is built on
//! keys that sign many.
//!
//! ## Addressing
//!
//! Callers pass an [`Adrs`] that already carries the layer, tree and key pair
//! of the W-OTS+ key with type [`AdrsType::WotsHash`]. The chain and hash
//! words are filled in here.

use crate::hash::TweakableHash;
use crate::params::Params;
use crate::utils::u64_to_bytes_into;
use crate::wots_plus::adrs::{Adrs, AdrsType};
use zeroize::Zeroize;

pub mod adrs;

/// Encapsulates the W-OTS+ operations and maintains state for the hasher.
#[derive(Clone, Debug)]
pub struct WotsPlus {
    params: Params,
    hasher: TweakableHash,
}

impl WotsPlus {
    /// Creates a new `WotsPlus` instance with the specified public seed.
    ///
    /// # Arguments
    ///
    /// * `params` - The parameter set fixing `n`, `w` and `len`.
    /// * `pub_seed` - An `n`-byte public seed used for the hashing operations in WOTS+.
    pub fn new(params: &Params, pub_seed: &[u8]) -> Self {
        Self::with_hasher(params, TweakableHash::new(params, pub_seed))
    }

    pub(crate) fn with_hasher(params: &Params, hasher: TweakableHash) -> Self {
        Self {
            params: *params,
            hasher,
        }
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn hasher(&self) -> &TweakableHash {
        &self.hasher
    }

    /// Computes the chaining function.
    ///
    /// Interprets `input` as the `start`-th value of the chain addressed by
    /// `adrs` and applies `F` `steps` times, setting the hash address to
    /// `start + j` before step `j`. Steps past position `w - 1` are not taken.
    pub fn chain(&self, input: &[u8], start: u32, steps: u32, mut adrs: Adrs) -> Vec<u8> {
        let n = self.params.n;
        let mut output = input[..n].to_vec();
        self.gen_chain(&mut output, start, steps, &mut adrs);
        output
    }

    fn gen_chain(&self, inout: &mut [u8], start: u32, steps: u32, adrs: &mut Adrs) {
        // Iterate 'steps' calls to the hash function F.
        for i in start..start.saturating_add(steps) {
            if i as usize >= self.params.w - 1 {
                break;
            }
            adrs.set_hash_addr(i);
            self.hasher.f_inplace(inout, 1, adrs);
        }
    }

    /// Converts an array of bytes into `out_len` integers in base `w`.
    pub fn base_w(&self, input: &[u8], out_len: usize) -> Vec<u32> {
        let log_w = self.params.log_w;
        let mask = (self.params.w - 1) as u32;
        let mut output = Vec::with_capacity(out_len);
        let mut bits = 0;
        let mut total: u32 = 0;
        let mut input_index = 0;

        for _ in 0..out_len {
            if bits == 0 {
                // Load a new byte from input
                total = input[input_index] as u32;
                input_index += 1;
                bits += 8;
            }

            bits -= log_w;
            output.push((total >> bits) & mask);
        }
        output
    }

    /// Computes the W-OTS+ checksum over a message (in base_w), as `len2` digits.
    fn wots_checksum(&self, msg_base_w: &[u32]) -> Vec<u32> {
        let p = &self.params;
        let mut csum: u32 = msg_base_w
            .iter()
            .take(p.len1)
            .map(|&digit| p.w as u32 - 1 - digit)
            .sum();

        // Make sure expected empty zero bits are the least significant bits.
        let shift = (8 - ((p.len2 * p.log_w) % 8)) % 8;
        csum <<= shift;

        let mut csum_bytes = vec![0u8; (p.len2 * p.log_w).div_ceil(8)];
        u64_to_bytes_into(&mut csum_bytes, csum as u64);
        self.base_w(&csum_bytes, p.len2)
    }

    /// Takes an `n`-byte message and derives the matching chain lengths: the
    /// `len1` base-`w` digits of the message followed by the `len2` digits of
    /// its checksum.
    pub fn chain_lengths(&self, msg: &[u8]) -> Vec<u32> {
        let mut lengths = self.base_w(msg, self.params.len1);
        let csum = self.wots_checksum(&lengths);
        lengths.extend(csum);
        lengths
    }

    /// The secret start of chain `chain_idx`, `PRF(SK.seed, ADRS)` with the
    /// hash address cleared.
    fn chain_secret(&self, sk_seed: &[u8], chain_idx: usize, adrs: &mut Adrs) -> Vec<u8> {
        let mut sk = vec![0u8; self.params.n];
        adrs.set_chain_addr(chain_idx as u32);
        adrs.set_hash_addr(0);
        self.hasher.prf(&mut sk, sk_seed, adrs);
        sk
    }

    /// Generates the uncompressed W-OTS+ public key: the ends of all `len`
    /// chains, `len * n` bytes.
    pub fn pk_gen(&self, sk_seed: &[u8], mut adrs: Adrs) -> Vec<u8> {
        let n = self.params.n;
        let mut pk = vec![0u8; self.params.wots_bytes()];

        for (i, block) in pk.chunks_exact_mut(n).enumerate() {
            let mut sk = self.chain_secret(sk_seed, i, &mut adrs);
            block.copy_from_slice(&sk);
            sk.zeroize();
            self.gen_chain(block, 0, self.params.w as u32 - 1, &mut adrs);
        }
        pk
    }

    /// Signs an `n`-byte message, returning `len * n` bytes.
    pub fn sign(&self, message: &[u8], sk_seed: &[u8], mut adrs: Adrs) -> Vec<u8> {
        let n = self.params.n;
        let lengths = self.chain_lengths(message);
        let mut sig = vec![0u8; self.params.wots_bytes()];

        for (i, block) in sig.chunks_exact_mut(n).enumerate() {
            let mut sk = self.chain_secret(sk_seed, i, &mut adrs);
            block.copy_from_slice(&sk);
            sk.zeroize();
            // Calculate signature from sk, based on the steps
            self.gen_chain(block, 0, lengths[i], &mut adrs);
        }
        sig
    }

    /// Takes a W-OTS+ signature and an `n`-byte message and completes every
    /// chain to position `w - 1`, returning the uncompressed public key.
    pub fn pk_from_sig(&self, sig: &[u8], message: &[u8], mut adrs: Adrs) -> Vec<u8> {
        let n = self.params.n;
        let w = self.params.w as u32;
        let lengths = self.chain_lengths(message);
        let mut pk = sig[..self.params.wots_bytes()].to_vec();

        for (i, block) in pk.chunks_exact_mut(n).enumerate() {
            adrs.set_chain_addr(i as u32);
            self.gen_chain(block, lengths[i], w - 1 - lengths[i], &mut adrs);
        }
        pk
    }

    /// Recovers the chain positions a signature was produced at, given the
    /// uncompressed public key it belongs to.
    ///
    /// For every block, the candidate positions `w - 1, w - 2, ..., 0` are
    /// tried in that order, i.e. the fewest extra hashes first; the first
    /// position whose completed chain hits the public key block is taken.
    /// Returns `None` if some block matches no position, meaning the signature
    /// was not produced under this key.
    pub fn message_from_sig(&self, sig: &[u8], pk: &[u8], mut adrs: Adrs) -> Option<Vec<u32>> {
        let n = self.params.n;
        let w = self.params.w as u32;
        if sig.len() != self.params.wots_bytes() || pk.len() != self.params.wots_bytes() {
            return None;
        }
        let mut positions = Vec::with_capacity(self.params.len);

        for (i, (sig_block, pk_block)) in sig
            .chunks_exact(n)
            .zip(pk.chunks_exact(n))
            .take(self.params.len)
            .enumerate()
        {
            adrs.set_chain_addr(i as u32);
            let mut walked = sig_block.to_vec();
            let mut found = None;
            // Hash addresses depend on the start, so every candidate restarts
            // from the signature block.
            for steps in 0..w {
                let start = w - 1 - steps;
                walked.copy_from_slice(sig_block);
                self.gen_chain(&mut walked, start, steps, &mut adrs);
                if walked == pk_block {
                    found = Some(start);
                    break;
                }
            }
            positions.push(found?);
        }
        Some(positions)
    }

    /// Compresses an uncompressed public key into an XMSS leaf with
    /// `T_len(PK.seed, ADRS_pk, pk)`.
    pub fn compress_pk(&self, pk: &[u8], adrs: &Adrs) -> Vec<u8> {
        let mut pk_adrs = *adrs;
        pk_adrs.set_type(AdrsType::WotsPk);
        pk_adrs.set_keypair_addr(adrs.get_keypair_addr());

        let mut leaf = vec![0u8; self.params.n];
        self.hasher.t_l(&mut leaf, pk, self.params.len, &pk_adrs);
        leaf
    }
}
