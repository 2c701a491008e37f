use crate::params::{HashVariant, Params, SHA256_BLOCK_BYTES};
use crate::utils::{u32_to_bytes, xor_into};
use crate::wots_plus::adrs::Adrs;
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

/// SHA-256 instantiation of the tweakable hash family `PRF`, `PRF_msg`,
/// `H_msg`, `F`, `H` and `T_l`, bound to one public seed.
#[derive(Clone, Debug)]
pub struct TweakableHash {
    n: usize,
    variant: HashVariant,
    pub_seed: Vec<u8>,
    sha256: Sha256,
}

impl TweakableHash {
    pub fn new(params: &Params, pub_seed: &[u8]) -> Self {
        // block-pad and initialize sha256 with pub_seed
        let mut block256 = [0_u8; SHA256_BLOCK_BYTES];
        block256[..params.n].copy_from_slice(&pub_seed[..params.n]);
        let mut sha256 = Sha256::new();
        sha256.update(block256);

        Self {
            n: params.n,
            variant: params.variant,
            pub_seed: pub_seed[..params.n].to_vec(),
            sha256,
        }
    }

    pub fn pub_seed(&self) -> &[u8] {
        &self.pub_seed
    }

    /// PRF(SEED, ADRS) = SHA-256(SEED || ADRSc)
    pub fn prf(&self, output: &mut [u8], seed: &[u8], adrs: &Adrs) {
        let mut hasher = Sha256::new();
        hasher.update(&seed[..self.n]);
        hasher.update(adrs.compress());
        output[..self.n].copy_from_slice(&hasher.finalize()[..self.n]);
    }

    /// PRF_msg(SK.prf, OptRand, M) = HMAC-SHA-256(SK.prf, OptRand || M)
    pub fn prf_msg(params: &Params, output: &mut [u8], sk_prf: &[u8], opt_rand: &[u8], m: &[u8]) {
        let mut mac = <HmacSha256 as Mac>::new_from_slice(&sk_prf[..params.n])
            .expect("HMAC accepts keys of any length");
        mac.update(opt_rand);
        mac.update(m);
        output[..params.n].copy_from_slice(&mac.finalize().into_bytes()[..params.n]);
    }

    /// H_msg(R, PK.seed, PK.root, M) = MGF1-SHA-256(SHA-256(R || PK.seed || PK.root || M), m)
    pub fn h_msg(params: &Params, r: &[u8], pk_seed: &[u8], pk_root: &[u8], m: &[u8]) -> Vec<u8> {
        let mut hasher = Sha256::new();
        hasher.update(&r[..params.n]);
        hasher.update(&pk_seed[..params.n]);
        hasher.update(&pk_root[..params.n]);
        hasher.update(m);
        mgf1_sha256(&hasher.finalize(), params.digest_bytes())
    }

    /// Takes an array of in_blocks concatenated arrays of n bytes.
    ///
    /// F(PK.seed, ADRS, M) = SHA-256(BlockPad(PK.seed) || ADRSc || M*),
    /// where M* is M masked with MGF1(PK.seed || ADRSc) in the robust variant.
    pub fn f(&self, output: &mut [u8], input: &[u8], in_blocks: usize, adrs: &Adrs) {
        let digest = self.thash(&input[..in_blocks * self.n], adrs);
        output[..self.n].copy_from_slice(&digest[..self.n]);
    }

    /// Applies [`TweakableHash::f`], but modifies the given input in place.
    pub fn f_inplace(&self, inout: &mut [u8], in_blocks: usize, adrs: &Adrs) {
        let digest = self.thash(&inout[..in_blocks * self.n], adrs);
        inout[..self.n].copy_from_slice(&digest[..self.n]);
    }

    /// H(PK.seed, ADRS, M1 || M2), same computation as F over two blocks.
    pub fn h(&self, output: &mut [u8], left: &[u8], right: &[u8], adrs: &Adrs) {
        let mut input = Vec::with_capacity(2 * self.n);
        input.extend_from_slice(&left[..self.n]);
        input.extend_from_slice(&right[..self.n]);
        self.f(output, &input, 2, adrs);
    }

    /// T_l(PK.seed, ADRS, M), same computation as F over l blocks.
    pub fn t_l(&self, output: &mut [u8], input: &[u8], in_blocks: usize, adrs: &Adrs) {
        self.f(output, input, in_blocks, adrs);
    }

    fn thash(&self, input: &[u8], adrs: &Adrs) -> [u8; 32] {
        let adrs_c = adrs.compress();
        let mut hasher = self.sha256.clone();
        hasher.update(adrs_c);
        match self.variant {
            HashVariant::Robust => {
                let mut mask_seed = Vec::with_capacity(self.n + adrs_c.len());
                mask_seed.extend_from_slice(&self.pub_seed);
                mask_seed.extend_from_slice(&adrs_c);
                let mut masked = mgf1_sha256(&mask_seed, input.len());
                xor_into(&mut masked, input);
                hasher.update(&masked);
            }
            HashVariant::Simple => hasher.update(input),
        }
        hasher.finalize().into()
    }
}

/// MGF1 mask generation with SHA-256: concatenates `SHA-256(seed || BE32(counter))`
/// for counter = 0, 1, ... and truncates the result to `length` bytes.
pub fn mgf1_sha256(seed: &[u8], length: usize) -> Vec<u8> {
    let mut output = Vec::with_capacity(length + 32);
    let mut counter = 0_u32;
    while output.len() < length {
        let mut hasher = Sha256::new();
        hasher.update(seed);
        hasher.update(u32_to_bytes(counter));
        output.extend_from_slice(&hasher.finalize());
        counter += 1;
    }
    output.truncate(length);
    output
}
