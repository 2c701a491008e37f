//! SPHINCS+ parameter sets.
//!
//! The parameters fix the shape of every tree and chain in the scheme. They
//! are immutable once built, and every named preset corresponds to one of the
//! SHA-256 instantiations of the SPHINCS+ round 3.1 submission, in either the
//! `robust` (bitmask-then-hash) or `simple` (hash only) variant.
//!
//! A parameter set is picked at runtime, either from a [`ParamSet`] preset or
//! by name:
//!
//! ```rust
//! use sphincs_fault::params::Params;
//!
//! let params: Params = "sha256-256f-robust".parse().unwrap();
//! assert_eq!(params.n, 32);
//! assert_eq!(params.h_prime, 4);
//! assert_eq!(params.len, 67);
//! ```

use crate::error::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// SHA-256 input block size; `F` pads `PK.seed` up to this length.
pub const SHA256_BLOCK_BYTES: usize = 64;

/// SHA-256 output length in bytes; upper bound for `n`.
pub const SHA256_OUTPUT_BYTES: usize = 32;

/// Byte size of a compressed ADRS as fed to every tweakable hash call.
pub const ADRS_COMPRESSED_BYTES: usize = 22;

/// Byte size of the canonical ADRS.
pub const ADRS_BYTES: usize = 32;

/// Selects how the tweakable hash treats its input.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum HashVariant {
    /// The input is XOR-ed with an MGF1 mask derived from `PK.seed || ADRS` before hashing.
    Robust,
    /// The input is hashed as is.
    Simple,
}

impl fmt::Display for HashVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HashVariant::Robust => write!(f, "robust"),
            HashVariant::Simple => write!(f, "simple"),
        }
    }
}

/// Named parameter presets.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[allow(non_camel_case_types)]
pub enum ParamSet {
    Sha256_128s,
    Sha256_128f,
    Sha256_192s,
    Sha256_192f,
    Sha256_256s,
    Sha256_256f,
    /// A toy set with a 6-level hypertree. Far below any security level, but
    /// small enough to run the fault attack end to end in a unit test.
    Test,
}

impl ParamSet {
    pub const ALL: [ParamSet; 7] = [
        ParamSet::Sha256_128s,
        ParamSet::Sha256_128f,
        ParamSet::Sha256_192s,
        ParamSet::Sha256_192f,
        ParamSet::Sha256_256s,
        ParamSet::Sha256_256f,
        ParamSet::Test,
    ];

    /// `(n, h, d, k, a, w)` of the preset.
    fn dimensions(self) -> (usize, usize, usize, usize, usize, usize) {
        match self {
            ParamSet::Sha256_128s => (16, 63, 7, 14, 12, 16),
            ParamSet::Sha256_128f => (16, 66, 22, 33, 6, 16),
            ParamSet::Sha256_192s => (24, 63, 7, 17, 14, 16),
            ParamSet::Sha256_192f => (24, 66, 22, 33, 8, 16),
            ParamSet::Sha256_256s => (32, 64, 8, 22, 14, 16),
            ParamSet::Sha256_256f => (32, 68, 17, 35, 9, 16),
            ParamSet::Test => (16, 6, 3, 4, 3, 16),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ParamSet::Sha256_128s => "sha256-128s",
            ParamSet::Sha256_128f => "sha256-128f",
            ParamSet::Sha256_192s => "sha256-192s",
            ParamSet::Sha256_192f => "sha256-192f",
            ParamSet::Sha256_256s => "sha256-256s",
            ParamSet::Sha256_256f => "sha256-256f",
            ParamSet::Test => "test",
        }
    }

    /// Builds the parameters of this preset for the given hash variant.
    /// Signing is randomized; see [`Params::with_randomize`].
    pub fn params(self, variant: HashVariant) -> Params {
        let (n, h, d, k, a, w) = self.dimensions();
        match Params::new(n, h, d, k, a, w, variant) {
            Ok(params) => params,
            // Presets are fixed and checked by the tests below.
            Err(e) => unreachable!("preset {} is invalid: {e}", self.name()),
        }
    }
}

impl fmt::Display for ParamSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ParamSet {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let lower = s.to_ascii_lowercase();
        let normalized = lower.replace(['_', ' '], "-");
        let normalized = normalized.trim_start_matches("sphincs-");
        ParamSet::ALL
            .iter()
            .copied()
            .find(|set| {
                set.name() == normalized
                    || set.name().trim_start_matches("sha256-") == normalized
                    || set.name().replace('-', "") == normalized
            })
            .ok_or_else(|| Error::UnknownParamSet(s.to_owned()))
    }
}

/// Immutable SPHINCS+ configuration.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Params {
    /// Hash output length in bytes.
    pub n: usize,
    /// Winternitz parameter.
    pub w: usize,
    /// `log2(w)`.
    pub log_w: usize,
    /// Height of the hypertree.
    pub h: usize,
    /// Number of hypertree layers.
    pub d: usize,
    /// Height of a single XMSS tree, `h / d`.
    pub h_prime: usize,
    /// Number of FORS trees.
    pub k: usize,
    /// Height of a FORS tree.
    pub a: usize,
    /// WOTS+ message blocks.
    pub len1: usize,
    /// WOTS+ checksum blocks.
    pub len2: usize,
    /// `len1 + len2`.
    pub len: usize,
    pub variant: HashVariant,
    /// Draw fresh `opt_rand` for every signature instead of using zeros.
    pub randomize: bool,
}

impl Params {
    /// Builds and validates a custom parameter set. `len1`, `len2` and `h'`
    /// are derived.
    pub fn new(
        n: usize,
        h: usize,
        d: usize,
        k: usize,
        a: usize,
        w: usize,
        variant: HashVariant,
    ) -> Result<Self> {
        if n == 0 || n > SHA256_OUTPUT_BYTES {
            return Err(Error::InvalidParams(format!(
                "n must be in 1..={SHA256_OUTPUT_BYTES}, got {n}"
            )));
        }
        let log_w = match w {
            4 => 2,
            16 => 4,
            256 => 8,
            _ => {
                return Err(Error::InvalidParams(format!(
                    "w must be one of 4, 16 or 256, got {w}"
                )))
            }
        };
        if d == 0 || h % d != 0 {
            return Err(Error::InvalidParams(format!(
                "h ({h}) must be a non-zero multiple of d ({d})"
            )));
        }
        let h_prime = h / d;
        if h_prime == 0 || h_prime >= 32 {
            return Err(Error::InvalidParams(format!(
                "subtree height h/d must be in 1..32, got {h_prime}"
            )));
        }
        if h - h_prime > 64 {
            return Err(Error::InvalidParams(format!(
                "tree index of {} bits does not fit into 64 bits",
                h - h_prime
            )));
        }
        if k == 0 || a == 0 || a >= 32 {
            return Err(Error::InvalidParams(format!(
                "FORS needs k > 0 and a in 1..32, got k={k}, a={a}"
            )));
        }

        let len1 = (8 * n).div_ceil(log_w);
        let len2 = Self::checksum_len(len1, w);
        // The shifted checksum has to fit in the u32 used to encode it.
        if len2 * log_w > 32 {
            return Err(Error::InvalidParams(format!(
                "checksum of {len2} base-{w} digits does not fit into 32 bits"
            )));
        }

        Ok(Self {
            n,
            w,
            log_w,
            h,
            d,
            h_prime,
            k,
            a,
            len1,
            len2,
            len: len1 + len2,
            variant,
            randomize: true,
        })
    }

    /// Number of base-`w` digits needed to hold the largest possible checksum
    /// `len1 * (w - 1)`, i.e. `floor(log_w(len1 * (w - 1))) + 1`.
    fn checksum_len(len1: usize, w: usize) -> usize {
        let mut max_csum = len1 * (w - 1);
        let mut digits = 0;
        while max_csum > 0 {
            max_csum /= w;
            digits += 1;
        }
        digits.max(1)
    }

    pub fn with_randomize(mut self, randomize: bool) -> Self {
        self.randomize = randomize;
        self
    }

    pub fn with_variant(mut self, variant: HashVariant) -> Self {
        self.variant = variant;
        self
    }

    /// Number of leaves of a single XMSS tree.
    pub fn xmss_leaves(&self) -> usize {
        1 << self.h_prime
    }

    /// Number of leaves of a single FORS tree.
    pub fn fors_leaves(&self) -> usize {
        1 << self.a
    }

    pub fn wots_bytes(&self) -> usize {
        self.len * self.n
    }

    pub fn xmss_sig_bytes(&self) -> usize {
        (self.len + self.h_prime) * self.n
    }

    pub fn ht_sig_bytes(&self) -> usize {
        self.d * self.xmss_sig_bytes()
    }

    pub fn fors_sig_bytes(&self) -> usize {
        self.k * (self.a + 1) * self.n
    }

    pub fn sig_bytes(&self) -> usize {
        self.n + self.fors_sig_bytes() + self.ht_sig_bytes()
    }

    pub fn pk_bytes(&self) -> usize {
        2 * self.n
    }

    pub fn sk_bytes(&self) -> usize {
        4 * self.n
    }

    /// Bytes of the digest consumed by FORS.
    pub fn fors_msg_bytes(&self) -> usize {
        (self.k * self.a).div_ceil(8)
    }

    /// Bits of the tree index carried in the digest.
    pub fn tree_bits(&self) -> usize {
        self.h - self.h_prime
    }

    pub fn tree_bytes(&self) -> usize {
        self.tree_bits().div_ceil(8)
    }

    /// Bits of the leaf index carried in the digest.
    pub fn leaf_bits(&self) -> usize {
        self.h_prime
    }

    pub fn leaf_bytes(&self) -> usize {
        self.leaf_bits().div_ceil(8)
    }

    /// Output length of `H_msg`.
    pub fn digest_bytes(&self) -> usize {
        self.fors_msg_bytes() + self.tree_bytes() + self.leaf_bytes()
    }
}

impl Default for Params {
    fn default() -> Self {
        ParamSet::Sha256_256f.params(HashVariant::Robust)
    }
}

impl FromStr for Params {
    type Err = Error;

    /// Parses names such as `sha256-256f-robust`, `sha256-128s-simple` or
    /// `256f`. Without a variant suffix the robust variant is used.
    fn from_str(s: &str) -> Result<Self> {
        let lower = s.to_ascii_lowercase();
        let (set, variant) = if let Some(set) = lower.strip_suffix("-robust") {
            (set, HashVariant::Robust)
        } else if let Some(set) = lower.strip_suffix("-simple") {
            (set, HashVariant::Simple)
        } else {
            (lower.as_str(), HashVariant::Robust)
        };
        let set: ParamSet = set.parse().map_err(|_| Error::UnknownParamSet(s.to_owned()))?;
        Ok(set.params(variant))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_are_valid() {
        for set in ParamSet::ALL {
            for variant in [HashVariant::Robust, HashVariant::Simple] {
                let params = set.params(variant);
                assert_eq!(params.h % params.d, 0);
                assert_eq!(params.len, params.len1 + params.len2);
                // The checksum must be representable in len2 digits.
                let max_csum = params.len1 * (params.w - 1);
                assert!(max_csum < params.w.pow(params.len2 as u32));
            }
        }
    }

    #[test]
    fn test_256f_dimensions() {
        let params = ParamSet::Sha256_256f.params(HashVariant::Robust);
        assert_eq!(params.n, 32);
        assert_eq!(params.h_prime, 4);
        assert_eq!(params.len1, 64);
        assert_eq!(params.len2, 3);
        assert_eq!(params.fors_msg_bytes(), 40);
        assert_eq!(params.tree_bytes(), 8);
        assert_eq!(params.leaf_bytes(), 1);
        assert_eq!(params.digest_bytes(), 49);
        assert_eq!(params.sig_bytes(), 49_856);
    }

    #[test]
    fn test_128f_dimensions() {
        let params = ParamSet::Sha256_128f.params(HashVariant::Simple);
        assert_eq!(params.len, 35);
        assert_eq!(params.sig_bytes(), 17_088);
    }

    #[test]
    fn test_invalid_params() {
        assert!(matches!(
            Params::new(32, 67, 17, 35, 9, 16, HashVariant::Robust),
            Err(Error::InvalidParams(_))
        ));
        assert!(matches!(
            Params::new(32, 68, 17, 35, 9, 8, HashVariant::Robust),
            Err(Error::InvalidParams(_))
        ));
        assert!(matches!(
            Params::new(40, 68, 17, 35, 9, 16, HashVariant::Robust),
            Err(Error::InvalidParams(_))
        ));
    }

    #[test]
    fn test_parse_names() {
        let params: Params = "sha256-256f-simple".parse().unwrap();
        assert_eq!(params.variant, HashVariant::Simple);
        assert_eq!(params.h, 68);

        let params: Params = "128s".parse().unwrap();
        assert_eq!(params.variant, HashVariant::Robust);
        assert_eq!(params.d, 7);

        assert_eq!("SPHINCS_SHA256_192F".parse::<ParamSet>(), Ok(ParamSet::Sha256_192f));
        assert!(matches!(
            "sha3-256f".parse::<Params>(),
            Err(Error::UnknownParamSet(_))
        ));
    }
}
