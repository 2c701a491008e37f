use crate::params::{ADRS_BYTES, ADRS_COMPRESSED_BYTES};
use crate::utils::{get_u32_at, get_u64_at, set_u32_at, set_u64_at};

/// Byte offsets of the canonical 32-byte address.
const OFFSET_LAYER: usize = 0;
const OFFSET_TREE: usize = 4;
/// The low 8 bytes of the 12-byte tree address.
const OFFSET_TREE_LOW: usize = 8;
const OFFSET_TYPE: usize = 16;
const OFFSET_WORD1: usize = 20;
const OFFSET_WORD2: usize = 24;
const OFFSET_WORD3: usize = 28;

/// The five types of ADRS defined for SPHINCS+.
/// The 4-byte corresponding value is set as the `type` in an ADRS.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum AdrsType {
    /// 0, used for hashing through a WOTS+ chain.
    WotsHash = 0,
    /// 1, used for compression of the WOTS+ public key.
    WotsPk = 1,
    /// 2, used for the inner nodes of an XMSS tree.
    Tree = 2,
    /// 3, used for the leaves and inner nodes of a FORS tree.
    ForsTree = 3,
    /// 4, used for compression of the FORS roots.
    ForsRoots = 4,
}

impl TryFrom<u32> for AdrsType {
    type Error = u32;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(AdrsType::WotsHash),
            1 => Ok(AdrsType::WotsPk),
            2 => Ok(AdrsType::Tree),
            3 => Ok(AdrsType::ForsTree),
            4 => Ok(AdrsType::ForsRoots),
            other => Err(other),
        }
    }
}

/// The address `Adrs` is a 32-byte value following the structure described in the
/// [SPHINCS+ v.3.1 submission](https://sphincs.org/data/sphincs+-r3.1-specification.pdf).
///
/// It consists of:
/// * `layer address`: 4 bytes, the hypertree layer.
/// * `tree address`:  12 bytes, the tree within the layer. Only the low 8 bytes
///                    are reachable through [`Adrs::set_tree_addr`].
/// * `type`:          4 bytes, an [`AdrsType`].
/// * three 4-byte words whose meaning depends on the type: `{key pair, chain,
///   hash}` for WOTS+ addresses and `{key pair, tree height, tree index}` for
///   tree addresses.
///
/// Every hash consumes the 22-byte compressed form returned by [`Adrs::compress`].
///
/// `Adrs` is `Copy`; functions that walk a tree take it by value and mutate
/// their own copy, so a caller's address never changes behind its back.
#[derive(Copy, Clone, Default, Debug, PartialEq, Eq)]
pub struct Adrs([u8; ADRS_BYTES]);

impl AsRef<[u8]> for Adrs {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; ADRS_BYTES]> for Adrs {
    fn from(bytes: [u8; ADRS_BYTES]) -> Self {
        Self(bytes)
    }
}

impl From<AdrsType> for Adrs {
    /// Returns an all-zero `adrs` with the type set.
    fn from(adrs_type: AdrsType) -> Self {
        let mut adrs = Self::default();
        adrs.set_type(adrs_type);
        adrs
    }
}

impl Adrs {
    /// Canonical 32-byte form.
    pub fn to_bytes(&self) -> [u8; ADRS_BYTES] {
        self.0
    }

    /// The 22-byte compressed form
    /// `[layer:1][tree:8][type:1][word1:4][word2:4][word3:4]`.
    ///
    /// Words that carry no meaning for the current type are written as zero.
    pub fn compress(&self) -> [u8; ADRS_COMPRESSED_BYTES] {
        let mut c = [0u8; ADRS_COMPRESSED_BYTES];
        c[0] = self.0[OFFSET_LAYER + 3];
        c[1..9].copy_from_slice(&self.0[OFFSET_TREE_LOW..OFFSET_TREE_LOW + 8]);
        c[9] = self.0[OFFSET_TYPE + 3];

        let (word1, word2, word3) = match AdrsType::try_from(self.get_type()) {
            Ok(AdrsType::WotsHash) => (true, true, true),
            Ok(AdrsType::WotsPk) | Ok(AdrsType::ForsRoots) => (true, false, false),
            Ok(AdrsType::Tree) => (false, true, true),
            Ok(AdrsType::ForsTree) => (true, true, true),
            Err(_) => (false, false, false),
        };
        if word1 {
            c[10..14].copy_from_slice(&self.0[OFFSET_WORD1..OFFSET_WORD1 + 4]);
        }
        if word2 {
            c[14..18].copy_from_slice(&self.0[OFFSET_WORD2..OFFSET_WORD2 + 4]);
        }
        if word3 {
            c[18..22].copy_from_slice(&self.0[OFFSET_WORD3..OFFSET_WORD3 + 4]);
        }
        c
    }

    /// Specify which level of the hypertree (the "layer") we're working on.
    pub fn set_layer_addr(&mut self, layer: u32) {
        set_u32_at(self.0.as_mut(), layer, OFFSET_LAYER);
    }

    /// Specify which tree within the layer (the "tree address") we're working on.
    /// The upper 4 bytes of the 12-byte field are cleared.
    pub fn set_tree_addr(&mut self, tree: u64) {
        self.0[OFFSET_TREE..OFFSET_TREE_LOW].fill(0);
        set_u64_at(self.0.as_mut(), tree, OFFSET_TREE_LOW);
    }

    /// Specify the reason we'll use this address structure for, that is, what
    /// hash will we compute with it. Resets the three type-dependent words.
    pub fn set_type(&mut self, adrs_type: AdrsType) {
        set_u32_at(self.0.as_mut(), adrs_type as u32, OFFSET_TYPE);
        self.0[OFFSET_WORD1..].fill(0);
    }

    /// Specify which Merkle leaf we're working on; that is, which OTS keypair
    /// we're talking about.
    pub fn set_keypair_addr(&mut self, keypair: u32) {
        set_u32_at(self.0.as_mut(), keypair, OFFSET_WORD1);
    }

    /// Specify which Winternitz chain within the OTS we're working with.
    pub fn set_chain_addr(&mut self, chain: u32) {
        set_u32_at(self.0.as_mut(), chain, OFFSET_WORD2);
    }

    /// Specify where in the Winternitz chain we are.
    pub fn set_hash_addr(&mut self, hash: u32) {
        set_u32_at(self.0.as_mut(), hash, OFFSET_WORD3);
    }

    /// Specify the height of the node in the Merkle/FORS tree we are in.
    pub fn set_tree_height(&mut self, tree_height: u32) {
        set_u32_at(self.0.as_mut(), tree_height, OFFSET_WORD2);
    }

    /// Specify the distance from the left edge of the node in the Merkle/FORS tree.
    pub fn set_tree_index(&mut self, tree_index: u32) {
        set_u32_at(self.0.as_mut(), tree_index, OFFSET_WORD3);
    }

    pub fn get_layer_addr(&self) -> u32 {
        get_u32_at(&self.0, OFFSET_LAYER)
    }

    /// Low 64 bits of the tree address.
    pub fn get_tree_addr(&self) -> u64 {
        get_u64_at(&self.0, OFFSET_TREE_LOW)
    }

    pub fn get_type(&self) -> u32 {
        get_u32_at(&self.0, OFFSET_TYPE)
    }

    pub fn get_keypair_addr(&self) -> u32 {
        get_u32_at(&self.0, OFFSET_WORD1)
    }

    pub fn get_chain_addr(&self) -> u32 {
        get_u32_at(&self.0, OFFSET_WORD2)
    }

    pub fn get_hash_addr(&self) -> u32 {
        get_u32_at(&self.0, OFFSET_WORD3)
    }

    pub fn get_tree_height(&self) -> u32 {
        get_u32_at(&self.0, OFFSET_WORD2)
    }

    pub fn get_tree_index(&self) -> u32 {
        get_u32_at(&self.0, OFFSET_WORD3)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sequential_bytes(adrs_type: u8) -> [u8; ADRS_BYTES] {
        let mut bytes = [0u8; ADRS_BYTES];
        for (i, b) in bytes.iter_mut().enumerate() {
            *b = i as u8;
        }
        bytes[16..20].copy_from_slice(&[0, 0, 0, adrs_type]);
        bytes
    }

    #[test]
    fn test_compress_wots_hash() {
        let adrs = Adrs::from(sequential_bytes(0));
        let expected = [
            0x03, 0x08, 0x09, 0x0a, 0x0b, 0x0c, 0x0d, 0x0e, 0x0f, 0x00, 0x14, 0x15, 0x16, 0x17,
            0x18, 0x19, 0x1a, 0x1b, 0x1c, 0x1d, 0x1e, 0x1f,
        ];
        assert_eq!(adrs.compress(), expected);
    }

    #[test]
    fn test_compress_wots_pk() {
        let mut bytes = sequential_bytes(1);
        bytes[24..].fill(0);
        let adrs = Adrs::from(bytes);
        let expected = [
            0x03, 0x08, 0x09, 0x0a, 0x0b, 0x0c, 0x0d, 0x0e, 0x0f, 0x01, 0x14, 0x15, 0x16, 0x17,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        ];
        assert_eq!(adrs.compress(), expected);

        // Chain and hash words are ignored for a WOTS_PK address even if set.
        assert_eq!(Adrs::from(sequential_bytes(1)).compress(), expected);
    }

    #[test]
    fn test_compress_tree_drops_keypair() {
        let adrs = Adrs::from(sequential_bytes(2));
        let c = adrs.compress();
        assert_eq!(&c[10..14], &[0, 0, 0, 0]);
        assert_eq!(&c[14..22], &[24, 25, 26, 27, 28, 29, 30, 31]);
    }

    #[test]
    fn test_set_type_resets_words() {
        let mut adrs = Adrs::default();
        adrs.set_layer_addr(5);
        adrs.set_tree_addr(0x0102_0304_0506_0708);
        adrs.set_keypair_addr(9);
        adrs.set_chain_addr(10);
        adrs.set_hash_addr(11);

        adrs.set_type(AdrsType::Tree);
        assert_eq!(adrs.get_type(), AdrsType::Tree as u32);
        assert_eq!(adrs.get_keypair_addr(), 0);
        assert_eq!(adrs.get_tree_height(), 0);
        assert_eq!(adrs.get_tree_index(), 0);
        assert_eq!(adrs.get_layer_addr(), 5);
        assert_eq!(adrs.get_tree_addr(), 0x0102_0304_0506_0708);
    }

    #[test]
    fn test_setters_and_getters() {
        let mut adrs = Adrs::from(AdrsType::WotsHash);
        adrs.set_keypair_addr(0xdead_beef);
        adrs.set_chain_addr(66);
        adrs.set_hash_addr(15);
        assert_eq!(adrs.get_keypair_addr(), 0xdead_beef);
        assert_eq!(adrs.get_chain_addr(), 66);
        assert_eq!(adrs.get_hash_addr(), 15);

        let bytes = adrs.to_bytes();
        assert_eq!(&bytes[20..24], &[0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(Adrs::from(bytes), adrs);

        // The layer is a 4-byte field but only its low byte is hashed.
        adrs.set_layer_addr(0x0000_0110);
        assert_eq!(adrs.compress()[0], 0x10);
    }
}
