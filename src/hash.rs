//! Tweakable hash functions.
//!
//! Every hash call in SPHINCS+ is keyed by the public seed and tweaked by an
//! [`Adrs`](crate::wots_plus::adrs::Adrs), which gives each call in the forest
//! its own domain. Only the SHA-256 family is provided.

pub mod sha2;

pub use crate::hash::sha2::{mgf1_sha256, TweakableHash};
