mod error;
mod utils;

pub mod attack;
pub mod fault;
pub mod fors;
pub mod hash;
pub mod hypertree;
pub mod params;
pub mod sphincs_plus;
pub mod wots_plus;
pub mod xmss;

pub use crate::error::{Error, Result, VerificationError};
pub use crate::params::{HashVariant, ParamSet, Params};
pub use crate::sphincs_plus::{SphincsPlus, SphincsPlusPublicKey, SphincsPlusSecretKey, SphincsPlusSignature};
