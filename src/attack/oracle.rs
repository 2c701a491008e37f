use crate::error::{Error, Result};
use crate::fault::FaultInjector;
use crate::params::Params;
use crate::sphincs_plus::{SphincsPlus, SphincsPlusPublicKey, SphincsPlusSecretKey, SphincsPlusSignature};
use log::{debug, info};

/// A signer the attack can query. Every request blocks until its signature
/// is returned; `&mut self` keeps at most one request in flight.
pub trait SigningOracle {
    fn params(&self) -> &Params;

    fn public_key(&self) -> &SphincsPlusPublicKey;

    /// An honest signature of `message`.
    fn sign(&mut self, message: &[u8]) -> Result<SphincsPlusSignature>;

    /// A signature of `message` produced with the fault injected.
    fn sign_faulty(&mut self, message: &[u8]) -> Result<SphincsPlusSignature>;
}

/// In-process oracle owning a freshly generated key pair.
pub struct LocalOracle {
    sphincs: SphincsPlus,
    injector: FaultInjector,
    pk: SphincsPlusPublicKey,
    sk: SphincsPlusSecretKey,
    honest: usize,
    faulty: usize,
    closed: bool,
}

impl LocalOracle {
    pub fn new(params: Params) -> Result<Self> {
        let sphincs = SphincsPlus::new(params);
        let (pk, sk) = sphincs.keygen()?;
        Self::from_keys(params, pk, sk)
    }

    pub fn from_keys(params: Params, pk: SphincsPlusPublicKey, sk: SphincsPlusSecretKey) -> Result<Self> {
        Ok(Self {
            sphincs: SphincsPlus::new(params),
            injector: FaultInjector::new(params)?,
            pk,
            sk,
            honest: 0,
            faulty: 0,
            closed: false,
        })
    }

    pub fn honest_count(&self) -> usize {
        self.honest
    }

    pub fn faulty_count(&self) -> usize {
        self.faulty
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Stops answering requests. Further requests fail with [`Error::OracleClosed`].
    pub fn shutdown(&mut self) {
        if !self.closed {
            self.closed = true;
            info!(
                "Oracle stopping: signed correctly {}, signed with fault {}",
                self.honest, self.faulty
            );
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            Err(Error::OracleClosed)
        } else {
            Ok(())
        }
    }
}

impl SigningOracle for LocalOracle {
    fn params(&self) -> &Params {
        self.sphincs.params()
    }

    fn public_key(&self) -> &SphincsPlusPublicKey {
        &self.pk
    }

    fn sign(&mut self, message: &[u8]) -> Result<SphincsPlusSignature> {
        self.ensure_open()?;
        self.honest += 1;
        debug!("honest signature request #{}", self.honest);
        self.sphincs.sign(message, &self.sk)
    }

    fn sign_faulty(&mut self, message: &[u8]) -> Result<SphincsPlusSignature> {
        self.ensure_open()?;
        self.faulty += 1;
        debug!("faulty signature request #{}", self.faulty);
        self.injector.sign_faulty(message, &self.sk)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{HashVariant, ParamSet};

    #[test]
    fn test_local_oracle() {
        let params = ParamSet::Test.params(HashVariant::Simple);
        let mut oracle = LocalOracle::new(params).unwrap();
        let sp = SphincsPlus::new(params);

        let good = oracle.sign(b"hello").unwrap();
        assert!(sp.verify(&good, b"hello", oracle.public_key()));
        let bad = oracle.sign_faulty(b"hello").unwrap();
        assert!(!sp.verify(&bad, b"hello", oracle.public_key()));
        oracle.sign_faulty(b"hello").unwrap();

        assert_eq!(oracle.honest_count(), 1);
        assert_eq!(oracle.faulty_count(), 2);

        oracle.shutdown();
        assert!(oracle.is_closed());
        assert_eq!(oracle.sign(b"hello"), Err(Error::OracleClosed));
        assert_eq!(oracle.sign_faulty(b"hello"), Err(Error::OracleClosed));
        assert_eq!(oracle.honest_count(), 1);
    }
}
