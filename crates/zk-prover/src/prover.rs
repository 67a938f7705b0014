//! ZK-SNARK proof generation

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use ark_bn254::Bn254;
use ark_groth16::{Groth16, ProvingKey};
use ark_relations::r1cs::{ConstraintSynthesizer, ConstraintSystem};
use ark_snark::SNARK;
use chrono::Utc;
use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};
use tracing::{debug, error, info, instrument};

use crate::cancel::CancellationToken;
use crate::circuits::BalanceComplianceCircuit;
use crate::error::{ComplianceError, ProverError, Result};
use crate::field::FieldElement;
use crate::keys::CircuitKeys;
use crate::poseidon::PoseidonHasher;
use crate::proof::{Proof, ProofBundle, ProofMetadata, PublicInputs, PROTOCOL_ID};
use crate::types::{Account, AccountType, CircuitParams, LimitTable, CURRENCY};
use crate::verifier::ComplianceVerifier;
use crate::witness::{Witness, WitnessBuilder};

/// Groth16 prover for one compiled circuit shape
///
/// Immutable after construction. Clones share the proving key, so a prover
/// can be handed to any number of worker threads.
#[derive(Clone)]
pub struct ComplianceProver {
    params: CircuitParams,
    hasher: Arc<PoseidonHasher>,
    proving_key: Arc<ProvingKey<Bn254>>,
    circuit_id: Arc<str>,
}

impl ComplianceProver {
    /// Run a fresh circuit-specific setup and wrap the resulting keys
    pub fn setup<R: RngCore + CryptoRng>(params: CircuitParams, rng: &mut R) -> Result<Self> {
        let hasher = PoseidonHasher::new();
        let keys = CircuitKeys::setup(params, hasher.params(), rng)?;
        Self::with_hasher(&keys, hasher)
    }

    /// Create a prover from previously generated keys
    pub fn from_keys(keys: &CircuitKeys) -> Result<Self> {
        Self::with_hasher(keys, PoseidonHasher::new())
    }

    fn with_hasher(keys: &CircuitKeys, hasher: PoseidonHasher) -> Result<Self> {
        Ok(Self {
            params: keys.params,
            hasher: Arc::new(hasher),
            proving_key: Arc::new(keys.proving_key.clone()),
            circuit_id: keys.circuit_id()?.into(),
        })
    }

    /// Verifier for proofs produced by this prover
    pub fn verifier(&self) -> Result<ComplianceVerifier> {
        ComplianceVerifier::new(self.params, &self.proving_key.vk)
    }

    pub fn params(&self) -> CircuitParams {
        self.params
    }

    pub fn hasher(&self) -> &PoseidonHasher {
        &self.hasher
    }

    pub fn circuit_id(&self) -> &str {
        &self.circuit_id
    }

    /// Validate a batch and derive its private assignment
    pub fn build_witness(
        &self,
        accounts: &[Account],
        limits: &LimitTable,
        cancel: &CancellationToken,
    ) -> Result<Witness> {
        WitnessBuilder::new(self.params, &self.hasher).build(accounts, limits, cancel)
    }

    /// Prove that `witness` satisfies the circuit for `public`
    ///
    /// The assignment is checked against a scratch constraint system first,
    /// so an inconsistent witness fails with `UnsatisfiedConstraints` instead
    /// of producing a proof. Every call draws fresh randomness from the OS.
    #[instrument(skip_all, fields(capacity = self.params.capacity))]
    pub fn prove(
        &self,
        witness: &Witness,
        public: &PublicInputs,
        cancel: &CancellationToken,
    ) -> Result<Proof> {
        self.prove_with_rng(witness, public, cancel, &mut OsRng)
    }

    fn prove_with_rng<R: RngCore + CryptoRng>(
        &self,
        witness: &Witness,
        public: &PublicInputs,
        cancel: &CancellationToken,
        rng: &mut R,
    ) -> Result<Proof> {
        public.validate_shape(&self.params)?;
        if witness.params() != self.params {
            return Err(ProverError::Synthesis(format!(
                "witness built for {:?}, prover compiled for {:?}",
                witness.params(),
                self.params
            ))
            .into());
        }
        cancel.check()?;

        let circuit = BalanceComplianceCircuit::assigned(self.hasher.params(), public, witness)
            .with_cancellation(cancel);

        // Scratch synthesis; Groth16::prove synthesizes the circuit again, so
        // every proof pays for two synthesis passes.
        let start = Instant::now();
        let cs = ConstraintSystem::<FieldElement>::new_ref();
        circuit
            .generate_constraints(cs.clone())
            .map_err(|e| synthesis_failure(e, cancel))?;
        if !cs.is_satisfied().map_err(|e| synthesis_failure(e, cancel))? {
            let constraint = cs
                .which_is_unsatisfied()
                .map_err(|e| synthesis_failure(e, cancel))?
                .unwrap_or_else(|| "unknown".to_string());
            return Err(ProverError::UnsatisfiedConstraints { constraint }.into());
        }
        debug!(
            constraints = cs.num_constraints(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "witness satisfies the circuit"
        );

        cancel.check()?;
        let inner = Groth16::<Bn254>::prove(&self.proving_key, circuit, rng)
            .map_err(|e| synthesis_failure(e, cancel))?;
        Ok(Proof::new(inner))
    }

    /// Generate a proof file for `accounts` without cancellation
    pub fn generate(&self, accounts: &[Account], limits: &LimitTable) -> Result<ProofBundle> {
        self.generate_with_cancel(accounts, limits, &CancellationToken::new())
    }

    /// Full generation cycle: witness building, proving, packaging
    ///
    /// Compliance violations are reported through the compliance bit; an
    /// `Err` means the request was rejected, cancelled or hit a defect.
    #[instrument(skip_all, fields(accounts = accounts.len(), capacity = self.params.capacity, bit_width = self.params.bit_width))]
    pub fn generate_with_cancel(
        &self,
        accounts: &[Account],
        limits: &LimitTable,
        cancel: &CancellationToken,
    ) -> Result<ProofBundle> {
        let start = Instant::now();

        info!(stage = "witness_building", "generating compliance proof");
        let witness = self
            .build_witness(accounts, limits, cancel)
            .map_err(log_defect)?;
        let public = witness.public_inputs();
        let witness_time = start.elapsed();

        info!(stage = "proving", witness_ms = witness_time.as_millis() as u64);
        let proof = self
            .prove(&witness, &public, cancel)
            .map_err(log_defect)?;
        drop(witness);

        let processing_time_ms = start.elapsed().as_millis() as u64;
        info!(
            stage = "done",
            compliance_bit = public.compliance_bit,
            processing_time_ms,
            "proof generated"
        );

        Ok(ProofBundle {
            protocol: PROTOCOL_ID.to_string(),
            circuit_id: self.circuit_id.to_string(),
            proof: proof.to_base64()?,
            public_inputs: public,
            timestamp: Utc::now(),
            metadata: ProofMetadata {
                accounts_verified: accounts.len(),
                capacity: self.params.capacity,
                bit_width: self.params.bit_width,
                account_types: count_types(accounts),
                processing_time_ms,
                currency: CURRENCY.to_string(),
            },
        })
    }
}

fn count_types(accounts: &[Account]) -> BTreeMap<AccountType, usize> {
    let mut counts = BTreeMap::new();
    for account in accounts {
        *counts.entry(account.account_type).or_insert(0) += 1;
    }
    counts
}

/// Cancellation aborts synthesis with a generic error; report it as such
fn synthesis_failure(
    e: ark_relations::r1cs::SynthesisError,
    cancel: &CancellationToken,
) -> ComplianceError {
    if cancel.is_cancelled() {
        ComplianceError::Cancelled
    } else {
        e.into()
    }
}

fn log_defect(e: ComplianceError) -> ComplianceError {
    if e.is_defect() {
        error!(error = %e, "proof generation defect");
    }
    e
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Salt;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::sync::OnceLock;

    fn prover() -> &'static ComplianceProver {
        static PROVER: OnceLock<ComplianceProver> = OnceLock::new();
        PROVER.get_or_init(|| {
            let params = CircuitParams::new(2, 20).unwrap();
            ComplianceProver::setup(params, &mut StdRng::seed_from_u64(7)).unwrap()
        })
    }

    fn salt(n: u64) -> Salt {
        Salt::from_u64(n).unwrap()
    }

    #[test]
    fn test_generate_compliant_batch() {
        let accounts = vec![
            Account::new(20_000, salt(1), AccountType::Individual),
            Account::new(70_000, salt(2), AccountType::Association),
        ];
        let bundle = prover().generate(&accounts, &LimitTable::default()).unwrap();

        assert_eq!(bundle.protocol, PROTOCOL_ID);
        assert_eq!(bundle.circuit_id, prover().circuit_id());
        assert_eq!(bundle.public_inputs.compliance_bit, 1);
        assert_eq!(bundle.metadata.accounts_verified, 2);
        assert_eq!(bundle.metadata.account_types[&AccountType::Association], 1);
        assert_eq!(bundle.decode_proof().unwrap().to_bytes().unwrap().len(), Proof::COMPRESSED_SIZE);
    }

    #[test]
    fn test_forged_bit_fails_fast() {
        let accounts = vec![Account::new(30_000, salt(3), AccountType::Individual)];
        let cancel = CancellationToken::new();
        let witness = prover()
            .build_witness(&accounts, &LimitTable::default(), &cancel)
            .unwrap();
        let mut public = witness.public_inputs();
        assert_eq!(public.compliance_bit, 0);

        public.compliance_bit = 1;
        let err = prover().prove(&witness, &public, &cancel).unwrap_err();
        assert!(matches!(
            err,
            ComplianceError::Prover(ProverError::UnsatisfiedConstraints { .. })
        ));
        assert!(err.is_defect());
        assert_eq!(err.public_message(), crate::error::OPAQUE_GENERATION_FAILURE);
    }

    #[test]
    fn test_wrong_shape_is_rejected() {
        let accounts = vec![Account::new(1, salt(4), AccountType::Individual)];
        let cancel = CancellationToken::new();
        let witness = prover()
            .build_witness(&accounts, &LimitTable::default(), &cancel)
            .unwrap();
        let mut public = witness.public_inputs();
        public.commitments.pop();
        assert!(matches!(
            prover().prove(&witness, &public, &cancel),
            Err(ComplianceError::MalformedProof { .. })
        ));
    }

    #[test]
    fn test_cancelled_before_proving() {
        let accounts = vec![Account::new(1, salt(5), AccountType::Individual)];
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert!(matches!(
            prover().generate_with_cancel(&accounts, &LimitTable::default(), &cancel),
            Err(ComplianceError::Cancelled)
        ));
    }

    #[test]
    fn test_oversized_batch_is_invalid_input() {
        let accounts: Vec<_> = (1..=3)
            .map(|i| Account::new(i, salt(i), AccountType::Individual))
            .collect();
        assert!(matches!(
            prover().generate(&accounts, &LimitTable::default()),
            Err(ComplianceError::InvalidInput { .. })
        ));
    }
}
