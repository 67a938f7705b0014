//! ZK-SNARK proof verification

use std::sync::Arc;

use ark_bn254::Bn254;
use ark_groth16::{Groth16, PreparedVerifyingKey, VerifyingKey};
use ark_snark::SNARK;
use tracing::{debug, instrument};

use crate::error::{ComplianceError, Result};
use crate::keys::{circuit_id, CircuitKeys};
use crate::proof::{Proof, ProofBundle, PublicInputs, PROTOCOL_ID};
use crate::types::{CircuitParams, LimitTable};

/// Groth16 verifier for one compiled circuit shape
///
/// Holds only the prepared verifying key. Verification is a pure function of
/// the proof and the public inputs, so one verifier can serve any number of
/// threads.
#[derive(Clone)]
pub struct ComplianceVerifier {
    params: CircuitParams,
    prepared_vk: Arc<PreparedVerifyingKey<Bn254>>,
    circuit_id: Arc<str>,
}

impl ComplianceVerifier {
    /// Prepare a verifying key for a circuit shape
    pub fn new(params: CircuitParams, verifying_key: &VerifyingKey<Bn254>) -> Result<Self> {
        params.validate()?;
        if verifying_key.gamma_abc_g1.len() != params.num_public_inputs() + 1 {
            return Err(ComplianceError::Setup {
                reason: format!(
                    "verifying key does not match a circuit with {} public inputs",
                    params.num_public_inputs()
                ),
            });
        }
        let prepared_vk = Groth16::<Bn254>::process_vk(verifying_key).map_err(|e| {
            ComplianceError::Setup {
                reason: e.to_string(),
            }
        })?;

        Ok(Self {
            params,
            prepared_vk: Arc::new(prepared_vk),
            circuit_id: circuit_id(&params, verifying_key)?.into(),
        })
    }

    pub fn from_keys(keys: &CircuitKeys) -> Result<Self> {
        Self::new(keys.params, &keys.verifying_key)
    }

    pub fn params(&self) -> CircuitParams {
        self.params
    }

    pub fn circuit_id(&self) -> &str {
        &self.circuit_id
    }

    /// Check compressed proof bytes against public inputs
    ///
    /// `Ok(false)` means the proof parsed but does not convince the verifier.
    /// `MalformedProof` means the bytes or the public inputs do not have the
    /// expected structure at all.
    pub fn verify(&self, proof_bytes: &[u8], public: &PublicInputs) -> Result<bool> {
        let proof = Proof::from_bytes(proof_bytes)?;
        self.verify_proof(&proof, public)
    }

    /// Check a decoded proof against public inputs
    #[instrument(skip_all, fields(compliance_bit = public.compliance_bit))]
    pub fn verify_proof(&self, proof: &Proof, public: &PublicInputs) -> Result<bool> {
        public.validate_shape(&self.params)?;
        let inputs = public.to_field_elements();

        let valid = Groth16::<Bn254>::verify_with_processed_vk(&self.prepared_vk, &inputs, &proof.inner)
            .map_err(|e| ComplianceError::malformed(e.to_string()))?;

        debug!(valid, "proof verified");
        Ok(valid)
    }

    /// Valid proof whose public compliance bit is 1 under the `expected` limits
    pub fn verify_compliance(
        &self,
        proof_bytes: &[u8],
        public: &PublicInputs,
        expected: &LimitTable,
    ) -> Result<bool> {
        Ok(self.verify(proof_bytes, public)? && public.is_compliant_under(expected))
    }

    /// Check a proof file, including its protocol and circuit identifiers
    pub fn verify_bundle(&self, bundle: &ProofBundle) -> Result<bool> {
        if bundle.protocol != PROTOCOL_ID {
            return Err(ComplianceError::UnsupportedProtocol {
                expected: PROTOCOL_ID.to_string(),
                found: bundle.protocol.clone(),
            });
        }
        if bundle.circuit_id != *self.circuit_id {
            return Err(ComplianceError::UnsupportedProtocol {
                expected: format!("circuit {}", self.circuit_id),
                found: format!("circuit {}", bundle.circuit_id),
            });
        }
        let proof = bundle.decode_proof()?;
        self.verify_proof(&proof, &bundle.public_inputs)
    }

    /// Parse and check a proof file
    pub fn verify_bundle_json(&self, json: &str) -> Result<bool> {
        self.verify_bundle(&ProofBundle::from_json(json)?)
    }
}
