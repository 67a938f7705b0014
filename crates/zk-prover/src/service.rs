//! Request/response boundary for non-core callers
//!
//! `handle_json` accepts the same envelope the web application posts:
//!
//! ```json
//! {"operation": "generate", "accounts": [{"balance": 20000, "salt": "7", "accountType": "individual"}]}
//! {"operation": "verify", "proof": "<base64>", "publicInputs": {...}}
//! ```
//!
//! Failures never fall back to unproven output. Defects surface only as
//! "proof generation failed"; everything else carries enough detail to fix
//! the request.

use chrono::{DateTime, Utc};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::config::ProverConfig;
use crate::error::{ComplianceError, Result};
use crate::keys::CircuitKeys;
use crate::poseidon::PoseidonParams;
use crate::pool::ProverPool;
use crate::proof::{Proof, ProofBundle, ProofMetadata, PublicInputs};
use crate::prover::ComplianceProver;
use crate::types::{Account, LimitTable};
use crate::verifier::ComplianceVerifier;

/// Batch to prove
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    pub accounts: Vec<Account>,
    /// Must equal the configured limits when present
    #[serde(default)]
    pub limit_table: Option<LimitTable>,
}

/// Proof to check
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest {
    /// Base64 of the compressed proof
    pub proof: String,
    pub public_inputs: PublicInputs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    /// The proof is cryptographically valid for the public inputs
    pub valid: bool,
    /// Valid, compliance bit 1 and proven against the configured limits
    pub compliant: bool,
}

/// JSON envelope, tagged by `operation`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "lowercase")]
pub enum ZkpRequest {
    Generate(GenerateRequest),
    Verify(VerifyRequest),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZkpResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub circuit_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proof: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_inputs: Option<PublicInputs>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification_result: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compliant: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ProofMetadata>,
}

impl ZkpResponse {
    fn generated(bundle: ProofBundle) -> Self {
        Self {
            success: true,
            protocol: Some(bundle.protocol),
            circuit_id: Some(bundle.circuit_id),
            proof: Some(bundle.proof),
            public_inputs: Some(bundle.public_inputs),
            timestamp: Some(bundle.timestamp),
            metadata: Some(bundle.metadata),
            ..Self::default()
        }
    }

    fn verified(result: VerifyResponse) -> Self {
        Self {
            success: true,
            verification_result: Some(result.valid),
            compliant: Some(result.compliant),
            ..Self::default()
        }
    }

    fn failed(error: &ComplianceError) -> Self {
        Self {
            success: false,
            error: Some(error.public_message()),
            ..Self::default()
        }
    }
}

/// Proving pool plus inline verifier behind one entry point
pub struct ComplianceService {
    config: ProverConfig,
    pool: ProverPool,
    verifier: ComplianceVerifier,
}

impl ComplianceService {
    /// Build the service, loading keys from `key_dir` or generating them
    ///
    /// Freshly generated keys are written to `key_dir` when one is set.
    #[instrument(skip_all, fields(capacity = config.capacity, bit_width = config.bit_width))]
    pub fn from_config(config: ProverConfig) -> Result<Self> {
        config.validate()?;
        let params = config.circuit_params()?;

        let keys = match &config.key_dir {
            Some(dir) if CircuitKeys::exists(dir) => {
                let keys = CircuitKeys::load(dir)?;
                if keys.params != params {
                    return Err(ComplianceError::Config {
                        reason: format!(
                            "keys in {} were generated for {:?}, configured {:?}",
                            dir.display(),
                            keys.params,
                            params
                        ),
                    });
                }
                keys
            }
            Some(dir) => {
                info!(dir = %dir.display(), "no circuit keys found, running setup");
                let keys = CircuitKeys::setup(params, &PoseidonParams::new(), &mut OsRng)?;
                keys.save(dir)?;
                keys
            }
            None => CircuitKeys::setup(params, &PoseidonParams::new(), &mut OsRng)?,
        };

        let prover = ComplianceProver::from_keys(&keys)?;
        Self::with_prover(config, prover)
    }

    /// Build the service around an existing prover
    pub fn with_prover(config: ProverConfig, prover: ComplianceProver) -> Result<Self> {
        config.validate()?;
        if config.circuit_params()? != prover.params() {
            return Err(ComplianceError::Config {
                reason: format!(
                    "prover compiled for {:?}, configured {:?}",
                    prover.params(),
                    config.circuit_params()?
                ),
            });
        }
        let verifier = prover.verifier()?;
        let pool = ProverPool::new(prover, config.worker_threads)?;
        Ok(Self {
            config,
            pool,
            verifier,
        })
    }

    pub fn config(&self) -> &ProverConfig {
        &self.config
    }

    pub fn verifier(&self) -> &ComplianceVerifier {
        &self.verifier
    }

    /// Prove a batch on the worker pool, honouring the configured timeout
    pub fn generate(&self, request: GenerateRequest) -> Result<ProofBundle> {
        let limits = match request.limit_table {
            Some(requested) if requested != self.config.limits => {
                return Err(ComplianceError::invalid_input(
                    "limitTable",
                    format!("{requested:?}"),
                    format!("the configured limits {:?}", self.config.limits),
                ));
            }
            _ => self.config.limits,
        };
        let job = self.pool.submit(request.accounts, limits)?;
        match self.config.proof_timeout() {
            Some(timeout) => job.wait_timeout(timeout),
            None => job.wait(),
        }
    }

    /// Check a proof inline
    pub fn verify(&self, request: &VerifyRequest) -> Result<VerifyResponse> {
        let proof = Proof::from_base64(&request.proof)?;
        let valid = self.verifier.verify_proof(&proof, &request.public_inputs)?;
        Ok(VerifyResponse {
            valid,
            compliant: valid && request.public_inputs.is_compliant_under(&self.config.limits),
        })
    }

    /// Check a complete proof file
    pub fn verify_bundle(&self, bundle: &ProofBundle) -> Result<VerifyResponse> {
        let valid = self.verifier.verify_bundle(bundle)?;
        Ok(VerifyResponse {
            valid,
            compliant: valid && bundle.public_inputs.is_compliant_under(&self.config.limits),
        })
    }

    pub fn handle(&self, request: ZkpRequest) -> ZkpResponse {
        let result = match request {
            ZkpRequest::Generate(request) => self.generate(request).map(ZkpResponse::generated),
            ZkpRequest::Verify(request) => self.verify(&request).map(ZkpResponse::verified),
        };
        result.unwrap_or_else(|e| {
            if !e.is_defect() {
                warn!(error = %e, "zkp request rejected");
            }
            ZkpResponse::failed(&e)
        })
    }

    /// JSON entry point; always answers with a `ZkpResponse` document
    pub fn handle_json(&self, body: &str) -> String {
        let response = match serde_json::from_str::<ZkpRequest>(body) {
            Ok(request) => self.handle(request),
            Err(e) => {
                warn!(error = %e, "unparseable zkp request");
                ZkpResponse {
                    success: false,
                    error: Some(format!("invalid request: {e}")),
                    ..ZkpResponse::default()
                }
            }
        };
        serde_json::to_string(&response).unwrap_or_else(|_| {
            r#"{"success":false,"error":"response serialization failed"}"#.to_string()
        })
    }

    /// Stop accepting new proof jobs
    pub fn shutdown(&self) {
        self.pool.shutdown();
    }
}
