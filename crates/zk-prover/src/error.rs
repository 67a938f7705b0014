//! Error types for the balance compliance prover

use thiserror::Error;

/// Result type alias for prover and verifier operations
pub type Result<T> = std::result::Result<T, ComplianceError>;

/// Message surfaced to callers when proof generation hits an internal defect.
pub const OPAQUE_GENERATION_FAILURE: &str = "proof generation failed";

/// Errors that can occur during witness building, proving and verification
#[derive(Error, Debug)]
pub enum ComplianceError {
    /// Caller supplied out-of-range or malformed account data
    #[error("Invalid input: {field} = {value} (expected {expected})")]
    InvalidInput {
        field: String,
        value: String,
        expected: String,
    },

    /// Internal inconsistency while building the witness
    #[error("Witness error: {0}")]
    Witness(#[from] WitnessError),

    /// Constraint system rejected the witness
    #[error("Prover error: {0}")]
    Prover(#[from] ProverError),

    /// Proof or public inputs cannot be parsed into the expected structure
    #[error("Malformed proof: {reason}")]
    MalformedProof { reason: String },

    /// Proof was produced for another protocol or circuit version
    #[error("Unsupported protocol: expected {expected}, found {found}")]
    UnsupportedProtocol { expected: String, found: String },

    /// No prover worker is available to run the request
    #[error("Prover unavailable: {reason}")]
    ProverUnavailable { reason: String },

    /// The attempt was abandoned through its cancellation token
    #[error("Proof generation cancelled")]
    Cancelled,

    /// Key generation or key loading failed
    #[error("Setup error: {reason}")]
    Setup { reason: String },

    /// Invalid configuration
    #[error("Configuration error: {reason}")]
    Config { reason: String },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures while assembling the private assignment
///
/// Messages carry account indices and static descriptions only.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WitnessError {
    #[error("constraint violation at account {account}: {reason}")]
    ConstraintViolation { account: usize, reason: &'static str },
}

/// Failures inside the proof system
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProverError {
    /// The witness does not satisfy the compiled constraint system
    #[error("unsatisfied constraints (first failing: {constraint})")]
    UnsatisfiedConstraints { constraint: String },

    /// Constraint synthesis or the Groth16 prover returned an error
    #[error("synthesis failed: {0}")]
    Synthesis(String),
}

impl ComplianceError {
    /// Shorthand for an `InvalidInput` error
    pub fn invalid_input(
        field: impl Into<String>,
        value: impl ToString,
        expected: impl Into<String>,
    ) -> Self {
        Self::InvalidInput {
            field: field.into(),
            value: value.to_string(),
            expected: expected.into(),
        }
    }

    /// Shorthand for a `MalformedProof` error
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedProof {
            reason: reason.into(),
        }
    }

    /// Whether this error indicates a bug rather than a bad request
    pub fn is_defect(&self) -> bool {
        matches!(self, Self::Witness(_) | Self::Prover(_))
    }

    /// Message safe to return to an external caller
    pub fn public_message(&self) -> String {
        if self.is_defect() {
            OPAQUE_GENERATION_FAILURE.to_string()
        } else {
            self.to_string()
        }
    }
}

impl From<ark_relations::r1cs::SynthesisError> for ProverError {
    fn from(e: ark_relations::r1cs::SynthesisError) -> Self {
        Self::Synthesis(e.to_string())
    }
}

impl From<ark_relations::r1cs::SynthesisError> for ComplianceError {
    fn from(e: ark_relations::r1cs::SynthesisError) -> Self {
        Self::Prover(e.into())
    }
}
