//! Proof types and the proof file format

use std::collections::BTreeMap;

use ark_bn254::Bn254;
use ark_groth16::Proof as Groth16Proof;
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ComplianceError, Result};
use crate::field::{serde_fr_vec, FieldElement};
use crate::types::{AccountType, CircuitParams, LimitTable};

/// Protocol identifier stamped into every proof file
pub const PROTOCOL_ID: &str = "groth16-bn254/poseidon-balance-bound/v1";

/// A Groth16 proof for the BN254 curve
#[derive(Clone, Debug, PartialEq)]
pub struct Proof {
    /// The underlying arkworks proof
    pub inner: Groth16Proof<Bn254>,
}

impl Proof {
    /// Compressed size: two G1 points and one G2 point
    pub const COMPRESSED_SIZE: usize = 32 + 64 + 32;

    /// Create from arkworks proof
    pub fn new(inner: Groth16Proof<Bn254>) -> Self {
        Self { inner }
    }

    /// Serialize to compressed bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut bytes = Vec::with_capacity(Self::COMPRESSED_SIZE);
        self.inner
            .serialize_compressed(&mut bytes)
            .map_err(|e| ComplianceError::malformed(e.to_string()))?;
        Ok(bytes)
    }

    /// Parse exactly one compressed proof; points are validated on curve
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != Self::COMPRESSED_SIZE {
            return Err(ComplianceError::malformed(format!(
                "expected {} proof bytes, got {}",
                Self::COMPRESSED_SIZE,
                bytes.len()
            )));
        }
        let inner = Groth16Proof::deserialize_compressed(bytes)
            .map_err(|e| ComplianceError::malformed(format!("invalid proof encoding: {e}")))?;
        Ok(Self { inner })
    }

    /// Convert to hex string
    pub fn to_hex(&self) -> Result<String> {
        Ok(hex::encode(self.to_bytes()?))
    }

    /// Convert from hex string
    pub fn from_hex(hex_str: &str) -> Result<Self> {
        let trimmed = hex_str.trim().trim_start_matches("0x");
        let bytes = hex::decode(trimmed)
            .map_err(|e| ComplianceError::malformed(format!("invalid hex: {e}")))?;
        Self::from_bytes(&bytes)
    }

    /// Convert to base64 string
    pub fn to_base64(&self) -> Result<String> {
        Ok(BASE64.encode(self.to_bytes()?))
    }

    /// Convert from base64 string
    pub fn from_base64(text: &str) -> Result<Self> {
        let bytes = BASE64
            .decode(text.trim())
            .map_err(|e| ComplianceError::malformed(format!("invalid base64: {e}")))?;
        Self::from_bytes(&bytes)
    }
}

/// Values bound into a proof and visible to every verifier
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicInputs {
    /// One commitment per account slot, padding included
    #[serde(with = "serde_fr_vec")]
    pub commitments: Vec<FieldElement>,
    /// 1 iff every account in the batch is within its limit
    pub compliance_bit: u8,
    /// Per-type limits the batch was checked against
    pub limits_used: LimitTable,
}

impl PublicInputs {
    pub fn is_compliant(&self) -> bool {
        self.compliance_bit == 1
    }

    /// Compliance bit is 1 and the proof was made against `expected`
    ///
    /// The limits are ordinary public inputs, so a bit of 1 under a table the
    /// verifier does not recognise says nothing about regulatory compliance.
    pub fn is_compliant_under(&self, expected: &LimitTable) -> bool {
        self.is_compliant() && self.limits_used == *expected
    }

    /// Check the shape against a compiled circuit
    pub fn validate_shape(&self, params: &CircuitParams) -> Result<()> {
        if self.commitments.len() != params.capacity {
            return Err(ComplianceError::malformed(format!(
                "expected {} commitments, got {}",
                params.capacity,
                self.commitments.len()
            )));
        }
        if self.compliance_bit > 1 {
            return Err(ComplianceError::malformed(format!(
                "compliance bit must be 0 or 1, got {}",
                self.compliance_bit
            )));
        }
        if self.limits_used.validate(params.bit_width).is_err() {
            return Err(ComplianceError::malformed(format!(
                "limits exceed the {}-bit circuit range",
                params.bit_width
            )));
        }
        Ok(())
    }

    /// Field elements in circuit allocation order: limits, commitments, bit
    pub fn to_field_elements(&self) -> Vec<FieldElement> {
        let mut elements = Vec::with_capacity(3 + self.commitments.len() + 1);
        elements.extend(self.limits_used.to_field_elements());
        elements.extend(self.commitments.iter().copied());
        elements.push(FieldElement::from(u64::from(self.compliance_bit)));
        elements
    }
}

/// Non-cryptographic context shipped alongside a proof
///
/// Not bound to the proof. `account_types` discloses how many accounts of
/// each type the batch holds.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProofMetadata {
    /// Caller-supplied accounts, excluding padding
    pub accounts_verified: usize,
    pub capacity: usize,
    pub bit_width: usize,
    /// Number of accounts per type
    pub account_types: BTreeMap<AccountType, usize>,
    pub processing_time_ms: u64,
    pub currency: String,
}

/// The proof file: everything a verifier needs besides the verifying key
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProofBundle {
    /// Protocol identifier, see [`PROTOCOL_ID`]
    pub protocol: String,
    /// Fingerprint of the circuit and verifying key
    pub circuit_id: String,
    /// Base64 of the compressed proof
    pub proof: String,
    pub public_inputs: PublicInputs,
    pub timestamp: DateTime<Utc>,
    pub metadata: ProofMetadata,
}

impl ProofBundle {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse a proof file; structural failures are `MalformedProof`
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| ComplianceError::malformed(format!("invalid proof file: {e}")))
    }

    /// Decode the embedded proof bytes
    pub fn decode_proof(&self) -> Result<Proof> {
        Proof::from_base64(&self.proof)
    }
}
