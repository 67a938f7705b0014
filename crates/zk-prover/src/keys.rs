//! Groth16 key generation and persistence
//!
//! Keys on disk:
//!
//! ```text
//! <dir>/proving_key.bin    ark-serialize, compressed
//! <dir>/verifying_key.bin  ark-serialize, compressed
//! <dir>/circuit.json       circuit params and fingerprint
//! ```

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use std::time::Instant;

use ark_bn254::Bn254;
use ark_groth16::{Groth16, ProvingKey, VerifyingKey};
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use ark_snark::SNARK;
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::circuits::BalanceComplianceCircuit;
use crate::error::{ComplianceError, Result};
use crate::poseidon::PoseidonParams;
use crate::proof::PROTOCOL_ID;
use crate::types::CircuitParams;

const PROVING_KEY_FILE: &str = "proving_key.bin";
const VERIFYING_KEY_FILE: &str = "verifying_key.bin";
const MANIFEST_FILE: &str = "circuit.json";

/// Contents of `circuit.json`
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KeyManifest {
    protocol: String,
    circuit_id: String,
    params: CircuitParams,
}

/// Proving and verifying keys for one circuit shape
#[derive(Clone)]
pub struct CircuitKeys {
    pub params: CircuitParams,
    pub proving_key: ProvingKey<Bn254>,
    pub verifying_key: VerifyingKey<Bn254>,
}

impl CircuitKeys {
    /// Circuit-specific Groth16 setup
    ///
    /// The toxic waste comes from `rng` and is discarded afterwards. This is a
    /// single-party setup suitable for development; production keys should
    /// come from a ceremony and be loaded with [`CircuitKeys::load`].
    #[instrument(skip_all, fields(capacity = params.capacity, bit_width = params.bit_width))]
    pub fn setup<R: RngCore + CryptoRng>(
        params: CircuitParams,
        poseidon: &PoseidonParams,
        rng: &mut R,
    ) -> Result<Self> {
        params.validate()?;
        let start = Instant::now();

        let circuit = BalanceComplianceCircuit::blank(params, poseidon);
        let (proving_key, verifying_key) = Groth16::<Bn254>::circuit_specific_setup(circuit, rng)
            .map_err(|e| ComplianceError::Setup {
                reason: e.to_string(),
            })?;

        info!(elapsed_ms = start.elapsed().as_millis() as u64, "circuit keys generated");

        Ok(Self {
            params,
            proving_key,
            verifying_key,
        })
    }

    /// Hex BLAKE3 fingerprint over protocol, params and verifying key
    pub fn circuit_id(&self) -> Result<String> {
        circuit_id(&self.params, &self.verifying_key)
    }

    /// Whether `dir` holds a complete key set
    pub fn exists(dir: impl AsRef<Path>) -> bool {
        let dir = dir.as_ref();
        [PROVING_KEY_FILE, VERIFYING_KEY_FILE, MANIFEST_FILE]
            .iter()
            .all(|name| dir.join(name).is_file())
    }

    /// Write the key set into `dir`, creating it if needed
    #[instrument(skip(self, dir), fields(dir = %dir.as_ref().display()))]
    pub fn save(&self, dir: impl AsRef<Path>) -> Result<()> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;

        let mut writer = BufWriter::new(File::create(dir.join(PROVING_KEY_FILE))?);
        self.proving_key
            .serialize_compressed(&mut writer)
            .map_err(setup_error)?;
        writer.flush()?;

        let mut writer = BufWriter::new(File::create(dir.join(VERIFYING_KEY_FILE))?);
        self.verifying_key
            .serialize_compressed(&mut writer)
            .map_err(setup_error)?;
        writer.flush()?;

        let manifest = KeyManifest {
            protocol: PROTOCOL_ID.to_string(),
            circuit_id: self.circuit_id()?,
            params: self.params,
        };
        fs::write(dir.join(MANIFEST_FILE), serde_json::to_string_pretty(&manifest)?)?;

        debug!("circuit keys saved");
        Ok(())
    }

    /// Load a key set written by [`CircuitKeys::save`]
    ///
    /// Fails with `Setup` if the files disagree with each other.
    #[instrument(skip_all, fields(dir = %dir.as_ref().display()))]
    pub fn load(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();

        let manifest: KeyManifest =
            serde_json::from_str(&fs::read_to_string(dir.join(MANIFEST_FILE))?)?;
        if manifest.protocol != PROTOCOL_ID {
            return Err(ComplianceError::UnsupportedProtocol {
                expected: PROTOCOL_ID.to_string(),
                found: manifest.protocol,
            });
        }
        manifest.params.validate()?;

        let reader = BufReader::new(File::open(dir.join(VERIFYING_KEY_FILE))?);
        let verifying_key =
            VerifyingKey::<Bn254>::deserialize_compressed(reader).map_err(setup_error)?;
        let reader = BufReader::new(File::open(dir.join(PROVING_KEY_FILE))?);
        let proving_key =
            ProvingKey::<Bn254>::deserialize_compressed(reader).map_err(setup_error)?;

        if proving_key.vk != verifying_key {
            return Err(ComplianceError::Setup {
                reason: "proving key does not match verifying key".into(),
            });
        }
        if verifying_key.gamma_abc_g1.len() != manifest.params.num_public_inputs() + 1 {
            return Err(ComplianceError::Setup {
                reason: format!(
                    "verifying key expects {} public inputs, circuit has {}",
                    verifying_key.gamma_abc_g1.len().saturating_sub(1),
                    manifest.params.num_public_inputs()
                ),
            });
        }

        let keys = Self {
            params: manifest.params,
            proving_key,
            verifying_key,
        };
        let circuit_id = keys.circuit_id()?;
        if circuit_id != manifest.circuit_id {
            return Err(ComplianceError::Setup {
                reason: format!(
                    "circuit id mismatch: manifest {}, keys {circuit_id}",
                    manifest.circuit_id
                ),
            });
        }

        info!(circuit_id = %circuit_id, "circuit keys loaded");
        Ok(keys)
    }
}

/// Fingerprint used to match proof files with verifying keys
pub fn circuit_id(params: &CircuitParams, verifying_key: &VerifyingKey<Bn254>) -> Result<String> {
    let mut vk_bytes = Vec::new();
    verifying_key
        .serialize_compressed(&mut vk_bytes)
        .map_err(setup_error)?;

    let mut hasher = blake3::Hasher::new();
    hasher.update(PROTOCOL_ID.as_bytes());
    hasher.update(&(params.capacity as u64).to_le_bytes());
    hasher.update(&(params.bit_width as u64).to_le_bytes());
    hasher.update(&vk_bytes);
    Ok(hasher.finalize().to_hex().to_string())
}

fn setup_error(e: ark_serialize::SerializationError) -> ComplianceError {
    ComplianceError::Setup {
        reason: e.to_string(),
    }
}
