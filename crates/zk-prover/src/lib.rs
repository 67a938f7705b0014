//! # Balance Compliance ZK-SNARK Prover
//!
//! Zero-knowledge proofs that every account in a batch holds no more than
//! the regulatory ceiling for its account type, without revealing balances.
//!
//! ## Statement
//!
//! For a circuit compiled for `N` account slots and `W`-bit balances, a proof
//! attests that for every slot `i`:
//!
//! - the public commitment equals `Poseidon(tag, balance_i, salt_i)`
//! - `balance_i` decomposes into `W` bits
//! - the private compliance flag is 1 exactly when `balance_i <= limit(type_i)`
//!
//! and that the public compliance bit is the AND of all flags. The per-type
//! limits are public. Each account's type is private to the proof, but the
//! proof file's metadata lists per-type counts; that metadata is informational
//! and not bound to the proof.
//!
//! A bit of 1 only means compliance when `limitsUsed` equals the regulatory
//! table, which [`ComplianceVerifier::verify_compliance`] checks.
//!
//! Proofs are Groth16 over BN254, 128 bytes compressed, and verify in
//! constant time regardless of `N`.
//!
//! ## Example
//!
//! ```rust,ignore
//! use balance_zk_prover::{Account, AccountType, CircuitParams, ComplianceProver, LimitTable};
//!
//! let prover = ComplianceProver::setup(CircuitParams::default(), &mut rand::rngs::OsRng)?;
//! let verifier = prover.verifier()?;
//!
//! let accounts = vec![Account::with_random_salt(20_000, AccountType::Individual)];
//! let bundle = prover.generate(&accounts, &LimitTable::default())?;
//!
//! assert!(verifier.verify_bundle(&bundle)?);
//! assert!(bundle.public_inputs.is_compliant_under(&LimitTable::default()));
//! ```

#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]

pub mod cancel;
pub mod circuits;
pub mod config;
pub mod error;
pub mod field;
pub mod gadgets;
pub mod keys;
pub mod pool;
pub mod poseidon;
pub mod proof;
pub mod prover;
pub mod service;
pub mod types;
pub mod verifier;
pub mod witness;

// Re-exports
pub use cancel::CancellationToken;
pub use config::ProverConfig;
pub use error::{ComplianceError, ProverError, Result, WitnessError};
pub use field::FieldElement;
pub use keys::CircuitKeys;
pub use pool::{ProofJob, ProverPool};
pub use poseidon::PoseidonHasher;
pub use proof::{Proof, ProofBundle, ProofMetadata, PublicInputs, PROTOCOL_ID};
pub use prover::ComplianceProver;
pub use service::{ComplianceService, GenerateRequest, VerifyRequest, VerifyResponse, ZkpRequest, ZkpResponse};
pub use types::{Account, AccountType, CircuitParams, LimitTable, Salt};
pub use verifier::ComplianceVerifier;
pub use witness::{Witness, WitnessBuilder};
