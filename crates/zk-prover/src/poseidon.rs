//! Poseidon sponge and balance commitments
//!
//! Parameters:
//! - Field: BN254 scalar field (Fr)
//! - Width: t = 3 (rate 2, capacity 1)
//! - Full rounds: 8 (4 at start, 4 at end)
//! - Partial rounds: 57
//! - S-box: x^5
//!
//! Round constants and the MDS matrix come from the Grain LFSR generation in
//! `ark-crypto-primitives`. The same [`PoseidonParams`] drive the in-circuit
//! gadget in [`crate::gadgets::poseidon`].

use ark_crypto_primitives::sponge::poseidon::{
    find_poseidon_ark_and_mds, PoseidonConfig, PoseidonSponge,
};
use ark_crypto_primitives::sponge::{CryptographicSponge, FieldBasedCryptographicSponge};
use ark_ff::PrimeField;
use num_bigint::BigUint;

use crate::error::Result;
use crate::field::{fr_from_biguint, FieldElement};

/// Number of full rounds
pub const FULL_ROUNDS: usize = 8;

/// Number of partial rounds
pub const PARTIAL_ROUNDS: usize = 57;

/// Sponge rate
pub const RATE: usize = 2;

/// Sponge capacity
pub const CAPACITY: usize = 1;

/// S-box exponent
pub const ALPHA: u64 = 5;

/// Leading absorbed element separating balance commitments from other uses
pub const COMMIT_DOMAIN: u64 = 0x62616c;

/// Poseidon configuration for the t = 3 sponge
#[derive(Clone, Debug)]
pub struct PoseidonParams {
    config: PoseidonConfig<FieldElement>,
}

impl Default for PoseidonParams {
    fn default() -> Self {
        Self::new()
    }
}

impl PoseidonParams {
    /// Generate the parameter set
    pub fn new() -> Self {
        let (ark, mds) = find_poseidon_ark_and_mds::<FieldElement>(
            u64::from(FieldElement::MODULUS_BIT_SIZE),
            RATE,
            FULL_ROUNDS as u64,
            PARTIAL_ROUNDS as u64,
            0,
        );
        let config = PoseidonConfig::new(
            FULL_ROUNDS,
            PARTIAL_ROUNDS,
            ALPHA,
            mds,
            ark,
            RATE,
            CAPACITY,
        );
        Self { config }
    }

    /// Underlying sponge configuration
    pub fn config(&self) -> &PoseidonConfig<FieldElement> {
        &self.config
    }
}

/// Poseidon hasher used for balance commitments
///
/// Construct one per prover or verifier context and share it by reference.
#[derive(Clone, Debug, Default)]
pub struct PoseidonHasher {
    params: PoseidonParams,
}

impl PoseidonHasher {
    /// Create a new Poseidon hasher
    pub fn new() -> Self {
        Self {
            params: PoseidonParams::new(),
        }
    }

    /// Wrap an existing parameter set
    pub fn with_params(params: PoseidonParams) -> Self {
        Self { params }
    }

    /// Parameters backing this hasher
    pub fn params(&self) -> &PoseidonParams {
        &self.params
    }

    /// Absorb `inputs` and squeeze one element
    ///
    /// Same construction as the `crh::poseidon` CRH, which the circuit uses.
    pub fn hash(&self, inputs: &[FieldElement]) -> FieldElement {
        let mut sponge = PoseidonSponge::new(self.params.config());
        sponge.absorb(&inputs);
        sponge.squeeze_native_field_elements(1)[0]
    }

    /// Commitment to a balance under a blinding salt
    pub fn commit(&self, balance: FieldElement, salt: FieldElement) -> FieldElement {
        self.hash(&[FieldElement::from(COMMIT_DOMAIN), balance, salt])
    }

    /// Checked commitment over raw integers; values `>= r` are rejected
    pub fn commit_raw(&self, balance: &BigUint, salt: &BigUint) -> Result<FieldElement> {
        let balance = fr_from_biguint(balance, "balance")?;
        let salt = fr_from_biguint(salt, "salt")?;
        Ok(self.commit(balance, salt))
    }
}
