//! Poseidon commitment gadget
//!
//! Wraps the `crh::poseidon` CRH gadget over the shared [`PoseidonParams`].
//! Round constants and the MDS matrix enter as constants, so only the S-boxes
//! cost constraints.

use ark_crypto_primitives::crh::poseidon::constraints::{CRHGadget, CRHParametersVar};
use ark_crypto_primitives::crh::CRHSchemeGadget;
use ark_r1cs_std::{fields::fp::FpVar, prelude::*};
use ark_relations::r1cs::{ConstraintSystemRef, SynthesisError};

use crate::field::FieldElement;
use crate::poseidon::{PoseidonParams, COMMIT_DOMAIN};

/// Poseidon commitment gadget for circuits
pub struct PoseidonGadget {
    params: CRHParametersVar<FieldElement>,
}

impl PoseidonGadget {
    pub fn new(
        cs: ConstraintSystemRef<FieldElement>,
        params: &PoseidonParams,
    ) -> Result<Self, SynthesisError> {
        let params = CRHParametersVar::new_constant(cs, params.config())?;
        Ok(Self { params })
    }

    /// In-circuit balance commitment, matching [`crate::poseidon::PoseidonHasher::commit`]
    pub fn commit(
        &self,
        balance: &FpVar<FieldElement>,
        salt: &FpVar<FieldElement>,
    ) -> Result<FpVar<FieldElement>, SynthesisError> {
        let inputs = [
            FpVar::constant(FieldElement::from(COMMIT_DOMAIN)),
            balance.clone(),
            salt.clone(),
        ];
        CRHGadget::<FieldElement>::evaluate(&self.params, &inputs)
    }
}
