//! Bit-decomposition range gadget
//!
//! A value is proven to lie in `[0, 2^width)` by allocating `width` boolean
//! witnesses and using their weighted sum in place of the value. Booleanity
//! costs one constraint per bit; the recomposition itself is a linear
//! combination and costs nothing until it is constrained against something.

use ark_ff::{Field, One};
use ark_r1cs_std::{fields::fp::FpVar, prelude::*};
use ark_relations::r1cs::{ConstraintSystemRef, SynthesisError};

use crate::field::FieldElement;

/// Allocate `width` boolean witnesses, little-endian
///
/// `bits` is `None` when synthesizing without an assignment (key setup).
pub fn alloc_bits(
    cs: ConstraintSystemRef<FieldElement>,
    bits: Option<&[bool]>,
    width: usize,
) -> Result<Vec<Boolean<FieldElement>>, SynthesisError> {
    if let Some(bits) = bits {
        if bits.len() != width {
            return Err(SynthesisError::Unsatisfiable);
        }
    }

    (0..width)
        .map(|i| {
            Boolean::new_witness(cs.clone(), || {
                bits.map(|b| b[i]).ok_or(SynthesisError::AssignmentMissing)
            })
        })
        .collect()
}

/// `Σ bit_i * 2^i`
pub fn recompose(bits: &[Boolean<FieldElement>]) -> FpVar<FieldElement> {
    let mut acc = FpVar::zero();
    let mut coeff = FieldElement::one();
    for bit in bits {
        acc += FpVar::from(bit.clone()) * coeff;
        coeff.double_in_place();
    }
    acc
}

/// Little-endian bits of `value`, truncated to `width`
pub fn to_bits_le(value: u64, width: usize) -> Vec<bool> {
    (0..width).map(|i| i < 64 && (value >> i) & 1 == 1).collect()
}

/// Whether `value < 2^width`
pub fn fits_in_bits(value: u64, width: usize) -> bool {
    width >= 64 || value >> width == 0
}
