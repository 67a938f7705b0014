//! Balance compliance circuit
//!
//! Public inputs, in allocation order:
//! 1. the three type limits (individual, association, large condominium)
//! 2. one Poseidon commitment per account slot
//! 3. the aggregate compliance bit
//!
//! Every account block proves that its commitment opens to a W-bit balance,
//! selects its limit through a private one-hot type selector, and binds a
//! private flag to the comparison: with `slack` restricted to W bits,
//!
//! ```text
//! flag = 1  =>  slack = limit - balance       (satisfiable iff balance <= limit)
//! flag = 0  =>  slack = balance - limit - 1   (satisfiable iff balance >  limit)
//! ```
//!
//! so no assignment can claim compliance for an account over its limit. The
//! compliance bit is the AND of all flags.

use ark_r1cs_std::{fields::fp::FpVar, prelude::*};
use ark_relations::r1cs::{ConstraintSynthesizer, ConstraintSystemRef, SynthesisError};

use crate::cancel::CancellationToken;
use crate::field::FieldElement;
use crate::gadgets::{alloc_bits, recompose, PoseidonGadget};
use crate::poseidon::PoseidonParams;
use crate::proof::PublicInputs;
use crate::types::CircuitParams;
use crate::witness::{AccountWitness, Witness};

/// Batch balance-bound circuit
///
/// Without an assignment the circuit only fixes the constraint structure,
/// which is what key generation needs.
#[derive(Clone, Copy)]
pub struct BalanceComplianceCircuit<'a> {
    params: CircuitParams,
    poseidon: &'a PoseidonParams,
    public: Option<&'a PublicInputs>,
    witness: Option<&'a Witness>,
    cancel: Option<&'a CancellationToken>,
}

impl<'a> BalanceComplianceCircuit<'a> {
    /// Structure-only circuit for key generation
    pub fn blank(params: CircuitParams, poseidon: &'a PoseidonParams) -> Self {
        Self {
            params,
            poseidon,
            public: None,
            witness: None,
            cancel: None,
        }
    }

    /// Fully assigned circuit for proving
    pub fn assigned(
        poseidon: &'a PoseidonParams,
        public: &'a PublicInputs,
        witness: &'a Witness,
    ) -> Self {
        Self {
            params: witness.params(),
            poseidon,
            public: Some(public),
            witness: Some(witness),
            cancel: None,
        }
    }

    /// Abort synthesis between account blocks once `token` is cancelled
    pub fn with_cancellation(mut self, token: &'a CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    fn account(&self, index: usize) -> Option<&'a AccountWitness> {
        self.witness.and_then(|w| w.accounts.get(index))
    }

    fn synthesize_account(
        &self,
        cs: &ConstraintSystemRef<FieldElement>,
        poseidon: &PoseidonGadget,
        index: usize,
        limits: &[FpVar<FieldElement>; 3],
        commitment: &FpVar<FieldElement>,
    ) -> Result<Boolean<FieldElement>, SynthesisError> {
        let width = self.params.bit_width;
        let account = self.account(index);
        if self.witness.is_some() && account.is_none() {
            return Err(SynthesisError::AssignmentMissing);
        }

        // balance is range-checked by construction
        let balance_bits = alloc_bits(cs.clone(), account.map(|a| a.balance_bits.as_slice()), width)?;
        let balance = recompose(&balance_bits);

        let salt = FpVar::new_witness(cs.clone(), || {
            account.map(|a| a.salt).ok_or(SynthesisError::AssignmentMissing)
        })?;
        poseidon
            .commit(&balance, &salt)?
            .enforce_equal(commitment)?;

        let selector = (0..3)
            .map(|k| {
                Boolean::new_witness(cs.clone(), || {
                    account
                        .map(|a| a.selector[k])
                        .ok_or(SynthesisError::AssignmentMissing)
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let selected: Vec<FpVar<FieldElement>> =
            selector.iter().map(|s| FpVar::from(s.clone())).collect();
        selected
            .iter()
            .fold(FpVar::zero(), |acc, s| acc + s)
            .enforce_equal(&FpVar::one())?;
        let mut limit = FpVar::zero();
        for (s, l) in selected.iter().zip(limits.iter()) {
            limit += s * l;
        }

        let flag = Boolean::new_witness(cs.clone(), || {
            account
                .map(|a| a.compliant)
                .ok_or(SynthesisError::AssignmentMissing)
        })?;
        let slack_bits = alloc_bits(cs.clone(), account.map(|a| a.slack_bits.as_slice()), width)?;
        let slack = recompose(&slack_bits);

        let headroom = &limit - &balance;
        let excess = &balance - &limit - FieldElement::from(1u64);
        flag.select(&headroom, &excess)?.enforce_equal(&slack)?;

        Ok(flag)
    }
}

impl ConstraintSynthesizer<FieldElement> for BalanceComplianceCircuit<'_> {
    fn generate_constraints(
        self,
        cs: ConstraintSystemRef<FieldElement>,
    ) -> Result<(), SynthesisError> {
        let capacity = self.params.capacity;
        if let Some(public) = self.public {
            if public.commitments.len() != capacity {
                return Err(SynthesisError::AssignmentMissing);
            }
        }

        // Allocate public inputs
        let limit_values = self.public.map(|p| p.limits_used.to_field_elements());
        let limits: [FpVar<FieldElement>; 3] = [
            FpVar::new_input(cs.clone(), || {
                limit_values.map(|l| l[0]).ok_or(SynthesisError::AssignmentMissing)
            })?,
            FpVar::new_input(cs.clone(), || {
                limit_values.map(|l| l[1]).ok_or(SynthesisError::AssignmentMissing)
            })?,
            FpVar::new_input(cs.clone(), || {
                limit_values.map(|l| l[2]).ok_or(SynthesisError::AssignmentMissing)
            })?,
        ];

        let commitments = (0..capacity)
            .map(|i| {
                FpVar::new_input(cs.clone(), || {
                    self.public
                        .map(|p| p.commitments[i])
                        .ok_or(SynthesisError::AssignmentMissing)
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let compliance_bit = Boolean::new_input(cs.clone(), || {
            self.public
                .map(|p| p.compliance_bit == 1)
                .ok_or(SynthesisError::AssignmentMissing)
        })?;

        // Per-account blocks
        let poseidon = PoseidonGadget::new(cs.clone(), self.poseidon)?;
        let mut flags = Vec::with_capacity(capacity);
        for (index, commitment) in commitments.iter().enumerate() {
            if self.cancel.is_some_and(CancellationToken::is_cancelled) {
                return Err(SynthesisError::Unsatisfiable);
            }
            flags.push(self.synthesize_account(&cs, &poseidon, index, &limits, commitment)?);
        }

        Boolean::kary_and(&flags)?.enforce_equal(&compliance_bit)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::poseidon::PoseidonHasher;
    use crate::types::{Account, AccountType, LimitTable, Salt};
    use crate::witness::WitnessBuilder;
    use ark_relations::r1cs::{ConstraintSystem, SynthesisMode};
    use proptest::prelude::*;

    const WIDTH: usize = 32;

    fn salt(n: u64) -> Salt {
        Salt::from_u64(n).unwrap()
    }

    fn witness_for(hasher: &PoseidonHasher, accounts: &[Account], capacity: usize) -> Witness {
        let params = CircuitParams::new(capacity, WIDTH).unwrap();
        WitnessBuilder::new(params, hasher)
            .build(accounts, &LimitTable::default(), &CancellationToken::new())
            .unwrap()
    }

    fn satisfied(hasher: &PoseidonHasher, public: &PublicInputs, witness: &Witness) -> bool {
        let cs = ConstraintSystem::<FieldElement>::new_ref();
        BalanceComplianceCircuit::assigned(hasher.params(), public, witness)
            .generate_constraints(cs.clone())
            .unwrap();
        cs.is_satisfied().unwrap()
    }

    #[test]
    fn test_compliant_batch_satisfiable() {
        let hasher = PoseidonHasher::new();
        let accounts = vec![
            Account::new(20_000, salt(1), AccountType::Individual),
            Account::new(76_500, salt(2), AccountType::Association),
            Account::new(0, salt(3), AccountType::LargeCondominium),
        ];
        let witness = witness_for(&hasher, &accounts, 4);
        let public = witness.public_inputs();
        assert_eq!(public.compliance_bit, 1);
        assert!(satisfied(&hasher, &public, &witness));
    }

    #[test]
    fn test_violating_batch_satisfiable_with_zero_bit() {
        let hasher = PoseidonHasher::new();
        let accounts = vec![Account::new(30_000, salt(1), AccountType::Individual)];
        let witness = witness_for(&hasher, &accounts, 1);
        let public = witness.public_inputs();
        assert_eq!(public.compliance_bit, 0);
        assert!(satisfied(&hasher, &public, &witness));
    }

    #[test]
    fn test_forged_bit_is_unsatisfiable() {
        let hasher = PoseidonHasher::new();
        let accounts = vec![Account::new(30_000, salt(1), AccountType::Individual)];
        let witness = witness_for(&hasher, &accounts, 1);
        let mut public = witness.public_inputs();
        public.compliance_bit = 1;
        assert!(!satisfied(&hasher, &public, &witness));
    }

    #[test]
    fn test_forged_flag_is_unsatisfiable() {
        let hasher = PoseidonHasher::new();
        let accounts = vec![Account::new(30_000, salt(1), AccountType::Individual)];
        let mut witness = witness_for(&hasher, &accounts, 1);

        // claim compliance with the best possible slack
        witness.accounts[0].compliant = true;
        witness.accounts[0].slack_bits = vec![false; WIDTH];
        let mut public = witness.public_inputs();
        public.compliance_bit = 1;
        assert!(!satisfied(&hasher, &public, &witness));
    }

    #[test]
    fn test_wrong_type_selector_is_unsatisfiable() {
        let hasher = PoseidonHasher::new();
        // compliant only under the association limit
        let accounts = vec![Account::new(50_000, salt(1), AccountType::Individual)];
        let mut witness = witness_for(&hasher, &accounts, 1);
        witness.accounts[0].selector = [true, true, false];
        witness.accounts[0].compliant = true;
        let public = PublicInputs {
            compliance_bit: 1,
            ..witness.public_inputs()
        };
        assert!(!satisfied(&hasher, &public, &witness));
    }

    #[test]
    fn test_tampered_commitment_is_unsatisfiable() {
        let hasher = PoseidonHasher::new();
        let accounts = vec![Account::new(100, salt(1), AccountType::Individual)];
        let witness = witness_for(&hasher, &accounts, 1);
        let mut public = witness.public_inputs();
        public.commitments[0] = hasher.commit(FieldElement::from(99u64), salt(1).as_field());
        assert!(!satisfied(&hasher, &public, &witness));
    }

    #[test]
    fn test_constraints_scale_linearly() {
        let hasher = PoseidonHasher::new();
        let count = |capacity| {
            let cs = ConstraintSystem::<FieldElement>::new_ref();
            cs.set_mode(SynthesisMode::Setup);
            let params = CircuitParams::new(capacity, WIDTH).unwrap();
            BalanceComplianceCircuit::blank(params, hasher.params())
                .generate_constraints(cs.clone())
                .unwrap();
            cs.num_constraints()
        };
        let one = count(1);
        let two = count(2);
        let four = count(4);
        assert_eq!(four - two, 2 * (two - one));
    }

    #[test]
    fn test_cancelled_synthesis() {
        let hasher = PoseidonHasher::new();
        let accounts = vec![Account::new(100, salt(1), AccountType::Individual)];
        let witness = witness_for(&hasher, &accounts, 2);
        let public = witness.public_inputs();
        let token = CancellationToken::new();
        token.cancel();

        let cs = ConstraintSystem::<FieldElement>::new_ref();
        let result = BalanceComplianceCircuit::assigned(hasher.params(), &public, &witness)
            .with_cancellation(&token)
            .generate_constraints(cs);
        assert!(result.is_err());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn prop_bit_matches_comparison(balance in 0u64..200_000, type_index in 0usize..3) {
            let hasher = PoseidonHasher::new();
            let account_type = AccountType::ALL[type_index];
            let account = Account::new(balance, salt(balance + 1), account_type);
            let witness = witness_for(&hasher, std::slice::from_ref(&account), 1);
            let public = witness.public_inputs();

            let expected = balance <= LimitTable::default().limit_for(account_type);
            prop_assert_eq!(public.is_compliant(), expected);
            prop_assert!(satisfied(&hasher, &public, &witness));

            let flipped = PublicInputs { compliance_bit: 1 - public.compliance_bit, ..public };
            prop_assert!(!satisfied(&hasher, &flipped, &witness));
        }
    }
}
