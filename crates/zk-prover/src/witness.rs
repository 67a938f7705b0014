//! Private assignment for the balance compliance circuit
//!
//! Padding policy: a batch of `k < N` accounts is filled up to the circuit
//! capacity `N` with dummy accounts `{balance: 0, salt: 0, type: individual}`.
//! Dummies are always compliant and commit to `commit(0, 0)`, so they never
//! change the aggregate bit. Salt zero is rejected for real accounts, which
//! keeps padding slots distinguishable from caller data.

use rayon::prelude::*;
use tracing::{debug, instrument};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::cancel::CancellationToken;
use crate::error::{ComplianceError, Result, WitnessError};
use crate::field::FieldElement;
use crate::gadgets::range::{fits_in_bits, to_bits_le};
use crate::poseidon::PoseidonHasher;
use crate::proof::PublicInputs;
use crate::types::{Account, AccountType, CircuitParams, LimitTable};

/// Assignment for one account block
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct AccountWitness {
    pub(crate) salt: FieldElement,
    pub(crate) selector: [bool; 3],
    pub(crate) compliant: bool,
    pub(crate) balance_bits: Vec<bool>,
    pub(crate) slack_bits: Vec<bool>,
    pub(crate) commitment: FieldElement,
}

impl AccountWitness {
    pub fn commitment(&self) -> FieldElement {
        self.commitment
    }

    pub fn is_compliant(&self) -> bool {
        self.compliant
    }
}

/// Complete private assignment for one batch
///
/// Exists only for the duration of a proof. Values are wiped on drop and the
/// type has no serialization.
#[derive(Clone)]
pub struct Witness {
    pub(crate) params: CircuitParams,
    pub(crate) limits: LimitTable,
    pub(crate) accounts: Vec<AccountWitness>,
    pub(crate) real_accounts: usize,
}

impl Witness {
    pub fn params(&self) -> CircuitParams {
        self.params
    }

    pub fn limits(&self) -> &LimitTable {
        &self.limits
    }

    /// Number of caller-supplied accounts, excluding padding
    pub fn real_accounts(&self) -> usize {
        self.real_accounts
    }

    pub fn accounts(&self) -> &[AccountWitness] {
        &self.accounts
    }

    /// AND over every account block
    pub fn compliance_bit(&self) -> bool {
        self.accounts.iter().all(|a| a.compliant)
    }

    /// The public values this assignment proves
    pub fn public_inputs(&self) -> PublicInputs {
        PublicInputs {
            commitments: self.accounts.iter().map(|a| a.commitment).collect(),
            compliance_bit: u8::from(self.compliance_bit()),
            limits_used: self.limits,
        }
    }
}

impl std::fmt::Debug for Witness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Witness")
            .field("params", &self.params)
            .field("real_accounts", &self.real_accounts)
            .finish_non_exhaustive()
    }
}

/// Builds witnesses for a fixed circuit shape
pub struct WitnessBuilder<'a> {
    params: CircuitParams,
    hasher: &'a PoseidonHasher,
}

impl<'a> WitnessBuilder<'a> {
    pub fn new(params: CircuitParams, hasher: &'a PoseidonHasher) -> Self {
        Self { params, hasher }
    }

    /// Validate the batch, pad it to capacity and derive every private value
    ///
    /// Account blocks are built in parallel; the token is checked before each.
    #[instrument(skip_all, fields(accounts = accounts.len(), capacity = self.params.capacity))]
    pub fn build(
        &self,
        accounts: &[Account],
        limits: &LimitTable,
        cancel: &CancellationToken,
    ) -> Result<Witness> {
        self.params.validate_batch(accounts, limits)?;
        cancel.check()?;

        let padded: Vec<Option<&Account>> = accounts
            .iter()
            .map(Some)
            .chain(std::iter::repeat(None))
            .take(self.params.capacity)
            .collect();

        let blocks = padded
            .par_iter()
            .enumerate()
            .map(|(index, account)| {
                cancel.check()?;
                match account {
                    Some(account) => self.account_block(index, account, limits),
                    None => self.padding_block(index, limits),
                }
            })
            .collect::<Result<Vec<_>>>()?;

        debug!(
            padding = self.params.capacity - accounts.len(),
            "witness built"
        );

        Ok(Witness {
            params: self.params,
            limits: *limits,
            accounts: blocks,
            real_accounts: accounts.len(),
        })
    }

    fn account_block(
        &self,
        index: usize,
        account: &Account,
        limits: &LimitTable,
    ) -> Result<AccountWitness> {
        self.block(
            index,
            account.balance,
            account.salt.as_field(),
            account.account_type,
            limits,
        )
    }

    fn padding_block(&self, index: usize, limits: &LimitTable) -> Result<AccountWitness> {
        self.block(
            index,
            0,
            FieldElement::from(0u64),
            AccountType::Individual,
            limits,
        )
    }

    fn block(
        &self,
        index: usize,
        balance: u64,
        salt: FieldElement,
        account_type: AccountType,
        limits: &LimitTable,
    ) -> Result<AccountWitness> {
        let width = self.params.bit_width;
        let violation = |reason| {
            ComplianceError::from(WitnessError::ConstraintViolation {
                account: index,
                reason,
            })
        };

        if !fits_in_bits(balance, width) {
            return Err(violation("balance does not fit in the bit width"));
        }

        let limit = limits.limit_for(account_type);
        let compliant = balance <= limit;
        let slack = if compliant {
            limit - balance
        } else {
            balance - limit - 1
        };
        if !fits_in_bits(slack, width) {
            return Err(violation("slack does not fit in the bit width"));
        }

        Ok(AccountWitness {
            salt,
            selector: account_type.selector(),
            compliant,
            balance_bits: to_bits_le(balance, width),
            slack_bits: to_bits_le(slack, width),
            commitment: self.hasher.commit(FieldElement::from(balance), salt),
        })
    }
}
