//! Input types for the balance compliance circuit

use std::collections::HashSet;
use std::fmt;

use ark_std::UniformRand;
use serde::{Deserialize, Serialize};

use crate::error::{ComplianceError, Result};
use crate::field::{fr_to_decimal, is_zero, parse_field_element, FieldElement};
use crate::gadgets::range::fits_in_bits;

/// Regulatory ceilings in EUR
pub mod limits {
    /// Individual Livret A account
    pub const INDIVIDUAL: u64 = 22_950;
    /// Associations and condominium associations
    pub const ASSOCIATION: u64 = 76_500;
    /// Condominium associations with more than 100 units
    pub const LARGE_CONDOMINIUM: u64 = 100_000;
}

/// Currency the limits are expressed in
pub const CURRENCY: &str = "EUR";

/// Largest supported bit width for balances and limits
pub const MAX_BIT_WIDTH: usize = 64;

/// Account category, each mapped to a public limit
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountType {
    Individual,
    Association,
    LargeCondominium,
}

impl AccountType {
    /// All account types in circuit order
    pub const ALL: [AccountType; 3] = [
        AccountType::Individual,
        AccountType::Association,
        AccountType::LargeCondominium,
    ];

    /// Position of this type in the one-hot selector
    pub fn index(self) -> usize {
        match self {
            Self::Individual => 0,
            Self::Association => 1,
            Self::LargeCondominium => 2,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Individual => "Individual",
            Self::Association => "Association",
            Self::LargeCondominium => "Large Condominium",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::Individual => "Individual Livret A account",
            Self::Association => "Association & Condominium associations",
            Self::LargeCondominium => "Condominium associations with >100 units",
        }
    }

    /// One-hot selector for the circuit
    pub fn selector(self) -> [bool; 3] {
        let mut selector = [false; 3];
        selector[self.index()] = true;
        selector
    }
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Individual => "individual",
            Self::Association => "association",
            Self::LargeCondominium => "large_condominium",
        };
        f.write_str(name)
    }
}

/// Per-type balance ceilings, public in every proof
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitTable {
    pub individual: u64,
    pub association: u64,
    pub large_condominium: u64,
}

impl Default for LimitTable {
    fn default() -> Self {
        Self {
            individual: limits::INDIVIDUAL,
            association: limits::ASSOCIATION,
            large_condominium: limits::LARGE_CONDOMINIUM,
        }
    }
}

impl LimitTable {
    pub fn limit_for(&self, account_type: AccountType) -> u64 {
        match account_type {
            AccountType::Individual => self.individual,
            AccountType::Association => self.association,
            AccountType::LargeCondominium => self.large_condominium,
        }
    }

    /// Limits in circuit order
    pub fn as_array(&self) -> [u64; 3] {
        [self.individual, self.association, self.large_condominium]
    }

    /// Limits as field elements in circuit order
    pub fn to_field_elements(&self) -> [FieldElement; 3] {
        self.as_array().map(FieldElement::from)
    }

    /// Every limit must be representable in `bit_width` bits
    pub fn validate(&self, bit_width: usize) -> Result<()> {
        for account_type in AccountType::ALL {
            let limit = self.limit_for(account_type);
            if !fits_in_bits(limit, bit_width) {
                return Err(ComplianceError::invalid_input(
                    format!("limitTable.{account_type}"),
                    limit,
                    format!("value below 2^{bit_width}"),
                ));
            }
        }
        Ok(())
    }
}

/// One-time blinding value for a balance commitment
///
/// Salt zero is reserved for padding accounts.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Salt(FieldElement);

impl Salt {
    /// Fresh salt from the operating system RNG
    pub fn random() -> Self {
        let mut rng = rand::rngs::OsRng;
        loop {
            let candidate = FieldElement::rand(&mut rng);
            if !is_zero(&candidate) {
                return Self(candidate);
            }
        }
    }

    /// Parse a decimal or `0x`-hex salt; zero and values `>= r` are rejected
    pub fn parse(s: &str) -> Result<Self> {
        let value = parse_field_element(s, "salt")?;
        Self::from_field(value)
    }

    pub fn from_field(value: FieldElement) -> Result<Self> {
        if is_zero(&value) {
            return Err(ComplianceError::invalid_input(
                "salt",
                "0",
                "non-zero field element (0 is reserved for padding)",
            ));
        }
        Ok(Self(value))
    }

    pub fn from_u64(value: u64) -> Result<Self> {
        Self::from_field(FieldElement::from(value))
    }

    pub fn as_field(&self) -> FieldElement {
        self.0
    }
}

impl TryFrom<String> for Salt {
    type Error = ComplianceError;

    fn try_from(s: String) -> Result<Self> {
        Self::parse(&s)
    }
}

impl From<Salt> for String {
    fn from(salt: Salt) -> Self {
        fr_to_decimal(&salt.0)
    }
}

impl fmt::Debug for Salt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Salt(<redacted>)")
    }
}

/// A private account record
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    /// Balance in whole currency units
    pub balance: u64,
    /// One-time blinding salt
    pub salt: Salt,
    /// Category selecting the applicable limit
    pub account_type: AccountType,
}

impl Account {
    pub fn new(balance: u64, salt: Salt, account_type: AccountType) -> Self {
        Self {
            balance,
            salt,
            account_type,
        }
    }

    /// Account with a freshly drawn salt
    pub fn with_random_salt(balance: u64, account_type: AccountType) -> Self {
        Self::new(balance, Salt::random(), account_type)
    }

    pub fn is_compliant(&self, limits: &LimitTable) -> bool {
        self.balance <= limits.limit_for(self.account_type)
    }
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("balance", &"<redacted>")
            .field("salt", &self.salt)
            .field("account_type", &self.account_type)
            .finish()
    }
}

/// Shape of a compiled circuit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CircuitParams {
    /// Number of account slots N
    pub capacity: usize,
    /// Bit width W of balances, limits and slack values
    pub bit_width: usize,
}

impl CircuitParams {
    pub fn new(capacity: usize, bit_width: usize) -> Result<Self> {
        let params = Self {
            capacity,
            bit_width,
        };
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(ComplianceError::invalid_input(
                "capacity",
                self.capacity,
                "at least 1 account slot",
            ));
        }
        if self.bit_width == 0 || self.bit_width > MAX_BIT_WIDTH {
            return Err(ComplianceError::invalid_input(
                "bitWidth",
                self.bit_width,
                format!("1-{MAX_BIT_WIDTH}"),
            ));
        }
        Ok(())
    }

    /// Number of public field elements: 3 limits, N commitments, 1 bit
    pub fn num_public_inputs(&self) -> usize {
        3 + self.capacity + 1
    }

    /// Reject a batch before any cryptographic work
    pub fn validate_batch(&self, accounts: &[Account], limits: &LimitTable) -> Result<()> {
        limits.validate(self.bit_width)?;

        if accounts.is_empty() {
            return Err(ComplianceError::invalid_input(
                "accounts",
                0,
                "at least one account",
            ));
        }
        if accounts.len() > self.capacity {
            return Err(ComplianceError::invalid_input(
                "accounts",
                accounts.len(),
                format!("at most {} accounts", self.capacity),
            ));
        }

        let mut salts = HashSet::with_capacity(accounts.len());
        for (i, account) in accounts.iter().enumerate() {
            if !fits_in_bits(account.balance, self.bit_width) {
                return Err(ComplianceError::invalid_input(
                    format!("accounts[{i}].balance"),
                    "<redacted>",
                    format!("value below 2^{}", self.bit_width),
                ));
            }
            if !salts.insert(account.salt) {
                return Err(ComplianceError::invalid_input(
                    format!("accounts[{i}].salt"),
                    "<redacted>",
                    "salt not reused within the batch",
                ));
            }
        }
        Ok(())
    }
}

impl Default for CircuitParams {
    fn default() -> Self {
        Self {
            capacity: 16,
            bit_width: 32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn salt(n: u64) -> Salt {
        Salt::from_u64(n).unwrap()
    }

    fn params() -> CircuitParams {
        CircuitParams::new(4, 32).unwrap()
    }

    #[test]
    fn test_default_limits() {
        let table = LimitTable::default();
        assert_eq!(table.limit_for(AccountType::Individual), 22_950);
        assert_eq!(table.limit_for(AccountType::Association), 76_500);
        assert_eq!(table.limit_for(AccountType::LargeCondominium), 100_000);
    }

    #[test]
    fn test_compliance_is_derived() {
        let table = LimitTable::default();
        let at_limit = Account::new(22_950, salt(1), AccountType::Individual);
        let over = Account::new(22_951, salt(2), AccountType::Individual);
        let association = Account::new(50_000, salt(3), AccountType::Association);
        assert!(at_limit.is_compliant(&table));
        assert!(!over.is_compliant(&table));
        assert!(association.is_compliant(&table));
    }

    #[test]
    fn test_account_json_shape() {
        let json = r#"{"balance": 20000, "salt": "0x1f", "accountType": "large_condominium"}"#;
        let account: Account = serde_json::from_str(json).unwrap();
        assert_eq!(account.account_type, AccountType::LargeCondominium);
        assert_eq!(account.salt, salt(31));

        let zero_salt = r#"{"balance": 1, "salt": "0", "accountType": "individual"}"#;
        assert!(serde_json::from_str::<Account>(zero_salt).is_err());
    }

    #[test]
    fn test_debug_redacts_private_values() {
        let account = Account::new(31_337, salt(424_242), AccountType::Individual);
        let rendered = format!("{account:?}");
        assert!(!rendered.contains("31337"));
        assert!(!rendered.contains("424242"));
    }

    #[test]
    fn test_random_salts_differ() {
        assert_ne!(Salt::random(), Salt::random());
    }

    #[test]
    fn test_params_validation() {
        assert!(CircuitParams::new(0, 32).is_err());
        assert!(CircuitParams::new(1, 0).is_err());
        assert!(CircuitParams::new(1, 65).is_err());
        assert_eq!(params().num_public_inputs(), 8);
    }

    #[test]
    fn test_batch_validation() {
        let table = LimitTable::default();
        let p = params();
        let ok = vec![
            Account::new(100, salt(1), AccountType::Individual),
            Account::new(200, salt(2), AccountType::Association),
        ];
        assert!(p.validate_batch(&ok, &table).is_ok());

        assert!(p.validate_batch(&[], &table).is_err());

        let too_many: Vec<_> = (1..=5)
            .map(|i| Account::new(1, salt(i), AccountType::Individual))
            .collect();
        assert!(p.validate_batch(&too_many, &table).is_err());

        let reused = vec![
            Account::new(100, salt(7), AccountType::Individual),
            Account::new(200, salt(7), AccountType::Individual),
        ];
        assert!(p.validate_batch(&reused, &table).is_err());

        let narrow = CircuitParams::new(2, 16).unwrap();
        let wide = vec![Account::new(1 << 16, salt(1), AccountType::Individual)];
        let small_limits = LimitTable {
            individual: 100,
            association: 100,
            large_condominium: 100,
        };
        assert!(narrow.validate_batch(&wide, &small_limits).is_err());

        // default limits do not fit in 16 bits
        let small = vec![Account::new(1, salt(1), AccountType::Individual)];
        assert!(narrow.validate_batch(&small, &table).is_err());
    }
}
