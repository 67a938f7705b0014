//! Shared fixtures for integration tests
#![allow(dead_code)]

use std::sync::OnceLock;

use balance_zk_prover::{
    Account, AccountType, CircuitParams, ComplianceProver, ComplianceVerifier, Salt,
};
use rand::rngs::StdRng;
use rand::SeedableRng;

pub const CAPACITY: usize = 3;
pub const BIT_WIDTH: usize = 24;

pub struct Fixture {
    pub prover: ComplianceProver,
    pub verifier: ComplianceVerifier,
}

/// One setup per test binary
pub fn fixture() -> &'static Fixture {
    static FIXTURE: OnceLock<Fixture> = OnceLock::new();
    FIXTURE.get_or_init(|| {
        let params = CircuitParams::new(CAPACITY, BIT_WIDTH).unwrap();
        let prover = ComplianceProver::setup(params, &mut StdRng::seed_from_u64(42)).unwrap();
        let verifier = prover.verifier().unwrap();
        Fixture { prover, verifier }
    })
}

pub fn account(balance: u64, salt: u64, account_type: AccountType) -> Account {
    Account::new(balance, Salt::from_u64(salt).unwrap(), account_type)
}

pub fn individual(balance: u64, salt: u64) -> Account {
    account(balance, salt, AccountType::Individual)
}
