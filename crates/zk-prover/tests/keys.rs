//! Key persistence and service bootstrap from a key directory

use anyhow::Result;
use balance_zk_prover::{
    Account, AccountType, CircuitKeys, CircuitParams, ComplianceError, ComplianceProver,
    ComplianceService, ComplianceVerifier, LimitTable, ProverConfig, Salt,
};
use balance_zk_prover::poseidon::PoseidonParams;
use rand::rngs::StdRng;
use rand::SeedableRng;

fn config(dir: &std::path::Path) -> ProverConfig {
    ProverConfig {
        capacity: 1,
        bit_width: 20,
        worker_threads: 1,
        key_dir: Some(dir.to_path_buf()),
        ..ProverConfig::default()
    }
}

#[test]
fn test_proofs_verify_with_reloaded_keys() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let params = CircuitParams::new(1, 20)?;
    let keys = CircuitKeys::setup(params, &PoseidonParams::new(), &mut StdRng::seed_from_u64(5))?;
    keys.save(dir.path())?;

    let prover = ComplianceProver::from_keys(&keys)?;
    let accounts = [Account::new(
        70_000,
        Salt::from_u64(77)?,
        AccountType::Association,
    )];
    let bundle = prover.generate(&accounts, &LimitTable::default())?;

    let reloaded = CircuitKeys::load(dir.path())?;
    let verifier = ComplianceVerifier::from_keys(&reloaded)?;
    assert_eq!(verifier.circuit_id(), prover.circuit_id());
    assert!(verifier.verify_bundle(&bundle)?);
    Ok(())
}

#[test]
fn test_service_generates_then_reuses_keys() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let key_dir = dir.path().join("keys");

    let first = ComplianceService::from_config(config(&key_dir))?;
    assert!(CircuitKeys::exists(&key_dir));
    let bundle = first.generate(balance_zk_prover::GenerateRequest {
        accounts: vec![Account::new(100, Salt::from_u64(1)?, AccountType::Individual)],
        limit_table: None,
    })?;

    // a restarted service picks up the same keys and accepts old proofs
    let second = ComplianceService::from_config(config(&key_dir))?;
    assert_eq!(second.verifier().circuit_id(), first.verifier().circuit_id());
    assert!(second.verify_bundle(&bundle)?.compliant);
    Ok(())
}

#[test]
fn test_foreign_keys_reject_proof_file() -> Result<()> {
    let dir_a = tempfile::tempdir()?;
    let dir_b = tempfile::tempdir()?;
    let a = ComplianceService::from_config(config(dir_a.path()))?;
    let b = ComplianceService::from_config(config(dir_b.path()))?;

    let bundle = a.generate(balance_zk_prover::GenerateRequest {
        accounts: vec![Account::new(5, Salt::from_u64(2)?, AccountType::Individual)],
        limit_table: None,
    })?;
    assert!(matches!(
        b.verify_bundle(&bundle),
        Err(ComplianceError::UnsupportedProtocol { .. })
    ));
    Ok(())
}

#[test]
fn test_key_dir_for_other_shape_is_config_error() -> Result<()> {
    let dir = tempfile::tempdir()?;
    ComplianceService::from_config(config(dir.path()))?;

    let wider = ProverConfig {
        capacity: 2,
        ..config(dir.path())
    };
    assert!(matches!(
        ComplianceService::from_config(wider),
        Err(ComplianceError::Config { .. })
    ));
    Ok(())
}
