//! Dedicated worker pool for proof generation
//!
//! Each submitted batch runs on one pool thread. Witness building and the
//! Groth16 prover fan out further with rayon, and since they are invoked from
//! inside the pool they stay on the pool's threads.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::RwLock;
use std::time::Duration;

use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::{debug, error, info, warn};

use crate::cancel::CancellationToken;
use crate::error::{ComplianceError, Result};
use crate::proof::ProofBundle;
use crate::prover::ComplianceProver;
use crate::types::{Account, LimitTable};

/// Thread pool running proof generation jobs
pub struct ProverPool {
    prover: ComplianceProver,
    threads: usize,
    pool: RwLock<Option<ThreadPool>>,
}

impl ProverPool {
    pub fn new(prover: ComplianceProver, threads: usize) -> Result<Self> {
        if threads == 0 {
            return Err(ComplianceError::Config {
                reason: "worker pool needs at least one thread".into(),
            });
        }
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("prover-{i}"))
            .panic_handler(|_| error!("prover worker panicked"))
            .build()
            .map_err(|e| ComplianceError::ProverUnavailable {
                reason: e.to_string(),
            })?;

        info!(threads, "prover pool started");
        Ok(Self {
            prover,
            threads,
            pool: RwLock::new(Some(pool)),
        })
    }

    pub fn prover(&self) -> &ComplianceProver {
        &self.prover
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    pub fn is_running(&self) -> bool {
        self.pool.read().map(|pool| pool.is_some()).unwrap_or(false)
    }

    /// Queue a batch for proving
    ///
    /// Fails with `ProverUnavailable` once the pool has been shut down.
    pub fn submit(&self, accounts: Vec<Account>, limits: LimitTable) -> Result<ProofJob> {
        let guard = self.pool.read().map_err(|_| unavailable("prover pool lock poisoned"))?;
        let pool = guard
            .as_ref()
            .ok_or_else(|| unavailable("prover pool is shut down"))?;

        let cancel = CancellationToken::new();
        let (sender, receiver) = mpsc::sync_channel(1);
        let prover = self.prover.clone();
        let token = cancel.clone();

        pool.spawn(move || {
            if token.is_cancelled() {
                // receiver may be gone already
                let _ = sender.send(Err(ComplianceError::Cancelled));
                return;
            }
            let result = prover.generate_with_cancel(&accounts, &limits, &token);
            if sender.send(result).is_err() {
                debug!("proof job abandoned by its caller");
            }
        });

        Ok(ProofJob { cancel, receiver })
    }

    /// Stop accepting jobs; queued and running jobs still complete
    pub fn shutdown(&self) {
        match self.pool.write() {
            Ok(mut pool) => {
                if pool.take().is_some() {
                    info!("prover pool shut down");
                }
            }
            Err(_) => warn!("prover pool lock poisoned during shutdown"),
        }
    }
}

/// Handle to a submitted proof generation
pub struct ProofJob {
    cancel: CancellationToken,
    receiver: Receiver<Result<ProofBundle>>,
}

impl ProofJob {
    /// Ask the worker to abandon the job at its next block boundary
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Block until the worker answers
    pub fn wait(self) -> Result<ProofBundle> {
        self.receiver
            .recv()
            .map_err(|_| unavailable("prover worker exited without a result"))?
    }

    /// Block for at most `timeout`; on expiry the job is cancelled
    pub fn wait_timeout(self, timeout: Duration) -> Result<ProofBundle> {
        match self.receiver.recv_timeout(timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => {
                warn!(timeout_ms = timeout.as_millis() as u64, "proof job timed out");
                self.cancel.cancel();
                Err(ComplianceError::Cancelled)
            }
            Err(RecvTimeoutError::Disconnected) => {
                Err(unavailable("prover worker exited without a result"))
            }
        }
    }
}

fn unavailable(reason: &str) -> ComplianceError {
    ComplianceError::ProverUnavailable {
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AccountType, CircuitParams, Salt};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn pool() -> ProverPool {
        let params = CircuitParams::new(1, 20).unwrap();
        let prover = ComplianceProver::setup(params, &mut StdRng::seed_from_u64(3)).unwrap();
        ProverPool::new(prover, 2).unwrap()
    }

    fn batch(salt: u64) -> Vec<Account> {
        vec![Account::new(
            100,
            Salt::from_u64(salt).unwrap(),
            AccountType::Individual,
        )]
    }

    #[test]
    fn test_submit_and_wait() {
        let pool = pool();
        let bundle = pool
            .submit(batch(1), LimitTable::default())
            .unwrap()
            .wait()
            .unwrap();
        assert_eq!(bundle.public_inputs.compliance_bit, 1);
        assert!(pool.prover().verifier().unwrap().verify_bundle(&bundle).unwrap());
    }

    #[test]
    fn test_shutdown_rejects_new_jobs() {
        let pool = pool();
        assert!(pool.is_running());
        pool.shutdown();
        assert!(!pool.is_running());
        assert!(matches!(
            pool.submit(batch(2), LimitTable::default()),
            Err(ComplianceError::ProverUnavailable { .. })
        ));
    }

    #[test]
    fn test_zero_threads_is_config_error() {
        let params = CircuitParams::new(1, 20).unwrap();
        let prover = ComplianceProver::setup(params, &mut StdRng::seed_from_u64(4)).unwrap();
        assert!(matches!(
            ProverPool::new(prover, 0),
            Err(ComplianceError::Config { .. })
        ));
    }

    #[test]
    fn test_dead_worker_is_unavailable() {
        let (sender, receiver) = mpsc::sync_channel::<Result<ProofBundle>>(1);
        drop(sender);
        let job = ProofJob {
            cancel: CancellationToken::new(),
            receiver,
        };
        assert!(matches!(
            job.wait(),
            Err(ComplianceError::ProverUnavailable { .. })
        ));
    }

    #[test]
    fn test_timeout_cancels_job() {
        let (_sender, receiver) = mpsc::sync_channel::<Result<ProofBundle>>(1);
        let token = CancellationToken::new();
        let job = ProofJob {
            cancel: token.clone(),
            receiver,
        };
        assert!(matches!(
            job.wait_timeout(Duration::from_millis(10)),
            Err(ComplianceError::Cancelled)
        ));
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_cancelled_job() {
        let pool = pool();
        let job = pool.submit(batch(3), LimitTable::default()).unwrap();
        job.cancel();
        // the job either finished before the cancel landed or reports it
        match job.wait() {
            Ok(bundle) => assert_eq!(bundle.metadata.accounts_verified, 1),
            Err(e) => assert!(matches!(e, ComplianceError::Cancelled)),
        }
    }
}
