//! Validator-facing facade.
//!
//! `ProofEngine` owns the verifier, the statistics book and the reward
//! state, and drives one query round end to end: issue seeds, fan out,
//! verify, record outcomes, price and fold into the moving average.

use log::{debug, info, warn};
use parking_lot::{Mutex, RwLock};
use rayon::prelude::*;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::bonding::statistics::StatisticsBook;
use crate::bonding::store::MetadataStore;
use crate::bonding::tiers::{self, TierChange};
use crate::core::config::EngineConfig;
use crate::core::errors::{ProofResult, Rejection};
use crate::core::logging::{
    log_with_color, LogLevel, PerformanceCategory, ProofPerformanceLogger, RoundLogger,
};
use crate::core::types::{ProviderId, TaskKind, Tier, Uid};
use crate::core::utils::{encode_base64, PerformanceTimer};
use crate::crypto::commitment::{setup_crs, Crs};
use crate::network::dispatcher::Dispatcher;
use crate::network::seeds::SeedIssuer;
use crate::network::transport::QueryResult;
use crate::rewards::round::{
    apply_outcome, scale_and_apply_rewards, score_round, RoundEntry, RoundOutcome,
};
use crate::rewards::state::{RewardState, WeightSubmitter};
use crate::verification::requests::{
    ChallengeRequest, RetrieveRequest, StoreRequest, TaskRequest,
};
use crate::verification::verifier::{Verification, Verifier};

/// One provider's assignment in a round
#[derive(Debug, Clone)]
pub struct RoundTask {
    pub uid: Uid,
    pub provider_id: ProviderId,
    pub request: TaskRequest,
}

pub struct ProofEngine {
    config: EngineConfig,
    crs: Crs,
    verifier: Verifier,
    book: StatisticsBook,
    rewards: RwLock<RewardState>,
    seeds: SeedIssuer,
    round_logger: Mutex<RoundLogger>,
    performance: ProofPerformanceLogger,
    rounds: AtomicU64,
}

impl ProofEngine {
    pub fn new(config: EngineConfig, store: Arc<dyn MetadataStore>) -> ProofResult<Self> {
        let crs = setup_crs(config.curve)?;
        Self::with_crs(config, store, crs)
    }

    /// Build on a fixed CRS, e.g. one from `derive_crs`
    pub fn with_crs(
        config: EngineConfig,
        store: Arc<dyn MetadataStore>,
        crs: Crs,
    ) -> ProofResult<Self> {
        config.validate()?;
        let verifier = Verifier::new(config.curve).with_verbose(config.verbose);
        let rewards = RewardState::new(config.moving_average_alpha);
        let round_logger = RoundLogger::new(config.logger.clone());
        let performance = ProofPerformanceLogger::new(config.logger.clone());
        let seeds = SeedIssuer::with_ttl(config.seed_ttl());
        log_with_color(
            LogLevel::Info,
            "🚀",
            "ENGINE",
            &format!("proof engine ready on {}", config.curve),
        );

        Ok(Self {
            config,
            crs,
            verifier,
            book: StatisticsBook::new(store),
            rewards: RwLock::new(rewards),
            seeds,
            round_logger: Mutex::new(round_logger),
            performance,
            rounds: AtomicU64::new(0),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn crs(&self) -> &Crs {
        &self.crs
    }

    pub fn statistics(&self) -> &StatisticsBook {
        &self.book
    }

    pub fn seeds(&self) -> &SeedIssuer {
        &self.seeds
    }

    pub fn rounds_completed(&self) -> u64 {
        self.rounds.load(Ordering::SeqCst)
    }

    pub fn store_request(&self, data: &[u8]) -> StoreRequest {
        StoreRequest::new(
            encode_base64(data),
            self.crs.curve,
            self.crs.g.to_hex(),
            self.crs.h.to_hex(),
            self.seeds.issue(),
        )
    }

    pub fn challenge_request(
        &self,
        data_hash: &str,
        index: usize,
        chunk_size: usize,
    ) -> ChallengeRequest {
        ChallengeRequest::new(
            data_hash.to_string(),
            index,
            chunk_size,
            self.crs.curve,
            self.crs.g.to_hex(),
            self.crs.h.to_hex(),
            self.seeds.issue(),
        )
    }

    pub fn retrieve_request(&self, data_hash: &str) -> RetrieveRequest {
        RetrieveRequest::new(data_hash.to_string(), self.seeds.issue())
    }

    /// `(accepted, reason)` for a completed request of kind `task`
    pub fn verify(&self, task: TaskKind, request: &TaskRequest) -> ProofResult<(bool, String)> {
        if request.kind() != task {
            return Ok(Verification::Rejected(Rejection::AlteredRequest("task kind")).verdict());
        }
        Ok(self.verifier.verify(request)?.verdict())
    }

    pub fn record_outcome(
        &self,
        provider_id: &str,
        task: TaskKind,
        accepted: bool,
    ) -> ProofResult<()> {
        self.book.record_outcome(provider_id, task, accepted)?;
        Ok(())
    }

    /// Recompute one provider's tier; unknown providers sit at the lowest tier
    pub fn compute_tier(&self, provider_id: &str) -> ProofResult<Tier> {
        match tiers::compute_tier(&self.book, provider_id)? {
            Some(change) => {
                if change.from != change.to {
                    self.round_logger
                        .lock()
                        .log_tier_change(provider_id, change.from, change.to);
                }
                Ok(change.to)
            }
            None => Ok(Tier::Bronze),
        }
    }

    pub fn tier_factor(&self, provider_id: &str, in_top_2: bool) -> ProofResult<f64> {
        tiers::tier_factor(&self.book, provider_id, in_top_2)
    }

    pub fn refresh_tiers(&self) -> ProofResult<Vec<TierChange>> {
        let timer = PerformanceTimer::new("refresh_tiers");
        let changes = tiers::compute_all_tiers(&self.book)?;
        {
            let mut logger = self.round_logger.lock();
            for change in &changes {
                logger.log_tier_change(&change.provider_id, change.from, change.to);
            }
        }
        self.performance.log_categorized_operation(
            PerformanceCategory::Tiering,
            "refresh_tiers",
            timer.finish(),
        );
        Ok(changes)
    }

    /// Scale caller-priced rewards and fold them in; returns every score
    pub fn scale_and_apply_rewards(
        &self,
        entries: &[RoundEntry],
        base_rewards: &[f64],
    ) -> ProofResult<Vec<f64>> {
        scale_and_apply_rewards(&mut self.rewards.write(), entries, base_rewards)
    }

    /// Query, verify, record and reward one round.
    ///
    /// Every request must carry a seed from this engine; each seed is
    /// accepted back once.
    pub async fn run_round(
        &self,
        dispatcher: &Dispatcher,
        task: TaskKind,
        assignments: Vec<RoundTask>,
    ) -> ProofResult<RoundOutcome> {
        let timer = PerformanceTimer::new("run_round");
        let timeout = self.config.timeout(task);
        self.round_logger
            .lock()
            .log_query(task, assignments.len(), timeout.as_millis() as u64);

        let outbound = assignments
            .iter()
            .map(|a| (a.uid, a.request.clone()))
            .collect();
        let results = dispatcher.query_each(outbound, timeout).await;

        let fresh: Vec<bool> = assignments
            .iter()
            .map(|a| self.seeds.consume(a.request.seed()))
            .collect();
        let verify_timer = PerformanceTimer::new("verify_round");
        let verifications = assignments
            .par_iter()
            .zip(results.par_iter())
            .zip(fresh.par_iter())
            .map(|((assignment, result), &fresh)| self.check_result(assignment, result, fresh))
            .collect::<ProofResult<Vec<_>>>()?;
        let answered = verifications.iter().filter(|v| v.is_some()).count();
        self.performance.log_batch_performance(answered, verify_timer.finish());

        let mut entries = Vec::with_capacity(assignments.len());
        {
            let mut logger = self.round_logger.lock();
            for ((assignment, result), verification) in
                assignments.iter().zip(&results).zip(&verifications)
            {
                match verification {
                    None => logger.log_timeout(&assignment.provider_id, task),
                    Some(v) => logger.log_verification(
                        &assignment.provider_id,
                        task,
                        v.rejection().map(|r| r.to_string()).as_deref(),
                    ),
                }
                entries.push(RoundEntry {
                    uid: assignment.uid,
                    provider_id: assignment.provider_id.clone(),
                    verified: verification.as_ref().map_or(false, Verification::is_accepted),
                    response_time: result.process_time,
                    data_size: payload_size(&assignment.request, result),
                });
            }
        }

        let scoring_timer = PerformanceTimer::new("score_round");
        let outcome = score_round(&self.book, task, &entries, timeout.as_secs_f64())?;
        apply_outcome(&mut self.rewards.write(), &outcome)?;
        self.performance.log_categorized_operation(
            PerformanceCategory::RewardScaling,
            "score_round",
            scoring_timer.finish(),
        );

        self.round_logger.lock().log_round_summary(
            task,
            outcome.responded,
            outcome.verified,
            outcome.total_reward(),
            timer.finish(),
        );

        let completed = self.rounds.fetch_add(1, Ordering::SeqCst) + 1;
        if completed % self.config.tier_refresh_interval == 0 {
            debug!("Round {}: refreshing tiers", completed);
            self.refresh_tiers()?;
        }
        Ok(outcome)
    }

    /// `None` when the provider never answered
    fn check_result(
        &self,
        assignment: &RoundTask,
        result: &QueryResult,
        fresh_seed: bool,
    ) -> ProofResult<Option<Verification>> {
        let response = match &result.response {
            Some(response) => response,
            None => return Ok(None),
        };
        if !fresh_seed {
            warn!("{} answered on a stale seed", assignment.provider_id);
            return Ok(Some(Verification::Rejected(Rejection::StaleSeed)));
        }
        self.verifier
            .verify_response(&assignment.request, response)
            .map(Some)
    }

    pub fn reward_scores(&self) -> Vec<f64> {
        self.rewards.read().scores().to_vec()
    }

    pub fn normalized_weights(&self) -> Vec<f64> {
        self.rewards.read().normalized_weights()
    }

    pub fn save_rewards<P: AsRef<Path>>(&self, path: P) -> ProofResult<()> {
        self.rewards.read().save_json(path)
    }

    /// Replace the in-memory scores with a saved snapshot
    pub fn load_rewards<P: AsRef<Path>>(&self, path: P) -> ProofResult<()> {
        let state = RewardState::load_json(path)?;
        info!("Loaded reward scores for {} uids", state.len());
        *self.rewards.write() = state;
        Ok(())
    }

    pub async fn submit_weights<W: WeightSubmitter + ?Sized>(
        &self,
        submitter: &W,
    ) -> ProofResult<()> {
        let snapshot = self.rewards.read().clone();
        snapshot.submit(submitter).await
    }

    pub fn log_session_summary(&self) {
        self.round_logger.lock().log_session_summary();
    }
}

fn payload_size(issued: &TaskRequest, result: &QueryResult) -> u64 {
    let answered = result.response.as_ref().map_or(0, TaskRequest::payload_size);
    issued.payload_size().max(answered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bonding::store::MemoryStore;
    use crate::core::types::CurveId;
    use crate::crypto::signer::{derive_crs, Ed25519Signer};
    use crate::network::transport::{Transport, TransportError};
    use crate::verification::prover;
    use async_trait::async_trait;
    use std::time::Duration;

    const PAYLOAD: &[u8] = b"0123456789abcdef0123456789abcdef";
    const STORED_SEED: &str = "stored-seed";

    /// Uid 2 answers with a forged commitment, uid 3 never answers
    struct HonestishProvider;

    #[async_trait]
    impl Transport for HonestishProvider {
        async fn send(
            &self,
            uid: Uid,
            request: TaskRequest,
            _timeout: Duration,
        ) -> Result<TaskRequest, TransportError> {
            if uid == 3 {
                tokio::time::sleep(Duration::from_secs(30)).await;
            }
            let protocol = |e: crate::core::errors::ProofError| TransportError::Protocol {
                uid,
                reason: e.to_string(),
            };
            let mut answer = match request {
                TaskRequest::Store(r) => TaskRequest::Store(prover::answer_store(r).map_err(protocol)?),
                TaskRequest::Challenge(r) => TaskRequest::Challenge(
                    prover::answer_challenge(r, PAYLOAD, STORED_SEED).map_err(protocol)?,
                ),
                TaskRequest::Retrieve(r) => {
                    TaskRequest::Retrieve(prover::answer_retrieve(r, PAYLOAD, STORED_SEED))
                }
            };
            if uid == 2 {
                if let TaskRequest::Store(r) = &mut answer {
                    r.commitment_hash = Some("00".repeat(32));
                }
                if let TaskRequest::Challenge(r) = &mut answer {
                    r.commitment_hash = Some("00".repeat(32));
                }
                if let TaskRequest::Retrieve(r) = &mut answer {
                    r.commitment_hash = Some("00".repeat(32));
                }
            }
            Ok(answer)
        }
    }

    fn new_engine() -> ProofEngine {
        let mut config = EngineConfig::default();
        config.store_timeout_secs = 1;
        config.challenge_timeout_secs = 1;
        config.retrieve_timeout_secs = 1;
        config.tier_refresh_interval = 2;
        ProofEngine::new(config, Arc::new(MemoryStore::new())).unwrap()
    }

    fn assignments<F: Fn() -> TaskRequest>(make: F) -> Vec<RoundTask> {
        (0..4)
            .map(|uid| RoundTask {
                uid,
                provider_id: format!("provider-{}", uid),
                request: make(),
            })
            .collect()
    }

    #[tokio::test]
    async fn test_store_round_end_to_end() {
        let engine = new_engine();
        let dispatcher = Dispatcher::new(Arc::new(HonestishProvider), 4).unwrap();
        let tasks = assignments(|| TaskRequest::Store(engine.store_request(PAYLOAD)));

        let outcome = engine.run_round(&dispatcher, TaskKind::Store, tasks).await.unwrap();
        assert_eq!(outcome.responded, 3);
        assert_eq!(outcome.verified, 2);
        assert_eq!(engine.seeds().outstanding(), 0);

        let scores = engine.reward_scores();
        assert_eq!(scores.len(), 4);
        assert!(scores[0] > 0.0);
        assert!(scores[1] > 0.0);
        assert_eq!(scores[2], 0.0);
        assert_eq!(scores[3], 0.0);

        let forged = engine.statistics().get_statistics("provider-2").unwrap().unwrap();
        assert_eq!(forged.attempts(TaskKind::Store), 1);
        assert_eq!(forged.successes(TaskKind::Store), 0);
        let silent = engine.statistics().get_statistics("provider-3").unwrap().unwrap();
        assert_eq!(silent.attempts(TaskKind::Store), 1);
    }

    #[tokio::test]
    async fn test_challenge_and_retrieve_rounds() {
        let engine = new_engine();
        let dispatcher = Dispatcher::new(Arc::new(HonestishProvider), 4).unwrap();

        let tasks = assignments(|| TaskRequest::Challenge(engine.challenge_request("key", 2, 8)));
        let challenge = engine.run_round(&dispatcher, TaskKind::Challenge, tasks).await.unwrap();
        assert_eq!(challenge.verified, 2);

        let tasks = assignments(|| TaskRequest::Retrieve(engine.retrieve_request("key")));
        let retrieve = engine.run_round(&dispatcher, TaskKind::Retrieve, tasks).await.unwrap();
        assert_eq!(retrieve.verified, 2);
        // Lost data is penalized
        assert!(retrieve.scaled_rewards[2] < 0.0);
        assert_eq!(engine.rounds_completed(), 2);
    }

    #[tokio::test]
    async fn test_foreign_seed_is_stale() {
        let engine = new_engine();
        let dispatcher = Dispatcher::new(Arc::new(HonestishProvider), 4).unwrap();
        let tasks = assignments(|| {
            let mut request = engine.store_request(PAYLOAD);
            request.seed = "not-issued-here".to_string();
            TaskRequest::Store(request)
        });
        let outcome = engine.run_round(&dispatcher, TaskKind::Store, tasks).await.unwrap();
        assert_eq!(outcome.verified, 0);
    }

    #[test]
    fn test_verify_operation() {
        let engine = new_engine();
        let request = prover::answer_store(engine.store_request(PAYLOAD)).unwrap();
        let request = TaskRequest::Store(request);

        assert_eq!(engine.verify(TaskKind::Store, &request).unwrap(), (true, "verified".to_string()));
        let (ok, reason) = engine.verify(TaskKind::Retrieve, &request).unwrap();
        assert!(!ok);
        assert!(reason.contains("task kind"));

        let mut garbled = prover::answer_store(engine.store_request(PAYLOAD)).unwrap();
        garbled.curve = "garbage".to_string();
        let (ok, reason) = engine.verify(TaskKind::Store, &TaskRequest::Store(garbled)).unwrap();
        assert!(!ok);
        assert!(reason.contains("curve"));
    }

    #[test]
    fn test_signer_derived_crs() {
        let signer = Ed25519Signer::from_secret_bytes(&[9u8; 32]).unwrap();
        let crs = derive_crs(&signer, CurveId::Secp256k1, b"validator-0").unwrap();
        let engine =
            ProofEngine::with_crs(EngineConfig::default(), Arc::new(MemoryStore::new()), crs)
                .unwrap();
        assert_eq!(engine.crs(), &crs);
        assert_eq!(engine.store_request(PAYLOAD).h, crs.h.to_hex());
        assert_eq!(engine.seeds().outstanding(), 1);
    }

    #[test]
    fn test_statistics_and_tier_operations() {
        let engine = new_engine();
        assert_eq!(engine.compute_tier("nobody").unwrap(), Tier::Bronze);
        for _ in 0..520 {
            engine.record_outcome("steady", TaskKind::Challenge, true).unwrap();
        }
        assert_eq!(engine.compute_tier("steady").unwrap(), Tier::Silver);
        assert!((engine.tier_factor("steady", false).unwrap() - 0.65).abs() < 1e-12);
        assert!(engine.refresh_tiers().unwrap().is_empty());
    }

    #[test]
    fn test_reward_persistence() {
        let engine = new_engine();
        let entries = vec![RoundEntry {
            uid: 1,
            provider_id: "provider-1".to_string(),
            verified: true,
            response_time: Some(0.2),
            data_size: 1024,
        }];
        let scores = engine.scale_and_apply_rewards(&entries, &[1.0]).unwrap();
        assert!((scores[1] - 0.05).abs() < 1e-9);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rewards.json");
        engine.save_rewards(&path).unwrap();

        let fresh = new_engine();
        fresh.load_rewards(&path).unwrap();
        assert_eq!(fresh.reward_scores(), scores);
        assert_eq!(fresh.normalized_weights(), vec![0.0, 1.0]);
    }
}
