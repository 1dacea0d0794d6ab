//! Bounded fan-out of requests to providers, fan-in of whatever comes back.

use futures::future::join_all;
use log::{debug, trace};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;

use crate::core::errors::{ProofError, ProofResult};
use crate::core::types::Uid;
use crate::network::transport::{QueryResult, Transport, TransportError};
use crate::verification::requests::TaskRequest;

pub struct Dispatcher {
    transport: Arc<dyn Transport>,
    permits: Arc<Semaphore>,
    max_in_flight: usize,
}

impl Dispatcher {
    pub fn new(transport: Arc<dyn Transport>, max_in_flight: usize) -> ProofResult<Self> {
        if max_in_flight == 0 {
            return Err(ProofError::Config {
                reason: "max_in_flight must be at least 1".to_string(),
            });
        }
        Ok(Self {
            transport,
            permits: Arc::new(Semaphore::new(max_in_flight)),
            max_in_flight,
        })
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight
    }

    /// Send the same request to every uid
    pub async fn query_all(
        &self,
        uids: &[Uid],
        request: &TaskRequest,
        timeout: Duration,
    ) -> Vec<QueryResult> {
        let requests = uids.iter().map(|&uid| (uid, request.clone())).collect();
        self.query_each(requests, timeout).await
    }

    /// Send one request per uid; results keep the input order.
    ///
    /// Each call gets its own timeout, so a hung provider only costs its own
    /// slot. Waiting for a permit does not count against the timeout.
    pub async fn query_each(
        &self,
        requests: Vec<(Uid, TaskRequest)>,
        timeout: Duration,
    ) -> Vec<QueryResult> {
        debug!(
            "Dispatching {} requests (max {} in flight, timeout {:?})",
            requests.len(),
            self.max_in_flight,
            timeout
        );
        let calls = requests
            .into_iter()
            .map(|(uid, request)| self.query_one(uid, request, timeout));
        join_all(calls).await
    }

    async fn query_one(&self, uid: Uid, request: TaskRequest, timeout: Duration) -> QueryResult {
        let _permit = match self.permits.acquire().await {
            Ok(permit) => permit,
            Err(_) => return QueryResult::failed(uid, &TransportError::Closed),
        };

        let started = Instant::now();
        match tokio::time::timeout(timeout, self.transport.send(uid, request, timeout)).await {
            Ok(Ok(response)) => {
                let elapsed = started.elapsed().as_secs_f64();
                trace!("Provider {} answered in {:.3}s", uid, elapsed);
                QueryResult::answered(uid, response, elapsed)
            }
            Ok(Err(err)) => {
                debug!("Provider {} failed: {}", uid, err);
                QueryResult::failed(uid, &err)
            }
            Err(_) => {
                let err = TransportError::Timeout {
                    uid,
                    timeout_ms: timeout.as_millis() as u64,
                };
                debug!("{}", err);
                QueryResult::failed(uid, &err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verification::requests::RetrieveRequest;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Answers after `uid * 10` ms; uid 99 hangs, uid 13 errors
    struct SlowTransport {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    impl SlowTransport {
        fn new() -> Self {
            Self {
                in_flight: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Transport for SlowTransport {
        async fn send(
            &self,
            uid: Uid,
            request: TaskRequest,
            _timeout: Duration,
        ) -> Result<TaskRequest, TransportError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);

            let delay = if uid == 99 { 10_000 } else { uid as u64 * 10 };
            tokio::time::sleep(Duration::from_millis(delay)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if uid == 13 {
                return Err(TransportError::Unreachable {
                    uid,
                    reason: "connection refused".to_string(),
                });
            }
            Ok(request)
        }
    }

    fn request() -> TaskRequest {
        TaskRequest::Retrieve(RetrieveRequest::new("ab".repeat(32), "cd".repeat(32)))
    }

    #[tokio::test]
    async fn test_hung_provider_does_not_block_others() {
        let dispatcher = Dispatcher::new(Arc::new(SlowTransport::new()), 8).unwrap();
        let started = Instant::now();
        let results = dispatcher
            .query_all(&[1, 99, 2, 13], &request(), Duration::from_millis(300))
            .await;

        assert!(started.elapsed() < Duration::from_secs(5));
        let uids: Vec<Uid> = results.iter().map(|r| r.uid).collect();
        assert_eq!(uids, vec![1, 99, 2, 13]);

        assert!(results[0].has_response());
        assert!(results[0].process_time.unwrap() < 0.3);
        assert!(!results[1].has_response());
        assert!(results[1].error.as_deref().unwrap().contains("did not answer"));
        assert!(results[2].has_response());
        assert!(!results[3].has_response());
        assert_eq!(results[3].process_time, None);
    }

    #[tokio::test]
    async fn test_in_flight_is_bounded() {
        let transport = Arc::new(SlowTransport::new());
        let dispatcher = Dispatcher::new(transport.clone(), 2).unwrap();
        let uids: Vec<Uid> = (1..=6).collect();
        let results = dispatcher
            .query_all(&uids, &request(), Duration::from_secs(2))
            .await;

        assert!(results.iter().all(QueryResult::has_response));
        assert!(transport.peak.load(Ordering::SeqCst) <= 2);
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        assert!(Dispatcher::new(Arc::new(SlowTransport::new()), 0).is_err());
    }
}
