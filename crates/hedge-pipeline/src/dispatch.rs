//! Bounded fan-out of per-symbol work
//!
//! The dispatch pool launches one retry-wrapped invocation per symbol, never
//! more than `concurrency_limit` at a time, and streams each completion to a
//! channel as soon as it finishes. Completion order is first-to-finish and
//! carries no meaning; presentation order is restored by the aggregator.

use crate::invoker::AgentInvoker;
use crate::retry::{Analysis, RetryController};
use hedge_core::{Error, ErrorKind, Failure, Result, Symbol, Task};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Semaphore, mpsc};
use tokio::task::{Id, JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// The final word on one symbol, as emitted by the pool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub symbol: Symbol,
    pub result: std::result::Result<Analysis, Failure>,
}

impl Completion {
    fn failed(symbol: Symbol, kind: ErrorKind, attempts: u32, message: impl Into<String>) -> Self {
        let failure = Failure::new(symbol.clone(), kind, attempts, message);
        Self {
            symbol,
            result: Err(failure),
        }
    }
}

/// Worker pool bounding concurrent agent invocations
///
/// The pool is cheap to clone; clones share the same admission gate.
#[derive(Clone)]
pub struct DispatchPool {
    invoker: AgentInvoker,
    retry: Arc<RetryController>,
    permits: Arc<Semaphore>,
    concurrency_limit: usize,
}

impl DispatchPool {
    /// Create a pool admitting at most `concurrency_limit` invocations at once
    pub fn new(
        invoker: AgentInvoker,
        retry: RetryController,
        concurrency_limit: usize,
    ) -> Result<Self> {
        if concurrency_limit == 0 || concurrency_limit > Semaphore::MAX_PERMITS {
            return Err(Error::PoolInitialization(format!(
                "concurrency limit must be between 1 and {}, got {}",
                Semaphore::MAX_PERMITS,
                concurrency_limit
            )));
        }

        Ok(Self {
            invoker,
            retry: Arc::new(retry),
            permits: Arc::new(Semaphore::new(concurrency_limit)),
            concurrency_limit,
        })
    }

    pub fn concurrency_limit(&self) -> usize {
        self.concurrency_limit
    }

    /// Launch one invocation per symbol and return the completion stream
    ///
    /// Every symbol yields exactly one [`Completion`]. Once `cancel` fires,
    /// no further symbols are launched: those still waiting for a slot
    /// complete immediately as `Cancelled` with zero attempts, and in-flight
    /// ones complete as `Cancelled` once they observe the signal.
    ///
    /// Must be called from within a tokio runtime.
    pub fn dispatch(
        &self,
        symbols: Vec<Symbol>,
        task: Task,
        cancel: CancellationToken,
    ) -> mpsc::Receiver<Completion> {
        // One slot per symbol, so workers never wait on the consumer
        let (tx, rx) = mpsc::channel(symbols.len().max(1));
        let pool = self.clone();
        tokio::spawn(async move { pool.drive(symbols, task, cancel, tx).await });
        rx
    }

    async fn drive(
        self,
        symbols: Vec<Symbol>,
        task: Task,
        cancel: CancellationToken,
        tx: mpsc::Sender<Completion>,
    ) {
        let mut workers = JoinSet::new();
        let mut in_flight: HashMap<Id, Symbol> = HashMap::new();
        let mut queue = symbols.into_iter();
        let mut next = queue.next();

        while let Some(symbol) = next.take() {
            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    next = Some(symbol);
                    break;
                }
                Some(joined) = workers.join_next_with_id(), if !workers.is_empty() => {
                    forward(joined, &mut in_flight, &tx).await;
                    next = Some(symbol);
                }
                permit = Arc::clone(&self.permits).acquire_owned() => {
                    let Ok(permit) = permit else {
                        warn!("Admission gate closed; {} will not be launched", symbol);
                        next = Some(symbol);
                        break;
                    };

                    debug!(
                        "Launching {} ({} slot(s) left)",
                        symbol,
                        self.permits.available_permits()
                    );

                    let invoker = self.invoker.clone();
                    let retry = Arc::clone(&self.retry);
                    let task = task.clone();
                    let cancel = cancel.clone();
                    let worker_symbol = symbol.clone();
                    let handle = workers.spawn(async move {
                        // Released on every exit path, including cancellation and panics
                        let _permit = permit;
                        let result = retry
                            .invoke_with_retry(&invoker, &worker_symbol, &task, &cancel)
                            .await;
                        Completion {
                            symbol: worker_symbol,
                            result,
                        }
                    });
                    in_flight.insert(handle.id(), symbol);
                    next = queue.next();
                }
            }
        }

        // Anything still queued was never started
        for symbol in next.into_iter().chain(queue) {
            debug!("Not launching {}: run cancelled", symbol);
            send(
                &tx,
                Completion::failed(symbol, ErrorKind::Cancelled, 0, "run cancelled before dispatch"),
            )
            .await;
        }

        while let Some(joined) = workers.join_next_with_id().await {
            forward(joined, &mut in_flight, &tx).await;
        }
    }
}

async fn forward(
    joined: std::result::Result<(Id, Completion), JoinError>,
    in_flight: &mut HashMap<Id, Symbol>,
    tx: &mpsc::Sender<Completion>,
) {
    let completion = match joined {
        Ok((id, completion)) => {
            in_flight.remove(&id);
            completion
        }
        Err(err) => {
            let Some(symbol) = in_flight.remove(&err.id()) else {
                warn!("Worker {} ended without a known symbol: {}", err.id(), err);
                return;
            };
            warn!("Worker for {} did not finish: {}", symbol, err);
            let message = if err.is_panic() {
                "agent worker panicked"
            } else {
                "agent worker was aborted"
            };
            Completion::failed(symbol, ErrorKind::Unknown, 0, message)
        }
    };

    send(tx, completion).await;
}

async fn send(tx: &mpsc::Sender<Completion>, completion: Completion) {
    let symbol = completion.symbol.clone();
    if tx.send(completion).await.is_err() {
        debug!("Completion for {} discarded: collector has stopped", symbol);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::RetryPolicy;
    use async_trait::async_trait;
    use hedge_core::{AgentError, AgentOutput, AnalysisAgent};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Sleeps, then succeeds; tracks peak concurrency
    #[derive(Default)]
    struct GaugeAgent {
        current: AtomicUsize,
        peak: AtomicUsize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl AnalysisAgent for GaugeAgent {
        async fn analyze(&self, symbol: &Symbol, _task: &Task) -> std::result::Result<AgentOutput, AgentError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            self.current.fetch_sub(1, Ordering::SeqCst);
            Ok(AgentOutput::text(format!("ok-{symbol}")))
        }
    }

    /// Panics for one symbol
    struct PanickyAgent;

    #[async_trait]
    impl AnalysisAgent for PanickyAgent {
        async fn analyze(&self, symbol: &Symbol, _task: &Task) -> std::result::Result<AgentOutput, AgentError> {
            assert_ne!(symbol.as_str(), "BOOM", "agent blew up");
            Ok(AgentOutput::empty())
        }
    }

    fn symbols(names: &[&str]) -> Vec<Symbol> {
        names.iter().map(|n| Symbol::parse(n).unwrap()).collect()
    }

    fn pool(agent: Arc<dyn AnalysisAgent>, limit: usize) -> DispatchPool {
        let invoker = AgentInvoker::new(agent, Duration::from_secs(60));
        DispatchPool::new(invoker, RetryController::new(RetryPolicy::fast()), limit).unwrap()
    }

    async fn drain(mut rx: mpsc::Receiver<Completion>) -> Vec<Completion> {
        let mut out = Vec::new();
        while let Some(c) = rx.recv().await {
            out.push(c);
        }
        out
    }

    #[test]
    fn test_rejects_zero_concurrency() {
        let invoker = AgentInvoker::new(Arc::new(PanickyAgent), Duration::from_secs(1));
        let result = DispatchPool::new(invoker, RetryController::new(RetryPolicy::fast()), 0);
        assert!(matches!(result, Err(Error::PoolInitialization(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_each_symbol_once_within_limit() {
        let agent = Arc::new(GaugeAgent::default());
        let pool = pool(agent.clone(), 2);
        let names = ["A", "B", "C", "D", "E", "F", "G"];

        let completions = drain(pool.dispatch(
            symbols(&names),
            Task::from("t"),
            CancellationToken::new(),
        ))
        .await;

        assert_eq!(completions.len(), names.len());
        let mut seen: Vec<&str> = completions.iter().map(|c| c.symbol.as_str()).collect();
        seen.sort_unstable();
        assert_eq!(seen, names);
        assert!(completions.iter().all(|c| c.result.is_ok()));
        assert_eq!(agent.calls.load(Ordering::SeqCst), names.len());
        assert!(agent.peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(pool.permits.available_permits(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_skips_unstarted_symbols() {
        let agent = Arc::new(GaugeAgent::default());
        let pool = pool(agent.clone(), 1);
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(75)).await;
            trigger.cancel();
        });

        let completions = drain(pool.dispatch(symbols(&["A", "B", "C", "D"]), Task::from("t"), cancel)).await;

        assert_eq!(completions.len(), 4);
        let by_symbol: HashMap<&str, &Completion> =
            completions.iter().map(|c| (c.symbol.as_str(), c)).collect();

        // A finished at 50ms, B was in flight at 75ms, C and D never started
        assert!(by_symbol["A"].result.is_ok());
        let b = by_symbol["B"].result.as_ref().unwrap_err();
        assert_eq!((b.kind, b.attempts), (ErrorKind::Cancelled, 1));
        for name in ["C", "D"] {
            let failure = by_symbol[name].result.as_ref().unwrap_err();
            assert_eq!((failure.kind, failure.attempts), (ErrorKind::Cancelled, 0));
        }
        assert_eq!(agent.calls.load(Ordering::SeqCst), 2);
        assert_eq!(pool.permits.available_permits(), 1);
    }

    #[tokio::test]
    async fn test_panicking_worker_becomes_failure() {
        let pool = pool(Arc::new(PanickyAgent), 2);

        let completions =
            drain(pool.dispatch(symbols(&["OK", "BOOM"]), Task::from("t"), CancellationToken::new())).await;

        assert_eq!(completions.len(), 2);
        let boom = completions.iter().find(|c| c.symbol.as_str() == "BOOM").unwrap();
        let failure = boom.result.as_ref().unwrap_err();
        assert_eq!(failure.kind, ErrorKind::Unknown);
        assert!(failure.message.contains("panicked"));
        assert_eq!(pool.permits.available_permits(), 2);
    }
}
