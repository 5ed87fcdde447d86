//! Fan-in of per-symbol completions
//!
//! The aggregator is the only writer of the run's outcome map. Workers hand
//! their results over through the completion stream; the aggregator stamps
//! each with a sequence number and guarantees that the finished
//! [`RunOutcome`] has exactly one entry per portfolio symbol.

use crate::dispatch::Completion;
use hedge_core::{AgentResult, ErrorKind, Failure, Outcome, Symbol};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Outcome of every symbol in a run, keyed by symbol
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOutcome {
    outcomes: HashMap<Symbol, Outcome>,
}

impl RunOutcome {
    pub fn get(&self, symbol: &Symbol) -> Option<&Outcome> {
        self.outcomes.get(symbol)
    }

    pub fn contains(&self, symbol: &Symbol) -> bool {
        self.outcomes.contains_key(symbol)
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Entries in arbitrary order
    pub fn iter(&self) -> impl Iterator<Item = (&Symbol, &Outcome)> {
        self.outcomes.iter()
    }

    pub fn successes(&self) -> usize {
        self.outcomes.values().filter(|o| o.is_success()).count()
    }
}

/// Single-writer collector of a run's completions
#[derive(Debug)]
pub struct ResultAggregator {
    outcomes: HashMap<Symbol, Option<Outcome>>,
    remaining: usize,
    next_sequence: u64,
}

impl ResultAggregator {
    /// Create an aggregator expecting exactly the given symbols
    pub fn new(symbols: &[Symbol]) -> Self {
        let outcomes: HashMap<Symbol, Option<Outcome>> =
            symbols.iter().map(|s| (s.clone(), None)).collect();
        let remaining = outcomes.len();
        Self {
            outcomes,
            remaining,
            next_sequence: 0,
        }
    }

    /// Whether every expected symbol has an outcome
    pub fn is_complete(&self) -> bool {
        self.remaining == 0
    }

    /// Symbols still waiting for an outcome
    pub fn pending(&self) -> Vec<Symbol> {
        let mut pending: Vec<Symbol> = self
            .outcomes
            .iter()
            .filter(|(_, o)| o.is_none())
            .map(|(s, _)| s.clone())
            .collect();
        pending.sort();
        pending
    }

    /// Record one completion
    ///
    /// The first completion for a symbol wins. Later completions for the
    /// same symbol, and completions for symbols outside the portfolio, are
    /// anomalies: they are logged and discarded, and `false` is returned.
    pub fn record(&mut self, completion: Completion) -> bool {
        let Completion { symbol, result } = completion;

        let Some(slot) = self.outcomes.get_mut(&symbol) else {
            warn!("Discarding completion for {}: not part of this run", symbol);
            return false;
        };

        if slot.is_some() {
            warn!("Discarding duplicate completion for {}: first result wins", symbol);
            return false;
        }

        let sequence = self.next_sequence;
        self.next_sequence += 1;

        let outcome = match result {
            Ok(analysis) => Outcome::Success(AgentResult {
                symbol: symbol.clone(),
                payload: analysis.payload,
                attempts: analysis.attempts,
                sequence,
            }),
            Err(failure) => Outcome::Failure(failure),
        };

        debug!(
            "Recorded {} for {} (#{}, {} pending)",
            if outcome.is_success() { "success" } else { "failure" },
            symbol,
            sequence,
            self.remaining - 1
        );

        *slot = Some(outcome);
        self.remaining -= 1;
        true
    }

    /// Consume completions until every symbol is resolved or the deadline passes
    ///
    /// Symbols still pending at the deadline resolve to a `Timeout` failure
    /// with zero recorded attempts.
    pub async fn collect(
        mut self,
        completions: &mut mpsc::Receiver<Completion>,
        deadline: Option<Duration>,
    ) -> RunOutcome {
        let deadline_at = deadline.map(|d| Instant::now() + d);

        while !self.is_complete() {
            let next = match deadline_at {
                Some(at) => {
                    if let Ok(next) = tokio::time::timeout_at(at, completions.recv()).await {
                        next
                    } else {
                        warn!(
                            "Run deadline elapsed with {} symbol(s) unfinished",
                            self.remaining
                        );
                        self.resolve_pending(ErrorKind::Timeout, "run deadline elapsed");
                        break;
                    }
                }
                None => completions.recv().await,
            };

            match next {
                Some(completion) => {
                    self.record(completion);
                }
                None => {
                    warn!(
                        "Completion stream closed with {} symbol(s) unresolved",
                        self.remaining
                    );
                    self.resolve_pending(
                        ErrorKind::Unknown,
                        "completion stream closed before the symbol finished",
                    );
                    break;
                }
            }
        }

        self.finish()
    }

    /// Resolve every pending symbol to a failure of the given kind
    pub fn resolve_pending(&mut self, kind: ErrorKind, message: &str) {
        for (symbol, slot) in &mut self.outcomes {
            if slot.is_none() {
                *slot = Some(Outcome::Failure(Failure::new(
                    symbol.clone(),
                    kind,
                    0,
                    message,
                )));
            }
        }
        self.remaining = 0;
    }

    /// Finish aggregation
    ///
    /// Any symbol still pending is resolved as `Unknown` so the result
    /// always covers the whole portfolio.
    pub fn finish(mut self) -> RunOutcome {
        if !self.is_complete() {
            self.resolve_pending(ErrorKind::Unknown, "no completion received");
        }

        let outcomes = self
            .outcomes
            .into_iter()
            .filter_map(|(symbol, slot)| slot.map(|outcome| (symbol, outcome)))
            .collect();
        RunOutcome { outcomes }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::Analysis;

    fn sym(name: &str) -> Symbol {
        Symbol::parse(name).unwrap()
    }

    fn ok(name: &str, payload: &str) -> Completion {
        Completion {
            symbol: sym(name),
            result: Ok(Analysis {
                payload: Some(payload.to_string()),
                attempts: 1,
            }),
        }
    }

    fn err(name: &str, kind: ErrorKind) -> Completion {
        Completion {
            symbol: sym(name),
            result: Err(Failure::new(sym(name), kind, 1, "boom")),
        }
    }

    #[test]
    fn test_record_assigns_sequence_in_completion_order() {
        let mut aggregator = ResultAggregator::new(&[sym("NVDA"), sym("TSLA")]);
        assert!(aggregator.record(ok("TSLA", "first")));
        assert!(aggregator.record(ok("NVDA", "second")));
        assert!(aggregator.is_complete());

        let outcome = aggregator.finish();
        let tsla = outcome.get(&sym("TSLA")).and_then(Outcome::as_success).unwrap();
        let nvda = outcome.get(&sym("NVDA")).and_then(Outcome::as_success).unwrap();
        assert_eq!(tsla.sequence, 0);
        assert_eq!(nvda.sequence, 1);
    }

    #[test]
    fn test_first_write_wins() {
        let mut aggregator = ResultAggregator::new(&[sym("NVDA")]);
        assert!(aggregator.record(ok("NVDA", "original")));
        assert!(!aggregator.record(err("NVDA", ErrorKind::Transient)));

        let outcome = aggregator.finish();
        assert_eq!(outcome.len(), 1);
        let result = outcome.get(&sym("NVDA")).and_then(Outcome::as_success).unwrap();
        assert_eq!(result.payload.as_deref(), Some("original"));
    }

    #[test]
    fn test_unknown_symbol_rejected() {
        let mut aggregator = ResultAggregator::new(&[sym("NVDA")]);
        assert!(!aggregator.record(ok("MSFT", "stray")));
        assert_eq!(aggregator.pending(), vec![sym("NVDA")]);

        let outcome = aggregator.finish();
        assert!(!outcome.contains(&sym("MSFT")));
        assert_eq!(
            outcome.get(&sym("NVDA")).and_then(Outcome::as_failure).map(|f| f.kind),
            Some(ErrorKind::Unknown)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_collect_resolves_pending_at_deadline() {
        let (tx, mut rx) = mpsc::channel(4);
        tx.send(ok("NVDA", "done")).await.unwrap();

        let aggregator = ResultAggregator::new(&[sym("NVDA"), sym("TSLA")]);
        let outcome = aggregator
            .collect(&mut rx, Some(Duration::from_secs(5)))
            .await;

        assert_eq!(outcome.len(), 2);
        assert!(outcome.get(&sym("NVDA")).is_some_and(Outcome::is_success));
        let tsla = outcome.get(&sym("TSLA")).and_then(Outcome::as_failure).unwrap();
        assert_eq!((tsla.kind, tsla.attempts), (ErrorKind::Timeout, 0));
        drop(tx);
    }

    #[tokio::test]
    async fn test_collect_handles_closed_stream() {
        let (tx, mut rx) = mpsc::channel(4);
        tx.send(err("NVDA", ErrorKind::InvalidInput)).await.unwrap();
        drop(tx);

        let outcome = ResultAggregator::new(&[sym("NVDA"), sym("TSLA")])
            .collect(&mut rx, None)
            .await;

        assert_eq!(outcome.successes(), 0);
        assert_eq!(
            outcome.get(&sym("NVDA")).and_then(Outcome::as_failure).map(|f| f.kind),
            Some(ErrorKind::InvalidInput)
        );
        assert_eq!(
            outcome.get(&sym("TSLA")).and_then(Outcome::as_failure).map(|f| f.kind),
            Some(ErrorKind::Unknown)
        );
    }
}
