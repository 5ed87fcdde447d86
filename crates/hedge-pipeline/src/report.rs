//! Final artifact of a pipeline run

use crate::aggregator::RunOutcome;
use hedge_core::{ErrorKind, Outcome, Symbol};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Overall classification of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OverallStatus {
    /// Every symbol succeeded
    Complete,
    /// At least one symbol succeeded and at least one failed
    Partial,
    /// No symbol succeeded
    Failed,
}

impl OverallStatus {
    /// Classify a run from the number of successes out of `total`
    pub fn classify(successes: usize, total: usize) -> Self {
        if total > 0 && successes == total {
            OverallStatus::Complete
        } else if successes == 0 {
            OverallStatus::Failed
        } else {
            OverallStatus::Partial
        }
    }
}

impl fmt::Display for OverallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverallStatus::Complete => write!(f, "Complete"),
            OverallStatus::Partial => write!(f, "Partial"),
            OverallStatus::Failed => write!(f, "Failed"),
        }
    }
}

/// Result of a run: every symbol's outcome, in portfolio order
///
/// Partial failure is an ordinary report, not an error. Callers tell "no
/// result" (a failure entry) apart from "empty result" (a success with no
/// payload) by inspecting each entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(into = "ReportSummary")]
pub struct Report {
    status: OverallStatus,
    symbols: Vec<Symbol>,
    outcomes: RunOutcome,
}

impl Report {
    /// Build a report for symbols supplied in `symbols` order
    pub fn new(symbols: Vec<Symbol>, outcomes: RunOutcome) -> Self {
        let status = OverallStatus::classify(outcomes.successes(), outcomes.len());
        Self {
            status,
            symbols,
            outcomes,
        }
    }

    pub fn overall_status(&self) -> OverallStatus {
        self.status
    }

    /// Symbols in the order the portfolio was supplied
    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    pub fn outcomes(&self) -> &RunOutcome {
        &self.outcomes
    }

    pub fn outcome(&self, symbol: &Symbol) -> Option<&Outcome> {
        self.outcomes.get(symbol)
    }

    /// Outcomes in portfolio order
    pub fn iter(&self) -> impl Iterator<Item = &Outcome> {
        self.symbols.iter().filter_map(|s| self.outcomes.get(s))
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes.successes()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.outcomes.successes()
    }

    /// Serializable view of the report
    pub fn summary(&self) -> ReportSummary {
        ReportSummary {
            overall_status: self.status,
            results: self.iter().map(ReportEntry::from).collect(),
        }
    }
}

impl From<Report> for ReportSummary {
    fn from(report: Report) -> Self {
        report.summary()
    }
}

/// Status of one report entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    Ok,
    Error,
}

/// One symbol's line in a serialized report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportEntry {
    pub symbol: Symbol,
    pub status: EntryStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempts: Option<u32>,
}

impl From<&Outcome> for ReportEntry {
    fn from(outcome: &Outcome) -> Self {
        match outcome {
            Outcome::Success(result) => Self {
                symbol: result.symbol.clone(),
                status: EntryStatus::Ok,
                payload: result.payload.clone(),
                error_kind: None,
                error_message: None,
                attempts: Some(result.attempts),
            },
            Outcome::Failure(failure) => Self {
                symbol: failure.symbol.clone(),
                status: EntryStatus::Error,
                payload: None,
                error_kind: Some(failure.kind),
                error_message: Some(failure.message.clone()),
                attempts: Some(failure.attempts),
            },
        }
    }
}

/// Caller-facing representation of a [`Report`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    pub overall_status: OverallStatus,
    pub results: Vec<ReportEntry>,
}
