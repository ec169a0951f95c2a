//! Search results and where they are delivered

use std::fmt;
use std::ops::ControlFlow;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::chain::PathChain;
use crate::error::SearchError;

/// A single emission of the search: either a matching chain or a failure at
/// a chain, never both
#[derive(Debug)]
pub enum SearchResult {
    /// The innermost name of the chain matched the pattern
    Match(PathChain),
    /// The branch ending at `chain` could not be searched
    Failure { chain: PathChain, error: SearchError },
}

impl SearchResult {
    pub fn failure(chain: PathChain, error: SearchError) -> Self {
        Self::Failure { chain, error }
    }

    pub fn chain(&self) -> &PathChain {
        match self {
            Self::Match(chain) | Self::Failure { chain, .. } => chain,
        }
    }

    pub fn is_match(&self) -> bool {
        matches!(self, Self::Match(_))
    }

    pub fn error(&self) -> Option<&SearchError> {
        match self {
            Self::Match(_) => None,
            Self::Failure { error, .. } => Some(error),
        }
    }
}

impl fmt::Display for SearchResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Match(chain) => chain.fmt(f),
            Self::Failure { chain, error } => write!(f, "{chain}: {error}"),
        }
    }
}

/// Receives the results of a descent.
///
/// Sinks are shared by every level of a descent, possibly across the helper
/// threads used by external decompressors, so they must be `Sync`.
pub trait Sink: Sync {
    /// Deliver a result. `Break` means nobody is listening anymore and the
    /// descent should stop.
    fn emit(&self, result: SearchResult) -> ControlFlow<()>;
}

/// Blocks until the receiver has room, which throttles the descent to the
/// speed of the consumer.
impl Sink for mpsc::Sender<SearchResult> {
    fn emit(&self, result: SearchResult) -> ControlFlow<()> {
        match self.blocking_send(result) {
            Ok(()) => ControlFlow::Continue(()),
            Err(_) => ControlFlow::Break(()),
        }
    }
}

/// Collects results in memory
impl Sink for Mutex<Vec<SearchResult>> {
    fn emit(&self, result: SearchResult) -> ControlFlow<()> {
        self.lock().push(result);
        ControlFlow::Continue(())
    }
}
