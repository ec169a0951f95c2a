//! Progress reporting for searches

#[cfg(feature = "progress")]
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::chain::PathChain;

/// A trait for reporting progress while roots are searched.
///
/// Reporters are shared by every concurrent descent.
pub trait ProgressReporter: Send + Sync {
    /// Called before a root path is opened
    fn on_root_start(&self, root: &PathChain);

    /// Called for every entry read from a container
    fn on_entry(&self, chain: &PathChain);

    /// Called when a root is done, whether or not it failed
    fn on_root_finish(&self, root: &PathChain);
}

/// A no-op progress reporter
#[derive(Default)]
pub struct NoProgressReporter;

impl ProgressReporter for NoProgressReporter {
    fn on_root_start(&self, _root: &PathChain) {}
    fn on_entry(&self, _chain: &PathChain) {}
    fn on_root_finish(&self, _root: &PathChain) {}
}

/// Progress reporter using an indicatif spinner
#[cfg(feature = "progress")]
pub struct IndicatifProgressReporter {
    progress_bar: ProgressBar,
    active_roots: AtomicUsize,
}

#[cfg(feature = "progress")]
impl IndicatifProgressReporter {
    /// Create a new indicatif progress reporter
    pub fn new(progress_bar: ProgressBar) -> Self {
        Self {
            progress_bar,
            active_roots: AtomicUsize::new(0),
        }
    }

    /// Create a spinner that counts scanned entries
    pub fn with_default_style() -> Self {
        let progress_bar = ProgressBar::new_spinner();
        progress_bar.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {pos} entries ({per_sec}) {wide_msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        progress_bar.enable_steady_tick(std::time::Duration::from_millis(100));
        Self::new(progress_bar)
    }

    pub fn progress_bar(&self) -> &ProgressBar {
        &self.progress_bar
    }
}

#[cfg(feature = "progress")]
impl ProgressReporter for IndicatifProgressReporter {
    fn on_root_start(&self, root: &PathChain) {
        self.active_roots.fetch_add(1, Ordering::Relaxed);
        self.progress_bar.set_message(root.to_string());
    }

    fn on_entry(&self, chain: &PathChain) {
        self.progress_bar.inc(1);
        if chain.depth() == 1 {
            self.progress_bar.set_message(chain.to_string());
        }
    }

    fn on_root_finish(&self, _root: &PathChain) {
        if self.active_roots.fetch_sub(1, Ordering::Relaxed) == 1 {
            self.progress_bar.set_message("");
        }
    }
}

/// Counts entries and roots, useful to inspect a search after the fact
#[derive(Default)]
pub struct CountingProgressReporter {
    roots: AtomicUsize,
    entries: AtomicUsize,
}

impl CountingProgressReporter {
    pub fn roots(&self) -> usize {
        self.roots.load(Ordering::Relaxed)
    }

    pub fn entries(&self) -> usize {
        self.entries.load(Ordering::Relaxed)
    }
}

impl ProgressReporter for CountingProgressReporter {
    fn on_root_start(&self, _root: &PathChain) {}

    fn on_entry(&self, _chain: &PathChain) {
        self.entries.fetch_add(1, Ordering::Relaxed);
    }

    fn on_root_finish(&self, _root: &PathChain) {
        self.roots.fetch_add(1, Ordering::Relaxed);
    }
}

impl<P: ProgressReporter + ?Sized> ProgressReporter for std::sync::Arc<P> {
    fn on_root_start(&self, root: &PathChain) {
        (**self).on_root_start(root)
    }

    fn on_entry(&self, chain: &PathChain) {
        (**self).on_entry(chain)
    }

    fn on_root_finish(&self, root: &PathChain) {
        (**self).on_root_finish(root)
    }
}
