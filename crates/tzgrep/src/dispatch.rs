//! Concurrent search over many root paths using tokio

use std::path::PathBuf;

use tokio::sync::mpsc;
use tokio::task::JoinSet;

use crate::{result::SearchResult, searcher::Searcher};

impl Searcher {
    /// Search every root concurrently and stream the results.
    ///
    /// Each root is searched on its own blocking task. Results of a single
    /// root arrive depth-first in archive order, results of different roots
    /// interleave freely. The channel is closed once every root has finished.
    /// Dropping the receiver stops the remaining searches at the next result
    /// they produce.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start<I, P>(&self, roots: I) -> mpsc::Receiver<SearchResult>
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let (tx, rx) = mpsc::channel(self.channel_capacity());

        let mut tasks = JoinSet::new();
        for root in roots {
            let root = root.into();
            let searcher = self.clone();
            let tx = tx.clone();
            tasks.spawn_blocking(move || {
                let _ = searcher.search_path(&root, &tx);
            });
        }
        tracing::debug!("searching {} roots", tasks.len());

        tokio::spawn(async move {
            while let Some(joined) = tasks.join_next().await {
                if let Err(err) = joined {
                    tracing::error!("root search did not complete: {err}");
                }
            }
            // The last sender goes away here, which closes the channel.
            drop(tx);
            tracing::debug!("all roots searched");
        });

        rx
    }

    /// Search every root concurrently and collect all results
    pub async fn search<I, P>(&self, roots: I) -> Vec<SearchResult>
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let mut rx = self.start(roots);
        let mut results = Vec::new();
        while let Some(result) = rx.recv().await {
            results.push(result);
        }
        results
    }
}
