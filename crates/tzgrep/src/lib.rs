//! Find entries by name inside nested, compressed tar archives
//!
//! This crate streams through files and the tar containers nested inside
//! them (`.tar`, `.tar.gz`, `.tar.bz2`, `.tar.xz`, `.tar.zst` and their short
//! forms) without extracting anything to disk. Every entry whose own name
//! matches a regular expression is reported together with the chain of
//! containers that leads to it.
//!
//! # Features
//!
//! - Arbitrarily deep nesting of compressed containers
//! - One concurrent search per root path, results streamed over a channel
//! - gzip and bzip2 decoded in-process, xz and zstd through `xz`/`zstd` or
//!   in-process
//! - Failures are reported per branch and never abort the whole search
//! - Progress reporting via `indicatif`
//!
//! # Examples
//!
//! ## Streaming results
//!
//! ```no_run
//! use tzgrep::Searcher;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let searcher = Searcher::new(r"\.conf$")?;
//! let mut results = searcher.start(["backups/2024.tar.gz", "backups/2025.tar.zst"]);
//! while let Some(result) = results.recv().await {
//!     match result.error() {
//!         None => println!("{}", result.chain()),
//!         Some(err) => eprintln!("{}: {err}", result.chain()),
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Without external decompressors
//!
//! ```no_run
//! use tzgrep::{DecoderConfig, SearcherBuilder};
//!
//! let searcher = SearcherBuilder::new("README")
//!     .with_decoders(DecoderConfig::in_process())
//!     .build()?;
//! let file = std::fs::File::open("release.txz")?;
//! for result in searcher.scan_reader(file, "release.txz") {
//!     println!("{result}");
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod chain;
pub mod decompress;
pub mod dispatch;
pub mod error;
pub mod format;
pub mod matcher;
pub mod progress;
pub mod result;
pub mod searcher;

pub use chain::PathChain;
pub use decompress::{Backend, DecoderConfig, ExternalTool};
pub use error::{Result, SearchError};
pub use format::{ArchiveFormat, Compression};
pub use matcher::Matcher;
pub use result::{SearchResult, Sink};
pub use searcher::{Searcher, SearcherBuilder};

pub use progress::{CountingProgressReporter, NoProgressReporter, ProgressReporter};

#[cfg(feature = "progress")]
pub use progress::IndicatifProgressReporter;

/// Check if a name denotes a container that will be searched
pub fn is_container(name: &str) -> bool {
    ArchiveFormat::detect_from_filename(name).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_container() {
        assert!(is_container("a.tar"));
        assert!(is_container("A.TGZ"));
        assert!(!is_container("a.zip"));
        assert!(!is_container("notes.txt"));
    }
}
