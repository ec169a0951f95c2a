//! Recursive search through nested containers

use std::io::{BufReader, Read};
use std::ops::ControlFlow;
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::{
    chain::PathChain,
    decompress::DecoderConfig,
    error::{Result, SearchError},
    format::ArchiveFormat,
    matcher::Matcher,
    progress::{NoProgressReporter, ProgressReporter},
    result::{SearchResult, Sink},
};

const DEFAULT_CHANNEL_CAPACITY: usize = 1;

/// Builder for configuring a search
pub struct SearcherBuilder {
    pattern: String,
    decoders: DecoderConfig,
    channel_capacity: usize,
    progress_reporter: Arc<dyn ProgressReporter>,
}

impl SearcherBuilder {
    /// Create a new builder that searches for names matching `pattern`
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            decoders: DecoderConfig::default(),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            progress_reporter: Arc::new(NoProgressReporter),
        }
    }

    /// Set how each compression is decoded
    pub fn with_decoders(mut self, decoders: DecoderConfig) -> Self {
        self.decoders = decoders;
        self
    }

    /// How many results may be buffered before the search waits for the
    /// consumer. Values below 1 are raised to 1.
    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }

    /// Set a custom progress reporter
    pub fn with_progress_reporter<R: ProgressReporter + 'static>(mut self, reporter: R) -> Self {
        self.progress_reporter = Arc::new(reporter);
        self
    }

    /// Report progress on an indicatif progress bar
    #[cfg(feature = "progress")]
    pub fn with_progress_bar(self, progress_bar: indicatif::ProgressBar) -> Self {
        self.with_progress_reporter(crate::progress::IndicatifProgressReporter::new(progress_bar))
    }

    /// Compile the pattern and build the searcher
    pub fn build(self) -> Result<Searcher> {
        let matcher = Matcher::new(&self.pattern)?;
        Ok(Searcher {
            inner: Arc::new(SearcherInner {
                matcher,
                decoders: self.decoders,
                channel_capacity: self.channel_capacity,
                progress_reporter: self.progress_reporter,
            }),
        })
    }
}

/// Searches root paths, and the containers nested inside them, for names
/// matching a pattern.
///
/// Cloning is cheap, clones share the compiled pattern and configuration.
#[derive(Clone)]
pub struct Searcher {
    inner: Arc<SearcherInner>,
}

struct SearcherInner {
    matcher: Matcher,
    decoders: DecoderConfig,
    channel_capacity: usize,
    progress_reporter: Arc<dyn ProgressReporter>,
}

impl Searcher {
    /// Create a searcher with the default configuration
    pub fn new(pattern: &str) -> Result<Self> {
        SearcherBuilder::new(pattern).build()
    }

    pub fn matcher(&self) -> &Matcher {
        &self.inner.matcher
    }

    pub fn decoders(&self) -> &DecoderConfig {
        &self.inner.decoders
    }

    pub(crate) fn channel_capacity(&self) -> usize {
        self.inner.channel_capacity
    }

    /// Search a file and everything nested inside it.
    ///
    /// A file that cannot be opened produces a single failure for its path.
    pub fn search_path(&self, path: &Path, sink: &dyn Sink) -> ControlFlow<()> {
        let chain = PathChain::root(path.display().to_string());
        let progress = &self.inner.progress_reporter;
        progress.on_root_start(&chain);
        tracing::debug!("searching {chain}");

        let flow = match fs_err::File::open(path) {
            Ok(file) => self.descend(&mut BufReader::new(file), &chain, sink),
            Err(err) => self.fail(&chain, SearchError::open(err), sink),
        };

        progress.on_root_finish(&chain);
        tracing::debug!("finished {chain}");
        flow
    }

    /// Search an already opened stream named `name`. The stream is dropped
    /// before this returns.
    pub fn search_reader<R: Read>(
        &self,
        reader: R,
        name: impl Into<String>,
        sink: &dyn Sink,
    ) -> ControlFlow<()> {
        let mut reader = reader;
        self.descend(&mut reader, &PathChain::root(name), sink)
    }

    /// Search an already opened stream and collect the results
    pub fn scan_reader<R: Read>(&self, reader: R, name: impl Into<String>) -> Vec<SearchResult> {
        let results = Mutex::new(Vec::new());
        let _ = self.search_reader(reader, name, &results);
        results.into_inner()
    }

    /// Check the name at the end of `chain` and, if it names a container,
    /// search every entry in it.
    fn descend(&self, stream: &mut dyn Read, chain: &PathChain, sink: &dyn Sink) -> ControlFlow<()> {
        let name = chain.name();
        if self.inner.matcher.is_match(name) {
            sink.emit(SearchResult::Match(chain.clone()))?;
        }

        let Some(format) = ArchiveFormat::detect_from_filename(name) else {
            return ControlFlow::Continue(());
        };
        tracing::debug!("reading {} container {chain}", format.name());

        let walked = self
            .inner
            .decoders
            .decode(format.compression(), stream, |decoded| {
                self.walk_tar(decoded, chain, sink)
            });
        match walked {
            Ok(flow) => flow,
            Err(error) => self.fail(chain, error, sink),
        }
    }

    /// Visit the entries of a decoded tar stream in the order they are stored
    fn walk_tar(
        &self,
        stream: &mut dyn Read,
        chain: &PathChain,
        sink: &dyn Sink,
    ) -> Result<ControlFlow<()>> {
        let mut archive = tar::Archive::new(stream);
        for entry in archive.entries().map_err(SearchError::container_read)? {
            let mut entry = entry.map_err(SearchError::container_read)?;
            let child = chain.join(String::from_utf8_lossy(&entry.path_bytes()));
            tracing::trace!("entry {child}");
            self.inner.progress_reporter.on_entry(&child);

            if self.descend(&mut entry, &child, sink).is_break() {
                return Ok(ControlFlow::Break(()));
            }
        }
        Ok(ControlFlow::Continue(()))
    }

    fn fail(&self, chain: &PathChain, error: SearchError, sink: &dyn Sink) -> ControlFlow<()> {
        tracing::warn!("{chain}: {error}");
        sink.emit(SearchResult::failure(chain.clone(), error))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::Compression;
    use std::io::{Cursor, Write};

    fn tar_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut builder = tar::Builder::new(Vec::new());
        for (name, data) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, name, *data).unwrap();
        }
        builder.into_inner().unwrap()
    }

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    fn matches(results: &[SearchResult]) -> Vec<Vec<String>> {
        results
            .iter()
            .filter(|result| result.is_match())
            .map(|result| result.chain().segments().to_vec())
            .collect()
    }

    #[test]
    fn test_leaf_is_matched_without_recursion() {
        let searcher = Searcher::new("leaf").unwrap();
        let results = searcher.scan_reader(Cursor::new(b"not an archive".to_vec()), "leaf.txt");
        assert_eq!(matches(&results), vec![vec!["leaf.txt".to_string()]]);
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn test_matching_container_is_reported_and_searched() {
        let inner = tar_bytes(&[("deep.tar.txt", b"x")]);
        let outer = tar_bytes(&[("nested.tar", &inner)]);

        let searcher = Searcher::new("tar").unwrap();
        let results = searcher.scan_reader(Cursor::new(outer), "outer.tar");
        assert_eq!(
            matches(&results),
            vec![
                vec!["outer.tar".to_string()],
                vec!["outer.tar".to_string(), "nested.tar".to_string()],
                vec![
                    "outer.tar".to_string(),
                    "nested.tar".to_string(),
                    "deep.tar.txt".to_string()
                ],
            ]
        );
    }

    #[test]
    fn test_only_the_innermost_name_is_matched() {
        let archive = tar_bytes(&[("plain.txt", b"x")]);
        let searcher = Searcher::new("needle").unwrap();
        let results = searcher.scan_reader(Cursor::new(archive), "needle.tar");
        assert_eq!(matches(&results), vec![vec!["needle.tar".to_string()]]);
    }

    #[test]
    fn test_entry_order_is_preserved() {
        let archive = tar_bytes(&[("b.log", b""), ("a.log", b""), ("c.log", b"")]);
        let searcher = Searcher::new(r"\.log$").unwrap();
        let results = searcher.scan_reader(Cursor::new(archive), "logs.tar");
        let names: Vec<_> = results
            .iter()
            .map(|result| result.chain().name().to_string())
            .collect();
        assert_eq!(names, ["b.log", "a.log", "c.log"]);
    }

    #[test]
    fn test_invalid_gzip_reports_one_decompression_failure() {
        let searcher = Searcher::new("y").unwrap();
        let results = searcher.scan_reader(Cursor::new(b"garbage".to_vec()), "bad.tar.gz");
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].chain().segments(), ["bad.tar.gz"]);
        assert!(
            matches!(
                results[0].error(),
                Some(SearchError::Decompression {
                    compression: Compression::Gzip,
                    ..
                })
            ),
            "unexpected result: {:?}",
            results[0]
        );
    }

    #[test]
    fn test_misnamed_tar_is_a_container_read_failure() {
        let mut data = vec![0xffu8; 512];
        data[0] = b'x';
        let searcher = Searcher::new("nothing").unwrap();
        let results = searcher.scan_reader(Cursor::new(data), "renamed.tar");
        assert_eq!(results.len(), 1);
        assert!(matches!(
            results[0].error(),
            Some(SearchError::ContainerRead { .. })
        ));
    }

    #[test]
    fn test_corrupt_entry_stops_the_container_only() {
        let mut corrupt = tar_bytes(&[("first.txt", b"1"), ("second.txt", b"2")]);
        // break the checksum of the second header
        corrupt[1024 + 148] ^= 0x01;
        let outer = tar_bytes(&[("broken.tar", &corrupt), ("after.txt", b"")]);

        let searcher = Searcher::new(r"\.txt$").unwrap();
        let results = searcher.scan_reader(Cursor::new(outer), "outer.tar");

        let names: Vec<_> = results
            .iter()
            .map(|result| (result.chain().name().to_string(), result.is_match()))
            .collect();
        assert_eq!(
            names,
            [
                ("first.txt".to_string(), true),
                ("broken.tar".to_string(), false),
                ("after.txt".to_string(), true),
            ]
        );
        assert!(matches!(
            results[1].error(),
            Some(SearchError::ContainerRead { .. })
        ));
    }

    #[test]
    fn test_compressed_layers() {
        let leaf = tar_bytes(&[("y.txt", b"why")]);
        let middle = tar_bytes(&[("x.txt", b"ex"), ("inner.tar.gz", &gzip(&leaf))]);

        let searcher = Searcher::new("^y").unwrap();
        let results = searcher.scan_reader(Cursor::new(gzip(&middle)), "a.tgz");
        assert_eq!(
            matches(&results),
            vec![vec![
                "a.tgz".to_string(),
                "inner.tar.gz".to_string(),
                "y.txt".to_string()
            ]]
        );
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn test_closed_sink_stops_the_descent() {
        struct Disconnected(Mutex<usize>);

        impl Sink for Disconnected {
            fn emit(&self, _result: SearchResult) -> ControlFlow<()> {
                *self.0.lock() += 1;
                ControlFlow::Break(())
            }
        }

        let archive = tar_bytes(&[("a.txt", b""), ("b.txt", b""), ("c.txt", b"")]);
        let searcher = Searcher::new("txt").unwrap();
        let sink = Disconnected(Mutex::new(0));
        let flow = searcher.search_reader(Cursor::new(archive), "all.tar", &sink);
        assert!(flow.is_break());
        assert_eq!(*sink.0.lock(), 1);
    }

    #[test]
    fn test_builder_configuration() {
        let searcher = SearcherBuilder::new("x")
            .with_channel_capacity(0)
            .with_decoders(DecoderConfig::in_process())
            .build()
            .unwrap();
        assert_eq!(searcher.channel_capacity(), 1);
        assert_eq!(searcher.decoders(), &DecoderConfig::in_process());
        assert_eq!(searcher.matcher().as_str(), "x");

        assert!(matches!(
            SearcherBuilder::new("[").build(),
            Err(SearchError::InvalidPattern(_))
        ));
    }
}
