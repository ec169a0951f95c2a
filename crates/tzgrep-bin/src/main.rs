use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use clap_verbosity_flag::Verbosity;
use console::style;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use tzgrep::{Backend, DecoderConfig, ExternalTool, SearchResult, Searcher, SearcherBuilder};

/// Find entries by name inside nested, compressed tar archives.
///
/// Every match is printed as the chain of containers leading to it,
/// separated by ` :: `.
#[derive(Debug, Parser)]
#[clap(name = "tzgrep", version)]
struct Opt {
    /// Regular expression matched against the name of every entry
    pattern: String,

    /// Files and archives to search
    #[clap(required = true)]
    paths: Vec<PathBuf>,

    /// Decode xz and zstd in-process instead of running `xz` and `zstd`
    #[clap(long)]
    in_process: bool,

    /// Program used to decompress xz, called with `-d -T0`
    #[clap(long, value_name = "PROGRAM", conflicts_with = "in_process")]
    xz: Option<String>,

    /// Program used to decompress zstd, called with `-d`
    #[clap(long, value_name = "PROGRAM", conflicts_with = "in_process")]
    zstd: Option<String>,

    /// Number of results buffered before the search waits for output
    #[clap(long, value_name = "N", default_value_t = 64)]
    channel_capacity: usize,

    /// Show a spinner with the number of scanned entries
    #[cfg(feature = "progress")]
    #[clap(long)]
    progress: bool,

    #[command(flatten)]
    verbose: Verbosity,
}

impl Opt {
    fn decoders(&self) -> DecoderConfig {
        if self.in_process {
            return DecoderConfig::in_process();
        }
        let mut decoders = DecoderConfig::default();
        if let Some(program) = &self.xz {
            decoders = decoders.with_xz(Backend::External(
                ExternalTool::new(program).with_args(["-d", "-T0"]),
            ));
        }
        if let Some(program) = &self.zstd {
            decoders =
                decoders.with_zstd(Backend::External(ExternalTool::new(program).with_args(["-d"])));
        }
        decoders
    }

    /// Build the searcher along with the output it reports to
    fn searcher(&self) -> anyhow::Result<(Searcher, Output)> {
        let builder = SearcherBuilder::new(self.pattern.as_str())
            .with_decoders(self.decoders())
            .with_channel_capacity(self.channel_capacity);
        let output = Output::default();

        #[cfg(feature = "progress")]
        let (builder, output) = if self.progress {
            let reporter = tzgrep::IndicatifProgressReporter::with_default_style();
            let output = Output {
                progress_bar: Some(reporter.progress_bar().clone()),
                ..output
            };
            (builder.with_progress_reporter(reporter), output)
        } else {
            (builder, output)
        };

        let searcher = builder
            .build()
            .with_context(|| format!("failed to compile pattern `{}`", self.pattern))?;
        Ok((searcher, output))
    }
}

/// Writes results, keeping them clear of the progress spinner
#[derive(Default)]
struct Output {
    #[cfg(feature = "progress")]
    progress_bar: Option<indicatif::ProgressBar>,
    matched: bool,
    failed: bool,
}

impl Output {
    fn write(&mut self, result: &SearchResult) -> io::Result<()> {
        match result.error() {
            None => self.matched = true,
            Some(_) => self.failed = true,
        }

        #[cfg(feature = "progress")]
        if let Some(progress_bar) = &self.progress_bar {
            return progress_bar.suspend(|| print_result(result));
        }
        print_result(result)
    }

    fn finish(self) -> ExitCode {
        #[cfg(feature = "progress")]
        if let Some(progress_bar) = &self.progress_bar {
            progress_bar.finish_and_clear();
        }

        if self.failed {
            ExitCode::from(2)
        } else if self.matched {
            ExitCode::SUCCESS
        } else {
            ExitCode::from(1)
        }
    }
}

fn print_result(result: &SearchResult) -> io::Result<()> {
    match result.error() {
        None => writeln!(io::stdout().lock(), "{}", result.chain()),
        Some(err) => writeln!(
            io::stderr().lock(),
            "{} {}: {err}",
            style("error:").red().bold(),
            result.chain()
        ),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let opt = Opt::parse();

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(
            EnvFilter::builder()
                .with_default_directive(opt.verbose.tracing_level_filter().into())
                .from_env_lossy(),
        )
        .init();

    let (searcher, mut output) = opt.searcher()?;

    let mut results = searcher.start(opt.paths);
    while let Some(result) = results.recv().await {
        if let Err(err) = output.write(&result) {
            if err.kind() == io::ErrorKind::BrokenPipe {
                break;
            }
            return Err(err).context("failed to write results");
        }
    }

    Ok(output.finish())
}
