//! Decompression transforms applied to a container before it is read as tar.
//!
//! gzip and bzip2 are always decoded in-process. xz and zstd are piped
//! through an external decompressor by default (`xz -d -T0`, `zstd -d`) and
//! can be switched to the in-process decoders with
//! [`DecoderConfig::in_process`].
//!
//! A transform is applied in scoped form: [`DecoderConfig::decode`] hands the
//! decoded stream to a consumer and releases it (including any subprocess)
//! before returning, on every exit path.

use std::error::Error as StdError;
use std::fmt;
use std::io::{self, Read, Write};
use std::ops::ControlFlow;
use std::process::{Child, ChildStdin, ChildStdout, Command, ExitStatus, Stdio};
use std::thread;

use crate::error::{Result, SearchError};
use crate::format::Compression;

const PUMP_BUFFER_SIZE: usize = 64 * 1024;

/// An external program that reads compressed bytes on stdin and writes the
/// decompressed bytes to stdout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalTool {
    pub program: String,
    pub args: Vec<String>,
}

impl ExternalTool {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Append arguments passed to the program
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// `xz -d -T0`
    pub fn xz() -> Self {
        Self::new("xz").with_args(["-d", "-T0"])
    }

    /// `zstd -d`
    pub fn zstd() -> Self {
        Self::new("zstd").with_args(["-d"])
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null());
        command
    }
}

/// How a compression is decoded
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backend {
    /// Decode with a streaming decoder in the current thread
    InProcess,
    /// Pipe the bytes through an external program
    External(ExternalTool),
}

static IN_PROCESS: Backend = Backend::InProcess;

/// Selects the [`Backend`] used for each [`Compression`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecoderConfig {
    xz: Backend,
    zstd: Backend,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            xz: Backend::External(ExternalTool::xz()),
            zstd: Backend::External(ExternalTool::zstd()),
        }
    }
}

impl DecoderConfig {
    /// Decode every compression in-process, no external programs required
    pub fn in_process() -> Self {
        Self {
            xz: Backend::InProcess,
            zstd: Backend::InProcess,
        }
    }

    /// Set the backend used for xz
    pub fn with_xz(mut self, backend: Backend) -> Self {
        self.xz = backend;
        self
    }

    /// Set the backend used for zstd
    pub fn with_zstd(mut self, backend: Backend) -> Self {
        self.zstd = backend;
        self
    }

    /// The backend that will be used for `compression`
    pub fn backend(&self, compression: Compression) -> &Backend {
        match compression {
            Compression::Xz => &self.xz,
            Compression::Zstd => &self.zstd,
            Compression::None | Compression::Gzip | Compression::Bzip2 => &IN_PROCESS,
        }
    }

    /// Decode `raw` and run `consume` over the decoded stream.
    ///
    /// The decoded stream, and for external backends the subprocess, are
    /// released before this returns. `consume` may run on a helper thread, it
    /// is only ever called once. It returns [`ControlFlow::Break`] when it
    /// stopped before the end of the stream.
    pub fn decode<F>(
        &self,
        compression: Compression,
        raw: &mut dyn Read,
        consume: F,
    ) -> Result<ControlFlow<()>>
    where
        F: FnOnce(&mut dyn Read) -> Result<ControlFlow<()>> + Send,
    {
        if compression == Compression::None {
            return consume(raw);
        }
        match self.backend(compression) {
            Backend::InProcess => {
                let mut decoded = DecodeReader::new(compression, raw)?;
                consume(&mut decoded)
            }
            Backend::External(tool) => decode_external(tool, compression, raw, consume),
        }
    }
}

/// Marks read errors produced by an in-process decoder
#[derive(Debug)]
struct DecodeFailure {
    compression: Compression,
    source: io::Error,
}

impl fmt::Display for DecodeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.source.fmt(f)
    }
}

impl StdError for DecodeFailure {}

/// Find the compression whose decoder produced `err`, if any.
///
/// Walks through wrapped errors, so a decoder error that the tar reader
/// wrapped with more context is still found.
pub(crate) fn decode_failure(err: &io::Error) -> Option<Compression> {
    let mut current = err.get_ref().map(|inner| inner as &(dyn StdError + 'static));
    while let Some(error) = current {
        if let Some(failure) = error.downcast_ref::<DecodeFailure>() {
            return Some(failure.compression);
        }
        // `io::Error::source` skips the wrapped error itself
        current = match error.downcast_ref::<io::Error>() {
            Some(io_err) => io_err
                .get_ref()
                .map(|inner| inner as &(dyn StdError + 'static)),
            None => error.source(),
        };
    }
    None
}

/// An in-process decoder that tags its read errors
struct DecodeReader<'a> {
    compression: Compression,
    inner: Box<dyn Read + 'a>,
}

impl<'a> DecodeReader<'a> {
    fn new(compression: Compression, raw: &'a mut dyn Read) -> Result<Self> {
        let inner: Box<dyn Read + 'a> = match compression {
            Compression::None => Box::new(raw),
            Compression::Gzip => Box::new(flate2::read::MultiGzDecoder::new(raw)),
            Compression::Bzip2 => Box::new(bzip2::read::MultiBzDecoder::new(raw)),
            Compression::Xz => Box::new(xz2::read::XzDecoder::new_multi_decoder(raw)),
            Compression::Zstd => Box::new(
                zstd::stream::read::Decoder::new(raw)
                    .map_err(|e| SearchError::decompression(compression, e))?,
            ),
        };
        Ok(Self { compression, inner })
    }
}

impl Read for DecodeReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf).map_err(|err| {
            if err.kind() == io::ErrorKind::Interrupted || decode_failure(&err).is_some() {
                err
            } else {
                io::Error::new(
                    err.kind(),
                    DecodeFailure {
                        compression: self.compression,
                        source: err,
                    },
                )
            }
        })
    }
}

/// A running decompressor together with its pipes.
///
/// [`ExternalStream::finish`] closes whatever pipes are still held and waits
/// for the process. Dropping an unfinished stream does the same, so the child
/// is always reaped.
struct ExternalStream {
    program: String,
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: Option<ChildStdout>,
    status: Option<ExitStatus>,
}

impl ExternalStream {
    fn spawn(tool: &ExternalTool) -> Result<Self> {
        let mut child = tool
            .command()
            .spawn()
            .map_err(|e| SearchError::spawn_decompressor(&tool.program, e))?;
        tracing::trace!("spawned decompressor `{}`", tool.program);
        Ok(Self {
            program: tool.program.clone(),
            stdin: child.stdin.take(),
            stdout: child.stdout.take(),
            child,
            status: None,
        })
    }

    fn take_pipes(&mut self) -> Option<(ChildStdin, ChildStdout)> {
        Some((self.stdin.take()?, self.stdout.take()?))
    }

    fn close(&mut self) -> io::Result<ExitStatus> {
        drop(self.stdin.take());
        drop(self.stdout.take());
        if let Some(status) = self.status {
            return Ok(status);
        }
        let status = self.child.wait()?;
        self.status = Some(status);
        Ok(status)
    }

    /// Close the pipes and wait for the process to exit
    fn finish(mut self) -> Result<()> {
        let status = self
            .close()
            .map_err(|e| SearchError::spawn_decompressor(&self.program, e))?;
        if status.success() {
            Ok(())
        } else {
            Err(SearchError::decompressor_exited(&self.program, status))
        }
    }
}

impl Drop for ExternalStream {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            tracing::warn!("failed to wait for decompressor `{}`: {err}", self.program);
        }
    }
}

/// Pipe `raw` through `tool` and hand its output to `consume`.
///
/// `raw` may borrow from a tar reader and cannot leave this thread, so the
/// current thread feeds the child while a scoped thread runs the consumer.
fn decode_external<F>(
    tool: &ExternalTool,
    compression: Compression,
    raw: &mut dyn Read,
    consume: F,
) -> Result<ControlFlow<()>>
where
    F: FnOnce(&mut dyn Read) -> Result<ControlFlow<()>> + Send,
{
    let mut stream = ExternalStream::spawn(tool)?;
    let Some((stdin, mut stdout)) = stream.take_pipes() else {
        return Err(SearchError::spawn_decompressor(
            &tool.program,
            io::Error::other("decompressor pipes are not available"),
        ));
    };

    let (consumed, pumped) = thread::scope(|scope| {
        let consumer = scope.spawn(move || {
            let result = consume(&mut stdout);
            // Read what is left so the exit status reflects the whole stream
            // and trailing tar padding does not end the child with a broken
            // pipe. A cancelled consumer closes stdout instead, which stops
            // the child and, through it, the pump.
            if !matches!(result, Ok(ControlFlow::Break(()))) {
                let _ = io::copy(&mut stdout, &mut io::sink());
            }
            result
        });
        let pumped = pump(raw, stdin);
        match consumer.join() {
            Ok(consumed) => (consumed, pumped),
            Err(panic) => std::panic::resume_unwind(panic),
        }
    });

    let finished = stream.finish();
    let pumped = pumped.map_err(|e| {
        let compression = decode_failure(&e).unwrap_or(compression);
        SearchError::decompression(compression, e)
    });
    match consumed {
        Ok(ControlFlow::Break(())) => Ok(ControlFlow::Break(())),
        Ok(flow) => {
            pumped?;
            finished?;
            Ok(flow)
        }
        // A truncated or corrupt stream shows up as a broken tar archive, the
        // decompressor knows the actual cause.
        Err(err @ SearchError::ContainerRead { .. }) => {
            pumped?;
            finished?;
            Err(err)
        }
        Err(err) => Err(err),
    }
}

/// Copy `raw` into the child's stdin, closing it afterwards.
///
/// A broken pipe means the child stopped reading; whether that is a failure
/// is decided by its exit status.
fn pump(raw: &mut dyn Read, mut stdin: ChildStdin) -> io::Result<()> {
    let mut buf = vec![0; PUMP_BUFFER_SIZE];
    loop {
        let read = match raw.read(&mut buf) {
            Ok(0) => return Ok(()),
            Ok(read) => read,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        };
        match stdin.write_all(&buf[..read]) {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::BrokenPipe => return Ok(()),
            Err(err) => return Err(err),
        }
    }
}
