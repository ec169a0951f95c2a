//! Container format detection

use std::ffi::OsStr;
use std::fmt;
use std::path::Path;

/// Tar-based container formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArchiveFormat {
    /// Plain tar archive
    Tar,
    /// Gzip-compressed tar archive (.tar.gz, .tgz, .taz)
    TarGz,
    /// Bzip2-compressed tar archive (.tar.bz2, .tar.bz, .tbz, .tbz2, .tz2, .tb2)
    TarBz2,
    /// XZ-compressed tar archive (.tar.xz, .txz)
    TarXz,
    /// Zstd-compressed tar archive (.tar.zst, .tar.zstd, .tzst)
    TarZst,
}

/// The decompression that has to be applied before a container can be read
/// as a tar stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Compression {
    None,
    Gzip,
    Bzip2,
    Xz,
    Zstd,
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::None => "uncompressed",
            Self::Gzip => "gzip",
            Self::Bzip2 => "bzip2",
            Self::Xz => "xz",
            Self::Zstd => "zstd",
        })
    }
}

impl ArchiveFormat {
    const ALL: [Self; 5] = [
        Self::Tar,
        Self::TarGz,
        Self::TarBz2,
        Self::TarXz,
        Self::TarZst,
    ];

    /// Detect the container format from a file or entry name.
    ///
    /// Only the (case-insensitive) suffix is looked at, the content is never
    /// inspected. No suffix in the table is a suffix of another one, so the
    /// result does not depend on the order of the checks.
    pub fn detect_from_filename(filename: &str) -> Option<Self> {
        let filename = filename.to_lowercase();
        Self::ALL.into_iter().find(|format| {
            format
                .extensions()
                .iter()
                .any(|extension| filename.ends_with(extension))
        })
    }

    /// Detect the container format from a file path
    pub fn detect_from_path<P: AsRef<Path>>(path: P) -> Option<Self> {
        path.as_ref()
            .file_name()
            .and_then(OsStr::to_str)
            .and_then(Self::detect_from_filename)
    }

    /// Get a human-readable name for this format
    pub fn name(&self) -> &'static str {
        match self {
            Self::Tar => "TAR",
            Self::TarGz => "TAR.GZ",
            Self::TarBz2 => "TAR.BZ2",
            Self::TarXz => "TAR.XZ",
            Self::TarZst => "TAR.ZST",
        }
    }

    /// The transform that turns the raw bytes into a tar stream
    pub fn compression(&self) -> Compression {
        match self {
            Self::Tar => Compression::None,
            Self::TarGz => Compression::Gzip,
            Self::TarBz2 => Compression::Bzip2,
            Self::TarXz => Compression::Xz,
            Self::TarZst => Compression::Zstd,
        }
    }

    /// Get the file extensions recognized for this format
    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            Self::Tar => &[".tar"],
            Self::TarGz => &[".tar.gz", ".tgz", ".taz"],
            Self::TarBz2 => &[".tar.bz2", ".tar.bz", ".tbz", ".tbz2", ".tz2", ".tb2"],
            Self::TarXz => &[".tar.xz", ".txz"],
            Self::TarZst => &[".tar.zst", ".tar.zstd", ".tzst"],
        }
    }
}
