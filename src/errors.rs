//! Error types with diagnostics using miette
//!
//! Every failure a single comparison can hit has a typed error here. The
//! orchestrator folds them into [`SnapshotError`]; none of them is retried.

use camino::Utf8PathBuf;
use miette::Diagnostic;
use thiserror::Error;

use crate::compare::DiffResult;
use crate::identity::FixtureKey;

// ============================================================================
// Codec Errors
// ============================================================================

/// Errors from decoding or encoding raster images
#[derive(Error, Diagnostic, Debug)]
pub enum CodecError {
    #[error("malformed image data")]
    #[diagnostic(code(snapdiff::codec::decode))]
    Decode {
        #[source]
        source: image::ImageError,
    },

    #[error("unsupported image format")]
    #[diagnostic(
        code(snapdiff::codec::unsupported),
        help("fixtures and screenshots are stored as PNG")
    )]
    Unsupported {
        #[source]
        source: image::ImageError,
    },

    #[error("failed to encode {width}x{height} image as PNG")]
    #[diagnostic(code(snapdiff::codec::encode))]
    Encode {
        width: u32,
        height: u32,
        #[source]
        source: image::ImageError,
    },

    #[error("cannot encode an empty {width}x{height} image")]
    #[diagnostic(
        code(snapdiff::codec::empty_image),
        help("PNG requires a width and height of at least one pixel")
    )]
    EmptyImage { width: u32, height: u32 },
}

/// Raw pixel data whose length does not match its dimensions
#[derive(Error, Diagnostic, Debug, Clone, PartialEq, Eq)]
#[error("pixel buffer holds {actual} bytes, expected {expected} for a {width}x{height} RGBA image")]
#[diagnostic(code(snapdiff::buffer::size))]
pub struct BufferSizeError {
    pub width: u32,
    pub height: u32,
    pub expected: usize,
    pub actual: usize,
}

// ============================================================================
// Diff Errors
// ============================================================================

/// The differ was handed images of unequal size
#[derive(Error, Diagnostic, Debug, Clone, PartialEq, Eq)]
#[error("cannot diff a {left_width}x{left_height} image against a {right_width}x{right_height} image")]
#[diagnostic(
    code(snapdiff::diff::dimension_mismatch),
    help("reconcile both images to a shared canvas before diffing")
)]
pub struct DimensionMismatchError {
    pub left_width: u32,
    pub left_height: u32,
    pub right_width: u32,
    pub right_height: u32,
}

// ============================================================================
// Fixture Errors
// ============================================================================

/// Errors from the on-disk fixture lifecycle
#[derive(Error, Diagnostic, Debug)]
pub enum FixtureError {
    #[error("no fixture recorded for {key}")]
    #[diagnostic(code(snapdiff::fixture::not_found))]
    NotFound { key: FixtureKey, path: Utf8PathBuf },

    #[error("fixture for {key} already exists at {path}")]
    #[diagnostic(
        code(snapdiff::fixture::already_exists),
        help("bootstrap runs once per key; use accept to replace a baseline")
    )]
    AlreadyExists { key: FixtureKey, path: Utf8PathBuf },

    #[error("i/o error on {path}")]
    #[diagnostic(code(snapdiff::fixture::io))]
    Io {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Codec(#[from] CodecError),
}

// ============================================================================
// Identity Errors
// ============================================================================

/// Errors deriving a fixture key from a test name
#[derive(Error, Diagnostic, Debug, Clone, PartialEq, Eq)]
pub enum IdentityError {
    #[error("test path is empty")]
    #[diagnostic(
        code(snapdiff::identity::empty_path),
        help("the first element of a test path names the suite")
    )]
    EmptyTestPath,

    #[error("invalid {field} for a fixture key: {value:?}")]
    #[diagnostic(
        code(snapdiff::identity::invalid_component),
        help("keys become file names, so they must be non-empty and free of path separators")
    )]
    InvalidComponent { field: &'static str, value: String },

    #[error("snapshot name {name:?} in suite {suite:?} was already handed out in this run")]
    #[diagnostic(
        code(snapdiff::identity::name_collision),
        help("a test title ending in `-<n>` can clash with the numbered repeats of another test; rename one of them")
    )]
    NameCollision { suite: String, name: String },
}

// ============================================================================
// Configuration Errors
// ============================================================================

/// Errors assembling an engine configuration
#[derive(Error, Diagnostic, Debug)]
pub enum ConfigError {
    #[error("environment variable {name} is not set")]
    #[diagnostic(code(snapdiff::config::missing_var))]
    MissingVar { name: &'static str },

    #[error("environment variable {name} is not valid unicode")]
    #[diagnostic(code(snapdiff::config::not_unicode))]
    NotUnicode { name: &'static str },

    #[error("invalid threshold {value:?}: {reason}")]
    #[diagnostic(
        code(snapdiff::config::invalid_threshold),
        help("the threshold is a fraction between 0 and 1")
    )]
    InvalidThreshold { value: String, reason: String },
}

// ============================================================================
// Comparison Errors
// ============================================================================

/// Any failure that aborts a single comparison
#[derive(Error, Diagnostic, Debug)]
pub enum SnapshotError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Fixture(#[from] FixtureError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    DimensionMismatch(#[from] DimensionMismatchError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Identity(#[from] IdentityError),

    #[error("failed to write artifact {path}")]
    #[diagnostic(code(snapdiff::artifact::io))]
    Io {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
}

// ============================================================================
// Assertion Errors
// ============================================================================

/// A comparison that ran and did not match its fixture
#[derive(Error, Diagnostic, Debug)]
#[error("snapshot {key} does not match its fixture: {reason}")]
#[diagnostic(code(snapdiff::snapshot_mismatch))]
pub struct SnapshotMismatch {
    pub key: FixtureKey,
    pub reason: String,
    #[help]
    pub diff_path: Option<String>,
    pub result: Box<DiffResult>,
}
