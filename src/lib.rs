//! Snapshot comparison engine for visual regression tests.
//!
//! A test hands a freshly captured screenshot to [`SnapshotEngine::compare`]
//! together with its hierarchical test name. The engine derives a stable
//! fixture key, creates the baseline the first time that key is seen, and
//! otherwise diffs the screenshot against the stored fixture pixel by pixel.
//! Screenshots, fixture copies and diff images land in a per-run target
//! directory so a report can link them.
//!
//! ```no_run
//! use snapdiff::{ComparisonRequest, EngineConfig, PixelBuffer, SnapshotEngine, TestPath};
//!
//! # fn main() -> miette::Result<()> {
//! let engine = SnapshotEngine::new(EngineConfig::new("test/fixtures", "target/ui"));
//! let path = TestPath::new(["Navbar", "should show menu"])?;
//! let screenshot = PixelBuffer::filled(320, 48, [255, 255, 255, 255]);
//!
//! let result = engine.compare(ComparisonRequest::new(path, screenshot))?;
//! result.into_assertion()?;
//! # Ok(())
//! # }
//! ```

pub mod codec;
pub mod compare;
pub mod config;
pub mod diff;
pub mod errors;
pub mod fixture;
pub mod identity;
pub mod layout;
pub mod log;
pub mod options;
pub mod reconcile;
pub mod types;

pub use compare::{Attachment, ComparisonRequest, DiffResult, SnapshotEngine, Verdict};
pub use config::EngineConfig;
pub use errors::{
    BufferSizeError, CodecError, ConfigError, DimensionMismatchError, FixtureError,
    IdentityError, SnapshotError, SnapshotMismatch,
};
pub use fixture::FixtureStore;
pub use identity::{FixtureKey, SnapshotNamer, TestPath};
pub use options::{CaptureFraming, CaptureOptions, DiffOptions, SnapshotOptions};
pub use types::{PixelBuffer, Rect, Threshold, ThresholdError};
