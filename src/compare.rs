//! Comparison orchestrator.
//!
//! [`SnapshotEngine::compare`] is the single operation the assertion layer
//! calls: resolve the fixture key, bootstrap or load the fixture, reconcile,
//! diff, write the report artifacts and hand back a [`DiffResult`].

use std::fs;
use std::io;

use camino::Utf8PathBuf;

use crate::codec;
use crate::config::EngineConfig;
use crate::diff;
use crate::errors::{FixtureError, IdentityError, SnapshotError, SnapshotMismatch};
use crate::fixture::{self, FixtureStore};
use crate::identity::{FixtureKey, SnapshotNamer, TestPath};
use crate::layout::{self, ArtifactKind};
use crate::options::SnapshotOptions;
use crate::reconcile::reconcile;
use crate::types::PixelBuffer;

/// Caption of the candidate screenshot attachment
pub const CAPTURED_CAPTION: &str = "captured result";
/// Caption of the reference copy attachment
pub const EXPECTED_CAPTION: &str = "expected";
/// Caption of the diff image attachment
pub const DIFF_CAPTION: &str = "diff";
/// Note attached when a comparison created the baseline
pub const BASELINE_NOTE: &str = "fixture saved as a reference for future comparisons";

/// Outcome of one comparison
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verdict {
    /// Candidate matches the fixture pixel for pixel (within threshold)
    Passed,
    /// Pixels or dimensions differ
    Failed,
    /// No fixture existed; the candidate became the fixture
    BaselineCreated,
}

/// Report context entry for the test that ran the comparison
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Attachment {
    /// An image, by path relative to the target root
    Image { caption: &'static str, path: String },
    /// Free-form note
    Note(String),
}

/// Everything a caller needs to assert on and to report a comparison
#[derive(Clone, Debug)]
pub struct DiffResult {
    pub key: FixtureKey,
    pub verdict: Verdict,
    pub diff_pixel_count: u64,
    /// Present whenever pixels were actually compared
    pub diff_image: Option<PixelBuffer>,
    /// Candidate and fixture had the same size before reconciliation
    pub dimensions_match: bool,
    pub candidate_dimensions: (u32, u32),
    pub fixture_dimensions: Option<(u32, u32)>,
    pub attachments: Vec<Attachment>,
}

impl DiffResult {
    /// Passed comparisons and freshly created baselines both count as a pass
    pub fn is_pass(&self) -> bool {
        matches!(self.verdict, Verdict::Passed | Verdict::BaselineCreated)
    }

    /// Report path of the diff image, when one was written
    pub fn diff_path(&self) -> Option<&str> {
        self.attachments.iter().find_map(|attachment| match attachment {
            Attachment::Image { caption, path } if *caption == DIFF_CAPTION => Some(path.as_str()),
            _ => None,
        })
    }

    /// Turn a failed verdict into an error for assertion glue.
    ///
    /// Width is checked first, then height, then the pixel count.
    pub fn into_assertion(self) -> Result<DiffResult, SnapshotMismatch> {
        if self.is_pass() {
            return Ok(self);
        }

        let (width, height) = self.candidate_dimensions;
        let reason = match self.fixture_dimensions {
            Some((expected, _)) if expected != width => {
                format!("image widths differ: expected {expected}, got {width}")
            }
            Some((_, expected)) if expected != height => {
                format!("image heights differ: expected {expected}, got {height}")
            }
            _ => format!("{} pixels differ", self.diff_pixel_count),
        };

        Err(SnapshotMismatch {
            key: self.key.clone(),
            reason,
            diff_path: self.diff_path().map(str::to_string),
            result: Box::new(self),
        })
    }
}

/// A candidate image and the test it belongs to
#[derive(Clone, Debug)]
pub struct ComparisonRequest {
    pub test_path: TestPath,
    pub candidate: PixelBuffer,
    /// Falls back to the engine's default options when `None`
    pub options: Option<SnapshotOptions>,
}

impl ComparisonRequest {
    pub fn new(test_path: TestPath, candidate: PixelBuffer) -> Self {
        Self {
            test_path,
            candidate,
            options: None,
        }
    }

    pub fn with_options(mut self, options: SnapshotOptions) -> Self {
        self.options = Some(options);
        self
    }
}

/// Comparison engine for one run.
///
/// Construct it once, then share it by reference with every test. It owns
/// the run's occurrence counters and fixture locks, so two engines over the
/// same roots do not coordinate with each other.
#[derive(Debug)]
pub struct SnapshotEngine {
    config: EngineConfig,
    namer: SnapshotNamer,
    store: FixtureStore,
}

impl SnapshotEngine {
    pub fn new(config: EngineConfig) -> Self {
        let store = FixtureStore::new(config.fixture_root.clone());
        Self {
            config,
            namer: SnapshotNamer::new(),
            store,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &FixtureStore {
        &self.store
    }

    /// Next unique key for `test_path` in this run
    pub fn resolve(&self, test_path: &TestPath) -> Result<FixtureKey, IdentityError> {
        self.namer.resolve(test_path)
    }

    /// Compare a candidate against the fixture of its test
    pub fn compare(&self, request: ComparisonRequest) -> Result<DiffResult, SnapshotError> {
        let key = self.resolve(&request.test_path)?;
        let options = request.options.unwrap_or(self.config.default_options);
        self.compare_key(&key, request.candidate, &options)
    }

    /// Compare a candidate against the fixture stored under `key`.
    ///
    /// The candidate is saved as this run's screenshot first. Without a
    /// fixture it becomes the baseline; when another comparison of the same
    /// key creates the baseline first, this one is compared against it.
    pub fn compare_key(
        &self,
        key: &FixtureKey,
        candidate: PixelBuffer,
        options: &SnapshotOptions,
    ) -> Result<DiffResult, SnapshotError> {
        let screenshot = self.write_artifact(ArtifactKind::Screenshot, key, &candidate)?;
        let attachments = vec![Attachment::Image {
            caption: CAPTURED_CAPTION,
            path: screenshot,
        }];

        if !self.store.exists(key) {
            match self.store.bootstrap(key, &candidate) {
                Ok(_) => return self.baseline_created(key, candidate.dimensions(), attachments),
                Err(FixtureError::AlreadyExists { .. }) => {
                    crate::log::debug!(%key, "fixture created concurrently, comparing against it");
                }
                Err(err) => return Err(err.into()),
            }
        }

        self.compare_with_fixture(key, candidate, options, attachments)
    }

    /// Compare a screenshot already stored under the target root.
    ///
    /// Unlike [`compare_key`](Self::compare_key) the screenshot file is left
    /// as it is and a missing fixture is reported as
    /// [`FixtureError::NotFound`] instead of being bootstrapped.
    pub fn recheck(
        &self,
        key: &FixtureKey,
        candidate: PixelBuffer,
        options: &SnapshotOptions,
    ) -> Result<DiffResult, SnapshotError> {
        let attachments = vec![Attachment::Image {
            caption: CAPTURED_CAPTION,
            path: layout::report_path(ArtifactKind::Screenshot, key),
        }];
        self.compare_with_fixture(key, candidate, options, attachments)
    }

    fn baseline_created(
        &self,
        key: &FixtureKey,
        candidate_dimensions: (u32, u32),
        mut attachments: Vec<Attachment>,
    ) -> Result<DiffResult, SnapshotError> {
        self.remove_artifact(ArtifactKind::Diff, key)?;
        attachments.push(Attachment::Note(BASELINE_NOTE.to_string()));
        Ok(DiffResult {
            key: key.clone(),
            verdict: Verdict::BaselineCreated,
            diff_pixel_count: 0,
            diff_image: None,
            dimensions_match: true,
            candidate_dimensions,
            fixture_dimensions: None,
            attachments,
        })
    }

    fn compare_with_fixture(
        &self,
        key: &FixtureKey,
        candidate: PixelBuffer,
        options: &SnapshotOptions,
        mut attachments: Vec<Attachment>,
    ) -> Result<DiffResult, SnapshotError> {
        let candidate_dimensions = candidate.dimensions();

        let expected = self.store.load_for_report(key, &self.config.target_root)?;
        attachments.push(Attachment::Image {
            caption: EXPECTED_CAPTION,
            path: layout::report_path(ArtifactKind::Fixture, key),
        });

        let fixture_dimensions = expected.dimensions();
        let dimensions_match = fixture_dimensions == candidate_dimensions;

        let (expected, actual) = reconcile(expected, candidate);
        let pixel_diff = diff::diff(&expected, &actual, &options.diff())?;

        if pixel_diff.diff_count > 0 {
            let path = self.write_artifact(ArtifactKind::Diff, key, &pixel_diff.image)?;
            attachments.push(Attachment::Image {
                caption: DIFF_CAPTION,
                path,
            });
        } else {
            self.remove_artifact(ArtifactKind::Diff, key)?;
        }

        let verdict = if pixel_diff.diff_count > 0 || !dimensions_match {
            crate::log::warn!(
                %key,
                diff_pixels = pixel_diff.diff_count,
                dimensions_match,
                "snapshot differs from fixture"
            );
            Verdict::Failed
        } else {
            crate::log::debug!(%key, "snapshot matches fixture");
            Verdict::Passed
        };

        Ok(DiffResult {
            key: key.clone(),
            verdict,
            diff_pixel_count: pixel_diff.diff_count,
            diff_image: Some(pixel_diff.image),
            dimensions_match,
            candidate_dimensions,
            fixture_dimensions: Some(fixture_dimensions),
            attachments,
        })
    }

    /// Make `candidate` the fixture for `key`, replacing any existing one
    pub fn accept(
        &self,
        key: &FixtureKey,
        candidate: &PixelBuffer,
    ) -> Result<Utf8PathBuf, SnapshotError> {
        Ok(self.store.accept(key, candidate)?)
    }

    /// Encode and write a per-run artifact, returning its report path
    fn write_artifact(
        &self,
        kind: ArtifactKind,
        key: &FixtureKey,
        image: &PixelBuffer,
    ) -> Result<String, SnapshotError> {
        let bytes = codec::encode(image)?;
        let path = layout::artifact_path(&self.config.target_root, kind, key);
        fixture::write_atomic(&path, &bytes).map_err(|source| SnapshotError::Io {
            path: path.clone(),
            source,
        })?;
        crate::log::debug!(%key, %path, kind = kind.dir_name(), "artifact written");
        Ok(layout::report_path(kind, key))
    }

    /// Delete a leftover artifact of an earlier run, if there is one
    fn remove_artifact(&self, kind: ArtifactKind, key: &FixtureKey) -> Result<(), SnapshotError> {
        let path = layout::artifact_path(&self.config.target_root, kind, key);
        match fs::remove_file(&path) {
            Ok(()) => {
                crate::log::debug!(%key, %path, kind = kind.dir_name(), "stale artifact removed");
                Ok(())
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(SnapshotError::Io { path, source }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn engine() -> (TempDir, SnapshotEngine) {
        let dir = TempDir::new().unwrap();
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        let engine = SnapshotEngine::new(EngineConfig::new(root.join("fixtures"), root.join("target")));
        (dir, engine)
    }

    fn request(titles: &[&str], candidate: PixelBuffer) -> ComparisonRequest {
        ComparisonRequest::new(TestPath::new(titles.iter().copied()).unwrap(), candidate)
    }

    #[test]
    fn engine_is_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SnapshotEngine>();
    }

    #[test]
    fn first_sight_creates_baseline() {
        let (_dir, engine) = engine();
        let result = engine
            .compare(request(&["Card", "renders"], PixelBuffer::filled(4, 4, [1, 2, 3, 255])))
            .unwrap();
        assert_eq!(result.verdict, Verdict::BaselineCreated);
        assert!(result.is_pass());
        assert!(result.diff_image.is_none());
        assert!(result.attachments.contains(&Attachment::Note(BASELINE_NOTE.to_string())));
    }

    #[test]
    fn passing_comparison_has_no_diff_attachment() {
        let (_dir, engine) = engine();
        let image = PixelBuffer::filled(4, 4, [1, 2, 3, 255]);
        let key = FixtureKey::new("Card", "plain").unwrap();
        let options = SnapshotOptions::default();
        engine.compare_key(&key, image.clone(), &options).unwrap();

        let result = engine.compare_key(&key, image, &options).unwrap();
        assert_eq!(result.verdict, Verdict::Passed);
        assert_eq!(result.diff_path(), None);
        assert!(result.into_assertion().is_ok());
    }

    #[test]
    fn assertion_reports_width_before_pixels() {
        let (_dir, engine) = engine();
        let key = FixtureKey::new("Card", "resized").unwrap();
        let options = SnapshotOptions::default();
        engine
            .compare_key(&key, PixelBuffer::filled(10, 5, [0, 0, 0, 255]), &options)
            .unwrap();

        let result = engine
            .compare_key(&key, PixelBuffer::filled(12, 5, [0, 0, 0, 255]), &options)
            .unwrap();
        let err = result.into_assertion().unwrap_err();
        assert_eq!(err.reason, "image widths differ: expected 10, got 12");
        assert_eq!(err.diff_path.as_deref(), Some("./Card/diff/resized.png"));
    }

    #[test]
    fn assertion_reports_pixel_count_when_sizes_agree() {
        let (_dir, engine) = engine();
        let key = FixtureKey::new("Card", "recolored").unwrap();
        let options = SnapshotOptions::default();
        engine
            .compare_key(&key, PixelBuffer::filled(3, 3, [0, 0, 0, 255]), &options)
            .unwrap();

        let mut changed = PixelBuffer::filled(3, 3, [0, 0, 0, 255]);
        changed.fill_rect(0, 0, 2, 1, [255, 255, 255, 255]);
        let err = engine
            .compare_key(&key, changed, &options)
            .unwrap()
            .into_assertion()
            .unwrap_err();
        assert_eq!(err.reason, "2 pixels differ");
        assert_eq!(err.result.diff_pixel_count, 2);
    }

    #[test]
    fn request_options_override_defaults() {
        let (_dir, engine) = engine();
        let path = ["Card", "tolerant"];
        let base = PixelBuffer::filled(4, 4, [128, 128, 128, 255]);
        engine.compare(request(&path, base.clone())).unwrap();

        let mut nudged = base;
        nudged.fill_rect(0, 0, 1, 1, [129, 128, 128, 255]);
        let key = FixtureKey::new("Card", "Card___tolerant").unwrap();
        let strict = engine
            .compare_key(&key, nudged.clone(), &SnapshotOptions::default())
            .unwrap();
        assert_eq!(strict.verdict, Verdict::Failed);

        let tolerant = SnapshotOptions::default()
            .with_threshold(crate::types::Threshold::try_new(0.1).unwrap());
        let relaxed = engine.compare_key(&key, nudged, &tolerant).unwrap();
        assert_eq!(relaxed.verdict, Verdict::Passed);
    }

    #[test]
    fn empty_candidate_aborts_without_touching_fixtures() {
        let (_dir, engine) = engine();
        let err = engine
            .compare(request(&["Card", "empty"], PixelBuffer::filled(0, 0, [0; 4])))
            .unwrap_err();
        assert!(matches!(err, SnapshotError::Codec(_)));
        let key = FixtureKey::new("Card", "Card___empty").unwrap();
        assert!(!engine.store().exists(&key));
    }

    #[test]
    fn racing_first_runs_of_one_key_both_succeed() {
        use std::sync::Barrier;
        use std::thread;

        let (_dir, engine) = engine();
        let image = PixelBuffer::filled(6, 6, [30, 60, 90, 255]);
        let options = SnapshotOptions::default();

        for round in 0..16 {
            let key = FixtureKey::new("Race", format!("Race___round {round}")).unwrap();
            let barrier = Barrier::new(2);
            let (engine, key, image, options, barrier) =
                (&engine, &key, &image, &options, &barrier);
            let verdicts: Vec<Verdict> = thread::scope(|scope| {
                let handles: Vec<_> = (0..2)
                    .map(|_| {
                        scope.spawn(move || {
                            barrier.wait();
                            engine.compare_key(key, image.clone(), options)
                        })
                    })
                    .collect();
                handles
                    .into_iter()
                    .map(|handle| handle.join().unwrap().unwrap().verdict)
                    .collect()
            });

            assert_eq!(
                verdicts.iter().filter(|v| **v == Verdict::BaselineCreated).count(),
                1,
                "{verdicts:?}"
            );
            assert!(verdicts.contains(&Verdict::Passed), "{verdicts:?}");
        }
    }

    #[test]
    fn recheck_leaves_the_stored_screenshot_alone() {
        use image::codecs::png::PngEncoder;
        use image::{ExtendedColorType, ImageEncoder};

        let (_dir, engine) = engine();
        let key = FixtureKey::new("Card", "Card___gray").unwrap();
        engine
            .accept(&key, &PixelBuffer::filled(3, 3, [70, 70, 70, 255]))
            .unwrap();

        // A grayscale PNG, as a browser might have written it
        let mut gray = Vec::new();
        PngEncoder::new(&mut gray)
            .write_image(&[70; 9], 3, 3, ExtendedColorType::L8)
            .unwrap();
        let screenshot = layout::artifact_path(
            &engine.config().target_root,
            ArtifactKind::Screenshot,
            &key,
        );
        fixture::write_atomic(&screenshot, &gray).unwrap();

        let candidate = codec::decode(&gray).unwrap();
        let result = engine
            .recheck(&key, candidate, &SnapshotOptions::default())
            .unwrap();
        assert_eq!(result.verdict, Verdict::Passed);
        assert_eq!(fs::read(&screenshot).unwrap(), gray);
    }

    #[test]
    fn recheck_never_bootstraps() {
        let (_dir, engine) = engine();
        let key = FixtureKey::new("Card", "Card___unknown").unwrap();
        let err = engine
            .recheck(&key, PixelBuffer::filled(2, 2, [0, 0, 0, 255]), &SnapshotOptions::default())
            .unwrap_err();
        assert!(matches!(
            err,
            SnapshotError::Fixture(FixtureError::NotFound { .. })
        ));
        assert!(!engine.store().exists(&key));
    }

    #[test]
    fn passing_rerun_removes_the_previous_diff() {
        let (_dir, engine) = engine();
        let key = FixtureKey::new("Card", "Card___fixed").unwrap();
        let options = SnapshotOptions::default();
        let diff_path =
            layout::artifact_path(&engine.config().target_root, ArtifactKind::Diff, &key);

        engine
            .compare_key(&key, PixelBuffer::filled(4, 4, [0, 0, 0, 255]), &options)
            .unwrap();
        let broken = PixelBuffer::filled(4, 4, [255, 255, 255, 255]);
        let failed = engine.compare_key(&key, broken, &options).unwrap();
        assert_eq!(failed.verdict, Verdict::Failed);
        assert!(diff_path.is_file());

        let passed = engine
            .compare_key(&key, PixelBuffer::filled(4, 4, [0, 0, 0, 255]), &options)
            .unwrap();
        assert_eq!(passed.verdict, Verdict::Passed);
        assert!(!diff_path.exists());
    }
}
