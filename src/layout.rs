//! On-disk layout of fixtures and per-run artifacts.
//!
//! ```text
//! <fixture_root>/<suite>/<name>.png             accepted reference
//! <target_root>/<suite>/screenshot/<name>.png   candidate of this run
//! <target_root>/<suite>/fixture/<name>.png      reference copied for the report
//! <target_root>/<suite>/diff/<name>.png         highlighted difference
//! ```

use camino::{Utf8Path, Utf8PathBuf};

use crate::identity::FixtureKey;

/// File extension of every image the engine writes
pub const IMAGE_EXTENSION: &str = "png";

/// Kinds of per-run artifacts under the target root
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    Screenshot,
    Fixture,
    Diff,
}

impl ArtifactKind {
    pub fn dir_name(self) -> &'static str {
        match self {
            ArtifactKind::Screenshot => "screenshot",
            ArtifactKind::Fixture => "fixture",
            ArtifactKind::Diff => "diff",
        }
    }
}

/// `<fixture_root>/<suite>/<name>.png`
pub fn fixture_path(fixture_root: &Utf8Path, key: &FixtureKey) -> Utf8PathBuf {
    fixture_root.join(key.suite()).join(file_name(key))
}

/// `<target_root>/<suite>/<kind>/<name>.png`
pub fn artifact_path(target_root: &Utf8Path, kind: ArtifactKind, key: &FixtureKey) -> Utf8PathBuf {
    target_root
        .join(key.suite())
        .join(kind.dir_name())
        .join(file_name(key))
}

/// Path of an artifact relative to the report written into the target root
pub fn report_path(kind: ArtifactKind, key: &FixtureKey) -> String {
    format!(
        "./{}/{}/{}",
        key.suite(),
        kind.dir_name(),
        file_name(key)
    )
}

fn file_name(key: &FixtureKey) -> String {
    format!("{}.{}", key.name(), IMAGE_EXTENSION)
}
