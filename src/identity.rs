//! Stable snapshot names derived from hierarchical test names.
//!
//! A test path like `["Navbar", "should show menu"]` becomes the fixture key
//! `Navbar/Navbar___should show menu`. When one test takes several snapshots
//! the second and later ones get `-1`, `-2`, ... appended, so every key in a
//! run is unique and the same test structure always yields the same keys.

use std::collections::{HashMap, HashSet};
use std::fmt;

use parking_lot::Mutex;

use crate::errors::IdentityError;

/// Joins the titles of a test path into a snapshot name
pub const TITLE_SEPARATOR: &str = "___";

/// Hierarchical test name, outermost suite first
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TestPath(Vec<String>);

impl TestPath {
    pub fn new<I, S>(titles: I) -> Result<Self, IdentityError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let titles: Vec<String> = titles.into_iter().map(Into::into).collect();
        if titles.is_empty() {
            return Err(IdentityError::EmptyTestPath);
        }
        Ok(Self(titles))
    }

    /// Title of the outermost suite
    pub fn suite(&self) -> &str {
        &self.0[0]
    }

    pub fn titles(&self) -> &[String] {
        &self.0
    }

    /// All titles joined with [`TITLE_SEPARATOR`]
    pub fn joined(&self) -> String {
        self.0.join(TITLE_SEPARATOR)
    }
}

/// Identifies one fixture: `<suite>/<name>.png` under every root
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FixtureKey {
    suite: String,
    name: String,
}

impl FixtureKey {
    /// Build a key, rejecting components that cannot be used as file names
    pub fn new(suite: impl Into<String>, name: impl Into<String>) -> Result<Self, IdentityError> {
        let suite = suite.into();
        let name = name.into();
        check_component("suite", &suite)?;
        check_component("name", &name)?;
        Ok(Self { suite, name })
    }

    pub fn suite(&self) -> &str {
        &self.suite
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for FixtureKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.suite, self.name)
    }
}

fn check_component(field: &'static str, value: &str) -> Result<(), IdentityError> {
    let invalid = value.is_empty()
        || value == "."
        || value == ".."
        || value.contains(['/', '\\', '\0']);
    if invalid {
        return Err(IdentityError::InvalidComponent {
            field,
            value: value.to_string(),
        });
    }
    Ok(())
}

/// Per-run resolver from test paths to unique fixture keys.
///
/// The occurrence counts live as long as the namer. Create one per run; there
/// is deliberately no way to clear it halfway through.
#[derive(Debug, Default)]
pub struct SnapshotNamer {
    state: Mutex<NamerState>,
}

#[derive(Debug, Default)]
struct NamerState {
    /// Repeats seen so far per joined name
    occurrences: HashMap<String, u32>,
    /// Every `(suite, name)` handed out in this run
    issued: HashSet<(String, String)>,
}

impl SnapshotNamer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve the next key for `path`.
    ///
    /// The first call for a joined name returns it unchanged; the k-th repeat
    /// returns `name-k`. A name that was already handed out, for example a
    /// test literally titled `renders-1` next to the first repeat of
    /// `renders`, fails with [`IdentityError::NameCollision`].
    pub fn resolve(&self, path: &TestPath) -> Result<FixtureKey, IdentityError> {
        let base = FixtureKey::new(path.suite(), path.joined())?;

        let mut state = self.state.lock();
        let repeat = state.occurrences.get(&base.name).map_or(0, |seen| seen + 1);
        let name = if repeat == 0 {
            base.name.clone()
        } else {
            format!("{}-{}", base.name, repeat)
        };

        let issued = (base.suite.clone(), name.clone());
        if state.issued.contains(&issued) {
            return Err(IdentityError::NameCollision {
                suite: base.suite,
                name,
            });
        }
        state.issued.insert(issued);
        state.occurrences.insert(base.name, repeat);

        Ok(FixtureKey {
            suite: base.suite,
            name,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn path(titles: &[&str]) -> TestPath {
        TestPath::new(titles.iter().copied()).unwrap()
    }

    #[test]
    fn first_occurrence_is_the_joined_path() {
        let namer = SnapshotNamer::new();
        let key = namer
            .resolve(&path(&["Navbar", "[mobile] - should show menu"]))
            .unwrap();
        assert_eq!(key.suite(), "Navbar");
        assert_eq!(key.name(), "Navbar___[mobile] - should show menu");
    }

    #[test]
    fn repeats_get_numbered_suffixes() {
        let namer = SnapshotNamer::new();
        let footer = path(&["Footer", "renders"]);
        let names: Vec<String> = (0..4)
            .map(|_| namer.resolve(&footer).unwrap().name().to_string())
            .collect();
        assert_eq!(
            names,
            [
                "Footer___renders",
                "Footer___renders-1",
                "Footer___renders-2",
                "Footer___renders-3"
            ]
        );
    }

    #[test]
    fn counters_are_per_name() {
        let namer = SnapshotNamer::new();
        let a = path(&["Suite", "a"]);
        let b = path(&["Suite", "b"]);
        assert_eq!(namer.resolve(&a).unwrap().name(), "Suite___a");
        assert_eq!(namer.resolve(&b).unwrap().name(), "Suite___b");
        assert_eq!(namer.resolve(&a).unwrap().name(), "Suite___a-1");
    }

    #[test]
    fn separate_namers_do_not_share_counts() {
        let footer = path(&["Footer", "renders"]);
        let first_run = SnapshotNamer::new();
        first_run.resolve(&footer).unwrap();
        let second_run = SnapshotNamer::new();
        assert_eq!(second_run.resolve(&footer).unwrap().name(), "Footer___renders");
    }

    #[test]
    fn empty_path_is_rejected() {
        assert_eq!(
            TestPath::new(Vec::<String>::new()),
            Err(IdentityError::EmptyTestPath)
        );
    }

    #[test]
    fn separators_are_rejected() {
        let namer = SnapshotNamer::new();
        let err = namer.resolve(&path(&["Menu", "opens a/b"])).unwrap_err();
        assert!(matches!(err, IdentityError::InvalidComponent { field: "name", .. }));
        assert!(FixtureKey::new("..", "x").is_err());
        assert!(FixtureKey::new("suite", "").is_err());
    }

    #[test]
    fn numbered_repeat_cannot_reuse_a_literal_title() {
        let namer = SnapshotNamer::new();
        let literal = path(&["Footer", "renders-1"]);
        let repeated = path(&["Footer", "renders"]);

        assert_eq!(namer.resolve(&literal).unwrap().name(), "Footer___renders-1");
        assert_eq!(namer.resolve(&repeated).unwrap().name(), "Footer___renders");
        assert_eq!(
            namer.resolve(&repeated),
            Err(IdentityError::NameCollision {
                suite: "Footer".to_string(),
                name: "Footer___renders-1".to_string(),
            })
        );
        // Failed attempts are not counted
        assert!(namer.resolve(&repeated).is_err());
    }

    #[test]
    fn literal_title_after_a_numbered_repeat_collides() {
        let namer = SnapshotNamer::new();
        let repeated = path(&["Footer", "renders"]);
        namer.resolve(&repeated).unwrap();
        assert_eq!(namer.resolve(&repeated).unwrap().name(), "Footer___renders-1");

        let err = namer.resolve(&path(&["Footer", "renders-1"])).unwrap_err();
        assert!(matches!(err, IdentityError::NameCollision { .. }));
    }

    #[test]
    fn display_is_suite_slash_name() {
        let key = FixtureKey::new("Navbar", "Navbar___opens").unwrap();
        assert_eq!(key.to_string(), "Navbar/Navbar___opens");
    }

    #[test]
    fn concurrent_resolution_stays_unique() {
        let namer = Arc::new(SnapshotNamer::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let namer = Arc::clone(&namer);
                thread::spawn(move || {
                    let footer = path(&["Footer", "renders"]);
                    (0..25)
                        .map(|_| namer.resolve(&footer).unwrap().name().to_string())
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut names = HashSet::new();
        for handle in handles {
            for name in handle.join().unwrap() {
                assert!(names.insert(name), "duplicate key");
            }
        }
        assert_eq!(names.len(), 200);
        assert!(names.contains("Footer___renders"));
        assert!(names.contains("Footer___renders-199"));
    }
}
