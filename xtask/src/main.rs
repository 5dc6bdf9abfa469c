use std::fs;
use std::process::ExitCode;

use camino::{Utf8Path, Utf8PathBuf};
use miette::{Context, IntoDiagnostic, miette};
use rayon::prelude::*;
use snapdiff::layout::{ArtifactKind, IMAGE_EXTENSION};
use snapdiff::{
    EngineConfig, FixtureError, FixtureKey, PixelBuffer, SnapshotEngine, SnapshotError, codec,
};

fn main() -> miette::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        usage();
        return Ok(ExitCode::FAILURE);
    }

    match args[1].as_str() {
        "verify" => {
            let (fixtures, target, _) = roots(&args[2..])?;
            verify(&fixtures, &target)
        }
        "accept" => {
            let (fixtures, target, keys) = roots(&args[2..])?;
            accept(&fixtures, &target, keys)
        }
        _ => {
            eprintln!("Unknown command: {}", args[1]);
            usage();
            Ok(ExitCode::FAILURE)
        }
    }
}

fn usage() {
    eprintln!("Usage: cargo xtask <command>");
    eprintln!("Commands:");
    eprintln!("  verify <fixture_dir> <target_dir>               Re-compare stored screenshots");
    eprintln!("  accept <fixture_dir> <target_dir> [suite/name]  Promote screenshots to fixtures");
}

fn roots(args: &[String]) -> miette::Result<(Utf8PathBuf, Utf8PathBuf, &[String])> {
    match args {
        [fixtures, target, rest @ ..] => Ok((
            Utf8PathBuf::from(fixtures.as_str()),
            Utf8PathBuf::from(target.as_str()),
            rest,
        )),
        _ => Err(miette!("expected <fixture_dir> <target_dir>")),
    }
}

/// A candidate left behind under `<target>/<suite>/screenshot/`
#[derive(Debug)]
struct Screenshot {
    key: FixtureKey,
    path: Utf8PathBuf,
}

impl Screenshot {
    fn load(&self) -> miette::Result<PixelBuffer> {
        let bytes = fs::read(&self.path)
            .into_diagnostic()
            .wrap_err_with(|| format!("reading {}", self.path))?;
        Ok(codec::decode(&bytes)?)
    }
}

fn screenshots(target: &Utf8Path) -> miette::Result<Vec<Screenshot>> {
    let suites = target
        .read_dir_utf8()
        .into_diagnostic()
        .wrap_err_with(|| format!("reading {target}"))?;

    let mut found = Vec::new();
    for suite in suites {
        let suite = suite.into_diagnostic()?;
        let dir = suite.path().join(ArtifactKind::Screenshot.dir_name());
        if !dir.is_dir() {
            continue;
        }
        for entry in dir.read_dir_utf8().into_diagnostic()? {
            let entry = entry.into_diagnostic()?;
            let path = entry.path();
            if path.extension() != Some(IMAGE_EXTENSION) {
                continue;
            }
            let Some(name) = path.file_stem() else {
                continue;
            };
            found.push(Screenshot {
                key: FixtureKey::new(suite.file_name(), name)?,
                path: path.to_owned(),
            });
        }
    }

    found.sort_by(|a, b| a.key.cmp(&b.key));
    Ok(found)
}

#[derive(Debug)]
enum Outcome {
    Passed,
    Failed(String),
    Missing,
}

fn check(engine: &SnapshotEngine, shot: &Screenshot) -> miette::Result<Outcome> {
    let candidate = shot.load()?;
    let options = engine.config().default_options;
    match engine.recheck(&shot.key, candidate, &options) {
        Ok(result) => Ok(match result.into_assertion() {
            Ok(_) => Outcome::Passed,
            Err(mismatch) => Outcome::Failed(mismatch.reason),
        }),
        Err(SnapshotError::Fixture(FixtureError::NotFound { .. })) => Ok(Outcome::Missing),
        Err(err) => Err(err.into()),
    }
}

fn verify(fixtures: &Utf8Path, target: &Utf8Path) -> miette::Result<ExitCode> {
    let engine = SnapshotEngine::new(EngineConfig::new(fixtures, target));
    let shots = screenshots(target)?;
    eprintln!("Verifying {} screenshot(s)...", shots.len());

    let outcomes: Vec<(&Screenshot, miette::Result<Outcome>)> = shots
        .par_iter()
        .map(|shot| (shot, check(&engine, shot)))
        .collect();

    let (mut passed, mut failed) = (0usize, 0usize);
    for (shot, outcome) in &outcomes {
        match outcome {
            Ok(Outcome::Passed) => {
                passed += 1;
                println!("  ok       {}", shot.key);
            }
            Ok(Outcome::Failed(reason)) => {
                failed += 1;
                println!("  FAIL     {}: {reason}", shot.key);
            }
            Ok(Outcome::Missing) => {
                failed += 1;
                println!("  MISSING  {}: no fixture recorded", shot.key);
            }
            Err(err) => {
                failed += 1;
                println!("  ERROR    {}: {err}", shot.key);
            }
        }
    }

    println!("\n{passed} passed, {failed} failed");
    Ok(if failed == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn parse_key(raw: &str) -> miette::Result<FixtureKey> {
    let (suite, name) = raw
        .split_once('/')
        .ok_or_else(|| miette!("invalid key {raw:?}, expected <suite>/<name>"))?;
    Ok(FixtureKey::new(suite, name)?)
}

fn accept(fixtures: &Utf8Path, target: &Utf8Path, keys: &[String]) -> miette::Result<ExitCode> {
    let engine = SnapshotEngine::new(EngineConfig::new(fixtures, target));
    let mut shots = screenshots(target)?;

    if !keys.is_empty() {
        let wanted = keys
            .iter()
            .map(|raw| parse_key(raw))
            .collect::<miette::Result<Vec<_>>>()?;
        if let Some(key) = wanted
            .iter()
            .find(|key| !shots.iter().any(|shot| &shot.key == *key))
        {
            return Err(miette!("no screenshot stored for {key}"));
        }
        shots.retain(|shot| wanted.contains(&shot.key));
    }

    for shot in &shots {
        let candidate = shot.load()?;
        let path = engine.accept(&shot.key, &candidate)?;
        println!("  accepted {} -> {path}", shot.key);
    }

    println!("\n{} fixture(s) accepted", shots.len());
    Ok(ExitCode::SUCCESS)
}
