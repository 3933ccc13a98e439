//! Baselines built from checked-in fixture files.

use driftwatch_kernel::{Fingerprint, ProducerFamily};
use std::path::{Path, PathBuf};

use crate::extract::{ScanBudget, StoreLayout, capabilities, extract_with_kind};
use crate::storage_tree::extract_tree_fixture_file;

/// Fixtures whose path contains this marker capture known-bad formats and
/// never contribute to a baseline.
pub const DRIFT_FIXTURE_MARKER: &str = "schema_drift";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Baseline {
    pub fingerprint: Fingerprint,
    /// Configured fixtures that passed the marker filter, as written.
    pub fixtures: Vec<String>,
    /// Fixtures that passed the filter but do not exist on disk.
    pub missing: Vec<String>,
}

impl Baseline {
    pub fn is_empty(&self) -> bool {
        self.fingerprint.is_empty()
    }
}

/// Merge every eligible fixture into one baseline fingerprint.
///
/// Relative fixture paths resolve against `base_dir`. Files with the wrong
/// extension for the family's layout are skipped.
pub fn build_baseline(family: ProducerFamily, fixtures: &[String], base_dir: &Path) -> Baseline {
    let layout = capabilities(family).layout;
    let extension = layout.fixture_extension();
    let mut baseline = Baseline::default();

    for fixture in fixtures {
        if fixture.is_empty() || fixture.contains(DRIFT_FIXTURE_MARKER) {
            continue;
        }
        baseline.fixtures.push(fixture.clone());
        let path = resolve(base_dir, fixture);
        if path.extension().and_then(|ext| ext.to_str()) != Some(extension) {
            continue;
        }
        if !path.is_file() {
            tracing::debug!(%family, path = %path.display(), "baseline fixture missing");
            baseline.missing.push(fixture.clone());
            continue;
        }
        let extraction = match layout {
            StoreLayout::LinkedTree => extract_tree_fixture_file(family, &path),
            _ => extract_with_kind(family, layout.default_scan_kind(), &path, ScanBudget::BASELINE),
        };
        baseline.fingerprint = baseline.fingerprint.merge(&extraction.fingerprint());
    }
    baseline
}

fn resolve(base_dir: &Path, fixture: &str) -> PathBuf {
    let path = PathBuf::from(fixture);
    if path.is_absolute() {
        path
    } else {
        base_dir.join(path)
    }
}
