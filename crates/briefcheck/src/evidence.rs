//! Evidence capture.
//!
//! Screenshots land at `<root>/<scenario>/<checkpoint>.png`; failure evidence
//! at `<checkpoint>.failure.png`, so a failed run never overwrites the picture
//! of a passing checkpoint. Within one run a name is written once. Every
//! failure surfaces as [`HarnessError::Capture`].

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::{info, warn};

use crate::driver::ScreenshotTarget;
use crate::locator::Locator;
use crate::result::{HarnessError, HarnessResult};
use crate::session::Session;

/// Checkpoint or failure evidence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceKind {
    /// Taken deliberately by the scenario
    Checkpoint,
    /// Taken by the runner after a failure
    Failure,
}

impl EvidenceKind {
    const fn extension(self) -> &'static str {
        match self {
            Self::Checkpoint => "png",
            Self::Failure => "failure.png",
        }
    }
}

/// What to photograph
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureTarget {
    /// The whole page
    FullPage,
    /// One element, resolved strictly
    Element(Locator),
}

/// A written screenshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evidence {
    /// Checkpoint name as given
    pub name: String,
    /// Checkpoint or failure
    pub kind: EvidenceKind,
    /// File written
    pub path: PathBuf,
    /// Image width in pixels
    pub width: u32,
    /// Image height in pixels
    pub height: u32,
    /// File size
    pub bytes: usize,
}

/// Writes evidence under a fixed root
#[derive(Debug)]
pub struct EvidenceStore {
    root: PathBuf,
    written: Mutex<HashSet<PathBuf>>,
}

impl EvidenceStore {
    /// Store rooted at `root`
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            written: Mutex::new(HashSet::new()),
        }
    }

    /// Output root
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Where a checkpoint of a scenario is written
    #[must_use]
    pub fn path_for(&self, scenario: &str, name: &str, kind: EvidenceKind) -> PathBuf {
        self.root
            .join(slugify(scenario))
            .join(format!("{}.{}", slugify(name), kind.extension()))
    }

    /// Start a new run of `scenario`: its earlier files may be written again
    pub fn begin_run(&self, scenario: &str) {
        let dir = self.root.join(slugify(scenario));
        self.written
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|path| path.parent() != Some(dir.as_path()));
    }

    /// Files written during this run
    #[must_use]
    pub fn written(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self
            .written
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect();
        paths.sort();
        paths
    }

    /// Screenshot `target` and write it as evidence
    pub async fn capture(
        &self,
        session: &Session,
        scenario: &str,
        name: &str,
        target: &CaptureTarget,
        kind: EvidenceKind,
    ) -> HarnessResult<Evidence> {
        let result = self.try_capture(session, scenario, name, target, kind).await;
        if let Err(e) = &result {
            warn!(session = session.id(), checkpoint = name, error = %e, "evidence capture failed");
        }
        result
    }

    async fn try_capture(
        &self,
        session: &Session,
        scenario: &str,
        name: &str,
        target: &CaptureTarget,
        kind: EvidenceKind,
    ) -> HarnessResult<Evidence> {
        let failed = |message: String| HarnessError::Capture {
            name: name.to_string(),
            message,
        };
        let path = self.path_for(scenario, name, kind);
        if self.is_written(&path) {
            return Err(failed(format!("{} already written in this run", path.display())));
        }

        let shot = match target {
            CaptureTarget::FullPage => ScreenshotTarget::FullPage,
            CaptureTarget::Element(locator) => {
                let resolved = locator
                    .resolve(session.driver())
                    .await
                    .map_err(|e| failed(e.to_string()))?;
                ScreenshotTarget::Element {
                    selector: locator.selector().clone(),
                    index: resolved.index,
                }
            }
        };
        let png = session
            .driver()
            .screenshot(&shot)
            .await
            .map_err(|e| failed(e.to_string()))?;
        let (width, height) = image::ImageReader::new(Cursor::new(&png))
            .with_guessed_format()
            .map_err(|e| failed(e.to_string()))?
            .into_dimensions()
            .map_err(|e| failed(format!("not a readable image: {e}")))?;

        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| failed(format!("{}: {e}", dir.display())))?;
        }
        tokio::fs::write(&path, &png)
            .await
            .map_err(|e| failed(format!("{}: {e}", path.display())))?;
        self.written
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.clone());

        info!(
            session = session.id(),
            checkpoint = name,
            path = %path.display(),
            width,
            height,
            "evidence captured"
        );
        Ok(Evidence {
            name: name.to_string(),
            kind,
            path,
            width,
            height,
            bytes: png.len(),
        })
    }

    fn is_written(&self, path: &Path) -> bool {
        self.written
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(path)
    }
}

/// Lowercase ASCII slug; runs of anything else collapse to one `-`
#[must_use]
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('-') && !slug.is_empty() {
            slug.push('-');
        }
    }
    let slug = slug.trim_end_matches('-');
    if slug.is_empty() {
        "checkpoint".to_string()
    } else {
        slug.to_string()
    }
}
