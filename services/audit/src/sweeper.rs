use std::fs::Metadata;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::fs;
use tracing::{debug, instrument};

use crate::age::PassClock;
use crate::archive_fs;
use crate::confirm::ConfirmationPolicy;
use crate::error::{AuditError, Result};
use crate::finding::Finding;
use crate::summary::PassSummary;

/// Loose image files directly under `dir` that have outlived `retention`
pub async fn expired_images(
    dir: &Path,
    extensions: &[String],
    retention: Duration,
    clock: &PassClock,
) -> Result<Vec<PathBuf>> {
    let mut entries = fs::read_dir(dir)
        .await
        .map_err(|e| AuditError::environment(dir, e))?;

    let mut expired = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| AuditError::environment(dir, e))?
    {
        let path = entry.path();
        if !has_image_extension(&path, extensions) {
            continue;
        }

        let Some(modified) = file_mtime(&path, entry.metadata().await) else {
            continue;
        };

        if clock.age_of(modified).exceeds(retention) {
            expired.push(path);
        }
    }

    expired.sort();
    Ok(expired)
}

/// Modification time of a regular file; anything else is skipped
///
/// Files can vanish between listing and stat while the renderer runs.
fn file_mtime(path: &Path, metadata: std::io::Result<Metadata>) -> Option<SystemTime> {
    let metadata = match metadata {
        Ok(metadata) => metadata,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "Skipping image, cannot read metadata");
            return None;
        }
    };
    if !metadata.is_file() {
        return None;
    }

    match metadata.modified() {
        Ok(modified) => Some(modified),
        Err(e) => {
            debug!(path = %path.display(), error = %e, "Skipping image, no modification time");
            None
        }
    }
}

fn has_image_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| extensions.iter().any(|known| known.eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}

/// Delete expired loose images after a single confirmation for the batch
#[instrument(skip_all, fields(dir = %dir.display()))]
pub async fn sweep_loose_images(
    dir: &Path,
    extensions: &[String],
    retention: Duration,
    clock: &PassClock,
    policy: &mut ConfirmationPolicy,
    summary: &mut PassSummary,
) -> Result<()> {
    let expired = expired_images(dir, extensions, retention, clock).await?;
    if expired.is_empty() {
        debug!("No expired loose images");
        return Ok(());
    }

    summary.loose_images += expired.len();
    let finding = Finding::LooseImages {
        count: expired.len(),
        path: dir.to_path_buf(),
    };
    if !policy.confirm(&finding).await? {
        return Ok(());
    }

    for path in &expired {
        if archive_fs::remove_file(path).await {
            summary.images_deleted += 1;
            metrics::counter!("audit.images.deleted").increment(1);
        } else {
            summary.deletions_failed += 1;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::confirm::{MockPrompter, RunMode};
    use crate::testing::policy;

    const RETENTION: Duration = Duration::from_secs(900);

    fn extensions() -> Vec<String> {
        vec!["jpg".to_string(), "gif".to_string(), "wbmp".to_string()]
    }

    fn populate(dir: &Path) {
        for name in ["Monitor1-r.jpg", "Monitor2-a.GIF", "zone.wbmp", "notes.txt"] {
            std::fs::write(dir.join(name), b"data").unwrap();
        }
        std::fs::create_dir(dir.join("nested.jpg")).unwrap();
    }

    #[tokio::test]
    async fn test_only_old_image_files_expire() {
        let tmp = tempfile::tempdir().unwrap();
        populate(tmp.path());

        let fresh = PassClock::start();
        let found = expired_images(tmp.path(), &extensions(), RETENTION, &fresh)
            .await
            .unwrap();
        assert!(found.is_empty());

        let later = PassClock::at(SystemTime::now() + Duration::from_secs(1000));
        let found = expired_images(tmp.path(), &extensions(), RETENTION, &later)
            .await
            .unwrap();
        let names: Vec<_> = found
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["Monitor1-r.jpg", "Monitor2-a.GIF", "zone.wbmp"]);
    }

    #[test]
    fn test_unreadable_entries_are_skipped() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("Monitor1-r.jpg");

        let denied = std::io::Error::from(std::io::ErrorKind::PermissionDenied);
        assert_eq!(file_mtime(&path, Err(denied)), None);

        std::fs::create_dir(&path).unwrap();
        assert_eq!(file_mtime(&path, std::fs::metadata(&path)), None);

        let file = tmp.path().join("Monitor2-r.jpg");
        std::fs::write(&file, b"jpeg").unwrap();
        assert!(file_mtime(&file, std::fs::metadata(&file)).is_some());
    }

    #[tokio::test]
    async fn test_sweep_asks_once_for_the_batch() {
        let tmp = tempfile::tempdir().unwrap();
        populate(tmp.path());

        let mut prompter = MockPrompter::new();
        prompter
            .expect_ask()
            .withf(|question: &str| question.contains("Found 3 expired"))
            .times(1)
            .returning(|_| Ok(Some("y".to_string())));
        let mut policy = ConfirmationPolicy::new(RunMode::Interactive, Box::new(prompter));
        let mut summary = PassSummary::default();

        let later = PassClock::at(SystemTime::now() + Duration::from_secs(1000));
        sweep_loose_images(tmp.path(), &extensions(), RETENTION, &later, &mut policy, &mut summary)
            .await
            .unwrap();

        assert_eq!(summary.loose_images, 3);
        assert_eq!(summary.images_deleted, 3);
        assert!(tmp.path().join("notes.txt").exists());
        assert!(tmp.path().join("nested.jpg").exists());
        assert!(!tmp.path().join("zone.wbmp").exists());
    }

    #[tokio::test]
    async fn test_nothing_expired_means_no_prompt() {
        let tmp = tempfile::tempdir().unwrap();
        populate(tmp.path());

        let mut policy = policy(RunMode::Interactive);
        let mut summary = PassSummary::default();
        sweep_loose_images(
            tmp.path(),
            &extensions(),
            RETENTION,
            &PassClock::start(),
            &mut policy,
            &mut summary,
        )
        .await
        .unwrap();

        assert_eq!(summary, PassSummary::default());
    }
}
