use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;

/// Deletes scratch entries whose modification time is older than `max_age`
///
/// Safe to run next to live requests as long as `max_age` exceeds the longest
/// possible request (both timeouts plus their kill grace). Entries that vanish
/// mid-sweep are skipped silently. Returns the number of entries removed.
pub fn sweep(scratch_dir: &Path, max_age: Duration) -> Result<usize> {
    let now = SystemTime::now();
    let mut removed = 0;

    let entries = match fs::read_dir(scratch_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
        Err(e) => {
            return Err(e)
                .with_context(|| format!("Failed to list {}", scratch_dir.display()));
        }
    };

    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                log::warn!("Skipping unreadable scratch entry: {e}");
                continue;
            }
        };
        let path = entry.path();
        let metadata = match entry.metadata() {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == ErrorKind::NotFound => continue,
            Err(e) => {
                log::warn!("Failed to stat {}: {e}", path.display());
                continue;
            }
        };

        // A timestamp in the future counts as age zero
        let age = metadata
            .modified()
            .ok()
            .and_then(|modified| now.duration_since(modified).ok())
            .unwrap_or_default();
        if age <= max_age {
            continue;
        }

        let result = if metadata.is_dir() {
            fs::remove_dir_all(&path)
        } else {
            fs::remove_file(&path)
        };
        match result {
            Ok(()) => {
                log::debug!("Reaped {} (age {}s)", path.display(), age.as_secs());
                removed += 1;
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => log::warn!("Failed to reap {}: {e}", path.display()),
        }
    }

    Ok(removed)
}

/// Sweeps every `interval` until `token` is cancelled
///
/// The first sweep happens one `interval` after start; startup sweeping is
/// left to the caller.
pub async fn reaper(
    scratch_dir: PathBuf,
    interval: Duration,
    max_age: Duration,
    token: CancellationToken,
) -> Result<()> {
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
    log::info!(
        "Reaper watching {} (every {}s, max age {}s)",
        scratch_dir.display(),
        interval.as_secs(),
        max_age.as_secs()
    );

    loop {
        tokio::select! {
            _ = token.cancelled() => {
                log::info!("Reaper received shutdown signal, stopping");
                break;
            }

            _ = ticker.tick() => {
                let dir = scratch_dir.clone();
                match tokio::task::spawn_blocking(move || sweep(&dir, max_age)).await {
                    Ok(Ok(0)) => {}
                    Ok(Ok(n)) => log::info!("Reaper removed {n} orphaned artifact(s)"),
                    Ok(Err(e)) => log::error!("Reaper sweep failed: {e:#}"),
                    Err(e) => log::error!("Reaper sweep panicked: {e}"),
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backdate(path: &Path, by: Duration) {
        let file = fs::File::options().write(true).open(path).unwrap();
        file.set_modified(SystemTime::now() - by).unwrap();
    }

    #[test]
    fn test_old_entries_removed_young_retained() {
        let tmp = tempfile::tempdir().unwrap();
        let old = tmp.path().join("old.java");
        let young = tmp.path().join("young.java");
        fs::write(&old, "x").unwrap();
        fs::write(&young, "y").unwrap();
        backdate(&old, Duration::from_secs(600));

        let removed = sweep(tmp.path(), Duration::from_secs(300)).unwrap();
        assert_eq!(removed, 1);
        assert!(!old.exists());
        assert!(young.exists());
    }

    #[test]
    fn test_old_artifact_directory_removed() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("20240101000000000-abcdef012345");
        fs::create_dir(&dir).unwrap();
        fs::write(dir.join("Main.java"), "x").unwrap();
        fs::write(dir.join("Main.class"), "y").unwrap();
        // Directory mtime is what counts, so backdate it after the last write
        let handle = fs::File::open(&dir).unwrap();
        handle.set_modified(SystemTime::now() - Duration::from_secs(600)).unwrap();

        assert_eq!(sweep(tmp.path(), Duration::from_secs(300)).unwrap(), 1);
        assert!(!dir.exists());
    }

    #[test]
    fn test_sweep_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let old = tmp.path().join("old.java");
        fs::write(&old, "x").unwrap();
        backdate(&old, Duration::from_secs(600));

        assert_eq!(sweep(tmp.path(), Duration::from_secs(300)).unwrap(), 1);
        assert_eq!(sweep(tmp.path(), Duration::from_secs(300)).unwrap(), 0);
    }

    #[test]
    fn test_missing_scratch_dir_is_not_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let gone = tmp.path().join("never-created");
        assert_eq!(sweep(&gone, Duration::from_secs(1)).unwrap(), 0);
    }

    #[tokio::test]
    async fn test_reaper_waits_one_interval_before_sweeping() {
        let tmp = tempfile::tempdir().unwrap();
        let old = tmp.path().join("old.java");
        fs::write(&old, "x").unwrap();
        backdate(&old, Duration::from_secs(600));

        let token = CancellationToken::new();
        let task = tokio::spawn(reaper(
            tmp.path().to_path_buf(),
            Duration::from_secs(3600),
            Duration::from_secs(300),
            token.clone(),
        ));

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(old.exists());

        token.cancel();
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_reaper_sweeps_periodically_and_stops_on_cancel() {
        let tmp = tempfile::tempdir().unwrap();
        let old = tmp.path().join("old.java");
        fs::write(&old, "x").unwrap();
        backdate(&old, Duration::from_secs(600));

        let token = CancellationToken::new();
        let task = tokio::spawn(reaper(
            tmp.path().to_path_buf(),
            Duration::from_millis(50),
            Duration::from_secs(300),
            token.clone(),
        ));

        for _ in 0..50 {
            if !old.exists() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(!old.exists());

        token.cancel();
        task.await.unwrap().unwrap();
    }
}
