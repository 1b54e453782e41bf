//! Retention cleanup over the dated image tree.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};

/// Remove day directories older than the retention window.
///
/// A day expires once its midnight falls before `now` minus
/// `retention_days`. Emptied month and year directories are pruned on
/// the way out. Directory names that do not form a calendar date are
/// left alone; the tree may hold unrelated files next to the dated
/// layout. Returns the number of day directories removed.
pub fn cleanup_old_days(
    output_dir: &Path,
    retention_days: u32,
    now: NaiveDateTime,
) -> io::Result<usize> {
    let cutoff = now - TimeDelta::days(i64::from(retention_days));
    let mut removed = 0usize;

    for year_dir in sorted_dirs(output_dir)? {
        // A calendar year must fit in i32; larger numeric names are
        // foreign trees, same as non-numeric ones.
        let Some(year) = component_number(&year_dir).and_then(|year| i32::try_from(year).ok())
        else {
            continue;
        };
        for month_dir in sorted_dirs(&year_dir)? {
            let Some(month) = component_number(&month_dir) else {
                continue;
            };
            for day_dir in sorted_dirs(&month_dir)? {
                let Some(day) = component_number(&day_dir) else {
                    continue;
                };
                let Some(date) = NaiveDate::from_ymd_opt(year, month, day) else {
                    continue;
                };
                if date.and_time(NaiveTime::MIN) < cutoff {
                    fs::remove_dir_all(&day_dir)?;
                    removed += 1;
                    tracing::info!(day = %date, path = %day_dir.display(), "removed expired capture day");
                }
            }
            remove_if_empty(&month_dir)?;
        }
        remove_if_empty(&year_dir)?;
    }

    Ok(removed)
}

fn sorted_dirs(path: &Path) -> io::Result<Vec<PathBuf>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let mut dirs: Vec<PathBuf> = fs::read_dir(path)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .collect();
    dirs.sort();
    Ok(dirs)
}

fn component_number(path: &Path) -> Option<u32> {
    path.file_name()?.to_str()?.parse().ok()
}

fn remove_if_empty(path: &Path) -> io::Result<()> {
    if fs::read_dir(path)?.next().is_none() {
        fs::remove_dir(path)?;
        tracing::debug!(path = %path.display(), "pruned empty directory");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::NaiveDate;

    fn noon(y: i32, mo: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d)
            .expect("valid date")
            .and_hms_opt(12, 0, 0)
            .expect("valid time")
    }

    fn seed_day(root: &Path, y: u32, mo: u32, d: u32) -> PathBuf {
        let day = root.join(format!("{y:04}/{mo:02}/{d:02}"));
        fs::create_dir_all(&day).expect("create day dir");
        fs::write(day.join("120000.jpg"), b"jpeg").expect("write image");
        day
    }

    #[test]
    fn removes_days_past_retention_and_prunes_empty_parents() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path();
        seed_day(root, 2026, 7, 1);
        seed_day(root, 2026, 7, 20);
        let kept = seed_day(root, 2026, 8, 22);

        let removed = cleanup_old_days(root, 30, noon(2026, 8, 22)).expect("cleanup");

        assert_eq!(removed, 2);
        assert!(!root.join("2026/07").exists(), "emptied month is pruned");
        assert!(kept.exists());
        assert!(root.join("2026").exists(), "year with live days survives");
    }

    #[test]
    fn day_on_the_retention_boundary_expires() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path();
        // Midnight of 07-23 is before the cutoff of 07-23 12:00.
        let boundary = seed_day(root, 2026, 7, 23);
        let fresh = seed_day(root, 2026, 7, 24);

        let removed = cleanup_old_days(root, 30, noon(2026, 8, 22)).expect("cleanup");

        assert_eq!(removed, 1);
        assert!(!boundary.exists());
        assert!(fresh.exists());
    }

    #[test]
    fn prunes_year_once_all_days_expire() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path();
        seed_day(root, 2025, 12, 31);

        let removed = cleanup_old_days(root, 30, noon(2026, 8, 22)).expect("cleanup");

        assert_eq!(removed, 1);
        assert!(!root.join("2025").exists());
        assert!(root.exists());
    }

    #[test]
    fn ignores_non_dated_entries() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path();
        let misc = root.join("exports");
        fs::create_dir_all(&misc).expect("create misc dir");
        fs::write(misc.join("notes.txt"), b"keep me").expect("write file");
        fs::write(root.join(".status.json"), b"{}").expect("write status");

        let removed = cleanup_old_days(root, 30, noon(2026, 8, 22)).expect("cleanup");

        assert_eq!(removed, 0);
        assert!(misc.join("notes.txt").exists());
        assert!(root.join(".status.json").exists());
    }

    #[test]
    fn ignores_year_numbers_beyond_calendar_range() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path();
        // Parses as u32 but is no year; must survive like any foreign tree.
        let foreign = root.join("4294967295/06/15");
        fs::create_dir_all(&foreign).expect("create foreign dir");
        fs::write(foreign.join("data.bin"), b"keep me").expect("write file");

        let removed = cleanup_old_days(root, 30, noon(2026, 8, 22)).expect("cleanup");

        assert_eq!(removed, 0);
        assert!(foreign.join("data.bin").exists());
    }

    #[test]
    fn missing_root_is_a_noop() {
        let dir = tempfile::tempdir().expect("tempdir");
        let removed =
            cleanup_old_days(&dir.path().join("absent"), 30, noon(2026, 8, 22)).expect("cleanup");
        assert_eq!(removed, 0);
    }
}
