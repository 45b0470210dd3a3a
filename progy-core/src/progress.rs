//! Learner progress tracking
//!
//! Per-exercise pass/fail plus XP and streak aggregates, persisted as JSON
//! under `.progy/`. Progress is derived from completion events and owned by
//! the learner's workspace; it is never authoritative course content and is
//! excluded from packing and progress commits.

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::Result;

/// Progress file location relative to the working directory
pub const PROGRESS_FILE: &str = ".progy/progress.json";

/// XP awarded the first time an exercise passes
pub const XP_PER_EXERCISE: u32 = 10;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressStore {
    /// Per-exercise records, keyed by exercise id
    #[serde(default)]
    pub exercises: BTreeMap<String, ExerciseProgress>,

    #[serde(default)]
    pub stats: ProgressStats,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExerciseProgress {
    pub passed: bool,
    pub xp: u32,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressStats {
    pub total_xp: u32,
    pub streak_days: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_activity: Option<DateTime<Utc>>,
}

impl ProgressStore {
    /// Load from a working directory, or start fresh if absent
    pub fn load_or_default(workdir: &Path) -> Result<Self> {
        let path = workdir.join(PROGRESS_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save(&self, workdir: &Path) -> Result<()> {
        let path = workdir.join(PROGRESS_FILE);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Record a run result. XP is awarded on the first pass only; a later
    /// failed run never takes a pass away.
    pub fn record(&mut self, exercise_id: &str, passed: bool) -> u32 {
        let now = Utc::now();
        let already_passed = self
            .exercises
            .get(exercise_id)
            .map(|e| e.passed)
            .unwrap_or(false);

        let awarded = if passed && !already_passed {
            XP_PER_EXERCISE
        } else {
            0
        };

        if passed || !already_passed {
            self.exercises.insert(
                exercise_id.to_string(),
                ExerciseProgress {
                    passed: passed || already_passed,
                    xp: if passed || already_passed {
                        XP_PER_EXERCISE
                    } else {
                        0
                    },
                    completed_at: now,
                },
            );
        }

        self.stats.total_xp += awarded;
        self.update_streak(now);
        awarded
    }

    /// Streak counts consecutive calendar days with activity
    fn update_streak(&mut self, now: DateTime<Utc>) {
        let streak = match self.stats.last_activity {
            Some(last) => {
                let last_day = last.date_naive();
                let today = now.date_naive();
                if last_day == today {
                    self.stats.streak_days.max(1)
                } else if today.num_days_from_ce() - last_day.num_days_from_ce() == 1 {
                    self.stats.streak_days + 1
                } else {
                    1
                }
            }
            None => 1,
        };
        self.stats.streak_days = streak;
        self.stats.last_activity = Some(now);
    }

    pub fn passed_count(&self) -> usize {
        self.exercises.values().filter(|e| e.passed).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn first_pass_awards_xp_once() {
        let mut store = ProgressStore::default();

        assert_eq!(store.record("01_intro/hello.py", true), XP_PER_EXERCISE);
        assert_eq!(store.record("01_intro/hello.py", true), 0);
        assert_eq!(store.stats.total_xp, XP_PER_EXERCISE);
        assert_eq!(store.passed_count(), 1);
    }

    #[test]
    fn failure_does_not_revoke_pass() {
        let mut store = ProgressStore::default();
        store.record("a", true);
        store.record("a", false);

        assert!(store.exercises["a"].passed);
        assert_eq!(store.passed_count(), 1);
    }

    #[test]
    fn failed_attempt_is_recorded() {
        let mut store = ProgressStore::default();
        store.record("a", false);

        assert!(!store.exercises["a"].passed);
        assert_eq!(store.stats.total_xp, 0);
    }

    #[test]
    fn streak_starts_at_one() {
        let mut store = ProgressStore::default();
        store.record("a", true);
        assert_eq!(store.stats.streak_days, 1);
    }

    #[test]
    fn same_day_activity_keeps_streak() {
        let mut store = ProgressStore::default();
        store.record("a", true);
        store.record("b", true);
        assert_eq!(store.stats.streak_days, 1);
    }

    #[test]
    fn save_load_round_trip() {
        let temp = TempDir::new().unwrap();
        let mut store = ProgressStore::default();
        store.record("01_intro/hello.py", true);
        store.save(temp.path()).unwrap();

        let loaded = ProgressStore::load_or_default(temp.path()).unwrap();
        assert_eq!(loaded.stats.total_xp, XP_PER_EXERCISE);
        assert!(loaded.exercises.contains_key("01_intro/hello.py"));
    }

    #[test]
    fn load_missing_is_default() {
        let temp = TempDir::new().unwrap();
        let store = ProgressStore::load_or_default(temp.path()).unwrap();
        assert!(store.exercises.is_empty());
    }
}
