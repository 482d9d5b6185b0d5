use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::activity::Activity;
use crate::event::Event;
use crate::state::AgendaState;

#[derive(Debug)]
pub struct DataStore {
    pub data_dir: PathBuf,
    pub events_path: PathBuf,
    pub activities_path: PathBuf,
    pub preferences_path: PathBuf,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Preferences {
    #[serde(default)]
    pub dont_ask_again: bool,
    /// Highest event id ever issued.
    #[serde(default)]
    pub last_event_id: u64,
    #[serde(default)]
    pub last_activity_id: u64,
}

impl DataStore {
    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        let data_dir = data_dir.to_path_buf();
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create {}", data_dir.display()))?;

        let events_path = data_dir.join("events.data");
        let activities_path = data_dir.join("activities.data");
        let preferences_path = data_dir.join("preferences.data");

        for path in [&events_path, &activities_path, &preferences_path] {
            if !path.exists() {
                fs::write(path, "")
                    .with_context(|| format!("failed to create {}", path.display()))?;
            }
        }

        info!(
            data_dir = %data_dir.display(),
            events = %events_path.display(),
            activities = %activities_path.display(),
            preferences = %preferences_path.display(),
            "opened datastore"
        );

        Ok(Self {
            data_dir,
            events_path,
            activities_path,
            preferences_path,
        })
    }

    #[tracing::instrument(skip(self))]
    pub fn load_events(&self) -> anyhow::Result<Vec<Event>> {
        load_jsonl(&self.events_path).context("failed to load events.data")
    }

    #[tracing::instrument(skip(self, events))]
    pub fn save_events(&self, events: &[Event]) -> anyhow::Result<()> {
        save_jsonl_atomic(&self.events_path, events).context("failed to save events.data")
    }

    #[tracing::instrument(skip(self))]
    pub fn load_activities(&self) -> anyhow::Result<Vec<Activity>> {
        load_jsonl(&self.activities_path).context("failed to load activities.data")
    }

    #[tracing::instrument(skip(self, activities))]
    pub fn save_activities(&self, activities: &[Activity]) -> anyhow::Result<()> {
        save_jsonl_atomic(&self.activities_path, activities)
            .context("failed to save activities.data")
    }

    #[tracing::instrument(skip(self))]
    pub fn load_preferences(&self) -> anyhow::Result<Preferences> {
        let raw = fs::read_to_string(&self.preferences_path)
            .with_context(|| format!("failed reading {}", self.preferences_path.display()))?;
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Ok(Preferences::default());
        }
        serde_json::from_str(trimmed)
            .with_context(|| format!("failed parsing {}", self.preferences_path.display()))
    }

    #[tracing::instrument(skip(self))]
    pub fn save_preferences(&self, preferences: &Preferences) -> anyhow::Result<()> {
        let serialized = serde_json::to_string(preferences)?;
        write_atomic(&self.preferences_path, |out| {
            writeln!(out, "{serialized}")?;
            Ok(())
        })
        .context("failed to save preferences.data")
    }

    /// Loads everything the application state is built from.
    #[tracing::instrument(skip(self))]
    pub fn load_state(&self, today: NaiveDate) -> anyhow::Result<AgendaState> {
        let events = self.load_events()?;
        let activities = self.load_activities()?;
        let preferences = self.load_preferences()?;
        Ok(
            AgendaState::new(events, activities, preferences.dont_ask_again, today)
                .with_last_ids(preferences.last_event_id, preferences.last_activity_id),
        )
    }

    #[tracing::instrument(skip(self, state))]
    pub fn save_state(&self, state: &AgendaState) -> anyhow::Result<()> {
        self.save_events(state.events())?;
        self.save_activities(state.activities())?;
        self.save_preferences(&Preferences {
            dont_ask_again: state.dont_ask_again,
            last_event_id: state.last_event_id(),
            last_activity_id: state.last_activity_id(),
        })
    }
}

#[tracing::instrument(skip(path))]
fn load_jsonl<T: DeserializeOwned>(path: &Path) -> anyhow::Result<Vec<T>> {
    debug!(file = %path.display(), "loading jsonl");
    let file = fs::File::open(path)?;
    let reader = BufReader::new(file);

    let mut out = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let item: T = serde_json::from_str(trimmed)
            .with_context(|| format!("failed parsing {} line {}", path.display(), idx + 1))?;
        out.push(item);
    }

    debug!(count = out.len(), "loaded records from jsonl");
    Ok(out)
}

#[tracing::instrument(skip(path, items))]
fn save_jsonl_atomic<T: Serialize>(path: &Path, items: &[T]) -> anyhow::Result<()> {
    debug!(file = %path.display(), count = items.len(), "saving jsonl atomically");
    write_atomic(path, |out| {
        for item in items {
            let serialized = serde_json::to_string(item)?;
            writeln!(out, "{serialized}")?;
        }
        Ok(())
    })
}

fn write_atomic<F>(path: &Path, write: F) -> anyhow::Result<()>
where
    F: FnOnce(&mut NamedTempFile) -> anyhow::Result<()>,
{
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(dir)?;
    write(&mut temp)?;
    temp.flush()?;

    temp.persist(path)
        .map_err(|err| anyhow!("failed to persist {}: {}", path.display(), err))?;

    Ok(())
}
