use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::event::Event;
use crate::timeline::Timeline;

#[derive(Debug)]
pub struct DataStore {
    pub data_dir: PathBuf,
    pub events_path: PathBuf,
    pub session_path: PathBuf,
    pub webdav_path: PathBuf,
}

impl DataStore {
    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        let data_dir = data_dir.to_path_buf();
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create {}", data_dir.display()))?;

        let events_path = data_dir.join("events.data");
        let session_path = data_dir.join("session.json");
        let webdav_path = data_dir.join("webdav.toml");

        if !events_path.exists() {
            fs::write(&events_path, "")?;
        }

        info!(
            data_dir = %data_dir.display(),
            events = %events_path.display(),
            "opened datastore"
        );

        Ok(Self {
            data_dir,
            events_path,
            session_path,
            webdav_path,
        })
    }

    #[tracing::instrument(skip(self))]
    pub fn load_timeline(&self) -> anyhow::Result<Timeline> {
        let events: Vec<Event> =
            load_jsonl(&self.events_path).context("failed to load events.data")?;
        Ok(Timeline::from_events(events))
    }

    #[tracing::instrument(skip(self, timeline), fields(count = timeline.len()))]
    pub fn save_timeline(&self, timeline: &Timeline) -> anyhow::Result<()> {
        save_jsonl_atomic(&self.events_path, timeline.events())
            .context("failed to save events.data")
    }

    #[tracing::instrument(skip(self))]
    pub fn load_json<T: DeserializeOwned>(&self, path: &Path) -> anyhow::Result<Option<T>> {
        if !path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed reading {}", path.display()))?;
        if raw.trim().is_empty() {
            return Ok(None);
        }
        let value = serde_json::from_str(&raw)
            .with_context(|| format!("failed parsing {}", path.display()))?;
        Ok(Some(value))
    }

    #[tracing::instrument(skip(self, value))]
    pub fn save_json<T: Serialize>(&self, path: &Path, value: &T) -> anyhow::Result<()> {
        let payload = serde_json::to_string_pretty(value)?;
        write_atomic(path, payload.as_bytes())
    }

    #[tracing::instrument(skip(self))]
    pub fn load_toml<T: DeserializeOwned>(&self, path: &Path) -> anyhow::Result<Option<T>> {
        if !path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed reading {}", path.display()))?;
        let value =
            toml::from_str(&raw).with_context(|| format!("failed parsing {}", path.display()))?;
        Ok(Some(value))
    }

    #[tracing::instrument(skip(self, value))]
    pub fn save_toml<T: Serialize>(&self, path: &Path, value: &T) -> anyhow::Result<()> {
        let payload = toml::to_string(value)
            .with_context(|| format!("failed serializing {}", path.display()))?;
        write_atomic(path, payload.as_bytes())
    }

    #[tracing::instrument(skip(self))]
    pub fn remove(&self, path: &Path) -> anyhow::Result<bool> {
        if !path.exists() {
            return Ok(false);
        }
        fs::remove_file(path).with_context(|| format!("failed removing {}", path.display()))?;
        Ok(true)
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

    let mut buf = Vec::new();
    for item in items {
        serde_json::to_writer(&mut buf, item)?;
        buf.push(b'\n');
    }
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, bytes: &[u8]) -> anyhow::Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(dir)?;
    temp.write_all(bytes)?;
    temp.flush()?;

    temp.persist(path)
        .map_err(|err| anyhow!("failed to persist {}: {}", path.display(), err))?;

    Ok(())
}
