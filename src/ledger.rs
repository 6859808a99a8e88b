use crate::model::Post;
use anyhow::Context;
use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;

pub const DEFAULT_LEDGER_PATH: &str = "log/wbIds.txt";

/// Append-only record of post ids that have already been seen, one per line.
///
/// The in-memory set is checked before seeding so a session never writes the
/// same id twice through [`Ledger::seed`]. [`Ledger::record`] always appends, so
/// the file itself may still end up with duplicate lines.
#[derive(Debug)]
pub struct Ledger {
    path: PathBuf,
    seen: HashSet<String>,
}

impl Ledger {
    /// Opens the ledger at `path`, creating its directory if needed.
    pub async fn open(path: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Unable to create ledger directory {}", parent.display()))?;
        }
        let seen = Self::load(&path).await?;
        Ok(Self { path, seen })
    }

    /// Reads every id in the ledger file. A missing file is an empty ledger.
    pub async fn load(path: &Path) -> anyhow::Result<HashSet<String>> {
        let contents = match fs::read_to_string(path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(HashSet::new()),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Unable to read ledger {}", path.display()))
            }
        };
        Ok(contents
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect())
    }

    /// Records every post not already known. Returns how many were added.
    pub async fn seed(&mut self, posts: &[Post]) -> anyhow::Result<usize> {
        let fresh: Vec<&str> = {
            let mut batch = HashSet::new();
            posts
                .iter()
                .map(|p| p.id.as_str())
                .filter(|id| !self.seen.contains(*id) && batch.insert(*id))
                .collect()
        };
        if fresh.is_empty() {
            return Ok(0);
        }
        let mut lines = String::new();
        for id in &fresh {
            lines.push_str(id);
            lines.push('\n');
        }
        // Known for this session even if the write below fails
        self.seen.extend(fresh.iter().map(|id| id.to_string()));
        self.append(&lines).await?;
        Ok(fresh.len())
    }

    /// Appends `id` to the file. Returns whether it was new to this session.
    ///
    /// The id is known in memory from here on, even when the append fails.
    pub async fn record(&mut self, id: &str) -> anyhow::Result<bool> {
        let inserted = self.seen.insert(id.to_string());
        self.append(&format!("{}\n", id)).await?;
        Ok(inserted)
    }

    async fn append(&self, lines: &str) -> anyhow::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .with_context(|| format!("Unable to open ledger {}", self.path.display()))?;
        file.write_all(lines.as_bytes())
            .await
            .context("Unable to append to ledger")?;
        file.flush().await.context("Unable to flush ledger")?;
        Ok(())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.seen.contains(id)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
