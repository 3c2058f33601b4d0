//! A directory of raw fetched pages.

use std::{
    fs,
    path::{Path, PathBuf},
    time::{Duration, SystemTime},
};

use anyhow::Result;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct PageCache {
    dir: PathBuf,
    /// Whether cached pages are read, pages are always written.
    use_cached: bool,
}

impl PageCache {
    pub fn new(dir: impl Into<PathBuf>, use_cached: bool) -> Self {
        Self {
            dir: dir.into(),
            use_cached,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Get a cached page if it exists and isn't older than `max_age`.
    pub fn read(&self, name: &str, max_age: Option<Duration>) -> Option<String> {
        if !self.use_cached {
            return None;
        }
        let path = self.dir.join(name);
        if let Some(max_age) = max_age {
            let age = fs::metadata(&path)
                .and_then(|metadata| metadata.modified())
                .ok()
                .and_then(|modified| SystemTime::now().duration_since(modified).ok())?;
            if age >= max_age {
                debug!(name, ?age, "cached page expired");
                return None;
            }
        }
        let text = fs::read_to_string(&path).ok()?;
        debug!(name, "using cached page");
        Some(text)
    }

    pub fn write(&self, name: &str, text: &str) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        fs::write(self.dir.join(name), text)?;
        Ok(())
    }
}
