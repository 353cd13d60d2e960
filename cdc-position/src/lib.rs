//! The Position Store (spec §4.2): durably persists and reloads the
//! replication cursor so a restarted pipeline resumes without re-reading
//! the whole binlog and without skipping an event the Sink already saw.

use cdc_model::{Error, Position, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Loads and saves a [`Position`] as a single text file containing
/// `"<log_file_name>:<decimal_offset>"` (spec §6 "Position file format").
/// A bare file name with no `:` is accepted on read as the legacy form,
/// defaulting the offset to `start_offset` from the caller's config.
pub struct PositionStore {
    path: PathBuf,
}

impl PositionStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        PositionStore { path: path.into() }
    }

    /// Load the persisted Position, or `None` if the file doesn't exist or
    /// is empty (spec §8 scenario: "Empty position file on startup ->
    /// start from configured start offset"). `default_offset` supplies the
    /// offset for the legacy bare-filename form.
    pub fn load(&self, default_offset: u64) -> Result<Option<Position>> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(Error::Position(format!(
                    "cannot read position file {:?}: {e}",
                    self.path
                )))
            }
        };
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }
        Self::parse(trimmed, default_offset).map(Some)
    }

    /// Any parse failure -- no `:` at all, or a `:`-suffix that isn't a
    /// valid offset -- falls back to treating the whole content as a bare
    /// legacy file name, rather than erroring (spec §4.2: a torn or
    /// corrupted write must not block startup).
    fn parse(text: &str, default_offset: u64) -> Result<Position> {
        if let Some((file_name, offset_text)) = text.rsplit_once(':') {
            if let Ok(byte_offset) = offset_text.trim().parse::<u64>() {
                return Ok(Position::new(file_name.trim().to_string(), byte_offset));
            }
        }
        Ok(Position::new(text.to_string(), default_offset))
    }

    /// Persist a Position, surviving a crash mid-write: the new content is
    /// written to a sibling temp file and then renamed over the real path,
    /// which on POSIX filesystems is atomic, so a reader never observes a
    /// torn write (spec §4.1 durability invariant).
    pub fn save(&self, position: &Position) -> Result<()> {
        let tmp_path = self.tmp_path();
        let mut file = fs::File::create(&tmp_path).map_err(|e| {
            Error::Position(format!("cannot create {:?}: {e}", tmp_path))
        })?;
        write!(file, "{}", position)
            .map_err(|e| Error::Position(format!("cannot write {:?}: {e}", tmp_path)))?;
        file.sync_all()
            .map_err(|e| Error::Position(format!("cannot flush {:?}: {e}", tmp_path)))?;
        fs::rename(&tmp_path, &self.path).map_err(|e| {
            Error::Position(format!(
                "cannot rename {:?} to {:?}: {e}",
                tmp_path, self.path
            ))
        })?;
        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.join(name),
            _ => PathBuf::from(name),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
