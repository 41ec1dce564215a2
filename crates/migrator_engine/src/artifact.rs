use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use migrator_core::CampaignId;

use crate::filename::artifact_filename;
use crate::persist::{AtomicFileWriter, PersistError};

/// A converted campaign as stored on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedArtifact {
    pub title: String,
    pub body: String,
}

/// `# {title}` heading, blank line, body, trailing newline.
pub fn build_artifact_document(title: &str, body: &str) -> String {
    format!("# {title}\n\n{}\n", body.trim())
}

/// Inverse of [`build_artifact_document`]. A file without the heading is all body.
pub fn parse_artifact_document(document: &str) -> SavedArtifact {
    if let Some(rest) = document.strip_prefix("# ") {
        let (title, body) = rest.split_once('\n').unwrap_or((rest, ""));
        return SavedArtifact {
            title: title.trim().to_string(),
            body: body.trim().to_string(),
        };
    }
    SavedArtifact {
        title: String::new(),
        body: document.trim().to_string(),
    }
}

/// One Markdown file per campaign, named by campaign id. Saving again overwrites.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    writer: AtomicFileWriter,
}

impl ArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            writer: AtomicFileWriter::new(dir.into()),
        }
    }

    pub fn dir(&self) -> &Path {
        self.writer.dir()
    }

    pub fn path_for(&self, id: &CampaignId) -> PathBuf {
        self.dir().join(artifact_filename(id))
    }

    pub fn save(&self, id: &CampaignId, title: &str, body: &str) -> Result<PathBuf, PersistError> {
        self.writer
            .write(&artifact_filename(id), &build_artifact_document(title, body))
    }

    pub fn load(&self, id: &CampaignId) -> Result<Option<SavedArtifact>, PersistError> {
        match fs::read_to_string(self.path_for(id)) {
            Ok(document) => Ok(Some(parse_artifact_document(&document))),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(PersistError::Io(err)),
        }
    }
}
