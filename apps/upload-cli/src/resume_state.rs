//! On-disk resume state written when an upload is interrupted.

use std::path::{Path, PathBuf};

use folio_uploader::SessionSnapshot;
use serde::{Deserialize, Serialize};

/// Encoded resume token plus the chunks already confirmed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeState {
    pub token: String,
    #[serde(default)]
    pub uploaded_chunks: Vec<u32>,
}

impl ResumeState {
    pub fn from_snapshot(snapshot: &SessionSnapshot) -> Self {
        Self {
            token: snapshot.resume_token.encode(),
            uploaded_chunks: snapshot.uploaded_chunks.clone(),
        }
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        tracing::debug!(path = %path.display(), "resume state saved");
        Ok(())
    }
}

/// `<FILE>.folio-resume.json` next to the uploaded file.
pub fn state_path(file: &Path) -> PathBuf {
    let mut name = file.as_os_str().to_owned();
    name.push(".folio-resume.json");
    PathBuf::from(name)
}
