use anyhow::{Context, Result};
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

use crate::capture::Artifact;

/// Temporary file holding an artifact for playback; deleted on drop
#[derive(Debug)]
pub struct PreviewFile {
    file: NamedTempFile,
}

impl PreviewFile {
    pub fn write(artifact: &Artifact) -> Result<Self> {
        let suffix = match artifact {
            Artifact::Audio(audio) => match audio.file_name().rsplit_once('.') {
                Some((_, ext)) => format!(".{ext}"),
                None => String::new(),
            },
            Artifact::Text(_) => ".txt".to_string(),
        };

        let mut file = tempfile::Builder::new()
            .prefix("celpip-preview-")
            .suffix(&suffix)
            .tempfile()
            .context("Failed to create preview file")?;

        match artifact {
            Artifact::Audio(audio) => file.write_all(&audio.bytes),
            Artifact::Text(text) => file.write_all(text.as_bytes()),
        }
        .context("Failed to write preview file")?;
        file.flush().context("Failed to flush preview file")?;

        Ok(Self { file })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }
}
