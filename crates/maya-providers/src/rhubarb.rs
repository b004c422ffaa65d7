//! Mouth-shape extraction via the Rhubarb Lip Sync child process.
//!
//! Rhubarb analyzes a WAV file and writes a JSON timeline next to it; the
//! extractor invokes it per message and reads the timeline back. Phonetic
//! recognition is used, which is the fast mode.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

use maya_core::types::VisemeTrack;

use crate::ExtractVisemes;

pub struct RhubarbExtractor {
    binary: PathBuf,
    threads: u32,
}

impl RhubarbExtractor {
    pub fn new(binary: impl Into<PathBuf>, threads: u32) -> Self {
        Self {
            binary: binary.into(),
            threads,
        }
    }

    /// Timeline output path for a given WAV input.
    fn timeline_path(wav_path: &Path) -> PathBuf {
        wav_path.with_extension("json")
    }

    /// Arguments for one extraction run.
    fn command_args(&self, wav_path: &Path, timeline_path: &Path) -> Vec<String> {
        vec![
            "-q".into(),
            "--threads".into(),
            self.threads.to_string(),
            "-f".into(),
            "json".into(),
            "-o".into(),
            timeline_path.display().to_string(),
            wav_path.display().to_string(),
            "-r".into(),
            "phonetic".into(),
        ]
    }
}

#[async_trait]
impl ExtractVisemes for RhubarbExtractor {
    async fn extract(&self, wav_path: &Path) -> anyhow::Result<VisemeTrack> {
        let timeline_path = Self::timeline_path(wav_path);
        let args = self.command_args(wav_path, &timeline_path);

        debug!(wav = %wav_path.display(), "Running rhubarb");
        let output = Command::new(&self.binary).args(&args).output().await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(status = ?output.status.code(), %stderr, "rhubarb failed");
            anyhow::bail!("rhubarb exited with {:?}: {stderr}", output.status.code());
        }

        let data = tokio::fs::read_to_string(&timeline_path).await?;
        let track: VisemeTrack = serde_json::from_str(&data)
            .map_err(|e| anyhow::anyhow!("malformed rhubarb timeline: {e}"))?;
        debug!(cues = track.mouth_cues.len(), "Viseme timeline read");
        Ok(track)
    }
}
