//! Audio
//!
//! No audio backend is bundled; `LogAudio` records what would have played.

use anyhow::Result;
use tracing::debug;

use super::Audio;

#[derive(Debug, Default, Clone, Copy)]
pub struct LogAudio;

impl Audio for LogAudio {
    fn play_tone(&self, freq_hz: u32, duration_ms: u64) -> Result<()> {
        debug!(freq_hz, duration_ms, "beep");
        Ok(())
    }

    fn play_clip(&self, url: &str) -> Result<()> {
        debug!(url, "play audio clip");
        Ok(())
    }
}
