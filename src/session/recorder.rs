use anyhow::{anyhow, Result};

use crate::error::SessionError;

/// Container tried first.
pub const PREFERRED_MIME: &str = "video/webm;codecs=vp9";
/// Container used when the preferred one is rejected.
pub const FALLBACK_MIME: &str = "video/webm";

/// Bytes produced by one recording.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordedClip {
    pub mime_type: String,
    /// Total bytes captured, whether or not they were retained.
    pub size: u64,
    pub data: Vec<u8>,
}

/// Media recorder.
pub trait ClipRecorder: Send {
    fn start(&mut self, mime_type: &str) -> Result<()>;

    /// Media data delivered while recording. Ignored while paused or idle.
    fn push_chunk(&mut self, chunk: &[u8]);

    fn pause(&mut self);

    fn resume(&mut self);

    /// Finish and hand back the data. `None` when nothing was being recorded.
    fn stop(&mut self) -> Option<RecordedClip>;

    fn is_recording(&self) -> bool;
}

/// Start `recorder` with the preferred container, falling back to plain webm.
///
/// Returns the MIME type in use.
pub fn start_with_fallback(recorder: &mut dyn ClipRecorder) -> Result<&'static str, SessionError> {
    match recorder.start(PREFERRED_MIME) {
        Ok(()) => Ok(PREFERRED_MIME),
        Err(e) => {
            log::warn!("{} rejected ({:#}); falling back to {}", PREFERRED_MIME, e, FALLBACK_MIME);
            recorder
                .start(FALLBACK_MIME)
                .map(|()| FALLBACK_MIME)
                .map_err(|e| SessionError::RecorderUnavailable(format!("{:#}", e)))
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum RecorderState {
    Inactive,
    Recording,
    Paused,
}

/// Recorder that collects chunks in memory.
#[derive(Debug)]
pub struct MemoryRecorder {
    supported: Vec<String>,
    retain: bool,
    state: RecorderState,
    mime_type: String,
    size: u64,
    chunks: Vec<Vec<u8>>,
}

impl MemoryRecorder {
    /// Accepts both webm variants and keeps every chunk.
    pub fn new() -> Self {
        Self::with_supported(&[PREFERRED_MIME, FALLBACK_MIME])
    }

    pub fn with_supported(mime_types: &[&str]) -> Self {
        Self {
            supported: mime_types.iter().map(|m| m.to_string()).collect(),
            retain: true,
            state: RecorderState::Inactive,
            mime_type: String::new(),
            size: 0,
            chunks: Vec::new(),
        }
    }

    /// Count bytes without keeping them.
    pub fn discarding(mut self) -> Self {
        self.retain = false;
        self
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }
}

impl Default for MemoryRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl ClipRecorder for MemoryRecorder {
    fn start(&mut self, mime_type: &str) -> Result<()> {
        if self.state != RecorderState::Inactive {
            return Err(anyhow!("recorder already started"));
        }
        if !self.supported.iter().any(|m| m == mime_type) {
            return Err(anyhow!("unsupported mime type {}", mime_type));
        }
        self.mime_type = mime_type.to_string();
        self.size = 0;
        self.chunks.clear();
        self.state = RecorderState::Recording;
        Ok(())
    }

    fn push_chunk(&mut self, chunk: &[u8]) {
        if self.state != RecorderState::Recording || chunk.is_empty() {
            return;
        }
        self.size += chunk.len() as u64;
        if self.retain {
            self.chunks.push(chunk.to_vec());
        }
    }

    fn pause(&mut self) {
        if self.state == RecorderState::Recording {
            self.state = RecorderState::Paused;
        }
    }

    fn resume(&mut self) {
        if self.state == RecorderState::Paused {
            self.state = RecorderState::Recording;
        }
    }

    fn stop(&mut self) -> Option<RecordedClip> {
        if self.state == RecorderState::Inactive {
            return None;
        }
        self.state = RecorderState::Inactive;
        Some(RecordedClip {
            mime_type: std::mem::take(&mut self.mime_type),
            size: std::mem::take(&mut self.size),
            data: std::mem::take(&mut self.chunks).concat(),
        })
    }

    fn is_recording(&self) -> bool {
        self.state == RecorderState::Recording
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_vp9() {
        let mut recorder = MemoryRecorder::new();
        assert_eq!(start_with_fallback(&mut recorder).unwrap(), PREFERRED_MIME);
    }

    #[test]
    fn falls_back_to_plain_webm() {
        let mut recorder = MemoryRecorder::with_supported(&[FALLBACK_MIME]);
        assert_eq!(start_with_fallback(&mut recorder).unwrap(), FALLBACK_MIME);
        assert_eq!(recorder.mime_type(), FALLBACK_MIME);
    }

    #[test]
    fn no_supported_format_is_recorder_unavailable() {
        let mut recorder = MemoryRecorder::with_supported(&["video/mp4"]);
        assert!(matches!(
            start_with_fallback(&mut recorder),
            Err(SessionError::RecorderUnavailable(_))
        ));
    }

    #[test]
    fn paused_chunks_are_dropped() {
        let mut recorder = MemoryRecorder::new();
        recorder.start(FALLBACK_MIME).unwrap();
        recorder.push_chunk(&[1, 2, 3]);
        recorder.pause();
        recorder.push_chunk(&[4, 5]);
        recorder.resume();
        recorder.push_chunk(&[6]);
        let clip = recorder.stop().unwrap();
        assert_eq!(clip.size, 4);
        assert_eq!(clip.data, vec![1, 2, 3, 6]);
        assert!(recorder.stop().is_none());
    }

    #[test]
    fn discarding_recorder_only_counts() {
        let mut recorder = MemoryRecorder::new().discarding();
        recorder.start(PREFERRED_MIME).unwrap();
        recorder.push_chunk(&[0; 10]);
        let clip = recorder.stop().unwrap();
        assert_eq!(clip.size, 10);
        assert!(clip.data.is_empty());
    }
}
