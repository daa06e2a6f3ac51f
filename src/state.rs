use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExtractionStatus {
    NoFile,
    FileSelected,
    Extracting,
    Succeeded,
    Failed,
}

impl Default for ExtractionStatus {
    fn default() -> Self {
        ExtractionStatus::NoFile
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EngineStatus {
    Loading,
    Ready,
    Failed(String),
}

impl Default for EngineStatus {
    fn default() -> Self {
        EngineStatus::Loading
    }
}

impl EngineStatus {
    pub fn is_ready(&self) -> bool {
        *self == EngineStatus::Ready
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectedVideo {
    pub name: String,
    pub path: PathBuf,
    pub size_bytes: u64,
}

/// MP3 bytes from the last successful extraction. Dropped when a new result
/// or a new file pick replaces it; the frontend revokes its object URL then.
#[derive(Debug, Clone)]
pub struct ResultAudio {
    pub bytes: Vec<u8>,
    pub file_name: String,
}

pub struct AppState {
    pub status: ExtractionStatus,
    pub engine: EngineStatus,
    pub selected: Option<SelectedVideo>,
    pub progress: u8,
    pub result: Option<ResultAudio>,
    pub last_error: Option<String>,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            status: ExtractionStatus::NoFile,
            engine: EngineStatus::Loading,
            selected: None,
            progress: 0,
            result: None,
            last_error: None,
        }
    }
}

impl AppState {
    /// A new pick discards the previous outcome, whatever it was.
    pub fn select_video(&mut self, video: SelectedVideo) {
        self.selected = Some(video);
        self.result = None;
        self.last_error = None;
        self.progress = 0;
        self.status = ExtractionStatus::FileSelected;
    }

    pub fn can_extract(&self) -> bool {
        self.selected.is_some() && self.engine.is_ready()
    }

    pub fn begin_extraction(&mut self) {
        self.status = ExtractionStatus::Extracting;
        self.progress = 0;
        self.last_error = None;
    }

    pub fn finish_success(&mut self, audio: ResultAudio) {
        self.result = Some(audio);
        self.status = ExtractionStatus::Succeeded;
    }

    /// A failed attempt records the message but keeps a prior successful result.
    pub fn finish_failure(&mut self, message: String) {
        self.last_error = Some(message);
        self.status = ExtractionStatus::Failed;
    }
}
