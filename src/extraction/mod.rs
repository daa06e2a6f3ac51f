pub mod pipeline;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tauri::{AppHandle, Emitter, Manager};

use crate::engine::FfmpegEngine;
use crate::state::{AppState, ResultAudio};

/// The one user-facing failure message; causes go to the log only.
pub const GENERIC_ERROR: &str = "An error occurred during audio extraction. Please try again.";

/// Download name for the produced MP3.
pub const DOWNLOAD_FILE_NAME: &str = "extracted_audio.mp3";

/// Global flag: one extraction at a time, a second trigger is rejected.
static EXTRACTION_IN_PROGRESS: AtomicBool = AtomicBool::new(false);

/// RAII guard for EXTRACTION_IN_PROGRESS. Ensures the flag clears even if
/// the flow panics or returns early.
struct ExtractionGuard;

impl ExtractionGuard {
    fn acquire() -> Result<Self, String> {
        if EXTRACTION_IN_PROGRESS
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err("Extraction already in progress".to_string());
        }
        Ok(ExtractionGuard)
    }
}

impl Drop for ExtractionGuard {
    fn drop(&mut self) {
        EXTRACTION_IN_PROGRESS.store(false, Ordering::SeqCst);
    }
}

pub fn is_extraction_in_progress() -> bool {
    EXTRACTION_IN_PROGRESS.load(Ordering::SeqCst)
}

/// Progress update emitted while ffmpeg runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionProgress {
    pub percent: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionComplete {
    pub file_name: String,
    pub size_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionFailed {
    pub message: String,
}

/// Map the engine's fractional completion to an integer percentage.
pub fn percent_from_fraction(fraction: f64) -> u8 {
    if fraction.is_nan() {
        return 0;
    }
    (fraction.clamp(0.0, 1.0) * 100.0).round() as u8
}

/// Run one extraction attempt end to end: read the picked file, feed it
/// through the engine's scratch namespace, store the MP3 in app state, and
/// tell the page how it went. The guard is held for the whole attempt.
///
/// Silently does nothing when no file is selected or the engine is not
/// ready; those are not errors.
pub async fn start_extraction(app: AppHandle) -> Result<(), String> {
    let _guard = ExtractionGuard::acquire()?;

    let source = {
        let state = app.state::<Mutex<AppState>>();
        let mut s = state.lock().unwrap_or_else(|e| e.into_inner());
        let path = match &s.selected {
            Some(video) if s.engine.is_ready() => video.path.clone(),
            _ => return Ok(()),
        };
        s.begin_extraction();
        path
    };

    log::info!("Extracting audio from {:?}", source);

    let app_for_task = app.clone();
    let outcome = tokio::task::spawn_blocking(move || {
        let video = std::fs::read(&source)?;
        let engine = app_for_task.state::<Mutex<FfmpegEngine>>();
        let eng = engine.lock().unwrap_or_else(|e| e.into_inner());
        pipeline::extract_mp3(&*eng, &video)
    })
    .await;

    match outcome {
        Ok(Ok(bytes)) => {
            log::info!("Extraction succeeded: {} bytes of MP3", bytes.len());
            let size_bytes = bytes.len();
            {
                let state = app.state::<Mutex<AppState>>();
                let mut s = state.lock().unwrap_or_else(|e| e.into_inner());
                s.finish_success(ResultAudio {
                    bytes,
                    file_name: DOWNLOAD_FILE_NAME.to_string(),
                });
            }
            let _ = app.emit(
                "extraction-complete",
                ExtractionComplete {
                    file_name: DOWNLOAD_FILE_NAME.to_string(),
                    size_bytes,
                },
            );
        }
        Ok(Err(e)) => {
            log::error!("Audio extraction failed: {}", e);
            record_failure(&app);
        }
        Err(e) => {
            log::error!("Extraction task failed: {}", e);
            record_failure(&app);
        }
    }

    Ok(())
}

fn record_failure(app: &AppHandle) {
    {
        let state = app.state::<Mutex<AppState>>();
        let mut s = state.lock().unwrap_or_else(|e| e.into_inner());
        s.finish_failure(GENERIC_ERROR.to_string());
    }
    let _ = app.emit(
        "extraction-error",
        ExtractionFailed {
            message: GENERIC_ERROR.to_string(),
        },
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn fractions_round_to_integer_percent() {
        assert_eq!(percent_from_fraction(0.0), 0);
        assert_eq!(percent_from_fraction(0.004), 0);
        assert_eq!(percent_from_fraction(0.005), 1);
        assert_eq!(percent_from_fraction(0.374), 37);
        assert_eq!(percent_from_fraction(0.996), 100);
        assert_eq!(percent_from_fraction(1.0), 100);
    }

    #[test]
    fn out_of_range_fractions_stay_in_range() {
        assert_eq!(percent_from_fraction(-0.3), 0);
        assert_eq!(percent_from_fraction(1.7), 100);
        assert_eq!(percent_from_fraction(f64::NAN), 0);
        assert_eq!(percent_from_fraction(f64::INFINITY), 100);
    }

    #[test]
    #[serial]
    fn second_trigger_is_rejected_while_busy() {
        let guard = ExtractionGuard::acquire().unwrap();
        assert!(is_extraction_in_progress());
        assert!(ExtractionGuard::acquire().is_err());
        drop(guard);
        assert!(!is_extraction_in_progress());
    }

    #[test]
    #[serial]
    fn guard_releases_on_drop() {
        {
            let _guard = ExtractionGuard::acquire().unwrap();
            assert!(is_extraction_in_progress());
        }
        assert!(!is_extraction_in_progress());
        let _guard = ExtractionGuard::acquire().unwrap();
    }

    #[test]
    fn failure_message_is_the_published_one() {
        assert_eq!(
            GENERIC_ERROR,
            "An error occurred during audio extraction. Please try again."
        );
    }
}
