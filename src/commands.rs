use std::path::PathBuf;
use std::sync::Mutex;

use tauri::{AppHandle, State};
use tauri_plugin_dialog::DialogExt;

use crate::config::AppConfig;
use crate::extraction;
use crate::settings::Settings;
use crate::state::{AppState, EngineStatus, ExtractionStatus, SelectedVideo};

/// Extensions offered by the pick dialog. Advisory only; nothing validates
/// the picked file beyond what ffmpeg itself accepts.
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "mkv", "webm", "avi", "m4v", "mpg", "mpeg"];

#[derive(serde::Serialize, serde::Deserialize)]
pub struct ResultInfo {
    pub file_name: String,
    pub size_bytes: usize,
}

#[derive(serde::Serialize, serde::Deserialize)]
pub struct StatusPayload {
    pub status: ExtractionStatus,
    pub engine: EngineStatus,
    pub progress: u8,
    pub selected: Option<SelectedVideo>,
    pub result: Option<ResultInfo>,
    pub error: Option<String>,
}

/// Open the file picker. A pick replaces the current selection and discards
/// any previous result and error; cancelling changes nothing.
#[tauri::command]
pub async fn pick_video(
    app: AppHandle,
    state: State<'_, Mutex<AppState>>,
) -> Result<Option<SelectedVideo>, String> {
    let app_clone = app.clone();
    let file_path = tokio::task::spawn_blocking(move || {
        app_clone
            .dialog()
            .file()
            .add_filter("Video Files", VIDEO_EXTENSIONS)
            .blocking_pick_file()
    })
    .await
    .map_err(|e| format!("File dialog task failed: {}", e))?;

    let Some(picked) = file_path else {
        log::info!("User cancelled file selection");
        return Ok(None);
    };

    let path = PathBuf::from(picked.to_string());
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string_lossy().to_string());
    let size_bytes = std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0);

    let video = SelectedVideo {
        name,
        path,
        size_bytes,
    };
    log::info!("User selected: {} ({} bytes)", video.name, video.size_bytes);

    {
        let mut s = state.lock().map_err(|e| e.to_string())?;
        s.select_video(video.clone());
    }

    Ok(Some(video))
}

/// Start one extraction in the background. Returns false, touching nothing,
/// when no file is selected or the engine is not ready yet.
#[tauri::command]
pub async fn extract_audio(
    app: AppHandle,
    state: State<'_, Mutex<AppState>>,
) -> Result<bool, String> {
    {
        let s = state.lock().map_err(|e| e.to_string())?;
        if !s.can_extract() {
            return Ok(false);
        }
    }

    // The guard inside start_extraction is authoritative; this check just
    // rejects the obvious case before spawning.
    if extraction::is_extraction_in_progress() {
        return Err("Extraction already in progress".to_string());
    }

    tauri::async_runtime::spawn(async move {
        if let Err(e) = extraction::start_extraction(app).await {
            log::error!("Extraction did not start: {}", e);
        }
    });

    Ok(true)
}

/// Raw MP3 bytes of the last result, for the page to wrap in an object URL.
#[tauri::command]
pub fn read_result_audio(
    state: State<'_, Mutex<AppState>>,
) -> Result<tauri::ipc::Response, String> {
    let s = state.lock().map_err(|e| e.to_string())?;
    let audio = s.result.as_ref().ok_or("No extracted audio available")?;
    Ok(tauri::ipc::Response::new(audio.bytes.clone()))
}

/// Save the extracted MP3 via a save dialog. Returns the chosen path, or
/// None if the user cancelled.
#[tauri::command]
pub async fn save_audio(
    app: AppHandle,
    state: State<'_, Mutex<AppState>>,
    settings: State<'_, Mutex<Settings>>,
    config: State<'_, AppConfig>,
) -> Result<Option<String>, String> {
    let (bytes, file_name) = {
        let s = state.lock().map_err(|e| e.to_string())?;
        let audio = s.result.as_ref().ok_or("No extracted audio available")?;
        (audio.bytes.clone(), audio.file_name.clone())
    };

    let start_dir = {
        let s = settings.lock().map_err(|e| e.to_string())?;
        s.output_dir.clone()
    };

    let app_clone = app.clone();
    let target = tokio::task::spawn_blocking(move || {
        let mut dialog = app_clone.dialog().file().set_file_name(file_name.as_str());
        if let Some(dir) = start_dir {
            dialog = dialog.set_directory(dir);
        }
        dialog.blocking_save_file()
    })
    .await
    .map_err(|e| format!("Save dialog task failed: {}", e))?;

    let Some(picked) = target else {
        return Ok(None);
    };
    let path = PathBuf::from(picked.to_string());

    std::fs::write(&path, &bytes).map_err(|e| format!("Failed to save audio: {}", e))?;
    log::info!("Saved extracted audio to {:?}", path);

    if let Some(parent) = path.parent() {
        let mut s = settings.lock().map_err(|e| e.to_string())?;
        s.output_dir = Some(parent.to_path_buf());
        if let Err(e) = s.save(&config.data_dir) {
            log::warn!("Failed to persist settings: {}", e);
        }
    }

    Ok(Some(path.to_string_lossy().to_string()))
}

/// Snapshot of everything the page renders; used on startup and as a
/// refresh fallback behind the events.
#[tauri::command]
pub fn get_status(state: State<'_, Mutex<AppState>>) -> Result<StatusPayload, String> {
    let s = state.lock().map_err(|e| e.to_string())?;
    Ok(StatusPayload {
        status: s.status.clone(),
        engine: s.engine.clone(),
        progress: s.progress,
        selected: s.selected.clone(),
        result: s.result.as_ref().map(|audio| ResultInfo {
            file_name: audio.file_name.clone(),
            size_bytes: audio.bytes.len(),
        }),
        error: s.last_error.clone(),
    })
}

/// Re-run engine initialization after a failure.
#[tauri::command]
pub async fn reload_engine(
    app: AppHandle,
    state: State<'_, Mutex<AppState>>,
) -> Result<(), String> {
    if extraction::is_extraction_in_progress() {
        return Err("Extraction already in progress".to_string());
    }
    {
        let mut s = state.lock().map_err(|e| e.to_string())?;
        s.engine = EngineStatus::Loading;
    }
    crate::load_engine(app);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picker_filter_covers_common_video_containers() {
        assert!(VIDEO_EXTENSIONS.contains(&"mp4"));
        assert!(VIDEO_EXTENSIONS.contains(&"mkv"));
        assert!(VIDEO_EXTENSIONS.contains(&"webm"));
        assert!(!VIDEO_EXTENSIONS.contains(&"mp3"));
        assert!(!VIDEO_EXTENSIONS.contains(&"txt"));
    }
}
