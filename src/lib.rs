pub mod commands;
pub mod config;
pub mod engine;
pub mod extraction;
pub mod settings;
pub mod state;

use std::sync::Mutex;
use tauri::{Emitter, Manager};

use config::AppConfig;
use engine::FfmpegEngine;
use extraction::ExtractionProgress;
use settings::Settings;
use state::{AppState, EngineStatus};

#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    env_logger::init();

    tauri::Builder::default()
        .plugin(tauri_plugin_dialog::init())
        .setup(|app| {
            // Initialize configuration
            let config = AppConfig::new();
            config.ensure_dirs().expect("Failed to create app directories");
            config.sweep_stale_scratch();

            // Load settings
            let user_settings = Settings::load(&config.data_dir);

            // Engine starts unloaded; the flow spawned below resolves ffmpeg
            // while the window is already up.
            let mut engine = FfmpegEngine::new();

            // Fractional progress from the engine becomes an integer
            // percentage in state plus an event the page renders.
            let handle = app.handle().clone();
            engine.set_progress_handler(Box::new(move |fraction| {
                let percent = extraction::percent_from_fraction(fraction);
                let state = handle.state::<Mutex<AppState>>();
                if let Ok(mut s) = state.lock() {
                    s.progress = percent;
                }
                let _ = handle.emit("extraction-progress", ExtractionProgress { percent });
            }));

            // Register state
            app.manage(Mutex::new(AppState::default()));
            app.manage(Mutex::new(engine));
            app.manage(config);
            app.manage(Mutex::new(user_settings));

            load_engine(app.handle().clone());

            Ok(())
        })
        .invoke_handler(tauri::generate_handler![
            commands::pick_video,
            commands::extract_audio,
            commands::read_result_audio,
            commands::save_audio,
            commands::get_status,
            commands::reload_engine,
        ])
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}

/// Resolve and verify ffmpeg off the UI thread, then record the outcome.
/// The page stays usable while this runs; extraction is a no-op until the
/// engine reports ready.
pub fn load_engine(app: tauri::AppHandle) {
    tauri::async_runtime::spawn(async move {
        let app_for_load = app.clone();
        let outcome = tokio::task::spawn_blocking(move || {
            let config = app_for_load.state::<AppConfig>();
            let engine = app_for_load.state::<Mutex<FfmpegEngine>>();
            let mut eng = engine.lock().unwrap_or_else(|e| e.into_inner());
            eng.load(&config)
        })
        .await;

        let status = match outcome {
            Ok(Ok(())) => EngineStatus::Ready,
            Ok(Err(e)) => {
                log::error!("Engine initialization failed: {}", e);
                EngineStatus::Failed(e.to_string())
            }
            Err(e) => {
                log::error!("Engine initialization task failed: {}", e);
                EngineStatus::Failed(e.to_string())
            }
        };

        {
            let state = app.state::<Mutex<AppState>>();
            let mut s = state.lock().unwrap_or_else(|e| e.into_inner());
            s.engine = status.clone();
        }
        let _ = app.emit("engine-status", status);
    });
}
