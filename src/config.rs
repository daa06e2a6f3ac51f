use directories::ProjectDirs;
use std::path::PathBuf;

pub struct AppConfig {
    pub data_dir: PathBuf,
    pub work_dir: PathBuf,
    pub bin_dir: PathBuf,
}

impl AppConfig {
    pub fn new() -> Self {
        let proj_dirs = ProjectDirs::from("com", "audio-extractor", "AudioExtractor")
            .expect("Failed to determine project directories");
        Self::from_root(proj_dirs.data_dir().to_path_buf())
    }

    pub fn from_root(data_dir: PathBuf) -> Self {
        let work_dir = data_dir.join("work");
        let bin_dir = data_dir.join("bin");
        Self {
            data_dir,
            work_dir,
            bin_dir,
        }
    }

    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.work_dir)?;
        std::fs::create_dir_all(&self.bin_dir)?;
        Ok(())
    }

    /// Where a bundled ffmpeg copy is looked for before falling back to PATH.
    pub fn engine_binary_path(&self) -> PathBuf {
        self.bin_dir.join(crate::engine::locate::BINARY_NAME)
    }

    /// Remove scratch directories left behind by sessions that were killed
    /// before their cleanup ran.
    pub fn sweep_stale_scratch(&self) {
        let entries = match std::fs::read_dir(&self.work_dir) {
            Ok(entries) => entries,
            Err(_) => return,
        };
        for entry in entries.flatten() {
            if entry.file_name().to_string_lossy().starts_with("session-") {
                if let Err(e) = std::fs::remove_dir_all(entry.path()) {
                    log::warn!("Failed to remove stale scratch dir {:?}: {}", entry.path(), e);
                }
            }
        }
    }
}
