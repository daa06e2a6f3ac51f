use std::collections::VecDeque;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::process::{Command, Stdio};

use tempfile::TempDir;

use super::locate;
use super::{EngineError, MediaEngine};
use crate::config::AppConfig;

pub type ProgressHandler = Box<dyn Fn(f64) + Send + Sync>;

/// Trailing stderr lines kept for diagnostics when a command fails.
const STDERR_TAIL_LINES: usize = 30;

/// Drives a local ffmpeg binary through the same boundary the page consumes:
/// named scratch files in, a command, named scratch files out. The scratch
/// directory is removed when the engine is dropped or reloaded.
pub struct FfmpegEngine {
    binary: Option<PathBuf>,
    scratch: Option<TempDir>,
    progress: Option<ProgressHandler>,
}

impl FfmpegEngine {
    pub fn new() -> Self {
        Self {
            binary: None,
            scratch: None,
            progress: None,
        }
    }

    /// Register the handler that receives fractional completion in [0,1].
    /// Registered once at startup; fires from the worker thread during exec.
    pub fn set_progress_handler(&mut self, handler: ProgressHandler) {
        self.progress = Some(handler);
    }

    /// Resolve and verify the ffmpeg binary and create the scratch directory
    /// backing the name-to-bytes namespace. Cheap enough to retry on failure.
    pub fn load(&mut self, config: &AppConfig) -> Result<(), EngineError> {
        let binary = locate::resolve_binary(config)?;
        let version = locate::verify_binary(&binary)?;
        let scratch = tempfile::Builder::new()
            .prefix("session-")
            .tempdir_in(&config.work_dir)?;
        log::info!("FFmpeg engine ready: {} ({})", binary.display(), version);
        self.binary = Some(binary);
        self.scratch = Some(scratch);
        Ok(())
    }

    pub fn is_loaded(&self) -> bool {
        self.binary.is_some() && self.scratch.is_some()
    }

    fn scratch_path(&self, name: &str) -> Result<PathBuf, EngineError> {
        let scratch = self.scratch.as_ref().ok_or(EngineError::NotLoaded)?;
        if name.is_empty()
            || name == "."
            || name == ".."
            || name.contains('/')
            || name.contains('\\')
        {
            return Err(EngineError::InvalidName(name.to_string()));
        }
        Ok(scratch.path().join(name))
    }

    fn emit_progress(&self, fraction: f64) {
        if let Some(handler) = &self.progress {
            handler(fraction.clamp(0.0, 1.0));
        }
    }

    /// Probe the input's duration so command progress can be reported as a
    /// fraction. `ffmpeg -i` with no output file exits non-zero but still
    /// prints the Duration line to stderr.
    fn probe_duration_us(&self, input_name: &str) -> Option<u64> {
        let binary = self.binary.as_ref()?;
        let scratch = self.scratch.as_ref()?;

        let mut command = Command::new(binary);
        command
            .args(["-hide_banner", "-i", input_name])
            .current_dir(scratch.path())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        // Hide console window on Windows
        #[cfg(target_os = "windows")]
        {
            use std::os::windows::process::CommandExt;
            const CREATE_NO_WINDOW: u32 = 0x08000000;
            command.creation_flags(CREATE_NO_WINDOW);
        }

        let output = command.output().ok()?;
        parse_duration_us(&String::from_utf8_lossy(&output.stderr))
    }
}

impl MediaEngine for FfmpegEngine {
    fn write_file(&self, name: &str, data: &[u8]) -> Result<(), EngineError> {
        let path = self.scratch_path(name)?;
        std::fs::write(&path, data)?;
        Ok(())
    }

    fn exec(&self, args: &[String]) -> Result<(), EngineError> {
        let binary = self.binary.as_ref().ok_or(EngineError::NotLoaded)?;
        let scratch = self.scratch.as_ref().ok_or(EngineError::NotLoaded)?;

        let duration_us = input_name(args).and_then(|name| self.probe_duration_us(name));

        let mut command = Command::new(binary);
        command
            .args(["-hide_banner", "-nostdin", "-y", "-nostats", "-progress", "pipe:1"])
            .args(args)
            .current_dir(scratch.path())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        // Hide console window on Windows
        #[cfg(target_os = "windows")]
        {
            use std::os::windows::process::CommandExt;
            const CREATE_NO_WINDOW: u32 = 0x08000000;
            command.creation_flags(CREATE_NO_WINDOW);
        }

        log::debug!("FFmpeg command: {:?}", command);

        let mut child = command.spawn()?;

        // Drain stderr on a side thread so a chatty encode cannot fill the
        // pipe and stall the child.
        let stderr = child.stderr.take();
        let stderr_thread = std::thread::spawn(move || {
            let mut tail: VecDeque<String> = VecDeque::with_capacity(STDERR_TAIL_LINES);
            if let Some(stream) = stderr {
                for line in BufReader::new(stream).lines().map_while(Result::ok) {
                    if tail.len() == STDERR_TAIL_LINES {
                        tail.pop_front();
                    }
                    tail.push_back(line);
                }
            }
            tail.into_iter().collect::<Vec<_>>().join("\n")
        });

        if let Some(stdout) = child.stdout.take() {
            for line in BufReader::new(stdout).lines().map_while(Result::ok) {
                if line.trim() == "progress=end" {
                    self.emit_progress(1.0);
                } else if let (Some(total), Some(elapsed)) =
                    (duration_us, parse_out_time_us(&line))
                {
                    if total > 0 {
                        self.emit_progress(elapsed as f64 / total as f64);
                    }
                }
            }
        }

        let status = child.wait()?;
        let stderr_tail = stderr_thread.join().unwrap_or_default();

        if !status.success() {
            log::error!("FFmpeg failed ({}): {}", status, stderr_tail);
            return Err(EngineError::CommandFailed {
                status: status.to_string(),
                detail: last_nonempty_line(&stderr_tail),
            });
        }

        log::debug!("FFmpeg stderr: {}", stderr_tail);
        Ok(())
    }

    fn read_file(&self, name: &str) -> Result<Vec<u8>, EngineError> {
        let path = self.scratch_path(name)?;
        match std::fs::read(&path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(EngineError::MissingFile(name.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Parse the `out_time_us=` key from `-progress` output. Older ffmpeg builds
/// only emit `out_time_ms=`, which is also microseconds despite the name.
fn parse_out_time_us(line: &str) -> Option<u64> {
    let value = line
        .strip_prefix("out_time_us=")
        .or_else(|| line.strip_prefix("out_time_ms="))?;
    value.trim().parse().ok()
}

/// Parse `Duration: HH:MM:SS.cc` from ffmpeg's stderr banner.
fn parse_duration_us(stderr: &str) -> Option<u64> {
    let line = stderr
        .lines()
        .find(|l| l.trim_start().starts_with("Duration:"))?;
    let field = line
        .trim_start()
        .strip_prefix("Duration:")?
        .trim_start()
        .split(',')
        .next()?
        .trim()
        .to_string();
    if field == "N/A" {
        return None;
    }
    let mut parts = field.split(':');
    let hours: u64 = parts.next()?.parse().ok()?;
    let minutes: u64 = parts.next()?.parse().ok()?;
    let seconds: f64 = parts.next()?.parse().ok()?;
    Some(hours * 3_600_000_000 + minutes * 60_000_000 + (seconds * 1_000_000.0) as u64)
}

fn input_name(args: &[String]) -> Option<&str> {
    let pos = args.iter().position(|a| a == "-i")?;
    args.get(pos + 1).map(String::as_str)
}

fn last_nonempty_line(text: &str) -> String {
    text.lines()
        .rev()
        .find(|l| !l.trim().is_empty())
        .unwrap_or("no output")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine_with_scratch() -> (FfmpegEngine, tempfile::TempDir) {
        let root = tempfile::tempdir().unwrap();
        let scratch = tempfile::Builder::new()
            .prefix("session-")
            .tempdir_in(root.path())
            .unwrap();
        let engine = FfmpegEngine {
            binary: Some(PathBuf::from("ffmpeg")),
            scratch: Some(scratch),
            progress: None,
        };
        (engine, root)
    }

    #[test]
    fn write_then_read_round_trip() {
        let (engine, _root) = engine_with_scratch();
        engine.write_file("input.mp4", b"fake video bytes").unwrap();
        let bytes = engine.read_file("input.mp4").unwrap();
        assert_eq!(bytes, b"fake video bytes");
    }

    #[test]
    fn scratch_names_are_flat() {
        let (engine, _root) = engine_with_scratch();
        for bad in ["", ".", "..", "a/b", "a\\b", "../escape"] {
            let result = engine.write_file(bad, b"x");
            assert!(
                matches!(result, Err(EngineError::InvalidName(_))),
                "{:?} should be rejected",
                bad
            );
        }
        assert!(engine.write_file("output.mp3", b"x").is_ok());
    }

    #[test]
    fn reading_a_missing_file_is_reported_by_name() {
        let (engine, _root) = engine_with_scratch();
        let result = engine.read_file("output.mp3");
        assert!(matches!(result, Err(EngineError::MissingFile(name)) if name == "output.mp3"));
    }

    #[test]
    fn unloaded_engine_refuses_file_operations() {
        let engine = FfmpegEngine::new();
        assert!(!engine.is_loaded());
        assert!(matches!(
            engine.write_file("input.mp4", b"x"),
            Err(EngineError::NotLoaded)
        ));
        assert!(matches!(
            engine.exec(&["-i".to_string()]),
            Err(EngineError::NotLoaded)
        ));
    }

    #[test]
    fn parses_out_time_keys() {
        assert_eq!(parse_out_time_us("out_time_us=5000000"), Some(5_000_000));
        assert_eq!(parse_out_time_us("out_time_ms=1500000"), Some(1_500_000));
        assert_eq!(parse_out_time_us("out_time=00:00:05.000000"), None);
        assert_eq!(parse_out_time_us("frame=120"), None);
        assert_eq!(parse_out_time_us("out_time_us=garbage"), None);
    }

    #[test]
    fn parses_duration_from_stderr_banner() {
        let stderr = concat!(
            "Input #0, mov,mp4,m4a,3gp,3g2,mj2, from 'input.mp4':\n",
            "  Duration: 00:01:30.50, start: 0.000000, bitrate: 1205 kb/s\n",
            "    Stream #0:0: Video: h264"
        );
        assert_eq!(parse_duration_us(stderr), Some(90_500_000));
    }

    #[test]
    fn unknown_duration_parses_to_nothing() {
        assert_eq!(parse_duration_us("  Duration: N/A, bitrate: N/A"), None);
        assert_eq!(parse_duration_us("no duration here"), None);
    }

    #[test]
    fn finds_the_input_argument() {
        let args: Vec<String> = ["-i", "input.mp4", "-vn", "output.mp3"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(input_name(&args), Some("input.mp4"));
        assert_eq!(input_name(&["-vn".to_string()]), None);
    }

    #[test]
    fn progress_handler_receives_clamped_fractions() {
        use std::sync::{Arc, Mutex};

        let (mut engine, _root) = engine_with_scratch();
        let seen: Arc<Mutex<Vec<f64>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        engine.set_progress_handler(Box::new(move |fraction| {
            sink.lock().unwrap().push(fraction);
        }));

        engine.emit_progress(-0.5);
        engine.emit_progress(0.374);
        engine.emit_progress(2.0);

        let seen = seen.lock().unwrap();
        assert_eq!(*seen, vec![0.0, 0.374, 1.0]);
    }

    // Requires a real ffmpeg on PATH. Run with: cargo test -- --ignored
    #[test]
    #[ignore]
    fn extracts_mp3_with_real_ffmpeg() {
        use crate::config::AppConfig;
        use crate::extraction::pipeline;

        let root = tempfile::tempdir().unwrap();
        let config = AppConfig::from_root(root.path().to_path_buf());
        config.ensure_dirs().unwrap();

        let mut engine = FfmpegEngine::new();
        if engine.load(&config).is_err() {
            eprintln!("ffmpeg not available, skipping");
            return;
        }

        let mp3 = pipeline::extract_mp3(&engine, &sine_wave_wav()).unwrap();
        assert!(!mp3.is_empty());
        let mpeg_frame = mp3.len() >= 2 && mp3[0] == 0xFF && (mp3[1] & 0xE0) == 0xE0;
        let id3_tag = mp3.starts_with(b"ID3");
        assert!(mpeg_frame || id3_tag, "output does not look like MP3");
    }

    /// One second of 440 Hz mono, 16 kHz, 16-bit. FFmpeg probes content, so
    /// handing it over under the fixed mp4 name still decodes.
    fn sine_wave_wav() -> Vec<u8> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 16000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = std::io::Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for t in 0..16000 {
                let sample =
                    (t as f32 * 440.0 * 2.0 * std::f32::consts::PI / 16000.0).sin();
                writer
                    .write_sample((sample * i16::MAX as f32 * 0.5) as i16)
                    .unwrap();
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }
}
