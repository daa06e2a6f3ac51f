use crate::engine::{EngineError, MediaEngine};

/// Fixed scratch names. The source's real container format is irrelevant;
/// ffmpeg probes content, not the name it was handed under.
pub const INPUT_NAME: &str = "input.mp4";
pub const OUTPUT_NAME: &str = "output.mp3";

/// The one fixed command: strip video, encode the audio track as MP3.
pub fn transcode_args() -> Vec<String> {
    ["-i", INPUT_NAME, "-vn", "-acodec", "libmp3lame", OUTPUT_NAME]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Write the source bytes into the engine's scratch namespace, run the fixed
/// transcode, and read the MP3 back.
pub fn extract_mp3(engine: &dyn MediaEngine, video: &[u8]) -> Result<Vec<u8>, EngineError> {
    engine.write_file(INPUT_NAME, video)?;
    engine.exec(&transcode_args())?;
    let bytes = engine.read_file(OUTPUT_NAME)?;
    if bytes.is_empty() {
        return Err(EngineError::EmptyOutput(OUTPUT_NAME.to_string()));
    }
    Ok(bytes)
}
