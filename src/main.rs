#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

fn main() {
    audio_extractor_lib::run();
}
