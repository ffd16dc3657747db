//! Minimal text-to-speech shell: one text input, one trigger.
//!
//! ```text
//! cargo run --example speak --features kokoro,playback -- models/kokoro-en-v0_19 "Hello there"
//! KOKORO_WAV=out.wav cargo run --example speak --features kokoro,playback -- models/kokoro-en-v0_19 "Hello"
//! ```

use std::path::Path;
use std::time::Instant;

use kokoro_speak::assets::{verify, DirAssetStore};
use kokoro_speak::audio::{AudioOutput, CpalOutput, WavOutput};
use kokoro_speak::engines::kokoro::KokoroSynthesizer;
use kokoro_speak::{ErrorCategory, SynthesisConfig, TtsEngine, TtsError};

fn run<O: AudioOutput>(config: &SynthesisConfig, output: O, text: &str) -> Result<(), TtsError> {
    let engine = TtsEngine::new(KokoroSynthesizer::new(), output);

    let load_start = Instant::now();
    engine.initialize(config)?;
    println!("TTS engine ready ({:.2?})", load_start.elapsed());

    let synth_start = Instant::now();
    let spoken = engine.speak(text)?;
    let synth_dur = synth_start.elapsed();
    println!(
        "Spoke {:.2}s of audio in {:.2?} ({} bytes)",
        spoken.result.duration_secs(),
        synth_dur,
        spoken.bytes_written
    );

    engine.close();
    Ok(())
}

fn main() {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let asset_root = args.next().unwrap_or_else(|| "kokoro-en-v0_19".to_string());
    let text = args.collect::<Vec<_>>().join(" ");
    if text.trim().is_empty() {
        eprintln!("Please type some text");
        std::process::exit(2);
    }

    let config = match SynthesisConfig::from_asset_root(&asset_root) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to init TTS: {e}");
            std::process::exit(1);
        }
    };

    let report = verify(&DirAssetStore::new("."), config.required_assets());
    for (path, found) in report.entries() {
        println!("{path}: {}", if *found { "found" } else { "not found" });
    }

    let result = report
        .require(config.essential_assets())
        .and_then(|()| match std::env::var_os("KOKORO_WAV") {
            Some(path) => run(&config, WavOutput::new(Path::new(&path)), &text),
            None => run(&config, CpalOutput::new(), &text),
        });

    if let Err(e) = result {
        match e.category() {
            ErrorCategory::Setup => eprintln!("TTS engine not ready: {e}"),
            ErrorCategory::Request => eprintln!("Could not speak: {e}"),
            ErrorCategory::Busy => eprintln!("TTS busy, try again: {e}"),
        }
        std::process::exit(1);
    }
}
