use std::env;
use std::time::Instant;

use tts_serve::engines::piper::{PiperLoader, PiperRuntime};
use tts_serve::{DisabledSync, EngineConfig, TtsEngine};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let mut args = env::args().skip(1);
    let (Some(models_dir), Some(voice_id), Some(text)) = (args.next(), args.next(), args.next())
    else {
        eprintln!("usage: synthesize <models_dir> <voice_id> <text> [speed]");
        std::process::exit(2);
    };
    let speed: f32 = match args.next() {
        Some(s) => s.parse()?,
        None => 1.0,
    };

    let config = EngineConfig::new(models_dir, "outputs");
    let engine = TtsEngine::new(config, PiperLoader::new(PiperRuntime::default()), DisabledSync)?;

    let voices = engine.catalog_by_gender();
    for (label, group) in [
        ("female", &voices.female),
        ("male", &voices.male),
        ("other", &voices.other),
    ] {
        for voice in group {
            println!(
                "[{label}] {} - {} ({}, {})",
                voice.id, voice.name, voice.accent, voice.quality
            );
        }
    }
    for missing in engine.missing_voices() {
        println!("missing {}: {}", missing.id, missing.issues.join("; "));
    }

    let start = Instant::now();
    let (filename, path) = engine.synthesize(&text, &voice_id, speed)?;
    println!("Saved {filename} to {} in {:.2?}", path.display(), start.elapsed());
    Ok(())
}
