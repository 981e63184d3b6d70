mod common;

use std::fs;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;

use common::{Contract, FakeLoader, FakeSync, Fixture, LUISA_CONFIG, RATE};
use tts_serve::{AudioChunk, Gender, TtsError};

fn synthesis_message(result: Result<(String, std::path::PathBuf), TtsError>) -> String {
    match result {
        Err(TtsError::Synthesis(msg)) => msg,
        other => panic!("expected a synthesis error, got {other:?}"),
    }
}

#[test]
fn unknown_voice_is_rejected_without_output() {
    let fixture = Fixture::new();
    let loader = FakeLoader::new(Contract::Value);
    let loads = Arc::clone(&loader.loads);
    let engine = fixture.engine(loader, FakeSync::ok());

    let result = engine.synthesize("hola", "nobody", 1.0);
    assert!(matches!(result, Err(TtsError::VoiceNotFound(ref id)) if id == "nobody"));
    assert_eq!(loads.load(Ordering::SeqCst), 0);
    assert!(fixture.output_files().is_empty());
}

#[test]
fn blank_text_is_rejected() {
    let fixture = Fixture::new();
    let engine = fixture.engine(FakeLoader::new(Contract::Value), FakeSync::ok());

    let msg = synthesis_message(engine.synthesize("  \n ", "luisa", 1.0));
    assert!(msg.contains("empty"));
    assert!(fixture.output_files().is_empty());
}

#[test]
fn plain_text_takes_the_single_render_path() {
    for contract in [Contract::File, Contract::Value] {
        let fixture = Fixture::new();
        let engine = fixture.engine(FakeLoader::new(contract), FakeSync::ok());

        let (filename, path) = engine.synthesize("  hello  ", "luisa", 1.0).unwrap();
        assert!(filename.starts_with("tts_") && filename.ends_with(".wav"));
        assert_eq!(path, fixture.outputs().join(&filename));

        let audio = AudioChunk::read_wav(&path).unwrap();
        assert_eq!(audio.sample_rate, RATE);
        assert_eq!(audio.frames(), 50);
        assert_eq!(fixture.output_files(), vec![path]);
    }
}

#[test]
fn pauses_are_rendered_as_silence_between_segments() {
    let fixture = Fixture::new();
    let engine = fixture.engine(FakeLoader::new(Contract::File), FakeSync::ok());

    let (_, path) = engine.synthesize("ab <p=300> cde", "luisa", 1.0).unwrap();
    let audio = AudioChunk::read_wav(&path).unwrap();

    assert_eq!(audio.sample_rate, RATE);
    assert_eq!(audio.samples.len(), 20 + 300 + 30);
    assert!(audio.samples[20..320].iter().all(|&s| s == 0.0));
    assert!(audio.samples[..20].iter().all(|&s| s != 0.0));
    assert_eq!(fixture.output_files(), vec![path]);
}

#[test]
fn mismatched_sample_rates_leave_no_files_behind() {
    let fixture = Fixture::new();
    let loader = FakeLoader::new(Contract::Value).with_rate("odd", 2 * RATE);
    let engine = fixture.engine(loader, FakeSync::ok());

    let msg = synthesis_message(engine.synthesize("even <p=10> odd", "luisa", 1.0));
    assert!(msg.contains("inconsistent sample rates"));
    assert!(fixture.output_files().is_empty());
}

#[test]
fn models_are_cached_per_voice() {
    let fixture = Fixture::new();
    let loader = FakeLoader::new(Contract::Value);
    let loads = Arc::clone(&loader.loads);
    let engine = fixture.engine(loader, FakeSync::ok());

    assert!(!engine.is_loaded("luisa"));
    engine.synthesize("uno", "luisa", 1.0).unwrap();
    engine.synthesize("dos", "luisa", 2.0).unwrap();
    assert!(engine.is_loaded("luisa"));
    assert_eq!(loads.load(Ordering::SeqCst), 1);

    engine.synthesize("tres", "carlos", 1.0).unwrap();
    assert_eq!(loads.load(Ordering::SeqCst), 2);
}

#[test]
fn failed_load_resyncs_and_retries_once() {
    let fixture = Fixture::new();
    let loader = FakeLoader::new(Contract::Value).failing(1);
    let loads = Arc::clone(&loader.loads);
    let sync = FakeSync::ok();
    let calls = Arc::clone(&sync.calls);
    let engine = fixture.engine(loader, sync);

    engine.synthesize("hola", "luisa", 1.0).unwrap();
    assert_eq!(loads.load(Ordering::SeqCst), 2);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(engine.is_loaded("luisa"));
}

#[test]
fn resync_failure_is_reported() {
    let fixture = Fixture::new();
    let loader = FakeLoader::new(Contract::Value).failing(usize::MAX);
    let sync = FakeSync::failing("remote unreachable");
    let calls = Arc::clone(&sync.calls);
    let engine = fixture.engine(loader, sync);

    let msg = synthesis_message(engine.synthesize("hola", "luisa", 1.0));
    assert!(msg.contains("remote unreachable"));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(fixture.output_files().is_empty());
}

#[test]
fn failure_after_resync_does_not_resync_again() {
    let fixture = Fixture::new();
    let loader = FakeLoader::new(Contract::Value).failing(usize::MAX);
    let loads = Arc::clone(&loader.loads);
    let sync = FakeSync::ok();
    let calls = Arc::clone(&sync.calls);
    let engine = fixture.engine(loader, sync);

    let msg = synthesis_message(engine.synthesize("hola", "luisa", 1.0));
    assert!(msg.contains("damaged"));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(loads.load(Ordering::SeqCst), 2);

    // The in-flight marker is reset, so a later request may resync again.
    synthesis_message(engine.synthesize("hola", "luisa", 1.0));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn missing_model_file_is_named() {
    let fixture = Fixture::new();
    let sync = FakeSync::ok();
    let calls = Arc::clone(&sync.calls);
    let engine = fixture.engine(FakeLoader::new(Contract::Value), sync);
    fs::remove_file(fixture.models().join("luisa/es_MX-luisa.onnx")).unwrap();

    let msg = synthesis_message(engine.synthesize("hola", "luisa", 1.0));
    assert!(msg.contains("es_MX-luisa.onnx"));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn invalid_config_update_leaves_file_unchanged() {
    let fixture = Fixture::new();
    let engine = fixture.engine(FakeLoader::new(Contract::Value), FakeSync::ok());

    let result = engine.update_config("luisa", "{\"audio\": ");
    assert!(matches!(result, Err(TtsError::Config(_))));
    let config = engine.get_config("luisa").unwrap();
    assert_eq!(config.current, LUISA_CONFIG);
}

#[test]
fn update_then_restore_round_trips_the_pristine_config() {
    let fixture = Fixture::new();
    let engine = fixture.engine(FakeLoader::new(Contract::Value), FakeSync::ok());
    engine.synthesize("hola", "luisa", 1.0).unwrap();
    assert!(engine.is_loaded("luisa"));

    let written = engine
        .update_config("luisa", r#"{"audio":{"sample_rate":1000},"inference":{"noise_scale":0.5}}"#)
        .unwrap();
    assert!(written.ends_with("}\n"));
    assert!(!engine.is_loaded("luisa"));

    let config = engine.get_config("luisa").unwrap();
    assert_eq!(config.current, written);
    assert_eq!(config.original.as_deref(), Some(LUISA_CONFIG));
    assert!(config.path.ends_with("luisa/es_MX-luisa.onnx.json"));

    engine.synthesize("hola", "luisa", 1.0).unwrap();
    let restored = engine.restore_config("luisa").unwrap();
    assert_eq!(restored, LUISA_CONFIG);
    assert!(!engine.is_loaded("luisa"));
    assert_eq!(
        fs::read(fixture.models().join("luisa/es_MX-luisa.onnx.json")).unwrap(),
        LUISA_CONFIG.as_bytes()
    );
}

#[test]
fn config_operations_require_a_known_voice() {
    let fixture = Fixture::new();
    let engine = fixture.engine(FakeLoader::new(Contract::Value), FakeSync::ok());

    assert!(matches!(engine.get_config("x"), Err(TtsError::VoiceNotFound(_))));
    assert!(matches!(engine.update_config("x", "{}"), Err(TtsError::VoiceNotFound(_))));
    assert!(matches!(engine.restore_config("x"), Err(TtsError::VoiceNotFound(_))));
}

#[test]
fn catalog_lists_voices_by_gender_and_missing_entries() {
    let fixture = Fixture::new();
    let engine = fixture.engine(FakeLoader::new(Contract::Value), FakeSync::ok());

    assert_eq!(engine.catalog().len(), 2);
    let grouped = engine.catalog_by_gender();
    assert_eq!(grouped.female.len(), 1);
    assert_eq!(grouped.female[0].name, "Luisa");
    assert_eq!(grouped.female[0].gender, Gender::Female);
    assert_eq!(grouped.male.len(), 1);
    assert_eq!(grouped.male[0].id, "carlos");
    assert!(grouped.other.is_empty());

    let missing = engine.missing_voices();
    assert_eq!(missing.len(), 1);
    assert_eq!(missing[0].id, "pedro");
    assert_eq!(missing[0].issues.len(), 2);
}

#[test]
fn refresh_picks_up_new_voices() {
    let fixture = Fixture::new();
    let engine = fixture.engine(FakeLoader::new(Contract::Value), FakeSync::ok());
    engine.synthesize("hola", "luisa", 1.0).unwrap();

    let models = fixture.models();
    common::write(&models.join("pedro/es_MX-pedro.onnx"), "onnx");
    common::write(&models.join("pedro/es_MX-pedro.onnx.json"), "{}");
    engine.refresh_catalog();

    assert_eq!(engine.catalog().len(), 3);
    assert!(!engine.is_loaded("luisa"));
    assert!(engine.missing_voices().is_empty());
}

#[test]
fn concurrent_requests_share_one_model() {
    let fixture = Fixture::new();
    let loader = FakeLoader::new(Contract::File);
    let loads = Arc::clone(&loader.loads);
    let engine = Arc::new(fixture.engine(loader, FakeSync::ok()));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                let text = format!("request {i} <p=50> done");
                engine.synthesize(&text, "luisa", 1.0).unwrap()
            })
        })
        .collect();
    let mut names: Vec<String> = handles.into_iter().map(|h| h.join().unwrap().0).collect();
    names.sort();
    names.dedup();

    assert_eq!(names.len(), 8);
    assert_eq!(loads.load(Ordering::SeqCst), 1);
    assert_eq!(fixture.output_files().len(), 8);
}

#[cfg(unix)]
#[test]
fn outputs_are_readable_by_others() {
    use std::os::unix::fs::PermissionsExt;

    let fixture = Fixture::new();
    let engine = fixture.engine(FakeLoader::new(Contract::Value), FakeSync::ok());

    for text in ["hello", "hello <p=20> again"] {
        let (_, path) = engine.synthesize(text, "luisa", 1.0).unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o644);
    }
}
