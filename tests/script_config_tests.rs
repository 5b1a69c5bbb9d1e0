use lingua_scenes::config::{Config, ConfigError, TranscriptPolicy};
use lingua_scenes::script::{Language, MessageContent, ScriptError, ScriptRepository};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

fn config_from(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
    let vars: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
    Config::from_lookup(|key| vars.get(key).cloned())
}

#[test]
fn test_demo_script_loads() {
    let script = ScriptRepository::demo().expect("bundled script parses");

    assert!(script.contains("mei"));
    let mei = script.tutor("mei").unwrap();
    assert_eq!(mei.language, Language::Chinese);
    assert!(mei.native_name.is_some());
    assert_eq!(mei.scenes.len(), 6);

    let first = script.scene("mei", 1).unwrap();
    assert!(first.initial.as_ref().is_some_and(|c| c.has_text()));
    assert!(!first.options.is_empty());
    assert!(script.scene("mei", 7).is_none());
    assert!(script.scene("nobody", 1).is_none());
}

#[test]
fn test_tutors_grouped_by_language() {
    let script = ScriptRepository::demo().unwrap();

    let total: usize = Language::ALL.iter().map(|lang| script.tutors_for(*lang).len()).sum();
    assert_eq!(total, script.len());
    assert!(script
        .tutors_for(Language::Japanese)
        .iter()
        .all(|(_, tutor)| tutor.language == Language::Japanese));
}

#[test]
fn test_script_parses_inline_json() {
    let json = r#"{
        "lena": {
            "name": "Lena",
            "language": "spanish",
            "spanishName": "Lena",
            "scenes": {
                "1": {
                    "initial": { "spanish": "¡Hola!", "english": "Hi!" },
                    "options": [
                        { "id": "1a", "spanish": "Hola", "english": "Hello", "points": 5,
                          "response": { "spanish": "¿Qué tal?", "english": "How are you?" } },
                        { "id": "1b", "english": "Bye" }
                    ]
                }
            }
        }
    }"#;
    let script = ScriptRepository::from_json_str(json).unwrap();
    let scene = script.scene("lena", 1).unwrap();

    assert_eq!(scene.options.len(), 2);
    assert_eq!(scene.options[0].points, Some(5));
    assert_eq!(scene.options[0].content.primary_text(Language::Spanish), "Hola");
    assert!(scene.options[1].response.is_none());
    assert_eq!(script.tutor("lena").unwrap().native_name.as_deref(), Some("Lena"));
}

#[test]
fn test_scene_zero_is_rejected() {
    let json = r#"{ "mei": { "name": "Mei", "language": "chinese", "scenes": { "0": {} } } }"#;
    let err = ScriptRepository::from_json_str(json).unwrap_err();
    assert!(matches!(err, ScriptError::ZeroScene { .. }));

    let err = ScriptRepository::from_json_str("[]").unwrap_err();
    assert!(matches!(err, ScriptError::Parse(_)));
}

#[test]
fn test_missing_script_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = ScriptRepository::load(&dir.path().join("absent.json")).unwrap_err();
    assert!(matches!(err, ScriptError::Io { .. }));
}

#[test]
fn test_localized_text_falls_back_to_english() {
    let content = MessageContent {
        english: "Good morning".to_string(),
        japanese: Some("おはよう".to_string()),
        romaji: Some("ohayou".to_string()),
        korean: Some(String::new()),
        ..Default::default()
    };

    assert_eq!(content.primary_text(Language::Japanese), "おはよう");
    assert_eq!(content.pronunciation(Language::Japanese), Some("ohayou"));
    assert_eq!(content.translation(Language::Japanese), Some("Good morning"));

    // Empty localized strings count as missing
    assert_eq!(content.primary_text(Language::Korean), "Good morning");
    assert_eq!(content.translation(Language::Korean), None);
    assert_eq!(content.pronunciation(Language::Spanish), None);
    assert!(content.has_text());
    assert!(!MessageContent::default().has_text());
}

#[test]
fn test_language_from_str() {
    assert_eq!("Korean".parse::<Language>(), Ok(Language::Korean));
    assert_eq!(" spanish ".parse::<Language>(), Ok(Language::Spanish));
    assert!("french".parse::<Language>().is_err());
}

#[test]
fn test_config_defaults() {
    let config = config_from(&[]).unwrap();

    assert_eq!(config.session.advance_delay, Duration::from_millis(1000));
    assert_eq!(config.session.terminal_scene, 6);
    assert_eq!(config.session.transcript, TranscriptPolicy::Ephemeral);
    assert_eq!(config.data_dir, PathBuf::from(".lingua"));
    assert!(config.script_path.is_none());
    assert!(config.speech.api_key.is_none());
    assert_eq!(config.speech.model, "tts-1");
    assert_eq!(config.speech.base_url, "https://api.openai.com/v1");
}

#[test]
fn test_config_overrides() {
    let config = config_from(&[
        ("LINGUA_ADVANCE_DELAY_MS", "250"),
        ("LINGUA_TERMINAL_SCENE", "3"),
        ("LINGUA_PERSIST_TRANSCRIPT", "true"),
        ("LINGUA_SCRIPT", "/tmp/script.json"),
        ("OPENAI_API_KEY", "sk-test"),
        ("TTS_TIMEOUT_MS", "500"),
        ("LINGUA_PLAYER", "ffplay -nodisp -autoexit -"),
    ])
    .unwrap();

    assert_eq!(config.session.advance_delay, Duration::from_millis(250));
    assert_eq!(config.session.terminal_scene, 3);
    assert_eq!(config.session.transcript, TranscriptPolicy::Persisted);
    assert_eq!(config.script_path, Some(PathBuf::from("/tmp/script.json")));
    assert_eq!(config.speech.api_key.as_deref(), Some("sk-test"));
    assert_eq!(config.speech.timeout, Duration::from_millis(500));
    assert_eq!(config.speech.player, "ffplay -nodisp -autoexit -");
}

#[test]
fn test_config_rejects_bad_values() {
    assert!(matches!(
        config_from(&[("LINGUA_TERMINAL_SCENE", "0")]),
        Err(ConfigError::Invalid { var: "LINGUA_TERMINAL_SCENE", .. })
    ));
    assert!(matches!(
        config_from(&[("LINGUA_ADVANCE_DELAY_MS", "soon")]),
        Err(ConfigError::Invalid { var: "LINGUA_ADVANCE_DELAY_MS", .. })
    ));

    // An empty key means speech stays off
    assert!(config_from(&[("OPENAI_API_KEY", "")]).unwrap().speech.api_key.is_none());
}
