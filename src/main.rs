use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use lingua_scenes::config::Config;
use lingua_scenes::script::{Language, ScriptRepository};
use lingua_scenes::session::{OptionOutcome, Rejection, Role, SessionPhase, SessionStore};
use lingua_scenes::speech::{OpenAiSynthesizer, ProcessPlayer, SpeakCallbacks, SpeechCache};
use lingua_scenes::storage::{FileKv, KvProgressStore, ProgressStore};

const HELP: &str = "\
Commands:
  tutors            list tutors and saved progress
  select <id>       start (or resume) a tutor's dialogue
  pick <n>          choose option n of the current scene
  say <n>           speak transcript message n
  stop              stop playback
  stats <id>        show saved progress for a tutor
  reset             erase the active tutor's progress and leave the session
  clear-all         erase saved progress for every tutor
  clear-cache       drop cached audio
  quit";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Setup Logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("setting default subscriber failed")?;

    let config = Config::from_env()?;

    // 2. Script + Persistence
    let script = match &config.script_path {
        Some(path) => ScriptRepository::load(path)?,
        None => ScriptRepository::demo()?,
    };
    let backend = FileKv::in_dir(&config.data_dir)
        .with_context(|| format!("failed to open data dir {}", config.data_dir.display()))?;
    let progress = Arc::new(KvProgressStore::new(backend));
    let mut store = SessionStore::new(Arc::new(script), progress.clone(), config.session.clone());

    // 3. Speech (optional without an API key)
    let speech = match &config.speech.api_key {
        Some(key) => {
            let synth = OpenAiSynthesizer::new(
                key.clone(),
                config.speech.base_url.clone(),
                config.speech.model.clone(),
                config.speech.timeout,
            );
            let player = ProcessPlayer::from_command_line(&config.speech.player).unwrap_or_default();
            Some(SpeechCache::new(Arc::new(synth), Arc::new(player)))
        }
        None => {
            tracing::warn!("OPENAI_API_KEY not set, speech disabled");
            None
        }
    };

    tracing::info!("Lingua session ready ({} tutors)", store.script().len());
    println!("{}", HELP);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut shown = 0usize;
    let mut cadence = tokio::time::interval(Duration::from_millis(100));
    cadence.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let mut parts = line.split_whitespace();
                let Some(command) = parts.next() else { continue };
                let arg = parts.next();

                match (command, arg) {
                    ("quit" | "exit", _) => break,
                    ("help", _) => println!("{}", HELP),
                    ("tutors", _) => list_tutors(&store, progress.as_ref()),
                    ("select", Some(id)) => {
                        if store.select_tutor(id) {
                            shown = 0;
                            render(&store, &mut shown);
                        } else {
                            println!("No tutor named '{}'", id);
                        }
                    }
                    ("pick", Some(n)) => match n.parse::<usize>() {
                        Ok(n) if n > 0 => {
                            let outcome = store.select_option_at(n - 1);
                            render_messages(&store, &mut shown);
                            report(outcome, &store);
                        }
                        _ => println!("Usage: pick <n>"),
                    },
                    ("say", Some(n)) => match (n.parse::<usize>(), &speech) {
                        (_, None) => println!("Speech is disabled"),
                        (Ok(n), Some(speech)) if n > 0 => say(&store, speech, n - 1),
                        _ => println!("Usage: say <n>"),
                    },
                    ("stop", _) => {
                        if let Some(speech) = &speech {
                            speech.stop();
                        }
                    }
                    ("stats", Some(id)) => {
                        let stats = progress.get_stats(&id.into());
                        println!(
                            "{}: happiness {}, scene {}, {} messages",
                            id, stats.happiness, stats.current_scene, stats.messages
                        );
                    }
                    ("reset", _) => {
                        store.reset();
                        shown = 0;
                        println!("Session reset");
                    }
                    ("clear-all", _) => {
                        progress.clear_all();
                        println!("All progress erased");
                    }
                    ("clear-cache", _) => {
                        if let Some(speech) = &speech {
                            speech.clear_cache();
                        }
                    }
                    _ => println!("Unknown command. Type 'help'."),
                }
            }
            _ = cadence.tick() => {
                if !store.poll_events().is_empty() {
                    render(&store, &mut shown);
                }
            }
        }
    }

    if let Some(speech) = &speech {
        speech.stop();
    }
    Ok(())
}

fn language(store: &SessionStore) -> Language {
    store.tutor().map(|t| t.language).unwrap_or(Language::Chinese)
}

fn list_tutors(store: &SessionStore, progress: &dyn ProgressStore) {
    for lang in Language::ALL {
        for (id, tutor) in store.script().tutors_for(lang) {
            let stats = progress.get_stats(id);
            let native = tutor.native_name.as_deref().map(|n| format!(" ({})", n)).unwrap_or_default();
            println!(
                "  {:<8} {}{} [{}] happiness {} scene {}",
                id,
                tutor.name,
                native,
                lang.as_str(),
                stats.happiness,
                stats.current_scene
            );
        }
    }
}

fn render(store: &SessionStore, shown: &mut usize) {
    render_messages(store, shown);

    match store.phase() {
        SessionPhase::InProgress => {
            if let Some(scene) = store.scene() {
                if let Some(initial) = &scene.initial {
                    // Later scenes open with a narrated line that is not part of the transcript.
                    if store.messages().last().map(|m| &m.content) != Some(initial) {
                        let lang = language(store);
                        println!("  ~ {}", initial.primary_text(lang));
                    }
                }
            }
            let lang = language(store);
            for (i, option) in store.options().iter().enumerate() {
                let hint = option.content.pronunciation(lang).map(|p| format!("  ({})", p)).unwrap_or_default();
                println!("  [{}] {}{}", i + 1, option.content.primary_text(lang), hint);
            }
        }
        SessionPhase::Complete => {
            println!("Great job! You've completed this conversation. Type 'tutors' to pick another tutor.");
        }
        SessionPhase::Transitioning | SessionPhase::Idle => {}
    }
}

fn render_messages(store: &SessionStore, shown: &mut usize) {
    let lang = language(store);
    for (i, message) in store.messages().iter().enumerate().skip(*shown) {
        let who = match message.role {
            Role::User => "you",
            Role::Assistant => "tutor",
        };
        println!("{:>3}. {:<5} {}", i + 1, who, message.content.primary_text(lang));
        if let Some(p) = message.content.pronunciation(lang) {
            println!("           {}", p);
        }
        if message.role == Role::Assistant {
            if let Some(t) = message.content.translation(lang) {
                println!("           {}", t);
            }
        }
        if let Some(c) = &message.content.context {
            println!("           ({})", c);
        }
    }
    *shown = store.messages().len();
}

fn report(outcome: OptionOutcome, store: &SessionStore) {
    match outcome {
        OptionOutcome::Advancing { .. } => {
            if let Some(tutor) = store.selected_tutor() {
                println!("  happiness: {}", store.happiness(tutor.as_str()));
            }
        }
        OptionOutcome::Completed => {
            println!("Great job! You've completed this conversation. Type 'tutors' to pick another tutor.");
        }
        OptionOutcome::Rejected(Rejection::NoTutor) => println!("Select a tutor first"),
        OptionOutcome::Rejected(Rejection::Transitioning) => println!("Hold on, the next scene is loading"),
        OptionOutcome::Rejected(Rejection::Complete) => println!("This conversation is over"),
        OptionOutcome::Rejected(Rejection::UnknownOption) => println!("No such option"),
    }
}

fn say(store: &SessionStore, speech: &SpeechCache, index: usize) {
    let Some(message) = store.messages().get(index) else {
        println!("No message {}", index + 1);
        return;
    };
    let lang = language(store);
    let text = message.content.primary_text(lang).to_string();
    speech.speak(
        text,
        lang,
        SpeakCallbacks::new()
            .on_start(|| println!("  [playing]"))
            .on_end(|| println!("  [done]"))
            .on_error(|e| println!("  [speech failed: {}]", e)),
    );
}
