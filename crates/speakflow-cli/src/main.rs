use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use serde::Serialize;
use speakflow_core::annotator::{analyze_sentence, SentenceAnalysis};
use speakflow_core::handler::is_language_mismatch;
use speakflow_core::{feedback, load_config, scoring};
use speakflow_memory::{ConversationStore, SqliteConversationStore};
use speakflow_provider::azure_speech::parse_assessment;
use speakflow_schema::{AssessmentResult, Feedback, Language};
use speakflow_server::state::AppState;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser)]
#[command(name = "speakflow", version, about = "speakflow pronunciation tutor")]
struct Cli {
    #[arg(
        long,
        default_value = ".",
        help = "Project root directory (contains config/, data/ and uploads/)"
    )]
    root: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Start the HTTP API server")]
    Serve {
        #[arg(long, help = "Override the port of server.bind")]
        port: Option<u16>,
    },
    #[command(about = "Validate config/main.yaml")]
    Validate,
    #[command(about = "Score a saved speech-provider detailed result offline")]
    Analyze {
        #[arg(help = "Path to the detailed result JSON")]
        file: PathBuf,
        #[arg(long, default_value = "zh-CN", help = "Language tag of the utterance")]
        language: String,
    },
    #[command(about = "Print the message log of a session")]
    History {
        #[arg(help = "Session id")]
        session_id: String,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AnalysisReport {
    assessment: AssessmentResult,
    feedback: Feedback,
    analysis: SentenceAnalysis,
    total_duration: f64,
    language_mismatch: bool,
}

fn analyze(json: &str, language: &Language) -> Result<AnalysisReport> {
    let assessment = scoring::apply(&parse_assessment(json)?);
    Ok(AnalysisReport {
        feedback: feedback::compose(&assessment, language),
        analysis: analyze_sentence(&assessment.words, language),
        total_duration: scoring::total_duration_secs(&assessment.words),
        language_mismatch: is_language_mismatch(&assessment.words),
        assessment,
    })
}

/// Replaces the port of a `host:port` bind address.
fn bind_with_port(bind: &str, port: u16) -> String {
    match bind.rsplit_once(':') {
        Some((host, _)) => format!("{host}:{port}"),
        None => format!("{bind}:{port}"),
    }
}

fn expand_home(root: PathBuf) -> PathBuf {
    if !root.starts_with("~") {
        return root;
    }
    match std::env::var_os("HOME") {
        Some(home) => PathBuf::from(home).join(root.strip_prefix("~").unwrap_or(&root)),
        None => root,
    }
}

fn open_store(root: &Path, database_path: &str) -> Result<SqliteConversationStore> {
    let path = root.join(database_path);
    let path = path
        .to_str()
        .ok_or_else(|| anyhow!("database path is not valid utf-8: {}", path.display()))?;
    SqliteConversationStore::open(path)
}

#[tokio::main]
async fn main() -> Result<()> {
    let mut cli = Cli::parse();
    cli.root = expand_home(cli.root);

    let log_dir = cli.root.join("logs");
    std::fs::create_dir_all(&log_dir)?;
    let file_appender = tracing_appender::rolling::daily(&log_dir, "speakflow.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(non_blocking),
        )
        .init();

    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        println!();
        return Ok(());
    };

    match command {
        Commands::Validate => {
            let config = load_config(&cli.root)?;
            println!(
                "Config valid. bind {}, llm {:?} ({}), speech {}, tts {}, translation {}.",
                config.server.bind,
                config.llm.provider,
                config.llm.model,
                enabled(config.speech_assessor().is_some()),
                enabled(config.synthesizer().is_some()),
                enabled(config.translator().is_some()),
            );
        }
        Commands::Serve { port } => {
            let config = load_config(&cli.root)?;
            let bind = match port {
                Some(port) => bind_with_port(&config.server.bind, port),
                None => config.server.bind.clone(),
            };
            let state = AppState::from_config(&cli.root, &config)?;
            speakflow_server::serve(state, &bind).await?;
        }
        Commands::Analyze { file, language } => {
            let json = std::fs::read_to_string(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let report = analyze(&json, &Language::from(language))?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::History { session_id } => {
            let config = load_config(&cli.root)?;
            let store = open_store(&cli.root, &config.database.path)?;
            match store.find_by_session_id(&session_id).await? {
                Some(conversation) => {
                    println!("{}", serde_json::to_string_pretty(&conversation)?)
                }
                None => println!("No conversation for session {session_id}."),
            }
        }
    }

    Ok(())
}

fn enabled(on: bool) -> &'static str {
    if on {
        "enabled"
    } else {
        "disabled"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    const DETAILED_RESULT: &str = r#"{
        "RecognitionStatus": "Success",
        "DisplayText": "你好",
        "NBest": [{
            "Display": "你好",
            "PronunciationAssessment": {
                "AccuracyScore": 70, "FluencyScore": 88, "CompletenessScore": 100, "PronScore": 72
            },
            "Words": [
                {
                    "Word": "你", "Offset": 1000000, "Duration": 4000000,
                    "PronunciationAssessment": { "AccuracyScore": 60, "ErrorType": "Mispronunciation" },
                    "Phonemes": [
                        { "Phoneme": "n", "PronunciationAssessment": { "AccuracyScore": 50 } },
                        { "Phoneme": "i", "PronunciationAssessment": { "AccuracyScore": 70 } }
                    ]
                },
                {
                    "Word": "好", "Offset": 5000000, "Duration": 5000000,
                    "PronunciationAssessment": { "AccuracyScore": 90 },
                    "Phonemes": [
                        { "Phoneme": "h", "PronunciationAssessment": { "AccuracyScore": 90 } },
                        { "Phoneme": "ao", "PronunciationAssessment": { "AccuracyScore": 0 } }
                    ]
                }
            ]
        }]
    }"#;

    #[test]
    fn parses_serve_with_port() {
        let cli = Cli::try_parse_from(["speakflow", "serve", "--port", "8080"]).unwrap();
        assert!(matches!(
            cli.command.unwrap(),
            Commands::Serve { port: Some(8080) }
        ));
    }

    #[test]
    fn parses_analyze_with_default_language() {
        let cli = Cli::try_parse_from(["speakflow", "--root", "/tmp/x", "analyze", "r.json"]).unwrap();
        assert_eq!(cli.root, PathBuf::from("/tmp/x"));
        match cli.command.unwrap() {
            Commands::Analyze { file, language } => {
                assert_eq!(file, PathBuf::from("r.json"));
                assert_eq!(language, "zh-CN");
            }
            _ => panic!("expected analyze"),
        }
    }

    #[test]
    fn parses_history_subcommand() {
        let cli = Cli::try_parse_from(["speakflow", "history", "abc"]).unwrap();
        assert!(matches!(
            cli.command.unwrap(),
            Commands::History { session_id } if session_id == "abc"
        ));
    }

    #[test]
    fn bind_with_port_replaces_port() {
        assert_eq!(bind_with_port("0.0.0.0:5001", 8080), "0.0.0.0:8080");
        assert_eq!(bind_with_port("localhost", 9000), "localhost:9000");
    }

    #[test]
    fn analyze_overrides_scores_and_reports_duration() {
        let report = analyze(DETAILED_RESULT, &Language::Mandarin).unwrap();
        // word means 60 and 90; phoneme mean (50+70+90)/3 = 70
        assert_eq!(report.assessment.pronunciation_score, 75.0);
        assert_eq!(report.assessment.accuracy_score, 70.0);
        assert_eq!(report.assessment.fluency_score, 88.0);
        assert_eq!(report.total_duration, 1.0);
        assert!(!report.language_mismatch);
        assert_eq!(report.feedback.pronunciation.len(), 1);
        assert_eq!(report.feedback.pronunciation[0].word, "你");
        assert_eq!(report.analysis.words.len(), 2);
        assert_eq!(report.analysis.words[1].word_score, 90);
    }

    #[test]
    fn open_store_resolves_database_under_root() {
        let tmp = tempfile::TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("data")).unwrap();
        let store = open_store(tmp.path(), "data/speakflow.db").unwrap();
        assert!(tmp.path().join("data/speakflow.db").exists());
        drop(store);
    }
}
