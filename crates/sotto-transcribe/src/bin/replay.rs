//! Replays a captured WAV against the OpenAI backend.
//!
//! sotto keeps the audio of failed transcriptions under
//! `<data_dir>/sotto/debug/`; this tool re-submits one of those files so a
//! failure can be reproduced, or a fixed key checked, without re-recording
//! anything.
//!
//! Usage: sotto-replay <capture.wav> [language]
//!
//! The API key comes from SOTTO_OPENAI_KEY or OPENAI_API_KEY, a model
//! override from SOTTO_OPENAI_MODEL.

use std::env;
use std::fs;
use std::process::ExitCode;
use std::time::Instant;

use sotto_transcribe::{Bytes, OpenAiClient, OpenAiConfig, Transcriber};

#[tokio::main]
async fn main() -> ExitCode {
    let mut args = env::args().skip(1);
    let Some(path) = args.next() else {
        eprintln!("usage: sotto-replay <capture.wav> [language]");
        return ExitCode::from(2);
    };
    let language = args.next();

    let Ok(key) = env::var("SOTTO_OPENAI_KEY").or_else(|_| env::var("OPENAI_API_KEY")) else {
        eprintln!("set SOTTO_OPENAI_KEY or OPENAI_API_KEY");
        return ExitCode::from(2);
    };

    let audio = match fs::read(&path) {
        Ok(audio) => audio,
        Err(e) => {
            eprintln!("cannot read {path}: {e}");
            return ExitCode::FAILURE;
        }
    };

    let mut config = OpenAiConfig::new(key);
    if let Ok(model) = env::var("SOTTO_OPENAI_MODEL") {
        config = config.with_model(model);
    }
    eprintln!(
        "replaying {path} ({} KiB) against {}",
        audio.len() / 1024,
        config.model()
    );

    let client = OpenAiClient::new(config);
    let started = Instant::now();
    match client.transcribe(Bytes::from(audio), language.as_deref()).await {
        Ok(text) => {
            eprintln!("transcribed in {:.2}s", started.elapsed().as_secs_f64());
            println!("{text}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("transcription failed: {e}");
            ExitCode::FAILURE
        }
    }
}
