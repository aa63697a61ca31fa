use anyhow::{Context, Result};
use clap::Parser;
use keyword_protocol::{KeywordResponse, AUDIO_FIELD};
use reqwest::multipart;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Parser)]
#[command(name = "keyword-client")]
#[command(about = "Send WAV clips to a keyword spotter and print the predictions")]
struct Args {
    /// Keyword endpoint
    #[arg(short, long, default_value = "http://127.0.0.1:5000/keyword")]
    url: String,

    /// Request timeout in seconds
    #[arg(short, long, default_value = "30")]
    timeout: u64,

    /// WAV files to classify
    #[arg(required = true)]
    files: Vec<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(args.timeout))
        .build()
        .context("Failed to build HTTP client")?;

    let mut failures = 0;
    for file in &args.files {
        match classify(&client, &args.url, file).await {
            Ok(response) => print_outcome(file, &response),
            Err(e) => {
                failures += 1;
                eprintln!("❌ {}: {:#}", file.display(), e);
            }
        }
    }

    if failures > 0 {
        anyhow::bail!("{} of {} requests failed", failures, args.files.len());
    }
    Ok(())
}

async fn classify(client: &reqwest::Client, url: &str, file: &Path) -> Result<KeywordResponse> {
    let audio = tokio::fs::read(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;

    let file_name = file
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "audio.wav".to_string());
    let part = multipart::Part::bytes(audio)
        .file_name(file_name)
        .mime_str("audio/wav")?;
    let form = multipart::Form::new().part(AUDIO_FIELD, part);

    log::debug!("Uploading {} to {}", file.display(), url);
    let response = client
        .post(url)
        .multipart(form)
        .send()
        .await
        .with_context(|| format!("Request to {} failed", url))?;

    let status = response.status();
    let body = response.bytes().await?;
    log::debug!("{} answered {}", url, status);

    KeywordResponse::from_json(&body)
        .with_context(|| format!("Unexpected response body (HTTP {})", status))
}

fn print_outcome(file: &Path, response: &KeywordResponse) {
    match response {
        KeywordResponse::Keyword { keyword } => {
            println!("🎯 {}: {}", file.display(), keyword)
        }
        _ if response.is_unknown() => println!("❓ {}: unknown keyword", file.display()),
        KeywordResponse::Message { message } => {
            println!("⚠️ {}: {}", file.display(), message)
        }
    }
}
