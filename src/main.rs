//! `llm-arena` command line: send one prompt to several models and compare the answers.

use std::error::Error;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use llm_arena::config::{ArenaConfig, build_client_from_config, credential_env_var, credential_from_env};
use llm_arena::export::ExportArtifact;
use llm_arena::http::reqwest::default_dyn_transport;
use llm_arena::metrics::{LatencyBucket, format_cost, format_latency, format_token_count};
use llm_arena::{
    ArenaClient, GenerationParameters, ProviderKind, RequestTarget, ResultRecord, ResultStatus,
    TargetDeltaCallback,
};

/// Compare LLM providers side by side.
#[derive(Parser)]
#[command(name = "llm-arena", version, about)]
struct Cli {
    /// Log at debug level unless RUST_LOG is set.
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send a prompt to every target concurrently.
    Compare {
        prompt: String,

        /// Target as `provider:model`, e.g. `openai:gpt-4o-mini`. Repeatable.
        #[arg(long = "target", short, required = true, value_parser = parse_target)]
        targets: Vec<(ProviderKind, String)>,

        /// Stream responses; a single target is echoed as it arrives.
        #[arg(long)]
        stream: bool,

        #[arg(long)]
        temperature: Option<f32>,

        #[arg(long)]
        max_tokens: Option<u32>,

        /// Write the results as a JSON artifact to this path.
        #[arg(long)]
        export: Option<PathBuf>,
    },

    /// List the models a provider offers.
    Models {
        /// `openai`, `anthropic` or `gemini`.
        provider: ProviderKind,
    },
}

fn parse_target(raw: &str) -> Result<(ProviderKind, String), String> {
    let (provider, model) = raw
        .split_once(':')
        .ok_or_else(|| format!("expected provider:model, got `{raw}`"))?;
    let provider = provider.parse::<ProviderKind>().map_err(|err| err.to_string())?;
    let model = model.trim();
    if model.is_empty() {
        return Err(format!("missing model in `{raw}`"));
    }
    Ok((provider, model.to_string()))
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(if cli.verbose { "debug" } else { "warn" });

    match run(cli.command).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Commands) -> Result<ExitCode, Box<dyn Error>> {
    let config = ArenaConfig::from_env()?;
    let client = build_client_from_config(&config, default_dyn_transport()?)?;

    match command {
        Commands::Compare {
            prompt,
            targets,
            stream,
            temperature,
            max_tokens,
            export,
        } => {
            let params = GenerationParameters {
                temperature: temperature.unwrap_or(config.defaults.temperature),
                max_output_tokens: max_tokens.unwrap_or(config.defaults.max_output_tokens),
            };
            let targets: Vec<RequestTarget> = targets
                .into_iter()
                .map(|(provider, model)| {
                    let target = RequestTarget::new(provider, model);
                    match credential_from_env(provider) {
                        Some(key) => target.with_credential(key),
                        None => target,
                    }
                })
                .collect();
            compare(&client, &prompt, &targets, params, stream, export).await
        }
        Commands::Models { provider } => {
            let credential = credential_from_env(provider);
            if credential.is_none() {
                eprintln!("note: {} is not set", credential_env_var(provider));
            }
            let models = client.list_models(provider, credential.as_deref()).await?;
            for model in models {
                println!(
                    "{:<40} {:<32} {:>10}",
                    model.id,
                    model.display_name,
                    format_token_count(Some(model.context_window))
                );
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn compare(
    client: &ArenaClient,
    prompt: &str,
    targets: &[RequestTarget],
    params: GenerationParameters,
    stream: bool,
    export: Option<PathBuf>,
) -> Result<ExitCode, Box<dyn Error>> {
    let echo: Option<TargetDeltaCallback> = (stream && targets.len() == 1).then(|| {
        Arc::new(|_: &RequestTarget, text: &str| {
            let mut stdout = std::io::stdout().lock();
            let _ = stdout.write_all(text.as_bytes());
            let _ = stdout.flush();
        }) as TargetDeltaCallback
    });
    let echoed = echo.is_some();

    let records = client.dispatch(prompt, targets, params, stream, echo).await;
    if echoed {
        println!();
    }
    for record in &records {
        print_record(record, !echoed);
    }

    if let Some(path) = export {
        let artifact = ExportArtifact::new(prompt, records.clone());
        tokio::fs::write(&path, artifact.to_json_pretty()?).await?;
        eprintln!("exported {} results to {}", records.len(), path.display());
    }

    let all_failed = records.iter().all(|r| r.status == ResultStatus::Error);
    Ok(if all_failed { ExitCode::FAILURE } else { ExitCode::SUCCESS })
}

fn print_record(record: &ResultRecord, with_text: bool) {
    let speed = match LatencyBucket::from_millis(record.latency_ms) {
        LatencyBucket::Fast => "fast",
        LatencyBucket::Moderate => "moderate",
        LatencyBucket::Slow => "slow",
    };
    let estimated = if record.usage_estimated { " (est.)" } else { "" };
    println!(
        "== {}:{} [{}] {} ({speed}) | in {} out {}{estimated} | {}",
        record.provider,
        record.model_id,
        record.status.as_str(),
        format_latency(record.latency_ms),
        format_token_count(record.input_tokens),
        format_token_count(record.output_tokens),
        format_cost(record.estimated_cost_usd),
    );
    if let Some(diagnostic) = &record.diagnostic {
        println!("   {}: {}", diagnostic.title, diagnostic.suggestion);
    }
    if with_text {
        if let Some(text) = &record.text {
            if record.is_partial {
                println!("   (partial)");
            }
            println!("{text}");
        }
    }
    println!();
}

fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}
