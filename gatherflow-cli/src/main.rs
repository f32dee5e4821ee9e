use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use gatherflow::config::{AppConfig, Locale, OPENAI_API_KEY, OPENAI_ORG_ID, OPENAI_PROJECT_ID};
use gatherflow::hurricane::{self, NhcStormFeed};
use gatherflow::providers::ollama::smoke_test;
use gatherflow::providers::{OllamaClient, OpenAiChat, SmokeTest, TextGenerator};
use gatherflow::research;
use gatherflow::retrieval::{ArxivRetriever, WikipediaRetriever};
use gatherflow::state::FieldValue;
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

mod console;

use console::ConsoleEventSink;

const TEST_PROMPT: &str = "Diga 'Olá Mundo'";

/// Gather public data and summarize it with a language model
#[derive(Parser)]
#[command(name = "gatherflow")]
#[command(about = "Storm reports and research answers from public sources", long_about = None)]
struct Cli {
    /// Enable verbose output (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Language for prompts and messages (pt, en)
    #[arg(long, global = true, value_parser = parse_locale)]
    locale: Option<Locale>,

    /// Language model provider for `hurricanes` and `research`
    #[arg(long, global = true, value_enum, default_value_t)]
    provider: Provider,

    /// Model to use instead of the configured one
    #[arg(short, long, global = true)]
    model: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Report on active tropical systems in the Caribbean
    Hurricanes {
        /// Question to answer instead of the default one
        #[arg(short, long)]
        question: Option<String>,
    },
    /// Answer a scientific question from arXiv and Wikipedia
    Research {
        /// The question; asked interactively when omitted
        question: Option<String>,
    },
    /// Check the Ollama daemon and send a test prompt
    OllamaCheck,
    /// Check OpenAI credentials and send a test prompt
    OpenaiCheck,
}

/// Where generated text comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
enum Provider {
    /// OpenAI chat completions
    #[default]
    Openai,
    /// A local Ollama daemon
    Ollama,
}

fn parse_locale(value: &str) -> Result<Locale, String> {
    value.parse().map_err(|e: gatherflow::errors::ConfigError| e.to_string())
}

fn text(locale: Locale, pt: &'static str, en: &'static str) -> &'static str {
    match locale {
        Locale::Portuguese => pt,
        Locale::English => en,
    }
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let default_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(cli.verbose >= 2)
        .init();

    debug!("gatherflow started with verbosity level: {}", cli.verbose);

    if let Err(e) = run(cli).await {
        error!("Fatal error: {e:#}");
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = AppConfig::from_env().context("Invalid configuration")?;
    if let Some(locale) = cli.locale {
        config = config.with_locale(locale);
    }

    let model = cli.model.as_deref();
    match cli.command {
        Commands::Hurricanes { question } => {
            let generator = text_generator(
                &config,
                cli.provider,
                model,
                Some(hurricane::SUMMARY_TEMPERATURE),
            )?;
            run_hurricanes(&config, generator, question).await
        }
        Commands::Research { question } => {
            let generator = text_generator(&config, cli.provider, model, None)?;
            run_research(&config, generator, question).await
        }
        Commands::OllamaCheck => run_ollama_check(&config, model).await,
        Commands::OpenaiCheck => run_openai_check(&config, model).await,
    }
}

fn openai_chat(config: &AppConfig, model: Option<&str>) -> Result<OpenAiChat> {
    let mut settings = config.openai.clone();
    if let Some(model) = model {
        settings.model = model.to_string();
    }
    let http = config.http.client_with_timeout(settings.timeout()?)?;
    Ok(OpenAiChat::new(&settings, http)?)
}

fn ollama_client(config: &AppConfig, model: Option<&str>) -> Result<OllamaClient> {
    let client = OllamaClient::new(&config.ollama, config.http.client()?)?;
    Ok(match model {
        Some(model) => client.with_model(model),
        None => client,
    })
}

/// Builds the generator for the pipelines. `temperature` only affects OpenAI.
fn text_generator(
    config: &AppConfig,
    provider: Provider,
    model: Option<&str>,
    temperature: Option<f32>,
) -> Result<Arc<dyn TextGenerator>> {
    let generator: Arc<dyn TextGenerator> = match provider {
        Provider::Openai => {
            let chat = openai_chat(config, model)?;
            match temperature {
                Some(t) => Arc::new(chat.with_temperature(t)),
                None => Arc::new(chat),
            }
        }
        Provider::Ollama => Arc::new(ollama_client(config, model)?),
    };
    debug!(?provider, "Text generator ready");
    Ok(generator)
}

async fn run_hurricanes(
    config: &AppConfig,
    generator: Arc<dyn TextGenerator>,
    question: Option<String>,
) -> Result<()> {
    let locale = config.locale;
    let pipeline = hurricane::build_pipeline(
        Arc::new(NhcStormFeed::new(&config.sources, config.http.client()?)),
        generator,
        locale,
        Arc::new(ConsoleEventSink),
    )?;

    let question = question.unwrap_or_else(|| hurricane::default_question(locale).to_string());
    let state = pipeline
        .invoke([("question", FieldValue::from(question))])
        .await?;

    println!("\n{}", text(locale, "RELATÓRIO ATUAL:", "CURRENT REPORT:"));
    println!("{}", state.synthesis.unwrap_or_default());
    Ok(())
}

async fn run_research(
    config: &AppConfig,
    generator: Arc<dyn TextGenerator>,
    question: Option<String>,
) -> Result<()> {
    let locale = config.locale;
    let question = match question {
        Some(question) => question,
        None => read_question(locale)?,
    };

    let http = config.http.client()?;
    let pipeline = research::build_pipeline(
        Arc::new(ArxivRetriever::new(&config.sources, http.clone())),
        Arc::new(WikipediaRetriever::new(&config.sources, http)),
        generator,
        locale,
        Arc::new(ConsoleEventSink),
    )?;

    let state = pipeline
        .invoke([("question", FieldValue::from(question))])
        .await?;

    println!("\n\n{}", text(locale, "RESPOSTA FINAL:", "FINAL ANSWER:"));
    println!("{}", state.synthesis.unwrap_or_default());
    Ok(())
}

fn read_question(locale: Locale) -> Result<String> {
    let mut stdout = io::stdout();
    write!(stdout, "{}", research::question_prompt(locale))?;
    stdout.flush()?;

    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read the question")?;
    Ok(line.trim().to_string())
}

async fn run_ollama_check(config: &AppConfig, model: Option<&str>) -> Result<()> {
    let locale = config.locale;
    let client = ollama_client(config, model)?;
    let model = client.model();

    println!(
        "{} {}",
        text(locale, "Verificando Ollama em:", "Checking Ollama at:"),
        client.host()
    );

    let mut pulling = false;
    let outcome = smoke_test(&client, model, TEST_PROMPT, |status| {
        if !pulling {
            pulling = true;
            match locale {
                Locale::Portuguese => println!(
                    "Baixando modelo '{model}' (isso pode levar alguns minutos)..."
                ),
                Locale::English => println!("Downloading model '{model}' (this may take a while)..."),
            }
        }
        println!("    {status}");
    })
    .await?;

    match outcome {
        SmokeTest::Unavailable => bail!(text(
            locale,
            "Ollama não está disponível no URL especificado.",
            "Ollama is not available at the given URL."
        )),
        SmokeTest::Replied { pulled, response } => {
            println!("{}", text(locale, "Ollama está disponível!", "Ollama is available!"));
            match (locale, pulled) {
                (Locale::Portuguese, true) => println!("Modelo '{model}' baixado com sucesso!"),
                (Locale::Portuguese, false) => {
                    println!("Modelo '{model}' já disponível localmente!");
                }
                (Locale::English, true) => println!("Model '{model}' downloaded."),
                (Locale::English, false) => println!("Model '{model}' is already available locally."),
            }
            println!(
                "{} {}",
                text(locale, "Resposta do modelo:", "Model reply:"),
                response.content.trim()
            );
            Ok(())
        }
    }
}

async fn run_openai_check(config: &AppConfig, model: Option<&str>) -> Result<()> {
    let locale = config.locale;
    let settings = &config.openai;

    println!("{}", text(locale, "Testando variáveis de ambiente...", "Checking environment variables..."));
    for (name, present) in [
        (OPENAI_API_KEY, settings.api_key.is_some()),
        (OPENAI_ORG_ID, settings.organization_id.is_some()),
        (OPENAI_PROJECT_ID, settings.project_id.is_some()),
    ] {
        let status = if present {
            "OK"
        } else {
            text(locale, "FALHOU", "MISSING")
        };
        println!("{name}: {status}");
    }

    let chat = openai_chat(config, model)?;
    println!(
        "\n{} ({})",
        text(locale, "Enviando requisição de teste...", "Sending test request..."),
        chat.model()
    );
    let response = chat.generate(TEST_PROMPT).await?;
    println!(
        "{} {}",
        text(locale, "Resposta da API:", "API reply:"),
        response.content
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_research_question_is_optional() {
        let cli = Cli::try_parse_from(["gatherflow", "research"]).unwrap();
        assert!(matches!(cli.command, Commands::Research { question: None }));

        let cli = Cli::try_parse_from(["gatherflow", "research", "o que é entropia?"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Research { question: Some(ref q) } if q == "o que é entropia?"
        ));
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli =
            Cli::try_parse_from(["gatherflow", "ollama-check", "--model", "llama3", "--locale", "en", "-vv"])
                .unwrap();
        assert_eq!(cli.locale, Some(Locale::English));
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.model.as_deref(), Some("llama3"));
        assert!(matches!(cli.command, Commands::OllamaCheck));
    }

    #[test]
    fn test_provider_defaults_to_openai() {
        let cli = Cli::try_parse_from(["gatherflow", "hurricanes"]).unwrap();
        assert_eq!(cli.provider, Provider::Openai);
        assert_eq!(cli.model, None);
    }

    #[test]
    fn test_provider_flag() {
        let cli = Cli::try_parse_from(["gatherflow", "research", "--provider", "ollama", "-m", "gemma2:2b"])
            .unwrap();
        assert_eq!(cli.provider, Provider::Ollama);
        assert_eq!(cli.model.as_deref(), Some("gemma2:2b"));

        let cli = Cli::try_parse_from(["gatherflow", "--provider", "openai", "hurricanes"]).unwrap();
        assert_eq!(cli.provider, Provider::Openai);

        assert!(Cli::try_parse_from(["gatherflow", "--provider", "anthropic", "hurricanes"]).is_err());
    }

    #[test]
    fn test_ollama_generator_needs_no_api_key() {
        let config = AppConfig::default();
        assert!(config.openai.api_key.is_none());
        assert!(text_generator(&config, Provider::Ollama, Some("llama3"), None).is_ok());
        assert!(text_generator(&config, Provider::Openai, None, Some(0.4)).is_err());
    }

    #[test]
    fn test_model_override() {
        let config = AppConfig::default();
        assert_eq!(ollama_client(&config, Some("llama3")).unwrap().model(), "llama3");
        assert_eq!(ollama_client(&config, None).unwrap().model(), config.ollama.model);

        let mut config = AppConfig::default();
        config.openai.api_key = Some("sk-test".to_string());
        assert_eq!(openai_chat(&config, Some("gpt-4o")).unwrap().model(), "gpt-4o");
    }

    #[test]
    fn test_unknown_locale_is_rejected() {
        assert!(Cli::try_parse_from(["gatherflow", "--locale", "fr", "hurricanes"]).is_err());
    }

    #[test]
    fn test_text_picks_locale() {
        assert_eq!(text(Locale::English, "sim", "yes"), "yes");
        assert_eq!(text(Locale::Portuguese, "sim", "yes"), "sim");
    }
}
