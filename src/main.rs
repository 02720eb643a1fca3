// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]

use anyhow::{Context, Result, anyhow};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{Shell, generate};
use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError, info, warn};
use std::fs::File;
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};

use mdtranslate::app_config::{self, Config, TranslationProvider};
use mdtranslate::app_controller::{Controller, FileOutcome};
use mdtranslate::file_utils::FileManager;
use mdtranslate::translation::OutputSanitizer;

/// CLI Wrapper for TranslationProvider to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliTranslationProvider {
    Ollama,
    #[value(name = "openai")]
    OpenAI,
    Anthropic,
    #[value(name = "lmstudio")]
    LMStudio,
    #[value(name = "deepseek")]
    DeepSeek,
    Qwen,
    Mimo,
    Mock,
}

impl From<CliTranslationProvider> for TranslationProvider {
    fn from(cli_provider: CliTranslationProvider) -> Self {
        match cli_provider {
            CliTranslationProvider::Ollama => TranslationProvider::Ollama,
            CliTranslationProvider::OpenAI => TranslationProvider::OpenAI,
            CliTranslationProvider::Anthropic => TranslationProvider::Anthropic,
            CliTranslationProvider::LMStudio => TranslationProvider::LMStudio,
            CliTranslationProvider::DeepSeek => TranslationProvider::DeepSeek,
            CliTranslationProvider::Qwen => TranslationProvider::Qwen,
            CliTranslationProvider::Mimo => TranslationProvider::Mimo,
            CliTranslationProvider::Mock => TranslationProvider::Mock,
        }
    }
}

/// CLI Wrapper for LogLevel to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for app_config::LogLevel {
    fn from(cli_level: CliLogLevel) -> Self {
        match cli_level {
            CliLogLevel::Error => app_config::LogLevel::Error,
            CliLogLevel::Warn => app_config::LogLevel::Warn,
            CliLogLevel::Info => app_config::LogLevel::Info,
            CliLogLevel::Debug => app_config::LogLevel::Debug,
            CliLogLevel::Trace => app_config::LogLevel::Trace,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Translate Markdown documents (default command)
    Translate(TranslateArgs),

    /// Show the capability profile selected for a provider and model
    Profile {
        /// Provider type, e.g. 'ollama' or 'deepseek'
        provider: String,

        /// Model name
        model: String,

        /// Configuration file path
        #[arg(short, long, default_value = "conf.json")]
        config_path: String,
    },

    /// Run the output sanitizer on a saved raw model response
    Sanitize {
        /// File holding the raw response
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Source language code of the translated document
        #[arg(short, long)]
        source_language: Option<String>,

        /// Target language code
        #[arg(short, long)]
        target_language: Option<String>,

        /// Original document, enables the unchanged-output check
        #[arg(long)]
        source_document: Option<PathBuf>,

        /// Configuration file path
        #[arg(short, long, default_value = "conf.json")]
        config_path: String,
    },

    /// Generate shell completions for mdtranslate
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Parser, Debug)]
struct TranslateArgs {
    /// Input document or directory to process
    #[arg(value_name = "INPUT_PATH")]
    input_path: PathBuf,

    /// Output file (single document only)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Force overwrite of existing output files
    #[arg(short, long)]
    force_overwrite: bool,

    /// Translation provider to use
    #[arg(short, long, value_enum)]
    provider: Option<CliTranslationProvider>,

    /// Model name to use for translation
    #[arg(short, long)]
    model: Option<String>,

    /// Source language code (e.g., 'zh', 'ja', 'en')
    #[arg(short, long)]
    source_language: Option<String>,

    /// Target language code (e.g., 'en', 'es', 'fr')
    #[arg(short, long)]
    target_language: Option<String>,

    /// Glossary JSON file mapping source terms to target terms
    #[arg(short, long)]
    glossary: Option<PathBuf>,

    /// Sampling temperature (0.0 - 2.0)
    #[arg(long)]
    temperature: Option<f32>,

    /// Configuration file path
    #[arg(short, long, default_value = "conf.json")]
    config_path: String,

    /// Set logging level
    #[arg(short, long, value_enum)]
    log_level: Option<CliLogLevel>,
}

/// mdtranslate - Markdown document translation with AI
///
/// Translates long-form technical Markdown documents using interchangeable
/// LLM backends while keeping the document structure and terminology intact.
#[derive(Parser, Debug)]
#[command(name = "mdtranslate")]
#[command(version)]
#[command(about = "AI-powered Markdown document translation tool")]
#[command(long_about = "mdtranslate translates Markdown documents using AI providers.

EXAMPLES:
    mdtranslate guide.md                          # Translate using default config
    mdtranslate -f guide.md                       # Force overwrite existing files
    mdtranslate -p deepseek -m deepseek-chat guide.md
    mdtranslate -s zh -t en -g terms.json guide.md
    mdtranslate --log-level debug docs/           # Process entire directory
    mdtranslate profile ollama qwq:32b            # Show the selected profile
    mdtranslate sanitize raw_response.txt         # Clean a saved model response
    mdtranslate completions bash > mdtranslate.bash

CONFIGURATION:
    Configuration is stored in conf.json by default. You can specify a different
    config file with --config-path. If the config file doesn't exist, a default
    one will be created automatically.

SUPPORTED PROVIDERS:
    ollama    - Local Ollama server
    lmstudio  - LM Studio local server (OpenAI-compatible)
    openai    - OpenAI API (requires API key)
    anthropic - Anthropic API (requires API key)
    deepseek  - DeepSeek API (requires API key)
    qwen      - Qwen / DashScope API (requires API key)
    mimo      - MiMo translation API (requires API key)
    mock      - In-process mock backend")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Input document or directory to process
    #[arg(value_name = "INPUT_PATH")]
    input_path: Option<PathBuf>,

    /// Output file (single document only)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Force overwrite of existing output files
    #[arg(short, long)]
    force_overwrite: bool,

    /// Translation provider to use
    #[arg(short, long, value_enum)]
    provider: Option<CliTranslationProvider>,

    /// Model name to use for translation
    #[arg(short, long)]
    model: Option<String>,

    /// Source language code (e.g., 'zh', 'ja', 'en')
    #[arg(short, long)]
    source_language: Option<String>,

    /// Target language code (e.g., 'en', 'es', 'fr')
    #[arg(short, long)]
    target_language: Option<String>,

    /// Glossary JSON file mapping source terms to target terms
    #[arg(short, long)]
    glossary: Option<PathBuf>,

    /// Sampling temperature (0.0 - 2.0)
    #[arg(long)]
    temperature: Option<f32>,

    /// Configuration file path
    #[arg(short, long, default_value = "conf.json")]
    config_path: String,

    /// Set logging level
    #[arg(short, long, value_enum)]
    log_level: Option<CliLogLevel>,
}

// @struct: Custom logger implementation
struct CustomLogger {
    level: LevelFilter,
}

impl CustomLogger {
    // @creates: New logger with specified level
    fn new(level: LevelFilter) -> Self {
        CustomLogger { level }
    }

    // @initializes: Global logger
    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        let logger = Box::new(CustomLogger::new(level));
        log::set_boxed_logger(logger)?;
        log::set_max_level(level);
        Ok(())
    }

    // @returns: Emoji for log level
    fn get_emoji_for_level(level: Level) -> &'static str {
        match level {
            Level::Error => "❌ ",
            Level::Warn => "🚧 ",
            Level::Info => " ",
            Level::Debug => "🔍 ",
            Level::Trace => "📋 ",
        }
    }

    // @returns: ANSI color for log level
    fn get_color_for_level(level: Level) -> &'static str {
        match level {
            Level::Error => "\x1B[1;31m",
            Level::Warn => "\x1B[1;33m",
            Level::Info => "\x1B[1;32m",
            Level::Debug => "\x1B[1;36m",
            Level::Trace => "\x1B[1;35m",
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let now = chrono::Local::now().format("%H:%M:%S.%3f");
            let mut stderr = std::io::stderr();
            let _ = writeln!(
                stderr,
                "{}{} {} {}\x1B[0m",
                Self::get_color_for_level(record.level()),
                now,
                Self::get_emoji_for_level(record.level()),
                record.args()
            );
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // The level is lowered or raised once the config is known
    CustomLogger::init(LevelFilter::Trace)?;
    log::set_max_level(LevelFilter::Info);

    let cli = CommandLineOptions::parse();

    match cli.command {
        Some(Commands::Completions { shell }) => {
            let mut cmd = CommandLineOptions::command();
            generate(shell, &mut cmd, "mdtranslate", &mut std::io::stdout());
            Ok(())
        }
        Some(Commands::Translate(args)) => run_translate(args).await,
        Some(Commands::Profile {
            provider,
            model,
            config_path,
        }) => run_profile(&provider, &model, &config_path),
        Some(Commands::Sanitize {
            file,
            source_language,
            target_language,
            source_document,
            config_path,
        }) => run_sanitize(
            &file,
            source_language,
            target_language,
            source_document.as_deref(),
            &config_path,
        ),
        None => {
            // Default behavior: top-level args translate like the subcommand
            let input_path = cli
                .input_path
                .ok_or_else(|| anyhow!("INPUT_PATH is required when no subcommand is specified"))?;

            let translate_args = TranslateArgs {
                input_path,
                output: cli.output,
                force_overwrite: cli.force_overwrite,
                provider: cli.provider,
                model: cli.model,
                source_language: cli.source_language,
                target_language: cli.target_language,
                glossary: cli.glossary,
                temperature: cli.temperature,
                config_path: cli.config_path,
                log_level: cli.log_level,
            };
            run_translate(translate_args).await
        }
    }
}

/// Load the configuration file, creating a default one when `create` is set
fn load_config(config_path: &str, create: bool) -> Result<Config> {
    if Path::new(config_path).exists() {
        let file = File::open(config_path).context(format!("Failed to open config file: {}", config_path))?;
        let reader = BufReader::new(file);
        let config: Config =
            serde_json::from_reader(reader).context(format!("Failed to parse config file: {}", config_path))?;
        return Ok(config);
    }

    let config = Config::default();
    if create {
        warn!("Config file not found at '{}', creating default config.", config_path);
        let config_json =
            serde_json::to_string_pretty(&config).context("Failed to serialize default config to JSON")?;
        std::fs::write(config_path, config_json)
            .context(format!("Failed to write default config to file: {}", config_path))?;
    }
    Ok(config)
}

async fn run_translate(options: TranslateArgs) -> Result<()> {
    if let Some(cmd_log_level) = &options.log_level {
        let level: app_config::LogLevel = cmd_log_level.clone().into();
        log::set_max_level(level.to_level_filter());
    }

    let mut config = load_config(&options.config_path, true)?;

    // Override config with CLI options if provided
    if let Some(provider) = &options.provider {
        config.translation.provider = provider.clone().into();
    }
    if let Some(model) = &options.model {
        config.translation.model = Some(model.clone());
    }
    if let Some(source_lang) = &options.source_language {
        config.source_language = source_lang.clone();
    }
    if let Some(target_lang) = &options.target_language {
        config.target_language = target_lang.clone();
    }
    if let Some(temperature) = options.temperature {
        config.translation.temperature = temperature;
    }
    if let Some(log_level) = &options.log_level {
        config.log_level = log_level.clone().into();
    }

    config.validate().context("Configuration validation failed")?;
    if options.log_level.is_none() {
        log::set_max_level(config.log_level.to_level_filter());
    }

    info!(
        "Translating {} → {} with {} ({})",
        config.source_language,
        config.target_language,
        config.translation.provider.display_name(),
        config.translation.get_model()
    );

    let mut controller = Controller::with_config(config)?;
    if let Some(glossary) = &options.glossary {
        controller = controller.with_glossary_file(glossary)?;
    }

    if options.input_path.is_file() {
        match controller
            .run(options.input_path.clone(), options.output.clone(), options.force_overwrite)
            .await?
        {
            FileOutcome::Translated { output, warnings } if warnings > 0 => {
                warn!("Wrote {:?} with {} warning(s)", output, warnings)
            }
            FileOutcome::Translated { output, .. } => info!("Success: {:?}", output),
            FileOutcome::Skipped { .. } => {}
        }
    } else if options.input_path.is_dir() {
        if options.output.is_some() {
            return Err(anyhow!("--output can only be used with a single input file"));
        }
        let summary = controller
            .run_folder(options.input_path.clone(), options.force_overwrite)
            .await?;
        if summary.failed > 0 {
            return Err(anyhow!("{} document(s) failed to translate", summary.failed));
        }
    } else {
        return Err(anyhow!("Input path does not exist: {:?}", options.input_path));
    }

    Ok(())
}

fn run_profile(provider: &str, model: &str, config_path: &str) -> Result<()> {
    let config = load_config(config_path, false)?;
    let profile = config.pipeline.capability_table().classify(provider, model);
    println!("{}", serde_json::to_string_pretty(&profile)?);
    Ok(())
}

fn run_sanitize(
    file: &Path,
    source_language: Option<String>,
    target_language: Option<String>,
    source_document: Option<&Path>,
    config_path: &str,
) -> Result<()> {
    let config = load_config(config_path, false)?;
    let source_language = source_language.unwrap_or(config.source_language);
    let target_language = target_language.unwrap_or(config.target_language);

    let raw = FileManager::read_to_string(file)?;
    let source = source_document.map(FileManager::read_to_string).transpose()?;

    let sanitizer = OutputSanitizer::new(config.pipeline.sanitizer)
        .with_languages(&source_language, &target_language)
        .context("Unsupported language code")?;
    let output = sanitizer.sanitize(&raw, source.as_deref());

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
