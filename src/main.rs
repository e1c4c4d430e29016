// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]

use anyhow::{Result, anyhow};
use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{Shell, generate};
use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError, error, info, warn};
use std::io::Write;
use std::path::PathBuf;

use dualsub::app_config::{self, Config};
use dualsub::app_controller::{Controller, FileResult, RunOptions};
use dualsub::document::Dialect;
use dualsub::extraction::StreamSelector;

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

/// CLI Wrapper for Dialect to implement ValueEnum
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliDialect {
    Ass,
    Srt,
    Plain,
}

impl From<CliDialect> for Dialect {
    fn from(dialect: CliDialect) -> Self {
        match dialect {
            CliDialect::Ass => Dialect::Ass,
            CliDialect::Srt => Dialect::Srt,
            CliDialect::Plain => Dialect::Plain,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Translate a subtitle file, a video's subtitle stream, or a whole directory
    Translate(TranslateArgs),

    /// List or extract the text subtitle streams of a video without translating
    Extract(ExtractArgs),

    /// Check that the translation backend is reachable and accepts the token
    Check(CommonArgs),

    /// Generate shell completions for dualsub
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Options shared by every command that loads the configuration
#[derive(Args, Debug, Clone)]
struct CommonArgs {
    /// Configuration file path
    #[arg(short, long, default_value = "conf.json")]
    config_path: PathBuf,

    /// Set logging level
    #[arg(short, long, value_enum)]
    log_level: Option<CliLogLevel>,

    /// Translation backend address
    #[arg(short, long)]
    endpoint: Option<String>,

    /// Value of the Authorization header sent to the backend
    #[arg(short = 'k', long, env = "DUALSUB_TOKEN", hide_env_values = true)]
    token: Option<String>,
}

#[derive(Args, Debug)]
struct TranslateArgs {
    /// Input subtitle file, video file or directory to process
    #[arg(value_name = "INPUT_PATH")]
    input_path: PathBuf,

    #[command(flatten)]
    common: CommonArgs,

    /// Force overwrite of existing output files
    #[arg(short, long)]
    force_overwrite: bool,

    /// Source language code (e.g., 'en', 'es', 'fr')
    #[arg(short, long)]
    source_language: Option<String>,

    /// Target language code (e.g., 'zh', 'zh-CN', 'fr')
    #[arg(short, long)]
    target_language: Option<String>,

    /// Entries per backend request (1-50)
    #[arg(short, long)]
    batch_size: Option<usize>,

    /// Subtitle dialect of the input, detected from the extension by default
    #[arg(long, value_enum)]
    dialect: Option<CliDialect>,

    /// Reject malformed dialogue lines instead of keeping them as-is
    #[arg(long)]
    strict: bool,

    /// Absolute index of the video subtitle stream to translate
    #[arg(long, conflicts_with = "stream_language")]
    stream: Option<usize>,

    /// Language of the video subtitle stream to translate
    #[arg(long)]
    stream_language: Option<String>,

    /// Stop at the first failed batch instead of leaving its lines untranslated
    #[arg(long)]
    fail_fast: bool,

    /// Do not probe the backend before translating
    #[arg(long)]
    skip_health_check: bool,

    /// Output file (single input file only)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct ExtractArgs {
    /// Input video file
    #[arg(value_name = "VIDEO")]
    video: PathBuf,

    #[command(flatten)]
    common: CommonArgs,

    /// Only list the subtitle streams
    #[arg(long)]
    list: bool,

    /// Absolute index of the stream to extract
    #[arg(long, conflicts_with = "language")]
    stream: Option<usize>,

    /// Language of the stream to extract
    #[arg(long)]
    language: Option<String>,

    /// Force overwrite of existing output files
    #[arg(short, long)]
    force_overwrite: bool,

    /// Output file
    #[arg(short, long)]
    output: Option<PathBuf>,
}

/// dualsub - bilingual subtitles from a translation backend
#[derive(Parser, Debug)]
#[command(name = "dualsub")]
#[command(version)]
#[command(about = "Bilingual subtitle generator")]
#[command(long_about = "dualsub translates the text of SubRip and Advanced SubStation subtitles through an HTTP
translation backend and appends the translation under each original line, keeping timing,
styling and every non-dialogue line untouched.

EXAMPLES:
    dualsub translate movie.ass                      # Translate using default config
    dualsub translate -f -t fr movie.srt             # Overwrite, translate to French
    dualsub translate --stream-language en movie.mkv # Translate the English stream of a video
    dualsub translate -l debug /subtitles/           # Process a whole directory
    dualsub extract --list movie.mkv                 # List subtitle streams
    dualsub check -e http://localhost:8989           # Probe the backend
    dualsub completions bash > dualsub.bash          # Generate bash completions

CONFIGURATION:
    Configuration is stored in conf.json by default. You can specify a different
    config file with --config-path. If the config file doesn't exist, a default one
    will be created automatically.")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Commands,
}

// @struct: Custom logger implementation
struct CustomLogger {
    level: LevelFilter,
}

impl CustomLogger {
    // @initializes: Global logger
    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        log::set_boxed_logger(Box::new(CustomLogger { level: LevelFilter::Trace }))?;
        log::set_max_level(level);
        Ok(())
    }

    // @returns: Emoji and ANSI colour for log level
    fn decoration(level: Level) -> (&'static str, &'static str) {
        match level {
            Level::Error => ("❌", "1;31"),
            Level::Warn => ("🚧", "1;33"),
            Level::Info => ("✨", "1;32"),
            Level::Debug => ("🔍", "1;36"),
            Level::Trace => ("📋", "1;35"),
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level && metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let now = chrono::Local::now().format("%H:%M:%S.%3f");
            let (emoji, colour) = Self::decoration(record.level());
            let _ = writeln!(std::io::stderr(), "\x1B[{}m{} {} {}\x1B[0m", colour, now, emoji, record.args());
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

#[tokio::main]
async fn main() {
    // Info until the config has been read
    if let Err(e) = CustomLogger::init(LevelFilter::Info) {
        eprintln!("Failed to initialize logger: {}", e);
    }

    let cli = CommandLineOptions::parse();

    let result = match cli.command {
        Commands::Completions { shell } => {
            let mut cmd = CommandLineOptions::command();
            generate(shell, &mut cmd, "dualsub", &mut std::io::stdout());
            Ok(())
        }
        Commands::Translate(args) => run_translate(args).await,
        Commands::Extract(args) => run_extract(args).await,
        Commands::Check(args) => run_check(args).await,
    };

    if let Err(e) = result {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

/// Load the configuration and apply the shared CLI overrides
fn load_config(common: &CommonArgs) -> Result<Config> {
    // A log level given on the command line applies before the config is read
    if let Some(level) = &common.log_level {
        let level: app_config::LogLevel = level.clone().into();
        log::set_max_level(level.to_level_filter());
    }

    let mut config = Config::load_or_create(&common.config_path)?;

    if let Some(endpoint) = &common.endpoint {
        config.backend.endpoint = endpoint.clone();
    }
    if let Some(token) = &common.token {
        config.backend.token = token.clone();
    }
    if let Some(level) = &common.log_level {
        config.log_level = level.clone().into();
    }

    log::set_max_level(config.log_level.to_level_filter());
    Ok(config)
}

fn create_controller(config: Config) -> Result<Controller> {
    let controller = Controller::with_config(config)?;

    // Ctrl-C stops dispatching new batches; in-flight ones finish
    let cancel = controller.cancellation_flag();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, finishing in-flight batches...");
            cancel.cancel();
        }
    });

    Ok(controller)
}

fn stream_selector(index: Option<usize>, language: Option<String>) -> StreamSelector {
    match (index, language) {
        (Some(index), _) => StreamSelector::Index(index),
        (None, Some(language)) => StreamSelector::Language(language),
        (None, None) => StreamSelector::First,
    }
}

async fn run_translate(args: TranslateArgs) -> Result<()> {
    let mut config = load_config(&args.common)?;

    // Override config with CLI options if provided
    if let Some(source_language) = args.source_language {
        config.source_language = source_language;
    }
    if let Some(target_language) = args.target_language {
        config.target_language = target_language;
    }
    if let Some(batch_size) = args.batch_size {
        config.batch.batch_size = batch_size;
    }
    if args.fail_fast {
        config.batch.fail_fast = true;
    }

    let controller = create_controller(config)?;

    let options = RunOptions {
        force_overwrite: args.force_overwrite,
        dialect: args.dialect.map(Dialect::from),
        strict: args.strict,
        stream: stream_selector(args.stream, args.stream_language),
        output: args.output,
        skip_health_check: args.skip_health_check,
    };

    if args.input_path.is_dir() {
        if options.output.is_some() {
            return Err(anyhow!("--output cannot be used with a directory input"));
        }
        let summary = controller.run_folder(args.input_path, &options).await?;
        if summary.errors > 0 {
            return Err(anyhow!("{} files failed", summary.errors));
        }
        return Ok(());
    }

    if let FileResult::Translated { failed_entries, .. } = controller.run(args.input_path, &options).await? {
        if !failed_entries.is_empty() {
            warn!("Re-run with -f to retry the untranslated lines");
        }
    }
    Ok(())
}

async fn run_extract(args: ExtractArgs) -> Result<()> {
    let config = load_config(&args.common)?;
    let controller = create_controller(config)?;

    if args.list {
        let streams = controller.list_streams(&args.video).await?;
        if streams.is_empty() {
            warn!("No subtitle streams found in {}", args.video.display());
        }
        for stream in &streams {
            let note = if stream.codec.is_text() { "" } else { " (bitmap, not extractable)" };
            info!("{}{}", stream, note);
        }
        return Ok(());
    }

    let selector = stream_selector(args.stream, args.language);
    controller
        .extract_only(&args.video, &selector, args.output, args.force_overwrite)
        .await?;
    Ok(())
}

async fn run_check(args: CommonArgs) -> Result<()> {
    let config = load_config(&args)?;
    info!("Checking translation backend at {}", config.backend.endpoint);
    let controller = Controller::with_config(config)?;
    controller.check_backend().await?;
    Ok(())
}
