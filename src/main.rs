use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use llm_blocks::{apply, Config, FileFilterConfig, PromptPipeline, API_KEY_ENV};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser, Debug)]
#[command(
    name = "llm-blocks",
    version,
    author,
    about = "Send source files to an LLM and apply the files it sends back",
    long_about = "Send source files to an LLM and apply the files it sends back.\n\n\
    Files travel in both directions wrapped in [FILE path] ... [/FILE] blocks. \
    `prompt` streams the answer to stdout and saves it; `apply` writes every \
    block in a saved answer back to disk.\n\n\
    USAGE EXAMPLES:\n  \
      # Ask about two files\n  \
      llm-blocks prompt -f src/lib.rs -f src/main.rs Add logging to the CLI\n\n  \
      # Ask about the whole project, with a screenshot\n  \
      llm-blocks prompt -a screenshot.png Why is the layout broken\n\n  \
      # Write the answer back to disk\n  \
      llm-blocks apply\n\n  \
      # Apply an answer piped from elsewhere\n  \
      pbpaste | llm-blocks apply -"
)]
struct Cli {
    /// Verbose output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Send files and a question to the model
    Prompt(PromptArgs),

    /// Write the file blocks of a saved answer to disk
    Apply(ApplyArgs),
}

#[derive(Args, Debug)]
struct PromptArgs {
    /// The question; multiple words are joined with spaces
    #[arg(required = true, num_args = 1.., value_name = "QUESTION")]
    question: Vec<String>,

    /// File to include (repeatable); the project is scanned when omitted
    #[arg(short, long = "file", value_name = "FILE")]
    files: Vec<PathBuf>,

    /// Image path or URL to attach (repeatable)
    #[arg(short, long = "attachment", value_name = "PATH|URL")]
    attachments: Vec<String>,

    /// Where to write the answer, without reasoning
    #[arg(short, long, default_value = ".response.md", value_name = "FILE")]
    output: PathBuf,

    /// Where to write the composed prompt
    #[arg(long, default_value = ".messages.md", value_name = "FILE")]
    debug_log: PathBuf,

    /// Project root scanned when no files are given
    #[arg(short, long, default_value = ".", value_name = "PATH")]
    dir: PathBuf,

    /// Glob of files to leave out of the scan (repeatable)
    #[arg(long, value_name = "GLOB")]
    exclude: Vec<String>,

    /// Glob of directories to leave out of the scan (repeatable)
    #[arg(long, value_name = "GLOB")]
    exclude_dir: Vec<String>,

    /// Scan only files matching this glob (repeatable)
    #[arg(long, value_name = "GLOB")]
    only: Vec<String>,

    /// Model identifier
    #[arg(long)]
    model: Option<String>,

    /// Maximum tokens in the answer
    #[arg(long, default_value_t = 60_000)]
    max_tokens: u32,

    /// Extended thinking budget (0 disables thinking)
    #[arg(long, default_value_t = 16_000)]
    thinking_tokens: u32,

    /// Sampling temperature
    #[arg(long, default_value_t = 1.0)]
    temperature: f32,

    /// Base URL of the model API
    #[arg(long, value_name = "URL")]
    api_url: Option<String>,

    /// API key
    #[arg(long, env = API_KEY_ENV, hide_env_values = true)]
    api_key: Option<String>,

    /// Tera template replacing the built-in system prompt
    ///
    /// The template receives `tag`, the marker name.
    #[arg(long, value_name = "FILE")]
    system_template: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct ApplyArgs {
    /// Saved answer to apply, or `-` for stdin
    #[arg(default_value = ".response.md", value_name = "INPUT")]
    input: PathBuf,

    /// Report what would be written without touching any file
    #[arg(long)]
    dry_run: bool,

    /// Keep a timestamped copy of every file before overwriting it
    #[arg(long)]
    backup: bool,

    /// Print the statistics as JSON on stdout
    #[arg(long)]
    json: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_tracing(cli.verbose)?;

    match cli.command {
        Command::Prompt(args) => run_prompt(args),
        Command::Apply(args) => run_apply(args),
    }
}

fn run_prompt(args: PromptArgs) -> anyhow::Result<()> {
    let question = args.question.join(" ");

    let mut builder = Config::builder()
        .root_dir(args.dir)
        .response_path(args.output)
        .debug_log_path(args.debug_log)
        .max_tokens(args.max_tokens)
        .thinking_tokens(args.thinking_tokens)
        .temperature(args.temperature)
        .file_filter_config(
            FileFilterConfig::new()
                .exclude_files(args.exclude)
                .exclude_directories(args.exclude_dir)
                .allow_only(args.only),
        );

    if let Some(model) = args.model {
        builder = builder.model(model);
    }

    if let Some(url) = args.api_url {
        builder = builder.api_base_url(url);
    }

    if let Some(key) = args.api_key {
        builder = builder.api_key(key);
    }

    if let Some(template) = args.system_template {
        builder = builder.system_template(template);
    }

    let config = builder
        .build()
        .context("Failed to build configuration")?;

    let stats = PromptPipeline::new(config)
        .context("Failed to create prompt pipeline")?
        .run(&question, &args.files, &args.attachments)
        .context("Prompt failed")?;

    stats.print_summary();
    Ok(())
}

fn run_apply(args: ApplyArgs) -> anyhow::Result<()> {
    let config = Config::builder()
        .dry_run(args.dry_run)
        .backup_existing(args.backup)
        .build()
        .context("Failed to build configuration")?;

    let stats = apply(&args.input, &config).context("Apply failed")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        stats.print_summary();
    }

    if !stats.is_clean() {
        tracing::warn!("Response was only partly applied");
    }

    Ok(())
}

fn setup_tracing(verbosity: u8) -> anyhow::Result<()> {
    let filter = match verbosity {
        0 => EnvFilter::new("llm_blocks=info"),
        1 => EnvFilter::new("llm_blocks=debug"),
        _ => EnvFilter::new("llm_blocks=trace"),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_writer(std::io::stderr),
        )
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(())
}
