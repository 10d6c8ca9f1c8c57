use crate::{
    attachment::Attachment,
    config::Config,
    decoder::{decode_str, DecodeOutcome},
    encoder::{self, EncodedPrompt},
    error::{Error, Result},
    model::{collect_text, AnthropicClient, ModelClient, ModelRequest, StreamEvent},
    scanner::Scanner,
    template::PromptTemplates,
    writer::{WrittenFile, Writer},
};
use serde::Serialize;
use std::{
    io::{Read, Write},
    path::{Path, PathBuf},
    time::{Duration, Instant},
};
use tracing::{debug, info, instrument, warn};

/// Statistics for one prompt round trip.
#[derive(Debug, Clone, Serialize)]
pub struct PromptStats {
    /// Paths offered to the encoder
    pub files_requested: usize,

    /// Files read and included in the prompt
    pub files_included: usize,

    /// Files that could not be read
    pub files_failed: usize,

    /// Images attached to the message
    pub attachments: usize,

    /// Size of the composed message
    pub prompt_bytes: usize,

    /// Size of the collected answer
    pub response_bytes: usize,

    /// Size of the streamed reasoning
    pub thinking_bytes: usize,

    /// Where the answer was written
    pub response_path: String,

    /// Total execution time
    pub duration: Duration,
}

impl PromptStats {
    /// Prints a human-readable summary to stderr.
    pub fn print_summary(&self) {
        eprintln!("\n╔═══════════════════════════════════════════════════════╗");
        eprintln!("║                  Prompt Summary                       ║");
        eprintln!("╠═══════════════════════════════════════════════════════╣");
        eprintln!(
            "║ Files Included:       {:>8} of {:<8}              ║",
            self.files_included, self.files_requested
        );
        eprintln!(
            "║ Files Failed:         {:>8}                        ║",
            self.files_failed
        );
        eprintln!(
            "║ Attachments:          {:>8}                        ║",
            self.attachments
        );
        eprintln!(
            "║ Prompt Size:          {:>8} bytes                  ║",
            self.prompt_bytes
        );
        eprintln!(
            "║ Thinking Size:        {:>8} bytes                  ║",
            self.thinking_bytes
        );
        eprintln!(
            "║ Response Size:        {:>8} bytes                  ║",
            self.response_bytes
        );
        eprintln!("║ Response File:                                        ║");
        eprintln!("║   {:<52}║", self.response_path);
        eprintln!(
            "║ Total Time:           {:>8.2}s                     ║",
            self.duration.as_secs_f64()
        );
        eprintln!("╚═══════════════════════════════════════════════════════╝\n");
    }
}

/// Statistics for applying one response.
#[derive(Debug, Clone, Serialize)]
pub struct ApplyStats {
    /// Complete blocks found in the response
    pub blocks_found: usize,

    /// Files written (or that would be, in a dry run)
    pub written: Vec<WrittenFile>,

    /// Paths that could not be written, with the reason
    pub failed: Vec<String>,

    /// Opening line of an unclosed trailing block, if any
    pub truncated_at: Option<usize>,

    /// Whether writes were skipped
    pub dry_run: bool,

    /// Total execution time
    pub duration: Duration,
}

impl ApplyStats {
    /// Returns true if nothing failed and no block was cut off.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && self.truncated_at.is_none()
    }

    /// Prints a human-readable summary to stderr.
    pub fn print_summary(&self) {
        eprintln!("\n╔═══════════════════════════════════════════════════════╗");
        eprintln!("║                   Apply Summary                       ║");
        eprintln!("╠═══════════════════════════════════════════════════════╣");
        eprintln!(
            "║ Blocks Found:         {:>8}                        ║",
            self.blocks_found
        );
        eprintln!(
            "║ Files Written:        {:>8}                        ║",
            self.written.len()
        );
        eprintln!(
            "║ Failures:             {:>8}                        ║",
            self.failed.len()
        );
        if let Some(line) = self.truncated_at {
            eprintln!(
                "║ ⚠ Unclosed block at line {:<8}                     ║",
                line
            );
        }
        if self.dry_run {
            eprintln!("║ ⚠ No files were written (dry run mode)               ║");
        }
        eprintln!(
            "║ Total Time:           {:>8.2}s                     ║",
            self.duration.as_secs_f64()
        );
        eprintln!("╚═══════════════════════════════════════════════════════╝\n");
    }
}

/// Sends project files to the model and saves its answer.
pub struct PromptPipeline<C = AnthropicClient> {
    config: Config,
    client: C,
    templates: PromptTemplates,
}

impl PromptPipeline<AnthropicClient> {
    /// Creates a pipeline talking to the Anthropic API.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or no API key is set.
    pub fn new(config: Config) -> Result<Self> {
        let client = AnthropicClient::from_config(&config)?;
        Self::with_client(config, client)
    }
}

impl<C: ModelClient> PromptPipeline<C> {
    /// Creates a pipeline with a custom model client.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration or system template is invalid.
    pub fn with_client(config: Config, client: C) -> Result<Self> {
        config.validate()?;
        let templates = PromptTemplates::new(config.system_template.as_deref())?;

        Ok(Self {
            config,
            client,
            templates,
        })
    }

    /// The model client in use.
    pub fn client(&self) -> &C {
        &self.client
    }

    /// Runs one prompt round trip.
    ///
    /// When `files` is empty the project under `root_dir` is scanned. Reasoning
    /// is echoed to stderr and the answer to stdout as it streams; the answer
    /// is then written to `response_path`.
    ///
    /// # Errors
    ///
    /// Returns an error if discovery finds nothing, an attachment is invalid,
    /// the request or stream fails, or the response file can't be written.
    /// A failed stream leaves the response file untouched.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use llm_blocks::{Config, PromptPipeline};
    ///
    /// # fn main() -> anyhow::Result<()> {
    /// let pipeline = PromptPipeline::new(Config::builder().build()?)?;
    /// let stats = pipeline.run("Add error handling", &["src/main.rs".into()], &[])?;
    /// stats.print_summary();
    /// # Ok(())
    /// # }
    /// ```
    #[instrument(skip_all, fields(files = files.len(), attachments = attachments.len()))]
    pub fn run(
        &self,
        question: &str,
        files: &[PathBuf],
        attachments: &[String],
    ) -> Result<PromptStats> {
        let start_time = Instant::now();

        let paths = if files.is_empty() {
            info!("Scanning {} for project files...", self.config.root_dir.display());
            self.discover()?
        } else {
            files.to_vec()
        };

        let prompt = encoder::encode(&paths);
        print_file_table(&prompt);

        let attachments = attachments
            .iter()
            .map(|reference| Attachment::parse(reference))
            .collect::<Result<Vec<_>>>()?;
        let attachment_count = attachments.len();

        let system = self.templates.render_system()?;
        let message = encoder::compose_message(&self.templates, &prompt.body, question)?;
        encoder::write_debug_log(&self.config.debug_log_path, &system, &message);

        eprintln!("Question:\n{question}\n");
        info!("Waiting for {}...", self.config.model);

        let prompt_bytes = message.len();
        let request = ModelRequest::new(&self.config, system, message, attachments);
        let stream = self.client.stream(&request)?;

        let mut thinking_bytes = 0;
        let answer = collect_text(stream, |event| match event {
            StreamEvent::BlockStart | StreamEvent::BlockStop => eprintln!(),
            StreamEvent::Thinking(fragment) => {
                thinking_bytes += fragment.len();
                eprint!("{fragment}");
            }
            StreamEvent::Text(fragment) => {
                print!("{fragment}");
                if let Err(e) = std::io::stdout().flush() {
                    debug!("Failed to flush stdout: {}", e);
                }
            }
        })?;

        std::fs::write(&self.config.response_path, &answer)
            .map_err(|e| Error::write(&self.config.response_path, &e))?;
        info!(
            "Wrote response to {} ({} bytes)",
            self.config.response_path.display(),
            answer.len()
        );

        Ok(PromptStats {
            files_requested: paths.len(),
            files_included: prompt.included.len(),
            files_failed: prompt.failures.len(),
            attachments: attachment_count,
            prompt_bytes,
            response_bytes: answer.len(),
            thinking_bytes,
            response_path: self.config.response_path.display().to_string(),
            duration: start_time.elapsed(),
        })
    }

    /// Scans the project; returned paths are usable from the working directory.
    fn discover(&self) -> Result<Vec<PathBuf>> {
        let root = &self.config.root_dir;
        let relative = Scanner::new(&self.config)?.scan()?;

        if root == Path::new(".") {
            return Ok(relative);
        }

        Ok(relative.into_iter().map(|p| root.join(p)).collect())
    }
}

fn print_file_table(prompt: &EncodedPrompt) {
    eprintln!("Files Being Processed");
    eprintln!("{:<48} {:>12} {:>7}  Status", "File", "Size", "Lines");

    for file in &prompt.included {
        eprintln!(
            "{:<48} {:>12} {:>7}  ✓ Read",
            file.display_path(),
            file.display_size(),
            file.line_count()
        );
    }

    for failure in &prompt.failures {
        match failure {
            Error::Read { path, message } => {
                eprintln!(
                    "{:<48} {:>12} {:>7}  ❌ Error: {}",
                    path.display(),
                    "N/A",
                    "-",
                    message
                );
            }
            other => eprintln!("{:<48} {:>12} {:>7}  ❌ Error: {}", "?", "N/A", "-", other),
        }
    }

    eprintln!();
}

/// Applies a saved response. `-` reads the response from stdin.
///
/// # Errors
///
/// Returns [`Error::MissingInput`] if the input file does not exist, or an IO
/// error if it can't be read. Per-file write failures are reported in the
/// returned stats instead.
#[instrument(skip_all, fields(input = %input.display()))]
pub fn apply(input: &Path, config: &Config) -> Result<ApplyStats> {
    let text = read_input(input)?;
    Ok(apply_text(&text, &Writer::new(config)))
}

/// Decodes `text` and writes every complete block with `writer`.
pub fn apply_text(text: &str, writer: &Writer) -> ApplyStats {
    let start_time = Instant::now();

    let outcome: DecodeOutcome = decode_str(text);
    if let Some(diagnostic) = outcome.diagnostic() {
        debug!("Decoding stopped early: {}", diagnostic);
    }

    if outcome.is_empty() {
        warn!("No file blocks found in the response");
    }

    let report = writer.apply(&outcome.blocks);
    if !report.is_success() {
        warn!(
            "{} of {} blocks could not be written",
            report.failures.len(),
            outcome.blocks.len()
        );
    }

    let dry_run = writer.is_dry_run();
    info!(
        "{} {} of {} blocks",
        if dry_run { "Checked" } else { "Applied" },
        report.written.len(),
        outcome.blocks.len()
    );

    ApplyStats {
        blocks_found: outcome.blocks.len(),
        written: report.written,
        failed: report.failures.iter().map(ToString::to_string).collect(),
        truncated_at: outcome.truncated,
        dry_run,
        duration: start_time.elapsed(),
    }
}

fn read_input(input: &Path) -> Result<String> {
    if input == Path::new("-") {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .map_err(|e| Error::io("<stdin>", e))?;
        return Ok(text);
    }

    if !input.exists() {
        return Err(Error::missing_input(input));
    }

    std::fs::read_to_string(input).map_err(|e| Error::io(input, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ScriptedClient;
    use assert_fs::prelude::*;

    fn config(root: &Path) -> Config {
        Config::builder()
            .root_dir(root)
            .debug_log_path(root.join(".messages.md"))
            .response_path(root.join(".response.md"))
            .build()
            .unwrap()
    }

    #[test]
    fn test_prompt_round_trip() {
        let temp = assert_fs::TempDir::new().unwrap();
        let source = temp.child("hello.py");
        source.write_str("print('hi')\n").unwrap();

        let answer = "Here you go.\n[FILE hello.py]\n```python\nprint('hello')\n```\n[/FILE]\n";
        let pipeline =
            PromptPipeline::with_client(config(temp.path()), ScriptedClient::with_text(answer))
                .unwrap();

        let stats = pipeline
            .run("Say hello", &[source.path().to_path_buf()], &[])
            .unwrap();

        temp.child(".response.md").assert(answer);
        assert_eq!(stats.files_included, 1);
        assert_eq!(stats.files_failed, 0);
        assert_eq!(stats.response_bytes, answer.len());

        let requests = pipeline.client().requests();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].system.starts_with("You are a 100x developer"));

        let log = std::fs::read_to_string(temp.child(".messages.md").path()).unwrap();
        assert!(log.contains("\n---\nHelp me with following files: "));
        assert!(log.contains("print('hi')\n\n[/FILE]\n---\n\nSay hello\n\n**Reminder**"));
    }

    #[test]
    fn test_prompt_scans_when_no_files_given() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("src/lib.rs").write_str("pub fn a() {}").unwrap();
        temp.child("README").write_str("skipped").unwrap();

        let pipeline = PromptPipeline::with_client(config(temp.path()), ScriptedClient::with_text("ok"))
            .unwrap();
        let stats = pipeline.run("Review", &[], &[]).unwrap();

        assert_eq!(stats.files_requested, 1);
        let requests = pipeline.client().requests();
        let expected = format!("[FILE {}]", temp.path().join("src/lib.rs").display());
        assert!(matches!(
            &requests[0].content[0],
            crate::model::ContentPart::Text { text } if text.contains(&expected)
        ));
    }

    #[test]
    fn test_prompt_stream_failure_keeps_old_response() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child(".response.md").write_str("previous answer").unwrap();
        let source = temp.child("a.rs");
        source.write_str("fn a() {}").unwrap();

        let client = ScriptedClient::new(vec![
            Ok(StreamEvent::Text("[FILE a.rs]\n".into())),
            Err(Error::stream("connection reset")),
        ]);
        let pipeline = PromptPipeline::with_client(config(temp.path()), client).unwrap();

        let result = pipeline.run("Fix", &[source.path().to_path_buf()], &[]);

        assert!(matches!(result, Err(Error::Stream { .. })));
        temp.child(".response.md").assert("previous answer");
    }

    #[test]
    fn test_prompt_rejects_bad_attachment() {
        let temp = assert_fs::TempDir::new().unwrap();
        let source = temp.child("a.rs");
        source.write_str("fn a() {}").unwrap();

        let pipeline =
            PromptPipeline::with_client(config(temp.path()), ScriptedClient::with_text("ok"))
                .unwrap();
        let result = pipeline.run(
            "Describe",
            &[source.path().to_path_buf()],
            &["diagram.svg".to_string()],
        );

        assert!(matches!(result, Err(Error::Attachment { .. })));
        assert!(pipeline.client().requests().is_empty());
    }

    #[test]
    fn test_apply_text_writes_blocks() {
        let temp = assert_fs::TempDir::new().unwrap();
        let writer = Writer::new(&config(temp.path())).with_base_dir(temp.path());

        let stats = apply_text(
            "noise\n[FILE a/b.txt]\n```\nhello\n```\n[/FILE]\n[FILE c.txt]\nunterminated\n",
            &writer,
        );

        temp.child("a/b.txt").assert("hello");
        temp.child("c.txt").assert(predicates::path::missing());
        assert_eq!(stats.blocks_found, 1);
        assert_eq!(stats.written.len(), 1);
        assert_eq!(stats.truncated_at, Some(7));
        assert!(!stats.is_clean());
    }

    #[test]
    fn test_apply_text_without_blocks() {
        let temp = assert_fs::TempDir::new().unwrap();
        let writer = Writer::new(&config(temp.path())).with_base_dir(temp.path());

        let stats = apply_text("Nothing to change.", &writer);

        assert_eq!(stats.blocks_found, 0);
        assert!(stats.is_clean());
    }

    #[test]
    fn test_apply_missing_input() {
        let temp = assert_fs::TempDir::new().unwrap();
        let result = apply(&temp.path().join("nope.md"), &config(temp.path()));

        assert!(matches!(result, Err(Error::MissingInput { .. })));
    }

    #[test]
    fn test_apply_stats_serialize() {
        let stats = ApplyStats {
            blocks_found: 1,
            written: vec![WrittenFile {
                path: "a.txt".into(),
                line_number: 1,
                bytes: 3,
            }],
            failed: vec![],
            truncated_at: None,
            dry_run: false,
            duration: Duration::from_millis(5),
        };

        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["written"][0]["path"], "a.txt");
        assert_eq!(json["blocks_found"], 1);
    }
}
