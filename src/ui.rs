// UI layer: resolves the token and input text, shows a spinner while the job
// runs, and prints the original and humanized text side by side.

use crate::api::{HumanizeClient, JobRequest};
use crate::config::CliArgs;
use anyhow::{bail, Context, Result};
use dialoguer::Password;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

const TOKEN_FILE: &str = ".humanize_token";
const RULE_WIDTH: usize = 60;

/// Run one humanization from parsed command-line arguments.
pub fn run(args: CliArgs) -> Result<()> {
    let token_path = token_path();
    let token = resolve_token(args.token.clone(), &token_path)?;
    if args.save_token {
        persist_token(&token_path, &token)?;
        println!("Token saved to {}", token_path.display());
    }

    let text = read_input_text(&args)?;
    print_header(&args, &token, &text);

    let client = HumanizeClient::new(args.client_config(token)).context("Failed to set up client")?;
    let job = JobRequest::new(text.clone(), args.model.clone())
        .ultra(args.ultra)
        .keywords(args.keywords.clone());

    let spinner = job_spinner(ProgressDrawTarget::stdout())?;
    let outcome = client.humanize(&job, !args.skip_account_check);
    spinner.finish_and_clear();
    let result = outcome.context("Humanization failed")?;

    print_results(&text, &result);
    Ok(())
}

/// Spinner shown while the job runs. It ticks on its own thread while the
/// poll loop blocks. Log lines go to stderr, so the spinner draws on stdout
/// to keep the two from overwriting each other.
pub fn job_spinner(target: ProgressDrawTarget) -> Result<ProgressBar> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_draw_target(target);
    spinner.set_style(ProgressStyle::with_template("{spinner} {msg} [{elapsed}]")?);
    spinner.set_message("Humanizing...");
    spinner.enable_steady_tick(Duration::from_millis(120));
    Ok(spinner)
}

/// Token from the flag/env first, then the saved file, then a hidden prompt.
pub fn resolve_token(explicit: Option<String>, token_file: &Path) -> Result<String> {
    if let Some(token) = explicit.map(|t| t.trim().to_string()).filter(|t| !t.is_empty()) {
        return Ok(token);
    }
    if let Ok(token) = load_token(token_file) {
        debug!(path = %token_file.display(), "using saved token");
        return Ok(token);
    }
    let token: String = Password::new()
        .with_prompt("Bearer token")
        .interact()
        .context("No token given and prompting for one failed")?;
    let token = token.trim().to_string();
    if token.is_empty() {
        bail!("A bearer token is required");
    }
    Ok(token)
}

/// Input text from `--text`, `--file`, or stdin, in that order.
pub fn read_input_text(args: &CliArgs) -> Result<String> {
    let text = if let Some(text) = &args.text {
        text.clone()
    } else if let Some(path) = &args.file {
        std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?
    } else {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read text from stdin")?;
        buf
    };
    if text.trim().is_empty() {
        bail!("Nothing to humanize: input text is empty");
    }
    Ok(text)
}

/// Token file in the user's home directory.
pub fn token_path() -> PathBuf {
    let dir = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    dir.join(TOKEN_FILE)
}

pub fn persist_token(path: &Path, token: &str) -> Result<()> {
    std::fs::write(path, token)
        .with_context(|| format!("Failed to write token to {}", path.display()))?;
    Ok(())
}

pub fn load_token(path: &Path) -> Result<String> {
    let data = std::fs::read_to_string(path)?;
    let token = data.trim();
    if token.is_empty() {
        bail!("Token file {} is empty", path.display());
    }
    Ok(token.to_string())
}

/// Enough of the token to recognise it in a terminal, never the whole thing.
pub fn mask_token(token: &str) -> String {
    let shown: String = token.chars().take(20).collect();
    if shown.len() < token.len() {
        format!("{shown}...")
    } else {
        "*".repeat(token.chars().count())
    }
}

fn print_header(args: &CliArgs, token: &str, text: &str) {
    let rule = "=".repeat(RULE_WIDTH);
    println!("{rule}");
    println!("HUMANIZE AI PRO - AUTOMATED CLIENT");
    println!("{rule}");
    println!("Token: {}", mask_token(token));
    println!("Text: {}", text.trim_end());
    println!("Model: {}", args.model);
    println!("Ultra Mode: {}", args.ultra);
    println!("{rule}");
}

fn print_results(original: &str, humanized: &str) {
    let rule = "=".repeat(RULE_WIDTH);
    let thin = "-".repeat(40);
    println!("\n{rule}");
    println!("RESULTS");
    println!("{rule}");
    println!("ORIGINAL TEXT:");
    println!("{thin}");
    println!("{}", original.trim_end());
    println!("\nHUMANIZED TEXT:");
    println!("{thin}");
    println!("{humanized}");
    println!("{rule}");
}
