// Configuration: the explicit settings handed to `HumanizeClient` plus the
// command-line surface that fills them in.

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://www.humanizeai.pro";
pub const DEFAULT_MODEL: &str = "free1";

/// How the client waits for a job to finish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        PollSettings {
            interval: Duration::from_secs(2),
            timeout: Duration::from_secs(300),
        }
    }
}

/// Everything a client instance needs. Built once and moved into the client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub token: String,
    /// Reuse a session id instead of generating a fresh one.
    pub session_id: Option<String>,
    /// Per-request transport timeout. `None` leaves reqwest's default.
    pub request_timeout: Option<Duration>,
    pub poll: PollSettings,
}

impl ClientConfig {
    pub fn new(token: impl Into<String>) -> Self {
        ClientConfig {
            base_url: DEFAULT_BASE_URL.to_string(),
            token: token.into(),
            session_id: None,
            request_timeout: None,
            poll: PollSettings::default(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "humanize-cli",
    version,
    about = "Submit text to the HumanizeAI Pro service and wait for the rewritten version"
)]
pub struct CliArgs {
    /// Bearer token copied from a logged-in browser session
    #[arg(long, env = "HUMANIZE_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Text to humanize
    #[arg(long, conflicts_with = "file")]
    pub text: Option<String>,

    /// Read the text to humanize from a file (stdin is used when neither is given)
    #[arg(short, long)]
    pub file: Option<PathBuf>,

    /// Model name (free1, standard1, ...)
    #[arg(short, long, env = "HUMANIZE_MODEL", default_value = DEFAULT_MODEL)]
    pub model: String,

    /// Enable ultra mode
    #[arg(long, default_value_t = false)]
    pub ultra: bool,

    /// Keyword to keep untouched, may be repeated
    #[arg(short, long = "keyword")]
    pub keywords: Vec<String>,

    /// Do not query account status before starting the job
    #[arg(long, default_value_t = false)]
    pub skip_account_check: bool,

    /// Seconds between poll attempts
    #[arg(long, default_value_t = 2)]
    pub interval: u64,

    /// Seconds to wait for the result before giving up
    #[arg(long, default_value_t = 300)]
    pub timeout: u64,

    #[arg(long, env = "HUMANIZE_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// Reuse a session id instead of generating one
    #[arg(long)]
    pub session_id: Option<String>,

    /// Store the token in ~/.humanize_token for later runs
    #[arg(long, default_value_t = false)]
    pub save_token: bool,

    /// Debug logging (RUST_LOG overrides)
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl CliArgs {
    pub fn poll_settings(&self) -> PollSettings {
        PollSettings {
            interval: Duration::from_secs(self.interval),
            timeout: Duration::from_secs(self.timeout),
        }
    }

    pub fn client_config(&self, token: String) -> ClientConfig {
        let mut config = ClientConfig::new(token).with_base_url(self.base_url.as_str());
        config.session_id = self.session_id.clone();
        config.poll = self.poll_settings();
        config
    }
}
