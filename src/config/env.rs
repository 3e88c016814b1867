use std::time::Duration;

use thiserror::Error;

use crate::classifier::{quick_filter, signals};

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub escalation: EscalationConfig,
    pub filters: FilterConfig,
    pub signals: SignalConfig,
    pub matching: MatchConfig,
    pub ghost: GhostConfig,
    pub sync: SyncConfig,
    pub insights: InsightsConfig,
    pub directories: DirectoryConfig,
    pub logging: LoggingConfig,
    pub timezone: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            escalation: EscalationConfig::default(),
            filters: FilterConfig::default(),
            signals: SignalConfig::default(),
            matching: MatchConfig::default(),
            ghost: GhostConfig::default(),
            sync: SyncConfig::default(),
            insights: InsightsConfig::default(),
            directories: DirectoryConfig::default(),
            logging: LoggingConfig::default(),
            timezone: "UTC".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EscalationConfig {
    pub api_key: Option<String>,
    pub api_url: String,
    pub model: String,
    pub timeout: Duration,
    pub max_tokens: u32,
    pub excerpt_chars: usize,
    pub threshold: f64,
    pub concurrency: usize,
}

impl Default for EscalationConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: "https://api.groq.com/openai/v1/chat/completions".to_string(),
            model: "llama-3.1-8b-instant".to_string(),
            timeout: Duration::from_millis(8_000),
            max_tokens: 300,
            excerpt_chars: 2_000,
            threshold: 0.65,
            concurrency: 4,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FilterConfig {
    pub platform_senders: Vec<String>,
    pub job_subject_signals: Vec<String>,
    pub sender_blocklist: Vec<String>,
    pub subject_blocklist: Vec<String>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            platform_senders: owned(quick_filter::DEFAULT_PLATFORM_SENDERS),
            job_subject_signals: owned(quick_filter::DEFAULT_JOB_SUBJECT_SIGNALS),
            sender_blocklist: owned(quick_filter::DEFAULT_SENDER_BLOCKLIST),
            subject_blocklist: owned(quick_filter::DEFAULT_SUBJECT_BLOCKLIST),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SignalConfig {
    pub recruiter_fragments: Vec<String>,
    pub automated_fragments: Vec<String>,
    pub known_employer_domains: Vec<String>,
    pub job_platform_domains: Vec<String>,
    pub personal_email_providers: Vec<String>,
    pub max_body_chars: usize,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            recruiter_fragments: owned(signals::DEFAULT_RECRUITER_FRAGMENTS),
            automated_fragments: owned(signals::DEFAULT_AUTOMATED_FRAGMENTS),
            known_employer_domains: owned(signals::DEFAULT_KNOWN_EMPLOYER_DOMAINS),
            job_platform_domains: owned(signals::DEFAULT_JOB_PLATFORM_DOMAINS),
            personal_email_providers: owned(signals::DEFAULT_PERSONAL_EMAIL_PROVIDERS),
            max_body_chars: 1_000,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MatchConfig {
    /// Similarity threshold on a 0-100 scale.
    pub threshold: f64,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self { threshold: 70.0 }
    }
}

/// Upper bound for `GHOST_WINDOW_DAYS`, ten years.
pub const MAX_GHOST_WINDOW_DAYS: i64 = 3650;

#[derive(Debug, Clone)]
pub struct GhostConfig {
    pub window_days: i64,
    pub sweep_cron: String,
}

impl Default for GhostConfig {
    fn default() -> Self {
        Self {
            window_days: 14,
            sweep_cron: "0 0 3 * * *".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub interval: Duration,
    pub batch_size: usize,
    pub concurrency: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(300),
            batch_size: 50,
            concurrency: 8,
        }
    }
}

#[derive(Debug, Clone)]
pub struct InsightsConfig {
    pub cache_ttl: Duration,
}

impl Default for InsightsConfig {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(45),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DirectoryConfig {
    pub logs_dir: String,
    pub data_dir: String,
    pub db_filename: String,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            logs_dir: "logs".to_string(),
            data_dir: "data".to_string(),
            db_filename: "jobmail.db".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
    #[error("invalid url for {key}: {source}")]
    Url {
        key: &'static str,
        #[source]
        source: url::ParseError,
    },
}

fn owned(items: &[&str]) -> Vec<String> {
    items.iter().map(|item| item.to_string()).collect()
}
