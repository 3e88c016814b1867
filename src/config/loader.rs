use std::{env, str::FromStr, time::Duration};

use url::Url;

use super::env::{
    AppConfig, ConfigError, DirectoryConfig, EscalationConfig, FilterConfig, GhostConfig,
    InsightsConfig, LoggingConfig, MatchConfig, SignalConfig, SyncConfig, MAX_GHOST_WINDOW_DAYS,
};

pub fn load_config() -> Result<AppConfig, ConfigError> {
    AppConfig::from_env()
}

impl AppConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let escalation_defaults = EscalationConfig::default();
        let api_url = env::var("LLM_API_URL").unwrap_or(escalation_defaults.api_url);
        Url::parse(&api_url).map_err(|source| ConfigError::Url {
            key: "LLM_API_URL",
            source,
        })?;

        let threshold = parse_or("ESCALATION_THRESHOLD", escalation_defaults.threshold)?;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(ConfigError::Invalid {
                key: "ESCALATION_THRESHOLD",
                value: threshold.to_string(),
            });
        }

        let escalation = EscalationConfig {
            api_key: env::var("LLM_API_KEY").ok().filter(|v| !v.is_empty()),
            api_url,
            model: env::var("LLM_MODEL").unwrap_or(escalation_defaults.model),
            timeout: Duration::from_millis(parse_or("LLM_TIMEOUT_MS", 8_000u64)?),
            max_tokens: parse_or("LLM_MAX_TOKENS", escalation_defaults.max_tokens)?,
            excerpt_chars: parse_or("LLM_EXCERPT_CHARS", escalation_defaults.excerpt_chars)?,
            threshold,
            concurrency: parse_or("ESCALATION_CONCURRENCY", escalation_defaults.concurrency)?
                .max(1),
        };

        let filter_defaults = FilterConfig::default();
        let filters = FilterConfig {
            platform_senders: parse_list(
                "QUICK_FILTER_PLATFORM_SENDERS",
                filter_defaults.platform_senders,
            ),
            job_subject_signals: parse_list(
                "QUICK_FILTER_JOB_SIGNALS",
                filter_defaults.job_subject_signals,
            ),
            sender_blocklist: parse_list(
                "QUICK_FILTER_SENDER_BLOCKLIST",
                filter_defaults.sender_blocklist,
            ),
            subject_blocklist: parse_list(
                "QUICK_FILTER_SUBJECT_BLOCKLIST",
                filter_defaults.subject_blocklist,
            ),
        };

        let signal_defaults = SignalConfig::default();
        let signals = SignalConfig {
            recruiter_fragments: parse_list(
                "RECRUITER_FRAGMENTS",
                signal_defaults.recruiter_fragments,
            ),
            automated_fragments: parse_list(
                "AUTOMATED_FRAGMENTS",
                signal_defaults.automated_fragments,
            ),
            known_employer_domains: parse_list(
                "KNOWN_EMPLOYER_DOMAINS",
                signal_defaults.known_employer_domains,
            ),
            job_platform_domains: parse_list(
                "JOB_PLATFORM_DOMAINS",
                signal_defaults.job_platform_domains,
            ),
            personal_email_providers: parse_list(
                "PERSONAL_EMAIL_PROVIDERS",
                signal_defaults.personal_email_providers,
            ),
            max_body_chars: parse_or("SIGNAL_MAX_BODY_CHARS", signal_defaults.max_body_chars)?,
        };

        let match_threshold = parse_or("MATCH_THRESHOLD", MatchConfig::default().threshold)?;
        if !(0.0..=100.0).contains(&match_threshold) {
            return Err(ConfigError::Invalid {
                key: "MATCH_THRESHOLD",
                value: match_threshold.to_string(),
            });
        }
        let matching = MatchConfig {
            threshold: match_threshold,
        };

        let ghost_defaults = GhostConfig::default();
        let ghost = GhostConfig {
            window_days: ghost_window_days(parse_or(
                "GHOST_WINDOW_DAYS",
                ghost_defaults.window_days,
            )?)?,
            sweep_cron: env::var("GHOST_SWEEP_CRON")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(ghost_defaults.sweep_cron),
        };

        let sync_defaults = SyncConfig::default();
        let sync = SyncConfig {
            interval: Duration::from_secs(parse_or(
                "SYNC_INTERVAL_SECS",
                sync_defaults.interval.as_secs(),
            )?),
            batch_size: parse_or("SYNC_BATCH_SIZE", sync_defaults.batch_size)?.max(1),
            concurrency: parse_or("PIPELINE_CONCURRENCY", sync_defaults.concurrency)?.max(1),
        };

        let insights = InsightsConfig {
            cache_ttl: Duration::from_secs(parse_or(
                "INSIGHTS_CACHE_TTL_SECS",
                InsightsConfig::default().cache_ttl.as_secs(),
            )?),
        };

        let dir_defaults = DirectoryConfig::default();
        let directories = DirectoryConfig {
            logs_dir: env::var("LOGS_DIR").unwrap_or(dir_defaults.logs_dir),
            data_dir: env::var("DATA_DIR").unwrap_or(dir_defaults.data_dir),
            db_filename: env::var("DB_FILENAME").unwrap_or(dir_defaults.db_filename),
        };

        let logging = LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or(LoggingConfig::default().level),
        };

        let timezone = env::var("APP_TIMEZONE").unwrap_or_else(|_| "UTC".to_string());
        if timezone.parse::<chrono_tz::Tz>().is_err() {
            return Err(ConfigError::Invalid {
                key: "APP_TIMEZONE",
                value: timezone,
            });
        }

        Ok(Self {
            escalation,
            filters,
            signals,
            matching,
            ghost,
            sync,
            insights,
            directories,
            logging,
            timezone,
        })
    }
}

fn parse_or<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(value) if !value.trim().is_empty() => {
            let parsed = value.trim().parse::<T>();
            parsed.map_err(|_| ConfigError::Invalid { key, value })
        }
        _ => Ok(default),
    }
}

fn ghost_window_days(days: i64) -> Result<i64, ConfigError> {
    if (1..=MAX_GHOST_WINDOW_DAYS).contains(&days) {
        Ok(days)
    } else {
        Err(ConfigError::Invalid {
            key: "GHOST_WINDOW_DAYS",
            value: days.to_string(),
        })
    }
}

fn parse_list(key: &str, default: Vec<String>) -> Vec<String> {
    env::var(key)
        .ok()
        .map(|value| split_list(&value))
        .filter(|items| !items.is_empty())
        .unwrap_or(default)
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|part| part.trim().to_lowercase())
        .filter(|part| !part.is_empty())
        .collect()
}
