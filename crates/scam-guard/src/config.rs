//! Configuration for the guard.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use signal_source::SourceConfig;

use crate::classifier::{FormatRules, DEFAULT_CURRENCY_MARKERS, DEFAULT_PROVIDER_KEYWORDS};
use crate::error::{GuardError, Result};
use crate::scheduler::{DEFAULT_CYCLE_BUDGET, DEFAULT_FRESHNESS_WINDOW, DEFAULT_TICK_INTERVAL};

/// Default trust store location.
pub const DEFAULT_DATABASE_URL: &str = "sqlite:scam-guard.db?mode=rwc";

/// Configuration for the guard.
#[derive(Debug, Clone)]
pub struct GuardConfig {
    /// SQLx URL of the trust store.
    pub database_url: String,

    /// Remote authority. `None` when `SIGNAL_SOURCE_URL` is not set, in
    /// which case the guard can classify but not sync.
    pub source: Option<SourceConfig>,

    /// Maximum age of a successful sync before another is attempted.
    pub freshness_window: Duration,

    /// How often the periodic task fires.
    pub tick_interval: Duration,

    /// Time budget for one periodic cycle.
    pub cycle_budget: Duration,

    /// Optional JSON inbox file to scan each cycle.
    pub inbox_file: Option<PathBuf>,

    /// Currency markers for the format heuristic.
    pub currency_markers: Vec<String>,

    /// Provider / transaction keywords for the format heuristic.
    pub provider_keywords: Vec<String>,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            source: None,
            freshness_window: DEFAULT_FRESHNESS_WINDOW,
            tick_interval: DEFAULT_TICK_INTERVAL,
            cycle_budget: DEFAULT_CYCLE_BUDGET,
            inbox_file: None,
            currency_markers: to_strings(DEFAULT_CURRENCY_MARKERS),
            provider_keywords: to_strings(DEFAULT_PROVIDER_KEYWORDS),
        }
    }
}

fn to_strings(words: &[&str]) -> Vec<String> {
    words.iter().map(|s| s.to_string()).collect()
}

fn env_duration_secs(name: &str, default: Duration) -> Duration {
    env::var(name)
        .ok()
        .and_then(|s| s.trim().parse::<u64>().ok())
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs)
        .unwrap_or(default)
}

fn env_list(name: &str, default: &[&str]) -> Vec<String> {
    match env::var(name) {
        Ok(raw) => {
            let list: Vec<String> = raw
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            if list.is_empty() {
                to_strings(default)
            } else {
                list
            }
        }
        Err(_) => to_strings(default),
    }
}

impl GuardConfig {
    /// Create configuration from environment variables.
    ///
    /// All variables are optional:
    /// - `TRUST_STORE_URL` - SQLx URL (default: sqlite:scam-guard.db?mode=rwc)
    /// - `SIGNAL_SOURCE_URL` and `SIGNAL_SOURCE_*` - see [`SourceConfig::from_env`]
    /// - `GUARD_FRESHNESS_SECS` - Freshness window (default: 21600)
    /// - `GUARD_TICK_SECS` - Periodic interval (default: 60)
    /// - `GUARD_CYCLE_BUDGET_SECS` - Per-cycle budget (default: 30)
    /// - `GUARD_INBOX_FILE` - JSON inbox to scan
    /// - `GUARD_CURRENCY_MARKERS` - Comma separated (default: RWF,FRW)
    /// - `GUARD_PROVIDER_KEYWORDS` - Comma separated (default: MTN,MoMo,Mobile Money,Airtel Money)
    ///
    /// Unparseable numbers fall back to their defaults.
    pub fn from_env() -> Self {
        let database_url =
            env::var("TRUST_STORE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string());

        Self {
            database_url,
            source: SourceConfig::from_env().ok(),
            freshness_window: env_duration_secs("GUARD_FRESHNESS_SECS", DEFAULT_FRESHNESS_WINDOW),
            tick_interval: env_duration_secs("GUARD_TICK_SECS", DEFAULT_TICK_INTERVAL),
            cycle_budget: env_duration_secs("GUARD_CYCLE_BUDGET_SECS", DEFAULT_CYCLE_BUDGET),
            inbox_file: env::var("GUARD_INBOX_FILE").ok().map(PathBuf::from),
            currency_markers: env_list("GUARD_CURRENCY_MARKERS", DEFAULT_CURRENCY_MARKERS),
            provider_keywords: env_list("GUARD_PROVIDER_KEYWORDS", DEFAULT_PROVIDER_KEYWORDS),
        }
    }

    /// The remote authority, required by anything that syncs.
    pub fn require_source(&self) -> Result<&SourceConfig> {
        self.source
            .as_ref()
            .ok_or_else(|| GuardError::Config("SIGNAL_SOURCE_URL not set".to_string()))
    }

    /// Compile the configured format heuristic.
    pub fn format_rules(&self) -> Result<FormatRules> {
        FormatRules::new(&self.currency_markers, &self.provider_keywords)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = GuardConfig::default();
        assert_eq!(config.database_url, DEFAULT_DATABASE_URL);
        assert_eq!(config.freshness_window, Duration::from_secs(21_600));
        assert_eq!(config.tick_interval, Duration::from_secs(60));
        assert!(config.source.is_none());
        assert!(matches!(config.require_source(), Err(GuardError::Config(_))));
        assert!(config.format_rules().is_ok());
    }

    // Env vars are process-global, so every scenario lives in one test.
    #[test]
    fn test_from_env_scenarios() {
        use std::sync::Mutex;
        static ENV_LOCK: Mutex<()> = Mutex::new(());
        let _guard = ENV_LOCK.lock().unwrap();

        const VARS: &[&str] = &[
            "TRUST_STORE_URL",
            "SIGNAL_SOURCE_URL",
            "SIGNAL_SOURCE_TRUSTED_PATH",
            "SIGNAL_SOURCE_SCAMMERS_PATH",
            "SIGNAL_SOURCE_TIMEOUT_SECS",
            "GUARD_FRESHNESS_SECS",
            "GUARD_TICK_SECS",
            "GUARD_CYCLE_BUDGET_SECS",
            "GUARD_INBOX_FILE",
            "GUARD_CURRENCY_MARKERS",
            "GUARD_PROVIDER_KEYWORDS",
        ];
        fn clear_all() {
            for var in VARS {
                std::env::remove_var(var);
            }
        }

        // Scenario 1: nothing set
        clear_all();
        let config = GuardConfig::from_env();
        assert_eq!(config.database_url, DEFAULT_DATABASE_URL);
        assert!(config.source.is_none());
        assert_eq!(config.currency_markers, vec!["RWF", "FRW"]);

        // Scenario 2: everything set
        clear_all();
        std::env::set_var("TRUST_STORE_URL", "sqlite::memory:");
        std::env::set_var("SIGNAL_SOURCE_URL", "https://signals.example.org");
        std::env::set_var("SIGNAL_SOURCE_SCAMMERS_PATH", "reported");
        std::env::set_var("SIGNAL_SOURCE_TIMEOUT_SECS", "5");
        std::env::set_var("GUARD_FRESHNESS_SECS", "3600");
        std::env::set_var("GUARD_TICK_SECS", "15");
        std::env::set_var("GUARD_INBOX_FILE", "/tmp/inbox.json");
        std::env::set_var("GUARD_PROVIDER_KEYWORDS", "M-Pesa, Safaricom ,");

        let config = GuardConfig::from_env();
        assert_eq!(config.database_url, "sqlite::memory:");
        let source = config.require_source().unwrap();
        assert_eq!(source.scammers_url(), "https://signals.example.org/reported");
        assert_eq!(source.timeout, Duration::from_secs(5));
        assert_eq!(config.freshness_window, Duration::from_secs(3600));
        assert_eq!(config.tick_interval, Duration::from_secs(15));
        assert_eq!(config.cycle_budget, DEFAULT_CYCLE_BUDGET);
        assert_eq!(config.inbox_file, Some(PathBuf::from("/tmp/inbox.json")));
        assert_eq!(config.provider_keywords, vec!["M-Pesa", "Safaricom"]);

        // Scenario 3: garbage numbers fall back
        clear_all();
        std::env::set_var("GUARD_FRESHNESS_SECS", "six hours");
        std::env::set_var("GUARD_TICK_SECS", "0");
        std::env::set_var("GUARD_CURRENCY_MARKERS", " , ");

        let config = GuardConfig::from_env();
        assert_eq!(config.freshness_window, DEFAULT_FRESHNESS_WINDOW);
        assert_eq!(config.tick_interval, DEFAULT_TICK_INTERVAL);
        assert_eq!(config.currency_markers, vec!["RWF", "FRW"]);

        clear_all();
    }
}
