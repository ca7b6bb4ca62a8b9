//! Settings file support.
//!
//! Settings live in a line-oriented `key: value` file, by default
//! `~/.config/chumon/config.txt`:
//!
//! ```text
//! # chumon settings
//! timeout: 30
//! max_attempts: 4
//! tax_rate: 0.10
//! policy: collect-all
//! sheet: 注文内容
//! user_agent: Mozilla/5.0 (compatible; chumon)
//! http_header(Accept-Language): ja-JP,ja;q=0.9
//! delay(amazon): 8
//! ```
//!
//! Command-line flags override anything set here.

use std::collections::HashMap;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::batch::{BatchConfig, FailurePolicy};
use crate::fetch::FetchConfig;
use crate::reconcile::TaxRate;
use crate::sites::Site;
use crate::{ChumonError, Result};

/// One line of a settings file.
#[derive(Debug, Clone, PartialEq)]
pub enum Setting {
    /// Request timeout in seconds
    Timeout(u64),
    MaxAttempts(u32),
    TaxRate(TaxRate),
    Policy(FailurePolicy),
    Sheet(String),
    UserAgent(String),
    HttpHeader(String, String),
    /// Polite delay override for one site
    Delay(Site, Duration),
}

/// Settings collected from a file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppConfig {
    pub timeout: Option<u64>,
    pub max_attempts: Option<u32>,
    pub tax_rate: Option<TaxRate>,
    pub policy: Option<FailurePolicy>,
    pub sheet: Option<String>,
    pub user_agent: Option<String>,
    pub http_headers: Vec<(String, String)>,
    pub site_delays: HashMap<Site, Duration>,
}

impl AppConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies one setting. Later values replace earlier ones, headers with
    /// the same name included.
    pub fn add_setting(&mut self, setting: Setting) {
        match setting {
            Setting::Timeout(secs) => self.timeout = Some(secs),
            Setting::MaxAttempts(n) => self.max_attempts = Some(n),
            Setting::TaxRate(rate) => self.tax_rate = Some(rate),
            Setting::Policy(policy) => self.policy = Some(policy),
            Setting::Sheet(name) => self.sheet = Some(name),
            Setting::UserAgent(ua) => self.user_agent = Some(ua),
            Setting::HttpHeader(name, value) => {
                self.http_headers.retain(|(existing, _)| !existing.eq_ignore_ascii_case(&name));
                self.http_headers.push((name, value));
            }
            Setting::Delay(site, delay) => {
                self.site_delays.insert(site, delay);
            }
        }
    }

    /// HTTP settings with defaults for anything not set.
    pub fn fetch_config(&self) -> FetchConfig {
        let defaults = FetchConfig::default();
        FetchConfig {
            timeout: self.timeout.unwrap_or(defaults.timeout),
            max_attempts: self.max_attempts.unwrap_or(defaults.max_attempts),
            user_agent: self.user_agent.clone().unwrap_or(defaults.user_agent),
            headers: self.http_headers.clone(),
        }
    }

    /// Batch settings with defaults for anything not set.
    pub fn batch_config(&self) -> BatchConfig {
        BatchConfig {
            policy: self.policy.unwrap_or_default(),
            tax_rate: self.tax_rate.unwrap_or_default(),
            site_delays: self.site_delays.clone(),
            ..Default::default()
        }
    }
}

/// Parses a single `key: value` line.
pub fn parse_setting(line: &str) -> Result<Setting> {
    let line = line.trim();
    let (key, value) = line
        .split_once(':')
        .ok_or_else(|| ChumonError::ConfigError(format!("Invalid setting format: {line}")))?;
    let key = key.trim();
    let value = value.trim();

    match key {
        "timeout" => Ok(Setting::Timeout(parse_number(key, value)?)),
        "max_attempts" => {
            let attempts: u32 = parse_number(key, value)?;
            if attempts == 0 {
                return Err(ChumonError::ConfigError("max_attempts must be at least 1".to_string()));
            }
            Ok(Setting::MaxAttempts(attempts))
        }
        "tax_rate" => Ok(Setting::TaxRate(TaxRate::from_fraction(parse_number(key, value)?)?)),
        "policy" => Ok(Setting::Policy(value.parse()?)),
        "sheet" => non_empty(key, value).map(Setting::Sheet),
        "user_agent" => non_empty(key, value).map(Setting::UserAgent),
        _ => {
            if let Some(name) = key.strip_prefix("http_header(").and_then(|s| s.strip_suffix(')')) {
                Ok(Setting::HttpHeader(name.trim().to_string(), value.to_string()))
            } else if let Some(site) = key.strip_prefix("delay(").and_then(|s| s.strip_suffix(')')) {
                let secs: f64 = parse_number(key, value)?;
                let delay = Duration::try_from_secs_f64(secs)
                    .map_err(|e| ChumonError::ConfigError(format!("Invalid delay {value}: {e}")))?;
                Ok(Setting::Delay(site.parse()?, delay))
            } else {
                Err(ChumonError::ConfigError(format!("Unknown setting: {key}")))
            }
        }
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| ChumonError::ConfigError(format!("Invalid number for {key}: {value}")))
}

fn non_empty(key: &str, value: &str) -> Result<String> {
    if value.is_empty() {
        Err(ChumonError::ConfigError(format!("{key} must not be empty")))
    } else {
        Ok(value.to_string())
    }
}

/// Settings file parser
#[derive(Debug)]
pub struct ConfigParser;

impl ConfigParser {
    /// Parse a settings file
    pub fn parse_file<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ChumonError::FileNotFound(path.to_path_buf()));
        }
        let file = std::fs::File::open(path)
            .map_err(|e| ChumonError::ConfigError(format!("Cannot open file {}: {}", path.display(), e)))?;

        Self::parse_reader(BufReader::new(file))
    }

    /// Parse settings from a reader
    pub fn parse_reader<R: BufRead>(reader: R) -> Result<AppConfig> {
        let mut config = AppConfig::new();

        for (index, line) in reader.lines().enumerate() {
            let line_number = index + 1;
            let line =
                line.map_err(|e| ChumonError::ConfigError(format!("Read error at line {}: {}", line_number, e)))?;
            Self::apply_line(&mut config, &line, line_number)?;
        }

        Ok(config)
    }

    /// Parse settings from a string
    pub fn parse_string(content: &str) -> Result<AppConfig> {
        let mut config = AppConfig::new();

        for (index, line) in content.lines().enumerate() {
            Self::apply_line(&mut config, line, index + 1)?;
        }

        Ok(config)
    }

    fn apply_line(config: &mut AppConfig, line: &str, line_number: usize) -> Result<()> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return Ok(());
        }

        match parse_setting(line) {
            Ok(setting) => {
                config.add_setting(setting);
                Ok(())
            }
            Err(e) => Err(ChumonError::ConfigError(format!("Parse error at line {}: {}", line_number, e))),
        }
    }
}

/// `~/.config/chumon/config.txt`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".config").join("chumon").join("config.txt"))
}

/// Loads settings from `explicit`, or from the default location.
///
/// A missing default file yields empty settings. A missing explicit file is
/// an error.
pub fn load_config(explicit: Option<&Path>) -> Result<AppConfig> {
    match explicit {
        Some(path) => ConfigParser::parse_file(path),
        None => match default_config_path() {
            Some(path) if path.exists() => {
                tracing::debug!(path = %path.display(), "loading settings");
                ConfigParser::parse_file(path)
            }
            _ => Ok(AppConfig::new()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tempfile::TempDir;

    #[test]
    fn test_parse_string_basic() {
        let content = r#"
# Example settings
timeout: 30
max_attempts: 5
tax_rate: 0.08
policy: collect-all
sheet: 発注
"#;

        let config = ConfigParser::parse_string(content).unwrap();

        assert_eq!(config.timeout, Some(30));
        assert_eq!(config.max_attempts, Some(5));
        assert_eq!(config.tax_rate, Some(TaxRate::from_basis_points(800)));
        assert_eq!(config.policy, Some(FailurePolicy::CollectAll));
        assert_eq!(config.sheet.as_deref(), Some("発注"));
    }

    #[test]
    fn test_parse_string_http_headers() {
        let content = r#"
http_header(Accept-Language): en-US
http_header(Cookie): session=abc
http_header(accept-language): ja-JP
"#;

        let config = ConfigParser::parse_string(content).unwrap();

        assert_eq!(config.http_headers.len(), 2);
        assert!(config.http_headers.contains(&("accept-language".to_string(), "ja-JP".to_string())));
        assert!(config.http_headers.contains(&("Cookie".to_string(), "session=abc".to_string())));
    }

    #[test]
    fn test_value_may_contain_colons() {
        let config = ConfigParser::parse_string("user_agent: Mozilla/5.0 (X11; rv:120.0)").unwrap();
        assert_eq!(config.user_agent.as_deref(), Some("Mozilla/5.0 (X11; rv:120.0)"));
    }

    #[test]
    fn test_parse_site_delay() {
        let config = ConfigParser::parse_string("delay(amazon): 7.5\ndelay(akizuki): 0").unwrap();
        assert_eq!(config.site_delays.get(&Site::Amazon), Some(&Duration::from_millis(7500)));
        assert_eq!(config.site_delays.get(&Site::Akizuki), Some(&Duration::ZERO));
    }

    #[test]
    fn test_parse_error_names_line() {
        let content = "timeout: 10\n\nmax_attempts: many\n";
        let err = ConfigParser::parse_string(content).unwrap_err();
        assert!(err.to_string().contains("line 3"));
    }

    #[test]
    fn test_parse_invalid_settings() {
        assert!(parse_setting("no colon here").is_err());
        assert!(parse_setting("colour: blue").is_err());
        assert!(parse_setting("max_attempts: 0").is_err());
        assert!(parse_setting("tax_rate: 2").is_err());
        assert!(parse_setting("delay(rakuten): 1").is_err());
        assert!(parse_setting("delay(amazon): -1").is_err());
        assert!(parse_setting("sheet:").is_err());
    }

    #[test]
    fn test_parse_reader() {
        let config = ConfigParser::parse_reader(Cursor::new("timeout: 5\n# done\n")).unwrap();
        assert_eq!(config.timeout, Some(5));
    }

    #[test]
    fn test_fetch_and_batch_config_defaults() {
        let config = AppConfig::new();
        let fetch = config.fetch_config();
        assert_eq!(fetch.timeout, 20);
        assert_eq!(fetch.max_attempts, 3);

        let batch = config.batch_config();
        assert_eq!(batch.policy, FailurePolicy::FailFast);
        assert_eq!(batch.tax_rate, TaxRate::STANDARD);
    }

    #[test]
    fn test_load_explicit_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.txt");
        std::fs::write(&path, "timeout: 45\n").unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.fetch_config().timeout, 45);
    }

    #[test]
    fn test_load_missing_explicit_file() {
        let result = load_config(Some(Path::new("/nonexistent/chumon/config.txt")));
        assert!(matches!(result, Err(ChumonError::FileNotFound(_))));
    }
}
