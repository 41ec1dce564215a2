use std::path::PathBuf;
use std::time::Duration;

use migrator_engine::{
    CloudinaryCredentials, PacingPolicy, RetryPolicy, DEFAULT_BREVO_BASE_URL,
    DEFAULT_CDN_FOLDER, DEFAULT_CLOUDINARY_BASE_URL,
};
use thiserror::Error;

const CLOUDINARY_KEYS: [&str; 3] = [
    "CLOUDINARY_CLOUD_NAME",
    "CLOUDINARY_API_KEY",
    "CLOUDINARY_API_SECRET",
];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required configuration: {}", .0.join(", "))]
    Missing(Vec<String>),
    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Local files the migrator reads and writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoragePaths {
    pub ledger_path: PathBuf,
    pub converted_dir: PathBuf,
    pub log_dir: PathBuf,
}

impl StoragePaths {
    pub fn from_lookup(lookup: &impl Fn(&str) -> Option<String>) -> Self {
        let path = |key: &str, default: &str| {
            PathBuf::from(non_blank(lookup(key)).unwrap_or_else(|| default.to_string()))
        };
        Self {
            ledger_path: path("LEDGER_PATH", "exported_posts.json"),
            converted_dir: path("CONVERTED_DIR", "converted"),
            log_dir: path("LOG_DIR", "logs"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloudinaryConfig {
    pub credentials: CloudinaryCredentials,
    pub folder: String,
    pub base_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublisherConfig {
    pub endpoint: String,
    pub cookies_path: PathBuf,
}

/// Everything a batch run needs, validated once at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct MigratorConfig {
    pub brevo_api_key: String,
    pub brevo_base_url: String,
    /// `None` leaves images at their original URLs.
    pub cloudinary: Option<CloudinaryConfig>,
    /// `None` runs export-only.
    pub publisher: Option<PublisherConfig>,
    pub paths: StoragePaths,
    pub pacing: PacingPolicy,
    pub retry: RetryPolicy,
    pub resume_from_artifacts: bool,
}

impl MigratorConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(&|key: &str| std::env::var(key).ok())
    }

    /// Build from any key lookup. Every missing required key is reported in
    /// one error.
    pub fn from_lookup(lookup: &impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| non_blank(lookup(key));
        let mut missing = Vec::new();

        let brevo_api_key = get("BREVO_API_KEY");
        if brevo_api_key.is_none() {
            missing.push("BREVO_API_KEY".to_string());
        }

        let cloudinary_values: Vec<Option<String>> =
            CLOUDINARY_KEYS.iter().map(|key| get(*key)).collect();
        let provided = cloudinary_values.iter().filter(|v| v.is_some()).count();
        if provided > 0 && provided < CLOUDINARY_KEYS.len() {
            missing.extend(
                CLOUDINARY_KEYS
                    .iter()
                    .zip(&cloudinary_values)
                    .filter(|(_, value)| value.is_none())
                    .map(|(key, _)| key.to_string()),
            );
        }

        if !missing.is_empty() {
            return Err(ConfigError::Missing(missing));
        }

        let cloudinary = match cloudinary_values.as_slice() {
            [Some(cloud_name), Some(api_key), Some(api_secret)] => Some(CloudinaryConfig {
                credentials: CloudinaryCredentials {
                    cloud_name: cloud_name.clone(),
                    api_key: api_key.clone(),
                    api_secret: api_secret.clone(),
                },
                folder: get("CLOUDINARY_FOLDER").unwrap_or_else(|| DEFAULT_CDN_FOLDER.to_string()),
                base_url: get("CLOUDINARY_BASE_URL")
                    .unwrap_or_else(|| DEFAULT_CLOUDINARY_BASE_URL.to_string()),
            }),
            _ => None,
        };

        let publisher = get("DRAFT_ENDPOINT").map(|endpoint| PublisherConfig {
            endpoint,
            cookies_path: PathBuf::from(
                get("COOKIES_PATH").unwrap_or_else(|| "cookies.json".to_string()),
            ),
        });

        let pacing_min = parse_number(&get, "PACING_MIN_SECS", 60)?;
        let pacing_max = parse_number(&get, "PACING_MAX_SECS", 180)?;
        if pacing_min > pacing_max {
            return Err(ConfigError::Invalid {
                key: "PACING_MIN_SECS",
                reason: format!("{pacing_min} is greater than PACING_MAX_SECS ({pacing_max})"),
            });
        }

        let max_attempts = parse_number(&get, "RETRY_MAX_ATTEMPTS", 3)?;
        if max_attempts == 0 {
            return Err(ConfigError::Invalid {
                key: "RETRY_MAX_ATTEMPTS",
                reason: "must be at least 1".to_string(),
            });
        }
        let base_delay_ms = parse_number(&get, "RETRY_BASE_DELAY_MS", 1000)?;

        Ok(Self {
            brevo_api_key: brevo_api_key.unwrap_or_default(),
            brevo_base_url: get("BREVO_BASE_URL")
                .unwrap_or_else(|| DEFAULT_BREVO_BASE_URL.to_string()),
            cloudinary,
            publisher,
            paths: StoragePaths::from_lookup(lookup),
            pacing: PacingPolicy::new(
                Duration::from_secs(pacing_min),
                Duration::from_secs(pacing_max),
            ),
            retry: RetryPolicy::new(
                u32::try_from(max_attempts).unwrap_or(u32::MAX),
                Duration::from_millis(base_delay_ms),
            ),
            resume_from_artifacts: parse_bool(&get, "RESUME_FROM_ARTIFACTS", false)?,
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_number(
    get: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: u64,
) -> Result<u64, ConfigError> {
    match get(key) {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|_| ConfigError::Invalid {
            key,
            reason: format!("'{raw}' is not a non-negative integer"),
        }),
    }
}

fn parse_bool(
    get: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: bool,
) -> Result<bool, ConfigError> {
    match get(key).map(|v| v.to_ascii_lowercase()) {
        None => Ok(default),
        Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => Ok(true),
        Some(v) if matches!(v.as_str(), "0" | "false" | "no" | "off") => Ok(false),
        Some(v) => Err(ConfigError::Invalid {
            key,
            reason: format!("'{v}' is not a boolean"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::path::PathBuf;
    use std::time::Duration;

    use pretty_assertions::assert_eq;

    use super::{ConfigError, MigratorConfig};

    fn config_from(pairs: &[(&str, &str)]) -> Result<MigratorConfig, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        MigratorConfig::from_lookup(&|key: &str| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_only_the_api_key_is_set() {
        let config = config_from(&[("BREVO_API_KEY", "k")]).unwrap();
        assert_eq!(config.brevo_base_url, "https://api.brevo.com/v3");
        assert_eq!(config.cloudinary, None);
        assert_eq!(config.publisher, None);
        assert_eq!(config.paths.ledger_path, PathBuf::from("exported_posts.json"));
        assert_eq!(config.paths.converted_dir, PathBuf::from("converted"));
        assert_eq!(config.paths.log_dir, PathBuf::from("logs"));
        assert_eq!(config.pacing.min, Duration::from_secs(60));
        assert_eq!(config.pacing.max, Duration::from_secs(180));
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.base_delay, Duration::from_secs(1));
        assert!(!config.resume_from_artifacts);
    }

    #[test]
    fn all_missing_keys_are_reported_together() {
        let err = config_from(&[("CLOUDINARY_CLOUD_NAME", "demo"), ("BREVO_API_KEY", "  ")])
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::Missing(vec![
                "BREVO_API_KEY".to_string(),
                "CLOUDINARY_API_KEY".to_string(),
                "CLOUDINARY_API_SECRET".to_string(),
            ])
        );
        assert!(err.to_string().contains("BREVO_API_KEY, CLOUDINARY_API_KEY"));
    }

    #[test]
    fn full_configuration_is_read() {
        let config = config_from(&[
            ("BREVO_API_KEY", "k"),
            ("CLOUDINARY_CLOUD_NAME", "demo"),
            ("CLOUDINARY_API_KEY", "ck"),
            ("CLOUDINARY_API_SECRET", "cs"),
            ("CLOUDINARY_FOLDER", "news"),
            ("DRAFT_ENDPOINT", "https://blog.example/api/drafts"),
            ("COOKIES_PATH", "/tmp/session.json"),
            ("PACING_MIN_SECS", "0"),
            ("PACING_MAX_SECS", "0"),
            ("RETRY_MAX_ATTEMPTS", "5"),
            ("RESUME_FROM_ARTIFACTS", "yes"),
        ])
        .unwrap();

        let cloudinary = config.cloudinary.expect("cloudinary configured");
        assert_eq!(cloudinary.credentials.cloud_name, "demo");
        assert_eq!(cloudinary.folder, "news");
        assert_eq!(cloudinary.base_url, "https://api.cloudinary.com/v1_1");
        let publisher = config.publisher.expect("publisher configured");
        assert_eq!(publisher.cookies_path, PathBuf::from("/tmp/session.json"));
        assert!(config.pacing.is_disabled());
        assert_eq!(config.retry.max_attempts, 5);
        assert!(config.resume_from_artifacts);
    }

    #[test]
    fn malformed_numbers_and_ranges_are_rejected() {
        assert!(matches!(
            config_from(&[("BREVO_API_KEY", "k"), ("PACING_MIN_SECS", "soon")]),
            Err(ConfigError::Invalid { key: "PACING_MIN_SECS", .. })
        ));
        assert!(matches!(
            config_from(&[
                ("BREVO_API_KEY", "k"),
                ("PACING_MIN_SECS", "200"),
                ("PACING_MAX_SECS", "100")
            ]),
            Err(ConfigError::Invalid { key: "PACING_MIN_SECS", .. })
        ));
        assert!(matches!(
            config_from(&[("BREVO_API_KEY", "k"), ("RETRY_MAX_ATTEMPTS", "0")]),
            Err(ConfigError::Invalid { key: "RETRY_MAX_ATTEMPTS", .. })
        ));
        assert!(matches!(
            config_from(&[("BREVO_API_KEY", "k"), ("RESUME_FROM_ARTIFACTS", "maybe")]),
            Err(ConfigError::Invalid { key: "RESUME_FROM_ARTIFACTS", .. })
        ));
    }
}
