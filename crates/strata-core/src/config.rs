use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ConfigError;

/// Current config version. Bump this when adding fields or changing shape.
/// Each bump requires a corresponding entry in [`migrate`].
pub const CURRENT_VERSION: u32 = 1;

/// Lock key used when the config does not name one.
pub const DEFAULT_LOCK_KEY: &str = "default";

/// Entries requested per ListObjectsV2 call.
pub const DEFAULT_PAGE_SIZE: i32 = 100;

/// S3 refuses `max-keys` above this.
pub const MAX_PAGE_SIZE: i32 = 1000;

/// Client-side knobs shared by every AWS-backed backend.
///
/// Unset fields fall through to the SDK's own defaults (environment,
/// shared config files, IMDS).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AwsSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    /// Endpoint override, e.g. LocalStack or MinIO.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
    /// Per-operation timeout in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

impl AwsSettings {
    /// Fill every unset field from `fallback`.
    pub fn or(&self, fallback: &AwsSettings) -> AwsSettings {
        AwsSettings {
            region: self.region.clone().or_else(|| fallback.region.clone()),
            endpoint: self.endpoint.clone().or_else(|| fallback.endpoint.clone()),
            profile: self.profile.clone().or_else(|| fallback.profile.clone()),
            timeout_ms: self.timeout_ms.or(fallback.timeout_ms),
        }
    }

    fn is_empty(&self) -> bool {
        *self == AwsSettings::default()
    }
}

/// DynamoDB lock table settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LockConfig {
    pub table: String,
    #[serde(default = "default_lock_key")]
    pub lock_key: String,
    #[serde(default, skip_serializing_if = "AwsSettings::is_empty")]
    pub aws: AwsSettings,
}

impl LockConfig {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            lock_key: default_lock_key(),
            aws: AwsSettings::default(),
        }
    }

    pub fn with_lock_key(mut self, lock_key: impl Into<String>) -> Self {
        self.lock_key = lock_key.into();
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.table.trim().is_empty() {
            return Err(ConfigError::MissingField("lock.table".into()));
        }
        if self.lock_key.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "lock.lock_key".into(),
                reason: "must not be empty".into(),
            });
        }
        Ok(())
    }
}

/// S3 file backend settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct S3BackendConfig {
    pub bucket: String,
    /// Key prefix every path is stored under. Empty means bucket root.
    #[serde(default)]
    pub prefix: String,
    #[serde(default = "default_page_size")]
    pub page_size: i32,
    #[serde(default, skip_serializing_if = "AwsSettings::is_empty")]
    pub aws: AwsSettings,
}

impl S3BackendConfig {
    pub fn new(bucket: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            prefix: prefix.into(),
            page_size: DEFAULT_PAGE_SIZE,
            aws: AwsSettings::default(),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bucket.trim().is_empty() {
            return Err(ConfigError::MissingField("s3.bucket".into()));
        }
        if !(1..=MAX_PAGE_SIZE).contains(&self.page_size) {
            return Err(ConfigError::InvalidValue {
                key: "s3.page_size".into(),
                reason: format!("must be between 1 and {MAX_PAGE_SIZE}"),
            });
        }
        Ok(())
    }
}

/// Top-level backend configuration.
///
/// The `aws` block holds shared defaults; a section's own `aws` block wins
/// field by field. Loaders fold the shared block into each section, so
/// consumers only ever read `lock.aws` / `s3.aws`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BackendConfig {
    /// Schema version. Missing or 0 = pre-versioned config.
    #[serde(default)]
    pub config_version: u32,
    #[serde(default, skip_serializing_if = "AwsSettings::is_empty")]
    pub aws: AwsSettings,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lock: Option<LockConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s3: Option<S3BackendConfig>,
}

impl BackendConfig {
    /// Map a flat property bag onto the typed config.
    ///
    /// Keys are dotted paths: `lock.table`, `lock.lock_key`, `s3.bucket`,
    /// `s3.prefix`, `s3.page_size`, and `aws.<field>` / `lock.aws.<field>` /
    /// `s3.aws.<field>` for `region`, `endpoint`, `profile`, `timeout_ms`.
    pub fn from_properties(props: &BTreeMap<String, String>) -> Result<Self, ConfigError> {
        let mut tree = Map::new();

        for (key, raw) in props {
            let path: Vec<&str> = key.split('.').collect();
            let value = match path.as_slice() {
                ["aws", field] | ["lock", "aws", field] | ["s3", "aws", field] => {
                    aws_property(key, field, raw)?
                }
                ["lock", "table" | "lock_key"] | ["s3", "bucket" | "prefix"] => {
                    Value::String(raw.clone())
                }
                ["s3", "page_size"] => Value::from(parse_number::<i32>(key, raw)?),
                _ => return Err(ConfigError::UnknownProperty(key.clone())),
            };
            insert_path(&mut tree, &path, value);
        }

        let config: BackendConfig = serde_json::from_value(Value::Object(tree))?;
        config.resolve()
    }

    /// Fold shared AWS settings into each section and validate.
    fn resolve(mut self) -> Result<Self, ConfigError> {
        if let Some(lock) = self.lock.as_mut() {
            lock.aws = lock.aws.or(&self.aws);
            lock.validate()?;
        }
        if let Some(s3) = self.s3.as_mut() {
            s3.aws = s3.aws.or(&self.aws);
            s3.validate()?;
        }
        self.config_version = CURRENT_VERSION;
        Ok(self)
    }
}

fn default_lock_key() -> String {
    DEFAULT_LOCK_KEY.to_string()
}

fn default_page_size() -> i32 {
    DEFAULT_PAGE_SIZE
}

fn aws_property(key: &str, field: &str, raw: &str) -> Result<Value, ConfigError> {
    match field {
        "region" | "endpoint" | "profile" => Ok(Value::String(raw.to_string())),
        "timeout_ms" => Ok(Value::from(parse_number::<u64>(key, raw)?)),
        _ => Err(ConfigError::UnknownProperty(key.to_string())),
    }
}

fn parse_number<N: std::str::FromStr>(key: &str, raw: &str) -> Result<N, ConfigError>
where
    N::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e: N::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            reason: e.to_string(),
        })
}

fn insert_path(tree: &mut Map<String, Value>, path: &[&str], value: Value) {
    match path {
        [] => {}
        [leaf] => {
            tree.insert((*leaf).to_string(), value);
        }
        [head, rest @ ..] => {
            let child = tree
                .entry((*head).to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if let Value::Object(map) = child {
                insert_path(map, rest, value);
            }
        }
    }
}

/// Load a JSON config file, migrating older shapes forward.
pub fn load_config(path: &Path) -> Result<BackendConfig, ConfigError> {
    let contents = std::fs::read_to_string(path)?;

    // Parse as raw JSON so we can run migrations before deserializing.
    let json: Value = serde_json::from_str(&contents)?;
    let on_disk_version = json
        .get("config_version")
        .and_then(|v| v.as_u64())
        .unwrap_or(0) as u32;

    let migrated = migrate(json, on_disk_version)?;
    let config: BackendConfig = serde_json::from_value(migrated)?;
    config.resolve()
}

/// Run sequential migrations from `from_version` up to [`CURRENT_VERSION`].
fn migrate(mut json: Value, from_version: u32) -> Result<Value, ConfigError> {
    if from_version > CURRENT_VERSION {
        return Err(ConfigError::UnsupportedVersion {
            found: from_version,
            supported: CURRENT_VERSION,
        });
    }

    // v0 → v1: lock.key renamed to lock.lock_key
    if from_version < 1 {
        let Some(obj) = json.as_object_mut() else {
            return Err(ConfigError::InvalidValue {
                key: "<root>".into(),
                reason: "config is not a JSON object".into(),
            });
        };
        if let Some(Value::Object(lock)) = obj.get_mut("lock")
            && let Some(key) = lock.remove("key")
        {
            lock.entry("lock_key").or_insert(key);
        }
        obj.insert("config_version".to_string(), Value::from(1));
        tracing::info!("migrated config v0 → v1 (lock.key → lock.lock_key)");
    }

    Ok(json)
}

/// Write the config as pretty JSON. Temp file + rename, so readers never
/// observe a torn write.
pub fn save_config(config: &BackendConfig, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Always write the current version, regardless of what was loaded.
    let mut stamped = config.clone();
    stamped.config_version = CURRENT_VERSION;

    let json = serde_json::to_string_pretty(&stamped)?;
    let tmp_path = path.with_extension("json.tmp");
    std::fs::write(&tmp_path, json.as_bytes())?;
    std::fs::rename(&tmp_path, path)?;

    tracing::info!(path = %path.display(), "config saved");
    Ok(())
}
