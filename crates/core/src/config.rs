use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::env::{load_dotenv, resolve_json_env};
use crate::error::ConfigError;
use crate::meeting::OrganizationRule;

/// Maps internal output field names to destination column names.
pub type FieldMapping = BTreeMap<String, String>;

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Named webhook targets (`production`, `staging`, ...).
    #[serde(default)]
    pub environments: HashMap<String, EnvironmentConfig>,
    #[serde(default)]
    pub webhook: WebhookConfig,
    #[serde(default)]
    pub template_validation: TemplateValidationConfig,
    #[serde(default)]
    pub notifications: NotificationsConfig,
    #[serde(default)]
    pub outputs: OutputsConfig,
    #[serde(default)]
    pub monitoring: MonitoringConfig,
    #[serde(default)]
    pub organizations: Vec<OrganizationRule>,
    #[serde(default = "default_organization")]
    pub default_organization: String,
    #[serde(default)]
    pub source: SourceConfig,
}

fn default_organization() -> String {
    "Unknown".to_string()
}

impl Config {
    /// Load, resolve `${VAR}` references, and validate a JSON config file.
    ///
    /// A `.env` file in the working directory is applied first.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        load_dotenv();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    /// Parse and validate config from a JSON string.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let mut value: serde_json::Value = serde_json::from_str(raw)?;
        resolve_json_env(&mut value)?;
        let config: Config = serde_json::from_value(value)?;
        config.validate()?;
        Ok(config)
    }

    /// The environment webhooks are delivered to.
    pub fn active_environment(&self) -> Result<&EnvironmentConfig, ConfigError> {
        self.environments
            .get(&self.webhook.active_environment)
            .ok_or_else(|| {
                ConfigError::Invalid(format!(
                    "active environment '{}' is not defined in environments",
                    self.webhook.active_environment
                ))
            })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let env = self.active_environment()?;
        if env.url.trim().is_empty() {
            return Err(ConfigError::Invalid(format!(
                "environments.{}.url must not be empty",
                self.webhook.active_environment
            )));
        }
        if self.webhook.max_retries == 0 {
            return Err(ConfigError::Invalid(
                "webhook.maxRetries must be at least 1".to_string(),
            ));
        }
        if self.monitoring.lookback_days == 0 {
            return Err(ConfigError::Invalid(
                "monitoring.lookbackDays must be at least 1".to_string(),
            ));
        }
        if self.monitoring.max_meetings_per_run == 0 {
            return Err(ConfigError::Invalid(
                "monitoring.maxMeetingsPerRun must be at least 1".to_string(),
            ));
        }
        if self.monitoring.state_file_path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid(
                "monitoring.stateFilePath must not be empty".to_string(),
            ));
        }
        for (idx, org) in self.organizations.iter().enumerate() {
            if org.name.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "organizations[{idx}].name must not be empty"
                )));
            }
        }
        self.notifications.validate()?;
        self.outputs.validate()?;
        Ok(())
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded:");
        tracing::info!(
            "  webhook:       env={}, retries={}, strategy={:?}, delay={}ms, signed={}",
            self.webhook.active_environment,
            self.webhook.max_retries,
            self.webhook.retry_strategy,
            self.webhook.retry_delay,
            !self.webhook.secret.is_empty()
        );
        tracing::info!(
            "  monitoring:    lookback={}d, max_per_run={}, state={}",
            self.monitoring.lookback_days,
            self.monitoring.max_meetings_per_run,
            self.monitoring.state_file_path.display()
        );
        tracing::info!(
            "  notifications: {}",
            self.notifications.enabled_channels().join(", ")
        );
        tracing::info!("  outputs:       {}", self.outputs.enabled_sinks().join(", "));
        tracing::info!(
            "  organizations: {} rules, default={}",
            self.organizations.len(),
            self.default_organization
        );
    }
}

// ── Webhook ───────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentConfig {
    pub url: String,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetryStrategy {
    Fixed,
    Exponential,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookConfig {
    #[serde(default = "default_active_environment")]
    pub active_environment: String,
    /// Shared HMAC secret. Empty disables request signing.
    #[serde(default)]
    pub secret: String,
    /// Upper bound on delivery attempts, including the first.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_strategy")]
    pub retry_strategy: RetryStrategy,
    /// Base retry delay in milliseconds.
    #[serde(default = "default_retry_delay")]
    pub retry_delay: u64,
    #[serde(default)]
    pub include_transcript: bool,
    #[serde(default = "default_webhook_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_signature_header")]
    pub signature_header: String,
}

fn default_active_environment() -> String {
    "production".to_string()
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_strategy() -> RetryStrategy {
    RetryStrategy::Exponential
}

fn default_retry_delay() -> u64 {
    1000
}

fn default_webhook_timeout_ms() -> u64 {
    30_000
}

fn default_signature_header() -> String {
    "X-Webhook-Signature".to_string()
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            active_environment: default_active_environment(),
            secret: String::new(),
            max_retries: default_max_retries(),
            retry_strategy: default_retry_strategy(),
            retry_delay: default_retry_delay(),
            include_transcript: false,
            timeout_ms: default_webhook_timeout_ms(),
            signature_header: default_signature_header(),
        }
    }
}

// ── Template validation ───────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateMatchMode {
    #[default]
    Any,
    All,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateValidationConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub mode: TemplateMatchMode,
    #[serde(default)]
    pub required_template_ids: Vec<String>,
    #[serde(default)]
    pub template_names: Vec<String>,
}

// ── Notifications ─────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationsConfig {
    #[serde(default)]
    pub slack: SlackConfig,
    #[serde(default)]
    pub discord: DiscordConfig,
    #[serde(default)]
    pub email: EmailConfig,
    #[serde(default)]
    pub desktop: DesktopConfig,
    /// Per-channel send timeout.
    #[serde(default = "default_notification_timeout_ms")]
    pub timeout_ms: u64,
    /// Subject/body overrides keyed by event kind
    /// (`delivered`, `skipped`, `failed`, `streakAlert`, `ledgerRecovered`).
    #[serde(default)]
    pub templates: HashMap<String, MessageTemplate>,
}

fn default_notification_timeout_ms() -> u64 {
    10_000
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            slack: SlackConfig::default(),
            discord: DiscordConfig::default(),
            email: EmailConfig::default(),
            desktop: DesktopConfig::default(),
            timeout_ms: default_notification_timeout_ms(),
            templates: HashMap::new(),
        }
    }
}

impl NotificationsConfig {
    pub fn enabled_channels(&self) -> Vec<&'static str> {
        let mut out = Vec::new();
        if self.slack.enabled {
            out.push("slack");
        }
        if self.discord.enabled {
            out.push("discord");
        }
        if self.email.enabled {
            out.push("email");
        }
        if self.desktop.enabled {
            out.push("desktop");
        }
        out
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.slack.enabled && self.slack.webhook_url.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "notifications.slack.webhookUrl is required when slack is enabled".to_string(),
            ));
        }
        if self.discord.enabled && self.discord.webhook_url.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "notifications.discord.webhookUrl is required when discord is enabled".to_string(),
            ));
        }
        if self.email.enabled {
            if self.email.smtp_host.trim().is_empty() {
                return Err(ConfigError::Invalid(
                    "notifications.email.smtpHost is required when email is enabled".to_string(),
                ));
            }
            if self.email.to.is_empty() {
                return Err(ConfigError::Invalid(
                    "notifications.email.to needs at least one recipient".to_string(),
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageTemplate {
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlackConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub webhook_url: String,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscordConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub webhook_url: String,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub smtp_host: String,
    #[serde(default)]
    pub smtp_port: Option<u16>,
    #[serde(default)]
    pub tls: Option<bool>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub from: String,
    #[serde(default)]
    pub to: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DesktopConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub sound: bool,
}

// ── Outputs ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputsConfig {
    #[serde(default)]
    pub webhook: WebhookOutputConfig,
    #[serde(default)]
    pub airtable: AirtableConfig,
    #[serde(default)]
    pub google_sheets: GoogleSheetsConfig,
    #[serde(default)]
    pub json_file: JsonFileConfig,
    /// Per-sink publish timeout.
    #[serde(default = "default_output_timeout_ms")]
    pub timeout_ms: u64,
    /// Also publish meetings whose webhook delivery failed.
    #[serde(default)]
    pub publish_failures: bool,
}

fn default_output_timeout_ms() -> u64 {
    15_000
}

impl Default for OutputsConfig {
    fn default() -> Self {
        Self {
            webhook: WebhookOutputConfig::default(),
            airtable: AirtableConfig::default(),
            google_sheets: GoogleSheetsConfig::default(),
            json_file: JsonFileConfig::default(),
            timeout_ms: default_output_timeout_ms(),
            publish_failures: false,
        }
    }
}

impl OutputsConfig {
    pub fn enabled_sinks(&self) -> Vec<&'static str> {
        let mut out = Vec::new();
        if self.webhook.enabled {
            out.push("webhook");
        }
        if self.airtable.enabled {
            out.push("airtable");
        }
        if self.google_sheets.enabled {
            out.push("googleSheets");
        }
        if self.json_file.enabled {
            out.push("jsonFile");
        }
        out
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.webhook.enabled && self.webhook.url.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "outputs.webhook.url is required when enabled".to_string(),
            ));
        }
        if self.airtable.enabled
            && (self.airtable.api_key.is_empty()
                || self.airtable.base_id.is_empty()
                || self.airtable.table_name.is_empty())
        {
            return Err(ConfigError::Invalid(
                "outputs.airtable needs apiKey, baseId and tableName".to_string(),
            ));
        }
        if self.google_sheets.enabled
            && (self.google_sheets.spreadsheet_id.is_empty()
                || self.google_sheets.access_token.is_empty())
        {
            return Err(ConfigError::Invalid(
                "outputs.googleSheets needs spreadsheetId and accessToken".to_string(),
            ));
        }
        if self.json_file.enabled && self.json_file.path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid(
                "outputs.jsonFile.path is required when enabled".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookOutputConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub field_mapping: FieldMapping,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AirtableConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub base_id: String,
    #[serde(default)]
    pub table_name: String,
    #[serde(default)]
    pub field_mapping: FieldMapping,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleSheetsConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub spreadsheet_id: String,
    #[serde(default = "default_sheet_range")]
    pub range: String,
    #[serde(default)]
    pub access_token: String,
    /// Internal field names, in column order. Empty means the default set.
    #[serde(default)]
    pub columns: Vec<String>,
}

fn default_sheet_range() -> String {
    "Sheet1!A1".to_string()
}

impl Default for GoogleSheetsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            spreadsheet_id: String::new(),
            range: default_sheet_range(),
            access_token: String::new(),
            columns: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JsonFileConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub path: PathBuf,
    #[serde(default)]
    pub field_mapping: FieldMapping,
}

// ── Monitoring ────────────────────────────────────────────────

/// What identifies a skip notification for de-duplication.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SkipNotificationKey {
    /// Notify again when the same meeting is skipped for a different reason.
    #[default]
    MeetingAndReason,
    /// Notify at most once per meeting.
    Meeting,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitoringConfig {
    #[serde(default = "default_lookback_days")]
    pub lookback_days: u32,
    #[serde(default = "default_max_meetings_per_run")]
    pub max_meetings_per_run: usize,
    #[serde(default = "default_state_file_path")]
    pub state_file_path: PathBuf,
    #[serde(default = "default_poll_interval_minutes")]
    pub poll_interval_minutes: u32,
    /// Consecutive failures that trigger a streak alert.
    #[serde(default = "default_failure_alert_threshold")]
    pub failure_alert_threshold: u32,
    #[serde(default)]
    pub skip_notification_key: SkipNotificationKey,
}

fn default_lookback_days() -> u32 {
    3
}

fn default_max_meetings_per_run() -> usize {
    50
}

fn default_state_file_path() -> PathBuf {
    PathBuf::from("state/monitor-state.json")
}

fn default_poll_interval_minutes() -> u32 {
    10
}

fn default_failure_alert_threshold() -> u32 {
    3
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            lookback_days: default_lookback_days(),
            max_meetings_per_run: default_max_meetings_per_run(),
            state_file_path: default_state_file_path(),
            poll_interval_minutes: default_poll_interval_minutes(),
            failure_alert_threshold: default_failure_alert_threshold(),
            skip_notification_key: SkipNotificationKey::default(),
        }
    }
}

// ── Upstream source ───────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceConfig {
    /// Local meeting-notes cache file. Defaults to the notes app's location.
    #[serde(default)]
    pub cache_path: Option<PathBuf>,
}
