//! Configuration types.
//!
//! This module contains configuration structures for the API connection,
//! refresh interval, display settings and extra screen definitions.

use std::path::{Path, PathBuf};

use chrono::format::{Item, StrftimeItems};
use serde::{Deserialize, Serialize};

use super::screen::{builtin_screens, ScreenConfig};

/// Application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,

    pub refresh: RefreshConfig,

    pub display: DisplayConfig,

    /// Extra screens, or overrides of built-in screens with the same name
    pub screens: Vec<ScreenConfig>,
}

/// Backend connection settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Backend root URL; collections live under `<base_url>/api/`
    pub base_url: String,

    /// Bearer token attached to every request
    pub token: Option<String>,

    /// File holding the bearer token (used when `token` is unset).
    /// Defaults to `<data dir>/parkmon/token`.
    pub token_file: Option<PathBuf>,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            token: None,
            token_file: None,
            timeout_secs: 10,
        }
    }
}

impl ApiConfig {
    /// Resolve the bearer token: inline value first, then the token file.
    ///
    /// A missing token file is not an error; the backend decides whether the
    /// collection needs authentication.
    pub fn resolve_token(&self) -> Option<String> {
        if let Some(token) = self.token.as_deref().map(str::trim)
            && !token.is_empty()
        {
            return Some(token.to_string());
        }

        let path = self.token_file.clone().or_else(default_token_path)?;
        match std::fs::read_to_string(&path) {
            Ok(content) => {
                let token = content.trim();
                (!token.is_empty()).then(|| token.to_string())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                tracing::warn!("Could not read token file '{}': {}", path.display(), e);
                None
            }
        }
    }
}

fn default_token_path() -> Option<PathBuf> {
    dirs::data_dir().map(|dir| dir.join("parkmon/token"))
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RefreshConfig {
    /// Poll interval in milliseconds
    pub interval_ms: u64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self { interval_ms: 5000 }
    }
}

/// Minimum allowed poll interval in milliseconds (prevents tight polling loops)
pub const MIN_REFRESH_INTERVAL_MS: u64 = 100;

/// Minimum cell width before truncation stops making sense
const MIN_CELL_WIDTH: u64 = 8;

/// Fields that require minimum-value validation.
#[derive(Clone, Copy)]
enum ValidatedField {
    RefreshInterval,
    TimeoutSecs,
    PageSize,
    MaxCellWidth,
}

impl ValidatedField {
    /// Returns the config path for error messages (e.g., "refresh.interval_ms").
    const fn as_str(self) -> &'static str {
        match self {
            Self::RefreshInterval => "refresh.interval_ms",
            Self::TimeoutSecs => "api.timeout_secs",
            Self::PageSize => "display.page_size",
            Self::MaxCellWidth => "display.max_cell_width",
        }
    }
}

/// Validate that a value meets the minimum requirement.
/// In non-strict mode, corrects invalid values to the default and adds a warning.
/// In strict mode, returns an error for invalid values.
fn validate_min(
    value: &mut u64,
    field: ValidatedField,
    min: u64,
    default: u64,
    strict: bool,
    warnings: &mut Vec<String>,
) -> Result<(), String> {
    if *value < min {
        let field_name = field.as_str();
        let msg = format!("{field_name} must be at least {min}, got {value}");
        if strict {
            return Err(msg);
        }
        warnings.push(format!("{msg} - using default ({default})"));
        *value = default;
    }
    Ok(())
}

/// Check that a chrono format string has no invalid specifiers.
/// Same strict/non-strict behavior as [`validate_min`].
fn validate_date_format(
    value: &mut String,
    default: &str,
    strict: bool,
    warnings: &mut Vec<String>,
) -> Result<(), String> {
    if StrftimeItems::new(value.as_str()).any(|item| matches!(item, Item::Error)) {
        let msg = format!("display.date_format '{value}' is not a valid chrono format");
        if strict {
            return Err(msg);
        }
        warnings.push(format!("{msg} - using default ({default})"));
        *value = default.to_string();
    }
    Ok(())
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Rows per page
    pub page_size: u64,

    /// Pad short pages with blank rows so the table keeps its height
    pub pad_pages: bool,

    /// chrono format string for timestamp cells
    pub date_format: String,

    /// Maximum characters per text cell before truncation
    pub max_cell_width: u64,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            page_size: 10,
            pad_pages: false,
            date_format: "%d/%m/%Y %H:%M".to_string(),
            max_cell_width: 30,
        }
    }
}

/// One config file as written: only the keys it sets.
///
/// Files are layered (`/etc` first, then the user file), so an unset key
/// must leave the earlier value alone instead of resetting it to a default.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigLayer {
    api: ApiLayer,
    refresh: RefreshLayer,
    display: DisplayLayer,
    screens: Vec<ScreenConfig>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ApiLayer {
    base_url: Option<String>,
    token: Option<String>,
    token_file: Option<PathBuf>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RefreshLayer {
    interval_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DisplayLayer {
    page_size: Option<u64>,
    pad_pages: Option<bool>,
    date_format: Option<String>,
    max_cell_width: Option<u64>,
}

fn set_if<T>(target: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *target = value;
    }
}

impl Config {
    /// Get the user config file path, respecting XDG_CONFIG_HOME
    ///
    /// Resolution order:
    /// 1. $XDG_CONFIG_HOME/parkmon/config.toml (if XDG_CONFIG_HOME is set)
    /// 2. $HOME/.config/parkmon/config.toml (if HOME is set)
    /// 3. dirs::config_dir()/parkmon/config.toml (fallback using dirs crate)
    /// 4. None if no config directory can be determined
    #[must_use]
    pub fn user_config_path() -> Option<PathBuf> {
        if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME")
            && !xdg_config.is_empty()
        {
            return Some(PathBuf::from(xdg_config).join("parkmon/config.toml"));
        }

        if let Some(home) = std::env::var_os("HOME") {
            return Some(PathBuf::from(home).join(".config/parkmon/config.toml"));
        }

        dirs::config_dir().map(|dir| dir.join("parkmon/config.toml"))
    }

    /// Load configuration from files and environment.
    /// Returns the config and any warnings encountered during loading.
    ///
    /// # Errors
    /// Only in strict mode (`PARKMON_STRICT_CONFIG=1`): any parse error,
    /// unreadable file, bad environment value or out-of-range setting.
    pub fn load() -> Result<(Self, Vec<String>), String> {
        let mut config = Self::default();
        let mut warnings = Vec::new();
        let strict = Self::is_strict_mode();

        config.load_config_file(Path::new("/etc/parkmon/config.toml"), strict, &mut warnings)?;

        if let Some(user_path) = Self::user_config_path() {
            config.load_config_file(&user_path, strict, &mut warnings)?;
        }

        config.apply_env_overrides(strict, &mut warnings)?;

        warnings.extend(config.validate(strict)?);

        Ok((config, warnings))
    }

    /// Check if strict config mode is enabled via PARKMON_STRICT_CONFIG
    fn is_strict_mode() -> bool {
        std::env::var("PARKMON_STRICT_CONFIG")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false)
    }

    /// Parse a config document on top of the defaults.
    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        let mut config = Self::default();
        config.merge(toml::from_str(content)?);
        Ok(config)
    }

    /// Load a config file, collecting warnings on parse errors but not on missing files.
    fn load_config_file(
        &mut self,
        path: &Path,
        strict: bool,
        warnings: &mut Vec<String>,
    ) -> Result<(), String> {
        let problem = match std::fs::read_to_string(path) {
            Ok(content) => match toml::from_str::<ConfigLayer>(&content) {
                Ok(parsed) => {
                    tracing::debug!("Loaded config from {}", path.display());
                    self.merge(parsed);
                    return Ok(());
                }
                Err(e) => format!("Config parse error in '{}': {}", path.display(), e),
            },
            // File not found is expected and not an error
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => format!("Could not read config '{}': {}", path.display(), e),
        };

        if strict {
            return Err(problem);
        }
        warnings.push(problem);
        Ok(())
    }

    fn merge(&mut self, layer: ConfigLayer) {
        set_if(&mut self.api.base_url, layer.api.base_url);
        set_if(&mut self.api.timeout_secs, layer.api.timeout_secs);
        if layer.api.token.is_some() {
            self.api.token = layer.api.token;
        }
        if layer.api.token_file.is_some() {
            self.api.token_file = layer.api.token_file;
        }

        set_if(&mut self.refresh.interval_ms, layer.refresh.interval_ms);

        set_if(&mut self.display.page_size, layer.display.page_size);
        set_if(&mut self.display.pad_pages, layer.display.pad_pages);
        set_if(&mut self.display.date_format, layer.display.date_format);
        set_if(&mut self.display.max_cell_width, layer.display.max_cell_width);

        for screen in layer.screens {
            self.screens.retain(|s| s.name != screen.name);
            self.screens.push(screen);
        }
    }

    fn apply_env_overrides(&mut self, strict: bool, warnings: &mut Vec<String>) -> Result<(), String> {
        if let Ok(val) = std::env::var("PARKMON_BASE_URL")
            && !val.is_empty()
        {
            self.api.base_url = val;
        }

        if let Ok(val) = std::env::var("PARKMON_TOKEN")
            && !val.is_empty()
        {
            self.api.token = Some(val);
        }

        if let Ok(val) = std::env::var("PARKMON_REFRESH_MS") {
            match val.parse::<u64>() {
                Ok(ms) if ms >= MIN_REFRESH_INTERVAL_MS => self.refresh.interval_ms = ms,
                Ok(_) => Self::report_env_error(
                    strict,
                    warnings,
                    "PARKMON_REFRESH_MS",
                    &val,
                    &format!("must be at least {} ms", MIN_REFRESH_INTERVAL_MS),
                )?,
                Err(_) => Self::report_env_error(
                    strict,
                    warnings,
                    "PARKMON_REFRESH_MS",
                    &val,
                    "expected a positive integer (milliseconds)",
                )?,
            }
        }

        if let Ok(val) = std::env::var("PARKMON_PAGE_SIZE") {
            match val.parse::<u64>() {
                Ok(size) if size >= 1 => self.display.page_size = size,
                _ => Self::report_env_error(
                    strict,
                    warnings,
                    "PARKMON_PAGE_SIZE",
                    &val,
                    "expected a positive integer",
                )?,
            }
        }

        Ok(())
    }

    /// Report an environment variable error; fatal in strict mode
    fn report_env_error(
        strict: bool,
        warnings: &mut Vec<String>,
        var_name: &str,
        value: &str,
        reason: &str,
    ) -> Result<(), String> {
        let msg = format!("Invalid value '{}' for {}: {}", value, var_name, reason);
        if strict {
            return Err(msg);
        }
        warnings.push(format!("{msg} - using default"));
        Ok(())
    }

    /// Validate numeric settings.
    /// Returns a list of warnings for invalid values that were corrected to defaults.
    /// If `strict` is true, returns Err instead of correcting values.
    pub fn validate(&mut self, strict: bool) -> Result<Vec<String>, String> {
        let mut warnings = Vec::new();
        let refresh_defaults = RefreshConfig::default();
        let api_defaults = ApiConfig::default();
        let display_defaults = DisplayConfig::default();

        validate_min(
            &mut self.refresh.interval_ms,
            ValidatedField::RefreshInterval,
            MIN_REFRESH_INTERVAL_MS,
            refresh_defaults.interval_ms,
            strict,
            &mut warnings,
        )?;

        validate_min(
            &mut self.api.timeout_secs,
            ValidatedField::TimeoutSecs,
            1,
            api_defaults.timeout_secs,
            strict,
            &mut warnings,
        )?;

        validate_min(
            &mut self.display.page_size,
            ValidatedField::PageSize,
            1,
            display_defaults.page_size,
            strict,
            &mut warnings,
        )?;

        validate_min(
            &mut self.display.max_cell_width,
            ValidatedField::MaxCellWidth,
            MIN_CELL_WIDTH,
            display_defaults.max_cell_width,
            strict,
            &mut warnings,
        )?;

        validate_date_format(
            &mut self.display.date_format,
            &display_defaults.date_format,
            strict,
            &mut warnings,
        )?;

        Ok(warnings)
    }

    /// Built-in screens with configured screens layered on top, by name.
    #[must_use]
    pub fn all_screens(&self) -> Vec<ScreenConfig> {
        let mut screens = builtin_screens();
        for custom in &self.screens {
            match screens.iter_mut().find(|s| s.name == custom.name) {
                Some(existing) => *existing = custom.clone(),
                None => screens.push(custom.clone()),
            }
        }
        screens
    }

    /// Look up a screen by name (case-insensitive).
    #[must_use]
    pub fn screen(&self, name: &str) -> Option<ScreenConfig> {
        self.all_screens()
            .into_iter()
            .find(|s| s.name.eq_ignore_ascii_case(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_defaults_ok() {
        let mut config = Config::default();
        let warnings = config.validate(false).unwrap();
        assert!(warnings.is_empty(), "No warnings expected for defaults");
    }

    #[test]
    fn test_validate_minimum_values() {
        let mut config = Config::default();
        config.refresh.interval_ms = MIN_REFRESH_INTERVAL_MS;
        config.display.page_size = 1;
        config.api.timeout_secs = 1;
        config.display.max_cell_width = 8;

        let warnings = config.validate(false).unwrap();
        assert!(warnings.is_empty(), "No warnings expected for minimum valid values");
    }

    #[test]
    fn test_validate_zero_interval_corrected() {
        let mut config = Config::default();
        config.refresh.interval_ms = 0;

        let warnings = config.validate(false).unwrap();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("refresh.interval_ms"));
        assert!(warnings[0].contains("at least 100"));
        assert_eq!(config.refresh.interval_ms, RefreshConfig::default().interval_ms);
    }

    #[test]
    fn test_validate_multiple_invalid_values() {
        let mut config = Config::default();
        config.refresh.interval_ms = 5;
        config.display.page_size = 0;
        config.display.max_cell_width = 2;
        config.api.timeout_secs = 0;

        let warnings = config.validate(false).unwrap();
        assert_eq!(warnings.len(), 4);
        assert_eq!(config.display.page_size, 10);
        assert_eq!(config.display.max_cell_width, 30);
        assert_eq!(config.api.timeout_secs, 10);
    }

    #[test]
    fn test_validate_strict_mode_error() {
        let mut config = Config::default();
        config.display.page_size = 0;

        let err = config.validate(true).unwrap_err();
        assert!(err.contains("display.page_size"));
    }

    #[test]
    fn test_validate_bad_date_format_corrected() {
        let mut config = Config::default();
        config.display.date_format = "%d/%m %Q".to_string();

        let warnings = config.validate(false).unwrap();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("display.date_format '%d/%m %Q'"));
        assert_eq!(config.display.date_format, "%d/%m/%Y %H:%M");

        config.display.date_format = "%Y-%m-%d %".to_string();
        let err = config.validate(true).unwrap_err();
        assert!(err.contains("not a valid chrono format"));
    }

    #[test]
    fn test_validate_accepts_custom_date_format() {
        let mut config = Config::default();
        config.display.date_format = "%H:%M:%S %d-%m".to_string();
        assert!(config.validate(true).unwrap().is_empty());
    }

    #[test]
    fn test_parse_partial_config_keeps_defaults() {
        let config = Config::from_toml_str(
            r#"
            [api]
            base_url = "https://garage.example.com"

            [display]
            page_size = 25
            "#,
        )
        .unwrap();
        assert_eq!(config.api.base_url, "https://garage.example.com");
        assert_eq!(config.api.timeout_secs, 10);
        assert_eq!(config.display.page_size, 25);
        assert_eq!(config.refresh.interval_ms, 5000);
    }

    #[test]
    fn test_merge_keeps_earlier_token() {
        let mut system = Config::from_toml_str("[api]\ntoken = \"abc\"").unwrap();
        system.merge(toml::from_str("[api]\nbase_url = \"http://x\"").unwrap());
        assert_eq!(system.api.token.as_deref(), Some("abc"));
        assert_eq!(system.api.base_url, "http://x");
    }

    #[test]
    fn test_user_file_only_overrides_keys_it_sets() {
        let mut config = Config::from_toml_str(
            r#"
            [api]
            base_url = "https://garage.example"

            [display]
            page_size = 25
            date_format = "%Y-%m-%d %H:%M"
            "#,
        )
        .unwrap();
        config.merge(toml::from_str("[refresh]\ninterval_ms = 2000\n\n[display]\npad_pages = true").unwrap());

        assert_eq!(config.api.base_url, "https://garage.example");
        assert_eq!(config.display.page_size, 25);
        assert_eq!(config.display.date_format, "%Y-%m-%d %H:%M");
        assert!(config.display.pad_pages);
        assert_eq!(config.refresh.interval_ms, 2000);
        assert_eq!(config.api.timeout_secs, 10);
    }

    #[test]
    fn test_load_config_files_in_order() {
        let dir = std::env::temp_dir().join(format!("parkmon-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let system = dir.join("system.toml");
        let user = dir.join("user.toml");
        std::fs::write(&system, "[api]\nbase_url = \"https://garage.example\"\n").unwrap();
        std::fs::write(&user, "[display]\npage_size = 5\n").unwrap();

        let mut config = Config::default();
        let mut warnings = Vec::new();
        config.load_config_file(&system, false, &mut warnings).unwrap();
        config.load_config_file(&user, false, &mut warnings).unwrap();
        config.load_config_file(&dir.join("missing.toml"), true, &mut warnings).unwrap();
        std::fs::remove_dir_all(&dir).unwrap();

        assert!(warnings.is_empty());
        assert_eq!(config.api.base_url, "https://garage.example");
        assert_eq!(config.display.page_size, 5);
    }

    #[test]
    fn test_configured_screen_overrides_builtin() {
        let config = Config::from_toml_str(
            r#"
            [[screens]]
            name = "abonos"
            collection = "abonos/activos"
            timestamp_field = "fechaCreacion"
            "#,
        )
        .unwrap();

        let abonos = config.screen("ABONOS").unwrap();
        assert_eq!(abonos.collection, "abonos/activos");
        assert_eq!(config.all_screens().len(), builtin_screens().len());
    }

    #[test]
    fn test_resolve_token_prefers_inline() {
        let api = ApiConfig {
            token: Some("  secret \n".to_string()),
            token_file: Some(PathBuf::from("/nonexistent/parkmon/token")),
            ..ApiConfig::default()
        };
        assert_eq!(api.resolve_token().as_deref(), Some("secret"));
    }

    #[test]
    fn test_resolve_token_missing_file() {
        let api = ApiConfig {
            token: None,
            token_file: Some(PathBuf::from("/nonexistent/parkmon/token")),
            ..ApiConfig::default()
        };
        assert!(api.resolve_token().is_none());
    }
}
