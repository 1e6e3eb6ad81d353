//! Terminal configuration
//!
//! Loaded from a TOML file. Secrets are never stored in the file itself:
//! `*_env` fields name the environment variable that holds them and are
//! resolved when the value is needed.

use crate::hdm::{CashierCredentials, DEFAULT_HDM_PORT};
use crate::thermal::{CashierInfo, CompanyInfo, CustomerInfo, Language, PaperWidth};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PosConfig {
    pub terminal: TerminalSection,
    pub hdm: HdmSection,
    pub printer: PrinterSection,
    #[serde(default)]
    pub company: CompanyInfo,
    #[serde(default)]
    pub cashier: CashierInfo,
    /// Customer printed when the order carries none
    #[serde(default)]
    pub customer: CustomerInfo,
    #[serde(default)]
    pub bridge: BridgeSection,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TerminalSection {
    /// Terminal identifier (must match [a-zA-Z0-9._-]+)
    pub id: String,
    /// Fraction added on top of the subtotal, 0 when prices include tax
    #[serde(default)]
    pub tax_rate: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HdmSection {
    pub host: String,
    #[serde(default = "default_hdm_port")]
    pub port: u16,
    /// Environment variable containing the device password
    pub password_env: String,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_response_timeout")]
    pub response_timeout_secs: u64,
    /// Login candidates, tried in order
    #[serde(default = "default_cashiers")]
    pub cashiers: Vec<CashierCredentials>,
    #[serde(default = "default_department")]
    pub department: u32,
    #[serde(default = "default_adg_code")]
    pub adg_code: String,
    #[serde(default = "default_unit")]
    pub unit: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PrinterSection {
    /// `tcp://host[:port]`, port defaults to 9100
    pub interface: String,
    #[serde(default)]
    pub paper_width: PaperWidth,
    #[serde(default)]
    pub language: Language,
    pub font_path: PathBuf,
    #[serde(default)]
    pub bold_font_path: Option<PathBuf>,
    #[serde(default = "default_threshold")]
    pub threshold: u8,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BridgeSection {
    #[serde(default = "default_bridge_port")]
    pub port: u16,
}

impl Default for BridgeSection {
    fn default() -> Self {
        Self {
            port: default_bridge_port(),
        }
    }
}

fn default_hdm_port() -> u16 {
    DEFAULT_HDM_PORT
}

fn default_connect_timeout() -> u64 {
    5
}

fn default_response_timeout() -> u64 {
    15
}

fn default_cashiers() -> Vec<CashierCredentials> {
    vec![CashierCredentials::new(3, 3), CashierCredentials::new(2, 2)]
}

fn default_department() -> u32 {
    1
}

fn default_adg_code() -> String {
    "1905".to_string()
}

fn default_unit() -> String {
    "Հատ".to_string()
}

fn default_threshold() -> u8 {
    128
}

fn default_bridge_port() -> u16 {
    7410
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),
    #[error("Invalid terminal ID format: {0}")]
    InvalidTerminalId(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl PosConfig {
    /// Load and validate configuration from a TOML file
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: PosConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_terminal_id(&self.terminal.id)?;

        if !(0.0..=1.0).contains(&self.terminal.tax_rate) {
            return Err(ConfigError::InvalidConfig(format!(
                "terminal.tax_rate {} must be between 0 and 1",
                self.terminal.tax_rate
            )));
        }
        if self.hdm.host.trim().is_empty() {
            return Err(ConfigError::InvalidConfig("hdm.host must not be empty".to_string()));
        }
        if self.hdm.cashiers.is_empty() {
            return Err(ConfigError::InvalidConfig(
                "at least one [[hdm.cashiers]] entry is required".to_string(),
            ));
        }
        if self.hdm.response_timeout_secs == 0 {
            return Err(ConfigError::InvalidConfig(
                "hdm.response_timeout_secs must be positive".to_string(),
            ));
        }
        if self.printer.interface.trim().is_empty() {
            return Err(ConfigError::InvalidConfig(
                "printer.interface must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// HDM device password from the configured environment variable
    pub fn get_hdm_password(&self) -> Result<String, ConfigError> {
        std::env::var(&self.hdm.password_env)
            .map_err(|_| ConfigError::EnvVarNotFound(self.hdm.password_env.clone()))
    }

    /// Create a test configuration for unit testing
    #[cfg(test)]
    pub fn test_config() -> Self {
        let toml_content = r#"
[terminal]
id = "test-terminal"

[hdm]
host = "127.0.0.1"
password_env = "TEST_HDM_PASSWORD"

[printer]
interface = "tcp://127.0.0.1"
font_path = "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf"

[company]
tax_id = "01234567"
name = "Test LLC"
brand_name = "Piccola"

[cashier]
name = "Anahit A."
id = "1234"
"#;
        toml::from_str(toml_content).expect("Test config should parse")
    }
}

/// Terminal IDs end up in logs and metrics labels
fn validate_terminal_id(id: &str) -> Result<(), ConfigError> {
    let valid_chars = id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-');

    if id.is_empty() || !valid_chars {
        return Err(ConfigError::InvalidTerminalId(format!(
            "Terminal ID '{id}' must match pattern [a-zA-Z0-9._-]+"
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_config() {
        let toml_content = r#"
[terminal]
id = "front-desk-1"
tax_rate = 0.0

[hdm]
host = "192.168.0.222"
port = 1025
password_env = "HDM_PASSWORD"
response_timeout_secs = 20
department = 2
adg_code = "1602"

[[hdm.cashiers]]
cashier = 3
pin = 3

[[hdm.cashiers]]
cashier = 2
pin = 2

[printer]
interface = "tcp://192.168.1.114"
paper_width = 80
language = "en"
font_path = "/opt/fonts/NotoSansArmenian-Regular.ttf"
bold_font_path = "/opt/fonts/NotoSansArmenian-Bold.ttf"
threshold = 160

[company]
tax_id = "08290572"
address = "Միասնիկյան 32/2, Դիլիջան"
phone = "+374 44 621112"
name = "Մեգի ՍՊԸ"
brand_name = "Piccola"

[cashier]
name = "Անահիտ Ա."
id = "1234"

[bridge]
port = 8088
"#;

        let config = PosConfig::from_toml(toml_content).unwrap();
        assert_eq!(config.terminal.id, "front-desk-1");
        assert_eq!(config.hdm.port, 1025);
        assert_eq!(config.hdm.response_timeout_secs, 20);
        assert_eq!(config.hdm.cashiers.len(), 2);
        assert_eq!(config.hdm.cashiers[0], CashierCredentials::new(3, 3));
        assert_eq!(config.hdm.department, 2);
        assert_eq!(config.printer.paper_width, PaperWidth::Mm80);
        assert_eq!(config.printer.language, Language::En);
        assert_eq!(config.printer.threshold, 160);
        assert_eq!(config.company.brand_name.as_deref(), Some("Piccola"));
        assert_eq!(config.cashier.id.as_deref(), Some("1234"));
        assert_eq!(config.bridge.port, 8088);
    }

    #[test]
    fn test_defaults() {
        let config = PosConfig::test_config();
        assert_eq!(config.hdm.port, DEFAULT_HDM_PORT);
        assert_eq!(config.hdm.response_timeout_secs, 15);
        assert_eq!(config.hdm.cashiers, default_cashiers());
        assert_eq!(config.hdm.adg_code, "1905");
        assert_eq!(config.hdm.unit, "Հատ");
        assert_eq!(config.printer.paper_width, PaperWidth::Mm72);
        assert_eq!(config.printer.language, Language::Hy);
        assert_eq!(config.printer.threshold, 128);
        assert_eq!(config.terminal.tax_rate, 0.0);
        assert_eq!(config.bridge.port, 7410);
        assert!(config.customer.name.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_terminal_id() {
        assert!(validate_terminal_id("front desk").is_err());
        assert!(validate_terminal_id("").is_err());
        assert!(validate_terminal_id("front-desk_1.main").is_ok());
    }

    #[test]
    fn test_unsupported_paper_width() {
        let mut config = toml::to_string(&PosConfig::test_config()).unwrap();
        config = config.replace("paper_width = 72", "paper_width = 100");
        assert!(matches!(
            PosConfig::from_toml(&config),
            Err(ConfigError::TomlParse(_))
        ));
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = PosConfig::test_config();
        config.terminal.tax_rate = 2.0;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidConfig(_))));

        let mut config = PosConfig::test_config();
        config.hdm.cashiers.clear();
        assert!(matches!(config.validate(), Err(ConfigError::InvalidConfig(_))));
    }

    #[test]
    fn test_missing_password_env() {
        let mut config = PosConfig::test_config();
        config.hdm.password_env = "POS_TEST_UNSET_PASSWORD_VAR".to_string();
        assert!(matches!(
            config.get_hdm_password(),
            Err(ConfigError::EnvVarNotFound(name)) if name == "POS_TEST_UNSET_PASSWORD_VAR"
        ));
    }
}
