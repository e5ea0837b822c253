use super::types::*;
use crate::clues::{Clue, ClueCatalog};
use crate::error_handling::types::ConfigError;
use crate::session_management::session::MissionConfig;
use crate::session_management::session_manager::GatePolicy;
use clap::Parser;
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Command-line arguments. Every value overrides the matching key of the
/// configuration file.
///
/// # Command Line
/// `cluehunt --config cluehunt.toml --web-port 9000 --storage-backend file`
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "cluehunt", version, about = "Facilitator-run team clue hunt server")]
pub struct Args {
    /// Path to a TOML configuration file
    #[arg(short, long, env = "CLUEHUNT_CONFIG")]
    pub config: Option<PathBuf>,

    /// IP address the HTTP server binds to
    #[arg(long)]
    pub bind_address: Option<String>,

    /// Port of the HTTP server
    #[arg(long)]
    pub web_port: Option<u16>,

    /// Credential facilitator requests must present in `x-facilitator-token`
    #[arg(long, env = "CLUEHUNT_FACILITATOR_TOKEN", hide_env_values = true)]
    pub facilitator_token: Option<String>,

    #[arg(long, value_enum)]
    pub storage_backend: Option<StorageBackend>,

    #[arg(long)]
    pub storage_path: Option<PathBuf>,

    /// Purge sessions older than this many hours (0 disables)
    #[arg(long)]
    pub session_retention_hours: Option<u64>,
}

impl Args {
    pub fn from_args() -> Self {
        Args::parse()
    }
}

/// Application configuration structure that defines all runtime parameters.
///
/// Read from TOML; every key has a default so an empty file is valid.
///
/// # Fields Overview
///
/// - `bind_address` / `web_port`: where the HTTP surface listens
/// - `facilitator_token`: shared credential for facilitator operations; when
///   absent every facilitator request is refused
/// - `max_team_count`: upper bound for `teamCount` at session creation
/// - `draft_flush_ms`: quiet period before a draft buffer is written
/// - `session_retention_hours`: age after which sessions are purged, 0 keeps them
/// - `storage`: backend selection and its location
/// - `gates`: server-side enforcement of ordering rules
/// - `mission`: round counts and durations stamped on new sessions
/// - `clues`: optional replacement for the built-in clue catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub bind_address: String,
    pub web_port: u16,
    pub facilitator_token: Option<String>,
    pub max_team_count: u32,
    pub draft_flush_ms: u64,
    pub session_retention_hours: u64,
    pub storage: StorageConfig,
    pub gates: GateConfig,
    pub mission: MissionDefaults,
    pub clues: Vec<ClueConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            web_port: 8080,
            facilitator_token: None,
            max_team_count: 12,
            draft_flush_ms: 300,
            session_retention_hours: 0,
            storage: StorageConfig::default(),
            gates: GateConfig::default(),
            mission: MissionDefaults::default(),
            clues: Vec::new(),
        }
    }
}

impl Config {
    /// Reads the file named by `--config` (if any), applies the other
    /// arguments on top and validates the result.
    pub fn load(args: &Args) -> Result<Self, ConfigError> {
        let mut config = match &args.config {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_args(args);
        config.validate()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref())?;
        let config = Self::from_toml_str(&content)?;
        info!("Loaded configuration from {}", path.as_ref().display());
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::TomlError(e.to_string()))
    }

    pub fn apply_args(&mut self, args: &Args) {
        if let Some(ref addr) = args.bind_address {
            self.bind_address = addr.clone();
        }
        if let Some(port) = args.web_port {
            self.web_port = port;
        }
        if let Some(ref token) = args.facilitator_token {
            self.facilitator_token = Some(token.clone());
        }
        if let Some(backend) = args.storage_backend {
            self.storage.backend = backend;
        }
        if let Some(ref path) = args.storage_path {
            self.storage.path = path.clone();
        }
        if let Some(hours) = args.session_retention_hours {
            self.session_retention_hours = hours;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.bind_ip()?;
        if self.web_port == 0 {
            return Err(ConfigError::NotInRange("web_port must be between 1 and 65535".into()));
        }
        if self.max_team_count == 0 {
            return Err(ConfigError::NotInRange("max_team_count must be at least 1".into()));
        }
        self.mission_defaults()
            .validate()
            .map_err(|e| ConfigError::NotInRange(format!("[mission] {}", e)))?;
        let mut ids = HashSet::new();
        for clue in &self.clues {
            if !ids.insert(clue.id.as_str()) {
                return Err(ConfigError::NotInRange(format!("duplicate clue id '{}'", clue.id)));
            }
        }
        Ok(())
    }

    fn bind_ip(&self) -> Result<IpAddr, ConfigError> {
        self.bind_address
            .parse()
            .map_err(|_| ConfigError::BadAddress(self.bind_address.clone()))
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        Ok(SocketAddr::new(self.bind_ip()?, self.web_port))
    }

    pub fn gate_policy(&self) -> GatePolicy {
        GatePolicy {
            enforce: self.gates.enforce,
            submit_opens_with_phase: self.gates.submit_opens_with_phase,
        }
    }

    pub fn mission_defaults(&self) -> MissionConfig {
        self.mission.into()
    }

    pub fn clue_catalog(&self) -> ClueCatalog {
        ClueCatalog::new(self.clues.iter().cloned().map(Clue::from).collect())
    }

    pub fn draft_flush_delay(&self) -> Duration {
        Duration::from_millis(self.draft_flush_ms)
    }

    /// `None` when sessions are kept forever.
    pub fn retention(&self) -> Option<chrono::Duration> {
        if self.session_retention_hours == 0 {
            return None;
        }
        Some(chrono::Duration::hours(self.session_retention_hours as i64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn empty_file_yields_defaults() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config, Config::default());
        assert!(config.validate().is_ok());
        assert_eq!(config.socket_addr().unwrap().to_string(), "127.0.0.1:8080");
        assert_eq!(config.retention(), None);
        assert_eq!(config.clue_catalog(), ClueCatalog::default());
    }

    #[test]
    fn full_file_is_parsed() {
        let toml = r#"
bind_address = "0.0.0.0"
web_port = 9000
facilitator_token = "classroom"
max_team_count = 6
session_retention_hours = 48

[storage]
backend = "database"
path = "/var/lib/cluehunt/cluehunt.sqlite3"

[gates]
enforce = false

[mission]
internal_rounds = 1
cross_rounds = 2

[[clues]]
id = "map"
label = "Old map"
image_url = "/img/map.png"
"#;
        let config = Config::from_toml_str(toml).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.web_port, 9000);
        assert_eq!(config.facilitator_token.as_deref(), Some("classroom"));
        assert_eq!(config.storage.backend, StorageBackend::Database);
        assert!(!config.gate_policy().enforce);
        assert!(config.gate_policy().submit_opens_with_phase);
        let mission = config.mission_defaults();
        assert_eq!(
            (mission.internal_rounds, mission.cross_rounds, mission.round_duration),
            (1, 2, 5)
        );
        assert_eq!(config.clue_catalog().len(), 1);
        assert_eq!(config.retention(), Some(chrono::Duration::hours(48)));
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(matches!(
            Config::from_toml_str("web_port = \"eighty\""),
            Err(ConfigError::TomlError(_))
        ));
        assert!(matches!(
            Config::from_toml_str("unknown_key = 1"),
            Err(ConfigError::TomlError(_))
        ));

        let bad_addr = Config { bind_address: "localhost:80".into(), ..Config::default() };
        assert!(matches!(bad_addr.validate(), Err(ConfigError::BadAddress(_))));
        let bad_port = Config { web_port: 0, ..Config::default() };
        assert!(matches!(bad_port.validate(), Err(ConfigError::NotInRange(_))));
        let mut bad_mission = Config::default();
        bad_mission.mission.submit_duration = 0;
        assert!(bad_mission.validate().is_err());
        let dup = ClueConfig { id: "a".into(), label: "A".into(), image_url: "/a.png".into() };
        let dup_clues = Config { clues: vec![dup.clone(), dup], ..Config::default() };
        assert!(dup_clues.validate().is_err());
    }

    #[test]
    #[serial]
    fn args_override_file_values() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "web_port = 9000\n[storage]\nbackend = \"file\"").unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let args = Args::try_parse_from([
            "cluehunt",
            "--config",
            &path,
            "--web-port",
            "9100",
            "--facilitator-token",
            "t0ken",
            "--storage-path",
            "/tmp/cluehunt",
        ])
        .unwrap_or_else(|e| panic!("{}", e));
        let config = Config::load(&args).unwrap();
        assert_eq!(config.web_port, 9100);
        assert_eq!(config.storage.backend, StorageBackend::File);
        assert_eq!(config.storage.path, PathBuf::from("/tmp/cluehunt"));
        assert_eq!(config.facilitator_token.as_deref(), Some("t0ken"));
    }

    #[test]
    #[serial]
    fn facilitator_token_is_read_from_environment() {
        std::env::set_var("CLUEHUNT_FACILITATOR_TOKEN", "from-env");
        let args = Args::try_parse_from(["cluehunt"]);
        std::env::remove_var("CLUEHUNT_FACILITATOR_TOKEN");
        let config = Config::load(&args.unwrap()).unwrap();
        assert_eq!(config.facilitator_token.as_deref(), Some("from-env"));
    }
}
