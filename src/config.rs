use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Configuration racine de l'appliance
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    /// Configuration du module GPS/GNSS et de la détection PPS
    pub gps: GpsConfig,

    /// Configuration du client SNTP (upstream, utilisé en secours ou
    /// en complément du GPS)
    #[serde(default)]
    pub sntp_client: SntpClientSettings,

    /// Configuration du serveur SNTP exposé aux clients du réseau
    pub sntp_server: SntpServerSettings,

    /// Configuration de sécurité (rate limiting, listes IP)
    pub security: SecurityConfig,

    /// Configuration des logs
    pub logging: LoggingConfig,

    /// Configuration du serveur web de supervision
    #[serde(default)]
    pub webserver: WebServerConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct GpsConfig {
    /// Activer le module GPS (si false, le GPS ne sera pas initialisé)
    #[serde(default = "default_gps_enabled")]
    pub enabled: bool,

    /// Port série du module GPS (ex: "COM9" sur Windows, "/dev/ttyUSB0" sur Linux)
    pub serial_port: String,

    /// Baud rate (115200 pour la majorité des modules u-blox modernes)
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    /// Timeout de synchronisation GPS en secondes
    #[serde(default = "default_gps_timeout")]
    pub sync_timeout: u64,

    /// Nombre minimum de satellites requis
    #[serde(default = "default_min_satellites")]
    pub min_satellites: u8,

    /// Activer la détection PPS via la ligne CTS du port série
    #[serde(default = "default_pps_enabled")]
    pub pps_enabled: bool,

    /// Age maximal (en microsecondes) d'une trame de temps GPS pour
    /// qu'un front PPS soit encore considéré comme fiable
    #[serde(default = "default_fix_staleness_limit_micros")]
    pub fix_staleness_limit_micros: u64,

    /// Polarité du front PPS à surveiller sur la ligne CTS
    #[serde(default)]
    pub pps_edge: PpsEdge,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PpsEdge {
    #[default]
    Rising,
    Falling,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SntpClientSettings {
    /// Activer le polling d'un serveur SNTP amont
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Adresse "host:port" du serveur SNTP/NTP amont
    #[serde(default = "default_upstream_server")]
    pub server_addr: String,

    /// Intervalle de polling en secondes
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Délai d'attente d'une réponse en secondes
    #[serde(default = "default_reply_timeout_secs")]
    pub reply_timeout_secs: u64,

    /// Version NTP annoncée dans les requêtes sortantes
    #[serde(default = "default_ntp_version")]
    pub ntp_version: u8,

    /// Version minimale acceptée dans une réponse
    #[serde(default = "default_ntp_min_version_ok")]
    pub ntp_min_version_ok: u8,
}

impl Default for SntpClientSettings {
    fn default() -> Self {
        SntpClientSettings {
            enabled: true,
            server_addr: default_upstream_server(),
            poll_interval_secs: default_poll_interval_secs(),
            reply_timeout_secs: default_reply_timeout_secs(),
            ntp_version: default_ntp_version(),
            ntp_min_version_ok: default_ntp_min_version_ok(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SntpServerSettings {
    /// Adresse d'écoute (ex: "0.0.0.0:123")
    pub bind_address: String,

    /// Nombre maximum de requêtes par seconde par IP
    #[serde(default = "default_max_requests_per_second")]
    pub max_requests_per_second: u32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SecurityConfig {
    /// Activer le rate limiting
    #[serde(default = "default_true")]
    pub enable_rate_limiting: bool,

    /// Liste blanche d'adresses IP (vide = toutes autorisées)
    #[serde(default)]
    pub ip_whitelist: Vec<String>,

    /// Liste noire d'adresses IP
    #[serde(default)]
    pub ip_blacklist: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// Niveau de log: "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Fichier de log (vide = stdout uniquement)
    pub log_file: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct WebServerConfig {
    /// Port du serveur web (interface de monitoring)
    #[serde(default = "default_web_port")]
    pub port: u16,

    /// Adresse d'écoute du serveur web
    #[serde(default = "default_web_bind_address")]
    pub bind_address: String,
}

fn default_gps_enabled() -> bool {
    true
}
fn default_baud_rate() -> u32 {
    115_200
}
fn default_gps_timeout() -> u64 {
    30
}
fn default_min_satellites() -> u8 {
    4
}
fn default_pps_enabled() -> bool {
    true
}
fn default_fix_staleness_limit_micros() -> u64 {
    crate::discipline::DEFAULT_FIX_STALENESS_LIMIT_MICROS
}
fn default_upstream_server() -> String {
    "pool.ntp.org:123".to_string()
}
fn default_poll_interval_secs() -> u64 {
    120
}
fn default_reply_timeout_secs() -> u64 {
    5
}
fn default_ntp_version() -> u8 {
    4
}
fn default_ntp_min_version_ok() -> u8 {
    3
}
fn default_true() -> bool {
    true
}
fn default_max_requests_per_second() -> u32 {
    100
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_web_port() -> u16 {
    8080
}
fn default_web_bind_address() -> String {
    "0.0.0.0".to_string()
}

impl Default for Config {
    fn default() -> Self {
        #[cfg(target_os = "windows")]
        let default_port = "COM9".to_string();
        #[cfg(not(target_os = "windows"))]
        let default_port = "/dev/ttyUSB0".to_string();

        Config {
            gps: GpsConfig {
                enabled: true,
                serial_port: default_port,
                baud_rate: default_baud_rate(),
                sync_timeout: default_gps_timeout(),
                min_satellites: default_min_satellites(),
                pps_enabled: true,
                fix_staleness_limit_micros: default_fix_staleness_limit_micros(),
                pps_edge: PpsEdge::Rising,
            },
            sntp_client: SntpClientSettings::default(),
            sntp_server: SntpServerSettings {
                bind_address: "0.0.0.0:123".to_string(),
                max_requests_per_second: default_max_requests_per_second(),
            },
            security: SecurityConfig {
                enable_rate_limiting: true,
                ip_whitelist: vec![],
                ip_blacklist: vec![],
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                log_file: None,
            },
            webserver: WebServerConfig::default(),
        }
    }
}

impl Default for WebServerConfig {
    fn default() -> Self {
        WebServerConfig {
            port: default_web_port(),
            bind_address: default_web_bind_address(),
        }
    }
}

impl Config {
    /// Charge la configuration depuis un fichier TOML
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref()).context("Failed to read config file")?;
        let config: Config = toml::from_str(&content).context("Failed to parse config file")?;
        config.validate()?;
        Ok(config)
    }

    /// Sauvegarde la configuration dans un fichier TOML
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path.as_ref(), content).context("Failed to write config file")?;
        Ok(())
    }

    /// Valide la configuration
    fn validate(&self) -> Result<()> {
        if self.gps.min_satellites == 0 {
            anyhow::bail!("Invalid min_satellites: must be at least 1");
        }
        if self.sntp_client.poll_interval_secs == 0 {
            anyhow::bail!("Invalid sntp_client.poll_interval_secs: must be nonzero");
        }
        Ok(())
    }

    /// Crée un fichier de configuration exemple
    pub fn create_example_config<P: AsRef<Path>>(path: P) -> Result<()> {
        Config::default().to_file(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.sntp_server.bind_address, "0.0.0.0:123");
        assert_eq!(config.gps.baud_rate, 115_200);
    }

    #[test]
    fn test_sntp_client_defaults() {
        let config = Config::default();
        assert_eq!(config.sntp_client.poll_interval_secs, 120);
        assert_eq!(config.sntp_client.ntp_version, 4);
        assert_eq!(config.sntp_client.ntp_min_version_ok, 3);
        assert_eq!(config.gps.pps_edge, PpsEdge::Rising);
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        config.gps.min_satellites = 0;
        assert!(config.validate().is_err());

        config.gps.min_satellites = 4;
        config.sntp_client.poll_interval_secs = 0;
        assert!(config.validate().is_err());
    }
}
