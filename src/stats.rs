use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};

/// Informations sur un satellite GPS
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SatelliteInfo {
    /// Numéro PRN du satellite (1-32 GPS, 33+ pour autres constellations)
    pub prn: u8,

    /// Élévation en degrés (0-90, 0=horizon, 90=zénith)
    pub elevation: u8,

    /// Azimut en degrés (0-359, 0=Nord, 90=Est, 180=Sud, 270=Ouest)
    pub azimuth: u16,

    /// Signal-to-Noise Ratio en dB-Hz (0-99, 0=pas de signal)
    pub snr: u8,

    /// Constellation (GPS, GLONASS, Galileo, BeiDou)
    pub constellation: String,
}

/// Statistiques partagées entre le serveur SNTP, le client SNTP, le
/// lecteur GPS et l'interface web
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerStats {
    pub gps: GpsStats,
    pub sntp_client: SntpClientStatsView,
    pub sntp_server: SntpServerStatsView,
    pub clock: ClockInfo,
    pub satellites: Vec<SatelliteInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GpsStats {
    pub connected: bool,
    pub satellites: u8,
    pub signal_quality: u8,
    pub last_sync_secs: Option<u64>,
    pub nmea_bytes: u64,
    pub pps_active: bool,
    pub pps_count: u64,
    pub last_rx_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SntpClientStatsView {
    pub polls_sent: u64,
    pub replies_received: u64,
    pub replies_rejected: u64,
    pub last_offset_micros: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SntpServerStatsView {
    pub requests_served: u64,
    pub requests_rejected: u64,
    pub requests_rate_limited: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClockInfo {
    pub stratum: u8,
    pub reference_id: String,
    pub precision: i8,
    pub current_utc_micros: i64,
}

/// Gestionnaire de statistiques partagé via Arc<RwLock>
pub struct StatsManager {
    stats: Arc<RwLock<ServerStats>>,
}

impl StatsManager {
    pub fn new() -> Self {
        let stats = ServerStats {
            gps: GpsStats {
                connected: false,
                satellites: 0,
                signal_quality: 0,
                last_sync_secs: None,
                nmea_bytes: 0,
                pps_active: false,
                pps_count: 0,
                last_rx_ms: 0,
            },
            sntp_client: SntpClientStatsView::default(),
            sntp_server: SntpServerStatsView::default(),
            clock: ClockInfo {
                stratum: 16,
                reference_id: "INIT".to_string(),
                precision: -6,
                current_utc_micros: 0,
            },
            satellites: Vec::new(),
        };

        StatsManager {
            stats: Arc::new(RwLock::new(stats)),
        }
    }

    pub fn get(&self) -> ServerStats {
        self.stats.read().unwrap().clone()
    }

    pub fn update_gps<F>(&self, f: F)
    where
        F: FnOnce(&mut GpsStats),
    {
        if let Ok(mut stats) = self.stats.write() {
            f(&mut stats.gps);
        }
    }

    pub fn update_sntp_client<F>(&self, f: F)
    where
        F: FnOnce(&mut SntpClientStatsView),
    {
        if let Ok(mut stats) = self.stats.write() {
            f(&mut stats.sntp_client);
        }
    }

    pub fn update_sntp_server<F>(&self, f: F)
    where
        F: FnOnce(&mut SntpServerStatsView),
    {
        if let Ok(mut stats) = self.stats.write() {
            f(&mut stats.sntp_server);
        }
    }

    pub fn update_clock<F>(&self, f: F)
    where
        F: FnOnce(&mut ClockInfo),
    {
        if let Ok(mut stats) = self.stats.write() {
            f(&mut stats.clock);
        }
    }

    /// Fusionne une nouvelle trame GPGSV avec la liste de satellites
    /// déjà connue : remplace l'entrée existante pour un même PRN,
    /// sinon l'ajoute.
    pub fn update_satellites_merge(&self, incoming: Vec<SatelliteInfo>) {
        if let Ok(mut stats) = self.stats.write() {
            for sat in incoming {
                if let Some(existing) = stats.satellites.iter_mut().find(|s| s.prn == sat.prn) {
                    *existing = sat;
                } else {
                    stats.satellites.push(sat);
                }
            }
        }
    }
}

impl Default for StatsManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_gps_mutates_shared_state() {
        let manager = Arc::new(StatsManager::new());
        manager.update_gps(|gps| gps.connected = true);
        assert!(manager.get().gps.connected);
    }

    #[test]
    fn test_satellite_merge_replaces_existing_prn() {
        let manager = StatsManager::new();
        manager.update_satellites_merge(vec![SatelliteInfo {
            prn: 3,
            elevation: 10,
            azimuth: 20,
            snr: 30,
            constellation: "GPS".to_string(),
        }]);
        manager.update_satellites_merge(vec![SatelliteInfo {
            prn: 3,
            elevation: 11,
            azimuth: 21,
            snr: 31,
            constellation: "GPS".to_string(),
        }]);
        let stats = manager.get();
        assert_eq!(stats.satellites.len(), 1);
        assert_eq!(stats.satellites[0].elevation, 11);
    }
}
