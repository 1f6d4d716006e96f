/*!
Module de lecture GPS avec reconnexion automatique et support PPS via CTS

Ce module gère la connexion au module GPS/GNSS, alimente le
reconnaisseur NMEA octet par octet, détecte le signal PPS via la ligne
CTS du port série, et discipline l'horloge partagée à chaque front PPS
validé par une trame de temps GPS récente.

Architecture robuste :
- Thread séparé pour ne jamais bloquer le serveur SNTP
- Reconnexion automatique en cas de déconnexion
- Gestion d'erreurs complète sans panic
- Logging détaillé des événements
*/

use crate::config::{GpsConfig, PpsEdge};
use crate::discipline::DisciplineEngine;
use crate::monotonic::MonotonicClock;
use crate::nmea::NmeaParser;
use crate::stats::{SatelliteInfo, StatsManager};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Gestionnaire de lecture GPS
pub struct GpsReader {
    config: GpsConfig,
    parser: Arc<RwLock<NmeaParser>>,
    discipline: Arc<DisciplineEngine>,
    monotonic: Arc<dyn MonotonicClock>,
    stats: Arc<StatsManager>,
    running: Arc<AtomicBool>,
}

impl GpsReader {
    pub fn new(
        config: GpsConfig,
        parser: Arc<RwLock<NmeaParser>>,
        discipline: Arc<DisciplineEngine>,
        monotonic: Arc<dyn MonotonicClock>,
        stats: Arc<StatsManager>,
    ) -> Self {
        GpsReader {
            config,
            parser,
            discipline,
            monotonic,
            stats,
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Démarre le thread de lecture GPS. Le thread tourne
    /// indéfiniment avec reconnexion automatique en cas d'erreur.
    pub fn start(self) -> std::thread::JoinHandle<()> {
        info!("Starting GPS reader thread");
        info!("  Port: {}", self.config.serial_port);
        info!("  Baud rate: {}", self.config.baud_rate);
        info!("  PPS via CTS: {}", self.config.pps_enabled);
        info!("  Min satellites: {}", self.config.min_satellites);

        std::thread::spawn(move || {
            let mut reconnect_delay = Duration::from_secs(5);
            let max_reconnect_delay = Duration::from_secs(60);

            while self.running.load(Ordering::Relaxed) {
                match self.run_reader() {
                    Ok(_) => {
                        info!("GPS reader stopped normally");
                        break;
                    }
                    Err(e) => {
                        error!("GPS reader error: {:#}", e);
                        error!("Reconnecting in {:?}...", reconnect_delay);
                        std::thread::sleep(reconnect_delay);
                        reconnect_delay = std::cmp::min(reconnect_delay * 2, max_reconnect_delay);
                    }
                }
            }

            info!("GPS reader thread terminated");
        })
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::Relaxed);
    }

    fn run_reader(&self) -> anyhow::Result<()> {
        info!("Opening GPS serial port: {}", self.config.serial_port);

        let mut port = serialport::new(&self.config.serial_port, self.config.baud_rate)
            .timeout(Duration::from_millis(100))
            .open()?;

        port.write_request_to_send(true)?;
        port.write_data_terminal_ready(true)?;
        port.clear(serialport::ClearBuffer::All)?;

        info!("GPS serial port opened successfully");

        self.stats.update_gps(|gps| gps.connected = true);

        let mut read_buf = [0u8; 512];
        let mut last_cts = port.read_clear_to_send()?;
        let mut pps_count: u64 = 0;
        let mut nmea_bytes: u64 = 0;
        let mut last_stats_log = std::time::Instant::now();

        while self.running.load(Ordering::Relaxed) {
            match port.read(&mut read_buf) {
                Ok(n) if n > 0 => {
                    let now_micros = self.monotonic.now_micros();
                    self.stats.update_gps(|gps| gps.last_rx_ms = 0);

                    let mut parser = match self.parser.write() {
                        Ok(g) => g,
                        Err(_) => continue,
                    };
                    for &byte in &read_buf[..n] {
                        nmea_bytes += 1;
                        parser.feed(byte, now_micros);
                    }
                    let location = parser.get_location(now_micros);
                    let sat_count = parser.get_sat_count();
                    drop(parser);

                    self.stats.update_gps(|gps| {
                        gps.nmea_bytes = nmea_bytes;
                        if location.is_some() {
                            gps.satellites = sat_count;
                            gps.signal_quality = sat_count.min(10);
                        }
                    });
                    let _ = self.refresh_gsv(&read_buf[..n]);
                }
                Ok(_) => {}
                Err(ref e) if e.kind() == std::io::ErrorKind::TimedOut => {}
                Err(e) => return Err(e.into()),
            }

            if self.config.pps_enabled {
                match port.read_clear_to_send() {
                    Ok(cts) if cts != last_cts => {
                        last_cts = cts;
                        let edge_fired = match self.config.pps_edge {
                            PpsEdge::Rising => cts,
                            PpsEdge::Falling => !cts,
                        };
                        if edge_fired {
                            pps_count += 1;
                            self.handle_pps_edge(pps_count);
                        }
                    }
                    Ok(_) => {}
                    Err(e) => warn!("Failed to read CTS status: {}", e),
                }
            }

            if last_stats_log.elapsed() > Duration::from_secs(60) {
                info!(
                    "GPS stats: {} bytes parsed, {} PPS pulses processed",
                    nmea_bytes, pps_count
                );
                last_stats_log = std::time::Instant::now();
            }
        }

        self.stats.update_gps(|gps| {
            gps.connected = false;
            gps.pps_active = false;
        });

        Ok(())
    }

    /// Traite un front PPS montant : tente de discipliner l'horloge à
    /// partir de la dernière heure GPS connue, pourvu qu'elle ne soit
    /// pas trop ancienne.
    fn handle_pps_edge(&self, pps_count: u64) {
        let now_micros = self.monotonic.now_micros();
        let time = match self.parser.read() {
            Ok(parser) => parser.get_time(now_micros),
            Err(_) => None,
        };

        let Some((gps_unix_time_t, fix_age_micros)) = time else {
            self.stats.update_gps(|gps| gps.pps_count = pps_count);
            return;
        };

        let applied = self.discipline.apply_pps_update(
            now_micros,
            gps_unix_time_t,
            fix_age_micros,
            self.config.fix_staleness_limit_micros,
        );

        self.stats.update_gps(|gps| {
            gps.pps_count = pps_count;
            gps.pps_active = applied;
            if applied {
                gps.last_sync_secs = Some(now_micros / 1_000_000);
            }
        });

        if applied {
            debug!("PPS edge #{} disciplined clock to GPS second", pps_count);
        } else {
            warn!(
                "PPS edge #{} ignored: GPS fix too stale ({} us)",
                pps_count, fix_age_micros
            );
        }
    }

    /// Parse les trames GPGSV contenues dans le dernier lot d'octets
    /// reçus pour la télémétrie du skyplot. Best effort uniquement :
    /// aucune trame malformée n'interrompt la lecture série.
    fn refresh_gsv(&self, chunk: &[u8]) -> Option<()> {
        let text = String::from_utf8_lossy(chunk);
        for line in text.split("\r\n") {
            if let Some(sats) = parse_gpgsv(line.trim()) {
                self.stats.update_satellites_merge(sats);
            }
        }
        Some(())
    }
}

impl Drop for GpsReader {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Parse une trame GPGSV (GPS Satellites in View).
/// Format: $GPGSV,total_msgs,msg_num,total_sats,sat1_prn,sat1_elev,sat1_az,sat1_snr,...*checksum
fn parse_gpgsv(sentence: &str) -> Option<Vec<SatelliteInfo>> {
    let constellation = if sentence.starts_with("$GPGSV") {
        "GPS"
    } else if sentence.starts_with("$GLGSV") {
        "GLONASS"
    } else if sentence.starts_with("$GAGSV") {
        "Galileo"
    } else if sentence.starts_with("$GBGSV") {
        "BeiDou"
    } else if sentence.starts_with("$GNGSV") {
        "GNSS"
    } else {
        return None;
    };

    let fields: Vec<&str> = sentence.split(',').collect();
    if fields.len() < 4 {
        return None;
    }

    let mut satellites = Vec::new();
    for i in 0..4 {
        let base_idx = 4 + (i * 4);
        if base_idx + 3 >= fields.len() {
            break;
        }
        let prn: u8 = match fields[base_idx].parse() {
            Ok(p) if p > 0 => p,
            _ => continue,
        };
        let elevation: u8 = fields[base_idx + 1].parse().unwrap_or(0);
        let azimuth: u16 = fields[base_idx + 2].parse().unwrap_or(0);
        let snr_field = fields[base_idx + 3].split('*').next().unwrap_or("");
        let snr: u8 = snr_field.parse().unwrap_or(0);

        satellites.push(SatelliteInfo {
            prn,
            elevation,
            azimuth,
            snr,
            constellation: constellation.to_string(),
        });
    }

    if satellites.is_empty() {
        None
    } else {
        Some(satellites)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_gpgsv_extracts_satellites() {
        let sentence = "$GPGSV,3,1,11,03,03,111,00,04,15,270,00,06,01,010,00,13,06,292,00*74";
        let sats = parse_gpgsv(sentence).expect("expected satellites");
        assert_eq!(sats.len(), 4);
        assert_eq!(sats[0].prn, 3);
        assert_eq!(sats[0].constellation, "GPS");
    }

    #[test]
    fn test_parse_gpgsv_rejects_unknown_talker() {
        assert!(parse_gpgsv("$XXGSV,1,1,0*7F").is_none());
    }
}
