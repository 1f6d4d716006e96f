//! SNTP client: periodically polls a configured upstream server and
//! disciplines the shared [`DisciplineEngine`] from its replies.
//!
//! A freshly received GPS time sentence takes priority over an
//! imminent poll: `tick` consults the engine's own
//! `last_sync_monotonic` rather than a client-private timestamp, so a
//! GPS-driven `set_utc`/`apply_pps_update` naturally defers the next
//! SNTP round just as it would on the original firmware's single
//! cooperative scheduler.

use std::net::{ToSocketAddrs, UdpSocket};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::discipline::{ref_id_from_ip, DisciplineEngine};
use crate::monotonic::MonotonicClock;
use crate::ntp_wire::{NtpMessage, NtpMode};

/// `soffset2` magnitudes above this many seconds are treated as an
/// initial sync (`set_utc`) rather than a gradual `apply_offset` slew.
const STEP_THRESHOLD_SECONDS: i64 = 1;

#[derive(Debug, Clone)]
pub struct SntpClientConfig {
    /// `host:port` of the upstream SNTP/NTP server.
    pub server_addr: String,
    pub poll_interval: Duration,
    pub reply_timeout: Duration,
    /// Version advertised in outgoing requests.
    pub ntp_version: u8,
    /// Replies reporting a version below this are rejected.
    pub ntp_min_version_ok: u8,
}

impl Default for SntpClientConfig {
    fn default() -> Self {
        SntpClientConfig {
            server_addr: "pool.ntp.org:123".to_string(),
            poll_interval: Duration::from_secs(120),
            reply_timeout: Duration::from_secs(5),
            ntp_version: 4,
            ntp_min_version_ok: 3,
        }
    }
}

#[derive(Default)]
pub struct SntpClientStats {
    pub polls_sent: AtomicU64,
    pub replies_received: AtomicU64,
    pub replies_rejected: AtomicU64,
    pub last_offset_micros: std::sync::atomic::AtomicI64,
}

pub struct SntpClient {
    config: SntpClientConfig,
    discipline: Arc<DisciplineEngine>,
    monotonic: Arc<dyn MonotonicClock>,
    stats: Arc<SntpClientStats>,
}

impl SntpClient {
    pub fn new(
        config: SntpClientConfig,
        discipline: Arc<DisciplineEngine>,
        monotonic: Arc<dyn MonotonicClock>,
    ) -> Self {
        SntpClient {
            config,
            discipline,
            monotonic,
            stats: Arc::new(SntpClientStats::default()),
        }
    }

    pub fn stats(&self) -> Arc<SntpClientStats> {
        self.stats.clone()
    }

    /// Gates and, if due, performs one poll/reply round. Returns
    /// `true` iff a round was attempted (whether or not it succeeded).
    pub fn tick(&self) -> bool {
        let now = self.monotonic.now_micros();
        let last_sync = self.discipline.get_last_sync_monotonic();
        let interval_micros = self.config.poll_interval.as_micros() as u64;
        if now.saturating_sub(last_sync) < interval_micros {
            return false;
        }
        match self.poll_once() {
            Ok(()) => {}
            Err(e) => warn!(error = %e, "sntp poll failed"),
        }
        true
    }

    /// Runs `tick` forever at a cadence fine enough to notice a due
    /// poll promptly, intended to be spawned on its own thread.
    pub fn run_loop(&self) {
        loop {
            self.tick();
            std::thread::sleep(Duration::from_secs(1));
        }
    }

    fn poll_once(&self) -> Result<(), String> {
        let addr = self
            .config
            .server_addr
            .to_socket_addrs()
            .map_err(|e| format!("dns resolution failed: {e}"))?
            .next()
            .ok_or_else(|| "dns resolution returned no addresses".to_string())?;

        let socket = UdpSocket::bind("0.0.0.0:0").map_err(|e| e.to_string())?;
        socket
            .set_read_timeout(Some(self.config.reply_timeout))
            .map_err(|e| e.to_string())?;
        socket.connect(addr).map_err(|e| e.to_string())?;

        let transmit_monotonic = self.monotonic.now_micros();
        let originate_utc_micros = self.discipline.get_utc_micros(transmit_monotonic);
        let request = NtpMessage::client_request(originate_utc_micros, self.config.ntp_version);
        let wire = request.encode();

        self.stats.polls_sent.fetch_add(1, Ordering::Relaxed);
        socket.send(&wire).map_err(|e| e.to_string())?;

        let mut buf = [0u8; 48];
        let received_len = socket.recv(&mut buf).map_err(|e| e.to_string())?;
        let receive_monotonic = self.monotonic.now_micros();

        let reply = NtpMessage::decode(&buf[..received_len]).map_err(|e| e.to_string())?;
        if reply.mode != NtpMode::Server {
            self.stats.replies_rejected.fetch_add(1, Ordering::Relaxed);
            return Err(format!("unexpected mode in reply: {:?}", reply.mode));
        }
        if reply.stratum == 0 {
            self.stats.replies_rejected.fetch_add(1, Ordering::Relaxed);
            return Err("server reports kiss-of-death stratum 0".to_string());
        }
        if reply.version < self.config.ntp_min_version_ok {
            self.stats.replies_rejected.fetch_add(1, Ordering::Relaxed);
            return Err(format!(
                "reply version {} below configured minimum {}",
                reply.version, self.config.ntp_min_version_ok
            ));
        }

        let t1 = request.transmit_timestamp.to_unix_micros();
        let t2 = reply.receive_timestamp.to_unix_micros();
        let t3 = reply.transmit_timestamp.to_unix_micros();
        let t4 = self.discipline.get_utc_micros(receive_monotonic);

        // soffset2 = (t2 - t1) + (t3 - t4) is twice the true offset,
        // since each summand is itself an independent offset estimate.
        let soffset2_micros = (t2 - t1) + (t3 - t4);
        let reference_id = ref_id_from_ip(addr.ip());

        if soffset2_micros.abs() > STEP_THRESHOLD_SECONDS * 2 * 1_000_000 {
            self.discipline
                .set_utc(t3, receive_monotonic, reply.stratum, reference_id);
            self.stats
                .last_offset_micros
                .store(soffset2_micros / 2, Ordering::Relaxed);
            warn!(offset_micros = soffset2_micros / 2, "sntp stepping clock");
        } else {
            let offset_micros = soffset2_micros / 2;
            self.discipline
                .apply_offset(offset_micros, receive_monotonic, reply.stratum, reference_id);
            self.stats
                .last_offset_micros
                .store(offset_micros, Ordering::Relaxed);
            debug!(offset_micros, stratum = reply.stratum, "sntp reply applied");
        }

        self.stats.replies_received.fetch_add(1, Ordering::Relaxed);
        self.discipline
            .set_root_dispersion_micros(reply.root_dispersion as u64);

        info!(server = %self.config.server_addr, soffset2_micros, "synchronized via sntp");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monotonic::SystemMonotonicClock;

    #[test]
    fn test_tick_gated_by_last_sync() {
        let discipline = Arc::new(DisciplineEngine::new(0));
        let monotonic: Arc<dyn MonotonicClock> = Arc::new(SystemMonotonicClock::new());
        let mut config = SntpClientConfig::default();
        config.poll_interval = Duration::from_secs(3600);
        config.server_addr = "127.0.0.1:1".to_string();
        let client = SntpClient::new(config, discipline.clone(), monotonic.clone());
        discipline.set_utc(
            1_700_000_000_000_000,
            monotonic.now_micros(),
            crate::discipline::STRATUM_GPS,
            crate::discipline::gps_reference_id(),
        );
        // last_sync was just set, so a long poll_interval should suppress this tick.
        assert!(!client.tick());
    }
}
