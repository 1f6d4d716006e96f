//! SNTP server: answers client requests from the shared discipline
//! state, stamping stratum, reference identifier and root dispersion
//! straight out of the [`DisciplineEngine`].

use std::net::UdpSocket;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::discipline::DisciplineEngine;
use crate::monotonic::MonotonicClock;
use crate::ntp_wire::{LeapIndicator, NtpMessage, NtpMode, NtpTimestamp};
use crate::security::{IpFilter, PacketValidator, RateLimiter};

#[derive(Debug, Clone)]
pub struct SntpServerConfig {
    pub bind_addr: String,
    pub max_requests_per_second: u32,
    pub whitelist: Vec<String>,
    pub blacklist: Vec<String>,
}

impl Default for SntpServerConfig {
    fn default() -> Self {
        SntpServerConfig {
            bind_addr: "0.0.0.0:123".to_string(),
            max_requests_per_second: 50,
            whitelist: Vec::new(),
            blacklist: Vec::new(),
        }
    }
}

#[derive(Default)]
pub struct SntpServerStats {
    pub requests_served: AtomicU64,
    pub requests_rejected: AtomicU64,
    pub requests_rate_limited: AtomicU64,
}

pub struct SntpServer {
    config: SntpServerConfig,
    discipline: Arc<DisciplineEngine>,
    monotonic: Arc<dyn MonotonicClock>,
    rate_limiter: RateLimiter,
    ip_filter: IpFilter,
    stats: Arc<SntpServerStats>,
}

impl SntpServer {
    pub fn new(
        config: SntpServerConfig,
        discipline: Arc<DisciplineEngine>,
        monotonic: Arc<dyn MonotonicClock>,
    ) -> Self {
        let rate_limiter = RateLimiter::new(config.max_requests_per_second);
        let ip_filter = IpFilter::new(config.whitelist.clone(), config.blacklist.clone());
        SntpServer {
            config,
            discipline,
            monotonic,
            rate_limiter,
            ip_filter,
            stats: Arc::new(SntpServerStats::default()),
        }
    }

    pub fn stats(&self) -> Arc<SntpServerStats> {
        self.stats.clone()
    }

    /// Binds and serves forever. Intended to be spawned on its own
    /// thread; one instance per configured bind address.
    pub fn run(&self) -> std::io::Result<()> {
        let socket = UdpSocket::bind(&self.config.bind_addr)?;
        info!(addr = %self.config.bind_addr, "sntp server listening");
        let mut buf = [0u8; 128];
        loop {
            let (len, peer) = match socket.recv_from(&mut buf) {
                Ok(v) => v,
                Err(e) => {
                    warn!(error = %e, "sntp server recv failed");
                    continue;
                }
            };
            let receive_monotonic = self.monotonic.now_micros();

            if !self.ip_filter.is_allowed(peer.ip()) {
                self.stats.requests_rejected.fetch_add(1, Ordering::Relaxed);
                continue;
            }
            if !self.rate_limiter.check_rate_limit(peer.ip()) {
                self.stats
                    .requests_rate_limited
                    .fetch_add(1, Ordering::Relaxed);
                continue;
            }

            let request = match NtpMessage::decode(&buf[..len]) {
                Ok(r) => r,
                Err(e) => {
                    debug!(peer = %peer, error = %e, "malformed sntp request");
                    self.stats.requests_rejected.fetch_add(1, Ordering::Relaxed);
                    continue;
                }
            };

            if let Err(e) = PacketValidator::validate_request(&request) {
                debug!(peer = %peer, error = %e, "rejected sntp request");
                self.stats.requests_rejected.fetch_add(1, Ordering::Relaxed);
                continue;
            }

            let response = self.build_response(&request, receive_monotonic);
            let wire = response.encode();
            if let Err(e) = socket.send_to(&wire, peer) {
                warn!(peer = %peer, error = %e, "failed to send sntp response");
                continue;
            }
            self.stats.requests_served.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn build_response(&self, request: &NtpMessage, receive_monotonic: u64) -> NtpMessage {
        let receive_utc_micros = self.discipline.get_utc_micros(receive_monotonic);
        let stratum = self.discipline.get_stratum();

        let transmit_monotonic = self.monotonic.now_micros();
        let transmit_utc_micros = self.discipline.get_utc_micros(transmit_monotonic);

        // poll/precision/root_delay/root_dispersion/ref_ts are reported
        // as fixed approximations, not measured — clients on a small
        // LAN are expected to tolerate this.
        NtpMessage {
            leap_indicator: LeapIndicator::NoWarning,
            version: request.version,
            mode: NtpMode::Server,
            stratum,
            poll: 3,
            precision: -6,
            root_delay: 0,
            root_dispersion: 0,
            reference_id: self.discipline.get_reference_id(),
            reference_timestamp: NtpTimestamp::ZERO,
            origin_timestamp: request.transmit_timestamp,
            receive_timestamp: NtpTimestamp::from_unix_micros(receive_utc_micros),
            transmit_timestamp: NtpTimestamp::from_unix_micros(transmit_utc_micros),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monotonic::SystemMonotonicClock;

    #[test]
    fn test_build_response_mode_and_stratum() {
        let discipline = Arc::new(DisciplineEngine::new(0));
        let monotonic: Arc<dyn MonotonicClock> = Arc::new(SystemMonotonicClock::new());
        discipline.set_utc(
            1_700_000_000_000_000,
            monotonic.now_micros(),
            crate::discipline::STRATUM_GPS,
            crate::discipline::gps_reference_id(),
        );
        let server = SntpServer::new(SntpServerConfig::default(), discipline, monotonic.clone());
        let request = NtpMessage::client_request(1_700_000_000_000_000, 4);
        let response = server.build_response(&request, monotonic.now_micros());
        assert_eq!(response.mode, NtpMode::Server);
        assert_eq!(response.stratum, crate::discipline::STRATUM_GPS);
        assert_eq!(response.origin_timestamp, request.transmit_timestamp);
        assert_eq!(response.poll, 3);
        assert_eq!(response.precision, -6);
        assert_eq!(response.root_dispersion, 0);
        assert_eq!(response.reference_timestamp, NtpTimestamp::ZERO);
    }
}
