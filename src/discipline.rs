//! Time discipline engine.
//!
//! Holds the appliance's notion of wall-clock UTC as an offset from
//! the free-running monotonic counter (`boot_to_utc_micros`), plus the
//! stratum and reference identifier the SNTP server reports to its
//! clients. Every field that can be written from more than one thread
//! (GPS reader, PPS edge handler, SNTP client) is a separate atomic;
//! readers may observe a torn combination of fields from a single
//! instant, never a torn single field. This mirrors the bare-metal
//! original's interrupt-context update model, where a single shared
//! struct is updated with interrupts enabled and readers tolerate the
//! same granularity of inconsistency.

use std::sync::atomic::{AtomicI64, AtomicU32, AtomicU64, AtomicU8, Ordering};

/// Appliance is free-running, no external reference has ever been
/// applied.
pub const STRATUM_UNSYNCHRONIZED: u8 = 16;
/// Directly disciplined by GPS/PPS: a stratum-1 source.
pub const STRATUM_GPS: u8 = 1;
/// Disciplined indirectly via an upstream SNTP/NTP server.
pub const STRATUM_SNTP: u8 = 2;

/// A GPS fix older than this is no longer trusted to validate PPS
/// edges against.
pub const DEFAULT_FIX_STALENESS_LIMIT_MICROS: u64 = 1_000_000;

/// Shared, thread-safe record of the appliance's time discipline
/// state. Every public method is non-blocking and safe to call from
/// any collaborator thread concurrently.
pub struct DisciplineEngine {
    /// `utc_micros = monotonic_now_micros + boot_to_utc_micros`,
    /// stored as a signed offset since UTC may run behind the
    /// monotonic counter's arbitrary epoch.
    boot_to_utc_micros: AtomicI64,
    stratum: AtomicU8,
    reference_id: AtomicU32,
    last_sync_monotonic: AtomicU64,
    last_pps_monotonic: AtomicU64,
    root_dispersion_micros: AtomicU64,
}

impl DisciplineEngine {
    /// Seeds `boot_to_utc_micros` from the host's real-time clock so
    /// that `get_utc_micros` returns a plausible timestamp even before
    /// the first GPS fix or SNTP reply arrives. The appliance reports
    /// `STRATUM_UNSYNCHRONIZED` until a real source disciplines it.
    pub fn new(monotonic_now_micros: u64) -> Self {
        let wall_now_micros = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_micros() as i64)
            .unwrap_or(0);
        let boot_to_utc = wall_now_micros - monotonic_now_micros as i64;
        DisciplineEngine {
            boot_to_utc_micros: AtomicI64::new(boot_to_utc),
            stratum: AtomicU8::new(STRATUM_UNSYNCHRONIZED),
            reference_id: AtomicU32::new(0),
            last_sync_monotonic: AtomicU64::new(0),
            last_pps_monotonic: AtomicU64::new(0),
            root_dispersion_micros: AtomicU64::new(0),
        }
    }

    /// Current UTC time in microseconds since the UNIX epoch.
    pub fn get_utc_micros(&self, monotonic_now_micros: u64) -> i64 {
        monotonic_now_micros as i64 + self.boot_to_utc_micros.load(Ordering::Relaxed)
    }

    pub fn get_stratum(&self) -> u8 {
        self.stratum.load(Ordering::Relaxed)
    }

    pub fn get_reference_id(&self) -> u32 {
        self.reference_id.load(Ordering::Relaxed)
    }

    pub fn get_last_sync_monotonic(&self) -> u64 {
        self.last_sync_monotonic.load(Ordering::Relaxed)
    }

    pub fn get_last_pps_monotonic(&self) -> u64 {
        self.last_pps_monotonic.load(Ordering::Relaxed)
    }

    pub fn get_root_dispersion_micros(&self) -> u64 {
        self.root_dispersion_micros.load(Ordering::Relaxed)
    }

    /// Unconditionally re-bases the discipline offset so that
    /// `get_utc_micros(monotonic_now_micros) == utc_micros`. Used for
    /// the initial GPS sync and by the SNTP client whenever it judges a
    /// correction too large to slew.
    pub fn set_utc(
        &self,
        utc_micros: i64,
        monotonic_now_micros: u64,
        stratum: u8,
        reference_id: u32,
    ) {
        let new_offset = utc_micros - monotonic_now_micros as i64;
        self.boot_to_utc_micros.store(new_offset, Ordering::Relaxed);
        self.stratum.store(stratum, Ordering::Relaxed);
        self.reference_id.store(reference_id, Ordering::Relaxed);
        self.last_sync_monotonic.store(monotonic_now_micros, Ordering::Relaxed);
    }

    /// Additive correction: shifts `boot_to_utc_micros` by
    /// `delta_micros` and records the new source. Callers (the SNTP
    /// client) decide whether a given correction is small enough to
    /// slew through this method or large enough to warrant an absolute
    /// `set_utc` instead — the engine itself has no step/slew logic.
    pub fn apply_offset(
        &self,
        delta_micros: i64,
        monotonic_now_micros: u64,
        stratum: u8,
        reference_id: u32,
    ) {
        self.boot_to_utc_micros.fetch_add(delta_micros, Ordering::Relaxed);
        self.stratum.store(stratum, Ordering::Relaxed);
        self.reference_id.store(reference_id, Ordering::Relaxed);
        self.last_sync_monotonic.store(monotonic_now_micros, Ordering::Relaxed);
    }

    /// Records a PPS edge: UTC is rebased to exactly `:00.000000` of
    /// the whole second carried by the most recent GPS time sentence,
    /// provided that sentence is no older than `staleness_limit`.
    /// Returns `true` iff the edge was accepted and applied.
    pub fn apply_pps_update(
        &self,
        monotonic_now_micros: u64,
        gps_unix_time_t: i64,
        gps_fix_age_micros: u64,
        staleness_limit_micros: u64,
    ) -> bool {
        if gps_fix_age_micros > staleness_limit_micros {
            return false;
        }
        let target_utc_micros = gps_unix_time_t * 1_000_000;
        self.set_utc(target_utc_micros, monotonic_now_micros, STRATUM_GPS, gps_reference_id());
        self.last_pps_monotonic.store(monotonic_now_micros, Ordering::Relaxed);
        true
    }

    pub fn set_root_dispersion_micros(&self, dispersion: u64) {
        self.root_dispersion_micros.store(dispersion, Ordering::Relaxed);
    }
}

/// The fixed 4-character ASCII reference identifier reported while
/// disciplined directly from GPS, packed big-endian as `GPS\0`.
pub fn gps_reference_id() -> u32 {
    u32::from_be_bytes(*b"GPS\0")
}

/// Reference identifier for a stratum-2 SNTP upstream: IPv4 addresses
/// are carried verbatim; IPv6 addresses are XOR-folded into 32 bits
/// since this crate has no MD5 implementation in its dependency
/// stack. This is a deliberate approximation, not RFC 5905's mandated
/// digest.
pub fn ref_id_from_ip(addr: std::net::IpAddr) -> u32 {
    match addr {
        std::net::IpAddr::V4(v4) => u32::from_be_bytes(v4.octets()),
        std::net::IpAddr::V6(v6) => {
            let octets = v6.octets();
            let mut folded = [0u8; 4];
            for (i, chunk) in octets.chunks(4).enumerate() {
                let _ = i;
                for (j, b) in chunk.iter().enumerate() {
                    folded[j] ^= b;
                }
            }
            u32::from_be_bytes(folded)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_utc_is_exact() {
        let engine = DisciplineEngine::new(0);
        engine.set_utc(1_700_000_000_000_000, 500_000, STRATUM_GPS, gps_reference_id());
        assert_eq!(engine.get_utc_micros(500_000), 1_700_000_000_000_000);
        assert_eq!(engine.get_stratum(), STRATUM_GPS);
        assert_eq!(engine.get_reference_id(), gps_reference_id());
    }

    #[test]
    fn test_apply_offset_is_purely_additive() {
        let engine = DisciplineEngine::new(0);
        engine.set_utc(1_000_000_000_000, 0, STRATUM_SNTP, 0);
        engine.apply_offset(37_000, 1_000_000, STRATUM_SNTP, 0);
        let got = engine.get_utc_micros(1_000_000);
        assert_eq!(got, 1_000_000_000_000 + 1_000_000 + 37_000);
    }

    #[test]
    fn test_pps_rejected_when_fix_stale() {
        let engine = DisciplineEngine::new(0);
        let applied = engine.apply_pps_update(1_000_000, 1_700_000_000, 2_000_000, 1_000_000);
        assert!(!applied);
        assert_eq!(engine.get_stratum(), STRATUM_UNSYNCHRONIZED);
    }

    #[test]
    fn test_pps_accepted_lands_on_gps_second() {
        let engine = DisciplineEngine::new(0);
        let applied = engine.apply_pps_update(5_000_000, 1_700_000_000, 500_000, 1_000_000);
        assert!(applied);
        assert_eq!(engine.get_utc_micros(5_000_000), 1_700_000_000_000_000);
        assert_eq!(engine.get_stratum(), STRATUM_GPS);
    }

    #[test]
    fn test_ref_id_v4_passthrough() {
        let addr = std::net::IpAddr::V4(std::net::Ipv4Addr::new(192, 0, 2, 1));
        assert_eq!(ref_id_from_ip(addr), 0xC000_0201);
    }
}
