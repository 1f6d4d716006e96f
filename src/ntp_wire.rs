//! SNTP v4 (RFC 5905) wire codec.
//!
//! Encodes and decodes the 48-byte fixed packet layout shared by NTP
//! and SNTP client and server exchanges. No extension fields or MAC
//! trailers are produced or consumed — this crate only ever speaks
//! plain SNTP.

use thiserror::Error;

/// Seconds between the NTP epoch (1900-01-01) and the UNIX epoch
/// (1970-01-01).
pub const NTP_DELTA: i64 = 2_208_988_800;

pub const PACKET_LEN: usize = 48;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WireError {
    #[error("packet wrong length: got {0} bytes, need exactly {PACKET_LEN}")]
    WrongLength(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeapIndicator {
    NoWarning,
    LastMinute61,
    LastMinute59,
    /// Clock unsynchronized — reported while this appliance has no
    /// disciplined reference of its own.
    Unknown,
}

impl LeapIndicator {
    fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0 => LeapIndicator::NoWarning,
            1 => LeapIndicator::LastMinute61,
            2 => LeapIndicator::LastMinute59,
            _ => LeapIndicator::Unknown,
        }
    }

    fn to_bits(self) -> u8 {
        match self {
            LeapIndicator::NoWarning => 0,
            LeapIndicator::LastMinute61 => 1,
            LeapIndicator::LastMinute59 => 2,
            LeapIndicator::Unknown => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NtpMode {
    Reserved,
    SymmetricActive,
    SymmetricPassive,
    Client,
    Server,
    Broadcast,
    ControlMessage,
    Private,
}

impl NtpMode {
    fn from_bits(bits: u8) -> Self {
        match bits & 0b111 {
            0 => NtpMode::Reserved,
            1 => NtpMode::SymmetricActive,
            2 => NtpMode::SymmetricPassive,
            3 => NtpMode::Client,
            4 => NtpMode::Server,
            5 => NtpMode::Broadcast,
            6 => NtpMode::ControlMessage,
            _ => NtpMode::Private,
        }
    }

    fn to_bits(self) -> u8 {
        match self {
            NtpMode::Reserved => 0,
            NtpMode::SymmetricActive => 1,
            NtpMode::SymmetricPassive => 2,
            NtpMode::Client => 3,
            NtpMode::Server => 4,
            NtpMode::Broadcast => 5,
            NtpMode::ControlMessage => 6,
            NtpMode::Private => 7,
        }
    }
}

/// A 64-bit NTP timestamp: 32-bit seconds since 1900, 32-bit binary
/// fraction of a second.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NtpTimestamp {
    pub seconds: u32,
    pub fraction: u32,
}

impl NtpTimestamp {
    pub const ZERO: NtpTimestamp = NtpTimestamp { seconds: 0, fraction: 0 };

    /// Builds a timestamp from UNIX-epoch microseconds. Values before
    /// 1900 are not representable and saturate to `ZERO`.
    pub fn from_unix_micros(unix_micros: i64) -> Self {
        let ntp_seconds_total = unix_micros / 1_000_000 + NTP_DELTA;
        if ntp_seconds_total < 0 {
            return Self::ZERO;
        }
        let micros_of_second = unix_micros.rem_euclid(1_000_000) as u64;
        NtpTimestamp {
            seconds: ntp_seconds_total as u32,
            fraction: micros_to_fraction(micros_of_second),
        }
    }

    /// Converts back to UNIX-epoch microseconds.
    pub fn to_unix_micros(self) -> i64 {
        let unix_seconds = self.seconds as i64 - NTP_DELTA;
        unix_seconds * 1_000_000 + fraction_to_micros(self.fraction) as i64
    }

    fn read(buf: &[u8]) -> Self {
        NtpTimestamp {
            seconds: u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]),
            fraction: u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]),
        }
    }

    fn write(self, buf: &mut [u8]) {
        buf[0..4].copy_from_slice(&self.seconds.to_be_bytes());
        buf[4..8].copy_from_slice(&self.fraction.to_be_bytes());
    }
}

/// Converts a sub-second microsecond count (`0..1_000_000`) to the
/// 32-bit NTP fixed-point fraction.
pub fn micros_to_fraction(micros: u64) -> u32 {
    (((micros as u128) << 32) / 1_000_000) as u32
}

/// Inverse of [`micros_to_fraction`].
pub fn fraction_to_micros(fraction: u32) -> u64 {
    ((fraction as u128 * 1_000_000) >> 32) as u64
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NtpMessage {
    pub leap_indicator: LeapIndicator,
    pub version: u8,
    pub mode: NtpMode,
    pub stratum: u8,
    pub poll: i8,
    pub precision: i8,
    pub root_delay: u32,
    pub root_dispersion: u32,
    pub reference_id: u32,
    pub reference_timestamp: NtpTimestamp,
    pub origin_timestamp: NtpTimestamp,
    pub receive_timestamp: NtpTimestamp,
    pub transmit_timestamp: NtpTimestamp,
}

impl NtpMessage {
    /// A bare client request: mode 3, transmit timestamp set to
    /// `originate_micros` so the reply's origin timestamp can be
    /// matched back against it.
    pub fn client_request(originate_unix_micros: i64, version: u8) -> Self {
        NtpMessage {
            leap_indicator: LeapIndicator::NoWarning,
            version,
            mode: NtpMode::Client,
            stratum: 0,
            poll: 0,
            precision: 0,
            root_delay: 0,
            root_dispersion: 0,
            reference_id: 0,
            reference_timestamp: NtpTimestamp::ZERO,
            origin_timestamp: NtpTimestamp::ZERO,
            receive_timestamp: NtpTimestamp::ZERO,
            transmit_timestamp: NtpTimestamp::from_unix_micros(originate_unix_micros),
        }
    }

    pub fn decode(buf: &[u8]) -> Result<Self, WireError> {
        if buf.len() != PACKET_LEN {
            return Err(WireError::WrongLength(buf.len()));
        }
        let li_vn_mode = buf[0];
        let mode = NtpMode::from_bits(li_vn_mode);
        Ok(NtpMessage {
            leap_indicator: LeapIndicator::from_bits(li_vn_mode >> 6),
            version: (li_vn_mode >> 3) & 0b111,
            mode,
            stratum: buf[1],
            poll: buf[2] as i8,
            precision: buf[3] as i8,
            root_delay: u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]),
            root_dispersion: u32::from_be_bytes([buf[8], buf[9], buf[10], buf[11]]),
            reference_id: u32::from_be_bytes([buf[12], buf[13], buf[14], buf[15]]),
            reference_timestamp: NtpTimestamp::read(&buf[16..24]),
            origin_timestamp: NtpTimestamp::read(&buf[24..32]),
            receive_timestamp: NtpTimestamp::read(&buf[32..40]),
            transmit_timestamp: NtpTimestamp::read(&buf[40..48]),
        })
    }

    pub fn encode(&self) -> [u8; PACKET_LEN] {
        let mut buf = [0u8; PACKET_LEN];
        buf[0] = (self.leap_indicator.to_bits() << 6) | (self.version << 3) | self.mode.to_bits();
        buf[1] = self.stratum;
        buf[2] = self.poll as u8;
        buf[3] = self.precision as u8;
        buf[4..8].copy_from_slice(&self.root_delay.to_be_bytes());
        buf[8..12].copy_from_slice(&self.root_dispersion.to_be_bytes());
        buf[12..16].copy_from_slice(&self.reference_id.to_be_bytes());
        self.reference_timestamp.write(&mut buf[16..24]);
        self.origin_timestamp.write(&mut buf[24..32]);
        self.receive_timestamp.write(&mut buf[32..40]);
        self.transmit_timestamp.write(&mut buf[40..48]);
        buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_roundtrip() {
        let micros: i64 = 1_700_000_000_123_456;
        let ts = NtpTimestamp::from_unix_micros(micros);
        let back = ts.to_unix_micros();
        assert!((back - micros).abs() <= 1);
    }

    #[test]
    fn test_fraction_roundtrip() {
        for micros in [0u64, 1, 500_000, 999_999] {
            let f = micros_to_fraction(micros);
            let back = fraction_to_micros(f);
            assert!(back.abs_diff(micros) <= 1);
        }
    }

    #[test]
    fn test_wire_roundtrip() {
        let msg = NtpMessage {
            leap_indicator: LeapIndicator::NoWarning,
            version: 4,
            mode: NtpMode::Server,
            stratum: 1,
            poll: 6,
            precision: -20,
            root_delay: 0,
            root_dispersion: 100,
            reference_id: u32::from_be_bytes(*b"GPS\0"),
            reference_timestamp: NtpTimestamp::from_unix_micros(1_700_000_000_000_000),
            origin_timestamp: NtpTimestamp::from_unix_micros(1_700_000_000_500_000),
            receive_timestamp: NtpTimestamp::from_unix_micros(1_700_000_000_600_000),
            transmit_timestamp: NtpTimestamp::from_unix_micros(1_700_000_000_700_000),
        };
        let encoded = msg.encode();
        let decoded = NtpMessage::decode(&encoded).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn test_decode_too_short() {
        let buf = [0u8; 10];
        assert_eq!(NtpMessage::decode(&buf), Err(WireError::WrongLength(10)));
    }

    #[test]
    fn test_decode_too_long_rejected() {
        let buf = [0u8; 128];
        assert_eq!(NtpMessage::decode(&buf), Err(WireError::WrongLength(128)));
    }

    #[test]
    fn test_mode_and_version_bit_packing() {
        let msg = NtpMessage::client_request(0, 4);
        let encoded = msg.encode();
        assert_eq!(encoded[0] & 0b111, NtpMode::Client.to_bits());
        assert_eq!((encoded[0] >> 3) & 0b111, 4);
    }
}
