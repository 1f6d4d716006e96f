//! Streaming NMEA-0183 recognizer.
//!
//! Consumes bytes one at a time from a serial source, recognizes the
//! subset of sentences carrying position and wall-clock time (GGA,
//! GLL, RMC, ZDA), validates each sentence's checksum before
//! accepting any field, and exposes the latest valid fix together with
//! the monotonic timestamp at which each field group was last updated.
//!
//! Malformed input is always discarded silently; `feed` never fails
//! with an error, matching the embedded original's "no exceptions"
//! contract.

/// Longest sentence the scanning buffer will hold before the framer
/// gives up and resets to `idle`.
const BUFFER_CAPACITY: usize = 128;

/// Framing state of the byte-by-byte recognizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameState {
    Idle,
    InSentence,
}

/// The parser's output register: the latest committed fix and time,
/// plus the monotonic timestamp each group was last written at.
#[derive(Debug, Clone, Copy, Default)]
pub struct GpsStatus {
    pub position_valid: bool,
    pub time_valid: bool,
    pub lat: f64,
    pub lon: f64,
    pub alt: f64,
    pub sat_count: u8,
    pub utc_hour: u8,
    pub utc_min: u8,
    pub utc_sec: f64,
    pub utc_year: u16,
    pub utc_month: u8,
    pub utc_day: u8,
    pub last_position_update: u64,
    pub last_time_update: u64,
}

/// Stateful byte-by-byte recognizer of GGA/GLL/RMC/ZDA sentences.
pub struct NmeaParser {
    state: FrameState,
    buffer: [u8; BUFFER_CAPACITY],
    cursor: usize,
    overrun: bool,
    status: GpsStatus,
}

impl NmeaParser {
    pub fn new() -> Self {
        NmeaParser {
            state: FrameState::Idle,
            buffer: [0u8; BUFFER_CAPACITY],
            cursor: 0,
            overrun: false,
            status: GpsStatus::default(),
        }
    }

    /// Consumes one input byte. `now_micros` is the monotonic counter
    /// sampled by the caller for this byte. Returns `true` iff this
    /// byte completed a sentence that was fully and successfully
    /// parsed and committed.
    pub fn feed(&mut self, byte: u8, now_micros: u64) -> bool {
        match self.state {
            FrameState::Idle => {
                if byte == b'$' {
                    self.state = FrameState::InSentence;
                    self.cursor = 0;
                    self.overrun = false;
                }
                false
            }
            FrameState::InSentence => {
                if byte == b'$' {
                    self.cursor = 0;
                    self.overrun = false;
                    false
                } else if byte == b'\r' || byte == b'\n' {
                    self.state = FrameState::Idle;
                    if self.cursor == 0 || self.overrun {
                        false
                    } else {
                        self.commit_sentence(now_micros)
                    }
                } else if self.cursor >= BUFFER_CAPACITY - 1 {
                    // Buffer full: discard the sentence, resume framing.
                    self.state = FrameState::Idle;
                    self.overrun = true;
                    false
                } else {
                    self.buffer[self.cursor] = byte;
                    self.cursor += 1;
                    false
                }
            }
        }
    }

    fn commit_sentence(&mut self, now_micros: u64) -> bool {
        let len = self.cursor;
        match parse_sentence(&self.buffer[..len]) {
            Some(commit) => {
                if commit.position.is_some() {
                    if let Some(p) = commit.position {
                        self.status.position_valid = p.valid;
                        self.status.lat = p.lat;
                        self.status.lon = p.lon;
                        if let Some(alt) = p.alt {
                            self.status.alt = alt;
                        }
                        if let Some(sat) = p.sat_count {
                            self.status.sat_count = sat;
                        }
                        self.status.last_position_update = now_micros;
                    }
                }
                if let Some(t) = commit.time {
                    if let Some((h, m, s)) = t.hms {
                        self.status.utc_hour = h;
                        self.status.utc_min = m;
                        self.status.utc_sec = s;
                    }
                    if let Some((y, mo, d)) = t.ymd {
                        self.status.utc_year = y;
                        self.status.utc_month = mo;
                        self.status.utc_day = d;
                    }
                    self.status.last_time_update = now_micros;
                    self.status.time_valid = self.status.utc_year > 1000;
                }
                true
            }
            None => false,
        }
    }

    /// Returns `(lat, lon, alt, fix_age_micros)`, or `None` when
    /// `position_valid` is false.
    pub fn get_location(&self, now_micros: u64) -> Option<(f64, f64, f64, u64)> {
        if !self.status.position_valid {
            return None;
        }
        let age = now_micros.saturating_sub(self.status.last_position_update);
        Some((self.status.lat, self.status.lon, self.status.alt, age))
    }

    /// Returns `(unix_time_t, time_age_micros)`, or `None` when
    /// `time_valid` is false.
    pub fn get_time(&self, now_micros: u64) -> Option<(i64, u64)> {
        if !self.status.time_valid {
            return None;
        }
        let age = now_micros.saturating_sub(self.status.last_time_update);
        Some((unix_time_t(&self.status), age))
    }

    pub fn get_sat_count(&self) -> u8 {
        self.status.sat_count
    }

    /// Read-only snapshot of the whole output register, for
    /// diagnostics/telemetry only.
    pub fn status(&self) -> GpsStatus {
        self.status
    }
}

impl Default for NmeaParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Computes the UNIX timestamp (whole seconds) implied by the
/// currently committed calendar date and hour/minute; seconds are
/// truncated since `unix_time_t` is integral.
fn unix_time_t(status: &GpsStatus) -> i64 {
    days_from_civil(status.utc_year as i64, status.utc_month as u32, status.utc_day as u32)
        * 86_400
        + status.utc_hour as i64 * 3600
        + status.utc_min as i64 * 60
        + status.utc_sec as i64
}

/// Howard Hinnant's civil-from-days algorithm, days since 1970-01-01.
fn days_from_civil(y: i64, m: u32, d: u32) -> i64 {
    let y = if m <= 2 { y - 1 } else { y };
    let era = if y >= 0 { y } else { y - 399 } / 400;
    let yoe = (y - era * 400) as i64;
    let mp = ((m as i64 + 9) % 12) as i64;
    let doy = (153 * mp + 2) / 5 + d as i64 - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    era * 146_097 + doe - 719_468
}

// ---------------------------------------------------------------------
// Sentence parsing
// ---------------------------------------------------------------------

struct PositionCommit {
    valid: bool,
    lat: f64,
    lon: f64,
    alt: Option<f64>,
    sat_count: Option<u8>,
}

struct TimeCommit {
    hms: Option<(u8, u8, f64)>,
    ymd: Option<(u16, u8, u8)>,
}

struct SentenceCommit {
    position: Option<PositionCommit>,
    time: Option<TimeCommit>,
}

/// Scans a sentence body (no leading `$`, no trailing CR/LF), verifies
/// its checksum, and extracts whichever fields its type carries.
/// Returns `None` if the checksum fails to verify or a field is
/// malformed; in that case nothing is committed to the caller.
fn parse_sentence(body: &[u8]) -> Option<SentenceCommit> {
    if body.len() < 6 {
        return None;
    }

    let mut sc = Scanner::new(body);
    // Talker ID (2 chars) + sentence type (3 chars): unconditionally
    // XORed into the checksum regardless of recognition.
    for _ in 0..5 {
        sc.advance()?;
    }
    let kind = &body[2..5];

    let commit = match kind {
        b"GGA" => parse_gga(&mut sc),
        b"GLL" => parse_gll(&mut sc),
        b"RMC" => parse_rmc(&mut sc),
        b"ZDA" => parse_zda(&mut sc),
        _ => {
            // Tolerated: consume to the checksum trailer without
            // extracting fields.
            while sc.peek().map(|b| b != b'*').unwrap_or(false) {
                sc.advance();
            }
            Some(SentenceCommit {
                position: None,
                time: None,
            })
        }
    }?;

    sc.verify_checksum()?;
    Some(commit)
}

fn parse_gga(sc: &mut Scanner) -> Option<SentenceCommit> {
    let hms = sc.field_time()?;
    sc.separator()?;
    let lat_raw = sc.field_latlon()?;
    sc.separator()?;
    let ns = sc.field_char();
    sc.separator()?;
    let lon_raw = sc.field_latlon()?;
    sc.separator()?;
    let ew = sc.field_char();
    sc.separator()?;
    let fix_quality = sc.field_uint();
    sc.separator()?;
    let nsat = sc.field_uint();
    if sc.at_checksum() {
        return finish_gga(hms, lat_raw, ns, lon_raw, ew, fix_quality, nsat, None, None);
    }
    sc.separator()?;
    let _hdop = sc.field_float()?;
    if sc.at_checksum() {
        return finish_gga(hms, lat_raw, ns, lon_raw, ew, fix_quality, nsat, None, None);
    }
    sc.separator()?;
    let alt = sc.field_float()?;
    // Remaining optional fields (M, geoid, M, age, station id) are
    // consumed for checksum correctness but otherwise unused.
    while !sc.at_checksum() {
        sc.separator()?;
        let _ = sc.field_opaque();
    }
    let alt_present = if alt.1 { alt.0 } else { None };
    finish_gga(hms, lat_raw, ns, lon_raw, ew, fix_quality, nsat, alt_present, nsat_present(nsat))
}

fn nsat_present(nsat: (Option<u8>, bool)) -> Option<bool> {
    Some(nsat.1)
}

#[allow(clippy::too_many_arguments)]
fn finish_gga(
    hms: Option<(u8, u8, f64)>,
    lat_raw: Option<f64>,
    ns: Option<char>,
    lon_raw: Option<f64>,
    ew: Option<char>,
    fix_quality: (Option<u8>, bool),
    nsat: (Option<u8>, bool),
    alt: Option<f64>,
    _nsat_present_marker: Option<bool>,
) -> Option<SentenceCommit> {
    let time = hms.map(|v| TimeCommit {
        hms: Some(v),
        ymd: None,
    });

    let position = if fix_quality.1 {
        let quality = fix_quality.0.unwrap_or(0);
        let lat = apply_hemisphere(lat_raw, ns, b'S');
        let lon = apply_hemisphere(lon_raw, ew, b'W');
        Some(PositionCommit {
            valid: quality > 0,
            lat: lat.unwrap_or(0.0),
            lon: lon.unwrap_or(0.0),
            alt,
            sat_count: if nsat.1 { nsat.0 } else { None },
        })
    } else {
        None
    };

    Some(SentenceCommit { position, time })
}

fn parse_gll(sc: &mut Scanner) -> Option<SentenceCommit> {
    let lat_raw = sc.field_latlon()?;
    sc.separator()?;
    let ns = sc.field_char();
    sc.separator()?;
    let lon_raw = sc.field_latlon()?;
    sc.separator()?;
    let ew = sc.field_char();
    sc.separator()?;
    let hms = sc.field_time()?;
    sc.separator()?;
    let status = sc.field_char();
    // Optional trailing mode-indicator field.
    while !sc.at_checksum() {
        sc.separator()?;
        let _ = sc.field_opaque();
    }

    let time = hms.map(|v| TimeCommit {
        hms: Some(v),
        ymd: None,
    });

    let position = status.map(|ch| {
        let lat = apply_hemisphere(lat_raw, ns, b'S');
        let lon = apply_hemisphere(lon_raw, ew, b'W');
        PositionCommit {
            valid: ch == 'A',
            lat: lat.unwrap_or(0.0),
            lon: lon.unwrap_or(0.0),
            alt: None,
            sat_count: None,
        }
    });

    Some(SentenceCommit { position, time })
}

fn parse_rmc(sc: &mut Scanner) -> Option<SentenceCommit> {
    let hms = sc.field_time()?;
    sc.separator()?;
    let status = sc.field_char();
    sc.separator()?;
    let lat_raw = sc.field_latlon()?;
    sc.separator()?;
    let ns = sc.field_char();
    sc.separator()?;
    let lon_raw = sc.field_latlon()?;
    sc.separator()?;
    let ew = sc.field_char();
    sc.separator()?;
    let _sog = sc.field_float()?;
    sc.separator()?;
    let _cog = sc.field_float()?;
    sc.separator()?;
    let date = sc.field_date();
    // magvar, magvar-hemisphere: consumed for checksum, unused.
    while !sc.at_checksum() {
        sc.separator()?;
        let _ = sc.field_opaque();
    }

    let time = if hms.is_some() || date.is_some() {
        Some(TimeCommit {
            hms,
            ymd: date,
        })
    } else {
        None
    };

    let position = status.map(|ch| {
        let lat = apply_hemisphere(lat_raw, ns, b'S');
        let lon = apply_hemisphere(lon_raw, ew, b'W');
        PositionCommit {
            valid: ch == 'A',
            lat: lat.unwrap_or(0.0),
            lon: lon.unwrap_or(0.0),
            alt: None,
            sat_count: None,
        }
    });

    Some(SentenceCommit { position, time })
}

fn parse_zda(sc: &mut Scanner) -> Option<SentenceCommit> {
    let hms = sc.field_time()?;
    sc.separator()?;
    let day = sc.field_uint();
    sc.separator()?;
    let month = sc.field_uint();
    sc.separator()?;
    let year = sc.field_uint();
    // zone hour/minute: parsed only to stay checksum-consistent, then
    // discarded — this crate stores UTC unconditionally.
    while !sc.at_checksum() {
        sc.separator()?;
        let _ = sc.field_opaque();
    }

    let ymd = match (day.0, month.0, year.0) {
        (Some(d), Some(m), Some(y)) if day.1 && month.1 && year.1 => Some((y as u16, m, d)),
        _ => None,
    };

    let time = if hms.is_some() || ymd.is_some() {
        Some(TimeCommit { hms, ymd })
    } else {
        None
    };

    Some(SentenceCommit {
        position: None,
        time,
    })
}

fn apply_hemisphere(value: Option<f64>, hemi: Option<char>, negative: u8) -> Option<f64> {
    let v = value?;
    match hemi {
        Some(c) if c as u8 == negative => Some(-v),
        _ => Some(v),
    }
}

// ---------------------------------------------------------------------
// Field scanning primitives
// ---------------------------------------------------------------------

/// Threads a running checksum and a cursor through field parsing; every
/// byte consumed (other than the checksum trailer itself) is XORed in.
struct Scanner<'a> {
    bytes: &'a [u8],
    pos: usize,
    checksum: u8,
}

impl<'a> Scanner<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Scanner {
            bytes,
            pos: 0,
            checksum: 0,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn advance(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.checksum ^= b;
        self.pos += 1;
        Some(b)
    }

    fn at_checksum(&self) -> bool {
        matches!(self.peek(), Some(b'*') | None)
    }

    /// Consumes the `,` separating two fields.
    fn separator(&mut self) -> Option<()> {
        match self.peek() {
            Some(b',') => {
                self.advance();
                Some(())
            }
            _ => None,
        }
    }

    /// Consumes and discards one field's worth of bytes, for fields
    /// whose values this parser does not use but must still checksum.
    fn field_opaque(&mut self) -> Option<()> {
        while self.peek().map(|b| b != b',' && b != b'*').unwrap_or(false) {
            self.advance();
        }
        Some(())
    }

    fn digit_run(&mut self) -> (u64, u32) {
        let mut value: u64 = 0;
        let mut count = 0u32;
        while let Some(b) = self.peek() {
            if b.is_ascii_digit() {
                self.advance();
                value = value * 10 + (b - b'0') as u64;
                count += 1;
            } else {
                break;
            }
        }
        (value, count)
    }

    /// Fractional digit run, returned as a decimal fraction in
    /// `[0, 1)`. At least seven fractional digits are preserved by
    /// virtue of full `f64` accumulation; extra digits are harmless.
    fn fraction_run(&mut self) -> (f64, u32) {
        let mut value: f64 = 0.0;
        let mut divisor: f64 = 1.0;
        let mut count = 0u32;
        while let Some(b) = self.peek() {
            if b.is_ascii_digit() {
                self.advance();
                value = value * 10.0 + (b - b'0') as f64;
                divisor *= 10.0;
                count += 1;
            } else {
                break;
            }
        }
        (value / divisor, count)
    }

    /// Unsigned integer field: greedy digits, empty match yields zero.
    /// Second element reports whether the field actually had digits.
    fn field_uint(&mut self) -> (Option<u8>, bool) {
        let (value, count) = self.digit_run();
        (Some(value as u8), count > 0)
    }

    /// Fixed-point float field. `None` signals a malformed field (a
    /// negative sign with no digits at all).
    fn field_float(&mut self) -> Option<(Option<f64>, bool)> {
        let neg = self.peek() == Some(b'-');
        if neg {
            self.advance();
        }
        let (int_val, int_count) = self.digit_run();
        let mut frac = 0.0;
        let mut frac_count = 0;
        if self.peek() == Some(b'.') {
            self.advance();
            let (f, c) = self.fraction_run();
            frac = f;
            frac_count = c;
        }
        if neg && int_count == 0 && frac_count == 0 {
            return None;
        }
        let present = int_count > 0 || frac_count > 0;
        if !present {
            return Some((Some(0.0), false));
        }
        let magnitude = int_val as f64 + frac;
        Some((Some(if neg { -magnitude } else { magnitude }), true))
    }

    /// `hhmmss(.sss)` time field. `None` only on malformed fractional
    /// sign; an entirely empty field yields `Some(None)`.
    fn field_time(&mut self) -> Option<Option<(u8, u8, f64)>> {
        let (ival, count) = self.digit_run();
        let mut frac = 0.0;
        if self.peek() == Some(b'.') {
            self.advance();
            let (f, _c) = self.fraction_run();
            frac = f;
        }
        if count == 0 {
            return Some(None);
        }
        let sec_int = ival % 100;
        let rem = ival / 100;
        let min = rem % 100;
        let hour = rem / 100;
        Some(Some((hour as u8, min as u8, sec_int as f64 + frac)))
    }

    /// `dddmm(.mmmm)` latitude/longitude field, decimal degrees,
    /// unsigned (hemisphere applied by the caller). `None` for an
    /// empty field.
    fn field_latlon(&mut self) -> Option<Option<f64>> {
        let (ival, count) = self.digit_run();
        let mut frac_minutes = 0.0;
        if self.peek() == Some(b'.') {
            self.advance();
            let (f, _c) = self.fraction_run();
            frac_minutes = f;
        }
        if count == 0 {
            return Some(None);
        }
        let degrees = (ival / 100) as f64;
        let whole_minutes = (ival % 100) as f64;
        Some(Some(degrees + (whole_minutes + frac_minutes) / 60.0))
    }

    /// `ddmmyy` date field (RMC). `None` for an empty field.
    fn field_date(&mut self) -> Option<(u16, u8, u8)> {
        let (ival, count) = self.digit_run();
        if count == 0 {
            return None;
        }
        let yy = ival % 100;
        let rem = ival / 100;
        let mm = rem % 100;
        let dd = rem / 100;
        Some((2000 + yy as u16, mm as u8, dd as u8))
    }

    /// Single literal character field: returns the character and
    /// advances, or an empty sentinel (`None`) without advancing when
    /// the next byte is `,` or `*`.
    fn field_char(&mut self) -> Option<char> {
        match self.peek() {
            Some(b',') | Some(b'*') | None => None,
            Some(b) => {
                self.advance();
                Some(b as char)
            }
        }
    }

    /// Expects `*` followed by exactly two uppercase hex digits and
    /// compares them against the accumulated checksum.
    fn verify_checksum(&mut self) -> Option<()> {
        if self.bytes.get(self.pos) != Some(&b'*') {
            return None;
        }
        self.pos += 1; // '*' itself is excluded from the checksum.
        if self.pos + 2 > self.bytes.len() {
            return None;
        }
        let hex = std::str::from_utf8(&self.bytes[self.pos..self.pos + 2]).ok()?;
        let declared = u8::from_str_radix(hex, 16).ok()?;
        if declared == self.checksum {
            Some(())
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed_str(parser: &mut NmeaParser, s: &str, now: u64) -> bool {
        let mut committed = false;
        for b in s.bytes() {
            if parser.feed(b, now) {
                committed = true;
            }
        }
        committed
    }

    #[test]
    fn test_gga_scenario() {
        let mut parser = NmeaParser::new();
        let ok = feed_str(
            &mut parser,
            "$GPGGA,161229.487,3723.2475,N,12158.3416,W,1,07,1.0,9.0,M,1.0,M,1,0000*4B\r\n",
            1_000_000,
        );
        assert!(ok);
        let status = parser.status();
        assert!(status.position_valid);
        assert!((status.lat - 37.387458).abs() < 1e-5);
        assert!((status.lon - (-121.972360)).abs() < 1e-4);
        assert!((status.alt - 9.0).abs() < 1e-9);
        assert_eq!(status.sat_count, 7);
        assert_eq!(status.utc_hour, 16);
        assert_eq!(status.utc_min, 12);
        assert!((status.utc_sec - 29.487).abs() < 1e-6);
        assert!(!status.time_valid);
    }

    #[test]
    fn test_zda_scenario() {
        let mut parser = NmeaParser::new();
        let ok = feed_str(&mut parser, "$GNZDA,001313.000,29,01,2023,00,00*41\r\n", 0);
        assert!(ok);
        let status = parser.status();
        assert_eq!(status.utc_year, 2023);
        assert_eq!(status.utc_month, 1);
        assert_eq!(status.utc_day, 29);
        assert!(status.time_valid);
    }

    #[test]
    fn test_rmc_scenario() {
        let mut parser = NmeaParser::new();
        let ok = feed_str(
            &mut parser,
            "$GPRMC,081836,A,3751.65,S,14507.36,E,000.0,360.0,130998,011.3,E*62\r\n",
            0,
        );
        assert!(ok);
        let status = parser.status();
        assert!(status.position_valid);
        assert!((status.lat - (-37.860833)).abs() < 1e-5);
        assert!((status.lon - 145.122667).abs() < 1e-4);
    }

    #[test]
    fn test_bad_checksum_rejected() {
        let mut parser = NmeaParser::new();
        let ok = feed_str(
            &mut parser,
            "$GPGGA,161229.487,3723.2475,N,12158.3416,W,1,07,1.0,9.0,M,1.0,M,1,0000*00\r\n",
            0,
        );
        assert!(!ok);
        assert!(!parser.status().position_valid);
    }

    #[test]
    fn test_idempotent_resubmission() {
        let mut parser = NmeaParser::new();
        let sentence = "$GPGGA,161229.487,3723.2475,N,12158.3416,W,1,07,1.0,9.0,M,1.0,M,1,0000*4B\r\n";
        feed_str(&mut parser, sentence, 100);
        let first = parser.status();
        feed_str(&mut parser, sentence, 200);
        let second = parser.status();
        assert_eq!(first.lat, second.lat);
        assert_eq!(first.lon, second.lon);
        assert_eq!(first.utc_hour, second.utc_hour);
    }

    #[test]
    fn test_buffer_overrun_resumes_on_next_dollar() {
        let mut parser = NmeaParser::new();
        let mut overflowed = String::from("$");
        overflowed.push_str(&"A".repeat(200));
        for b in overflowed.bytes() {
            parser.feed(b, 0);
        }
        // Parser should have reset to idle and accept a fresh sentence.
        let ok = feed_str(&mut parser, "$GNZDA,001313.000,29,01,2023,00,00*41\r\n", 0);
        assert!(ok);
    }

    #[test]
    fn test_short_sentence_rejected() {
        let mut parser = NmeaParser::new();
        let ok = feed_str(&mut parser, "AB\r\n", 0);
        assert!(!ok);
    }

    #[test]
    fn test_gll_commits_time_when_present() {
        let mut parser = NmeaParser::new();
        let ok = feed_str(&mut parser, "$GPGLL,4916.45,N,12311.12,W,225444,A*31\r\n", 0);
        assert!(ok);
        let status = parser.status();
        assert!(status.position_valid);
        assert_eq!(status.utc_hour, 22);
        assert_eq!(status.utc_min, 54);
    }

    #[test]
    fn test_gga_all_empty_except_hdop_commits_nothing() {
        let mut parser = NmeaParser::new();
        let body = "GPGGA,,,,,,,1.0,,,,,,";
        let cksum = body.bytes().fold(0u8, |acc, b| acc ^ b);
        let sentence = format!("${}*{:02X}\r\n", body, cksum);
        let ok = feed_str(&mut parser, &sentence, 500);
        assert!(ok);
        let status = parser.status();
        assert!(!status.position_valid);
        assert_eq!(status.last_position_update, 0);
        assert_eq!(status.last_time_update, 0);
    }
}
