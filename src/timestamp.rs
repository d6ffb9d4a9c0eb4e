//! Entry timestamps and their per-format encodings.
//!
//! [`Timestamp`] stores a Windows FILETIME (100-nanosecond intervals since
//! 1601-01-01 UTC), the richest of the three encodings this crate writes.
//! Zip headers need an MS-DOS date/time pair and tar headers need whole Unix
//! seconds; both are derived from the same value.
//!
//! ```rust
//! use archslip::Timestamp;
//!
//! let ts = Timestamp::from_unix_secs(0).unwrap();
//! assert_eq!(ts.as_filetime(), 116444736000000000);
//! assert_eq!(ts.to_dos(), archslip::DosDateTime { date: 0x0021, time: 0 });
//! ```

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Difference between the FILETIME epoch (1601) and the Unix epoch (1970),
/// in 100-nanosecond intervals.
const FILETIME_UNIX_DIFF: u64 = 116444736000000000;

const INTERVALS_PER_SECOND: u64 = 10_000_000;

/// 1980-01-01T00:00:00Z, the earliest instant an MS-DOS timestamp can hold.
const DOS_EPOCH_UNIX_SECS: i64 = 315_532_800;

/// An instant with 100-nanosecond precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp {
    filetime: u64,
}

/// An MS-DOS date and time pair as stored in zip headers.
///
/// `date` packs `(year - 1980) << 9 | month << 5 | day`; `time` packs
/// `hour << 11 | minute << 5 | second / 2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DosDateTime {
    /// Packed date.
    pub date: u16,
    /// Packed time.
    pub time: u16,
}

impl Timestamp {
    /// Creates a timestamp from a raw FILETIME value.
    #[inline]
    pub const fn from_filetime(filetime: u64) -> Self {
        Self { filetime }
    }

    /// Creates a timestamp from Unix seconds.
    ///
    /// Returns `None` if the instant is not representable as a FILETIME.
    pub fn from_unix_secs(secs: i64) -> Option<Self> {
        let intervals = secs.unsigned_abs().checked_mul(INTERVALS_PER_SECOND)?;
        let filetime = if secs < 0 {
            FILETIME_UNIX_DIFF.checked_sub(intervals)?
        } else {
            FILETIME_UNIX_DIFF.checked_add(intervals)?
        };
        Some(Self::from_filetime(filetime))
    }

    /// Creates a timestamp from a `SystemTime`, truncating to 100ns.
    pub fn from_system_time(time: SystemTime) -> Option<Self> {
        let filetime = match time.duration_since(UNIX_EPOCH) {
            Ok(after) => FILETIME_UNIX_DIFF.checked_add(duration_to_intervals(after)?)?,
            Err(before) => FILETIME_UNIX_DIFF.checked_sub(duration_to_intervals(before.duration())?)?,
        };
        Some(Self::from_filetime(filetime))
    }

    /// Returns the current time.
    pub fn now() -> Self {
        Self::from_system_time(SystemTime::now()).unwrap_or_default()
    }

    /// Returns the raw FILETIME value.
    #[inline]
    pub const fn as_filetime(&self) -> u64 {
        self.filetime
    }

    /// Returns whole Unix seconds, rounding towards negative infinity.
    pub fn as_unix_secs(&self) -> i64 {
        if self.filetime >= FILETIME_UNIX_DIFF {
            ((self.filetime - FILETIME_UNIX_DIFF) / INTERVALS_PER_SECOND) as i64
        } else {
            let before = FILETIME_UNIX_DIFF - self.filetime;
            -(before.div_ceil(INTERVALS_PER_SECOND) as i64)
        }
    }

    /// Converts to a `SystemTime`.
    pub fn as_system_time(&self) -> SystemTime {
        let (offset, after) = if self.filetime >= FILETIME_UNIX_DIFF {
            (self.filetime - FILETIME_UNIX_DIFF, true)
        } else {
            (FILETIME_UNIX_DIFF - self.filetime, false)
        };
        let duration = Duration::new(
            offset / INTERVALS_PER_SECOND,
            ((offset % INTERVALS_PER_SECOND) * 100) as u32,
        );
        if after {
            UNIX_EPOCH + duration
        } else {
            UNIX_EPOCH - duration
        }
    }

    /// Returns Unix seconds clamped into the unsigned range tar headers accept.
    pub fn as_tar_mtime(&self) -> u64 {
        self.as_unix_secs().max(0) as u64
    }

    /// Returns the 32-bit Unix time used by the zip extended-timestamp field.
    pub fn as_unix_u32(&self) -> u32 {
        self.as_unix_secs().clamp(0, i64::from(u32::MAX)) as u32
    }

    /// Converts to an MS-DOS date/time pair in UTC.
    ///
    /// Instants before 1980 clamp to 1980-01-01 00:00:00 and instants after
    /// 2107 clamp to the last representable second.
    pub fn to_dos(&self) -> DosDateTime {
        let secs = self.as_unix_secs().max(DOS_EPOCH_UNIX_SECS);
        let days = secs.div_euclid(86_400);
        let second_of_day = secs.rem_euclid(86_400);
        let (year, month, day) = civil_from_days(days);
        if year > 2107 {
            return DosDateTime {
                date: (127 << 9) | (12 << 5) | 31,
                time: (23 << 11) | (59 << 5) | 29,
            };
        }
        let hour = second_of_day / 3600;
        let minute = (second_of_day % 3600) / 60;
        let second = second_of_day % 60;
        DosDateTime {
            date: (((year - 1980) as u16) << 9) | ((month as u16) << 5) | day as u16,
            time: ((hour as u16) << 11) | ((minute as u16) << 5) | (second / 2) as u16,
        }
    }
}

impl Default for Timestamp {
    /// Returns the Unix epoch.
    fn default() -> Self {
        Self::from_filetime(FILETIME_UNIX_DIFF)
    }
}

impl From<SystemTime> for Timestamp {
    fn from(time: SystemTime) -> Self {
        Self::from_system_time(time).unwrap_or_default()
    }
}

fn duration_to_intervals(duration: Duration) -> Option<u64> {
    duration
        .as_secs()
        .checked_mul(INTERVALS_PER_SECOND)?
        .checked_add(u64::from(duration.subsec_nanos()) / 100)
}

/// Converts days since 1970-01-01 to a proleptic Gregorian (year, month, day).
fn civil_from_days(days: i64) -> (i64, u32, u32) {
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097);
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let month = if mp < 10 { mp + 3 } else { mp - 9 } as u32;
    let year = yoe + era * 400 + i64::from(month <= 2);
    (year, month, day)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unix_epoch() {
        let ts = Timestamp::from_unix_secs(0).unwrap();
        assert_eq!(ts.as_filetime(), FILETIME_UNIX_DIFF);
        assert_eq!(ts.as_unix_secs(), 0);
        assert_eq!(ts.as_system_time(), UNIX_EPOCH);
        assert_eq!(ts, Timestamp::default());
    }

    #[test]
    fn test_negative_unix_secs() {
        let ts = Timestamp::from_unix_secs(-3600).unwrap();
        assert_eq!(ts.as_unix_secs(), -3600);
        assert_eq!(ts.as_tar_mtime(), 0);
    }

    #[test]
    fn test_system_time_roundtrip() {
        let time = UNIX_EPOCH + Duration::new(1_700_000_000, 123_456_700);
        let ts = Timestamp::from_system_time(time).unwrap();
        assert_eq!(ts.as_system_time(), time);
        assert_eq!(ts.as_unix_secs(), 1_700_000_000);
    }

    #[test]
    fn test_dos_known_date() {
        // 2023-11-14T22:13:20Z
        let dos = Timestamp::from_unix_secs(1_700_000_000).unwrap().to_dos();
        assert_eq!(dos.date >> 9, 2023 - 1980);
        assert_eq!((dos.date >> 5) & 0x0F, 11);
        assert_eq!(dos.date & 0x1F, 14);
        assert_eq!(dos.time >> 11, 22);
        assert_eq!((dos.time >> 5) & 0x3F, 13);
        assert_eq!(dos.time & 0x1F, 10);
    }

    #[test]
    fn test_dos_clamps_before_1980() {
        let dos = Timestamp::from_unix_secs(0).unwrap().to_dos();
        assert_eq!(dos, DosDateTime { date: 0x0021, time: 0 });
    }

    #[test]
    fn test_future_timestamp_accepted() {
        // 2200-01-01, beyond the DOS range but valid elsewhere
        let ts = Timestamp::from_unix_secs(7_258_118_400).unwrap();
        assert_eq!(ts.as_unix_secs(), 7_258_118_400);
        assert_eq!(ts.to_dos().date >> 9, 127);
        assert_eq!(ts.as_unix_u32(), u32::MAX);
    }

    #[test]
    fn test_civil_from_days_leap_day() {
        // 2024-02-29 is day 19782
        assert_eq!(civil_from_days(19_782), (2024, 2, 29));
        assert_eq!(civil_from_days(0), (1970, 1, 1));
    }
}
