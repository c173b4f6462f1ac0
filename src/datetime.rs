//! TOML date-time literals, an RFC 3339 subset.
//!
//! The decoder consumes exactly the literal it recognizes and leaves the
//! cursor on the following byte; validation covers calendar ranges
//! (including leap-day Februaries) and clock ranges. Which of the four
//! sub-variants was written (offset date-time, local date-time, date-only,
//! time-only) is recoverable from which fields are present.

#[cfg(test)]
#[path = "./datetime_tests.rs"]
mod tests;

/// A calendar date.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct Date {
    pub year: u16,
    pub month: u8,
    pub day: u8,
}

/// A clock time with nanosecond precision.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct Time {
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    pub nanosecond: u32,
}

/// Offset between local time and UTC.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Offset {
    /// The `Z` suffix: UTC offset of 00:00.
    Z,
    /// An explicit `+hh:mm`/`-hh:mm` offset, in minutes.
    Minutes(i16),
}

/// A decoded date-time literal. At least one of `date` and `time` is always
/// present; `offset` only ever accompanies a date and time together.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct Datetime {
    pub date: Option<Date>,
    pub time: Option<Time>,
    pub offset: Option<Offset>,
}

fn is_leap_year(year: u16) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

fn days_in_month(year: u16, month: u8) -> u8 {
    const DAYS: [u8; 13] = [0, 31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];
    if month == 2 && is_leap_year(year) {
        29
    } else {
        DAYS[month as usize]
    }
}

fn digit(bytes: &[u8], pos: usize) -> Option<u8> {
    match bytes.get(pos) {
        Some(b) if b.is_ascii_digit() => Some(b - b'0'),
        _ => None,
    }
}

fn two_digits(bytes: &[u8], pos: usize) -> Option<u8> {
    Some(digit(bytes, pos)? * 10 + digit(bytes, pos + 1)?)
}

fn four_digits(bytes: &[u8], pos: usize) -> Option<u16> {
    Some(two_digits(bytes, pos)? as u16 * 100 + two_digits(bytes, pos + 2)? as u16)
}

/// Returns `true` if the bytes at `pos` open a date (`dddd-`) or time
/// (`dd:`) literal. Cheap enough to probe before any other scalar decoding.
pub(crate) fn looks_like(bytes: &[u8], pos: usize) -> bool {
    (two_digits(bytes, pos).is_some() && bytes.get(pos + 2) == Some(&b':'))
        || (four_digits(bytes, pos).is_some() && bytes.get(pos + 4) == Some(&b'-'))
}

/// Decodes the date-time literal at `pos`, returning it with the offset of
/// the first byte past it. `None` means the text is not a well-formed
/// literal (the caller reports the value error).
pub(crate) fn munch(bytes: &[u8], pos: usize) -> Option<(Datetime, usize)> {
    let mut cur = pos;
    let mut date = None;
    let mut offset = None;

    if bytes.get(cur + 4) == Some(&b'-') {
        let year = four_digits(bytes, cur)?;
        let month = two_digits(bytes, cur + 5)?;
        if bytes.get(cur + 7) != Some(&b'-') {
            return None;
        }
        let day = two_digits(bytes, cur + 8)?;
        if month < 1 || month > 12 || day < 1 || day > days_in_month(year, month) {
            return None;
        }
        date = Some(Date { year, month, day });
        cur += 10;

        // An optional time part follows `T`, `t`, or a single space. The
        // space form is only a separator when an `hh:` actually follows.
        let time_follows = match bytes.get(cur) {
            Some(b'T' | b't') => true,
            Some(b' ') => {
                two_digits(bytes, cur + 1).is_some() && bytes.get(cur + 3) == Some(&b':')
            }
            _ => false,
        };
        if time_follows {
            cur += 1;
        } else {
            return Some((
                Datetime {
                    date,
                    time: None,
                    offset: None,
                },
                cur,
            ));
        }
    }

    let (t, after) = munch_time(bytes, cur)?;
    let time = Some(t);
    cur = after;

    if date.is_some() {
        match bytes.get(cur) {
            Some(b'Z' | b'z') => {
                offset = Some(Offset::Z);
                cur += 1;
            }
            Some(&sign @ (b'+' | b'-')) => {
                let hours = two_digits(bytes, cur + 1)?;
                if bytes.get(cur + 3) != Some(&b':') {
                    return None;
                }
                let minutes = two_digits(bytes, cur + 4)?;
                if hours > 23 || minutes > 59 {
                    return None;
                }
                let total = hours as i16 * 60 + minutes as i16;
                offset = Some(Offset::Minutes(if sign == b'-' { -total } else { total }));
                cur += 6;
            }
            _ => {}
        }
    }

    Some((Datetime { date, time, offset }, cur))
}

fn munch_time(bytes: &[u8], pos: usize) -> Option<(Time, usize)> {
    let hour = two_digits(bytes, pos)?;
    if bytes.get(pos + 2) != Some(&b':') {
        return None;
    }
    let minute = two_digits(bytes, pos + 3)?;
    let mut cur = pos + 5;

    // Seconds are optional; `hh:mm` alone reads as second zero.
    let mut second = 0;
    if bytes.get(cur) == Some(&b':') {
        second = two_digits(bytes, cur + 1)?;
        cur += 3;
    }
    // Second 60 is allowed, for the leap second rule.
    if hour > 23 || minute > 59 || second > 60 {
        return None;
    }

    let mut nanosecond = 0u32;
    if bytes.get(cur) == Some(&b'.') {
        let frac_start = cur + 1;
        let mut scale = 100_000_000u32;
        cur = frac_start;
        while let Some(d) = digit(bytes, cur) {
            // Digits beyond nanosecond precision are consumed but dropped.
            nanosecond += d as u32 * scale;
            scale /= 10;
            cur += 1;
            if scale == 0 {
                while digit(bytes, cur).is_some() {
                    cur += 1;
                }
                break;
            }
        }
        if cur == frac_start {
            return None;
        }
    }

    Some((
        Time {
            hour,
            minute,
            second,
            nanosecond,
        },
        cur,
    ))
}
