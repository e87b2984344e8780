//! Randomized domain values for request payloads.
//!
//! Every generator takes the randomness source explicitly so runs can be replayed from a seed.

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveTime};
use rand::seq::SliceRandom as _;
use rand::{Rng, SeedableRng as _};
use rand_chacha::ChaCha8Rng;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("cannot pick a random value from an empty {0}")]
    EmptyDomain(&'static str),
}

pub const EMAIL_DOMAINS: [&str; 4] = ["gmail.com", "yahoo.com", "outlook.com", "example.com"];

const EMAIL_LOCAL_CHARS: &[u8] = b"abcdefghijklmnopqrstuvwxyz1234567890";
const EMAIL_LOCAL_LEN: usize = 10;

/// Per-VU generator. With a seed every VU gets its own reproducible stream.
pub fn vu_rng(seed: Option<u64>, vu_id: u64) -> ChaCha8Rng {
    match seed {
        Some(seed) => {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            rng.set_stream(vu_id);
            rng
        }
        None => ChaCha8Rng::from_entropy(),
    }
}

/// Uniform timestamp between midnight of `start` and midnight of `end` (inclusive), as `YYYY-MM-DD`.
pub fn random_date_in_range<R: Rng + ?Sized>(
    rng: &mut R,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<String> {
    if start > end {
        return Err(Error::EmptyDomain("date range"));
    }

    let start_ms = start.and_time(NaiveTime::MIN).and_utc().timestamp_millis();
    let end_ms = end.and_time(NaiveTime::MIN).and_utc().timestamp_millis();
    let picked = rng.gen_range(start_ms..=end_ms);

    let date = DateTime::from_timestamp_millis(picked)
        .map(|dt| dt.date_naive())
        .unwrap_or(start);
    Ok(date.format("%Y-%m-%d").to_string())
}

/// `prefix` followed by a number in `0..max_exclusive`, zero-padded to `width` digits.
pub fn random_padded_id<R: Rng + ?Sized>(
    rng: &mut R,
    prefix: &str,
    width: usize,
    max_exclusive: u64,
) -> Result<String> {
    if max_exclusive == 0 {
        return Err(Error::EmptyDomain("id range"));
    }
    let n = rng.gen_range(0..max_exclusive);
    Ok(format!("{prefix}{n:0width$}"))
}

pub fn random_email<R: Rng + ?Sized>(rng: &mut R) -> String {
    let mut out = String::with_capacity(EMAIL_LOCAL_LEN + 1 + 11);
    for _ in 0..EMAIL_LOCAL_LEN {
        let idx = rng.gen_range(0..EMAIL_LOCAL_CHARS.len());
        out.push(char::from(EMAIL_LOCAL_CHARS[idx]));
    }
    out.push('@');
    out.push_str(EMAIL_DOMAINS[rng.gen_range(0..EMAIL_DOMAINS.len())]);
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct CalendarDate {
    pub year: i32,
    pub month: u32,
    pub day: u32,
}

impl fmt::Display for CalendarDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}-{:02}", self.year, self.month, self.day)
    }
}

#[must_use]
pub fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

#[must_use]
pub fn days_in_month(year: i32, month: u32) -> u32 {
    match month {
        2 if is_leap_year(year) => 29,
        2 => 28,
        4 | 6 | 9 | 11 => 30,
        _ => 31,
    }
}

/// Year uniform in `year_low..=year_high`, then month, then a day valid for that month.
pub fn random_calendar_date<R: Rng + ?Sized>(
    rng: &mut R,
    year_low: i32,
    year_high: i32,
) -> Result<CalendarDate> {
    if year_low > year_high {
        return Err(Error::EmptyDomain("year range"));
    }

    let year = rng.gen_range(year_low..=year_high);
    let month = rng.gen_range(1..=12);
    let day = rng.gen_range(1..=days_in_month(year, month));
    Ok(CalendarDate { year, month, day })
}

pub fn random_choice<'a, T, R: Rng + ?Sized>(rng: &mut R, items: &'a [T]) -> Result<&'a T> {
    items.choose(rng).ok_or(Error::EmptyDomain("candidate list"))
}
