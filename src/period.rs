//! Period keys for statistical series.
//!
//! A `Period` is a calendar slot at a fixed granularity (year, quarter or
//! month). Labels from statistical sources come in many spellings; they are
//! parsed leniently against a declared granularity and always displayed in
//! one canonical form (`2023`, `2023-Q1`, `2023-01`).

use crate::error::{NowcastError, Result};
use chrono::{Datelike, NaiveDate};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

lazy_static! {
    static ref MONTHLY_DELIMITED: Regex =
        Regex::new(r"^(\d{4})\s*[-/.]\s*(\d{1,2})(?:\s*[-/.]\s*\d{1,2})?$").unwrap();
    static ref MONTHLY_COMPACT: Regex = Regex::new(r"^(\d{4})(\d{2})$").unwrap();
    static ref MONTHLY_KANJI: Regex = Regex::new(r"^(\d{4})年\s*(\d{1,2})月分?$").unwrap();
    static ref QUARTERLY: Regex = Regex::new(r"(?i)^(\d{4})\s*[-_ ]?\s*q([1-4])$").unwrap();
    static ref ANNUAL: Regex = Regex::new(r"(?i)^(?:fy\s*)?(\d{4})\s*(?:年度?)?$").unwrap();
    /// e-Stat time codes: YYYY + "00" (calendar) or "10" (fiscal year) + first month + last
    /// month. "2023000000" is calendar 2023, "2023100000" fiscal 2023.
    static ref ESTAT_TIME_CODE: Regex = Regex::new(r"^(\d{4})(00|10)(\d{2})(\d{2})$").unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    Annual,
    Quarterly,
    Monthly,
}

impl Granularity {
    pub fn periods_per_year(self) -> u32 {
        match self {
            Granularity::Annual => 1,
            Granularity::Quarterly => 4,
            Granularity::Monthly => 12,
        }
    }

    pub fn months_per_period(self) -> u32 {
        12 / self.periods_per_year()
    }

    fn expected_format(self) -> &'static str {
        match self {
            Granularity::Annual => "a year such as 2023, 2023年 or 2023000000",
            Granularity::Quarterly => "a quarter such as 2023-Q1 or 2023000103",
            Granularity::Monthly => "a month such as 2023-01, 202301, 2023年1月 or 2023000101",
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Granularity::Annual => "annual",
            Granularity::Quarterly => "quarterly",
            Granularity::Monthly => "monthly",
        };
        f.write_str(name)
    }
}

/// A calendar slot: `sub` is the 1-based month or quarter (always 1 for years).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Period {
    granularity: Granularity,
    year: i32,
    sub: u32,
}

impl Period {
    pub fn annual(year: i32) -> Self {
        Self { granularity: Granularity::Annual, year, sub: 1 }
    }

    pub fn quarterly(year: i32, quarter: u32) -> Result<Self> {
        Self::checked(Granularity::Quarterly, year, quarter)
    }

    pub fn monthly(year: i32, month: u32) -> Result<Self> {
        Self::checked(Granularity::Monthly, year, month)
    }

    fn checked(granularity: Granularity, year: i32, sub: u32) -> Result<Self> {
        if sub == 0 || sub > granularity.periods_per_year() {
            return Err(NowcastError::MalformedPeriod {
                label: format!("{}/{}", year, sub),
                expected: granularity.expected_format().to_string(),
            });
        }
        Ok(Self { granularity, year, sub })
    }

    /// The period of the given granularity that contains `date`.
    pub fn containing(date: NaiveDate, granularity: Granularity) -> Self {
        let sub = match granularity {
            Granularity::Annual => 1,
            Granularity::Quarterly => (date.month() - 1) / 3 + 1,
            Granularity::Monthly => date.month(),
        };
        Self { granularity, year: date.year(), sub }
    }

    /// Parse a source label against a declared granularity.
    pub fn parse(label: &str, granularity: Granularity) -> Result<Self> {
        let trimmed = label.trim();
        let malformed = || NowcastError::MalformedPeriod {
            label: label.to_string(),
            expected: granularity.expected_format().to_string(),
        };

        let (year, sub) = match granularity {
            Granularity::Annual => {
                if let Some(caps) = ANNUAL.captures(trimmed) {
                    (caps[1].parse().map_err(|_| malformed())?, 1)
                } else if let Some((year, _, first, last)) = estat_code(trimmed) {
                    if first != 0 || last != 0 {
                        return Err(malformed());
                    }
                    (year, 1)
                } else {
                    return Err(malformed());
                }
            }
            Granularity::Quarterly => {
                if let Some(caps) = QUARTERLY.captures(trimmed) {
                    let year = caps[1].parse().map_err(|_| malformed())?;
                    let quarter = caps[2].parse().map_err(|_| malformed())?;
                    (year, quarter)
                } else if let Some((year, false, first, last)) = estat_code(trimmed) {
                    if !(matches!(first, 1 | 4 | 7 | 10) && last == first + 2) {
                        return Err(malformed());
                    }
                    (year, (first - 1) / 3 + 1)
                } else {
                    return Err(malformed());
                }
            }
            Granularity::Monthly => {
                let caps = MONTHLY_DELIMITED
                    .captures(trimmed)
                    .or_else(|| MONTHLY_COMPACT.captures(trimmed))
                    .or_else(|| MONTHLY_KANJI.captures(trimmed));
                if let Some(caps) = caps {
                    let year = caps[1].parse().map_err(|_| malformed())?;
                    let month = caps[2].parse().map_err(|_| malformed())?;
                    (year, month)
                } else if let Some((year, false, first, last)) = estat_code(trimmed) {
                    if first != last {
                        return Err(malformed());
                    }
                    (year, first)
                } else {
                    return Err(malformed());
                }
            }
        };

        Self::checked(granularity, year, sub).map_err(|_| malformed())
    }

    pub fn granularity(&self) -> Granularity {
        self.granularity
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    /// Month (1-12) or quarter (1-4); 1 for annual periods
    pub fn sub_index(&self) -> u32 {
        self.sub
    }

    fn ordinal(&self) -> i64 {
        self.year as i64 * self.granularity.periods_per_year() as i64 + (self.sub as i64 - 1)
    }

    fn from_ordinal(granularity: Granularity, ordinal: i64) -> Self {
        let per_year = granularity.periods_per_year() as i64;
        Self {
            granularity,
            year: ordinal.div_euclid(per_year) as i32,
            sub: (ordinal.rem_euclid(per_year) + 1) as u32,
        }
    }

    pub fn offset(&self, periods: i64) -> Self {
        Self::from_ordinal(self.granularity, self.ordinal() + periods)
    }

    pub fn succ(&self) -> Self {
        self.offset(1)
    }

    /// Number of periods from `earlier` to `self` (negative if `earlier` is later).
    pub fn periods_since(&self, earlier: &Period) -> i64 {
        debug_assert_eq!(self.granularity, earlier.granularity);
        self.ordinal() - earlier.ordinal()
    }

    /// All periods from `start` to `end`, both included; empty if `end < start`.
    pub fn range_inclusive(start: Period, end: Period) -> Vec<Period> {
        let count = end.periods_since(&start);
        (0..=count).map(|step| start.offset(step)).collect()
    }
}

/// Inclusive span of calendar years requested from a statistics source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodRange {
    pub start_year: i32,
    pub end_year: i32,
}

impl PeriodRange {
    pub fn new(start_year: i32, end_year: i32) -> Result<Self> {
        if start_year > end_year {
            return Err(NowcastError::MalformedPeriod {
                label: format!("{}-{}", start_year, end_year),
                expected: "a start year no later than the end year".to_string(),
            });
        }
        Ok(Self { start_year, end_year })
    }

    /// e-Stat time codes bounding the range at the given granularity
    pub fn estat_bounds(&self, granularity: Granularity) -> (String, String) {
        let (from, to) = match granularity {
            Granularity::Annual => ("000000", "000000"),
            Granularity::Quarterly => ("000103", "001012"),
            Granularity::Monthly => ("000101", "001212"),
        };
        (
            format!("{:04}{}", self.start_year, from),
            format!("{:04}{}", self.end_year, to),
        )
    }
}

/// (year, fiscal, first month, last month)
fn estat_code(label: &str) -> Option<(i32, bool, u32, u32)> {
    let caps = ESTAT_TIME_CODE.captures(label)?;
    Some((
        caps[1].parse().ok()?,
        &caps[2] == "10",
        caps[3].parse().ok()?,
        caps[4].parse().ok()?,
    ))
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.granularity {
            Granularity::Annual => write!(f, "{:04}", self.year),
            Granularity::Quarterly => write!(f, "{:04}-Q{}", self.year, self.sub),
            Granularity::Monthly => write!(f, "{:04}-{:02}", self.year, self.sub),
        }
    }
}

/// Parses canonical labels only, inferring the granularity from the shape.
impl FromStr for Period {
    type Err = NowcastError;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let granularity = if trimmed.contains(['Q', 'q']) {
            Granularity::Quarterly
        } else if trimmed.len() == 4 {
            Granularity::Annual
        } else {
            Granularity::Monthly
        };
        Period::parse(trimmed, granularity)
    }
}

impl From<Period> for String {
    fn from(period: Period) -> Self {
        period.to_string()
    }
}

impl TryFrom<String> for Period {
    type Error = NowcastError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}
