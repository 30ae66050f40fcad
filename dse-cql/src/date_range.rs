//! DSE date ranges, values of the custom type [`DATE_RANGE_TYPE`].
//!
//! A date range is either a single date or a range between two dates, where
//! every date is given with a precision (a year, a month, ... a millisecond)
//! or is unbounded. On the wire it is a big-endian blob made of a tag byte
//! followed by the bounds the tag calls for:
//!
//! | tag | kind             | bounds         |
//! |-----|------------------|----------------|
//! | 0   | single date      | date           |
//! | 1   | closed range     | lower, upper   |
//! | 2   | open range high  | lower          |
//! | 3   | open range low   | upper          |
//! | 4   | both open range  |                |
//! | 5   | single date open |                |
//!
//! where every bound is a timestamp in milliseconds (i64) followed by its
//! precision (u8).

use std::fmt;

use byteorder::{BigEndian, ReadBytesExt};
use bytes::{BufMut, Bytes, BytesMut};
use chrono_04::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, TimeZone, Timelike, Utc};

use crate::errors::CodecError;
use crate::types::DataType;
use crate::utils::validate_custom_type;

pub const DATE_RANGE_TYPE: &str = "org.apache.cassandra.db.marshal.DateRangeType";

const BOUND_SIZE: usize = 8 + 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum DateRangePrecision {
    Year = 0,
    Month = 1,
    Day = 2,
    Hour = 3,
    Minute = 4,
    Second = 5,
    Millisecond = 6,
    /// An open end of a range. Never present in an encoded bound.
    Unbounded = 0xFF,
}

impl TryFrom<u8> for DateRangePrecision {
    type Error = CodecError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(DateRangePrecision::Year),
            1 => Ok(DateRangePrecision::Month),
            2 => Ok(DateRangePrecision::Day),
            3 => Ok(DateRangePrecision::Hour),
            4 => Ok(DateRangePrecision::Minute),
            5 => Ok(DateRangePrecision::Second),
            6 => Ok(DateRangePrecision::Millisecond),
            _ => Err(CodecError::InvalidData(format!(
                "invalid date range precision {}",
                value
            ))),
        }
    }
}

/// One end of a date range: a point in time, in milliseconds since the Unix
/// epoch, together with the precision it was given with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DateRangeBound {
    pub precision: DateRangePrecision,
    pub time_ms: i64,
}

impl DateRangeBound {
    pub fn new(precision: DateRangePrecision, time_ms: i64) -> Self {
        Self { precision, time_ms }
    }

    pub fn unbounded() -> Self {
        Self::new(DateRangePrecision::Unbounded, 0)
    }

    pub fn is_unbounded(&self) -> bool {
        self.precision == DateRangePrecision::Unbounded
    }

    /// A lower bound: `date_time` rounded down to `precision`.
    ///
    /// Returns `None` if the result is not representable.
    pub fn lower(precision: DateRangePrecision, date_time: DateTime<Utc>) -> Option<Self> {
        if precision == DateRangePrecision::Unbounded {
            return Some(Self::unbounded());
        }
        let start = truncate(precision, date_time.naive_utc())?;
        Some(Self::new(precision, Utc.from_utc_datetime(&start).timestamp_millis()))
    }

    /// An upper bound: the last millisecond of the `precision` unit holding
    /// `date_time`, e.g. `2016-02-29T23:59:59.999Z` for any date of
    /// February 2016 at month precision.
    ///
    /// Returns `None` if the result is not representable.
    pub fn upper(precision: DateRangePrecision, date_time: DateTime<Utc>) -> Option<Self> {
        if precision == DateRangePrecision::Unbounded {
            return Some(Self::unbounded());
        }
        let start = truncate(precision, date_time.naive_utc())?;
        let end = next_unit(precision, start)?.checked_sub_signed(Duration::try_milliseconds(1)?)?;
        Some(Self::new(precision, Utc.from_utc_datetime(&end).timestamp_millis()))
    }
}

fn truncate(precision: DateRangePrecision, date_time: NaiveDateTime) -> Option<NaiveDateTime> {
    let date = date_time.date();
    let (h, m, s) = (date_time.hour(), date_time.minute(), date_time.second());
    match precision {
        DateRangePrecision::Year => NaiveDate::from_ymd_opt(date.year(), 1, 1)?.and_hms_opt(0, 0, 0),
        DateRangePrecision::Month => {
            NaiveDate::from_ymd_opt(date.year(), date.month(), 1)?.and_hms_opt(0, 0, 0)
        }
        DateRangePrecision::Day => date.and_hms_opt(0, 0, 0),
        DateRangePrecision::Hour => date.and_hms_opt(h, 0, 0),
        DateRangePrecision::Minute => date.and_hms_opt(h, m, 0),
        DateRangePrecision::Second => date.and_hms_opt(h, m, s),
        DateRangePrecision::Millisecond => {
            date.and_hms_milli_opt(h, m, s, date_time.nanosecond() / 1_000_000)
        }
        DateRangePrecision::Unbounded => None,
    }
}

// Start of the unit following the one starting at `start`.
fn next_unit(precision: DateRangePrecision, start: NaiveDateTime) -> Option<NaiveDateTime> {
    let date = start.date();
    let step = match precision {
        DateRangePrecision::Year => {
            return NaiveDate::from_ymd_opt(date.year().checked_add(1)?, 1, 1)?.and_hms_opt(0, 0, 0)
        }
        DateRangePrecision::Month => {
            let (year, month) = match date.month() {
                12 => (date.year().checked_add(1)?, 1),
                month => (date.year(), month + 1),
            };
            return NaiveDate::from_ymd_opt(year, month, 1)?.and_hms_opt(0, 0, 0);
        }
        DateRangePrecision::Day => Duration::try_days(1)?,
        DateRangePrecision::Hour => Duration::try_hours(1)?,
        DateRangePrecision::Minute => Duration::try_minutes(1)?,
        DateRangePrecision::Second => Duration::try_seconds(1)?,
        DateRangePrecision::Millisecond => Duration::try_milliseconds(1)?,
        DateRangePrecision::Unbounded => return None,
    };
    start.checked_add_signed(step)
}

/// A bound of millisecond precision.
impl From<DateTime<Utc>> for DateRangeBound {
    fn from(value: DateTime<Utc>) -> Self {
        Self::new(DateRangePrecision::Millisecond, value.timestamp_millis())
    }
}

impl TryInto<DateTime<Utc>> for DateRangeBound {
    type Error = CodecError;

    fn try_into(self) -> Result<DateTime<Utc>, Self::Error> {
        if self.is_unbounded() {
            return Err(CodecError::InvalidState("an unbounded date has no time"));
        }
        match Utc.timestamp_millis_opt(self.time_ms) {
            chrono_04::LocalResult::Single(date_time) => Ok(date_time),
            _ => Err(CodecError::InvalidData(format!(
                "timestamp {} is out of range",
                self.time_ms
            ))),
        }
    }
}

/// Renders the bound as DSE does, down to its precision: `*` when
/// unbounded, otherwise e.g. `2017` or `2017-02-01T10:15:30.123Z`.
///
/// Years have at least four digits and never a `+` sign: `10000-01`, `-0001`.
impl fmt::Display for DateRangeBound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let after_year = match self.precision {
            DateRangePrecision::Unbounded => return f.write_str("*"),
            DateRangePrecision::Year => "",
            DateRangePrecision::Month => "-%m",
            DateRangePrecision::Day => "-%m-%d",
            DateRangePrecision::Hour => "-%m-%dT%H",
            DateRangePrecision::Minute => "-%m-%dT%H:%M",
            DateRangePrecision::Second => "-%m-%dT%H:%M:%S",
            DateRangePrecision::Millisecond => "-%m-%dT%H:%M:%S%.3fZ",
        };
        let date_time = match Utc.timestamp_millis_opt(self.time_ms) {
            chrono_04::LocalResult::Single(date_time) => date_time,
            _ => return write!(f, "{}", self.time_ms),
        };
        let year = date_time.year();
        if year < 0 {
            write!(f, "-{:04}", year.unsigned_abs())?;
        } else {
            write!(f, "{:04}", year)?;
        }
        write!(f, "{}", date_time.format(after_year))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DateRange {
    pub lower_bound: DateRangeBound,
    /// Unused for a single date.
    pub upper_bound: DateRangeBound,
    pub is_single_date: bool,
}

impl DateRange {
    pub fn single_date(date: DateRangeBound) -> Self {
        Self {
            lower_bound: date,
            upper_bound: DateRangeBound::unbounded(),
            is_single_date: true,
        }
    }

    pub fn range(lower_bound: DateRangeBound, upper_bound: DateRangeBound) -> Self {
        Self {
            lower_bound,
            upper_bound,
            is_single_date: false,
        }
    }

    pub fn encode(&self) -> Bytes {
        encode_date_range(self)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        decode_date_range(bytes)
    }

    /// Decodes a value of a column, which has to be of the date range type.
    pub fn decode_value(typ: &DataType, bytes: &[u8]) -> Result<Self, CodecError> {
        validate_custom_type(typ, DATE_RANGE_TYPE)?;
        decode_date_range(bytes)
    }
}

/// Renders the range in the DSE literal syntax, e.g. `2017-02-01`,
/// `[2017-02 TO 2018]` or `[* TO 2018]`.
impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_single_date {
            write!(f, "{}", self.lower_bound)
        } else {
            write!(f, "[{} TO {}]", self.lower_bound, self.upper_bound)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
enum DateRangeKind {
    SingleDate = 0,
    ClosedRange = 1,
    OpenRangeHigh = 2,
    OpenRangeLow = 3,
    BothOpenRange = 4,
    SingleDateOpen = 5,
}

impl DateRangeKind {
    fn of(range: &DateRange) -> Self {
        if range.is_single_date {
            return if range.lower_bound.is_unbounded() {
                DateRangeKind::SingleDateOpen
            } else {
                DateRangeKind::SingleDate
            };
        }
        match (
            range.lower_bound.is_unbounded(),
            range.upper_bound.is_unbounded(),
        ) {
            (true, true) => DateRangeKind::BothOpenRange,
            (true, false) => DateRangeKind::OpenRangeLow,
            (false, true) => DateRangeKind::OpenRangeHigh,
            (false, false) => DateRangeKind::ClosedRange,
        }
    }

    fn num_bounds(self) -> usize {
        match self {
            DateRangeKind::ClosedRange => 2,
            DateRangeKind::SingleDate
            | DateRangeKind::OpenRangeHigh
            | DateRangeKind::OpenRangeLow => 1,
            DateRangeKind::BothOpenRange | DateRangeKind::SingleDateOpen => 0,
        }
    }
}

impl TryFrom<u8> for DateRangeKind {
    type Error = CodecError;

    fn try_from(tag: u8) -> Result<Self, Self::Error> {
        match tag {
            0 => Ok(DateRangeKind::SingleDate),
            1 => Ok(DateRangeKind::ClosedRange),
            2 => Ok(DateRangeKind::OpenRangeHigh),
            3 => Ok(DateRangeKind::OpenRangeLow),
            4 => Ok(DateRangeKind::BothOpenRange),
            5 => Ok(DateRangeKind::SingleDateOpen),
            _ => Err(CodecError::InvalidData(format!(
                "invalid date range type {}",
                tag
            ))),
        }
    }
}

/// Encodes a date range, writing only the bounds that are not unbounded.
pub fn encode_date_range(range: &DateRange) -> Bytes {
    let kind = DateRangeKind::of(range);
    let mut buf = BytesMut::with_capacity(1 + kind.num_bounds() * BOUND_SIZE);
    buf.put_u8(kind as u8);

    let put_bound = |bound: &DateRangeBound, buf: &mut BytesMut| {
        buf.put_i64(bound.time_ms);
        buf.put_u8(bound.precision as u8);
    };
    match kind {
        DateRangeKind::SingleDate | DateRangeKind::OpenRangeHigh => {
            put_bound(&range.lower_bound, &mut buf)
        }
        DateRangeKind::OpenRangeLow => put_bound(&range.upper_bound, &mut buf),
        DateRangeKind::ClosedRange => {
            put_bound(&range.lower_bound, &mut buf);
            put_bound(&range.upper_bound, &mut buf);
        }
        DateRangeKind::BothOpenRange | DateRangeKind::SingleDateOpen => (),
    }
    buf.freeze()
}

/// Decodes a date range. The blob must hold exactly the bounds its tag
/// calls for.
pub fn decode_date_range(bytes: &[u8]) -> Result<DateRange, CodecError> {
    let Some(&tag) = bytes.first() else {
        return Err(CodecError::not_enough_data(1, 0));
    };
    let kind = DateRangeKind::try_from(tag)?;

    let expected = 1 + kind.num_bounds() * BOUND_SIZE;
    if bytes.len() < expected {
        return Err(CodecError::not_enough_data(expected, bytes.len()));
    }
    if bytes.len() > expected {
        return Err(CodecError::InvalidData(format!(
            "{} trailing bytes after a date range",
            bytes.len() - expected
        )));
    }

    let mut buf = &bytes[1..];
    let unbounded = DateRangeBound::unbounded();
    let range = match kind {
        DateRangeKind::SingleDate => DateRange::single_date(read_bound(&mut buf)?),
        DateRangeKind::SingleDateOpen => DateRange::single_date(unbounded),
        DateRangeKind::ClosedRange => {
            let lower = read_bound(&mut buf)?;
            DateRange::range(lower, read_bound(&mut buf)?)
        }
        DateRangeKind::OpenRangeHigh => DateRange::range(read_bound(&mut buf)?, unbounded),
        DateRangeKind::OpenRangeLow => DateRange::range(unbounded, read_bound(&mut buf)?),
        DateRangeKind::BothOpenRange => DateRange::range(unbounded, unbounded),
    };
    Ok(range)
}

fn read_bound(buf: &mut &[u8]) -> Result<DateRangeBound, CodecError> {
    let received = buf.len();
    let short = |_| CodecError::not_enough_data(BOUND_SIZE, received);
    let time_ms = buf.read_i64::<BigEndian>().map_err(short)?;
    let precision = buf.read_u8().map_err(short)?;
    Ok(DateRangeBound::new(
        DateRangePrecision::try_from(precision)?,
        time_ms,
    ))
}
