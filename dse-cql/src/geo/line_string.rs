use std::fmt;

use bytes::{Bytes, BytesMut};
use itertools::Itertools;

use super::wkt::{count_points, WktLexer, WktToken};
use super::{
    points_size, read_header, read_point, read_u32, write_header, write_point, write_u32,
    Point, WkbByteOrder, WkbGeometryType, WktCoordinates, LINE_STRING_TYPE,
    WKB_HEADER_SIZE, WKB_LINE_STRING_HEADER_SIZE,
};
use crate::errors::CodecError;
use crate::types::DataType;
use crate::utils::validate_custom_type;

/// Builder of a WKB-encoded line string.
///
/// A line string has either no points or at least two. The point count in
/// the header is only filled in by [`LineString::finish`], which also
/// enforces that rule.
#[derive(Debug, Clone)]
pub struct LineString {
    bytes: BytesMut,
    num_points: u32,
}

impl Default for LineString {
    fn default() -> Self {
        Self::new()
    }
}

impl LineString {
    pub fn new() -> Self {
        let mut line_string = Self {
            bytes: BytesMut::with_capacity(WKB_LINE_STRING_HEADER_SIZE),
            num_points: 0,
        };
        line_string.reset();
        line_string
    }

    /// Removes all points.
    pub fn reset(&mut self) {
        self.num_points = 0;
        self.bytes.clear();
        write_header(WkbGeometryType::LineString, &mut self.bytes);
        // Placeholder for the number of points.
        write_u32(0, WkbByteOrder::native(), &mut self.bytes);
    }

    /// Makes room for `num_points` more points.
    pub fn reserve(&mut self, num_points: u32) {
        self.bytes.reserve(points_size(num_points).unwrap_or(0));
    }

    pub fn add_point(&mut self, x: f64, y: f64) {
        write_point(x, y, &mut self.bytes);
        self.num_points += 1;
    }

    pub fn num_points(&self) -> u32 {
        self.num_points
    }

    /// Writes the point count into the header. Fails for a line string of
    /// exactly one point.
    pub fn finish(&mut self) -> Result<(), CodecError> {
        if self.num_points == 1 {
            return Err(CodecError::InvalidState(
                "a line string needs zero or at least two points",
            ));
        }
        let count = WkbByteOrder::native().u32_bytes(self.num_points);
        self.bytes[WKB_HEADER_SIZE..WKB_LINE_STRING_HEADER_SIZE].copy_from_slice(&count);
        Ok(())
    }

    /// The WKB encoding. Complete only after a successful [`LineString::finish`].
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn to_bytes(&self) -> Bytes {
        Bytes::copy_from_slice(&self.bytes)
    }

    pub fn points(&self) -> Vec<Point> {
        let mut buf = &self.bytes[WKB_LINE_STRING_HEADER_SIZE..];
        let mut points = Vec::with_capacity(self.num_points as usize);
        while let Ok(point) = read_point(&mut buf, WkbByteOrder::native()) {
            points.push(point);
        }
        points
    }

    /// Renders the line string as WKT, e.g. `LINESTRING (0 0, 1 1)` or
    /// `LINESTRING EMPTY`.
    pub fn to_wkt(&self) -> String {
        self.to_string()
    }

    pub fn from_wkt(text: &str) -> Result<Self, CodecError> {
        let mut iterator = LineStringIterator::new();
        iterator.reset_text(text)?;
        Self::from_iterator(iterator)
    }

    pub fn from_wkb(bytes: &[u8]) -> Result<Self, CodecError> {
        let mut iterator = LineStringIterator::new();
        iterator.reset_binary(bytes)?;
        Self::from_iterator(iterator)
    }

    fn from_iterator(mut iterator: LineStringIterator<'_>) -> Result<Self, CodecError> {
        let mut line_string = Self::new();
        line_string.reserve(iterator.num_points());
        for _ in 0..iterator.num_points() {
            let point = iterator.next_point()?;
            line_string.add_point(point.x, point.y);
        }
        line_string.finish()?;
        Ok(line_string)
    }
}

impl fmt::Display for LineString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.num_points == 0 {
            return f.write_str("LINESTRING EMPTY");
        }
        let points = self.points();
        write!(
            f,
            "LINESTRING ({})",
            points.iter().map(WktCoordinates).format(", ")
        )
    }
}

#[derive(Debug, Clone, Default)]
enum PointSource<'a> {
    #[default]
    Empty,
    Binary {
        buf: &'a [u8],
        byte_order: WkbByteOrder,
    },
    // Positioned right after `LINESTRING (`.
    Text(WktLexer<'a>),
}

/// Reads the points of a line string, either from its WKB encoding or from
/// a WKT literal.
///
/// The whole input is validated when the iterator is reset, so the points
/// can then be pulled without further checks.
#[derive(Debug, Clone, Default)]
pub struct LineStringIterator<'a> {
    num_points: u32,
    remaining: u32,
    source: PointSource<'a>,
}

impl<'a> LineStringIterator<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts iterating over a WKB blob.
    ///
    /// Fails with `NotEnoughData` if the blob is shorter than its header and
    /// declared points require, and with `InvalidData` if it does not
    /// hold a line string.
    pub fn reset_binary(&mut self, bytes: &'a [u8]) -> Result<(), CodecError> {
        if bytes.len() < WKB_LINE_STRING_HEADER_SIZE {
            return Err(CodecError::not_enough_data(
                WKB_LINE_STRING_HEADER_SIZE,
                bytes.len(),
            ));
        }
        let mut buf = bytes;
        let byte_order = read_header(&mut buf, WkbGeometryType::LineString)?;
        let num_points = read_u32(&mut buf, byte_order)?;
        let size = points_size(num_points)?;
        if buf.len() < size {
            return Err(CodecError::not_enough_data(
                WKB_LINE_STRING_HEADER_SIZE.saturating_add(size),
                bytes.len(),
            ));
        }

        self.set(
            num_points,
            PointSource::Binary {
                buf: &buf[..size],
                byte_order,
            },
        );
        Ok(())
    }

    /// Like [`LineStringIterator::reset_binary`], but first checks that the
    /// value comes from a column of the line string type.
    pub fn reset_value(&mut self, typ: &DataType, bytes: &'a [u8]) -> Result<(), CodecError> {
        validate_custom_type(typ, LINE_STRING_TYPE)?;
        self.reset_binary(bytes)
    }

    /// Starts iterating over a WKT literal such as `LINESTRING (1 2, 3 4)`.
    /// Fails with `BadParams` if the literal is malformed.
    pub fn reset_text(&mut self, text: &'a str) -> Result<(), CodecError> {
        let bad = || CodecError::BadParams(format!("invalid WKT line string: {:?}", text));

        let mut lexer = WktLexer::new(text, true);
        if lexer.next_token() != WktToken::TypeLineString {
            return Err(bad());
        }
        match lexer.next_token() {
            WktToken::Empty => {
                self.set(0, PointSource::Empty);
                return Ok(());
            }
            WktToken::OpenParen => (),
            _ => return Err(bad()),
        }
        let num_points = count_points(&mut lexer).map_err(|_| bad())?;

        let mut lexer = WktLexer::new(text, false);
        lexer.next_token();
        lexer.next_token();
        self.set(num_points, PointSource::Text(lexer));
        Ok(())
    }

    fn set(&mut self, num_points: u32, source: PointSource<'a>) {
        self.num_points = num_points;
        self.remaining = num_points;
        self.source = source;
    }

    pub fn num_points(&self) -> u32 {
        self.num_points
    }

    /// Returns the next point, or fails with `InvalidState` once all points
    /// have been read.
    pub fn next_point(&mut self) -> Result<Point, CodecError> {
        if self.remaining == 0 {
            return Err(CodecError::InvalidState("no more points in the line string"));
        }
        let point = match &mut self.source {
            PointSource::Empty => {
                return Err(CodecError::InvalidState("no more points in the line string"))
            }
            PointSource::Binary { buf, byte_order } => read_point(buf, *byte_order)?,
            PointSource::Text(lexer) => {
                let point = read_text_point(lexer)?;
                // Skip the following `,` or `)`.
                lexer.next_token();
                point
            }
        };
        self.remaining -= 1;
        Ok(point)
    }
}

pub(crate) fn read_text_point(lexer: &mut WktLexer<'_>) -> Result<Point, CodecError> {
    let unexpected = || CodecError::InvalidState("expected a coordinate in WKT text");
    if lexer.next_token() != WktToken::Number {
        return Err(unexpected());
    }
    let x = lexer.number();
    if lexer.next_token() != WktToken::Number {
        return Err(unexpected());
    }
    Ok(Point { x, y: lexer.number() })
}

impl Iterator for LineStringIterator<'_> {
    type Item = Point;

    fn next(&mut self) -> Option<Point> {
        self.next_point().ok()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.remaining as usize;
        (remaining, Some(remaining))
    }
}
