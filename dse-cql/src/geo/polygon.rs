use std::fmt;

use bytes::{Bytes, BytesMut};
use itertools::Itertools;

use super::line_string::read_text_point;
use super::wkt::{count_points, WktLexer, WktToken};
use super::{
    points_size, read_header, read_point, read_u32, write_header, write_point, write_u32,
    Point, WkbByteOrder, WkbGeometryType, WktCoordinates, POLYGON_TYPE, WKB_HEADER_SIZE,
    WKB_POLYGON_HEADER_SIZE,
};
use crate::errors::CodecError;
use crate::types::DataType;
use crate::utils::validate_custom_type;

/// Builder of a WKB-encoded polygon.
///
/// Points are added to the ring opened by the last [`Polygon::start_ring`].
/// Every ring must end up with either no points or at least three.
#[derive(Debug, Clone)]
pub struct Polygon {
    bytes: BytesMut,
    ring_sizes: Vec<u32>,
    // Offset of the point count of the last ring.
    ring_offset: usize,
}

impl Default for Polygon {
    fn default() -> Self {
        Self::new()
    }
}

impl Polygon {
    pub fn new() -> Self {
        let mut polygon = Self {
            bytes: BytesMut::with_capacity(WKB_POLYGON_HEADER_SIZE),
            ring_sizes: Vec::new(),
            ring_offset: 0,
        };
        polygon.reset();
        polygon
    }

    /// Removes all rings.
    pub fn reset(&mut self) {
        self.ring_sizes.clear();
        self.ring_offset = 0;
        self.bytes.clear();
        write_header(WkbGeometryType::Polygon, &mut self.bytes);
        write_u32(0, WkbByteOrder::native(), &mut self.bytes);
    }

    /// Makes room for `num_rings` more rings holding `total_points` points
    /// altogether.
    pub fn reserve(&mut self, num_rings: u32, total_points: u32) {
        let additional = (num_rings as usize)
            .saturating_mul(4)
            .saturating_add(points_size(total_points).unwrap_or(0));
        self.bytes.reserve(additional);
        self.ring_sizes.reserve(num_rings as usize);
    }

    /// Closes the current ring, if any, and opens a new one.
    ///
    /// Fails with `InvalidState`, leaving the current ring open, if that ring
    /// has one or two points.
    pub fn start_ring(&mut self) -> Result<(), CodecError> {
        self.finish_ring()?;
        self.open_ring();
        Ok(())
    }

    fn open_ring(&mut self) {
        self.ring_offset = self.bytes.len();
        write_u32(0, WkbByteOrder::native(), &mut self.bytes);
        self.ring_sizes.push(0);
    }

    fn finish_ring(&mut self) -> Result<(), CodecError> {
        let Some(&num_points) = self.ring_sizes.last() else {
            return Ok(());
        };
        if num_points == 1 || num_points == 2 {
            return Err(CodecError::InvalidState(
                "a polygon ring needs zero or at least three points",
            ));
        }
        let count = WkbByteOrder::native().u32_bytes(num_points);
        self.bytes[self.ring_offset..self.ring_offset + 4].copy_from_slice(&count);
        Ok(())
    }

    /// Adds a point to the current ring, opening the first ring if none
    /// was started.
    pub fn add_point(&mut self, x: f64, y: f64) {
        if self.ring_sizes.is_empty() {
            self.open_ring();
        }
        write_point(x, y, &mut self.bytes);
        if let Some(num_points) = self.ring_sizes.last_mut() {
            *num_points += 1;
        }
    }

    pub fn num_rings(&self) -> u32 {
        self.ring_sizes.len() as u32
    }

    /// Closes the last ring and writes the ring count into the header.
    pub fn finish(&mut self) -> Result<(), CodecError> {
        self.finish_ring()?;
        let count = WkbByteOrder::native().u32_bytes(self.num_rings());
        self.bytes[WKB_HEADER_SIZE..WKB_POLYGON_HEADER_SIZE].copy_from_slice(&count);
        Ok(())
    }

    /// The WKB encoding. Complete only after a successful [`Polygon::finish`].
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn to_bytes(&self) -> Bytes {
        Bytes::copy_from_slice(&self.bytes)
    }

    pub fn rings(&self) -> Vec<Vec<Point>> {
        let mut buf = &self.bytes[WKB_POLYGON_HEADER_SIZE..];
        let mut rings = Vec::with_capacity(self.ring_sizes.len());
        for &num_points in &self.ring_sizes {
            // The count slot may not be patched yet.
            buf = buf.get(4..).unwrap_or_default();
            let ring = (0..num_points)
                .map_while(|_| read_point(&mut buf, WkbByteOrder::native()).ok())
                .collect();
            rings.push(ring);
        }
        rings
    }

    /// Renders the polygon as WKT, e.g. `POLYGON ((0 0, 1 0, 1 1, 0 0))` or
    /// `POLYGON EMPTY`.
    pub fn to_wkt(&self) -> String {
        self.to_string()
    }

    pub fn from_wkt(text: &str) -> Result<Self, CodecError> {
        let mut iterator = PolygonIterator::new();
        iterator.reset_text(text)?;
        Self::from_iterator(iterator)
    }

    pub fn from_wkb(bytes: &[u8]) -> Result<Self, CodecError> {
        let mut iterator = PolygonIterator::new();
        iterator.reset_binary(bytes)?;
        Self::from_iterator(iterator)
    }

    fn from_iterator(mut iterator: PolygonIterator<'_>) -> Result<Self, CodecError> {
        let mut polygon = Self::new();
        for _ in 0..iterator.num_rings() {
            polygon.start_ring()?;
            let num_points = iterator.next_num_points()?;
            polygon.reserve(0, num_points);
            for _ in 0..num_points {
                let point = iterator.next_point()?;
                polygon.add_point(point.x, point.y);
            }
        }
        polygon.finish()?;
        Ok(polygon)
    }
}

impl fmt::Display for Polygon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.ring_sizes.is_empty() {
            return f.write_str("POLYGON EMPTY");
        }
        let rings = self.rings();
        write!(
            f,
            "POLYGON ({})",
            rings
                .iter()
                .format_with(", ", |ring, f| f(&format_args!(
                    "({})",
                    ring.iter().map(WktCoordinates).format(", ")
                )))
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RingState {
    NumPoints,
    Points { remaining: u32 },
    Done,
}

#[derive(Debug, Clone)]
enum RingSource<'a> {
    Empty,
    Binary {
        buf: &'a [u8],
        byte_order: WkbByteOrder,
    },
    // Positioned before the opening parenthesis of the next ring.
    Text(WktLexer<'a>),
}

/// Reads the rings of a polygon, either from its WKB encoding or from a WKT
/// literal.
///
/// For every ring, [`PolygonIterator::next_num_points`] must be called
/// first, followed by exactly that many calls to
/// [`PolygonIterator::next_point`]. Calls out of this order fail with
/// `InvalidState`.
#[derive(Debug, Clone)]
pub struct PolygonIterator<'a> {
    num_rings: u32,
    rings_remaining: u32,
    state: RingState,
    source: RingSource<'a>,
}

impl Default for PolygonIterator<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> PolygonIterator<'a> {
    pub fn new() -> Self {
        Self {
            num_rings: 0,
            rings_remaining: 0,
            state: RingState::Done,
            source: RingSource::Empty,
        }
    }

    /// Starts iterating over a WKB blob.
    ///
    /// Every ring is bounds checked up front: a blob shorter than its
    /// declared rings and points fails with `NotEnoughData`.
    pub fn reset_binary(&mut self, bytes: &'a [u8]) -> Result<(), CodecError> {
        if bytes.len() < WKB_POLYGON_HEADER_SIZE {
            return Err(CodecError::not_enough_data(
                WKB_POLYGON_HEADER_SIZE,
                bytes.len(),
            ));
        }
        let mut buf = bytes;
        let byte_order = read_header(&mut buf, WkbGeometryType::Polygon)?;
        let num_rings = read_u32(&mut buf, byte_order)?;
        let rings = buf;

        let mut expected = WKB_POLYGON_HEADER_SIZE;
        for _ in 0..num_rings {
            expected = expected.saturating_add(4);
            if buf.len() < 4 {
                return Err(CodecError::not_enough_data(expected, bytes.len()));
            }
            let num_points = read_u32(&mut buf, byte_order)?;
            let size = points_size(num_points)?;
            expected = expected.saturating_add(size);
            if buf.len() < size {
                return Err(CodecError::not_enough_data(expected, bytes.len()));
            }
            buf = &buf[size..];
        }

        let used = rings.len() - buf.len();
        self.set(
            num_rings,
            RingSource::Binary {
                buf: &rings[..used],
                byte_order,
            },
        );
        Ok(())
    }

    /// Like [`PolygonIterator::reset_binary`], but first checks that the
    /// value comes from a column of the polygon type.
    pub fn reset_value(&mut self, typ: &DataType, bytes: &'a [u8]) -> Result<(), CodecError> {
        validate_custom_type(typ, POLYGON_TYPE)?;
        self.reset_binary(bytes)
    }

    /// Starts iterating over a WKT literal such as
    /// `POLYGON ((0 0, 1 0, 1 1, 0 0), (0.5 0.5, 0.6 0.5, 0.6 0.6))`.
    /// `POLYGON EMPTY` and `POLYGON ()` have no rings. Fails with
    /// `BadParams` if the literal is malformed.
    pub fn reset_text(&mut self, text: &'a str) -> Result<(), CodecError> {
        let bad = || CodecError::BadParams(format!("invalid WKT polygon: {:?}", text));

        let mut lexer = WktLexer::new(text, true);
        if lexer.next_token() != WktToken::TypePolygon {
            return Err(bad());
        }
        match lexer.next_token() {
            WktToken::Empty => {
                self.set(0, RingSource::Empty);
                return Ok(());
            }
            WktToken::OpenParen => (),
            _ => return Err(bad()),
        }

        let mut num_rings = 0u32;
        let mut token = lexer.next_token();
        while token != WktToken::Eof && token != WktToken::CloseParen {
            if token != WktToken::OpenParen {
                return Err(bad());
            }
            count_points(&mut lexer).map_err(|_| bad())?;
            num_rings = num_rings.checked_add(1).ok_or_else(bad)?;

            token = lexer.next_token();
            if token == WktToken::Comma {
                token = lexer.next_token();
                if token != WktToken::OpenParen {
                    return Err(bad());
                }
            }
        }
        if token != WktToken::CloseParen {
            return Err(bad());
        }

        let mut lexer = WktLexer::new(text, false);
        lexer.next_token();
        lexer.next_token();
        self.set(num_rings, RingSource::Text(lexer));
        Ok(())
    }

    fn set(&mut self, num_rings: u32, source: RingSource<'a>) {
        self.num_rings = num_rings;
        self.rings_remaining = num_rings;
        self.state = if num_rings == 0 {
            RingState::Done
        } else {
            RingState::NumPoints
        };
        self.source = source;
    }

    pub fn num_rings(&self) -> u32 {
        self.num_rings
    }

    /// Moves to the next ring and returns its number of points.
    pub fn next_num_points(&mut self) -> Result<u32, CodecError> {
        if self.state != RingState::NumPoints {
            return Err(CodecError::InvalidState(
                "the points of the current ring have not all been read",
            ));
        }
        let num_points = match &mut self.source {
            RingSource::Empty => return Err(CodecError::InvalidState("no more rings")),
            RingSource::Binary { buf, byte_order } => read_u32(buf, *byte_order)?,
            RingSource::Text(lexer) => {
                if lexer.next_token() != WktToken::OpenParen {
                    return Err(CodecError::InvalidState("expected a ring in WKT text"));
                }
                let num_points = count_points(&mut lexer.with_skip_number(true))?;
                if num_points == 0 {
                    // Skip `)` and the following `,` or `)`.
                    lexer.next_token();
                    lexer.next_token();
                }
                num_points
            }
        };
        self.rings_remaining -= 1;
        self.state = if num_points > 0 {
            RingState::Points {
                remaining: num_points,
            }
        } else {
            self.end_of_ring()
        };
        Ok(num_points)
    }

    /// Returns the next point of the current ring.
    pub fn next_point(&mut self) -> Result<Point, CodecError> {
        let RingState::Points { remaining } = self.state else {
            return Err(CodecError::InvalidState(
                "next_num_points must be called before reading the points of a ring",
            ));
        };
        let point = match &mut self.source {
            RingSource::Empty => return Err(CodecError::InvalidState("no more points")),
            RingSource::Binary { buf, byte_order } => read_point(buf, *byte_order)?,
            RingSource::Text(lexer) => {
                let point = read_text_point(lexer)?;
                // Skip the following `,` or `)`.
                lexer.next_token();
                if remaining == 1 {
                    // The separator after the ring.
                    lexer.next_token();
                }
                point
            }
        };
        self.state = if remaining > 1 {
            RingState::Points {
                remaining: remaining - 1,
            }
        } else {
            self.end_of_ring()
        };
        Ok(point)
    }

    fn end_of_ring(&self) -> RingState {
        if self.rings_remaining == 0 {
            RingState::Done
        } else {
            RingState::NumPoints
        }
    }
}

impl Iterator for PolygonIterator<'_> {
    type Item = Vec<Point>;

    fn next(&mut self) -> Option<Vec<Point>> {
        let num_points = self.next_num_points().ok()?;
        (0..num_points).map(|_| self.next_point().ok()).collect()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.rings_remaining as usize;
        (remaining, Some(remaining))
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::geo::test_helpers::big_endian_blob;
    use crate::geo::LINE_STRING_TYPE;
    use crate::test_utils::setup_tracing;

    fn build(rings: &[&[(f64, f64)]]) -> Polygon {
        let mut polygon = Polygon::new();
        let total: usize = rings.iter().map(|ring| ring.len()).sum();
        polygon.reserve(rings.len() as u32, total as u32);
        for ring in rings {
            polygon.start_ring().unwrap();
            for (x, y) in *ring {
                polygon.add_point(*x, *y);
            }
        }
        polygon.finish().unwrap();
        polygon
    }

    fn collect(mut iterator: PolygonIterator<'_>) -> Vec<Vec<(f64, f64)>> {
        let mut rings = Vec::new();
        for _ in 0..iterator.num_rings() {
            let n = iterator.next_num_points().unwrap();
            let ring = (0..n)
                .map(|_| {
                    let p = iterator.next_point().unwrap();
                    (p.x, p.y)
                })
                .collect();
            rings.push(ring);
        }
        assert_matches!(iterator.next_num_points(), Err(CodecError::InvalidState(_)));
        assert_matches!(iterator.next_point(), Err(CodecError::InvalidState(_)));
        rings
    }

    const OUTER: [(f64, f64); 4] = [(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 0.0)];
    const INNER: [(f64, f64); 3] = [(1.0, 1.0), (2.5, 1.0), (1.0, -2.0)];

    #[test]
    fn test_binary_round_trip() {
        setup_tracing();
        let cases: [&[&[(f64, f64)]]; 5] = [
            &[],
            &[&OUTER],
            &[&OUTER, &INNER],
            &[&[], &INNER],
            &[&INNER, &[], &OUTER, &[]],
        ];
        for rings in cases {
            let polygon = build(rings);
            assert_eq!(polygon.num_rings(), rings.len() as u32);

            let mut iterator = PolygonIterator::new();
            iterator.reset_binary(polygon.bytes()).unwrap();
            assert_eq!(iterator.num_rings(), rings.len() as u32);
            let expected: Vec<Vec<_>> = rings.iter().map(|ring| ring.to_vec()).collect();
            assert_eq!(collect(iterator), expected);
        }
    }

    #[test]
    fn test_two_point_ring_fails_to_finish() {
        let mut polygon = Polygon::new();
        polygon.start_ring().unwrap();
        polygon.add_point(0.0, 0.0);
        polygon.add_point(1.0, 1.0);
        assert_matches!(polygon.finish(), Err(CodecError::InvalidState(_)));
        assert_matches!(polygon.start_ring(), Err(CodecError::InvalidState(_)));

        polygon.add_point(1.0, 0.0);
        polygon.finish().unwrap();
        assert_eq!(polygon.num_rings(), 1);
        assert_eq!(polygon.to_wkt(), "POLYGON ((0 0, 1 1, 1 0))");
    }

    #[test]
    fn test_one_point_ring_fails_to_start_next() {
        let mut polygon = Polygon::new();
        polygon.start_ring().unwrap();
        polygon.add_point(0.0, 0.0);
        assert_matches!(polygon.start_ring(), Err(CodecError::InvalidState(_)));
        assert_matches!(polygon.finish(), Err(CodecError::InvalidState(_)));
    }

    #[test]
    fn test_add_point_opens_first_ring() {
        let mut polygon = Polygon::new();
        for (x, y) in INNER {
            polygon.add_point(x, y);
        }
        polygon.finish().unwrap();
        assert_eq!(polygon.num_rings(), 1);
        assert_eq!(Polygon::from_wkb(polygon.bytes()).unwrap().bytes(), polygon.bytes());
    }

    #[test]
    fn test_no_rings() {
        let mut polygon = Polygon::new();
        polygon.finish().unwrap();
        assert_eq!(polygon.bytes().len(), WKB_POLYGON_HEADER_SIZE);
        assert_eq!(polygon.to_wkt(), "POLYGON EMPTY");

        for text in ["POLYGON EMPTY", "POLYGON ()", " POLYGON( ) junk"] {
            let parsed = Polygon::from_wkt(text).unwrap();
            assert_eq!(parsed.num_rings(), 0, "text: {}", text);
            assert_eq!(parsed.to_wkt(), "POLYGON EMPTY");
        }
    }

    #[test]
    fn test_reset_clears_rings() {
        let mut polygon = build(&[&OUTER, &INNER]);
        polygon.reset();
        polygon.finish().unwrap();
        assert_eq!(polygon.num_rings(), 0);
        assert_eq!(polygon.bytes().len(), WKB_POLYGON_HEADER_SIZE);
    }

    #[test]
    fn test_wkt() {
        let polygon = build(&[&OUTER, &[], &INNER]);
        let wkt = polygon.to_wkt();
        assert_eq!(
            wkt,
            "POLYGON ((0 0, 10 0, 10 10, 0 0), (), (1 1, 2.5 1, 1 -2))"
        );
        assert_eq!(Polygon::from_wkt(&wkt).unwrap().bytes(), polygon.bytes());
    }

    #[test]
    fn test_text_and_binary_agree() {
        let texts = [
            "POLYGON ((0 0, 10 0, 10 10, 0 0), (1 1, 2.5 1, 1 -2))",
            "POLYGON((1 2,3 4,5 6))  trailing",
            "POLYGON ((), (1 2, 3 4, 5 6), ())",
            "POLYGON EMPTY",
        ];
        for text in texts {
            let mut text_iterator = PolygonIterator::new();
            text_iterator.reset_text(text).unwrap();
            let from_text = collect(text_iterator);

            let polygon = Polygon::from_wkt(text).unwrap();
            let mut binary_iterator = PolygonIterator::new();
            binary_iterator.reset_binary(polygon.bytes()).unwrap();
            assert_eq!(collect(binary_iterator), from_text, "text: {}", text);
        }
    }

    #[test]
    fn test_malformed_text() {
        let texts = [
            "",
            "junk POLYGON ((1 2, 3 4, 5 6))",
            "polygon ((1 2, 3 4, 5 6))",
            "LINESTRING (1 2, 3 4)",
            "POLYGON",
            "POLYGON (1 2, 3 4, 5 6)",
            "POLYGON ((1 2, 3 4, 5 6)",
            "POLYGON ((1 2, 3 4, 5 6),)",
            "POLYGON ((1 2, 3 4, 5))",
            "POLYGON ((1 2, 3 4, 5 6) 7)",
        ];
        for text in texts {
            let mut iterator = PolygonIterator::new();
            assert_matches!(
                iterator.reset_text(text),
                Err(CodecError::BadParams(_)),
                "text: {}",
                text
            );
        }
    }

    #[test]
    fn test_truncated_blob_is_not_enough_data() {
        let polygon = build(&[&OUTER, &[], &INNER]);
        let bytes = polygon.bytes();
        for len in 0..bytes.len() {
            let mut iterator = PolygonIterator::new();
            assert_matches!(
                iterator.reset_binary(&bytes[..len]),
                Err(CodecError::NotEnoughData { received, .. }) if received == len,
                "len: {}",
                len
            );
        }
    }

    #[test]
    fn test_big_endian_blob() {
        let blob = big_endian_blob(
            WkbGeometryType::Polygon,
            &[
                Ok(2),
                Ok(3),
                Err(0.0),
                Err(0.0),
                Err(1.0),
                Err(0.0),
                Err(0.0),
                Err(1.0),
                Ok(0),
            ],
        );
        let polygon = Polygon::from_wkb(&blob).unwrap();
        assert_eq!(polygon.to_wkt(), "POLYGON ((0 0, 1 0, 0 1), ())");
    }

    #[test]
    fn test_wrong_geometry_type() {
        let line_string = big_endian_blob(WkbGeometryType::LineString, &[Ok(0)]);
        let mut iterator = PolygonIterator::new();
        assert_matches!(
            iterator.reset_binary(&line_string),
            Err(CodecError::InvalidData(_))
        );

        let polygon = build(&[&INNER]);
        let mut iterator = PolygonIterator::new();
        let typ = DataType::Custom(LINE_STRING_TYPE.to_owned());
        assert_matches!(
            iterator.reset_value(&typ, polygon.bytes()),
            Err(CodecError::BadParams(_))
        );
        let typ = DataType::Custom(POLYGON_TYPE.to_owned());
        iterator.reset_value(&typ, polygon.bytes()).unwrap();
        assert_eq!(iterator.num_rings(), 1);
    }

    #[test]
    fn test_calls_out_of_order() {
        let polygon = build(&[&INNER, &OUTER]);
        let mut iterator = PolygonIterator::new();
        iterator.reset_binary(polygon.bytes()).unwrap();

        assert_matches!(iterator.next_point(), Err(CodecError::InvalidState(_)));
        assert_eq!(iterator.next_num_points().unwrap(), 3);
        assert_matches!(iterator.next_num_points(), Err(CodecError::InvalidState(_)));
        for _ in 0..3 {
            iterator.next_point().unwrap();
        }
        assert_matches!(iterator.next_point(), Err(CodecError::InvalidState(_)));
        assert_eq!(iterator.next_num_points().unwrap(), 4);
    }

    #[test]
    fn test_iterator_impl() {
        let mut iterator = PolygonIterator::new();
        iterator
            .reset_text("POLYGON ((1 2, 3 4, 5 6), ())")
            .unwrap();
        assert_eq!(iterator.size_hint(), (2, Some(2)));
        let rings: Vec<Vec<Point>> = iterator.collect();
        assert_eq!(
            rings,
            vec![
                vec![Point::new(1.0, 2.0), Point::new(3.0, 4.0), Point::new(5.0, 6.0)],
                vec![],
            ]
        );

        assert_eq!(PolygonIterator::new().count(), 0);
    }
}
