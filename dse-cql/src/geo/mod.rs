//! DSE geospatial types: points, line strings and polygons.
//!
//! On the wire, values of the custom types [`POINT_TYPE`], [`LINE_STRING_TYPE`]
//! and [`POLYGON_TYPE`] are WKB (Well-Known Binary) blobs:
//!
//! ```text
//! header:      byte order marker (u8) | geometry type (u32)
//! point:       header | x (f64) | y (f64)
//! line string: header | num points (u32) | points...
//! polygon:     header | num rings (u32) | (num points (u32) | points...)...
//! ```
//!
//! Multi-byte fields use the byte order given by the marker. Values are
//! always encoded in the native byte order of the host; decoding accepts
//! both orders. Each geometry can also be read from and rendered to WKT.

use std::fmt;

use byteorder::{BigEndian, LittleEndian, ReadBytesExt};
use bytes::{BufMut, Bytes, BytesMut};

use crate::errors::CodecError;
use crate::types::DataType;
use crate::utils::validate_custom_type;

pub mod line_string;
pub mod polygon;
pub mod wkt;

pub use line_string::{LineString, LineStringIterator};
pub use polygon::{Polygon, PolygonIterator};
pub use wkt::{WktLexer, WktToken};

pub const POINT_TYPE: &str = "org.apache.cassandra.db.marshal.PointType";
pub const LINE_STRING_TYPE: &str = "org.apache.cassandra.db.marshal.LineStringType";
pub const POLYGON_TYPE: &str = "org.apache.cassandra.db.marshal.PolygonType";

pub(crate) const WKB_HEADER_SIZE: usize = 1 + 4;
pub(crate) const WKB_POINT_SIZE: usize = WKB_HEADER_SIZE + 2 * 8;
// Header followed by the number of points (line string) or rings (polygon).
pub(crate) const WKB_LINE_STRING_HEADER_SIZE: usize = WKB_HEADER_SIZE + 4;
pub(crate) const WKB_POLYGON_HEADER_SIZE: usize = WKB_HEADER_SIZE + 4;

const POINT_SIZE: usize = 2 * 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum WkbGeometryType {
    Point = 1,
    LineString = 2,
    Polygon = 3,
    MultiPoint = 4,
    MultiLineString = 5,
    MultiPolygon = 6,
    GeometryCollection = 7,
}

impl TryFrom<u32> for WkbGeometryType {
    type Error = CodecError;

    fn try_from(code: u32) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(WkbGeometryType::Point),
            2 => Ok(WkbGeometryType::LineString),
            3 => Ok(WkbGeometryType::Polygon),
            4 => Ok(WkbGeometryType::MultiPoint),
            5 => Ok(WkbGeometryType::MultiLineString),
            6 => Ok(WkbGeometryType::MultiPolygon),
            7 => Ok(WkbGeometryType::GeometryCollection),
            _ => Err(CodecError::InvalidData(format!(
                "unknown WKB geometry type {}",
                code
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WkbByteOrder {
    BigEndian = 0,
    LittleEndian = 1,
}

impl WkbByteOrder {
    /// The byte order of the host, used for everything this crate encodes.
    pub fn native() -> Self {
        if cfg!(target_endian = "big") {
            WkbByteOrder::BigEndian
        } else {
            WkbByteOrder::LittleEndian
        }
    }

    fn from_marker(marker: u8) -> Result<Self, CodecError> {
        match marker {
            0 => Ok(WkbByteOrder::BigEndian),
            1 => Ok(WkbByteOrder::LittleEndian),
            _ => Err(CodecError::InvalidData(format!(
                "invalid WKB byte order marker {}",
                marker
            ))),
        }
    }

    pub(crate) fn u32_bytes(self, v: u32) -> [u8; 4] {
        match self {
            WkbByteOrder::BigEndian => v.to_be_bytes(),
            WkbByteOrder::LittleEndian => v.to_le_bytes(),
        }
    }
}

pub(crate) fn write_header(geometry_type: WkbGeometryType, buf: &mut impl BufMut) {
    let byte_order = WkbByteOrder::native();
    buf.put_u8(byte_order as u8);
    write_u32(geometry_type as u32, byte_order, buf);
}

/// Reads the header and checks that it announces `expected`, returning the
/// byte order of the rest of the value.
pub(crate) fn read_header(
    buf: &mut &[u8],
    expected: WkbGeometryType,
) -> Result<WkbByteOrder, CodecError> {
    if buf.len() < WKB_HEADER_SIZE {
        return Err(CodecError::not_enough_data(WKB_HEADER_SIZE, buf.len()));
    }
    let byte_order = WkbByteOrder::from_marker(buf[0])?;
    *buf = &buf[1..];
    let code = read_u32(buf, byte_order)?;
    if code != expected as u32 {
        return Err(CodecError::InvalidData(format!(
            "expected WKB geometry type {} ({:?}), got {}",
            expected as u32, expected, code
        )));
    }
    Ok(byte_order)
}

pub(crate) fn write_u32(v: u32, byte_order: WkbByteOrder, buf: &mut impl BufMut) {
    match byte_order {
        WkbByteOrder::BigEndian => buf.put_u32(v),
        WkbByteOrder::LittleEndian => buf.put_u32_le(v),
    }
}

pub(crate) fn write_point(x: f64, y: f64, buf: &mut impl BufMut) {
    match WkbByteOrder::native() {
        WkbByteOrder::BigEndian => {
            buf.put_f64(x);
            buf.put_f64(y);
        }
        WkbByteOrder::LittleEndian => {
            buf.put_f64_le(x);
            buf.put_f64_le(y);
        }
    }
}

pub(crate) fn read_u32(buf: &mut &[u8], byte_order: WkbByteOrder) -> Result<u32, CodecError> {
    let received = buf.len();
    match byte_order {
        WkbByteOrder::BigEndian => buf.read_u32::<BigEndian>(),
        WkbByteOrder::LittleEndian => buf.read_u32::<LittleEndian>(),
    }
    .map_err(|_| CodecError::not_enough_data(4, received))
}

fn read_f64(buf: &mut &[u8], byte_order: WkbByteOrder) -> Result<f64, CodecError> {
    let received = buf.len();
    match byte_order {
        WkbByteOrder::BigEndian => buf.read_f64::<BigEndian>(),
        WkbByteOrder::LittleEndian => buf.read_f64::<LittleEndian>(),
    }
    .map_err(|_| CodecError::not_enough_data(8, received))
}

pub(crate) fn read_point(buf: &mut &[u8], byte_order: WkbByteOrder) -> Result<Point, CodecError> {
    if buf.len() < POINT_SIZE {
        return Err(CodecError::not_enough_data(POINT_SIZE, buf.len()));
    }
    let x = read_f64(buf, byte_order)?;
    let y = read_f64(buf, byte_order)?;
    Ok(Point { x, y })
}

/// Size in bytes of `num_points` encoded points.
pub(crate) fn points_size(num_points: u32) -> Result<usize, CodecError> {
    usize::try_from(num_points)
        .ok()
        .and_then(|n| n.checked_mul(POINT_SIZE))
        .ok_or_else(|| CodecError::InvalidData(format!("too many points: {}", num_points)))
}

/// Renders the coordinates of a point the way they appear in WKT, e.g. `1.5 -2`.
pub(crate) struct WktCoordinates<'a>(pub(crate) &'a Point);

impl fmt::Display for WktCoordinates<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", WktNumber(self.0.x), WktNumber(self.0.y))
    }
}

/// Shortest text that reads back to the same `f64`, with an exponent for
/// very large and very small magnitudes: `1e300` rather than 301 digits.
///
/// Infinities and NaN have no WKT form; they render as `inf` and `NaN`,
/// which the WKT readers reject.
struct WktNumber(f64);

impl fmt::Display for WktNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let magnitude = self.0.abs();
        if self.0.is_finite() && magnitude != 0.0 && !(1e-5..1e16).contains(&magnitude) {
            write!(f, "{:e}", self.0)
        } else {
            write!(f, "{}", self.0)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn encode(&self) -> Bytes {
        encode_point(self.x, self.y)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        if bytes.len() < WKB_POINT_SIZE {
            return Err(CodecError::not_enough_data(WKB_POINT_SIZE, bytes.len()));
        }
        let mut buf = bytes;
        let byte_order = read_header(&mut buf, WkbGeometryType::Point)?;
        read_point(&mut buf, byte_order)
    }

    /// Decodes a value of a column, which has to be of the point type.
    pub fn decode_value(typ: &DataType, bytes: &[u8]) -> Result<Self, CodecError> {
        validate_custom_type(typ, POINT_TYPE)?;
        Self::decode(bytes)
    }

    /// Renders the point as WKT, e.g. `POINT (1.5 2)`.
    pub fn to_wkt(&self) -> String {
        self.to_string()
    }

    /// Parses `POINT (x y)`. Text following the closing parenthesis is ignored.
    pub fn from_wkt(text: &str) -> Result<Self, CodecError> {
        let bad = || CodecError::BadParams(format!("invalid WKT point: {:?}", text));

        let mut lexer = WktLexer::new(text, false);
        if lexer.next_token() != WktToken::TypePoint || lexer.next_token() != WktToken::OpenParen
        {
            return Err(bad());
        }
        if lexer.next_token() != WktToken::Number {
            return Err(bad());
        }
        let x = lexer.number();
        if lexer.next_token() != WktToken::Number {
            return Err(bad());
        }
        let y = lexer.number();
        if lexer.next_token() != WktToken::CloseParen {
            return Err(bad());
        }
        Ok(Self { x, y })
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "POINT ({})", WktCoordinates(self))
    }
}

/// Encodes a point as a 21-byte WKB blob in native byte order.
pub fn encode_point(x: f64, y: f64) -> Bytes {
    let mut buf = BytesMut::with_capacity(WKB_POINT_SIZE);
    write_header(WkbGeometryType::Point, &mut buf);
    write_point(x, y, &mut buf);
    buf.freeze()
}


#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::test_helpers::big_endian_blob;
    use super::*;
    use crate::types::NativeType;

    #[test]
    fn test_point_round_trip_is_bit_exact() {
        let coords = [
            (0.0, 0.0),
            (-0.0, 1.0),
            (1.5, -2.25),
            (0.1, 0.2),
            (f64::MAX, f64::MIN_POSITIVE),
            (f64::EPSILON, -1e-300),
            (f64::INFINITY, f64::NEG_INFINITY),
        ];
        for (x, y) in coords {
            let bytes = encode_point(x, y);
            assert_eq!(bytes.len(), WKB_POINT_SIZE);
            assert_eq!(bytes[0], WkbByteOrder::native() as u8);

            let point = Point::decode(&bytes).unwrap();
            assert_eq!(point.x.to_bits(), x.to_bits());
            assert_eq!(point.y.to_bits(), y.to_bits());
        }

        let nan = Point::decode(&encode_point(f64::NAN, 1.0)).unwrap();
        assert!(nan.x.is_nan());
    }

    #[test]
    fn test_point_decode_big_endian() {
        let blob = big_endian_blob(WkbGeometryType::Point, &[Err(1.0), Err(-2.5)]);
        assert_eq!(Point::decode(&blob).unwrap(), Point::new(1.0, -2.5));
    }

    #[test]
    fn test_point_decode_errors() {
        let bytes = encode_point(1.0, 2.0);
        for len in 0..bytes.len() {
            assert_matches!(
                Point::decode(&bytes[..len]),
                Err(CodecError::NotEnoughData { expected: WKB_POINT_SIZE, received }) if received == len
            );
        }

        let blob = big_endian_blob(WkbGeometryType::LineString, &[Err(1.0), Err(2.0)]);
        assert_matches!(Point::decode(&blob), Err(CodecError::InvalidData(_)));

        let mut blob = big_endian_blob(WkbGeometryType::Point, &[Err(1.0), Err(2.0)]);
        blob[0] = 2;
        assert_matches!(Point::decode(&blob), Err(CodecError::InvalidData(_)));
    }

    #[test]
    fn test_point_decode_value_checks_type() {
        let bytes = encode_point(3.0, 4.0);
        let point_type = DataType::Custom(POINT_TYPE.to_owned());
        assert_eq!(
            Point::decode_value(&point_type, &bytes).unwrap(),
            Point::new(3.0, 4.0)
        );

        let line_string_type = DataType::Custom(LINE_STRING_TYPE.to_owned());
        assert_matches!(
            Point::decode_value(&line_string_type, &bytes),
            Err(CodecError::BadParams(_))
        );
        assert_matches!(
            Point::decode_value(&DataType::Native(NativeType::Blob), &bytes),
            Err(CodecError::BadParams(_))
        );
    }

    #[test]
    fn test_point_wkt() {
        let point = Point::new(1.5, -2.0);
        assert_eq!(point.to_wkt(), "POINT (1.5 -2)");
        assert_eq!(Point::from_wkt(&point.to_wkt()).unwrap(), point);

        let precise = Point::new(0.1 + 0.2, 1.0 / 3.0);
        assert_eq!(Point::from_wkt(&precise.to_wkt()).unwrap(), precise);

        let extreme = Point::new(1e300, -1e-300);
        assert_eq!(extreme.to_wkt(), "POINT (1e300 -1e-300)");
        assert_eq!(Point::from_wkt(&extreme.to_wkt()).unwrap(), extreme);
        let tiny = Point::new(f64::MIN_POSITIVE, -f64::MAX);
        assert_eq!(Point::from_wkt(&tiny.to_wkt()).unwrap(), tiny);
        assert_eq!(Point::new(1e15, 1e-5).to_wkt(), "POINT (1000000000000000 0.00001)");
        assert_eq!(Point::new(1e16, 1e-6).to_wkt(), "POINT (1e16 1e-6)");

        for point in [
            Point::new(f64::INFINITY, 0.0),
            Point::new(0.0, f64::NEG_INFINITY),
            Point::new(f64::NAN, 1.0),
        ] {
            let wkt = point.to_wkt();
            assert_matches!(Point::from_wkt(&wkt), Err(CodecError::BadParams(_)), "wkt: {}", wkt);
            // The binary form carries them unchanged.
            let decoded = Point::decode(&point.encode()).unwrap();
            assert_eq!(decoded.x.to_bits(), point.x.to_bits());
            assert_eq!(decoded.y.to_bits(), point.y.to_bits());
        }

        assert_eq!(
            Point::from_wkt("  POINT(3 4) trailing junk").unwrap(),
            Point::new(3.0, 4.0)
        );
        for text in [
            "",
            "point (1 2)",
            "junk POINT (1 2)",
            "POINT EMPTY",
            "POINT (1)",
            "POINT (1 2",
            "POINT (1 2 3)",
            "LINESTRING (1 2)",
        ] {
            assert_matches!(
                Point::from_wkt(text),
                Err(CodecError::BadParams(_)),
                "text: {}",
                text
            );
        }
    }

    #[test]
    fn test_geometry_type_codes() {
        assert_eq!(
            WkbGeometryType::try_from(3).unwrap(),
            WkbGeometryType::Polygon
        );
        assert_eq!(
            WkbGeometryType::try_from(7).unwrap(),
            WkbGeometryType::GeometryCollection
        );
        assert_matches!(
            WkbGeometryType::try_from(0),
            Err(CodecError::InvalidData(_))
        );
    }
}
