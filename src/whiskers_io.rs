//! Binary `.whiskers` ancillary format reader/writer: an 11-byte NUL
//! terminated magic header followed by a concatenation of whiskers, each
//! three little-endian i32s (id, time, len) followed by four tightly
//! packed f32 arrays (x, y, thick, scores) of length `len`.

use std::io::{Read, Write};

use crate::error::WhiskersIoError;
use crate::types::WhiskerSegment;

const MAGIC: &[u8; 11] = b"bwhiskbin1\0";

pub fn write_whiskers<W: Write>(writer: &mut W, segments: &[WhiskerSegment]) -> Result<(), WhiskersIoError> {
    writer.write_all(MAGIC)?;
    for seg in segments {
        writer.write_all(&seg.id.to_le_bytes())?;
        writer.write_all(&seg.time.to_le_bytes())?;
        writer.write_all(&(seg.len() as i32).to_le_bytes())?;
        write_f32_array(writer, &seg.x)?;
        write_f32_array(writer, &seg.y)?;
        write_f32_array(writer, &seg.thick)?;
        write_f32_array(writer, &seg.scores)?;
    }
    Ok(())
}

fn write_f32_array<W: Write>(writer: &mut W, values: &[f32]) -> Result<(), WhiskersIoError> {
    for &v in values {
        writer.write_all(&v.to_le_bytes())?;
    }
    Ok(())
}

/// Reads whiskers until EOF. A trailing record cut off mid-way is an error
/// (`WhiskersIoError::Truncated`), not silently dropped.
pub fn read_whiskers<R: Read>(reader: &mut R) -> Result<Vec<WhiskerSegment>, WhiskersIoError> {
    let mut header = [0u8; 11];
    read_exact_or_eof(reader, &mut header)?.ok_or_else(|| WhiskersIoError::Truncated {
        expected: 11,
        found: 0,
    })?;
    if &header != MAGIC {
        return Err(WhiskersIoError::BadHeader {
            expected: MAGIC.to_vec(),
            found: header.to_vec(),
        });
    }

    let mut segments = Vec::new();
    loop {
        let mut header_buf = [0u8; 12];
        match read_exact_or_eof(reader, &mut header_buf)? {
            None => break,
            Some(()) => {}
        }
        let id = i32::from_le_bytes(header_buf[0..4].try_into().unwrap());
        let time = i32::from_le_bytes(header_buf[4..8].try_into().unwrap());
        let len = i32::from_le_bytes(header_buf[8..12].try_into().unwrap()) as usize;

        let x = read_f32_array(reader, len)?;
        let y = read_f32_array(reader, len)?;
        let thick = read_f32_array(reader, len)?;
        let scores = read_f32_array(reader, len)?;

        segments.push(WhiskerSegment {
            id,
            time,
            x,
            y,
            thick,
            scores,
        });
    }
    Ok(segments)
}

fn read_f32_array<R: Read>(reader: &mut R, len: usize) -> Result<Vec<f32>, WhiskersIoError> {
    let mut bytes = vec![0u8; len * 4];
    reader.read_exact(&mut bytes).map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            WhiskersIoError::Truncated {
                expected: len * 4,
                found: 0,
            }
        } else {
            WhiskersIoError::Io(e)
        }
    })?;
    Ok(bytes.chunks_exact(4).map(|c| f32::from_le_bytes(c.try_into().unwrap())).collect())
}

/// Like `read_exact`, but returns `Ok(None)` on a clean EOF (zero bytes
/// read before any partial fill) and an error on a short read partway
/// through the buffer.
fn read_exact_or_eof<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<Option<()>, WhiskersIoError> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..])?;
        if n == 0 {
            if filled == 0 {
                return Ok(None);
            }
            return Err(WhiskersIoError::Truncated {
                expected: buf.len(),
                found: filled,
            });
        }
        filled += n;
    }
    Ok(Some(()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> WhiskerSegment {
        WhiskerSegment {
            id: 3,
            time: 7,
            x: vec![1.0, 2.0, 3.0],
            y: vec![1.5, 2.5, 3.5],
            thick: vec![2.0, 2.0, 2.0],
            scores: vec![-1.0, -1.1, -1.2],
        }
    }

    #[test]
    fn round_trips_a_single_whisker() {
        let segs = vec![sample()];
        let mut buf = Vec::new();
        write_whiskers(&mut buf, &segs).unwrap();
        let back = read_whiskers(&mut buf.as_slice()).unwrap();
        assert_eq!(back, segs);
    }

    #[test]
    fn round_trips_multiple_whiskers_and_an_empty_file() {
        let segs = vec![sample(), WhiskerSegment { id: 9, ..sample() }];
        let mut buf = Vec::new();
        write_whiskers(&mut buf, &segs).unwrap();
        let back = read_whiskers(&mut buf.as_slice()).unwrap();
        assert_eq!(back, segs);

        let mut empty = Vec::new();
        write_whiskers(&mut empty, &[]).unwrap();
        let back_empty = read_whiskers(&mut empty.as_slice()).unwrap();
        assert!(back_empty.is_empty());
    }

    #[test]
    fn rejects_bad_header() {
        let mut buf = b"not-a-header".to_vec();
        assert!(matches!(read_whiskers(&mut buf.as_slice()), Err(WhiskersIoError::BadHeader { .. })));
    }

    #[test]
    fn rejects_truncated_trailing_record() {
        let segs = vec![sample()];
        let mut buf = Vec::new();
        write_whiskers(&mut buf, &segs).unwrap();
        buf.truncate(buf.len() - 4);
        assert!(matches!(read_whiskers(&mut buf.as_slice()), Err(WhiskersIoError::Truncated { .. })));
    }
}
