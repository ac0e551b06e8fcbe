//! Persisted keypoint records.
//!
//! Two encodings of the same logical content, one record per keypoint with
//! its descriptor. The text form is line-oriented and human-readable with
//! descriptor bits as 0/1 tokens; the binary form is a little-endian packed
//! layout behind a four-byte magic. The decoder sniffs the magic, so callers
//! do not need to know which form a file holds.

use crate::{AkazeError, AkazeResult};
use akaze_core::{BinaryDescriptor, Keypoint};
use std::path::Path;

const BINARY_MAGIC: &[u8; 4] = b"AKZB";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyfileFormat {
    /// Header line `count bit_len`, then one whitespace-separated record per
    /// line: x y size angle response octave class_id descriptor-bits
    Text,
    /// Magic, u32 count, u32 bit length, then packed little-endian records
    Binary,
}

/// Serialize keypoints and their descriptors to the text form
pub fn encode_text(keypoints: &[Keypoint], descriptors: &[BinaryDescriptor]) -> String {
    let bit_len = descriptors.first().map(|d| d.bit_len()).unwrap_or(0);
    let mut out = String::new();
    out.push_str(&format!("{} {}\n", keypoints.len(), bit_len));
    for (keypoint, descriptor) in keypoints.iter().zip(descriptors) {
        out.push_str(&format!(
            "{} {} {} {} {} {} {} ",
            keypoint.x,
            keypoint.y,
            keypoint.size,
            keypoint.angle,
            keypoint.response,
            keypoint.octave,
            keypoint.class_id
        ));
        for bit in 0..descriptor.bit_len() {
            out.push(if descriptor.bit(bit) { '1' } else { '0' });
        }
        out.push('\n');
    }
    out
}

fn text_error(line: usize, message: impl Into<String>) -> AkazeError {
    AkazeError::Keyfile {
        line,
        message: message.into(),
    }
}

fn parse_field<T: std::str::FromStr>(
    fields: &mut std::str::SplitWhitespace<'_>,
    line: usize,
    name: &str,
) -> AkazeResult<T> {
    let token = fields
        .next()
        .ok_or_else(|| text_error(line, format!("missing {} field", name)))?;
    token
        .parse()
        .map_err(|_| text_error(line, format!("unparseable {} field '{}'", name, token)))
}

/// Parse the text form
pub fn decode_text(content: &str) -> AkazeResult<(Vec<Keypoint>, Vec<BinaryDescriptor>)> {
    let mut lines = content.lines().enumerate();
    let (_, header) = lines
        .next()
        .ok_or_else(|| text_error(1, "empty keypoint file"))?;
    let mut header_fields = header.split_whitespace();
    let count: usize = parse_field(&mut header_fields, 1, "count")?;
    let bit_len: usize = parse_field(&mut header_fields, 1, "bit length")?;

    let mut keypoints = Vec::with_capacity(count);
    let mut descriptors = Vec::with_capacity(count);
    for (index, line) in lines.take(count) {
        let line_no = index + 1;
        let mut fields = line.split_whitespace();
        keypoints.push(Keypoint {
            x: parse_field(&mut fields, line_no, "x")?,
            y: parse_field(&mut fields, line_no, "y")?,
            size: parse_field(&mut fields, line_no, "size")?,
            angle: parse_field(&mut fields, line_no, "angle")?,
            response: parse_field(&mut fields, line_no, "response")?,
            octave: parse_field(&mut fields, line_no, "octave")?,
            class_id: parse_field(&mut fields, line_no, "class id")?,
        });

        let bits: &str = fields
            .next()
            .ok_or_else(|| text_error(line_no, "missing descriptor bits"))?;
        if bits.len() != bit_len {
            return Err(text_error(
                line_no,
                format!("expected {} descriptor bits, found {}", bit_len, bits.len()),
            ));
        }
        let mut descriptor = BinaryDescriptor::zeroed(bit_len);
        for (bit, ch) in bits.chars().enumerate() {
            match ch {
                '1' => descriptor.set_bit(bit),
                '0' => {}
                other => {
                    return Err(text_error(
                        line_no,
                        format!("invalid descriptor bit '{}'", other),
                    ))
                }
            }
        }
        descriptors.push(descriptor);
    }

    if keypoints.len() != count {
        return Err(text_error(
            keypoints.len() + 1,
            format!("expected {} records, found {}", count, keypoints.len()),
        ));
    }
    Ok((keypoints, descriptors))
}

/// Serialize keypoints and their descriptors to the binary form
pub fn encode_binary(keypoints: &[Keypoint], descriptors: &[BinaryDescriptor]) -> Vec<u8> {
    let bit_len = descriptors.first().map(|d| d.bit_len()).unwrap_or(0);
    let record = 5 * 4 + 4 + 8 + bit_len.div_ceil(8);
    let mut out = Vec::with_capacity(12 + record * keypoints.len());
    out.extend_from_slice(BINARY_MAGIC);
    out.extend_from_slice(&(keypoints.len() as u32).to_le_bytes());
    out.extend_from_slice(&(bit_len as u32).to_le_bytes());
    for (keypoint, descriptor) in keypoints.iter().zip(descriptors) {
        out.extend_from_slice(&keypoint.x.to_le_bytes());
        out.extend_from_slice(&keypoint.y.to_le_bytes());
        out.extend_from_slice(&keypoint.size.to_le_bytes());
        out.extend_from_slice(&keypoint.angle.to_le_bytes());
        out.extend_from_slice(&keypoint.response.to_le_bytes());
        out.extend_from_slice(&keypoint.octave.to_le_bytes());
        out.extend_from_slice(&(keypoint.class_id as u64).to_le_bytes());
        out.extend_from_slice(descriptor.as_bytes());
    }
    out
}

struct BinaryReader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> BinaryReader<'a> {
    fn take(&mut self, len: usize) -> AkazeResult<&'a [u8]> {
        let end = self.offset.checked_add(len).filter(|&e| e <= self.data.len());
        let end = end.ok_or_else(|| text_error(0, "truncated binary keypoint file"))?;
        let slice = &self.data[self.offset..end];
        self.offset = end;
        Ok(slice)
    }

    fn f32(&mut self) -> AkazeResult<f32> {
        let bytes = self.take(4)?;
        Ok(f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn u32(&mut self) -> AkazeResult<u32> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn u64(&mut self) -> AkazeResult<u64> {
        let bytes = self.take(8)?;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(bytes);
        Ok(u64::from_le_bytes(buf))
    }
}

/// Parse the binary form
pub fn decode_binary(data: &[u8]) -> AkazeResult<(Vec<Keypoint>, Vec<BinaryDescriptor>)> {
    let mut reader = BinaryReader { data, offset: 0 };
    if reader.take(4)? != BINARY_MAGIC {
        return Err(text_error(0, "missing binary keypoint file magic"));
    }
    let count = reader.u32()? as usize;
    let bit_len = reader.u32()? as usize;

    let mut keypoints = Vec::with_capacity(count);
    let mut descriptors = Vec::with_capacity(count);
    for _ in 0..count {
        keypoints.push(Keypoint {
            x: reader.f32()?,
            y: reader.f32()?,
            size: reader.f32()?,
            angle: reader.f32()?,
            response: reader.f32()?,
            octave: reader.u32()?,
            class_id: reader.u64()? as usize,
        });
        let bytes = reader.take(bit_len.div_ceil(8))?.to_vec();
        let descriptor = BinaryDescriptor::from_bytes(bit_len, bytes)
            .ok_or_else(|| text_error(0, "descriptor byte count mismatch"))?;
        descriptors.push(descriptor);
    }
    Ok((keypoints, descriptors))
}

/// Parse either form, sniffing the binary magic
pub fn decode_keyfile(data: &[u8]) -> AkazeResult<(Vec<Keypoint>, Vec<BinaryDescriptor>)> {
    if data.starts_with(BINARY_MAGIC) {
        return decode_binary(data);
    }
    let content = std::str::from_utf8(data)
        .map_err(|_| text_error(0, "keypoint file is neither binary nor UTF-8 text"))?;
    decode_text(content)
}

/// Write keypoints and descriptors to a file in the chosen format
pub fn write_keyfile<P: AsRef<Path>>(
    path: P,
    keypoints: &[Keypoint],
    descriptors: &[BinaryDescriptor],
    format: KeyfileFormat,
) -> AkazeResult<()> {
    if keypoints.len() != descriptors.len() {
        return Err(text_error(
            0,
            format!(
                "{} keypoints but {} descriptors",
                keypoints.len(),
                descriptors.len()
            ),
        ));
    }
    let bytes = match format {
        KeyfileFormat::Text => encode_text(keypoints, descriptors).into_bytes(),
        KeyfileFormat::Binary => encode_binary(keypoints, descriptors),
    };
    std::fs::write(path, bytes)?;
    Ok(())
}

/// Read keypoints and descriptors from a file in either format
pub fn read_keyfile<P: AsRef<Path>>(
    path: P,
) -> AkazeResult<(Vec<Keypoint>, Vec<BinaryDescriptor>)> {
    let data = std::fs::read(path)?;
    decode_keyfile(&data)
}
