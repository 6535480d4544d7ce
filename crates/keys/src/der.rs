//! ECDSA P-256 signature re-encoding between ASN.1 DER and raw `R‖S`.
//!
//! Signing primitives emit `SEQUENCE { INTEGER r, INTEGER s }`; JOSE wants
//! the two integers as fixed-width big-endian halves. The parser here is
//! strict DER: definite minimal lengths, minimal non-negative integers and
//! no trailing bytes.

use crate::error::{KeyError, Result};

/// Width of one P-256 coordinate.
pub const COORDINATE_LEN: usize = 32;

/// Width of a raw `R‖S` signature.
pub const RAW_SIGNATURE_LEN: usize = 2 * COORDINATE_LEN;

const TAG_INTEGER: u8 = 0x02;
const TAG_SEQUENCE: u8 = 0x30;

/// Largest length the encoder writes (two length octets).
const MAX_ENCODED_LEN: usize = u16::MAX as usize;

/// Converts a DER-encoded ECDSA signature to 64-byte `R‖S`.
///
/// # Errors
///
/// - [`KeyError::Decode`] for malformed DER: wrong tags, bad or non-minimal
///   lengths, trailing bytes, empty, negative or non-minimal integers
/// - [`KeyError::IntegerTooLarge`] if `R` or `S` is wider than 32 bytes once
///   its sign padding is removed
///
/// # Examples
///
/// ```
/// use keyrotor_keys::der::der_to_raw;
///
/// // SEQUENCE { INTEGER 1, INTEGER 2 }
/// let raw = der_to_raw(&[0x30, 0x06, 0x02, 0x01, 0x01, 0x02, 0x01, 0x02]).unwrap();
/// assert_eq!(raw[31], 1);
/// assert_eq!(raw[63], 2);
/// ```
pub fn der_to_raw(der: &[u8]) -> Result<[u8; RAW_SIGNATURE_LEN]> {
    let mut outer = Reader::new(der);
    let sequence = outer.read_element(TAG_SEQUENCE)?;
    outer.finish()?;

    let mut inner = Reader::new(sequence);
    let r = read_unsigned_integer(&mut inner)?;
    let s = read_unsigned_integer(&mut inner)?;
    inner.finish()?;

    let mut raw = [0u8; RAW_SIGNATURE_LEN];
    left_pad_into(&mut raw[..COORDINATE_LEN], r)?;
    left_pad_into(&mut raw[COORDINATE_LEN..], s)?;
    Ok(raw)
}

/// Converts a raw `R‖S` signature to DER.
///
/// The input is split at its midpoint, so any even width works; leading
/// zeros of each half are stripped and a sign byte added where needed.
///
/// # Errors
///
/// Returns [`KeyError::Decode`] if `raw` is empty or of odd length, or if
/// the encoded SEQUENCE would exceed 65535 bytes.
pub fn raw_to_der(raw: &[u8]) -> Result<Vec<u8>> {
    if raw.is_empty() || raw.len() % 2 != 0 {
        return Err(KeyError::decode(format!(
            "raw ECDSA signature must be non-empty and even-length, got {} bytes",
            raw.len()
        )));
    }
    let (r, s) = raw.split_at(raw.len() / 2);

    let mut body = Vec::with_capacity(raw.len() + 8);
    write_unsigned_integer(&mut body, r)?;
    write_unsigned_integer(&mut body, s)?;

    let mut der = Vec::with_capacity(body.len() + 4);
    der.push(TAG_SEQUENCE);
    write_length(&mut der, body.len())?;
    der.extend_from_slice(&body);
    Ok(der)
}

struct Reader<'a> {
    input: &'a [u8],
}

impl<'a> Reader<'a> {
    fn new(input: &'a [u8]) -> Self {
        Self { input }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.input.len() < n {
            return Err(KeyError::decode("truncated DER"));
        }
        let (head, rest) = self.input.split_at(n);
        self.input = rest;
        Ok(head)
    }

    fn byte(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn read_length(&mut self) -> Result<usize> {
        let first = self.byte()?;
        if first < 0x80 {
            return Ok(usize::from(first));
        }
        let len = match first {
            0x81 => {
                let len = usize::from(self.byte()?);
                if len < 0x80 {
                    return Err(KeyError::decode("non-minimal DER length"));
                }
                len
            },
            0x82 => {
                let bytes = self.take(2)?;
                let len = usize::from(u16::from_be_bytes([bytes[0], bytes[1]]));
                if len < 0x100 {
                    return Err(KeyError::decode("non-minimal DER length"));
                }
                len
            },
            0x80 => return Err(KeyError::decode("indefinite DER length")),
            _ => return Err(KeyError::decode("DER length too large")),
        };
        Ok(len)
    }

    fn read_element(&mut self, tag: u8) -> Result<&'a [u8]> {
        let actual = self.byte()?;
        if actual != tag {
            return Err(KeyError::decode(format!(
                "unexpected DER tag 0x{actual:02x}, expected 0x{tag:02x}"
            )));
        }
        let len = self.read_length()?;
        self.take(len)
    }

    fn finish(&self) -> Result<()> {
        if self.input.is_empty() {
            Ok(())
        } else {
            Err(KeyError::decode(format!("{} trailing bytes after DER element", self.input.len())))
        }
    }
}

/// Reads an INTEGER and returns its magnitude with the sign byte removed.
fn read_unsigned_integer<'a>(reader: &mut Reader<'a>) -> Result<&'a [u8]> {
    let bytes = reader.read_element(TAG_INTEGER)?;
    match bytes {
        [] => Err(KeyError::decode("empty DER integer")),
        [first, ..] if first & 0x80 != 0 => Err(KeyError::decode("negative DER integer")),
        [0x00, second, ..] if second & 0x80 == 0 => {
            Err(KeyError::decode("non-minimal DER integer"))
        },
        [0x00, rest @ ..] if !rest.is_empty() => Ok(rest),
        _ => Ok(bytes),
    }
}

fn left_pad_into(dst: &mut [u8], magnitude: &[u8]) -> Result<()> {
    if magnitude.len() > dst.len() {
        return Err(KeyError::IntegerTooLarge { len: magnitude.len(), max: dst.len() });
    }
    let offset = dst.len() - magnitude.len();
    dst[offset..].copy_from_slice(magnitude);
    Ok(())
}

fn write_unsigned_integer(out: &mut Vec<u8>, magnitude: &[u8]) -> Result<()> {
    let first_nonzero = magnitude.iter().position(|&b| b != 0).unwrap_or(magnitude.len());
    let trimmed = &magnitude[first_nonzero..];

    out.push(TAG_INTEGER);
    match trimmed.first() {
        None => {
            write_length(out, 1)?;
            out.push(0);
        },
        Some(&first) if first & 0x80 != 0 => {
            write_length(out, trimmed.len() + 1)?;
            out.push(0);
            out.extend_from_slice(trimmed);
        },
        Some(_) => {
            write_length(out, trimmed.len())?;
            out.extend_from_slice(trimmed);
        },
    }
    Ok(())
}

/// Writes a definite DER length using at most two length octets.
fn write_length(out: &mut Vec<u8>, len: usize) -> Result<()> {
    if let Ok(short) = u8::try_from(len)
        && short < 0x80
    {
        out.push(short);
    } else if let Ok(one) = u8::try_from(len) {
        out.extend_from_slice(&[0x81, one]);
    } else if let Ok(two) = u16::try_from(len) {
        let [hi, lo] = two.to_be_bytes();
        out.extend_from_slice(&[0x82, hi, lo]);
    } else {
        return Err(KeyError::decode(format!(
            "DER length {len} exceeds the {MAX_ENCODED_LEN}-byte encoder limit"
        )));
    }
    Ok(())
}
