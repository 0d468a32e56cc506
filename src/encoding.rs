//! Encoding converter collaborator (spec §6).

use crate::error::StringError;

/// The encodings this crate's byte-stream boundary understands. The original
/// system supports a much larger registry of legacy 8-bit encodings; this
/// crate implements exactly the ones spec §6 names a contract for, and
/// treats anything else as a caller error rather than fabricating support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Encoding {
    Ascii,
    Utf8,
    /// ISO-8859-1: the common choice of "eight-bit encoding" (spec §3) on
    /// platforms whose system encoding isn't itself an ASCII superset.
    Latin1,
    Utf16 { little_endian: bool },
}

impl Encoding {
    /// Spec §6: `is_superset_of_ASCII(encoding)`.
    pub fn is_superset_of_ascii(self) -> bool {
        !matches!(self, Encoding::Utf16 { .. })
    }

    /// Spec §6: `canonical_name(encoding)`.
    pub fn canonical_name(self) -> &'static str {
        match self {
            Encoding::Ascii => "us-ascii",
            Encoding::Utf8 => "utf-8",
            Encoding::Latin1 => "iso-8859-1",
            Encoding::Utf16 { little_endian: true } => "utf-16le",
            Encoding::Utf16 { little_endian: false } => "utf-16be",
        }
    }
}

/// Collaborator trait: byte-stream ↔ UTF-16 conversion, and the handful of
/// byte-length queries the constructor funnel and external-representation
/// API need (spec §6).
pub trait EncodingConverter: Send + Sync {
    fn decode_to_utf16(&self, bytes: &[u8], encoding: Encoding) -> Result<Vec<u16>, StringError>;
    fn encode_from_utf16(&self, units: &[u16], encoding: Encoding) -> Result<Vec<u8>, StringError>;
    fn byte_length_for_characters(&self, encoding: Encoding, chars: &[u16]) -> Option<usize>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultConverter;

const BOM_BE: [u8; 2] = [0xFE, 0xFF];
const BOM_LE: [u8; 2] = [0xFF, 0xFE];

impl EncodingConverter for DefaultConverter {
    fn decode_to_utf16(&self, bytes: &[u8], encoding: Encoding) -> Result<Vec<u16>, StringError> {
        match encoding {
            Encoding::Ascii => {
                if bytes.iter().any(|&b| b >= 0x80) {
                    return Err(StringError::DecodeFailure(encoding));
                }
                Ok(bytes.iter().map(|&b| b as u16).collect())
            }
            Encoding::Latin1 => Ok(bytes.iter().map(|&b| b as u16).collect()),
            Encoding::Utf8 => {
                let s = std::str::from_utf8(bytes).map_err(|_| StringError::DecodeFailure(encoding))?;
                Ok(s.encode_utf16().collect())
            }
            Encoding::Utf16 { little_endian } => {
                let (le, rest) = detect_bom(bytes, little_endian);
                if rest.len() % 2 != 0 {
                    return Err(StringError::DecodeFailure(encoding));
                }
                let mut out = Vec::with_capacity(rest.len() / 2);
                for chunk in rest.chunks_exact(2) {
                    let unit = if le {
                        u16::from_le_bytes([chunk[0], chunk[1]])
                    } else {
                        u16::from_be_bytes([chunk[0], chunk[1]])
                    };
                    out.push(unit);
                }
                Ok(out)
            }
        }
    }

    fn encode_from_utf16(&self, units: &[u16], encoding: Encoding) -> Result<Vec<u8>, StringError> {
        match encoding {
            Encoding::Ascii => {
                let mut out = Vec::with_capacity(units.len());
                for &u in units {
                    if u >= 0x80 {
                        return Err(StringError::DecodeFailure(encoding));
                    }
                    out.push(u as u8);
                }
                Ok(out)
            }
            Encoding::Latin1 => {
                let mut out = Vec::with_capacity(units.len());
                for &u in units {
                    if u >= 0x100 {
                        return Err(StringError::DecodeFailure(encoding));
                    }
                    out.push(u as u8);
                }
                Ok(out)
            }
            Encoding::Utf8 => {
                let s = String::from_utf16(units).map_err(|_| StringError::DecodeFailure(encoding))?;
                Ok(s.into_bytes())
            }
            Encoding::Utf16 { little_endian } => {
                let mut out = Vec::with_capacity(units.len() * 2 + 2);
                for &u in units {
                    if little_endian {
                        out.extend_from_slice(&u.to_le_bytes());
                    } else {
                        out.extend_from_slice(&u.to_be_bytes());
                    }
                }
                Ok(out)
            }
        }
    }

    fn byte_length_for_characters(&self, encoding: Encoding, chars: &[u16]) -> Option<usize> {
        match encoding {
            Encoding::Ascii | Encoding::Latin1 => Some(chars.len()),
            Encoding::Utf8 => Some(String::from_utf16(chars).ok()?.len()),
            Encoding::Utf16 { .. } => Some(chars.len() * 2),
        }
    }
}

/// Optionally strips a leading byte-order mark from a UTF-16 byte stream,
/// returning whether the stream turned out to be little-endian and the
/// remaining bytes. `default_le` is used when no BOM is present.
fn detect_bom(bytes: &[u8], default_le: bool) -> (bool, &[u8]) {
    if bytes.len() >= 2 && bytes[..2] == BOM_LE {
        (true, &bytes[2..])
    } else if bytes.len() >= 2 && bytes[..2] == BOM_BE {
        (false, &bytes[2..])
    } else {
        (default_le, bytes)
    }
}
