//! Text encodings for record buffers.
//!
//! Fixed-length positions and lengths are measured in encoded bytes, so every
//! conversion here is strict: characters the encoding cannot represent and
//! byte slices that cut a character in half are errors, never replacement
//! characters.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Supported record encodings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Encoding {
    /// UTF-8 (default)
    #[default]
    #[serde(rename = "UTF-8", alias = "utf-8", alias = "utf8")]
    Utf8,
    /// 7-bit US-ASCII
    #[serde(rename = "US-ASCII", alias = "ASCII", alias = "ascii")]
    Ascii,
    /// ISO-8859-1, one byte per character
    #[serde(rename = "ISO-8859-1", alias = "latin1", alias = "Latin-1")]
    Latin1,
    /// UTF-16 big endian, no byte order mark
    #[serde(rename = "UTF-16BE")]
    Utf16Be,
    /// UTF-16 little endian, no byte order mark
    #[serde(rename = "UTF-16LE")]
    Utf16Le,
}

impl Encoding {
    /// The canonical name of the encoding
    pub fn name(&self) -> &'static str {
        match self {
            Encoding::Utf8 => "UTF-8",
            Encoding::Ascii => "US-ASCII",
            Encoding::Latin1 => "ISO-8859-1",
            Encoding::Utf16Be => "UTF-16BE",
            Encoding::Utf16Le => "UTF-16LE",
        }
    }

    /// Encode text to bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Encoding`] for characters the encoding cannot hold.
    pub fn encode(&self, text: &str) -> Result<Vec<u8>> {
        match self {
            Encoding::Utf8 => Ok(text.as_bytes().to_vec()),
            Encoding::Ascii => {
                if let Some((index, c)) = text.char_indices().find(|(_, c)| !c.is_ascii()) {
                    return Err(self.unmappable(c, index));
                }
                Ok(text.as_bytes().to_vec())
            }
            Encoding::Latin1 => text
                .char_indices()
                .map(|(index, c)| u8::try_from(u32::from(c)).map_err(|_| self.unmappable(c, index)))
                .collect(),
            Encoding::Utf16Be => Ok(text.encode_utf16().flat_map(u16::to_be_bytes).collect()),
            Encoding::Utf16Le => Ok(text.encode_utf16().flat_map(u16::to_le_bytes).collect()),
        }
    }

    /// Decode bytes to text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Encoding`] for byte sequences that are not valid in
    /// this encoding, including a multi-byte character cut by a slice.
    pub fn decode(&self, bytes: &[u8]) -> Result<String> {
        match self {
            Encoding::Utf8 => String::from_utf8(bytes.to_vec()).map_err(|e| {
                Error::encoding(
                    *self,
                    format!(
                        "invalid byte sequence at offset {}",
                        e.utf8_error().valid_up_to()
                    ),
                )
            }),
            Encoding::Ascii => {
                if let Some(offset) = bytes.iter().position(|b| !b.is_ascii()) {
                    return Err(Error::encoding(
                        *self,
                        format!("non-ASCII byte 0x{:02X} at offset {offset}", bytes[offset]),
                    ));
                }
                Ok(bytes.iter().map(|&b| char::from(b)).collect())
            }
            Encoding::Latin1 => Ok(bytes.iter().map(|&b| char::from(b)).collect()),
            Encoding::Utf16Be | Encoding::Utf16Le => {
                if bytes.len() % 2 != 0 {
                    return Err(Error::encoding(
                        *self,
                        format!("odd byte count {} splits a code unit", bytes.len()),
                    ));
                }
                let units: Vec<u16> = bytes
                    .chunks_exact(2)
                    .map(|pair| {
                        if *self == Encoding::Utf16Be {
                            u16::from_be_bytes([pair[0], pair[1]])
                        } else {
                            u16::from_le_bytes([pair[0], pair[1]])
                        }
                    })
                    .collect();
                String::from_utf16(&units).map_err(|e| Error::encoding(*self, e.to_string()))
            }
        }
    }

    /// Length of `text` in encoded bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Encoding`] for characters the encoding cannot hold.
    pub fn encoded_len(&self, text: &str) -> Result<usize> {
        match self {
            Encoding::Utf8 => Ok(text.len()),
            _ => Ok(self.encode(text)?.len()),
        }
    }

    fn unmappable(&self, c: char, index: usize) -> Error {
        Error::encoding(*self, format!("character '{c}' at index {index} is not representable"))
    }
}

impl std::fmt::Display for Encoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for Encoding {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().replace('_', "-").as_str() {
            "UTF-8" | "UTF8" => Ok(Encoding::Utf8),
            "US-ASCII" | "ASCII" => Ok(Encoding::Ascii),
            "ISO-8859-1" | "LATIN1" | "LATIN-1" => Ok(Encoding::Latin1),
            "UTF-16BE" => Ok(Encoding::Utf16Be),
            "UTF-16LE" => Ok(Encoding::Utf16Le),
            _ => Err(Error::config(format!("unsupported encoding '{s}'"))),
        }
    }
}
