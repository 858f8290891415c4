//! Format context configuration

use crate::encoding::Encoding;
use crate::{Error, Format, Result};

/// Configuration shared by the marshalling and unmarshalling contexts of one
/// stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatConfig {
    /// Record format
    pub format: Format,
    /// Text encoding (default: UTF-8)
    pub encoding: Encoding,
    /// Field delimiter (default: tab for delimited, comma for CSV)
    pub delimiter: char,
    /// Quote character for CSV (default: double quote)
    pub quote: char,
    /// Filler written into fixed-length gaps no field covers (default: space)
    pub filler: char,
}

impl FormatConfig {
    /// Create a configuration with the defaults of a format
    pub fn new(format: Format) -> Self {
        Self {
            format,
            encoding: Encoding::default(),
            delimiter: if format == Format::Csv { ',' } else { '\t' },
            quote: '"',
            filler: ' ',
        }
    }

    /// Set encoding
    pub fn encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// Set the delimiter character
    pub fn delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Set the quote character
    pub fn quote(mut self, quote: char) -> Self {
        self.quote = quote;
        self
    }

    /// Set the fixed-length filler character
    pub fn filler(mut self, filler: char) -> Self {
        self.filler = filler;
        self
    }

    /// Convert delimiter to u8 for the csv crate
    pub(crate) fn delimiter_u8(&self) -> Result<u8> {
        ascii_byte(self.delimiter, "delimiter")
    }

    /// Convert quote char to u8 for the csv crate
    pub(crate) fn quote_u8(&self) -> Result<u8> {
        ascii_byte(self.quote, "quote character")
    }
}

fn ascii_byte(c: char, what: &str) -> Result<u8> {
    if c.is_ascii() {
        Ok(c as u8)
    } else {
        Err(Error::config(format!("{what} '{c}' must be an ASCII character")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_defaults() {
        let config = FormatConfig::new(Format::Csv);
        assert_eq!(config.delimiter, ',');
        assert_eq!(config.quote, '"');
        assert_eq!(config.encoding, Encoding::Utf8);

        let config = FormatConfig::new(Format::Delimited);
        assert_eq!(config.delimiter, '\t');

        let config = FormatConfig::new(Format::FixedLength);
        assert_eq!(config.filler, ' ');
    }

    #[test]
    fn test_config_builder() {
        let config = FormatConfig::new(Format::Delimited)
            .delimiter('|')
            .quote('\'')
            .filler('0')
            .encoding(Encoding::Latin1);
        assert_eq!(config.delimiter_u8().unwrap(), b'|');
        assert_eq!(config.quote_u8().unwrap(), b'\'');
        assert_eq!(config.filler, '0');
        assert_eq!(config.encoding, Encoding::Latin1);
    }

    #[test]
    fn test_non_ascii_delimiter_rejected() {
        let config = FormatConfig::new(Format::Delimited).delimiter('§');
        assert!(matches!(config.delimiter_u8(), Err(Error::Config(_))));
    }
}
