//! Upload checks and text decoding for bank statement files.

use crate::utils::error::{CfoError, Result};
use std::path::Path;

pub const DEFAULT_MAX_FILE_SIZE_MB: u64 = 50;

/// Rejects empty, oversized and non-CSV uploads before any bytes are read.
pub fn validate_upload(name: &str, size: u64, max_size_mb: u64) -> Result<()> {
    if size == 0 {
        return Err(CfoError::UploadError {
            message: "File is empty".to_string(),
        });
    }

    let max_bytes = max_size_mb.saturating_mul(1024 * 1024);
    if size > max_bytes {
        return Err(CfoError::UploadError {
            message: format!("File too large. Maximum: {}MB", max_size_mb),
        });
    }

    let extension = Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    match extension.as_str() {
        "csv" => Ok(()),
        "xlsx" | "xls" => Err(CfoError::UploadError {
            message: "Excel not supported yet. Convert the file to CSV".to_string(),
        }),
        _ => Err(CfoError::UploadError {
            message: "Unsupported format. Use CSV files".to_string(),
        }),
    }
}

fn decode_utf16(bytes: &[u8], little_endian: bool) -> Result<String> {
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| {
            if little_endian {
                u16::from_le_bytes([pair[0], pair[1]])
            } else {
                u16::from_be_bytes([pair[0], pair[1]])
            }
        })
        .collect();
    String::from_utf16(&units).map_err(|e| CfoError::EncodingError {
        message: format!("invalid UTF-16: {}", e),
    })
}

/// Decodes statement bytes to text.
///
/// UTF-16 with a BOM, then UTF-8 (BOM stripped), then ISO-8859-1 where every
/// byte maps to the code point of the same value.
pub fn decode(bytes: &[u8]) -> Result<String> {
    let text = match bytes {
        [0xFF, 0xFE, rest @ ..] => decode_utf16(rest, true)?,
        [0xFE, 0xFF, rest @ ..] => decode_utf16(rest, false)?,
        [0xEF, 0xBB, 0xBF, rest @ ..] => match std::str::from_utf8(rest) {
            Ok(s) => s.to_string(),
            Err(_) => latin1(rest),
        },
        _ => match std::str::from_utf8(bytes) {
            Ok(s) => s.to_string(),
            Err(_) => {
                tracing::debug!("Content is not valid UTF-8, decoding as ISO-8859-1");
                latin1(bytes)
            }
        },
    };

    if text.trim().is_empty() {
        return Err(CfoError::EncodingError {
            message: "file has no readable content".to_string(),
        });
    }

    let non_blank = text.lines().filter(|line| !line.trim().is_empty()).count();
    if non_blank < 2 {
        return Err(CfoError::EncodingError {
            message: "file needs a header and at least one data line".to_string(),
        });
    }

    Ok(text)
}

fn latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_rules() {
        assert!(validate_upload("extrato.csv", 10, 50).is_ok());
        assert!(validate_upload("EXTRATO.CSV", 10, 50).is_ok());
        assert!(validate_upload("extrato.csv", 0, 50).is_err());
        assert!(validate_upload("extrato.csv", 51 * 1024 * 1024, 50).is_err());

        let excel = validate_upload("extrato.xlsx", 10, 50).unwrap_err();
        assert!(excel.to_string().contains("Excel"));
        assert!(validate_upload("extrato.pdf", 10, 50).is_err());
        assert!(validate_upload("extrato", 10, 50).is_err());
    }

    #[test]
    fn strips_utf8_bom() {
        let mut bytes = vec![0xEF, 0xBB, 0xBF];
        bytes.extend_from_slice("Data;Descrição\n01/01/2025;Teste".as_bytes());
        let text = decode(&bytes).unwrap();
        assert!(text.starts_with("Data;Descrição"));
    }

    #[test]
    fn falls_back_to_latin1() {
        // "Descrição" in ISO-8859-1
        let mut bytes = b"Data,Descri".to_vec();
        bytes.extend_from_slice(&[0xE7, 0xE3]);
        bytes.extend_from_slice(b"o\n01/01/2025,x");
        let text = decode(&bytes).unwrap();
        assert!(text.starts_with("Data,Descrição"));
    }

    #[test]
    fn decodes_utf16_le() {
        let mut bytes = vec![0xFF, 0xFE];
        for unit in "Data,Valor\n01/01/2025,10".encode_utf16() {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }
        assert_eq!(decode(&bytes).unwrap(), "Data,Valor\n01/01/2025,10");
    }

    #[test]
    fn rejects_single_line_or_empty() {
        assert!(decode(b"").is_err());
        assert!(decode(b"   \n  ").is_err());
        assert!(decode(b"Data,Valor\n\n").is_err());
    }
}
