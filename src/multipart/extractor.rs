//! Minimal multipart/form-data part extractor.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use thiserror::Error;

/// Accepted form-field names for the upload.
pub const PART_NAMES: [&str; 2] = ["mx", "mx.dat"];

const EXPECTED_FILENAME: &str = "mx.dat";
const EXPECTED_CONTENT_TYPE: &str = "application/octet-stream";

/// Errors raised while extracting the upload.
#[derive(Debug, Error)]
pub enum MultipartError {
    #[error("Content-Type must be multipart/form-data, got '{0}'")]
    NotMultipart(String),

    #[error("no boundary found in Content-Type header")]
    MissingBoundary,

    #[error("no mx or mx.dat part found in multipart body")]
    MissingPart,
}

/// The matched part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedPart {
    /// Form-field name that matched.
    pub name: String,
    pub filename: Option<String>,
    pub content_type: Option<String>,
    /// Decoded bytes.
    pub bytes: Vec<u8>,
    /// True if the body was base64 armored.
    pub was_base64: bool,
}

/// Extract the `mx`/`mx.dat` part from a multipart body.
pub fn extract_mx_part(content_type: &str, body: &[u8]) -> Result<ExtractedPart, MultipartError> {
    let boundary = parse_boundary(content_type)?;
    let delimiter = [b"--", boundary.as_bytes()].concat();

    let mut segments = split_on(body, &delimiter).into_iter();
    // Preamble before the first delimiter is never a part.
    segments.next();

    for (index, segment) in segments.enumerate() {
        if segment.starts_with(b"--") {
            break;
        }
        if segment.iter().all(u8::is_ascii_whitespace) {
            continue;
        }

        let Some(part) = parse_part(segment) else {
            tracing::debug!(part = index, "Skipping part without a header block");
            continue;
        };
        let Some(name) = part.name.filter(|n| PART_NAMES.iter().any(|p| p.eq_ignore_ascii_case(n)))
        else {
            continue;
        };

        if part.filename.as_deref() != Some(EXPECTED_FILENAME) {
            tracing::warn!(filename = ?part.filename, "mx part has unexpected filename");
        }
        if !part
            .content_type
            .as_deref()
            .is_some_and(|ct| ct.eq_ignore_ascii_case(EXPECTED_CONTENT_TYPE))
        {
            tracing::warn!(content_type = ?part.content_type, "mx part has unexpected content type");
        }

        let (bytes, was_base64) = decode_body(part.body);
        tracing::debug!(
            name = %name,
            bytes = bytes.len(),
            base64 = was_base64,
            "Extracted mx part"
        );
        return Ok(ExtractedPart {
            name,
            filename: part.filename,
            content_type: part.content_type,
            bytes,
            was_base64,
        });
    }

    Err(MultipartError::MissingPart)
}

fn parse_boundary(content_type: &str) -> Result<String, MultipartError> {
    let mut params = content_type.split(';');
    let media_type = params.next().unwrap_or_default().trim();
    if !media_type.eq_ignore_ascii_case("multipart/form-data") {
        return Err(MultipartError::NotMultipart(content_type.to_string()));
    }

    params
        .filter_map(|p| p.split_once('='))
        .find(|(key, _)| key.trim().eq_ignore_ascii_case("boundary"))
        .map(|(_, value)| unquote(value).to_string())
        .filter(|b| !b.is_empty())
        .ok_or(MultipartError::MissingBoundary)
}

fn unquote(value: &str) -> &str {
    value.trim().trim_matches(|c| c == '"' || c == '\'')
}

/// Split `haystack` on every occurrence of `needle`.
fn split_on<'a>(haystack: &'a [u8], needle: &[u8]) -> Vec<&'a [u8]> {
    let mut pieces = Vec::new();
    let mut start = 0;
    let mut i = 0;
    while i + needle.len() <= haystack.len() {
        if &haystack[i..i + needle.len()] == needle {
            pieces.push(&haystack[start..i]);
            i += needle.len();
            start = i;
        } else {
            i += 1;
        }
    }
    pieces.push(&haystack[start..]);
    pieces
}

struct RawPart<'a> {
    name: Option<String>,
    filename: Option<String>,
    content_type: Option<String>,
    body: &'a [u8],
}

fn parse_part(segment: &[u8]) -> Option<RawPart<'_>> {
    let segment = strip_line_break_prefix(segment);
    let (header_end, body_start) = find_blank_line(segment)?;
    let headers = String::from_utf8_lossy(&segment[..header_end]);

    let mut part = RawPart {
        name: None,
        filename: None,
        content_type: None,
        body: strip_line_break_suffix(&segment[body_start..]),
    };

    for line in headers.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim();
        if key.eq_ignore_ascii_case("content-disposition") {
            for param in value.split(';').skip(1) {
                let Some((k, v)) = param.split_once('=') else {
                    continue;
                };
                match k.trim().to_ascii_lowercase().as_str() {
                    "name" => part.name = Some(unquote(v).to_string()),
                    "filename" | "filename*" => part.filename = Some(unquote(v).to_string()),
                    _ => {}
                }
            }
        } else if key.eq_ignore_ascii_case("content-type") {
            part.content_type = Some(value.trim().to_string());
        }
    }

    Some(part)
}

fn strip_line_break_prefix(data: &[u8]) -> &[u8] {
    data.strip_prefix(b"\r\n")
        .or_else(|| data.strip_prefix(b"\n"))
        .unwrap_or(data)
}

/// The line break before a delimiter belongs to the delimiter.
fn strip_line_break_suffix(data: &[u8]) -> &[u8] {
    data.strip_suffix(b"\r\n")
        .or_else(|| data.strip_suffix(b"\n"))
        .unwrap_or(data)
}

/// Returns (end of headers, start of body).
fn find_blank_line(data: &[u8]) -> Option<(usize, usize)> {
    if data.starts_with(b"\r\n") {
        return Some((0, 2));
    }
    if data.starts_with(b"\n") {
        return Some((0, 1));
    }
    (0..data.len()).find_map(|i| {
        if data[i..].starts_with(b"\r\n\r\n") {
            Some((i, i + 4))
        } else if data[i..].starts_with(b"\n\n") {
            Some((i, i + 2))
        } else {
            None
        }
    })
}

fn decode_body(body: &[u8]) -> (Vec<u8>, bool) {
    let compact: Vec<u8> = body
        .iter()
        .copied()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    if !compact.is_empty() {
        if let Ok(decoded) = BASE64.decode(&compact) {
            return (decoded, true);
        }
    }
    (body.to_vec(), false)
}
