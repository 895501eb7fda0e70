//! Minimal multipart/form-data parser for the upload endpoints
//!
//! Handles the subset the upload form actually sends: file parts and plain
//! text fields, CRLF line endings, one level deep. Parts with unknown field
//! names are ignored rather than rejected so form evolution stays painless.

use bytes::Bytes;

use crate::types::HallmarkError;

/// One decoded part of a multipart body
#[derive(Debug, Clone)]
pub struct Part {
    pub name: String,
    pub filename: Option<String>,
    pub data: Bytes,
}

/// Extract the boundary token from a Content-Type header value
pub fn boundary_from_content_type(content_type: &str) -> Option<String> {
    let (kind, params) = content_type.split_once(';')?;
    if !kind.trim().eq_ignore_ascii_case("multipart/form-data") {
        return None;
    }
    for param in params.split(';') {
        let (key, value) = match param.split_once('=') {
            Some(kv) => kv,
            None => continue,
        };
        if key.trim().eq_ignore_ascii_case("boundary") {
            let value = value.trim().trim_matches('"');
            if !value.is_empty() {
                return Some(value.to_string());
            }
        }
    }
    None
}

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if from > haystack.len() || needle.is_empty() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|p| p + from)
}

/// Pull a quoted parameter (e.g. `name="files"`) out of a
/// Content-Disposition header value.
fn disposition_param(header: &str, param: &str) -> Option<String> {
    for piece in header.split(';') {
        let (key, value) = match piece.split_once('=') {
            Some(kv) => kv,
            None => continue,
        };
        if key.trim().eq_ignore_ascii_case(param) {
            return Some(value.trim().trim_matches('"').to_string());
        }
    }
    None
}

/// Parse a complete multipart body into its parts.
///
/// Fails on a body that does not open with the boundary or whose parts lack
/// a header/body separator; a missing terminal `--` is tolerated (the last
/// boundary seen ends the parse).
pub fn parse(body: &[u8], boundary: &str) -> Result<Vec<Part>, HallmarkError> {
    let delimiter = format!("--{}", boundary).into_bytes();
    let mut parts = Vec::new();

    let mut cursor = find(body, &delimiter, 0).ok_or_else(|| {
        HallmarkError::BadRequest("multipart body does not contain its boundary".into())
    })?;

    loop {
        cursor += delimiter.len();
        // Terminal delimiter carries a trailing "--".
        if body[cursor..].starts_with(b"--") {
            break;
        }
        // Skip the CRLF after the delimiter.
        if body[cursor..].starts_with(b"\r\n") {
            cursor += 2;
        }

        let end = match find(body, &delimiter, cursor) {
            Some(pos) => pos,
            None => break,
        };
        // Part content ends before the CRLF that precedes the next delimiter.
        let raw = &body[cursor..end.saturating_sub(2).max(cursor)];

        let header_end = find(raw, b"\r\n\r\n", 0).ok_or_else(|| {
            HallmarkError::BadRequest("multipart part is missing its header block".into())
        })?;
        let headers = String::from_utf8_lossy(&raw[..header_end]);
        let data = Bytes::copy_from_slice(&raw[header_end + 4..]);

        let disposition = headers
            .lines()
            .find(|line| {
                line.to_ascii_lowercase()
                    .starts_with("content-disposition:")
            })
            .map(|line| line[line.find(':').unwrap_or(0) + 1..].to_string())
            .unwrap_or_default();

        let name = disposition_param(&disposition, "name").ok_or_else(|| {
            HallmarkError::BadRequest("multipart part has no field name".into())
        })?;
        let filename = disposition_param(&disposition, "filename");

        parts.push(Part {
            name,
            filename,
            data,
        });
        cursor = end;
    }

    Ok(parts)
}

/// The decoded upload form: files plus backend selection flags
#[derive(Debug, Default)]
pub struct UploadForm {
    /// (filename, bytes) for each file part
    pub files: Vec<(String, Bytes)>,
    pub upload_s3: bool,
    pub upload_ipfs: bool,
    pub uploader: Option<String>,
}

fn truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "on" | "yes"
    )
}

impl UploadForm {
    pub fn from_parts(parts: Vec<Part>) -> Self {
        let mut form = Self::default();
        for part in parts {
            match part.name.as_str() {
                "files" | "file" => {
                    let filename = part
                        .filename
                        .filter(|f| !f.is_empty())
                        .unwrap_or_else(|| "unnamed".to_string());
                    form.files.push((filename, part.data));
                }
                "upload_s3" => {
                    form.upload_s3 = truthy(&String::from_utf8_lossy(&part.data));
                }
                "upload_ipfs" => {
                    form.upload_ipfs = truthy(&String::from_utf8_lossy(&part.data));
                }
                "uploader" => {
                    let value = String::from_utf8_lossy(&part.data).trim().to_string();
                    if !value.is_empty() {
                        form.uploader = Some(value);
                    }
                }
                _ => {}
            }
        }
        form
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOUNDARY: &str = "----testboundary42";

    fn body_with(parts: &[(&str, Option<&str>, &[u8])]) -> Vec<u8> {
        let mut body = Vec::new();
        for (name, filename, data) in parts {
            body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
            match filename {
                Some(f) => body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                        name, f
                    )
                    .as_bytes(),
                ),
                None => body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n", name).as_bytes(),
                ),
            }
            body.extend_from_slice(b"\r\n");
            body.extend_from_slice(data);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
        body
    }

    #[test]
    fn test_boundary_extraction() {
        assert_eq!(
            boundary_from_content_type("multipart/form-data; boundary=----abc"),
            Some("----abc".to_string())
        );
        assert_eq!(
            boundary_from_content_type("multipart/form-data; boundary=\"quoted\""),
            Some("quoted".to_string())
        );
        assert_eq!(boundary_from_content_type("application/json"), None);
        assert_eq!(boundary_from_content_type("multipart/form-data"), None);
    }

    #[test]
    fn test_parse_file_and_fields() {
        let body = body_with(&[
            ("files", Some("a.txt"), b"hello"),
            ("upload_s3", None, b"true"),
            ("upload_ipfs", None, b"false"),
            ("uploader", None, b"alice"),
        ]);

        let parts = parse(&body, BOUNDARY).unwrap();
        assert_eq!(parts.len(), 4);
        assert_eq!(parts[0].name, "files");
        assert_eq!(parts[0].filename.as_deref(), Some("a.txt"));
        assert_eq!(&parts[0].data[..], b"hello");

        let form = UploadForm::from_parts(parts);
        assert_eq!(form.files.len(), 1);
        assert!(form.upload_s3);
        assert!(!form.upload_ipfs);
        assert_eq!(form.uploader.as_deref(), Some("alice"));
    }

    #[test]
    fn test_binary_data_with_crlf_preserved() {
        let data = b"line one\r\nline two\r\n\r\nbinary \x00\x01\x02";
        let body = body_with(&[("files", Some("bin.dat"), data)]);

        let parts = parse(&body, BOUNDARY).unwrap();
        assert_eq!(&parts[0].data[..], data);
    }

    #[test]
    fn test_multiple_files() {
        let body = body_with(&[
            ("files", Some("a.txt"), b"aaa"),
            ("files", Some("b.txt"), b"bbb"),
        ]);

        let form = UploadForm::from_parts(parse(&body, BOUNDARY).unwrap());
        assert_eq!(form.files.len(), 2);
        assert_eq!(form.files[1].0, "b.txt");
        assert_eq!(&form.files[1].1[..], b"bbb");
    }

    #[test]
    fn test_unknown_fields_ignored() {
        let body = body_with(&[("csrf_token", None, b"zzz"), ("files", Some("a.txt"), b"x")]);
        let form = UploadForm::from_parts(parse(&body, BOUNDARY).unwrap());
        assert_eq!(form.files.len(), 1);
    }

    #[test]
    fn test_missing_boundary_rejected() {
        let err = parse(b"not multipart at all", BOUNDARY).unwrap_err();
        assert!(matches!(err, HallmarkError::BadRequest(_)));
    }

    #[test]
    fn test_truthy_values() {
        for v in ["true", "1", "on", "yes", "TRUE"] {
            assert!(truthy(v), "{v} should be truthy");
        }
        for v in ["false", "0", "off", "", "maybe"] {
            assert!(!truthy(v), "{v} should be falsy");
        }
    }
}
