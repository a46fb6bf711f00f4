//! `multipart/form-data` decoding over a fully buffered body.
//!
//! The decoder is a single left-to-right scan. A delimiter line only counts
//! when it starts the buffer or follows a CRLF, and is itself followed by a
//! CRLF (optionally after transport padding). The closing `--` must likewise
//! end its line or the body. Bytes that merely resemble a delimiter inside a
//! part body are left alone.
//!
//! Decoding is lenient: segments without a header/body separator or without
//! a usable `Content-Disposition` header are dropped, and an unterminated
//! tail stops the scan. Both cases are counted in [`Decoded::skipped`] so
//! callers can report them.

use std::sync::OnceLock;

use regex::Regex;

/// Filename used when a part carries none.
pub const DEFAULT_FILE_NAME: &str = "unknown.png";

const CRLF: &[u8] = b"\r\n";
const HEADER_SEPARATOR: &[u8] = b"\r\n\r\n";

/// One named entry of a multipart body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part {
    pub field_name: String,
    pub file_name: String,
    pub data: Vec<u8>,
}

/// Result of decoding one body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Decoded {
    /// Parts in the order they appear in the body.
    pub parts: Vec<Part>,
    /// Segments that were dropped as unparseable.
    pub skipped: usize,
}

/// Whether a `Content-Type` value names `multipart/form-data`.
pub fn is_multipart_form_data(content_type: &str) -> bool {
    content_type
        .split(';')
        .next()
        .is_some_and(|essence| essence.trim().eq_ignore_ascii_case("multipart/form-data"))
}

/// Extract the `boundary` parameter from a `Content-Type` value.
///
/// Surrounding double quotes are removed. Returns `None` when the parameter
/// is absent or empty.
pub fn parse_boundary(content_type: &str) -> Option<String> {
    content_type.split(';').skip(1).find_map(|param| {
        let (name, value) = param.split_once('=')?;
        if !name.trim().eq_ignore_ascii_case("boundary") {
            return None;
        }
        let value = value.trim();
        let value = value
            .strip_prefix('"')
            .and_then(|inner| inner.strip_suffix('"'))
            .unwrap_or(value);
        if value.is_empty() {
            None
        } else {
            Some(value.to_string())
        }
    })
}

/// Split `body` into parts using `boundary` (without the leading dashes).
pub fn decode(body: &[u8], boundary: &str) -> Decoded {
    let mut decoded = Decoded::default();
    if boundary.is_empty() {
        return decoded;
    }

    let delimiter = [b"--", boundary.as_bytes()].concat();
    let Some(mut current) = find_delimiter(body, &delimiter, 0) else {
        return decoded;
    };

    while !current.terminal {
        let content_start = current.end;
        let Some(next) = find_delimiter(body, &delimiter, content_start) else {
            if !body[content_start..].is_empty() {
                decoded.skipped += 1;
            }
            break;
        };

        let content_end = next.start.saturating_sub(CRLF.len()).max(content_start);
        match parse_segment(&body[content_start..content_end]) {
            Some(part) => decoded.parts.push(part),
            None => decoded.skipped += 1,
        }
        current = next;
    }

    decoded
}

#[derive(Debug, Clone, Copy)]
struct Delimiter {
    /// Index of the first `-` of the delimiter.
    start: usize,
    /// Index just past the delimiter line.
    end: usize,
    terminal: bool,
}

fn find_delimiter(body: &[u8], delimiter: &[u8], from: usize) -> Option<Delimiter> {
    let mut search_from = from;
    while let Some(start) = find(body, delimiter, search_from) {
        search_from = start + 1;

        let line_start = start == 0 || (start >= 2 && &body[start - 2..start] == CRLF);
        if !line_start {
            continue;
        }

        let after = start + delimiter.len();
        let rest = &body[after..];
        if let Some(closing) = rest.strip_prefix(b"--") {
            // The closing marker only counts when the line ends right after it.
            if let Some(line_len) = line_end(closing, true) {
                return Some(Delimiter {
                    start,
                    end: after + 2 + line_len,
                    terminal: true,
                });
            }
            continue;
        }
        if rest.is_empty() {
            return Some(Delimiter {
                start,
                end: after,
                terminal: true,
            });
        }
        if let Some(line_len) = line_end(rest, false) {
            return Some(Delimiter {
                start,
                end: after + line_len,
                terminal: false,
            });
        }
    }
    None
}

/// Length of optional space/tab padding plus the CRLF that ends a delimiter
/// line. With `allow_eof`, padding that runs to the end of the body also ends it.
fn line_end(rest: &[u8], allow_eof: bool) -> Option<usize> {
    let padding = rest
        .iter()
        .take_while(|byte| **byte == b' ' || **byte == b'\t')
        .count();
    if rest[padding..].starts_with(CRLF) {
        Some(padding + CRLF.len())
    } else if allow_eof && padding == rest.len() {
        Some(padding)
    } else {
        None
    }
}

fn parse_segment(segment: &[u8]) -> Option<Part> {
    let separator = find(segment, HEADER_SEPARATOR, 0)?;
    let headers = String::from_utf8_lossy(&segment[..separator]);
    let (field_name, file_name) = parse_content_disposition(&headers)?;

    Some(Part {
        field_name,
        file_name: file_name.unwrap_or_else(|| DEFAULT_FILE_NAME.to_string()),
        data: segment[separator + HEADER_SEPARATOR.len()..].to_vec(),
    })
}

fn parse_content_disposition(headers: &str) -> Option<(String, Option<String>)> {
    let value = headers.lines().find_map(|line| {
        let (name, value) = line.split_once(':')?;
        if name.trim().eq_ignore_ascii_case("content-disposition") {
            Some(value.trim())
        } else {
            None
        }
    })?;

    if !value
        .split(';')
        .next()
        .is_some_and(|kind| kind.trim().eq_ignore_ascii_case("form-data"))
    {
        return None;
    }

    let field_name = name_pattern()
        .captures(value)
        .map(|captures| captures[1].to_string())
        .filter(|name| !name.is_empty())?;
    let file_name = filename_pattern()
        .captures(value)
        .map(|captures| captures[1].to_string())
        .filter(|name| !name.is_empty());

    Some((field_name, file_name))
}

fn name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"(?i)(?:^|[;\s])name="([^"]*)""#).expect("valid name pattern")
    })
}

fn filename_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"(?i)(?:^|[;\s])filename="([^"]*)""#).expect("valid filename pattern")
    })
}

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if needle.is_empty() || from >= haystack.len() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|offset| from + offset)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    const PNG_BYTES: [u8; 10] = [0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1a, b'\n', 0x00, 0xff];

    fn file_part(boundary: &str, name: &str, file_name: Option<&str>, data: &[u8]) -> Vec<u8> {
        let disposition = file_name.map_or_else(
            || format!("Content-Disposition: form-data; name=\"{name}\""),
            |file_name| {
                format!("Content-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"")
            },
        );
        let mut out = format!(
            "--{boundary}\r\n{disposition}\r\nContent-Type: application/octet-stream\r\n\r\n"
        )
        .into_bytes();
        out.extend_from_slice(data);
        out.extend_from_slice(b"\r\n");
        out
    }

    fn closing(boundary: &str) -> Vec<u8> {
        format!("--{boundary}--\r\n").into_bytes()
    }

    fn two_part_body() -> Vec<u8> {
        let mut body = file_part("XYZ", "file", Some("a.png"), &PNG_BYTES);
        body.extend(file_part("XYZ", "file", Some("b.txt"), b"hello"));
        body.extend(closing("XYZ"));
        body
    }

    #[test]
    fn decodes_two_parts_in_source_order() {
        let decoded = decode(&two_part_body(), "XYZ");

        assert_eq!(
            decoded.parts,
            vec![
                Part {
                    field_name: "file".to_string(),
                    file_name: "a.png".to_string(),
                    data: PNG_BYTES.to_vec(),
                },
                Part {
                    field_name: "file".to_string(),
                    file_name: "b.txt".to_string(),
                    data: b"hello".to_vec(),
                },
            ]
        );
        assert_eq!(decoded.skipped, 0);
    }

    #[test]
    fn decoding_is_idempotent() {
        let body = two_part_body();
        assert_eq!(decode(&body, "XYZ"), decode(&body, "XYZ"));
    }

    #[test]
    fn boundary_lookalikes_inside_body_are_not_split() {
        let payload = b"prefix --XYZ middle\r\n--XYZabc tail --XYZ--".to_vec();
        let mut body = file_part("XYZ", "file", Some("tricky.bin"), &payload);
        body.extend(closing("XYZ"));

        let decoded = decode(&body, "XYZ");
        assert_eq!(decoded.parts.len(), 1);
        assert_eq!(decoded.parts[0].data, payload);
    }

    #[test]
    fn closing_marker_must_end_its_line() {
        let payload = b"before\r\n--XYZ--junk\r\nafter".to_vec();
        let mut body = file_part("XYZ", "file", Some("a.bin"), &payload);
        body.extend(closing("XYZ"));

        let decoded = decode(&body, "XYZ");
        assert_eq!(decoded.parts.len(), 1);
        assert_eq!(decoded.parts[0].data, payload);
        assert_eq!(decoded.skipped, 0);
    }

    #[test]
    fn closing_marker_accepts_padding_or_end_of_body() {
        for tail in ["--XYZ-- \t\r\n", "--XYZ--"] {
            let mut body = file_part("XYZ", "file", Some("a.txt"), b"data");
            body.extend_from_slice(tail.as_bytes());

            let decoded = decode(&body, "XYZ");
            assert_eq!(decoded.parts.len(), 1, "{tail:?}");
            assert_eq!(decoded.parts[0].data, b"data".to_vec());
            assert_eq!(decoded.skipped, 0);
        }
    }

    #[test]
    fn missing_content_disposition_skips_only_that_part() {
        let mut body = b"--XYZ\r\nContent-Type: text/plain\r\n\r\norphan\r\n".to_vec();
        body.extend(file_part("XYZ", "file", Some("kept.txt"), b"kept"));
        body.extend(closing("XYZ"));

        let decoded = decode(&body, "XYZ");
        assert_eq!(decoded.parts.len(), 1);
        assert_eq!(decoded.parts[0].file_name, "kept.txt");
        assert_eq!(decoded.skipped, 1);
    }

    #[test]
    fn segment_without_header_separator_is_skipped() {
        let mut body = b"--XYZ\r\nContent-Disposition: form-data; name=\"x\"\r\n".to_vec();
        body.extend(file_part("XYZ", "file", Some("ok.txt"), b"ok"));
        body.extend(closing("XYZ"));

        let decoded = decode(&body, "XYZ");
        assert_eq!(decoded.parts.len(), 1);
        assert_eq!(decoded.skipped, 1);
    }

    #[test]
    fn unterminated_tail_returns_earlier_parts() {
        let mut body = file_part("XYZ", "file", Some("first.txt"), b"first");
        body.extend_from_slice(
            b"--XYZ\r\nContent-Disposition: form-data; name=\"file\"; filename=\"cut.txt\"\r\n\r\ncut off",
        );

        let decoded = decode(&body, "XYZ");
        assert_eq!(decoded.parts.len(), 1);
        assert_eq!(decoded.parts[0].data, b"first".to_vec());
        assert_eq!(decoded.skipped, 1);
    }

    #[test]
    fn missing_filename_defaults_to_placeholder() {
        let mut body = file_part("XYZ", "image", None, b"raw");
        body.extend(closing("XYZ"));

        let decoded = decode(&body, "XYZ");
        assert_eq!(decoded.parts[0].field_name, "image");
        assert_eq!(decoded.parts[0].file_name, DEFAULT_FILE_NAME);
    }

    #[test]
    fn preamble_and_epilogue_are_ignored() {
        let mut body = b"this is a preamble\r\n".to_vec();
        body.extend(file_part("XYZ", "file", Some("a.txt"), b"a"));
        body.extend(closing("XYZ"));
        body.extend_from_slice(b"epilogue bytes");

        let decoded = decode(&body, "XYZ");
        assert_eq!(decoded.parts.len(), 1);
        assert_eq!(decoded.skipped, 0);
    }

    #[test]
    fn header_names_match_case_insensitively_and_keep_utf8_filenames() {
        let body = "--XYZ\r\ncontent-disposition: form-data; name=\"file\"; filename=\"截图 1.png\"\r\n\r\ndata\r\n--XYZ--\r\n";

        let decoded = decode(body.as_bytes(), "XYZ");
        assert_eq!(decoded.parts[0].file_name, "截图 1.png");
    }

    #[test]
    fn empty_part_body_is_preserved() {
        let mut body = file_part("XYZ", "file", Some("empty.txt"), b"");
        body.extend(closing("XYZ"));

        let decoded = decode(&body, "XYZ");
        assert_eq!(decoded.parts[0].data, Vec::<u8>::new());
    }

    #[test]
    fn body_without_any_delimiter_yields_nothing() {
        let decoded = decode(b"no multipart here", "XYZ");
        assert!(decoded.parts.is_empty());
        assert_eq!(decoded.skipped, 0);
    }

    #[test]
    fn quoted_and_unquoted_boundaries_resolve_identically() {
        assert_eq!(
            parse_boundary("multipart/form-data; boundary=\"abc\""),
            Some("abc".to_string())
        );
        assert_eq!(
            parse_boundary("multipart/form-data; boundary=abc"),
            Some("abc".to_string())
        );
        assert_eq!(
            parse_boundary("multipart/form-data; charset=utf-8; BOUNDARY=abc"),
            Some("abc".to_string())
        );
    }

    #[test]
    fn missing_or_empty_boundary_is_rejected() {
        assert_eq!(parse_boundary("multipart/form-data"), None);
        assert_eq!(parse_boundary("multipart/form-data; boundary="), None);
        assert_eq!(parse_boundary("multipart/form-data; boundary=\"\""), None);
    }

    #[test]
    fn multipart_detection_ignores_parameters_and_case() {
        assert!(is_multipart_form_data("Multipart/Form-Data; boundary=x"));
        assert!(!is_multipart_form_data("image/png"));
        assert!(!is_multipart_form_data("application/x-www-form-urlencoded"));
    }
}
