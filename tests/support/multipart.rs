//! Reads back `multipart/form-data` bodies captured by the fake backend.

/// One part of a form body.
#[derive(Debug, Clone)]
pub struct Part {
    pub name: String,
    pub filename: Option<String>,
    pub data: Vec<u8>,
}

/// `boundary=` parameter of a Content-Type value, quotes removed.
pub fn boundary_of(content_type: &str) -> Option<String> {
    content_type.split(';').find_map(|param| {
        let value = param.trim().strip_prefix("boundary=")?;
        Some(value.trim_matches('"').to_owned())
    })
}

/// Every well-formed part of `body`, in order.
pub fn parse(body: &[u8], boundary: &str) -> Vec<Part> {
    let delimiter = format!("\r\n--{}", boundary).into_bytes();
    // Prefix a CRLF so the first delimiter looks like all the others.
    let mut framed = b"\r\n".to_vec();
    framed.extend_from_slice(body);

    let mut parts = Vec::new();
    let mut rest: &[u8] = &framed;
    while let Some(start) = position(rest, &delimiter) {
        rest = &rest[start + delimiter.len()..];
        if rest.starts_with(b"--") {
            break;
        }
        let Some(end) = position(rest, &delimiter) else { break };
        if let Some(part) = parse_part(&rest[..end]) {
            parts.push(part);
        }
    }
    parts
}

fn parse_part(raw: &[u8]) -> Option<Part> {
    let raw = raw.strip_prefix(b"\r\n")?;
    let split = position(raw, b"\r\n\r\n")?;
    let headers = std::str::from_utf8(&raw[..split]).ok()?;
    let disposition = headers
        .lines()
        .find(|l| l.to_ascii_lowercase().starts_with("content-disposition:"))?;
    Some(Part {
        name: quoted_param(disposition, "name")?,
        filename: quoted_param(disposition, "filename"),
        data: raw[split + 4..].to_vec(),
    })
}

/// Value of `key="..."` in a header line, honouring `\"` escapes.
fn quoted_param(line: &str, key: &str) -> Option<String> {
    let needle = format!("; {}=\"", key);
    let start = line.find(&needle)? + needle.len();
    let mut value = String::new();
    let mut chars = line[start..].chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => value.push(chars.next()?),
            '"' => return Some(value),
            other => value.push(other),
        }
    }
    None
}

fn position(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}
