//! Response content negotiation and CSV rendering for list exports.

pub const JSON_MEDIA_TYPE: &str = "application/json";
pub const CSV_MEDIA_TYPE: &str = "text/csv";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContentType {
    #[default]
    Json,
    Csv,
}

impl ContentType {
    /// Picks the representation from an `Accept` header. The highest-quality
    /// media type we can produce wins; anything else falls back to JSON.
    pub fn negotiate(accept: Option<&str>) -> Self {
        let Some(accept) = accept else {
            return ContentType::Json;
        };

        let mut ranges: Vec<(&str, f32)> = accept
            .split(',')
            .filter_map(|range| {
                let mut parts = range.split(';');
                let media = parts.next()?.trim();
                if media.is_empty() {
                    return None;
                }
                let quality = parts
                    .filter_map(|param| param.trim().strip_prefix("q="))
                    .find_map(|q| q.trim().parse::<f32>().ok())
                    .unwrap_or(1.0);
                Some((media, quality))
            })
            .collect();
        // stable: equal weights keep header order
        ranges.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        for (media, quality) in ranges {
            if quality <= 0.0 {
                continue;
            }
            if media.eq_ignore_ascii_case(CSV_MEDIA_TYPE) {
                return ContentType::Csv;
            }
            if media.eq_ignore_ascii_case(JSON_MEDIA_TYPE)
                || media == "*/*"
                || media.eq_ignore_ascii_case("application/*")
            {
                return ContentType::Json;
            }
        }
        ContentType::Json
    }

    pub fn media_type(self) -> &'static str {
        match self {
            ContentType::Json => JSON_MEDIA_TYPE,
            ContentType::Csv => CSV_MEDIA_TYPE,
        }
    }
}

fn escape_csv_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Renders a header row followed by one line per record (RFC 4180 quoting).
pub fn render_csv<I>(header: &[&str], records: I) -> String
where
    I: IntoIterator<Item = Vec<String>>,
{
    let mut out = String::new();
    let header_line: Vec<String> = header.iter().map(|h| escape_csv_field(h)).collect();
    out.push_str(&header_line.join(","));
    out.push_str("\r\n");
    for record in records {
        let line: Vec<String> = record.iter().map(|f| escape_csv_field(f)).collect();
        out.push_str(&line.join(","));
        out.push_str("\r\n");
    }
    out
}
