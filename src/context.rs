//! Uploaded-context handling: parse an uploaded artifact once at ingestion,
//! then fold it into outgoing messages as a delimited block.

use crate::error::RelayError;

/// Upper bound on previewed table rows, to keep the payload small.
pub const MAX_PREVIEW_ROWS: usize = 20;

/// Column names plus a bounded row preview of an uploaded table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TablePreview {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl TablePreview {
    /// Parse a decoded CSV body. The first non-empty line is the header,
    /// the rest are data rows; at most [`MAX_PREVIEW_ROWS`] rows are kept.
    /// Ragged rows or a missing header are a [`RelayError::ContextRead`].
    pub fn parse_csv(body: &str) -> Result<Self, RelayError> {
        let mut lines = body.lines().filter(|line| !line.trim().is_empty());

        let header = lines
            .next()
            .ok_or_else(|| RelayError::ContextRead("uploaded table is empty".to_string()))?;
        let columns = split_fields(header);
        if columns.iter().all(|c| c.is_empty()) {
            return Err(RelayError::ContextRead(
                "uploaded table has no header".to_string(),
            ));
        }

        let mut rows = Vec::new();
        for line in lines.take(MAX_PREVIEW_ROWS) {
            let fields = split_fields(line);
            if fields.len() != columns.len() {
                return Err(RelayError::ContextRead(format!(
                    "row has {} fields, expected {}",
                    fields.len(),
                    columns.len()
                )));
            }
            rows.push(fields);
        }

        Ok(TablePreview { columns, rows })
    }
}

/// Split one CSV line into fields, honoring double quotes and `""` escapes.
fn split_fields(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                chars.next();
                current.push('"');
            }
            '"' => {
                in_quotes = !in_quotes;
            }
            ',' if !in_quotes => {
                fields.push(current.trim().to_string());
                current.clear();
            }
            _ => {
                current.push(ch);
            }
        }
    }
    fields.push(current.trim().to_string());

    fields
}

/// An artifact attached to the session. Replaced wholesale on each upload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UploadedContext {
    Table(TablePreview),
    Text(String),
}

impl UploadedContext {
    /// Accept an uploaded artifact. `.csv` is parsed into a table preview,
    /// `.txt` is kept verbatim; anything else is rejected.
    pub fn from_file_name_and_bytes(name: &str, bytes: &[u8]) -> Result<Self, RelayError> {
        let body = std::str::from_utf8(bytes)
            .map_err(|_| RelayError::ContextRead(format!("{} is not valid UTF-8", name)))?;

        let lower = name.to_ascii_lowercase();
        if lower.ends_with(".csv") {
            Ok(UploadedContext::Table(TablePreview::parse_csv(body)?))
        } else if lower.ends_with(".txt") {
            Ok(UploadedContext::Text(body.to_string()))
        } else {
            Err(RelayError::ContextRead(format!(
                "unsupported upload type: {}",
                name
            )))
        }
    }

    fn render(&self) -> String {
        match self {
            UploadedContext::Table(table) => {
                let mut block = String::from("[uploaded data]\n");
                block.push_str("columns: ");
                block.push_str(&table.columns.join(", "));
                block.push_str("\npreview:\n");
                for row in &table.rows {
                    block.push_str(&row.join(", "));
                    block.push('\n');
                }
                block
            }
            UploadedContext::Text(text) => {
                format!("[uploaded file]\n{}\n", text.trim_end())
            }
        }
    }
}

/// Append uploaded context to the outgoing message, returning an augmented
/// copy. The caller's message is never mutated; without context the message
/// comes back unchanged.
pub fn merge(message: &str, context: Option<&UploadedContext>) -> String {
    match context {
        None => message.to_string(),
        Some(ctx) => format!("{}\n\n{}", message.trim_end(), ctx.render()),
    }
}
