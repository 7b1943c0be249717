//! Script text assembly and batch handling.

/// Batch separator understood by SQL Server tooling.
pub const BATCH_SEPARATOR: &str = "GO";

const INDENT: &str = "    ";

/// Line-oriented builder for generated T-SQL.
#[derive(Debug, Default)]
pub(crate) struct ScriptBuilder {
    buf: String,
}

impl ScriptBuilder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Append one line at the given indentation depth.
    pub(crate) fn line(&mut self, depth: usize, text: impl AsRef<str>) -> &mut Self {
        for _ in 0..depth {
            self.buf.push_str(INDENT);
        }
        self.buf.push_str(text.as_ref());
        self.buf.push('\n');
        self
    }

    /// Append (possibly multi-line) text verbatim, terminated by a newline.
    pub(crate) fn raw(&mut self, text: impl AsRef<str>) -> &mut Self {
        self.buf.push_str(text.as_ref());
        self.buf.push('\n');
        self
    }

    pub(crate) fn blank(&mut self) -> &mut Self {
        self.buf.push('\n');
        self
    }

    /// Terminate the batch and return the script.
    pub(crate) fn finish(mut self) -> String {
        self.buf.push_str(BATCH_SEPARATOR);
        self.buf.push('\n');
        self.buf
    }
}

/// Split a script into batches on `GO` separator lines.
///
/// A separator is a line holding only `GO` (any case, surrounding
/// whitespace ignored). Batches that contain only whitespace are dropped.
pub fn split_batches(sql: &str) -> Vec<&str> {
    let mut batches = Vec::new();
    let mut start = 0;
    let mut offset = 0;

    for line in sql.split_inclusive('\n') {
        if line.trim().eq_ignore_ascii_case(BATCH_SEPARATOR) {
            push_batch(&mut batches, &sql[start..offset]);
            start = offset + line.len();
        }
        offset += line.len();
    }
    push_batch(&mut batches, &sql[start..]);

    batches
}

fn push_batch<'a>(batches: &mut Vec<&'a str>, batch: &'a str) {
    let trimmed = batch.trim();
    if !trimmed.is_empty() {
        batches.push(trimmed);
    }
}
