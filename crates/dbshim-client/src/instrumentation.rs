//! Tracing instrumentation for facade operations.
//!
//! Every driver round trip runs inside a `tracing` span. Statement text is
//! recorded on the span after sanitization so literal values never reach
//! the logs.
//!
//! ## Span fields
//!
//! - `db.system`: driver name
//! - `db.operation`: leading keyword of the statement (SELECT, INSERT, ...)
//! - `db.statement`: sanitized, truncated statement text
//! - `db.connection_id`: facade-assigned connection id

use tracing::Span;

/// Span names for facade operations.
pub mod span_names {
    /// Opening a connection.
    pub const OPEN: &str = "dbshim.open";
    /// Closing a connection.
    pub const CLOSE: &str = "dbshim.close";
    /// Executing a command.
    pub const EXECUTE: &str = "dbshim.execute";
}

/// Configuration for statement sanitization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SanitizationConfig {
    /// Whether literals are replaced by the placeholder.
    pub enabled: bool,
    /// Maximum recorded statement length in bytes.
    pub max_length: usize,
    /// Replacement for literal values.
    pub placeholder: String,
}

impl Default for SanitizationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_length: 2048,
            placeholder: "?".to_string(),
        }
    }
}

impl SanitizationConfig {
    /// Record statements as written (still truncated to `max_length`).
    #[must_use]
    pub fn no_sanitization() -> Self {
        Self {
            enabled: false,
            max_length: usize::MAX,
            placeholder: String::new(),
        }
    }

    /// Apply the configuration to a statement.
    #[must_use]
    pub fn sanitize(&self, sql: &str) -> String {
        if self.enabled {
            truncate(&replace_literals(sql, &self.placeholder), self.max_length)
        } else {
            truncate(sql, self.max_length)
        }
    }
}

fn replace_literals(sql: &str, placeholder: &str) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut chars = sql.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\'' => {
                // Quoted literal; '' is an escaped quote inside it.
                loop {
                    match chars.next() {
                        Some('\'') if chars.peek() == Some(&'\'') => {
                            chars.next();
                        }
                        Some('\'') | None => break,
                        Some(_) => {}
                    }
                }
                out.push_str(placeholder);
            }
            'N' if chars.peek() == Some(&'\'') => {
                // National string prefix belongs to the literal.
            }
            d if d.is_ascii_digit() && !ends_in_identifier(&out) => {
                while chars.peek().is_some_and(|n| n.is_ascii_digit() || *n == '.') {
                    chars.next();
                }
                out.push_str(placeholder);
            }
            other => out.push(other),
        }
    }
    out
}

fn ends_in_identifier(s: &str) -> bool {
    s.ends_with(|p: char| p.is_alphanumeric() || p == '_' || p == '@')
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }
    let mut end = max_len.saturating_sub(3);
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &s[..end])
}

/// Leading keyword of a statement, upper-cased.
#[must_use]
pub fn extract_operation(sql: &str) -> &'static str {
    let keyword = sql
        .trim_start()
        .split(|c: char| !c.is_ascii_alphabetic())
        .next()
        .unwrap_or_default()
        .to_ascii_uppercase();

    match keyword.as_str() {
        "SELECT" | "WITH" => "SELECT",
        "INSERT" => "INSERT",
        "UPDATE" => "UPDATE",
        "DELETE" => "DELETE",
        "MERGE" => "MERGE",
        "EXEC" | "EXECUTE" => "EXECUTE",
        "DECLARE" => "DECLARE",
        "SET" => "SET",
        "BEGIN" => "BEGIN",
        "COMMIT" => "COMMIT",
        "ROLLBACK" => "ROLLBACK",
        "CREATE" => "CREATE",
        "ALTER" => "ALTER",
        "DROP" => "DROP",
        _ => "OTHER",
    }
}

/// Span for opening a connection.
pub(crate) fn open_span(system: &str, connection_id: u64, application: &str) -> Span {
    tracing::debug_span!(
        span_names::OPEN,
        db.system = system,
        db.connection_id = connection_id,
        app = application,
    )
}

/// Span for closing a connection.
pub(crate) fn close_span(system: &str, connection_id: u64) -> Span {
    tracing::debug_span!(
        span_names::CLOSE,
        db.system = system,
        db.connection_id = connection_id,
    )
}

/// Span for executing a command.
pub(crate) fn execute_span(
    system: &str,
    connection_id: u64,
    sql: &str,
    sanitization: &SanitizationConfig,
) -> Span {
    tracing::debug_span!(
        span_names::EXECUTE,
        db.system = system,
        db.connection_id = connection_id,
        db.operation = extract_operation(sql),
        db.statement = %sanitization.sanitize(sql),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_operation() {
        assert_eq!(extract_operation("SELECT Name FROM Person;"), "SELECT");
        assert_eq!(extract_operation("  select top(1) Name from Person"), "SELECT");
        assert_eq!(extract_operation("WITH x AS (SELECT 1) SELECT * FROM x"), "SELECT");
        assert_eq!(extract_operation("DECLARE @Name NVARCHAR(MAX) = 'Adam';"), "DECLARE");
        assert_eq!(extract_operation("EXEC sp_who"), "EXECUTE");
        assert_eq!(extract_operation("update t set a = 1"), "UPDATE");
        assert_eq!(extract_operation(""), "OTHER");
        assert_eq!(extract_operation("???"), "OTHER");
    }

    #[test]
    fn test_sanitize_literals() {
        let config = SanitizationConfig::default();
        assert_eq!(
            config.sanitize("DECLARE @Name NVARCHAR(MAX) = 'Adam';"),
            "DECLARE @Name NVARCHAR(MAX) = ?;"
        );
        assert_eq!(
            config.sanitize("SELECT * FROM Person WHERE Name = N'O''Brien' AND Age > 42"),
            "SELECT * FROM Person WHERE Name = ? AND Age > ?"
        );
        assert_eq!(
            config.sanitize("SELECT TOP(1) Name FROM Person;"),
            "SELECT TOP(?) Name FROM Person;"
        );
    }

    #[test]
    fn test_identifiers_with_digits_kept() {
        let config = SanitizationConfig::default();
        assert_eq!(
            config.sanitize("SELECT col1 FROM t2 WHERE @p1 = 3"),
            "SELECT col1 FROM t2 WHERE @p1 = ?"
        );
    }

    #[test]
    fn test_unterminated_literal() {
        let config = SanitizationConfig::default();
        assert_eq!(config.sanitize("SELECT 'abc"), "SELECT ?");
    }

    #[test]
    fn test_no_sanitization_keeps_text() {
        let config = SanitizationConfig::no_sanitization();
        let sql = "SELECT * FROM Person WHERE Name = 'Adam'";
        assert_eq!(config.sanitize(sql), sql);
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("hello", 10), "hello");
        assert_eq!(truncate("hello world", 8), "hello...");
        assert_eq!(truncate("ééééé", 6), "é...");
    }
}
