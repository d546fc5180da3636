//! Supported SQL dialects and their syntax rules.
//!
//! The `Dialect` is fixed when a `Connection` is constructed and determines
//! identifier quoting, the parameter-marker prefix, string concatenation
//! rewriting, native auto-increment availability and server-side paging
//! syntax. All SQL handed to the core is dialect-neutral: `[bracketed]`
//! identifiers and `@pN` parameter markers, rewritten here.

use serde::{Deserialize, Serialize};

/// The four supported SQL backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    SqlServer,
    PostgreSql,
    Oracle,
    MySql,
}

impl Dialect {
    /// Get the display name for this dialect.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::SqlServer => "SQL Server",
            Self::PostgreSql => "PostgreSQL",
            Self::Oracle => "Oracle",
            Self::MySql => "MySQL",
        }
    }

    /// Get the default port for this dialect's server.
    pub fn default_port(&self) -> u16 {
        match self {
            Self::SqlServer => 1433,
            Self::PostgreSql => 5432,
            Self::Oracle => 1521,
            Self::MySql => 3306,
        }
    }

    /// Opening identifier quote.
    pub fn opening_quote(&self) -> &'static str {
        match self {
            Self::SqlServer => "[",
            Self::PostgreSql | Self::Oracle => "\"",
            Self::MySql => "`",
        }
    }

    /// Closing identifier quote.
    pub fn closing_quote(&self) -> &'static str {
        match self {
            Self::SqlServer => "]",
            Self::PostgreSql | Self::Oracle => "\"",
            Self::MySql => "`",
        }
    }

    /// Prefix used for named parameters in SQL text.
    pub fn parameter_marker(&self) -> &'static str {
        match self {
            Self::Oracle => ":",
            _ => "@",
        }
    }

    /// Whether the backend exposes native sequence objects.
    ///
    /// The other two dialects rely on auto-increment columns instead; the
    /// sequence allocator returns 0 for them and callers must branch on this
    /// capability.
    pub fn supports_sequences(&self) -> bool {
        matches!(self, Self::PostgreSql | Self::Oracle)
    }

    /// Whether the backend has native auto-increment column semantics.
    pub fn supports_auto_increment(&self) -> bool {
        matches!(self, Self::SqlServer | Self::MySql)
    }

    /// Whether `OFFSET n ROWS FETCH NEXT m ROWS ONLY` paging may be appended
    /// by the executor.
    pub fn supports_server_side_paging(&self) -> bool {
        matches!(self, Self::SqlServer)
    }

    /// Oracle rejects a trailing semicolon on statements sent through the
    /// driver.
    pub fn forbids_trailing_semicolon(&self) -> bool {
        matches!(self, Self::Oracle)
    }

    /// Wrap an identifier in this dialect's quotes.
    pub fn quote(&self, identifier: &str) -> String {
        format!(
            "{}{}{}",
            self.opening_quote(),
            identifier,
            self.closing_quote()
        )
    }

    /// Strip this dialect's quotes from an identifier, if present.
    pub fn unquote<'a>(&self, identifier: &'a str) -> &'a str {
        identifier
            .strip_prefix(self.opening_quote())
            .and_then(|s| s.strip_suffix(self.closing_quote()))
            .unwrap_or(identifier)
    }

    /// Rewrite dialect-neutral SQL into this dialect's physical syntax.
    ///
    /// `[bracketed]` identifiers become the dialect quotes, `@p` markers get
    /// the dialect prefix, and trailing semicolons are stripped where the
    /// dialect forbids them.
    pub fn format_sql(&self, sql: &str) -> String {
        let rewritten = sql
            .replace('[', self.opening_quote())
            .replace(']', self.closing_quote())
            .replace("@p", &format!("{}p", self.parameter_marker()));
        self.strip_trailing_semicolon(&rewritten)
    }

    /// Remove trailing semicolons where the dialect rejects them.
    pub fn strip_trailing_semicolon(&self, sql: &str) -> String {
        if self.forbids_trailing_semicolon() && sql.trim_end().ends_with(';') {
            sql.trim_end().trim_end_matches(';').to_string()
        } else {
            sql.to_string()
        }
    }

    /// Rewrite the neutral `+` string-concatenation operator.
    ///
    /// SQL Server keeps `+`; the other backends use `||`.
    pub fn format_string_concat(&self, expression: &str) -> String {
        match self {
            Self::SqlServer => expression.to_string(),
            _ => expression.replace('+', "||"),
        }
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}
