//! SQL identifier quoting.

/// Quote a SQL identifier using ANSI double-quoting.
///
/// Embedded double-quotes are escaped by doubling them (`"` → `""`), which
/// makes the result safe against injection for any input string.
///
/// # Examples
///
/// ```
/// use rowbatch_core::quote_ident;
///
/// assert_eq!(quote_ident("users"), "\"users\"");
/// assert_eq!(quote_ident("user\"name"), "\"user\"\"name\"");
/// assert_eq!(quote_ident("select"), "\"select\"");
/// ```
#[inline]
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_and_keyword_identifiers() {
        assert_eq!(quote_ident("users"), "\"users\"");
        assert_eq!(quote_ident("from"), "\"from\"");
    }

    #[test]
    fn embedded_quotes_are_doubled() {
        assert_eq!(quote_ident("a\"b\"c"), "\"a\"\"b\"\"c\"");
    }

    #[test]
    fn injection_attempt_stays_an_identifier() {
        let quoted = quote_ident("users\"; DROP TABLE secrets; --");
        assert_eq!(quoted, "\"users\"\"; DROP TABLE secrets; --\"");
    }
}
