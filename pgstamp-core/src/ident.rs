//! SQL identifier validation for user-configured table names.

use crate::error::{MigratorError, MigratorResult};

/// Validate a possibly schema-qualified identifier (`table` or
/// `schema.table`) and return it double-quoted, ready to splice into DDL.
pub fn quote_qualified(name: &str) -> MigratorResult<String> {
    let parts: Vec<&str> = name.split('.').collect();
    if parts.len() > 2 {
        return Err(MigratorError::config(format!(
            "invalid table name '{}': at most one schema qualifier is allowed",
            name
        )));
    }

    let quoted = parts
        .iter()
        .map(|part| quote_ident(part).map_err(|_| invalid(name)))
        .collect::<MigratorResult<Vec<_>>>()?;

    Ok(quoted.join("."))
}

/// Validate a single identifier and return it double-quoted.
pub fn quote_ident(ident: &str) -> MigratorResult<String> {
    let mut chars = ident.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    let valid_rest = chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$');

    // NAMEDATALEN - 1
    if !valid_start || !valid_rest || ident.len() > 63 {
        return Err(invalid(ident));
    }
    Ok(format!("\"{}\"", ident))
}

/// Double-quote any identifier, escaping embedded quotes.
///
/// Used for names the caller does not control the shape of, such as
/// database names taken from a connection URL.
pub fn escape_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

fn invalid(name: &str) -> MigratorError {
    MigratorError::config(format!("invalid identifier '{}'", name))
}
