use crate::errors::DbError;
use crate::query::{self, Order, Projection, SortSpec};
use serde::Serialize;
use std::io::Write;

/// Writes `value` as one JSON line.
pub fn write_line<T: Serialize + ?Sized>(out: &mut dyn Write, value: &T) -> Result<(), DbError> {
    let line = serde_json::to_string(value)?;
    writeln!(out, "{line}")?;
    Ok(())
}

/// Writes a `{"step": .., "result": ..}` line for the demo script.
pub fn write_step<T: Serialize + ?Sized>(out: &mut dyn Write, step: &str, value: &T) -> Result<(), DbError> {
    write_line(out, &serde_json::json!({ "step": step, "result": value }))
}

/// Accepts `{"price": -1}` or the `price,-title` shorthand.
pub fn parse_sort_arg(s: &str) -> Result<Vec<SortSpec>, DbError> {
    if s.trim_start().starts_with('{') {
        return query::parse_sort_json(s);
    }
    let specs: Vec<SortSpec> = s
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|part| {
            let (order, field) = if let Some(rest) = part.strip_prefix('-') {
                (Order::Desc, rest)
            } else if let Some(rest) = part.strip_prefix('+') {
                (Order::Asc, rest)
            } else {
                (Order::Asc, part)
            };
            SortSpec { field: field.to_string(), order }
        })
        .collect();
    if specs.is_empty() {
        return Err(DbError::QueryError(format!("empty sort: {s:?}")));
    }
    Ok(specs)
}

/// Accepts a JSON projection or a comma-separated include list.
pub fn parse_projection_arg(s: &str) -> Result<Projection, DbError> {
    if s.trim_start().starts_with('{') {
        return query::parse_projection_json(s);
    }
    let fields: Vec<&str> = s.split(',').map(str::trim).filter(|f| !f.is_empty()).collect();
    if fields.is_empty() {
        return Err(DbError::QueryError(format!("empty projection: {s:?}")));
    }
    Ok(Projection::include(&fields))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sort_shorthand() {
        assert_eq!(
            parse_sort_arg("-price, title").unwrap(),
            vec![SortSpec::desc("price"), SortSpec::asc("title")]
        );
        assert_eq!(parse_sort_arg(r#"{"price": 1}"#).unwrap(), vec![SortSpec::asc("price")]);
        assert!(parse_sort_arg(" , ").is_err());
    }

    #[test]
    fn projection_shorthand() {
        assert_eq!(parse_projection_arg("title,author").unwrap(), Projection::include(&["title", "author"]));
        assert!(parse_projection_arg(r#"{"title": 1, "pages": 0}"#).is_err());
    }
}
