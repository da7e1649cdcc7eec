//! Query fragments for list operations built on `sqlx::QueryBuilder`.
//!
//! Identifiers are quoted and every filter value is a bound parameter; no
//! client-supplied text is ever spliced into SQL.

use sqlx::{Postgres, QueryBuilder};

use crate::rest::options::{Filter, FilterValue, ListOptions};

/// Maps a resource field name to its column: `ipRestrictions` and
/// `IPRestrictions` both become `ip_restrictions`.
pub fn to_column_name(field: &str) -> String {
    let chars: Vec<char> = field.chars().collect();
    let mut out = String::with_capacity(field.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if c.is_ascii_uppercase() {
            let prev = i.checked_sub(1).map(|p| chars[p]);
            let next = chars.get(i + 1).copied();
            let boundary = match prev {
                Some(p) if p.is_ascii_lowercase() || p.is_ascii_digit() => true,
                Some(p) if p.is_ascii_uppercase() => next.is_some_and(|n| n.is_ascii_lowercase()),
                _ => false,
            };
            if boundary && !out.ends_with('_') {
                out.push('_');
            }
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn push_filter(builder: &mut QueryBuilder<'_, Postgres>, filter: &Filter, integer_columns: &[&str]) {
    let column_name = to_column_name(&filter.field);
    let column = quote_identifier(&column_name);
    match filter.bind_value() {
        FilterValue::Null => {
            builder.push(column).push(" IS NULL");
        }
        FilterValue::Integer(value) if integer_columns.contains(&column_name.as_str()) => {
            builder
                .push(column)
                .push(" ")
                .push(filter.operator.symbol())
                .push(" ")
                .push_bind(value);
        }
        // everything else compares through the column's text form
        _ => {
            builder
                .push(column)
                .push("::text ")
                .push(filter.operator.symbol())
                .push(" ")
                .push_bind(filter.value.clone());
        }
    }
}

/// Appends ` WHERE a AND b ...`; nothing when there are no filters.
/// Numeric values compare numerically only on `integer_columns`.
pub fn push_where(
    builder: &mut QueryBuilder<'_, Postgres>,
    filters: &[Filter],
    integer_columns: &[&str],
) {
    for (i, filter) in filters.iter().enumerate() {
        builder.push(if i == 0 { " WHERE " } else { " AND " });
        push_filter(builder, filter, integer_columns);
    }
}

/// Appends ` ORDER BY`, falling back to `default_column` so paging is stable.
pub fn push_order(builder: &mut QueryBuilder<'_, Postgres>, opts: &ListOptions, default_column: &str) {
    let column = opts
        .order
        .as_deref()
        .map(to_column_name)
        .unwrap_or_else(|| default_column.to_string());
    builder.push(" ORDER BY ").push(quote_identifier(&column));
    builder.push(if opts.descending { " DESC" } else { " ASC" });
    if column != default_column {
        builder.push(", ").push(quote_identifier(default_column)).push(" ASC");
    }
}

/// Appends ` LIMIT size+1 OFFSET page*size`.
pub fn push_paging(builder: &mut QueryBuilder<'_, Postgres>, opts: &ListOptions) {
    builder
        .push(" LIMIT ")
        .push_bind(opts.fetch_limit())
        .push(" OFFSET ")
        .push_bind(opts.offset());
}
