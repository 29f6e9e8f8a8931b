//! ADQL text for a [`Selection`]. Pure string building, no IO.
//!
//! A name-list selection may be split into several queries so no single
//! request URL grows past `names_per_query` names. An empty name list maps to
//! zero queries.

use lex_schemas::{RowFilter, Selection};

/// Remote identifiers needed to phrase a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryShape {
    pub table: String,
    pub columns: Vec<String>,
    pub name_column: String,
    pub release_column: String,
    pub update_column: String,
    pub names_per_query: usize,
}

/// Single-quoted ADQL string literal.
pub fn quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

/// `where` clauses covering `filter`, one per request.
pub fn where_clauses(shape: &QueryShape, filter: &RowFilter) -> Vec<Option<String>> {
    match filter {
        RowFilter::All => vec![None],
        RowFilter::ChangedSince(d) => {
            let d = quote(&d.format("%Y-%m-%d").to_string());
            vec![Some(format!(
                "{} >= {d} or {} >= {d}",
                shape.release_column, shape.update_column
            ))]
        }
        RowFilter::Names(names) => names
            .chunks(shape.names_per_query.max(1))
            .map(|chunk| {
                let list = chunk.iter().map(|n| quote(n)).collect::<Vec<_>>().join(",");
                Some(format!("{} in ({list})", shape.name_column))
            })
            .collect(),
    }
}

fn with_where(head: String, clause: Option<String>) -> String {
    match clause {
        Some(w) => format!("{head} where {w}"),
        None => head,
    }
}

pub fn rows_queries(shape: &QueryShape, sel: &Selection) -> Vec<String> {
    let head = format!("select {} from {}", shape.columns.join(","), shape.table);
    where_clauses(shape, &sel.filter)
        .into_iter()
        .map(|w| with_where(head.clone(), w))
        .collect()
}

pub fn names_queries(shape: &QueryShape, sel: &Selection) -> Vec<String> {
    let head = format!("select distinct {} from {}", shape.name_column, shape.table);
    where_clauses(shape, &sel.filter)
        .into_iter()
        .map(|w| with_where(head.clone(), w))
        .collect()
}

pub fn count_queries(shape: &QueryShape, sel: &Selection) -> Vec<String> {
    let head = format!("select count(*) from {}", shape.table);
    where_clauses(shape, &sel.filter)
        .into_iter()
        .map(|w| with_where(head.clone(), w))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use lex_schemas::Table;

    fn shape(per_query: usize) -> QueryShape {
        QueryShape {
            table: "pscomppars".into(),
            columns: vec!["pl_name".into(), "disc_year".into()],
            name_column: "pl_name".into(),
            release_column: "releasedate".into(),
            update_column: "rowupdate".into(),
            names_per_query: per_query,
        }
    }

    #[test]
    fn all_rows_has_no_where() {
        let q = rows_queries(&shape(10), &Selection::all(Table::Composite));
        assert_eq!(q, vec!["select pl_name,disc_year from pscomppars".to_string()]);
    }

    #[test]
    fn names_are_quoted_and_chunked() {
        let sel = Selection::names(
            Table::Composite,
            vec!["A b".into(), "O'Neil c".into(), "C".into()],
        );
        let q = rows_queries(&shape(2), &sel);
        assert_eq!(q.len(), 2);
        assert_eq!(
            q[0],
            "select pl_name,disc_year from pscomppars where pl_name in ('A b','O''Neil c')"
        );
        assert_eq!(q[1], "select pl_name,disc_year from pscomppars where pl_name in ('C')");
    }

    #[test]
    fn empty_name_list_maps_to_no_request() {
        let sel = Selection::names(Table::Composite, vec![]);
        assert!(rows_queries(&shape(5), &sel).is_empty());
        assert!(count_queries(&shape(5), &sel).is_empty());
    }

    #[test]
    fn changed_since_checks_release_and_update() {
        let d = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let q = names_queries(&shape(5), &Selection::changed_since(Table::Observations, d));
        assert_eq!(
            q,
            vec![
                "select distinct pl_name from pscomppars where releasedate >= '2024-03-01' or rowupdate >= '2024-03-01'"
                    .to_string()
            ]
        );
    }

    #[test]
    fn count_query_shape() {
        let q = count_queries(&shape(5), &Selection::all(Table::Composite));
        assert_eq!(q, vec!["select count(*) from pscomppars".to_string()]);
    }
}
