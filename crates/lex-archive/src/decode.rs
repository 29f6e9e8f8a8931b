// CSV response bodies. Every response carries a header row, which is skipped.

use lex_schemas::Row;

use crate::ArchiveError;

fn reader(body: &str) -> csv::Reader<&[u8]> {
    csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(false)
        .from_reader(body.as_bytes())
}

/// Rows of exactly `width` cells, typed with [`lex_schemas::Cell::cast`].
pub fn decode_rows(body: &str, width: usize) -> Result<Vec<Row>, ArchiveError> {
    let mut out = Vec::new();
    for (i, rec) in reader(body).records().enumerate() {
        let rec = rec.map_err(|e| ArchiveError::Decode(format!("csv row {}: {e}", i + 1)))?;
        if rec.len() != width {
            return Err(ArchiveError::Decode(format!(
                "csv row {}: expected {width} columns, got {}",
                i + 1,
                rec.len()
            )));
        }
        out.push(Row::from_raw(rec.iter()));
    }
    Ok(out)
}

/// First column of every record.
pub fn decode_names(body: &str) -> Result<Vec<String>, ArchiveError> {
    let mut out = Vec::new();
    for rec in reader(body).records() {
        let rec = rec.map_err(|e| ArchiveError::Decode(e.to_string()))?;
        match rec.get(0) {
            Some(name) if !name.is_empty() => out.push(name.to_string()),
            _ => {}
        }
    }
    Ok(out)
}

/// Single-cell `count(*)` response.
pub fn decode_count(body: &str) -> Result<u64, ArchiveError> {
    let mut records = reader(body).into_records();
    let rec = records
        .next()
        .ok_or_else(|| ArchiveError::Decode("count response has no data row".to_string()))?
        .map_err(|e| ArchiveError::Decode(e.to_string()))?;
    let raw = rec.get(0).unwrap_or_default().trim();
    raw.parse::<u64>()
        .map_err(|_| ArchiveError::Decode(format!("count is not an integer: '{raw}'")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use lex_schemas::Cell;

    #[test]
    fn rows_are_cast_per_cell() {
        let body = "pl_name,disc_year,sy_dist\n\"Kepler-11 b\",2010,613.4\nX,,\n";
        let rows = decode_rows(body, 3).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(
            rows[0].cells,
            vec![Cell::Text("Kepler-11 b".into()), Cell::Int(2010), Cell::Real(613.4)]
        );
        assert_eq!(rows[1].cells, vec![Cell::Text("X".into()), Cell::Null, Cell::Null]);
    }

    #[test]
    fn width_mismatch_is_a_decode_error() {
        let err = decode_rows("a,b\n1,2\n", 3).unwrap_err();
        assert!(matches!(err, ArchiveError::Decode(_)));
    }

    #[test]
    fn quoted_commas_stay_in_one_cell() {
        let names = decode_names("pl_name\n\"HD 1, b\"\nK2-18 b\n").unwrap();
        assert_eq!(names, vec!["HD 1, b".to_string(), "K2-18 b".to_string()]);
    }

    #[test]
    fn count_reads_first_data_row() {
        assert_eq!(decode_count("count(*)\n5612\n").unwrap(), 5612);
        assert!(decode_count("count(*)\n").is_err());
        assert!(decode_count("count(*)\nmany\n").is_err());
    }
}
