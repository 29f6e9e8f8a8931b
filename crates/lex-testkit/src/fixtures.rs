use anyhow::Result;
use lex_mirror::Mirror;
use lex_schemas::{Cell, FieldCatalog, Row};

pub const NAME_COLUMN: &str = "pl_name";

/// Six shared columns and two observation-only columns.
pub const CATALOG: &str = "\
pl_name:Planet Name
hostname:Host Name
disc_year:Discovery Year
pl_orbper:Orbital Period [days]
pl_rade:Planet Radius [Earth Radius]
sy_dist:Distance [pc]
pl_eqt:Equilibrium Temperature [K]~
default_flag:Default Parameter Set~
";

pub fn fixture_catalog() -> FieldCatalog {
    match FieldCatalog::parse(CATALOG) {
        Ok(c) => c,
        Err(e) => panic!("fixture catalog must parse: {e}"),
    }
}

/// Composite-table row for `name`, distance unknown.
pub fn composite_row(name: &str, disc_year: i64) -> Row {
    composite_row_at(name, disc_year, Cell::Null)
}

/// Composite-table row for `name` with `sy_dist` set to `distance`.
pub fn composite_row_at(name: &str, disc_year: i64, distance: Cell) -> Row {
    Row::new(vec![
        Cell::Text(name.to_string()),
        Cell::Text(format!("{name} host")),
        Cell::Int(disc_year),
        Cell::Real(3.5),
        Cell::Real(1.1),
        distance,
    ])
}

/// Observation-table row for `name`. `period` tells revisions apart.
pub fn observation_row(name: &str, disc_year: i64, period: f64) -> Row {
    Row::new(vec![
        Cell::Text(name.to_string()),
        Cell::Text(format!("{name} host")),
        Cell::Int(disc_year),
        Cell::Real(period),
        Cell::Null,
        Cell::Null,
        Cell::Int(255),
        Cell::Int(0),
    ])
}

/// Fresh single-connection in-memory mirror over [`fixture_catalog`].
pub async fn memory_mirror() -> Result<Mirror> {
    let pool = lex_mirror::connect("sqlite::memory:", 1).await?;
    let mirror = Mirror::new(pool, fixture_catalog(), NAME_COLUMN)?;
    mirror.ensure_schema().await?;
    Ok(mirror)
}
