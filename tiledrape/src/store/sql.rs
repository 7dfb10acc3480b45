//! SQL text for the PostGIS store.
//!
//! Identifiers are always quoted; values are passed as bind parameters.

use super::postgis::PostgisLayout;
use super::types::TableRef;
use crate::merge::BuildingRecord;

/// Quote an identifier, doubling embedded quotes.
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Elevation tiles sharing the footprint tile's id. `$1` is the tile id.
pub fn elevation_by_id(index: &TableRef, layout: &PostgisLayout) -> String {
    format!(
        "SELECT lower({tile}::text), {version}::smallint FROM {index} \
         WHERE lower({tile}::text) = $1 ORDER BY 1",
        tile = quote_ident(&layout.elevation_tile_field),
        version = quote_ident(&layout.version_field),
        index = index.qualified(),
    )
}

/// Elevation tiles intersecting the footprint tile. `$1` is the tile id.
pub fn elevation_intersecting(index: &TableRef, layout: &PostgisLayout) -> String {
    format!(
        "SELECT DISTINCT lower(e.{tile}::text), e.{version}::smallint \
         FROM {index} e, {fp_index} f \
         WHERE lower(f.{fp_tile}::text) = $1 AND ST_Intersects(e.{geom}, f.{fp_geom}) \
         ORDER BY 1",
        tile = quote_ident(&layout.elevation_tile_field),
        version = quote_ident(&layout.version_field),
        geom = quote_ident(&layout.elevation_geometry_field),
        index = index.qualified(),
        fp_index = layout.footprint_index.qualified(),
        fp_tile = quote_ident(&layout.footprint_index_tile),
        fp_geom = quote_ident(&layout.footprint_index_geometry),
    )
}

/// Version and file date of one elevation tile. `$1` is the tile id.
pub fn coverage_of(index: &TableRef, layout: &PostgisLayout) -> String {
    format!(
        "SELECT {version}::smallint, {date}::date FROM {index} \
         WHERE lower({tile}::text) = $1 LIMIT 1",
        version = quote_ident(&layout.version_field),
        date = quote_ident(&layout.file_date_field),
        tile = quote_ident(&layout.elevation_tile_field),
        index = index.qualified(),
    )
}

/// Every footprint tile id.
pub fn footprint_tiles_all(layout: &PostgisLayout) -> String {
    format!(
        "SELECT DISTINCT lower({tile}::text) FROM {index} ORDER BY 1",
        tile = quote_ident(&layout.footprint_index_tile),
        index = layout.footprint_index.qualified(),
    )
}

/// Footprint tile ids among `$1` (a text array).
pub fn footprint_tiles_in(layout: &PostgisLayout) -> String {
    format!(
        "SELECT DISTINCT lower({tile}::text) FROM {index} \
         WHERE lower({tile}::text) = ANY($1) ORDER BY 1",
        tile = quote_ident(&layout.footprint_index_tile),
        index = layout.footprint_index.qualified(),
    )
}

/// Footprint tiles intersecting the WKT polygon `$1`.
pub fn footprint_tiles_in_extent(layout: &PostgisLayout) -> String {
    format!(
        "SELECT DISTINCT lower({tile}::text) FROM {index} \
         WHERE ST_Intersects({geom}, ST_GeomFromText($1, ST_SRID({geom}))) ORDER BY 1",
        tile = quote_ident(&layout.footprint_index_tile),
        geom = quote_ident(&layout.footprint_index_geometry),
        index = layout.footprint_index.qualified(),
    )
}

/// Tiles of version `$1` touching a tile of version `$2`.
pub fn border_tiles(index: &TableRef, layout: &PostgisLayout) -> String {
    format!(
        "SELECT DISTINCT lower(n.{tile}::text) FROM {index} n \
         JOIN {index} o ON ST_Touches(n.{geom}, o.{geom}) \
         WHERE n.{version} = $1 AND o.{version} = $2 ORDER BY 1",
        tile = quote_ident(&layout.elevation_tile_field),
        geom = quote_ident(&layout.elevation_geometry_field),
        version = quote_ident(&layout.version_field),
        index = index.qualified(),
    )
}

/// Recreate `border` empty, with the columns of `source`.
pub fn create_border_index(source: &TableRef, border: &TableRef) -> Vec<String> {
    vec![
        format!("DROP TABLE IF EXISTS {}", border.qualified()),
        format!(
            "CREATE TABLE {} (LIKE {} INCLUDING DEFAULTS)",
            border.qualified(),
            source.qualified()
        ),
    ]
}

/// Copy the rows of `source` whose tile is in `$1` (text array).
pub fn fill_border_index(source: &TableRef, border: &TableRef, layout: &PostgisLayout) -> String {
    format!(
        "INSERT INTO {border} SELECT * FROM {source} WHERE lower({tile}::text) = ANY($1)",
        border = border.qualified(),
        source = source.qualified(),
        tile = quote_ident(&layout.elevation_tile_field),
    )
}

/// Relabel every row of the border index. `$1` is the version.
pub fn relabel_version(border: &TableRef, layout: &PostgisLayout) -> String {
    format!(
        "UPDATE {} SET {} = $1",
        border.qualified(),
        quote_ident(&layout.version_field)
    )
}

/// Indexes of a border index table.
pub fn index_border(border: &TableRef, layout: &PostgisLayout) -> Vec<String> {
    vec![
        format!(
            "CREATE INDEX {} ON {} ({})",
            border.index_name(&layout.elevation_tile_field),
            border.qualified(),
            quote_ident(&layout.elevation_tile_field)
        ),
        format!(
            "CREATE INDEX {} ON {} USING GIST ({})",
            border.index_name(&layout.elevation_geometry_field),
            border.qualified(),
            quote_ident(&layout.elevation_geometry_field)
        ),
    ]
}

/// Set the file date (`$1`) of tile `$2`.
pub fn set_file_date(index: &TableRef, layout: &PostgisLayout) -> String {
    format!(
        "UPDATE {index} SET {date} = $1 WHERE lower({tile}::text) = $2",
        index = index.qualified(),
        date = quote_ident(&layout.file_date_field),
        tile = quote_ident(&layout.elevation_tile_field),
    )
}

fn column_type(column: &str) -> &'static str {
    match column {
        "id" | "ground_points" | "roof_points" => "bigint",
        "roof_flat" => "boolean",
        "file_date" => "date",
        "coverage_version" => "smallint",
        "tile_id" => "text",
        _ => "real",
    }
}

/// Drop and create a staging heights table.
pub fn create_heights(staging: &TableRef) -> Vec<String> {
    let columns = BuildingRecord::columns()
        .iter()
        .map(|c| format!("{} {}", quote_ident(c), column_type(c)))
        .collect::<Vec<_>>()
        .join(", ");
    vec![
        format!("DROP TABLE IF EXISTS {}", staging.qualified()),
        format!("CREATE TABLE {} ({})", staging.qualified(), columns),
    ]
}

/// `COPY ... FROM STDIN` for a staging heights table.
pub fn copy_heights(staging: &TableRef) -> String {
    let columns = BuildingRecord::columns()
        .iter()
        .map(|c| quote_ident(c))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "COPY {} ({}) FROM STDIN (FORMAT csv)",
        staging.qualified(),
        columns
    )
}

fn opt<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// CSV body for [`copy_heights`]. Empty fields load as NULL.
pub fn heights_csv(records: &[BuildingRecord]) -> Result<Vec<u8>, csv::Error> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for r in records {
        let mut fields = vec![r.id.to_string()];
        fields.extend(r.ground.iter().map(|v| opt(*v)));
        fields.extend(r.roof.iter().map(|v| opt(*v)));
        fields.extend(r.rmse.iter().map(|v| opt(*v)));
        fields.push(opt(r.roof_flat));
        fields.push(opt(r.ground_points));
        fields.push(opt(r.roof_points));
        fields.push(opt(r.file_date.map(|d| d.format("%Y-%m-%d"))));
        fields.push(opt(r.version.map(|v| v.0)));
        fields.push(r.tile.as_str().to_string());
        writer.write_record(&fields)?;
    }
    writer
        .into_inner()
        .map_err(|e| csv::Error::from(e.into_error()))
}

/// Join a staging table with the footprints into `published`.
///
/// Adds `height_valid` and the footprint geometry, indexes the result and
/// drops the staging table.
pub fn publish(staging: &TableRef, published: &TableRef, layout: &PostgisLayout) -> Vec<String> {
    let built_after = match &layout.construction_field {
        Some(field) => format!(
            "WHEN make_date(f.{}::int, 1, 1) > h.file_date THEN false ",
            quote_ident(field)
        ),
        None => String::new(),
    };
    vec![
        format!("DROP TABLE IF EXISTS {}", published.qualified()),
        format!(
            "CREATE TABLE {published} AS SELECT h.*, \
             CASE {built_after}WHEN h.roof_points = 0 THEN false ELSE true END AS height_valid, \
             f.{geom} AS geometry \
             FROM {staging} h JOIN {footprints} f ON f.{id}::numeric = h.id",
            published = published.qualified(),
            staging = staging.qualified(),
            footprints = layout.footprints.qualified(),
            geom = quote_ident(&layout.footprint_geometry),
            id = quote_ident(&layout.footprint_id),
        ),
        format!(
            "CREATE INDEX {} ON {} (id)",
            published.index_name("id"),
            published.qualified()
        ),
        format!(
            "CREATE INDEX {} ON {} (tile_id)",
            published.index_name("tile_id"),
            published.qualified()
        ),
        format!(
            "CREATE INDEX {} ON {} (height_valid)",
            published.index_name("height_valid"),
            published.qualified()
        ),
        format!(
            "CREATE INDEX {} ON {} USING GIST (geometry)",
            published.index_name("geometry"),
            published.qualified()
        ),
        format!("DROP TABLE IF EXISTS {}", staging.qualified()),
    ]
}

pub fn row_count(table: &TableRef) -> String {
    format!("SELECT count(*) FROM {}", table.qualified())
}

pub fn table_exists() -> &'static str {
    "SELECT to_regclass($1) IS NOT NULL"
}

pub fn drop_table(table: &TableRef) -> String {
    format!("DROP TABLE IF EXISTS {} CASCADE", table.qualified())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::CoverageVersion;
    use crate::tile::TileId;
    use chrono::NaiveDate;

    fn layout() -> PostgisLayout {
        PostgisLayout::default()
    }

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("tile_id"), "\"tile_id\"");
        assert_eq!(quote_ident("a\"b"), "\"a\"\"b\"");
    }

    #[test]
    fn test_create_heights_types() {
        let sql = create_heights(&TableRef::new("out", "h_rest"));
        assert_eq!(sql[0], "DROP TABLE IF EXISTS \"out\".\"h_rest\"");
        assert!(sql[1].starts_with("CREATE TABLE \"out\".\"h_rest\" (\"id\" bigint, \"ground_0_00\" real"));
        assert!(sql[1].contains("\"roof_flat\" boolean"));
        assert!(sql[1].contains("\"file_date\" date"));
        assert!(sql[1].ends_with("\"tile_id\" text)"));
    }

    #[test]
    fn test_heights_csv_nulls_are_empty() {
        let mut record = BuildingRecord::new(42, TileId::new("37hn1"));
        record.ground[0] = Some(1.5);
        record.roof_flat = Some(true);
        record.file_date = NaiveDate::from_ymd_opt(2014, 5, 2);
        record.version = Some(CoverageVersion(3));

        let body = heights_csv(&[record]).unwrap();
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .from_reader(body.as_slice());
        let row = reader.records().next().unwrap().unwrap();
        assert_eq!(row.len(), BuildingRecord::columns().len());
        assert_eq!(&row[0], "42");
        assert_eq!(&row[1], "1.5");
        assert_eq!(&row[2], "");
        assert_eq!(&row[23], "true");
        assert_eq!(&row[26], "2014-05-02");
        assert_eq!(&row[27], "3");
        assert_eq!(&row[28], "37hn1");
        assert!(!String::from_utf8(body).unwrap().contains('"'));
    }

    #[test]
    fn test_heights_csv_quotes_tile_ids() {
        let records = [
            BuildingRecord::new(1, TileId::new("a,b")),
            BuildingRecord::new(2, TileId::new("c")),
        ];

        let body = String::from_utf8(heights_csv(&records).unwrap()).unwrap();
        let lines: Vec<&str> = body.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with(",\"a,b\""));
        assert!(lines[1].ends_with(",c"));
    }

    #[test]
    fn test_publish_validity_with_construction_year() {
        let mut layout = layout();
        layout.construction_field = Some("bouwjaar".to_string());
        let sql = publish(
            &TableRef::new("out", "h_rest"),
            &TableRef::new("out", "b_rest"),
            &layout,
        );
        assert!(sql[1].contains("WHEN make_date(f.\"bouwjaar\"::int, 1, 1) > h.file_date THEN false"));
        assert!(sql[1].contains("WHEN h.roof_points = 0 THEN false ELSE true END AS height_valid"));
        assert_eq!(sql.last().unwrap(), "DROP TABLE IF EXISTS \"out\".\"h_rest\"");
    }

    #[test]
    fn test_publish_without_construction_field() {
        let sql = publish(
            &TableRef::new("out", "h"),
            &TableRef::new("out", "b"),
            &layout(),
        );
        assert!(sql[1].contains("CASE WHEN h.roof_points = 0"));
        assert!(!sql[1].contains("make_date"));
    }

    #[test]
    fn test_border_tiles_uses_touches() {
        let sql = border_tiles(&TableRef::new("tile_index", "ahn"), &layout());
        assert!(sql.contains("ST_Touches"));
        assert!(sql.contains("n.\"ahn_version\" = $1 AND o.\"ahn_version\" = $2"));
    }
}
