//! SQL text of the boundary merge.

use super::engine::MergeTables;
use super::policy::MergePolicy;
use crate::store::sql::quote_ident;

/// `DROP` and `CREATE TABLE ... AS` for the final table.
///
/// Complete new-coverage border rows, then old-coverage rows for buildings
/// without one, unioned with the interior rows. `UNION ALL` keeps duplicates
/// so the primary key added afterwards can reject them.
pub fn create_final(tables: &MergeTables, policy: &MergePolicy) -> Vec<String> {
    let complete = policy
        .required()
        .iter()
        .map(|f| format!("{} IS NOT NULL", quote_ident(&f.column())))
        .collect::<Vec<_>>()
        .join(" AND ");

    vec![
        format!("DROP TABLE IF EXISTS {}", tables.target.qualified()),
        format!(
            "CREATE TABLE {target} AS \
             WITH complete_new AS (SELECT * FROM {new} WHERE {complete}), \
             border AS ( \
                 SELECT * FROM complete_new \
                 UNION ALL \
                 SELECT o.* FROM {old} o \
                 WHERE NOT EXISTS (SELECT 1 FROM complete_new n WHERE n.id = o.id) \
             ) \
             SELECT * FROM {interior} WHERE coverage_version IS NOT NULL \
             UNION ALL \
             SELECT * FROM border WHERE coverage_version IS NOT NULL",
            target = tables.target.qualified(),
            new = tables.border_new.qualified(),
            old = tables.border_old.qualified(),
            interior = tables.interior.qualified(),
        ),
    ]
}

/// Primary key, then secondary indexes of the final table.
pub fn finalize(tables: &MergeTables) -> Vec<String> {
    let target = &tables.target;
    vec![
        format!("ALTER TABLE {} ADD PRIMARY KEY (id)", target.qualified()),
        format!(
            "CREATE INDEX {} ON {} (tile_id)",
            target.index_name("tile_id"),
            target.qualified()
        ),
        format!(
            "CREATE INDEX {} ON {} (height_valid)",
            target.index_name("height_valid"),
            target.qualified()
        ),
        format!(
            "CREATE INDEX {} ON {} USING GIST (geometry)",
            target.index_name("geometry"),
            target.qualified()
        ),
    ]
}

/// Drop the three run tables.
pub fn drop_inputs(tables: &MergeTables) -> Vec<String> {
    tables
        .inputs()
        .iter()
        .map(|t| format!("DROP TABLE IF EXISTS {}", t.qualified()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::HeightField;
    use crate::store::TableRef;

    fn tables() -> MergeTables {
        MergeTables::for_runs(&TableRef::new("out", "bldg"), TableRef::new("out", "heights"))
    }

    #[test]
    fn test_create_final_gates_on_every_required_field() {
        let sql = create_final(&tables(), &MergePolicy::default()).join(";\n");
        assert!(sql.contains("DROP TABLE IF EXISTS \"out\".\"heights\""));
        assert_eq!(sql.matches("IS NOT NULL AND").count(), 13);
        assert!(sql.contains("\"roof_0_99\" IS NOT NULL"));
        assert!(sql.contains("FROM \"out\".\"bldg_border_new\" WHERE"));
        assert!(sql.contains("FROM \"out\".\"bldg_border_old\" o"));
        assert!(sql.contains("UNION ALL"));
    }

    #[test]
    fn test_create_final_with_narrow_policy() {
        let policy = MergePolicy::requiring(vec![HeightField::roof(3).unwrap()]);
        let sql = create_final(&tables(), &policy).join(";");
        assert!(sql.contains("WHERE \"roof_0_50\" IS NOT NULL)"));
        assert!(!sql.contains("ground_0_00"));
    }

    #[test]
    fn test_finalize_adds_primary_key_first() {
        let sql = finalize(&tables());
        assert_eq!(sql[0], "ALTER TABLE \"out\".\"heights\" ADD PRIMARY KEY (id)");
        assert!(sql[3].contains("USING GIST (geometry)"));
    }

    #[test]
    fn test_drop_inputs() {
        let sql = drop_inputs(&tables());
        assert_eq!(sql.len(), 3);
        assert!(sql[2].ends_with("\"bldg_border_new\""));
    }
}
