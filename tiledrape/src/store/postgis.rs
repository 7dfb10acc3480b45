//! PostGIS-backed store.
//!
//! The pipeline is synchronous and calls the store from scheduler worker
//! threads, so every query is driven through a tokio runtime handle with
//! `block_on`. The handle must belong to a multi-threaded runtime that is not
//! itself blocked on the calling thread.

use std::collections::BTreeSet;
use std::future::Future;
use std::time::Duration;

use chrono::NaiveDate;
use regex::Regex;
use sqlx::postgres::{PgConnectOptions, PgDatabaseError, PgPoolCopyExt, PgPoolOptions};
use sqlx::PgPool;
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

use super::{
    sql, CoverageInfo, CoverageVersion, ElevationIndex, ElevationTile, HeightStore, StoreError,
    TableRef, TileMatch,
};
use crate::config::{ConfigFile, DatabaseSettings};
use crate::merge::{self, BuildingRecord, MergeError, MergePolicy, MergeTables};
use crate::tile::{TileId, TileSelection};

const UNIQUE_VIOLATION: &str = "23505";

/// Table and column names of the footprint and tile index relations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostgisLayout {
    pub footprints: TableRef,
    pub footprint_id: String,
    pub footprint_geometry: String,
    /// Column holding the construction year, when known.
    pub construction_field: Option<String>,
    pub footprint_index: TableRef,
    pub footprint_index_tile: String,
    pub footprint_index_geometry: String,
    pub elevation_tile_field: String,
    pub elevation_geometry_field: String,
    pub version_field: String,
    pub file_date_field: String,
}

impl Default for PostgisLayout {
    fn default() -> Self {
        Self {
            footprints: TableRef::new("bagactueel", "pand"),
            footprint_id: "identificatie".to_string(),
            footprint_geometry: "geovlak".to_string(),
            construction_field: None,
            footprint_index: TableRef::new("tile_index", "bag_index"),
            footprint_index_tile: "unit".to_string(),
            footprint_index_geometry: "geom".to_string(),
            elevation_tile_field: "unit".to_string(),
            elevation_geometry_field: "geom".to_string(),
            version_field: "ahn_version".to_string(),
            file_date_field: "file_date".to_string(),
        }
    }
}

impl PostgisLayout {
    /// Relation and column names from the `[footprints]`,
    /// `[footprint_index]` and `[elevation_index]` sections.
    pub fn from_config(config: &ConfigFile) -> Self {
        let footprints = &config.footprints;
        let footprint_index = &config.footprint_index;
        let elevation = &config.elevation_index;
        Self {
            footprints: TableRef::new(footprints.schema.clone(), footprints.table.clone()),
            footprint_id: footprints.id_field.clone(),
            footprint_geometry: footprints.geometry_field.clone(),
            construction_field: footprints.construction_field.clone(),
            footprint_index: TableRef::new(
                footprint_index.schema.clone(),
                footprint_index.table.clone(),
            ),
            footprint_index_tile: footprint_index.tile_field.clone(),
            footprint_index_geometry: footprint_index.geometry_field.clone(),
            elevation_tile_field: elevation.tile_field.clone(),
            elevation_geometry_field: elevation.geometry_field.clone(),
            version_field: elevation.version_field.clone(),
            file_date_field: elevation.file_date_field.clone(),
        }
    }
}

/// [`ElevationIndex`] and [`HeightStore`] over a PostGIS database.
pub struct PostgisStore {
    pool: PgPool,
    runtime: Handle,
    layout: PostgisLayout,
}

impl PostgisStore {
    /// Open a connection pool.
    pub fn connect(
        settings: &DatabaseSettings,
        layout: PostgisLayout,
        runtime: Handle,
    ) -> Result<Self, StoreError> {
        let mut options = PgConnectOptions::new()
            .host(&settings.host)
            .port(settings.port)
            .database(&settings.dbname)
            .username(&settings.user);
        if let Some(password) = &settings.password {
            options = options.password(password);
        }

        let pool = runtime.block_on(
            PgPoolOptions::new()
                .max_connections(settings.max_connections)
                .acquire_timeout(Duration::from_secs(30))
                .connect_with(options),
        )?;

        info!(
            host = %settings.host,
            port = settings.port,
            dbname = %settings.dbname,
            max_connections = settings.max_connections,
            "connected to database"
        );
        Ok(Self {
            pool,
            runtime,
            layout,
        })
    }

    pub fn layout(&self) -> &PostgisLayout {
        &self.layout
    }

    fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }

    async fn execute_all(&self, statements: &[String]) -> Result<(), sqlx::Error> {
        for statement in statements {
            debug!(sql = %statement, "execute");
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    async fn exists(&self, table: &TableRef) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar::<_, bool>(sql::table_exists())
            .bind(table.qualified())
            .fetch_one(&self.pool)
            .await
    }

    async fn require(&self, table: &TableRef) -> Result<(), StoreError> {
        if self.exists(table).await? {
            Ok(())
        } else {
            Err(StoreError::MissingTable(table.to_string()))
        }
    }
}

fn to_tiles(rows: Vec<(String, Option<i16>)>) -> Vec<ElevationTile> {
    rows.into_iter()
        .filter_map(|(tile, version)| match version {
            Some(v) => Some(ElevationTile {
                id: TileId::new(tile),
                version: CoverageVersion(v),
            }),
            None => {
                warn!(tile = %tile, "elevation tile has no coverage version");
                None
            }
        })
        .collect()
}

impl ElevationIndex for PostgisStore {
    fn elevation_tiles_for(
        &self,
        footprint_tile: &TileId,
        index: &TableRef,
        mode: TileMatch,
    ) -> Result<Vec<ElevationTile>, StoreError> {
        let query = match mode {
            TileMatch::Identical => sql::elevation_by_id(index, &self.layout),
            TileMatch::Intersecting => sql::elevation_intersecting(index, &self.layout),
        };
        let rows: Vec<(String, Option<i16>)> = self.block_on(
            sqlx::query_as(&query)
                .bind(footprint_tile.as_str())
                .fetch_all(&self.pool),
        )?;
        Ok(to_tiles(rows))
    }

    fn coverage_of(
        &self,
        tile: &TileId,
        index: &TableRef,
    ) -> Result<Option<CoverageInfo>, StoreError> {
        let query = sql::coverage_of(index, &self.layout);
        let row: Option<(Option<i16>, Option<NaiveDate>)> = self.block_on(
            sqlx::query_as(&query)
                .bind(tile.as_str())
                .fetch_optional(&self.pool),
        )?;
        Ok(row.and_then(|(version, file_date)| {
            version.map(|v| CoverageInfo {
                version: CoverageVersion(v),
                file_date,
            })
        }))
    }

    fn footprint_tiles(&self, selection: &TileSelection) -> Result<Vec<TileId>, StoreError> {
        let rows: Vec<String> = match selection {
            TileSelection::All => self.block_on(
                sqlx::query_scalar(&sql::footprint_tiles_all(&self.layout)).fetch_all(&self.pool),
            )?,
            TileSelection::List(ids) => {
                let ids: Vec<String> = ids.iter().map(|id| id.as_str().to_string()).collect();
                self.block_on(
                    sqlx::query_scalar(&sql::footprint_tiles_in(&self.layout))
                        .bind(ids)
                        .fetch_all(&self.pool),
                )?
            }
            TileSelection::Extent(wkt) => self.block_on(
                sqlx::query_scalar(&sql::footprint_tiles_in_extent(&self.layout))
                    .bind(wkt.as_str())
                    .fetch_all(&self.pool),
            )?,
        };
        Ok(rows.into_iter().map(TileId::new).collect())
    }

    fn border_tiles(
        &self,
        index: &TableRef,
        new: CoverageVersion,
        old: CoverageVersion,
    ) -> Result<BTreeSet<TileId>, StoreError> {
        let rows: Vec<String> = self.block_on(
            sqlx::query_scalar(&sql::border_tiles(index, &self.layout))
                .bind(new.0)
                .bind(old.0)
                .fetch_all(&self.pool),
        )?;
        Ok(rows.into_iter().map(TileId::new).collect())
    }
}

impl HeightStore for PostgisStore {
    fn prepare_border_index(
        &self,
        source: &TableRef,
        border: &TableRef,
        tiles: &BTreeSet<TileId>,
        version: CoverageVersion,
    ) -> Result<usize, StoreError> {
        let ids: Vec<String> = tiles.iter().map(|t| t.as_str().to_string()).collect();
        self.block_on(async {
            self.require(source).await?;
            let mut tx = self.pool.begin().await?;
            for statement in sql::create_border_index(source, border) {
                sqlx::query(&statement).execute(&mut *tx).await?;
            }
            sqlx::query(&sql::fill_border_index(source, border, &self.layout))
                .bind(&ids)
                .execute(&mut *tx)
                .await?;
            let relabelled = sqlx::query(&sql::relabel_version(border, &self.layout))
                .bind(version.0)
                .execute(&mut *tx)
                .await?
                .rows_affected();
            for statement in sql::index_border(border, &self.layout) {
                sqlx::query(&statement).execute(&mut *tx).await?;
            }
            tx.commit().await?;
            Ok::<usize, StoreError>(relabelled as usize)
        })
    }

    fn set_file_dates(
        &self,
        index: &TableRef,
        dates: &[(TileId, NaiveDate)],
    ) -> Result<usize, StoreError> {
        let query = sql::set_file_date(index, &self.layout);
        self.block_on(async {
            let mut tx = self.pool.begin().await?;
            let mut updated = 0;
            for (tile, date) in dates {
                updated += sqlx::query(&query)
                    .bind(*date)
                    .bind(tile.as_str())
                    .execute(&mut *tx)
                    .await?
                    .rows_affected();
            }
            tx.commit().await?;
            Ok::<usize, StoreError>(updated as usize)
        })
    }

    fn load_heights(
        &self,
        staging: &TableRef,
        records: &[BuildingRecord],
    ) -> Result<usize, StoreError> {
        let body = sql::heights_csv(records).map_err(|e| StoreError::Load {
            table: staging.to_string(),
            reason: e.to_string(),
        })?;
        self.block_on(async {
            self.execute_all(&sql::create_heights(staging)).await?;
            let mut copy = self.pool.copy_in_raw(&sql::copy_heights(staging)).await?;
            copy.send(body).await?;
            let rows = copy.finish().await?;
            Ok::<usize, StoreError>(rows as usize)
        })
    }

    fn publish_run(&self, staging: &TableRef, published: &TableRef) -> Result<usize, StoreError> {
        self.block_on(async {
            self.require(staging).await?;
            self.execute_all(&sql::publish(staging, published, &self.layout))
                .await?;
            let count: i64 = sqlx::query_scalar(&sql::row_count(published))
                .fetch_one(&self.pool)
                .await?;
            Ok::<usize, StoreError>(count as usize)
        })
    }

    fn merge(&self, tables: &MergeTables, policy: &MergePolicy) -> Result<usize, MergeError> {
        let create = merge::sql::create_final(tables, policy);
        let finalize = merge::sql::finalize(tables);
        let drop = merge::sql::drop_inputs(tables);
        let target = tables.target.to_string();

        self.block_on(async {
            for input in tables.inputs() {
                self.require(input).await?;
            }
            let mut tx = self.pool.begin().await.map_err(StoreError::from)?;
            for statement in create.iter().chain(&finalize).chain(&drop) {
                debug!(sql = %statement, "merge");
                sqlx::query(statement)
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| merge_error(e, &target))?;
            }
            let count: i64 = sqlx::query_scalar(&sql::row_count(&tables.target))
                .fetch_one(&mut *tx)
                .await
                .map_err(StoreError::from)?;
            tx.commit().await.map_err(StoreError::from)?;
            Ok::<usize, MergeError>(count as usize)
        })
    }

    fn row_count(&self, table: &TableRef) -> Result<usize, StoreError> {
        self.block_on(async {
            self.require(table).await?;
            let count: i64 = sqlx::query_scalar(&sql::row_count(table))
                .fetch_one(&self.pool)
                .await?;
            Ok::<usize, StoreError>(count as usize)
        })
    }

    fn drop_table(&self, table: &TableRef) -> Result<(), StoreError> {
        self.block_on(self.execute_all(&[sql::drop_table(table)]))?;
        Ok(())
    }
}

/// Map a unique violation to [`MergeError::DuplicateBuilding`].
fn merge_error(error: sqlx::Error, target: &str) -> MergeError {
    let duplicate = error
        .as_database_error()
        .filter(|db| db.code().as_deref() == Some(UNIQUE_VIOLATION))
        .map(|db| {
            db.try_downcast_ref::<PgDatabaseError>()
                .and_then(|pg| pg.detail())
                .and_then(duplicate_id)
        });
    match duplicate {
        Some(id) => MergeError::DuplicateBuilding {
            table: target.to_string(),
            id,
        },
        None => MergeError::Store(StoreError::Database(error)),
    }
}

/// Building id from a detail such as `Key (id)=(42) is duplicated.`
fn duplicate_id(detail: &str) -> Option<i64> {
    let pattern = Regex::new(r"\(id\)=\((-?\d+)\)").ok()?;
    pattern.captures(detail)?.get(1)?.as_str().parse().ok()
}
