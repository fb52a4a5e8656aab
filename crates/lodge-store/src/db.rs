//! SQLite storage engine (embedded, no external dependencies)
//!
//! Each entity kind maps to a table; the place-amenity link is a join table.
//! Cascades are declared at the schema level (`ON DELETE CASCADE`), never
//! re-implemented per call site. The unit of work is a lazily opened
//! transaction: reads route through it while it is open, so staged rows are
//! visible to the same unit of work exactly like the file backend's
//! in-memory graph. `save` commits, `close` rolls back.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use lodge_types::{Amenity, City, Entity, EntityKind, ParentLink, Place, Review, State, User};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction};
use tokio::sync::Mutex;

use crate::engine::{LinkOutcome, StorageEngine};
use crate::error::{Result, StoreError};

pub struct Database {
    pool: SqlitePool,
    session: Mutex<Option<Transaction<'static, Sqlite>>>,
}

impl Database {
    pub async fn new(database_path: impl AsRef<Path>) -> Result<Self> {
        let database_path: PathBuf = database_path.as_ref().to_path_buf();
        tracing::info!(path = %database_path.display(), "opening SQLite database");

        if let Some(parent) = database_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(&database_path)
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        Ok(Self {
            pool,
            session: Mutex::new(None),
        })
    }

    async fn run_migrations(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS states (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS cities (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                state_id TEXT NOT NULL REFERENCES states(id) ON DELETE CASCADE,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                email TEXT NOT NULL,
                password_digest TEXT NOT NULL,
                first_name TEXT,
                last_name TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS amenities (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS places (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                description TEXT,
                city_id TEXT NOT NULL REFERENCES cities(id) ON DELETE CASCADE,
                user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                number_rooms INTEGER NOT NULL DEFAULT 0,
                number_bathrooms INTEGER NOT NULL DEFAULT 0,
                max_guest INTEGER NOT NULL DEFAULT 0,
                price_by_night INTEGER NOT NULL DEFAULT 0,
                latitude REAL,
                longitude REAL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS reviews (
                id TEXT PRIMARY KEY,
                text TEXT NOT NULL,
                place_id TEXT NOT NULL REFERENCES places(id) ON DELETE CASCADE,
                user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS place_amenity (
                place_id TEXT NOT NULL REFERENCES places(id) ON DELETE CASCADE,
                amenity_id TEXT NOT NULL REFERENCES amenities(id) ON DELETE CASCADE,
                PRIMARY KEY (place_id, amenity_id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn table(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::State => "states",
        EntityKind::City => "cities",
        EntityKind::User => "users",
        EntityKind::Amenity => "amenities",
        EntityKind::Place => "places",
        EntityKind::Review => "reviews",
    }
}

fn encode_ts(ts: DateTime<Utc>) -> String {
    // Fixed-width nanosecond precision keeps lexicographic and chronological
    // order identical, and round-trips exactly.
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_ts(raw: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(raw)?.with_timezone(&Utc))
}

// Helper structs for sqlx query_as
#[derive(sqlx::FromRow)]
struct NamedRow {
    id: String,
    name: String,
    created_at: String,
    updated_at: String,
}

#[derive(sqlx::FromRow)]
struct CityRow {
    id: String,
    name: String,
    state_id: String,
    created_at: String,
    updated_at: String,
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: String,
    email: String,
    password_digest: String,
    first_name: Option<String>,
    last_name: Option<String>,
    created_at: String,
    updated_at: String,
}

#[derive(sqlx::FromRow)]
struct PlaceRow {
    id: String,
    name: String,
    description: Option<String>,
    city_id: String,
    user_id: String,
    number_rooms: i64,
    number_bathrooms: i64,
    max_guest: i64,
    price_by_night: i64,
    latitude: Option<f64>,
    longitude: Option<f64>,
    created_at: String,
    updated_at: String,
}

#[derive(sqlx::FromRow)]
struct ReviewRow {
    id: String,
    text: String,
    place_id: String,
    user_id: String,
    created_at: String,
    updated_at: String,
}

impl NamedRow {
    fn into_state(self) -> Result<State> {
        Ok(State {
            id: self.id,
            name: self.name,
            created_at: parse_ts(&self.created_at)?,
            updated_at: parse_ts(&self.updated_at)?,
        })
    }

    fn into_amenity(self) -> Result<Amenity> {
        Ok(Amenity {
            id: self.id,
            name: self.name,
            created_at: parse_ts(&self.created_at)?,
            updated_at: parse_ts(&self.updated_at)?,
        })
    }
}

impl TryFrom<CityRow> for City {
    type Error = StoreError;

    fn try_from(r: CityRow) -> Result<Self> {
        Ok(City {
            id: r.id,
            name: r.name,
            state_id: r.state_id,
            created_at: parse_ts(&r.created_at)?,
            updated_at: parse_ts(&r.updated_at)?,
        })
    }
}

impl TryFrom<UserRow> for User {
    type Error = StoreError;

    fn try_from(r: UserRow) -> Result<Self> {
        Ok(User {
            id: r.id,
            email: r.email,
            password_digest: r.password_digest,
            first_name: r.first_name,
            last_name: r.last_name,
            created_at: parse_ts(&r.created_at)?,
            updated_at: parse_ts(&r.updated_at)?,
        })
    }
}

impl TryFrom<PlaceRow> for Place {
    type Error = StoreError;

    fn try_from(r: PlaceRow) -> Result<Self> {
        Ok(Place {
            id: r.id,
            name: r.name,
            description: r.description,
            city_id: r.city_id,
            user_id: r.user_id,
            number_rooms: r.number_rooms,
            number_bathrooms: r.number_bathrooms,
            max_guest: r.max_guest,
            price_by_night: r.price_by_night,
            latitude: r.latitude,
            longitude: r.longitude,
            amenity_ids: Vec::new(),
            created_at: parse_ts(&r.created_at)?,
            updated_at: parse_ts(&r.updated_at)?,
        })
    }
}

impl TryFrom<ReviewRow> for Review {
    type Error = StoreError;

    fn try_from(r: ReviewRow) -> Result<Self> {
        Ok(Review {
            id: r.id,
            text: r.text,
            place_id: r.place_id,
            user_id: r.user_id,
            created_at: parse_ts(&r.created_at)?,
            updated_at: parse_ts(&r.updated_at)?,
        })
    }
}

/// Link-insertion-ordered amenity ids for one place.
async fn amenity_ids_for(conn: &mut SqliteConnection, place_id: &str) -> Result<Vec<String>> {
    let ids = sqlx::query_scalar::<_, String>(
        "SELECT amenity_id FROM place_amenity WHERE place_id = ?1 ORDER BY rowid",
    )
    .bind(place_id)
    .fetch_all(conn)
    .await?;
    Ok(ids)
}

/// Fetch entities of one kind. `suffix` is a trailing WHERE/ORDER clause with
/// at most one `?1` bind.
async fn select_entities(
    conn: &mut SqliteConnection,
    kind: EntityKind,
    suffix: &str,
    bind: Option<&str>,
) -> Result<Vec<Entity>> {
    macro_rules! fetch_rows {
        ($row:ty, $columns:expr) => {{
            let sql = format!("SELECT {} FROM {} {}", $columns, table(kind), suffix);
            let mut query = sqlx::query_as::<_, $row>(&sql);
            if let Some(bind) = bind {
                query = query.bind(bind);
            }
            query.fetch_all(&mut *conn).await?
        }};
    }

    match kind {
        EntityKind::State => fetch_rows!(NamedRow, "id, name, created_at, updated_at")
            .into_iter()
            .map(|r| r.into_state().map(Entity::State))
            .collect(),
        EntityKind::Amenity => fetch_rows!(NamedRow, "id, name, created_at, updated_at")
            .into_iter()
            .map(|r| r.into_amenity().map(Entity::Amenity))
            .collect(),
        EntityKind::City => fetch_rows!(CityRow, "id, name, state_id, created_at, updated_at")
            .into_iter()
            .map(|r| City::try_from(r).map(Entity::City))
            .collect(),
        EntityKind::User => fetch_rows!(
            UserRow,
            "id, email, password_digest, first_name, last_name, created_at, updated_at"
        )
        .into_iter()
        .map(|r| User::try_from(r).map(Entity::User))
        .collect(),
        EntityKind::Review => fetch_rows!(
            ReviewRow,
            "id, text, place_id, user_id, created_at, updated_at"
        )
        .into_iter()
        .map(|r| Review::try_from(r).map(Entity::Review))
        .collect(),
        EntityKind::Place => {
            let rows = fetch_rows!(
                PlaceRow,
                "id, name, description, city_id, user_id, number_rooms, number_bathrooms, \
                 max_guest, price_by_night, latitude, longitude, created_at, updated_at"
            );
            let mut entities = Vec::with_capacity(rows.len());
            for row in rows {
                let mut place = Place::try_from(row)?;
                place.amenity_ids = amenity_ids_for(&mut *conn, &place.id).await?;
                entities.push(Entity::Place(place));
            }
            Ok(entities)
        }
    }
}

async fn exists(conn: &mut SqliteConnection, kind: EntityKind, id: &str) -> Result<bool> {
    let sql = format!("SELECT COUNT(*) FROM {} WHERE id = ?1", table(kind));
    let n = sqlx::query_scalar::<_, i64>(&sql)
        .bind(id)
        .fetch_one(conn)
        .await?;
    Ok(n > 0)
}

async fn upsert(conn: &mut SqliteConnection, entity: &Entity) -> Result<()> {
    let created_at = encode_ts(entity.created_at());
    let updated_at = encode_ts(entity.updated_at());
    match entity {
        Entity::State(e) => {
            sqlx::query(
                r#"
                INSERT INTO states (id, name, created_at, updated_at)
                VALUES (?1, ?2, ?3, ?4)
                ON CONFLICT(id) DO UPDATE SET
                    name = excluded.name,
                    updated_at = excluded.updated_at
                "#,
            )
            .bind(&e.id)
            .bind(&e.name)
            .bind(&created_at)
            .bind(&updated_at)
            .execute(conn)
            .await?;
        }
        Entity::Amenity(e) => {
            sqlx::query(
                r#"
                INSERT INTO amenities (id, name, created_at, updated_at)
                VALUES (?1, ?2, ?3, ?4)
                ON CONFLICT(id) DO UPDATE SET
                    name = excluded.name,
                    updated_at = excluded.updated_at
                "#,
            )
            .bind(&e.id)
            .bind(&e.name)
            .bind(&created_at)
            .bind(&updated_at)
            .execute(conn)
            .await?;
        }
        Entity::City(e) => {
            sqlx::query(
                r#"
                INSERT INTO cities (id, name, state_id, created_at, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?5)
                ON CONFLICT(id) DO UPDATE SET
                    name = excluded.name,
                    updated_at = excluded.updated_at
                "#,
            )
            .bind(&e.id)
            .bind(&e.name)
            .bind(&e.state_id)
            .bind(&created_at)
            .bind(&updated_at)
            .execute(conn)
            .await?;
        }
        Entity::User(e) => {
            sqlx::query(
                r#"
                INSERT INTO users (id, email, password_digest, first_name, last_name,
                                   created_at, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                ON CONFLICT(id) DO UPDATE SET
                    email = excluded.email,
                    password_digest = excluded.password_digest,
                    first_name = excluded.first_name,
                    last_name = excluded.last_name,
                    updated_at = excluded.updated_at
                "#,
            )
            .bind(&e.id)
            .bind(&e.email)
            .bind(&e.password_digest)
            .bind(&e.first_name)
            .bind(&e.last_name)
            .bind(&created_at)
            .bind(&updated_at)
            .execute(conn)
            .await?;
        }
        Entity::Place(e) => {
            sqlx::query(
                r#"
                INSERT INTO places (id, name, description, city_id, user_id, number_rooms,
                                    number_bathrooms, max_guest, price_by_night, latitude,
                                    longitude, created_at, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
                ON CONFLICT(id) DO UPDATE SET
                    name = excluded.name,
                    description = excluded.description,
                    number_rooms = excluded.number_rooms,
                    number_bathrooms = excluded.number_bathrooms,
                    max_guest = excluded.max_guest,
                    price_by_night = excluded.price_by_night,
                    latitude = excluded.latitude,
                    longitude = excluded.longitude,
                    updated_at = excluded.updated_at
                "#,
            )
            .bind(&e.id)
            .bind(&e.name)
            .bind(&e.description)
            .bind(&e.city_id)
            .bind(&e.user_id)
            .bind(e.number_rooms)
            .bind(e.number_bathrooms)
            .bind(e.max_guest)
            .bind(e.price_by_night)
            .bind(e.latitude)
            .bind(e.longitude)
            .bind(&created_at)
            .bind(&updated_at)
            .execute(conn)
            .await?;
        }
        Entity::Review(e) => {
            sqlx::query(
                r#"
                INSERT INTO reviews (id, text, place_id, user_id, created_at, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                ON CONFLICT(id) DO UPDATE SET
                    text = excluded.text,
                    updated_at = excluded.updated_at
                "#,
            )
            .bind(&e.id)
            .bind(&e.text)
            .bind(&e.place_id)
            .bind(&e.user_id)
            .bind(&created_at)
            .bind(&updated_at)
            .execute(conn)
            .await?;
        }
    }
    Ok(())
}

impl Database {
    /// The active transaction, opened lazily on first use.
    async fn transaction<'g>(
        &self,
        slot: &'g mut Option<Transaction<'static, Sqlite>>,
    ) -> Result<&'g mut Transaction<'static, Sqlite>> {
        let tx = match slot.take() {
            Some(tx) => slot.insert(tx),
            None => slot.insert(self.pool.begin().await?),
        };
        Ok(tx)
    }
}

#[async_trait]
impl StorageEngine for Database {
    async fn all(&self, kind: Option<EntityKind>) -> Result<BTreeMap<String, Entity>> {
        let mut session = self.session.lock().await;
        let tx = self.transaction(&mut session).await?;

        let kinds: &[EntityKind] = match &kind {
            Some(k) => std::slice::from_ref(k),
            None => &EntityKind::ALL,
        };
        let mut graph = BTreeMap::new();
        for kind in kinds {
            for entity in select_entities(&mut **tx, *kind, "", None).await? {
                graph.insert(entity.storage_key(), entity);
            }
        }
        Ok(graph)
    }

    async fn get(&self, kind: EntityKind, id: &str) -> Result<Option<Entity>> {
        let mut session = self.session.lock().await;
        let tx = self.transaction(&mut session).await?;
        let mut found = select_entities(&mut **tx, kind, "WHERE id = ?1", Some(id)).await?;
        Ok(found.pop())
    }

    async fn count(&self, kind: Option<EntityKind>) -> Result<u64> {
        let mut session = self.session.lock().await;
        let tx = self.transaction(&mut session).await?;

        let kinds: &[EntityKind] = match &kind {
            Some(k) => std::slice::from_ref(k),
            None => &EntityKind::ALL,
        };
        let mut total: i64 = 0;
        for kind in kinds {
            let sql = format!("SELECT COUNT(*) FROM {}", table(*kind));
            total += sqlx::query_scalar::<_, i64>(&sql)
                .fetch_one(&mut **tx)
                .await?;
        }
        Ok(total as u64)
    }

    async fn children(
        &self,
        kind: EntityKind,
        link: ParentLink,
        parent_id: &str,
    ) -> Result<Vec<Entity>> {
        let mut session = self.session.lock().await;
        let tx = self.transaction(&mut session).await?;
        let suffix = format!("WHERE {} = ?1 ORDER BY created_at, id", link.field());
        select_entities(&mut **tx, kind, &suffix, Some(parent_id)).await
    }

    async fn amenities_of(&self, place_id: &str) -> Result<Vec<Entity>> {
        let mut session = self.session.lock().await;
        let tx = self.transaction(&mut session).await?;

        if !exists(&mut **tx, EntityKind::Place, place_id).await? {
            return Err(StoreError::not_found(EntityKind::Place, place_id));
        }
        let rows = sqlx::query_as::<_, NamedRow>(
            r#"
            SELECT a.id, a.name, a.created_at, a.updated_at
            FROM amenities a
            JOIN place_amenity pa ON pa.amenity_id = a.id
            WHERE pa.place_id = ?1
            ORDER BY pa.rowid
            "#,
        )
        .bind(place_id)
        .fetch_all(&mut **tx)
        .await?;
        rows.into_iter()
            .map(|r| r.into_amenity().map(Entity::Amenity))
            .collect()
    }

    async fn link_amenity(&self, place_id: &str, amenity_id: &str) -> Result<LinkOutcome> {
        let mut session = self.session.lock().await;
        let tx = self.transaction(&mut session).await?;

        if !exists(&mut **tx, EntityKind::Place, place_id).await? {
            return Err(StoreError::not_found(EntityKind::Place, place_id));
        }
        if !exists(&mut **tx, EntityKind::Amenity, amenity_id).await? {
            return Err(StoreError::not_found(EntityKind::Amenity, amenity_id));
        }

        let linked = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM place_amenity WHERE place_id = ?1 AND amenity_id = ?2",
        )
        .bind(place_id)
        .bind(amenity_id)
        .fetch_one(&mut **tx)
        .await?;
        if linked > 0 {
            return Ok(LinkOutcome::Existing);
        }

        sqlx::query("INSERT INTO place_amenity (place_id, amenity_id) VALUES (?1, ?2)")
            .bind(place_id)
            .bind(amenity_id)
            .execute(&mut **tx)
            .await?;
        Ok(LinkOutcome::Created)
    }

    async fn unlink_amenity(&self, place_id: &str, amenity_id: &str) -> Result<()> {
        let mut session = self.session.lock().await;
        let tx = self.transaction(&mut session).await?;

        if !exists(&mut **tx, EntityKind::Place, place_id).await? {
            return Err(StoreError::not_found(EntityKind::Place, place_id));
        }
        let result =
            sqlx::query("DELETE FROM place_amenity WHERE place_id = ?1 AND amenity_id = ?2")
                .bind(place_id)
                .bind(amenity_id)
                .execute(&mut **tx)
                .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::not_found(EntityKind::Amenity, amenity_id));
        }
        Ok(())
    }

    async fn stage(&self, entity: Entity) -> Result<()> {
        let mut session = self.session.lock().await;
        let tx = self.transaction(&mut session).await?;
        upsert(&mut **tx, &entity).await
    }

    async fn delete(&self, entity: Option<&Entity>) -> Result<()> {
        let Some(entity) = entity else {
            return Ok(());
        };
        let mut session = self.session.lock().await;
        let tx = self.transaction(&mut session).await?;
        let sql = format!("DELETE FROM {} WHERE id = ?1", table(entity.kind()));
        sqlx::query(&sql)
            .bind(entity.id())
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    async fn save(&self) -> Result<()> {
        let mut session = self.session.lock().await;
        if let Some(tx) = session.take() {
            tx.commit().await?;
        }
        Ok(())
    }

    async fn reload(&self) -> Result<()> {
        self.run_migrations().await?;
        tracing::info!("database schema ready");
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        let mut session = self.session.lock().await;
        if let Some(tx) = session.take() {
            tx.rollback().await?;
        }
        Ok(())
    }
}
