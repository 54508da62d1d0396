//! Diesel-based venue repository for SQLite.

use diesel::prelude::*;
use diesel::upsert::excluded;
use diesel_async::RunQueryDsl;

use super::diesel_models::VenueRecord;
use super::diesel_pool::{AsyncSqlitePool, DieselError};
use super::util::parse_datetime;
use crate::models::Venue;
use crate::schema::venues;

impl From<VenueRecord> for Venue {
    fn from(record: VenueRecord) -> Self {
        Venue {
            id: record.id,
            name: record.name,
            nickname: record.nickname,
            is_open: record.is_open,
            occupancy: record.occupancy,
            latitude: record.latitude,
            longitude: record.longitude,
            address: record.address,
            phone: record.phone,
            updated_at: parse_datetime(&record.updated_at),
        }
    }
}

#[derive(Clone)]
pub struct DieselVenueRepository {
    pool: AsyncSqlitePool,
}

impl DieselVenueRepository {
    pub fn new(pool: AsyncSqlitePool) -> Self {
        Self { pool }
    }

    /// Get a venue by its short code.
    pub async fn get(&self, id: &str) -> Result<Option<Venue>, DieselError> {
        let mut conn = self.pool.get().await?;

        venues::table
            .find(id)
            .first::<VenueRecord>(&mut conn)
            .await
            .optional()
            .map(|opt| opt.map(Venue::from))
    }

    /// Look a venue up by display name.
    pub async fn find_by_name(&self, name: &str) -> Result<Option<Venue>, DieselError> {
        let mut conn = self.pool.get().await?;

        venues::table
            .filter(venues::name.eq(name))
            .first::<VenueRecord>(&mut conn)
            .await
            .optional()
            .map(|opt| opt.map(Venue::from))
    }

    /// All venues ordered by name.
    pub async fn get_all(&self) -> Result<Vec<Venue>, DieselError> {
        let mut conn = self.pool.get().await?;

        venues::table
            .order(venues::name.asc())
            .load::<VenueRecord>(&mut conn)
            .await
            .map(|records| records.into_iter().map(Venue::from).collect())
    }

    /// Insert or update a venue by code.
    ///
    /// Existing rows keep their meals; only the descriptive columns change.
    pub async fn upsert(&self, venue: &Venue) -> Result<(), DieselError> {
        let mut conn = self.pool.get().await?;
        let updated_at = venue.updated_at.to_rfc3339();

        diesel::insert_into(venues::table)
            .values((
                venues::id.eq(&venue.id),
                venues::name.eq(&venue.name),
                venues::nickname.eq(&venue.nickname),
                venues::is_open.eq(venue.is_open),
                venues::occupancy.eq(venue.occupancy),
                venues::latitude.eq(venue.latitude),
                venues::longitude.eq(venue.longitude),
                venues::address.eq(&venue.address),
                venues::phone.eq(&venue.phone),
                venues::updated_at.eq(&updated_at),
            ))
            .on_conflict(venues::id)
            .do_update()
            .set((
                venues::name.eq(excluded(venues::name)),
                venues::nickname.eq(excluded(venues::nickname)),
                venues::is_open.eq(excluded(venues::is_open)),
                venues::occupancy.eq(excluded(venues::occupancy)),
                venues::latitude.eq(excluded(venues::latitude)),
                venues::longitude.eq(excluded(venues::longitude)),
                venues::address.eq(excluded(venues::address)),
                venues::phone.eq(excluded(venues::phone)),
                venues::updated_at.eq(excluded(venues::updated_at)),
            ))
            .execute(&mut conn)
            .await?;

        Ok(())
    }

    pub async fn count(&self) -> Result<i64, DieselError> {
        let mut conn = self.pool.get().await?;

        use diesel::dsl::count_star;
        venues::table.select(count_star()).first(&mut conn).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::migrations::run_migrations;
    use tempfile::tempdir;

    async fn setup() -> (DieselVenueRepository, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let pool = AsyncSqlitePool::from_path(&dir.path().join("menus.db"));
        run_migrations(&pool).await.unwrap();
        (DieselVenueRepository::new(pool), dir)
    }

    #[tokio::test]
    async fn test_upsert_and_lookup() {
        let (repo, _dir) = setup().await;

        repo.upsert(&Venue::new("BK", "Berkeley", "Berkeley"))
            .await
            .unwrap();
        repo.upsert(&Venue::new("ES", "Ezra Stiles", "Stiles"))
            .await
            .unwrap();

        let venue = repo.find_by_name("Ezra Stiles").await.unwrap().unwrap();
        assert_eq!(venue.id, "ES");
        assert_eq!(venue.nickname, "Stiles");
        assert!(repo.find_by_name("Stiles").await.unwrap().is_none());
        assert_eq!(repo.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_upsert_updates_in_place() {
        let (repo, _dir) = setup().await;

        let mut venue = Venue::new("MC", "Morse", "Morse");
        repo.upsert(&venue).await.unwrap();
        venue.is_open = true;
        venue.occupancy = 7;
        repo.upsert(&venue).await.unwrap();

        let stored = repo.get("MC").await.unwrap().unwrap();
        assert!(stored.is_open);
        assert_eq!(stored.occupancy, 7);
        assert_eq!(repo.get_all().await.unwrap().len(), 1);
    }
}
