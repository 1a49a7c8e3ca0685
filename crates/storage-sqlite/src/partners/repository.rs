use async_trait::async_trait;
use diesel::prelude::*;
use diesel::upsert::excluded;
use diesel::SqliteConnection;
use log::{debug, warn};
use std::sync::Arc;
use uuid::Uuid;

use promocode_core::errors::{DatabaseError, Error, ValidationError};
use promocode_core::partners::{NewPartner, Partner, PartnerRepositoryTrait};
use promocode_core::Result;

use super::model::{partner_from_db, PartnerDB, PartnerPromoCodeLimitDB};
use crate::db::{get_connection, DbPool, WriteHandle};
use crate::errors::IntoCore;
use crate::schema::{partner_promo_code_limits, partners};

pub struct PartnerRepository {
    pool: Arc<DbPool>,
    writer: WriteHandle,
}

impl PartnerRepository {
    pub fn new(pool: Arc<DbPool>, writer: WriteHandle) -> Self {
        PartnerRepository { pool, writer }
    }
}

fn load_partner(conn: &mut SqliteConnection, partner_id: &str) -> Result<Option<Partner>> {
    let Some(partner_db) = partners::table
        .find(partner_id)
        .select(PartnerDB::as_select())
        .first::<PartnerDB>(conn)
        .optional()
        .into_core()?
    else {
        return Ok(None);
    };

    let limits = PartnerPromoCodeLimitDB::belonging_to(&partner_db)
        .select(PartnerPromoCodeLimitDB::as_select())
        .order(partner_promo_code_limits::position.asc())
        .load::<PartnerPromoCodeLimitDB>(conn)
        .into_core()?;

    Ok(Some(partner_from_db(partner_db, limits)))
}

/// Rejects limits that name another partner or reuse another partner's limit id.
fn check_limit_ownership(conn: &mut SqliteConnection, partner: &Partner) -> Result<()> {
    for limit in &partner.limits {
        if limit.partner_id != partner.id {
            return Err(Error::Validation(ValidationError::InvalidInput(format!(
                "Limit {} belongs to partner {}, not {}",
                limit.id, limit.partner_id, partner.id
            ))));
        }

        let owner = partner_promo_code_limits::table
            .find(limit.id.as_str())
            .select(partner_promo_code_limits::partner_id)
            .first::<String>(conn)
            .optional()
            .into_core()?;
        if let Some(owner) = owner.filter(|owner| *owner != partner.id) {
            warn!(
                "Partner {} tried to overwrite limit {} owned by {}",
                partner.id, limit.id, owner
            );
            return Err(Error::Validation(ValidationError::InvalidInput(format!(
                "Limit {} belongs to partner {}",
                limit.id, owner
            ))));
        }
    }
    Ok(())
}

fn save_partner(conn: &mut SqliteConnection, partner: &Partner) -> Result<()> {
    let updated = diesel::update(
        partners::table
            .filter(partners::id.eq(partner.id.as_str()))
            .filter(partners::version.eq(partner.version)),
    )
    .set((
        partners::name.eq(partner.name.as_str()),
        partners::is_active.eq(partner.is_active),
        partners::number_issued_promo_codes.eq(partner.number_issued_promo_codes),
        partners::version.eq(partner.version + 1),
    ))
    .execute(conn)
    .into_core()?;

    if updated == 0 {
        let exists = partners::table
            .find(partner.id.as_str())
            .count()
            .get_result::<i64>(conn)
            .into_core()?
            > 0;
        return Err(if exists {
            warn!(
                "Partner {} was modified concurrently (expected version {})",
                partner.id, partner.version
            );
            Error::Database(DatabaseError::VersionConflict(partner.id.clone()))
        } else {
            Error::Database(DatabaseError::NotFound(partner.id.clone()))
        });
    }

    check_limit_ownership(conn, partner)?;

    // An existing limit only ever changes its cancel date and position.
    for (position, limit) in partner.limits.iter().enumerate() {
        let limit_db = PartnerPromoCodeLimitDB::from_domain(limit, position as i32);
        diesel::insert_into(partner_promo_code_limits::table)
            .values(&limit_db)
            .on_conflict(partner_promo_code_limits::id)
            .do_update()
            .set((
                partner_promo_code_limits::cancel_date
                    .eq(excluded(partner_promo_code_limits::cancel_date)),
                partner_promo_code_limits::position
                    .eq(excluded(partner_promo_code_limits::position)),
            ))
            .execute(conn)
            .into_core()?;
    }

    Ok(())
}

#[async_trait]
impl PartnerRepositoryTrait for PartnerRepository {
    fn get_by_id(&self, partner_id: &str) -> Result<Option<Partner>> {
        let mut conn = get_connection(&self.pool)?;
        load_partner(&mut conn, partner_id)
    }

    fn list(&self) -> Result<Vec<Partner>> {
        let mut conn = get_connection(&self.pool)?;
        let partners_db = partners::table
            .select(PartnerDB::as_select())
            .order((partners::name.asc(), partners::id.asc()))
            .load::<PartnerDB>(&mut conn)
            .into_core()?;

        let limits_db = PartnerPromoCodeLimitDB::belonging_to(&partners_db)
            .select(PartnerPromoCodeLimitDB::as_select())
            .order(partner_promo_code_limits::position.asc())
            .load::<PartnerPromoCodeLimitDB>(&mut conn)
            .into_core()?;

        Ok(limits_db
            .grouped_by(&partners_db)
            .into_iter()
            .zip(partners_db)
            .map(|(limits, partner)| partner_from_db(partner, limits))
            .collect())
    }

    async fn create(&self, new_partner: NewPartner) -> Result<Partner> {
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<Partner> {
                let partner_db = PartnerDB {
                    id: new_partner
                        .id
                        .unwrap_or_else(|| Uuid::new_v4().to_string()),
                    name: new_partner.name,
                    is_active: new_partner.is_active,
                    number_issued_promo_codes: 0,
                    version: 0,
                };

                diesel::insert_into(partners::table)
                    .values(&partner_db)
                    .execute(conn)
                    .into_core()?;
                debug!("Inserted partner {}", partner_db.id);
                Ok(partner_from_db(partner_db, Vec::new()))
            })
            .await
    }

    async fn update(&self, partner: Partner) -> Result<Partner> {
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<Partner> {
                save_partner(conn, &partner)?;
                load_partner(conn, &partner.id)?.ok_or_else(|| {
                    Error::Database(DatabaseError::NotFound(partner.id.clone()))
                })
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::config::POOL_SIZE_ENV;
    use crate::db::{create_pool, run_migrations, spawn_writer, DbConfig};
    use chrono::{NaiveDate, NaiveDateTime};
    use promocode_core::partners::{
        PartnerError, PartnerPromoCodeLimit, PartnerService, PartnerServiceTrait,
        SetPartnerPromoCodeLimitRequest,
    };
    use tempfile::tempdir;

    /// Creates a repository backed by a fresh database file.
    /// The temp dir is returned to keep it alive for the test.
    async fn create_test_repository() -> (PartnerRepository, tempfile::TempDir) {
        let temp_dir = tempdir().expect("Failed to create temp directory");
        let db_path = temp_dir.path().join("test.db");
        let config = DbConfig::new(db_path.to_string_lossy().to_string());

        crate::db::init(&config).expect("Failed to init database");
        let pool = create_pool(&config).expect("Failed to create pool");
        run_migrations(&pool).expect("Failed to run migrations");
        let writer = spawn_writer((*pool).clone());

        (PartnerRepository::new(pool, writer), temp_dir)
    }

    /// Same as `create_test_repository`, but with the configured pool size.
    async fn create_repository_with_pool_size(
        pool_size: &str,
    ) -> (PartnerRepository, tempfile::TempDir) {
        let temp_dir = tempdir().expect("Failed to create temp directory");
        let app_data_dir = temp_dir.path().to_string_lossy().to_string();
        let config = DbConfig::from_lookup(&app_data_dir, |key| {
            (key == POOL_SIZE_ENV).then(|| pool_size.to_string())
        })
        .expect("Failed to read config");

        crate::db::init(&config).expect("Failed to init database");
        let pool = create_pool(&config).expect("Failed to create pool");
        run_migrations(&pool).expect("Failed to run migrations");
        let writer = spawn_writer((*pool).clone());

        (PartnerRepository::new(pool, writer), temp_dir)
    }

    fn at(day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, day)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    async fn insert_partner(repo: &PartnerRepository, id: &str, is_active: bool) -> Partner {
        repo.create(NewPartner {
            id: Some(id.to_string()),
            name: format!("Partner {}", id),
            is_active,
        })
        .await
        .expect("Failed to create partner")
    }

    #[tokio::test]
    async fn test_get_by_id_missing_partner() {
        let (repo, _temp_dir) = create_test_repository().await;
        assert!(repo.get_by_id("nope").unwrap().is_none());
    }

    #[tokio::test]
    async fn test_create_and_load_partner() {
        let (repo, _temp_dir) = create_test_repository().await;
        let created = insert_partner(&repo, "p1", true).await;

        let loaded = repo.get_by_id("p1").unwrap().unwrap();
        assert_eq!(loaded, created);
        assert_eq!(loaded.version, 0);
        assert!(loaded.limits.is_empty());
    }

    #[tokio::test]
    async fn test_create_generates_id_when_missing() {
        let (repo, _temp_dir) = create_test_repository().await;
        let created = repo
            .create(NewPartner {
                id: None,
                name: "Anonymous".to_string(),
                is_active: true,
            })
            .await
            .unwrap();

        assert!(Uuid::parse_str(&created.id).is_ok());
        assert!(repo.get_by_id(&created.id).unwrap().is_some());
    }

    #[tokio::test]
    async fn test_update_persists_limits_in_order() {
        let (repo, _temp_dir) = create_test_repository().await;
        let mut partner = insert_partner(&repo, "p1", true).await;

        let mut first = PartnerPromoCodeLimit::new("p1", 5, at(1));
        first.cancel_date = Some(at(2));
        let second = PartnerPromoCodeLimit::new("p1", 9, at(2));
        partner.limits = vec![first.clone(), second.clone()];
        partner.number_issued_promo_codes = 4;

        let saved = repo.update(partner).await.unwrap();
        assert_eq!(saved.version, 1);
        assert_eq!(saved.number_issued_promo_codes, 4);
        assert_eq!(saved.limits, vec![first, second]);

        assert_eq!(repo.get_by_id("p1").unwrap().unwrap(), saved);
    }

    #[tokio::test]
    async fn test_update_writes_cancel_date_of_existing_limit() {
        let (repo, _temp_dir) = create_test_repository().await;
        let mut partner = insert_partner(&repo, "p1", true).await;
        partner.limits = vec![PartnerPromoCodeLimit::new("p1", 5, at(1))];
        let mut saved = repo.update(partner).await.unwrap();

        saved.cancel_active_limits(at(3));
        let saved = repo.update(saved).await.unwrap();

        assert_eq!(saved.limits[0].cancel_date, Some(at(3)));
        assert_eq!(saved.version, 2);
    }

    #[tokio::test]
    async fn test_update_with_stale_version_conflicts() {
        let (repo, _temp_dir) = create_test_repository().await;
        let partner = insert_partner(&repo, "p1", true).await;

        let mut first = partner.clone();
        first.limits = vec![PartnerPromoCodeLimit::new("p1", 5, at(1))];
        let mut second = partner;
        second.limits = vec![PartnerPromoCodeLimit::new("p1", 7, at(1))];

        let saved = repo.update(first).await.unwrap();
        let result = repo.update(second).await;

        assert!(matches!(
            result,
            Err(Error::Database(DatabaseError::VersionConflict(ref id))) if id == "p1"
        ));
        // The rejected write left nothing behind.
        assert_eq!(repo.get_by_id("p1").unwrap().unwrap(), saved);
    }

    #[tokio::test]
    async fn test_update_missing_partner_is_not_found() {
        let (repo, _temp_dir) = create_test_repository().await;
        let ghost = Partner {
            id: "ghost".to_string(),
            name: "Ghost".to_string(),
            is_active: true,
            number_issued_promo_codes: 0,
            limits: Vec::new(),
            version: 0,
        };

        let result = repo.update(ghost).await;
        assert!(matches!(
            result,
            Err(Error::Database(DatabaseError::NotFound(_)))
        ));
    }

    #[tokio::test]
    async fn test_pool_size_one_leaves_a_reader_connection() {
        let (repo, _temp_dir) = create_repository_with_pool_size("1").await;
        assert_eq!(repo.pool.max_size(), 2);

        let created = insert_partner(&repo, "p1", true).await;
        assert_eq!(repo.get_by_id("p1").unwrap(), Some(created.clone()));
        assert_eq!(repo.list().unwrap(), vec![created]);
    }

    #[tokio::test]
    async fn test_update_cannot_take_over_another_partners_limit() {
        let (repo, _temp_dir) = create_test_repository().await;
        let mut a = insert_partner(&repo, "a", true).await;
        a.limits = vec![PartnerPromoCodeLimit::new("a", 5, at(1))];
        let a = repo.update(a).await.unwrap();
        let b = insert_partner(&repo, "b", true).await;

        // Same limit id, relabelled as b's.
        let mut stolen = a.limits[0].clone();
        stolen.partner_id = "b".to_string();
        stolen.cancel_date = Some(at(2));
        let mut takeover = b.clone();
        takeover.limits = vec![stolen];
        let result = repo.update(takeover).await;
        assert!(matches!(
            result,
            Err(Error::Validation(ValidationError::InvalidInput(_)))
        ));

        // A limit still labelled as a's, pushed through b.
        let mut foreign = b.clone();
        foreign.limits = vec![a.limits[0].clone()];
        let result = repo.update(foreign).await;
        assert!(matches!(
            result,
            Err(Error::Validation(ValidationError::InvalidInput(_)))
        ));

        assert_eq!(repo.get_by_id("a").unwrap().unwrap(), a);
        assert_eq!(repo.get_by_id("b").unwrap().unwrap(), b);
    }

    #[tokio::test]
    async fn test_list_groups_limits_by_partner() {
        let (repo, _temp_dir) = create_test_repository().await;
        let mut b = insert_partner(&repo, "b", true).await;
        let a = insert_partner(&repo, "a", false).await;
        b.limits = vec![PartnerPromoCodeLimit::new("b", 3, at(1))];
        let b = repo.update(b).await.unwrap();

        let listed = repo.list().unwrap();
        assert_eq!(listed, vec![a, b]);
    }

    #[tokio::test]
    async fn test_service_sets_limit_against_sqlite() {
        let (repo, _temp_dir) = create_test_repository().await;
        let repo = Arc::new(repo);
        let mut partner = insert_partner(&repo, "p1", true).await;
        partner.limits = vec![PartnerPromoCodeLimit::new("p1", 5, at(1))];
        partner.number_issued_promo_codes = 3;
        let partner = repo.update(partner).await.unwrap();
        let old_limit_id = partner.limits[0].id.clone();

        let service = PartnerService::new(repo.clone());

        let rejected = service
            .set_partner_promo_code_limit("p1", SetPartnerPromoCodeLimitRequest::new(0))
            .await;
        assert!(matches!(
            rejected,
            Err(Error::Partner(PartnerError::InvalidLimit))
        ));
        assert_eq!(repo.get_by_id("p1").unwrap().unwrap(), partner);

        let created = service
            .set_partner_promo_code_limit("p1", SetPartnerPromoCodeLimitRequest::new(10))
            .await
            .unwrap();

        let stored = repo.get_by_id("p1").unwrap().unwrap();
        assert_eq!(stored.number_issued_promo_codes, 0);
        assert_eq!(stored.limits.len(), 2);
        assert_eq!(stored.limits[0].id, old_limit_id);
        assert!(stored.limits[0].cancel_date.is_some());
        assert_eq!(stored.active_limit().map(|l| l.id.as_str()), Some(created.id.as_str()));
        assert_eq!(stored.active_limit().map(|l| l.limit), Some(10));
        assert_eq!(
            service.get_partner_limit("p1", &created.id).unwrap().limit,
            10
        );
    }

    #[tokio::test]
    async fn test_service_rejects_inactive_partner_against_sqlite() {
        let (repo, _temp_dir) = create_test_repository().await;
        let repo = Arc::new(repo);
        let partner = insert_partner(&repo, "p1", false).await;
        let service = PartnerService::new(repo.clone());

        let result = service
            .set_partner_promo_code_limit("p1", SetPartnerPromoCodeLimitRequest::new(5))
            .await;

        assert!(matches!(result, Err(Error::Partner(PartnerError::Inactive(_)))));
        assert_eq!(repo.get_by_id("p1").unwrap().unwrap(), partner);
    }
}
