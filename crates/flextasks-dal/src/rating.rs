use flextasks_types::Score;
use futures::{StreamExt as _, TryStreamExt as _};
use garde::Validate;
use serde::{Deserialize, Serialize};
use sqlx::Pool;
use tracing::warn;

use crate::{Error, ListingParams, error::Result};

const VALID_ORDER_FIELDS: &[&str] = &["created", "overall"];

#[derive(Debug, Serialize, Deserialize, Clone, Validate)]
pub struct CreateRating {
    #[garde(range(min = 1))]
    pub task_id: i64,
    #[garde(range(min = 1))]
    pub rated_user_id: i64,
    #[garde(range(min = 1))]
    pub rated_by_id: i64,
    #[garde(dive)]
    pub punctuality: Score,
    #[garde(dive)]
    pub professionalism: Score,
    #[garde(dive)]
    pub quality: Score,
    #[garde(dive)]
    pub communication: Score,
    #[garde(length(min = 1, max = 500))]
    pub comment: Option<String>,
}

impl CreateRating {
    fn overall(&self) -> f64 {
        f64::from(
            self.punctuality.value()
                + self.professionalism.value()
                + self.quality.value()
                + self.communication.value(),
        ) / 4.0
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, sqlx::FromRow)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Rating {
    pub id: i64,
    pub task_id: i64,
    pub rated_user_id: i64,
    pub rated_by_id: i64,
    pub punctuality: i16,
    pub professionalism: i16,
    pub quality: i16,
    pub communication: i16,
    pub overall: f64,
    pub comment: Option<String>,
    pub created: time::PrimitiveDateTime,
}

#[derive(Debug, Serialize, Clone, Default)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CategoryAverages {
    pub punctuality: f64,
    pub professionalism: f64,
    pub quality: f64,
    pub communication: f64,
}

/// Ratings received by one user, with aggregates recomputed from the listed
/// rows rather than read from the `users` cache.
#[derive(Debug, Serialize, Clone)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct RatingProfile {
    pub average_rating: f64,
    pub total_ratings: i64,
    pub categories: CategoryAverages,
    pub ratings: Vec<Rating>,
}

impl RatingProfile {
    fn from_ratings(ratings: Vec<Rating>) -> Self {
        if ratings.is_empty() {
            return Self {
                average_rating: 0.0,
                total_ratings: 0,
                categories: CategoryAverages::default(),
                ratings,
            };
        }
        let n = ratings.len() as f64;
        let mut overall_sum = 0.0;
        let mut categories = CategoryAverages::default();
        for r in &ratings {
            overall_sum += r.overall;
            categories.punctuality += f64::from(r.punctuality);
            categories.professionalism += f64::from(r.professionalism);
            categories.quality += f64::from(r.quality);
            categories.communication += f64::from(r.communication);
        }
        categories.punctuality /= n;
        categories.professionalism /= n;
        categories.quality /= n;
        categories.communication /= n;
        Self {
            average_rating: overall_sum / n,
            total_ratings: ratings.len() as i64,
            categories,
            ratings,
        }
    }
}

pub type RatingRepository = RatingRepositoryImpl<Pool<crate::ChosenDB>>;

pub struct RatingRepositoryImpl<E> {
    executor: E,
    refresh_on_write: bool,
}

impl<'c, E> RatingRepositoryImpl<E>
where
    for<'a> &'a E: sqlx::Executor<'c, Database = crate::ChosenDB>,
{
    pub fn new(executor: E) -> Self {
        Self {
            executor,
            refresh_on_write: true,
        }
    }

    /// Controls whether `create` refreshes the rated user's cached aggregate
    /// after the insert. Disable for bulk loads (seeding, backfill) and run
    /// `refresh_user_aggregate` once afterwards.
    pub fn with_refresh_on_write(mut self, enabled: bool) -> Self {
        self.refresh_on_write = enabled;
        self
    }

    /// Validates and stores one rating. The overall score is the exact mean
    /// of the four category scores. At most one rating can exist per
    /// (task, rater) pair; the database unique index is the authority.
    pub async fn create(&self, payload: CreateRating) -> Result<Rating> {
        payload.validate()?;

        let result = sqlx::query(
            "INSERT INTO rating (task_id, rated_user_id, rated_by_id, \
             punctuality, professionalism, quality, communication, overall, comment) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(payload.task_id)
        .bind(payload.rated_user_id)
        .bind(payload.rated_by_id)
        .bind(payload.punctuality.value())
        .bind(payload.professionalism.value())
        .bind(payload.quality.value())
        .bind(payload.communication.value())
        .bind(payload.overall())
        .bind(&payload.comment)
        .execute(&self.executor)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => Error::DuplicateRating {
                task_id: payload.task_id,
                rated_by_id: payload.rated_by_id,
            },
            e => e.into(),
        })?;

        let id = result.last_insert_rowid();

        if self.refresh_on_write {
            // The rating row is already committed at this point, so a failed
            // refresh only leaves the cache stale until the next recompute.
            if let Err(e) = self.refresh_user_aggregate(payload.rated_user_id).await {
                warn!(
                    "Aggregate refresh for user {} failed: {e}",
                    payload.rated_user_id
                );
            }
        }

        self.get(id).await
    }

    pub async fn get(&self, id: i64) -> Result<Rating> {
        sqlx::query_as::<_, Rating>("SELECT * FROM rating WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.executor)
            .await?
            .ok_or_else(|| Error::RecordNotFound(format!("Rating {id}")))
    }

    /// Rating a given rater already submitted for a task, if any. Lets the
    /// caller tell whether the rating form should still be offered.
    pub async fn for_task(&self, task_id: i64, rated_by_id: i64) -> Result<Option<Rating>> {
        let record = sqlx::query_as::<_, Rating>(
            "SELECT * FROM rating WHERE task_id = ? AND rated_by_id = ?",
        )
        .bind(task_id)
        .bind(rated_by_id)
        .fetch_optional(&self.executor)
        .await?;
        Ok(record)
    }

    pub async fn list_for_user(
        &self,
        rated_user_id: i64,
        params: ListingParams,
    ) -> Result<Vec<Rating>> {
        let mut order = params.ordering(VALID_ORDER_FIELDS)?;
        if order.is_empty() {
            order = "ORDER BY created DESC, id DESC".to_string();
        }
        let records = sqlx::query_as::<_, Rating>(&format!(
            "SELECT * FROM rating WHERE rated_user_id = ? {order} LIMIT ? OFFSET ?"
        ))
        .bind(rated_user_id)
        .bind(params.limit)
        .bind(params.offset)
        .fetch(&self.executor)
        .take(crate::MAX_LIMIT)
        .try_collect::<Vec<_>>()
        .await?;
        Ok(records)
    }

    /// Profile view of a user's received ratings. Aggregates are computed
    /// from the fetched rows, independent of `users.average_rating` and
    /// `users.total_ratings`, so a stale cache can be detected and healed.
    pub async fn profile(&self, rated_user_id: i64) -> Result<RatingProfile> {
        let ratings = sqlx::query_as::<_, Rating>(
            "SELECT * FROM rating WHERE rated_user_id = ? ORDER BY created DESC, id DESC",
        )
        .bind(rated_user_id)
        .fetch(&self.executor)
        .take(crate::MAX_LIMIT)
        .try_collect::<Vec<_>>()
        .await?;
        Ok(RatingProfile::from_ratings(ratings))
    }

    /// Recomputes `users.average_rating` and `users.total_ratings` from
    /// scratch out of the stored ratings. Idempotent; also usable on its own
    /// to repair a cache that missed a write. A user with no ratings goes
    /// back to (0, 0).
    pub async fn refresh_user_aggregate(&self, rated_user_id: i64) -> Result<()> {
        let res = sqlx::query(
            "UPDATE users SET \
             average_rating = COALESCE((SELECT AVG(overall) FROM rating WHERE rated_user_id = ?), 0), \
             total_ratings = (SELECT COUNT(*) FROM rating WHERE rated_user_id = ?) \
             WHERE id = ?",
        )
        .bind(rated_user_id)
        .bind(rated_user_id)
        .bind(rated_user_id)
        .execute(&self.executor)
        .await?;

        if res.rows_affected() == 0 {
            return Err(Error::RecordNotFound(format!("User {rated_user_id}")));
        }
        Ok(())
    }
}
