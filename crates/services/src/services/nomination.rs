//! Nomination intake and admin review.

use chrono::Utc;
use db::{
    RetryConfig,
    models::{
        category::{NomineeType, find_subcategory},
        nomination::{
            CreateNomination, Nomination, NominationState, is_duplicate_nomination,
        },
        nominator::{Nominator, UpsertNominator},
        nominee::{CreateNominee, Nominee, UpdateNominee},
        outbox::{OutboxEntry, OutboxEventType, SyncTarget},
        setting::CampaignSettings,
    },
    with_retry,
};
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};
use strum::IntoEnumIterator;
use thiserror::Error;
use tracing::{info, instrument};
use ts_rs::TS;
use utils::text::slugify;
use uuid::Uuid;

use super::{
    contact::{ContactPayload, nominee_page_url},
    validation::{ValidationErrors, validate_nomination},
};

/// Upper bound on the admin vote offset; keeps `votes + additional_votes`
/// well inside an SQLite INTEGER.
pub const MAX_ADDITIONAL_VOTES: i64 = 1_000_000;

#[derive(Debug, Error)]
pub enum NominationError {
    #[error("Nominations are closed")]
    Closed,
    #[error("Validation failed")]
    Validation(#[from] ValidationErrors),
    #[error("Unknown category `{0}`")]
    UnknownSubcategory(String),
    #[error("Category `{subcategory_id}` only accepts {expected} nominees")]
    TypeMismatch {
        subcategory_id: String,
        expected: NomineeType,
    },
    #[error("This nominee has already been nominated in this category")]
    Duplicate,
    #[error("Live URL is already used by another nominee")]
    SlugTaken,
    #[error("Nomination not found")]
    NotFound,
    #[error("Nominee not found")]
    NomineeNotFound,
    #[error("Additional votes must be between 0 and {}", MAX_ADDITIONAL_VOTES)]
    AdditionalVotesOutOfRange,
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Clone, Deserialize, TS)]
pub struct SubmitNomination {
    pub subcategory_id: String,
    pub nominator: UpsertNominator,
    pub nominee: CreateNominee,
}

#[derive(Debug, Clone, Serialize, TS)]
pub struct NominationReceipt {
    pub nomination_id: Uuid,
    pub nominee_id: Uuid,
    pub state: NominationState,
    pub category_group_id: String,
    pub subcategory_id: String,
    /// Slug the nominee's page will use once approved
    pub live_url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, TS)]
#[serde(rename_all = "lowercase")]
pub enum ReviewDecision {
    Approve,
    Reject,
}

/// Admin edit of a nomination. Every field is optional.
#[derive(Debug, Clone, Default, Deserialize, TS)]
pub struct ReviewNomination {
    pub decision: Option<ReviewDecision>,
    pub rejection_reason: Option<String>,
    pub additional_votes: Option<i64>,
    pub admin_notes: Option<String>,
}

/// Admin detail view: the nomination with both parties in full.
#[derive(Debug, Clone, Serialize, TS)]
pub struct NominationDetail {
    pub nomination: Nomination,
    pub nominee: Nominee,
    pub nominator: Nominator,
    pub total_votes: i64,
}

#[derive(Clone)]
pub struct NominationService {
    pool: SqlitePool,
    public_base_url: String,
    retry: RetryConfig,
}

impl NominationService {
    pub fn new(pool: SqlitePool, public_base_url: impl Into<String>) -> Self {
        Self {
            pool,
            public_base_url: public_base_url.into(),
            retry: RetryConfig::default(),
        }
    }

    #[instrument(skip(self, request), fields(subcategory = %request.subcategory_id))]
    pub async fn submit(
        &self,
        mut request: SubmitNomination,
    ) -> Result<NominationReceipt, NominationError> {
        let settings = CampaignSettings::load(&self.pool).await?;
        if !settings.accepting_nominations(Utc::now()) {
            return Err(NominationError::Closed);
        }

        validate_nomination(&mut request.nominator, &mut request.nominee)?;

        let subcategory = find_subcategory(&request.subcategory_id)
            .ok_or_else(|| NominationError::UnknownSubcategory(request.subcategory_id.clone()))?;
        if subcategory.nominee_type != request.nominee.nominee_type() {
            return Err(NominationError::TypeMismatch {
                subcategory_id: subcategory.id.to_string(),
                expected: subcategory.nominee_type,
            });
        }
        let group = db::models::category::group_of(subcategory.id)
            .ok_or_else(|| NominationError::UnknownSubcategory(request.subcategory_id.clone()))?;

        let receipt = with_retry(&self.retry, "submit_nomination", || {
            self.record_submission(&request, group.id, &settings.campaign_year)
        })
        .await
        .map_err(|e| {
            if is_duplicate_nomination(&e) {
                NominationError::Duplicate
            } else {
                NominationError::Database(e)
            }
        })?;

        info!(
            nomination_id = %receipt.nomination_id,
            nominee_id = %receipt.nominee_id,
            "Nomination submitted"
        );
        Ok(receipt)
    }

    async fn record_submission(
        &self,
        request: &SubmitNomination,
        group_id: &str,
        campaign_year: &str,
    ) -> Result<NominationReceipt, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let nominator = Nominator::upsert_by_email(&mut *tx, &request.nominator).await?;
        let nominee = match Nominee::find_matching(&mut *tx, &request.nominee).await? {
            Some(existing) => existing,
            None => Nominee::create(&mut tx, &request.nominee).await?,
        };

        let nomination = Nomination::create(
            &mut *tx,
            &CreateNomination {
                nominator_id: nominator.id,
                nominee_id: nominee.id,
                category_group_id: group_id.to_string(),
                subcategory_id: request.subcategory_id.clone(),
            },
        )
        .await?;

        let payload = ContactPayload::for_nominator(&nominator, &nomination, campaign_year);
        enqueue_everywhere(&mut tx, OutboxEventType::NominationSubmitted, &payload).await?;

        tx.commit().await?;

        Ok(NominationReceipt {
            nomination_id: nomination.id,
            nominee_id: nominee.id,
            state: nomination.state,
            category_group_id: nomination.category_group_id,
            subcategory_id: nomination.subcategory_id,
            live_url: nominee.live_url,
        })
    }

    pub async fn detail(&self, id: Uuid) -> Result<NominationDetail, NominationError> {
        let nomination = Nomination::find_by_id(&self.pool, id)
            .await?
            .ok_or(NominationError::NotFound)?;
        let nominee = Nominee::find_by_id(&self.pool, nomination.nominee_id)
            .await?
            .ok_or(NominationError::NomineeNotFound)?;
        let nominator = Nominator::find_by_id(&self.pool, nomination.nominator_id)
            .await?
            .ok_or(NominationError::NotFound)?;
        Ok(NominationDetail {
            total_votes: nomination.total_votes(),
            nomination,
            nominee,
            nominator,
        })
    }

    /// Apply an admin decision and/or admin fields in one transaction.
    ///
    /// Moving a nomination into `approved` queues a `nominee_approved` push
    /// carrying the nominee's public page.
    #[instrument(skip(self, review), fields(decision = ?review.decision))]
    pub async fn review(
        &self,
        id: Uuid,
        review: ReviewNomination,
        actor: &str,
    ) -> Result<Nomination, NominationError> {
        if review
            .additional_votes
            .is_some_and(|v| !(0..=MAX_ADDITIONAL_VOTES).contains(&v))
        {
            return Err(NominationError::AdditionalVotesOutOfRange);
        }

        let outcome = with_retry(&self.retry, "review_nomination", || {
            self.apply_review(id, &review, actor)
        })
        .await
        .map_err(|e| match e {
            // Rows referenced by foreign keys vanished mid-review.
            sqlx::Error::RowNotFound => NominationError::NomineeNotFound,
            e => NominationError::Database(e),
        })?;
        let Some((previous, updated)) = outcome else {
            return Err(NominationError::NotFound);
        };

        if updated.state != previous.state {
            info!(
                nomination_id = %id,
                from = %previous.state,
                to = %updated.state,
                actor = actor,
                "Nomination state changed"
            );
        }
        Ok(updated)
    }

    /// One attempt at a review. `None` when the nomination does not exist.
    async fn apply_review(
        &self,
        id: Uuid,
        review: &ReviewNomination,
        actor: &str,
    ) -> Result<Option<(Nomination, Nomination)>, sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        let Some(current) = Nomination::find_by_id(&mut *tx, id).await? else {
            return Ok(None);
        };

        let mut updated = current.clone();
        if review.additional_votes.is_some() || review.admin_notes.is_some() {
            let Some(row) = Nomination::update_admin_fields(
                &mut *tx,
                id,
                review.additional_votes,
                review.admin_notes.as_deref().map(str::trim),
            )
            .await?
            else {
                return Ok(None);
            };
            updated = row;
        }

        match review.decision {
            Some(ReviewDecision::Approve) => {
                let Some(row) =
                    Nomination::set_state(&mut *tx, id, NominationState::Approved, Some(actor), None)
                        .await?
                else {
                    return Ok(None);
                };
                updated = row;
                if current.state != NominationState::Approved {
                    self.enqueue_approval(&mut tx, &updated).await?;
                }
            }
            Some(ReviewDecision::Reject) => {
                let reason = review
                    .rejection_reason
                    .as_deref()
                    .map(str::trim)
                    .filter(|r| !r.is_empty());
                let Some(row) =
                    Nomination::set_state(&mut *tx, id, NominationState::Rejected, Some(actor), reason)
                        .await?
                else {
                    return Ok(None);
                };
                updated = row;
            }
            None => {}
        }

        tx.commit().await?;
        Ok(Some((current, updated)))
    }

    async fn enqueue_approval(
        &self,
        conn: &mut SqliteConnection,
        nomination: &Nomination,
    ) -> Result<(), sqlx::Error> {
        let settings = CampaignSettings::load(&mut *conn).await?;
        let nominee = Nominee::find_by_id(&mut *conn, nomination.nominee_id)
            .await?
            .ok_or(sqlx::Error::RowNotFound)?;
        let live_url = nominee_page_url(&self.public_base_url, &nominee.live_url);

        // Companies have no contact email; their nominator hears about it instead.
        let payload = match ContactPayload::for_nominee(
            &nominee,
            nomination,
            &settings.campaign_year,
            live_url.clone(),
        ) {
            Some(payload) => payload,
            None => {
                let nominator = Nominator::find_by_id(&mut *conn, nomination.nominator_id)
                    .await?
                    .ok_or(sqlx::Error::RowNotFound)?;
                ContactPayload {
                    live_url: Some(live_url),
                    ..ContactPayload::for_nominator(&nominator, nomination, &settings.campaign_year)
                }
            }
        };

        enqueue_everywhere(conn, OutboxEventType::NomineeApproved, &payload).await
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), NominationError> {
        match Nomination::delete(&self.pool, id).await? {
            0 => Err(NominationError::NotFound),
            _ => {
                info!(nomination_id = %id, "Nomination deleted");
                Ok(())
            }
        }
    }

    pub async fn update_nominee(
        &self,
        id: Uuid,
        mut update: UpdateNominee,
    ) -> Result<Nominee, NominationError> {
        if let Some(slug) = update.live_url.as_deref() {
            let slug = slugify(slug);
            if slug.is_empty() {
                let mut errors = ValidationErrors::new();
                errors.add("live_url", "Must contain letters or digits");
                return Err(errors.into());
            }
            update.live_url = Some(slug);
        }

        Nominee::update_profile(&self.pool, id, &update)
            .await
            .map_err(|e| match &e {
                sqlx::Error::Database(db_err)
                    if db_err.is_unique_violation() && db_err.message().contains("live_url") =>
                {
                    NominationError::SlugTaken
                }
                _ => NominationError::Database(e),
            })?
            .ok_or(NominationError::NomineeNotFound)
    }
}

/// Stage the same contact push for every sync target.
pub(crate) async fn enqueue_everywhere(
    conn: &mut SqliteConnection,
    event_type: OutboxEventType,
    payload: &ContactPayload,
) -> Result<(), sqlx::Error> {
    for target in SyncTarget::iter() {
        OutboxEntry::enqueue(&mut *conn, target, event_type, payload).await?;
    }
    Ok(())
}
