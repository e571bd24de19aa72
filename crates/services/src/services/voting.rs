//! Public voting.

use chrono::Utc;
use db::{
    RetryConfig,
    models::{
        nomination::{Nomination, NominationState},
        nominee::Nominee,
        outbox::OutboxEventType,
        setting::CampaignSettings,
        vote::{CreateVote, Vote, is_duplicate_vote},
        voter::{UpsertVoter, Voter},
    },
    with_retry,
};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::{info, instrument};
use ts_rs::TS;
use uuid::Uuid;

use super::{
    contact::{ContactPayload, nominee_page_url},
    nomination::enqueue_everywhere,
    validation::{ValidationErrors, validate_voter},
};

#[derive(Debug, Error)]
pub enum VoteError {
    #[error("Voting is closed")]
    Closed,
    #[error("Validation failed")]
    Validation(#[from] ValidationErrors),
    #[error("Nomination not found")]
    NominationNotFound,
    #[error("This nominee is not open for votes")]
    NotApproved,
    #[error("Nomination does not belong to category `{0}`")]
    SubcategoryMismatch(String),
    #[error("You have already voted in this category")]
    AlreadyVoted,
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Clone, Deserialize, TS)]
pub struct CastVote {
    pub nomination_id: Uuid,
    pub subcategory_id: String,
    pub voter: UpsertVoter,
}

/// Request metadata stored with the vote for abuse review.
#[derive(Debug, Clone, Default)]
pub struct ClientMeta {
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone, Serialize, TS)]
pub struct VoteReceipt {
    pub vote_id: Uuid,
    pub nomination_id: Uuid,
    pub subcategory_id: String,
    /// `votes + additional_votes` after this vote
    pub total_votes: i64,
}

#[derive(Clone)]
pub struct VotingService {
    pool: SqlitePool,
    public_base_url: String,
    retry: RetryConfig,
}

impl VotingService {
    pub fn new(pool: SqlitePool, public_base_url: impl Into<String>) -> Self {
        Self {
            pool,
            public_base_url: public_base_url.into(),
            retry: RetryConfig::default(),
        }
    }

    #[instrument(skip(self, request, meta), fields(nomination_id = %request.nomination_id))]
    pub async fn cast(&self, mut request: CastVote, meta: ClientMeta) -> Result<VoteReceipt, VoteError> {
        let settings = CampaignSettings::load(&self.pool).await?;
        if !settings.accepting_votes(Utc::now()) {
            return Err(VoteError::Closed);
        }

        validate_voter(&mut request.voter)?;

        let nomination = Nomination::find_by_id(&self.pool, request.nomination_id)
            .await?
            .ok_or(VoteError::NominationNotFound)?;
        if nomination.state != NominationState::Approved {
            return Err(VoteError::NotApproved);
        }
        if nomination.subcategory_id != request.subcategory_id.trim() {
            return Err(VoteError::SubcategoryMismatch(request.subcategory_id));
        }

        let nominee = Nominee::find_by_id(&self.pool, nomination.nominee_id).await?;
        let live_url = nominee.map(|n| nominee_page_url(&self.public_base_url, &n.live_url));

        let receipt = with_retry(&self.retry, "cast_vote", || {
            self.record_vote(
                &request.voter,
                &nomination,
                &meta,
                &settings.campaign_year,
                live_url.clone(),
            )
        })
        .await
        .map_err(|e| {
            if is_duplicate_vote(&e) {
                VoteError::AlreadyVoted
            } else {
                VoteError::Database(e)
            }
        })?;

        info!(
            vote_id = %receipt.vote_id,
            subcategory = %receipt.subcategory_id,
            total_votes = receipt.total_votes,
            "Vote recorded"
        );
        Ok(receipt)
    }

    /// Insert the vote and bump the counter together; a duplicate vote rolls
    /// back before the counter moves.
    async fn record_vote(
        &self,
        voter: &UpsertVoter,
        nomination: &Nomination,
        meta: &ClientMeta,
        campaign_year: &str,
        live_url: Option<String>,
    ) -> Result<VoteReceipt, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let voter = Voter::upsert_by_email(&mut *tx, voter).await?;
        let vote = Vote::create(
            &mut *tx,
            &CreateVote {
                voter_id: voter.id,
                nomination_id: nomination.id,
                subcategory_id: nomination.subcategory_id.clone(),
                ip: meta.ip.clone(),
                user_agent: meta.user_agent.clone(),
            },
        )
        .await?;
        let total_votes = Nomination::increment_votes(&mut *tx, nomination.id).await?;

        let payload = ContactPayload::for_voter(&voter, nomination, campaign_year, live_url);
        enqueue_everywhere(&mut tx, OutboxEventType::VoteCast, &payload).await?;

        tx.commit().await?;

        Ok(VoteReceipt {
            vote_id: vote.id,
            nomination_id: nomination.id,
            subcategory_id: vote.subcategory_id,
            total_votes,
        })
    }
}
