use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use strum::IntoEnumIterator;
use ts_rs::TS;

use super::outbox::{OutboxEntry, OutboxStats, SyncTarget};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
pub struct NominationCounts {
    pub submitted: i64,
    pub approved: i64,
    pub rejected: i64,
    pub total: i64,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct SubcategoryStats {
    pub subcategory_id: String,
    pub nominations: i64,
    pub approved: i64,
    pub votes: i64,
}

/// Campaign-wide counters. Nothing here identifies a person, so the public
/// API can return it as is.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CampaignStats {
    pub nominations: NominationCounts,
    pub nominees: i64,
    pub nominators: i64,
    /// Real votes only
    pub total_votes: i64,
    pub total_additional_votes: i64,
    pub unique_voters: i64,
    pub subcategories: Vec<SubcategoryStats>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct TargetOutboxStats {
    pub target: SyncTarget,
    #[serde(flatten)]
    #[ts(flatten)]
    pub counts: OutboxStats,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct AdminStats {
    #[serde(flatten)]
    #[ts(flatten)]
    pub campaign: CampaignStats,
    pub outbox: Vec<TargetOutboxStats>,
}

impl CampaignStats {
    pub async fn load(pool: &SqlitePool) -> Result<Self, sqlx::Error> {
        let (submitted, approved, rejected, total_votes, total_additional_votes): (
            i64,
            i64,
            i64,
            i64,
            i64,
        ) = sqlx::query_as(
            r#"SELECT
                COALESCE(SUM(state = 'submitted'), 0),
                COALESCE(SUM(state = 'approved'), 0),
                COALESCE(SUM(state = 'rejected'), 0),
                COALESCE(SUM(votes), 0),
                COALESCE(SUM(additional_votes), 0)
            FROM nominations"#,
        )
        .fetch_one(pool)
        .await?;

        let nominees: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM nominees")
            .fetch_one(pool)
            .await?;
        let nominators: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM nominators")
            .fetch_one(pool)
            .await?;
        let unique_voters: i64 = sqlx::query_scalar("SELECT COUNT(DISTINCT voter_id) FROM votes")
            .fetch_one(pool)
            .await?;

        let subcategories = sqlx::query_as::<_, SubcategoryStats>(
            r#"SELECT
                subcategory_id,
                COUNT(*)                   AS nominations,
                SUM(state = 'approved')    AS approved,
                SUM(votes)                 AS votes
            FROM nominations
            GROUP BY subcategory_id
            ORDER BY subcategory_id"#,
        )
        .fetch_all(pool)
        .await?;

        Ok(Self {
            nominations: NominationCounts {
                submitted,
                approved,
                rejected,
                total: submitted + approved + rejected,
            },
            nominees,
            nominators,
            total_votes,
            total_additional_votes,
            unique_voters,
            subcategories,
        })
    }
}

impl AdminStats {
    pub async fn load(pool: &SqlitePool) -> Result<Self, sqlx::Error> {
        let campaign = CampaignStats::load(pool).await?;
        let mut outbox = Vec::new();
        for target in SyncTarget::iter() {
            outbox.push(TargetOutboxStats {
                target,
                counts: OutboxEntry::stats(pool, target).await?,
            });
        }
        Ok(Self { campaign, outbox })
    }
}
