//! Integration tests for public voting.

use db::{
    DBService,
    models::{
        nomination::{Nomination, NominationState},
        outbox::{OutboxEntry, OutboxEventType, SyncTarget},
        setting::{AppSetting, SettingKey},
        vote::Vote,
        voter::UpsertVoter,
    },
    test_utils::{create_test_db, person, seed_approved_person, seed_nomination, seed_nominator, seed_nominee},
};
use services::services::{
    contact::{ContactPayload, ContactRole},
    voting::{CastVote, ClientMeta, VoteError, VotingService},
};

const BASE_URL: &str = "https://awards.example.com";

async fn open_voting(db: &DBService) {
    AppSetting::set(&db.pool, SettingKey::VotingOpen, "true")
        .await
        .unwrap();
}

fn voter(email: &str) -> UpsertVoter {
    UpsertVoter {
        email: email.to_string(),
        firstname: "Vic".to_string(),
        lastname: "Voter".to_string(),
        ..Default::default()
    }
}

fn ballot(nomination: &Nomination, email: &str) -> CastVote {
    CastVote {
        nomination_id: nomination.id,
        subcategory_id: nomination.subcategory_id.clone(),
        voter: voter(email),
    }
}

fn meta() -> ClientMeta {
    ClientMeta {
        ip: Some("203.0.113.7".to_string()),
        user_agent: Some("test-agent".to_string()),
    }
}

#[tokio::test]
async fn vote_increments_total_and_stages_contact() {
    let (db, _dir) = create_test_db().await;
    open_voting(&db).await;
    let (_, nomination) = seed_approved_person(&db, "jane@example.com").await;
    let service = VotingService::new(db.pool.clone(), BASE_URL);

    let receipt = service
        .cast(ballot(&nomination, " Vic@Example.com "), meta())
        .await
        .unwrap();
    assert_eq!(receipt.total_votes, 1);
    assert_eq!(receipt.subcategory_id, "top-recruiter");

    let second = service
        .cast(ballot(&nomination, "other@example.com"), meta())
        .await
        .unwrap();
    assert_eq!(second.total_votes, 2);
    assert_eq!(
        Vote::count_for_nomination(&db.pool, nomination.id)
            .await
            .unwrap(),
        2
    );

    let rows = OutboxEntry::list(&db.pool, SyncTarget::Loops, None, 10)
        .await
        .unwrap();
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|r| r.event_type == OutboxEventType::VoteCast));
    let contacts: Vec<ContactPayload> = rows.iter().map(|r| r.decode_payload().unwrap()).collect();
    assert!(contacts.iter().any(|c| c.email == "vic@example.com"));
    assert!(contacts.iter().all(|c| c.role == ContactRole::Voter));
    assert!(contacts.iter().all(|c| {
        c.live_url.as_deref() == Some("https://awards.example.com/nominee/jane-doe")
    }));
}

#[tokio::test]
async fn second_vote_in_category_conflicts_and_leaves_counter() {
    let (db, _dir) = create_test_db().await;
    open_voting(&db).await;
    let (_, nomination) = seed_approved_person(&db, "jane@example.com").await;
    let nominator = seed_nominator(&db, "someone@example.com").await;
    let rival = seed_nominee(&db, &person("John", "Roe", "john@example.com")).await;
    let rival_nomination = seed_nomination(
        &db,
        nominator.id,
        &rival,
        "top-recruiter",
        NominationState::Approved,
    )
    .await;
    let service = VotingService::new(db.pool.clone(), BASE_URL);

    service
        .cast(ballot(&nomination, "vic@example.com"), meta())
        .await
        .unwrap();

    let err = service
        .cast(ballot(&rival_nomination, "VIC@example.com"), meta())
        .await
        .unwrap_err();
    assert!(matches!(err, VoteError::AlreadyVoted), "{err:?}");

    let rival_after = Nomination::find_by_id(&db.pool, rival_nomination.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(rival_after.votes, 0);
    // The failed vote staged nothing.
    assert_eq!(
        OutboxEntry::list(&db.pool, SyncTarget::Hubspot, None, 10)
            .await
            .unwrap()
            .len(),
        1
    );
}

#[tokio::test]
async fn same_voter_may_vote_in_other_categories() {
    let (db, _dir) = create_test_db().await;
    open_voting(&db).await;
    let (nominee, nomination) = seed_approved_person(&db, "jane@example.com").await;
    let nominator = seed_nominator(&db, "someone@example.com").await;
    let sourcer = seed_nomination(
        &db,
        nominator.id,
        &nominee,
        "best-sourcer",
        NominationState::Approved,
    )
    .await;
    let service = VotingService::new(db.pool.clone(), BASE_URL);

    service
        .cast(ballot(&nomination, "vic@example.com"), meta())
        .await
        .unwrap();
    let receipt = service
        .cast(ballot(&sourcer, "vic@example.com"), meta())
        .await
        .unwrap();
    assert_eq!(receipt.total_votes, 1);
}

#[tokio::test]
async fn only_approved_nominations_take_votes() {
    let (db, _dir) = create_test_db().await;
    open_voting(&db).await;
    let nominator = seed_nominator(&db, "someone@example.com").await;
    let nominee = seed_nominee(&db, &person("John", "Roe", "john@example.com")).await;
    let pending = seed_nomination(
        &db,
        nominator.id,
        &nominee,
        "top-recruiter",
        NominationState::Submitted,
    )
    .await;
    let service = VotingService::new(db.pool.clone(), BASE_URL);

    let err = service
        .cast(ballot(&pending, "vic@example.com"), meta())
        .await
        .unwrap_err();
    assert!(matches!(err, VoteError::NotApproved));

    let mut missing = ballot(&pending, "vic@example.com");
    missing.nomination_id = uuid::Uuid::new_v4();
    let err = service.cast(missing, meta()).await.unwrap_err();
    assert!(matches!(err, VoteError::NominationNotFound));
}

#[tokio::test]
async fn subcategory_must_match_nomination() {
    let (db, _dir) = create_test_db().await;
    open_voting(&db).await;
    let (_, nomination) = seed_approved_person(&db, "jane@example.com").await;
    let service = VotingService::new(db.pool.clone(), BASE_URL);

    let mut request = ballot(&nomination, "vic@example.com");
    request.subcategory_id = "best-sourcer".to_string();
    let err = service.cast(request, meta()).await.unwrap_err();
    assert!(matches!(err, VoteError::SubcategoryMismatch(ref s) if s == "best-sourcer"));
}

#[tokio::test]
async fn closed_voting_and_bad_voter_fields() {
    let (db, _dir) = create_test_db().await;
    let (_, nomination) = seed_approved_person(&db, "jane@example.com").await;
    let service = VotingService::new(db.pool.clone(), BASE_URL);

    // Voting starts closed.
    let err = service
        .cast(ballot(&nomination, "vic@example.com"), meta())
        .await
        .unwrap_err();
    assert!(matches!(err, VoteError::Closed));

    open_voting(&db).await;
    let err = service
        .cast(ballot(&nomination, "not-an-email"), meta())
        .await
        .unwrap_err();
    let VoteError::Validation(errors) = err else {
        panic!("expected validation error, got {err:?}");
    };
    assert_eq!(errors.get("voter.email"), Some("Enter a valid email address"));
}

#[tokio::test]
async fn future_voting_start_keeps_voting_closed() {
    let (db, _dir) = create_test_db().await;
    open_voting(&db).await;
    let start = (chrono::Utc::now() + chrono::Duration::days(3)).to_rfc3339();
    AppSetting::set(&db.pool, SettingKey::VotingStartDate, &start)
        .await
        .unwrap();
    let (_, nomination) = seed_approved_person(&db, "jane@example.com").await;
    let service = VotingService::new(db.pool.clone(), BASE_URL);

    let err = service
        .cast(ballot(&nomination, "vic@example.com"), meta())
        .await
        .unwrap_err();
    assert!(matches!(err, VoteError::Closed));
}
