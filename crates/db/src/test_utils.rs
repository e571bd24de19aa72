//! Test utilities for database tests.
//!
//! Shared by this crate's unit tests and, through the `test-utils` feature, by
//! the services and server test suites.

use tempfile::TempDir;
use uuid::Uuid;

use crate::{
    DBService,
    models::{
        category::NomineeType,
        nomination::{CreateNomination, Nomination, NominationState},
        nominator::{Nominator, UpsertNominator},
        nominee::{CreateCompanyNominee, CreateNominee, CreatePersonNominee, Nominee},
    },
};

/// Open a fresh database in a temp dir with migrations applied.
///
/// The returned `TempDir` must outlive the service.
pub async fn create_test_db() -> (DBService, TempDir) {
    let temp_dir = TempDir::new().expect("Failed to create test temp dir");
    let db = DBService::connect(&temp_dir.path().join("test.sqlite"))
        .await
        .expect("Failed to open test database");
    (db, temp_dir)
}

pub async fn seed_nominator(db: &DBService, email: &str) -> Nominator {
    Nominator::upsert_by_email(
        &db.pool,
        &UpsertNominator {
            email: email.to_string(),
            firstname: "Nora".to_string(),
            lastname: "Nominator".to_string(),
            ..Default::default()
        },
    )
    .await
    .expect("Failed to seed nominator")
}

pub fn person(firstname: &str, lastname: &str, email: &str) -> CreateNominee {
    CreateNominee::Person(CreatePersonNominee {
        firstname: firstname.to_string(),
        lastname: lastname.to_string(),
        email: email.to_string(),
        job_title: Some("Head of Talent".to_string()),
        company: Some("Acme Staffing".to_string()),
        country: Some("US".to_string()),
        why_me: Some("Placed 400 engineers last year".to_string()),
        ..Default::default()
    })
}

pub fn company(name: &str, website: &str) -> CreateNominee {
    CreateNominee::Company(CreateCompanyNominee {
        name: name.to_string(),
        website: website.to_string(),
        country: Some("UK".to_string()),
        why_us: Some("Fastest growing agency in the region".to_string()),
        ..Default::default()
    })
}

pub async fn seed_nominee(db: &DBService, data: &CreateNominee) -> Nominee {
    let mut conn = db.pool.acquire().await.expect("Failed to acquire connection");
    Nominee::create(&mut conn, data)
        .await
        .expect("Failed to seed nominee")
}

/// Create a nomination for `nominee` in `subcategory_id` and move it to `state`.
pub async fn seed_nomination(
    db: &DBService,
    nominator_id: Uuid,
    nominee: &Nominee,
    subcategory_id: &str,
    state: NominationState,
) -> Nomination {
    let group = crate::models::category::group_of(subcategory_id)
        .map(|g| g.id.to_string())
        .unwrap_or_else(|| "special-recognition".to_string());
    let nomination = Nomination::create(
        &db.pool,
        &CreateNomination {
            nominator_id,
            nominee_id: nominee.id,
            category_group_id: group,
            subcategory_id: subcategory_id.to_string(),
        },
    )
    .await
    .expect("Failed to seed nomination");

    if state == NominationState::Submitted {
        return nomination;
    }
    let reason = (state == NominationState::Rejected).then_some("Not eligible");
    Nomination::set_state(&db.pool, nomination.id, state, Some("admin"), reason)
        .await
        .expect("Failed to set nomination state")
        .expect("Seeded nomination vanished")
}

/// An approved person nomination in `top-recruiter`, ready to receive votes.
pub async fn seed_approved_person(db: &DBService, email: &str) -> (Nominee, Nomination) {
    let nominator = seed_nominator(db, "nominator@example.com").await;
    let nominee = seed_nominee(db, &person("Jane", "Doe", email)).await;
    assert_eq!(nominee.nominee_type, NomineeType::Person);
    let nomination = seed_nomination(
        db,
        nominator.id,
        &nominee,
        "top-recruiter",
        NominationState::Approved,
    )
    .await;
    (nominee, nomination)
}
