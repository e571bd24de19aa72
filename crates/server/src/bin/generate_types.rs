//! Write the TypeScript declarations of every API type.
//!
//! Usage:
//!   cargo run --bin generate_types              # writes shared/types.ts
//!   cargo run --bin generate_types -- --check   # fails if shared/types.ts is stale

use std::{env, fs, path::PathBuf};

use anyhow::{Context, bail};
use ts_rs::TS;

fn declarations() -> Vec<String> {
    use db::models::{
        category::{CategoryGroup, NomineeType, Subcategory},
        nomination::{AdminNomination, Nomination, NominationFilter, NominationState, PublicNominee},
        nominator::{Nominator, UpsertNominator},
        nominee::{CreateCompanyNominee, CreateNominee, CreatePersonNominee, Nominee, UpdateNominee},
        outbox::{OutboxEntry, OutboxEventType, OutboxStats, OutboxStatus, SyncTarget},
        setting::{AppSetting, CampaignStatus, SettingKey},
        stats::{AdminStats, CampaignStats, NominationCounts, SubcategoryStats, TargetOutboxStats},
        voter::UpsertVoter,
    };
    use server::routes::{
        admin::{
            outbox::{OutboxQuery, RequeueResult},
            settings::UpdateSetting,
        },
        nominees::{NomineeProfile, NomineeQuery, Podium},
    };
    use services::services::{
        contact::{ContactPayload, ContactRole},
        nomination::{
            NominationDetail, NominationReceipt, ReviewDecision, ReviewNomination, SubmitNomination,
        },
        sync::worker::SyncReport,
        validation::ValidationErrors,
        voting::{CastVote, VoteReceipt},
    };

    vec![
        utils::response::ApiResponse::<(), ()>::decl(),
        NomineeType::decl(),
        Subcategory::decl(),
        CategoryGroup::decl(),
        NominationState::decl(),
        Nomination::decl(),
        PublicNominee::decl(),
        AdminNomination::decl(),
        NominationFilter::decl(),
        Nominator::decl(),
        UpsertNominator::decl(),
        Nominee::decl(),
        CreatePersonNominee::decl(),
        CreateCompanyNominee::decl(),
        CreateNominee::decl(),
        UpdateNominee::decl(),
        UpsertVoter::decl(),
        SyncTarget::decl(),
        OutboxStatus::decl(),
        OutboxEventType::decl(),
        OutboxEntry::decl(),
        OutboxStats::decl(),
        AppSetting::decl(),
        SettingKey::decl(),
        CampaignStatus::decl(),
        NominationCounts::decl(),
        SubcategoryStats::decl(),
        CampaignStats::decl(),
        TargetOutboxStats::decl(),
        AdminStats::decl(),
        ValidationErrors::decl(),
        SubmitNomination::decl(),
        NominationReceipt::decl(),
        ReviewDecision::decl(),
        ReviewNomination::decl(),
        NominationDetail::decl(),
        CastVote::decl(),
        VoteReceipt::decl(),
        ContactRole::decl(),
        ContactPayload::decl(),
        SyncReport::decl(),
        NomineeQuery::decl(),
        NomineeProfile::decl(),
        Podium::decl(),
        OutboxQuery::decl(),
        RequeueResult::decl(),
        UpdateSetting::decl(),
    ]
}

fn render() -> String {
    let mut out = String::from(
        "// This file was generated by `cargo run --bin generate_types`. Do not edit.\n\n",
    );
    for decl in declarations() {
        out.push_str("export ");
        out.push_str(&decl);
        out.push_str("\n\n");
    }
    out
}

fn main() -> anyhow::Result<()> {
    let check = env::args().any(|a| a == "--check");
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../shared/types.ts");
    let rendered = render();

    if check {
        let current = fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        if current != rendered {
            bail!("{} is out of date, run generate_types", path.display());
        }
        println!("{} is up to date", path.display());
        return Ok(());
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&path, rendered).with_context(|| format!("failed to write {}", path.display()))?;
    println!("Wrote {}", path.display());
    Ok(())
}
