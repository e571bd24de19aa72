//! The contact record carried by outbox rows.
//!
//! Workflows build a [`ContactPayload`] inside their transaction and store it
//! as JSON; the outbox worker decodes it and pushes it to HubSpot or Loops.

use db::models::{
    category::find_subcategory, nomination::Nomination, nominator::Nominator, nominee::Nominee,
    voter::Voter,
};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use ts_rs::TS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ContactRole {
    Nominator,
    Nominee,
    Voter,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
pub struct ContactPayload {
    pub email: String,
    pub firstname: Option<String>,
    pub lastname: Option<String>,
    pub company: Option<String>,
    pub job_title: Option<String>,
    pub phone: Option<String>,
    pub country: Option<String>,
    pub linkedin: Option<String>,
    pub role: ContactRole,
    pub campaign_year: String,
    pub subcategory_id: Option<String>,
    /// Human label of `subcategory_id`
    pub category: Option<String>,
    /// Public page of the nominee this contact relates to
    pub live_url: Option<String>,
}

/// Public page of a nominee, `{public_base_url}/nominee/{slug}`.
pub fn nominee_page_url(public_base_url: &str, slug: &str) -> String {
    format!("{}/nominee/{}", public_base_url.trim_end_matches('/'), slug)
}

fn category_label(subcategory_id: &str) -> Option<String> {
    find_subcategory(subcategory_id).map(|s| s.label.to_string())
}

impl ContactPayload {
    pub fn for_nominator(nominator: &Nominator, nomination: &Nomination, campaign_year: &str) -> Self {
        Self {
            email: nominator.email.clone(),
            firstname: Some(nominator.firstname.clone()),
            lastname: Some(nominator.lastname.clone()),
            company: nominator.company.clone(),
            job_title: nominator.job_title.clone(),
            phone: nominator.phone.clone(),
            country: nominator.country.clone(),
            linkedin: nominator.linkedin.clone(),
            role: ContactRole::Nominator,
            campaign_year: campaign_year.to_string(),
            subcategory_id: Some(nomination.subcategory_id.clone()),
            category: category_label(&nomination.subcategory_id),
            live_url: None,
        }
    }

    /// Person nominees are contacted directly. Company nominees have no
    /// contact email, so `None` is returned for them.
    pub fn for_nominee(
        nominee: &Nominee,
        nomination: &Nomination,
        campaign_year: &str,
        live_url: String,
    ) -> Option<Self> {
        let email = nominee.contact_email()?.to_string();
        Some(Self {
            email,
            firstname: nominee.firstname.clone(),
            lastname: nominee.lastname.clone(),
            company: nominee.person_company.clone(),
            job_title: nominee.job_title.clone(),
            phone: None,
            country: nominee.person_country.clone(),
            linkedin: nominee.person_linkedin.clone(),
            role: ContactRole::Nominee,
            campaign_year: campaign_year.to_string(),
            subcategory_id: Some(nomination.subcategory_id.clone()),
            category: category_label(&nomination.subcategory_id),
            live_url: Some(live_url),
        })
    }

    pub fn for_voter(
        voter: &Voter,
        nomination: &Nomination,
        campaign_year: &str,
        live_url: Option<String>,
    ) -> Self {
        Self {
            email: voter.email.clone(),
            firstname: Some(voter.firstname.clone()),
            lastname: Some(voter.lastname.clone()),
            company: voter.company.clone(),
            job_title: voter.job_title.clone(),
            phone: None,
            country: voter.country.clone(),
            linkedin: voter.linkedin.clone(),
            role: ContactRole::Voter,
            campaign_year: campaign_year.to_string(),
            subcategory_id: Some(nomination.subcategory_id.clone()),
            category: category_label(&nomination.subcategory_id),
            live_url,
        }
    }
}
