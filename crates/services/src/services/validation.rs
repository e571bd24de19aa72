//! Server-side checks for the nomination and voting forms.
//!
//! Each validator normalizes the fields it accepts in place (trimmed text,
//! lower-cased emails, `https://` websites) and records every problem it finds
//! under a dotted field name such as `nominee.email`, so the client can show all
//! of them at once.

use std::collections::BTreeMap;

use db::models::{
    nominator::UpsertNominator,
    nominee::{CreateCompanyNominee, CreateNominee, CreatePersonNominee},
    voter::UpsertVoter,
};
use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use thiserror::Error;
use ts_rs::TS;
use url::Url;
use utils::text::normalize_email;

pub const MAX_NAME_LEN: usize = 100;
pub const MAX_PITCH_LEN: usize = 1000;

lazy_static! {
    static ref EMAIL_RE: Regex = Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap();
}

/// Field name to message, returned to the client as `error_data`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, TS, Error)]
#[serde(transparent)]
#[error("{} field(s) failed validation", .0.len())]
pub struct ValidationErrors(pub BTreeMap<String, String>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep the first message recorded for a field.
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_insert_with(|| message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

/// Prefix a bare host with `https://` and check the result is an http(s) URL
/// with a dotted host.
pub fn normalize_website(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };
    let url = Url::parse(&candidate).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    let host = url.host_str()?;
    if !host.contains('.') {
        return None;
    }
    Some(candidate)
}

pub fn is_linkedin_url(raw: &str) -> bool {
    let Ok(url) = Url::parse(raw.trim()) else {
        return false;
    };
    let host_ok = url
        .host_str()
        .map(|h| {
            let h = h.to_ascii_lowercase();
            h == "linkedin.com" || h.ends_with(".linkedin.com")
        })
        .unwrap_or(false);
    matches!(url.scheme(), "http" | "https") && host_ok
}

fn required_text(errors: &mut ValidationErrors, field: &str, value: &mut String, max: usize) {
    *value = value.trim().to_string();
    if value.is_empty() {
        errors.add(field, "Required");
    } else if value.chars().count() > max {
        errors.add(field, format!("Must be at most {max} characters"));
    }
}

/// Trim optional text; blank values become `None`.
fn optional_text(errors: &mut ValidationErrors, field: &str, value: &mut Option<String>, max: usize) {
    let trimmed = value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string);
    if trimmed.as_ref().is_some_and(|v| v.chars().count() > max) {
        errors.add(field, format!("Must be at most {max} characters"));
    }
    *value = trimmed;
}

/// Like `optional_text` but the field must end up present.
fn required_pitch(errors: &mut ValidationErrors, field: &str, value: &mut Option<String>) {
    optional_text(errors, field, value, MAX_PITCH_LEN);
    if value.is_none() {
        errors.add(field, "Required");
    }
}

fn email(errors: &mut ValidationErrors, field: &str, value: &mut String) {
    *value = normalize_email(value);
    if value.is_empty() {
        errors.add(field, "Required");
    } else if !is_valid_email(value) {
        errors.add(field, "Enter a valid email address");
    }
}

fn linkedin(errors: &mut ValidationErrors, field: &str, value: &mut Option<String>) {
    optional_text(errors, field, value, 2048);
    if value.as_deref().is_some_and(|url| !is_linkedin_url(url)) {
        errors.add(field, "Enter a LinkedIn URL");
    }
}

pub fn validate_nominator(errors: &mut ValidationErrors, nominator: &mut UpsertNominator) {
    required_text(errors, "nominator.firstname", &mut nominator.firstname, MAX_NAME_LEN);
    required_text(errors, "nominator.lastname", &mut nominator.lastname, MAX_NAME_LEN);
    email(errors, "nominator.email", &mut nominator.email);
    linkedin(errors, "nominator.linkedin", &mut nominator.linkedin);
    optional_text(errors, "nominator.company", &mut nominator.company, MAX_NAME_LEN);
    optional_text(errors, "nominator.job_title", &mut nominator.job_title, MAX_NAME_LEN);
    optional_text(errors, "nominator.phone", &mut nominator.phone, 40);
    optional_text(errors, "nominator.country", &mut nominator.country, MAX_NAME_LEN);
}

fn validate_person(errors: &mut ValidationErrors, person: &mut CreatePersonNominee) {
    required_text(errors, "nominee.firstname", &mut person.firstname, MAX_NAME_LEN);
    required_text(errors, "nominee.lastname", &mut person.lastname, MAX_NAME_LEN);
    email(errors, "nominee.email", &mut person.email);
    linkedin(errors, "nominee.linkedin", &mut person.linkedin);
    optional_text(errors, "nominee.job_title", &mut person.job_title, MAX_NAME_LEN);
    if person.job_title.is_none() {
        errors.add("nominee.job_title", "Required");
    }
    optional_text(errors, "nominee.company", &mut person.company, MAX_NAME_LEN);
    optional_text(errors, "nominee.country", &mut person.country, MAX_NAME_LEN);
    optional_text(errors, "nominee.headshot_url", &mut person.headshot_url, 2048);
    required_pitch(errors, "nominee.why_me", &mut person.why_me);
}

fn validate_company(errors: &mut ValidationErrors, company: &mut CreateCompanyNominee) {
    required_text(errors, "nominee.name", &mut company.name, MAX_NAME_LEN);
    company.website = company.website.trim().to_string();
    if company.website.is_empty() {
        errors.add("nominee.website", "Required");
    } else {
        match normalize_website(&company.website) {
            Some(url) => company.website = url,
            None => errors.add("nominee.website", "Enter a valid website URL"),
        }
    }
    linkedin(errors, "nominee.linkedin", &mut company.linkedin);
    optional_text(errors, "nominee.country", &mut company.country, MAX_NAME_LEN);
    optional_text(errors, "nominee.size", &mut company.size, MAX_NAME_LEN);
    optional_text(errors, "nominee.industry", &mut company.industry, MAX_NAME_LEN);
    optional_text(errors, "nominee.logo_url", &mut company.logo_url, 2048);
    required_pitch(errors, "nominee.why_us", &mut company.why_us);
}

pub fn validate_nominee(errors: &mut ValidationErrors, nominee: &mut CreateNominee) {
    match nominee {
        CreateNominee::Person(person) => validate_person(errors, person),
        CreateNominee::Company(company) => validate_company(errors, company),
    }
}

/// Validate a whole nomination form, including the no-self-nomination rule.
pub fn validate_nomination(
    nominator: &mut UpsertNominator,
    nominee: &mut CreateNominee,
) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();
    validate_nominator(&mut errors, nominator);
    validate_nominee(&mut errors, nominee);

    if let CreateNominee::Person(person) = nominee {
        if !person.email.is_empty() && person.email == nominator.email {
            errors.add("nominee.email", "You cannot nominate yourself");
        }
    }

    errors.into_result()
}

pub fn validate_voter(voter: &mut UpsertVoter) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();
    required_text(&mut errors, "voter.firstname", &mut voter.firstname, MAX_NAME_LEN);
    required_text(&mut errors, "voter.lastname", &mut voter.lastname, MAX_NAME_LEN);
    email(&mut errors, "voter.email", &mut voter.email);
    linkedin(&mut errors, "voter.linkedin", &mut voter.linkedin);
    optional_text(&mut errors, "voter.company", &mut voter.company, MAX_NAME_LEN);
    optional_text(&mut errors, "voter.job_title", &mut voter.job_title, MAX_NAME_LEN);
    optional_text(&mut errors, "voter.country", &mut voter.country, MAX_NAME_LEN);
    errors.into_result()
}
