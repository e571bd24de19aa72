//! The fixed award catalog.
//!
//! Categories are compiled in rather than stored: they change once per
//! campaign and every nomination row references them by string id.

use serde::{Deserialize, Serialize};
use sqlx::Type;
use strum_macros::{Display, EnumString};
use ts_rs::TS;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize, TS, Display, EnumString,
)]
#[sqlx(type_name = "nominee_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum NomineeType {
    Person,
    Company,
}

#[derive(Debug, Clone, Serialize, TS)]
pub struct Subcategory {
    pub id: &'static str,
    pub label: &'static str,
    pub nominee_type: NomineeType,
}

#[derive(Debug, Clone, Serialize, TS)]
pub struct CategoryGroup {
    pub id: &'static str,
    pub title: &'static str,
    pub subcategories: &'static [Subcategory],
}

const fn person(id: &'static str, label: &'static str) -> Subcategory {
    Subcategory {
        id,
        label,
        nominee_type: NomineeType::Person,
    }
}

const fn company(id: &'static str, label: &'static str) -> Subcategory {
    Subcategory {
        id,
        label,
        nominee_type: NomineeType::Company,
    }
}

static CATALOG: &[CategoryGroup] = &[
    CategoryGroup {
        id: "role-specific-excellence",
        title: "Role-Specific Excellence",
        subcategories: &[
            person("top-recruiter", "Top Recruiter"),
            person("top-executive-leader", "Top Executive Leader"),
            person("rising-star-under-30", "Rising Star (Under 30)"),
            person("top-staffing-influencer", "Top Staffing Influencer"),
            person("best-sourcer", "Best Sourcer"),
        ],
    },
    CategoryGroup {
        id: "innovation-technology",
        title: "Innovation & Technology",
        subcategories: &[
            company(
                "top-ai-driven-staffing-platform",
                "Top AI-Driven Staffing Platform",
            ),
            company(
                "top-digital-experience-for-clients",
                "Top Digital Experience for Clients",
            ),
        ],
    },
    CategoryGroup {
        id: "culture-impact",
        title: "Culture & Impact",
        subcategories: &[
            company("top-women-led-staffing-firm", "Top Women-Led Staffing Firm"),
            company("fastest-growing-staffing-firm", "Fastest-Growing Staffing Firm"),
            company(
                "best-diversity-inclusion-initiative",
                "Best Diversity & Inclusion Initiative",
            ),
            company("best-candidate-experience", "Best Candidate Experience"),
        ],
    },
    CategoryGroup {
        id: "growth-performance",
        title: "Growth & Performance",
        subcategories: &[
            company(
                "best-staffing-process-at-scale",
                "Best Staffing Process at Scale",
            ),
            person(
                "thought-leadership-and-influence",
                "Thought Leadership & Influence",
            ),
            company("best-recruitment-agency", "Best Recruitment Agency"),
            company("best-in-house-recruitment-team", "Best In-House Recruitment Team"),
        ],
    },
    CategoryGroup {
        id: "geographic-excellence",
        title: "Geographic Excellence",
        subcategories: &[
            company("top-staffing-company-usa", "Top Staffing Company - USA"),
            person("top-recruiting-leader-usa", "Top Recruiting Leader - USA"),
            company("top-ai-driven-platform-usa", "Top AI-Driven Platform - USA"),
            company("top-staffing-company-europe", "Top Staffing Company - Europe"),
            person(
                "top-recruiting-leader-europe",
                "Top Recruiting Leader - Europe",
            ),
            company(
                "top-ai-driven-platform-europe",
                "Top AI-Driven Platform - Europe",
            ),
            person("top-global-recruiter", "Top Global Recruiter"),
            person("top-global-staffing-leader", "Top Global Staffing Leader"),
        ],
    },
    CategoryGroup {
        id: "special-recognition",
        title: "Special Recognition",
        subcategories: &[person("special-recognition", "Special Recognition")],
    },
];

pub fn all_groups() -> &'static [CategoryGroup] {
    CATALOG
}

pub fn find_subcategory(id: &str) -> Option<&'static Subcategory> {
    CATALOG
        .iter()
        .flat_map(|group| group.subcategories.iter())
        .find(|sub| sub.id == id)
}

/// The group a subcategory belongs to.
pub fn group_of(subcategory_id: &str) -> Option<&'static CategoryGroup> {
    CATALOG
        .iter()
        .find(|group| group.subcategories.iter().any(|sub| sub.id == subcategory_id))
}

pub fn find_group(id: &str) -> Option<&'static CategoryGroup> {
    CATALOG.iter().find(|group| group.id == id)
}

pub fn subcategories_for(nominee_type: NomineeType) -> impl Iterator<Item = &'static Subcategory> {
    CATALOG
        .iter()
        .flat_map(|group| group.subcategories.iter())
        .filter(move |sub| sub.nominee_type == nominee_type)
}
