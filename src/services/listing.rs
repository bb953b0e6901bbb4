//! In-memory list filtering, search, sort and pagination
//!
//! Every collection endpoint loads the rows visible to the caller and runs
//! them through [`apply`] with the request's [`ListQuery`]. The status
//! filter is exact (case-insensitive); search is a substring match over the
//! fields a type exposes; sorting is stable, so rows with equal keys keep
//! the repository order.

use crate::models::{
    AssignmentRequest, DonationInquiry, ListQuery, PagedResult, Partner, ResearchPaper,
    Researcher, SortOrder, TeamApplication, TeamMember, User,
};
use chrono::{DateTime, Utc};
use std::cmp::Ordering;

/// A comparable sort value
#[derive(Debug, Clone, PartialEq, PartialOrd)]
pub enum SortKey {
    Int(i64),
    Float(f64),
    Text(String),
    Time(Option<DateTime<Utc>>),
}

impl SortKey {
    fn text(value: &str) -> Self {
        SortKey::Text(value.to_lowercase())
    }

    fn time(value: DateTime<Utc>) -> Self {
        SortKey::Time(Some(value))
    }
}

pub trait Listable {
    /// Field used when `order` is given without `sort`
    const DEFAULT_SORT: &'static str = "created_at";

    /// Strings matched against `q`
    fn search_fields(&self) -> Vec<&str>;

    /// Value compared against `status`; `None` never matches a filter
    fn status_key(&self) -> Option<&str>;

    /// Sort value for a named field; `None` for unknown fields
    fn sort_key(&self, field: &str) -> Option<SortKey>;
}

/// Filter, sort and slice `items` according to `query`
pub fn apply<T: Listable>(items: Vec<T>, query: &ListQuery) -> PagedResult<T> {
    let status = query.status_filter();
    let term = query.search_term();

    let mut matching: Vec<T> = items
        .into_iter()
        .filter(|item| match status {
            Some(wanted) => item
                .status_key()
                .is_some_and(|s| s.eq_ignore_ascii_case(wanted)),
            None => true,
        })
        .filter(|item| match &term {
            Some(term) => item
                .search_fields()
                .iter()
                .any(|field| field.to_lowercase().contains(term.as_str())),
            None => true,
        })
        .collect();

    let sort_field = query
        .sort
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .or_else(|| query.order.map(|_| T::DEFAULT_SORT));
    if let Some(field) = sort_field {
        let order = query.order.unwrap_or_default();
        matching.sort_by(|a, b| {
            let ordering = compare_keys(a.sort_key(field), b.sort_key(field));
            match order {
                SortOrder::Asc => ordering,
                SortOrder::Desc => ordering.reverse(),
            }
        });
    }

    let params = query.params();
    let total = matching.len() as i64;
    let page_items = matching
        .into_iter()
        .skip(params.offset())
        .take(params.per_page as usize)
        .collect();

    PagedResult::new(page_items, total, &params)
}

fn compare_keys(a: Option<SortKey>, b: Option<SortKey>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
        _ => Ordering::Equal,
    }
}

// ============================================================================
// Listable implementations
// ============================================================================

impl Listable for User {
    fn search_fields(&self) -> Vec<&str> {
        let mut fields = vec![self.email.as_str(), self.full_name.as_str()];
        fields.extend(self.phone.as_deref());
        fields
    }

    fn status_key(&self) -> Option<&str> {
        Some(self.status.as_str())
    }

    fn sort_key(&self, field: &str) -> Option<SortKey> {
        match field {
            "created_at" => Some(SortKey::time(self.created_at)),
            "updated_at" => Some(SortKey::time(self.updated_at)),
            "full_name" | "name" => Some(SortKey::text(&self.full_name)),
            "email" => Some(SortKey::text(&self.email)),
            "role" => Some(SortKey::text(self.role.as_str())),
            _ => None,
        }
    }
}

impl Listable for AssignmentRequest {
    fn search_fields(&self) -> Vec<&str> {
        let mut fields = vec![
            self.title.as_str(),
            self.subject.as_str(),
            self.description.as_str(),
        ];
        fields.extend(self.doctor_name.as_deref());
        fields.extend(self.client_name.as_deref());
        fields
    }

    fn status_key(&self) -> Option<&str> {
        Some(self.status.as_str())
    }

    fn sort_key(&self, field: &str) -> Option<SortKey> {
        match field {
            "created_at" => Some(SortKey::time(self.created_at)),
            "updated_at" => Some(SortKey::time(self.updated_at)),
            "deadline" => Some(SortKey::Time(self.deadline)),
            "title" => Some(SortKey::text(&self.title)),
            "subject" => Some(SortKey::text(&self.subject)),
            "status" => Some(SortKey::text(self.status.as_str())),
            "price" | "final_price" => Some(SortKey::Int(
                self.final_price.or(self.proposed_price).unwrap_or_default().cents(),
            )),
            _ => None,
        }
    }
}

impl Listable for ResearchPaper {
    fn search_fields(&self) -> Vec<&str> {
        let mut fields = vec![
            self.title.as_str(),
            self.summary.as_str(),
            self.category.as_str(),
        ];
        fields.extend(self.researcher_name.as_deref());
        fields
    }

    fn status_key(&self) -> Option<&str> {
        Some(self.status.as_str())
    }

    fn sort_key(&self, field: &str) -> Option<SortKey> {
        match field {
            "created_at" => Some(SortKey::time(self.created_at)),
            "updated_at" => Some(SortKey::time(self.updated_at)),
            "published_at" => Some(SortKey::Time(self.published_at)),
            "title" => Some(SortKey::text(&self.title)),
            "views" => Some(SortKey::Int(self.views)),
            "likes" => Some(SortKey::Int(self.likes)),
            _ => None,
        }
    }
}

impl Listable for Partner {
    fn search_fields(&self) -> Vec<&str> {
        let mut fields = vec![
            self.organization_name.as_str(),
            self.contact_name.as_str(),
            self.email.as_str(),
            self.partnership_type.as_str(),
        ];
        fields.extend(self.description.as_deref());
        fields
    }

    fn status_key(&self) -> Option<&str> {
        Some(self.status.as_str())
    }

    fn sort_key(&self, field: &str) -> Option<SortKey> {
        match field {
            "created_at" => Some(SortKey::time(self.created_at)),
            "updated_at" => Some(SortKey::time(self.updated_at)),
            "organization_name" | "name" => Some(SortKey::text(&self.organization_name)),
            "partnership_type" => Some(SortKey::text(&self.partnership_type)),
            _ => None,
        }
    }
}

impl Listable for TeamApplication {
    fn search_fields(&self) -> Vec<&str> {
        vec![
            self.full_name.as_str(),
            self.email.as_str(),
            self.position.as_str(),
        ]
    }

    fn status_key(&self) -> Option<&str> {
        Some(self.status.as_str())
    }

    fn sort_key(&self, field: &str) -> Option<SortKey> {
        match field {
            "created_at" => Some(SortKey::time(self.created_at)),
            "full_name" | "name" => Some(SortKey::text(&self.full_name)),
            "position" => Some(SortKey::text(&self.position)),
            _ => None,
        }
    }
}

impl Listable for TeamMember {
    const DEFAULT_SORT: &'static str = "display_order";

    fn search_fields(&self) -> Vec<&str> {
        let mut fields = vec![self.name.as_str(), self.position.as_str()];
        fields.extend(self.bio.as_deref());
        fields
    }

    fn status_key(&self) -> Option<&str> {
        Some(if self.is_active { "active" } else { "inactive" })
    }

    fn sort_key(&self, field: &str) -> Option<SortKey> {
        match field {
            "display_order" => Some(SortKey::Int(self.display_order as i64)),
            "name" => Some(SortKey::text(&self.name)),
            "position" => Some(SortKey::text(&self.position)),
            "created_at" => Some(SortKey::time(self.created_at)),
            _ => None,
        }
    }
}

impl Listable for DonationInquiry {
    fn search_fields(&self) -> Vec<&str> {
        let mut fields = vec![self.full_name.as_str(), self.email.as_str()];
        fields.extend(self.message.as_deref());
        fields
    }

    fn status_key(&self) -> Option<&str> {
        Some(self.status.as_str())
    }

    fn sort_key(&self, field: &str) -> Option<SortKey> {
        match field {
            "created_at" => Some(SortKey::time(self.created_at)),
            "amount" => Some(SortKey::Int(self.amount.unwrap_or_default().cents())),
            "full_name" | "name" => Some(SortKey::text(&self.full_name)),
            _ => None,
        }
    }
}

impl Listable for Researcher {
    const DEFAULT_SORT: &'static str = "rating";

    fn search_fields(&self) -> Vec<&str> {
        let mut fields = vec![self.full_name.as_str()];
        fields.extend(self.profile.specialization.as_deref());
        fields.extend(self.profile.bio.as_deref());
        fields
    }

    fn status_key(&self) -> Option<&str> {
        None
    }

    fn sort_key(&self, field: &str) -> Option<SortKey> {
        match field {
            "rating" | "average_rating" => Some(SortKey::Float(self.profile.average_rating)),
            "experience" | "years_of_experience" => {
                Some(SortKey::Int(self.profile.years_of_experience as i64))
            }
            "papers" | "published_papers" => Some(SortKey::Int(self.published_papers)),
            "full_name" | "name" => Some(SortKey::text(&self.full_name)),
            _ => None,
        }
    }
}
