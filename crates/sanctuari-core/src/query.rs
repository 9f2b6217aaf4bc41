//! Read-side query types shared by the store and the HTTP layer.
//!
//! Filters compose with AND. A filter that is absent, blank, or set to the
//! sentinel `"all"` does not constrain its field. Text searches are
//! case-insensitive substring matches; whitespace-only searches are absent.

use std::str::FromStr;

use serde::Deserialize;
use uuid::Uuid;

use crate::{Error, directory::MemberType, rfq::RfqStatus};

/// Sentinel meaning "no constraint on this field".
pub const ALL: &str = "all";

pub const DEFAULT_LIMIT: usize = 100;
pub const MAX_LIMIT: usize = 500;

/// Parse a typed filter value, treating absent, blank and `"all"` as `None`.
pub fn selector<T>(raw: Option<&str>) -> Result<Option<T>, Error>
where
  T: FromStr<Err = Error>,
{
  match raw.map(str::trim) {
    None | Some("") => Ok(None),
    Some(v) if v.eq_ignore_ascii_case(ALL) => Ok(None),
    Some(v) => v.parse().map(Some),
  }
}

/// Like [`selector`] for free-form tags such as categories, which are stored
/// lowercased.
pub fn tag_selector(raw: Option<&str>) -> Option<String> {
  match raw.map(str::trim) {
    None | Some("") => None,
    Some(v) if v.eq_ignore_ascii_case(ALL) => None,
    Some(v) => Some(v.to_lowercase()),
  }
}

/// Trim a search string; blank means absent.
pub fn search_text(raw: Option<&str>) -> Option<String> {
  raw
    .map(str::trim)
    .filter(|s| !s.is_empty())
    .map(str::to_owned)
}

/// Clamp caller-supplied paging to sane bounds.
pub fn page(limit: Option<usize>, offset: Option<usize>) -> (usize, usize) {
  (limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT), offset.unwrap_or(0))
}

// ─── Ordering ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
  #[default]
  Asc,
  Desc,
}

impl SortOrder {
  pub fn as_sql(self) -> &'static str {
    match self {
      Self::Asc => "ASC",
      Self::Desc => "DESC",
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberSort {
  /// Primary label.
  #[default]
  CompanyName,
  CreatedAt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RfqSort {
  /// Primary label.
  #[default]
  Title,
  CreatedAt,
  Deadline,
  Number,
}

// ─── Queries ─────────────────────────────────────────────────────────────────

/// Parameters for [`crate::store::ProcurementStore::list_members`].
#[derive(Debug, Clone, Default)]
pub struct MemberQuery {
  pub member_type:      Option<MemberType>,
  /// Members must carry this category tag.
  pub category:         Option<String>,
  /// Substring of the company name.
  pub search:           Option<String>,
  pub include_inactive: bool,
  pub sort:             MemberSort,
  pub order:            SortOrder,
  pub limit:            Option<usize>,
  pub offset:           Option<usize>,
}

/// Parameters for [`crate::store::ProcurementStore::list_rfqs`].
#[derive(Debug, Clone, Default)]
pub struct RfqQuery {
  pub owner_id:         Option<Uuid>,
  pub status:           Option<RfqStatus>,
  pub product_id:       Option<Uuid>,
  /// Substring of the title.
  pub search:           Option<String>,
  /// Also return cancelled RFQs.
  pub include_inactive: bool,
  pub sort:             RfqSort,
  pub order:            SortOrder,
  pub limit:            Option<usize>,
  pub offset:           Option<usize>,
}

/// Parameters for [`crate::store::ProcurementStore::list_products`]. Results
/// are always ordered by product name.
#[derive(Debug, Clone, Default)]
pub struct ProductQuery {
  pub category:         Option<String>,
  pub search:           Option<String>,
  pub include_inactive: bool,
  pub limit:            Option<usize>,
  pub offset:           Option<usize>,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn all_and_blank_mean_unconstrained() {
    assert_eq!(selector::<MemberType>(None).unwrap(), None);
    assert_eq!(selector::<MemberType>(Some("")).unwrap(), None);
    assert_eq!(selector::<MemberType>(Some("all")).unwrap(), None);
    assert_eq!(selector::<MemberType>(Some("ALL")).unwrap(), None);
    assert_eq!(
      selector::<MemberType>(Some("insurer")).unwrap(),
      Some(MemberType::Insurer)
    );
    assert!(selector::<MemberType>(Some("reinsurer")).is_err());
  }

  #[test]
  fn status_selector() {
    assert_eq!(
      selector::<RfqStatus>(Some(" bidding ")).unwrap(),
      Some(RfqStatus::Bidding)
    );
  }

  #[test]
  fn tags_are_lowercased() {
    assert_eq!(tag_selector(Some(" Cyber ")), Some("cyber".into()));
    assert_eq!(tag_selector(Some("all")), None);
    assert_eq!(tag_selector(Some("  ")), None);
  }

  #[test]
  fn whitespace_search_is_absent() {
    assert_eq!(search_text(Some("   ")), None);
    assert_eq!(search_text(Some(" acme ")), Some("acme".into()));
    assert_eq!(search_text(None), None);
  }

  #[test]
  fn paging_is_clamped() {
    assert_eq!(page(None, None), (DEFAULT_LIMIT, 0));
    assert_eq!(page(Some(0), Some(5)), (1, 5));
    assert_eq!(page(Some(10_000), None), (MAX_LIMIT, 0));
  }
}
