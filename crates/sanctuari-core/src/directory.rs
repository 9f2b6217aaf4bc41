//! The platform directory: insurers, brokers and the insurance products
//! customers can request quotes for. Both are managed by the platform
//! operator.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Error;

// ─── Network members ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberType {
  Insurer,
  Broker,
}

impl MemberType {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Insurer => "insurer",
      Self::Broker => "broker",
    }
  }
}

impl fmt::Display for MemberType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for MemberType {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "insurer" => Ok(Self::Insurer),
      "broker" => Ok(Self::Broker),
      other => Err(Error::Validation(format!("unknown member type: {other:?}"))),
    }
  }
}

/// An insurer or broker listed in the directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkMember {
  pub member_id:     Uuid,
  pub company_name:  String,
  pub member_type:   MemberType,
  /// Lines of business, e.g. `["cyber", "marine"]`.
  pub categories:    Vec<String>,
  pub contact_email: String,
  pub is_active:     bool,
  pub created_at:    DateTime<Utc>,
}

/// Input to [`crate::store::ProcurementStore::add_member`].
#[derive(Debug, Clone)]
pub struct NewMember {
  pub company_name:  String,
  pub member_type:   MemberType,
  pub categories:    Vec<String>,
  pub contact_email: String,
}

impl NewMember {
  /// Trim and lowercase categories, drop blanks and duplicates.
  pub fn normalized(mut self) -> Result<Self, Error> {
    self.company_name = self.company_name.trim().to_owned();
    if self.company_name.is_empty() {
      return Err(Error::Validation("company name is required".into()));
    }
    if !self.contact_email.contains('@') {
      return Err(Error::Validation(format!(
        "invalid contact email: {:?}",
        self.contact_email
      )));
    }

    let mut categories: Vec<String> = self
      .categories
      .iter()
      .map(|c| c.trim().to_lowercase())
      .filter(|c| !c.is_empty())
      .collect();
    categories.sort();
    categories.dedup();
    if categories.is_empty() {
      return Err(Error::Validation("at least one category is required".into()));
    }
    self.categories = categories;
    Ok(self)
  }
}

// ─── Insurance products ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsuranceProduct {
  pub product_id:  Uuid,
  pub name:        String,
  pub category:    String,
  pub description: Option<String>,
  pub is_active:   bool,
  pub created_at:  DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewProduct {
  pub name:        String,
  pub category:    String,
  pub description: Option<String>,
}

impl NewProduct {
  pub fn normalized(mut self) -> Result<Self, Error> {
    self.name = self.name.trim().to_owned();
    self.category = self.category.trim().to_lowercase();
    if self.name.is_empty() || self.category.is_empty() {
      return Err(Error::Validation("product name and category are required".into()));
    }
    Ok(self)
  }
}
