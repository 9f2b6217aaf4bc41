//! Product questionnaires.
//!
//! Each insurance product carries an ordered list of questions grouped into
//! named sections. The owner of an RFQ answers them while the RFQ is still a
//! draft; the answers travel with the RFQ to the invited bidders.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::Error;

/// Section for questions that do not name one.
pub const DEFAULT_SECTION: &str = "General";

// ─── Questions ───────────────────────────────────────────────────────────────

/// How a question is rendered and what shape its answer takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
  #[default]
  Text,
  Textarea,
  Number,
  Date,
  Select,
  Multiselect,
  Radio,
  Checkbox,
  File,
}

impl FieldType {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Text => "text",
      Self::Textarea => "textarea",
      Self::Number => "number",
      Self::Date => "date",
      Self::Select => "select",
      Self::Multiselect => "multiselect",
      Self::Radio => "radio",
      Self::Checkbox => "checkbox",
      Self::File => "file",
    }
  }

  /// Whether answers are picked from the question's options.
  pub fn has_choices(self) -> bool {
    matches!(self, Self::Select | Self::Multiselect | Self::Radio)
  }
}

impl fmt::Display for FieldType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for FieldType {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Ok(match s {
      "text" => Self::Text,
      "textarea" => Self::Textarea,
      "number" => Self::Number,
      "date" => Self::Date,
      "select" => Self::Select,
      "multiselect" => Self::Multiselect,
      "radio" => Self::Radio,
      "checkbox" => Self::Checkbox,
      "file" => Self::File,
      other => return Err(Error::Validation(format!("unknown field type: {other:?}"))),
    })
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
  pub question_id:   Uuid,
  pub product_id:    Uuid,
  pub section:       String,
  /// Position within the product; questions are shown in ascending order.
  pub order_index:   u32,
  pub question_text: String,
  pub field_type:    FieldType,
  /// Choices for select, multiselect and radio questions.
  pub options:       Vec<String>,
  pub guidance_text: Option<String>,
  pub placeholder:   Option<String>,
  pub required:      bool,
}

/// Input to [`crate::store::ProcurementStore::add_question`].
#[derive(Debug, Clone, Default)]
pub struct NewQuestion {
  pub product_id:    Uuid,
  pub section:       Option<String>,
  /// Appended after the product's last question when absent.
  pub order_index:   Option<u32>,
  pub question_text: String,
  pub field_type:    FieldType,
  pub options:       Vec<String>,
  pub guidance_text: Option<String>,
  pub placeholder:   Option<String>,
  pub required:      bool,
}

impl NewQuestion {
  /// Trim text fields, default the section and check that choice questions
  /// have something to choose from.
  pub fn normalized(mut self) -> Result<Self, Error> {
    self.question_text = self.question_text.trim().to_owned();
    if self.question_text.is_empty() {
      return Err(Error::Validation("question text is required".into()));
    }

    self.section = Some(
      self
        .section
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(DEFAULT_SECTION)
        .to_owned(),
    );
    self.guidance_text = non_blank(self.guidance_text);
    self.placeholder = non_blank(self.placeholder);

    self.options = self
      .options
      .iter()
      .map(|o| o.trim().to_owned())
      .filter(|o| !o.is_empty())
      .collect();
    if self.field_type.has_choices() && self.options.is_empty() {
      return Err(Error::Validation(format!(
        "a {} question needs at least one option",
        self.field_type
      )));
    }
    Ok(self)
  }
}

fn non_blank(s: Option<String>) -> Option<String> {
  s.map(|s| s.trim().to_owned()).filter(|s| !s.is_empty())
}

// ─── Grouping ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct Section {
  pub name:           String,
  pub index:          usize,
  pub question_count: usize,
  pub questions:      Vec<Question>,
}

/// A product's questions as the RFQ form presents them.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Questionnaire {
  pub sections:        Vec<Section>,
  pub total_questions: usize,
  pub total_sections:  usize,
}

impl Questionnaire {
  /// Group questions, already ordered by section then position, into
  /// sections in the order they first appear.
  pub fn group(questions: Vec<Question>) -> Self {
    let total_questions = questions.len();
    let mut sections: Vec<Section> = vec![];

    for question in questions {
      match sections.last_mut() {
        Some(section) if section.name == question.section => section.questions.push(question),
        _ => sections.push(Section {
          name:           question.section.clone(),
          index:          sections.len(),
          question_count: 0,
          questions:      vec![question],
        }),
      }
    }
    for section in &mut sections {
      section.question_count = section.questions.len();
    }

    Self { total_sections: sections.len(), total_questions, sections }
  }
}

// ─── Answers ─────────────────────────────────────────────────────────────────

/// The owner's answer to one question on one RFQ.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
  pub rfq_id:      Uuid,
  pub question_id: Uuid,
  /// Free-form JSON: a string, number, boolean or list of chosen options.
  pub value:       Option<Value>,
  pub file_url:    Option<String>,
  pub updated_at:  DateTime<Utc>,
}

/// Body of an answer save. Saving again replaces the previous answer.
#[derive(Debug, Clone, Deserialize)]
pub struct AnswerInput {
  pub question_id: Uuid,
  #[serde(default)]
  pub value:       Option<Value>,
  #[serde(default)]
  pub file_url:    Option<String>,
}

impl AnswerInput {
  /// Blank strings, empty lists and JSON `null` all clear the answer.
  pub fn normalized(mut self) -> Self {
    self.value = self.value.filter(|v| match v {
      Value::Null => false,
      Value::String(s) => !s.trim().is_empty(),
      Value::Array(items) => !items.is_empty(),
      _ => true,
    });
    self.file_url = non_blank(self.file_url);
    self
  }
}
