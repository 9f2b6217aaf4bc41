//! [`SqliteStore`] — the SQLite implementation of [`ProcurementStore`].

use std::path::Path;

use chrono::{Datelike as _, Utc};
use rusqlite::{
  Connection, ErrorCode, OptionalExtension as _, Transaction, TransactionBehavior,
  functions::FunctionFlags,
  types::Value,
};
use uuid::Uuid;

use sanctuari_core::{
  bid::Bid,
  directory::{InsuranceProduct, NetworkMember, NewMember, NewProduct},
  ids,
  invitation::{BidInvitation, CompanyInvitation},
  lifecycle::TransitionRecord,
  message::Message,
  query::{self, MemberQuery, MemberSort, ProductQuery, RfqQuery, RfqSort},
  questionnaire::{Answer, AnswerInput, DEFAULT_SECTION, NewQuestion, Question},
  rfq::{NewRfq, PolicyDocument, Rfq, RfqPatch, RfqStatus},
  store::{BidCommit, BidStats, ProcurementStore, WriteOutcome},
};

use crate::{
  Result,
  encode::{
    ANSWER_COLUMNS, BID_COLUMNS, BID_INVITATION_COLUMNS, COMPANY_INVITATION_COLUMNS,
    MEMBER_COLUMNS, MESSAGE_COLUMNS, PRODUCT_COLUMNS, QUESTION_COLUMNS, RFQ_COLUMNS,
    RawAnswer, RawBid, RawBidInvitation, RawCompanyInvitation, RawMember, RawMessage,
    RawProduct, RawQuestion, RawRfq, RawTransition, TRANSITION_COLUMNS, encode_dt,
    encode_uuid,
  },
  error::Error,
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A procurement store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        register_functions(conn)?;
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

/// `fold(text)`: Unicode lowercase, for case-insensitive substring search.
/// SQLite's own `lower()` only folds ASCII.
fn register_functions(conn: &Connection) -> rusqlite::Result<()> {
  conn.create_scalar_function(
    "fold",
    1,
    FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
    |ctx| {
      let text: Option<String> = ctx.get(0)?;
      Ok(text.map(|t| t.to_lowercase()))
    },
  )
}

// ─── Statement helpers ───────────────────────────────────────────────────────
//
// These run on the connection thread inside `call` closures and speak
// `rusqlite` types only.

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
  matches!(
    err,
    rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation
  )
}

/// Run an INSERT, mapping a uniqueness or foreign-key rejection to
/// [`WriteOutcome::Collision`].
fn insert_unique(
  conn: &rusqlite::Connection,
  sql: &str,
  params: impl rusqlite::Params,
) -> rusqlite::Result<WriteOutcome<()>> {
  match conn.execute(sql, params) {
    Ok(_) => Ok(WriteOutcome::Committed(())),
    Err(e) if is_constraint_violation(&e) => Ok(WriteOutcome::Collision),
    Err(e) => Err(e),
  }
}

fn select_rfq(conn: &rusqlite::Connection, id: &str) -> rusqlite::Result<Option<RawRfq>> {
  conn
    .query_row(
      &format!("SELECT {RFQ_COLUMNS} FROM rfqs WHERE rfq_id = ?1"),
      rusqlite::params![id],
      RawRfq::from_row,
    )
    .optional()
}

fn select_bid(conn: &rusqlite::Connection, id: &str) -> rusqlite::Result<Option<RawBid>> {
  conn
    .query_row(
      &format!("SELECT {BID_COLUMNS} FROM bids WHERE bid_id = ?1"),
      rusqlite::params![id],
      RawBid::from_row,
    )
    .optional()
}

/// Compare-and-set an RFQ's status inside `tx` and append the history row.
///
/// Leaving `draft` takes the next number for `year` from `rfq_sequences` in
/// the same transaction, so a draft never ends up past draft without a
/// number. Nothing is committed here; an outcome other than `Committed`
/// means the caller must drop `tx`.
fn apply_transition(
  tx: &Transaction<'_>,
  rfq_id: &str,
  from: RfqStatus,
  to: RfqStatus,
  year: i32,
  now: &str,
) -> rusqlite::Result<WriteOutcome<RawRfq>> {
  let current: Option<String> = tx
    .query_row(
      "SELECT status FROM rfqs WHERE rfq_id = ?1",
      rusqlite::params![rfq_id],
      |r| r.get(0),
    )
    .optional()?;
  if current.as_deref() != Some(from.as_str()) {
    return Ok(WriteOutcome::Stale);
  }

  let number = if from == RfqStatus::Draft {
    let sequence: i64 = tx.query_row(
      "INSERT INTO rfq_sequences (year, last_value) VALUES (?1, 1)
       ON CONFLICT (year) DO UPDATE SET last_value = last_value + 1
       RETURNING last_value",
      rusqlite::params![year],
      |r| r.get(0),
    )?;
    Some(ids::rfq_number(year, sequence as u32))
  } else {
    None
  };

  let updated = tx.execute(
    "UPDATE rfqs
        SET status       = ?3,
            rfq_number   = COALESCE(rfq_number, ?4),
            published_at = CASE WHEN ?3 = 'published' THEN ?5 ELSE published_at END,
            updated_at   = ?5
      WHERE rfq_id = ?1 AND status = ?2",
    rusqlite::params![rfq_id, from.as_str(), to.as_str(), number, now],
  );
  match updated {
    Ok(1) => {}
    Ok(_) => return Ok(WriteOutcome::Stale),
    Err(e) if is_constraint_violation(&e) => return Ok(WriteOutcome::Collision),
    Err(e) => return Err(e),
  }

  tx.execute(
    "INSERT INTO rfq_transitions (transition_id, rfq_id, from_status, to_status, recorded_at)
     VALUES (?1, ?2, ?3, ?4, ?5)",
    rusqlite::params![
      encode_uuid(Uuid::new_v4()),
      rfq_id,
      from.as_str(),
      to.as_str(),
      now,
    ],
  )?;

  match select_rfq(tx, rfq_id)? {
    Some(raw) => Ok(WriteOutcome::Committed(raw)),
    None => Ok(WriteOutcome::Stale),
  }
}

/// Append `LIMIT ? OFFSET ?` for the clamped paging of a query.
fn push_page(
  sql: &mut String,
  params: &mut Vec<Value>,
  limit: Option<usize>,
  offset: Option<usize>,
) {
  let (limit, offset) = query::page(limit, offset);
  sql.push_str(" LIMIT ? OFFSET ?");
  params.push(Value::Integer(limit as i64));
  params.push(Value::Integer(offset as i64));
}

fn where_clause(conds: &[&str]) -> String {
  if conds.is_empty() {
    String::new()
  } else {
    format!("WHERE {}", conds.join(" AND "))
  }
}

// ─── ProcurementStore impl ───────────────────────────────────────────────────

impl ProcurementStore for SqliteStore {
  type Error = Error;

  // ── Directory ─────────────────────────────────────────────────────────

  async fn add_product(&self, input: NewProduct) -> Result<InsuranceProduct> {
    let product = InsuranceProduct {
      product_id:  Uuid::new_v4(),
      name:        input.name,
      category:    input.category,
      description: input.description,
      is_active:   true,
      created_at:  Utc::now(),
    };

    let id_str      = encode_uuid(product.product_id);
    let name        = product.name.clone();
    let category    = product.category.clone();
    let description = product.description.clone();
    let at_str      = encode_dt(product.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO insurance_products
             (product_id, name, category, description, is_active, created_at)
           VALUES (?1, ?2, ?3, ?4, 1, ?5)",
          rusqlite::params![id_str, name, category, description, at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(product)
  }

  async fn get_product(&self, id: Uuid) -> Result<Option<InsuranceProduct>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawProduct> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {PRODUCT_COLUMNS} FROM insurance_products WHERE product_id = ?1"),
              rusqlite::params![id_str],
              RawProduct::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawProduct::into_product).transpose()
  }

  async fn list_products<'a>(&'a self, query: &'a ProductQuery) -> Result<Vec<InsuranceProduct>> {
    let mut conds: Vec<&'static str> = vec![];
    let mut params: Vec<Value> = vec![];

    if !query.include_inactive {
      conds.push("is_active = 1");
    }
    if let Some(category) = query::tag_selector(query.category.as_deref()) {
      conds.push("category = ?");
      params.push(Value::Text(category));
    }
    if let Some(search) = query::search_text(query.search.as_deref()) {
      conds.push("instr(fold(name), fold(?)) > 0");
      params.push(Value::Text(search));
    }

    let mut sql = format!(
      "SELECT {PRODUCT_COLUMNS} FROM insurance_products {}
       ORDER BY name COLLATE NOCASE ASC, product_id ASC",
      where_clause(&conds)
    );
    push_page(&mut sql, &mut params, query.limit, query.offset);

    let raws: Vec<RawProduct> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(params.iter()), RawProduct::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawProduct::into_product).collect()
  }

  async fn add_member(&self, input: NewMember) -> Result<NetworkMember> {
    let member = NetworkMember {
      member_id:     Uuid::new_v4(),
      company_name:  input.company_name,
      member_type:   input.member_type,
      categories:    input.categories,
      contact_email: input.contact_email,
      is_active:     true,
      created_at:    Utc::now(),
    };

    let id_str         = encode_uuid(member.member_id);
    let company_name   = member.company_name.clone();
    let member_type    = member.member_type.as_str();
    let categories_str = serde_json::to_string(&member.categories)?;
    let contact_email  = member.contact_email.clone();
    let at_str         = encode_dt(member.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO network_members
             (member_id, company_name, member_type, categories, contact_email, is_active, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6)",
          rusqlite::params![
            id_str,
            company_name,
            member_type,
            categories_str,
            contact_email,
            at_str,
          ],
        )?;
        Ok(())
      })
      .await?;

    Ok(member)
  }

  async fn get_member(&self, id: Uuid) -> Result<Option<NetworkMember>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawMember> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {MEMBER_COLUMNS} FROM network_members WHERE member_id = ?1"),
              rusqlite::params![id_str],
              RawMember::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawMember::into_member).transpose()
  }

  async fn set_member_active(&self, id: Uuid, active: bool) -> Result<Option<NetworkMember>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawMember> = self
      .conn
      .call(move |conn| {
        conn.execute(
          "UPDATE network_members SET is_active = ?2 WHERE member_id = ?1",
          rusqlite::params![id_str, active],
        )?;
        Ok(
          conn
            .query_row(
              &format!("SELECT {MEMBER_COLUMNS} FROM network_members WHERE member_id = ?1"),
              rusqlite::params![id_str],
              RawMember::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawMember::into_member).transpose()
  }

  async fn list_members<'a>(&'a self, query: &'a MemberQuery) -> Result<Vec<NetworkMember>> {
    let mut conds: Vec<&'static str> = vec![];
    let mut params: Vec<Value> = vec![];

    if !query.include_inactive {
      conds.push("is_active = 1");
    }
    if let Some(member_type) = query.member_type {
      conds.push("member_type = ?");
      params.push(Value::Text(member_type.as_str().to_owned()));
    }
    if let Some(category) = query::tag_selector(query.category.as_deref()) {
      conds.push(
        "EXISTS (SELECT 1 FROM json_each(network_members.categories) AS c WHERE c.value = ?)",
      );
      params.push(Value::Text(category));
    }
    if let Some(search) = query::search_text(query.search.as_deref()) {
      conds.push("instr(fold(company_name), fold(?)) > 0");
      params.push(Value::Text(search));
    }

    let sort = match query.sort {
      MemberSort::CompanyName => "company_name COLLATE NOCASE",
      MemberSort::CreatedAt => "created_at",
    };
    let mut sql = format!(
      "SELECT {MEMBER_COLUMNS} FROM network_members {}
       ORDER BY {sort} {}, member_id ASC",
      where_clause(&conds),
      query.order.as_sql()
    );
    push_page(&mut sql, &mut params, query.limit, query.offset);

    let raws: Vec<RawMember> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(params.iter()), RawMember::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawMember::into_member).collect()
  }

  // ── RFQs ──────────────────────────────────────────────────────────────

  async fn create_rfq(&self, input: NewRfq) -> Result<Rfq> {
    let now = Utc::now();
    let rfq = Rfq {
      rfq_id:          Uuid::new_v4(),
      number:          None,
      owner_id:        input.owner_id,
      company_id:      input.company_id,
      product_id:      input.product_id,
      title:           input.title,
      status:          RfqStatus::Draft,
      deadline:        input.deadline,
      policy_document: None,
      created_at:      now,
      updated_at:      now,
      published_at:    None,
    };

    let id_str       = encode_uuid(rfq.rfq_id);
    let owner_str    = encode_uuid(rfq.owner_id);
    let company_str  = rfq.company_id.map(encode_uuid);
    let product_str  = rfq.product_id.map(encode_uuid);
    let title        = rfq.title.clone();
    let deadline_str = rfq.deadline.map(encode_dt);
    let at_str       = encode_dt(now);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO rfqs (
             rfq_id, owner_id, company_id, product_id, title, status,
             deadline, created_at, updated_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, 'draft', ?6, ?7, ?7)",
          rusqlite::params![
            id_str,
            owner_str,
            company_str,
            product_str,
            title,
            deadline_str,
            at_str,
          ],
        )?;
        Ok(())
      })
      .await?;

    Ok(rfq)
  }

  async fn get_rfq(&self, id: Uuid) -> Result<Option<Rfq>> {
    let id_str = encode_uuid(id);

    let raw = self
      .conn
      .call(move |conn| Ok(select_rfq(conn, &id_str)?))
      .await?;

    raw.map(RawRfq::into_rfq).transpose()
  }

  async fn list_rfqs<'a>(&'a self, query: &'a RfqQuery) -> Result<Vec<Rfq>> {
    let mut conds: Vec<&'static str> = vec![];
    let mut params: Vec<Value> = vec![];

    if let Some(owner_id) = query.owner_id {
      conds.push("owner_id = ?");
      params.push(Value::Text(encode_uuid(owner_id)));
    }
    if let Some(status) = query.status {
      conds.push("status = ?");
      params.push(Value::Text(status.as_str().to_owned()));
    }
    if !query.include_inactive {
      conds.push("status != 'cancelled'");
    }
    if let Some(product_id) = query.product_id {
      conds.push("product_id = ?");
      params.push(Value::Text(encode_uuid(product_id)));
    }
    if let Some(search) = query::search_text(query.search.as_deref()) {
      conds.push("instr(fold(title), fold(?)) > 0");
      params.push(Value::Text(search));
    }

    let sort = match query.sort {
      RfqSort::Title => "title COLLATE NOCASE",
      RfqSort::CreatedAt => "created_at",
      RfqSort::Deadline => "deadline",
      RfqSort::Number => "rfq_number",
    };
    let mut sql = format!(
      "SELECT {RFQ_COLUMNS} FROM rfqs {}
       ORDER BY {sort} {}, rfq_id ASC",
      where_clause(&conds),
      query.order.as_sql()
    );
    push_page(&mut sql, &mut params, query.limit, query.offset);

    let raws: Vec<RawRfq> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(params.iter()), RawRfq::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawRfq::into_rfq).collect()
  }

  async fn update_draft(&self, id: Uuid, patch: RfqPatch) -> Result<WriteOutcome<Rfq>> {
    let id_str       = encode_uuid(id);
    let title        = patch.title;
    let product_str  = patch.product_id.map(encode_uuid);
    let company_str  = patch.company_id.map(encode_uuid);
    let deadline_str = patch.deadline.map(encode_dt);
    let at_str       = encode_dt(Utc::now());

    let outcome = self
      .conn
      .call(move |conn| {
        let updated = conn.execute(
          "UPDATE rfqs
              SET title      = COALESCE(?2, title),
                  product_id = COALESCE(?3, product_id),
                  company_id = COALESCE(?4, company_id),
                  deadline   = COALESCE(?5, deadline),
                  updated_at = ?6
            WHERE rfq_id = ?1 AND status = 'draft'",
          rusqlite::params![id_str, title, product_str, company_str, deadline_str, at_str],
        )?;
        if updated == 0 {
          return Ok(WriteOutcome::Stale);
        }
        Ok(match select_rfq(conn, &id_str)? {
          Some(raw) => WriteOutcome::Committed(raw),
          None => WriteOutcome::Stale,
        })
      })
      .await?;

    outcome.try_map(RawRfq::into_rfq)
  }

  async fn set_policy_document(
    &self,
    id: Uuid,
    document: PolicyDocument,
  ) -> Result<WriteOutcome<Rfq>> {
    let id_str       = encode_uuid(id);
    let document_str = serde_json::to_string(&document)?;
    let at_str       = encode_dt(Utc::now());

    let outcome = self
      .conn
      .call(move |conn| {
        let updated = conn.execute(
          "UPDATE rfqs SET policy_document = ?2, updated_at = ?3
            WHERE rfq_id = ?1 AND status = 'draft'",
          rusqlite::params![id_str, document_str, at_str],
        )?;
        if updated == 0 {
          return Ok(WriteOutcome::Stale);
        }
        Ok(match select_rfq(conn, &id_str)? {
          Some(raw) => WriteOutcome::Committed(raw),
          None => WriteOutcome::Stale,
        })
      })
      .await?;

    outcome.try_map(RawRfq::into_rfq)
  }

  async fn publish_rfq(&self, id: Uuid, year: i32) -> Result<WriteOutcome<Rfq>> {
    self.run_transition(id, RfqStatus::Draft, RfqStatus::Published, year).await
  }

  async fn transition_rfq(
    &self,
    id: Uuid,
    from: RfqStatus,
    to: RfqStatus,
  ) -> Result<WriteOutcome<Rfq>> {
    self.run_transition(id, from, to, Utc::now().year()).await
  }

  async fn rfq_history(&self, id: Uuid) -> Result<Vec<TransitionRecord>> {
    let id_str = encode_uuid(id);

    let raws: Vec<RawTransition> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {TRANSITION_COLUMNS} FROM rfq_transitions
            WHERE rfq_id = ?1 ORDER BY recorded_at ASC, rowid ASC"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![id_str], RawTransition::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawTransition::into_record).collect()
  }

  // ── Questionnaires ────────────────────────────────────────────────────

  async fn add_question(&self, input: NewQuestion) -> Result<Question> {
    let id_str      = encode_uuid(Uuid::new_v4());
    let product_str = encode_uuid(input.product_id);
    let section     = input.section.unwrap_or_else(|| DEFAULT_SECTION.to_owned());
    let order_index = input.order_index;
    let text        = input.question_text;
    let field_type  = input.field_type.as_str();
    let options_str = serde_json::to_string(&input.options)?;
    let guidance    = input.guidance_text;
    let placeholder = input.placeholder;
    let required    = input.required;

    let raw = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO rfq_questions
             (question_id, product_id, section, order_index, question_text, field_type,
              options, guidance_text, placeholder, required)
           VALUES (?1, ?2, ?3,
                   COALESCE(?4, (SELECT COALESCE(MAX(order_index), 0) + 1
                                   FROM rfq_questions WHERE product_id = ?2)),
                   ?5, ?6, ?7, ?8, ?9, ?10)",
          rusqlite::params![
            id_str,
            product_str,
            section,
            order_index,
            text,
            field_type,
            options_str,
            guidance,
            placeholder,
            required,
          ],
        )?;
        Ok(conn.query_row(
          &format!("SELECT {QUESTION_COLUMNS} FROM rfq_questions WHERE question_id = ?1"),
          rusqlite::params![id_str],
          RawQuestion::from_row,
        )?)
      })
      .await?;

    raw.into_question()
  }

  async fn get_question(&self, id: Uuid) -> Result<Option<Question>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawQuestion> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {QUESTION_COLUMNS} FROM rfq_questions WHERE question_id = ?1"),
              rusqlite::params![id_str],
              RawQuestion::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawQuestion::into_question).transpose()
  }

  async fn list_questions(&self, product_id: Uuid) -> Result<Vec<Question>> {
    let product_str = encode_uuid(product_id);

    let raws: Vec<RawQuestion> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {QUESTION_COLUMNS} FROM rfq_questions
            WHERE product_id = ?1 ORDER BY section ASC, order_index ASC, rowid ASC"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![product_str], RawQuestion::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawQuestion::into_question).collect()
  }

  async fn list_answers(&self, rfq_id: Uuid) -> Result<Vec<Answer>> {
    let rfq_str = encode_uuid(rfq_id);

    let raws: Vec<RawAnswer> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {ANSWER_COLUMNS} FROM rfq_answers WHERE rfq_id = ?1 ORDER BY question_id"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![rfq_str], RawAnswer::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawAnswer::into_answer).collect()
  }

  async fn save_answer(&self, rfq_id: Uuid, answer: AnswerInput) -> Result<WriteOutcome<Answer>> {
    let updated_at   = Utc::now();
    let rfq_str      = encode_uuid(rfq_id);
    let question_str = encode_uuid(answer.question_id);
    let value_str    = answer.value.as_ref().map(serde_json::to_string).transpose()?;
    let file_url     = answer.file_url.clone();
    let at_str       = encode_dt(updated_at);

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let touched = tx.execute(
          "UPDATE rfqs SET updated_at = ?3
            WHERE rfq_id = ?1 AND status = 'draft'
              AND product_id = (SELECT product_id FROM rfq_questions WHERE question_id = ?2)",
          rusqlite::params![rfq_str, question_str, at_str],
        )?;
        if touched == 0 {
          return Ok(WriteOutcome::Stale);
        }

        tx.execute(
          "INSERT INTO rfq_answers (rfq_id, question_id, value, file_url, updated_at)
           VALUES (?1, ?2, ?3, ?4, ?5)
           ON CONFLICT (rfq_id, question_id) DO UPDATE
              SET value      = excluded.value,
                  file_url   = excluded.file_url,
                  updated_at = excluded.updated_at",
          rusqlite::params![rfq_str, question_str, value_str, file_url, at_str],
        )?;
        tx.commit()?;
        Ok(WriteOutcome::Committed(()))
      })
      .await?;

    outcome.try_map(|()| {
      Ok::<_, Error>(Answer {
        rfq_id,
        question_id: answer.question_id,
        value: answer.value,
        file_url: answer.file_url,
        updated_at,
      })
    })
  }

  // ── Bid invitations ───────────────────────────────────────────────────

  async fn insert_bid_invitation(
    &self,
    invitation: BidInvitation,
  ) -> Result<WriteOutcome<BidInvitation>> {
    let id_str      = encode_uuid(invitation.invitation_id);
    let rfq_str     = encode_uuid(invitation.rfq_id);
    let token       = invitation.token.clone();
    let member_str  = invitation.member_id.map(encode_uuid);
    let email       = invitation.email.clone();
    let issued_str  = encode_dt(invitation.issued_at);
    let expires_str = invitation.expires_at.map(encode_dt);

    let outcome = self
      .conn
      .call(move |conn| {
        Ok(insert_unique(
          conn,
          "INSERT INTO bid_invitations
             (invitation_id, rfq_id, token, member_id, email, issued_at, expires_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
          rusqlite::params![id_str, rfq_str, token, member_str, email, issued_str, expires_str],
        )?)
      })
      .await?;

    Ok(match outcome {
      WriteOutcome::Committed(()) => WriteOutcome::Committed(invitation),
      WriteOutcome::Stale => WriteOutcome::Stale,
      WriteOutcome::Collision => WriteOutcome::Collision,
    })
  }

  async fn get_bid_invitation(&self, id: Uuid) -> Result<Option<BidInvitation>> {
    let id_str = encode_uuid(id);
    self
      .find_bid_invitation_where("invitation_id = ?1", id_str)
      .await
  }

  async fn find_bid_invitation(&self, token: String) -> Result<Option<BidInvitation>> {
    self.find_bid_invitation_where("token = ?1", token).await
  }

  async fn list_bid_invitations(&self, rfq_id: Uuid) -> Result<Vec<BidInvitation>> {
    let rfq_str = encode_uuid(rfq_id);

    let raws: Vec<RawBidInvitation> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {BID_INVITATION_COLUMNS} FROM bid_invitations
            WHERE rfq_id = ?1 ORDER BY issued_at ASC, rowid ASC"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![rfq_str], RawBidInvitation::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawBidInvitation::into_invitation).collect()
  }

  // ── Bids ──────────────────────────────────────────────────────────────

  async fn commit_bid(&self, commit: BidCommit) -> Result<WriteOutcome<Bid>> {
    let BidCommit { bid, expected_status, transition } = commit;

    let bid_str        = encode_uuid(bid.bid_id);
    let rfq_str        = encode_uuid(bid.rfq_id);
    let invitation_str = encode_uuid(bid.invitation_id);
    let member_str     = bid.member_id.map(encode_uuid);
    let company_name   = bid.bidder_company_name.clone();
    let contact        = bid.bidder_contact_person.clone();
    let email          = bid.bidder_email.clone();
    let phone          = bid.bidder_phone.clone();
    let quote_str      = serde_json::to_string(&bid.quote)?;
    let documents_str  = serde_json::to_string(&bid.documents)?;
    let submitted_str  = encode_dt(bid.submitted_at);
    let year           = bid.submitted_at.year();

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        // Consume the token; an expired or already used one matches nothing.
        let consumed = tx.execute(
          "UPDATE bid_invitations SET consumed_at = ?2
            WHERE invitation_id = ?1
              AND consumed_at IS NULL
              AND (expires_at IS NULL OR expires_at >= ?2)",
          rusqlite::params![invitation_str, submitted_str],
        )?;
        if consumed != 1 {
          return Ok(WriteOutcome::Stale);
        }

        match transition {
          Some(to) => {
            match apply_transition(&tx, &rfq_str, expected_status, to, year, &submitted_str)? {
              WriteOutcome::Committed(_) => {}
              WriteOutcome::Stale => return Ok(WriteOutcome::Stale),
              WriteOutcome::Collision => return Ok(WriteOutcome::Collision),
            }
          }
          None => {
            let status: Option<String> = tx
              .query_row(
                "SELECT status FROM rfqs WHERE rfq_id = ?1",
                rusqlite::params![rfq_str],
                |r| r.get(0),
              )
              .optional()?;
            if status.as_deref() != Some(expected_status.as_str()) {
              return Ok(WriteOutcome::Stale);
            }
          }
        }

        let inserted = insert_unique(
          &tx,
          "INSERT INTO bids (
             bid_id, rfq_id, invitation_id, member_id, bidder_company_name,
             bidder_contact_person, bidder_email, bidder_phone, quote, documents,
             submitted_at, selected
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, 0)",
          rusqlite::params![
            bid_str,
            rfq_str,
            invitation_str,
            member_str,
            company_name,
            contact,
            email,
            phone,
            quote_str,
            documents_str,
            submitted_str,
          ],
        )?;
        if inserted == WriteOutcome::Committed(()) {
          tx.commit()?;
        }
        Ok(inserted)
      })
      .await?;

    Ok(match outcome {
      WriteOutcome::Committed(()) => WriteOutcome::Committed(bid),
      WriteOutcome::Stale => WriteOutcome::Stale,
      WriteOutcome::Collision => WriteOutcome::Collision,
    })
  }

  async fn get_bid(&self, id: Uuid) -> Result<Option<Bid>> {
    let id_str = encode_uuid(id);

    let raw = self
      .conn
      .call(move |conn| Ok(select_bid(conn, &id_str)?))
      .await?;

    raw.map(RawBid::into_bid).transpose()
  }

  async fn list_bids(&self, rfq_id: Uuid) -> Result<Vec<Bid>> {
    let rfq_str = encode_uuid(rfq_id);

    let raws: Vec<RawBid> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {BID_COLUMNS} FROM bids
            WHERE rfq_id = ?1 ORDER BY submitted_at ASC, rowid ASC"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![rfq_str], RawBid::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawBid::into_bid).collect()
  }

  async fn bid_stats(&self, rfq_id: Uuid) -> Result<BidStats> {
    let rfq_str = encode_uuid(rfq_id);

    let (count, has_selected): (i64, bool) = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          "SELECT COUNT(*), COALESCE(MAX(selected), 0) FROM bids WHERE rfq_id = ?1",
          rusqlite::params![rfq_str],
          |r| Ok((r.get(0)?, r.get(1)?)),
        )?)
      })
      .await?;

    Ok(BidStats { count: count as u64, has_selected })
  }

  async fn select_bid(&self, rfq_id: Uuid, bid_id: Uuid) -> Result<WriteOutcome<(Rfq, Bid)>> {
    let rfq_str = encode_uuid(rfq_id);
    let bid_str = encode_uuid(bid_id);
    let now     = Utc::now();
    let now_str = encode_dt(now);
    let year    = now.year();

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let marked = tx.execute(
          "UPDATE bids SET selected = 1
            WHERE bid_id = ?1 AND rfq_id = ?2 AND selected = 0
              AND NOT EXISTS (SELECT 1 FROM bids WHERE rfq_id = ?2 AND selected = 1)",
          rusqlite::params![bid_str, rfq_str],
        );
        match marked {
          Ok(1) => {}
          Ok(_) => return Ok(WriteOutcome::Stale),
          Err(e) if is_constraint_violation(&e) => return Ok(WriteOutcome::Stale),
          Err(e) => return Err(e.into()),
        }

        let rfq = match apply_transition(
          &tx,
          &rfq_str,
          RfqStatus::Reviewing,
          RfqStatus::Completed,
          year,
          &now_str,
        )? {
          WriteOutcome::Committed(raw) => raw,
          WriteOutcome::Stale => return Ok(WriteOutcome::Stale),
          WriteOutcome::Collision => return Ok(WriteOutcome::Collision),
        };
        let Some(bid) = select_bid(&tx, &bid_str)? else {
          return Ok(WriteOutcome::Stale);
        };

        tx.commit()?;
        Ok(WriteOutcome::Committed((rfq, bid)))
      })
      .await?;

    outcome.try_map(|(rfq, bid)| Ok::<_, Error>((rfq.into_rfq()?, bid.into_bid()?)))
  }

  // ── Messages ──────────────────────────────────────────────────────────

  async fn insert_messages(&self, messages: Vec<Message>) -> Result<Vec<Message>> {
    let rows: Vec<[String; 7]> = messages
      .iter()
      .map(|m| {
        [
          encode_uuid(m.message_id),
          encode_uuid(m.rfq_id),
          encode_uuid(m.invitation_id),
          m.recipient_email.clone(),
          encode_uuid(m.sender_id),
          m.body.clone(),
          encode_dt(m.sent_at),
        ]
      })
      .collect();

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        {
          let mut stmt = tx.prepare(&format!(
            "INSERT INTO rfq_messages ({MESSAGE_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"
          ))?;
          for row in &rows {
            stmt.execute(rusqlite::params_from_iter(row.iter()))?;
          }
        }
        tx.commit()?;
        Ok(())
      })
      .await?;

    Ok(messages)
  }

  async fn list_messages(&self, rfq_id: Uuid) -> Result<Vec<Message>> {
    let rfq_str = encode_uuid(rfq_id);

    let raws: Vec<RawMessage> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {MESSAGE_COLUMNS} FROM rfq_messages
            WHERE rfq_id = ?1 ORDER BY sent_at ASC, rowid ASC"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![rfq_str], RawMessage::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawMessage::into_message).collect()
  }

  // ── Company invitations ───────────────────────────────────────────────

  async fn insert_company_invitation(
    &self,
    invitation: CompanyInvitation,
  ) -> Result<WriteOutcome<CompanyInvitation>> {
    let id_str      = encode_uuid(invitation.invitation_id);
    let company_str = encode_uuid(invitation.company_id);
    let token       = invitation.token.clone();
    let email       = invitation.email.clone();
    let role        = invitation.role.as_str();
    let by_str      = encode_uuid(invitation.invited_by);
    let issued_str  = encode_dt(invitation.issued_at);
    let expires_str = invitation.expires_at.map(encode_dt);

    let outcome = self
      .conn
      .call(move |conn| {
        Ok(insert_unique(
          conn,
          "INSERT INTO company_invitations
             (invitation_id, company_id, token, email, role, invited_by, issued_at, expires_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
          rusqlite::params![
            id_str,
            company_str,
            token,
            email,
            role,
            by_str,
            issued_str,
            expires_str,
          ],
        )?)
      })
      .await?;

    Ok(match outcome {
      WriteOutcome::Committed(()) => WriteOutcome::Committed(invitation),
      WriteOutcome::Stale => WriteOutcome::Stale,
      WriteOutcome::Collision => WriteOutcome::Collision,
    })
  }

  async fn find_company_invitation(&self, token: String) -> Result<Option<CompanyInvitation>> {
    let raw: Option<RawCompanyInvitation> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {COMPANY_INVITATION_COLUMNS} FROM company_invitations WHERE token = ?1"
              ),
              rusqlite::params![token],
              RawCompanyInvitation::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawCompanyInvitation::into_invitation).transpose()
  }

  async fn accept_company_invitation(
    &self,
    id: Uuid,
    user_id: Uuid,
  ) -> Result<WriteOutcome<CompanyInvitation>> {
    let id_str   = encode_uuid(id);
    let user_str = encode_uuid(user_id);
    let now_str  = encode_dt(Utc::now());

    let outcome = self
      .conn
      .call(move |conn| {
        let updated = conn.execute(
          "UPDATE company_invitations SET accepted_at = ?3, accepted_by = ?2
            WHERE invitation_id = ?1
              AND accepted_at IS NULL
              AND (expires_at IS NULL OR expires_at >= ?3)",
          rusqlite::params![id_str, user_str, now_str],
        )?;
        if updated == 0 {
          return Ok(WriteOutcome::Stale);
        }
        let raw = conn.query_row(
          &format!(
            "SELECT {COMPANY_INVITATION_COLUMNS} FROM company_invitations WHERE invitation_id = ?1"
          ),
          rusqlite::params![id_str],
          RawCompanyInvitation::from_row,
        )?;
        Ok(WriteOutcome::Committed(raw))
      })
      .await?;

    outcome.try_map(RawCompanyInvitation::into_invitation)
  }
}

// ─── Private helpers ─────────────────────────────────────────────────────────

impl SqliteStore {
  async fn run_transition(
    &self,
    id: Uuid,
    from: RfqStatus,
    to: RfqStatus,
    year: i32,
  ) -> Result<WriteOutcome<Rfq>> {
    let id_str  = encode_uuid(id);
    let now_str = encode_dt(Utc::now());

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let outcome = apply_transition(&tx, &id_str, from, to, year, &now_str)?;
        if let WriteOutcome::Committed(_) = outcome {
          tx.commit()?;
        }
        Ok(outcome)
      })
      .await?;

    outcome.try_map(RawRfq::into_rfq)
  }

  async fn find_bid_invitation_where(
    &self,
    predicate: &'static str,
    value: String,
  ) -> Result<Option<BidInvitation>> {
    let raw: Option<RawBidInvitation> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {BID_INVITATION_COLUMNS} FROM bid_invitations WHERE {predicate}"),
              rusqlite::params![value],
              RawBidInvitation::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawBidInvitation::into_invitation).transpose()
  }
}
