//! SQL schema for the Sanctuari SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS insurance_products (
    product_id   TEXT PRIMARY KEY,
    name         TEXT NOT NULL,
    category     TEXT NOT NULL,
    description  TEXT,
    is_active    INTEGER NOT NULL DEFAULT 1,
    created_at   TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS network_members (
    member_id     TEXT PRIMARY KEY,
    company_name  TEXT NOT NULL,
    member_type   TEXT NOT NULL,          -- 'insurer' | 'broker'
    categories    TEXT NOT NULL,          -- JSON array of lowercase tags
    contact_email TEXT NOT NULL,
    is_active     INTEGER NOT NULL DEFAULT 1,
    created_at    TEXT NOT NULL
);

-- An RFQ carries a number exactly when it has left draft.
CREATE TABLE IF NOT EXISTS rfqs (
    rfq_id          TEXT PRIMARY KEY,
    rfq_number      TEXT UNIQUE,
    owner_id        TEXT NOT NULL,
    company_id      TEXT,
    product_id      TEXT REFERENCES insurance_products(product_id),
    title           TEXT NOT NULL,
    status          TEXT NOT NULL DEFAULT 'draft',
    deadline        TEXT,
    policy_document TEXT,                 -- JSON PolicyDocument or NULL
    created_at      TEXT NOT NULL,
    updated_at      TEXT NOT NULL,
    published_at    TEXT,
    CHECK ((status = 'draft') = (rfq_number IS NULL))
);

-- Per-year RFQ number counter, advanced with an upsert inside the
-- transaction that assigns the number.
CREATE TABLE IF NOT EXISTS rfq_sequences (
    year       INTEGER PRIMARY KEY,
    last_value INTEGER NOT NULL
);

-- Status history is strictly append-only.
CREATE TABLE IF NOT EXISTS rfq_transitions (
    transition_id TEXT PRIMARY KEY,
    rfq_id        TEXT NOT NULL REFERENCES rfqs(rfq_id),
    from_status   TEXT NOT NULL,
    to_status     TEXT NOT NULL,
    recorded_at   TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS bid_invitations (
    invitation_id TEXT PRIMARY KEY,
    rfq_id        TEXT NOT NULL REFERENCES rfqs(rfq_id),
    token         TEXT NOT NULL UNIQUE,
    member_id     TEXT REFERENCES network_members(member_id),
    email         TEXT NOT NULL,
    issued_at     TEXT NOT NULL,
    expires_at    TEXT,
    consumed_at   TEXT
);

CREATE TABLE IF NOT EXISTS bids (
    bid_id                TEXT PRIMARY KEY,
    rfq_id                TEXT NOT NULL REFERENCES rfqs(rfq_id),
    invitation_id         TEXT NOT NULL UNIQUE REFERENCES bid_invitations(invitation_id),
    member_id             TEXT,
    bidder_company_name   TEXT NOT NULL,
    bidder_contact_person TEXT,
    bidder_email          TEXT NOT NULL,
    bidder_phone          TEXT,
    quote                 TEXT NOT NULL,  -- JSON Quote
    documents             TEXT NOT NULL DEFAULT '[]',
    submitted_at          TEXT NOT NULL,
    selected              INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS company_invitations (
    invitation_id TEXT PRIMARY KEY,
    company_id    TEXT NOT NULL,
    token         TEXT NOT NULL UNIQUE,
    email         TEXT NOT NULL,
    role          TEXT NOT NULL,          -- 'admin' | 'member'
    invited_by    TEXT NOT NULL,
    issued_at     TEXT NOT NULL,
    expires_at    TEXT,
    accepted_at   TEXT,
    accepted_by   TEXT
);

-- Questions belong to a product; answers to an RFQ using that product.
CREATE TABLE IF NOT EXISTS rfq_questions (
    question_id   TEXT PRIMARY KEY,
    product_id    TEXT NOT NULL REFERENCES insurance_products(product_id),
    section       TEXT NOT NULL DEFAULT 'General',
    order_index   INTEGER NOT NULL,
    question_text TEXT NOT NULL,
    field_type    TEXT NOT NULL,
    options       TEXT NOT NULL DEFAULT '[]',  -- JSON array of choices
    guidance_text TEXT,
    placeholder   TEXT,
    required      INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS rfq_answers (
    rfq_id      TEXT NOT NULL REFERENCES rfqs(rfq_id),
    question_id TEXT NOT NULL REFERENCES rfq_questions(question_id),
    value       TEXT,                        -- JSON value or NULL
    file_url    TEXT,
    updated_at  TEXT NOT NULL,
    PRIMARY KEY (rfq_id, question_id)
);

CREATE TABLE IF NOT EXISTS rfq_messages (
    message_id      TEXT PRIMARY KEY,
    rfq_id          TEXT NOT NULL REFERENCES rfqs(rfq_id),
    invitation_id   TEXT NOT NULL REFERENCES bid_invitations(invitation_id),
    recipient_email TEXT NOT NULL,
    sender_id       TEXT NOT NULL,
    body            TEXT NOT NULL,
    sent_at         TEXT NOT NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS bids_one_winner_idx ON bids(rfq_id) WHERE selected = 1;
CREATE INDEX IF NOT EXISTS bids_rfq_idx             ON bids(rfq_id);
CREATE INDEX IF NOT EXISTS bid_invitations_rfq_idx  ON bid_invitations(rfq_id);
CREATE INDEX IF NOT EXISTS rfqs_owner_idx           ON rfqs(owner_id);
CREATE INDEX IF NOT EXISTS rfq_transitions_rfq_idx  ON rfq_transitions(rfq_id);
CREATE INDEX IF NOT EXISTS rfq_questions_order_idx
    ON rfq_questions(product_id, section, order_index);
CREATE INDEX IF NOT EXISTS rfq_messages_rfq_idx     ON rfq_messages(rfq_id);

PRAGMA user_version = 2;
";
