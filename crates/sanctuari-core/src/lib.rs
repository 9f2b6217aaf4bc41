//! Core types and trait definitions for the Sanctuari procurement service.
//!
//! This crate is free of HTTP and database dependencies. It owns the RFQ
//! lifecycle, identifier generation, the bid-collection workflow, product
//! questionnaires and the query vocabulary; storage and delivery are traits implemented elsewhere.

// We use native `async fn` in traits and rely on the `Send` bounds spelled
// out on the trait declarations.
#![allow(async_fn_in_trait)]

pub mod bid;
pub mod directory;
pub mod error;
pub mod ids;
pub mod invitation;
pub mod lifecycle;
pub mod message;
pub mod notify;
pub mod query;
pub mod questionnaire;
pub mod rfq;
pub mod store;
pub mod workflow;

pub use error::{Error, Result};
