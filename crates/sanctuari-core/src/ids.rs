//! Identifier generation: opaque invitation tokens and RFQ numbers.
//!
//! Tokens are drawn from the operating system CSPRNG. The generator performs
//! no uniqueness check; a 62^32 keyspace is treated as uncollidable and the
//! store's UNIQUE constraint turns the remaining risk into a retryable
//! collision.

use rand_core::{OsRng, RngCore};

/// The 62-character alphanumeric token alphabet.
pub const TOKEN_ALPHABET: &[u8; 62] =
  b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

/// Length of a bid-invitation link token.
pub const BID_INVITATION_TOKEN_LEN: usize = 32;

/// Length of a company-invitation token.
pub const COMPANY_INVITATION_TOKEN_LEN: usize = 64;

// Largest multiple of 62 that fits in a byte. Bytes at or above it are
// discarded so every symbol is equally likely.
const REJECTION_BOUND: u8 = 248;

/// Return a random alphanumeric string of exactly `length` characters.
pub fn new_opaque_token(length: usize) -> String {
  let mut token = String::with_capacity(length);
  let mut buf = [0u8; 64];

  while token.len() < length {
    OsRng.fill_bytes(&mut buf);
    for byte in buf {
      if byte >= REJECTION_BOUND {
        continue;
      }
      token.push(TOKEN_ALPHABET[usize::from(byte % 62)] as char);
      if token.len() == length {
        break;
      }
    }
  }

  token
}

pub fn bid_invitation_token() -> String {
  new_opaque_token(BID_INVITATION_TOKEN_LEN)
}

pub fn company_invitation_token() -> String {
  new_opaque_token(COMPANY_INVITATION_TOKEN_LEN)
}

/// Cheap shape check used to reject garbage before it reaches the store.
pub fn is_well_formed_token(token: &str, length: usize) -> bool {
  token.len() == length && token.bytes().all(|b| b.is_ascii_alphanumeric())
}

// ─── RFQ numbers ─────────────────────────────────────────────────────────────

/// Format an RFQ number, e.g. `rfq_number(2025, 1) == "RFQ-2025-0001"`.
///
/// The sequence must come from an atomic per-year counter; this function only
/// formats. Sequences past 9999 simply grow wider.
pub fn rfq_number(year: i32, sequence: u32) -> String {
  format!("RFQ-{year}-{sequence:04}")
}

/// Split an RFQ number back into `(year, sequence)`.
pub fn parse_rfq_number(number: &str) -> Option<(i32, u32)> {
  let rest = number.strip_prefix("RFQ-")?;
  let (year, sequence) = rest.split_once('-')?;
  if year.len() != 4 || sequence.len() < 4 {
    return None;
  }
  if !year.bytes().all(|b| b.is_ascii_digit())
    || !sequence.bytes().all(|b| b.is_ascii_digit())
  {
    return None;
  }
  Some((year.parse().ok()?, sequence.parse().ok()?))
}
