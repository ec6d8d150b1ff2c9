//! In-place payload rewriting.
//!
//! # Responsibilities
//! - Substitute the live session token into outbound payloads
//! - Stamp query-execution calls with the next nonce
//! - Leave every other byte of the payload alone
//!
//! # Design Decisions
//! - Query-execution envelopes are parsed into a tree and mutated by stable
//!   field path, so whitespace and field order in the client payload never
//!   matter
//! - Metadata lookups keep the observed contract: any run of 32 word
//!   characters anywhere in the payload is replaced by the session token
//! - Callers must re-declare Content-Length from the rewritten byte length;
//!   the transport trusts the declared length over the buffer

use std::sync::atomic::{AtomicI64, Ordering};

use regex::bytes::Regex;
use thiserror::Error;

use crate::session::Session;
use crate::upstream::Envelope;

/// Envelope positions rewritten for query execution: the session argument
/// (field "1") and the sequence element.
const SESSION_FIELD: &str = "1";

#[derive(Debug, Error)]
pub enum RewriteError {
    #[error("payload is not a valid envelope: {0}")]
    Envelope(String),

    #[error("payload has no session token field")]
    MissingSessionField,
}

/// Process-local monotonically increasing counter.
///
/// Incremented once per rewritten query-execution request; not persisted
/// across restarts.
#[derive(Debug, Default)]
pub struct Nonce(AtomicI64);

impl Nonce {
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment and return the new value.
    pub fn next(&self) -> i64 {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Current value without incrementing.
    pub fn current(&self) -> i64 {
        self.0.load(Ordering::SeqCst)
    }
}

/// Rewrites inbound payloads with the session token the clients never saw.
pub struct PayloadRewriter {
    session: Session,
    nonce: Nonce,
    token_run: Regex,
}

impl PayloadRewriter {
    pub fn new(session: Session) -> Self {
        Self {
            session,
            nonce: Nonce::new(),
            // token-shaped field: exactly what the upstream issues at login
            token_run: Regex::new(r"\w{32}").expect("static pattern"),
        }
    }

    pub fn nonce(&self) -> &Nonce {
        &self.nonce
    }

    /// Rewrite a query-execution payload: session field and sequence element
    /// are replaced, the embedded query text and all other structure survive
    /// byte-for-byte through re-serialization.
    pub fn rewrite_query(&self, payload: &[u8]) -> Result<Vec<u8>, RewriteError> {
        let mut envelope =
            Envelope::parse(payload).map_err(|e| RewriteError::Envelope(e.to_string()))?;
        if !envelope.set_field_str(SESSION_FIELD, self.session.as_str()) {
            return Err(RewriteError::MissingSessionField);
        }
        envelope.set_seq(self.nonce.next());
        Ok(envelope.to_bytes())
    }

    /// Rewrite a metadata-lookup payload: every 32-character word-run becomes
    /// the session token. A payload with no such run is returned unchanged.
    pub fn rewrite_metadata(&self, payload: &[u8]) -> Vec<u8> {
        self.token_run
            .replace_all(payload, self.session.as_str().as_bytes())
            .into_owned()
    }
}
