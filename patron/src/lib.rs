//! Patron Core - client-side logic for interactive text search
//!
//! Loads a document into a remote matching service, asks it for word suggestions
//! while the user types, fetches every occurrence of the chosen pattern, and
//! splits the document into highlighted fragments for display.
//!
//! Replies can arrive in any order. Each request category is tagged and only
//! the reply matching the live input is applied (see `client`).

mod client;
pub mod config;
pub mod highlight;
pub mod interface;
mod occurrence;
mod query;
pub mod remote;
pub mod session;

pub use client::{ClientSnapshot, SearchClient};
pub use config::{ClientConfig, OccurrenceAlgorithm};
pub use interface::*;
pub use remote::HttpMatchingService;
pub use session::DocumentSession;
