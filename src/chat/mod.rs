//! Client-side chat domain used by the terminal front end.
//!
//! ARCHITECTURE
//! ============
//! `view` orchestrates a send over three injected services: the message
//! `store` (conversation list persisted through `storage`), the `linkage`
//! tracker, and the AI response `client` that talks to the relay. Nothing
//! here is global; the entry point constructs and owns every piece.

pub mod client;
pub mod linkage;
pub mod storage;
pub mod store;
pub mod types;
pub mod view;
