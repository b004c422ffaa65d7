//! Persisted documents around the conversation: the persona JSON store, the
//! per-session spreadsheet export, the filled hearing-form PDF, and its
//! email dispatch.

pub mod email;
pub mod export;
pub mod pdf;
pub mod persona;

pub use email::Mailer;
pub use export::SheetExporter;
pub use persona::PersonaStore;
