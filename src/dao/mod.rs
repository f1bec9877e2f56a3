/// Loading, validating and atomically persisting the guild document.
pub mod document_store;
/// Guild document and typed record definitions.
pub mod models;
/// Store error taxonomy.
pub mod storage;
