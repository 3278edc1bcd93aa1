mod model;
mod service;

pub use model::{
    Document, DocumentDiff, DocumentFilter, DocumentHistoryEntry, DocumentPatch, DocumentSnapshot,
    DocumentType, DocumentVersion, NewDocument,
};
