//! Viewer identity for the current request.
//!
//! Follow-state and feed logic dispatch on the variant; an anonymous
//! viewer never reaches a follow-graph lookup.

use crate::domain::entities::AuthorRecord;

#[derive(Debug, Clone, PartialEq)]
pub enum Viewer {
    Anonymous,
    Authenticated(AuthorRecord),
}

impl Viewer {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Viewer::Authenticated(_))
    }

    /// The signed-in author, if any.
    pub fn author(&self) -> Option<&AuthorRecord> {
        match self {
            Viewer::Anonymous => None,
            Viewer::Authenticated(author) => Some(author),
        }
    }

    /// True when the viewer is the author with the given id.
    pub fn is_author(&self, author_id: i64) -> bool {
        self.author().is_some_and(|author| author.id == author_id)
    }
}
