use mongodb::bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Note {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,
    pub title: String,
    pub content: String,
    // Hex of the owning user's ObjectId, matched against Claims.sub.
    pub owner_id: String,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateNote {
    #[validate(length(min = 1, message = "Title must not be empty"))]
    pub title: String,
    pub content: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateNote {
    #[validate(length(min = 1, message = "Title must not be empty"))]
    pub title: String,
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct NoteResponse {
    pub id: String,
    pub title: String,
    pub content: String,
    pub owner_id: String,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Note> for NoteResponse {
    fn from(note: Note) -> Self {
        NoteResponse {
            id: note._id.map(|id| id.to_hex()).unwrap_or_default(),
            title: note.title,
            content: note.content,
            owner_id: note.owner_id,
            created_at: note.created_at.try_to_rfc3339_string().unwrap_or_default(),
            updated_at: note.updated_at.try_to_rfc3339_string().unwrap_or_default(),
        }
    }
}
