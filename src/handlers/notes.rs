use axum::{
    extract::{Path, State},
    response::Json,
    Extension,
};
use futures_util::TryStreamExt;
use mongodb::bson::{doc, oid::ObjectId, DateTime};
use mongodb::Collection;
use serde_json::json;
use validator::Validate;

use crate::errors::{AppError, Result};
use crate::models::note::{CreateNote, Note, NoteResponse, UpdateNote};
use crate::models::user::Claims;
use crate::state::AppState;

// Every query below carries the owner predicate. A note that exists but
// belongs to someone else is indistinguishable from one that does not
// exist: both are a 404.
fn owned_filter(note_id: &ObjectId, claims: &Claims) -> mongodb::bson::Document {
    doc! { "_id": note_id, "owner_id": &claims.sub }
}

pub async fn list_notes(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<serde_json::Value>> {
    let collection: Collection<Note> = state.db.collection("notes");

    let cursor = collection.find(doc! { "owner_id": &claims.sub }).await?;
    let mut notes: Vec<Note> = cursor.try_collect().await?;

    notes.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));

    let responses: Vec<NoteResponse> = notes.into_iter().map(NoteResponse::from).collect();

    Ok(Json(json!({
        "success": true,
        "notes": responses
    })))
}

pub async fn create_note(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateNote>,
) -> Result<Json<serde_json::Value>> {
    payload.validate()?;

    let collection: Collection<Note> = state.db.collection("notes");

    let note = Note {
        _id: Some(ObjectId::new()),
        title: payload.title,
        content: payload.content,
        owner_id: claims.sub.clone(),
        created_at: DateTime::now(),
        updated_at: DateTime::now(),
    };

    collection.insert_one(&note).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Note created successfully",
        "note": NoteResponse::from(note)
    })))
}

pub async fn get_note(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(note_id): Path<String>,
) -> Result<Json<serde_json::Value>> {
    let collection: Collection<Note> = state.db.collection("notes");
    let note_id = ObjectId::parse_str(&note_id)?;

    let note = collection.find_one(owned_filter(&note_id, &claims)).await?
        .ok_or(AppError::NoteNotFound)?;

    Ok(Json(json!({
        "success": true,
        "note": NoteResponse::from(note)
    })))
}

pub async fn update_note(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(note_id): Path<String>,
    Json(payload): Json<UpdateNote>,
) -> Result<Json<serde_json::Value>> {
    payload.validate()?;

    let collection: Collection<Note> = state.db.collection("notes");
    let note_id = ObjectId::parse_str(&note_id)?;

    let update = doc! {
        "$set": {
            "title": &payload.title,
            "content": &payload.content,
            "updated_at": DateTime::now(),
        }
    };

    let result = collection.update_one(owned_filter(&note_id, &claims), update).await?;

    if result.matched_count == 0 {
        return Err(AppError::NoteNotFound);
    }

    Ok(Json(json!({
        "success": true,
        "message": "Note updated successfully"
    })))
}

pub async fn delete_note(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(note_id): Path<String>,
) -> Result<Json<serde_json::Value>> {
    let collection: Collection<Note> = state.db.collection("notes");
    let note_id = ObjectId::parse_str(&note_id)?;

    let result = collection.delete_one(owned_filter(&note_id, &claims)).await?;

    if result.deleted_count == 0 {
        return Err(AppError::NoteNotFound);
    }

    Ok(Json(json!({
        "success": true,
        "message": "Note deleted successfully"
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims_for(sub: &str) -> Claims {
        Claims {
            sub: sub.to_string(),
            username: "alice".to_string(),
            email: "alice@x.com".to_string(),
            exp: 0,
        }
    }

    // Every read and write goes through this filter, so as long as it
    // carries the owner predicate, another user's note id behaves like a
    // note that does not exist.
    #[test]
    fn owned_filter_scopes_by_id_and_owner() {
        let note_id = ObjectId::new();
        let claims = claims_for("64b0c0ffee0000000000aa01");

        let filter = owned_filter(&note_id, &claims);

        assert_eq!(filter.len(), 2);
        assert_eq!(filter.get_object_id("_id").unwrap(), note_id);
        assert_eq!(filter.get_str("owner_id").unwrap(), claims.sub);
    }

    #[test]
    fn owned_filter_follows_the_requesting_user() {
        let note_id = ObjectId::new();

        let alice = owned_filter(&note_id, &claims_for("owner-a"));
        let bob = owned_filter(&note_id, &claims_for("owner-b"));

        // same note id, different principals, disjoint filters
        assert_eq!(alice.get_object_id("_id").unwrap(), note_id);
        assert_eq!(bob.get_object_id("_id").unwrap(), note_id);
        assert_ne!(
            alice.get_str("owner_id").unwrap(),
            bob.get_str("owner_id").unwrap()
        );
    }
}
