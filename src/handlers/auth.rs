use axum::{extract::State, response::Json};
use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::Utc;
use jsonwebtoken::{encode, EncodingKey, Header};
use mongodb::bson::{doc, oid::ObjectId, DateTime};
use mongodb::Collection;
use validator::Validate;

use crate::errors::{AppError, Result};
use crate::models::user::{AuthResponse, Claims, CreateUser, LoginUser, User, UserResponse};
use crate::state::AppState;

fn issue_token(user_id: &ObjectId, username: &str, email: &str) -> Result<String> {
    let claims = Claims {
        sub: user_id.to_hex(),
        username: username.to_string(),
        email: email.to_string(),
        exp: (Utc::now().timestamp() + 86400) as usize, // 24 hours
    };

    let secret = std::env::var("JWT_SECRET").unwrap_or_else(|_| "secret".to_string());

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_ref()),
    )
    .map_err(|_| AppError::InvalidUserData)
}

pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<CreateUser>,
) -> Result<Json<AuthResponse>> {
    payload.validate()?;

    let collection: Collection<User> = state.db.collection("users");

    // Both username and email are login/reset lookup keys, so neither
    // may be reused.
    let filter = doc! {
        "$or": [
            { "username": &payload.username },
            { "email": &payload.email }
        ]
    };

    if collection.find_one(filter).await?.is_some() {
        return Err(AppError::DuplicateKey);
    }

    let password_hash = hash(&payload.password, DEFAULT_COST)
        .map_err(|_| AppError::InvalidUserData)?;

    let user = User {
        _id: Some(ObjectId::new()),
        username: payload.username.clone(),
        email: payload.email.clone(),
        password_hash,
        created_at: DateTime::now(),
        updated_at: DateTime::now(),
    };

    collection.insert_one(&user).await?;

    let user_id = user._id.unwrap();
    let token = issue_token(&user_id, &payload.username, &payload.email)?;

    Ok(Json(AuthResponse {
        user: UserResponse {
            id: user_id.to_hex(),
            username: payload.username,
            email: payload.email,
        },
        token,
    }))
}

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginUser>,
) -> Result<Json<AuthResponse>> {
    let collection: Collection<User> = state.db.collection("users");

    let filter = doc! { "username": &payload.username };
    let user = collection.find_one(filter).await?
        .ok_or(AppError::AuthError)?;

    let valid = verify(&payload.password, &user.password_hash)
        .map_err(|_| AppError::AuthError)?;

    if !valid {
        return Err(AppError::AuthError);
    }

    let user_id = user._id.ok_or(AppError::InvalidUserData)?;
    let token = issue_token(&user_id, &user.username, &user.email)?;

    Ok(Json(AuthResponse {
        user: UserResponse {
            id: user_id.to_hex(),
            username: user.username,
            email: user.email,
        },
        token,
    }))
}
