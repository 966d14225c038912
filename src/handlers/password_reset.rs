use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Redirect},
    Json,
};
use axum_extra::extract::CookieJar;
use bcrypt::{hash, DEFAULT_COST};
use mongodb::bson::{doc, DateTime};
use mongodb::Collection;
use serde::{Deserialize, Serialize};
use serde_json::json;
use validator::Validate;

use crate::errors::Result;
use crate::models::user::User;
use crate::services::session_store::ResetStage;
use crate::state::AppState;

pub const FORGOT_PASSWORD_PATH: &str = "/api/auth/forgot-password";
pub const VERIFY_OTP_PATH: &str = "/api/auth/verify-otp";
pub const RESET_PASSWORD_PATH: &str = "/api/auth/reset-password";
pub const LOGIN_PATH: &str = "/api/auth/login";

// Request DTOs
#[derive(Debug, Deserialize, Validate)]
pub struct ForgotPasswordRequest {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct VerifyOtpRequest {
    #[validate(length(min = 6, max = 6, message = "OTP must be 6 digits"))]
    pub otp: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ResetPasswordRequest {
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct FlowErrorResponse {
    pub success: bool,
    pub message: String,
}

impl FlowErrorResponse {
    fn new(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

// Step 1 entry point. Always renderable, whatever the session holds.
pub async fn forgot_password_form() -> impl IntoResponse {
    Json(json!({
        "step": "forgot_password",
        "fields": ["email"],
    }))
}

// Step 1: look up the account, issue an OTP, mail it, and remember the
// email in the session. An unknown email changes nothing server-side.
pub async fn forgot_password(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<ForgotPasswordRequest>,
) -> Result<axum::response::Response> {
    if let Err(errors) = req.validate() {
        return Ok((
            StatusCode::BAD_REQUEST,
            Json(FlowErrorResponse::new(format!("Validation error: {}", errors))),
        )
            .into_response());
    }

    let users: Collection<User> = state.db.collection("users");
    let user = users.find_one(doc! { "email": &req.email }).await?;

    if user.is_none() {
        return Ok((
            StatusCode::NOT_FOUND,
            Json(FlowErrorResponse::new("Email not registered")),
        )
            .into_response());
    }

    let code = state.otp_registry.issue(&req.email).await;

    if let Err(e) = state.mail_service.send_otp(&req.email, &code).await {
        tracing::error!("Failed to send OTP mail to {}: {}", req.email, e);
        // Roll back the issuance so a code the user never received
        // cannot linger; the session stays untouched.
        state.otp_registry.consume(&req.email).await;
        return Err(e);
    }

    let (jar, sid) = state.sessions.ensure(jar);
    state
        .sessions
        .set_stage(&sid, ResetStage::AwaitingOtp { email: req.email });

    Ok((jar, Redirect::to(VERIFY_OTP_PATH)).into_response())
}

// Step 2 entry point: only reachable mid-flow.
pub async fn verify_otp_form(
    State(state): State<AppState>,
    jar: CookieJar,
) -> impl IntoResponse {
    match current_stage(&state, &jar) {
        ResetStage::Idle => Redirect::to(FORGOT_PASSWORD_PATH).into_response(),
        _ => Json(json!({
            "step": "verify_otp",
            "fields": ["otp"],
        }))
        .into_response(),
    }
}

// Step 2: redeem the code. A match consumes it atomically so it can
// never be replayed; a miss leaves it valid for another attempt.
pub async fn verify_otp(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<VerifyOtpRequest>,
) -> impl IntoResponse {
    // Bind the sid here so the branch that advances the stage below is
    // writing under the same session it was gated on.
    let sid = match session_id(&jar) {
        Some(sid) => sid,
        None => return Redirect::to(FORGOT_PASSWORD_PATH).into_response(),
    };
    let email = match state.sessions.stage(&sid) {
        ResetStage::AwaitingOtp { email } => email,
        _ => return Redirect::to(FORGOT_PASSWORD_PATH).into_response(),
    };

    if let Err(errors) = req.validate() {
        return (
            StatusCode::BAD_REQUEST,
            Json(FlowErrorResponse::new(format!("Validation error: {}", errors))),
        )
            .into_response();
    }

    if !state.otp_registry.redeem(&email, &req.otp).await {
        return (
            StatusCode::BAD_REQUEST,
            Json(FlowErrorResponse::new("Invalid OTP")),
        )
            .into_response();
    }

    state
        .sessions
        .set_stage(&sid, ResetStage::AwaitingPassword { email });

    Redirect::to(RESET_PASSWORD_PATH).into_response()
}

// Step 3 entry point: requires a redeemed OTP, not just a pending email.
pub async fn reset_password_form(
    State(state): State<AppState>,
    jar: CookieJar,
) -> impl IntoResponse {
    match current_stage(&state, &jar) {
        ResetStage::AwaitingPassword { .. } => Json(json!({
            "step": "reset_password",
            "fields": ["password"],
        }))
        .into_response(),
        _ => Redirect::to(FORGOT_PASSWORD_PATH).into_response(),
    }
}

// Step 3: persist the new hash and end the flow.
pub async fn reset_password(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<ResetPasswordRequest>,
) -> Result<axum::response::Response> {
    let email = match current_stage(&state, &jar) {
        ResetStage::AwaitingPassword { email } => email,
        _ => return Ok(Redirect::to(FORGOT_PASSWORD_PATH).into_response()),
    };

    if let Err(errors) = req.validate() {
        return Ok((
            StatusCode::BAD_REQUEST,
            Json(FlowErrorResponse::new(format!("Validation error: {}", errors))),
        )
            .into_response());
    }

    let users: Collection<User> = state.db.collection("users");

    let password_hash = match hash(&req.password, DEFAULT_COST) {
        Ok(pw) => pw,
        Err(e) => {
            tracing::error!("Password hashing error: {}", e);
            return Ok((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(FlowErrorResponse::new("Failed to hash password")),
            )
                .into_response());
        }
    };

    let filter = doc! { "email": &email };
    let update = doc! {
        "$set": {
            "password_hash": password_hash,
            "updated_at": DateTime::now(),
        }
    };

    let result = users.update_one(filter, update).await?;

    if result.matched_count == 0 {
        // Account vanished mid-flow. The session keeps its stage so the
        // situation is visible rather than silently reset.
        return Ok((
            StatusCode::NOT_FOUND,
            Json(FlowErrorResponse::new("User not found")),
        )
            .into_response());
    }

    if let Some(sid) = session_id(&jar) {
        state.sessions.clear(&sid);
    }

    Ok(Redirect::to(LOGIN_PATH).into_response())
}

fn session_id(jar: &CookieJar) -> Option<String> {
    jar.get(crate::services::session_store::SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string())
}

fn current_stage(state: &AppState, jar: &CookieJar) -> ResetStage {
    match session_id(jar) {
        Some(sid) => state.sessions.stage(&sid),
        None => ResetStage::Idle,
    }
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use tower::ServiceExt;

    use super::{FORGOT_PASSWORD_PATH, RESET_PASSWORD_PATH, VERIFY_OTP_PATH};
    use crate::services::otp_registry::{InMemoryOtpRegistry, OtpRegistry};
    use crate::services::session_store::{ResetStage, SessionStore};
    use crate::state::{AppState, MailConfig};

    // The driver connects lazily, and none of the guard paths exercised
    // here reach the database.
    async fn test_router() -> axum::Router {
        let client = mongodb::Client::with_uri_str("mongodb://localhost:27017")
            .await
            .unwrap();
        let state = AppState::new(
            client.database("testdb"),
            MailConfig {
                api_url: "http://localhost:0".to_string(),
                api_key: String::new(),
                from: "admin@example.com".to_string(),
            },
        );
        crate::build_router(state)
    }

    async fn get_without_session(path: &str) -> axum::response::Response {
        let request = Request::builder()
            .uri(path)
            .body(Body::empty())
            .unwrap();
        test_router().await.oneshot(request).await.unwrap()
    }

    #[tokio::test]
    async fn verify_step_without_session_redirects_to_start() {
        let response = get_without_session(VERIFY_OTP_PATH).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers().get(header::LOCATION).unwrap(),
            FORGOT_PASSWORD_PATH
        );
    }

    #[tokio::test]
    async fn reset_step_without_session_redirects_to_start() {
        let response = get_without_session(RESET_PASSWORD_PATH).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers().get(header::LOCATION).unwrap(),
            FORGOT_PASSWORD_PATH
        );
    }

    #[tokio::test]
    async fn forgot_password_form_renders_without_session() {
        let response = get_without_session(FORGOT_PASSWORD_PATH).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    // The full sequence the handlers drive: request → verify → complete.
    #[tokio::test]
    async fn reset_flow_walks_all_three_stages() {
        let registry = InMemoryOtpRegistry::new();
        let sessions = SessionStore::new();
        let sid = sessions.create();

        // step 1: request
        let code = registry.issue("alice@x.com").await;
        sessions.set_stage(&sid, ResetStage::AwaitingOtp { email: "alice@x.com".into() });

        // step 2: verify consumes the code and advances the stage
        assert!(registry.redeem("alice@x.com", &code).await);
        assert!(!registry.has_pending("alice@x.com").await);
        sessions.set_stage(&sid, ResetStage::AwaitingPassword { email: "alice@x.com".into() });

        // step 3: complete clears the session
        sessions.clear(&sid);
        assert_eq!(sessions.stage(&sid), ResetStage::Idle);

        // the consumed code cannot be replayed
        assert!(!registry.redeem("alice@x.com", &code).await);
    }

    #[tokio::test]
    async fn wrong_otp_leaves_code_and_stage_intact() {
        let registry = InMemoryOtpRegistry::new();
        let sessions = SessionStore::new();
        let sid = sessions.create();

        let code = registry.issue("alice@x.com").await;
        sessions.set_stage(&sid, ResetStage::AwaitingOtp { email: "alice@x.com".into() });

        let wrong = if code == "111111" { "222222" } else { "111111" };
        assert!(!registry.redeem("alice@x.com", wrong).await);

        // still mid-flow, code still redeemable
        assert_eq!(
            sessions.stage(&sid),
            ResetStage::AwaitingOtp { email: "alice@x.com".into() }
        );
        assert!(registry.redeem("alice@x.com", &code).await);
    }

}
