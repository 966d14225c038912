use axum::{routing::get, Router};

use crate::{handlers::password_reset, state::AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        // Step 1: request an OTP for an account email
        .route(
            "/forgot-password",
            get(password_reset::forgot_password_form).post(password_reset::forgot_password),
        )
        // Step 2: check the mailed code
        .route(
            "/verify-otp",
            get(password_reset::verify_otp_form).post(password_reset::verify_otp),
        )
        // Step 3: set the new password
        .route(
            "/reset-password",
            get(password_reset::reset_password_form).post(password_reset::reset_password),
        )
}
