use axum::{
    extract::State,
    routing::get,
    Json, Router,
};
use portfolio_manager::LeaderboardEntry;
use serde::Deserialize;

use crate::quiz::{self, PublicQuestion, QuizScore};
use crate::{ApiResponse, AppError, AppState};

pub const LEADERBOARD_SIZE: usize = 10;

#[derive(Deserialize)]
pub struct QuizSubmission {
    #[serde(default)]
    pub answers: Vec<Option<String>>,
}

pub fn info_routes() -> Router<AppState> {
    Router::new()
        .route("/api/quiz", get(get_quiz).post(submit_quiz))
        .route("/api/leaderboard", get(get_leaderboard))
}

async fn get_quiz() -> Json<ApiResponse<Vec<PublicQuestion>>> {
    Json(ApiResponse::success(quiz::public_questions()))
}

async fn submit_quiz(Json(req): Json<QuizSubmission>) -> Json<ApiResponse<QuizScore>> {
    Json(ApiResponse::success(quiz::score_answers(&req.answers)))
}

async fn get_leaderboard(State(state): State<AppState>) -> Result<Json<ApiResponse<Vec<LeaderboardEntry>>>, AppError> {
    let market = state.market.clone();
    let entries = state
        .accounts
        .leaderboard(LEADERBOARD_SIZE, |symbol| market.get_price(symbol))
        .await?;

    Ok(Json(ApiResponse::success(entries)))
}
