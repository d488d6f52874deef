use crate::models::StoreStats;
use crate::startup::AppState;
use axum::{extract::State, Json};
use service_core::error::AppError;

/// Dashboard counts; invoices are counted for the current calendar month.
pub async fn get_stats(State(state): State<AppState>) -> Result<Json<StoreStats>, AppError> {
    let today = chrono::Local::now().date_naive();
    let stats = state.store.stats(today).await?;
    Ok(Json(stats))
}
