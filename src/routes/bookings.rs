use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::db::models::LedgerRow;
use crate::error::AppResult;
use crate::ledger;
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/", get(list_bookings))
}

#[derive(Debug, Serialize)]
pub struct BookingsResponse {
    /// Localized header labels, in column order.
    pub columns: Vec<String>,
    pub rows: Vec<LedgerRow>,
}

async fn list_bookings(State(state): State<Arc<AppState>>) -> AppResult<Json<BookingsResponse>> {
    let rows = ledger::configured_rows(&state.config.ledger, &state.db, &state.schema).await?;
    Ok(Json(BookingsResponse {
        columns: state.schema.headers().to_vec(),
        rows,
    }))
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{body_json, empty_request, state};
    use crate::db::models::LedgerRow;
    use crate::db::BookingRepository;
    use tower::ServiceExt;

    #[tokio::test]
    async fn lists_columns_and_rows_in_ledger_order() {
        let state = state().await;
        for (uid, check_out) in [("late", "2024-06-20"), ("early", "2024-06-02")] {
            BookingRepository::insert(
                &state.db,
                &LedgerRow {
                    uid: uid.to_string(),
                    property_name: "Loft".to_string(),
                    status: "confirmed".to_string(),
                    guest_info: "Reserved".to_string(),
                    check_in: "2024-06-01".to_string(),
                    check_out: check_out.to_string(),
                    nights: 1,
                    last_updated: "2024-05-01 00:00:00".to_string(),
                },
            )
            .await
            .unwrap();
        }

        let app = crate::routes::app(state);
        let response = app
            .oneshot(empty_request("GET", "/api/bookings"))
            .await
            .unwrap();
        let body = body_json(response).await;

        assert_eq!(body["columns"][0], "UID");
        assert_eq!(body["columns"].as_array().unwrap().len(), 8);
        assert_eq!(body["rows"][0]["uid"], "late");
        assert_eq!(body["rows"][1]["uid"], "early");
    }
}
