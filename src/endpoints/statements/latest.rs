use axum::{
    Json,
    extract::{Query, State},
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use serde_with::{NoneAsEmptyString, serde_as};
use utoipa::{IntoParams, ToSchema};

use crate::{
    error::{ApiError, ErrorBody},
    services,
    state::AppState,
    statement_parsing::NormalizedRow,
};

#[serde_as]
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct Input {
    /// Only consider statements of this account number.
    #[serde(default)]
    #[serde_as(as = "NoneAsEmptyString")]
    pub account: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct LatestStatement {
    pub data: Vec<NormalizedRow>,
}

#[utoipa::path(
    get,
    path = "/upload",
    operation_id = "statements/latest",
    tag = "statements",
    params(
        Input
    ),
    responses(
        (status = 200, body = LatestStatement),
        (status = 400, body = ErrorBody),
        (status = 404, body = ErrorBody),
        (status = 500, body = ErrorBody),
    )
)]
#[tracing::instrument(skip(state))]
pub async fn latest(
    State(state): State<AppState>,
    Query(input): Query<Input>,
) -> Result<impl IntoResponse, ApiError> {
    let statement = services::statements::latest(&state.storage, input.account.as_deref()).await?;

    tracing::debug!(
        "serving {} rows from {}",
        statement.rows.len(),
        statement.key
    );

    return Ok(Json(LatestStatement {
        data: statement.rows,
    }));
}
