use axum::{
    Json,
    extract::{
        Multipart, State,
        multipart::{MultipartError, MultipartRejection},
    },
    response::IntoResponse,
};
use hyper::StatusCode;
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    error::{ApiError, ErrorBody},
    services::statements::{self, StatementError, Upload},
    state::AppState,
};

pub const FILE_FIELD: &str = "file";

/// Multipart body of an upload, only used for the OpenAPI document.
#[derive(ToSchema)]
#[expect(dead_code, reason = "read field by field from the multipart stream")]
pub struct UploadForm {
    /// `;` separated bank statement export, named `<account>_<anything>.csv`.
    #[schema(value_type = String, format = Binary)]
    pub file: Vec<u8>,
}

#[derive(Serialize, ToSchema)]
pub struct UploadResult {
    pub success: bool,
}

#[utoipa::path(
    post,
    path = "/upload",
    operation_id = "statements/upload",
    tag = "statements",
    request_body(
        content = UploadForm,
        content_type = "multipart/form-data",
    ),
    responses(
        (status = 200, body = UploadResult),
        (status = 400, body = ErrorBody),
        (status = 500, body = ErrorBody),
    )
)]
#[tracing::instrument(skip(state, multipart))]
pub async fn upload(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let mut multipart = multipart.map_err(|_| StatementError::MissingFile)?;

    let mut file = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(multipart_error)?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        // a `file` part without a file name is a plain text field
        let file_name = field
            .file_name()
            .filter(|name| !name.is_empty())
            .map(str::to_owned)
            .ok_or(StatementError::MissingFile)?;
        let content_type = field.content_type().map(str::to_owned);

        let bytes = field
            .bytes()
            .await
            .map_err(multipart_error)?;

        file = Some(Upload {
            file_name,
            content_type,
            bytes,
        });
        break;
    }

    let file = file.ok_or(StatementError::MissingFile)?;

    let key = statements::upload(
        &state.storage,
        state.config.upload_policy,
        state.config.upload_timezone,
        file,
    )
    .await?;

    tracing::info!("upload stored as {key}");

    return Ok(Json(UploadResult { success: true }));
}

fn multipart_error(err: MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return StatementError::TooLarge.into();
    }

    return ApiError::BadRequest(err.body_text());
}
