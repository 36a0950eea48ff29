use std::str::FromStr;

use axum::extract::{Multipart, State};
use axum::Json;
use garde::Validate;

use crate::app_state::AppState;
use crate::models::prediction::{PredictForm, PredictResponse};
use crate::routes::ApiError;

/// POST /predict — Upload an image and queue it for detection.
pub async fn submit_prediction(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<PredictResponse>, ApiError> {
    let mut model_type: Option<String> = None;
    let mut imgsz_w: Option<u32> = None;
    let mut imgsz_h: Option<u32> = None;
    let mut conf: Option<f32> = None;
    let mut image_data: Option<Vec<u8>> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.to_string()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                // Format problems surface later as an `error` record.
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::BadRequest(e.to_string()))?;
                image_data = Some(data.to_vec());
            }
            "model_type" => model_type = Some(text(field).await?),
            "imgsz_w" => imgsz_w = Some(parse(&name, &text(field).await?)?),
            "imgsz_h" => imgsz_h = Some(parse(&name, &text(field).await?)?),
            "conf" => conf = Some(parse(&name, &text(field).await?)?),
            _ => {}
        }
    }

    let form = PredictForm {
        model_type: model_type.ok_or(ApiError::MissingField("model_type"))?,
        imgsz_w: imgsz_w.ok_or(ApiError::MissingField("imgsz_w"))?,
        imgsz_h: imgsz_h.ok_or(ApiError::MissingField("imgsz_h"))?,
        conf: conf.ok_or(ApiError::MissingField("conf"))?,
    };
    let image_data = image_data.ok_or(ApiError::MissingField("file"))?;

    form.validate()
        .map_err(|report| ApiError::Invalid(report.to_string()))?;

    let task_id = state
        .jobs
        .submit(form.model_type.clone(), image_data, form.params())?;

    Ok(Json(PredictResponse { task_id }))
}

async fn text(field: axum::extract::multipart::Field<'_>) -> Result<String, ApiError> {
    field
        .text()
        .await
        .map_err(|e| ApiError::BadRequest(e.to_string()))
}

fn parse<T: FromStr>(name: &str, value: &str) -> Result<T, ApiError> {
    value
        .trim()
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("field '{}' has an invalid value", name)))
}
