use axum::{
    body::Bytes,
    extract::{FromRequest, Multipart, Request},
    http::header,
};
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use crate::storage::{Storage, StoredFile, detect_image_type};

pub const MAX_FILE_SIZE: usize = 5 * 1024 * 1024;

/// For uploads that carry no text fields.
#[derive(Debug, Default, Deserialize)]
pub struct NoFields {}

/// A form submitted either as JSON or as `multipart/form-data`. Text parts
/// become the fields of `T`; every part carrying a file name is an image,
/// sniffed, size-checked and written to the upload directory. At most `MAX`
/// images are accepted.
///
/// If extraction fails, images already written are removed again.
pub struct Submission<T, const MAX: usize> {
    pub fields: T,
    pub files: Vec<StoredFile>,
}

impl<T, const MAX: usize> FromRequest<AppState> for Submission<T, MAX>
where
    T: DeserializeOwned + Default + Send,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &AppState) -> Result<Self, Self::Rejection> {
        let is_multipart = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("multipart/form-data"));

        if is_multipart {
            let multipart = Multipart::from_request(req, state)
                .await
                .map_err(|e| ApiError::bad_request(e.body_text()))?;
            let mut files = Vec::new();
            return match read_multipart(multipart, &state.storage, MAX, &mut files).await {
                Ok(fields) => Ok(Self { fields, files }),
                Err(e) => {
                    state.storage.remove_all(&files).await;
                    Err(e)
                }
            };
        }

        let body = Bytes::from_request(req, state)
            .await
            .map_err(|e| ApiError::bad_request(e.body_text()))?;
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self { fields: T::default(), files: Vec::new() });
        }
        let fields = serde_json::from_slice(&body).map_err(|_| ApiError::bad_request("Invalid JSON body"))?;
        Ok(Self { fields, files: Vec::new() })
    }
}

async fn read_multipart<T: DeserializeOwned>(
    mut multipart: Multipart,
    storage: &Storage,
    max_files: usize,
    files: &mut Vec<StoredFile>,
) -> ApiResult<T> {
    let mut fields = Map::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(e.body_text()))?
    {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };

        let Some(file_name) = field.file_name().map(str::to_string) else {
            let text = field.text().await.map_err(|e| ApiError::bad_request(e.body_text()))?;
            fields.insert(name, Value::String(text));
            continue;
        };

        let data = field.bytes().await.map_err(|e| ApiError::bad_request(e.body_text()))?;
        // Empty file inputs are submitted as a nameless, zero-length part.
        if file_name.is_empty() && data.is_empty() {
            continue;
        }
        if files.len() >= max_files {
            return Err(ApiError::bad_request(format!("At most {} images are allowed", max_files)));
        }
        if data.len() > MAX_FILE_SIZE {
            return Err(ApiError::bad_request("File too large. Maximum size is 5MB"));
        }
        let content_type = detect_image_type(&data)
            .ok_or_else(|| ApiError::bad_request("Only JPEG, JPG, and PNG files are allowed"))?;

        let stored = storage.save(&file_name, content_type, &data).await?;
        debug!("Stored upload '{}' ({} bytes) as {}", file_name, data.len(), stored.url);
        files.push(stored);
    }

    serde_json::from_value(Value::Object(fields)).map_err(|_| ApiError::bad_request("Invalid form data"))
}
