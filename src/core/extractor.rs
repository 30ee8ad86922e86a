use std::collections::HashMap;

use axum::{
    body::Body,
    extract::{rejection::JsonRejection, FromRequest, FromRequestParts, Multipart, Request},
    http::request::Parts,
    response::{IntoResponse, Response},
    Json,
};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::core::error::AppError;
use crate::features::auth::model::AuthenticatedUser;

/// Custom JSON extractor that provides consistent error responses
pub struct AppJson<T>(pub T);

impl<T, S> FromRequest<S> for AppJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppJsonRejection;

    async fn from_request(req: Request<Body>, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(value) => Ok(Self(value.0)),
            Err(rejection) => Err(AppJsonRejection(rejection)),
        }
    }
}

pub struct AppJsonRejection(JsonRejection);

impl IntoResponse for AppJsonRejection {
    fn into_response(self) -> Response {
        let message = match self.0 {
            JsonRejection::JsonDataError(err) => format!("Invalid JSON data: {}", err),
            JsonRejection::JsonSyntaxError(err) => format!("Invalid JSON syntax: {}", err),
            JsonRejection::MissingJsonContentType(err) => {
                format!("Missing JSON content type: {}", err)
            }
            _ => "Failed to parse JSON body".to_string(),
        };

        AppError::BadRequest(message).into_response()
    }
}

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or_else(|| AppError::Unauthorized("Authentication required".to_string()))
    }
}

/// A file part read from a multipart form
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub field_name: String,
    pub file_name: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

/// Text fields and file parts of a multipart form, fully buffered
#[derive(Debug, Default)]
pub struct MultipartForm {
    pub fields: HashMap<String, String>,
    pub files: Vec<UploadedFile>,
}

impl MultipartForm {
    /// Drain a multipart body. Parts with a filename are files, the rest are text.
    /// Any single file larger than `max_file_size` is rejected.
    pub async fn read(mut multipart: Multipart, max_file_size: usize) -> Result<Self, AppError> {
        let mut form = MultipartForm::default();

        while let Some(field) = multipart.next_field().await.map_err(|e| {
            debug!("Failed to read multipart field: {}", e);
            AppError::BadRequest(format!("Failed to read multipart data: {}", e))
        })? {
            let field_name = field.name().unwrap_or("").to_string();

            if let Some(file_name) = field.file_name().map(|s| s.to_string()) {
                let content_type = field
                    .content_type()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "application/octet-stream".to_string());

                let data = field.bytes().await.map_err(|e| {
                    debug!("Failed to read file bytes: {}", e);
                    AppError::BadRequest(format!("Failed to read file data: {}", e))
                })?;

                if data.len() > max_file_size {
                    return Err(AppError::PayloadTooLarge(format!(
                        "File '{}' too large. Maximum size is {} MB",
                        file_name,
                        max_file_size / 1024 / 1024
                    )));
                }

                // Browsers send an empty part when no file was chosen
                if data.is_empty() && file_name.is_empty() {
                    continue;
                }

                form.files.push(UploadedFile {
                    field_name,
                    file_name,
                    content_type,
                    data: data.to_vec(),
                });
            } else {
                let text = field.text().await.map_err(|e| {
                    AppError::BadRequest(format!("Failed to read field '{}': {}", field_name, e))
                })?;
                form.fields.insert(field_name, text);
            }
        }

        Ok(form)
    }

    /// Trimmed, non-empty text field
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
    }

    pub fn required_text(&self, name: &str) -> Result<&str, AppError> {
        self.text(name)
            .ok_or_else(|| AppError::Validation(format!("{} is required", name)))
    }

    /// Parse an optional field, reporting the field name on failure
    pub fn parse<T: std::str::FromStr>(&self, name: &str) -> Result<Option<T>, AppError> {
        match self.text(name) {
            Some(raw) => raw
                .parse::<T>()
                .map(Some)
                .map_err(|_| AppError::Validation(format!("{} has an invalid value", name))),
            None => Ok(None),
        }
    }

    pub fn take_file(&mut self, field_name: &str) -> Option<UploadedFile> {
        let index = self
            .files
            .iter()
            .position(|f| f.field_name == field_name)?;
        Some(self.files.remove(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form_with(fields: &[(&str, &str)]) -> MultipartForm {
        MultipartForm {
            fields: fields
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            files: Vec::new(),
        }
    }

    #[test]
    fn test_text_ignores_blank_values() {
        let form = form_with(&[("description", "   "), ("type", " theft ")]);
        assert_eq!(form.text("description"), None);
        assert_eq!(form.text("type"), Some("theft"));
        assert!(form.required_text("description").is_err());
    }

    #[test]
    fn test_parse_reports_invalid_numbers() {
        let form = form_with(&[("lat", "14.5995"), ("lng", "east")]);
        assert_eq!(form.parse::<f64>("lat").unwrap(), Some(14.5995));
        assert!(form.parse::<f64>("lng").is_err());
        assert_eq!(form.parse::<f64>("missing").unwrap(), None);
    }

    #[test]
    fn test_take_file_by_field_name() {
        let mut form = MultipartForm::default();
        form.files.push(UploadedFile {
            field_name: "image".to_string(),
            file_name: "a.png".to_string(),
            content_type: "image/png".to_string(),
            data: vec![1, 2, 3],
        });

        assert!(form.take_file("other").is_none());
        let file = form.take_file("image").unwrap();
        assert_eq!(file.file_name, "a.png");
        assert!(form.files.is_empty());
    }
}
