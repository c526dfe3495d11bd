use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::error::SourcingError;

/// One search request as entered by the user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourcingParams {
    pub material: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keywords: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country_filter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_requirements: Option<String>,
    /// Data URI (`data:image/png;base64,...`) or bare base64.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_mime_type: Option<String>,
}

/// Image payload ready for transmission: base64 without the data-URI prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineImage {
    pub mime_type: String,
    pub data: String,
}

impl SourcingParams {
    pub fn new(material: impl Into<String>) -> Self {
        Self {
            material: material.into(),
            ..Self::default()
        }
    }

    /// True when there is something to search for. Enforced by the front end,
    /// not by the search itself.
    pub fn has_query(&self) -> bool {
        !self.material.trim().is_empty() || self.has_image()
    }

    pub fn has_image(&self) -> bool {
        self.image_data
            .as_deref()
            .map(|data| !data.trim().is_empty())
            .unwrap_or(false)
    }

    pub fn inline_image(&self) -> Result<Option<InlineImage>, SourcingError> {
        let Some(raw) = self
            .image_data
            .as_deref()
            .map(str::trim)
            .filter(|data| !data.is_empty())
        else {
            return Ok(None);
        };

        let (header_mime, payload) = match raw.strip_prefix("data:") {
            Some(rest) => {
                let (header, payload) = rest.split_once(',').ok_or_else(|| {
                    SourcingError::InvalidInput("image data URI has no payload".to_string())
                })?;
                let mime = header
                    .split(';')
                    .next()
                    .map(str::trim)
                    .filter(|mime| !mime.is_empty())
                    .map(str::to_string);
                (mime, payload.trim())
            }
            None => (None, raw),
        };

        let mime_type = self
            .image_mime_type
            .as_deref()
            .map(str::trim)
            .filter(|mime| !mime.is_empty())
            .map(str::to_string)
            .or(header_mime)
            .ok_or_else(|| {
                SourcingError::InvalidInput("image mime type is required with image data".to_string())
            })?;

        if payload.is_empty() {
            return Err(SourcingError::InvalidInput("image payload is empty".to_string()));
        }
        BASE64.decode(payload.as_bytes()).map_err(|err| {
            SourcingError::InvalidInput(format!("image payload is not valid base64: {err}"))
        })?;

        Ok(Some(InlineImage {
            mime_type,
            data: payload.to_string(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_image_yields_none() {
        let params = SourcingParams::new("Polypropylene Resin");
        assert!(params.has_query());
        assert_eq!(params.inline_image().unwrap(), None);
    }

    #[test]
    fn data_uri_prefix_is_stripped() {
        let params = SourcingParams {
            image_data: Some("data:image/png;base64,aGVsbG8=".to_string()),
            image_mime_type: Some("image/png".to_string()),
            ..SourcingParams::default()
        };
        assert!(params.has_query());
        let image = params.inline_image().unwrap().unwrap();
        assert_eq!(image.data, "aGVsbG8=");
        assert_eq!(image.mime_type, "image/png");
    }

    #[test]
    fn mime_type_falls_back_to_data_uri_header() {
        let params = SourcingParams {
            image_data: Some("data:image/webp;base64,aGVsbG8=".to_string()),
            ..SourcingParams::default()
        };
        let image = params.inline_image().unwrap().unwrap();
        assert_eq!(image.mime_type, "image/webp");
    }

    #[test]
    fn bare_base64_requires_explicit_mime() {
        let params = SourcingParams {
            image_data: Some("aGVsbG8=".to_string()),
            ..SourcingParams::default()
        };
        let err = params.inline_image().unwrap_err();
        assert!(matches!(err, SourcingError::InvalidInput(_)));
    }

    #[test]
    fn invalid_base64_is_rejected() {
        let params = SourcingParams {
            image_data: Some("data:image/png;base64,@@not-base64@@".to_string()),
            ..SourcingParams::default()
        };
        assert!(matches!(
            params.inline_image(),
            Err(SourcingError::InvalidInput(_))
        ));
    }

    #[test]
    fn blank_material_without_image_has_no_query() {
        assert!(!SourcingParams::new("   ").has_query());
    }
}
