//! Base map layer: either a plain fill or a raster fetched for the bbox.

use std::{collections::BTreeMap, time::Duration};

use base64::{Engine, engine::general_purpose::STANDARD};
use reqwest::{Client, StatusCode};
use thiserror::Error;
use tracing::{debug, warn};

use crate::domain::geo::{BBox, PageSize};

/// Theme name that never fetches anything.
pub const OFFLINE_THEME: &str = "offline";

/// Raster embedded beneath the map layers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackgroundImage {
    pub mimetype: &'static str,
    pub data: Vec<u8>,
}

impl BackgroundImage {
    pub fn png(data: Vec<u8>) -> Self {
        Self {
            mimetype: "image/png",
            data,
        }
    }

    pub fn data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mimetype, STANDARD.encode(&self.data))
    }
}

#[derive(Debug, Error)]
pub enum BackgroundError {
    #[error("failed to build http client: {0}")]
    Client(reqwest::Error),
    #[error("tile request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("tile server answered {0}")]
    Status(StatusCode),
}

/// Resolves theme names to URL templates and fetches the page background.
#[derive(Debug, Clone)]
pub struct BackgroundSource {
    client: Option<Client>,
    themes: BTreeMap<String, String>,
    default_theme: String,
}

impl BackgroundSource {
    pub fn new(
        themes: BTreeMap<String, String>,
        default_theme: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, BackgroundError> {
        let client = Client::builder()
            .user_agent(concat!("kartenwerk/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(BackgroundError::Client)?;
        Ok(Self {
            client: Some(client),
            themes,
            default_theme: default_theme.into(),
        })
    }

    /// Source that always paints the plain base fill.
    pub fn offline() -> Self {
        Self {
            client: None,
            themes: BTreeMap::new(),
            default_theme: OFFLINE_THEME.to_string(),
        }
    }

    /// URL for the theme, or `None` when the theme paints no raster.
    pub fn url_for(&self, theme: Option<&str>, bbox: &BBox, page: PageSize) -> Option<String> {
        let theme = theme
            .map(str::trim)
            .filter(|theme| !theme.is_empty())
            .unwrap_or(self.default_theme.as_str());
        if theme == OFFLINE_THEME {
            return None;
        }
        let template = self.themes.get(theme)?;
        Some(
            template
                .replace("{bbox}", &bbox.to_query())
                .replace("{width}", &page.width.to_string())
                .replace("{height}", &page.height.to_string()),
        )
    }

    /// Fetch the background; failures degrade to the base fill.
    pub async fn fetch(
        &self,
        theme: Option<&str>,
        bbox: &BBox,
        page: PageSize,
    ) -> Option<BackgroundImage> {
        let url = self.url_for(theme, bbox, page)?;
        let client = self.client.as_ref()?;

        match download(client, &url).await {
            Ok(image) => {
                debug!(
                    target = "kartenwerk::render",
                    url = %url,
                    bytes = image.data.len(),
                    "Fetched map background"
                );
                Some(image)
            }
            Err(err) => {
                warn!(
                    target = "kartenwerk::render",
                    url = %url,
                    error = %err,
                    "Background fetch failed; rendering on plain base"
                );
                None
            }
        }
    }
}

async fn download(client: &Client, url: &str) -> Result<BackgroundImage, BackgroundError> {
    let response = client.get(url).send().await?;
    if response.status() != StatusCode::OK {
        return Err(BackgroundError::Status(response.status()));
    }
    let bytes = response.bytes().await?;
    Ok(BackgroundImage::png(bytes.to_vec()))
}
