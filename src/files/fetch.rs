//! Remote byte sources for updates.

use bytes::Bytes;
use futures_util::Stream;
use reqwest::Client;
use tracing::{info, warn};

use crate::store::{Result, StoreError};

/// Start downloading `url` and hand back its body as a byte stream.
///
/// Only the response status is checked here; failures mid-body surface
/// through the stream.
pub async fn fetch_stream(
    client: &Client,
    url: &str,
) -> Result<impl Stream<Item = reqwest::Result<Bytes>>> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| StoreError::Source(Box::new(e)))?;

    if !response.status().is_success() {
        warn!(url = %url, status = %response.status(), "Fetch failed");
        return Err(StoreError::Source(
            format!("{} returned HTTP {}", url, response.status()).into(),
        ));
    }

    info!(
        url = %url,
        content_length = ?response.content_length(),
        "Fetching file"
    );

    Ok(response.bytes_stream())
}
