use std::collections::HashMap;
use std::time::Duration;

use reqwest::{Client, Url};

use crate::error::FetchError;
use crate::target::{LookupTarget, SearchAttribute};
use crate::types::{AppRecord, LookupResponse, SearchResponse};

/// Maximum identifiers per lookup request; longer id lists are chunked.
pub const LOOKUP_CHUNK_SIZE: usize = 100;

/// HTTP client for the storefront ranking (search) and lookup endpoints.
///
/// The search endpoint returns the full ranked identifier set in display
/// order with no server-side limit; the lookup endpoint returns metadata
/// records in arbitrary order. Use [`AppStoreClient::new`] for production or
/// [`AppStoreClient::with_base_url`] to point at a mock server in tests.
pub struct AppStoreClient {
    client: Client,
    base_url: Url,
}

impl AppStoreClient {
    /// Creates a client from application configuration.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed, or [`FetchError::InvalidBaseUrl`] if the
    /// configured base URL does not parse.
    pub fn new(config: &nugget_core::AppConfig) -> Result<Self, FetchError> {
        Self::with_base_url(
            &config.api_base_url,
            config.request_timeout_secs,
            &config.user_agent,
        )
    }

    /// Creates a client with a custom base URL (for testing with wiremock).
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed, or [`FetchError::InvalidBaseUrl`] if
    /// `base_url` is not a valid URL.
    pub fn with_base_url(
        base_url: &str,
        timeout_secs: u64,
        user_agent: &str,
    ) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .build()?;

        // Normalise: ensure the base URL ends with exactly one slash so that
        // joining the endpoint path appends rather than replacing the last
        // path segment.
        let normalised = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalised).map_err(|e| FetchError::InvalidBaseUrl {
            url: base_url.to_owned(),
            reason: e.to_string(),
        })?;

        Ok(Self { client, base_url })
    }

    /// Fetches the ranked identifier sequence for a search term.
    ///
    /// Returns identifiers in authoritative display order, deduplicated by
    /// first occurrence and truncated to `cap` client-side (the endpoint has
    /// no limit parameter). An empty result means the storefront has no apps
    /// for this term; it is **not** an error.
    ///
    /// `attribute` narrows the term search to a single metadata field; only
    /// the software allow-list in [`SearchAttribute`] is accepted upstream.
    ///
    /// # Errors
    ///
    /// - [`FetchError::Http`] on network failure or timeout.
    /// - [`FetchError::UnexpectedStatus`] on a non-2xx response.
    /// - [`FetchError::Deserialize`] if the body does not match the
    ///   expected bubble shape.
    pub async fn fetch_ranked_ids(
        &self,
        term: &str,
        country: &str,
        lang: &str,
        cap: usize,
        attribute: Option<SearchAttribute>,
    ) -> Result<Vec<i64>, FetchError> {
        if cap == 0 {
            return Ok(Vec::new());
        }

        let mut params = vec![
            ("term", term),
            ("country", country),
            ("lang", lang),
            ("media", "software"),
        ];
        if let Some(attribute) = attribute {
            params.push(("attribute", attribute.as_str()));
        }

        let url = self.endpoint_url("search", &params);
        let body = self.get_json(url).await?;
        let parsed: SearchResponse =
            serde_json::from_value(body).map_err(|e| FetchError::Deserialize {
                context: format!("search(term={term})"),
                source: e,
            })?;

        let ranked = parsed
            .bubbles
            .into_iter()
            .next()
            .map(|bubble| bubble.results)
            .unwrap_or_default();

        let mut seen = std::collections::HashSet::new();
        let mut ids = Vec::new();
        for entry in ranked {
            if seen.insert(entry.id) {
                ids.push(entry.id);
                if ids.len() == cap {
                    break;
                }
            }
        }
        Ok(ids)
    }

    /// Fetches metadata for a set of identifiers, chunked at
    /// [`LOOKUP_CHUNK_SIZE`] per request.
    ///
    /// The returned map is keyed by identifier; response order is meaningless
    /// and never used. A failed chunk contributes nothing — its identifiers
    /// simply come back without metadata, which the merger records as
    /// omissions — unless **every** chunk fails.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::AllChunksFailed`] when no chunk succeeded.
    pub async fn lookup_by_ids(
        &self,
        ids: &[i64],
        country: &str,
        lang: &str,
    ) -> Result<HashMap<i64, AppRecord>, FetchError> {
        let mut records = HashMap::new();
        if ids.is_empty() {
            return Ok(records);
        }

        let mut chunk_count = 0usize;
        let mut failed_chunks = 0usize;
        let mut last_error: Option<FetchError> = None;

        for chunk in ids.chunks(LOOKUP_CHUNK_SIZE) {
            chunk_count += 1;
            match self.lookup_chunk(chunk, country, lang).await {
                Ok(parsed) => {
                    for record in parsed {
                        records.insert(record.app_id, record);
                    }
                }
                Err(err) => {
                    failed_chunks += 1;
                    tracing::warn!(
                        chunk_len = chunk.len(),
                        error = %err,
                        "lookup chunk failed; its identifiers will be recorded as omissions"
                    );
                    last_error = Some(err);
                }
            }
        }

        if failed_chunks == chunk_count {
            if let Some(err) = last_error {
                return Err(FetchError::AllChunksFailed {
                    chunks: chunk_count,
                    last: err.to_string(),
                });
            }
        }
        Ok(records)
    }

    /// Looks up a single app by a disambiguated target.
    ///
    /// Bundle targets query by `bundleId`; id and URL targets query by the
    /// numeric id. Returns `Ok(None)` when the target carries no resolvable
    /// id (a URL without an `idNNN` segment) or the storefront has no record.
    ///
    /// # Errors
    ///
    /// Propagates any error from the underlying request.
    pub async fn lookup_target(
        &self,
        target: &LookupTarget,
        country: &str,
        lang: &str,
    ) -> Result<Option<AppRecord>, FetchError> {
        let records = match target {
            LookupTarget::BundleId(bundle_id) => {
                let params = [
                    ("bundleId", bundle_id.as_str()),
                    ("country", country),
                    ("lang", lang),
                    ("media", "software"),
                    ("entity", "software"),
                ];
                let url = self.endpoint_url("lookup", &params);
                self.fetch_lookup_records(url, &format!("lookup(bundleId={bundle_id})"))
                    .await?
            }
            LookupTarget::Id(_) | LookupTarget::Url(_) => {
                let Some(id) = target.embedded_id() else {
                    return Ok(None);
                };
                self.lookup_chunk(&[id], country, lang).await?
            }
        };
        Ok(records.into_iter().next())
    }

    /// One lookup request for up to [`LOOKUP_CHUNK_SIZE`] identifiers.
    async fn lookup_chunk(
        &self,
        ids: &[i64],
        country: &str,
        lang: &str,
    ) -> Result<Vec<AppRecord>, FetchError> {
        let id_list = ids
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",");
        let params = [
            ("id", id_list.as_str()),
            ("country", country),
            ("lang", lang),
            // Both fixed to software so only iOS app records come back.
            ("media", "software"),
            ("entity", "software"),
        ];
        let url = self.endpoint_url("lookup", &params);
        let context = format!("lookup({} ids)", ids.len());
        self.fetch_lookup_records(url, &context).await
    }

    /// Sends a lookup request and parses each result entry individually,
    /// skipping entries that do not match the app record shape.
    async fn fetch_lookup_records(
        &self,
        url: Url,
        context: &str,
    ) -> Result<Vec<AppRecord>, FetchError> {
        let body = self.get_json(url).await?;
        let parsed: LookupResponse =
            serde_json::from_value(body).map_err(|e| FetchError::Deserialize {
                context: context.to_owned(),
                source: e,
            })?;

        let records = parsed
            .results
            .into_iter()
            .filter_map(|value| match serde_json::from_value::<AppRecord>(value) {
                Ok(record) => Some(record),
                Err(err) => {
                    tracing::debug!(error = %err, "skipping non-app lookup entry");
                    None
                }
            })
            .collect();
        Ok(records)
    }

    /// Builds the full request URL with properly percent-encoded query
    /// parameters appended to the normalised base.
    fn endpoint_url(&self, path: &str, params: &[(&str, &str)]) -> Url {
        let mut url = self
            .base_url
            .join(path)
            .unwrap_or_else(|_| self.base_url.clone());
        {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in params {
                pairs.append_pair(key, value);
            }
        }
        url
    }

    /// Sends a GET request, asserts a 2xx HTTP status, and parses the
    /// response body as JSON.
    async fn get_json(&self, url: Url) -> Result<serde_json::Value, FetchError> {
        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::UnexpectedStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| FetchError::Deserialize {
            context: url.to_string(),
            source: e,
        })
    }
}

#[cfg(test)]
#[path = "client_test.rs"]
mod tests;
