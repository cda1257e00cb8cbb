use reqwest::Client;
use serde::{Serialize, de::DeserializeOwned};

use crate::{error::WeatherError, provider::ProviderId};

/// GET `url` and return the body of a 2xx response.
pub(crate) async fn get_body<Q>(
    http: &Client,
    provider: ProviderId,
    url: &str,
    query: &Q,
) -> Result<String, WeatherError>
where
    Q: Serialize + ?Sized,
{
    tracing::debug!(%provider, url, "sending request");

    let res = http.get(url).query(query).send().await.map_err(|e| {
        WeatherError::ProviderTransport { provider, reason: without_url(&e) }
    })?;

    let status = res.status();
    let body = res
        .text()
        .await
        .map_err(|e| WeatherError::format(provider, format!("failed to read body: {e}")))?;

    if !status.is_success() {
        return Err(WeatherError::ProviderHttp {
            provider,
            status: status.as_u16(),
            body: truncate_body(&body),
        });
    }

    Ok(body)
}

pub(crate) fn parse_json<T: DeserializeOwned>(
    provider: ProviderId,
    body: &str,
) -> Result<T, WeatherError> {
    serde_json::from_str(body).map_err(|e| {
        WeatherError::format(provider, format!("{e}; body: {}", truncate_body(body)))
    })
}

/// Request URLs carry API keys in the query string.
fn without_url(err: &reqwest::Error) -> String {
    let mut err_str = err.to_string();
    if let Some(url) = err.url() {
        err_str = err_str.replace(url.as_str(), "<url>");
    }
    err_str
}

pub(crate) fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    if body.len() <= MAX {
        return body.to_string();
    }
    let mut end = MAX;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}
