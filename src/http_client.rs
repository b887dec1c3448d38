use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue, ORIGIN, REFERER, USER_AGENT};

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

// stats.nba.com drops requests that do not look like they come from nba.com.
const BROWSER_HEADERS: &[(&str, &str)] = &[
    ("x-nba-stats-origin", "stats"),
    ("x-nba-stats-token", "true"),
];

pub fn build_http_client(timeout: Duration) -> Result<Client> {
    let mut headers = HeaderMap::new();
    headers.insert(
        USER_AGENT,
        HeaderValue::from_static(
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
             (KHTML, like Gecko) Chrome/120.0 Safari/537.36",
        ),
    );
    headers.insert(ACCEPT, HeaderValue::from_static("application/json, text/plain, */*"));
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
    headers.insert(REFERER, HeaderValue::from_static("https://www.nba.com/"));
    headers.insert(ORIGIN, HeaderValue::from_static("https://www.nba.com"));
    for (name, value) in BROWSER_HEADERS {
        headers.insert(*name, HeaderValue::from_static(*value));
    }

    Client::builder()
        .timeout(timeout)
        .default_headers(headers)
        .build()
        .context("failed to build http client")
}
