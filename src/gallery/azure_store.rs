//! Azure Blob Storage over its REST API, authorised with Shared Key.
//!
//! Only the calls the gallery needs: create container, put block blob,
//! set metadata, list blobs with metadata (following continuation markers).

use std::collections::BTreeMap;
use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use hmac::{Hmac, Mac};
use regex::Regex;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::{Method, StatusCode, Url};
use sha2::Sha256;

use super::blob::{join_blob_url, validate_blob_name, BlobError, BlobItem, BlobStore};

const API_VERSION: &str = "2021-08-06";
const REQUEST_TIMEOUT_SECS: u64 = 60;

/// Well-known Azurite / storage emulator account.
const DEV_ACCOUNT: &str = "devstoreaccount1";
const DEV_ACCOUNT_KEY: &str =
    "Eby8vdM02xNOcqFlqUwJPLlmEtlCDXJ1OUzFT50uSRZ6IFsuFq2UVErCz4I6tq/K1SZFPTOtr/KBHBeksoGMGw==";
const DEV_BLOB_ENDPOINT: &str = "http://127.0.0.1:10000/devstoreaccount1";

/// Parsed storage account connection string.
#[derive(Debug, Clone, PartialEq)]
pub struct StorageAccount {
    pub account_name: String,
    pub account_key: Vec<u8>,
    pub blob_endpoint: String,
}

impl StorageAccount {
    /// Parse `Key=Value;...` connection strings, including
    /// `UseDevelopmentStorage=true`.
    pub fn from_connection_string(conn: &str) -> Result<Self, BlobError> {
        let mut fields: BTreeMap<String, String> = BTreeMap::new();
        for part in conn.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            let (key, value) = part
                .split_once('=')
                .ok_or_else(|| BlobError::ConnectionString(format!("segment '{part}' has no '='")))?;
            fields.insert(key.trim().to_ascii_lowercase(), value.trim().to_string());
        }

        if fields
            .get("usedevelopmentstorage")
            .is_some_and(|v| v.eq_ignore_ascii_case("true"))
        {
            return Self::development();
        }

        let account_name = fields
            .get("accountname")
            .cloned()
            .ok_or_else(|| BlobError::ConnectionString("AccountName is missing".into()))?;
        let key_b64 = fields
            .get("accountkey")
            .ok_or_else(|| BlobError::ConnectionString("AccountKey is missing".into()))?;
        let account_key = base64::engine::general_purpose::STANDARD
            .decode(key_b64)
            .map_err(|e| BlobError::ConnectionString(format!("AccountKey is not base64: {e}")))?;

        let blob_endpoint = match fields.get("blobendpoint") {
            Some(endpoint) => endpoint.trim_end_matches('/').to_string(),
            None => {
                let protocol = fields
                    .get("defaultendpointsprotocol")
                    .map(String::as_str)
                    .unwrap_or("https");
                let suffix = fields
                    .get("endpointsuffix")
                    .map(String::as_str)
                    .unwrap_or("core.windows.net");
                format!("{protocol}://{account_name}.blob.{suffix}")
            }
        };

        Ok(Self {
            account_name,
            account_key,
            blob_endpoint,
        })
    }

    fn development() -> Result<Self, BlobError> {
        let account_key = base64::engine::general_purpose::STANDARD
            .decode(DEV_ACCOUNT_KEY)
            .map_err(|e| BlobError::ConnectionString(e.to_string()))?;
        Ok(Self {
            account_name: DEV_ACCOUNT.into(),
            account_key,
            blob_endpoint: DEV_BLOB_ENDPOINT.into(),
        })
    }
}

pub struct AzureBlobStore {
    account: StorageAccount,
    client: reqwest::Client,
}

impl AzureBlobStore {
    pub fn new(account: StorageAccount) -> Result<Self, BlobError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| BlobError::HttpClient(e.to_string()))?;
        Ok(Self { account, client })
    }

    pub fn from_connection_string(conn: &str) -> Result<Self, BlobError> {
        Self::new(StorageAccount::from_connection_string(conn)?)
    }

    fn url(&self, container: &str, name: Option<&str>, query: &[(&str, &str)]) -> Result<Url, BlobError> {
        let raw = match name {
            Some(name) => join_blob_url(&self.account.blob_endpoint, container, name),
            None => format!("{}/{}", self.account.blob_endpoint, container),
        };
        let mut url = Url::parse(&raw).map_err(|e| BlobError::HttpClient(e.to_string()))?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    /// Sign and send one request. Returns the response on 2xx, or a
    /// `Service` error carrying the body otherwise.
    async fn send(
        &self,
        method: Method,
        url: Url,
        mut headers: HeaderMap,
        body: Vec<u8>,
    ) -> Result<reqwest::Response, BlobError> {
        let date = chrono::Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string();
        headers.insert(HeaderName::from_static("x-ms-date"), header_value(&date)?);
        headers.insert(HeaderName::from_static("x-ms-version"), HeaderValue::from_static(API_VERSION));
        headers.insert(CONTENT_LENGTH, HeaderValue::from(body.len()));

        let string_to_sign = string_to_sign(&method, &url, &headers, &self.account.account_name);
        let signature = sign(&self.account.account_key, &string_to_sign)?;
        headers.insert(
            AUTHORIZATION,
            header_value(&format!("SharedKey {}:{}", self.account.account_name, signature))?,
        );

        let response = self
            .client
            .request(method.clone(), url.clone())
            .headers(headers)
            .body(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    BlobError::HttpClient(format!(
                        "Request timed out after {REQUEST_TIMEOUT_SECS}s"
                    ))
                } else {
                    BlobError::HttpClient(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(%method, path = url.path(), status = status.as_u16(), "Blob storage request failed");
            return Err(BlobError::Service {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl BlobStore for AzureBlobStore {
    async fn ensure_container(&self, container: &str) -> Result<(), BlobError> {
        validate_blob_name(container)?;
        let url = self.url(container, None, &[("restype", "container")])?;
        let mut headers = HeaderMap::new();
        // Images are rendered straight from their blob URIs.
        headers.insert(
            HeaderName::from_static("x-ms-blob-public-access"),
            HeaderValue::from_static("blob"),
        );
        match self.send(Method::PUT, url, headers, Vec::new()).await {
            Ok(_) => {
                tracing::info!(container, "Blob container created");
                Ok(())
            }
            Err(BlobError::Service { status, .. }) if status == StatusCode::CONFLICT.as_u16() => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn upload(
        &self,
        container: &str,
        name: &str,
        data: &[u8],
        content_type: &str,
    ) -> Result<(), BlobError> {
        validate_blob_name(name)?;
        let url = self.url(container, Some(name), &[])?;
        let mut headers = HeaderMap::new();
        headers.insert(HeaderName::from_static("x-ms-blob-type"), HeaderValue::from_static("BlockBlob"));
        let content_type = if content_type.is_empty() {
            mime_guess::from_path(name).first_or_octet_stream().to_string()
        } else {
            content_type.to_string()
        };
        headers.insert(CONTENT_TYPE, header_value(&content_type)?);

        self.send(Method::PUT, url, headers, data.to_vec()).await?;
        tracing::debug!(container, name, size = data.len(), "Blob uploaded");
        Ok(())
    }

    async fn set_metadata(
        &self,
        container: &str,
        name: &str,
        metadata: &BTreeMap<String, String>,
    ) -> Result<(), BlobError> {
        validate_blob_name(name)?;
        let url = self.url(container, Some(name), &[("comp", "metadata")])?;
        let mut headers = HeaderMap::new();
        for (key, value) in metadata {
            let header = HeaderName::from_bytes(format!("x-ms-meta-{key}").as_bytes())
                .map_err(|_| BlobError::InvalidMetadata(key.clone()))?;
            let value = HeaderValue::from_str(value)
                .map_err(|_| BlobError::InvalidMetadata(key.clone()))?;
            headers.insert(header, value);
        }
        self.send(Method::PUT, url, headers, Vec::new()).await?;
        Ok(())
    }

    async fn list_with_metadata(&self, container: &str) -> Result<Vec<BlobItem>, BlobError> {
        let mut items = Vec::new();
        let mut marker: Option<String> = None;

        loop {
            let mut query = vec![("restype", "container"), ("comp", "list"), ("include", "metadata")];
            if let Some(m) = marker.as_deref() {
                query.push(("marker", m));
            }
            let url = self.url(container, None, &query)?;
            let response = self.send(Method::GET, url, HeaderMap::new(), Vec::new()).await?;
            let xml = response
                .text()
                .await
                .map_err(|e| BlobError::Listing(e.to_string()))?;

            let page = parse_blob_listing(&xml)?;
            items.extend(page.items);
            match page.next_marker {
                Some(next) => marker = Some(next),
                None => break,
            }
        }

        Ok(items)
    }

    fn blob_uri(&self, container: &str, name: &str) -> String {
        join_blob_url(&self.account.blob_endpoint, container, name)
    }
}

fn header_value(value: &str) -> Result<HeaderValue, BlobError> {
    HeaderValue::from_str(value).map_err(|e| BlobError::HttpClient(e.to_string()))
}

fn sign(key: &[u8], string_to_sign: &str) -> Result<String, BlobError> {
    let mut mac = Hmac::<Sha256>::new_from_slice(key)
        .map_err(|e| BlobError::ConnectionString(e.to_string()))?;
    mac.update(string_to_sign.as_bytes());
    Ok(base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes()))
}

/// Shared Key string-to-sign for the Blob service (version 2015-02-21+).
fn string_to_sign(method: &Method, url: &Url, headers: &HeaderMap, account: &str) -> String {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string()
    };
    let content_length = match header("content-length").as_str() {
        "0" => String::new(),
        other => other.to_string(),
    };

    let mut ms_headers: Vec<(String, String)> = headers
        .iter()
        .filter(|(name, _)| name.as_str().starts_with("x-ms-"))
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                value.to_str().unwrap_or("").trim().to_string(),
            )
        })
        .collect();
    ms_headers.sort();
    let canonical_headers: String = ms_headers
        .iter()
        .map(|(name, value)| format!("{name}:{value}\n"))
        .collect();

    let mut params: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (key, value) in url.query_pairs() {
        params
            .entry(key.to_lowercase())
            .or_default()
            .push(value.into_owned());
    }
    let mut canonical_resource = format!("/{account}{}", url.path());
    for (key, mut values) in params {
        values.sort();
        canonical_resource.push_str(&format!("\n{key}:{}", values.join(",")));
    }

    [
        method.as_str().to_string(),
        header("content-encoding"),
        header("content-language"),
        content_length,
        header("content-md5"),
        header("content-type"),
        String::new(), // Date: x-ms-date is used instead
        header("if-modified-since"),
        header("if-match"),
        header("if-none-match"),
        header("if-unmodified-since"),
        header("range"),
    ]
    .join("\n")
        + "\n"
        + &canonical_headers
        + &canonical_resource
}

struct ListingPage {
    items: Vec<BlobItem>,
    next_marker: Option<String>,
}

fn listing_patterns() -> &'static (Regex, Regex, Regex, Regex, Regex) {
    static PATTERNS: OnceLock<(Regex, Regex, Regex, Regex, Regex)> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        (
            Regex::new(r"(?s)<Blob>(.*?)</Blob>").expect("valid regex"),
            Regex::new(r"(?s)<Name>(.*?)</Name>").expect("valid regex"),
            Regex::new(r"(?s)<Metadata>(.*?)</Metadata>").expect("valid regex"),
            Regex::new(r"(?s)<([A-Za-z_][A-Za-z0-9_\-]*)>(.*?)</([A-Za-z_][A-Za-z0-9_\-]*)>")
                .expect("valid regex"),
            Regex::new(r"(?s)<NextMarker>(.*?)</NextMarker>").expect("valid regex"),
        )
    })
}

/// Extract blobs and the continuation marker from a List Blobs response.
fn parse_blob_listing(xml: &str) -> Result<ListingPage, BlobError> {
    let (blob_re, name_re, metadata_re, element_re, marker_re) = listing_patterns();
    if !xml.contains("EnumerationResults") {
        return Err(BlobError::Listing("missing EnumerationResults element".into()));
    }

    let mut items = Vec::new();
    for blob in blob_re.captures_iter(xml) {
        let body = &blob[1];
        let name = name_re
            .captures(body)
            .map(|c| xml_unescape(&c[1]))
            .ok_or_else(|| BlobError::Listing("blob without a name".into()))?;

        let mut metadata = BTreeMap::new();
        if let Some(meta) = metadata_re.captures(body) {
            for element in element_re.captures_iter(&meta[1]) {
                if element[1] == element[3] {
                    metadata.insert(element[1].to_string(), xml_unescape(&element[2]));
                }
            }
        }
        items.push(BlobItem { name, metadata });
    }

    let next_marker = marker_re
        .captures(xml)
        .map(|c| xml_unescape(&c[1]))
        .filter(|m| !m.is_empty());

    Ok(ListingPage { items, next_marker })
}

fn entity_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"&(lt|gt|quot|apos|amp|#[0-9]+|#[xX][0-9A-Fa-f]+);").expect("valid regex")
    })
}

/// Decode the predefined entities and numeric character references in one
/// pass. Unknown or out-of-range references are left as written.
fn xml_unescape(raw: &str) -> String {
    entity_pattern()
        .replace_all(raw, |caps: &regex::Captures| {
            let entity = &caps[1];
            let decoded = match entity {
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                "amp" => Some('&'),
                _ => {
                    let code = match entity.strip_prefix("#x").or_else(|| entity.strip_prefix("#X")) {
                        Some(hex) => u32::from_str_radix(hex, 16).ok(),
                        None => entity[1..].parse::<u32>().ok(),
                    };
                    code.and_then(char::from_u32)
                }
            };
            decoded.map_or_else(|| caps[0].to_string(), String::from)
        })
        .into_owned()
}
