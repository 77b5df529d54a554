// 📮 Postal Code Lookup - CEP existence and address details over HTTP
// One blocking client, one timeout for every request

use crate::error::RecordError;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Digits of a valid CEP
pub const CEP_DIGITS: usize = 8;

/// Address fields returned for an existing CEP
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Address {
    #[serde(default)]
    pub logradouro: Option<String>,

    #[serde(default)]
    pub bairro: Option<String>,

    #[serde(default)]
    pub localidade: Option<String>,

    #[serde(default)]
    pub uf: Option<String>,
}

/// Remote lookup of one postal code.
///
/// # Returns
/// * `Ok(Some(Address))` - the code exists
/// * `Ok(None)` - the service answered and the code does not exist
/// * `Err(RecordError::RemoteLookup)` - network or service failure
pub trait CepLookup {
    fn lookup(&self, cep: &str) -> Result<Option<Address>, RecordError>;
}

/// Trimmed value without '-' when it is exactly 8 ASCII digits
pub fn clean_cep(raw: &str) -> Option<String> {
    let v: String = raw.trim().chars().filter(|&c| c != '-').collect();
    (v.len() == CEP_DIGITS && v.chars().all(|c| c.is_ascii_digit())).then_some(v)
}

// ============================================================================
// OPENCEP CLIENT
// ============================================================================

pub struct OpenCepClient {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl OpenCepClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, RecordError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RecordError::RemoteLookup {
                key: base_url.to_string(),
                reason: e.to_string(),
            })?;
        Ok(OpenCepClient {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, cep: &str) -> String {
        format!("{}/{}.json", self.base_url, cep)
    }
}

impl CepLookup for OpenCepClient {
    fn lookup(&self, cep: &str) -> Result<Option<Address>, RecordError> {
        let failure = |reason: String| RecordError::RemoteLookup {
            key: cep.to_string(),
            reason,
        };

        let response = self.client.get(self.url(cep)).send().map_err(|e| failure(e.to_string()))?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND || status == StatusCode::BAD_REQUEST {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(failure(format!("HTTP {}", status)));
        }

        let body: serde_json::Value = response.json().map_err(|e| failure(e.to_string()))?;
        if body.get("erro").is_some() {
            return Ok(None);
        }
        serde_json::from_value(body)
            .map(Some)
            .map_err(|e| failure(e.to_string()))
    }
}
