// Scenario definition
//
// A scenario is one request plus the checks and thresholds applied to it.
// The built-in scenario targets the signing endpoint:
//
//   GET /crypto/sign?message=test&webhookUrl=http%3A%2F%2F127.0.0.1%3A7070%2Fwebhook
//
// success when the status is 200 (signed synchronously) or 202 (queued and
// delivered later through the webhook).

use std::collections::HashSet;
use std::path::Path;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::check::{Check, HttpObservation};
use crate::error::{LoadTestError, Result};
use crate::metrics::{HTTP_REQ_DURATION, HTTP_REQ_FAILED};
use crate::threshold::ThresholdSet;

pub const DEFAULT_BASE_URL: &str = "http://localhost:7070";
pub const DEFAULT_WEBHOOK_URL: &str = "http://127.0.0.1:7070/webhook";
pub const SIGN_PATH: &str = "/crypto/sign";
pub const SIGN_MESSAGE: &str = "test";
pub const SUCCESS_CHECK: &str = "is successful status code";

/// HTTP method of the scenario request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    #[default]
    Get,
}

/// The request issued on every iteration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestSpec {
    #[serde(default)]
    pub method: Method,
    pub url: Url,
}

impl RequestSpec {
    pub fn get(url: Url) -> Self {
        Self {
            method: Method::Get,
            url,
        }
    }

    /// Send the request and turn whatever happens into an observation
    ///
    /// Never fails: transport errors become observations without a status.
    pub async fn send(&self, client: &reqwest::Client) -> HttpObservation {
        let start = Instant::now();

        let request = match self.method {
            Method::Get => client.get(self.url.clone()),
        };

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => return HttpObservation::transport_error(e.to_string(), start.elapsed()),
        };

        let status = response.status().as_u16();
        match response.bytes().await {
            Ok(body) => HttpObservation::response(status, start.elapsed(), body.len() as u64),
            Err(e) => HttpObservation::transport_error(e.to_string(), start.elapsed()),
        }
    }
}

/// A complete load-test scenario
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    pub request: RequestSpec,
    #[serde(default)]
    pub checks: Vec<Check>,
    #[serde(default)]
    pub thresholds: ThresholdSet,
}

impl Scenario {
    /// The signing-endpoint scenario against `base_url`, with callbacks sent to `webhook_url`
    pub fn sign(base_url: &str, webhook_url: &str) -> Result<Self> {
        let thresholds = ThresholdSet::new()
            .with(HTTP_REQ_FAILED, "rate<0.01")?
            .with(HTTP_REQ_DURATION, "p(95)<2000")?;

        Ok(Self {
            name: "sign".to_string(),
            request: RequestSpec::get(sign_url(base_url, SIGN_MESSAGE, webhook_url)?),
            checks: vec![Check::status_in(SUCCESS_CHECK, [200, 202])],
            thresholds,
        })
    }

    /// The signing scenario with its stock endpoint and webhook
    pub fn default_sign() -> Result<Self> {
        Self::sign(DEFAULT_BASE_URL, DEFAULT_WEBHOOK_URL)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let scenario: Scenario = serde_yaml::from_str(yaml)
            .map_err(|e| LoadTestError::scenario(format!("invalid scenario definition: {e}")))?;
        scenario.validate()?;
        Ok(scenario)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let yaml = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml_str(&yaml)
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Drop every threshold (checks still run)
    pub fn without_thresholds(mut self) -> Self {
        self.thresholds = ThresholdSet::new();
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(LoadTestError::scenario("scenario name must not be empty"));
        }

        if !matches!(self.request.url.scheme(), "http" | "https") {
            return Err(LoadTestError::scenario(format!(
                "unsupported URL scheme '{}'",
                self.request.url.scheme()
            )));
        }

        let mut seen = HashSet::new();
        for check in &self.checks {
            if check.name.trim().is_empty() {
                return Err(LoadTestError::scenario("check name must not be empty"));
            }
            if !seen.insert(check.name.as_str()) {
                return Err(LoadTestError::scenario(format!(
                    "duplicate check name '{}'",
                    check.name
                )));
            }
        }

        self.thresholds.validate()
    }
}

/// Build the signing URL with form-urlencoded query parameters
pub fn sign_url(base_url: &str, message: &str, webhook_url: &str) -> Result<Url> {
    let base = base_url.trim_end_matches('/');
    let mut url = Url::parse(&format!("{base}{SIGN_PATH}"))
        .map_err(|e| LoadTestError::scenario(format!("invalid base URL '{base_url}': {e}")))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(LoadTestError::scenario(format!(
            "unsupported URL scheme '{}'",
            url.scheme()
        )));
    }

    url.query_pairs_mut()
        .clear()
        .append_pair("message", message)
        .append_pair("webhookUrl", webhook_url);

    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXPECTED_URL: &str = "http://localhost:7070/crypto/sign?message=test&webhookUrl=http%3A%2F%2F127.0.0.1%3A7070%2Fwebhook";

    #[test]
    fn test_default_url_matches_literal() {
        let scenario = Scenario::default_sign().unwrap();
        assert_eq!(scenario.request.method, Method::Get);
        assert_eq!(scenario.request.url.as_str(), EXPECTED_URL);
    }

    #[test]
    fn test_query_pairs_decode_to_original_values() {
        let url = sign_url(DEFAULT_BASE_URL, SIGN_MESSAGE, DEFAULT_WEBHOOK_URL).unwrap();
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("message".to_string(), "test".to_string()),
                ("webhookUrl".to_string(), DEFAULT_WEBHOOK_URL.to_string()),
            ]
        );
    }

    #[test]
    fn test_trailing_slash_in_base_url() {
        let url = sign_url("http://localhost:7070/", "test", DEFAULT_WEBHOOK_URL).unwrap();
        assert_eq!(url.as_str(), EXPECTED_URL);
    }

    #[test]
    fn test_rejects_non_http_base_url() {
        assert!(sign_url("ftp://localhost", "test", DEFAULT_WEBHOOK_URL).is_err());
        assert!(sign_url("not a url", "test", DEFAULT_WEBHOOK_URL).is_err());
    }

    #[test]
    fn test_default_thresholds_are_exactly_two() {
        let scenario = Scenario::default_sign().unwrap();
        let thresholds = &scenario.thresholds;

        assert_eq!(thresholds.len(), 2);
        let failed = thresholds.get("http_req_failed").unwrap();
        let duration = thresholds.get("http_req_duration").unwrap();
        assert_eq!(failed.len(), 1);
        assert_eq!(duration.len(), 1);
        assert_eq!(failed[0].source(), "rate<0.01");
        assert_eq!(duration[0].source(), "p(95)<2000");
    }

    #[test]
    fn test_default_check() {
        let scenario = Scenario::default_sign().unwrap();
        assert_eq!(scenario.checks.len(), 1);
        assert_eq!(scenario.checks[0].name, "is successful status code");
    }

    #[test]
    fn test_yaml_round_trip() {
        let scenario = Scenario::default_sign().unwrap();
        let yaml = scenario.to_yaml().unwrap();
        let parsed = Scenario::from_yaml_str(&yaml).unwrap();
        assert_eq!(parsed, scenario);
    }

    #[test]
    fn test_validate_rejects_duplicate_checks() {
        let mut scenario = Scenario::default_sign().unwrap();
        scenario.checks.push(scenario.checks[0].clone());
        assert!(matches!(
            scenario.validate(),
            Err(LoadTestError::Scenario(_))
        ));
    }

    #[test]
    fn test_without_thresholds() {
        let scenario = Scenario::default_sign().unwrap().without_thresholds();
        assert!(scenario.thresholds.is_empty());
        assert_eq!(scenario.checks.len(), 1);
    }
}
