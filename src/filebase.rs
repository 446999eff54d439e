//! Client for the Filebase flavour of the IPFS Pinning Service API.
//! https://docs.filebase.com/api-documentation/ipfs-pinning-service-api

use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use log::{debug, info, warn};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::config::{bucket_token, DELEGATES, ORIGINS, REQUEST_TIMEOUT_SECS};
use crate::error::{send_json, Result};
use crate::metadata::unknown_delegates;
use crate::reconcile::PinTarget;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PinStatus {
  Queued,
  Pinning,
  Pinned,
  Failed,
}

impl PinStatus {
  pub fn as_str(&self) -> &'static str {
    match self {
      PinStatus::Queued => "queued",
      PinStatus::Pinning => "pinning",
      PinStatus::Pinned => "pinned",
      PinStatus::Failed => "failed",
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PinData {
  pub cid: String,
  #[serde(default)]
  pub name: Option<String>,
  #[serde(default)]
  pub origins: Vec<String>,
  #[serde(default)]
  pub meta: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PinResult {
  pub requestid: String,
  pub status: PinStatus,
  pub created: DateTime<Utc>,
  pub pin: PinData,
  #[serde(default)]
  pub delegates: Vec<String>,
}

/// Body of `GET /pins`. `count` is the number of pins matching the query,
/// `results` at most `limit` of them, newest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetPinsResponse {
  pub count: u64,
  #[serde(default)]
  pub results: Vec<PinResult>,
}

/// Filters of `GET /pins`. An empty `status` leaves the service default,
/// which only lists pinned content.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListQuery {
  pub cid: Option<String>,
  pub status: Vec<PinStatus>,
  pub before: Option<DateTime<Utc>>,
  pub after: Option<DateTime<Utc>>,
  pub limit: Option<u32>,
}

impl ListQuery {
  pub fn params(&self) -> Vec<(&'static str, String)> {
    let mut params = Vec::new();
    if let Some(ref cid) = self.cid {
      params.push(("cid", cid.clone()));
    }
    if !self.status.is_empty() {
      let status: Vec<&str> = self.status.iter().map(PinStatus::as_str).collect();
      params.push(("status", status.join(",")));
    }
    if let Some(before) = self.before {
      params.push(("before", format_date(before)));
    }
    if let Some(after) = self.after {
      params.push(("after", format_date(after)));
    }
    if let Some(limit) = self.limit {
      params.push(("limit", limit.to_string()));
    }
    params
  }
}

fn format_date(date: DateTime<Utc>) -> String {
  date.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Anything able to answer a bucket listing, the real service or a test double.
pub trait PinLister {
  fn list(&self, bucket_name: &str, query: &ListQuery) -> Result<GetPinsResponse>;
}

pub struct FilebasePinApi {
  client: Client,
  api_url: String,
}

impl FilebasePinApi {
  pub fn new(api_url: &str) -> Result<Self> {
    let client = Client::builder()
      .user_agent(concat!("pin-mirror/", env!("CARGO_PKG_VERSION")))
      .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
      .build()?;
    Ok(FilebasePinApi {
      client,
      api_url: api_url.trim_end_matches('/').to_string(),
    })
  }

  pub fn get_list(&self, bucket_name: &str, query: &ListQuery) -> Result<GetPinsResponse> {
    info!(
      "Listing bucket {} with status: {:?}, before: {:?}, after: {:?}, limit: {:?}",
      bucket_name, query.status, query.before, query.after, query.limit
    );
    let token = bucket_token(bucket_name)?;
    let request = self
      .client
      .get(&self.api_url)
      .bearer_auth(token)
      .query(&query.params());
    send_json(request)
  }

  /// Every pin request of the bucket for a single CID.
  pub fn get_file(&self, bucket_name: &str, cid: &str) -> Result<GetPinsResponse> {
    let query = ListQuery {
      cid: Some(cid.to_string()),
      ..ListQuery::default()
    };
    self.get_list(bucket_name, &query)
  }

  pub fn pin_cid(&self, bucket_name: &str, cid: &str) -> Result<PinResult> {
    info!("Pinning CID {} in bucket {}", cid, bucket_name);
    let token = bucket_token(bucket_name)?;
    let request = self
      .client
      .post(&self.api_url)
      .bearer_auth(token)
      .json(&json!({ "cid": cid, "origins": ORIGINS }));
    let result: PinResult = send_json(request)?;
    for delegate in unknown_delegates(&result.delegates, DELEGATES) {
      warn!(
        "{} is not in DELEGATES, you should add it manually to the IPFS nodes!",
        delegate
      );
    }
    Ok(result)
  }

  pub fn replace_pin(&self, bucket_name: &str, requestid: &str, cid: &str) -> Result<PinResult> {
    info!("Replacing pin {} with CID {}", requestid, cid);
    let token = bucket_token(bucket_name)?;
    let request = self
      .client
      .post(format!("{}/{}", self.api_url, requestid))
      .bearer_auth(token)
      .json(&json!({ "cid": cid, "origins": ORIGINS }));
    send_json(request)
  }

  /// Re-submits every pin of the bucket the service gave up on.
  /// Returns how many were replaced and how many could not be.
  pub fn replace_failed(&self, bucket_name: &str, limit: u32) -> Result<(usize, usize)> {
    let query = ListQuery {
      status: vec![PinStatus::Failed],
      limit: Some(limit),
      ..ListQuery::default()
    };
    let failed = self.get_list(bucket_name, &query)?;
    if failed.count > failed.results.len() as u64 {
      warn!(
        "{} failed pins in {}, only {} handled in this run",
        failed.count,
        bucket_name,
        failed.results.len()
      );
    }
    let (mut replaced, mut errored) = (0, 0);
    for item in failed.results {
      match self.replace_pin(bucket_name, &item.requestid, &item.pin.cid) {
        Ok(_) => {
          info!("Pin replaced for cid: {}", item.pin.cid);
          replaced += 1;
        }
        Err(e) => {
          log::error!("Error re-pinning CID {}: {}", item.pin.cid, e);
          errored += 1;
        }
      }
    }
    Ok((replaced, errored))
  }
}

impl PinLister for FilebasePinApi {
  fn list(&self, bucket_name: &str, query: &ListQuery) -> Result<GetPinsResponse> {
    self.get_list(bucket_name, query)
  }
}

/// A bucket as the destination of a reconciliation run.
pub struct RemoteBucket<'a> {
  pub api: &'a FilebasePinApi,
  pub bucket_name: String,
}

impl PinTarget for RemoteBucket<'_> {
  fn describe(&self) -> String {
    format!("filebase bucket {}", self.bucket_name)
  }

  fn pin(&self, cid: &str) -> Result<()> {
    let result = self.api.pin_cid(&self.bucket_name, cid)?;
    debug!("{} is {} under request {}", cid, result.status.as_str(), result.requestid);
    Ok(())
  }
}


#[cfg(test)]
mod tests {
  use super::*;
  use chrono::TimeZone;

  const LIST_PAGE: &str = r#"{
    "count": 2,
    "results": [
      {
        "requestid": "UniqueIdOfPinRequest",
        "status": "pinned",
        "created": "2024-05-01T10:20:30.123Z",
        "pin": {
          "cid": "QmCIDToBePinned",
          "name": "PreciousData.pdf",
          "origins": [],
          "meta": {"app_id": "99986338-1113-4706-8302-4420da6158aa"}
        },
        "delegates": [
          "/dns4/ipfs-pin-0.vin1.filebase.io/tcp/4001/p2p/12D3KooWNvyc1NoeTF6SynHuq5exmsMs7YyE1UFp9YhsiYw2px9B"
        ],
        "info": {"status_details": "Queue position: 7 of 9"}
      },
      {
        "requestid": "Another",
        "status": "queued",
        "created": "2024-05-01T09:00:00+00:00",
        "pin": {"cid": "bafybeigdyrzt5sfp7udm7hu76uh7y26nf3efuylqabf3oclgtqy55fbzdi"}
      }
    ]
  }"#;

  #[test]
  fn parses_a_listing_page() {
    let page: GetPinsResponse = serde_json::from_str(LIST_PAGE).unwrap();
    assert_eq!(page.count, 2);
    assert_eq!(page.results.len(), 2);

    let first = &page.results[0];
    assert_eq!(first.status, PinStatus::Pinned);
    assert_eq!(first.pin.cid, "QmCIDToBePinned");
    assert_eq!(first.delegates.len(), 1);
    assert_eq!(
      first.created,
      Utc.with_ymd_and_hms(2024, 5, 1, 10, 20, 30).unwrap() + chrono::Duration::milliseconds(123)
    );

    let second = &page.results[1];
    assert_eq!(second.status, PinStatus::Queued);
    assert!(second.delegates.is_empty());
    assert!(second.pin.origins.is_empty());
  }

  #[test]
  fn rejects_a_page_without_count() {
    let broken = r#"{"results": []}"#;
    assert!(serde_json::from_str::<GetPinsResponse>(broken).is_err());
  }

  #[test]
  fn query_parameters() {
    let query = ListQuery {
      status: vec![PinStatus::Queued, PinStatus::Pinning, PinStatus::Pinned],
      before: Some(Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap()),
      limit: Some(1000),
      ..ListQuery::default()
    };
    assert_eq!(
      query.params(),
      vec![
        ("status", "queued,pinning,pinned".to_string()),
        ("before", "2024-05-01T00:00:00.000000Z".to_string()),
        ("limit", "1000".to_string()),
      ]
    );
    assert!(ListQuery::default().params().is_empty());
  }
}
