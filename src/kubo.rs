//! Thin wrapper over the RPC of a Kubo (go-ipfs) node.
//! https://docs.ipfs.tech/reference/kubo/rpc/

use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::Duration;

use clap::ValueEnum;
use log::{debug, info, warn};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

use crate::config::{PIN_LS_TIMEOUT_SECS, REQUEST_TIMEOUT_SECS};
use crate::error::{send_json, Error, Result};
use crate::reconcile::PinTarget;
use crate::store::save_json;

/// Filter of `pin/ls`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PinType {
  All,
  Direct,
  Indirect,
  Recursive,
}

impl PinType {
  pub fn as_str(&self) -> &'static str {
    match self {
      PinType::All => "all",
      PinType::Direct => "direct",
      PinType::Indirect => "indirect",
      PinType::Recursive => "recursive",
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PinLsObject {
  #[serde(rename = "Type")]
  pub pin_type: String,
  #[serde(rename = "Name", default, skip_serializing_if = "Option::is_none")]
  pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PinLsResponse {
  #[serde(rename = "Keys", default)]
  pub keys: BTreeMap<String, PinLsObject>,
}

impl PinLsResponse {
  pub fn cids(&self) -> BTreeSet<&str> {
    self.keys.keys().map(String::as_str).collect()
  }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PinAddResponse {
  #[serde(rename = "Pins", default)]
  pub pins: Vec<String>,
  #[serde(rename = "Progress", default)]
  pub progress: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct IdResponse {
  #[serde(rename = "ID")]
  pub id: String,
  #[serde(rename = "AgentVersion", default)]
  pub agent_version: String,
  #[serde(rename = "Addresses", default)]
  pub addresses: Option<Vec<String>>,
  #[serde(rename = "Protocols", default)]
  pub protocols: Option<Vec<String>>,
  #[serde(rename = "PublicKey", default)]
  pub public_key: String,
}

pub struct KuboRpc {
  client: Client,
  api_url: String,
  pin_timeout: Duration,
}

impl KuboRpc {
  pub fn new(api_url: &str) -> Result<Self> {
    let client = Client::builder()
      .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
      .build()?;
    Ok(KuboRpc {
      client,
      api_url: api_url.trim_end_matches('/').to_string(),
      pin_timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
    })
  }

  /// Timeout of every `pin/add` issued through [`PinTarget`].
  pub fn with_pin_timeout(mut self, timeout: Duration) -> Self {
    self.pin_timeout = timeout;
    self
  }

  fn endpoint(&self, path: &str) -> String {
    format!("{}/{}", self.api_url, path)
  }

  /// Node identity, a cheap way of checking the daemon answers at all.
  pub fn id(&self) -> Result<IdResponse> {
    send_json(self.client.post(self.endpoint("id")))
  }

  pub fn pin_add(&self, cid: &str, timeout: Duration) -> Result<PinAddResponse> {
    debug!("Pinning CID {}", cid);
    let request = self
      .client
      .post(self.endpoint("pin/add"))
      .query(&[("arg", cid)])
      .timeout(timeout);
    let response: PinAddResponse = send_json(request)?;
    info!("CID {} pinned successfully", cid);
    Ok(response)
  }

  pub fn pin_ls(&self, pin_type: PinType) -> Result<PinLsResponse> {
    info!("Requesting pin/ls to the daemon for pin type {}", pin_type.as_str());
    let request = self
      .client
      .post(self.endpoint("pin/ls"))
      .query(&[("type", pin_type.as_str())])
      .timeout(Duration::from_secs(PIN_LS_TIMEOUT_SECS));
    send_json(request)
  }

  /// `pin/ls` persisted to `filepath`. The file is only replaced once the
  /// daemon answered successfully.
  pub fn pin_ls_to_file(&self, pin_type: PinType, filepath: &Path) -> Result<PinLsResponse> {
    let pins = self.pin_ls(pin_type)?;
    write_pin_ls_output(&pins, filepath)?;
    info!("Pin ls output saved to {}", filepath.display());
    Ok(pins)
  }
}

impl PinTarget for KuboRpc {
  fn describe(&self) -> String {
    format!("local node at {}", self.api_url)
  }

  fn pin(&self, cid: &str) -> Result<()> {
    match self.pin_add(cid, self.pin_timeout) {
      Ok(_) => Ok(()),
      Err(Error::Http(e)) if e.is_timeout() => {
        warn!(
          "Timed out pinning {}, most probably the node is not peered with the delegates holding it",
          cid
        );
        Err(Error::Http(e))
      }
      Err(e) => Err(e),
    }
  }
}

pub fn read_pin_ls_output(filepath: &Path) -> Result<PinLsResponse> {
  if !filepath.exists() {
    return Err(Error::MissingRecord(filepath.to_path_buf()));
  }
  let reader = BufReader::new(File::open(filepath)?);
  Ok(serde_json::from_reader(reader)?)
}

pub fn write_pin_ls_output(pins: &PinLsResponse, filepath: &Path) -> Result<()> {
  save_json(pins, filepath)
}


#[cfg(test)]
mod tests {
  use super::*;
  use clap::ValueEnum;

  const PIN_LS: &str = r#"{
    "Keys": {
      "QmYwAPJzv5CZsnA625s3Xf2nemtYgPpHdWEz79ojWnPbdG": {"Type": "recursive"},
      "QmPZ9gcCEpqKTo6aq61g2nXGUhM4iCL3ewB6LDXZCtioEB": {"Type": "recursive", "Name": "readme"}
    }
  }"#;

  #[test]
  fn parses_pin_ls() {
    let pins: PinLsResponse = serde_json::from_str(PIN_LS).unwrap();
    let cids = pins.cids();
    assert_eq!(cids.len(), 2);
    assert!(cids.contains("QmYwAPJzv5CZsnA625s3Xf2nemtYgPpHdWEz79ojWnPbdG"));
    assert_eq!(
      pins.keys["QmPZ9gcCEpqKTo6aq61g2nXGUhM4iCL3ewB6LDXZCtioEB"].name.as_deref(),
      Some("readme")
    );
  }

  #[test]
  fn parses_pin_add_and_id() {
    let added: PinAddResponse =
      serde_json::from_str(r#"{"Pins":["QmYwAPJzv5CZsnA625s3Xf2nemtYgPpHdWEz79ojWnPbdG"]}"#).unwrap();
    assert_eq!(added.pins.len(), 1);
    assert_eq!(added.progress, None);

    let id: IdResponse = serde_json::from_str(
      r#"{"ID":"12D3KooWAbc","AgentVersion":"kubo/0.29.0/","Addresses":null,"Protocols":["/ipfs/id/1.0.0"],"PublicKey":"CAES"}"#,
    )
    .unwrap();
    assert_eq!(id.id, "12D3KooWAbc");
    assert!(id.addresses.is_none());
  }

  #[test]
  fn pin_ls_record_survives_a_round_trip_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("local_node_pins.json");
    assert!(matches!(read_pin_ls_output(&path), Err(Error::MissingRecord(_))));

    let pins: PinLsResponse = serde_json::from_str(PIN_LS).unwrap();
    write_pin_ls_output(&pins, &path).unwrap();
    assert_eq!(read_pin_ls_output(&path).unwrap(), pins);
  }

  #[test]
  fn unreachable_node_leaves_the_record_alone() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("local_node_pins.json");
    let previous = r#"{"Keys":{"QmYwAPJzv5CZsnA625s3Xf2nemtYgPpHdWEz79ojWnPbdG":{"Type":"recursive"}}}"#;
    std::fs::write(&path, previous).unwrap();

    let rpc = KuboRpc::new("http://127.0.0.1:1/api/v0").unwrap();
    assert!(matches!(rpc.pin_ls_to_file(PinType::Recursive, &path), Err(Error::Http(_))));
    assert_eq!(std::fs::read_to_string(&path).unwrap(), previous);
    assert!(!crate::store::staging_path(&path).exists());
  }

  #[test]
  fn pin_type_flags() {
    assert_eq!(PinType::Recursive.as_str(), "recursive");
    assert_eq!(<PinType as ValueEnum>::from_str("all", true).unwrap(), PinType::All);
  }
}
