//! Fixed endpoints, buckets and peers of the Kleros pinning setup.
//!
//! Everything here can be overridden from the command line of the scripts,
//! except the bucket tokens which are only ever read from the environment.

use std::env;

use crate::error::{Error, Result};

pub const PIN_API_URL: &str = "https://api.filebase.io/v1/ipfs/pins";
pub const KUBO_API_URL: &str = "http://127.0.0.1:5001/api/v0";

pub const REMOTE_PINS_FILEPATH: &str = "filebase_pins.json";
pub const LOCAL_PINS_FILEPATH: &str = "local_node_pins.json";
pub const PIN_REPORT_FILEPATH: &str = "pin_report.csv";
pub const LOG_DIRECTORY: &str = "logs";

/// Seconds allowed for a regular request to either API.
pub const REQUEST_TIMEOUT_SECS: u64 = 10;
/// `pin/ls` walks the whole pinset of the node, give it time.
pub const PIN_LS_TIMEOUT_SECS: u64 = 300;
/// A local `pin/add` only succeeds quickly when the node is peered with the
/// delegates holding the content, so the backup uses a short leash.
pub const LOCAL_PIN_TIMEOUT_SECS: u64 = 2;
/// Page size when listing a bucket.
pub const LIST_PAGE_LIMIT: u32 = 1000;

pub const BUCKETS: &[&str] = &[
  "kleros",
  "kleros-v2",
  "kleros-websites",
  "poh-v2",
  "curate-v2",
  "escrow-v2",
  "reality-v2",
  "kleros-token-list",
  "v2-logs",
  "atlas-logs",
];

/// Addresses of the Kleros IPFS nodes, sent along with every remote pin
/// request so the service knows where to fetch the content from.
pub const ORIGINS: &[&str] = &[
  "/ip4/18.119.89.142/tcp/4001/p2p/12D3KooWLzbCzkFdKFkRS5scAuezSTyBePUExBXD6qH2t4B9zPKe",
  "/ip4/18.119.89.142/udp/4001/quic/p2p/12D3KooWLzbCzkFdKFkRS5scAuezSTyBePUExBXD6qH2t4B9zPKe",
  "/ip4/3.141.144.87/tcp/4001/p2p/12D3KooWHhLwvVxSkoTGW8WUGqGJxWByojzHTo59UXQpVMpNdjHA",
  "/ip4/3.141.144.87/udp/4001/quic/p2p/12D3KooWHhLwvVxSkoTGW8WUGqGJxWByojzHTo59UXQpVMpNdjHA",
  "/ip4/194.182.164.22/tcp/4001/p2p/12D3KooWLf6HJNdv1vcYyxLJJ6EUVH9VqLheYAHufSeK54jszvQe",
  "/ip4/194.182.164.22/udp/4001/quic/p2p/12D3KooWLf6HJNdv1vcYyxLJJ6EUVH9VqLheYAHufSeK54jszvQe",
];

/// Filebase pinning nodes our own nodes are peered with.
pub const DELEGATES: &[&str] = &[
  "/dns4/ipfs-pin-0.vin1.filebase.io/tcp/4001/p2p/12D3KooWNvyc1NoeTF6SynHuq5exmsMs7YyE1UFp9YhsiYw2px9B",
  "/dns4/ipfs-pin-1.vin1.filebase.io/tcp/4001/p2p/12D3KooWC8RkG22G2Jp7wdBtMDxG4LLn6d3sDfqtqXBytpyNhXTM",
  "/dns4/ipfs-pin-2.vin1.filebase.io/tcp/4001/p2p/12D3KooW9x6zfqWH46VYQoFDdfPuQqoc56L359NM6pQedrSHrv6R",
];

/// `kleros-v2` -> `FILEBASE_TOKEN_KLEROS_V2`
pub fn token_env_var(bucket_name: &str) -> String {
  format!(
    "FILEBASE_TOKEN_{}",
    bucket_name.to_uppercase().replace('-', "_")
  )
}

pub fn bucket_token(bucket_name: &str) -> Result<String> {
  let var = token_env_var(bucket_name);
  match env::var(&var) {
    Ok(token) if !token.is_empty() => Ok(token),
    _ => Err(Error::MissingToken(bucket_name.to_string(), var)),
  }
}

pub fn default_buckets() -> Vec<String> {
  BUCKETS.iter().map(|b| b.to_string()).collect()
}
