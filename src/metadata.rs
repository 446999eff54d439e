//! Which delegates hold a CID, and whether our nodes know about them.

use std::fmt;

use lazy_static::lazy_static;
use regex::Regex;

use crate::config::DELEGATES;
use crate::error::Result;
use crate::filebase::FilebasePinApi;

lazy_static! {
  // CIDv0 (base58btc sha2-256) or a multibase CIDv1 in base32/base36.
  static ref CID_REGEX: Regex =
    Regex::new("^(Qm[1-9A-HJ-NP-Za-km-z]{44}|b[a-z2-7]{58,}|k[0-9a-z]{50,})$").unwrap();
}

pub fn is_cid(candidate: &str) -> bool {
  CID_REGEX.is_match(candidate)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DelegateReport {
  NoDelegateFound,
  /// Every delegate is one our nodes are already peered with.
  Known(Vec<String>),
  Unknown {
    known: Vec<String>,
    unknown: Vec<String>,
  },
}

impl fmt::Display for DelegateReport {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      DelegateReport::NoDelegateFound => write!(f, "no delegate found"),
      DelegateReport::Known(known) => {
        writeln!(f, "{} known delegate(s):", known.len())?;
        for delegate in known {
          writeln!(f, "  {}", delegate)?;
        }
        Ok(())
      }
      DelegateReport::Unknown { known, unknown } => {
        writeln!(f, "{} known delegate(s):", known.len())?;
        for delegate in known {
          writeln!(f, "  {}", delegate)?;
        }
        writeln!(f, "{} delegate(s) missing from DELEGATES, add them to the IPFS nodes:", unknown.len())?;
        for delegate in unknown {
          writeln!(f, "  {}", delegate)?;
        }
        Ok(())
      }
    }
  }
}

pub fn unknown_delegates<'a>(delegates: &'a [String], known: &[&str]) -> Vec<&'a str> {
  delegates
    .iter()
    .map(String::as_str)
    .filter(|d| !known.contains(d))
    .collect()
}

pub fn classify_delegates<'a, I>(delegates: I, known: &[&str]) -> DelegateReport
where
  I: IntoIterator<Item = &'a str>,
{
  let mut seen_known = Vec::new();
  let mut seen_unknown = Vec::new();
  for delegate in delegates {
    let group = if known.contains(&delegate) {
      &mut seen_known
    } else {
      &mut seen_unknown
    };
    if !group.iter().any(|d| d == delegate) {
      group.push(delegate.to_string());
    }
  }
  match (seen_known.is_empty(), seen_unknown.is_empty()) {
    (true, true) => DelegateReport::NoDelegateFound,
    (_, true) => DelegateReport::Known(seen_known),
    _ => DelegateReport::Unknown {
      known: seen_known,
      unknown: seen_unknown,
    },
  }
}

/// Looks the CID up in the bucket and classifies the delegates of all its pin requests.
pub fn check_delegates(api: &FilebasePinApi, bucket_name: &str, cid: &str) -> Result<DelegateReport> {
  let response = api.get_file(bucket_name, cid)?;
  log::debug!("{} pin request(s) for {} in {}", response.count, cid, bucket_name);
  Ok(classify_delegates(
    response
      .results
      .iter()
      .flat_map(|r| r.delegates.iter().map(String::as_str)),
    DELEGATES,
  ))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn no_delegates_is_not_an_error() {
    let report = classify_delegates(Vec::<&str>::new(), DELEGATES);
    assert_eq!(report, DelegateReport::NoDelegateFound);
    assert_eq!(report.to_string(), "no delegate found");
  }

  #[test]
  fn known_and_unknown_delegates() {
    let stranger = "/dns4/ipfs-pin-9.vin1.filebase.io/tcp/4001/p2p/12D3KooWStranger";
    let report = classify_delegates(vec![DELEGATES[0], stranger, DELEGATES[0]], DELEGATES);
    assert_eq!(
      report,
      DelegateReport::Unknown {
        known: vec![DELEGATES[0].to_string()],
        unknown: vec![stranger.to_string()],
      }
    );
    assert!(report.to_string().contains("missing from DELEGATES"));

    let report = classify_delegates(vec![DELEGATES[1]], DELEGATES);
    assert_eq!(report, DelegateReport::Known(vec![DELEGATES[1].to_string()]));
  }

  #[test]
  fn unknown_delegates_of_a_pin_response() {
    let delegates = vec![DELEGATES[2].to_string(), "/ip4/10.0.0.1/tcp/4001/p2p/12D3KooWX".to_string()];
    assert_eq!(
      unknown_delegates(&delegates, DELEGATES),
      vec!["/ip4/10.0.0.1/tcp/4001/p2p/12D3KooWX"]
    );
  }

  #[test]
  fn cid_shapes() {
    assert!(is_cid("QmVq2GstdkVQDNQFZMLGLFpVxwHR2abYyYgFZwh8GtkkWi"));
    assert!(is_cid("bafybeigdyrzt5sfp7udm7hu76uh7y26nf3efuylqabf3oclgtqy55fbzdi"));
    assert!(!is_cid("Qm1"));
    assert!(!is_cid("not a cid"));
  }
}
