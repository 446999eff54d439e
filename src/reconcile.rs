use std::collections::{BTreeSet, HashSet};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use log::{error, info};

use crate::error::Result;

/// CIDs of `source` that `destination` lacks.
pub fn missing<'a, S, D>(source: S, destination: D) -> BTreeSet<String>
where
  S: IntoIterator<Item = &'a str>,
  D: IntoIterator<Item = &'a str>,
{
  let destination: HashSet<&str> = destination.into_iter().collect();
  source
    .into_iter()
    .filter(|cid| !destination.contains(cid))
    .map(String::from)
    .collect()
}

/// A backend able to pin a CID. Pinning something already pinned must succeed.
pub trait PinTarget {
  fn describe(&self) -> String;
  fn pin(&self, cid: &str) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PinOutcome {
  Pinned,
  Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinAttempt {
  pub cid: String,
  pub outcome: PinOutcome,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PinReport {
  pub attempts: Vec<PinAttempt>,
}

impl PinReport {
  pub fn pinned(&self) -> impl Iterator<Item = &str> {
    self
      .attempts
      .iter()
      .filter(|a| a.outcome == PinOutcome::Pinned)
      .map(|a| a.cid.as_str())
  }

  pub fn failed(&self) -> impl Iterator<Item = (&str, &str)> {
    self.attempts.iter().filter_map(|a| match a.outcome {
      PinOutcome::Failed(ref reason) => Some((a.cid.as_str(), reason.as_str())),
      PinOutcome::Pinned => None,
    })
  }

  /// Appends one `cid,pinned` or `cid,failed,reason` line per attempt.
  pub fn append_to(&self, report_filepath: &Path) -> Result<()> {
    let mut report_file = OpenOptions::new()
      .create(true)
      .append(true)
      .open(report_filepath)?;
    for attempt in &self.attempts {
      match attempt.outcome {
        PinOutcome::Pinned => writeln!(report_file, "{},pinned", attempt.cid)?,
        PinOutcome::Failed(ref reason) => writeln!(
          report_file,
          "{},failed,{}",
          attempt.cid,
          reason.replace(['\n', '\r'], " ")
        )?,
      }
    }
    Ok(())
  }
}

/// Pins every CID one after the other. A failure is recorded and the run moves on.
pub fn pin_all<T: PinTarget + ?Sized>(target: &T, cids: &BTreeSet<String>) -> PinReport {
  let mut report = PinReport::default();
  if cids.is_empty() {
    info!("Nothing to pin on {}", target.describe());
    return report;
  }
  let total = cids.len();
  info!("Pinning {} CIDs on {}", total, target.describe());
  for (index, cid) in cids.iter().enumerate() {
    info!("Progress: {:.2} %", index as f64 / total as f64 * 100.0);
    let outcome = match target.pin(cid) {
      Ok(()) => {
        info!("{} added to {}", cid, target.describe());
        PinOutcome::Pinned
      }
      Err(e) => {
        error!("Failed to pin {}, it will be skipped: {}", cid, e);
        PinOutcome::Failed(e.to_string())
      }
    };
    report.attempts.push(PinAttempt {
      cid: cid.clone(),
      outcome,
    });
  }
  report
}
