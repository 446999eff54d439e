//! The `remote_pins` record: every CID of every bucket, kept on disk between
//! runs since listing a large bucket from scratch takes a long while.

use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::config::LIST_PAGE_LIMIT;
use crate::error::{Error, Result};
use crate::filebase::{ListQuery, PinLister, PinResult, PinStatus};
use crate::store::save_json;

/// Page cursors reach this far back over the previous page, so pins sharing a
/// creation date with a page boundary are not lost.
pub const BOUNDARY_SLACK_SECS: i64 = 2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CidMeta {
  pub created: DateTime<Utc>,
  pub status: PinStatus,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub delegates: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PinSet {
  pub count: usize,
  pub cids: BTreeMap<String, CidMeta>,
  /// Every pin created within `[first_date, last_date]` is in `cids`.
  pub first_date: Option<DateTime<Utc>>,
  pub last_date: Option<DateTime<Utc>>,
}

impl PinSet {
  /// Adds a page of results and returns how many CIDs were new.
  /// A CID listed again takes the metadata of its latest listing.
  pub fn append(&mut self, results: &[PinResult]) -> usize {
    let known = self.cids.len();
    for item in results {
      self.cids.insert(
        item.pin.cid.clone(),
        CidMeta {
          created: item.created,
          status: item.status,
          delegates: item.delegates.clone(),
        },
      );
    }
    self.count = self.cids.len();
    self.count - known
  }

  fn cover(&mut self, oldest: DateTime<Utc>, newest: DateTime<Utc>) {
    self.first_date = Some(self.first_date.map_or(oldest, |d| d.min(oldest)));
    self.last_date = Some(self.last_date.map_or(newest, |d| d.max(newest)));
  }
}

/// A CID of `remote_pins` with the bucket it was found in.
#[derive(Debug, Clone, PartialEq)]
pub struct CidRecord {
  pub bucket: String,
  pub created: DateTime<Utc>,
  pub status: PinStatus,
  pub delegates: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PinSetRecord {
  pub buckets: BTreeMap<String, PinSet>,
}

impl PinSetRecord {
  pub fn load(filepath: &Path) -> Result<Self> {
    if !filepath.exists() {
      return Err(Error::MissingRecord(filepath.to_path_buf()));
    }
    let reader = BufReader::new(File::open(filepath)?);
    Ok(serde_json::from_reader(reader)?)
  }

  /// A missing or unreadable record starts the listing over.
  pub fn load_or_default(filepath: &Path) -> Self {
    match PinSetRecord::load(filepath) {
      Ok(record) => record,
      Err(Error::MissingRecord(_)) => PinSetRecord::default(),
      Err(e) => {
        warn!("Ignoring unreadable record {}: {}", filepath.display(), e);
        PinSetRecord::default()
      }
    }
  }

  pub fn save(&self, filepath: &Path) -> Result<()> {
    save_json(self, filepath)
  }

  pub fn bucket(&self, bucket_name: &str) -> PinSet {
    self.buckets.get(bucket_name).cloned().unwrap_or_default()
  }

  pub fn set_bucket(&mut self, bucket_name: &str, pin_set: PinSet) {
    self.buckets.insert(bucket_name.to_string(), pin_set);
  }

  pub fn cids(&self) -> BTreeSet<&str> {
    self
      .buckets
      .values()
      .flat_map(|set| set.cids.keys().map(String::as_str))
      .collect()
  }

  /// All buckets flattened into one mapping. A CID present in several
  /// buckets keeps the metadata of the bucket listed last.
  pub fn remote_pins(&self) -> BTreeMap<String, CidRecord> {
    let mut pins = BTreeMap::new();
    for (bucket, pin_set) in &self.buckets {
      for (cid, meta) in &pin_set.cids {
        pins.insert(
          cid.clone(),
          CidRecord {
            bucket: bucket.clone(),
            created: meta.created,
            status: meta.status,
            delegates: meta.delegates.clone(),
          },
        );
      }
    }
    pins
  }
}

/// Walks the listing of one bucket into a [`PinSet`].
///
/// The service returns pins newest first and `count` is the number of pins
/// matching the query, so each pass pages downwards with a `before` cursor.
/// A first pass collects what was created after the covered span, a second
/// one what was created before it (left over by an interrupted run).
pub struct BucketSync<'a, L: PinLister + ?Sized> {
  lister: &'a L,
  bucket_name: &'a str,
  status: Vec<PinStatus>,
  limit: u32,
}

impl<'a, L: PinLister + ?Sized> BucketSync<'a, L> {
  pub fn new(lister: &'a L, bucket_name: &'a str) -> Self {
    BucketSync {
      lister,
      bucket_name,
      status: Vec::new(),
      limit: LIST_PAGE_LIMIT,
    }
  }

  pub fn with_status(mut self, status: &[PinStatus]) -> Self {
    self.status = status.to_vec();
    self
  }

  pub fn with_limit(mut self, limit: u32) -> Self {
    self.limit = limit.max(1);
    self
  }

  /// `on_page` sees the pin set after every page, an error from it or from
  /// the listing stops the walk with whatever was gathered so far.
  pub fn run<F>(&self, pin_set: &mut PinSet, mut on_page: F) -> Result<()>
  where
    F: FnMut(&PinSet) -> Result<()>,
  {
    let slack = Duration::seconds(BOUNDARY_SLACK_SECS);
    match pin_set.last_date {
      None => {
        self.walk(pin_set, None, None, true, &mut on_page)?;
      }
      Some(last_date) => {
        // the covered span only grows once the gap up to it is fully listed
        let span = self.walk(pin_set, Some(last_date - slack), None, false, &mut on_page)?;
        if let Some((oldest, newest)) = span {
          pin_set.cover(oldest, newest);
          on_page(pin_set)?;
        }
      }
    }
    if let Some(first_date) = pin_set.first_date {
      self.walk(pin_set, None, Some(first_date + slack), true, &mut on_page)?;
    }
    Ok(())
  }

  fn walk<F>(
    &self,
    pin_set: &mut PinSet,
    after: Option<DateTime<Utc>>,
    mut before: Option<DateTime<Utc>>,
    grow_coverage: bool,
    on_page: &mut F,
  ) -> Result<Option<(DateTime<Utc>, DateTime<Utc>)>>
  where
    F: FnMut(&PinSet) -> Result<()>,
  {
    let slack = Duration::seconds(BOUNDARY_SLACK_SECS);
    let mut span: Option<(DateTime<Utc>, DateTime<Utc>)> = None;
    loop {
      let query = ListQuery {
        cid: None,
        status: self.status.clone(),
        before,
        after,
        limit: Some(self.limit),
      };
      let page = self.lister.list(self.bucket_name, &query)?;
      let dates = page.results.iter().map(|r| r.created);
      let (oldest, newest) = match (dates.clone().min(), dates.max()) {
        (Some(oldest), Some(newest)) => (oldest, newest),
        _ => break,
      };

      let added = pin_set.append(&page.results);
      span = Some(span.map_or((oldest, newest), |(o, n)| (o.min(oldest), n.max(newest))));
      if grow_coverage {
        pin_set.cover(oldest, newest);
      }
      on_page(pin_set)?;
      debug!(
        "Bucket {}: {} listed, {} new, {} matching, {} known",
        self.bucket_name,
        page.results.len(),
        added,
        page.count,
        pin_set.count
      );

      if page.results.len() as u64 >= page.count {
        break;
      }
      let mut next_before = oldest + slack;
      if before.map_or(false, |b| next_before >= b) {
        warn!(
          "More than {} pins of {} were created within {}s of {}, some may be skipped",
          self.limit, self.bucket_name, BOUNDARY_SLACK_SECS, oldest
        );
        next_before = oldest;
      }
      // a service not honouring `before` as exclusive would serve this page forever
      if let Some(previous) = before.filter(|b| next_before >= *b) {
        return Err(Error::StalledListing {
          bucket: self.bucket_name.to_string(),
          before: previous,
        });
      }
      before = Some(next_before);
    }
    Ok(span)
  }
}

/// Brings the bucket's entry of `record` up to date, saving it to `filepath`
/// after every page. Returns the number of CIDs known for the bucket.
pub fn sync_bucket<L: PinLister + ?Sized>(
  lister: &L,
  record: &mut PinSetRecord,
  bucket_name: &str,
  filepath: &Path,
) -> Result<usize> {
  let mut pin_set = record.bucket(bucket_name);
  info!(
    "Getting all CIDs from bucket {}, {} already on record",
    bucket_name, pin_set.count
  );
  BucketSync::new(lister, bucket_name).run(&mut pin_set, |current| {
    record.set_bucket(bucket_name, current.clone());
    record.save(filepath)
  })?;
  // an empty bucket never reaches `on_page`, yet it belongs on record
  let count = pin_set.count;
  record.set_bucket(bucket_name, pin_set);
  record.save(filepath)?;
  Ok(count)
}
