//! Records written next to their destination and renamed over it, so an
//! interrupted run leaves the previous record intact.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::Result;

pub fn staging_path(filepath: &Path) -> PathBuf {
  let mut staging = filepath.as_os_str().to_owned();
  staging.push(".partial");
  PathBuf::from(staging)
}

pub fn save_json<T: Serialize + ?Sized>(value: &T, filepath: &Path) -> Result<()> {
  let staging = staging_path(filepath);
  let mut writer = BufWriter::new(File::create(&staging)?);
  serde_json::to_writer_pretty(&mut writer, value)?;
  writer.flush()?;
  drop(writer);
  fs::rename(&staging, filepath)?;
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::collections::BTreeMap;

  #[test]
  fn staging_sits_next_to_the_record() {
    assert_eq!(
      staging_path(Path::new("/data/ipfs/local_node_pins.json")),
      PathBuf::from("/data/ipfs/local_node_pins.json.partial")
    );
  }

  #[test]
  fn replaces_the_record_and_leaves_no_staging_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("filebase_pins.json");
    fs::write(&path, "stale").unwrap();

    let value = BTreeMap::from([("kleros", 3)]);
    save_json(&value, &path).unwrap();
    let written: BTreeMap<String, u32> = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(written["kleros"], 3);
    assert!(!staging_path(&path).exists());
  }

  #[test]
  fn failed_write_keeps_the_previous_record() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("local_node_pins.json");
    fs::write(&path, "{\"Keys\":{}}").unwrap();
    // a directory in the way of the staging file makes the write fail
    fs::create_dir(staging_path(&path)).unwrap();

    assert!(save_json(&BTreeMap::from([("Keys", 1)]), &path).is_err());
    assert_eq!(fs::read_to_string(&path).unwrap(), "{\"Keys\":{}}");
  }
}
