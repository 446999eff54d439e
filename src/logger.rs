//! Console plus dated log file, so a cron-driven run leaves a trace on disk.

use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, Utc};
use clap::Args;
use log::LevelFilter;
use log4rs::append::console::ConsoleAppender;
use log4rs::append::file::FileAppender;
use log4rs::config::{Appender, Config, Root};
use log4rs::encode::pattern::PatternEncoder;

use crate::config::LOG_DIRECTORY;

const LOG_PATTERN: &str = "{d(%Y-%m-%d %H:%M:%S)} - {M} - {l} - {m}{n}";

/// Logging flags shared by every script.
#[derive(Args, Debug, Clone)]
pub struct LogArgs {
  /// Directory receiving the `<script>_<date>.log` files
  #[arg(long, value_name = "DIR", default_value = LOG_DIRECTORY)]
  pub log_dir: PathBuf,
  /// One of off, error, warn, info, debug, trace
  #[arg(long, value_name = "LEVEL", default_value = "info")]
  pub log_level: LevelFilter,
}

/// `logs`, `backup_filebase_locally`, 2024-05-01 -> `logs/backup_filebase_locally_2024-05-01.log`
pub fn dated_log_path(log_dir: &Path, name: &str, date: NaiveDate) -> PathBuf {
  log_dir.join(format!("{}_{}.log", name, date.format("%Y-%m-%d")))
}

pub fn setup_logger(name: &str, args: &LogArgs) -> Result<PathBuf, Box<dyn Error>> {
  fs::create_dir_all(&args.log_dir)?;
  let log_path = dated_log_path(&args.log_dir, name, Utc::now().date_naive());

  let stdout = ConsoleAppender::builder()
    .encoder(Box::new(PatternEncoder::new(LOG_PATTERN)))
    .build();
  let file = FileAppender::builder()
    .encoder(Box::new(PatternEncoder::new(LOG_PATTERN)))
    .append(true)
    .build(&log_path)?;

  let config = Config::builder()
    .appender(Appender::builder().build("stdout", Box::new(stdout)))
    .appender(Appender::builder().build("file", Box::new(file)))
    .build(
      Root::builder()
        .appender("stdout")
        .appender("file")
        .build(args.log_level),
    )?;
  log4rs::init_config(config)?;
  Ok(log_path)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn log_file_carries_the_date() {
    let date = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
    assert_eq!(
      dated_log_path(Path::new("logs"), "get_filebase_cids", date),
      PathBuf::from("logs/get_filebase_cids_2024-05-01.log")
    );
  }
}
