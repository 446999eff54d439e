/// Lists every bucket into the remote pins record. Safe to interrupt:
/// the next run picks up from what the record already holds.
use std::error::Error;
use std::path::PathBuf;

use clap::Parser;
use log::error;

use pin_mirror::config::{default_buckets, PIN_API_URL, REMOTE_PINS_FILEPATH};
use pin_mirror::filebase::FilebasePinApi;
use pin_mirror::logger::{setup_logger, LogArgs};
use pin_mirror::pinset::{sync_bucket, PinSetRecord};

#[derive(Parser)]
#[command(about = "Refresh the record of every CID pinned in Filebase")]
struct Cli {
  /// Bucket to list, may be repeated. Defaults to every configured bucket
  #[arg(long = "bucket", value_name = "BUCKET")]
  buckets: Vec<String>,
  #[arg(long, value_name = "PATH", default_value = REMOTE_PINS_FILEPATH)]
  remote_pins: PathBuf,
  #[arg(long, value_name = "URL", env = "FILEBASE_PIN_API_URL", default_value = PIN_API_URL)]
  api_url: String,
  #[command(flatten)]
  log: LogArgs,
}

fn main() -> Result<(), Box<dyn Error>> {
  let cli = Cli::parse();
  setup_logger("get_filebase_cids", &cli.log)?;
  let buckets = if cli.buckets.is_empty() {
    default_buckets()
  } else {
    cli.buckets
  };

  let api = FilebasePinApi::new(&cli.api_url)?;
  let mut record = PinSetRecord::load_or_default(&cli.remote_pins);
  let mut aborted = 0;
  for bucket in &buckets {
    match sync_bucket(&api, &mut record, bucket, &cli.remote_pins) {
      Ok(count) => eprintln!("-- {} has {} CIDs", bucket, count),
      Err(e) => {
        aborted += 1;
        error!("Listing of {} aborted, partial results kept: {}", bucket, e);
      }
    }
  }
  if aborted > 0 {
    return Err(format!("{} of {} buckets could not be fully listed", aborted, buckets.len()).into());
  }
  Ok(())
}
