/// Pins on the local node every CID that Filebase holds and the node does not.
///
/// Meant to run periodically, so the backup node keeps up with the buckets.
use std::error::Error;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use log::{error, info};

use pin_mirror::config::{
  default_buckets, KUBO_API_URL, LOCAL_PINS_FILEPATH, LOCAL_PIN_TIMEOUT_SECS, PIN_API_URL,
  PIN_REPORT_FILEPATH, REMOTE_PINS_FILEPATH,
};
use pin_mirror::filebase::FilebasePinApi;
use pin_mirror::kubo::{KuboRpc, PinType};
use pin_mirror::logger::{setup_logger, LogArgs};
use pin_mirror::pinset::{sync_bucket, PinSetRecord};
use pin_mirror::reconcile::{missing, pin_all};

#[derive(Parser)]
#[command(about = "Pin locally every CID pinned in Filebase")]
struct Cli {
  /// Bucket to mirror, may be repeated. Defaults to every configured bucket
  #[arg(long = "bucket", value_name = "BUCKET")]
  buckets: Vec<String>,
  #[arg(long, value_name = "PATH", default_value = REMOTE_PINS_FILEPATH)]
  remote_pins: PathBuf,
  #[arg(long, value_name = "PATH", default_value = LOCAL_PINS_FILEPATH)]
  local_pins: PathBuf,
  /// Every attempted pin is appended here
  #[arg(long, value_name = "PATH", default_value = PIN_REPORT_FILEPATH)]
  report: PathBuf,
  /// Recursive pins are enough to cover everything pinned
  #[arg(long, value_enum, default_value = "recursive")]
  pin_type: PinType,
  /// Seconds a single local pin may take
  #[arg(long, value_name = "SECS", default_value_t = LOCAL_PIN_TIMEOUT_SECS)]
  pin_timeout: u64,
  /// Reuse the remote record as is instead of listing the buckets again
  #[arg(long)]
  skip_remote_listing: bool,
  #[arg(long, value_name = "URL", env = "FILEBASE_PIN_API_URL", default_value = PIN_API_URL)]
  api_url: String,
  #[arg(long, value_name = "URL", env = "KUBO_API_URL", default_value = KUBO_API_URL)]
  kubo_url: String,
  #[command(flatten)]
  log: LogArgs,
}

fn main() -> Result<(), Box<dyn Error>> {
  let cli = Cli::parse();
  setup_logger("backup_filebase_locally", &cli.log)?;
  let buckets = if cli.buckets.is_empty() {
    default_buckets()
  } else {
    cli.buckets
  };

  let rpc = KuboRpc::new(&cli.kubo_url)?.with_pin_timeout(Duration::from_secs(cli.pin_timeout));
  let node = rpc.id()?;
  info!("Local node {} ({})", node.id, node.agent_version);

  eprintln!("-- updating local node pin ls");
  let local = rpc.pin_ls_to_file(cli.pin_type, &cli.local_pins)?;

  let mut aborted = 0;
  let mut record = if cli.skip_remote_listing {
    PinSetRecord::load(&cli.remote_pins)?
  } else {
    eprintln!("-- updating Filebase pin ls");
    let api = FilebasePinApi::new(&cli.api_url)?;
    let mut record = PinSetRecord::load_or_default(&cli.remote_pins);
    for bucket in &buckets {
      if let Err(e) = sync_bucket(&api, &mut record, bucket, &cli.remote_pins) {
        aborted += 1;
        error!("Listing of {} aborted, partial results kept: {}", bucket, e);
      }
    }
    record
  };

  eprintln!("-- checking missing CIDs");
  record.buckets.retain(|bucket, _| buckets.contains(bucket));
  let local_cids = local.cids();
  let remote_cids = record.cids();
  eprintln!(
    "-- the local pinset has {} CIDs, {} were found in Filebase",
    local_cids.len(),
    remote_cids.len()
  );
  let missing_locally = missing(remote_cids.iter().copied(), local_cids.iter().copied());
  let missing_remotely = missing(local_cids.iter().copied(), remote_cids.iter().copied());
  eprintln!("-- {} CIDs are missing in the local node", missing_locally.len());
  eprintln!("-- Filebase is missing {} CIDs", missing_remotely.len());
  for cid in &missing_remotely {
    info!("Missing in Filebase: {}", cid);
  }

  let report = pin_all(&rpc, &missing_locally);
  report.append_to(&cli.report)?;
  let failed = report.failed().count();
  eprintln!(
    "-- Done: {} pinned, {} failed, see {}",
    report.pinned().count(),
    failed,
    cli.report.display()
  );

  if aborted > 0 || failed > 0 {
    return Err(format!("{} bucket listings aborted, {} pins failed", aborted, failed).into());
  }
  Ok(())
}
