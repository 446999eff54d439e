/// Pins in a Filebase bucket every CID the local node holds and the bucket
/// does not (queued, pinning and pinned requests all count as held).
use std::error::Error;
use std::path::PathBuf;

use clap::Parser;

use pin_mirror::config::{KUBO_API_URL, LOCAL_PINS_FILEPATH, PIN_API_URL, PIN_REPORT_FILEPATH};
use pin_mirror::filebase::{FilebasePinApi, PinStatus, RemoteBucket};
use pin_mirror::kubo::{read_pin_ls_output, KuboRpc, PinType};
use pin_mirror::logger::{setup_logger, LogArgs};
use pin_mirror::pinset::{BucketSync, PinSet};
use pin_mirror::reconcile::{missing, pin_all};

#[derive(Parser)]
#[command(about = "Pin in Filebase every CID of the local node")]
struct Cli {
  /// Output of `pin/ls` to migrate. Requested from the node when absent
  #[arg(value_name = "LOCAL_PINS", default_value = LOCAL_PINS_FILEPATH)]
  local_pins: PathBuf,
  #[arg(long, value_name = "BUCKET", default_value = "kleros")]
  bucket: String,
  /// Ask the node for a fresh `pin/ls` even if the file exists
  #[arg(long)]
  refresh_local: bool,
  #[arg(long, value_enum, default_value = "all")]
  pin_type: PinType,
  #[arg(long, value_name = "PATH", default_value = PIN_REPORT_FILEPATH)]
  report: PathBuf,
  #[arg(long, value_name = "URL", env = "FILEBASE_PIN_API_URL", default_value = PIN_API_URL)]
  api_url: String,
  #[arg(long, value_name = "URL", env = "KUBO_API_URL", default_value = KUBO_API_URL)]
  kubo_url: String,
  #[command(flatten)]
  log: LogArgs,
}

fn main() -> Result<(), Box<dyn Error>> {
  let cli = Cli::parse();
  setup_logger("update_filebase_with_local", &cli.log)?;

  let local = if cli.refresh_local || !cli.local_pins.exists() {
    eprintln!("-- requesting pin ls from the local node");
    KuboRpc::new(&cli.kubo_url)?.pin_ls_to_file(cli.pin_type, &cli.local_pins)?
  } else {
    read_pin_ls_output(&cli.local_pins)?
  };

  eprintln!("-- listing bucket {}", cli.bucket);
  let api = FilebasePinApi::new(&cli.api_url)?;
  let mut remote = PinSet::default();
  BucketSync::new(&api, &cli.bucket)
    .with_status(&[PinStatus::Queued, PinStatus::Pinning, PinStatus::Pinned])
    .run(&mut remote, |_| Ok(()))?;

  let local_cids = local.cids();
  let missed = missing(local_cids.iter().copied(), remote.cids.keys().map(String::as_str));
  eprintln!(
    "-- there are {} CIDs in the local node, {} in {}, and {} are missed in Filebase",
    local_cids.len(),
    remote.count,
    cli.bucket,
    missed.len()
  );

  let target = RemoteBucket {
    api: &api,
    bucket_name: cli.bucket.clone(),
  };
  let report = pin_all(&target, &missed);
  report.append_to(&cli.report)?;
  let failed = report.failed().count();
  eprintln!("-- Done: {} pinned, {} failed", report.pinned().count(), failed);
  if failed > 0 {
    return Err(format!("{} pins failed, see {}", failed, cli.report.display()).into());
  }
  Ok(())
}
