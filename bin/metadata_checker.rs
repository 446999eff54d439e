/// Prints which delegates pin a CID in a bucket, flagging the ones our
/// nodes are not peered with.
use std::error::Error;

use clap::Parser;

use pin_mirror::config::PIN_API_URL;
use pin_mirror::filebase::FilebasePinApi;
use pin_mirror::logger::{setup_logger, LogArgs};
use pin_mirror::metadata::{check_delegates, is_cid};

#[derive(Parser)]
#[command(about = "Show the delegates pinning a CID")]
struct Cli {
  cid: String,
  #[arg(long, value_name = "BUCKET", default_value = "kleros")]
  bucket: String,
  #[arg(long, value_name = "URL", env = "FILEBASE_PIN_API_URL", default_value = PIN_API_URL)]
  api_url: String,
  #[command(flatten)]
  log: LogArgs,
}

fn main() -> Result<(), Box<dyn Error>> {
  let cli = Cli::parse();
  setup_logger("metadata_checker", &cli.log)?;
  if !is_cid(&cli.cid) {
    return Err(format!("{} does not look like a CID", cli.cid).into());
  }
  let api = FilebasePinApi::new(&cli.api_url)?;
  let report = check_delegates(&api, &cli.bucket, &cli.cid)?;
  println!("{}: {}", cli.cid, report);
  Ok(())
}
