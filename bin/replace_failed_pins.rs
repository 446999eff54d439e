/// Re-submits the pin requests Filebase marked as failed.
use std::error::Error;

use clap::Parser;
use log::error;

use pin_mirror::config::{default_buckets, LIST_PAGE_LIMIT, PIN_API_URL};
use pin_mirror::filebase::FilebasePinApi;
use pin_mirror::logger::{setup_logger, LogArgs};

#[derive(Parser)]
#[command(about = "Replace the failed pins of the buckets")]
struct Cli {
  /// Bucket to go over, may be repeated. Defaults to every configured bucket
  #[arg(long = "bucket", value_name = "BUCKET")]
  buckets: Vec<String>,
  /// Failed pins handled per bucket
  #[arg(long, default_value_t = LIST_PAGE_LIMIT)]
  limit: u32,
  #[arg(long, value_name = "URL", env = "FILEBASE_PIN_API_URL", default_value = PIN_API_URL)]
  api_url: String,
  #[command(flatten)]
  log: LogArgs,
}

fn main() -> Result<(), Box<dyn Error>> {
  let cli = Cli::parse();
  setup_logger("replace_failed_pins", &cli.log)?;
  let buckets = if cli.buckets.is_empty() {
    default_buckets()
  } else {
    cli.buckets
  };

  let api = FilebasePinApi::new(&cli.api_url)?;
  let mut errored = 0;
  for bucket in &buckets {
    match api.replace_failed(bucket, cli.limit) {
      Ok((replaced, failed)) => {
        eprintln!("-- {}: {} replaced, {} could not be", bucket, replaced, failed);
        errored += failed;
      }
      Err(e) => {
        errored += 1;
        error!("Could not list the failed pins of {}: {}", bucket, e);
      }
    }
  }
  if errored > 0 {
    return Err(format!("{} failed pins or buckets could not be handled", errored).into());
  }
  Ok(())
}
