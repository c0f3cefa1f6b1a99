//! facecast-poll - poll a facecastd /faces endpoint and print new snapshots

use anyhow::Result;
use clap::Parser;
use std::time::Duration;

use facecast::{FacesClient, FacesPoll};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Snapshot endpoint.
    #[arg(long, env = "FACE_POLL_URL", default_value = "http://127.0.0.1:8080/faces")]
    url: String,
    /// Delay between polls in milliseconds.
    #[arg(long, default_value_t = 200)]
    interval_ms: u64,
    /// Stop after this many polls.
    #[arg(long)]
    count: Option<u64>,
    /// Print the full snapshot JSON instead of a summary line.
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let mut client = FacesClient::new(&args.url);
    let mut polls = 0u64;
    let mut not_modified = 0u64;

    loop {
        match client.poll() {
            Ok(FacesPoll::Updated(snapshot)) => {
                if args.json {
                    println!("{}", serde_json::to_string(&snapshot)?);
                } else {
                    println!(
                        "frame={} faces={} ({}x{}) source={} etag={}",
                        snapshot.frame,
                        snapshot.detections.len(),
                        snapshot.frame_width,
                        snapshot.frame_height,
                        snapshot.source,
                        client.etag().unwrap_or("-")
                    );
                }
            }
            Ok(FacesPoll::NotModified) => {
                not_modified += 1;
                log::debug!("not modified ({} so far)", not_modified);
            }
            Err(err) => log::warn!("poll failed: {:#}", err),
        }

        polls += 1;
        if args.count.is_some_and(|count| polls >= count) {
            break;
        }
        std::thread::sleep(Duration::from_millis(args.interval_ms));
    }

    log::info!("{} polls, {} not modified", polls, not_modified);
    Ok(())
}
