use std::path::PathBuf;

use clap::Parser;
use crowdwatch_lib::{run, AppConfig};

#[derive(Parser, Debug)]
#[command(name = "crowdwatch", about = "Crowd occupancy analytics over uploaded video")]
struct Args {
    /// Where the database and settings file live
    #[arg(long, value_name = "PATH", default_value = "data")]
    data_dir: PathBuf,
    #[arg(long, default_value = "127.0.0.1:5000")]
    bind: String,
    /// Frame rate for image-sequence uploads
    #[arg(long, default_value_t = 25.0)]
    fps: f64,
    /// POST crowd alerts to this URL instead of only logging them
    #[arg(long, value_name = "URL")]
    webhook_url: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    run(AppConfig {
        data_dir: args.data_dir,
        bind: args.bind,
        fps: args.fps,
        webhook_url: args.webhook_url,
    })
    .await
}
