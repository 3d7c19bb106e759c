use std::{error::Error, process, sync::Arc};

use clap::Parser;

use clusterscope::{
    dataset::Dataset,
    service::service,
    session::Session,
    streamer::{stdio, Streamer},
};

/// Reactive view computation engine for cluster exploration dashboards.
#[derive(Parser)]
#[clap(version, about)]
struct Args {
    /// Path to the customer dataset (CSV with a header row).
    #[clap(value_parser)]
    dataset: String,
    /// Serve control events and views over WebSocket instead of stdio.
    #[clap(long, action)]
    service: bool,
    /// Address the WebSocket service binds to.
    #[clap(long, value_parser, default_value = "127.0.0.1:9001")]
    addr: String,
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();
    let args = Args::parse();
    let data = match Dataset::load(&args.dataset) {
        Ok(data) => Arc::new(data),
        Err(reason) => {
            eprintln!("{}", reason);
            process::exit(1);
        }
    };
    let mut session = Session::new(data)?;
    if args.service {
        let (events, write) = service(&args.addr);
        let streamer = Streamer::new(events, write);
        Streamer::run(streamer, &mut session)?;
    } else {
        let (events, write) = stdio();
        let streamer = Streamer::new(events, write);
        Streamer::run(streamer, &mut session)?;
    }
    Ok(())
}
