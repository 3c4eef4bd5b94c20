use std::{env, io, process};

use log::{error, info};
use node::{Config, LaunchErr};

#[tokio::main]
async fn main() -> io::Result<()> {
    let args: Vec<String> = env::args().collect();
    let program = args.first().map(String::as_str).unwrap_or("dist_graphsage");

    // The debug flag is accepted for compatibility and has no effect.
    let (encoded, index) = match args.as_slice() {
        [_, encoded, index, _debug] => match index.parse::<usize>() {
            Ok(index) => (encoded.as_str(), index),
            Err(_) => usage(program),
        },
        _ => usage(program),
    };

    env_logger::init();

    let config = Config::load().map_err(LaunchErr::from)?;
    info!(index = index; "launching");
    if let Err(e) = node::launch(config, encoded, index).await {
        error!("launch failed: {e}");
        return Err(e.into());
    }

    Ok(())
}

fn usage(program: &str) -> ! {
    eprintln!("Usage: {program} <handle> <index> <debug>");
    process::exit(1);
}
