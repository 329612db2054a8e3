//! tsdbpool command line.

use clap::Parser;
use tracing::error;

use tsdbpool::cli::{self, Cli};

fn main() {
    let args = Cli::parse();
    tsdbpool::init_logging(args.log_json);

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            error!("{}", err);
            std::process::exit(1);
        }
    };

    if let Err(err) = runtime.block_on(cli::run(args)) {
        error!("{}", err);
        std::process::exit(1);
    }
}
