//! commentd - entry point.

use tracing::{error, info};

use commentd::{Args, Command};

#[tokio::main]
async fn main() {
    let args = match Args::parse_from(std::env::args().skip(1)) {
        Ok(Command::Run(args)) => args,
        Ok(Command::Help) => {
            print!("{}", commentd::USAGE);
            return;
        }
        Ok(Command::Version) => {
            println!("commentd {}", commentd::VERSION);
            return;
        }
        Err(e) => {
            eprintln!("{e}");
            eprintln!("Use --help for usage information");
            std::process::exit(1);
        }
    };

    // Logging is not up yet, so startup errors go to stderr.
    let config = match commentd::load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = commentd_telemetry::init_telemetry(&commentd::telemetry_config(&config)) {
        eprintln!("{e}");
        std::process::exit(1);
    }

    info!(
        version = commentd::VERSION,
        ports = ?config.server.ports,
        comment_dir = %config.storage.comment_dir.display(),
        "starting commentd"
    );

    match commentd::run(&config).await {
        Ok(report) => info!(workers = report.workers.len(), "all workers stopped"),
        Err(e) => {
            error!(error = %e, "commentd exited with errors");
            std::process::exit(1);
        }
    }
}
