use human_panic::{metadata, setup_panic};
use log::error;
use nexus_water::cli::run_cli;
use nexus_water::log::is_logger_initialised;

fn main() {
    setup_panic!(metadata!().support("Please report this crash to the nexus-water maintainers"));

    if let Err(err) = run_cli() {
        if is_logger_initialised() {
            error!("{err:?}");
        } else {
            eprintln!("Error: {err:?}");
        }

        // Terminate program, signalling an error
        std::process::exit(1);
    }
}
