//! Beacon command-line frontend.

fn main() {
    if let Err(e) = beacon::cli::run() {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
