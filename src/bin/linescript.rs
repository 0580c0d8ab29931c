/// linescript CLI
///
/// Runs or checks a program file from the command line.
use linescript_core::cli;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    if let Err(e) = cli::run_cli().await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
