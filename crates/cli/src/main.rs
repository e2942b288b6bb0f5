use std::process::ExitCode;

fn main() -> ExitCode {
    pheona_cli::run()
}
