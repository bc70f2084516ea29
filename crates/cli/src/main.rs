use std::process::ExitCode;

fn main() -> ExitCode {
    coursefinder_cli::run()
}
