use std::process::ExitCode;

fn main() -> ExitCode {
    rahnuma_cli::run()
}
