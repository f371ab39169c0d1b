use std::process::ExitCode;

fn main() -> ExitCode {
    estatedesk_cli::run()
}
