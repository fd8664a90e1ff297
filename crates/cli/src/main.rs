use std::process::ExitCode;

fn main() -> ExitCode {
    omnisupport_cli::run()
}
