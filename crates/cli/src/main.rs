use std::process::ExitCode;

fn main() -> ExitCode {
    rollcall_cli::run()
}
