use std::process::ExitCode;

fn main() -> ExitCode {
    bindscope_cli::run()
}
