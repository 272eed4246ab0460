use std::process::ExitCode;

fn main() -> ExitCode {
    srvconf_cli::run()
}
