use std::process::ExitCode;

fn main() -> ExitCode {
    match magnet_flow_params::app::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::from(err.exit_code())
        }
    }
}
