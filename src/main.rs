use std::{io, process::ExitCode};

use tabular_qa::{io_utils, response::Response};

fn main() -> ExitCode {
    match tabular_qa::run() {
        Ok(code) => code,
        Err(err) => {
            let message = format!("{err:#}");
            let response = Response::error(message.trim());
            if io_utils::write_json_line(io::stdout().lock(), &response).is_err() {
                eprintln!("error: {message}");
            }
            ExitCode::FAILURE
        }
    }
}
