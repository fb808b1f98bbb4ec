use std::{env, fs, process::ExitCode};

use ouros::{Interpreter, Object};

fn main() -> ExitCode {
    let args: Vec<String> = env::args().collect();
    let Some(file_path) = args.get(1) else {
        eprintln!("usage: ouros <file.py>");
        return ExitCode::FAILURE;
    };

    let source = match fs::read_to_string(file_path) {
        Ok(source) => source,
        Err(err) => {
            eprintln!("error reading {file_path}: {err}");
            return ExitCode::FAILURE;
        }
    };

    let interp = Interpreter::new();
    match interp.run(&source) {
        Object::Exception { exc_type, message } => {
            eprintln!("Traceback (most recent call last):\n{exc_type}: {message}");
            ExitCode::FAILURE
        }
        Object::None => ExitCode::SUCCESS,
        value => {
            println!("{value}");
            ExitCode::SUCCESS
        }
    }
}
