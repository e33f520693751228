//! mmd_viewer 命令行入口

use std::process::ExitCode;

use env_logger::Env;
use mmd_viewer::cli::{parse_args, USAGE};

fn main() -> ExitCode {
    env_logger::init_from_env(Env::default().default_filter_or("info"));

    let args: Vec<String> = std::env::args().skip(1).collect();
    let inputs = match parse_args(&args) {
        Ok(inputs) => inputs,
        Err(e) => {
            log::error!("{}", e);
            println!("{}", USAGE);
            return ExitCode::from(1);
        }
    };

    match mmd_viewer::app::run(inputs) {
        Ok(code) => code,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::from(1)
        }
    }
}
