use std::process::ExitCode;
use clap::Parser as ClapParser;
use log::LevelFilter;
use simple_logger::SimpleLogger;
use lisp_lang::Config;

fn main() -> ExitCode {
    let config: Config = Config::parse();

    let level = if config.verbose { LevelFilter::Debug } else { LevelFilter::Info };

    if let Err(err) = SimpleLogger::new().with_level(level).init() {
        eprintln!("Failed to initialize logger: {}", err);
    }

    match lisp_lang::run(config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{}", err);
            ExitCode::FAILURE
        },
    }
}
