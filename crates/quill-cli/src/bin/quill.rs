use clap::Parser;

use quill_cli::{CliArgs, run, tracing_config};

#[allow(clippy::print_stderr)]
fn main() {
    tracing_config::init_tracing();
    let args = CliArgs::parse();
    match run(&args) {
        Ok(outcome) => {
            print!("{}", outcome.output);
            std::process::exit(outcome.exit_code);
        }
        Err(err) => {
            eprintln!("error: {err:#}");
            std::process::exit(2);
        }
    }
}
