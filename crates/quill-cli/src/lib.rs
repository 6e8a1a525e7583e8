//! Command-line front end: reads a JSON program, runs the four passes over
//! it and reports the diagnostics.
//!
//! Exit codes: `0` when the program compiled, `1` when it has errors, `2`
//! when compilation aborted (a fatal diagnostic, such as a resolution that
//! never converged, or the error limit) or the input could not be read.

use anyhow::{Context, Result};
use tracing::info;

use quill_model::{Model, compile};

pub mod args;
pub mod config;
pub mod reporter;
pub mod tracing_config;

pub use args::{CliArgs, OutputFormat};

/// What the binary prints and how it exits.
#[derive(Debug)]
pub struct Outcome {
    pub output: String,
    pub exit_code: i32,
}

pub fn run(args: &CliArgs) -> Result<Outcome> {
    if args.no_color {
        colored::control::set_override(false);
    }
    let options = config::resolve_options(args)?;
    if args.show_config {
        let mut output = serde_json::to_string_pretty(&options)?;
        output.push('\n');
        return Ok(Outcome {
            output,
            exit_code: 0,
        });
    }

    let text = std::fs::read_to_string(&args.program)
        .with_context(|| format!("failed to read {}", args.program.display()))?;
    let mut model = Model::from_json(&text)
        .with_context(|| format!("invalid program {}", args.program.display()))?;

    let (report, errs) = compile(&mut model, &options);
    info!(
        success = report.success,
        errors = report.error_count,
        "compiled {}",
        args.program.display()
    );

    let ok = report.check().is_ok();
    let output = match args.format {
        OutputFormat::Json => reporter::render_json(&model, &report, &errs, args.emit)?,
        OutputFormat::Text => {
            let mut out = String::new();
            if args.emit && ok {
                for line in model.listing() {
                    out.push_str(line);
                    out.push('\n');
                }
            }
            out.push_str(&reporter::render_text(&model, &report, &errs));
            out
        }
    };
    let exit_code = if ok {
        0
    } else if errs.has_fatal() || report.aborted {
        2
    } else {
        1
    };
    Ok(Outcome { output, exit_code })
}
