//! probar-dom: run DOM queries against HTML files
//!
//! ## Usage
//!
//! ```bash
//! probar-dom debug page.html                          # Pretty-print the document
//! probar-dom query page.html --by role button --all   # Every button
//! probar-dom query page.html --by label-text Email    # Exactly one labelled control
//! probar-dom roles page.html                          # Accessible roles
//! ```

use clap::Parser;
use probar_dom_cli::{execute, logging, Cli};
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose, cli.quiet);

    match execute(&cli) {
        Ok(output) => {
            if !output.is_empty() {
                println!("{output}");
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
