//! bulletin-corpus CLI: traffic bulletin corpus builder.
//!
//! Selects and cleans generated bulletins from the snapshot workbook, caches
//! the whole-dataset corpus, and pairs it with the broadcast archive.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli)
}
