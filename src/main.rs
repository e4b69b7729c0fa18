use clap::Parser;
use sora_sync::args::Args;
use sora_sync::cover::SystemTools;
use sora_sync::logging::init_logging;
use sora_sync::processor::Processor;

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    // Parse command line arguments
    let args = Args::parse();
    init_logging(args.verbose);

    let config = args.into_config()?;

    // Sync and write the run record
    let mut processor = Processor::new(config, SystemTools);
    processor.run()?;

    Ok(())
}
