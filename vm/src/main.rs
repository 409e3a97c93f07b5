use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser as ClapParser;
use log::LevelFilter;

use vm::{Completion, Vm, dump_heap};

#[derive(ClapParser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Heap image to run
    #[arg(help = "The .ohp heap image to execute")]
    image: Option<PathBuf>,

    /// Print the cell table and entry disassembly instead of executing
    #[arg(long, help = "Dump cells + entry bytecode for the image")]
    dump: bool,

    /// Exit with status 2 if an exception escapes the entry code
    #[arg(long)]
    strict: bool,

    /// Raise log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_timestamp(None)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let Some(path) = cli.image.clone() else {
        eprintln!("usage: ovm <IMAGE>");
        return ExitCode::from(1);
    };

    match run(&cli, path) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(1)
        }
    }
}

fn run(cli: &Cli, path: PathBuf) -> anyhow::Result<ExitCode> {
    let heap = heap::load_file(&path)
        .with_context(|| format!("failed to load heap image '{}'", path.display()))?;

    let stdout = io::stdout();
    let mut out = stdout.lock();

    if cli.dump {
        dump_heap(&heap, &mut out).context("failed to write dump")?;
        out.flush()?;
        return Ok(ExitCode::SUCCESS);
    }

    let mut vm = Vm::new(&heap, out);
    let completion = vm.run_main();
    vm.into_output().flush()?;

    match completion {
        Completion::Raised(err) => {
            eprintln!("unhandled exception: {err}");
            if cli.strict {
                return Ok(ExitCode::from(2));
            }
        }
        Completion::Returned(value) => {
            log::debug!("main returned {}", value.describe(&heap));
        }
        Completion::Finished => {}
    }
    Ok(ExitCode::SUCCESS)
}
