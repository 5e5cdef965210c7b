//! Headless front end for the K-584 bit-sliced processor emulator: loads a
//! microprogram file and drives it to completion without a UI, per
//! `SPEC_FULL.md` §10 (the windowed editor itself is out of scope, see §1).

use std::error::Error;
use std::fs;
use std::path::PathBuf;

use clap::Parser;
use log::{info, warn};

use x584_core::codec;
use x584_core::driver::{Driver, NoInput, RunMode, StopReason};

/// Load and run a K-584 microprogram file headlessly.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Microprogram file to load (`.x584` native or `.prj` legacy text). If
    /// omitted, runs an empty (all-NOP) program store.
    file: Option<PathBuf>,

    /// Maximum number of microinstructions to execute before giving up.
    #[arg(long, default_value_t = 1_000_000)]
    steps: u32,

    /// Stop once the instruction pointer reaches this address, instead of
    /// running to completion.
    #[arg(long, value_name = "ADDR")]
    to: Option<u16>,
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let program = match &cli.file {
        Some(path) => {
            let bytes = fs::read(path)?;
            let program = codec::load(&bytes)?;
            info!("loaded {}", path.display());
            program
        }
        None => {
            info!("no file given, running an empty program store");
            codec::Program::new()
        }
    };

    let mut driver = Driver::new(program, 16);
    let mode = match cli.to {
        Some(addr) => RunMode::RunToCursor(addr),
        None => RunMode::Run,
    };

    let reason = driver.run(mode, &mut NoInput, cli.steps);
    match reason {
        StopReason::InputCancelled => warn!(
            "stopped at IP={}: an instruction needed an input value with no resolving annotation",
            driver.ip
        ),
        StopReason::StepBudgetExhausted => warn!("stopped after {} steps without reaching a natural end", cli.steps),
        other => info!("run stopped: {other:?}"),
    }

    println!("IP={} WR={:#06x} XWR={:#06x}", driver.ip, driver.processor.wr, driver.processor.xwr);
    for (i, r) in driver.processor.reg.iter().enumerate() {
        println!("REG{i}={r:#06x}");
    }
    println!("OutFlags={:#010x}", driver.out_flags.bits());

    Ok(())
}
