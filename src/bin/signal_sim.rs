//! Desktop simulator for the signal decoder.
//!
//! Runs the decoder on a RAM CV store with factory defaults and reads
//! commands from stdin:
//!
//! | Command | Effect |
//! |---------|--------|
//! | `<address> <value>` | Accessory command |
//! | `tick <ms>` | Advance simulated time, ticking every 20 ms |
//! | `aspect <mast> <aspect>` | Show an aspect at once |
//! | `show` | Print the lights of every mast |
//!
//! # Usage
//!
//! ```sh
//! RUST_LOG=debug cargo run --bin signal_sim --features sim
//! ```

use std::io::{self, BufRead, Write};
use std::time::Instant;

use anyhow::Context;
use rs_signals::hal::{MockOutputs, RamCvStore};
use rs_signals::layout::MAX_OUTPUTS_PER_MAST;
use rs_signals::traits::Clock;
use rs_signals::{LightSign, SignalDecoder};

/// Main loop interval in milliseconds (50Hz = 20ms)
const LOOP_INTERVAL_MS: u64 = 20;

/// Wall clock plus simulated time from `tick` commands.
struct SimClock {
    start: Instant,
    offset_ms: u64,
}

impl SimClock {
    fn new() -> Self {
        Self {
            start: Instant::now(),
            offset_ms: 0,
        }
    }
}

impl Clock for SimClock {
    fn now_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64 + self.offset_ms
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut decoder = SignalDecoder::new(RamCvStore::new());
    decoder.start().context("writing factory defaults")?;

    let mut clock = SimClock::new();
    let mut outputs = MockOutputs::new();

    println!("=================================");
    println!("  rs-signals Decoder Simulator");
    println!("=================================");
    for mast in 0..decoder.mast_count() {
        if let Some((address, count)) = decoder.address_map().mast_address(mast) {
            println!("mast {:2}: addresses {}..{}", mast, address, address + u16::from(count));
        }
    }

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = line.context("reading stdin")?;
        let words: Vec<&str> = line.split_whitespace().collect();
        let result = match words.as_slice() {
            [] => Ok(()),
            ["tick", ms] => ms
                .parse::<u64>()
                .context("tick needs milliseconds")
                .map(|ms| run_for(&mut decoder, &mut clock, &mut outputs, ms)),
            ["aspect", mast, aspect] => change_aspect(&mut decoder, mast, aspect),
            ["show"] => {
                show(&decoder);
                Ok(())
            }
            [address, value] => command(&mut decoder, &clock, address, value),
            _ => Err(anyhow::anyhow!("unknown command: {}", line)),
        };
        if let Err(e) = result {
            eprintln!("error: {:#}", e);
        }
        decoder.tick(clock.now_ms());
        io::stdout().flush()?;
    }
    Ok(())
}

fn run_for(decoder: &mut SignalDecoder<RamCvStore>, clock: &mut SimClock, outputs: &mut MockOutputs, ms: u64) {
    let mut remaining = ms;
    while remaining > 0 {
        let step = remaining.min(LOOP_INTERVAL_MS);
        clock.offset_ms += step;
        remaining -= step;

        let report = decoder.tick(clock.now_ms());
        for settled in &report.settled {
            println!(
                "mast {:2}: code {} -> aspect {}",
                settled.mast, settled.code, settled.aspect
            );
        }
        // MockOutputs never fails unless told to
        let _ = decoder.drive(outputs);
    }
}

fn command(decoder: &mut SignalDecoder<RamCvStore>, clock: &SimClock, address: &str, value: &str) -> anyhow::Result<()> {
    let address: u16 = address.parse().context("address must be a number")?;
    let value: u8 = value.parse().context("value must be a number")?;
    match decoder.on_address_command(address, value, clock.now_ms()) {
        Some(write) => println!("mast {:2}: pending code {}", write.mast, write.code),
        None => println!("address {} ignored", address),
    }
    Ok(())
}

fn change_aspect(decoder: &mut SignalDecoder<RamCvStore>, mast: &str, aspect: &str) -> anyhow::Result<()> {
    let mast: usize = mast.parse().context("mast must be a number")?;
    let aspect: u8 = aspect.parse().context("aspect must be a number")?;
    decoder.change_aspect(mast, aspect)?;
    Ok(())
}

fn show(decoder: &SignalDecoder<RamCvStore>) {
    for mast in 0..decoder.mast_count() {
        let Some(state) = decoder.mast_state(mast) else {
            continue;
        };
        let mut lights = String::new();
        for light in 0..MAX_OUTPUTS_PER_MAST {
            let Some(output) = decoder.mast_output(mast, light) else {
                continue;
            };
            let function = decoder.current_output_state(usize::from(output));
            let mark = match function.sign() {
                LightSign::Inactive | LightSign::Fixed if !decoder.is_output_lit(usize::from(output)) => '-',
                LightSign::Inactive | LightSign::Fixed => '*',
                _ => '~',
            };
            lights.push_str(&format!(" {}{}", output + 1, mark));
        }
        println!(
            "mast {:2} {:?}: aspect {:2} code {:2}{}",
            mast,
            state.signal_set,
            state.aspect,
            state.code,
            lights
        );
    }
}
