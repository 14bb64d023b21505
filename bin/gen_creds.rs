use std::{fs::File, io::Write};

use clap::Parser;
use rand::Rng;

/// Write a set of aligned sample credential files for a local fleet.
#[derive(Debug, Parser)]
struct CliOpts {
    /// How many entries to generate in each file.
    #[clap(long, default_value_t = 20)]
    count: u32,
}

fn main() -> eyre::Result<()> {
    let opts = CliOpts::parse();

    let mut names = File::create("names.txt")?;
    let mut beneficiaries = File::create("beneficiaries.txt")?;
    let mut keys = File::create("keys.txt")?;
    let mut proxies = File::create("proxies.txt")?;

    let mut rng = rand::thread_rng();
    for i in 0..opts.count {
        writeln!(names, "executor-{i:02}")?;

        let address: [u8; 20] = rng.gen();
        writeln!(beneficiaries, "0x{}", hex::encode(address))?;

        let key: [u8; 32] = rng.gen();
        writeln!(keys, "0x{}", hex::encode(key))?;

        writeln!(proxies, "user{i}:pass{i}@203.0.113.{}:8080", (i % 254) + 1)?;
    }

    println!("wrote {} aligned entries to names/beneficiaries/keys/proxies", opts.count);

    Ok(())
}
