//! Writes a synthetic observation table as CSV, in the layout the dashboard
//! can open again with File → Open.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use water_dash::data::loader::write_csv;
use water_dash::data::synthetic::{DatasetCache, Preset};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum PresetArg {
    MalawiDistricts,
    CountryComparison,
}

impl From<PresetArg> for Preset {
    fn from(arg: PresetArg) -> Self {
        match arg {
            PresetArg::MalawiDistricts => Preset::MalawiDistricts,
            PresetArg::CountryComparison => Preset::CountryComparison,
        }
    }
}

#[derive(Parser)]
#[command(
    name = "generate-sample",
    version,
    about = "Write synthetic water sector observations to CSV"
)]
struct Cli {
    #[arg(short, long, value_enum, default_value = "malawi-districts")]
    preset: PresetArg,

    /// Overrides the preset's seed.
    #[arg(short, long)]
    seed: Option<u64>,

    #[arg(short, long, value_name = "CSV", default_value = "sample_data.csv")]
    output: PathBuf,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let preset = Preset::from(cli.preset);
    let table = DatasetCache::new().preset(preset, cli.seed);
    write_csv(&cli.output, &table)?;

    println!(
        "Wrote {} observations ({} entities, {} periods) to {}",
        table.len(),
        table.entities().len(),
        table.periods().len(),
        cli.output.display()
    );
    Ok(())
}
