use std::path::PathBuf;

use clap::Parser;
use plot_bench::PlotError;

#[derive(Parser, Debug)]
#[command(name = "plot_bench")]
#[command(about = "Plot Time (ms) vs Number of Records for every operation in the results CSV")]
struct Cli {
  /// Results file written by `index_bench run`.
  #[arg(long, default_value = constants::RESULTS_FILE)]
  csv: PathBuf,

  /// Output SVG path.
  #[arg(long, default_value = constants::CHART_FILE)]
  out: PathBuf,
}

fn main() {
  env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
  let cli = Cli::parse();

  match plot_bench::plot(&cli.csv, &cli.out) {
    Ok(series) => println!("Saved {series} series to {:?}", cli.out),
    Err(err @ PlotError::NotFound(_)) => {
      eprintln!("{err}");
      std::process::exit(2);
    }
    Err(err) => {
      let err = anyhow::Error::new(err).context(format!("plotting {:?}", cli.csv));
      log::error!("{err:#}");
      std::process::exit(1);
    }
  }
}
