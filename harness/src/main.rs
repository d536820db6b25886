use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use index_bench::datagen::HistoryGenerator;
use index_bench::{Config, ConnectionManager, ConnectionParams};
use rand::rngs::StdRng;
use rand::SeedableRng;

#[derive(Parser, Debug)]
#[command(name = "index_bench")]
#[command(about = "Times SELECT/INSERT/DELETE with and without an index on history(city)")]
struct Cli {
  #[command(subcommand)]
  cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Create the database file and the account allowed to open it.
  Init(Credentials),
  /// Create and load both tables, then sweep record counts × index modes.
  Run(Credentials),
  /// Write COUNT random history records to phistory.tsv in the work directory.
  Generate { count: u64 },
}

#[derive(Args, Debug)]
struct Credentials {
  database_name: String,
  user_name: String,
  password: String,
}

impl From<Credentials> for ConnectionParams {
  fn from(c: Credentials) -> Self {
    return ConnectionParams {
      database: c.database_name,
      user: c.user_name,
      password: c.password,
    };
  }
}

fn main() {
  // Argument errors exit with 1 before anything touches the database.
  let cli = match Cli::try_parse() {
    Ok(cli) => cli,
    Err(err) => {
      let code = if err.use_stderr() { 1 } else { 0 };
      let _ = err.print();
      std::process::exit(code);
    }
  };

  env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

  if let Err(err) = execute(cli) {
    log::error!("{err:#}");
    std::process::exit(1);
  }
}

fn execute(cli: Cli) -> anyhow::Result<()> {
  let config = Config::from_env().context("loading configuration")?;

  match cli.cmd {
    Command::Init(credentials) => {
      let name = credentials.database_name.clone();
      ConnectionManager::new(credentials.into(), &config)
        .init()
        .with_context(|| format!("initialising database '{name}'"))?;
    }
    Command::Run(credentials) => {
      let report = index_bench::run(config, credentials.into()).context("experiment aborted")?;
      println!(
        "Completed {} iterations ({} measurements, {} failed steps)",
        report.iterations, report.recorded, report.failed
      );
    }
    Command::Generate { count } => {
      let generator = HistoryGenerator::load(&config)?;
      let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
      };
      let path = config.history_path();
      let written = generator.write_tsv(count, &mut rng, &path)?;
      println!("Generated {written} history records into {path:?}");
    }
  }
  return Ok(());
}
