pub mod config;
pub mod connection;
pub mod datagen;
pub mod driver;
pub mod error;
pub mod recorder;
pub mod schema;

pub use config::{Config, Sweep};
pub use connection::{release, ConnectionManager, ConnectionParams, Cursor, Session};
pub use driver::{Driver, Operation, SweepReport};
pub use error::{Error, Result};
pub use recorder::{Clock, Recorder, TimingRecord};

pub fn run(config: Config, params: ConnectionParams) -> Result<SweepReport> {
  let manager = ConnectionManager::new(params, &config);
  let session = manager.acquire()?;

  let mut recorder = Recorder::open(config.results_path());
  let result = Driver::from_config(config).and_then(|mut driver| {
    driver.setup(&session, &mut recorder)?;
    return driver.run_sweep(&session, &mut recorder);
  });

  let report = match result {
    Ok(report) => report,
    Err(err) => {
      if let Err(close_err) = release(session) {
        log::warn!("Closing the session after failure: {close_err}");
      }
      return Err(err);
    }
  };

  release(session)?;
  log::info!(
    "Sweep done: {} iterations, {} rows recorded to {:?}, {} failed steps",
    report.iterations,
    recorder.rows(),
    recorder.path(),
    report.failed
  );
  return Ok(report);
}
