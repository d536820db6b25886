use constants::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::Config;
use crate::connection::Session;
use crate::datagen::{ensure_persons_file, HistoryGenerator};
use crate::error::Result;
use crate::recorder::{Clock, Recorder};
use crate::schema::LoadStage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
  CreatePersonTable,
  CreateHistoryTable,
  CountPersons,
  CountHistory,
  LoadHistory,
  CreateIndex,
  Select,
  Insert,
  DeleteByCity,
  DeleteByCountry,
  DeleteFirstRows,
  DropIndex,
}

impl Operation {
  pub const DELETES: [Operation; 3] = [
    Operation::DeleteByCity,
    Operation::DeleteByCountry,
    Operation::DeleteFirstRows,
  ];

  pub fn name(&self) -> &'static str {
    return match self {
      Operation::CreatePersonTable => "Create Person Table",
      Operation::CreateHistoryTable => "Create History Table",
      Operation::CountPersons => "Count Person Records",
      Operation::CountHistory => "Count History Records",
      Operation::LoadHistory => "Load History",
      Operation::CreateIndex => "Create Index",
      Operation::Select => "READ: SELECT",
      Operation::Insert => "INSERT",
      Operation::DeleteByCity => "DELETE by city",
      Operation::DeleteByCountry => "DELETE by country",
      Operation::DeleteFirstRows => "DELETE first rows",
      Operation::DropIndex => "Drop Index",
    };
  }

  pub fn description(&self) -> &'static str {
    return match self {
      Operation::CreatePersonTable => "create person table and load persons.tsv",
      Operation::CreateHistoryTable => "create history table and load phistory.tsv",
      Operation::CountPersons => "SELECT COUNT(*) FROM person",
      Operation::CountHistory => "SELECT COUNT(*) FROM history",
      Operation::LoadHistory => "recreate history table from regenerated phistory.tsv",
      Operation::CreateIndex => "CREATE INDEX on history(city)",
      Operation::Select => "join person/history where birth year = 2000 and city = Las Vegas",
      Operation::Insert => "copy every history row into history then rollback",
      Operation::DeleteByCity => "delete history where city = Oslo then rollback",
      Operation::DeleteByCountry => "delete history where country = Norway then rollback",
      Operation::DeleteFirstRows => "delete first 100000 history rows then rollback",
      Operation::DropIndex => "DROP INDEX on history(city)",
    };
  }

  fn query(&self) -> Option<&'static str> {
    return match self {
      Operation::CountPersons => Some(COUNT_PERSON_QUERY),
      Operation::CountHistory => Some(COUNT_HISTORY_QUERY),
      Operation::CreateIndex => Some(CREATE_INDEX_QUERY),
      Operation::Select => Some(READ_QUERY),
      Operation::Insert => Some(INSERT_QUERY),
      Operation::DeleteByCity => Some(DELETE_BY_CITY_QUERY),
      Operation::DeleteByCountry => Some(DELETE_BY_COUNTRY_QUERY),
      Operation::DeleteFirstRows => Some(DELETE_FIRST_ROWS_QUERY),
      Operation::DropIndex => Some(DROP_INDEX_QUERY),
      Operation::CreatePersonTable | Operation::CreateHistoryTable | Operation::LoadHistory => None,
    };
  }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
  /// Iterations that got as far as loading their history rows.
  pub iterations: usize,
  pub recorded: usize,
  pub failed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum After {
  Commit,
  Rollback,
  Keep,
}

struct StepRunner<'a> {
  session: &'a Session,
  recorder: &'a mut Recorder,
  clock: Clock,
  report: SweepReport,
}

impl<'a> StepRunner<'a> {
  fn new(session: &'a Session, recorder: &'a mut Recorder, clock: Clock) -> Self {
    return Self {
      session,
      recorder,
      clock,
      report: SweepReport::default(),
    };
  }

  fn measure<T>(&self, f: impl FnOnce(&Session) -> Result<T>) -> (Result<T>, u128, u128) {
    let start = self.clock.now_ns();
    let result = f(self.session);
    let end = self.clock.now_ns();
    return (result, start, end);
  }

  fn record(&mut self, op: Operation, index: bool, records: u64, start: u128, end: u128) {
    match self
      .recorder
      .record(start, end, op.name(), op.description(), index, records)
    {
      Ok(_) => self.report.recorded += 1,
      Err(err) => log::warn!("Could not record '{}': {err}", op.name()),
    }
  }

  /// Best-effort step: non-fatal failures are logged, rolled back and reported as `Ok(None)`.
  fn step<T>(
    &mut self,
    op: Operation,
    index: bool,
    records: u64,
    after: After,
    f: impl FnOnce(&Session) -> Result<T>,
  ) -> Result<Option<T>> {
    let (result, start, end) = self.measure(f);
    let finished = result.and_then(|value| {
      match after {
        After::Commit => self.session.commit()?,
        After::Rollback => self.session.rollback()?,
        After::Keep => {}
      }
      return Ok(value);
    });

    match finished {
      Ok(value) => {
        self.record(op, index, records, start, end);
        return Ok(Some(value));
      }
      Err(err) if err.is_fatal() => return Err(err),
      Err(err) => {
        log::warn!(
          "{} failed [index={index}, records={records}]: {err}",
          op.name()
        );
        self.report.failed += 1;
        if let Err(err) = self.session.rollback() {
          if err.is_fatal() {
            return Err(err);
          }
          log::warn!("Rollback after '{}' failed: {err}", op.name());
        }
        return Ok(None);
      }
    }
  }

  fn query_step(&mut self, op: Operation, index: bool, records: u64, after: After) -> Result<bool> {
    let Some(sql) = op.query() else {
      return Ok(false);
    };
    let outcome = match op {
      Operation::Select => self.step(op, index, records, after, |s| s.cursor().query_rows(sql))?,
      _ => self.step(op, index, records, after, |s| s.cursor().execute(sql))?,
    };
    let Some(rows) = outcome else {
      return Ok(false);
    };
    log::debug!("{}: {rows} rows", op.name());
    return Ok(true);
  }
}

pub struct Driver<R: Rng> {
  config: Config,
  stage: LoadStage,
  history: HistoryGenerator,
  rng: R,
  clock: Clock,
}

impl Driver<StdRng> {
  pub fn from_config(config: Config) -> Result<Self> {
    let rng = match config.seed {
      Some(seed) => StdRng::seed_from_u64(seed),
      None => StdRng::from_entropy(),
    };
    return Self::new(config, rng);
  }
}

impl<R: Rng> Driver<R> {
  pub fn new(config: Config, rng: R) -> Result<Self> {
    let history = HistoryGenerator::load(&config)?;
    let stage = LoadStage::new(config.work_dir.clone());
    return Ok(Self {
      config,
      stage,
      history,
      rng,
      clock: Clock::start(),
    });
  }

  pub fn setup(&mut self, session: &Session, recorder: &mut Recorder) -> Result<()> {
    ensure_persons_file(&self.config)?;
    self
      .history
      .write_tsv(self.config.sweep.min(), &mut self.rng, &self.config.history_path())?;

    let mut runner = StepRunner::new(session, recorder, self.clock);
    let stage = &self.stage;

    let scripts = [
      (Operation::CreatePersonTable, self.config.person_script()),
      (Operation::CreateHistoryTable, self.config.history_script()),
    ];
    for (op, script) in scripts {
      let (outcome, start, end) = runner.measure(|s| stage.run_script(s, &script));
      let outcome = outcome?;
      runner.record(op, false, outcome.rows_loaded, start, end);
    }

    let mut counts = [0u64; 2];
    for (i, op) in [Operation::CountPersons, Operation::CountHistory].into_iter().enumerate() {
      let sql = op.query().unwrap_or_default();
      let (count, start, end) = runner.measure(|s| s.cursor().query_count(sql));
      counts[i] = count?;
      runner.record(op, false, counts[i], start, end);
    }

    log::info!(
      "Tables created: {} person records, {} history records",
      counts[0],
      counts[1]
    );
    return Ok(());
  }

  /// Runs every index mode × record count. Returns early only on connection-level failures.
  pub fn run_sweep(&mut self, session: &Session, recorder: &mut Recorder) -> Result<SweepReport> {
    let mut runner = StepRunner::new(session, recorder, self.clock);
    let modes = self.config.index_modes.clone();
    let sweep = self.config.sweep;

    log::info!(
      "Sweeping {} record counts × {} index modes ({} iterations)",
      sweep.len(),
      modes.len(),
      sweep.iterations(&modes)
    );

    for index in modes {
      for count in sweep.counts() {
        self.iteration(&mut runner, index, count)?;
      }
    }
    return Ok(runner.report);
  }

  fn iteration(&mut self, runner: &mut StepRunner<'_>, index: bool, count: u64) -> Result<()> {
    log::info!("Iteration [index={index}, records={count}]");

    let history_path = self.config.history_path();
    if let Err(err) = self.history.write_tsv(count, &mut self.rng, &history_path) {
      if err.is_fatal() {
        return Err(err);
      }
      log::warn!("Skipping iteration [index={index}, records={count}]: {err}");
      runner.report.failed += 1;
      return Ok(());
    }

    let stage = &self.stage;
    let script = self.config.history_script();
    // The load script commits on its own.
    let loaded = runner.step(Operation::LoadHistory, index, count, After::Keep, |s| {
      stage.run_script(s, &script)
    })?;
    if loaded.is_none() {
      return Ok(());
    }
    runner.report.iterations += 1;

    if index && !runner.query_step(Operation::CreateIndex, index, count, After::Commit)? {
      log::warn!("Skipping iteration [index={index}, records={count}]: no index to measure against");
      return Ok(());
    }
    runner.query_step(Operation::Select, index, count, After::Keep)?;
    runner.query_step(Operation::Insert, index, count, After::Rollback)?;
    for op in Operation::DELETES {
      runner.query_step(op, index, count, After::Rollback)?;
    }
    if index {
      runner.query_step(Operation::DropIndex, index, count, After::Commit)?;
    }
    return Ok(());
  }
}
