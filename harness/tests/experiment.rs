use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use constants::*;
use index_bench::datagen::{ensure_persons_file, HistoryGenerator};
use index_bench::schema::LoadStage;
use index_bench::{
  release, Config, ConnectionManager, ConnectionParams, Driver, Error, Operation, Recorder,
  Session, Sweep,
};
use rand::rngs::StdRng;
use rand::SeedableRng;

fn repo_dir(name: &str) -> PathBuf {
  return Path::new(env!("CARGO_MANIFEST_DIR")).join("..").join(name);
}

fn params() -> ConnectionParams {
  return ConnectionParams {
    database: "as3".into(),
    user: "bench".into(),
    password: "hunter2".into(),
  };
}

fn config(work_dir: &Path) -> Config {
  return Config {
    work_dir: work_dir.to_path_buf(),
    data_dir: repo_dir("data"),
    sql_dir: repo_dir("sql"),
    sweep: Sweep::new(300, 25, 625).unwrap(),
    index_modes: vec![false, true],
    seed: Some(11),
    ..Config::default()
  };
}

fn open(config: &Config) -> Session {
  let manager = ConnectionManager::new(params(), config);
  if !manager.path().exists() {
    manager.init().unwrap();
  }
  return manager.acquire().unwrap();
}

fn history_count(session: &Session) -> u64 {
  return session.cursor().query_count(COUNT_HISTORY_QUERY).unwrap();
}

/// Accepts `budget` bytes, then fails every write as if the disk had filled up.
struct FillingWriter {
  written: usize,
  budget: usize,
}

impl Write for FillingWriter {
  fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
    if self.written + buf.len() > self.budget {
      self.written = self.budget;
      return Err(std::io::Error::other("results device is full"));
    }
    self.written += buf.len();
    return Ok(buf.len());
  }

  fn flush(&mut self) -> std::io::Result<()> {
    return Ok(());
  }
}

/// Rows of the results file keyed by (operation, index flag).
fn rows_by_operation(path: &Path) -> (String, HashMap<(String, bool), usize>) {
  let contents = std::fs::read_to_string(path).unwrap();
  let mut lines = contents.lines();
  let header = lines.next().unwrap().to_string();

  let mut rows = HashMap::new();
  for line in lines {
    let fields: Vec<&str> = line.split(", ").collect();
    assert_eq!(fields.len(), 5, "{line}");
    let key = (fields[0].to_string(), fields[1] == "True");
    *rows.entry(key).or_insert(0) += 1;
  }
  return (header, rows);
}

#[test]
fn load_stage_twice_gives_same_counts() {
  let tmp_dir = tempfile::TempDir::new().unwrap();
  let config = config(tmp_dir.path());
  let session = open(&config);

  ensure_persons_file(&config).unwrap();
  HistoryGenerator::load(&config)
    .unwrap()
    .write_tsv(500, &mut StdRng::seed_from_u64(5), &config.history_path())
    .unwrap();

  let stage = LoadStage::new(tmp_dir.path());
  for _ in 0..2 {
    let persons = stage.run_script(&session, &config.person_script()).unwrap();
    let history = stage.run_script(&session, &config.history_script()).unwrap();
    assert_eq!(persons.rows_loaded, PERSON_COUNT as u64);
    assert_eq!(history.rows_loaded, 500);

    assert_eq!(
      session.cursor().query_count(COUNT_PERSON_QUERY).unwrap(),
      PERSON_COUNT as u64
    );
    assert_eq!(history_count(&session), 500);
  }

  release(session).unwrap();
}

#[test]
fn measured_writes_are_rolled_back() {
  let tmp_dir = tempfile::TempDir::new().unwrap();
  let config = config(tmp_dir.path());
  let session = open(&config);

  ensure_persons_file(&config).unwrap();
  HistoryGenerator::load(&config)
    .unwrap()
    .write_tsv(2_000, &mut StdRng::seed_from_u64(9), &config.history_path())
    .unwrap();
  let stage = LoadStage::new(tmp_dir.path());
  stage.run_script(&session, &config.person_script()).unwrap();
  stage.run_script(&session, &config.history_script()).unwrap();

  let before = history_count(&session);
  assert_eq!(before, 2_000);

  for sql in [
    INSERT_QUERY,
    DELETE_BY_CITY_QUERY,
    DELETE_BY_COUNTRY_QUERY,
    DELETE_FIRST_ROWS_QUERY,
  ] {
    session.cursor().execute(sql).unwrap();
    session.rollback().unwrap();
    assert_eq!(history_count(&session), before, "{sql}");
  }

  release(session).unwrap();
}

#[test]
fn sweep_records_every_step() {
  let tmp_dir = tempfile::TempDir::new().unwrap();
  let config = config(tmp_dir.path());
  ConnectionManager::new(params(), &config).init().unwrap();

  let sweep = config.sweep;
  let results = config.results_path();
  let report = index_bench::run(config.clone(), params()).unwrap();

  // 2 × ((625 - 300) / 25 + 1)
  assert_eq!(sweep.iterations(&[false, true]), 28);
  assert_eq!(report.iterations, 28);
  assert_eq!(report.failed, 0);
  // load + select + insert + 3 deletes per iteration, plus create/drop index on the indexed half.
  assert_eq!(report.recorded, 28 * 6 + 14 * 2);

  let (header, rows) = rows_by_operation(&results);
  assert_eq!(header, RESULTS_HEADER);

  let count = |op: Operation, index: bool| {
    return rows
      .get(&(op.name().to_string(), index))
      .copied()
      .unwrap_or(0);
  };
  for index in [false, true] {
    assert_eq!(count(Operation::Select, index), 14);
    assert_eq!(count(Operation::Insert, index), 14);
    for op in Operation::DELETES {
      assert_eq!(count(op, index), 14, "{}", op.name());
    }
  }
  assert_eq!(count(Operation::CreateIndex, true), 14);
  assert_eq!(count(Operation::DropIndex, true), 14);
  assert_eq!(count(Operation::CreateIndex, false), 0);
  assert_eq!(count(Operation::DropIndex, false), 0);
  assert_eq!(count(Operation::CreatePersonTable, false), 1);
  assert_eq!(count(Operation::CountHistory, false), 1);

  // The last iteration reloaded the maximum count and every measured write was rolled back.
  let session = open(&config);
  assert_eq!(history_count(&session), 625);
  release(session).unwrap();
}

#[test]
fn failing_step_does_not_stop_the_sweep() {
  let tmp_dir = tempfile::TempDir::new().unwrap();
  let sql_dir = tmp_dir.path().join("sql");
  std::fs::create_dir(&sql_dir).unwrap();
  std::fs::copy(repo_dir("sql").join(PERSON_SCRIPT), sql_dir.join(PERSON_SCRIPT)).unwrap();

  // The index already exists after every reload, so each CREATE INDEX step fails.
  let history = std::fs::read_to_string(repo_dir("sql").join(HISTORY_SCRIPT)).unwrap();
  std::fs::write(
    sql_dir.join(HISTORY_SCRIPT),
    format!("{history}\n{CREATE_INDEX_QUERY};\n"),
  )
  .unwrap();

  let config = Config {
    sql_dir,
    sweep: Sweep::new(100, 100, 300).unwrap(),
    ..config(tmp_dir.path())
  };
  ConnectionManager::new(params(), &config).init().unwrap();

  let report = index_bench::run(config.clone(), params()).unwrap();
  assert_eq!(report.iterations, 6);
  assert_eq!(report.failed, 3);

  let (_, rows) = rows_by_operation(&config.results_path());
  // Without the index nothing of the indexed iterations is recorded.
  assert_eq!(rows.get(&(Operation::CreateIndex.name().to_string(), true)), None);
  assert_eq!(rows.get(&(Operation::Select.name().to_string(), true)), None);
  assert_eq!(rows.get(&(Operation::DropIndex.name().to_string(), true)), None);
  assert_eq!(rows.get(&(Operation::LoadHistory.name().to_string(), true)), Some(&3));
  assert_eq!(rows.get(&(Operation::Select.name().to_string(), false)), Some(&3));
}

#[test]
fn bad_credentials_fail_before_results_are_touched() {
  let tmp_dir = tempfile::TempDir::new().unwrap();
  let config = config(tmp_dir.path());
  ConnectionManager::new(params(), &config).init().unwrap();

  let wrong = ConnectionParams {
    password: "wrong".into(),
    ..params()
  };
  let err = index_bench::run(config.clone(), wrong).err().unwrap();
  assert!(matches!(err, Error::Authentication { .. }), "{err}");
  assert!(err.is_fatal());
  assert!(!config.results_path().exists());
}

#[test]
fn missing_script_is_fatal_at_setup() {
  let tmp_dir = tempfile::TempDir::new().unwrap();
  let config = Config {
    sql_dir: tmp_dir.path().join("no-such-dir"),
    ..config(tmp_dir.path())
  };
  ConnectionManager::new(params(), &config).init().unwrap();

  let err = index_bench::run(config, params()).err().unwrap();
  assert!(matches!(err, Error::FileNotFound(_)), "{err}");
}

#[cfg(target_os = "linux")]
#[test]
fn unwritable_results_file_does_not_stop_the_run() {
  let tmp_dir = tempfile::TempDir::new().unwrap();
  let config = Config {
    results_file: PathBuf::from("/dev/full"),
    ..config(tmp_dir.path())
  };
  ConnectionManager::new(params(), &config).init().unwrap();

  let report = index_bench::run(config.clone(), params()).unwrap();
  assert_eq!(report.iterations, 28);
  assert_eq!(report.failed, 0);
  assert_eq!(report.recorded, 0);

  let session = open(&config);
  assert_eq!(history_count(&session), 625);
  release(session).unwrap();
}

#[test]
fn results_write_failures_mid_sweep_are_skipped() {
  let tmp_dir = tempfile::TempDir::new().unwrap();
  let config = config(tmp_dir.path());
  let session = open(&config);

  // Room for the header and a few rows only.
  let writer = FillingWriter {
    written: 0,
    budget: RESULTS_HEADER.len() + 1 + 400,
  };
  let mut recorder = Recorder::from_writer(config.results_path(), writer).unwrap();
  let mut driver = Driver::from_config(config.clone()).unwrap();

  driver.setup(&session, &mut recorder).unwrap();
  let report = driver.run_sweep(&session, &mut recorder).unwrap();

  assert_eq!(report.iterations, 28);
  assert_eq!(report.failed, 0);
  assert!(report.recorded < 28 * 6 + 14 * 2, "{report:?}");
  assert!(recorder.rows() > 0);
  assert_eq!(history_count(&session), 625);

  release(session).unwrap();
}

#[test]
fn connection_failure_mid_sweep_ends_it() {
  let tmp_dir = tempfile::TempDir::new().unwrap();
  let config = Config {
    sweep: Sweep::new(300, 2_000, 2_300).unwrap(),
    ..config(tmp_dir.path())
  };
  let session = open(&config);
  let mut recorder = Recorder::create(config.results_path()).unwrap();
  let mut driver = Driver::from_config(config.clone()).unwrap();
  driver.setup(&session, &mut recorder).unwrap();

  // Freeze the file at its current size: the next statement that needs a new page fails with SQLITE_FULL.
  let pages = session.cursor().query_count("PRAGMA page_count").unwrap();
  let max_pages = session
    .cursor()
    .query_count(&format!("PRAGMA max_page_count = {pages}"))
    .unwrap();
  assert_eq!(max_pages, pages);

  let err = driver.run_sweep(&session, &mut recorder).err().unwrap();
  assert!(matches!(err, Error::Sqlite(_)), "{err}");
  assert!(err.is_fatal());
}
