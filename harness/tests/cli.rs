use std::process::Command;

fn index_bench(work_dir: &std::path::Path) -> Command {
  let mut cmd = Command::new(env!("CARGO_BIN_EXE_index_bench"));
  cmd.env("INDEX_BENCH_WORK_DIR", work_dir);
  return cmd;
}

#[test]
fn run_with_two_arguments_exits_with_usage() {
  let tmp_dir = tempfile::TempDir::new().unwrap();
  let output = index_bench(tmp_dir.path())
    .args(["run", "as3", "bench"])
    .output()
    .unwrap();

  assert_eq!(output.status.code(), Some(1));
  let stderr = String::from_utf8_lossy(&output.stderr);
  assert!(stderr.contains("Usage"), "{stderr}");
  // Nothing was opened or created.
  assert_eq!(std::fs::read_dir(tmp_dir.path()).unwrap().count(), 0);
}

#[test]
fn run_with_four_arguments_exits_with_usage() {
  let tmp_dir = tempfile::TempDir::new().unwrap();
  let output = index_bench(tmp_dir.path())
    .args(["run", "as3", "bench", "pw", "extra"])
    .output()
    .unwrap();
  assert_eq!(output.status.code(), Some(1));
}

#[test]
fn run_against_missing_database_fails() {
  let tmp_dir = tempfile::TempDir::new().unwrap();
  let output = index_bench(tmp_dir.path())
    .args(["run", "missing", "bench", "pw"])
    .env("RUST_LOG", "error")
    .output()
    .unwrap();

  assert_eq!(output.status.code(), Some(1));
  assert!(String::from_utf8_lossy(&output.stderr).contains("does not exist"));
}
