use std::ops::RangeInclusive;

pub const PERSON_COUNT: u32 = 20_000;

pub const PERSON_ID_RANGE: RangeInclusive<u32> = 1..=PERSON_COUNT;
pub const YEAR_RANGE: RangeInclusive<u16> = 1990..=2016;
pub const MONTH_RANGE: RangeInclusive<u8> = 1..=12;
pub const BIRTH_YEAR_RANGE: RangeInclusive<u16> = 1940..=2010;

/// Seed for the person table so every run loads the same 20k rows.
pub const PERSON_SEED: u64 = 0x5EED_0000_2000_0001;

pub const SWEEP_MIN: u64 = 300_000;
pub const SWEEP_STEP: u64 = 25_000;
pub const SWEEP_MAX: u64 = 625_000;
pub const INDEX_MODES: [bool; 2] = [false, true];

pub const RESULTS_FILE: &str = "index_results.csv";
pub const CHART_FILE: &str = "index_times.svg";
pub const HISTORY_FILE: &str = "phistory.tsv";
pub const PERSONS_FILE: &str = "persons.tsv";
pub const CITIES_FILE: &str = "cities.txt";
pub const COUNTRIES_FILE: &str = "countries.txt";
pub const FIRST_NAMES_FILE: &str = "first_names.txt";
pub const LAST_NAMES_FILE: &str = "last_names.txt";
pub const PERSON_SCRIPT: &str = "make_person_table.sql";
pub const HISTORY_SCRIPT: &str = "make_history_table.sql";
pub const DB_EXTENSION: &str = "sqlite";

pub const RESULTS_HEADER: &str =
  "Operation Name, Index, Number of Records, Time (ms), Operation Description";

// Must run outside of a transaction: journal_mode cannot change mid-transaction.
pub const PRAGMAS: &str = r#"
    PRAGMA busy_timeout       = 10000;
    PRAGMA journal_mode       = WAL;
    PRAGMA journal_size_limit = 200000000;
    PRAGMA synchronous        = NORMAL;
    PRAGMA temp_store         = MEMORY;
    PRAGMA cache_size         = -16000;
"#;

pub const CREATE_ACCOUNT_TABLE_QUERY: &str = r#"
    CREATE TABLE bench_account (
      user_name  TEXT PRIMARY KEY NOT NULL,
      digest     TEXT NOT NULL,
      created    DATETIME DEFAULT CURRENT_TIMESTAMP NOT NULL
    );
"#;

pub const INSERT_ACCOUNT_QUERY: &str =
  "INSERT INTO bench_account (user_name, digest) VALUES ($1, $2)";

pub const ACCOUNT_DIGEST_QUERY: &str = "SELECT digest FROM bench_account WHERE user_name = $1";

pub const READ_QUERY: &str = r#"
    SELECT P.lname, P.fname
    FROM person AS P, history AS H
    WHERE P._id = H.pid AND P.byear = 2000 AND H.city = 'Las Vegas'
"#;

pub const INSERT_QUERY: &str = r#"
    INSERT INTO history (pid, eyear, emonth, city, country)
    SELECT pid, eyear, emonth, city, country FROM history
"#;

pub const DELETE_BY_CITY_QUERY: &str = "DELETE FROM history WHERE city = 'Oslo'";

pub const DELETE_BY_COUNTRY_QUERY: &str = "DELETE FROM history WHERE country = 'Norway'";

pub const DELETE_FIRST_ROWS_QUERY: &str = r#"
    DELETE FROM history WHERE rowid IN (
      SELECT rowid FROM history ORDER BY rowid LIMIT 100000
    )
"#;

pub const CREATE_INDEX_QUERY: &str = "CREATE INDEX idx_history_city ON history (city)";

pub const DROP_INDEX_QUERY: &str = "DROP INDEX idx_history_city";

pub const COUNT_PERSON_QUERY: &str = "SELECT COUNT(*) FROM person";

pub const COUNT_HISTORY_QUERY: &str = "SELECT COUNT(*) FROM history";
