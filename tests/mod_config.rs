use plp_bookstore::catalog::{self, Catalog};
use plp_bookstore::config::{AppConfig, ConfigLayer, load_with};
use plp_bookstore::errors::DbError;
use plp_bookstore::{Database, logger};
use std::collections::HashMap;
use std::path::PathBuf;

fn env(pairs: &[(&str, String)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs.iter().map(|(k, v)| ((*k).to_string(), v.clone())).collect();
    move |k| map.get(k).cloned()
}

#[test]
fn config_file_named_by_environment() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("shop.toml");
    std::fs::write(&file, "collection = \"inventory\"\nslow_query_ms = 25\nlog_level = \"debug\"\n").unwrap();
    let cfg = load_with(
        ConfigLayer::default(),
        None,
        env(&[("BOOKSTORE_CONFIG", file.display().to_string())]),
    )
    .unwrap();
    assert_eq!(cfg.collection, "inventory");
    assert_eq!(cfg.slow_query_ms, 25);
    assert_eq!(cfg.log_level, "debug");
    assert_eq!(cfg.page_size, AppConfig::default().page_size);
}

#[test]
fn explicit_file_beats_environment_file() {
    let dir = tempfile::tempdir().unwrap();
    let a = dir.path().join("a.toml");
    let b = dir.path().join("b.toml");
    std::fs::write(&a, "db_name = \"explicit\"\n").unwrap();
    std::fs::write(&b, "db_name = \"from_env_path\"\n").unwrap();
    let cfg = load_with(ConfigLayer::default(), Some(&a), env(&[("BOOKSTORE_CONFIG", b.display().to_string())]))
        .unwrap();
    assert_eq!(cfg.db_name, "explicit");
}

#[test]
fn unknown_keys_and_bad_toml_are_config_errors() {
    let dir = tempfile::tempdir().unwrap();
    let typo = dir.path().join("typo.toml");
    std::fs::write(&typo, "pagesize = 3\n").unwrap();
    assert!(matches!(load_with(ConfigLayer::default(), Some(&typo), env(&[])), Err(DbError::Config(_))));

    let broken = dir.path().join("broken.toml");
    std::fs::write(&broken, "page_size = \n").unwrap();
    assert!(matches!(load_with(ConfigLayer::default(), Some(&broken), env(&[])), Err(DbError::Config(_))));

    let empty_name = ConfigLayer { collection: Some("  ".into()), ..ConfigLayer::default() };
    assert!(empty_name.resolve().is_err());
}

#[test]
fn environment_values_are_typed() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = load_with(
        ConfigLayer::default(),
        None,
        env(&[
            ("BOOKSTORE_LOG_DIR", dir.path().display().to_string()),
            ("BOOKSTORE_SLOW_QUERY_MS", " 40 ".into()),
            ("BOOKSTORE_SEED_FILE", "books.ndjson".into()),
        ]),
    )
    .unwrap();
    assert_eq!(cfg.log_dir.as_deref(), Some(dir.path()));
    assert_eq!(cfg.slow_query_ms, 40);
    assert_eq!(cfg.seed_file, Some(PathBuf::from("books.ndjson")));
    assert!(
        load_with(ConfigLayer::default(), None, env(&[("BOOKSTORE_SLOW_QUERY_MS", "-1".into())])).is_err()
    );
}

#[test]
fn seed_file_from_config_loads_books() {
    let dir = tempfile::tempdir().unwrap();
    let seed = dir.path().join("books.ndjson");
    let lines: Vec<String> = catalog::sample_books()
        .iter()
        .take(3)
        .map(|b| serde_json::to_string(b).unwrap())
        .collect();
    std::fs::write(&seed, format!("{}\n\n", lines.join("\n"))).unwrap();
    let cfg_file = dir.path().join("c.toml");
    std::fs::write(&cfg_file, format!("seed_file = {:?}\npage_size = 2\n", seed.display().to_string())).unwrap();

    let cfg = load_with(ConfigLayer::default(), Some(&cfg_file), env(&[])).unwrap();
    let books = catalog::load_ndjson(cfg.seed_file.as_deref().unwrap()).unwrap();
    let db = Database::with_name(&cfg.db_name);
    catalog::seed_books(&db, &cfg.collection, &books).unwrap();
    let c = Catalog::new(&db, &cfg.collection).with_page_size(cfg.page_size);
    assert_eq!(c.count_all().unwrap(), 3);
    assert_eq!(c.page(1).unwrap().len(), 1);
}

#[test]
fn bad_seed_line_is_reported_by_number() {
    let dir = tempfile::tempdir().unwrap();
    let seed = dir.path().join("bad.ndjson");
    let good = serde_json::to_string(&catalog::sample_books()[0]).unwrap();
    std::fs::write(&seed, format!("{good}\n{{\"title\": 3}}\n")).unwrap();
    let err = catalog::load_ndjson(&seed).unwrap_err();
    assert!(err.to_string().contains("line 2"), "{err}");
    assert!(catalog::load_ndjson(&dir.path().join("absent.ndjson")).is_err());
}

#[test]
fn file_logging_writes_into_log_dir() {
    let dir = tempfile::tempdir().unwrap();
    logger::configure_logging(Some(dir.path()), "debug", Some(2)).unwrap();
    log::info!("bookstore test line");
    assert!(dir.path().join("app.log").exists());
}

#[test]
fn log_retention_flows_through_every_layer() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("logs.toml");
    std::fs::write(&file, "log_retention = 4\n").unwrap();
    let from_file = load_with(ConfigLayer::default(), Some(&file), env(&[])).unwrap();
    assert_eq!(from_file.log_retention, Some(4));

    let from_env =
        load_with(ConfigLayer::default(), Some(&file), env(&[("BOOKSTORE_LOG_RETENTION", "3".into())])).unwrap();
    assert_eq!(from_env.log_retention, Some(3));

    let cli = ConfigLayer { log_retention: Some(9), ..ConfigLayer::default() };
    let from_cli = load_with(cli, Some(&file), env(&[("BOOKSTORE_LOG_RETENTION", "3".into())])).unwrap();
    assert_eq!(from_cli.log_retention, Some(9));

    assert!(matches!(
        load_with(ConfigLayer::default(), Some(&file), env(&[("BOOKSTORE_LOG_RETENTION", "0".into())])),
        Err(DbError::Config(_))
    ));
    assert!(load_with(ConfigLayer::default(), None, env(&[("BOOKSTORE_LOG_RETENTION", "many".into())])).is_err());

    let logs = dir.path().join("rolling");
    logger::build_config(Some(&logs), "info", from_file.log_retention).unwrap();
}
