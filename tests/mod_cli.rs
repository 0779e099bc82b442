use plp_bookstore::Database;
use plp_bookstore::catalog::{Catalog, DEFAULT_COLLECTION, seed_sample};
use plp_bookstore::cli::{Command, Report, run};
use plp_bookstore::errors::DbError;
use serde_json::{Value, json};

fn run_lines(db: &Database, cmd: Command) -> Result<Vec<Value>, DbError> {
    let catalog = Catalog::new(db, DEFAULT_COLLECTION);
    let mut out: Vec<u8> = Vec::new();
    run(&catalog, cmd, &mut out)?;
    let text = String::from_utf8(out).unwrap();
    Ok(text.lines().map(|l| serde_json::from_str(l).unwrap()).collect())
}

fn seeded() -> Database {
    let db = Database::new();
    seed_sample(&db, DEFAULT_COLLECTION).unwrap();
    db
}

fn find(filter: &str, project: Option<&str>, sort: Option<&str>, limit: Option<usize>) -> Command {
    Command::Find {
        filter_json: filter.into(),
        project: project.map(Into::into),
        sort: sort.map(Into::into),
        skip: None,
        limit,
        hint: None,
    }
}

#[test]
fn seed_and_count() {
    let db = seeded();
    assert_eq!(run_lines(&db, Command::Seed).unwrap(), vec![json!({"collection": "books", "inserted": 12})]);
    let counted = run_lines(&db, Command::Count { filter_json: r#"{"in_stock": true}"#.into() }).unwrap();
    assert_eq!(counted, vec![json!({"count": 9})]);
}

#[test]
fn find_with_shorthand_sort_and_field_list() {
    let db = seeded();
    let rows = run_lines(&db, find(r#"{"genre": "Fiction"}"#, Some("title,price"), Some("-price,title"), Some(2)))
        .unwrap();
    let shaped: Vec<Value> = rows.iter().map(|r| json!({"title": r["title"], "price": r["price"]})).collect();
    assert_eq!(
        shaped,
        vec![
            json!({"title": "To Kill a Mockingbird", "price": 12.99}),
            json!({"title": "The Alchemist", "price": 10.99}),
        ]
    );
    // field lists keep _id like a Mongo inclusion projection
    assert!(rows.iter().all(|r| r.as_object().unwrap().len() == 3 && r.get("_id").is_some()));
}

#[test]
fn find_with_json_shapes() {
    let db = seeded();
    let rows = run_lines(
        &db,
        find(r#"{"pages": {"$gt": 600}}"#, Some(r#"{"_id": 0, "title": 1}"#), Some(r#"{"pages": 1}"#), None),
    )
    .unwrap();
    assert_eq!(rows, vec![json!({"title": "Moby Dick"}), json!({"title": "The Lord of the Rings"})]);
}

#[test]
fn update_and_delete_report_counts() {
    let db = seeded();
    let upd = Command::UpdateOne {
        filter_json: r#"{"title": "The Alchemist"}"#.into(),
        update_json: r#"{"$set": {"price": 15.99}}"#.into(),
    };
    assert_eq!(run_lines(&db, upd).unwrap(), vec![json!({"matched": 1, "modified": 1})]);
    let del = Command::DeleteOne { filter_json: r#"{"title": "Pride and Prejudice"}"#.into() };
    assert_eq!(run_lines(&db, del).unwrap(), vec![json!({"deleted": 1})]);
    let bad = Command::UpdateOne { filter_json: "{}".into(), update_json: r#"{"price": 1}"#.into() };
    assert!(matches!(run_lines(&db, bad), Err(DbError::QueryError(_))));
}

#[test]
fn reports() {
    let db = seeded();
    let top = run_lines(&db, Command::Report(Report::TopAuthor)).unwrap();
    assert_eq!(top, vec![json!({"author": "George Orwell", "bookCount": 2})]);
    let decades = run_lines(&db, Command::Report(Report::Decades)).unwrap();
    assert_eq!(decades.len(), 9);
    assert_eq!(decades[0], json!({"decade": 1810, "bookCount": 1}));
    let avg = run_lines(&db, Command::Report(Report::AvgPrice)).unwrap();
    assert_eq!(avg.len(), 7);
    assert!(avg.iter().all(|r| r.get("genre").is_some() && r.get("avgPrice").is_some()));
}

#[test]
fn aggregate_and_page() {
    let db = seeded();
    let rows = run_lines(
        &db,
        Command::Aggregate {
            pipeline_json: r#"[{"$match": {"genre": "Fantasy"}}, {"$group": {"_id": "$genre", "pages": {"$sum": "$pages"}}}]"#
                .into(),
        },
    )
    .unwrap();
    assert_eq!(rows, vec![json!({"_id": "Fantasy", "pages": 1488})]);
    let page = run_lines(&db, Command::Page { n: 2 }).unwrap();
    assert_eq!(page.len(), 2);
    assert_eq!(page[1]["title"], "Wuthering Heights");
    let bad = Command::Aggregate { pipeline_json: r#"[{"$lookup": {}}]"#.into() };
    assert!(matches!(run_lines(&db, bad), Err(DbError::PipelineError(_))));
}

#[test]
fn index_commands() {
    let db = seeded();
    let created = run_lines(&db, Command::CreateIndex { keys_json: r#"{"author": 1, "published_year": 1}"#.into() })
        .unwrap();
    assert_eq!(created, vec![json!({"index": "author_1_published_year_1"})]);
    let listed = run_lines(&db, Command::ListIndexes).unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["name"], "author_1_published_year_1");
    let explained = run_lines(
        &db,
        Command::Explain { filter_json: r#"{"author": "Jane Austen"}"#.into(), hint: None },
    )
    .unwrap();
    assert_eq!(explained[0]["plan"], "IXSCAN");
    assert_eq!(explained[0]["n_returned"], 1);
}

#[test]
fn demo_runs_every_step_in_order() {
    let db = seeded();
    let lines = run_lines(&db, Command::Demo).unwrap();
    let steps: Vec<&str> = lines.iter().map(|l| l["step"].as_str().unwrap()).collect();
    assert_eq!(steps.len(), 19);
    assert_eq!(steps[0], "count");
    assert_eq!(lines[0]["result"], 12);
    assert_eq!(lines[4]["result"], json!({"matched": 1, "modified": 1}));
    assert_eq!(lines[6]["result"], json!([]));
    assert_eq!(lines[13]["result"], json!({"author": "George Orwell", "bookCount": 2}));
    assert_eq!(lines[15]["result"]["plan"], "COLLSCAN");
    assert_eq!(lines[15]["result"]["docs_examined"], 11);
    assert_eq!(steps[18], "explain_after_index");
    assert_eq!(lines[18]["result"]["plan"], "IXSCAN");
    assert_eq!(lines[18]["result"]["index_name"], "title_1");
}
