use bson::doc;
use plp_bookstore::Database;
use plp_bookstore::catalog::{Catalog, DEFAULT_COLLECTION, seed_sample};
use plp_bookstore::document::Document;
use plp_bookstore::errors::DbError;
use plp_bookstore::index::IndexSpec;
use plp_bookstore::query::{
    Filter, FindOptions, PlanKind, UpdateDoc, parse_filter_json, parse_index_keys_json,
};

fn seeded() -> Database {
    let db = Database::new();
    seed_sample(&db, DEFAULT_COLLECTION).unwrap();
    db
}

fn titles(db: &Database, filter: &Filter) -> Vec<String> {
    db.find(DEFAULT_COLLECTION, filter, &FindOptions::default())
        .unwrap()
        .map(|d| d.data.get_str("title").unwrap().to_string())
        .collect()
}

#[test]
fn range_filter_uses_index_and_matches_collscan() {
    let db = seeded();
    let f = parse_filter_json(r#"{"published_year": {"$gte": 1950, "$lt": 1960}}"#).unwrap();
    let scanned = titles(&db, &f);

    db.create_index(DEFAULT_COLLECTION, IndexSpec::single("published_year")).unwrap();
    let report = db.explain(DEFAULT_COLLECTION, &f, &FindOptions::default()).unwrap();
    assert_eq!(report.plan, PlanKind::Ixscan);
    assert_eq!(report.index_name.as_deref(), Some("published_year_1"));
    assert_eq!(report.keys_examined, 2);
    assert_eq!(report.docs_examined, 2);
    assert_eq!(titles(&db, &f), scanned);
    assert_eq!(scanned, vec!["The Catcher in the Rye", "The Lord of the Rings"]);
}

#[test]
fn exclusive_bounds_skip_the_boundary_key() {
    let db = seeded();
    db.create_index(DEFAULT_COLLECTION, IndexSpec::single("published_year")).unwrap();
    let f = Filter::And(vec![Filter::gt("published_year", 1949), Filter::lt("published_year", 1954)]);
    let report = db.explain(DEFAULT_COLLECTION, &f, &FindOptions::default()).unwrap();
    assert_eq!(report.plan, PlanKind::Ixscan);
    assert_eq!(titles(&db, &f), vec!["The Catcher in the Rye"]);
}

#[test]
fn compound_index_serves_leading_field_lookups() {
    let db = seeded();
    let c = Catalog::new(&db, DEFAULT_COLLECTION);
    c.create_author_year_index().unwrap();
    let f = Filter::eq("author", "George Orwell");
    let report = db.explain(DEFAULT_COLLECTION, &f, &FindOptions::default()).unwrap();
    assert_eq!(report.plan, PlanKind::Ixscan);
    assert_eq!(report.index_name.as_deref(), Some("author_1_published_year_1"));
    assert_eq!(report.keys_examined, 2);
    assert_eq!(titles(&db, &f), vec!["1984", "Animal Farm"]);

    // a filter on the second key alone cannot use it
    let by_year = Filter::eq("published_year", 1945);
    let report = db.explain(DEFAULT_COLLECTION, &by_year, &FindOptions::default()).unwrap();
    assert_eq!(report.plan, PlanKind::Collscan);
}

#[test]
fn planner_prefers_first_index_by_name() {
    let db = seeded();
    let c = Catalog::new(&db, DEFAULT_COLLECTION);
    c.create_title_index().unwrap();
    db.create_index(DEFAULT_COLLECTION, IndexSpec::single("published_year")).unwrap();
    let f = Filter::And(vec![Filter::eq("title", "The Hobbit"), Filter::gt("published_year", 1900)]);
    let report = db.explain(DEFAULT_COLLECTION, &f, &FindOptions::default()).unwrap();
    assert_eq!(report.index_name.as_deref(), Some("published_year_1"));
    assert_eq!(report.n_returned, 1);

    let hinted = db.explain(DEFAULT_COLLECTION, &f, &FindOptions::default().hint("title_1")).unwrap();
    assert_eq!(hinted.index_name.as_deref(), Some("title_1"));
    assert_eq!(hinted.docs_examined, 1);
}

#[test]
fn disjunctions_fall_back_to_collscan() {
    let db = seeded();
    Catalog::new(&db, DEFAULT_COLLECTION).create_title_index().unwrap();
    let f = parse_filter_json(r#"{"$or": [{"title": "1984"}, {"title": "Moby Dick"}]}"#).unwrap();
    let report = db.explain(DEFAULT_COLLECTION, &f, &FindOptions::default()).unwrap();
    assert_eq!(report.plan, PlanKind::Collscan);
    assert_eq!(report.n_returned, 2);
}

#[test]
fn writes_keep_indexes_in_step() {
    let db = seeded();
    let c = Catalog::new(&db, DEFAULT_COLLECTION);
    c.create_title_index().unwrap();

    db.update_one(DEFAULT_COLLECTION, &Filter::eq("title", "Moby Dick"), &UpdateDoc::set("title", "Moby-Dick"))
        .unwrap();
    let old = db.explain(DEFAULT_COLLECTION, &Filter::eq("title", "Moby Dick"), &FindOptions::default()).unwrap();
    assert_eq!((old.plan, old.docs_examined, old.n_returned), (PlanKind::Ixscan, 0, 0));
    let new = db.explain(DEFAULT_COLLECTION, &Filter::eq("title", "Moby-Dick"), &FindOptions::default()).unwrap();
    assert_eq!((new.docs_examined, new.n_returned), (1, 1));

    c.delete_by_title("Moby-Dick").unwrap();
    let gone = db.explain(DEFAULT_COLLECTION, &Filter::eq("title", "Moby-Dick"), &FindOptions::default()).unwrap();
    assert_eq!(gone.keys_examined, 0);

    let mut extra = c.by_title("1984").unwrap()[0].to_document();
    extra.insert("title", "Homage to Catalonia");
    extra.insert("published_year", 1938);
    db.insert_document(DEFAULT_COLLECTION, Document::new(extra)).unwrap();
    let added = db
        .explain(DEFAULT_COLLECTION, &Filter::eq("title", "Homage to Catalonia"), &FindOptions::default())
        .unwrap();
    assert_eq!((added.docs_examined, added.n_returned), (1, 1));
}

#[test]
fn index_built_over_existing_documents() {
    let db = Database::new();
    db.create_collection("t");
    for n in [3, 1, 2, 1] {
        db.insert_document("t", Document::new(doc! {"n": n})).unwrap();
    }
    db.create_index("t", IndexSpec::single("n")).unwrap();
    let idx = db.list_indexes("t").unwrap();
    assert_eq!(idx.len(), 1);
    assert_eq!(idx[0].name, "n_1");
    assert_eq!(idx[0].stats.keys, 3);
    assert_eq!(idx[0].stats.entries, 4);
    let r = db.explain("t", &Filter::eq("n", 1), &FindOptions::default()).unwrap();
    assert_eq!((r.keys_examined, r.n_returned), (1, 2));
}

#[test]
fn drop_index_returns_to_collscan() {
    let db = seeded();
    let c = Catalog::new(&db, DEFAULT_COLLECTION);
    c.create_title_index().unwrap();
    assert!(db.drop_index(DEFAULT_COLLECTION, "title_1").unwrap());
    assert!(!db.drop_index(DEFAULT_COLLECTION, "title_1").unwrap());
    let r = c.explain_title_lookup("The Hobbit", false).unwrap();
    assert_eq!(r.plan, PlanKind::Collscan);
    assert!(matches!(c.explain_title_lookup("The Hobbit", true), Err(DbError::QueryError(_))));
}

#[test]
fn invalid_key_specs_are_rejected() {
    assert!(matches!(parse_index_keys_json(r#"{"a": 2}"#), Err(DbError::IndexError(_) | DbError::QueryError(_))));
    assert!(parse_index_keys_json("{}").is_err());
    assert!(parse_index_keys_json(r#"{"a": "text"}"#).is_err());
    let db = seeded();
    assert!(matches!(
        db.create_index(DEFAULT_COLLECTION, IndexSpec::compound(&["a", "a"])),
        Err(DbError::IndexError(_))
    ));
    let desc = parse_index_keys_json(r#"{"price": -1, "title": 1}"#).unwrap();
    assert_eq!(desc.name(), "price_-1_title_1");
}

#[test]
fn index_on_mixed_types_agrees_with_collscan() {
    let db = Database::new();
    db.create_collection("mixed");
    let rows = vec![
        doc! {"k": {"nested": 1}},
        doc! {"k": 5},
        doc! {"k": [1, 2]},
        doc! {"k": "text"},
        doc! {"k": true},
        doc! {"k": bson::DateTime::from_millis(0)},
        doc! {"k": -0.0},
        doc! {"k": bson::Bson::Null},
        doc! {"other": 1},
    ];
    db.insert_many("mixed", rows.into_iter().map(Document::new).collect()).unwrap();
    let filters = [
        Filter::gt("k", 1),
        Filter::lt("k", 1),
        Filter::gte("k", 0),
        Filter::eq("k", 0),
        Filter::gte("k", "a"),
        Filter::lte("k", true),
        Filter::eq("k", doc! {"nested": 1}),
    ];
    let ids = |f: &Filter| -> Vec<String> {
        db.find("mixed", f, &FindOptions::default())
            .unwrap()
            .map(|d| d.id.to_string())
            .collect()
    };
    let before: Vec<Vec<String>> = filters.iter().map(&ids).collect();
    db.create_index("mixed", IndexSpec::single("k")).unwrap();
    for (f, expected) in filters.iter().zip(&before) {
        let report = db.explain("mixed", f, &FindOptions::default()).unwrap();
        assert_eq!(report.plan, PlanKind::Ixscan, "{f:?}");
        assert_eq!(&ids(f), expected, "{f:?}");
    }
    assert_eq!(before[0].len(), 6, "number above 1 and every higher-ranked type");
    assert_eq!(before[3].len(), 1, "-0.0 equals 0");
}
