use bson::{Bson, doc};
use plp_bookstore::Database;
use plp_bookstore::document::Document;
use plp_bookstore::query::{Filter, FindOptions, SortSpec};
use proptest::prelude::*;

fn load(rows: &[(i32, i32)]) -> Database {
    let db = Database::new();
    db.create_collection("srt");
    let docs = rows.iter().map(|(a, b)| Document::new(doc! {"a": *a, "b": *b})).collect();
    db.insert_many("srt", docs).unwrap();
    db
}

fn pairs(db: &Database, opts: &FindOptions) -> Vec<(i32, i32)> {
    db.find("srt", &Filter::True, opts)
        .unwrap()
        .map(|d| (d.data.get_i32("a").unwrap(), d.data.get_i32("b").unwrap()))
        .collect()
}

proptest! {
    #[test]
    fn prop_multi_key_sort_non_decreasing(v in proptest::collection::vec((any::<i32>(), any::<i32>()), 0..50)) {
        let db = load(&v);
        let sorted = pairs(&db, &FindOptions::sorted(vec![SortSpec::asc("a"), SortSpec::desc("b")]));
        prop_assert_eq!(sorted.len(), v.len());
        for w in sorted.windows(2) {
            prop_assert!(w[0].0 < w[1].0 || (w[0].0 == w[1].0 && w[0].1 >= w[1].1));
        }
    }

    #[test]
    fn prop_pages_concatenate_to_full_sort(
        v in proptest::collection::vec((0..20i32, any::<i32>()), 0..40),
        size in 1usize..7,
    ) {
        let db = load(&v);
        let sort = vec![SortSpec::asc("a")];
        let full = pairs(&db, &FindOptions::sorted(sort.clone()));
        let mut paged = Vec::new();
        for n in 0..=(v.len() / size) {
            paged.extend(pairs(&db, &FindOptions::sorted(sort.clone()).page(n * size, size)));
        }
        prop_assert_eq!(paged, full);
    }

    #[test]
    fn prop_index_and_collscan_agree(
        v in proptest::collection::vec((0..30i32, any::<i32>()), 0..40),
        lo in 0..30i32,
        span in 0..10i32,
    ) {
        let db = load(&v);
        let f = Filter::And(vec![Filter::gte("a", lo), Filter::lt("a", lo + span)]);
        let scanned = pairs_where(&db, &f);
        db.create_index("srt", plp_bookstore::index::IndexSpec::single("a")).unwrap();
        prop_assert_eq!(pairs_where(&db, &f), scanned);
    }

    #[test]
    fn prop_index_and_collscan_agree_across_types(
        v in proptest::collection::vec(mixed_value(), 0..30),
        bound in mixed_value(),
        op in 0..5usize,
    ) {
        let db = Database::new();
        db.create_collection("mix");
        let docs = v.iter().map(|k| Document::new(doc! {"k": k.clone()})).collect();
        db.insert_many("mix", docs).unwrap();
        let f = match op {
            0 => Filter::eq("k", bound),
            1 => Filter::gt("k", bound),
            2 => Filter::gte("k", bound),
            3 => Filter::lt("k", bound),
            _ => Filter::lte("k", bound),
        };
        let scanned = ids_where(&db, &f);
        db.create_index("mix", plp_bookstore::index::IndexSpec::single("k")).unwrap();
        prop_assert_eq!(ids_where(&db, &f), scanned);
    }
}

fn mixed_value() -> impl Strategy<Value = Bson> {
    prop_oneof![
        Just(Bson::Null),
        (-3..3i32).prop_map(Bson::Int32),
        (-3..3i64).prop_map(Bson::Int64),
        prop_oneof![Just(-0.0), Just(0.0), Just(1.5), Just(f64::NAN)].prop_map(Bson::Double),
        "[a-c]{0,2}".prop_map(Bson::String),
        any::<bool>().prop_map(Bson::Boolean),
        (0..3i32).prop_map(|n| Bson::Document(doc! {"n": n})),
        (0..3i32).prop_map(|n| Bson::Array(vec![Bson::Int32(n)])),
    ]
}

fn ids_where(db: &Database, f: &Filter) -> Vec<String> {
    db.find("mix", f, &FindOptions::default())
        .unwrap()
        .map(|d| d.id.to_string())
        .collect()
}

fn pairs_where(db: &Database, f: &Filter) -> Vec<(i32, i32)> {
    db.find("srt", f, &FindOptions::default())
        .unwrap()
        .map(|d| (d.data.get_i32("a").unwrap(), d.data.get_i32("b").unwrap()))
        .collect()
}
