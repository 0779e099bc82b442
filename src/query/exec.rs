use crate::collection::Collection;
use crate::document::Document;
use crate::errors::DbError;
use bson::{Bson, Document as BsonDocument};
use std::sync::Arc;
use std::time::Instant;

use super::cursor::Cursor;
use super::eval::{apply_projection, compare_docs, eval_filter};
use super::parse::validate_update;
use super::telemetry;
use super::types::{
    DeleteReport, ExplainReport, Filter, FindOptions, MAX_LIMIT, MAX_SORT_FIELDS, PlanKind,
    UpdateDoc, UpdateReport,
};

/// Candidate documents chosen by the planner, in natural order.
struct Plan {
    kind: PlanKind,
    index_name: Option<String>,
    keys_examined: usize,
    candidates: Vec<Document>,
}

struct Execution {
    docs: Vec<Document>,
    kind: PlanKind,
    index_name: Option<String>,
    keys_examined: usize,
    docs_examined: usize,
    duration_ms: u64,
}

fn plan(col: &Collection, filter: &Filter, hint: Option<&str>) -> Result<Plan, DbError> {
    let chosen = {
        let mut mgr = col.indexes.write();
        let target = match hint {
            Some(name) => Some((name.to_string(), mgr.range_for_hint(name, filter)?)),
            None => mgr.choose(filter),
        };
        target.and_then(|(name, range)| {
            mgr.indexes.get_mut(&name).map(|idx| {
                let (ids, examined) = idx.scan(&range);
                (name, ids, examined)
            })
        })
    };
    Ok(match chosen {
        Some((name, ids, keys_examined)) => Plan {
            kind: PlanKind::Ixscan,
            index_name: Some(name),
            keys_examined,
            candidates: col.documents_by_ids(&ids),
        },
        None => Plan {
            kind: PlanKind::Collscan,
            index_name: None,
            keys_examined: 0,
            candidates: col.get_all_documents(),
        },
    })
}

fn execute(col: &Collection, filter: &Filter, opts: &FindOptions) -> Result<Execution, DbError> {
    if let Some(sort) = &opts.sort
        && sort.len() > MAX_SORT_FIELDS
    {
        return Err(DbError::QueryError(format!(
            "sort has {} keys; at most {MAX_SORT_FIELDS} allowed",
            sort.len()
        )));
    }
    let start = Instant::now();
    let plan = plan(col, filter, opts.hint.as_deref())?;
    let docs_examined = plan.candidates.len();
    let mut docs: Vec<Document> =
        plan.candidates.into_iter().filter(|d| eval_filter(&d.data, filter)).collect();

    if let Some(sort) = &opts.sort {
        // stable: ties keep natural order
        docs.sort_by(|a, b| compare_docs(&a.data, &b.data, sort));
    }

    let skip = opts.skip.unwrap_or(0);
    let limit = opts.limit.unwrap_or(usize::MAX).min(MAX_LIMIT);
    let mut docs: Vec<Document> = docs.into_iter().skip(skip).take(limit).collect();

    if let Some(projection) = &opts.projection {
        for d in &mut docs {
            d.data = apply_projection(&d.data, projection);
        }
    }

    let duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
    telemetry::log_query(
        &col.name_str(),
        "find",
        &format!("{filter:?}"),
        duration_ms,
        docs.len(),
        plan.index_name.as_deref(),
    );
    Ok(Execution {
        docs,
        kind: plan.kind,
        index_name: plan.index_name,
        keys_examined: plan.keys_examined,
        docs_examined,
        duration_ms,
    })
}

/// Runs a find and returns a cursor over the shaped results.
///
/// # Errors
/// Returns an error if `opts.hint` names an index that does not exist.
pub fn find_docs(col: &Arc<Collection>, filter: &Filter, opts: &FindOptions) -> Result<Cursor, DbError> {
    Ok(Cursor::new(execute(col, filter, opts)?.docs))
}

/// Runs the query and reports how it was executed.
///
/// # Errors
/// Returns an error if `opts.hint` names an index that does not exist.
pub fn explain(col: &Arc<Collection>, filter: &Filter, opts: &FindOptions) -> Result<ExplainReport, DbError> {
    let run = execute(col, filter, opts)?;
    Ok(ExplainReport {
        collection: col.name_str(),
        plan: run.kind,
        index_name: run.index_name,
        keys_examined: run.keys_examined as u64,
        docs_examined: run.docs_examined as u64,
        n_returned: run.docs.len() as u64,
        execution_time_ms: run.duration_ms,
    })
}

#[must_use]
pub fn count_docs(col: &Arc<Collection>, filter: &Filter) -> usize {
    let start = Instant::now();
    let n = match plan(col, filter, None) {
        Ok(p) => p.candidates.iter().filter(|d| eval_filter(&d.data, filter)).count(),
        Err(e) => {
            log::error!("count planning failed: {e}");
            0
        }
    };
    telemetry::log_query(
        &col.name_str(),
        "count",
        &format!("{filter:?}"),
        u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
        n,
        None,
    );
    n
}

/// Every match in natural order with the index used, without the find result cap.
pub(crate) fn scan_matching(col: &Collection, filter: &Filter) -> (Vec<Document>, Option<String>) {
    match plan(col, filter, None) {
        Ok(p) => {
            let docs = p.candidates.into_iter().filter(|d| eval_filter(&d.data, filter)).collect();
            (docs, p.index_name)
        }
        Err(e) => {
            log::error!("planning failed: {e}");
            (Vec::new(), None)
        }
    }
}

fn matching(col: &Collection, filter: &Filter, op: &str) -> Vec<Document> {
    let start = Instant::now();
    let (docs, index_name) = scan_matching(col, filter);
    telemetry::log_query(
        &col.name_str(),
        op,
        &format!("{filter:?}"),
        u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
        docs.len(),
        index_name.as_deref(),
    );
    docs
}

/// Updates the first matching document in natural order.
///
/// # Errors
/// Returns an error for an invalid update or if the updated document fails validation;
/// the stored document is then left unchanged.
pub fn update_one(col: &Arc<Collection>, filter: &Filter, update: &UpdateDoc) -> Result<UpdateReport, DbError> {
    validate_update(update)?;
    let Some(mut doc) = matching(col, filter, "update").into_iter().next() else {
        return Ok(UpdateReport::default());
    };
    let changed = apply_update(&mut doc, update);
    if changed {
        col.update_document(&doc.id.clone(), doc)?;
    }
    Ok(UpdateReport { matched: 1, modified: u64::from(changed) })
}

/// # Errors
/// Stops at the first document that fails validation; earlier documents stay updated.
pub fn update_many(col: &Arc<Collection>, filter: &Filter, update: &UpdateDoc) -> Result<UpdateReport, DbError> {
    validate_update(update)?;
    let mut report = UpdateReport::default();
    for mut doc in matching(col, filter, "update") {
        report.matched += 1;
        if apply_update(&mut doc, update) {
            col.update_document(&doc.id.clone(), doc)?;
            report.modified += 1;
        }
    }
    Ok(report)
}

pub fn delete_one(col: &Arc<Collection>, filter: &Filter) -> DeleteReport {
    let deleted = matching(col, filter, "delete")
        .first()
        .map_or(0, |d| u64::from(col.delete_document(&d.id)));
    DeleteReport { deleted }
}

pub fn delete_many(col: &Arc<Collection>, filter: &Filter) -> DeleteReport {
    let deleted = matching(col, filter, "delete")
        .iter()
        .filter(|d| col.delete_document(&d.id))
        .count() as u64;
    DeleteReport { deleted }
}

/// Applies `$set`, `$inc` and `$unset` in that order. Returns whether anything changed.
pub fn apply_update(doc: &mut Document, upd: &UpdateDoc) -> bool {
    fn set_path(root: &mut BsonDocument, path: &str, value: Bson) -> bool {
        match path.split_once('.') {
            None => {
                let old = root.insert(path, value.clone());
                old.as_ref() != Some(&value)
            }
            Some((head, rest)) => {
                if !matches!(root.get(head), Some(Bson::Document(_))) {
                    root.insert(head, BsonDocument::new());
                }
                match root.get_mut(head) {
                    Some(Bson::Document(d)) => set_path(d, rest, value),
                    _ => false,
                }
            }
        }
    }
    fn unset_path(root: &mut BsonDocument, path: &str) -> bool {
        match path.split_once('.') {
            None => root.remove(path).is_some(),
            Some((head, rest)) => match root.get_mut(head) {
                Some(Bson::Document(d)) => unset_path(d, rest),
                _ => false,
            },
        }
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    fn incremented(cur: Option<&Bson>, by: f64) -> Bson {
        let integral = by.fract() == 0.0 && by.abs() < 9.0e15;
        match cur {
            Some(Bson::Int32(i)) if integral => {
                let sum = i64::from(*i) + by as i64;
                i32::try_from(sum).map_or(Bson::Int64(sum), Bson::Int32)
            }
            Some(Bson::Int64(i)) if integral => Bson::Int64(i.saturating_add(by as i64)),
            Some(Bson::Int32(i)) => Bson::Double(f64::from(*i) + by),
            Some(Bson::Int64(i)) => Bson::Double(*i as f64 + by),
            Some(Bson::Double(f)) => Bson::Double(f + by),
            _ => Bson::Double(by),
        }
    }

    let mut changed = false;
    for (k, v) in &upd.set {
        changed |= set_path(&mut doc.data, k, v.clone());
    }
    for (k, by) in &upd.inc {
        let next = incremented(super::eval::get_path(&doc.data, k), *by);
        changed |= set_path(&mut doc.data, k, next);
    }
    for k in &upd.unset {
        changed |= unset_path(&mut doc.data, k);
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::IndexSpec;
    use crate::query::{Order, Projection, SortSpec};
    use bson::doc;

    fn col_with(rows: &[(i32, i32)]) -> Arc<Collection> {
        let col = Arc::new(Collection::new("u_find".to_string()));
        for (k, v) in rows {
            col.insert_document(Document::new(doc! {"k": *k, "v": *v, "x": 0})).unwrap();
        }
        col
    }

    #[test]
    fn update_doc_set_inc_unset() {
        let mut d = Document::new(doc! {"x": 1, "y": 2, "z": true});
        let ud = UpdateDoc {
            set: vec![("y".into(), Bson::Int32(5)), ("meta.tag".into(), Bson::from("a"))],
            inc: vec![("x".into(), 2.0)],
            unset: vec!["z".into()],
        };
        assert!(apply_update(&mut d, &ud));
        assert_eq!(d.data.get_i32("y").unwrap(), 5);
        assert_eq!(d.data.get_i32("x").unwrap(), 3);
        assert_eq!(d.data.get_document("meta").unwrap().get_str("tag").unwrap(), "a");
        assert!(d.data.get("z").is_none());
        // same values again: nothing to modify
        let again = UpdateDoc { set: vec![("y".into(), Bson::Int32(5))], ..UpdateDoc::default() };
        assert!(!apply_update(&mut d, &again));
    }

    #[test]
    fn find_docs_projection_sort_and_pagination() {
        let col = col_with(&[(1, 3), (2, 1), (3, 2)]);
        let opts = FindOptions {
            projection: Some(Projection::include(&["k"]).without_id()),
            sort: Some(vec![SortSpec { field: "v".into(), order: Order::Asc }]),
            limit: Some(2),
            ..FindOptions::default()
        };
        let docs = find_docs(&col, &Filter::eq("x", 0), &opts).unwrap().into_bson();
        assert_eq!(docs, vec![doc! {"k": 2}, doc! {"k": 3}]);
    }

    #[test]
    fn skip_past_end_is_empty() {
        let col = col_with(&[(1, 1), (2, 2)]);
        let opts = FindOptions::default().page(5, 5);
        assert!(find_docs(&col, &Filter::True, &opts).unwrap().to_vec().is_empty());
    }

    #[test]
    fn index_plan_matches_collscan_results() {
        let col = col_with(&[(1, 3), (2, 1), (3, 2), (4, 1)]);
        let f = Filter::eq("v", 1);
        let scan: Vec<_> = find_docs(&col, &f, &FindOptions::default()).unwrap().into_bson();
        col.create_index(IndexSpec::single("v")).unwrap();
        let ix: Vec<_> = find_docs(&col, &f, &FindOptions::default()).unwrap().into_bson();
        assert_eq!(scan, ix);
        let report = explain(&col, &f, &FindOptions::default()).unwrap();
        assert_eq!(report.plan, PlanKind::Ixscan);
        assert_eq!(report.docs_examined, 2);
    }

    #[test]
    fn unknown_hint_is_an_error() {
        let col = col_with(&[(1, 1)]);
        let opts = FindOptions::default().hint("nope_1");
        assert!(matches!(find_docs(&col, &Filter::True, &opts), Err(DbError::QueryError(_))));
    }

    #[test]
    fn update_one_touches_first_match_only() {
        let col = col_with(&[(1, 1), (2, 1)]);
        let r = update_one(&col, &Filter::eq("v", 1), &UpdateDoc::set("v", 9)).unwrap();
        assert_eq!(r, UpdateReport { matched: 1, modified: 1 });
        assert_eq!(count_docs(&col, &Filter::eq("v", 9)), 1);
        let first = col.get_all_documents().remove(0);
        assert_eq!(first.data.get_i32("v").unwrap(), 9);
        let r = update_one(&col, &Filter::eq("v", 42), &UpdateDoc::set("v", 0)).unwrap();
        assert_eq!(r, UpdateReport::default());
    }

    #[test]
    fn delete_one_and_many() {
        let col = col_with(&[(1, 1), (2, 1), (3, 2)]);
        assert_eq!(delete_one(&col, &Filter::eq("v", 1)).deleted, 1);
        assert_eq!(delete_many(&col, &Filter::True).deleted, 2);
        assert_eq!(delete_one(&col, &Filter::True).deleted, 0);
    }
}
