//! Aggregation pipelines: `$match`, `$group`, `$sort`, `$skip`, `$limit`, `$project`, `$count`.

mod expr;
mod parse;
mod stage;

pub use expr::Expr;
pub use parse::{parse_expr, parse_pipeline, parse_pipeline_json};
pub use stage::{Accumulator, Pipeline, ProjectField, Stage};

use crate::collection::Collection;
use crate::errors::DbError;
use crate::query::{scan_matching, telemetry};
use bson::Document as BsonDocument;
use std::sync::Arc;
use std::time::Instant;

/// Runs `pipeline` over the collection. A leading `$match` is executed through the query
/// planner so it can use an index, without the find result cap; later stages run in
/// memory.
///
/// # Errors
/// Returns an error if any stage fails.
pub fn aggregate(col: &Arc<Collection>, pipeline: &Pipeline) -> Result<Vec<BsonDocument>, DbError> {
    let start = Instant::now();
    let (input, rest, index_name): (Vec<BsonDocument>, &[Stage], Option<String>) = match pipeline.stages.split_first() {
        Some((Stage::Match(filter), rest)) => {
            let (docs, index_name) = scan_matching(col, filter);
            (docs.into_iter().map(|d| d.data).collect(), rest, index_name)
        }
        _ => (
            col.get_all_documents().into_iter().map(|d| d.data).collect(),
            pipeline.stages.as_slice(),
            None,
        ),
    };
    let skipped = pipeline.stages.len() - rest.len();
    let out = stage::run_stages(rest, skipped, input)?;
    let duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
    telemetry::log_query(
        &col.name_str(),
        "aggregate",
        &format!("{} stages", pipeline.stages.len()),
        duration_ms,
        out.len(),
        index_name.as_deref(),
    );
    Ok(out)
}
