// Telemetry is a submodule of query
pub mod telemetry;

// Submodules for separation of concerns
mod cursor;
mod eval;
mod exec;
mod parse;
mod types;

pub use cursor::Cursor;
pub use eval::{apply_projection, compare_bson, compare_docs, eval_filter, get_path, values_equal};
pub(crate) use eval::{as_f64, remove_path, set_path, type_rank};
pub use exec::{
    apply_update, count_docs, delete_many, delete_one, explain, find_docs, update_many, update_one,
};
pub use parse::{
    json_to_document, parse_filter, parse_filter_json, parse_index_keys, parse_index_keys_json,
    parse_projection, parse_projection_json, parse_sort, parse_sort_json, parse_update,
    parse_update_json, validate_update,
};
pub(crate) use exec::scan_matching;
pub(crate) use types::MAX_SORT_FIELDS;
pub use types::{
    CmpOp, DeleteReport, ExplainReport, Filter, FindOptions, Order, PlanKind, Projection,
    SortSpec, UpdateDoc, UpdateReport,
};
