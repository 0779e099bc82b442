/// Named catalog reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Report {
    AvgPrice,
    TopAuthor,
    Decades,
}

/// One CLI action against a seeded catalog. JSON-valued arguments use Mongo shell shapes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Report how many books were loaded.
    Seed,
    Find {
        filter_json: String,
        /// JSON projection or comma-separated list of fields to include.
        project: Option<String>,
        /// JSON sort spec or `field,-field` shorthand.
        sort: Option<String>,
        skip: Option<usize>,
        limit: Option<usize>,
        hint: Option<String>,
    },
    Count {
        filter_json: String,
    },
    UpdateOne {
        filter_json: String,
        update_json: String,
    },
    DeleteOne {
        filter_json: String,
    },
    Aggregate {
        pipeline_json: String,
    },
    Report(Report),
    /// Page `n` (0-indexed) sorted by title.
    Page {
        n: usize,
    },
    CreateIndex {
        keys_json: String,
    },
    ListIndexes,
    Explain {
        filter_json: String,
        hint: Option<String>,
    },
    /// Runs the whole catalog query script in order.
    Demo,
}
