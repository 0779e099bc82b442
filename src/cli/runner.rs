use crate::aggregate::parse_pipeline_json;
use crate::catalog::Catalog;
use crate::errors::DbError;
use crate::query::{self, FindOptions, Order};
use std::io::Write;

use super::command::{Command, Report};
use super::util::{parse_projection_arg, parse_sort_arg, write_line, write_step};

/// Executes one command and writes its NDJSON output to `out`.
///
/// # Errors
/// Returns parse, query and I/O errors.
pub fn run(catalog: &Catalog<'_>, cmd: Command, out: &mut dyn Write) -> Result<(), DbError> {
    let db = catalog.db();
    let collection = catalog.collection();
    match cmd {
        Command::Seed => {
            let n = catalog.count_all()?;
            write_line(out, &serde_json::json!({ "collection": collection, "inserted": n }))
        }
        Command::Find { filter_json, project, sort, skip, limit, hint } => {
            let filter = query::parse_filter_json(&filter_json)?;
            let mut opts = FindOptions { skip, limit, hint, ..FindOptions::default() };
            if let Some(p) = project {
                opts.projection = Some(parse_projection_arg(&p)?);
            }
            if let Some(s) = sort {
                opts.sort = Some(parse_sort_arg(&s)?);
            }
            for doc in db.find(collection, &filter, &opts)?.into_bson() {
                write_line(out, &doc)?;
            }
            Ok(())
        }
        Command::Count { filter_json } => {
            let filter = query::parse_filter_json(&filter_json)?;
            let n = db.count(collection, &filter)?;
            write_line(out, &serde_json::json!({ "count": n }))
        }
        Command::UpdateOne { filter_json, update_json } => {
            let filter = query::parse_filter_json(&filter_json)?;
            let update = query::parse_update_json(&update_json)?;
            write_line(out, &db.update_one(collection, &filter, &update)?)
        }
        Command::DeleteOne { filter_json } => {
            let filter = query::parse_filter_json(&filter_json)?;
            write_line(out, &db.delete_one(collection, &filter)?)
        }
        Command::Aggregate { pipeline_json } => {
            let pipeline = parse_pipeline_json(&pipeline_json)?;
            for doc in db.aggregate(collection, &pipeline)? {
                write_line(out, &doc)?;
            }
            Ok(())
        }
        Command::Report(report) => run_report(catalog, report, out),
        Command::Page { n } => {
            for book in catalog.page(n)? {
                write_line(out, &book)?;
            }
            Ok(())
        }
        Command::CreateIndex { keys_json } => {
            let spec = query::parse_index_keys_json(&keys_json)?;
            let name = db.create_index(collection, spec)?;
            write_line(out, &serde_json::json!({ "index": name }))
        }
        Command::ListIndexes => {
            for d in db.list_indexes(collection)? {
                write_line(out, &d)?;
            }
            Ok(())
        }
        Command::Explain { filter_json, hint } => {
            let filter = query::parse_filter_json(&filter_json)?;
            let opts = FindOptions { hint, ..FindOptions::default() };
            write_line(out, &db.explain(collection, &filter, &opts)?)
        }
        Command::Demo => run_demo(catalog, out),
    }
}

fn run_report(catalog: &Catalog<'_>, report: Report, out: &mut dyn Write) -> Result<(), DbError> {
    match report {
        Report::AvgPrice => {
            for row in catalog.avg_price_by_genre()? {
                write_line(out, &row)?;
            }
        }
        Report::TopAuthor => {
            if let Some(row) = catalog.top_author()? {
                write_line(out, &row)?;
            }
        }
        Report::Decades => {
            for row in catalog.decade_histogram()? {
                write_line(out, &row)?;
            }
        }
    }
    Ok(())
}

/// The full query script, one labelled line per statement.
fn run_demo(catalog: &Catalog<'_>, out: &mut dyn Write) -> Result<(), DbError> {
    write_step(out, "count", &catalog.count_all()?)?;
    write_step(out, "genre_fantasy", &catalog.books_by_genre("Fantasy")?)?;
    write_step(out, "published_after_1930", &catalog.published_after(1930)?)?;
    write_step(out, "author_tolkien", &catalog.by_author("J.R.R. Tolkien")?)?;
    write_step(out, "update_price", &catalog.update_price("The Alchemist", 15.99)?)?;
    write_step(out, "delete_title", &catalog.delete_by_title("Pride and Prejudice")?)?;
    write_step(out, "in_stock_after_2010", &catalog.in_stock_published_after(2010)?)?;
    write_step(out, "title_author_price", &catalog.title_author_price()?)?;
    write_step(out, "price_ascending", &catalog.by_price(Order::Asc)?)?;
    write_step(out, "price_descending", &catalog.by_price(Order::Desc)?)?;
    write_step(out, "page_0", &catalog.page(0)?)?;
    write_step(out, "page_1", &catalog.page(1)?)?;
    write_step(out, "avg_price_by_genre", &catalog.avg_price_by_genre()?)?;
    write_step(out, "top_author", &catalog.top_author()?)?;
    write_step(out, "decades", &catalog.decade_histogram()?)?;
    write_step(out, "explain_before_index", &catalog.explain_title_lookup("Jane Austen", false)?)?;
    write_step(out, "create_title_index", &catalog.create_title_index()?)?;
    write_step(out, "create_author_year_index", &catalog.create_author_year_index()?)?;
    write_step(out, "explain_after_index", &catalog.explain_title_lookup("Jane Austen", true)?)?;
    Ok(())
}
