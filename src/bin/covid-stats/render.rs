//! Table rendering for the CLI
//!
//! Plain-text tables use the dashboard's Polish column headings; JSON output
//! is the serialized table.

use chrono::NaiveDate;
use covid_pl_stats::aggregation::{AggregateRow, CohortViews};
use covid_pl_stats::dashboard::{CohortSummary, LabeledCounty};
use covid_pl_stats::Result;
use serde::Serialize;
use std::io::Write;

const TOTAL_HEADING: &str = "Liczba wszystkich";
const SELECTED_HEADING: &str = "Liczba w wybranej grupie";

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Format {
    /// Aligned text table
    Text,
    /// Pretty-printed JSON
    Json,
}

fn write_json<W: Write, T: Serialize + ?Sized>(out: &mut W, value: &T) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}

fn write_header<W: Write>(out: &mut W, views: &CohortViews) -> Result<()> {
    writeln!(
        out,
        "# {} ({}), {} resolution, cohort {}",
        views.dataset.kind.label(),
        views.dataset,
        views.resolution,
        views.filter
    )?;
    Ok(())
}

/// Render the time table
pub fn timeline<W: Write>(out: &mut W, views: &CohortViews, format: Format) -> Result<()> {
    if format == Format::Json {
        return write_json(out, &views.timeline);
    }

    write_header(out, views)?;
    writeln!(
        out,
        "{:<10}  {:>17}  {:>24}  {:>7}",
        "Data", TOTAL_HEADING, SELECTED_HEADING, "%"
    )?;
    for row in &views.timeline {
        write_row(out, &row.bucket.to_string(), row)?;
    }
    write_footer(out, views)
}

/// Render the county table
pub fn counties<W: Write>(
    out: &mut W,
    views: &CohortViews,
    counties: &[LabeledCounty],
    format: Format,
) -> Result<()> {
    if format == Format::Json {
        return write_json(out, counties);
    }

    write_header(out, views)?;
    writeln!(
        out,
        "{:<32}  {:>17}  {:>24}  {:>7}",
        "Powiat", TOTAL_HEADING, SELECTED_HEADING, "%"
    )?;
    for county in counties {
        let label = match &county.name {
            Some(name) => format!("{} {}", county.county, name),
            None => county.county.to_string(),
        };
        writeln!(
            out,
            "{:<32}  {:>17}  {:>24}  {:>7.2}",
            label, county.total, county.selected, county.percent
        )?;
    }
    write_footer(out, views)
}

/// Render the cohort summary
pub fn summary<W: Write>(out: &mut W, summary: &CohortSummary, format: Format) -> Result<()> {
    if format == Format::Json {
        return write_json(out, summary);
    }

    writeln!(out, "Dataset: {} ({})", summary.dataset.kind.label(), summary.dataset)?;
    writeln!(out, "Cohort: {}", summary.filter)?;
    writeln!(out, "Rows: {}", summary.rows)?;
    if let Some((first, last)) = summary.date_range {
        writeln!(out, "Reports: {} .. {}", first, last)?;
    }
    writeln!(out, "{}: {}", TOTAL_HEADING, summary.population_total)?;
    writeln!(out, "{}: {}", SELECTED_HEADING, summary.cohort_total)?;
    writeln!(out, "%: {:.2}", summary.percent)?;
    Ok(())
}

fn write_row<W: Write, K>(out: &mut W, label: &str, row: &AggregateRow<K>) -> Result<()> {
    writeln!(
        out,
        "{:<10}  {:>17}  {:>24}  {:>7.2}",
        label, row.total, row.selected, row.percent
    )?;
    Ok(())
}

fn write_footer<W: Write>(out: &mut W, views: &CohortViews) -> Result<()> {
    if views.is_empty() {
        writeln!(out, "(no rows match the selected cohort)")?;
    } else {
        writeln!(
            out,
            "{} / {} ({:.2}%)",
            views.cohort_total,
            views.population_total,
            views.cohort_percent()
        )?;
    }
    Ok(())
}

/// First and last bucket of a timeline, for log lines
pub fn timeline_span(views: &CohortViews) -> Option<(NaiveDate, NaiveDate)> {
    Some((views.timeline.first()?.bucket, views.timeline.last()?.bucket))
}
