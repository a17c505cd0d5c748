//! Terminal rendering for summaries, overviews, and ad-hoc verdicts.
//!
//! Seed summaries print as vertical cards grouped by section; verdict rows
//! go through Arrow's pretty-printer using the result table schema.

use arrow::util::pretty::pretty_format_batches;
use slangmine_core::{BatchOverview, Bucket, ResultRow, SeedSummary, aggregate::Confusion};
use slangmine_store::results::rows_to_batch;

const MAX_LIST_ITEMS: usize = 25;

// ── Public API ──

/// Print one seed's summary as a card.
pub fn print_seed_card(summary: &SeedSummary) {
    println!("=== {} ===", summary.seed);
    println!("  {:<26} {}", "candidates", summary.total);
    println!("  {:<26} {}", "unique candidates", summary.unique);
    println!();

    println!("Buckets");
    println!("  {:<26} {:>8} {:>8}", "", "total", "unique");
    for bucket in Bucket::ALL {
        let count = summary.count(bucket);
        if count.total == 0 {
            continue;
        }
        println!(
            "  {:<26} {:>8} {:>8}",
            bucket.as_str(),
            count.total,
            count.unique
        );
    }
    println!();

    print_novel(summary);

    if let Some(confusion) = &summary.confusion {
        println!("Manual labels");
        print_confusion(confusion);
        println!();
    }
}

/// Print the batch overview across all requested seeds.
pub fn print_overview(overview: &BatchOverview) {
    println!("=== overview ===");
    println!("  {:<26} {}", "seeds analysed", overview.analysed);
    print_name_list("seeds with no rows", &overview.blank);
    print_name_list("seeds with search errors", &overview.with_errors);
    println!("  {:<26} {:.2}", "mean candidates", overview.mean_total);
    println!("  {:<26} {:.2}", "mean unique", overview.mean_unique);
    println!(
        "  {:<26} {:.2}",
        "mean novel validated", overview.mean_novel_validated
    );
    if let Some(confusion) = &overview.confusion {
        print_confusion(confusion);
    }
    println!();
}

/// Print verdict rows as a table.
pub fn print_rows(rows: &[ResultRow]) -> anyhow::Result<()> {
    let batch = rows_to_batch(rows)?;
    println!("{}", pretty_format_batches(&[batch])?);
    Ok(())
}

// ── Sections ──

fn print_novel(summary: &SeedSummary) {
    let novel = &summary.novel_validated;
    if novel.is_empty() {
        return;
    }

    // Most frequent first; ties stay alphabetical.
    let mut items: Vec<(&String, &usize)> = novel.iter().collect();
    items.sort_by(|a, b| b.1.cmp(a.1));

    println!("Novel validated ({}):", novel.len());
    for (candidate, count) in items.iter().take(MAX_LIST_ITEMS) {
        println!("  {:<26} x{}", candidate, count);
    }
    if novel.len() > MAX_LIST_ITEMS {
        println!("  ... and {} more", novel.len() - MAX_LIST_ITEMS);
    }
    println!();
}

fn print_confusion(c: &Confusion) {
    println!(
        "  {:<26} tp {} / fp {} / fn {} / tn {}",
        "confusion", c.true_positive, c.false_positive, c.false_negative, c.true_negative
    );
    if c.unlabelled > 0 {
        println!("  {:<26} {}", "unlabelled", c.unlabelled);
    }
    println!("  {:<26} {}", "precision", ratio(c.precision()));
    println!("  {:<26} {}", "recall", ratio(c.recall()));
}

fn print_name_list(label: &str, names: &[String]) {
    if names.is_empty() {
        println!("  {:<26} 0", label);
        return;
    }
    let shown: Vec<&str> = names
        .iter()
        .take(MAX_LIST_ITEMS)
        .map(String::as_str)
        .collect();
    let more = names.len().saturating_sub(MAX_LIST_ITEMS);
    if more > 0 {
        println!(
            "  {:<26} {} ({}, ... +{more})",
            label,
            names.len(),
            shown.join(", ")
        );
    } else {
        println!("  {:<26} {} ({})", label, names.len(), shown.join(", "));
    }
}

fn ratio(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{v:.3}"))
}
