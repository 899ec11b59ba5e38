//! Record command implementations: upload, edit, show, files, refresh

use std::fs;
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine};
use filer_core::{
    naming, CellRange, Config, EditEvent, FileCategory, Selection, UploadRequest,
};

use super::open_filer;

/// MIME type for a filename, from its extension
pub fn guess_mime(filename: &str) -> &'static str {
    match naming::file_extension(filename).as_str() {
        "pdf" => "application/pdf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "heic" => "image/heic",
        "webp" => "image/webp",
        "tif" | "tiff" => "image/tiff",
        _ => "application/octet-stream",
    }
}

pub fn cmd_upload(
    config: &Config,
    sheet: &str,
    row: usize,
    file: &Path,
    category: FileCategory,
    mime: Option<&str>,
) -> Result<()> {
    let filer = open_filer(config, None)?;

    let record = filer
        .record_context(sheet, row)?
        .record
        .ok_or_else(|| anyhow!("Row {} of sheet {} is blank", row, sheet))?;

    let bytes = fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;
    let filename = file
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_string();
    let mime_type = mime.unwrap_or_else(|| guess_mime(&filename)).to_string();

    println!("📤 Uploading {} ({} bytes)...", file.display(), bytes.len());

    let response = filer.handle_upload(&UploadRequest {
        sheet: sheet.to_string(),
        filename,
        content: STANDARD.encode(&bytes),
        mime_type,
        record,
        category,
    });

    if !response.success {
        bail!("{}", response.message);
    }

    println!("✅ {}", response.message);
    println!("   File id: {}", response.file_id);
    Ok(())
}

pub fn cmd_edit(
    config: &Config,
    sheet: &str,
    row: usize,
    column: usize,
    rows: usize,
    columns: usize,
) -> Result<()> {
    if row == 0 || column == 0 {
        bail!("Rows and columns are numbered from 1");
    }

    let filer = open_filer(config, None)?;
    let event = EditEvent {
        sheet: sheet.to_string(),
        range: CellRange {
            row,
            column,
            num_rows: rows.max(1),
            num_columns: columns.max(1),
        },
    };

    filer.handle_edit(&event);

    let last = row.saturating_add(rows.max(1) - 1);
    if last == row {
        println!("✅ Processed edit to {} row {}", sheet, row);
    } else {
        println!("✅ Processed edit to {} rows {}-{}", sheet, row, last);
    }
    Ok(())
}

pub fn cmd_show(config: &Config, sheet: &str, row: usize, json: bool) -> Result<()> {
    let filer = open_filer(
        config,
        Some(Selection {
            sheet: sheet.to_string(),
            row,
        }),
    )?;

    let Some(context) = filer.active_context() else {
        println!("ℹ️  {} row {} holds no record (header row or excluded sheet)", sheet, row);
        return Ok(());
    };
    let plan = filer.filing_plan(&context);

    if json {
        let output = serde_json::json!({ "context": context, "plan": plan });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    let Some(record) = &context.record else {
        println!("ℹ️  {} row {} is blank", sheet, row);
        return Ok(());
    };

    println!("📄 {} row {}", context.sheet, context.row_index);
    println!("   ─────────────────────────────");
    println!("   Payment date: {}", record.payment_date);
    println!("   Patient:      {}", record.patient);
    println!("   Service:      {}", record.service);
    println!("   Company:      {}", record.company);
    println!("   Cost:         ${:.2}", record.cost);
    println!("   HSA approved: {}", yes_no(record.hsa_approved));
    println!("   Uploaded:     {}", yes_no(record.receipt_uploaded));
    println!("   Paid out:     {}", yes_no(record.paid_out));
    println!();
    for entry in &plan {
        println!("   {} → {}/{}", entry.category, entry.folder, entry.filename);
    }

    Ok(())
}

pub fn cmd_files(config: &Config, sheet: &str, row: usize) -> Result<()> {
    let filer = open_filer(config, None)?;
    let files = filer.files_for_row(sheet, row)?;

    if files.is_empty() {
        println!("No files found for {} row {}.", sheet, row);
        return Ok(());
    }

    println!("📁 {} file(s) for {} row {}:", files.len(), sheet, row);
    for file in &files {
        println!("   {}", file.id);
    }
    Ok(())
}

pub fn cmd_refresh(config: &Config, sheet: &str) -> Result<()> {
    println!("🔄 Refreshing file organization for {}...", sheet);

    let filer = open_filer(config, None)?;
    let summary = filer.refresh_sheet(sheet)?;

    println!();
    println!("📊 Refresh Results");
    println!("   ─────────────────────────────");
    println!("   Rows scanned:  {}", summary.rows_scanned);
    println!("   Files checked: {}", summary.files_checked);
    println!("   Files updated: {}", summary.files_updated);

    if summary.failures > 0 {
        println!();
        println!(
            "⚠️  {} failure(s). Run with --verbose for details.",
            summary.failures
        );
    } else {
        println!();
        println!("✅ All files are in place.");
    }

    Ok(())
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "Yes"
    } else {
        "No"
    }
}
