//! Report assembly via external converters
//!
//! Figures are converted to PDF with `rsvg-convert` and stitched into one
//! document with `pdfunite`. Both tools are resolved from PATH; a missing
//! tool surfaces as a launch error naming it, a nonzero exit carries the
//! tool's stderr.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tracing::{debug, info};

use crate::error::{EvalError, EvalResult};

pub const SVG_CONVERTER: &str = "rsvg-convert";
pub const PDF_MERGER: &str = "pdfunite";

/// Convert one SVG file to a PDF page.
pub fn rasterize_svg(input: &Path, output: &Path) -> EvalResult<()> {
    let result = Command::new(SVG_CONVERTER)
        .arg("--format=pdf")
        .arg("--output")
        .arg(output)
        .arg(input)
        .output()
        .map_err(|e| EvalError::ToolLaunch {
            tool: SVG_CONVERTER.to_string(),
            source: e,
        })?;
    check_status(SVG_CONVERTER, &result)?;
    debug!(input = %input.display(), output = %output.display(), "converted figure");
    Ok(())
}

/// Merge PDF pages, in order, into one document.
///
/// A single page is copied through without invoking the merger.
pub fn merge_pdfs(inputs: &[PathBuf], output: &Path) -> EvalResult<()> {
    match inputs {
        [] => Err(EvalError::Report("no pages to merge".to_string())),
        [single] => {
            fs::copy(single, output).map_err(|e| EvalError::io(output, e))?;
            Ok(())
        }
        many => {
            let result = Command::new(PDF_MERGER)
                .args(many)
                .arg(output)
                .output()
                .map_err(|e| EvalError::ToolLaunch {
                    tool: PDF_MERGER.to_string(),
                    source: e,
                })?;
            check_status(PDF_MERGER, &result)
        }
    }
}

/// Convert every SVG figure to PDF and merge them into `output`,
/// removing the intermediate pages afterwards.
pub fn assemble_report(figures: &[PathBuf], output: &Path) -> EvalResult<()> {
    if figures.is_empty() {
        return Err(EvalError::Report("no figures to assemble".to_string()));
    }
    let mut pages = Vec::with_capacity(figures.len());
    for figure in figures {
        let page = figure.with_extension("pdf");
        rasterize_svg(figure, &page)?;
        pages.push(page);
    }
    merge_pdfs(&pages, output)?;
    for page in &pages {
        if page.as_path() != output {
            let _ = fs::remove_file(page);
        }
    }
    info!(pages = pages.len(), output = %output.display(), "report assembled");
    Ok(())
}

fn check_status(tool: &str, result: &Output) -> EvalResult<()> {
    if result.status.success() {
        return Ok(());
    }
    Err(EvalError::ToolFailed {
        tool: tool.to_string(),
        status: result.status.to_string(),
        stderr: String::from_utf8_lossy(&result.stderr).trim().to_string(),
    })
}

// ============================================================================
// Tests
// ============================================================================
