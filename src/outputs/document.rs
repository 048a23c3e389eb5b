//! DOCX rendering of unmatched articles.
//!
//! Each article becomes one section:
//!
//! ```text
//! **Title:** <hyperlinked title → Article URL>
//! <summary>
//! <date>
//! <blank separator>
//! ```
//!
//! Values are stringified and trimmed. A missing value renders as `None`
//! rather than being left out.

use std::path::Path;

use docx_rs::{Docx, Hyperlink, HyperlinkType, Paragraph, Run};
use tracing::{info, instrument};

use crate::error::{Error, Result};
use crate::models::{ARTICLE_URL_COLUMN, NULL_DISPLAY, Table};
use crate::tables::sheet::{NullConvention, read_sheet};

const TITLE_LABEL: &str = "Title: ";
const LINK_COLOR: &str = "0563C1";

/// One rendered article.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleSection {
    pub title: String,
    pub url: String,
    pub summary: String,
    pub date: String,
}

/// Build sections from the unmatched table, in row order.
pub fn sections_from_table(table: &Table, url_column: &str) -> Vec<ArticleSection> {
    let text = |row: usize, column: &str| -> String {
        table
            .get(row, column)
            .map(|v| v.to_string().trim().to_string())
            .unwrap_or_else(|| NULL_DISPLAY.to_string())
    };
    (0..table.len())
        .map(|row| ArticleSection {
            title: text(row, "Title"),
            url: text(row, url_column),
            summary: text(row, "Summary"),
            date: text(row, "Date"),
        })
        .collect()
}

/// Assemble the document for `sections`.
pub fn build_document(sections: &[ArticleSection]) -> Docx {
    sections.iter().fold(Docx::new(), |docx, section| {
        let link = Hyperlink::new(&section.url, HyperlinkType::External).add_run(
            Run::new()
                .add_text(&section.title)
                .color(LINK_COLOR)
                .underline("single"),
        );
        docx.add_paragraph(
            Paragraph::new()
                .add_run(Run::new().add_text(TITLE_LABEL).bold())
                .add_hyperlink(link),
        )
        .add_paragraph(Paragraph::new().add_run(Run::new().add_text(&section.summary)))
        .add_paragraph(Paragraph::new().add_run(Run::new().add_text(&section.date)))
        .add_paragraph(Paragraph::new())
    })
}

/// Render the unmatched spreadsheet at `sheet` to `output`.
///
/// # Arguments
///
/// * `sheet` - Unmatched spreadsheet written by the diff stage
/// * `output` - Document path to write
/// * `null_marker` - Cell text read back as null
///
/// # Returns
///
/// `Ok(true)` after writing the document. `Ok(false)` when there is nothing
/// to render because the spreadsheet is absent or has no rows; that is the
/// normal "no new articles" outcome.
#[instrument(level = "info", skip(null_marker), fields(sheet = %sheet.display(), output = %output.display()))]
pub fn export_unmatched(sheet: &Path, output: &Path, null_marker: &str) -> Result<bool> {
    if !sheet.exists() {
        info!("No unmatched spreadsheet; nothing to export");
        return Ok(false);
    }
    let table = read_sheet(sheet, &NullConvention::Marker(null_marker.to_string()))?;
    if table.is_empty() {
        info!("Unmatched spreadsheet has no rows; nothing to export");
        return Ok(false);
    }

    let sections = sections_from_table(&table, ARTICLE_URL_COLUMN);
    write_document(output, &sections)?;
    info!(sections = sections.len(), "Wrote unmatched articles document");
    Ok(true)
}

/// Write `sections` as a DOCX file.
pub fn write_document(output: &Path, sections: &[ArticleSection]) -> Result<()> {
    let file = std::fs::File::create(output)?;
    build_document(sections)
        .build()
        .pack(file)
        .map_err(|e| Error::Document(e.to_string()))?;
    Ok(())
}

/// Read one XML part out of a written DOCX archive.
#[cfg(test)]
pub(crate) fn read_docx_part(path: &Path, part: &str) -> String {
    use std::io::Read;
    let mut archive = zip::ZipArchive::new(std::fs::File::open(path).unwrap()).unwrap();
    let mut xml = String::new();
    archive.by_name(part).unwrap().read_to_string(&mut xml).unwrap();
    xml
}
