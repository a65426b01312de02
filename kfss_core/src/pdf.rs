//! # PDF Generation Module
//!
//! Renders a [`Quotation`] to PDF using Typst.
//!
//! ## Architecture
//!
//! - The Typst template is embedded as a string constant
//! - Data is injected via `{{PLACEHOLDER}}` replacement before compilation
//! - Fonts come from `typst-assets`, so no system fonts are needed
//! - Output is raw PDF bytes (`Vec<u8>`)
//!
//! ## Example
//!
//! ```rust,no_run
//! use chrono::Utc;
//! use kfss_core::config::Settings;
//! use kfss_core::estimator::{Estimator, EstimatorInput, ProjectInfo};
//! use kfss_core::pdf::render_quotation_pdf;
//! use kfss_core::quotation::Quotation;
//!
//! let input = EstimatorInput::new(ProjectInfo::new("Main Kitchen", "Bistro Ltd"), 3.0, 1.2, 2, 1);
//! let result = Estimator::new().compute(&input).unwrap();
//! let quotation = Quotation::from_result(&result, &Settings::default(), Utc::now().date_naive());
//!
//! let pdf_bytes = render_quotation_pdf(&quotation).unwrap();
//! std::fs::write("quotation.pdf", pdf_bytes).unwrap();
//! ```

use chrono::{Datelike, Utc};
use typst::diag::{FileError, FileResult};
use typst::foundations::{Bytes, Datetime};
use typst::syntax::{FileId, Source};
use typst::text::{Font, FontBook};
use typst::utils::LazyHash;
use typst::{Library, LibraryExt, World};
use typst_pdf::PdfOptions;

use crate::errors::{CalcError, CalcResult};
use crate::quotation::{Quotation, QuotationLine};

// ============================================================================
// Typst World Implementation
// ============================================================================

/// A minimal Typst world for compiling documents without external files.
struct PdfWorld {
    main: Source,
    book: LazyHash<FontBook>,
    fonts: Vec<Font>,
    library: LazyHash<Library>,
}

impl PdfWorld {
    fn new(source: String) -> Self {
        let fonts = Self::load_fonts();
        let book = FontBook::from_fonts(&fonts);

        PdfWorld {
            main: Source::detached(source),
            book: LazyHash::new(book),
            fonts,
            library: LazyHash::new(Library::default()),
        }
    }

    fn load_fonts() -> Vec<Font> {
        typst_assets::fonts()
            .flat_map(|font_bytes| Font::iter(Bytes::new(font_bytes.to_vec())))
            .collect()
    }
}

impl World for PdfWorld {
    fn library(&self) -> &LazyHash<Library> {
        &self.library
    }

    fn book(&self) -> &LazyHash<FontBook> {
        &self.book
    }

    fn main(&self) -> FileId {
        self.main.id()
    }

    fn source(&self, id: FileId) -> FileResult<Source> {
        if id == self.main.id() {
            Ok(self.main.clone())
        } else {
            Err(FileError::NotFound(id.vpath().as_rootless_path().into()))
        }
    }

    fn file(&self, id: FileId) -> FileResult<Bytes> {
        Err(FileError::NotFound(id.vpath().as_rootless_path().into()))
    }

    fn font(&self, index: usize) -> Option<Font> {
        self.fonts.get(index).cloned()
    }

    fn today(&self, _offset: Option<i64>) -> Option<Datetime> {
        let now = Utc::now();
        Datetime::from_ymd(
            now.year(),
            u8::try_from(now.month()).ok()?,
            u8::try_from(now.day()).ok()?,
        )
    }
}

// ============================================================================
// PDF Template
// ============================================================================

const QUOTATION_TEMPLATE: &str = r##"
#set page(
  paper: "a4",
  margin: (top: 2cm, bottom: 2cm, left: 2cm, right: 2cm),
  footer: context [
    #line(length: 100%, stroke: 0.5pt + gray)
    #v(4pt)
    #grid(
      columns: (1fr, 1fr, 1fr),
      align(left)[#text(size: 8pt)[{{QUOTE_NUMBER}}]],
      align(center)[#text(size: 8pt)[Page #counter(page).display()]],
      align(right)[#text(size: 8pt)[{{COMPANY_NAME}}]],
    )
  ]
)

#set text(size: 10pt)

#grid(
  columns: (1fr, 1fr),
  [
    #text(size: 22pt, weight: "bold")[QUOTATION]
    #v(2pt)
    Quote No: *{{QUOTE_NUMBER}}*
  ],
  align(right)[
    #text(size: 13pt, weight: "bold")[{{COMPANY_NAME}}] \
{{COMPANY_LINES}}
  ],
)

#v(10pt)

#grid(
  columns: (1fr, 1fr),
  gutter: 20pt,
  block(width: 100%, fill: rgb("#f0f0f0"), inset: 10pt, radius: 4pt)[
    *Quotation For:* \
    *{{CLIENT}}* \
    {{ADDRESS}} \
    Project: {{PROJECT}}
  ],
  block(width: 100%, fill: rgb("#f0f0f0"), inset: 10pt, radius: 4pt)[
    *Quotation Details:* \
    Date: {{ISSUED}} \
    Valid Until: {{VALID_UNTIL}} \
    Currency: {{CURRENCY}} \
    Prepared By: {{PREPARED_BY}}
  ],
)

== Scope of Work

Supply, installation, and commissioning of a complete wet chemical kitchen fire suppression system including:

{{SCOPE}}

== Quotation Items

#table(
  columns: (1fr, auto, auto, auto),
  align: (left, right, right, right),
  stroke: 0.5pt + gray,
  table.header([*Item Description*], [*Qty*], [*Unit Price*], [*Total*]),
{{ITEM_ROWS}}
  table.cell(colspan: 3)[*SUBTOTAL*], [*{{SUBTOTAL}}*],
  table.cell(colspan: 3)[Safety Factor ({{SAFETY_PERCENT}}%)], [{{SAFETY_AMOUNT}}],
  table.cell(colspan: 3, fill: rgb("#f0f0f0"))[*TOTAL QUOTATION AMOUNT*], table.cell(fill: rgb("#f0f0f0"))[*{{GRAND_TOTAL}}*],
)

== Terms & Conditions

{{TERMS}}

#v(30pt)

#grid(
  columns: (1fr, 1fr),
  gutter: 40pt,
  [
    For {{COMPANY_NAME}}
    #v(30pt)
    #line(length: 80%)
    Authorized Signature
  ],
  [
    Accepted By:
    #v(30pt)
    #line(length: 80%)
    Client Signature
  ],
)
"##;

/// Typst source for a quotation
fn quotation_source(q: &Quotation) -> String {
    let mut company_lines: Vec<String> = q.company.address_lines.iter().map(|l| escape_typst(l)).collect();
    company_lines.push(format!("Phone: {}", escape_typst(&q.company.phone)));
    company_lines.push(format!("Email: {}", escape_typst(&q.company.email)));
    company_lines.push(format!("Website: {}", escape_typst(&q.company.website)));

    let scope = q
        .scope
        .iter()
        .map(|s| format!("- {}", escape_typst(s)))
        .collect::<Vec<_>>()
        .join("\n");
    let terms = q
        .terms
        .iter()
        .map(|t| format!("+ {}", escape_typst(t)))
        .collect::<Vec<_>>()
        .join("\n");

    QUOTATION_TEMPLATE
        .replace("{{QUOTE_NUMBER}}", &escape_typst(&q.quote_number))
        .replace("{{COMPANY_NAME}}", &escape_typst(&q.company.name))
        .replace("{{COMPANY_LINES}}", &company_lines.join(" \\\n"))
        .replace("{{CLIENT}}", &escape_typst(&q.client))
        .replace("{{ADDRESS}}", &escape_typst(&q.address))
        .replace("{{PROJECT}}", &escape_typst(&q.project_name))
        .replace("{{ISSUED}}", &q.issued.format("%Y-%m-%d").to_string())
        .replace("{{VALID_UNTIL}}", &q.valid_until.format("%Y-%m-%d").to_string())
        .replace("{{CURRENCY}}", q.currency.code())
        .replace("{{PREPARED_BY}}", &escape_typst(&q.prepared_by))
        .replace("{{SCOPE}}", &scope)
        .replace("{{ITEM_ROWS}}", &build_item_rows(q))
        .replace("{{SUBTOTAL}}", &escape_typst(&q.money(q.subtotal)))
        .replace("{{SAFETY_PERCENT}}", &q.safety_factor_percent.to_string())
        .replace("{{SAFETY_AMOUNT}}", &escape_typst(&q.money(q.safety_amount)))
        .replace("{{GRAND_TOTAL}}", &escape_typst(&q.money(q.grand_total)))
        .replace("{{TERMS}}", &terms)
}

/// Render a quotation to PDF.
///
/// # Returns
///
/// * `Ok(Vec<u8>)` - PDF file as bytes
/// * `Err(CalcError::Internal)` - If Typst compilation or PDF export fails
pub fn render_quotation_pdf(q: &Quotation) -> CalcResult<Vec<u8>> {
    let world = PdfWorld::new(quotation_source(q));

    let warned = typst::compile(&world);

    let document = warned.output.map_err(|errors| {
        let error_msgs: Vec<String> = errors.iter().map(|e| e.message.to_string()).collect();
        CalcError::Internal {
            message: format!("Typst compilation failed: {}", error_msgs.join("; ")),
        }
    })?;

    let pdf_bytes = typst_pdf::pdf(&document, &PdfOptions::default()).map_err(|errors| {
        let error_msgs: Vec<String> = errors.iter().map(|e| e.message.to_string()).collect();
        CalcError::Internal {
            message: format!("PDF rendering failed: {}", error_msgs.join("; ")),
        }
    })?;

    Ok(pdf_bytes)
}

/// Escape special Typst characters in user-provided text
fn escape_typst(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            '*' => "\\*".to_string(),
            '_' => "\\_".to_string(),
            '#' => "\\#".to_string(),
            '$' => "\\$".to_string(),
            '@' => "\\@".to_string(),
            '<' => "\\<".to_string(),
            '>' => "\\>".to_string(),
            '[' => "\\[".to_string(),
            ']' => "\\]".to_string(),
            '/' => "\\/".to_string(),
            '\\' => "\\\\".to_string(),
            '`' => "\\`".to_string(),
            _ => c.to_string(),
        })
        .collect()
}

fn item_row(q: &Quotation, line: &QuotationLine) -> String {
    let unit_price = match &line.unit {
        Some(unit) => format!("{}/{}", q.money(line.unit_price), unit),
        None => q.money(line.unit_price),
    };
    format!(
        "  [{}], [{}], [{}], [{}],",
        escape_typst(&line.description),
        escape_typst(&line.quantity_text()),
        escape_typst(&unit_price),
        escape_typst(&q.money(line.total))
    )
}

/// Table rows for the items table, with an appliance group header when needed
fn build_item_rows(q: &Quotation) -> String {
    let mut rows: Vec<String> = q.lines.iter().map(|line| item_row(q, line)).collect();
    if !q.appliance_lines.is_empty() {
        rows.push("  table.cell(colspan: 4)[_Appliance Protection_],".to_string());
        rows.extend(q.appliance_lines.iter().map(|line| item_row(q, line)));
    }
    rows.join("\n")
}
