//! HTML table sources (feature-gated behind `markup`).

use scraper::{ElementRef, Html, Selector};

use crate::error::{IngestionError, IngestionResult};
use crate::types::{RawCell, RawRecord};

use super::inference::normalize_name;

/// Rows of one `<table>`.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkupTable {
    pub records: Vec<RawRecord>,
    /// The first row consists only of `<th>` cells.
    pub header_present: bool,
}

fn selector(css: &str) -> IngestionResult<Selector> {
    Selector::parse(css).map_err(|e| IngestionError::SchemaMismatch {
        message: format!("invalid selector '{css}': {e:?}"),
    })
}

/// Extract the `table_index`-th table (0-based, document order) from `html`.
pub fn parse_html_table(html: &str, table_index: usize) -> IngestionResult<MarkupTable> {
    let doc = Html::parse_document(html);
    let table_sel = selector("table")?;
    let row_sel = selector("tr")?;
    let cell_sel = selector("th, td")?;

    let table = doc
        .select(&table_sel)
        .nth(table_index)
        .ok_or_else(|| IngestionError::SchemaMismatch {
            message: format!("document has no table at index {table_index}"),
        })?;

    let mut records = Vec::new();
    let mut header_present = false;
    for (idx0, row) in table.select(&row_sel).enumerate() {
        let cells: Vec<ElementRef<'_>> = row.select(&cell_sel).collect();
        if idx0 == 0 {
            header_present = !cells.is_empty() && cells.iter().all(|c| c.value().name() == "th");
        }
        let raw = cells
            .iter()
            .map(|c| {
                let text = normalize_name(&c.text().collect::<String>());
                RawCell::from(text.as_str())
            })
            .collect();
        records.push(RawRecord::new(idx0 + 1, raw));
    }

    Ok(MarkupTable {
        records,
        header_present,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html><body>
          <table id="nav"><tr><td>skip me</td></tr></table>
          <table>
            <tr><th>Name</th><th> Score
               (pts) </th></tr>
            <tr><td>Ada</td><td>98.5</td></tr>
            <tr><td><b>Bob</b></td><td></td></tr>
          </table>
        </body></html>"#;

    #[test]
    fn selects_table_by_index_and_detects_th_header() {
        let table = parse_html_table(PAGE, 1).unwrap();
        assert!(table.header_present);
        assert_eq!(table.records.len(), 3);
        assert_eq!(table.records[0].get(1), &RawCell::Text("Score (pts)".into()));
        assert_eq!(table.records[2].get(0), &RawCell::Text("Bob".into()));
        assert_eq!(table.records[2].get(1), &RawCell::Empty);
    }

    #[test]
    fn missing_table_is_a_schema_mismatch() {
        assert!(matches!(
            parse_html_table(PAGE, 5),
            Err(IngestionError::SchemaMismatch { .. })
        ));
        assert!(!parse_html_table(PAGE, 0).unwrap().header_present);
    }
}
