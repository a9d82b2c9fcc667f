use crate::domain::record::IndexRecord;
use crate::error::IngestError;
use chrono::NaiveDate;
use scraper::{ElementRef, Html, Selector};

/// How the first row of the source table is treated before it is skipped.
#[derive(Debug, Clone, Default)]
pub enum ColumnLayout {
    /// Columns are read by position; the header row is dropped unseen.
    #[default]
    Positional,
    /// The header row must name these three columns (code, name, price) in order.
    Validated { expected: [String; 3] },
}

impl ColumnLayout {
    /// Parses `"Código,Ação,Fechamento"` style lists.
    pub fn from_header_list(s: &str) -> anyhow::Result<Self> {
        let parts: Vec<String> = s
            .split(',')
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect();
        let expected: [String; 3] = parts.try_into().map_err(|parts: Vec<String>| {
            anyhow::anyhow!(
                "SOURCE_EXPECTED_HEADERS must list exactly 3 column names (got {})",
                parts.len()
            )
        })?;
        Ok(ColumnLayout::Validated { expected })
    }
}

/// Extracts one record per data row of the first `<table>` in `html`.
///
/// The first `<tr>` is always treated as the header. Cells are mapped by position:
/// 0 → code, 1 → name, 2 → closing price. Every record is stamped with `capture_date`.
pub fn extract_records(
    html: &str,
    capture_date: NaiveDate,
    layout: &ColumnLayout,
) -> Result<Vec<IndexRecord>, IngestError> {
    let table_sel = selector("table")?;
    let row_sel = selector("tr")?;
    let cell_sel = selector("td")?;

    let document = Html::parse_document(html);
    let table = document
        .select(&table_sel)
        .next()
        .ok_or_else(|| IngestError::Parse("no <table> element in page".to_string()))?;

    let mut rows = table.select(&row_sel);

    if let ColumnLayout::Validated { expected } = layout {
        let header = rows.next();
        validate_header(header, expected)?;
    } else {
        rows.next();
    }

    let mut out = Vec::new();
    for row in rows {
        let cells: Vec<ElementRef> = row.select(&cell_sel).take(3).collect();
        let code = cells.first().map(|c| cell_text(c));
        let name = cells
            .get(1)
            .map(|c| cell_text(c))
            .filter(|s| !s.is_empty());
        let closing_price = cells
            .get(2)
            .and_then(|c| parse_locale_decimal(&cell_text(c)));

        out.push(IndexRecord {
            code,
            name,
            closing_price,
            date: capture_date,
        });
    }

    tracing::debug!(records = out.len(), %capture_date, "extracted index table");
    Ok(out)
}

/// `"25,30"` → `25.3`. Only the first comma is treated as the decimal separator, and the
/// longest numeric prefix is used, so `"25,30 R$"` → `25.3` and `"1.234,56"` → `1.234`.
pub fn parse_locale_decimal(text: &str) -> Option<f64> {
    let t = text.trim().replacen(',', ".", 1);
    let prefix = numeric_prefix(&t);
    if prefix.is_empty() {
        return None;
    }
    prefix.parse::<f64>().ok().filter(|v| v.is_finite())
}

// [sign] digits [. digits] [e [sign] digits], stopping at the first byte that doesn't fit.
fn numeric_prefix(s: &str) -> &str {
    let b = s.as_bytes();
    let digits_from = |mut i: usize| {
        while i < b.len() && b[i].is_ascii_digit() {
            i += 1;
        }
        i
    };

    let mut i = 0;
    if i < b.len() && (b[i] == b'+' || b[i] == b'-') {
        i += 1;
    }
    let int_end = digits_from(i);
    let mut end = int_end;
    let mut has_digits = int_end > i;

    if end < b.len() && b[end] == b'.' {
        let frac_end = digits_from(end + 1);
        if frac_end > end + 1 || has_digits {
            has_digits |= frac_end > end + 1;
            end = frac_end;
        }
    }
    if !has_digits {
        return "";
    }

    if end < b.len() && (b[end] == b'e' || b[end] == b'E') {
        let mut j = end + 1;
        if j < b.len() && (b[j] == b'+' || b[j] == b'-') {
            j += 1;
        }
        let exp_end = digits_from(j);
        if exp_end > j {
            end = exp_end;
        }
    }

    &s[..end]
}

fn validate_header(header: Option<ElementRef>, expected: &[String; 3]) -> Result<(), IngestError> {
    let header_cell_sel = selector("th, td")?;
    let found: Vec<String> = header
        .map(|row| {
            row.select(&header_cell_sel)
                .take(3)
                .map(|c| cell_text(&c))
                .collect()
        })
        .unwrap_or_default();

    let matches = found.len() == expected.len()
        && found
            .iter()
            .zip(expected.iter())
            .all(|(f, e)| f.to_lowercase() == e.trim().to_lowercase());

    if !matches {
        return Err(IngestError::SchemaMismatch {
            expected: expected.to_vec(),
            found,
        });
    }
    Ok(())
}

fn cell_text(cell: &ElementRef) -> String {
    cell.text().collect::<String>().trim().to_string()
}

fn selector(s: &str) -> Result<Selector, IngestError> {
    Selector::parse(s).map_err(|e| IngestError::Parse(format!("invalid selector {s}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, 27).unwrap()
    }

    fn page(rows: &str) -> String {
        format!(
            "<html><body><h1>IBOV</h1><table>\
             <tr><th>Código</th><th>Ação</th><th>Fechamento</th></tr>{rows}\
             </table></body></html>"
        )
    }

    #[test]
    fn extracts_expected_records() {
        let html = page(
            "<tr><td>PETR4</td><td>Petrobras</td><td>25,30</td></tr>\
             <tr><td>VALE3</td><td>Vale</td><td>68,75</td></tr>",
        );

        let records = extract_records(&html, today(), &ColumnLayout::Positional).unwrap();
        assert_eq!(
            records,
            vec![
                IndexRecord {
                    code: Some("PETR4".to_string()),
                    name: Some("Petrobras".to_string()),
                    closing_price: Some(25.30),
                    date: today(),
                },
                IndexRecord {
                    code: Some("VALE3".to_string()),
                    name: Some("Vale".to_string()),
                    closing_price: Some(68.75),
                    date: today(),
                },
            ]
        );
    }

    #[test]
    fn one_record_per_data_row_with_capture_date() {
        let mut rows = String::new();
        for i in 0..7 {
            rows.push_str(&format!("<tr><td>T{i}</td><td>N{i}</td><td>{i},5</td></tr>"));
        }
        let records = extract_records(&page(&rows), today(), &ColumnLayout::Positional).unwrap();
        assert_eq!(records.len(), 7);
        assert!(records.iter().all(|r| r.date == today()));
    }

    #[test]
    fn normalizes_comma_decimal() {
        let html = page("<tr><td>ABEV3</td><td>Ambev</td><td> 10,50 </td></tr>");
        let records = extract_records(&html, today(), &ColumnLayout::Positional).unwrap();
        assert_eq!(records[0].closing_price, Some(10.50));
    }

    #[test]
    fn missing_or_garbage_price_is_not_a_number() {
        let html = page(
            "<tr><td>ITUB4</td><td>Itaú</td></tr>\
             <tr><td>BBDC4</td><td>Bradesco</td><td>n/d</td></tr>",
        );
        let records = extract_records(&html, today(), &ColumnLayout::Positional).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].closing_price, None);
        assert_eq!(records[1].closing_price, None);
    }

    #[test]
    fn missing_cells_yield_absent_fields() {
        let html = page("<tr></tr><tr><td> WEGE3 </td><td>  </td></tr>");
        let records = extract_records(&html, today(), &ColumnLayout::Positional).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].code, None);
        assert_eq!(records[0].name, None);
        assert_eq!(records[1].code.as_deref(), Some("WEGE3"));
        assert_eq!(records[1].name, None);
    }

    #[test]
    fn header_only_table_yields_no_records() {
        let records = extract_records(&page(""), today(), &ColumnLayout::Positional).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn missing_table_fails() {
        let html = "<html><body><p>manutenção</p></body></html>";
        let err = extract_records(html, today(), &ColumnLayout::Positional).unwrap_err();
        assert!(matches!(err, IngestError::Parse(_)));
    }

    #[test]
    fn only_first_table_is_read() {
        let html = format!(
            "{}<table><tr><th>x</th></tr><tr><td>OTHER</td><td>y</td><td>1,0</td></tr></table>",
            page("<tr><td>PETR4</td><td>Petrobras</td><td>25,30</td></tr>")
        );
        let records = extract_records(&html, today(), &ColumnLayout::Positional).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].code.as_deref(), Some("PETR4"));
    }

    #[test]
    fn validated_layout_accepts_matching_header() {
        let layout = ColumnLayout::from_header_list("código, AÇÃO, Fechamento").unwrap();
        let html = page("<tr><td>PETR4</td><td>Petrobras</td><td>25,30</td></tr>");
        let records = extract_records(&html, today(), &layout).unwrap();
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn validated_layout_rejects_shifted_columns() {
        let layout = ColumnLayout::from_header_list("Código,Ação,Fechamento").unwrap();
        let html = "<table><tr><th>Código</th><th>Tipo</th><th>Ação</th></tr>\
                    <tr><td>PETR4</td><td>PN</td><td>Petrobras</td></tr></table>";
        let err = extract_records(html, today(), &layout).unwrap_err();
        match err {
            IngestError::SchemaMismatch { found, .. } => {
                assert_eq!(found, vec!["Código", "Tipo", "Ação"]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn header_list_needs_three_names() {
        assert!(ColumnLayout::from_header_list("Código,Ação").is_err());
        assert!(ColumnLayout::from_header_list("a,b,c,d").is_err());
    }

    #[test]
    fn parses_locale_decimals() {
        assert_eq!(parse_locale_decimal("68,75"), Some(68.75));
        assert_eq!(parse_locale_decimal("12"), Some(12.0));
        assert_eq!(parse_locale_decimal(""), None);
        assert_eq!(parse_locale_decimal("abc"), None);
        assert_eq!(parse_locale_decimal("NaN"), None);
        assert_eq!(parse_locale_decimal("-0,5"), Some(-0.5));
        assert_eq!(parse_locale_decimal("1e3"), Some(1000.0));
    }

    #[test]
    fn trailing_text_after_the_number_is_ignored() {
        assert_eq!(parse_locale_decimal("25,30*"), Some(25.3));
        assert_eq!(parse_locale_decimal("25,30 R$"), Some(25.3));
        assert_eq!(parse_locale_decimal("1.234,56"), Some(1.234));
        assert_eq!(parse_locale_decimal("12,"), Some(12.0));
        assert_eq!(parse_locale_decimal("3e"), Some(3.0));
        assert_eq!(parse_locale_decimal("R$ 25,30"), None);
        assert_eq!(parse_locale_decimal(",-"), None);
    }

    #[test]
    fn price_cell_with_suffix_keeps_leading_number() {
        let html = page("<tr><td>PETR4</td><td>Petrobras</td><td>25,30 (*)</td></tr>");
        let records = extract_records(&html, today(), &ColumnLayout::Positional).unwrap();
        assert_eq!(records[0].closing_price, Some(25.3));
    }
}
