use chrono::NaiveDate;
use ledger_sheet_flattener::workbook::format_reference;
use ledger_sheet_flattener::*;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

const ACCOUNT_THEME: &str = "theme:0:-0.249977111117893";
const SUB_LEVEL: &str = "FFE6E6E6";
const TOTAL: &str = "FFFFF2CC";

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn fill_xml(token: &str) -> String {
    let color = match token.strip_prefix("theme:") {
        Some(theme) => match theme.split_once(':') {
            Some((index, tint)) => format!(r#"<fgColor theme="{}" tint="{}"/>"#, index, tint),
            None => format!(r#"<fgColor theme="{}"/>"#, theme),
        },
        None => format!(r#"<fgColor rgb="{}"/>"#, token),
    };
    format!(
        r#"<fill><patternFill patternType="solid">{}<bgColor indexed="64"/></patternFill></fill>"#,
        color
    )
}

/// Writes `sheet` as a single-sheet `.xlsx`, every distinct fill getting its own cell style.
fn write_xlsx(path: &Path, sheet: &Worksheet) -> anyhow::Result<()> {
    let mut fills: Vec<String> = Vec::new();
    for (_, cell) in sheet.cells() {
        if let Some(fill) = &cell.fill {
            if !fills.contains(fill) {
                fills.push(fill.clone());
            }
        }
    }
    let style_of = |cell: &Cell| {
        cell.fill
            .as_ref()
            .and_then(|f| fills.iter().position(|x| x == f))
            .map_or(0, |i| i + 1)
    };

    let mut rows: BTreeMap<usize, Vec<String>> = BTreeMap::new();
    for ((r, c), cell) in sheet.cells() {
        let reference = format_reference(r, c);
        let style = style_of(cell);
        let xml = match &cell.value {
            CellValue::Number(n) => format!(r#"<c r="{}" s="{}"><v>{}</v></c>"#, reference, style, n),
            CellValue::Empty => format!(r#"<c r="{}" s="{}"/>"#, reference, style),
            other => format!(
                r#"<c r="{}" s="{}" t="inlineStr"><is><t xml:space="preserve">{}</t></is></c>"#,
                reference,
                style,
                escape(&other.as_text())
            ),
        };
        rows.entry(r).or_default().push(xml);
    }
    let sheet_data: String = rows
        .iter()
        .map(|(r, cells)| format!(r#"<row r="{}">{}</row>"#, r + 1, cells.concat()))
        .collect();

    let styles = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
<fills count="{}"><fill><patternFill patternType="none"/></fill><fill><patternFill patternType="gray125"/></fill>{}</fills>
<cellXfs count="{}"><xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/>{}</cellXfs>
</styleSheet>"#,
        fills.len() + 2,
        fills.iter().map(|f| fill_xml(f)).collect::<String>(),
        fills.len() + 1,
        (0..fills.len())
            .map(|i| format!(r#"<xf numFmtId="0" fontId="0" fillId="{}" borderId="0" xfId="0" applyFill="1"/>"#, i + 2))
            .collect::<String>(),
    );

    let workbook = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
<bookViews><workbookView activeTab="0"/></bookViews>
<sheets><sheet name="{}" sheetId="1" r:id="rId1"/></sheets>
</workbook>"#,
        escape(&sheet.name)
    );

    let rels = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/>
<Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>
</Relationships>"#;

    let content_types = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
<Default Extension="xml" ContentType="application/xml"/>
<Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>
<Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>
<Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/>
</Types>"#;

    let worksheet = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>{}</sheetData></worksheet>"#,
        sheet_data
    );

    let mut zip = ZipWriter::new(File::create(path)?);
    let options = SimpleFileOptions::default();
    for (name, content) in [
        ("[Content_Types].xml", content_types.to_string()),
        ("xl/workbook.xml", workbook),
        ("xl/_rels/workbook.xml.rels", rels.to_string()),
        ("xl/styles.xml", styles),
        ("xl/worksheets/sheet1.xml", worksheet),
    ] {
        zip.start_file(name, options)?;
        zip.write_all(content.as_bytes())?;
    }
    zip.finish()?;
    Ok(())
}

fn text(row: usize, col: usize, value: &str) -> ((usize, usize), Cell) {
    ((row, col), Cell::text(value))
}

fn filled(row: usize, col: usize, value: &str, fill: &str) -> ((usize, usize), Cell) {
    ((row, col), Cell::text(value).with_fill(fill))
}

fn number(row: usize, col: usize, value: f64) -> ((usize, usize), Cell) {
    ((row, col), Cell::number(value))
}

fn statement_sheet(company: &str, period: &str) -> Worksheet {
    Worksheet::from_cells(
        "TDSheet",
        vec![
            text(0, 0, company),
            text(2, 0, period),
            text(5, 0, "Счет"),
            text(6, 0, "Контрагенты"),
            text(7, 0, "Договоры"),
            filled(10, 0, "60.01", ACCOUNT_THEME),
            number(10, 3, 1500.0),
            filled(11, 0, "ООО Лютик", SUB_LEVEL),
            text(12, 0, "Договор №5"),
            number(12, 3, 1000.0),
            text(13, 0, "Договор №6"),
            number(13, 3, 500.0),
            number(13, 6, 20.0),
            filled(14, 0, "Итого развернутое", TOTAL),
            number(14, 3, 1500.0),
            number(14, 6, 20.0),
        ],
    )
}

#[test]
fn test_statement_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("osv_60.xlsx");
    write_xlsx(&path, &statement_sheet("ООО Ромашка", "Период: Март 2024 г.")).unwrap();

    let records = parse_statement(&path).unwrap();
    assert_eq!(records.len(), 5);

    let april = NaiveDate::from_ymd_opt(2024, 4, 1);
    assert!(records.iter().all(|r| r.date == april));
    assert!(records.iter().all(|r| r.company.as_deref() == Some("ООО Ромашка")));

    let first = &records[0];
    assert_eq!(first.account.as_deref(), Some("60.01"));
    assert_eq!(first.partner.as_deref(), Some("ООО Лютик"));
    assert_eq!(first.contract.as_deref(), Some("Договор №5"));
    assert_eq!(first.record_type.as_deref(), Some("Обороты за период"));
    assert_eq!(first.dt_cr, Some(DtCr::Debit));
    assert_eq!(first.value, Some(1000.0));

    let closing = &records[2];
    assert_eq!(closing.record_type.as_deref(), Some("Сальдо на конец периода"));
    assert_eq!(closing.dt_cr, Some(DtCr::Credit));

    let totals: Vec<_> = records.iter().filter(|r| r.category.is_some()).collect();
    assert_eq!(totals.len(), 2);
    for total in totals {
        assert_eq!(total.category.as_deref(), Some("Итого"));
        assert_eq!(total.account.as_deref(), Some("60.01"));
        assert_eq!(total.partner, None);
    }
}

#[test]
fn test_statement_english_period_and_layout_override() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("osv.xlsx");
    let sheet = Worksheet::from_cells(
        "TDSheet",
        vec![
            text(0, 0, "ООО Ромашка"),
            text(2, 0, "March 2024"),
            text(5, 0, "Счет"),
            text(6, 0, "Статьи затрат"),
            filled(12, 0, "20.01", "FFC0C0C0"),
            text(13, 0, "Аренда"),
            number(13, 1, 300.0),
        ],
    );
    write_xlsx(&path, &sheet).unwrap();

    let layout = StatementLayout::from_json_str(r#"{"start_row": 12}"#).unwrap();
    let records = parse_statement_with_layout(&path, &layout).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].date, NaiveDate::from_ymd_opt(2024, 4, 1));
    assert_eq!(records[0].account.as_deref(), Some("20.01"));
    // the empty third label becomes a generic extra column
    assert_eq!(records[0].extra.get("Level 3").map(String::as_str), Some("Аренда"));
    assert_eq!(records[0].record_type.as_deref(), Some("Сальдо на начало периода"));
}

#[test]
fn test_statement_missing_period_fails() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.xlsx");
    write_xlsx(&path, &statement_sheet("ООО Ромашка", "")).unwrap();

    let err = parse_statement(&path).unwrap_err();
    assert!(matches!(err, FlattenError::MissingHeader { ref cell, .. } if cell == "A3"));
}

#[test]
fn test_header_only_statement_gives_empty_table_with_columns() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("empty.xlsx");
    let sheet = Worksheet::from_cells(
        "TDSheet",
        vec![text(0, 0, "ООО Ромашка"), text(2, 0, "Период: Январь 2024 г.")],
    );
    write_xlsx(&path, &sheet).unwrap();

    let records = parse_statement(&path).unwrap();
    let table = Table::from_records(&records);
    assert!(table.is_empty());
    for column in ["Date", "Company", "Estate", "Type", "Category", "Partner", "Contract", "Document", "Bank Account", "Value"] {
        assert!(table.columns().iter().any(|c| c == column), "missing {}", column);
    }
}

#[test]
fn test_income_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("income.xlsx");
    let sheet = Worksheet::from_cells(
        "Выручка",
        vec![
            text(0, 0, "Отчет по выручке"),
            text(4, 1, "Наименование"),
            text(4, 2, "Контрагент"),
            text(4, 3, "Период"),
            text(4, 4, "Сумма"),
            filled(5, 1, "Аренда", "FFFAC090"),
            filled(6, 1, "ООО Ромашка", "FFCCFFCC"),
            filled(7, 1, "ТЦ Центральный", "FFCCFFFF"),
            text(8, 1, "Акт №12"),
            text(8, 2, "ИП Петров"),
            text(8, 3, "15.01.2024 - 14.02.2024"),
            text(8, 4, "45 231,50"),
            text(9, 1, "Акт №13"),
            text(9, 2, "ООО Лютик"),
            text(9, 3, "15.01.2024 - 14.02.2024"),
            number(9, 4, 1000.0),
            text(10, 1, "Итого:"),
            number(10, 4, 46231.5),
        ],
    );
    write_xlsx(&path, &sheet).unwrap();

    let records = parse_income(&path).unwrap();
    assert_eq!(records.len(), 3);

    let march = NaiveDate::from_ymd_opt(2024, 3, 1);
    assert_eq!(records[0].date, march);
    assert_eq!(records[0].value, Some(45231.5));
    assert_eq!(records[0].estate.as_deref(), Some("ТЦ Центральный"));
    assert_eq!(records[0].category.as_deref(), Some("Аренда"));
    assert_eq!(records[1].partner.as_deref(), Some("ООО Лютик"));

    let total = &records[2];
    assert_eq!(total.category.as_deref(), Some("Итого за месяц"));
    assert_eq!(total.date, march);
    assert_eq!(total.estate, None);
    assert_eq!(total.document, None);
    assert_eq!(total.company.as_deref(), Some("ООО Ромашка"));
}

#[test]
fn test_income_without_marker_fails() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("income.xlsx");
    write_xlsx(&path, &Worksheet::from_cells("s", vec![text(0, 0, "Отчет")])).unwrap();
    assert!(matches!(
        parse_income(&path),
        Err(FlattenError::HeaderRowNotFound(_))
    ));
}

fn ledger_sheet() -> Worksheet {
    Worksheet::from_cells(
        "Карточка",
        vec![
            text(0, 0, "Карточка счета 60 за Март 2024 г."),
            text(1, 0, "ООО Ромашка"),
            text(5, 0, "Дата"),
            text(5, 1, "Документ"),
            text(5, 2, "Аналитика Дт"),
            text(5, 3, "Аналитика Кт"),
            text(5, 4, "Дебет"),
            text(5, 6, "Кредит"),
            text(6, 4, "Счет"),
            text(6, 5, "Сумма"),
            text(6, 6, "Счет"),
            text(6, 7, "Сумма"),
            text(7, 0, "Сальдо на начало"),
            text(8, 0, "05.03.2024"),
            text(8, 1, "Поступление (акт, накладная) 00000012 от 05.03.2024"),
            text(8, 2, "ООО Лютик\nДоговор №5 от 01.01.2024\n<...>"),
            text(8, 3, "ТЦ Центральный\nАренда"),
            text(8, 4, "60.01"),
            number(8, 5, 1500.0),
            text(9, 0, "06.03.2024"),
            text(9, 1, "Списание с расчетного счета 31"),
            text(9, 2, "40702810900000012345"),
            text(9, 3, "ИП Петров Петр"),
            text(9, 6, "51"),
            text(9, 7, "1 500,00"),
            text(10, 1, "Обороты за период"),
            number(10, 4, 45231.0),
            text(10, 6, "12 345,00"),
        ],
    )
}

#[test]
fn test_supplier_ledger_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("card_60.xlsx");
    write_xlsx(&path, &ledger_sheet()).unwrap();

    let records = parse_supplier_ledger(&path).unwrap();
    assert_eq!(records.len(), 4);

    let first = &records[0];
    assert_eq!(first.dt_cr, DtCr::Debit);
    assert_eq!(first.account.as_deref(), Some("60.01"));
    assert_eq!(first.value, 1500.0);
    assert_eq!(first.date, NaiveDate::from_ymd_opt(2024, 3, 5));
    assert_eq!(first.company.as_deref(), Some("ООО Ромашка"));
    assert_eq!(first.an_dt, vec!["ООО Лютик", "Договор №5 от 01.01.2024"]);

    let payment = &records[1];
    assert_eq!(payment.dt_cr, DtCr::Credit);
    assert_eq!(payment.account.as_deref(), Some("51"));
    assert_eq!(payment.value, 1500.0);

    // the turnover row: debit amount spilled into the account column
    let spilled = &records[2];
    assert_eq!(spilled.dt_cr, DtCr::Debit);
    assert_eq!(spilled.account, None);
    assert_eq!(spilled.value, 45231.0);
    assert_eq!(spilled.date, None);

    let credit_total = &records[3];
    assert_eq!(credit_total.dt_cr, DtCr::Credit);
    assert_eq!(credit_total.account, None);
    assert_eq!(credit_total.value, 12345.0);
}

#[test]
fn test_enrichment_with_reference_files() {
    let dir = tempfile::tempdir().unwrap();
    let ledger_path = dir.path().join("card_60.xlsx");
    write_xlsx(&ledger_path, &ledger_sheet()).unwrap();

    let objects_path = dir.path().join("objects.xlsx");
    let objects = Worksheet::from_cells(
        "Объекты",
        vec![
            text(0, 0, "Код"),
            text(0, 1, "Исходное наименование"),
            text(1, 0, "1"),
            text(1, 1, "ТЦ Центральный"),
            text(2, 0, "2"),
            text(2, 1, "Склад Южный"),
        ],
    );
    write_xlsx(&objects_path, &objects).unwrap();

    let categories_path = dir.path().join("categories.csv");
    let mut file = File::create(&categories_path).unwrap();
    writeln!(file, "Категория,Группа").unwrap();
    writeln!(file, "Аренда,Доходы").unwrap();
    writeln!(file, "Охрана,Расходы").unwrap();
    drop(file);

    let enricher = Enricher::new(
        EstateDictionary::from_workbook(&objects_path).unwrap(),
        CategoryTerms::from_csv_path(&categories_path, "Категория").unwrap(),
    );
    let records = parse_supplier_ledger(&ledger_path).unwrap();
    let enriched = parse_and_enrich_supplier_ledger(&ledger_path, &enricher).unwrap();
    assert_eq!(enriched.len(), records.len());

    let purchase = &enriched[0];
    assert_eq!(
        purchase.document.as_deref(),
        Some("Поступление (акт, накладная) 00000012 от 05.03.2024")
    );
    assert_eq!(purchase.supplier.as_deref(), Some("ООО ЛЮТИК"));
    assert_eq!(purchase.contract.as_deref(), Some("Договор №5 от 01.01.2024"));
    assert_eq!(purchase.estate.as_deref(), Some("ТЦ Центральный"));
    assert_eq!(purchase.category.as_deref(), Some("Аренда"));

    let payment = &enriched[1];
    assert_eq!(payment.bank_account.as_deref(), Some("40702810900000012345"));
    assert_eq!(payment.supplier.as_deref(), Some("ИП ПЕТРОВ ПЕТР"));

    // every original item is accounted for exactly once
    for (source, result) in records.iter().zip(&enriched) {
        let mut original: Vec<&String> = source.doc.iter().chain(&source.an_dt).chain(&source.an_cr).collect();
        let mut audited: Vec<&String> = result.assignments.iter().map(|a| &a.item).collect();
        original.sort();
        audited.sort();
        assert_eq!(original, audited);
    }

    let table = Table::from_records(&enriched);
    let csv_path = dir.path().join("enriched.csv");
    table.write_csv_path(&csv_path).unwrap();
    let mut reader = csv::Reader::from_path(&csv_path).unwrap();
    let headers = reader.headers().unwrap().clone();
    assert!(headers.iter().any(|h| h == "Related Company"));
    assert_eq!(reader.records().count(), enriched.len());
}

#[test]
fn test_batch_round_trip_and_failures() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    fs::create_dir(root.join("q1")).unwrap();

    write_xlsx(
        &root.join("march.xlsx"),
        &statement_sheet("ООО Ромашка", "Период: Март 2024 г."),
    )
    .unwrap();
    write_xlsx(
        &root.join("q1").join("april.xlsx"),
        &statement_sheet("ООО Лютик", "Период: Апрель 2024 г."),
    )
    .unwrap();
    fs::write(root.join("broken.xlsx"), b"not a workbook").unwrap();
    fs::write(root.join("~$march.xlsx"), b"lock").unwrap();

    let report = collect_folder(root, |p: &Path| parse_statement(p)).unwrap();
    assert_eq!(report.succeeded, 2);
    assert_eq!(report.failed(), 1);
    assert!(report.failures[0].path.ends_with("broken.xlsx"));
    assert_eq!(report.table.columns()[0], FILE_COLUMN);
    assert_eq!(report.table.len(), 10);

    for file in ["march.xlsx", "q1/april.xlsx"] {
        let standalone = Table::from_records(&parse_statement(root.join(file)).unwrap());
        let from_batch = report
            .table
            .filter_eq(FILE_COLUMN, &TableValue::Text(file.to_string()))
            .select(standalone.columns())
            .unwrap();
        assert_eq!(from_batch, standalone, "round trip differs for {}", file);
    }
}

#[test]
fn test_report_kind_collects_json() {
    let dir = tempfile::tempdir().unwrap();
    write_xlsx(&dir.path().join("card.xlsx"), &ledger_sheet()).unwrap();

    let report = ReportKind::SupplierLedger.collect(dir.path()).unwrap();
    let json = report.table.to_json().unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed.as_array().map(Vec::len), Some(4));
    assert_eq!(parsed[0]["File"], "card.xlsx");
    assert_eq!(parsed[0]["AnDT"][0], "ООО Лютик");
}

#[test]
fn test_schemas_are_generated() {
    let record_schema = NormalizedRecord::schema_as_json().unwrap();
    assert!(record_schema.contains("Bank Account"));

    let layout_schema = LedgerLayout::schema_as_json().unwrap();
    assert!(layout_schema.contains("account_code_pattern"));

    let converter = ConverterConfig::from_json_str(r#"{"binary": "soffice"}"#).unwrap();
    assert_eq!(converter.binary, "soffice");
}

#[test]
fn test_name_normalizer_scenarios() {
    assert_eq!(normalize_name("ооо ромашка"), "ООО РОМАШКА");
    assert_eq!(normalize_name("Иванов И.И."), "Иванов И.И.");
    assert_eq!(normalize_name("ИП Петров Петр"), "ИП ПЕТРОВ ПЕТР");
    for name in ["ооо ромашка", "Иванов И.И.", "ИП Петров Петр", "склад южный", "ромашка"] {
        let once = normalize_name(name);
        assert_eq!(normalize_name(&once), once);
    }
}
