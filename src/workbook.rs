//! `.xlsx` reader: calamine for cell values, the raw style parts for fills.
//!
//! Reads cell values and, for every cell, the fill color of its style. The
//! accounting exports this crate targets carry their structure in cell
//! background colors, so the fill is first-class data here rather than
//! formatting noise.

use crate::error::{FlattenError, Result};
use calamine::{Data, Range, Reader as _, Xlsx};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek};
use std::path::Path;
use zip::result::ZipError;
use zip::ZipArchive;

#[derive(Debug, Clone, PartialEq, Default)]
pub enum CellValue {
    #[default]
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
    Error(String),
}

impl CellValue {
    /// True for empty cells and for text that is only whitespace.
    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Display text. Whole numbers print without a fractional part.
    pub fn as_text(&self) -> String {
        match self {
            CellValue::Empty => String::new(),
            CellValue::Text(s) => s.clone(),
            CellValue::Number(n) => format_number(*n),
            CellValue::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
            CellValue::Error(e) => e.clone(),
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) => Some(*n),
            _ => None,
        }
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Cell {
    pub value: CellValue,
    /// Fill-color token of the cell's style, `None` when the style has no fill.
    pub fill: Option<String>,
}

impl Cell {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn text(text: impl Into<String>) -> Self {
        let text = text.into();
        let value = if text.is_empty() {
            CellValue::Empty
        } else {
            CellValue::Text(text)
        };
        Self { value, fill: None }
    }

    pub fn number(value: f64) -> Self {
        Self {
            value: CellValue::Number(value),
            fill: None,
        }
    }

    pub fn with_fill(mut self, token: impl Into<String>) -> Self {
        self.fill = Some(token.into());
        self
    }
}

/// A dense grid of cells addressed by 0-based `(row, col)`.
#[derive(Debug, Clone, Default)]
pub struct Worksheet {
    pub name: String,
    rows: Vec<Vec<Cell>>,
}

impl Worksheet {
    pub fn new(name: impl Into<String>, rows: Vec<Vec<Cell>>) -> Self {
        Self {
            name: name.into(),
            rows,
        }
    }

    /// Builds a sheet from sparse `(row, col)` positions.
    pub fn from_cells(
        name: impl Into<String>,
        cells: impl IntoIterator<Item = ((usize, usize), Cell)>,
    ) -> Self {
        let mut sheet = Self::new(name, Vec::new());
        for ((row, col), cell) in cells {
            sheet.set(row, col, cell);
        }
        sheet
    }

    /// Positions and cells of every non-default cell, row-major.
    pub fn cells(&self) -> impl Iterator<Item = ((usize, usize), &Cell)> {
        self.rows.iter().enumerate().flat_map(|(r, row)| {
            row.iter()
                .enumerate()
                .filter(|(_, cell)| !cell.value.is_empty() || cell.fill.is_some())
                .map(move |(c, cell)| ((r, c), cell))
        })
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Index of the last row holding any non-empty cell.
    pub fn last_row(&self) -> Option<usize> {
        self.rows
            .iter()
            .rposition(|row| row.iter().any(|c| !c.value.is_empty()))
    }

    pub fn row(&self, row: usize) -> &[Cell] {
        self.rows.get(row).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<&Cell> {
        self.rows.get(row).and_then(|r| r.get(col))
    }

    /// Trimmed display text, empty for missing cells.
    pub fn text(&self, row: usize, col: usize) -> String {
        self.cell(row, col)
            .map(|c| c.value.as_text().trim().to_string())
            .unwrap_or_default()
    }

    /// Raw display text with internal line breaks intact.
    pub fn raw_text(&self, row: usize, col: usize) -> String {
        self.cell(row, col)
            .map(|c| c.value.as_text())
            .unwrap_or_default()
    }

    pub fn number(&self, row: usize, col: usize) -> Option<f64> {
        self.cell(row, col).and_then(|c| c.value.as_number())
    }

    pub fn value(&self, row: usize, col: usize) -> &CellValue {
        static EMPTY: CellValue = CellValue::Empty;
        self.cell(row, col).map(|c| &c.value).unwrap_or(&EMPTY)
    }

    /// Widest row in the grid.
    pub fn width(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }

    fn set(&mut self, row: usize, col: usize, cell: Cell) {
        if self.rows.len() <= row {
            self.rows.resize_with(row + 1, Vec::new);
        }
        let r = &mut self.rows[row];
        if r.len() <= col {
            r.resize_with(col + 1, Cell::default);
        }
        r[col] = cell;
    }

    fn set_fill(&mut self, row: usize, col: usize, fill: String) {
        match self.rows.get_mut(row).and_then(|r| r.get_mut(col)) {
            Some(cell) => cell.fill = Some(fill),
            None => self.set(row, col, Cell::empty().with_fill(fill)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Workbook {
    sheets: Vec<Worksheet>,
    active: usize,
}

impl Workbook {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        Self::from_reader(BufReader::new(file))
    }

    /// Values come from calamine; fills come from a second pass over the raw
    /// `styles.xml` and the `s` attribute of every cell, which calamine does not expose.
    pub fn from_reader<R: Read + Seek>(mut reader: R) -> Result<Self> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        let mut archive = ZipArchive::new(Cursor::new(bytes.as_slice()))?;

        let workbook_xml = read_part(&mut archive, "xl/workbook.xml")?
            .ok_or_else(|| FlattenError::MissingPart("xl/workbook.xml".to_string()))?;
        let (entries, active_tab) = parse_workbook_xml(&workbook_xml)?;
        if entries.is_empty() {
            return Err(FlattenError::SheetNotFound("<no sheets>".to_string()));
        }

        let targets = match read_part(&mut archive, "xl/_rels/workbook.xml.rels")? {
            Some(xml) => parse_relationships(&xml)?,
            None => HashMap::new(),
        };

        let styles = match read_part(&mut archive, "xl/styles.xml")? {
            Some(xml) => parse_styles(&xml)?,
            None => StyleFills::default(),
        };

        let mut values: Xlsx<_> = Xlsx::new(Cursor::new(bytes.as_slice()))?;

        let mut sheets = Vec::with_capacity(entries.len());
        for (index, (name, rid)) in entries.into_iter().enumerate() {
            let path = targets
                .get(&rid)
                .map(|t| resolve_target(t))
                .unwrap_or_else(|| format!("xl/worksheets/sheet{}.xml", index + 1));
            let xml = read_part(&mut archive, &path)?
                .ok_or_else(|| FlattenError::MissingPart(path.clone()))?;

            let range = values.worksheet_range(&name)?;
            let mut sheet = sheet_from_range(&range);
            for (row, col, style) in parse_cell_styles(&xml)? {
                if let Some(fill) = styles.token_for_style(style) {
                    sheet.set_fill(row, col, fill);
                }
            }
            sheet.name = name;
            sheets.push(sheet);
        }

        let active = active_tab.min(sheets.len() - 1);
        Ok(Self { sheets, active })
    }

    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn sheet(&self, name: &str) -> Result<&Worksheet> {
        self.sheets
            .iter()
            .find(|s| s.name == name)
            .ok_or_else(|| FlattenError::SheetNotFound(name.to_string()))
    }

    pub fn active_sheet(&self) -> &Worksheet {
        &self.sheets[self.active]
    }

    pub fn into_active_sheet(mut self) -> Worksheet {
        self.sheets.swap_remove(self.active)
    }
}

/// Opens a workbook and returns its active worksheet.
pub fn read_active_sheet(path: impl AsRef<Path>) -> Result<Worksheet> {
    Ok(Workbook::open(path)?.into_active_sheet())
}

fn read_part<R: Read + Seek>(archive: &mut ZipArchive<R>, name: &str) -> Result<Option<String>> {
    let mut file = match archive.by_name(name) {
        Ok(file) => file,
        Err(ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let mut content = String::new();
    file.read_to_string(&mut content)?;
    Ok(Some(content))
}

fn resolve_target(target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        absolute.to_string()
    } else if target.starts_with("xl/") {
        target.to_string()
    } else {
        format!("xl/{}", target)
    }
}

fn parse_workbook_xml(xml: &str) -> Result<(Vec<(String, String)>, usize)> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut sheets = Vec::new();
    let mut active_tab = 0usize;

    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) => match e.local_name().as_ref() {
                b"sheet" => {
                    let mut name = String::new();
                    let mut rid = String::new();
                    for attr in e.attributes().flatten() {
                        match attr.key.local_name().as_ref() {
                            b"name" => name = attr.unescape_value()?.into_owned(),
                            b"id" => rid = attr.unescape_value()?.into_owned(),
                            _ => {}
                        }
                    }
                    sheets.push((name, rid));
                }
                b"workbookView" => {
                    for attr in e.attributes().flatten() {
                        if attr.key.as_ref() == b"activeTab" {
                            active_tab = attr.unescape_value()?.parse().unwrap_or(0);
                        }
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok((sheets, active_tab))
}

fn parse_relationships(xml: &str) -> Result<HashMap<String, String>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut targets = HashMap::new();
    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"Relationship" => {
                let mut id = String::new();
                let mut target = String::new();
                for attr in e.attributes().flatten() {
                    match attr.key.as_ref() {
                        b"Id" => id = attr.unescape_value()?.into_owned(),
                        b"Target" => target = attr.unescape_value()?.into_owned(),
                        _ => {}
                    }
                }
                targets.insert(id, target);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(targets)
}

/// Fill tokens by fill id, plus the fill id of every cell style.
#[derive(Debug, Default)]
struct StyleFills {
    fills: Vec<Option<String>>,
    xf_fill_ids: Vec<usize>,
}

impl StyleFills {
    fn token_for_style(&self, style: usize) -> Option<String> {
        let fill_id = *self.xf_fill_ids.get(style)?;
        self.fills.get(fill_id).cloned().flatten()
    }
}

fn parse_styles(xml: &str) -> Result<StyleFills> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut styles = StyleFills::default();
    let mut in_fills = false;
    let mut in_cell_xfs = false;
    let mut pattern: Option<String> = None;
    let mut token: Option<String> = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"fills" => in_fills = true,
                b"cellXfs" => in_cell_xfs = true,
                b"fill" if in_fills => {
                    pattern = None;
                    token = None;
                }
                b"patternFill" if in_fills => pattern = pattern_type(&e),
                b"fgColor" if in_fills => token = fill_token(&e),
                b"xf" if in_cell_xfs => styles.xf_fill_ids.push(fill_id(&e)),
                _ => {}
            },
            Event::Empty(e) => match e.local_name().as_ref() {
                b"fill" if in_fills => styles.fills.push(None),
                b"patternFill" if in_fills => pattern = pattern_type(&e),
                b"fgColor" if in_fills => token = fill_token(&e),
                b"xf" if in_cell_xfs => styles.xf_fill_ids.push(fill_id(&e)),
                _ => {}
            },
            Event::End(e) => match e.local_name().as_ref() {
                b"fills" => in_fills = false,
                b"cellXfs" => in_cell_xfs = false,
                b"fill" if in_fills => {
                    let solid = !matches!(pattern.as_deref(), Some("none") | Some("gray125"));
                    styles
                        .fills
                        .push(if solid { token.take() } else { None });
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(styles)
}

fn pattern_type(e: &BytesStart) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == b"patternType")
        .map(|a| String::from_utf8_lossy(&a.value).to_string())
}

fn fill_id(e: &BytesStart) -> usize {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == b"fillId")
        .and_then(|a| String::from_utf8_lossy(&a.value).parse().ok())
        .unwrap_or(0)
}

/// Renders a `<fgColor>` element as an opaque token. Unreadable colors yield `None`.
fn fill_token(e: &BytesStart) -> Option<String> {
    let mut rgb = None;
    let mut theme = None;
    let mut indexed = None;
    let mut tint = None;

    for attr in e.attributes().flatten() {
        let value = String::from_utf8_lossy(&attr.value).trim().to_string();
        match attr.key.as_ref() {
            b"rgb" => rgb = Some(value),
            b"theme" => theme = Some(value),
            b"indexed" => indexed = Some(value),
            b"tint" => tint = Some(value),
            _ => {}
        }
    }

    if let Some(rgb) = rgb {
        return normalize_rgb(&rgb);
    }
    if let Some(theme) = theme {
        return Some(match tint {
            Some(tint) => format!("theme:{}:{}", theme, tint),
            None => format!("theme:{}", theme),
        });
    }
    indexed.map(|i| format!("indexed:{}", i))
}

/// Uppercase 8-digit ARGB; 6-digit RGB gets an opaque alpha prefix.
pub fn normalize_rgb(raw: &str) -> Option<String> {
    let hex = raw.trim().trim_start_matches('#').to_ascii_uppercase();
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    match hex.len() {
        8 => Some(hex),
        6 => Some(format!("FF{}", hex)),
        _ => None,
    }
}

fn sheet_from_range(range: &Range<Data>) -> Worksheet {
    let (row0, col0) = range
        .start()
        .map(|(r, c)| (r as usize, c as usize))
        .unwrap_or((0, 0));
    let mut sheet = Worksheet::default();
    for (r, c, data) in range.cells() {
        let value = cell_value(data);
        if !matches!(value, CellValue::Empty) {
            sheet.set(row0 + r, col0 + c, Cell { value, fill: None });
        }
    }
    sheet
}

fn cell_value(data: &Data) -> CellValue {
    match data {
        Data::Empty => CellValue::Empty,
        Data::String(s) if s.is_empty() => CellValue::Empty,
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::Text(s.clone()),
        Data::Float(f) => CellValue::Number(*f),
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Bool(b) => CellValue::Bool(*b),
        // date-formatted cells stay serial numbers; parsers decide what a date is
        Data::DateTime(dt) => CellValue::Number(dt.as_f64()),
        Data::Error(e) => CellValue::Error(e.to_string()),
    }
}

/// Position and style index of every cell with a non-default style.
fn parse_cell_styles(xml: &str) -> Result<Vec<(usize, usize, usize)>> {
    let mut reader = Reader::from_str(xml);

    let mut styled = Vec::new();
    let mut next_row = 0usize;
    let mut current_row = 0usize;
    let mut next_col = 0usize;

    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) => match e.local_name().as_ref() {
                b"row" => {
                    current_row = row_attr(&e).unwrap_or(next_row);
                    next_row = current_row + 1;
                    next_col = 0;
                }
                b"c" => {
                    let (row, col, style) = cell_position(&e, current_row, next_col);
                    next_col = col + 1;
                    if style != 0 {
                        styled.push((row, col, style));
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(styled)
}

fn row_attr(e: &BytesStart) -> Option<usize> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == b"r")
        .and_then(|a| String::from_utf8_lossy(&a.value).parse::<usize>().ok())
        .and_then(|r| r.checked_sub(1))
}

fn cell_position(e: &BytesStart, row: usize, col: usize) -> (usize, usize, usize) {
    let (mut row, mut col, mut style) = (row, col, 0);
    for attr in e.attributes().flatten() {
        let value = String::from_utf8_lossy(&attr.value);
        match attr.key.as_ref() {
            b"r" => {
                if let Some((r, c)) = parse_reference(&value) {
                    row = r;
                    col = c;
                }
            }
            b"s" => style = value.parse().unwrap_or(0),
            _ => {}
        }
    }
    (row, col, style)
}

/// Splits an `A1`-style reference into 0-based `(row, col)`.
pub fn parse_reference(reference: &str) -> Option<(usize, usize)> {
    let letters: String = reference
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect();
    let digits = &reference[letters.len()..];
    if letters.is_empty() || digits.is_empty() {
        return None;
    }

    let mut col = 0usize;
    for c in letters.chars() {
        let digit = c.to_ascii_uppercase() as usize - 'A' as usize + 1;
        col = col.checked_mul(26)?.checked_add(digit)?;
    }
    let row: usize = digits.parse().ok()?;
    Some((row.checked_sub(1)?, col - 1))
}

/// Formats a 0-based `(row, col)` as an `A1`-style reference.
pub fn format_reference(row: usize, col: usize) -> String {
    let mut letters = Vec::new();
    let mut n = col + 1;
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push((b'A' + rem as u8) as char);
        n = (n - 1) / 26;
    }
    letters.reverse();
    format!("{}{}", letters.into_iter().collect::<String>(), row + 1)
}
