//! XLSX style parser: extracts formatting from styles.xml and per-cell style IDs,
//! dimensions and merged regions from worksheet XML within XLSX (ZIP) archives.
//!
//! calamine surfaces values only; everything needed to write a sheet back
//! without visual loss is read here.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::HashMap;
use std::io::{Read, Seek};
use std::path::Path;
use lossgrid_engine::cell::{Alignment, BorderStyle, CellBorders, CellFormat, VerticalAlignment};
use zip::ZipArchive;

// =============================================================================
// Public types
// =============================================================================

/// Parsed style table from styles.xml — maps cellXfs index → CellFormat.
pub struct StyleTable {
    pub styles: Vec<CellFormat>,
}

impl StyleTable {
    pub fn get(&self, id: usize) -> Option<&CellFormat> {
        self.styles.get(id)
    }

    pub fn len(&self) -> usize {
        self.styles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.styles.is_empty()
    }
}

/// Per-cell style references, dimensions and merges from one worksheet XML.
/// Coordinates are 1-based.
#[derive(Debug, Default)]
pub struct SheetFormatting {
    /// (row, col, style_id) triples
    pub cell_styles: Vec<(usize, usize, usize)>,
    /// Column widths in raw Excel character-width units
    pub col_widths: HashMap<usize, f64>,
    /// Row heights in raw Excel point units
    pub row_heights: HashMap<usize, f64>,
    /// Merged cell regions: (min_row, min_col, max_row, max_col)
    pub merged_regions: Vec<(usize, usize, usize, usize)>,
}

/// Stats about style parsing for the import report.
#[derive(Debug, Default)]
pub struct StyleImportStats {
    pub styles_referenced: usize,
    pub unique_styles: usize,
    pub unsupported_features: Vec<String>,
}

// =============================================================================
// XML entity unescaping
// =============================================================================

/// Unescape the 5 predefined XML entities: &amp; &lt; &gt; &quot; &apos;
fn unescape_xml(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    s.replace("&quot;", "\"")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

// =============================================================================
// Built-in number formats
// =============================================================================

/// Format code for a built-in numFmtId (ECMA-376 Part 1, 18.8.30).
/// Returns None for General and for ids with locale-dependent codes.
fn builtin_number_format(id: u16) -> Option<&'static str> {
    let code = match id {
        1 => "0",
        2 => "0.00",
        3 => "#,##0",
        4 => "#,##0.00",
        9 => "0%",
        10 => "0.00%",
        11 => "0.00E+00",
        12 => "# ?/?",
        13 => "# ??/??",
        14 => "mm-dd-yy",
        15 => "d-mmm-yy",
        16 => "d-mmm",
        17 => "mmm-yy",
        18 => "h:mm AM/PM",
        19 => "h:mm:ss AM/PM",
        20 => "h:mm",
        21 => "h:mm:ss",
        22 => "m/d/yy h:mm",
        37 => "#,##0 ;(#,##0)",
        38 => "#,##0 ;[Red](#,##0)",
        39 => "#,##0.00;(#,##0.00)",
        40 => "#,##0.00;[Red](#,##0.00)",
        45 => "mm:ss",
        46 => "[h]:mm:ss",
        47 => "mmss.0",
        48 => "##0.0E+0",
        49 => "@",
        _ => return None,
    };
    Some(code)
}

// =============================================================================
// Colors
// =============================================================================

/// Standard Excel indexed color palette, indices 8..=63 (0..=7 repeat 8..=15).
const INDEXED_PALETTE: [u32; 56] = [
    0x000000, 0xFFFFFF, 0xFF0000, 0x00FF00, 0x0000FF, 0xFFFF00, 0xFF00FF, 0x00FFFF,
    0x800000, 0x008000, 0x000080, 0x808000, 0x800080, 0x008080, 0xC0C0C0, 0x808080,
    0x9999FF, 0x993366, 0xFFFFCC, 0xCCFFFF, 0x660066, 0xFF8080, 0x0066CC, 0xCCCCFF,
    0x000080, 0xFF00FF, 0xFFFF00, 0x00FFFF, 0x800080, 0x800000, 0x008080, 0x0000FF,
    0x00CCFF, 0xCCFFFF, 0xCCFFCC, 0xFFFF99, 0x99CCFF, 0xFF99CC, 0xCC99FF, 0xFFCC99,
    0x3366FF, 0x33CCCC, 0x99CC00, 0xFFCC00, 0xFF9900, 0xFF6600, 0x666699, 0x969696,
    0x003366, 0x339966, 0x003300, 0x333300, 0x993300, 0x993366, 0x333399, 0x333333,
];

fn rgb_from_u32(v: u32) -> [u8; 3] {
    [(v >> 16) as u8, (v >> 8) as u8, v as u8]
}

fn indexed_color(idx: u8) -> Option<[u8; 3]> {
    let slot = match idx {
        0..=7 => idx as usize,
        8..=63 => idx as usize - 8,
        _ => return None, // 64/65 = system foreground/background
    };
    INDEXED_PALETTE.get(slot).map(|v| rgb_from_u32(*v))
}

/// Default Office theme colors (tints are not applied).
fn theme_color_default(idx: u8) -> Option<[u8; 3]> {
    let v = match idx {
        0 => 0xFFFFFF, // lt1
        1 => 0x000000, // dk1
        2 => 0xEEECE1, // lt2
        3 => 0x1F497D, // dk2
        4 => 0x4F81BD, // accent1
        5 => 0xC0504D,
        6 => 0x9BBB59,
        7 => 0x8064A2,
        8 => 0x4BACC6,
        9 => 0xF79646,
        _ => return None,
    };
    Some(rgb_from_u32(v))
}

/// Parse "AARRGGBB" or "RRGGBB".
fn parse_argb_hex(hex: &[u8]) -> Option<[u8; 3]> {
    let s = std::str::from_utf8(hex).ok()?;
    let rgb = match s.len() {
        8 => &s[2..],
        6 => s,
        _ => return None,
    };
    u32::from_str_radix(rgb, 16).ok().map(rgb_from_u32)
}

/// Resolve a `<color>`/`<fgColor>` element's attributes.
fn parse_color_attrs(e: &BytesStart, unsupported: &mut Vec<String>) -> Option<[u8; 3]> {
    for attr in e.attributes().flatten() {
        match attr.key.as_ref() {
            b"rgb" => return parse_argb_hex(&attr.value),
            b"indexed" => {
                return std::str::from_utf8(&attr.value)
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .and_then(indexed_color);
            }
            b"theme" => {
                let color = std::str::from_utf8(&attr.value)
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .and_then(theme_color_default);
                let note = "theme colors approximated (theme tints ignored)".to_string();
                if !unsupported.contains(&note) {
                    unsupported.push(note);
                }
                return color;
            }
            _ => {}
        }
    }
    None
}

fn attr_u16(e: &BytesStart, key: &[u8]) -> Option<u16> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == key)
        .and_then(|a| std::str::from_utf8(&a.value).ok().and_then(|s| s.parse().ok()))
}

fn attr_string(e: &BytesStart, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == key)
        .map(|a| String::from_utf8_lossy(&a.value).to_string())
}

fn attr_flag(e: &BytesStart, key: &[u8]) -> bool {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == key)
        .map(|a| a.value.as_ref() == b"1" || a.value.as_ref() == b"true")
        .unwrap_or(false)
}

// =============================================================================
// styles.xml parser
// =============================================================================

#[derive(Debug, Default, Clone)]
struct ParsedFont {
    bold: bool,
    italic: bool,
    size: Option<f32>,
    name: Option<String>,
    color: Option<[u8; 3]>,
}

#[derive(Debug, Default, Clone)]
struct ParsedFill {
    color: Option<[u8; 3]>,
}

#[derive(Debug, Default, Clone)]
struct XfEntry {
    num_fmt_id: Option<u16>,
    font_id: Option<u16>,
    fill_id: Option<u16>,
    border_id: Option<u16>,
    h_align: Option<String>,
    v_align: Option<String>,
    wrap_text: bool,
}

/// Parse styles.xml content into a StyleTable.
pub fn parse_styles_xml(xml: &str) -> (StyleTable, Vec<String>) {
    let mut unsupported: Vec<String> = Vec::new();

    let custom_num_fmts = parse_num_fmts(xml);
    let fonts = parse_fonts(xml, &mut unsupported);
    let fills = parse_fills(xml, &mut unsupported);
    let borders = parse_borders(xml);

    let styles = parse_cell_xfs(xml)
        .iter()
        .map(|xf| resolve_xf(xf, &custom_num_fmts, &fonts, &fills, &borders))
        .collect();

    (StyleTable { styles }, unsupported)
}

/// Parse <numFmts> section → HashMap<formatId, formatCode>
fn parse_num_fmts(xml: &str) -> HashMap<u16, String> {
    let mut map = HashMap::new();
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut in_num_fmts = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) if e.name().as_ref() == b"numFmts" => in_num_fmts = true,
            Ok(Event::End(ref e)) if e.name().as_ref() == b"numFmts" => break,
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e))
                if in_num_fmts && e.name().as_ref() == b"numFmt" =>
            {
                // formatCode may carry entities: &quot;$&quot;#,##0
                let id = attr_u16(e, b"numFmtId");
                let code = attr_string(e, b"formatCode").map(|raw| unescape_xml(&raw));
                if let (Some(id), Some(code)) = (id, code) {
                    map.insert(id, code);
                }
            }
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    map
}

/// Parse <fonts> section into Vec<ParsedFont>.
fn parse_fonts(xml: &str, unsupported: &mut Vec<String>) -> Vec<ParsedFont> {
    let mut fonts = Vec::new();
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut in_fonts = false;
    let mut current: Option<ParsedFont> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"fonts" => in_fonts = true,
                b"font" if in_fonts => current = Some(ParsedFont::default()),
                _ => {}
            },
            Ok(Event::Empty(ref e)) => {
                let name = e.name();
                match (name.as_ref(), current.as_mut()) {
                    (b"font", None) if in_fonts => fonts.push(ParsedFont::default()),
                    (b"b", Some(font)) => font.bold = !matches!(attr_string(e, b"val").as_deref(), Some("0") | Some("false")),
                    (b"i", Some(font)) => font.italic = !matches!(attr_string(e, b"val").as_deref(), Some("0") | Some("false")),
                    (b"sz", Some(font)) => {
                        font.size = attr_string(e, b"val").and_then(|s| s.parse().ok());
                    }
                    (b"name", Some(font)) => font.name = attr_string(e, b"val"),
                    (b"color", Some(font)) => font.color = parse_color_attrs(e, unsupported),
                    _ => {}
                }
            }
            Ok(Event::End(ref e)) => match e.name().as_ref() {
                b"font" => {
                    if let Some(font) = current.take() {
                        fonts.push(font);
                    }
                }
                b"fonts" => break,
                _ => {}
            },
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    fonts
}

/// Parse <fills> section. Only solid pattern fills carry a color.
fn parse_fills(xml: &str, unsupported: &mut Vec<String>) -> Vec<ParsedFill> {
    let mut fills = Vec::new();
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut in_fills = false;
    let mut current: Option<ParsedFill> = None;
    let mut solid = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Empty(ref e)) if in_fills && e.name().as_ref() == b"fill" => {
                fills.push(ParsedFill::default());
            }
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => match e.name().as_ref() {
                b"fills" => in_fills = true,
                b"fill" if in_fills => {
                    current = Some(ParsedFill::default());
                    solid = false;
                }
                b"patternFill" if current.is_some() => {
                    solid = attr_string(e, b"patternType").as_deref() == Some("solid");
                }
                b"fgColor" if solid => {
                    if let Some(fill) = current.as_mut() {
                        fill.color = parse_color_attrs(e, unsupported);
                    }
                }
                b"gradientFill" if current.is_some() => {
                    let note = "gradient fills not supported".to_string();
                    if !unsupported.contains(&note) {
                        unsupported.push(note);
                    }
                }
                _ => {}
            },
            Ok(Event::End(ref e)) => match e.name().as_ref() {
                b"fill" => {
                    if let Some(fill) = current.take() {
                        fills.push(fill);
                    }
                }
                b"fills" => break,
                _ => {}
            },
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    fills
}

fn parse_border_style(s: &str) -> BorderStyle {
    match s {
        "medium" | "mediumDashed" | "mediumDashDot" | "mediumDashDotDot" => BorderStyle::Medium,
        "thick" | "double" => BorderStyle::Thick,
        "none" | "" => BorderStyle::None,
        _ => BorderStyle::Thin,
    }
}

/// Parse <borders> section.
fn parse_borders(xml: &str) -> Vec<CellBorders> {
    let mut borders = Vec::new();
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut in_borders = false;
    let mut current: Option<CellBorders> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) if e.name().as_ref() == b"borders" => in_borders = true,
            Ok(Event::Start(ref e)) if in_borders && e.name().as_ref() == b"border" => {
                current = Some(CellBorders::default());
            }
            Ok(Event::Empty(ref e)) if in_borders && e.name().as_ref() == b"border" => {
                borders.push(CellBorders::default());
            }
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                if let Some(b) = current.as_mut() {
                    let style = attr_string(e, b"style")
                        .map(|s| parse_border_style(&s))
                        .unwrap_or_default();
                    match e.name().as_ref() {
                        b"left" => b.left = style,
                        b"right" => b.right = style,
                        b"top" => b.top = style,
                        b"bottom" => b.bottom = style,
                        _ => {}
                    }
                }
            }
            Ok(Event::End(ref e)) => match e.name().as_ref() {
                b"border" => {
                    if let Some(b) = current.take() {
                        borders.push(b);
                    }
                }
                b"borders" => break,
                _ => {}
            },
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    borders
}

/// Parse the <cellXfs> entries (cellStyleXfs are ignored).
fn parse_cell_xfs(xml: &str) -> Vec<XfEntry> {
    let mut entries = Vec::new();
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut in_cell_xfs = false;
    let mut current: Option<XfEntry> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"cellXfs" => in_cell_xfs = true,
                b"xf" if in_cell_xfs => current = Some(read_xf_attrs(e)),
                b"alignment" => {
                    if let Some(xf) = current.as_mut() {
                        read_alignment(e, xf);
                    }
                }
                _ => {}
            },
            Ok(Event::Empty(ref e)) => match e.name().as_ref() {
                // Self-closing <xf .../>
                b"xf" if in_cell_xfs => entries.push(read_xf_attrs(e)),
                b"alignment" => {
                    if let Some(xf) = current.as_mut() {
                        read_alignment(e, xf);
                    }
                }
                _ => {}
            },
            Ok(Event::End(ref e)) => match e.name().as_ref() {
                b"xf" => {
                    if let Some(xf) = current.take() {
                        entries.push(xf);
                    }
                }
                b"cellXfs" => break,
                _ => {}
            },
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    entries
}

fn read_xf_attrs(e: &BytesStart) -> XfEntry {
    XfEntry {
        num_fmt_id: attr_u16(e, b"numFmtId"),
        font_id: attr_u16(e, b"fontId"),
        fill_id: attr_u16(e, b"fillId"),
        border_id: attr_u16(e, b"borderId"),
        ..Default::default()
    }
}

fn read_alignment(e: &BytesStart, xf: &mut XfEntry) {
    xf.h_align = attr_string(e, b"horizontal");
    xf.v_align = attr_string(e, b"vertical");
    xf.wrap_text = attr_flag(e, b"wrapText");
}

/// Resolve an <xf> entry into a CellFormat using the parsed sub-tables.
fn resolve_xf(
    xf: &XfEntry,
    custom_num_fmts: &HashMap<u16, String>,
    fonts: &[ParsedFont],
    fills: &[ParsedFill],
    borders: &[CellBorders],
) -> CellFormat {
    let mut format = CellFormat::default();

    if let Some(id) = xf.num_fmt_id {
        format.num_format = custom_num_fmts
            .get(&id)
            .cloned()
            .or_else(|| builtin_number_format(id).map(str::to_string));
    }

    if let Some(font) = xf.font_id.and_then(|id| fonts.get(id as usize)) {
        format.bold = font.bold;
        format.italic = font.italic;
        format.font_size = font.size;
        format.font_name = font.name.clone();
        format.font_color = font.color;
    }

    if let Some(fill) = xf.fill_id.and_then(|id| fills.get(id as usize)) {
        format.fill_color = fill.color;
    }

    if let Some(b) = xf.border_id.and_then(|id| borders.get(id as usize)) {
        format.borders = *b;
    }

    format.alignment = match xf.h_align.as_deref() {
        Some("left") => Alignment::Left,
        Some("center") | Some("centerContinuous") => Alignment::Center,
        Some("right") => Alignment::Right,
        _ => Alignment::General,
    };
    format.vertical_alignment = match xf.v_align.as_deref() {
        Some("top") => VerticalAlignment::Top,
        Some("center") => VerticalAlignment::Center,
        _ => VerticalAlignment::Bottom,
    };
    format.wrap = xf.wrap_text;

    format
}

// =============================================================================
// Worksheet XML parser — per-cell style IDs + layout + merges
// =============================================================================

/// Parse a worksheet XML to extract per-cell style IDs, dimensions and merges.
pub fn parse_sheet_formatting(xml: &str) -> SheetFormatting {
    let mut out = SheetFormatting::default();

    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => match e.name().as_ref() {
                b"row" => {
                    let row = attr_string(e, b"r").and_then(|s| s.parse::<usize>().ok());
                    let ht = attr_string(e, b"ht").and_then(|s| s.parse::<f64>().ok());
                    if attr_flag(e, b"customHeight") {
                        if let (Some(row), Some(height)) = (row, ht) {
                            out.row_heights.insert(row, height);
                        }
                    }
                }
                b"c" => {
                    let style_id = attr_string(e, b"s").and_then(|s| s.parse::<usize>().ok());
                    let cell_ref = attr_string(e, b"r");
                    // style 0 is the default
                    if let (Some(style_id), Some(cell_ref)) = (style_id, cell_ref) {
                        if style_id > 0 {
                            if let Some((row, col)) = parse_cell_ref(&cell_ref) {
                                out.cell_styles.push((row, col, style_id));
                            }
                        }
                    }
                }
                b"col" => {
                    let min = attr_string(e, b"min").and_then(|s| s.parse::<usize>().ok());
                    let max = attr_string(e, b"max").and_then(|s| s.parse::<usize>().ok());
                    let width = attr_string(e, b"width").and_then(|s| s.parse::<f64>().ok());
                    if attr_flag(e, b"customWidth") {
                        if let (Some(min), Some(max), Some(w)) = (min, max, width) {
                            // <col max="16384"> spans the whole sheet; cap it
                            for col in min..=max.min(min + 1024) {
                                out.col_widths.insert(col, w);
                            }
                        }
                    }
                }
                b"mergeCell" => {
                    if let Some(region) = attr_string(e, b"ref").and_then(|r| parse_merge_ref(&r)) {
                        out.merged_regions.push(region);
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    out
}

/// Parse a merge range reference like "A1:C3" into 1-based (min_row, min_col, max_row, max_col).
pub fn parse_merge_ref(r: &str) -> Option<(usize, usize, usize, usize)> {
    let (start, end) = r.split_once(':')?;
    let (sr, sc) = parse_cell_ref(start)?;
    let (er, ec) = parse_cell_ref(end)?;
    Some((sr, sc, er, ec))
}

/// Parse a cell reference like "B5" into 1-based (row, col) = (5, 2).
pub fn parse_cell_ref(r: &str) -> Option<(usize, usize)> {
    let r = r.trim().replace('$', "");
    let split = r.find(|c: char| c.is_ascii_digit())?;
    let (letters, digits) = r.split_at(split);
    if letters.is_empty() || !letters.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }

    let mut col: usize = 0;
    for ch in letters.chars() {
        col = col * 26 + (ch.to_ascii_uppercase() as usize - 'A' as usize + 1);
    }
    let row: usize = digits.parse().ok()?;
    if row == 0 {
        return None;
    }
    Some((row, col))
}

// =============================================================================
// Top-level entry point
// =============================================================================

/// Parse all formatting data from an XLSX file.
/// Returns (style_table, per_sheet_formatting, stats).
/// `sheet_names` must match the order of sheets in the workbook.
pub fn parse_xlsx_formatting(
    path: &Path,
    sheet_names: &[String],
) -> Result<(StyleTable, Vec<SheetFormatting>, StyleImportStats), String> {
    let file = std::fs::File::open(path)
        .map_err(|e| format!("Failed to open XLSX file for styles: {}", e))?;
    let mut archive = ZipArchive::new(file)
        .map_err(|e| format!("Failed to read XLSX as ZIP for styles: {}", e))?;

    let mut stats = StyleImportStats::default();

    let style_table = match read_zip_file(&mut archive, "xl/styles.xml") {
        Ok(xml) => {
            let (table, unsupported) = parse_styles_xml(&xml);
            stats.unsupported_features = unsupported;
            table
        }
        Err(_) => StyleTable { styles: Vec::new() },
    };
    stats.unique_styles = style_table.len();

    let workbook_xml = read_zip_file(&mut archive, "xl/workbook.xml").unwrap_or_default();
    let rels_xml = read_zip_file(&mut archive, "xl/_rels/workbook.xml.rels").unwrap_or_default();
    let worksheet_paths = resolve_worksheet_paths_for_sheets(&workbook_xml, &rels_xml, sheet_names);

    let mut sheet_formats = Vec::with_capacity(sheet_names.len());
    for ws_path in &worksheet_paths {
        let formatting = match read_zip_file(&mut archive, ws_path) {
            Ok(xml) => parse_sheet_formatting(&xml),
            Err(_) => SheetFormatting::default(),
        };
        stats.styles_referenced += formatting.cell_styles.len();
        sheet_formats.push(formatting);
    }
    while sheet_formats.len() < sheet_names.len() {
        sheet_formats.push(SheetFormatting::default());
    }

    Ok((style_table, sheet_formats, stats))
}

// =============================================================================
// Helpers
// =============================================================================

/// Read a file from a ZIP archive.
fn read_zip_file<R: Read + Seek>(archive: &mut ZipArchive<R>, path: &str) -> Result<String, String> {
    let mut file = archive
        .by_name(path)
        .map_err(|e| format!("File '{}' not found in XLSX: {}", path, e))?;
    let mut content = String::new();
    file.read_to_string(&mut content)
        .map_err(|e| format!("Failed to read '{}': {}", path, e))?;
    Ok(content)
}

/// Resolve worksheet XML paths for specific sheet names (in order).
fn resolve_worksheet_paths_for_sheets(workbook_xml: &str, rels_xml: &str, sheet_names: &[String]) -> Vec<String> {
    let mut name_to_rid: HashMap<String, String> = HashMap::new();
    let mut reader = Reader::from_str(workbook_xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e)) if e.name().as_ref() == b"sheet" => {
                if let (Some(name), Some(rid)) = (attr_string(e, b"name"), attr_string(e, b"r:id")) {
                    name_to_rid.insert(unescape_xml(&name), rid);
                }
            }
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    let mut rid_to_target: HashMap<String, String> = HashMap::new();
    let mut reader = Reader::from_str(rels_xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e)) if e.name().as_ref() == b"Relationship" => {
                if let (Some(id), Some(target)) = (attr_string(e, b"Id"), attr_string(e, b"Target")) {
                    rid_to_target.insert(id, target);
                }
            }
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    sheet_names
        .iter()
        .map(|name| {
            name_to_rid
                .get(name)
                .and_then(|rid| rid_to_target.get(rid))
                .map(|target| match target.strip_prefix('/') {
                    Some(absolute) => absolute.to_string(),
                    None => format!("xl/{}", target),
                })
                .unwrap_or_default()
        })
        .collect()
}

// =============================================================================
// Tests
// =============================================================================
