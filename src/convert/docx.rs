//! DOCX package reading and WordprocessingML to HTML rendering.

use std::collections::HashMap;
use std::io::{Cursor, Read};

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use zip::ZipArchive;
use zip::result::ZipError;

use crate::convert::ConversionError;

const DOCUMENT_PART: &str = "word/document.xml";
const NUMBERING_PART: &str = "word/numbering.xml";
const RELS_PART: &str = "word/_rels/document.xml.rels";

/// Upper bound on the expanded size of any single XML part.
pub const MAX_PART_BYTES: u64 = 16 * 1024 * 1024;

/// Deepest list level Word produces (`ilvl` 0 through 8).
const MAX_LIST_LEVEL: u32 = 8;

/// Renders the body of a DOCX package as semantic HTML.
pub fn docx_to_html(bytes: &[u8]) -> Result<String, ConversionError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;

    let document = read_part(&mut archive, DOCUMENT_PART)?
        .ok_or(ConversionError::MissingPart(DOCUMENT_PART))?;
    let numbering = match read_part(&mut archive, NUMBERING_PART)? {
        Some(xml) => Numbering::parse(&xml)?,
        None => Numbering::default(),
    };
    let links = match read_part(&mut archive, RELS_PART)? {
        Some(xml) => parse_relationships(&xml)?,
        None => HashMap::new(),
    };

    let blocks = BodyParser::new(&links).parse(&document)?;
    Ok(render_html(&blocks, &numbering))
}

fn read_part(
    archive: &mut ZipArchive<Cursor<&[u8]>>,
    name: &'static str,
) -> Result<Option<String>, ConversionError> {
    let mut file = match archive.by_name(name) {
        Ok(file) => file,
        Err(ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    if file.size() > MAX_PART_BYTES {
        return Err(ConversionError::TooLarge {
            part: name,
            limit: MAX_PART_BYTES,
        });
    }
    // `size()` comes from the entry header; bound the read too.
    let mut xml = String::new();
    file.by_ref()
        .take(MAX_PART_BYTES + 1)
        .read_to_string(&mut xml)
        .map_err(|source| ConversionError::Io { part: name, source })?;
    if xml.len() as u64 > MAX_PART_BYTES {
        return Err(ConversionError::TooLarge {
            part: name,
            limit: MAX_PART_BYTES,
        });
    }
    Ok(Some(xml))
}

fn xml_error(part: &'static str) -> impl Fn(quick_xml::Error) -> ConversionError {
    move |e| ConversionError::Xml {
        part,
        message: e.to_string(),
    }
}

/// Value of the attribute with the given local name (`w:val` -> `val`).
fn attr(e: &BytesStart, name: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.local_name().as_ref() == name)
        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
}

/// `w:b`, `w:i` and friends are on unless `w:val` says otherwise.
fn toggle(e: &BytesStart) -> bool {
    !matches!(attr(e, b"val").as_deref(), Some("0" | "false" | "off" | "none"))
}

fn parse_relationships(xml: &str) -> Result<HashMap<String, String>, ConversionError> {
    let mut reader = Reader::from_str(xml);
    let mut links = HashMap::new();
    loop {
        match reader.read_event().map_err(xml_error(RELS_PART))? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"Relationship" => {
                if let (Some(id), Some(target)) = (attr(&e, b"Id"), attr(&e, b"Target")) {
                    links.insert(id, target);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(links)
}

/// List formats from `numbering.xml`, keyed by `numId` then `ilvl`.
#[derive(Debug, Default)]
struct Numbering {
    abstract_formats: HashMap<String, HashMap<u32, String>>,
    nums: HashMap<String, String>,
}

impl Numbering {
    fn parse(xml: &str) -> Result<Self, ConversionError> {
        let mut reader = Reader::from_str(xml);
        let mut numbering = Numbering::default();
        let mut abstract_id: Option<String> = None;
        let mut level: Option<u32> = None;
        let mut num_id: Option<String> = None;

        loop {
            match reader.read_event().map_err(xml_error(NUMBERING_PART))? {
                Event::Start(e) => match e.local_name().as_ref() {
                    b"abstractNum" => abstract_id = attr(&e, b"abstractNumId"),
                    b"lvl" => {
                        level = attr(&e, b"ilvl")
                            .and_then(|v| v.parse::<u32>().ok())
                            .map(|l| l.min(MAX_LIST_LEVEL))
                    }
                    b"num" => num_id = attr(&e, b"numId"),
                    _ => {}
                },
                Event::Empty(e) => match e.local_name().as_ref() {
                    b"numFmt" => {
                        if let (Some(id), Some(lvl), Some(fmt)) =
                            (&abstract_id, level, attr(&e, b"val"))
                        {
                            numbering
                                .abstract_formats
                                .entry(id.clone())
                                .or_default()
                                .insert(lvl, fmt);
                        }
                    }
                    b"abstractNumId" => {
                        if let (Some(num), Some(target)) = (&num_id, attr(&e, b"val")) {
                            numbering.nums.insert(num.clone(), target);
                        }
                    }
                    _ => {}
                },
                Event::End(e) => match e.local_name().as_ref() {
                    b"abstractNum" => abstract_id = None,
                    b"lvl" => level = None,
                    b"num" => num_id = None,
                    _ => {}
                },
                Event::Eof => break,
                _ => {}
            }
        }
        Ok(numbering)
    }

    /// Unknown lists render as bullets.
    fn is_ordered(&self, num_id: &str, level: u32) -> bool {
        self.nums
            .get(num_id)
            .and_then(|abstract_id| self.abstract_formats.get(abstract_id))
            .and_then(|levels| levels.get(&level))
            .is_some_and(|fmt| fmt != "bullet" && fmt != "none")
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Inline {
    Text {
        text: String,
        bold: bool,
        italic: bool,
        link: Option<String>,
    },
    Break,
}

#[derive(Debug, Default)]
struct Paragraph {
    style: Option<String>,
    num_id: Option<String>,
    level: u32,
    inlines: Vec<Inline>,
}

impl Paragraph {
    fn has_text(&self) -> bool {
        self.inlines.iter().any(|i| match i {
            Inline::Text { text, .. } => !text.trim().is_empty(),
            Inline::Break => false,
        })
    }

    fn push_text(&mut self, text: &str, bold: bool, italic: bool, link: Option<&String>) {
        if let Some(Inline::Text {
            text: last,
            bold: b,
            italic: i,
            link: l,
        }) = self.inlines.last_mut()
            && *b == bold
            && *i == italic
            && l.as_ref() == link
        {
            last.push_str(text);
            return;
        }
        self.inlines.push(Inline::Text {
            text: text.to_string(),
            bold,
            italic,
            link: link.cloned(),
        });
    }

    /// `(numId, ilvl)` when the paragraph is a list item.
    fn list_item(&self) -> Option<(&str, u32)> {
        self.num_id
            .as_deref()
            .filter(|id| *id != "0")
            .map(|id| (id, self.level))
    }
}

type Cell = Vec<Paragraph>;
type Row = Vec<Cell>;

#[derive(Debug)]
enum Block {
    Paragraph(Paragraph),
    Table(Vec<Row>),
}

/// Streaming walk over `document.xml` that collects paragraphs and tables.
struct BodyParser<'a> {
    links: &'a HashMap<String, String>,
    blocks: Vec<Block>,
    tables: Vec<Vec<Row>>,
    paragraph: Option<Paragraph>,
    in_paragraph_props: bool,
    in_run_props: bool,
    in_text: bool,
    deleted: usize,
    bold: bool,
    italic: bool,
    link: Option<String>,
}

impl<'a> BodyParser<'a> {
    fn new(links: &'a HashMap<String, String>) -> Self {
        Self {
            links,
            blocks: Vec::new(),
            tables: Vec::new(),
            paragraph: None,
            in_paragraph_props: false,
            in_run_props: false,
            in_text: false,
            deleted: 0,
            bold: false,
            italic: false,
            link: None,
        }
    }

    fn parse(mut self, xml: &str) -> Result<Vec<Block>, ConversionError> {
        let mut reader = Reader::from_str(xml);
        loop {
            match reader.read_event().map_err(xml_error(DOCUMENT_PART))? {
                Event::Start(e) => self.open(&e, false),
                Event::Empty(e) => self.open(&e, true),
                Event::End(e) => self.close(e.local_name().as_ref()),
                Event::Text(t) if self.in_text && self.deleted == 0 => {
                    let text = t.unescape().map_err(xml_error(DOCUMENT_PART))?;
                    self.text(&text);
                }
                Event::CData(t) if self.in_text && self.deleted == 0 => {
                    let text = String::from_utf8_lossy(&t).into_owned();
                    self.text(&text);
                }
                Event::Eof => break,
                _ => {}
            }
        }
        Ok(self.blocks)
    }

    fn open(&mut self, e: &BytesStart, empty: bool) {
        let name = e.local_name();
        match name.as_ref() {
            b"del" | b"moveFrom" if !empty => self.deleted += 1,
            _ if self.deleted > 0 => {}
            b"tbl" if !empty => self.tables.push(Vec::new()),
            b"tr" if !empty => {
                if let Some(table) = self.tables.last_mut() {
                    table.push(Vec::new());
                }
            }
            b"tc" if !empty => {
                if let Some(row) = self.tables.last_mut().and_then(|t| t.last_mut()) {
                    row.push(Vec::new());
                }
            }
            b"p" if !empty => self.paragraph = Some(Paragraph::default()),
            b"pPr" if !empty => self.in_paragraph_props = true,
            b"rPr" if !empty => self.in_run_props = true,
            b"r" => {
                self.bold = false;
                self.italic = false;
            }
            b"t" if !empty => self.in_text = true,
            b"pStyle" if self.in_paragraph_props => {
                if let Some(p) = self.paragraph.as_mut() {
                    p.style = attr(e, b"val");
                }
            }
            b"numId" if self.in_paragraph_props => {
                if let Some(p) = self.paragraph.as_mut() {
                    p.num_id = attr(e, b"val");
                }
            }
            b"ilvl" if self.in_paragraph_props => {
                if let Some(p) = self.paragraph.as_mut() {
                    p.level = attr(e, b"val")
                        .and_then(|v| v.parse::<u32>().ok())
                        .map_or(0, |level| level.min(MAX_LIST_LEVEL));
                }
            }
            b"b" if self.in_run_props && !self.in_paragraph_props => self.bold = toggle(e),
            b"i" if self.in_run_props && !self.in_paragraph_props => self.italic = toggle(e),
            b"hyperlink" if !empty => {
                self.link = attr(e, b"id")
                    .and_then(|id| self.links.get(&id).cloned())
                    .or_else(|| attr(e, b"anchor").map(|anchor| format!("#{}", anchor)));
            }
            b"br" | b"cr" if !self.in_paragraph_props => {
                if attr(e, b"type").as_deref() != Some("page")
                    && let Some(p) = self.paragraph.as_mut()
                {
                    p.inlines.push(Inline::Break);
                }
            }
            b"tab" if !self.in_paragraph_props => self.text(" "),
            _ => {}
        }
    }

    fn close(&mut self, name: &[u8]) {
        match name {
            b"del" | b"moveFrom" => self.deleted = self.deleted.saturating_sub(1),
            _ if self.deleted > 0 => {}
            b"t" => self.in_text = false,
            b"pPr" => self.in_paragraph_props = false,
            b"rPr" => self.in_run_props = false,
            b"hyperlink" => self.link = None,
            b"p" => {
                if let Some(paragraph) = self.paragraph.take() {
                    self.finish_paragraph(paragraph);
                }
            }
            b"tbl" => {
                if let Some(table) = self.tables.pop() {
                    self.finish_table(table);
                }
            }
            _ => {}
        }
    }

    fn text(&mut self, text: &str) {
        let (bold, italic) = (self.bold, self.italic);
        if let Some(p) = self.paragraph.as_mut() {
            p.push_text(text, bold, italic, self.link.as_ref());
        }
    }

    fn current_cell(&mut self) -> Option<&mut Cell> {
        self.tables
            .last_mut()
            .and_then(|t| t.last_mut())
            .and_then(|r| r.last_mut())
    }

    fn finish_paragraph(&mut self, paragraph: Paragraph) {
        if !paragraph.has_text() {
            return;
        }
        if self.tables.is_empty() {
            self.blocks.push(Block::Paragraph(paragraph));
        } else if let Some(cell) = self.current_cell() {
            cell.push(paragraph);
        }
    }

    /// Nested tables are flattened into the enclosing cell.
    fn finish_table(&mut self, table: Vec<Row>) {
        if table.iter().all(|row| row.iter().all(Vec::is_empty)) {
            return;
        }
        if self.tables.is_empty() {
            self.blocks.push(Block::Table(table));
        } else if let Some(cell) = self.current_cell() {
            cell.extend(table.into_iter().flatten().flatten());
        }
    }
}

fn heading_tag(style: Option<&str>) -> &'static str {
    let Some(style) = style else { return "p" };
    let normalized: String = style
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_ascii_lowercase();
    match normalized.as_str() {
        "title" | "heading1" => "h1",
        "subtitle" | "heading2" => "h2",
        "heading3" => "h3",
        "heading4" => "h4",
        "heading5" => "h5",
        "heading6" => "h6",
        _ => "p",
    }
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

fn render_inlines(inlines: &[Inline], out: &mut String) {
    let mut open_link: Option<&str> = None;
    for inline in inlines {
        let link = match inline {
            Inline::Text { link, .. } => link.as_deref(),
            Inline::Break => None,
        };
        if link != open_link {
            if open_link.is_some() {
                out.push_str("</a>");
            }
            if let Some(href) = link {
                out.push_str(&format!("<a href=\"{}\">", escape(href)));
            }
            open_link = link;
        }

        match inline {
            Inline::Text {
                text, bold, italic, ..
            } => {
                let mut html = escape(text);
                if *italic {
                    html = format!("<em>{}</em>", html);
                }
                if *bold {
                    html = format!("<strong>{}</strong>", html);
                }
                out.push_str(&html);
            }
            Inline::Break => out.push_str("<br />"),
        }
    }
    if open_link.is_some() {
        out.push_str("</a>");
    }
}

struct OpenList {
    ordered: bool,
    item_open: bool,
}

/// Emits nested `ul`/`ol` markup from a flat sequence of numbered paragraphs.
#[derive(Default)]
struct ListWriter {
    open: Vec<OpenList>,
}

impl ListWriter {
    fn item(&mut self, level: u32, ordered: bool, out: &mut String) {
        let depth = level as usize + 1;
        while self.open.len() > depth {
            self.close_one(out);
        }
        if self.open.len() == depth && self.open.last().is_some_and(|l| l.ordered != ordered) {
            self.close_one(out);
        }
        if self.open.len() == depth
            && let Some(list) = self.open.last_mut()
            && list.item_open
        {
            out.push_str("</li>");
            list.item_open = false;
        }
        while self.open.len() < depth {
            if let Some(parent) = self.open.last_mut()
                && !parent.item_open
            {
                out.push_str("<li>");
                parent.item_open = true;
            }
            out.push_str(if ordered { "<ol>" } else { "<ul>" });
            self.open.push(OpenList {
                ordered,
                item_open: false,
            });
        }
        out.push_str("<li>");
        if let Some(list) = self.open.last_mut() {
            list.item_open = true;
        }
    }

    fn close_one(&mut self, out: &mut String) {
        if let Some(list) = self.open.pop() {
            if list.item_open {
                out.push_str("</li>");
            }
            out.push_str(if list.ordered { "</ol>" } else { "</ul>" });
        }
    }

    fn close_all(&mut self, out: &mut String) {
        while !self.open.is_empty() {
            self.close_one(out);
        }
    }
}

fn render_html(blocks: &[Block], numbering: &Numbering) -> String {
    let mut out = String::new();
    let mut lists = ListWriter::default();

    for block in blocks {
        match block {
            Block::Paragraph(p) => match p.list_item() {
                Some((num_id, level)) => {
                    lists.item(level, numbering.is_ordered(num_id, level), &mut out);
                    render_inlines(&p.inlines, &mut out);
                }
                None => {
                    lists.close_all(&mut out);
                    let tag = heading_tag(p.style.as_deref());
                    out.push_str(&format!("<{}>", tag));
                    render_inlines(&p.inlines, &mut out);
                    out.push_str(&format!("</{}>", tag));
                }
            },
            Block::Table(rows) => {
                lists.close_all(&mut out);
                out.push_str("<table>");
                for row in rows {
                    out.push_str("<tr>");
                    for cell in row {
                        out.push_str("<td>");
                        for p in cell {
                            out.push_str("<p>");
                            render_inlines(&p.inlines, &mut out);
                            out.push_str("</p>");
                        }
                        out.push_str("</td>");
                    }
                    out.push_str("</tr>");
                }
                out.push_str("</table>");
            }
        }
    }
    lists.close_all(&mut out);
    out
}
