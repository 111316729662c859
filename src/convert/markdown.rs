//! HTML to Markdown flattening.

use scraper::{ElementRef, Html, node::Node};

/// Lists nested deeper than this are flattened into their parent item.
const MAX_LIST_DEPTH: usize = 9;

/// Converts an HTML fragment to Markdown.
pub fn html_to_markdown(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    let mut blocks = Vec::new();
    render_blocks(fragment.root_element(), &mut blocks);
    blocks.join("\n\n")
}

/// Renders the block-level children of `container`. Loose inline content
/// between blocks becomes its own paragraph.
fn render_blocks(container: ElementRef, blocks: &mut Vec<String>) {
    let mut loose = InlineWriter::default();

    for child in container.children() {
        let Some(element) = ElementRef::wrap(child) else {
            if let Node::Text(text) = child.value() {
                loose.text(text);
            }
            continue;
        };

        let name = element.value().name();
        if !is_block(name) {
            loose.element(element);
            continue;
        }

        push_block(blocks, std::mem::take(&mut loose).finish());
        match name {
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                let level = name[1..].parse::<usize>().unwrap_or(1);
                let text = single_line(&inline(element));
                if !text.is_empty() {
                    blocks.push(format!("{} {}", "#".repeat(level), text));
                }
            }
            "p" => push_block(blocks, inline(element)),
            "ul" | "ol" => {
                let mut lines = Vec::new();
                render_list(element, 0, &mut lines);
                push_block(blocks, lines.join("\n"));
            }
            "table" => push_block(blocks, render_table(element)),
            _ => render_blocks(element, blocks),
        }
    }
    push_block(blocks, loose.finish());
}

fn is_block(name: &str) -> bool {
    matches!(
        name,
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" | "p" | "ul" | "ol" | "table" | "div" | "body"
            | "html"
    )
}

fn push_block(blocks: &mut Vec<String>, block: String) {
    if !block.trim().is_empty() {
        blocks.push(block);
    }
}

fn render_list(list: ElementRef, depth: usize, lines: &mut Vec<String>) {
    let ordered = list.value().name() == "ol";
    let indent = "  ".repeat(depth);
    let mut number = 0;

    for child in list.children().filter_map(ElementRef::wrap) {
        match child.value().name() {
            "li" => {
                number += 1;
                let marker = if ordered {
                    format!("{}. ", number)
                } else {
                    "- ".to_string()
                };

                let mut text = InlineWriter::default();
                let mut nested = Vec::new();
                for part in child.children() {
                    match ElementRef::wrap(part) {
                        Some(el) if matches!(el.value().name(), "ul" | "ol") => {
                            if depth + 1 < MAX_LIST_DEPTH {
                                nested.push(el);
                            } else {
                                text.text(" ");
                                text.text(&el.text().collect::<Vec<_>>().join(" "));
                            }
                        }
                        Some(el) if el.value().name() == "p" => {
                            text.text(" ");
                            text.element(el);
                            text.text(" ");
                        }
                        Some(el) => text.element(el),
                        None => {
                            if let Node::Text(t) = part.value() {
                                text.text(t);
                            }
                        }
                    }
                }

                lines.push(format!("{}{}{}", indent, marker, single_line(&text.finish())));
                for list in nested {
                    render_list(list, depth + 1, lines);
                }
            }
            "ul" | "ol" if depth + 1 < MAX_LIST_DEPTH => render_list(child, depth + 1, lines),
            _ => {}
        }
    }
}

fn render_table(table: ElementRef) -> String {
    let rows: Vec<Vec<String>> = table
        .descendants()
        .filter_map(ElementRef::wrap)
        .filter(|el| el.value().name() == "tr")
        .map(|row| {
            row.children()
                .filter_map(ElementRef::wrap)
                .filter(|cell| matches!(cell.value().name(), "td" | "th"))
                .map(|cell| {
                    let mut writer = InlineWriter::default();
                    for part in cell.children() {
                        match ElementRef::wrap(part) {
                            Some(el) => {
                                writer.text(" ");
                                writer.element(el);
                                writer.text(" ");
                            }
                            None => {
                                if let Node::Text(t) = part.value() {
                                    writer.text(t);
                                }
                            }
                        }
                    }
                    single_line(&writer.finish()).replace('|', "\\|")
                })
                .collect()
        })
        .filter(|row: &Vec<String>| !row.is_empty())
        .collect();

    let columns = rows.iter().map(Vec::len).max().unwrap_or(0);
    if columns == 0 {
        return String::new();
    }

    let line = |cells: &[String]| {
        let mut padded: Vec<&str> = cells.iter().map(String::as_str).collect();
        padded.resize(columns, "");
        format!("| {} |", padded.join(" | "))
    };

    let mut out = vec![line(&rows[0]), format!("|{}", " --- |".repeat(columns))];
    out.extend(rows[1..].iter().map(|row| line(row)));
    out.join("\n")
}

fn inline(element: ElementRef) -> String {
    let mut writer = InlineWriter::default();
    writer.children(element);
    writer.finish()
}

fn single_line(text: &str) -> String {
    text.split("  \n")
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Accumulates inline Markdown with HTML whitespace collapsing.
#[derive(Default)]
struct InlineWriter {
    out: String,
}

impl InlineWriter {
    fn ends_with_space(&self) -> bool {
        self.out.is_empty() || self.out.ends_with(char::is_whitespace)
    }

    fn text(&mut self, text: &str) {
        for c in text.chars() {
            if c.is_whitespace() {
                if !self.ends_with_space() {
                    self.out.push(' ');
                }
            } else {
                if matches!(c, '*' | '_') {
                    self.out.push('\\');
                }
                self.out.push(c);
            }
        }
    }

    fn raw(&mut self, text: &str) {
        self.out.push_str(text);
    }

    fn line_break(&mut self) {
        let trimmed = self.out.trim_end_matches(' ').len();
        self.out.truncate(trimmed);
        if !self.out.is_empty() {
            self.out.push_str("  \n");
        }
    }

    fn children(&mut self, element: ElementRef) {
        for child in element.children() {
            match ElementRef::wrap(child) {
                Some(el) => self.element(el),
                None => {
                    if let Node::Text(text) = child.value() {
                        self.text(text);
                    }
                }
            }
        }
    }

    fn element(&mut self, element: ElementRef) {
        match element.value().name() {
            "strong" | "b" => self.wrapped(element, "**"),
            "em" | "i" => self.wrapped(element, "*"),
            "br" => self.line_break(),
            "a" => {
                let mut inner = InlineWriter::default();
                inner.children(element);
                let label = inner.finish();
                match element.value().attr("href").filter(|h| !h.is_empty()) {
                    Some(href) => {
                        let label = if label.is_empty() { href.to_string() } else { label };
                        self.raw(&format!("[{}]({})", label, href));
                    }
                    None => self.raw(&label),
                }
            }
            _ => self.children(element),
        }
    }

    /// Wraps the element's content in `marker`, keeping surrounding spaces
    /// outside the markers.
    fn wrapped(&mut self, element: ElementRef, marker: &str) {
        let mut inner = InlineWriter::default();
        inner.children(element);
        let content = inner.finish();
        if content.is_empty() {
            return;
        }
        if element.text().next().is_some_and(|t| t.starts_with(char::is_whitespace)) {
            self.text(" ");
        }
        self.raw(marker);
        self.raw(&content);
        self.raw(marker);
        if element.text().last().is_some_and(|t| t.ends_with(char::is_whitespace)) {
            self.text(" ");
        }
    }

    fn finish(self) -> String {
        escape_line_starts(self.out.trim())
    }
}

/// Escapes text that would otherwise open a heading, quote or list item.
fn escape_line_starts(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for (i, line) in text.split('\n').enumerate() {
        if i > 0 {
            out.push('\n');
        }
        let digits = line.len() - line.trim_start_matches(|c: char| c.is_ascii_digit()).len();
        match line.as_bytes().get(digits) {
            Some(b'#' | b'-' | b'+' | b'>') if digits == 0 => {
                out.push('\\');
                out.push_str(line);
            }
            Some(b'.' | b')')
                if digits > 0
                    && line[digits + 1..].chars().next().is_none_or(char::is_whitespace) =>
            {
                out.push_str(&line[..digits]);
                out.push('\\');
                out.push_str(&line[digits..]);
            }
            _ => out.push_str(line),
        }
    }
    out
}
