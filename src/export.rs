//! Shopping-list export as a minimal PDF document.
//!
//! The layout is computed first as a list of pages holding text runs and
//! horizontal rules, then serialized with the standard Helvetica-Bold font.

use std::io::Write;

use crate::database::schema::ShoppingListItem;

pub const FILENAME: &str = "shopping_list.pdf";

const PAGE_WIDTH: i32 = 595;
const PAGE_HEIGHT: i32 = 842;

const TITLE: &str = "Shopping list";
const TITLE_SIZE: i32 = 24;
const CONTINUED: &str = "Shopping list (continued)";
const BODY_SIZE: i32 = 14;

const RULE_FROM: i32 = 40;
const RULE_TO: i32 = 560;
const RULE_Y: i32 = 790;
const HEADER_Y: i32 = 800;

const LINE_X: i32 = 30;
const FIRST_LINE_Y: i32 = 700;
const LINE_STEP: i32 = 40;
const BOTTOM_MARGIN: i32 = 70;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mark {
    Text {
        x: i32,
        y: i32,
        size: i32,
        text: String,
    },
    Rule {
        from: i32,
        to: i32,
        y: i32,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentPage {
    pub marks: Vec<Mark>,
}

impl DocumentPage {
    fn with_header(x: i32, size: i32, text: &str) -> Self {
        Self {
            marks: vec![
                Mark::Text {
                    x,
                    y: HEADER_Y,
                    size,
                    text: text.to_owned(),
                },
                Mark::Rule {
                    from: RULE_FROM,
                    to: RULE_TO,
                    y: RULE_Y,
                },
            ],
        }
    }

    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.marks.iter().filter_map(|mark| match mark {
            Mark::Text { size, text, y, .. } if *size == BODY_SIZE && *y < RULE_Y => {
                Some(text.as_str())
            }
            _ => None,
        })
    }
}

pub fn line_text(item: &ShoppingListItem) -> String {
    format!("{},  {} {}", item.name, item.amount, item.measurement_unit)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShoppingListDocument {
    pages: Vec<DocumentPage>,
}

impl ShoppingListDocument {
    pub fn layout(items: &[ShoppingListItem]) -> Self {
        let mut pages = vec![DocumentPage::with_header(70, TITLE_SIZE, TITLE)];
        let mut y = FIRST_LINE_Y;

        for item in items {
            if y < BOTTOM_MARGIN {
                pages.push(DocumentPage::with_header(50, BODY_SIZE, CONTINUED));
                y = FIRST_LINE_Y;
            }
            if let Some(page) = pages.last_mut() {
                page.marks.push(Mark::Text {
                    x: LINE_X,
                    y,
                    size: BODY_SIZE,
                    text: line_text(item),
                });
            }
            y -= LINE_STEP;
        }

        Self { pages }
    }

    pub fn pages(&self) -> &[DocumentPage] {
        &self.pages
    }

    pub fn to_pdf(&self) -> Vec<u8> {
        let mut objects: Vec<Vec<u8>> = vec![];

        let page_count = self.pages.len();
        let kids: Vec<String> = (0..page_count)
            .map(|i| format!("{} 0 R", 4 + i * 2))
            .collect();

        objects.push(b"<< /Type /Catalog /Pages 2 0 R >>".to_vec());
        objects.push(
            format!(
                "<< /Type /Pages /Kids [{}] /Count {page_count} >>",
                kids.join(" ")
            )
            .into_bytes(),
        );
        objects.push(
            b"<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica-Bold /Encoding /WinAnsiEncoding >>"
                .to_vec(),
        );

        for (i, page) in self.pages.iter().enumerate() {
            let content_id = 5 + i * 2;
            objects.push(
                format!(
                    "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {PAGE_WIDTH} {PAGE_HEIGHT}] \
                     /Resources << /Font << /F1 3 0 R >> >> /Contents {content_id} 0 R >>"
                )
                .into_bytes(),
            );

            let stream = content_stream(page);
            let mut object = format!("<< /Length {} >>\nstream\n", stream.len()).into_bytes();
            object.extend_from_slice(&stream);
            object.extend_from_slice(b"\nendstream");
            objects.push(object);
        }

        let mut out: Vec<u8> = b"%PDF-1.4\n".to_vec();
        let mut offsets = Vec::with_capacity(objects.len());
        for (i, object) in objects.iter().enumerate() {
            offsets.push(out.len());
            out.extend_from_slice(format!("{} 0 obj\n", i + 1).as_bytes());
            out.extend_from_slice(object);
            out.extend_from_slice(b"\nendobj\n");
        }

        let xref = out.len();
        out.extend_from_slice(format!("xref\n0 {}\n", objects.len() + 1).as_bytes());
        out.extend_from_slice(b"0000000000 65535 f \n");
        for offset in offsets {
            out.extend_from_slice(format!("{offset:010} 00000 n \n").as_bytes());
        }
        out.extend_from_slice(
            format!(
                "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{xref}\n%%EOF\n",
                objects.len() + 1
            )
            .as_bytes(),
        );

        out
    }
}

/// WinAnsi bytes for a PDF string literal; unmappable characters become `?`.
fn encode_text(text: &str) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(text.len());
    for c in text.chars() {
        let code = c as u32;
        match c {
            '(' | ')' | '\\' => {
                bytes.push(b'\\');
                bytes.push(code as u8);
            }
            _ if (0x20..0x7F).contains(&code) || (0xA0..=0xFF).contains(&code) => {
                bytes.push(code as u8)
            }
            _ => bytes.push(b'?'),
        }
    }
    bytes
}

fn content_stream(page: &DocumentPage) -> Vec<u8> {
    let mut stream = vec![];
    for mark in &page.marks {
        // writes into a Vec cannot fail
        let _ = match mark {
            Mark::Text { x, y, size, text } => {
                let _ = write!(stream, "BT /F1 {size} Tf {x} {y} Td (");
                stream.extend_from_slice(&encode_text(text));
                writeln!(stream, ") Tj ET")
            }
            Mark::Rule { from, to, y } => writeln!(stream, "{from} {y} m {to} {y} l S"),
        };
    }
    stream
}

pub fn render_shopping_list(items: &[ShoppingListItem]) -> Vec<u8> {
    ShoppingListDocument::layout(items).to_pdf()
}
