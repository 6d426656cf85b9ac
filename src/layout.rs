use crate::dataset::Preview;
use crate::dispatch::SlotResult;
use crate::graph::ChartHandle;
use std::fmt::Write;

/// What goes into one placement region
#[derive(Clone, Copy, Debug)]
pub enum SlotContent<'a> {
    Chart(&'a ChartHandle),
    Message(&'a str),
}

/// Grid container the dashboard writes slots into
pub trait LayoutSurface {
    /// Opens a row of `width` equal columns
    fn begin_row(&mut self, width: usize);

    /// Fills the next region of the open row
    fn place(&mut self, heading: &str, content: SlotContent<'_>);

    fn end_row(&mut self);
}

/// Writes slot results row by row, following their recorded positions
pub fn place_slots<S: LayoutSurface + ?Sized>(surface: &mut S, slots: &[SlotResult]) {
    let mut open_row: Option<usize> = None;

    for slot in slots {
        if open_row != Some(slot.position.row) {
            if open_row.is_some() {
                surface.end_row();
            }
            surface.begin_row(slot.position.row_width);
            open_row = Some(slot.position.row);
        }

        match (slot.chart(), slot.message()) {
            (Some(chart), _) => surface.place(&slot.heading, SlotContent::Chart(chart)),
            (None, Some(message)) => surface.place(&slot.heading, SlotContent::Message(&message)),
            (None, None) => {}
        }
    }

    if open_row.is_some() {
        surface.end_row();
    }
}

const PAGE_STYLE: &str = "body{font-family:sans-serif;margin:0 2rem;max-width:none}\
table{border-collapse:collapse;font-size:0.9rem}\
th,td{border:1px solid #ddd;padding:4px 8px;text-align:right}\
th{background:#f4f4f4}\
.row{display:grid;gap:1.5rem;margin-bottom:1.5rem}\
.slot svg{max-width:100%;height:auto}\
.message{color:#555;font-style:italic}\
.notice{border:1px solid #c33;background:#fee;padding:1rem}";

/// Wide single-page HTML dashboard
pub struct HtmlSurface {
    title: String,
    body: String,
}

impl HtmlSurface {
    pub fn new(title: impl Into<String>) -> Self {
        HtmlSurface {
            title: title.into(),
            body: String::new(),
        }
    }

    /// Dataset overview: size line plus a table of the first rows
    pub fn overview(&mut self, preview: &Preview, total_rows: usize) {
        let _ = write!(
            self.body,
            "<h3>Dataset Overview</h3><p>{} rows &times; {} columns</p>\
             <div class=\"preview\"><table><thead><tr>",
            total_rows,
            preview.columns.len()
        );
        for name in &preview.columns {
            let _ = write!(self.body, "<th>{}</th>", escape(name));
        }
        self.body.push_str("</tr></thead><tbody>");
        for row in &preview.rows {
            self.body.push_str("<tr>");
            for value in row {
                let _ = write!(self.body, "<td>{}</td>", escape(&value.to_string()));
            }
            self.body.push_str("</tr>");
        }
        self.body.push_str("</tbody></table></div>");
    }

    /// Error notice in place of dashboard content
    pub fn notice(&mut self, heading: &str, message: &str) {
        let _ = write!(
            self.body,
            "<div class=\"notice\"><h3>{}</h3><p>{}</p></div>",
            escape(heading),
            escape(message)
        );
    }

    pub fn finish(self) -> String {
        format!(
            "<!DOCTYPE html><html><head><meta charset=\"utf-8\">\
             <title>{}</title><style>{}</style></head>\
             <body><h1>{}</h1>{}</body></html>",
            escape(&self.title),
            PAGE_STYLE,
            escape(&self.title),
            self.body
        )
    }
}

impl LayoutSurface for HtmlSurface {
    fn begin_row(&mut self, width: usize) {
        let _ = write!(
            self.body,
            "<div class=\"row\" style=\"grid-template-columns:repeat({},1fr)\">",
            width.max(1)
        );
    }

    fn place(&mut self, heading: &str, content: SlotContent<'_>) {
        let _ = write!(self.body, "<div class=\"slot\"><h3>{}</h3>", escape(heading));
        match content {
            SlotContent::Chart(chart) => self.body.push_str(strip_xml_declaration(&chart.svg)),
            SlotContent::Message(message) => {
                let _ = write!(self.body, "<p class=\"message\">{}</p>", escape(message));
            }
        }
        self.body.push_str("</div>");
    }

    fn end_row(&mut self) {
        self.body.push_str("</div>");
    }
}

// Inline SVG must not carry its own XML prolog
fn strip_xml_declaration(svg: &str) -> &str {
    let trimmed = svg.trim_start();
    if trimmed.starts_with("<?xml") {
        if let Some(end) = trimmed.find("?>") {
            return trimmed[end + 2..].trim_start();
        }
    }
    trimmed
}

pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::SlotOutcome;
    use crate::registry::SlotPosition;

    #[derive(Default)]
    struct Recorder {
        events: Vec<String>,
    }

    impl LayoutSurface for Recorder {
        fn begin_row(&mut self, width: usize) {
            self.events.push(format!("row({})", width));
        }
        fn place(&mut self, heading: &str, content: SlotContent<'_>) {
            let kind = match content {
                SlotContent::Chart(_) => "chart",
                SlotContent::Message(_) => "message",
            };
            self.events.push(format!("{}:{}", heading, kind));
        }
        fn end_row(&mut self) {
            self.events.push("end".to_string());
        }
    }

    fn missing(row: usize, column: usize, heading: &str) -> SlotResult {
        SlotResult {
            spec_id: heading.to_string(),
            heading: heading.to_string(),
            position: SlotPosition { row, column, row_width: 2 },
            outcome: SlotOutcome::MissingColumns {
                missing: vec!["x".to_string()],
                message: "gone".to_string(),
            },
        }
    }

    #[test]
    fn slots_are_grouped_into_rows() {
        let slots = vec![missing(0, 0, "a"), missing(0, 1, "b"), missing(1, 0, "c")];
        let mut recorder = Recorder::default();
        place_slots(&mut recorder, &slots);
        assert_eq!(
            recorder.events,
            vec!["row(2)", "a:message", "b:message", "end", "row(2)", "c:message", "end"]
        );
    }

    #[test]
    fn html_escapes_user_text() {
        let mut surface = HtmlSurface::new("Dash");
        surface.notice("Load failed", "<missing> & gone");
        let html = surface.finish();
        assert!(html.contains("&lt;missing&gt; &amp; gone"));
    }

    #[test]
    fn xml_prolog_is_dropped() {
        assert_eq!(strip_xml_declaration("<?xml version=\"1.0\"?>\n<svg/>"), "<svg/>");
        assert_eq!(strip_xml_declaration("<svg/>"), "<svg/>");
    }
}
