//! Minimal SVG document builder.

use std::fmt::Write;

/// Escape text for use in SVG character data and attribute values.
///
/// # Examples
///
/// ```
/// use devpulse_render::svg::escape;
///
/// assert_eq!(escape("a<b & \"c\""), "a&lt;b &amp; &quot;c&quot;");
/// ```
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

/// Text anchor for [`SvgDocument::text`].
#[derive(Debug, Clone, Copy)]
pub enum Anchor {
    Start,
    Middle,
    End,
}

impl Anchor {
    fn as_str(self) -> &'static str {
        match self {
            Anchor::Start => "start",
            Anchor::Middle => "middle",
            Anchor::End => "end",
        }
    }
}

/// An SVG document assembled element by element.
///
/// Coordinates are written with one decimal so output is stable across
/// platforms.
pub struct SvgDocument {
    width: u32,
    height: u32,
    defs: String,
    body: String,
}

impl SvgDocument {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            defs: String::new(),
            body: String::new(),
        }
    }

    /// Add raw markup to the `<defs>` section.
    pub fn def(&mut self, markup: &str) {
        self.defs.push_str(markup);
        self.defs.push('\n');
    }

    pub fn rect(&mut self, x: f64, y: f64, width: f64, height: f64, fill: &str) {
        let _ = writeln!(
            self.body,
            r#"<rect x="{x:.1}" y="{y:.1}" width="{width:.1}" height="{height:.1}" fill="{fill}"/>"#
        );
    }

    pub fn line(&mut self, from: (f64, f64), to: (f64, f64), stroke: &str, extra: &str) {
        let _ = writeln!(
            self.body,
            r#"<line x1="{:.1}" y1="{:.1}" x2="{:.1}" y2="{:.1}" stroke="{stroke}"{extra}/>"#,
            from.0, from.1, to.0, to.1
        );
    }

    pub fn circle(&mut self, cx: f64, cy: f64, r: f64, fill: &str) {
        let _ = writeln!(
            self.body,
            r##"<circle cx="{cx:.1}" cy="{cy:.1}" r="{r:.1}" fill="{fill}" stroke="#4682b4"/>"##
        );
    }

    /// Add a text element; `content` is escaped.
    pub fn text(&mut self, x: f64, y: f64, size: u32, anchor: Anchor, content: &str) {
        let _ = writeln!(
            self.body,
            r#"<text x="{x:.1}" y="{y:.1}" font-size="{size}" text-anchor="{}">{}</text>"#,
            anchor.as_str(),
            escape(content)
        );
    }

    /// Add rotated text, used for vertical axis labels.
    pub fn rotated_text(&mut self, x: f64, y: f64, size: u32, degrees: i32, content: &str) {
        let _ = writeln!(
            self.body,
            r#"<text x="{x:.1}" y="{y:.1}" font-size="{size}" text-anchor="middle" transform="rotate({degrees} {x:.1} {y:.1})">{}</text>"#,
            escape(content)
        );
    }

    /// Serialize the document.
    pub fn finish(self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}" font-family="sans-serif">"#,
            w = self.width,
            h = self.height
        );
        if !self.defs.is_empty() {
            out.push_str("<defs>\n");
            out.push_str(&self.defs);
            out.push_str("</defs>\n");
        }
        let _ = writeln!(
            out,
            r#"<rect width="{}" height="{}" fill="white"/>"#,
            self.width, self.height
        );
        out.push_str(&self.body);
        out.push_str("</svg>\n");
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_is_well_formed() {
        let doc = SvgDocument::new(100, 50).finish();
        assert!(doc.starts_with("<svg "));
        assert!(doc.trim_end().ends_with("</svg>"));
        assert!(doc.contains(r#"viewBox="0 0 100 50""#));
        assert!(!doc.contains("<defs>"));
    }

    #[test]
    fn text_content_is_escaped() {
        let mut doc = SvgDocument::new(10, 10);
        doc.text(1.0, 2.0, 12, Anchor::Middle, "<script>");
        let out = doc.finish();
        assert!(out.contains("&lt;script&gt;"));
        assert!(!out.contains("<script>"));
    }

    #[test]
    fn coordinates_use_one_decimal() {
        let mut doc = SvgDocument::new(10, 10);
        doc.rect(1.0 / 3.0, 2.0, 3.0, 4.0, "red");
        assert!(doc.finish().contains(r#"x="0.3""#));
    }
}
