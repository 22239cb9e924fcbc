use serde::Serialize;
use tera::{Context, Tera};

use crate::error::Result;

/// One titled block of the report
#[derive(Debug, Clone, Serialize)]
pub struct Section {
    pub title: String,
    pub count: usize,
    /// Rendered table markup; empty when the bucket is empty
    pub table: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SkippedNote {
    pub row: usize,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Document {
    pub title: String,
    pub generated_at: String,
    pub rows_processed: usize,
    pub rows_skipped: usize,
    pub parse_errors: usize,
    pub skipped: Vec<SkippedNote>,
    pub sections: Vec<Section>,
}

pub struct DocumentRenderer {
    template_engine: Tera,
}

impl DocumentRenderer {
    pub fn new() -> Result<Self> {
        let mut template_engine = Tera::default();
        template_engine.add_raw_template("report.html", DEFAULT_HTML_TEMPLATE)?;
        Ok(Self { template_engine })
    }

    pub fn render(&self, document: &Document) -> Result<String> {
        let mut context = Context::new();
        context.insert("doc", document);
        Ok(self.template_engine.render("report.html", &context)?)
    }
}

const DEFAULT_HTML_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <title>{{ doc.title }}</title>
</head>
<body style="font-family:Arial,sans-serif;font-size:13px;color:#202020">
    <h1 style="font-size:18px">{{ doc.title }}</h1>
    <p>
        Generated {{ doc.generated_at }}.
        Rows processed: {{ doc.rows_processed }},
        skipped: {{ doc.rows_skipped }},
        unparseable timestamps: {{ doc.parse_errors }}.
    </p>
    <ul>
    {% for section in doc.sections %}
        <li>{{ section.title }}: {{ section.count }}</li>
    {% endfor %}
    </ul>
    {% for section in doc.sections %}
    <h2 style="font-size:15px">{{ section.title }} ({{ section.count }})</h2>
    {% if section.count > 0 %}
    {{ section.table | safe }}
    {% else %}
    <p style="color:#707070">No records</p>
    {% endif %}
    {% endfor %}
    {% if doc.skipped %}
    <h2 style="font-size:15px">Skipped rows</h2>
    <ul>
    {% for note in doc.skipped %}
        <li>Row {{ note.row }}: {{ note.reason }}</li>
    {% endfor %}
    </ul>
    {% endif %}
</body>
</html>
"#;

#[cfg(test)]
mod tests {
    use super::*;

    fn document() -> Document {
        Document {
            title: "Open items <weekly>".to_string(),
            generated_at: "2024-06-01 12:00 UTC".to_string(),
            rows_processed: 3,
            rows_skipped: 1,
            parse_errors: 0,
            skipped: vec![SkippedNote {
                row: 2,
                reason: "owner missing".to_string(),
            }],
            sections: vec![
                Section {
                    title: "Overdue".to_string(),
                    count: 2,
                    table: "<table><tr><td>x</td></tr></table>".to_string(),
                },
                Section {
                    title: "Due in next 10 days".to_string(),
                    count: 0,
                    table: String::new(),
                },
            ],
        }
    }

    #[test]
    fn test_render_sections() {
        let html = DocumentRenderer::new().unwrap().render(&document()).unwrap();

        assert!(html.contains("<table><tr><td>x</td></tr></table>"));
        assert!(html.contains("Due in next 10 days (0)"));
        assert!(html.contains("No records"));
        assert!(html.contains("Rows processed: 3"));
        assert!(html.contains("Row 2: owner missing"));
    }

    #[test]
    fn test_title_is_escaped() {
        let html = DocumentRenderer::new().unwrap().render(&document()).unwrap();
        assert!(html.contains("Open items &lt;weekly&gt;"));
    }
}
