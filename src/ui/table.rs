use crate::document::Document;
use tabled::{settings::Style, Table, Tabled};

#[derive(Tabled)]
pub struct TableRow {
    #[tabled(rename = "Metric")]
    pub metric: String,
    #[tabled(rename = "Value")]
    pub value: String,
}

#[derive(Tabled)]
pub struct DocumentRow {
    #[tabled(rename = "Id")]
    pub id: String,
    #[tabled(rename = "Score")]
    pub score: String,
    #[tabled(rename = "Content")]
    pub content: String,
    #[tabled(rename = "Meta")]
    pub meta: String,
}

pub struct TableBuilder {
    rows: Vec<TableRow>,
}

impl TableBuilder {
    pub fn new() -> Self {
        Self { rows: Vec::new() }
    }

    pub fn add_row(&mut self, label: &str, value: &str) {
        self.rows.push(TableRow {
            metric: label.to_string(),
            value: value.to_string(),
        });
    }

    pub fn build(&self) -> String {
        if self.rows.is_empty() {
            return String::new();
        }

        Table::new(&self.rows).with(Style::rounded()).to_string()
    }
}

impl Default for TableBuilder {
    fn default() -> Self {
        Self::new()
    }
}

pub fn stats_table(stats: &[(&str, &str)]) -> String {
    let mut builder = TableBuilder::new();
    for (label, value) in stats {
        builder.add_row(label, value);
    }
    builder.build()
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}

/// Compact one-row-per-document table
pub fn documents_table(documents: &[Document]) -> String {
    if documents.is_empty() {
        return String::new();
    }

    let rows: Vec<DocumentRow> = documents
        .iter()
        .map(|d| DocumentRow {
            id: truncate(&d.id, 16),
            score: d.score.map(|s| format!("{:.4}", s)).unwrap_or_default(),
            content: truncate(d.content.as_deref().unwrap_or(""), 48),
            meta: truncate(&serde_json::Value::Object(d.meta.clone()).to_string(), 48),
        })
        .collect();

    Table::new(&rows).with(Style::rounded()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdefghij", 5), "abcd…");
    }

    #[test]
    fn test_documents_table() {
        assert!(documents_table(&[]).is_empty());
        let table = documents_table(&[Document::from_content("hello").with_meta("k", "v").with_id("doc-1")]);
        assert!(table.contains("doc-1"));
        assert!(table.contains("hello"));
        assert!(table.contains("Score"));
    }

    #[test]
    fn test_stats_table() {
        let table = stats_table(&[("Documents", "3")]);
        assert!(table.contains("Documents"));
        assert!(stats_table(&[]).is_empty());
    }
}
