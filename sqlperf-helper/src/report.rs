use crate::extension::params::ParamSet;
use chrono::{Local, NaiveDateTime};
use sqlperf_common::error::OdbcStdResult;
use std::fmt::Write;
use std::fs;
use std::path::{Path, PathBuf};

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Builder for the Markdown report each script leaves behind.
#[derive(Debug, Clone)]
pub struct MarkdownReport {
    title: String,
    generated_at: NaiveDateTime,
    body: String,
}

impl MarkdownReport {
    pub fn new(title: impl Into<String>) -> Self {
        Self::with_timestamp(title, Local::now().naive_local())
    }

    pub fn with_timestamp(title: impl Into<String>, generated_at: NaiveDateTime) -> Self {
        Self {
            title: title.into(),
            generated_at,
            body: String::new(),
        }
    }

    /// `**key:** value` line of the header block.
    pub fn meta(&mut self, key: &str, value: impl std::fmt::Display) -> &mut Self {
        let _ = writeln!(self.body, "**{}:** {}  ", key, value);
        self
    }

    pub fn params(&mut self, params: &ParamSet) -> &mut Self {
        for (name, value) in params.iter() {
            let _ = writeln!(self.body, "- @{} = {}", name, value);
        }
        self.body.push('\n');
        self
    }

    pub fn heading(&mut self, level: usize, text: &str) -> &mut Self {
        let _ = writeln!(self.body, "\n{} {}\n", "#".repeat(level.clamp(2, 6)), text);
        self
    }

    pub fn paragraph(&mut self, text: &str) -> &mut Self {
        let _ = writeln!(self.body, "{}\n", text);
        self
    }

    pub fn bullet(&mut self, text: &str) -> &mut Self {
        let _ = writeln!(self.body, "- {}", text);
        self
    }

    pub fn table(&mut self, table: &MarkdownTable) -> &mut Self {
        self.body.push_str(&table.render());
        self.body.push('\n');
        self
    }

    pub fn code_block(&mut self, lang: &str, code: &str) -> &mut Self {
        let _ = writeln!(self.body, "```{}\n{}\n```\n", lang, code.trim_end());
        self
    }

    pub fn rule(&mut self) -> &mut Self {
        self.body.push_str("\n---\n");
        self
    }

    pub fn render(&self) -> String {
        format!(
            "# {}\n\n**Generated:** {}  \n{}",
            self.title,
            self.generated_at.format(TIMESTAMP_FORMAT),
            self.body
        )
    }

    /// Write the report as UTF-8 to `dir/file_name`, replacing an older run.
    pub fn write_to(&self, dir: impl AsRef<Path>, file_name: &str) -> OdbcStdResult<PathBuf> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        let path = dir.join(file_name);
        fs::write(&path, self.render())?;
        info!("report written to {}", path.display());
        Ok(path)
    }
}

#[derive(Debug, Clone, Default)]
pub struct MarkdownTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl MarkdownTable {
    pub fn new<S: Into<String>>(headers: impl IntoIterator<Item = S>) -> Self {
        Self {
            headers: headers.into_iter().map(Into::into).collect(),
            rows: vec![],
        }
    }

    pub fn row<S: Into<String>>(&mut self, cells: impl IntoIterator<Item = S>) -> &mut Self {
        self.rows.push(cells.into_iter().map(Into::into).collect());
        self
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        let line = |cells: &[String]| {
            let cells: Vec<String> = cells.iter().map(|c| escape_cell(c)).collect();
            format!("| {} |\n", cells.join(" | "))
        };
        out.push_str(&line(&self.headers));
        out.push_str(&format!("|{}\n", "------|".repeat(self.headers.len())));
        for row in &self.rows {
            let mut row = row.clone();
            row.resize(self.headers.len(), String::new());
            out.push_str(&line(&row));
        }
        out
    }
}

fn escape_cell(cell: &str) -> String {
    cell.replace('|', "\\|").replace('\n', " ")
}

pub fn format_ms(ms: f64) -> String {
    format!("{:.2} ms", ms)
}

pub fn format_secs(ms: f64) -> String {
    format!("{:.3} s", ms / 1000.0)
}

/// `1234567` -> `1,234,567`
pub fn format_count(count: usize) -> String {
    let digits = count.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}
