//! Plain-text regression tables.

use std::fmt::Write as _;

use crate::econometrics::CoefTable;

const WIDTH: usize = 78;
const HALF: usize = 39;

/// Builder for the text blob returned in every analysis result.
#[derive(Debug, Clone, Default)]
pub struct Summary {
    title: String,
    stats: Vec<(String, String)>,
    table: Option<CoefTable>,
    notes: Vec<String>,
}

/// Format a float for the header block.
pub fn fmt_stat(v: f64) -> String {
    if !v.is_finite() {
        "nan".to_string()
    } else if v != 0.0 && (v.abs() >= 1e6 || v.abs() < 1e-3) {
        format!("{v:.4e}")
    } else {
        format!("{v:.4}")
    }
}

fn fmt_cell(v: f64) -> String {
    if !v.is_finite() {
        return if v.is_nan() { "nan".into() } else if v > 0.0 { "inf".into() } else { "-inf".into() };
    }
    if v != 0.0 && (v.abs() >= 1e7 || v.abs() < 1e-4) { format!("{v:.3e}") } else { format!("{v:.4}") }
}

impl Summary {
    /// Start a summary with a centered title line.
    pub fn new(title: impl Into<String>) -> Self {
        Self { title: title.into(), ..Default::default() }
    }

    /// Add a header statistic.
    pub fn stat(mut self, label: &str, value: impl Into<String>) -> Self {
        self.stats.push((format!("{label}:"), value.into()));
        self
    }

    /// Attach the coefficient table.
    pub fn table(mut self, table: &CoefTable) -> Self {
        self.table = Some(table.clone());
        self
    }

    /// Add a footnote line.
    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    /// Render to text.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let rule = "=".repeat(WIDTH);
        let thin = "-".repeat(WIDTH);

        let _ = writeln!(out, "{:^w$}", self.title, w = WIDTH);
        let _ = writeln!(out, "{rule}");
        for pair in self.stats.chunks(2) {
            let left = cell(&pair[0]);
            match pair.get(1) {
                Some(right) => {
                    let _ = writeln!(out, "{left} {}", cell(right));
                }
                None => {
                    let _ = writeln!(out, "{}", left.trim_end());
                }
            }
        }

        if let Some(table) = &self.table {
            let name_w = table.names.iter().map(|n| n.len()).max().unwrap_or(0).max(12);
            let _ = writeln!(out, "{rule}");
            let _ = writeln!(
                out,
                "{:<name_w$} {:>12} {:>12} {:>10} {:>10}",
                "", "coef", "std err", "t", "P>|t|"
            );
            let _ = writeln!(out, "{thin}");
            for i in 0..table.names.len() {
                let _ = writeln!(
                    out,
                    "{:<name_w$} {:>12} {:>12} {:>10} {:>10.3}",
                    table.names[i],
                    fmt_cell(table.coefficients[i]),
                    fmt_cell(table.std_errors[i]),
                    fmt_cell(table.t_values[i]),
                    table.p_values[i],
                );
            }
        }
        let _ = writeln!(out, "{rule}");

        for note in &self.notes {
            let _ = writeln!(out, "{note}");
        }
        out
    }
}

fn cell((label, value): &(String, String)) -> String {
    let pad = HALF.saturating_sub(label.len() + 1).max(1);
    format!("{label}{value:>pad$}")
}
