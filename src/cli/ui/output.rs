use console::style;
use std::path::Path;

use crate::ai::UsageSummary;

pub struct Output;

impl Output {
    pub fn new() -> Self {
        Self
    }

    pub fn success(&self, message: &str) {
        println!("{} {}", style("✓").green(), message);
    }

    pub fn error(&self, message: &str) {
        eprintln!("{} {}", style("✗").red(), message);
    }

    pub fn warning(&self, message: &str) {
        println!("{} {}", style("⚠").yellow(), message);
    }

    pub fn info(&self, message: &str) {
        println!("{} {}", style("ℹ").blue(), message);
    }

    pub fn section(&self, message: &str) {
        println!("\n{}", style(message).bold());
        println!("{}", "─".repeat(40));
    }

    /// Key/value line with a dimmed key
    pub fn field(&self, key: &str, value: impl std::fmt::Display) {
        println!("  {:<14} {}", style(key).dim(), value);
    }

    pub fn document(&self, path: &Path) {
        self.field("document", path.display());
    }

    /// Usage block printed after a run or a single pass
    pub fn usage(&self, usage: &UsageSummary) {
        self.section("Usage");
        self.field("calls", usage.logical_calls);
        self.field("invocations", usage.invocations);
        self.field("retries", usage.retries);
        self.field("truncations", usage.truncations);
        self.field("escalations", usage.escalations);
        self.field(
            "tokens",
            format!("{} in / {} out", usage.input_tokens, usage.output_tokens),
        );
        self.field("cost", format!("${:.4}", usage.total_cost_usd));

        let fallbacks: u64 = usage.fallbacks.values().sum();
        if fallbacks > 0 {
            let detail = usage
                .fallbacks
                .iter()
                .map(|(cause, n)| format!("{}: {}", cause, n))
                .collect::<Vec<_>>()
                .join(", ");
            self.warning(&format!("{} calls fell back to defaults ({})", fallbacks, detail));
        }
    }
}

impl Default for Output {
    fn default() -> Self {
        Self::new()
    }
}
