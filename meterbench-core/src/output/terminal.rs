use std::io::{self, Write};

use colored::Colorize;

use super::{Output, OutputError};
use crate::result::{BenchmarkResult, ResultNode, Statistics};

const RULE_WIDTH: usize = 141;

/// An output that prints the result tree to the terminal.
#[derive(Debug, Clone, Default)]
pub struct TerminalOutput {
    /// Whether to use colors in output (defaults to true).
    use_colors: bool,
}

impl TerminalOutput {
    /// Create a terminal output with default settings.
    pub fn new() -> Self {
        Self { use_colors: true }
    }

    /// Create a terminal output with color disabled.
    pub fn without_colors() -> Self {
        Self { use_colors: false }
    }

    /// Format a sample value with its unit.
    ///
    /// Nanosecond timings are scaled to the most readable time unit.
    fn format_value(value: f64, unit: &str) -> String {
        if unit != "ns" {
            return format!("{:.3} {}", value, unit);
        }
        if value >= 1_000_000_000.0 {
            format!("{:.3} s", value / 1_000_000_000.0)
        } else if value >= 1_000_000.0 {
            format!("{:.3} ms", value / 1_000_000.0)
        } else if value >= 1_000.0 {
            format!("{:.3} us", value / 1_000.0)
        } else {
            format!("{:.3} ns", value)
        }
    }

    /// Format a mean with standard deviation.
    fn format_mean_with_stddev(stats: &Statistics, unit: &str) -> String {
        let mean = Self::format_value(stats.mean, unit);
        let stddev = Self::format_value(stats.standard_deviation, unit);
        format!("{} (+/- {})", mean, stddev)
    }

    /// Format a `low .. high` pair.
    fn format_span(low: f64, high: f64, unit: &str) -> String {
        format!(
            "{} .. {}",
            Self::format_value(low, unit),
            Self::format_value(high, unit)
        )
    }

    fn paint(&self, text: &str, style: fn(&str) -> colored::ColoredString) -> String {
        if self.use_colors {
            style(text).to_string()
        } else {
            text.to_string()
        }
    }

    /// Print the table header.
    fn print_header(&self, writer: &mut impl Write) -> io::Result<()> {
        writeln!(writer)?;
        let header = format!(
            "{:<40} {:<8} {:>28} {:>26} {:>26} {:>8}",
            "Benchmark", "Meter", "Mean", "Min .. Max", "p5 .. p95", "Samples"
        );
        writeln!(writer, "{}", self.paint(&header, |s| s.bold()))?;
        writeln!(writer, "{}", "-".repeat(RULE_WIDTH))?;
        Ok(())
    }

    /// Print one row per meter registered at `node`.
    fn print_rows(&self, writer: &mut impl Write, label: &str, node: &dyn ResultNode) -> io::Result<()> {
        let label = if label.chars().count() > 38 {
            format!("{}...", label.chars().take(35).collect::<String>())
        } else {
            label.to_string()
        };

        for meter in node.registered_meters() {
            let (Some(stats), Some(unit)) = (node.statistics(meter), node.unit(meter)) else {
                continue;
            };
            writeln!(
                writer,
                "{:<40} {:<8} {:>28} {:>26} {:>26} {:>8}",
                label,
                meter,
                Self::format_mean_with_stddev(&stats, unit),
                Self::format_span(stats.min, stats.max, unit),
                Self::format_span(stats.conf05, stats.conf95, unit),
                stats.sample_count,
            )?;
        }
        Ok(())
    }

    /// Print the recorded failures.
    fn print_failures(&self, writer: &mut impl Write, result: &BenchmarkResult) -> io::Result<()> {
        if result.exceptions().is_empty() {
            return Ok(());
        }

        writeln!(writer)?;
        writeln!(writer, "{}", self.paint("Failures:", |s| s.red().bold()))?;
        for failure in result.exceptions() {
            writeln!(writer, "  {}", failure)?;
        }
        Ok(())
    }

    /// Print the summary footer.
    fn print_summary(&self, writer: &mut impl Write, result: &BenchmarkResult) -> io::Result<()> {
        let methods: usize = result.classes().map(|c| c.methods().count()).sum();
        let failures = result.exceptions().len();

        writeln!(writer)?;
        writeln!(writer, "{}", "-".repeat(RULE_WIDTH))?;
        write!(writer, "{} ", self.paint("Summary:", |s| s.bold()))?;

        let methods_text = format!("{} measured", methods);
        let failures_text = format!("{} failed", failures);
        if failures == 0 {
            writeln!(
                writer,
                "{}, {}",
                self.paint(&methods_text, |s| s.green()),
                failures_text
            )?;
        } else {
            writeln!(
                writer,
                "{}, {}",
                self.paint(&methods_text, |s| s.green()),
                self.paint(&failures_text, |s| s.red())
            )?;
        }

        writeln!(writer)?;
        Ok(())
    }

    fn write_report(&self, writer: &mut impl Write, result: &BenchmarkResult) -> io::Result<()> {
        self.print_header(writer)?;

        for class in result.classes() {
            self.print_rows(writer, &class.name(), class)?;
            for method in class.methods() {
                let label = format!("  {}", method.name());
                self.print_rows(writer, &label, method)?;
            }
        }

        self.print_failures(writer, result)?;
        self.print_summary(writer, result)
    }
}

impl Output for TerminalOutput {
    fn visit_benchmark(&mut self, result: &BenchmarkResult) -> Result<(), OutputError> {
        let stdout = io::stdout();
        let mut writer = stdout.lock();
        self.write_report(&mut writer, result)?;
        Ok(())
    }
}
