//! Function coverage analysis over trace and diagnostic logs
//!
//! The diagnostic log lists every function registered for instrumentation
//! (`[Image:<i>] [Function:<f>]`); the trace lists every function that was
//! called at least once (`[PID:<p>] [Image:<i>] [Called:<f>]`). Combining
//! both gives per-image function coverage.

use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::OnceLock;

/// A coverage-relevant log line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogEntry<'a> {
    /// Function registered for instrumentation
    Function { image: &'a str, function: &'a str },
    /// Function called at least once
    Called { image: &'a str, function: &'a str },
    /// Section of an image, carries no function
    Section { image: &'a str },
}

fn line_regex() -> &'static Regex {
    static LINE: OnceLock<Regex> = OnceLock::new();
    LINE.get_or_init(|| {
        Regex::new(r"\[Image:(?P<image>.*?)\] \[(?P<kind>Function|Called|Section):(?P<name>.*?)\]")
            .unwrap_or_else(|e| unreachable!("invalid coverage regex: {}", e))
    })
}

/// Parse one log line; `None` for unrelated lines and empty components
pub fn parse_line(line: &str) -> Option<LogEntry<'_>> {
    let captures = line_regex().captures(line)?;
    let image = captures.name("image")?.as_str().trim();
    let name = captures.name("name")?.as_str().trim();
    if image.is_empty() {
        return None;
    }

    match captures.name("kind")?.as_str() {
        "Section" => Some(LogEntry::Section { image }),
        _ if name.is_empty() => None,
        "Function" => Some(LogEntry::Function {
            image,
            function: name,
        }),
        _ => Some(LogEntry::Called {
            image,
            function: name,
        }),
    }
}

/// Registered and called functions of one image
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageCoverage {
    pub total: BTreeSet<String>,
    pub called: BTreeSet<String>,
}

impl ImageCoverage {
    pub fn total_count(&self) -> usize {
        self.total.len()
    }

    pub fn called_count(&self) -> usize {
        self.called.len()
    }

    /// Registered functions never called, sorted
    pub fn uncalled(&self) -> Vec<&str> {
        self.total
            .difference(&self.called)
            .map(String::as_str)
            .collect()
    }

    /// Called over total as a percentage, 0 for an image with no functions
    pub fn percentage(&self) -> f64 {
        if self.total.is_empty() {
            0.0
        } else {
            self.called.len() as f64 / self.total.len() as f64 * 100.0
        }
    }
}

/// Coverage of every image seen in the logs, ordered by image name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoverageData {
    images: BTreeMap<String, ImageCoverage>,
}

impl CoverageData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one log line into the data
    pub fn record_line(&mut self, line: &str) {
        match parse_line(line) {
            Some(LogEntry::Function { image, function }) => {
                self.image_mut(image).total.insert(function.to_string());
            }
            Some(LogEntry::Called { image, function }) => {
                self.image_mut(image).called.insert(function.to_string());
            }
            Some(LogEntry::Section { image }) => {
                self.image_mut(image);
            }
            None => {}
        }
    }

    /// Fold every line of `reader` into the data
    pub fn record_reader(&mut self, reader: impl BufRead) -> std::io::Result<()> {
        for line in reader.split(b'\n') {
            // Logs may carry non-UTF-8 symbol names
            let line = line?;
            self.record_line(&String::from_utf8_lossy(&line));
        }
        Ok(())
    }

    fn image_mut(&mut self, image: &str) -> &mut ImageCoverage {
        self.images.entry(image.to_string()).or_default()
    }

    pub fn get(&self, image: &str) -> Option<&ImageCoverage> {
        self.images.get(image)
    }

    pub fn images(&self) -> impl Iterator<Item = (&str, &ImageCoverage)> {
        self.images.iter().map(|(name, data)| (name.as_str(), data))
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}

/// Analyze a set of log files
///
/// Unreadable files are reported on stderr and skipped.
pub fn analyze_logs<P: AsRef<Path>>(paths: &[P]) -> CoverageData {
    let mut data = CoverageData::new();
    for path in paths {
        let path = path.as_ref();
        let result = File::open(path).and_then(|file| data.record_reader(BufReader::new(file)));
        match result {
            Ok(()) => tracing::debug!("processed {}", path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                eprintln!("Warning: Log file not found: {}", path.display());
            }
            Err(e) => eprintln!("Warning: Failed to read {}: {}", path.display(), e),
        }
    }
    data
}

/// File-name-safe form of an image name: basename, `[A-Za-z0-9._-]` only
pub fn sanitize_image_name(image: &str) -> String {
    let base = image.rsplit('/').next().unwrap_or(image);
    base.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

const RULE: &str = "==================================================";
const THIN_RULE: &str = "--------------------------------------------------";

/// Human-readable coverage report
pub fn console_report(data: &CoverageData) -> String {
    if data.is_empty() {
        return "No data to report. Please check your log files.\n".to_string();
    }

    let mut out = String::new();
    for (image, coverage) in data.images() {
        let _ = writeln!(out, "\n{}", RULE);
        let _ = writeln!(out, "Image: {}", image);
        let _ = writeln!(out, "{}", RULE);
        let _ = writeln!(out, "  Functions Found:   {}", coverage.total_count());
        let _ = writeln!(out, "  Functions Called:  {}", coverage.called_count());
        let _ = writeln!(out, "  Coverage:          {:.2}%", coverage.percentage());
        let _ = writeln!(out, "{}", THIN_RULE);

        if coverage.called.is_empty() {
            let _ = writeln!(out, "  No functions were called for this image.");
        } else {
            let _ = writeln!(out, "  Called Functions:");
            for function in &coverage.called {
                let _ = writeln!(out, "    - {}", function);
            }
        }

        let uncalled = coverage.uncalled();
        if !uncalled.is_empty() {
            let _ = writeln!(out, "\n  Uncalled Functions:");
            for function in uncalled {
                let _ = writeln!(out, "    - {}", function);
            }
        }
    }
    out.push_str("\n--- End of Console Report ---\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data_from(lines: &[&str]) -> CoverageData {
        let mut data = CoverageData::new();
        for line in lines {
            data.record_line(line);
        }
        data
    }

    fn set(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_trace_line() {
        assert_eq!(
            parse_line("[PID:4242] [Image:/tmp/toy] [Called:add]"),
            Some(LogEntry::Called {
                image: "/tmp/toy",
                function: "add"
            })
        );
    }

    #[test]
    fn test_parse_diagnostic_lines() {
        assert_eq!(
            parse_line("[Image:/tmp/toy] [Function:mul]"),
            Some(LogEntry::Function {
                image: "/tmp/toy",
                function: "mul"
            })
        );
        assert_eq!(
            parse_line("[Image:/tmp/toy] [Section:.text]"),
            Some(LogEntry::Section { image: "/tmp/toy" })
        );
    }

    #[test]
    fn test_parse_ignores_unrelated_and_empty() {
        assert_eq!(parse_line("Random log line"), None);
        assert_eq!(parse_line("[PID:1] [Follow:fork -> 2]"), None);
        assert_eq!(parse_line("[Image:] [Function:foo]"), None);
        assert_eq!(parse_line("[Image:prog] [Called:  ]"), None);
    }

    #[test]
    fn test_basic_coverage() {
        let data = data_from(&[
            "[Image:myprog] [Function:foo]",
            "[Image:myprog] [Function:bar]",
            "[Image:myprog] [Called:foo]",
            "[Image:myprog] [Function:baz]",
        ]);
        let image = data.get("myprog").unwrap();
        assert_eq!(image.total, set(&["foo", "bar", "baz"]));
        assert_eq!(image.called, set(&["foo"]));
        assert_eq!(image.uncalled(), vec!["bar", "baz"]);
        assert!((image.percentage() - 100.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_section_only_registers_image() {
        let data = data_from(&["[Image:myprog] [Section:.text]"]);
        let image = data.get("myprog").unwrap();
        assert!(image.total.is_empty());
        assert!(image.called.is_empty());
        assert_eq!(image.percentage(), 0.0);
    }

    #[test]
    fn test_called_function_not_in_total() {
        let data = data_from(&["[Image:myprog] [Called:foo]"]);
        let image = data.get("myprog").unwrap();
        assert!(image.total.is_empty());
        assert_eq!(image.called, set(&["foo"]));
    }

    #[test]
    fn test_duplicates_collapse() {
        let data = data_from(&[
            "[Image:myprog] [Function:foo]",
            "[Image:myprog] [Function:foo]",
            "[Image:myprog] [Called:foo]",
            "[Image:myprog] [Called:foo]",
        ]);
        let image = data.get("myprog").unwrap();
        assert_eq!(image.total_count(), 1);
        assert_eq!(image.called_count(), 1);
        assert_eq!(image.percentage(), 100.0);
    }

    #[test]
    fn test_sanitize_image_name() {
        assert_eq!(sanitize_image_name("/usr/lib/libc.so.6"), "libc.so.6");
        assert_eq!(sanitize_image_name("/tmp/my prog (v2)"), "my_prog__v2_");
        assert_eq!(sanitize_image_name("plain-name_1"), "plain-name_1");
    }

    #[test]
    fn test_console_report() {
        let data = data_from(&[
            "[Image:b] [Function:f]",
            "[Image:a] [Function:g]",
            "[Image:a] [Function:h]",
            "[PID:1] [Image:a] [Called:g]",
        ]);
        let report = console_report(&data);
        assert!(report.find("Image: a").unwrap() < report.find("Image: b").unwrap());
        assert!(report.contains("Coverage:          50.00%"));
        assert!(report.contains("Uncalled Functions:\n    - h"));
        assert!(report.contains("No functions were called for this image."));
        assert!(report.ends_with("--- End of Console Report ---\n"));
    }

    #[test]
    fn test_console_report_empty() {
        assert!(console_report(&CoverageData::new()).starts_with("No data to report"));
    }

    #[test]
    fn test_record_reader_handles_invalid_utf8() {
        let mut data = CoverageData::new();
        let bytes: &[u8] = b"[Image:p] [Function:f\xff]\n[Image:p] [Called:g]\n";
        data.record_reader(bytes).unwrap();
        let image = data.get("p").unwrap();
        assert_eq!(image.total_count(), 1);
        assert_eq!(image.called, set(&["g"]));
    }
}
