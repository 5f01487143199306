//! xUnit XML coverage reports
//!
//! One `<testsuite>` per image with a single `Result` test case, so CI
//! dashboards show each image's coverage next to the regular test results.
//! Uncalled functions are counted as skipped tests.

use crate::coverage::{sanitize_image_name, ImageCoverage};

/// xUnit report for a single image
#[derive(Debug)]
pub struct XunitReport<'a> {
    image: &'a str,
    coverage: &'a ImageCoverage,
}

impl<'a> XunitReport<'a> {
    pub fn new(image: &'a str, coverage: &'a ImageCoverage) -> Self {
        Self { image, coverage }
    }

    /// Report file name, `coverage_<sanitized image>.xml`
    pub fn file_name(&self) -> String {
        format!("coverage_{}.xml", sanitize_image_name(self.image))
    }

    /// Escape XML special characters for attribute and text content
    fn escape_xml(text: &str) -> String {
        text.replace('&', "&amp;")
            .replace('<', "&lt;")
            .replace('>', "&gt;")
            .replace('"', "&quot;")
            .replace('\'', "&apos;")
    }

    /// One-line summary carried in the `message` attribute
    pub fn summary_message(&self) -> String {
        let name = sanitize_image_name(self.image);
        let coverage = self.coverage;
        format!(
            "Coverage Summary for {} | Total Functions: {} | Called Functions: {} | Uncalled Functions: {} | Coverage: {:.2}%",
            name,
            coverage.total_count(),
            coverage.called_count(),
            coverage.total_count().saturating_sub(coverage.called_count()),
            coverage.percentage()
        )
    }

    fn function_details(&self) -> String {
        let mut lines = Vec::new();

        if !self.coverage.called.is_empty() {
            lines.push("CALLED FUNCTIONS:".to_string());
            for function in &self.coverage.called {
                lines.push(format!("  \u{2713} {}", function));
            }
            lines.push(String::new());
        }

        let uncalled = self.coverage.uncalled();
        if !uncalled.is_empty() {
            lines.push("UNCALLED FUNCTIONS:".to_string());
            for function in uncalled {
                lines.push(format!("  \u{2717} {}", function));
            }
        }

        lines.join("\n")
    }

    /// Generate the XML document
    pub fn to_xml(&self) -> String {
        let suite = Self::escape_xml(&format!(
            "binary_coverage_{}",
            sanitize_image_name(self.image)
        ));
        let total = self.coverage.total_count();
        let skipped = total.saturating_sub(self.coverage.called_count());

        let mut xml = String::new();
        xml.push_str("<?xml version='1.0' encoding='utf-8'?>\n");
        xml.push_str("<testsuites>\n");
        xml.push_str(&format!(
            "  <testsuite errors=\"0\" failures=\"0\" name=\"{}\" skipped=\"{}\" tests=\"{}\">\n",
            suite, skipped, total
        ));
        xml.push_str(&format!(
            "    <testcase classname=\"{}\" name=\"Result\">\n",
            suite
        ));
        xml.push_str(&format!(
            "      <passed message=\"{}\">{}</passed>\n",
            Self::escape_xml(&self.summary_message()),
            Self::escape_xml(&self.function_details())
        ));
        xml.push_str("    </testcase>\n");
        xml.push_str("  </testsuite>\n");
        xml.push_str("</testsuites>\n");
        xml
    }
}
