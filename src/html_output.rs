//! HTML coverage reports
//!
//! One self-contained page per image with embedded CSS: a summary block,
//! a progress bar and the function list colored by call status.

use crate::coverage::{sanitize_image_name, ImageCoverage};

/// HTML report for a single image
#[derive(Debug)]
pub struct HtmlReport<'a> {
    image: &'a str,
    coverage: &'a ImageCoverage,
}

impl<'a> HtmlReport<'a> {
    pub fn new(image: &'a str, coverage: &'a ImageCoverage) -> Self {
        Self { image, coverage }
    }

    /// Report file name, `coverage_<sanitized image>.html`
    pub fn file_name(&self) -> String {
        format!("coverage_{}.html", sanitize_image_name(self.image))
    }

    /// Escape HTML special characters to prevent XSS
    fn escape_html(text: &str) -> String {
        text.replace('&', "&amp;")
            .replace('<', "&lt;")
            .replace('>', "&gt;")
            .replace('"', "&quot;")
            .replace('\'', "&#39;")
    }

    /// Generate embedded CSS styles
    fn generate_styles() -> &'static str {
        r#"
        body {
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
            margin: 2em;
            background-color: #f9f9f9;
            color: #333;
        }
        .container {
            max-width: 1200px;
            margin: auto;
            background-color: #fff;
            padding: 2em;
            border-radius: 8px;
            box-shadow: 0 4px 8px rgba(0,0,0,0.1);
        }
        h1, h2 {
            color: #1a1a1a;
            border-bottom: 2px solid #eee;
            padding-bottom: 0.3em;
        }
        .summary {
            background-color: #f4f4f4;
            padding: 1.5em;
            border-radius: 8px;
            margin-bottom: 2em;
            border: 1px solid #ddd;
        }
        .summary .percentage {
            font-size: 1.8em;
            font-weight: bold;
            color: #0056b3;
        }
        .progress-bar {
            background-color: #e9ecef;
            border-radius: 50px;
            overflow: hidden;
            height: 30px;
            margin-top: 1em;
        }
        .progress-bar-inner {
            background-color: #28a745;
            height: 100%;
            color: white;
            text-align: center;
            line-height: 30px;
            font-weight: bold;
        }
        .function-list {
            display: grid;
            grid-template-columns: repeat(auto-fill, minmax(320px, 1fr));
            gap: 1em;
            list-style-type: none;
            padding: 0;
        }
        .function-list li {
            padding: 0.6em;
            border-radius: 5px;
            font-family: monospace;
            white-space: nowrap;
            overflow: hidden;
            text-overflow: ellipsis;
        }
        .called {
            background-color: #d4edda;
            color: #155724;
            border-left: 5px solid #28a745;
        }
        .uncalled {
            background-color: #f8d7da;
            color: #721c24;
            border-left: 5px solid #dc3545;
        }
        .footer {
            margin-top: 20px;
            font-size: 0.8em;
            color: #888;
            text-align: center;
        }
        "#
    }

    fn render_summary(&self, html: &mut String) {
        let coverage = self.coverage;
        let percentage = coverage.percentage();
        let uncalled = coverage
            .total_count()
            .saturating_sub(coverage.called_count());

        html.push_str("        <div class=\"summary\">\n");
        html.push_str(&format!(
            "            <p><strong>Total Functions:</strong> {}</p>\n",
            coverage.total_count()
        ));
        html.push_str(&format!(
            "            <p><strong>Called Functions:</strong> {}</p>\n",
            coverage.called_count()
        ));
        html.push_str(&format!(
            "            <p><strong>Uncalled Functions:</strong> {}</p>\n",
            uncalled
        ));
        html.push_str(&format!(
            "            <p class=\"percentage\">Coverage: {:.2}%</p>\n",
            percentage
        ));
        html.push_str("            <div class=\"progress-bar\">\n");
        html.push_str(&format!(
            "                <div class=\"progress-bar-inner\" style=\"width: {:.2}%\">{:.2}%</div>\n",
            percentage, percentage
        ));
        html.push_str("            </div>\n");
        html.push_str("        </div>\n");
    }

    /// Format a function as a list item
    fn format_function_item(&self, function: &str) -> String {
        let status = if self.coverage.called.contains(function) {
            "called"
        } else {
            "uncalled"
        };
        let name = Self::escape_html(function);
        format!(r#"<li class="{}" title="{}">{}</li>"#, status, name, name)
    }

    /// Generate complete HTML document
    pub fn to_html(&self) -> String {
        let title = Self::escape_html(&sanitize_image_name(self.image));
        let mut html = String::new();

        html.push_str("<!DOCTYPE html>\n");
        html.push_str("<html lang=\"en\">\n");

        html.push_str("<head>\n");
        html.push_str("    <meta charset=\"UTF-8\">\n");
        html.push_str(
            "    <meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\n",
        );
        html.push_str(&format!("    <title>Coverage Report for {}</title>\n", title));
        html.push_str("    <style>");
        html.push_str(Self::generate_styles());
        html.push_str("</style>\n");
        html.push_str("</head>\n");

        html.push_str("<body>\n");
        html.push_str("    <div class=\"container\">\n");
        html.push_str("        <h1>Coverage Report</h1>\n");
        html.push_str(&format!("        <h2>Image: {}</h2>\n", title));
        self.render_summary(&mut html);

        html.push_str("        <details>\n");
        html.push_str("        <summary><h2>Function Details</h2></summary>\n");
        html.push_str("        <p><strong>Legend: </strong><span class=\"called\"> Called Function </span><span class=\"uncalled\"> Uncalled Function </span></p>\n");
        html.push_str("        <ul class=\"function-list\">\n");
        for function in &self.coverage.total {
            html.push_str("            ");
            html.push_str(&self.format_function_item(function));
            html.push('\n');
        }
        html.push_str("        </ul>\n");
        html.push_str("        </details>\n");

        html.push_str("        <div class=\"footer\">\n");
        html.push_str("            Generated by functrace-coverage\n");
        html.push_str("        </div>\n");
        html.push_str("    </div>\n");
        html.push_str("</body>\n");
        html.push_str("</html>\n");

        html
    }
}
