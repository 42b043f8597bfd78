//! HTML result page generator.
//!
//! Produces a self-contained HTML file with all CSS inlined.

use anyhow::{Context, Result};
use std::path::Path;

use examguard_core::report::SessionReport;
use examguard_core::scoring::{AnswerOutcome, ScoreSummary};

/// Escape a string for safe HTML insertion.
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

/// Generate the results page for a graded session.
pub fn generate_html(report: &SessionReport) -> String {
    let mut html = String::new();
    let summary = &report.summary;
    let test = &report.test;

    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n");
    html.push_str("<meta charset=\"utf-8\">\n");
    html.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n");
    html.push_str(&format!(
        "<title>Test Results: {}</title>\n",
        html_escape(&test.title)
    ));
    html.push_str("<style>\n");
    html.push_str(CSS);
    html.push_str("</style>\n");
    html.push_str("</head>\n<body>\n");

    html.push_str("<header>\n");
    html.push_str("<h1>Test Results</h1>\n");
    html.push_str(&format!(
        "<p class=\"meta\">{} | {} | {}</p>\n",
        html_escape(&test.title),
        html_escape(&report.reason.to_string()),
        report.record.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    if !report.persisted {
        html.push_str("<p class=\"notice\">This result could not be saved.</p>\n");
    }
    html.push_str("</header>\n");

    // Score summary and test information side by side
    html.push_str("<section class=\"cards\">\n");
    html.push_str("<div class=\"card\">\n<h2>Score Summary</h2>\n<table>\n");
    html.push_str(&format!(
        "<tr><th>Total Score</th><td>{} / {}</td></tr>\n",
        summary.total_score,
        test.max_score()
    ));
    html.push_str(&format!(
        "<tr><th>Percentage</th><td>{:.2}%</td></tr>\n",
        summary.percentage
    ));
    html.push_str(&format!(
        "<tr><th>Correct</th><td class=\"correct\">{}</td></tr>\n",
        summary.correct
    ));
    html.push_str(&format!(
        "<tr><th>Incorrect</th><td class=\"incorrect\">{}</td></tr>\n",
        summary.incorrect
    ));
    html.push_str(&format!(
        "<tr><th>Unattempted</th><td class=\"unattempted\">{}</td></tr>\n",
        summary.unattempted
    ));
    html.push_str("</table>\n</div>\n");

    html.push_str("<div class=\"card\">\n<h2>Test Information</h2>\n<table>\n");
    html.push_str(&format!(
        "<tr><th>Title</th><td>{}</td></tr>\n",
        html_escape(&test.title)
    ));
    html.push_str(&format!(
        "<tr><th>Topic</th><td>{}</td></tr>\n",
        html_escape(&test.topic)
    ));
    html.push_str(&format!(
        "<tr><th>Duration</th><td>{} minutes</td></tr>\n",
        test.duration_minutes
    ));
    html.push_str(&format!(
        "<tr><th>Marking</th><td>+{} correct, &minus;{} incorrect</td></tr>\n",
        test.correct_marks, test.negative_marks
    ));
    html.push_str("</table>\n</div>\n");
    html.push_str("</section>\n");

    if summary.question_count() > 0 {
        html.push_str(&generate_outcome_bar(summary));
    }

    // Per-question analysis
    html.push_str("<section class=\"analysis\">\n");
    html.push_str("<h2>Detailed Analysis</h2>\n");
    for (i, review) in summary.review.iter().enumerate() {
        let class = match review.outcome {
            AnswerOutcome::Correct => "correct",
            AnswerOutcome::Incorrect => "incorrect",
            AnswerOutcome::Unattempted => "unattempted",
        };
        html.push_str(&format!("<article class=\"question {class}\">\n"));
        html.push_str(&format!(
            "<h3>Q{}. {}</h3>\n",
            i + 1,
            html_escape(&review.prompt)
        ));
        html.push_str(&format!(
            "<p>Your answer: <strong>{}</strong></p>\n",
            html_escape(review.selected.as_deref().unwrap_or("Not attempted"))
        ));
        html.push_str(&format!(
            "<p>Correct answer: <strong>{}</strong></p>\n",
            html_escape(&review.correct_answer)
        ));
        if let Some(solution) = &review.solution {
            html.push_str(&format!(
                "<div class=\"solution\"><p>Solution:</p><p>{}</p></div>\n",
                html_escape(solution)
            ));
        }
        html.push_str("</article>\n");
    }
    html.push_str("</section>\n");

    // Raw JSON
    html.push_str("<section class=\"raw-data\">\n");
    html.push_str("<details>\n<summary>Raw JSON Data</summary>\n");
    html.push_str("<pre><code>");
    html.push_str(&html_escape(
        &serde_json::to_string_pretty(report).unwrap_or_default(),
    ));
    html.push_str("</code></pre>\n");
    html.push_str("</details>\n</section>\n");

    html.push_str("</body>\n</html>");
    html
}

/// Write the results page to a file.
pub fn write_html_report(report: &SessionReport, path: &Path) -> Result<()> {
    let html = generate_html(report);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, html)
        .with_context(|| format!("failed to write HTML report to {}", path.display()))?;
    Ok(())
}

/// One stacked bar split into correct / incorrect / unattempted.
fn generate_outcome_bar(summary: &ScoreSummary) -> String {
    let width = 600.0;
    let height = 28;
    let total = summary.question_count() as f64;

    let segments = [
        (summary.correct, "#22c55e"),
        (summary.incorrect, "#ef4444"),
        (summary.unattempted, "#9ca3af"),
    ];

    let mut svg = format!(
        "<svg width=\"{}\" height=\"{height}\" xmlns=\"http://www.w3.org/2000/svg\">\n",
        width as usize
    );
    let mut x = 0.0;
    for (count, color) in segments {
        if count == 0 {
            continue;
        }
        let w = count as f64 / total * width;
        svg.push_str(&format!(
            "  <rect x=\"{x:.1}\" y=\"0\" width=\"{w:.1}\" height=\"{height}\" fill=\"{color}\"/>\n"
        ));
        x += w;
    }
    svg.push_str("</svg>\n");
    svg
}

const CSS: &str = r#"
:root { --bg: #fff; --fg: #1a1a1a; --border: #e5e7eb; --correct: #dcfce7; --incorrect: #fde2e2; --unattempted: #f3f4f6; }
@media (prefers-color-scheme: dark) {
  :root { --bg: #111827; --fg: #f9fafb; --border: #374151; --correct: #064e3b; --incorrect: #7f1d1d; --unattempted: #1f2937; }
}
body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', sans-serif; margin: 0; padding: 2rem; background: var(--bg); color: var(--fg); }
h1, h2 { margin-top: 2rem; }
.meta { color: #6b7280; }
.notice { color: #b91c1c; font-weight: bold; }
.cards { display: flex; gap: 2rem; flex-wrap: wrap; }
.card { flex: 1 1 20rem; border: 1px solid var(--border); border-radius: 8px; padding: 0 1rem 1rem; }
table { border-collapse: collapse; width: 100%; }
th, td { border-bottom: 1px solid var(--border); padding: 0.4rem 0.8rem; text-align: left; }
.question { border: 1px solid var(--border); border-radius: 8px; padding: 0.5rem 1rem; margin: 1rem 0; }
.question.correct { background: var(--correct); }
.question.incorrect { background: var(--incorrect); }
.question.unattempted { background: var(--unattempted); }
.solution { border-top: 1px dashed var(--border); margin-top: 0.5rem; }
.solution p:first-child { font-weight: bold; }
pre { overflow-x: auto; padding: 1rem; background: var(--border); border-radius: 8px; }
code { font-family: 'JetBrains Mono', 'Fira Code', monospace; font-size: 0.85rem; }
details { margin: 1rem 0; }
summary { cursor: pointer; font-weight: bold; }
svg { margin: 1rem 0; border-radius: 4px; }
"#;
