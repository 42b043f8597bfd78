//! examguard-report: shareable result pages for graded sessions.

pub mod html;

pub use html::{generate_html, write_html_report};
