//! Text rendering for command output. Every function returns a `String` so
//! output can be asserted on without capturing stdout.

use chrono::{DateTime, NaiveDateTime, Utc};
use colored::Colorize;
use moin::client::Revision;
use moin::model::Config;
use timeago::Formatter;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

const LINE_WIDTH: usize = 100;
const REV_WIDTH: usize = 5;
const DATE_WIDTH: usize = 18;
const AUTHOR_WIDTH: usize = 16;
const AGE_WIDTH: usize = 16;
const DEFAULT_MARKER: &str = "*";

pub(super) fn render_page_list(pages: &[String]) -> String {
    let mut out = String::from("Pages on wiki:\n");
    for page in pages {
        out.push_str(&format!("- {}\n", page));
    }
    out
}

pub(super) fn render_search_results(query: &str, pages: &[String]) -> String {
    if pages.is_empty() {
        return format!("{}\n", format!("No pages found matching '{}'", query).dimmed());
    }
    let mut out = String::new();
    for page in pages {
        out.push_str(page);
        out.push('\n');
    }
    out
}

pub(super) fn render_recent(days: u32, pages: &[String]) -> String {
    if pages.is_empty() {
        return format!("No changes in the last {} days\n", days);
    }
    let mut out = format!("{}\n", format!("Changed in the last {} days:", days).bold());
    for page in pages {
        out.push_str(&format!("- {}\n", page));
    }
    out
}

pub(super) fn render_history(page: &str, revisions: &[Revision], now: DateTime<Utc>) -> String {
    if revisions.is_empty() {
        return format!("{}\n", format!("No history available for {}", page).dimmed());
    }

    let comment_width =
        LINE_WIDTH.saturating_sub(REV_WIDTH + DATE_WIDTH + AUTHOR_WIDTH + AGE_WIDTH + 4);

    let mut out = format!(
        "{}\n",
        format!(
            "{} {} {} {} {}",
            pad("REV", REV_WIDTH),
            pad("DATE", DATE_WIDTH),
            pad("AUTHOR", AUTHOR_WIDTH),
            pad("AGE", AGE_WIDTH),
            "COMMENT"
        )
        .bold()
    );

    for rev in revisions {
        let date = rev
            .last_modified
            .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".to_string());
        let age = rev
            .last_modified
            .map(|dt| format_age(dt, now))
            .unwrap_or_default();
        let author = if rev.author.is_empty() {
            "-"
        } else {
            rev.author.as_str()
        };

        out.push_str(&format!(
            "{} {} {} {} {}\n",
            pad(&rev.version.to_string(), REV_WIDTH).yellow(),
            pad(&date, DATE_WIDTH),
            pad(&truncate_to_width(author, AUTHOR_WIDTH), AUTHOR_WIDTH),
            pad(&age, AGE_WIDTH).dimmed(),
            truncate_to_width(&rev.comment, comment_width)
        ));
    }
    out
}

pub(super) fn render_servers(config: &Config) -> String {
    if config.servers.is_empty() {
        return "No servers configured. Run `moin auth` to add one.\n".to_string();
    }
    let alias_width = config
        .servers
        .keys()
        .map(|alias| alias.width())
        .max()
        .unwrap_or(0);

    let mut out = String::new();
    for (alias, server) in &config.servers {
        let is_default = *alias == config.settings.default_server;
        let marker = if is_default { DEFAULT_MARKER } else { " " };
        let token_note = if server.has_token() { "" } else { " (no token)" };
        out.push_str(&format!(
            "{} {} {} {}{}\n",
            marker.green(),
            pad(alias, alias_width).bold(),
            server.url,
            server.username.dimmed(),
            token_note.red()
        ));
    }
    out
}

fn pad(s: &str, width: usize) -> String {
    let fill = width.saturating_sub(s.width());
    format!("{}{}", s, " ".repeat(fill))
}

fn truncate_to_width(s: &str, max_width: usize) -> String {
    if s.width() <= max_width {
        return s.to_string();
    }
    let mut result = String::new();
    let mut current_width = 0;
    for c in s.chars() {
        let char_width = c.width().unwrap_or(0);
        if current_width + char_width > max_width.saturating_sub(1) {
            break;
        }
        result.push(c);
        current_width += char_width;
    }
    result.push('…');
    result
}

fn format_age(timestamp: NaiveDateTime, now: DateTime<Utc>) -> String {
    let elapsed = now.naive_utc().signed_duration_since(timestamp);
    Formatter::new().convert(elapsed.to_std().unwrap_or_default())
}
