//! Deterministic local citation formatter.
//!
//! Used whenever the server-side formatter is unavailable. Output is a
//! best-effort NZLSG-style string and is never empty.

use crate::model::{ReferenceDraft, ReferenceType};

const UNKNOWN_AUTHOR: &str = "Unknown Author";
const UNTITLED: &str = "Untitled";
const NO_DATE: &str = "n.d.";

/// First four characters of a date string (`"2020-05-01"` -> `"2020"`).
fn year_of(date: &str) -> String {
    date.chars().take(4).collect()
}

pub fn format_local(reference: &ReferenceDraft) -> String {
    let meta = &reference.metadata;
    let author = meta.author().unwrap_or(UNKNOWN_AUTHOR);
    let title = reference.display_title().unwrap_or(UNTITLED);
    let date = meta.date();
    let year = date.map(year_of);
    let year_or_nd = year.as_deref().unwrap_or(NO_DATE);

    match &reference.kind {
        ReferenceType::Web => {
            let mut out = format!("{author} \"{title}\" ");
            if let Some(publication) = meta.publication() {
                out.push_str(publication);
                out.push(' ');
            }
            out.push_str(date.unwrap_or(NO_DATE));
            let url = meta.url().or_else(|| {
                reference
                    .source_url
                    .as_deref()
                    .map(str::trim)
                    .filter(|u| !u.is_empty())
            });
            if let Some(url) = url {
                out.push_str(&format!(" <{url}>"));
            }
            out
        }
        ReferenceType::Case => format!("{title} [{year_or_nd}]"),
        ReferenceType::Legislation => match year {
            Some(y) => format!("{title} {y} (NZ)"),
            None => format!("{title} (NZ)"),
        },
        ReferenceType::Journal => {
            let mut out = format!("{author} \"{title}\" ({year_or_nd})");
            if let Some(publication) = meta.publication() {
                out.push(' ');
                out.push_str(publication);
            }
            out
        }
        ReferenceType::Book => format!("{author} {title} ({year_or_nd})"),
        ReferenceType::Other(_) => format!("{author} \"{title}\" {}", date.unwrap_or(NO_DATE)),
    }
}
