use std::io::Write;

use citeright_core::{Reference, SessionState};
use citeright_core::message::Response;
use owo_colors::OwoColorize;

/// Whether to use colored output.
#[derive(Debug, Clone, Copy)]
pub struct ColorMode(pub bool);

impl ColorMode {
    pub fn enabled(&self) -> bool {
        self.0
    }
}

fn print_failure(w: &mut dyn Write, message: &str, color: ColorMode) -> std::io::Result<()> {
    if color.enabled() {
        writeln!(w, "{} {}", "error:".red().bold(), message)
    } else {
        writeln!(w, "error: {}", message)
    }
}

fn print_ok(w: &mut dyn Write, message: &str, color: ColorMode) -> std::io::Result<()> {
    if color.enabled() {
        writeln!(w, "{}", message.green())
    } else {
        writeln!(w, "{}", message)
    }
}

/// Print the stored session's state as last persisted.
pub fn print_session_state(
    w: &mut dyn Write,
    state: SessionState,
    color: ColorMode,
) -> std::io::Result<()> {
    let label = match state {
        SessionState::Unauthenticated => "none",
        SessionState::Authenticated => "active",
        SessionState::Expired => "expired",
        SessionState::Refreshing => "refreshing",
    };
    if color.enabled() && state == SessionState::Expired {
        writeln!(w, "Stored session: {}", label.yellow())
    } else {
        writeln!(w, "Stored session: {}", label)
    }
}

/// Print one orchestrator reply in human-readable form.
pub fn print_response(
    w: &mut dyn Write,
    response: &Response,
    color: ColorMode,
) -> std::io::Result<()> {
    if !response.is_success() {
        let message = response.message().unwrap_or("Not signed in");
        return print_failure(w, message, color);
    }

    match response {
        Response::Auth(status) => {
            let user = status.user_id.as_deref().unwrap_or("?");
            print_ok(w, &format!("Signed in (user {})", user), color)
        }
        Response::Login(reply) => {
            let who = reply
                .user
                .as_ref()
                .and_then(|u| u.email.as_deref())
                .or(reply.user_id.as_deref())
                .unwrap_or("?");
            print_ok(w, &format!("Signed in as {}", who), color)
        }
        Response::Ack(reply) => print_ok(w, reply.message.as_deref().unwrap_or("Done"), color),
        Response::Refresh(_) => print_ok(w, "Token refreshed", color),
        Response::Validation(_) => print_ok(w, "Token is valid", color),
        Response::Reference(reply) => {
            print_ok(w, "Reference saved", color)?;
            if let Some(reference) = &reply.reference {
                print_reference(w, reference, color)?;
            }
            Ok(())
        }
        Response::References(reply) => {
            print_references(w, reply.references.as_deref().unwrap_or_default(), color)
        }
        Response::UserInfo(reply) => {
            let user = reply.user.clone().unwrap_or_default();
            writeln!(w, "Email:        {}", user.email.as_deref().unwrap_or("-"))?;
            writeln!(w, "Name:         {}", user.name.as_deref().unwrap_or("-"))?;
            writeln!(w, "Subscription: {}", user.subscription_label())
        }
        Response::Citation(reply) => writeln!(w, "{}", reply.citation),
        Response::ServerUrl(reply) => writeln!(w, "{}", reply.url),
        Response::Settings(reply) => {
            let settings = serde_json::to_string_pretty(&reply.settings).map_err(std::io::Error::other)?;
            writeln!(w, "{}", settings)
        }
    }
}

fn print_reference(w: &mut dyn Write, reference: &Reference, color: ColorMode) -> std::io::Result<()> {
    let header = format!("[{}] {}", reference.id, reference.kind);
    if color.enabled() {
        writeln!(w, "{}", header.dimmed())?;
        writeln!(w, "  {}", reference.formatted_citation.bold())?;
    } else {
        writeln!(w, "{}", header)?;
        writeln!(w, "  {}", reference.formatted_citation)?;
    }
    if let Some(url) = &reference.source_url {
        writeln!(w, "  {}", url)?;
    }
    Ok(())
}

/// Print a reference list, newest first.
pub fn print_references(
    w: &mut dyn Write,
    references: &[Reference],
    color: ColorMode,
) -> std::io::Result<()> {
    if references.is_empty() {
        return writeln!(w, "No references yet.");
    }
    for reference in references {
        print_reference(w, reference, color)?;
    }
    let summary = format!("{} reference(s)", references.len());
    if color.enabled() {
        writeln!(w, "{}", summary.dimmed())
    } else {
        writeln!(w, "{}", summary)
    }
}
