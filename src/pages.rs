//! Server-rendered HTML for the calendar picker and the watch confirmation.

use crate::calendar::CalendarListEntry;
use crate::router::AUTH_CALLBACK_PATH;

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn layout(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <title>{}</title>\n</head>\n<body>\n{}</body>\n</html>\n",
        escape_html(title),
        body
    )
}

/// One form per calendar; submitting it registers a watch channel.
pub fn calendar_picker(
    user_name: &str,
    access_token: &str,
    calendars: &[CalendarListEntry],
) -> String {
    let mut body = format!("<h1>Hi {}, pick a calendar to watch</h1>\n", escape_html(user_name));
    if calendars.is_empty() {
        body.push_str("<p>No calendars found.</p>\n");
    }
    for calendar in calendars {
        let label = calendar.summary.as_deref().unwrap_or(&calendar.id);
        body.push_str(&format!(
            "<form method=\"post\" action=\"/{action}\">\n\
             <input type=\"hidden\" name=\"access_token\" value=\"{token}\">\n\
             <input type=\"hidden\" name=\"calendar_id\" value=\"{id}\">\n\
             <button type=\"submit\">{label}{primary}</button>\n\
             </form>\n",
            action = AUTH_CALLBACK_PATH,
            token = escape_html(access_token),
            id = escape_html(&calendar.id),
            label = escape_html(label),
            primary = if calendar.primary { " (primary)" } else { "" },
        ));
    }
    layout("Calendars", &body)
}

pub fn watch_confirmation(channel_id: &str) -> String {
    layout(
        "Watching",
        &format!(
            "<h1>Watching calendar</h1>\n<p>Channel <code>{}</code> is active.</p>\n",
            escape_html(channel_id)
        ),
    )
}
