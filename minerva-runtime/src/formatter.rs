//! Display formatting for turns

use minerva_core::Turn;

/// Render a turn as `"{author}:\n{text}"`; an absent or empty turn renders as `""`
pub fn to_display(turn: Option<&Turn>) -> String {
    match turn {
        Some(turn) if !turn.is_empty() => {
            format!("{}:\n{}", turn.author, normalize_line_breaks(&turn.text()))
        }
        _ => String::new(),
    }
}

/// Convert CRLF and lone CR line endings to LF
pub fn normalize_line_breaks(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "\n")
}

/// Join displayed turns into a preformatted HTML block
pub fn to_html(messages: &[String]) -> String {
    let body: String = messages
        .iter()
        .map(|m| format!("{}<br>", html_escape::encode_text(m).replace('\n', "<br>")))
        .collect();
    format!("<pre>{}</pre>", body)
}
