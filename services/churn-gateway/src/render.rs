use axum::response::Html;

const PAGE: &str = include_str!("../templates/bankdata.html");
const SLOT: &str = "{{ context }}";

/// Context shown on a plain `GET /`.
pub const INITIAL_CONTEXT: &str = "Rendering";

/// The form page with `context` in the result slot.
pub fn page(context: &str) -> Html<String> { Html(PAGE.replacen(SLOT, &escape(context), 1)) }

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}
