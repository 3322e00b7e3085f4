//! Address normalization and visible-text extraction.
//!
//! The cleaned text is substituted verbatim into prompts, so the whitespace
//! rules here are part of the prompt format: every run of two or more
//! whitespace characters becomes a single tab, so does a lone newline, and the
//! ends are trimmed.

use scraper::{Html, Selector};

/// Prefix `https://` unless the address already names an HTTP scheme.
#[must_use]
pub fn normalize_address(address: &str) -> String {
    if address.starts_with("http://") || address.starts_with("https://") {
        address.to_string()
    } else {
        format!("https://{address}")
    }
}

/// Text of the document's `<body>`, cleaned with [`clean_text`].
#[must_use]
pub fn extract_visible_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let raw: String = match Selector::parse("body") {
        Ok(selector) => document
            .select(&selector)
            .flat_map(|body| body.text())
            .collect(),
        Err(_) => document.root_element().text().collect(),
    };
    clean_text(&raw)
}

/// Whitespace as matched by the `\s` class of ECMAScript regular expressions.
const fn is_space(c: char) -> bool {
    matches!(
        c,
        '\t' | '\n'
            | '\u{0b}'
            | '\u{0c}'
            | '\r'
            | ' '
            | '\u{a0}'
            | '\u{1680}'
            | '\u{2000}'..='\u{200a}'
            | '\u{2028}'
            | '\u{2029}'
            | '\u{202f}'
            | '\u{205f}'
            | '\u{3000}'
            | '\u{feff}'
    )
}

/// Collapse whitespace runs of two or more, and lone newlines, into tabs; trim the ends.
#[must_use]
pub fn clean_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if !is_space(c) {
            out.push(c);
            continue;
        }
        let mut run = 1usize;
        while chars.next_if(|&next| is_space(next)).is_some() {
            run += 1;
        }
        if run > 1 || c == '\n' {
            out.push('\t');
        } else {
            out.push(c);
        }
    }

    out.trim_matches(is_space).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_address() {
        assert_eq!(normalize_address("acme.com"), "https://acme.com");
        assert_eq!(normalize_address("http://acme.com"), "http://acme.com");
        assert_eq!(normalize_address("https://acme.com/about"), "https://acme.com/about");
        assert_eq!(normalize_address("HTTPS://acme.com"), "https://HTTPS://acme.com");
    }

    #[test]
    fn test_clean_text_runs_become_tabs() {
        assert_eq!(clean_text("a  b"), "a\tb");
        assert_eq!(clean_text("a \n\n b"), "a\tb");
        assert_eq!(clean_text("a\nb"), "a\tb");
        assert_eq!(clean_text("a b\tc"), "a b\tc");
    }

    #[test]
    fn test_clean_text_trims_ends() {
        assert_eq!(clean_text("\n\n  Acme builds rockets.  \n"), "Acme builds rockets.");
        assert_eq!(clean_text("   "), "");
        assert_eq!(clean_text(""), "");
    }

    #[test]
    fn test_extract_body_text() {
        let html = "<html><head><title>Ignored</title></head>\
                    <body><h1>Acme</h1>\n\n<p>We build   rockets.</p></body></html>";
        assert_eq!(extract_visible_text(html), "Acme\tWe build\trockets.");
    }

    #[test]
    fn test_extract_without_body_markup() {
        assert_eq!(extract_visible_text("just text"), "just text");
    }
}
