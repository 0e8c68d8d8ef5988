//! Escaping for strings interpolated into card markup.
//!
//! Registry entries and metadata documents come from an IPFS gateway, so
//! anything rendered from them goes through [`escape`] before it reaches
//! `innerHTML`.

pub fn escape(raw: &str) -> String {
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markup_in_fetched_strings_is_neutralized() {
        assert_eq!(
            escape("<script>alert(1)</script>"),
            "&lt;script&gt;alert(1)&lt;/script&gt;"
        );
    }

    #[test]
    fn attribute_breakout_quotes_are_neutralized() {
        assert_eq!(
            escape(r#"x" onmouseover="evil()"#),
            "x&quot; onmouseover=&quot;evil()"
        );
        assert_eq!(escape("O'Neill & Sons"), "O&#39;Neill &amp; Sons");
    }

    #[test]
    fn plain_text_passes_through() {
        assert_eq!(escape("Kasigau Corridor REDD+"), "Kasigau Corridor REDD+");
    }
}
