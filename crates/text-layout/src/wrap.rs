//! Width-budgeted line wrapping.

use promoreel_common::error::{PromoreelError, PromoreelResult};

/// Average glyph advance as a fraction of the point size.
pub const AVG_CHAR_WIDTH_FACTOR: f64 = 0.6;

/// Number of characters that fit in `max_pixel_width` at `font_pt`.
pub fn max_chars(max_pixel_width: f64, font_pt: f64) -> PromoreelResult<usize> {
    if !max_pixel_width.is_finite() || max_pixel_width <= 0.0 {
        return Err(PromoreelError::layout(format!(
            "max pixel width must be positive, got {max_pixel_width}"
        )));
    }
    if !font_pt.is_finite() || font_pt <= 0.0 {
        return Err(PromoreelError::layout(format!(
            "font size must be positive, got {font_pt}"
        )));
    }

    let avg_char_width = font_pt * AVG_CHAR_WIDTH_FACTOR;
    let chars = (max_pixel_width / avg_char_width).floor() as usize;
    if chars == 0 {
        return Err(PromoreelError::layout(format!(
            "{max_pixel_width}px cannot fit a single {font_pt}pt character"
        )));
    }
    Ok(chars)
}

/// Wrap `text` into lines that fit `max_pixel_width` at `base_font_pt`.
///
/// Text without a space is treated as one unsplittable token (a URL, say)
/// and cut into fixed-size chunks. Anything else is greedily word-wrapped;
/// a word longer than the budget gets a line of its own and is never split.
/// Lengths count characters, not bytes.
pub fn wrap(text: &str, max_pixel_width: f64, base_font_pt: f64) -> PromoreelResult<Vec<String>> {
    let limit = max_chars(max_pixel_width, base_font_pt)?;

    if text.is_empty() {
        return Ok(Vec::new());
    }

    if !text.contains(' ') {
        return Ok(chunk_chars(text, limit));
    }

    Ok(wrap_words(text, limit))
}

fn chunk_chars(text: &str, limit: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(limit)
        .map(|chunk| chunk.iter().collect())
        .collect()
}

fn wrap_words(text: &str, limit: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut line = String::new();
    let mut line_len = 0usize;

    for word in text.split_whitespace() {
        let word_len = word.chars().count();

        if line.is_empty() {
            line.push_str(word);
            line_len = word_len;
        } else if line_len + 1 + word_len <= limit {
            line.push(' ');
            line.push_str(word);
            line_len += 1 + word_len;
        } else {
            lines.push(std::mem::take(&mut line));
            line.push_str(word);
            line_len = word_len;
        }
    }

    if !line.is_empty() {
        lines.push(line);
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_url_chunks_at_budget() {
        let url = "https://cdma.ap.gov.in/en/vijayawada-municipal-corporation";
        let lines = wrap(url, 600.0, 26.0).unwrap();

        assert_eq!(max_chars(600.0, 26.0).unwrap(), 38);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].chars().count(), 38);
        assert_eq!(lines[0], "https://cdma.ap.gov.in/en/vijayawada-m");
        assert_eq!(lines[1], "unicipal-corporation");
        assert_eq!(lines.concat(), url);
    }

    #[test]
    fn test_word_wrap_greedy() {
        // 61px at 10pt -> 10 chars per line
        let lines = wrap("pay your tax before march", 61.0, 10.0).unwrap();
        assert_eq!(lines, vec!["pay your", "tax before", "march"]);
    }

    #[test]
    fn test_empty_text_yields_no_lines() {
        assert!(wrap("", 600.0, 26.0).unwrap().is_empty());
        assert!(wrap("    ", 600.0, 26.0).unwrap().is_empty());
    }

    #[test]
    fn test_exact_budget_is_single_line() {
        let text = "a".repeat(38);
        assert_eq!(wrap(&text, 600.0, 26.0).unwrap(), vec![text.clone()]);

        let spaced = format!("{} {}", "a".repeat(18), "b".repeat(19));
        assert_eq!(spaced.chars().count(), 38);
        assert_eq!(wrap(&spaced, 600.0, 26.0).unwrap(), vec![spaced.clone()]);
    }

    #[test]
    fn test_long_word_keeps_its_own_line() {
        let lines = wrap("see averyveryverylongword now", 61.0, 10.0).unwrap();
        assert_eq!(lines, vec!["see", "averyveryverylongword", "now"]);
    }

    #[test]
    fn test_counts_chars_not_bytes() {
        // 3 chars per line; '₹' is three bytes in UTF-8
        let lines = wrap("₹₹₹₹₹", 19.0, 10.0).unwrap();
        assert_eq!(lines, vec!["₹₹₹", "₹₹"]);
    }

    #[test]
    fn test_rejects_invalid_budget() {
        assert!(wrap("text", 0.0, 26.0).is_err());
        assert!(wrap("text", -10.0, 26.0).is_err());
        assert!(wrap("text", 600.0, 0.0).is_err());
        assert!(wrap("text", f64::NAN, 26.0).is_err());
        // 5px cannot hold one 26pt glyph
        assert!(wrap("text", 5.0, 26.0).is_err());
    }

    proptest! {
        #[test]
        fn test_token_chunks_cover_input(
            text in "[a-z0-9./:-]{1,200}",
            k in 1usize..60,
        ) {
            // width chosen so that floor(width / 6) == k at 10pt
            let width = k as f64 * 6.0 + 1.0;
            let lines = wrap(&text, width, 10.0).unwrap();
            let n = text.chars().count();

            prop_assert_eq!(lines.len(), (n + k - 1) / k);
            for (i, line) in lines.iter().enumerate() {
                let len = line.chars().count();
                if i + 1 < lines.len() {
                    prop_assert_eq!(len, k);
                } else {
                    prop_assert!(len >= 1 && len <= k);
                }
            }
            prop_assert_eq!(lines.concat(), text);
        }

        #[test]
        fn test_word_wrap_respects_budget(
            words in proptest::collection::vec("[a-zA-Z0-9.]{1,15}", 2..20),
            k in 4usize..40,
        ) {
            let text = words.join(" ");
            let width = k as f64 * 6.0 + 1.0;
            let lines = wrap(&text, width, 10.0).unwrap();

            for line in &lines {
                let fits = line.chars().count() <= k;
                let lone_word = !line.contains(' ');
                prop_assert!(fits || lone_word);
            }

            let rejoined: Vec<&str> = lines.iter().flat_map(|l| l.split(' ')).collect();
            prop_assert_eq!(rejoined, words.iter().map(String::as_str).collect::<Vec<_>>());
        }

        #[test]
        fn test_wrap_is_deterministic(
            text in "[a-z ]{0,120}",
            width in 20.0f64..800.0,
            pt in 8.0f64..60.0,
        ) {
            prop_assume!(max_chars(width, pt).is_ok());
            prop_assert_eq!(wrap(&text, width, pt).unwrap(), wrap(&text, width, pt).unwrap());
        }
    }
}
