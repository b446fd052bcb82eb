//! Text normalization for user input and formatted amounts.

/// First code point of each decimal digit block outside ASCII.
const DIGIT_ZEROS: &[u32] = &[
    0x0660, // Arabic-Indic
    0x06F0, // Extended Arabic-Indic
    0x07C0, // NKo
    0x0966, // Devanagari
    0x09E6, // Bengali
    0x0A66, // Gurmukhi
    0x0AE6, // Gujarati
    0x0B66, // Oriya
    0x0BE6, // Tamil
    0x0C66, // Telugu
    0x0CE6, // Kannada
    0x0D66, // Malayalam
    0x0E50, // Thai
    0x0ED0, // Lao
    0x0F20, // Tibetan
    0x1040, // Myanmar
    0x17E0, // Khmer
    0x1810, // Mongolian
    0xFF10, // Fullwidth
];

/// Map a non-ASCII decimal digit to its ASCII form.
fn ascii_digit(c: char) -> Option<char> {
    let cp = c as u32;
    DIGIT_ZEROS
        .iter()
        .find(|&&zero| cp >= zero && cp < zero + 10)
        .and_then(|&zero| char::from_digit(cp - zero, 10))
}

/// Replace locale specific separators and operator glyphs with plain ASCII.
///
/// Decimal commas become dots; grouping spaces and Arabic thousands
/// separators are dropped.
pub fn replace_unsupported_characters(input: &str) -> String {
    input
        .chars()
        .filter_map(|c| match c {
            ',' | '\u{066B}' => Some('.'),
            ' ' | '\u{00A0}' | '\u{202F}' | '\u{066C}' | '\'' => None,
            '\u{2212}' => Some('-'),
            '×' => Some('*'),
            '÷' => Some('/'),
            other => Some(other),
        })
        .collect()
}

/// Replace non-ASCII decimal digits with ASCII digits.
pub fn replace_non_standard_digits(input: &str) -> String {
    input
        .chars()
        .map(|c| ascii_digit(c).unwrap_or(c))
        .collect()
}

/// Rewrite `%` as a division by one hundred.
///
/// A trailing percent (`50%`, `(10+5%)`) divides its operand; a percent
/// followed by an operand (`50%200`) also multiplies by it.
pub fn expand_percent(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len() + 8);

    for (i, c) in chars.iter().enumerate() {
        if *c != '%' {
            out.push(*c);
            continue;
        }

        out.push_str("/100");
        let next = chars[i + 1..].iter().find(|c| !c.is_whitespace());
        match next {
            None | Some('+' | '-' | '*' | '/' | ')' | '%') => {}
            Some(_) => out.push('*'),
        }
    }

    out
}

/// Prepare raw user input for the expression parser.
pub fn normalize_expression(input: &str) -> String {
    expand_percent(&replace_non_standard_digits(&replace_unsupported_characters(
        input,
    )))
}

/// Reduce a formatted amount to something `f64::from_str` accepts.
///
/// Digits are mapped to ASCII and any stray symbol other than the sign
/// and the decimal point is removed.
pub fn normalize_amount(raw: &str) -> String {
    replace_non_standard_digits(&replace_unsupported_characters(raw))
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect()
}
