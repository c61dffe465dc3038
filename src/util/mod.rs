#[inline]
pub fn is_numeric(c: char) -> bool {
    c.is_ascii_digit()
}

#[inline]
pub fn is_sign(c: char) -> bool {
    c == '-' || c == '+'
}

/// Characters that may begin an identifier. Anything else that is not
/// already claimed by another token kind is rejected by the lexer.
#[inline]
pub fn is_identifier_start(c: char) -> bool {
    c.is_alphabetic() || matches!(c, '_' | '+' | '-' | '*' | '/' | '%' | '&' | '|' | '?' | '$' | '.' | ':' | '@' | '^' | '~')
}

/// Identifiers run until whitespace or a parenthesis.
#[inline]
pub fn is_identifier_continue(c: char) -> bool {
    !c.is_whitespace() && c != '(' && c != ')'
}
