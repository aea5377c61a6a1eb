//! URL-encoded form parsing.

use std::borrow::Cow;

use super::FormValues;

/// Percent decode a form component, treating `+` as a space.
///
/// Returns `Cow::Borrowed` when nothing needs decoding.
#[inline]
pub fn form_decode(s: &str) -> Cow<'_, str> {
    if !s.contains(['%', '+']) {
        return Cow::Borrowed(s);
    }
    let spaced = s.replace('+', " ");
    Cow::Owned(
        percent_encoding::percent_decode_str(&spaced)
            .decode_utf8_lossy()
            .into_owned(),
    )
}

/// Parse `application/x-www-form-urlencoded` text (or a query string).
///
/// Pairs with an empty key are skipped; a pair without `=` has an empty value.
/// Repeated keys are kept in order.
pub fn parse_urlencoded(input: &str) -> FormValues {
    let pair_count = input.matches('&').count() + 1;
    let mut values = FormValues::with_capacity(pair_count.min(16));

    for pair in input.split('&') {
        if pair.is_empty() {
            continue;
        }

        let (key, value) = match pair.find('=') {
            Some(pos) => (&pair[..pos], &pair[pos + 1..]),
            None => (pair, ""),
        };

        let key = form_decode(key);
        if !key.is_empty() {
            values.push(key.into_owned(), form_decode(value).into_owned());
        }
    }

    values
}
