//! OAuth 1.0 parameter encoding (RFC 5849 §3.6).
//!
//! OAuth percent-encoding differs from `application/x-www-form-urlencoded`:
//! only the RFC 3986 unreserved characters pass through, and a space is
//! always `%20`. Every name and value that takes part in a signature base
//! string goes through [`percent_encode`].

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str};

use crate::request::{ParamValue, Parameters};

/// OAuth unreserved characters: A-Z a-z 0-9 - . _ ~
const OAUTH_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Percent-encodes a string per RFC 3986, as required for OAuth signatures.
#[must_use]
pub fn percent_encode(input: &str) -> String {
    percent_encoding::utf8_percent_encode(input, OAUTH_ENCODE_SET).to_string()
}

/// Decodes a form or query component.
///
/// `+` is treated as a space, as browsers and form encoders produce it.
/// Invalid UTF-8 is replaced rather than rejected.
#[must_use]
pub fn percent_decode(input: &str) -> String {
    let plus_as_space = input.replace('+', " ");
    percent_decode_str(&plus_as_space)
        .decode_utf8_lossy()
        .into_owned()
}

/// Parses a query string or form body into parameters.
///
/// Each `&`-separated segment is split on its first `=`; a segment without
/// `=` yields an empty value. Repeated names accumulate into a
/// [`ParamValue::Multi`] in the order they appear.
#[must_use]
pub fn parse_parameters(input: &str) -> Parameters {
    let mut parameters = Parameters::new();

    for segment in input.split('&').filter(|s| !s.is_empty()) {
        let (name, value) = segment.split_once('=').unwrap_or((segment, ""));
        parameters.append(percent_decode(name), percent_decode(value));
    }

    parameters
}

/// Parses the parameters of an `Authorization: OAuth ...` header value.
///
/// The leading `OAuth` scheme is optional. Only protocol parameters
/// (`oauth_*`) are returned; `realm` and any other entry are dropped. Commas
/// inside quoted values do not separate entries.
#[must_use]
pub fn split_authorization_header(header: &str) -> Parameters {
    let trimmed = header.trim_start();
    let body = trimmed
        .get(..6)
        .filter(|scheme| scheme.eq_ignore_ascii_case("OAuth "))
        .map_or(trimmed, |_| &trimmed[6..]);

    let mut parameters = Parameters::new();

    for entry in split_unquoted_commas(body) {
        let Some((name, value)) = entry.split_once('=') else {
            continue;
        };
        let name = name.trim();
        if !name.starts_with("oauth_") {
            continue;
        }
        let value = value.trim();
        let value = value
            .strip_prefix('"')
            .and_then(|v| v.strip_suffix('"'))
            .unwrap_or(value);

        parameters.set(percent_decode(name), ParamValue::Single(percent_decode(value)));
    }

    parameters
}

fn split_unquoted_commas(input: &str) -> Vec<&str> {
    let mut entries = Vec::new();
    let mut in_quotes = false;
    let mut start = 0;

    for (i, c) in input.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                entries.push(&input[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    entries.push(&input[start..]);

    entries
}

/// Builds the normalized parameter string (RFC 5849 §3.4.1.3.2).
///
/// Names and values are encoded first, multi-valued parameters expand to one
/// pair per value, and the pairs are sorted by encoded name and then by
/// encoded value.
#[must_use]
pub fn build_http_query<'a>(
    parameters: impl IntoIterator<Item = (&'a str, &'a ParamValue)>,
) -> String {
    let mut pairs: Vec<(String, String)> = parameters
        .into_iter()
        .flat_map(|(name, value)| {
            let name = percent_encode(name);
            value
                .values()
                .map(move |v| (name.clone(), percent_encode(v)))
        })
        .collect();

    pairs.sort_unstable();

    pairs
        .iter()
        .map(|(name, value)| format!("{name}={value}"))
        .collect::<Vec<_>>()
        .join("&")
}
