//! HLS playlist rewriting.
//!
//! Every media segment, variant playlist and key referenced by a manifest is
//! resolved against the manifest URL and pointed back at the relay, so the
//! player never talks to the camera directly.

use lazy_static::lazy_static;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use regex::{Captures, Regex};
use std::borrow::Cow;
use url::Url;

/// Characters left alone by `encodeURIComponent`
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

lazy_static! {
    static ref URI_ATTRIBUTE: Regex = Regex::new(r#"URI="([^"]+)""#).expect("URI attribute pattern is valid");
}

/// `<proxy_base>?resource=<encoded absolute url>`
pub fn proxied_resource_url(proxy_base: &str, absolute: &str) -> String {
    format!(
        "{}?resource={}",
        proxy_base,
        utf8_percent_encode(absolute, URI_COMPONENT)
    )
}

/// Whether a body is an HLS playlist at all (`#EXTM3U` header, any case)
pub fn is_manifest_document(text: &str) -> bool {
    text.trim_start_matches('\u{feff}')
        .trim_start()
        .get(..7)
        .map(|head| head.eq_ignore_ascii_case("#EXTM3U"))
        .unwrap_or(false)
}

/// Rewrite a playlist so every referenced URI routes through `proxy_base`.
///
/// Line count and order are preserved. References that cannot be resolved
/// against `base` are left as they are.
pub fn rewrite_playlist(text: &str, base: &Url, proxy_base: &str) -> String {
    text.split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .map(|line| rewrite_line(line, base, proxy_base))
        .collect::<Vec<_>>()
        .join("\n")
}

fn rewrite_line<'a>(line: &'a str, base: &Url, proxy_base: &str) -> Cow<'a, str> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Cow::Borrowed(line);
    }

    if trimmed.starts_with('#') {
        // Every URI="..." on the tag is rewritten, not just the first one.
        return URI_ATTRIBUTE.replace_all(line, |caps: &Captures| match base.join(&caps[1]) {
            Ok(absolute) => format!(
                "URI=\"{}\"",
                proxied_resource_url(proxy_base, absolute.as_str())
            ),
            Err(_) => caps[0].to_string(),
        });
    }

    match base.join(trimmed) {
        Ok(absolute) => Cow::Owned(proxied_resource_url(proxy_base, absolute.as_str())),
        Err(_) => Cow::Borrowed(line),
    }
}
