//! Shareable invite links.
//!
//! An invite travels as the fragment of a link, `<origin><path>#<token>`, so
//! the token never reaches the server hosting the page.

use url::Url;

use crate::error::Result;

/// Build `<base_url>#<token>`, replacing any fragment already on the base.
pub fn invite_link(base_url: &str, token: &str) -> Result<String> {
    let mut url = Url::parse(base_url)?;
    url.set_fragment(Some(token));
    Ok(url.into())
}

/// Pull the token out of whatever the user pasted: a full link or the bare token.
pub fn extract_token(input: &str) -> String {
    let trimmed = input.trim();
    Url::parse(trimmed)
        .ok()
        .and_then(|url| url.fragment().map(str::to_owned))
        .unwrap_or_else(|| trimmed.to_owned())
}
