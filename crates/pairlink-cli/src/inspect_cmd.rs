//! `pairlink inspect`: describe a pasted token without using it.
//!
//! User-facing output uses writeln! to stdout (this is a CLI binary, not debug output).

use std::io::Write;

use pairlink_core::{extract_token, token};

/// Decode `input` (bare token or invite link) and print what it carries.
/// Key bytes are never printed.
pub fn run(input: &str, out: &mut impl Write) -> anyhow::Result<()> {
    let token = extract_token(input);
    let decoded = token::decode(&token)
        .ok_or_else(|| anyhow::anyhow!("Not a pairlink token (checked {} chars)", token.len()))?;

    writeln!(out, "kind:        {:?}", decoded.kind)?;
    writeln!(out, "format:      {:?}", decoded.format)?;
    writeln!(out, "descriptor:  {:?}", decoded.descriptor.kind)?;
    writeln!(out, "sdp length:  {}", decoded.descriptor.sdp.len())?;
    let key = match decoded.key.as_ref() {
        Some(key) => format!("present ({} bytes)", key.len()),
        None => "absent".to_string(),
    };
    writeln!(out, "key:         {key}")?;
    Ok(())
}
