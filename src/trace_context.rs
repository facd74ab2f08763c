//! W3C `traceparent` codec for span linking.
//!
//! Tokens look like `00-0af7651916cd43dd8448eb211c80319c-b9c7c989f97918e1-01`:
//! version, 128-bit trace id, 64-bit span id and the flags byte, all as
//! lowercase hex.

use opentelemetry::trace::{Link, SpanContext, SpanId, TraceFlags, TraceId, TraceState};

use crate::error::TraceContextError;

const SUPPORTED_VERSION: u8 = 0;
const INVALID_VERSION: &str = "ff";

/// Parse a serialized trace-context token into a remote [`SpanContext`].
///
/// The flags byte is kept as-is so that [`format`] reproduces the token.
pub fn parse(token: &str) -> Result<SpanContext, TraceContextError> {
    let parts: Vec<&str> = token.trim().split('-').collect();
    if parts.len() != 4 {
        return Err(TraceContextError::FieldCount(parts.len()));
    }

    let version = parts[0];
    if !is_lower_hex(version, 2) || version == INVALID_VERSION {
        return Err(TraceContextError::Version);
    }

    if !is_lower_hex(parts[1], 32) {
        return Err(TraceContextError::TraceId);
    }
    let trace_id = TraceId::from_hex(parts[1]).map_err(|_| TraceContextError::TraceId)?;
    if trace_id == TraceId::INVALID {
        return Err(TraceContextError::TraceId);
    }

    if !is_lower_hex(parts[2], 16) {
        return Err(TraceContextError::SpanId);
    }
    let span_id = SpanId::from_hex(parts[2]).map_err(|_| TraceContextError::SpanId)?;
    if span_id == SpanId::INVALID {
        return Err(TraceContextError::SpanId);
    }

    if !is_lower_hex(parts[3], 2) {
        return Err(TraceContextError::Flags);
    }
    let flags = u8::from_str_radix(parts[3], 16).map_err(|_| TraceContextError::Flags)?;

    Ok(SpanContext::new(
        trace_id,
        span_id,
        TraceFlags::new(flags),
        true,
        TraceState::default(),
    ))
}

/// Serialize a [`SpanContext`] into its canonical `traceparent` form.
pub fn format(context: &SpanContext) -> String {
    format!(
        "{:02x}-{:032x}-{:016x}-{:02x}",
        SUPPORTED_VERSION,
        u128::from_be_bytes(context.trace_id().to_bytes()),
        u64::from_be_bytes(context.span_id().to_bytes()),
        context.trace_flags().to_u8()
    )
}

/// Two contexts identify the same span when trace and span ids match.
pub fn same_span(a: &SpanContext, b: &SpanContext) -> bool {
    a.trace_id() == b.trace_id() && a.span_id() == b.span_id()
}

/// A linked token that could not be turned into a [`Link`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedToken {
    pub index: usize,
    pub token: String,
    pub reason: TraceContextError,
}

/// Outcome of parsing a batch of linked tokens.
#[derive(Debug, Default)]
pub struct ParsedLinks {
    pub links: Vec<Link>,
    pub skipped: Vec<SkippedToken>,
}

/// Parse every token independently; malformed tokens are skipped, not fatal.
pub fn parse_links<S: AsRef<str>>(tokens: &[S]) -> ParsedLinks {
    let mut parsed = ParsedLinks::default();
    for (index, token) in tokens.iter().enumerate() {
        let token = token.as_ref();
        match parse(token) {
            Ok(context) => parsed.links.push(Link::with_context(context)),
            Err(reason) => {
                tracing::debug!(index, token, %reason, "Skipping malformed linked trace context");
                parsed.skipped.push(SkippedToken {
                    index,
                    token: token.to_string(),
                    reason,
                });
            }
        }
    }
    parsed
}

fn is_lower_hex(field: &str, len: usize) -> bool {
    field.len() == len && field.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOKEN: &str = "00-0af7651916cd43dd8448eb211c80319c-b9c7c989f97918e1-01";

    #[test]
    fn test_parse_valid_token() {
        let context = parse(TOKEN).unwrap();
        assert_eq!(
            context.trace_id(),
            TraceId::from_hex("0af7651916cd43dd8448eb211c80319c").unwrap()
        );
        assert_eq!(context.span_id(), SpanId::from_hex("b9c7c989f97918e1").unwrap());
        assert!(context.is_sampled());
        assert!(context.is_remote());
    }

    #[test]
    fn test_format_reproduces_token() {
        let context = parse(TOKEN).unwrap();
        assert_eq!(format(&context), TOKEN);
    }

    #[test]
    fn test_round_trip_preserves_identity_and_flags() {
        let contexts = [
            SpanContext::new(
                TraceId::from(1u128),
                SpanId::from(1u64),
                TraceFlags::NOT_SAMPLED,
                false,
                TraceState::default(),
            ),
            SpanContext::new(
                TraceId::from(u128::MAX),
                SpanId::from(u64::MAX),
                TraceFlags::new(0xff),
                true,
                TraceState::default(),
            ),
        ];

        for context in &contexts {
            let parsed = parse(&format(context)).unwrap();
            assert!(same_span(context, &parsed));
            assert_eq!(parsed.trace_flags(), context.trace_flags());
        }
    }

    #[test]
    fn test_format_pads_short_ids() {
        let context = SpanContext::new(
            TraceId::from(0x42u128),
            SpanId::from(0x7u64),
            TraceFlags::SAMPLED,
            false,
            TraceState::default(),
        );
        assert_eq!(
            format(&context),
            "00-00000000000000000000000000000042-0000000000000007-01"
        );
    }

    #[test]
    fn test_parse_rejects_malformed_tokens() {
        let cases = [
            ("", TraceContextError::FieldCount(1)),
            ("not-a-token", TraceContextError::FieldCount(3)),
            (
                "00-0af7651916cd43dd8448eb211c80319c-b9c7c989f97918e1",
                TraceContextError::FieldCount(3),
            ),
            (
                "00-0af7651916cd43dd8448eb211c80319c-b9c7c989f97918e1-01-",
                TraceContextError::FieldCount(5),
            ),
            (
                "ff-0af7651916cd43dd8448eb211c80319c-b9c7c989f97918e1-01",
                TraceContextError::Version,
            ),
            (
                "qw-0af7651916cd43dd8448eb211c80319c-b9c7c989f97918e1-01",
                TraceContextError::Version,
            ),
            (
                "00-00000000000000000000000000000000-b9c7c989f97918e1-01",
                TraceContextError::TraceId,
            ),
            (
                "00-0AF7651916CD43DD8448EB211C80319C-b9c7c989f97918e1-01",
                TraceContextError::TraceId,
            ),
            (
                "00-+af7651916cd43dd8448eb211c80319c-b9c7c989f97918e1-01",
                TraceContextError::TraceId,
            ),
            (
                "00-0af7651916cd43dd8448eb211c8031-b9c7c989f97918e1-01",
                TraceContextError::TraceId,
            ),
            (
                "00-0af7651916cd43dd8448eb211c80319c-0000000000000000-01",
                TraceContextError::SpanId,
            ),
            (
                "00-0af7651916cd43dd8448eb211c80319c-qw00000000000000-01",
                TraceContextError::SpanId,
            ),
            (
                "00-0af7651916cd43dd8448eb211c80319c-b9c7c989f97918e1-1",
                TraceContextError::Flags,
            ),
            (
                "00-0af7651916cd43dd8448eb211c80319c-b9c7c989f97918e1-zz",
                TraceContextError::Flags,
            ),
        ];

        for (token, expected) in cases {
            assert_eq!(parse(token), Err(expected), "token: {token:?}");
        }
    }

    #[test]
    fn test_parse_trims_whitespace() {
        assert!(parse(&format!("  {TOKEN}\n")).is_ok());
    }

    #[test]
    fn test_parse_links_skips_bad_tokens() {
        let parsed = parse_links(&[TOKEN, "not-a-token", TOKEN]);
        assert_eq!(parsed.links.len(), 2);
        assert_eq!(parsed.skipped.len(), 1);
        assert_eq!(parsed.skipped[0].index, 1);
        assert_eq!(parsed.skipped[0].token, "not-a-token");
        assert_eq!(parsed.skipped[0].reason, TraceContextError::FieldCount(3));
    }

    #[test]
    fn test_same_span_ignores_flags() {
        let a = parse(TOKEN).unwrap();
        let b = parse("00-0af7651916cd43dd8448eb211c80319c-b9c7c989f97918e1-00").unwrap();
        assert!(same_span(&a, &b));
    }
}
