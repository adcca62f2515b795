//! `multipart/mixed` encoding of batched queries and decoding of the batched reply.

// self
use crate::{
	_prelude::*,
	batch::BatchResponse,
	error::ConfigError,
	obs::{self, CallKind},
	query::Query,
};

const CRLF: &str = "\r\n";

/// Encodes `queries` as one `application/http` part each, tagged `<item-i>`.
pub(crate) fn encode(queries: &[Query], boundary: &str) -> Result<Vec<u8>, ConfigError> {
	let mut out = String::new();

	for (index, query) in queries.iter().enumerate() {
		out.push_str(&format!("--{boundary}{CRLF}"));
		out.push_str(&format!("Content-Type: application/http{CRLF}"));
		out.push_str(&format!("Content-ID: <item-{index}>{CRLF}{CRLF}"));
		out.push_str(&format!("{} {} HTTP/1.1{CRLF}", query.method(), query.request_target()));

		match query.body().filter(|body| !body.is_null()) {
			Some(body) => {
				let json = serde_json::to_string(body)?;

				out.push_str(&format!("Content-Type: application/json{CRLF}"));
				out.push_str(&format!("Content-Length: {}{CRLF}{CRLF}", json.len()));
				out.push_str(&format!("{json}{CRLF}"));
			},
			None => out.push_str(CRLF),
		}
	}

	out.push_str(&format!("--{boundary}--{CRLF}"));

	Ok(out.into_bytes())
}

/// Extracts the `boundary` parameter from a `multipart/*` content type.
pub(crate) fn boundary(content_type: Option<&str>) -> Result<String> {
	let content_type = content_type.ok_or_else(|| Error::BatchFormat {
		reason: "The batch response has no Content-Type header.".into(),
	})?;

	content_type
		.split(';')
		.skip(1)
		.find_map(|param| {
			let (name, value) = param.split_once('=')?;

			name.trim()
				.eq_ignore_ascii_case("boundary")
				.then(|| value.trim().trim_matches('"').to_owned())
		})
		.filter(|boundary| !boundary.is_empty())
		.ok_or_else(|| Error::BatchFormat {
			reason: format!("The content type `{content_type}` declares no boundary."),
		})
}

/// Decodes a batched reply into exactly `expected` per-query results.
///
/// Parts land at the index named by their `Content-ID: <response-item-i>` header, or at their
/// position when the header is absent. Parts with no matching query are dropped; queries with
/// no part fail with [`Error::BatchPart`].
pub(crate) fn decode(
	content_type: Option<&str>,
	body: &[u8],
	expected: usize,
) -> Result<Vec<Result<BatchResponse>>> {
	let boundary = boundary(content_type)?;
	// Delimiters only count at the start of a line; the leading newline covers the first one.
	let delimiter = format!("\n--{boundary}");
	let text = format!("\n{}", String::from_utf8_lossy(body));
	let mut slots: Vec<Option<Result<BatchResponse>>> = (0..expected).map(|_| None).collect();
	let mut position = 0;

	for part in text.split(delimiter.as_str()).skip(1) {
		if part.starts_with("--") {
			break;
		}

		let part = part.trim_start_matches(['\r', '\n']);

		if part.trim().is_empty() {
			continue;
		}

		let (headers, payload) =
			if part.starts_with("HTTP/") { ("", part) } else { split_head(part) };
		let index = content_id(headers).unwrap_or(position);

		position += 1;

		match slots.get_mut(index) {
			Some(slot) if slot.is_none() => *slot = Some(parse_part(index, payload)),
			_ => obs::warn_event(
				CallKind::Batch,
				&format!("Dropped batch response part {index} with no matching query."),
			),
		}
	}

	Ok(slots
		.into_iter()
		.enumerate()
		.map(|(index, slot)| {
			slot.unwrap_or_else(|| {
				Err(Error::BatchPart { index, reason: "missing from response".into() })
			})
		})
		.collect())
}

fn parse_part(index: usize, payload: &str) -> Result<BatchResponse> {
	let part_error = |reason: String| Error::BatchPart { index, reason };
	let (head, body) = split_head(payload.trim_start());
	let mut lines = head.lines();
	let status_line = lines.next().unwrap_or_default().trim();
	let status = status_line
		.strip_prefix("HTTP/")
		.and_then(|rest| rest.split_whitespace().nth(1))
		.and_then(|code| code.parse::<u16>().ok())
		.ok_or_else(|| part_error(format!("invalid status line `{status_line}`")))?;
	let headers = lines
		.filter_map(|line| line.split_once(':'))
		.map(|(name, value)| (name.trim().to_ascii_lowercase(), value.trim().to_owned()))
		.collect::<BTreeMap<_, _>>();
	let body = match body.trim() {
		"" => Value::Null,
		raw => serde_json::from_str(raw)
			.map_err(|e| part_error(format!("body is not JSON: {e}")))?,
	};

	if status >= 400 {
		return Err(Error::Remote { status, body });
	}

	Ok(BatchResponse { status, headers, body })
}

fn content_id(headers: &str) -> Option<usize> {
	headers.lines().find_map(|line| {
		let (name, value) = line.split_once(':')?;

		if !name.trim().eq_ignore_ascii_case("content-id") {
			return None;
		}

		let id = value.trim().trim_start_matches('<').trim_end_matches('>');

		id.strip_prefix("response-").unwrap_or(id).strip_prefix("item-")?.parse().ok()
	})
}

/// Splits at the first blank line, accepting CRLF or bare LF line endings.
fn split_head(text: &str) -> (&str, &str) {
	let crlf = text.find("\r\n\r\n").map(|at| (at, 4));
	let lf = text.find("\n\n").map(|at| (at, 2));

	match [crlf, lf].into_iter().flatten().min_by_key(|(at, _)| *at) {
		Some((at, len)) => (&text[..at], &text[at + len..]),
		None => (text, ""),
	}
}
