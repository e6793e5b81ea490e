use crate::stream::{DecodedLine, LineDecoder, ndjson_payload};

use super::error::error_from_detail;
use super::response::response_events;
use super::types::GeminiGenerateContentResponse;

/// Decodes the newline-delimited JSON stream of `streamGenerateContent`.
///
/// Each object repeats the usage totals so far, which is why usage is cumulative.
#[derive(Debug, Default)]
pub(crate) struct GeminiNdjsonDecoder;

impl LineDecoder for GeminiNdjsonDecoder {
    fn decode_line(&mut self, line: &str) -> DecodedLine {
        let Some(payload) = ndjson_payload(line) else {
            return DecodedLine::Ignored;
        };
        let chunk: GeminiGenerateContentResponse = match serde_json::from_str(payload) {
            Ok(chunk) => chunk,
            Err(err) => return DecodedLine::Malformed(err.to_string()),
        };
        if let Some(detail) = &chunk.error {
            return DecodedLine::Failed(error_from_detail(None, detail, None));
        }
        DecodedLine::Events(response_events(chunk))
    }
}

#[cfg(test)]
mod tests {
    use futures_util::stream;

    use super::*;
    use crate::error::{ErrorCategory, LLMError};
    use crate::http::HttpBodyStream;
    use crate::stream::{StreamDecoder, assemble};

    fn body(chunks: Vec<&str>) -> HttpBodyStream {
        Box::pin(stream::iter(
            chunks
                .into_iter()
                .map(|chunk| Ok::<_, LLMError>(chunk.as_bytes().to_vec()))
                .collect::<Vec<_>>(),
        ))
    }

    #[tokio::test]
    async fn cumulative_usage_overwrites() {
        let decoder = StreamDecoder::new(
            body(vec![
                "{\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"Hel\"}]}}],\"usageMetadata\":{\"promptTokenCount\":4,\"candidatesTokenCount\":1}}\n",
                "{\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"lo\"}]},\"finishReason\":\"STOP\"}],\"usageMetadata\":{\"promptTokenCount\":4,\"candidatesTokenCount\":2}}",
            ]),
            GeminiNdjsonDecoder,
            "google_gemini",
        );
        let response = assemble(decoder, None).await.unwrap();
        assert_eq!(response.text, "Hello");
        assert_eq!(response.input_tokens, Some(4));
        assert_eq!(response.output_tokens, Some(2));
        assert_eq!(response.terminal_reason.as_deref(), Some("STOP"));
    }

    #[tokio::test]
    async fn array_framed_stream_decodes_line_by_line() {
        let decoder = StreamDecoder::new(
            body(vec![
                "[{\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"a\"}]}}]}\n",
                ",{\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"b\"}]},\"finishReason\":\"MAX_TOKENS\"}]}\n",
                "]",
            ]),
            GeminiNdjsonDecoder,
            "google_gemini",
        );
        let response = assemble(decoder, None).await.unwrap();
        assert_eq!(response.text, "ab");
        assert_eq!(response.terminal_reason.as_deref(), Some("MAX_TOKENS"));
    }

    #[test]
    fn in_band_error_fails_the_stream() {
        let mut decoder = GeminiNdjsonDecoder;
        match decoder.decode_line(
            r#"{"error":{"code":503,"message":"The model is overloaded.","status":"UNAVAILABLE"}}"#,
        ) {
            DecodedLine::Failed(err) => assert_eq!(err.category(), ErrorCategory::Overloaded),
            other => panic!("unexpected {other:?}"),
        }
    }
}
