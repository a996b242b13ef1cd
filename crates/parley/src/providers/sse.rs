//! Server-Sent Events line parsing for streamed completions.

use futures::stream::{BoxStream, Stream, StreamExt};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio_util::io::StreamReader;

use super::errors::ProviderError;

const DONE_MARKER: &str = "[DONE]";

/// Turn a streaming HTTP body into the sequence of `data:` payloads it carries.
///
/// Multi-line data fields are joined with `\n`. The stream ends at `[DONE]` or
/// at end of body, whichever comes first.
pub fn data_events(response: reqwest::Response) -> BoxStream<'static, Result<String, ProviderError>> {
    let bytes = response
        .bytes_stream()
        .map(|chunk| chunk.map_err(std::io::Error::other))
        .boxed();
    read_events(BufReader::new(StreamReader::new(bytes))).boxed()
}

pub(crate) fn read_events<R>(reader: R) -> impl Stream<Item = Result<String, ProviderError>>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    async_stream::try_stream! {
        let mut lines = reader.lines();
        let mut data = String::new();

        loop {
            let line = lines
                .next_line()
                .await
                .map_err(|e| ProviderError::RequestFailed(format!("stream interrupted: {}", e)))?;

            let Some(line) = line else {
                break;
            };

            if line.is_empty() {
                if data.is_empty() {
                    continue;
                }
                if data == DONE_MARKER {
                    data.clear();
                    break;
                }
                yield std::mem::take(&mut data);
                continue;
            }

            if let Some(value) = line.strip_prefix("data:") {
                if !data.is_empty() {
                    data.push('\n');
                }
                data.push_str(value.strip_prefix(' ').unwrap_or(value));
            }
            // event:, id:, retry: and comment lines carry nothing we use
        }

        if !data.is_empty() && data != DONE_MARKER {
            yield data;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;

    async fn collect(body: &'static str) -> Vec<String> {
        read_events(BufReader::new(body.as_bytes()))
            .try_collect()
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_reads_data_events() {
        let body = "data: {\"a\":1}\n\n: keep-alive\n\ndata: {\"a\":2}\n\n";
        assert_eq!(collect(body).await, vec!["{\"a\":1}", "{\"a\":2}"]);
    }

    #[tokio::test]
    async fn test_stops_at_done_marker() {
        let body = "data: first\n\ndata: [DONE]\n\ndata: ignored\n\n";
        assert_eq!(collect(body).await, vec!["first"]);
    }

    #[tokio::test]
    async fn test_flushes_trailing_event_without_blank_line() {
        let body = "event: message\ndata: one\ndata: two";
        assert_eq!(collect(body).await, vec!["one\ntwo"]);
    }

    #[tokio::test]
    async fn test_accepts_data_without_space() {
        assert_eq!(collect("data:tight\n\n").await, vec!["tight"]);
    }
}
