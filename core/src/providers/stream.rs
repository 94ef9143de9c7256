use crate::traits::ProviderEvent;
use futures_util::StreamExt as _;
use futures_util::stream::BoxStream;
use tokio_stream::wrappers::ReceiverStream;

/// Turns one line of a streamed response body into provider events.
pub(crate) trait LineParser: Send + 'static {
    fn parse_line(&mut self, line: &str) -> Vec<ProviderEvent>;

    /// Events still pending once the body ends.
    fn finish(&mut self) -> Vec<ProviderEvent> {
        Vec::new()
    }
}

/// Reads the response body line by line on a background task.
pub(crate) fn spawn_line_stream<P: LineParser>(
    response: reqwest::Response,
    mut parser: P,
) -> BoxStream<'static, ProviderEvent> {
    let (tx, rx) = tokio::sync::mpsc::channel::<ProviderEvent>(256);

    tokio::spawn(async move {
        let mut body = response.bytes_stream();
        let mut buffer: Vec<u8> = Vec::new();

        while let Some(chunk) = body.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    let _ = tx.send(ProviderEvent::Error(e.to_string())).await;
                    return;
                }
            };
            buffer.extend_from_slice(&chunk);

            while let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = buffer.drain(..=pos).collect();
                let line = String::from_utf8_lossy(&line);
                for event in parser.parse_line(line.trim_end()) {
                    if tx.send(event).await.is_err() {
                        return;
                    }
                }
            }
        }

        let tail = String::from_utf8_lossy(&buffer).into_owned();
        let mut events = parser.parse_line(tail.trim_end());
        events.extend(parser.finish());
        for event in events {
            if tx.send(event).await.is_err() {
                return;
            }
        }

        let _ = tx.send(ProviderEvent::Done).await;
    });

    ReceiverStream::new(rx).boxed()
}

/// Payload of a server-sent-events `data:` line.
pub(crate) fn sse_data(line: &str) -> Option<&str> {
    line.strip_prefix("data:")
        .map(str::trim_start)
        .filter(|data| !data.is_empty() && *data != "[DONE]")
}
