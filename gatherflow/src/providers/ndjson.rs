//! Newline-delimited JSON streaming.

use crate::errors::UpstreamError;
use futures::StreamExt;
use reqwest::Response;
use serde::de::DeserializeOwned;
use std::ops::ControlFlow;

/// Splits a byte stream into complete lines.
///
/// Bytes are buffered until a newline arrives so multi-byte characters split
/// across chunks decode correctly.
#[derive(Debug, Default)]
pub struct LineDecoder {
    buffer: Vec<u8>,
}

impl LineDecoder {
    /// Creates an empty decoder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds a chunk and returns the non-blank lines it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);

        let mut lines = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            let text = String::from_utf8_lossy(&line).trim().to_string();
            if !text.is_empty() {
                lines.push(text);
            }
        }
        lines
    }

    /// Returns the trailing line without a newline, if any.
    pub fn finish(self) -> Option<String> {
        let text = String::from_utf8_lossy(&self.buffer).trim().to_string();
        (!text.is_empty()).then_some(text)
    }
}

/// Decodes each line of a streaming response as `T` and hands it to `on_item`.
///
/// Stops early when `on_item` returns [`ControlFlow::Break`].
pub(crate) async fn for_each_line<T, F>(
    service: &str,
    response: Response,
    mut on_item: F,
) -> Result<(), UpstreamError>
where
    T: DeserializeOwned,
    F: FnMut(T) -> Result<ControlFlow<()>, UpstreamError>,
{
    let decode = |line: &str| {
        serde_json::from_str::<T>(line).map_err(|e| UpstreamError::decode(service, e.to_string()))
    };

    let mut decoder = LineDecoder::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| UpstreamError::request(service, e))?;
        for line in decoder.push(&chunk) {
            if on_item(decode(&line)?)?.is_break() {
                return Ok(());
            }
        }
    }

    if let Some(line) = decoder.finish() {
        on_item(decode(&line)?)?;
    }
    Ok(())
}
