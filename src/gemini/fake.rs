use async_trait::async_trait;
use std::sync::Mutex;

use crate::gemini::{GeminiClientTrait, GeminiError, GenerateRequest};

/// A fake Gemini client for tests
///
/// Replies are queued with the builder methods and handed out in order.
/// Once the queue is empty every call returns a default reply. Every
/// request is recorded so tests can check what the pages sent.
///
/// # Example
///
/// ```
/// use incubate::gemini::fake::FakeGeminiClient;
/// use incubate::gemini::{GeminiClientTrait, GenerateRequest};
///
/// #[tokio::main]
/// async fn main() {
///     let client = FakeGeminiClient::new().with_response("First response");
///     let reply = client.generate(GenerateRequest::new("Hello")).await.unwrap();
///     assert_eq!(reply, "First response");
///     assert_eq!(client.request_count(), 1);
/// }
/// ```
pub struct FakeGeminiClient {
    replies: Mutex<Vec<Result<String, GeminiError>>>,
    // Track requests for verification in tests
    pub requests: Mutex<Vec<GenerateRequest>>,
}

impl Default for FakeGeminiClient {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeGeminiClient {
    pub fn new() -> Self {
        Self {
            replies: Mutex::new(vec![]),
            requests: Mutex::new(vec![]),
        }
    }

    /// Queue a successful reply
    pub fn with_response(self, response: &str) -> Self {
        self.replies
            .lock()
            .unwrap()
            .push(Ok(response.to_string()));
        self
    }

    /// Queue several successful replies in order
    pub fn with_responses(self, responses: Vec<&str>) -> Self {
        for response in responses {
            self.replies
                .lock()
                .unwrap()
                .push(Ok(response.to_string()));
        }
        self
    }

    /// Queue a failed call
    pub fn with_failure(self, error: GeminiError) -> Self {
        self.replies.lock().unwrap().push(Err(error));
        self
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn last_request(&self) -> Option<GenerateRequest> {
        self.requests.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl GeminiClientTrait for FakeGeminiClient {
    async fn generate(
        &self,
        request: GenerateRequest,
    ) -> Result<String, GeminiError> {
        self.requests.lock().unwrap().push(request);

        let mut replies = self.replies.lock().unwrap();
        if replies.is_empty() {
            return Ok("Fake default response".to_string());
        }
        replies.remove(0)
    }

    fn model(&self) -> &str {
        "fake-gemini"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn replies_are_returned_in_order_then_default() {
        let client = FakeGeminiClient::new()
            .with_responses(vec!["one", "two"])
            .with_failure(GeminiError::Transport("down".to_string()));

        assert_eq!(client.generate(GenerateRequest::new("a")).await.unwrap(), "one");
        assert_eq!(client.generate(GenerateRequest::new("b")).await.unwrap(), "two");
        assert!(client.generate(GenerateRequest::new("c")).await.is_err());
        assert_eq!(
            client.generate(GenerateRequest::new("d")).await.unwrap(),
            "Fake default response"
        );
        assert_eq!(client.request_count(), 4);
        assert_eq!(client.last_request().unwrap().prompt, "d");
    }
}
