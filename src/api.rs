//! HTTP implementation of the chat backend contract.
//!
//! REST endpoints for chat and message CRUD under `/api/chats`, plus the
//! message-append endpoint whose response body is an SSE stream.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::Url;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::client::{validate_send, ChatApi, ClientError, EventStream, StreamingChatApi};
use crate::http::{apply_headers, build_http_client, check_status};
use crate::model::{ChatSummary, ChatTitleBody, Message, SendMessageBody};
use crate::options::ClientOptions;
use crate::sse::SSEResponseExt;
use crate::stream::{start_stream, StreamCallbacks, StreamHandle};

/// Chat backend client over HTTP. Cheap to clone.
#[derive(Debug, Clone)]
pub struct HttpChatClient {
    http: reqwest::Client,
    options: ClientOptions,
}

impl HttpChatClient {
    pub fn new(options: ClientOptions) -> Result<Self, ClientError> {
        let http = build_http_client(&options)?;
        Ok(Self { http, options })
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// Send `content` to `chat_id` and stream the reply into `callbacks`.
    pub fn start_stream<C>(
        &self,
        chat_id: &str,
        content: &str,
        callbacks: C,
    ) -> Result<StreamHandle<C>, ClientError>
    where
        C: StreamCallbacks + 'static,
    {
        start_stream(self.clone(), chat_id, content, callbacks)
    }

    /// `/api/chats/<chat_id>/<tail..>` with every segment percent-encoded.
    fn chat_url(&self, chat_id: &str, tail: &[&str]) -> Result<Url, ClientError> {
        let base = self.options.endpoint("/api/chats");
        let mut url = Url::parse(&base)
            .map_err(|e| ClientError::Config(format!("invalid base URL {}: {}", base, e)))?;

        url.path_segments_mut()
            .map_err(|_| ClientError::Config(format!("base URL {} cannot have a path", base)))?
            .pop_if_empty()
            .push(chat_id)
            .extend(tail);

        Ok(url)
    }

    async fn fetch<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        action: &str,
    ) -> Result<T, ClientError> {
        let response = apply_headers(request, &self.options).send().await?;
        let response = check_status(response, action).await?;
        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

#[async_trait]
impl ChatApi for HttpChatClient {
    async fn list_chats(&self) -> Result<Vec<ChatSummary>, ClientError> {
        let url = self.options.endpoint("/api/chats");
        self.fetch(self.http.get(url), "Failed to fetch chats").await
    }

    async fn create_chat(&self, title: &str) -> Result<ChatSummary, ClientError> {
        let url = self.options.endpoint("/api/chats");
        let request = self.http.post(url).json(&ChatTitleBody { title });
        self.fetch(request, "Failed to create chat").await
    }

    async fn get_chat(&self, chat_id: &str) -> Result<ChatSummary, ClientError> {
        let url = self.chat_url(chat_id, &[])?;
        self.fetch(self.http.get(url), "Failed to fetch chat").await
    }

    async fn update_chat(&self, chat_id: &str, title: &str) -> Result<ChatSummary, ClientError> {
        let url = self.chat_url(chat_id, &[])?;
        let request = self.http.put(url).json(&ChatTitleBody { title });
        self.fetch(request, "Failed to update chat").await
    }

    async fn delete_chat(&self, chat_id: &str) -> Result<(), ClientError> {
        let url = self.chat_url(chat_id, &[])?;
        let response = apply_headers(self.http.delete(url), &self.options).send().await?;
        check_status(response, "Failed to delete chat").await?;
        Ok(())
    }

    async fn list_messages(&self, chat_id: &str) -> Result<Vec<Message>, ClientError> {
        let url = self.chat_url(chat_id, &["messages"])?;
        self.fetch(self.http.get(url), "Failed to fetch messages").await
    }
}

#[async_trait]
impl StreamingChatApi for HttpChatClient {
    async fn send_message_stream(
        &self,
        chat_id: &str,
        content: &str,
    ) -> Result<EventStream, ClientError> {
        validate_send(chat_id, content)?;

        let url = self.chat_url(chat_id, &["messages"])?;
        debug!(chat_id = %chat_id, "sending message");

        let request = self
            .http
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "text/event-stream")
            .json(&SendMessageBody { content });

        let response = apply_headers(request, &self.options).send().await?;
        let response = check_status(response, "Failed to send message").await?;

        Ok(response.sse_events().boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::Conversation;
    use crate::model::{Role, StreamEvent};
    use crate::stream::StreamOutcome;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> HttpChatClient {
        HttpChatClient::new(ClientOptions::new(server.uri())).expect("client")
    }

    fn chat_json(id: &str, title: &str) -> serde_json::Value {
        json!({"id": id, "title": title, "createdAt": "2024-05-01T10:00:00Z"})
    }

    fn sse_body() -> String {
        [
            r#"data: {"event":"user_message","data":{"id":"m1","content":"Hello","timestamp":"2024-05-01T10:00:00Z"}}"#,
            r#"data: {"event":"thinking","data":{}}"#,
            r#"data: {"event":"content","data":{"content":"Hi "}}"#,
            r#"data: {"event":"content","data":{"content":"there"}}"#,
            r#"data: {"event":"complete","data":{"id":"m2","content":"Hi there","timestamp":"2024-05-01T10:00:05Z"}}"#,
            "data: [DONE]",
        ]
        .iter()
        .map(|line| format!("{}\n\n", line))
        .collect()
    }

    #[tokio::test]
    async fn test_list_chats() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/chats"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                chat_json("c1", "First"),
                chat_json("c2", "Second"),
            ])))
            .mount(&server)
            .await;

        let chats = client(&server).list_chats().await.expect("list chats");
        assert_eq!(chats.len(), 2);
        assert_eq!(chats[1].title, "Second");
    }

    #[tokio::test]
    async fn test_create_and_update_chat() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chats"))
            .and(body_json(json!({"title": "New chat"})))
            .respond_with(ResponseTemplate::new(201).set_body_json(chat_json("c9", "New chat")))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/api/chats/c9"))
            .and(body_json(json!({"title": "Renamed"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(chat_json("c9", "Renamed")))
            .mount(&server)
            .await;

        let client = client(&server);
        let chat = client.create_chat("New chat").await.expect("create chat");
        assert_eq!(chat.id, "c9");

        let chat = client.update_chat("c9", "Renamed").await.expect("update chat");
        assert_eq!(chat.title, "Renamed");
    }

    #[tokio::test]
    async fn test_get_missing_chat_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/chats/nope"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({"error": "Chat not found"})))
            .mount(&server)
            .await;

        let err = client(&server).get_chat("nope").await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "Failed to fetch chat: Not Found (Chat not found)");
    }

    #[tokio::test]
    async fn test_delete_chat() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/api/chats/c1"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/api/chats/gone"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = client(&server);
        client.delete_chat("c1").await.expect("delete chat");
        assert!(client.delete_chat("gone").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_chat_id_is_percent_encoded() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/chats/a%2Fb%3Fc%23d/messages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/api/chats/a%2Fb"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let client = client(&server);
        assert!(client.list_messages("a/b?c#d").await.expect("list messages").is_empty());
        client.delete_chat("a/b").await.expect("delete chat");
    }

    #[test]
    fn test_chat_url_under_base_path() {
        let client = HttpChatClient::new(ClientOptions::new("http://example.com/backend/")).expect("client");
        let url = client.chat_url("c 1", &["messages"]).expect("url");
        assert_eq!(url.as_str(), "http://example.com/backend/api/chats/c%201/messages");
    }

    #[tokio::test]
    async fn test_list_messages() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/chats/c1/messages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": "m1", "role": "user", "content": "Hello", "timestamp": "2024-05-01T10:00:00Z"},
                {"id": "m2", "role": "assistant", "content": "Hi there", "timestamp": "2024-05-01T10:00:05Z"}
            ])))
            .mount(&server)
            .await;

        let messages = client(&server).list_messages("c1").await.expect("list messages");
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].role, Role::Assistant);
    }

    #[tokio::test]
    async fn test_api_key_and_extra_headers_are_sent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/chats"))
            .and(header("authorization", "Bearer sk-test"))
            .and(header("x-client", "web"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let options = ClientOptions::new(server.uri())
            .with_api_key("sk-test")
            .with_header("x-client".to_string(), "web".to_string());
        let client = HttpChatClient::new(options).expect("client");
        assert!(client.list_chats().await.expect("list chats").is_empty());
    }

    #[tokio::test]
    async fn test_send_message_stream_events() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chats/c1/messages"))
            .and(body_json(json!({"content": "Hello"})))
            .respond_with(ResponseTemplate::new(200).set_body_raw(sse_body(), "text/event-stream"))
            .mount(&server)
            .await;

        let stream = client(&server).send_message_stream("c1", "Hello").await.expect("open stream");
        let events: Vec<StreamEvent> = stream.map(|r| r.expect("event")).collect().await;

        assert_eq!(events.len(), 5);
        assert_eq!(events[1], StreamEvent::Thinking);
        assert!(events[4].is_terminal());
    }

    #[tokio::test]
    async fn test_send_message_non_success_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chats/c1/messages"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let result = client(&server).send_message_stream("c1", "Hello").await;
        assert!(matches!(result, Err(ClientError::Status { .. })));
    }

    #[tokio::test]
    async fn test_stream_into_conversation() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chats/c1/messages"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(sse_body(), "text/event-stream"))
            .mount(&server)
            .await;

        let mut conversation = Conversation::new("c1");
        conversation.begin_send().expect("idle conversation");

        let handle = client(&server)
            .start_stream("c1", "Hello", conversation)
            .expect("start stream");
        let (conversation, outcome) = handle.join().await.expect("join");

        assert_eq!(outcome, StreamOutcome::Completed);
        let messages = conversation.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!((messages[0].id.as_str(), messages[0].role), ("m1", Role::User));
        assert_eq!(messages[1].content, "Hi there");
        assert!(!conversation.is_sending());
    }

    #[tokio::test]
    async fn test_stream_error_status_reaches_error_callback() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chats/c1/messages"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let mut conversation = Conversation::new("c1");
        conversation.begin_send().expect("idle conversation");

        let handle = client(&server)
            .start_stream("c1", "Hello", conversation)
            .expect("start stream");
        let (conversation, outcome) = handle.join().await.expect("join");

        assert!(matches!(outcome, StreamOutcome::Failed(_)));
        assert_eq!(
            conversation.error(),
            Some("Failed to send message: Service Unavailable")
        );
        assert!(conversation.messages().is_empty());
    }
}
