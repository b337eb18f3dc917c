use crate::grok::client::{
    ChatMessage, GrokApi, GrokClient, GrokModel, Result, Role,
};
use crate::repl::Chat;

/// Ordered conversation transcript sent with every completion request.
///
/// Seeded with exactly one system message, then grows by appending; nothing
/// is ever removed and nothing survives the process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatHistory {
    inner: Vec<ChatMessage>,
}
impl ChatHistory {
    pub fn seeded(system_prompt: impl Into<String>) -> Self {
        Self {
            inner: vec![ChatMessage::new(Role::System, system_prompt)],
        }
    }
    pub fn all(&self) -> Vec<ChatMessage> {
        self.inner.clone()
    }
    pub fn last_response(&self) -> Option<&str> {
        self.inner
            .iter()
            .rev()
            .find(|m| m.role == Role::Assistant)
            .map(|m| m.content.as_str())
    }
    pub fn push_request(&mut self, message: impl Into<String>, role: Role) {
        self.inner.push(ChatMessage::new(role, message));
    }
    pub fn push_response(&mut self, message: impl Into<String>) {
        self.inner
            .push(ChatMessage::new(Role::Assistant, message));
    }
}

/// One chat session: a client plus the transcript it feeds.
pub struct GrokChat<C: GrokApi> {
    client: C,
    model: GrokModel,
    history: ChatHistory,
}
impl GrokChat<GrokClient> {
    pub fn from_env(model: GrokModel, system_prompt: impl Into<String>) -> Result<Self> {
        Ok(Self::new(GrokClient::from_env()?, model, system_prompt))
    }
}
impl<C: GrokApi> GrokChat<C> {
    pub fn new(client: C, model: GrokModel, system_prompt: impl Into<String>) -> Self {
        Self {
            client,
            model,
            history: ChatHistory::seeded(system_prompt),
        }
    }
    /// Run one turn: append the user message, exchange the whole transcript
    /// for a completion, append and return the assistant reply.
    pub fn ask(&mut self, message: impl Into<String>) -> Result<String> {
        self.history.push_request(message, Role::User);
        let reply = self
            .client
            .chat_completion(self.model, &self.history.all())?;
        let content = reply.content.clone();
        self.history.push_response(reply.content);
        Ok(content)
    }
    pub fn history(&self) -> &ChatHistory {
        &self.history
    }
    pub fn client(&self) -> &C {
        &self.client
    }
}

impl<C: GrokApi> Chat for GrokChat<C> {
    fn chat(&mut self, message: &str) -> Result<String> {
        self.ask(message)
    }
}

#[cfg(test)]
mod tests {
    use crate::grok::client::fakes::FakeApi;
    use crate::grok::client::GrokClientErrorKind;

    use super::*;

    #[test]
    fn 履歴は生成時にシステムメッセージだけを保持する() {
        let history = ChatHistory::seeded("you are helpful");

        assert_eq!(
            history.all(),
            vec![ChatMessage::new(Role::System, "you are helpful")]
        );
    }
    #[test]
    fn n回の対話の後の履歴はシステムとユーザと応答の順で並ぶ() {
        let api = FakeApi::with_replies(vec!["hi", "fine"]);
        let mut sut = GrokChat::new(api, GrokModel::GrokBeta, "system prompt");

        sut.ask("hello").unwrap();
        sut.ask("how are you?").unwrap();

        assert_eq!(
            sut.history().all(),
            vec![
                ChatMessage::new(Role::System, "system prompt"),
                ChatMessage::new(Role::User, "hello"),
                ChatMessage::new(Role::Assistant, "hi"),
                ChatMessage::new(Role::User, "how are you?"),
                ChatMessage::new(Role::Assistant, "fine"),
            ]
        );
        assert_eq!(sut.history().all().len(), 1 + 2 * 2);
    }
    #[test]
    fn askは応答の内容を返す() {
        let api = FakeApi::with_replies(vec!["hi"]);
        let mut sut = GrokChat::new(api, GrokModel::GrokBeta, "system prompt");

        assert_eq!(sut.ask("hello").unwrap(), "hi");
        assert_eq!(sut.history().last_response(), Some("hi"));
    }
    #[test]
    fn ゲートウェイが失敗した場合は応答が履歴に追加されない() {
        let api = FakeApi::failing(GrokClientErrorKind::ResponseDeserializeError(
            "broken".to_string(),
        ));
        let mut sut = GrokChat::new(api, GrokModel::GrokBeta, "system prompt");

        let result = sut.ask("hello");

        assert!(matches!(
            result.unwrap_err().kind,
            GrokClientErrorKind::ResponseDeserializeError(_)
        ));
        assert_eq!(
            sut.history().all(),
            vec![
                ChatMessage::new(Role::System, "system prompt"),
                ChatMessage::new(Role::User, "hello"),
            ]
        );
        assert_eq!(sut.history().last_response(), None);
    }
}
