use std::io::Write;

use crate::grok::client::Result;

/// One conversational turn. The repl only depends on this, so tests can run
/// it against [`StubChat`] without any network access.
pub trait Chat {
    fn chat(&mut self, message: &str) -> Result<String>;
}

pub struct GrokRepl<T: Chat> {
    chat: T,
    user: String,
}

impl<T: Chat> GrokRepl<T> {
    pub fn new(chat: T) -> Self {
        GrokRepl {
            chat,
            user: std::env::var("USER").unwrap_or("you".to_string()),
        }
    }
    pub fn repl(&mut self) -> Result<()> {
        loop {
            self.user_first();
            let Some(line) = Self::user_input() else {
                break;
            };
            if let Some(reply) = self.respond(&line)? {
                println!("SYSTEM: {}", reply);
            }
        }
        Ok(())
    }
    /// Handle one line of input. Blank lines are a no-op: no transcript
    /// mutation, no network call, just a re-prompt.
    pub fn respond(&mut self, line: &str) -> Result<Option<String>> {
        let message = line.trim();
        if message.is_empty() {
            return Ok(None);
        }
        self.chat.chat(message).map(Some)
    }
    pub fn chat(&self) -> &T {
        &self.chat
    }
    fn user_first(&self) {
        print!("{} > ", self.user);
        std::io::stdout().flush().unwrap();
    }
    // None means the input source is closed and the session is over.
    fn user_input() -> Option<String> {
        let mut message = String::new();
        match std::io::stdin().read_line(&mut message) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(message),
        }
    }
}

pub struct StubChat {
    count: usize,
    messages: Vec<String>,
}

impl StubChat {
    pub fn new() -> Self {
        StubChat {
            messages: Vec::new(),
            count: 0,
        }
    }
    pub fn add(&mut self, message: impl Into<String>) {
        self.messages.push(message.into());
    }
    pub fn called_time(&self) -> usize {
        self.count
    }
}

impl Default for StubChat {
    fn default() -> Self {
        Self::new()
    }
}

impl Chat for StubChat {
    fn chat(&mut self, message: &str) -> Result<String> {
        let index = self.count;
        self.count += 1;
        match self.messages.get(index) {
            Some(reply) => Ok(reply.clone()),
            None => Ok(message.to_string()),
        }
    }
}
