// ── AMI message model ──
//
// AMI messages are ordered `Key: Value` lists. Keys may repeat (`Output`,
// `Variable`), so a map would lose information; lookups are
// case-insensitive because Asterisk versions disagree on casing.

use std::fmt;

use serde::Serialize;

// ── ManagerMessage ───────────────────────────────────────────────────

/// One framed AMI message: a response, an event, or an outgoing action.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ManagerMessage {
    fields: Vec<(String, String)>,
}

/// Unsolicited messages share the wire shape of every other message.
pub type ManagerEvent = ManagerMessage;

impl ManagerMessage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style append.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.push(key, value);
        self
    }

    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.fields.push((key.into(), value.into()));
    }

    /// First value for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// Every value for `key`, in wire order.
    pub fn get_all<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.fields
            .iter()
            .filter(move |(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn action_id(&self) -> Option<&str> {
        self.get("ActionID")
    }

    /// Value of the `Response` header, if this is a response.
    pub fn response(&self) -> Option<&str> {
        self.get("Response")
    }

    /// Value of the `Event` header, if this is an event.
    pub fn event_name(&self) -> Option<&str> {
        self.get("Event")
    }

    pub fn is_response(&self) -> bool {
        self.response().is_some()
    }

    pub fn is_event(&self) -> bool {
        self.event_name().is_some()
    }

    /// `Response: Error`.
    pub fn is_error(&self) -> bool {
        self.response()
            .is_some_and(|r| r.eq_ignore_ascii_case("error"))
    }

    /// `EventList: start` on a response opens a list of correlated events.
    pub fn starts_event_list(&self) -> bool {
        self.get("EventList")
            .is_some_and(|v| v.eq_ignore_ascii_case("start"))
    }

    /// `EventList: Complete` on an event closes a correlated list.
    pub fn completes_event_list(&self) -> bool {
        self.get("EventList")
            .is_some_and(|v| v.eq_ignore_ascii_case("complete"))
    }

    /// The `Message` header, used by the switch for human-readable status.
    pub fn text(&self) -> Option<&str> {
        self.get("Message")
    }

    /// CLI output lines (`Output:` headers).
    pub fn output_lines(&self) -> Vec<String> {
        self.get_all("Output").map(str::to_owned).collect()
    }
}

impl fmt::Display for ManagerMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (key, value) in &self.fields {
            write!(f, "{key}: {value}\r\n")?;
        }
        Ok(())
    }
}

// ── Action ───────────────────────────────────────────────────────────

/// An outgoing request, before an ActionID has been assigned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Action {
    name: String,
    params: Vec<(String, String)>,
}

impl Action {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: single_line(name.into()),
            params: Vec::new(),
        }
    }

    /// Line breaks in `key` or `value` are flattened to spaces, so a value
    /// can never start a header of its own.
    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params
            .push((single_line(key.into()), single_line(value.into())));
        self
    }

    /// Append a parameter only when a value is present.
    pub fn param_opt(self, key: impl Into<String>, value: Option<impl Into<String>>) -> Self {
        match value {
            Some(v) => self.param(key, v),
            None => self,
        }
    }

    /// Channel variables are sent as repeated `Variable: name=value` headers.
    pub fn variable(self, name: &str, value: &str) -> Self {
        self.param("Variable", format!("{name}={value}"))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }

    /// Render the wire message carrying `action_id`.
    pub fn to_message(&self, action_id: &str) -> ManagerMessage {
        let mut message = ManagerMessage::new()
            .with("Action", self.name.as_str())
            .with("ActionID", action_id);
        for (key, value) in &self.params {
            message.push(key.as_str(), value.as_str());
        }
        message
    }
}

fn single_line(text: String) -> String {
    if text.contains(['\r', '\n']) {
        text.replace(['\r', '\n'], " ")
    } else {
        text
    }
}

// ── ActionResponse ───────────────────────────────────────────────────

/// A successful response, plus any list events correlated with it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionResponse {
    pub message: ManagerMessage,
    pub events: Vec<ManagerEvent>,
}

impl ActionResponse {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.message.get(key)
    }

    pub fn output_lines(&self) -> Vec<String> {
        self.message.output_lines()
    }

    /// Correlated events named `name` (e.g. `CoreShowChannel`).
    pub fn events_named<'a>(
        &'a self,
        name: &'a str,
    ) -> impl Iterator<Item = &'a ManagerEvent> + 'a {
        self.events
            .iter()
            .filter(move |e| e.event_name().is_some_and(|n| n.eq_ignore_ascii_case(name)))
    }
}
