use serde::Serialize;

use crate::handler::Outcome;

/// Banner severity; the value doubles as the CSS class suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FlashLevel {
    Danger,
    Warning,
}

impl FlashLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Danger => "danger",
            Self::Warning => "warning",
        }
    }
}

/// One-shot message rendered above the form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Flash {
    pub level: FlashLevel,
    pub message: String,
}

impl Flash {
    pub fn danger(message: impl Into<String>) -> Self {
        Self {
            level: FlashLevel::Danger,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: FlashLevel::Warning,
            message: message.into(),
        }
    }
}

/// Everything the page template needs. An empty `result` shows nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PageView {
    pub flashes: Vec<Flash>,
    pub result: String,
    pub result_is_error: bool,
}

impl From<Outcome> for PageView {
    /// Flattens the typed outcome into display strings.
    fn from(outcome: Outcome) -> Self {
        let (result, result_is_error) = match outcome.result {
            Some(Ok(summary)) => (summary, false),
            Some(Err(e)) => (e.to_string(), true),
            None => (String::new(), false),
        };

        Self {
            flashes: outcome.flashes,
            result,
            result_is_error,
        }
    }
}

impl PageView {
    pub fn with_flash(flash: Flash) -> Self {
        Self {
            flashes: vec![flash],
            ..Self::default()
        }
    }
}
