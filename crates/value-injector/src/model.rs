use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::InjectError;

/// Way a value was written.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Technique {
    /// Prototype setter plus the framework's own change handler
    FrameworkState,
    /// Prototype setter plus input/change events
    NativeSetter,
    /// Focus, clear and type key by key
    Keystrokes,
    /// Instance value accessor redefined
    DescriptorOverride,
    /// Option chosen by index
    OptionSelect,
    /// Checkbox or radio activated when its state differed
    Toggle,
    /// Synthetic file list assigned
    FileTransfer,
    /// Content of an editable region replaced
    TextContent,
}

impl Technique {
    pub fn name(&self) -> &'static str {
        match self {
            Technique::FrameworkState => "framework_state",
            Technique::NativeSetter => "native_setter",
            Technique::Keystrokes => "keystrokes",
            Technique::DescriptorOverride => "descriptor_override",
            Technique::OptionSelect => "option_select",
            Technique::Toggle => "toggle",
            Technique::FileTransfer => "file_transfer",
            Technique::TextContent => "text_content",
        }
    }
}

impl std::fmt::Display for Technique {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Result of one fill.
#[derive(Clone, Debug, PartialEq)]
pub struct FillOutcome {
    pub success: bool,
    pub strategy_used: Option<Technique>,
    pub verified: bool,
    pub error: Option<InjectError>,
    /// Message the page raised during the validation pass, if any.
    pub validation_message: Option<String>,
}

impl FillOutcome {
    pub fn verified(technique: Technique) -> Self {
        Self {
            success: true,
            strategy_used: Some(technique),
            verified: true,
            error: None,
            validation_message: None,
        }
    }

    pub fn failed(error: InjectError) -> Self {
        Self {
            success: false,
            strategy_used: None,
            verified: false,
            error: Some(error),
            validation_message: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InjectorConfig {
    /// Pause before reading back a written value
    pub verify_settle_ms: u64,
    /// Pause between simulated keys
    pub keystroke_delay_ms: u64,
    /// Pause before the blur/focus/blur validation pass
    pub validation_delay_ms: u64,
    pub validation_pass: bool,
}

impl Default for InjectorConfig {
    fn default() -> Self {
        Self {
            verify_settle_ms: 50,
            keystroke_delay_ms: 10,
            validation_delay_ms: 200,
            validation_pass: true,
        }
    }
}

impl InjectorConfig {
    /// No pauses anywhere.
    pub fn immediate() -> Self {
        Self {
            verify_settle_ms: 0,
            keystroke_delay_ms: 0,
            validation_delay_ms: 0,
            validation_pass: true,
        }
    }

    pub fn verify_settle(&self) -> Duration {
        Duration::from_millis(self.verify_settle_ms)
    }

    pub fn keystroke_delay(&self) -> Duration {
        Duration::from_millis(self.keystroke_delay_ms)
    }

    pub fn validation_delay(&self) -> Duration {
        Duration::from_millis(self.validation_delay_ms)
    }
}

/// Bounded pause; zero returns immediately.
pub(crate) async fn pause(duration: Duration) {
    if !duration.is_zero() {
        tokio::time::sleep(duration).await;
    }
}
