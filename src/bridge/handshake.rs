use async_trait::async_trait;
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin},
    sync::Mutex,
};

use crate::{bridge::BridgeError, protocol::ConnectMessage};

/// Where the link to the desktop client is in its connect handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionPhase {
    #[default]
    AwaitingConnect,
    CodeRequired,
    Authenticated,
}

/// One queued outbound handshake step, drained in order by the connection's writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeInstruction {
    RequestConnect,
    SendCode(String),
    AuthReadback(String),
}

impl HandshakeInstruction {
    pub fn to_message(&self, label: &str) -> ConnectMessage {
        match self {
            Self::RequestConnect => ConnectMessage::new(label, None),
            Self::SendCode(code) => ConnectMessage::new(label, Some(code)),
            Self::AuthReadback(token) => ConnectMessage::new(label, Some(token)),
        }
    }
}

/// The human running the bridge.
#[async_trait]
pub trait Operator: Send + Sync {
    /// Asks for the pairing code shown by the desktop client.
    async fn request_code(&self) -> Result<String, BridgeError>;

    /// Asks whether to keep reconnecting after `error`. `false` aborts the bridge.
    async fn confirm_retry(&self, error: &BridgeError) -> bool;
}

/// Operator on the controlling terminal. A preset code skips the first code prompt.
pub struct ConsoleOperator {
    preset_code: Mutex<Option<String>>,
    lines: Mutex<Lines<BufReader<Stdin>>>,
}

impl ConsoleOperator {
    pub fn new(preset_code: Option<String>) -> Self {
        Self {
            preset_code: Mutex::new(preset_code),
            lines: Mutex::new(BufReader::new(tokio::io::stdin()).lines()),
        }
    }

    async fn prompt(&self, text: &str) -> Option<String> {
        let mut stdout = tokio::io::stdout();
        let _ = stdout.write_all(text.as_bytes()).await;
        let _ = stdout.flush().await;

        let mut lines = self.lines.lock().await;
        match lines.next_line().await {
            Ok(line) => line.map(|l| l.trim().to_string()),
            Err(e) => {
                tracing::warn!("Failed to read operator input: {}", e);
                None
            }
        }
    }
}

#[async_trait]
impl Operator for ConsoleOperator {
    async fn request_code(&self) -> Result<String, BridgeError> {
        if let Some(code) = self.preset_code.lock().await.take() {
            return Ok(code);
        }
        match self.prompt("Enter the code shown by the desktop client: ").await {
            Some(code) if !code.is_empty() => Ok(code),
            _ => Err(BridgeError::Aborted),
        }
    }

    async fn confirm_retry(&self, error: &BridgeError) -> bool {
        let text = format!(
            "Encountered an error ({}), press enter to try again, e to exit\n",
            error
        );
        !matches!(self.prompt(&text).await.as_deref(), Some("e") | None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instruction_arguments() {
        assert_eq!(
            HandshakeInstruction::RequestConnect.to_message("Deck").arguments,
            vec!["Deck".to_string()]
        );
        assert_eq!(
            HandshakeInstruction::SendCode("4821".into())
                .to_message("Deck")
                .arguments,
            vec!["Deck".to_string(), "4821".to_string()]
        );
        assert_eq!(
            HandshakeInstruction::AuthReadback("tok".into())
                .to_message("Deck")
                .arguments,
            vec!["Deck".to_string(), "tok".to_string()]
        );
    }

    #[test]
    fn test_phase_starts_awaiting_connect() {
        assert_eq!(ConnectionPhase::default(), ConnectionPhase::AwaitingConnect);
    }

    #[tokio::test]
    async fn test_console_operator_uses_preset_code_once() {
        let operator = ConsoleOperator::new(Some("1234".into()));
        assert_eq!(operator.request_code().await.expect("preset code"), "1234");
        assert!(operator.preset_code.lock().await.is_none());
    }
}
