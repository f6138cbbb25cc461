//! Voice Query Handlers

use std::sync::Arc;

use crate::application::error::ApplicationError;
use crate::application::ports::{SpeechSynthesizerPort, VoiceInfo};
use crate::application::queries::ListVoices;

/// ListVoices Handler
pub struct ListVoicesHandler {
    synthesizer: Arc<dyn SpeechSynthesizerPort>,
}

impl ListVoicesHandler {
    pub fn new(synthesizer: Arc<dyn SpeechSynthesizerPort>) -> Self {
        Self { synthesizer }
    }

    pub async fn handle(&self, query: ListVoices) -> Result<Vec<VoiceInfo>, ApplicationError> {
        let voices = self.synthesizer.list_voices().await?;

        Ok(match query.locale.as_deref().map(str::trim) {
            Some(locale) if !locale.is_empty() => voices
                .into_iter()
                .filter(|voice| voice.matches_locale(locale))
                .collect(),
            _ => voices,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::adapters::FakeTtsClient;

    #[tokio::test]
    async fn test_locale_filter() {
        let handler = ListVoicesHandler::new(Arc::new(FakeTtsClient::with_defaults()));

        let all = handler.handle(ListVoices::default()).await.unwrap();
        let english = handler
            .handle(ListVoices {
                locale: Some("en-US".to_string()),
            })
            .await
            .unwrap();
        let german = handler
            .handle(ListVoices {
                locale: Some("de-DE".to_string()),
            })
            .await
            .unwrap();

        assert_eq!(all.len(), 4);
        assert_eq!(english.len(), 3);
        assert!(english.iter().any(|v| v.locale == "en-GB"));
        assert_eq!(german.len(), 1);
        assert_eq!(german[0].short_name, "de-DE-KatjaNeural");
    }
}
