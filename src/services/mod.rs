mod content_extractor;
mod telegram;

pub use content_extractor::{ContentExtractor, ExtractionRules};
pub use telegram::{Notifier, TelegramConfig, TelegramNotifier};
