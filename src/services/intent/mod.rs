pub mod classifier;
pub mod rules;

use std::path::Path;

use crate::config::AppConfig;
use crate::models::{ContextRecord, Intent, IntentMatch};
use crate::services::text::{self, TextNormalizer};

pub use classifier::{ClassifierError, IntentClassifier, TrainingCorpus};
pub use rules::IntentRule;

pub const AFFIRMATIVE_WORDS: &[&str] = &["yes", "yeah", "yep", "sure", "ok", "okay"];
pub const NEGATIVE_WORDS: &[&str] = &["no", "nope", "nah", "cancel"];
pub const CANCEL_COMMANDS: &[&str] = &["cancel", "stop", "quit", "exit", "abort"];
pub const BACK_COMMANDS: &[&str] = &["back", "go back", "previous", "undo"];

/// Statistical layer behind the resolver. Receives normalised text and
/// returns its best guess without thresholding.
pub trait IntentModel: Send + Sync {
    fn predict(&self, normalized: &str) -> Result<IntentMatch, ClassifierError>;
}

/// True if any whole word of `text` is in `words`.
pub fn contains_word(text: &str, words: &[&str]) -> bool {
    text::tokenize(text).iter().any(|t| words.contains(&t.as_str()))
}

/// True if the whole utterance is one of `commands`.
pub fn is_command(text: &str, commands: &[&str]) -> bool {
    commands.contains(&text::clean(text).as_str())
}

/// Forced intents for replies that only make sense mid-conversation.
pub fn context_override(text: &str, context: &ContextRecord) -> Option<IntentMatch> {
    if context.awaiting_confirmation {
        if contains_word(text, AFFIRMATIVE_WORDS) {
            return Some(IntentMatch::certain(Intent::ConfirmBooking));
        }
        if contains_word(text, NEGATIVE_WORDS) {
            return Some(IntentMatch::certain(Intent::CancelBooking));
        }
    }
    if context.booking_state.is_active() {
        if is_command(text, CANCEL_COMMANDS) {
            return Some(IntentMatch::certain(Intent::CancelBooking));
        }
        if is_command(text, BACK_COMMANDS) {
            return Some(IntentMatch::certain(Intent::GoBack));
        }
    }
    None
}

pub struct IntentResolver {
    rules: Vec<IntentRule>,
    model: Box<dyn IntentModel>,
    normalizer: TextNormalizer,
    threshold: f64,
}

impl IntentResolver {
    pub fn new(model: Box<dyn IntentModel>, threshold: f64) -> Self {
        Self {
            rules: rules::default_rules(),
            model,
            normalizer: TextNormalizer::new(),
            threshold,
        }
    }

    /// Builds the resolver from the configured corpus and model files,
    /// training if no usable persisted model exists.
    pub fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let corpus = match &config.intent_training_file {
            Some(path) => TrainingCorpus::from_file(Path::new(path))?,
            None => TrainingCorpus::embedded()?,
        };
        let normalizer = TextNormalizer::new();
        let classifier = IntentClassifier::load_or_train(
            config.intent_model_file.as_deref().map(Path::new),
            &corpus,
            &normalizer,
        )?;
        Ok(Self {
            rules: rules::default_rules(),
            model: Box::new(classifier),
            normalizer,
            threshold: config.intent_confidence_threshold,
        })
    }

    pub fn with_rules(mut self, rules: Vec<IntentRule>) -> Self {
        self.rules = rules;
        self
    }

    pub fn rules(&self) -> &[IntentRule] {
        &self.rules
    }

    pub fn resolve(&self, text: &str, context: &ContextRecord) -> IntentMatch {
        if text.trim().is_empty() {
            return IntentMatch::unknown();
        }

        let base = self.base_match(text);
        let resolved = context_override(text, context).unwrap_or(base);
        tracing::debug!(
            user_id = %context.user_id,
            intent = resolved.intent.as_str(),
            confidence = resolved.confidence,
            "intent resolved"
        );
        resolved
    }

    fn base_match(&self, text: &str) -> IntentMatch {
        let lowered = text.trim().to_lowercase();
        if let Some(rule) = rules::first_match(&self.rules, &lowered) {
            tracing::debug!(rule = rule.name, "intent rule matched");
            return IntentMatch::certain(rule.intent);
        }

        let normalized = self.normalizer.normalize(text);
        match self.model.predict(&normalized) {
            Ok(m) if m.confidence < self.threshold => IntentMatch::new(Intent::Unknown, m.confidence),
            Ok(m) => m,
            Err(e) => {
                tracing::warn!(error = %e, "intent classification failed");
                IntentMatch::unknown()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BookingPatch, Stage};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct FixedModel {
        result: IntentMatch,
        calls: Arc<AtomicUsize>,
    }

    impl IntentModel for FixedModel {
        fn predict(&self, _normalized: &str) -> Result<IntentMatch, ClassifierError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.result)
        }
    }

    struct BrokenModel;

    impl IntentModel for BrokenModel {
        fn predict(&self, _normalized: &str) -> Result<IntentMatch, ClassifierError> {
            Err(ClassifierError::Untrained)
        }
    }

    fn fixed(intent: Intent, confidence: f64) -> (IntentResolver, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let model = FixedModel {
            result: IntentMatch::new(intent, confidence),
            calls: calls.clone(),
        };
        (IntentResolver::new(Box::new(model), 0.5), calls)
    }

    fn booking_context() -> ContextRecord {
        let mut ctx = ContextRecord::new("u1");
        ctx.booking_state
            .apply(BookingPatch::new().stage(Stage::Tickets).movie("dune2").time("13:00"));
        ctx
    }

    #[test]
    fn test_empty_input_skips_classifier() {
        let (resolver, calls) = fixed(Intent::Greeting, 0.9);
        let result = resolver.resolve("   ", &ContextRecord::new("u1"));
        assert_eq!(result, IntentMatch::unknown());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_rule_beats_classifier() {
        let (resolver, calls) = fixed(Intent::Greeting, 0.99);
        let result = resolver.resolve("help", &ContextRecord::new("u1"));
        assert_eq!(result, IntentMatch::certain(Intent::Help));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_low_confidence_keeps_score() {
        let (resolver, _) = fixed(Intent::Praise, 0.3);
        let result = resolver.resolve("hmm", &ContextRecord::new("u1"));
        assert_eq!(result.intent, Intent::Unknown);
        assert!((result.confidence - 0.3).abs() < 1e-9);
    }

    #[test]
    fn test_confident_prediction_passes_through() {
        let (resolver, _) = fixed(Intent::Praise, 0.8);
        let result = resolver.resolve("you rock", &ContextRecord::new("u1"));
        assert_eq!(result, IntentMatch::new(Intent::Praise, 0.8));
    }

    #[test]
    fn test_classifier_error_degrades_to_unknown() {
        let resolver = IntentResolver::new(Box::new(BrokenModel), 0.5);
        let result = resolver.resolve("anything", &ContextRecord::new("u1"));
        assert_eq!(result, IntentMatch::unknown());
    }

    #[test]
    fn test_awaiting_confirmation_overrides() {
        let (resolver, _) = fixed(Intent::Greeting, 0.9);
        let mut ctx = ContextRecord::new("u1");
        ctx.awaiting_confirmation = true;
        assert_eq!(
            resolver.resolve("yeah go on", &ctx),
            IntentMatch::certain(Intent::ConfirmBooking)
        );
        assert_eq!(resolver.resolve("nope", &ctx), IntentMatch::certain(Intent::CancelBooking));
        assert_eq!(resolver.resolve("hello", &ctx).intent, Intent::Greeting);
    }

    #[test]
    fn test_booking_commands_override() {
        let (resolver, _) = fixed(Intent::Greeting, 0.9);
        let ctx = booking_context();
        assert_eq!(resolver.resolve("cancel", &ctx), IntentMatch::certain(Intent::CancelBooking));
        assert_eq!(resolver.resolve("go back", &ctx), IntentMatch::certain(Intent::GoBack));

        let idle = ContextRecord::new("u1");
        assert_eq!(resolver.resolve("go back", &idle).intent, Intent::Greeting);
    }

    #[test]
    fn test_custom_rule_order() {
        fn always(_: &str) -> bool {
            true
        }
        let (resolver, _) = fixed(Intent::Greeting, 0.9);
        let resolver = resolver.with_rules(vec![IntentRule {
            name: "catch_all",
            intent: Intent::Complaint,
            predicate: always,
        }]);
        assert_eq!(resolver.rules().len(), 1);
        assert_eq!(
            resolver.resolve("hello", &ContextRecord::new("u1")).intent,
            Intent::Complaint
        );
    }
}
