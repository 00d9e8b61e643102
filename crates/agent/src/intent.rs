use chrono::Utc;
use serde::Deserialize;
use tracing::warn;

use remedi_core::domain::medicine::Medicine;
use remedi_core::domain::order::Order;
use remedi_core::domain::prescription::Prescription;

use crate::chain::ProviderChain;
use crate::llm::{strip_code_fences, ProviderError};

/// What the user is trying to do, as classified from one utterance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
pub enum IntentKind {
    OrderMedicine,
    Refill,
    ConfirmOrder,
    SymptomQuery,
    HistoryQuery,
    GeneralQuery,
    Fallback,
}

impl IntentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntentKind::OrderMedicine => "ORDER_MEDICINE",
            IntentKind::Refill => "REFILL",
            IntentKind::ConfirmOrder => "CONFIRM_ORDER",
            IntentKind::SymptomQuery => "SYMPTOM_QUERY",
            IntentKind::HistoryQuery => "HISTORY_QUERY",
            IntentKind::GeneralQuery => "GENERAL_QUERY",
            IntentKind::Fallback => "FALLBACK",
        }
    }

    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_ascii_uppercase().as_str() {
            "ORDER_MEDICINE" => Some(IntentKind::OrderMedicine),
            "REFILL" => Some(IntentKind::Refill),
            "CONFIRM_ORDER" => Some(IntentKind::ConfirmOrder),
            "SYMPTOM_QUERY" => Some(IntentKind::SymptomQuery),
            "HISTORY_QUERY" => Some(IntentKind::HistoryQuery),
            "GENERAL_QUERY" => Some(IntentKind::GeneralQuery),
            "FALLBACK" => Some(IntentKind::Fallback),
            _ => None,
        }
    }
}

/// Structured reading of one user turn.
#[derive(Clone, Debug)]
pub struct IntentResult {
    pub intent: IntentKind,
    pub answer: String,
    pub language: String,
    pub medicine_name: Option<String>,
    pub dosage_per_day: Option<u32>,
    pub quantity: Option<u32>,
    pub symptom: Option<String>,
    pub confidence: Option<f32>,
    pub missing_fields: Vec<String>,
}

impl IntentResult {
    fn fallback(answer: impl Into<String>) -> Self {
        Self {
            intent: IntentKind::Fallback,
            answer: answer.into(),
            language: "English".to_string(),
            medicine_name: None,
            dosage_per_day: None,
            quantity: None,
            symptom: None,
            confidence: None,
            missing_fields: Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct IntentWire {
    intent: String,
    #[serde(default)]
    answer: String,
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    medicine_name: Option<String>,
    #[serde(default)]
    dosage_per_day: Option<u32>,
    #[serde(default)]
    quantity: Option<u32>,
    #[serde(default)]
    symptom: Option<String>,
    #[serde(default)]
    confidence: Option<f32>,
    #[serde(default)]
    missing_fields: Vec<String>,
}

const FALLBACK_ANSWER: &str =
    "Sorry, I am having trouble understanding requests right now. Please try again in a moment.";

/// Turns free text into an [`IntentResult`], never failing: when every
/// provider is down or returns garbage, a keyword heuristic takes over so the
/// conversation can still move forward.
pub struct IntentResolver {
    chain: ProviderChain,
}

impl IntentResolver {
    pub fn new(chain: ProviderChain) -> Self {
        Self { chain }
    }

    pub async fn resolve(
        &self,
        utterance: &str,
        history: &[Order],
        catalog: &[Medicine],
        prescriptions: &[Prescription],
    ) -> IntentResult {
        let prompt = build_intent_prompt(utterance, history, catalog, prescriptions);
        let parsed = self
            .chain
            .complete_parsed(&prompt, |raw| parse_intent_payload(raw))
            .await;

        match parsed {
            Ok(result) => result,
            Err(error) => {
                warn!(error = %error, "intent extraction failed, using keyword fallback");
                keyword_fallback(utterance, history)
            }
        }
    }

    /// Renders `text` in `target` language via the chain. English (or an
    /// unspecified target) is passed through untouched, and any provider
    /// failure falls back to the original text.
    pub async fn translate(&self, text: &str, target: &str) -> String {
        let target = target.trim();
        if text.is_empty() || target.is_empty() || target.eq_ignore_ascii_case("english") {
            return text.to_string();
        }

        let prompt = format!(
            "Translate the following message into {target}. \
             Reply with the translated text only, no commentary.\n\n{text}"
        );
        match self.chain.complete(&prompt).await {
            Ok(translated) => translated.trim().to_string(),
            Err(error) => {
                warn!(error = %error, target, "translation failed, keeping original text");
                text.to_string()
            }
        }
    }
}

fn parse_intent_payload(raw: &str) -> Result<IntentResult, ProviderError> {
    let body = strip_code_fences(raw);
    let wire: IntentWire = serde_json::from_str(body)
        .map_err(|error| ProviderError::Malformed(format!("intent payload: {error}")))?;
    let intent = IntentKind::parse(&wire.intent)
        .ok_or_else(|| ProviderError::Malformed(format!("unknown intent label {:?}", wire.intent)))?;

    Ok(IntentResult {
        intent,
        answer: wire.answer,
        language: wire.language.unwrap_or_else(|| "English".to_string()),
        medicine_name: wire.medicine_name,
        dosage_per_day: wire.dosage_per_day,
        quantity: wire.quantity,
        symptom: wire.symptom,
        confidence: wire.confidence,
        missing_fields: wire.missing_fields,
    })
}

/// Last-resort classification when no provider answers. Only refills are
/// recoverable without a model: the user's most recent order names the
/// medicine to repeat.
fn keyword_fallback(utterance: &str, history: &[Order]) -> IntentResult {
    let lowered = utterance.to_lowercase();
    if lowered.contains("refill") {
        if let Some(item) = history.first().and_then(|order| order.items.first()) {
            return IntentResult {
                intent: IntentKind::Refill,
                answer: format!("Refilling your recent order of {}.", item.medicine_name),
                language: "English".to_string(),
                medicine_name: Some(item.medicine_name.clone()),
                dosage_per_day: Some(item.dosage_per_day),
                quantity: Some(item.quantity),
                symptom: None,
                confidence: None,
                missing_fields: Vec::new(),
            };
        }
    }
    IntentResult::fallback(FALLBACK_ANSWER)
}

fn build_intent_prompt(
    utterance: &str,
    history: &[Order],
    catalog: &[Medicine],
    prescriptions: &[Prescription],
) -> String {
    let now = Utc::now();
    let mut prompt = String::new();
    prompt.push_str(
        "You are the intake assistant for an online pharmacy. Classify the \
         user's message and reply with a single JSON object, no prose, with \
         fields: intent (one of ORDER_MEDICINE, REFILL, CONFIRM_ORDER, \
         SYMPTOM_QUERY, HISTORY_QUERY, GENERAL_QUERY, FALLBACK), answer \
         (a short reply to the user in their language), language (the \
         language the user wrote in), medicine_name, dosage_per_day, \
         quantity, symptom, confidence (0.0-1.0), missing_fields (names of \
         order fields the user has not supplied yet).\n\n",
    );

    prompt.push_str("Catalog:\n");
    for medicine in catalog {
        prompt.push_str(&format!(
            "- {} (stock {}, unit price {}{})\n",
            medicine.name,
            medicine.stock,
            medicine.unit_price,
            if medicine.requires_prescription {
                ", prescription required"
            } else {
                ""
            }
        ));
    }

    if !history.is_empty() {
        prompt.push_str("\nRecent orders, newest first:\n");
        for order in history {
            for item in &order.items {
                prompt.push_str(&format!(
                    "- {} x{} ({} per day), ordered {}\n",
                    item.medicine_name,
                    item.quantity,
                    item.dosage_per_day,
                    order.created_at.format("%Y-%m-%d")
                ));
            }
        }
    }

    let valid: Vec<&Prescription> = prescriptions
        .iter()
        .filter(|rx| rx.is_valid_at(now))
        .collect();
    if !valid.is_empty() {
        prompt.push_str("\nValid prescriptions cover medicine ids: ");
        let ids: Vec<&str> = valid.iter().map(|rx| rx.medicine_id.0.as_str()).collect();
        prompt.push_str(&ids.join(", "));
        prompt.push('\n');
    }

    prompt.push_str("\nUser message:\n");
    prompt.push_str(utterance);
    prompt
}
