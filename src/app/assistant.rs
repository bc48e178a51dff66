//! Financial chat backed by the Google Gemini `generateContent` API.

use crate::app::dashboard::{category_breakdown, kpis, monthly_series, pending_summary};
use crate::core::store::AppStore;
use crate::domain::model::AppData;
use crate::domain::ports::Storage;
use crate::utils::error::{AssistantFailure, CfoError, Result};
use crate::utils::format::{format_currency, format_percent};
use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MODEL: &str = "gemini-pro";
pub const PROBE_PROMPT: &str =
    "Responda apenas \"OK\" para confirmar que a conexão está funcionando.";

const SYSTEM_PROMPT: &str = "Você é um assistente financeiro especializado em CFOs e análise empresarial.
Você tem acesso aos dados financeiros da empresa e deve fornecer insights precisos e acionáveis.";

const INSTRUCTIONS: &str = "INSTRUÇÕES:
- Seja preciso e use os dados reais fornecidos
- Forneça insights práticos para tomada de decisão
- Use formato português brasileiro
- Se não tiver dados suficientes, seja transparente sobre as limitações
- Priorize análises que ajudem na gestão financeira
- Use formatação em markdown quando apropriado";

const HARM_CATEGORIES: [&str; 4] = [
    "HARM_CATEGORY_HARASSMENT",
    "HARM_CATEGORY_HATE_SPEECH",
    "HARM_CATEGORY_SEXUALLY_EXPLICIT",
    "HARM_CATEGORY_DANGEROUS_CONTENT",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeminiSettings {
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
}

impl Default for GeminiSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    safety_settings: Vec<SafetySetting>,
}

#[derive(Debug, Serialize, Deserialize, Default)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize, Default)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    top_k: u32,
    top_p: f32,
    max_output_tokens: u32,
}

#[derive(Debug, Serialize)]
struct SafetySetting {
    category: &'static str,
    threshold: &'static str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

impl GenerateRequest {
    fn prompt(text: String) -> Self {
        Self {
            contents: vec![Content {
                parts: vec![Part { text: Some(text) }],
            }],
            generation_config: None,
            safety_settings: Vec::new(),
        }
    }

    fn chat(text: String) -> Self {
        Self {
            generation_config: Some(GenerationConfig {
                temperature: 0.7,
                top_k: 40,
                top_p: 0.95,
                max_output_tokens: 2048,
            }),
            safety_settings: HARM_CATEGORIES
                .into_iter()
                .map(|category| SafetySetting {
                    category,
                    threshold: "BLOCK_MEDIUM_AND_ABOVE",
                })
                .collect(),
            ..Self::prompt(text)
        }
    }
}

fn assistant_error(kind: AssistantFailure, message: impl Into<String>) -> CfoError {
    CfoError::AssistantError {
        kind,
        message: message.into(),
    }
}

/// Maps a failed API response to an assistant error.
fn classify_failure(status: StatusCode, body: &str) -> CfoError {
    let detail = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| "Erro desconhecido".to_string());
    let message = format!("API Error: {} - {}", status.as_u16(), detail);

    let kind = if body.contains("API_KEY_INVALID") || status == StatusCode::BAD_REQUEST {
        AssistantFailure::InvalidKey
    } else if body.contains("QUOTA_EXCEEDED") || status == StatusCode::TOO_MANY_REQUESTS {
        AssistantFailure::QuotaExceeded
    } else if status == StatusCode::FORBIDDEN {
        AssistantFailure::PermissionDenied
    } else {
        AssistantFailure::Other
    };
    assistant_error(kind, message)
}

/// Text block summarising the ledger for the model prompt.
pub fn financial_context(data: &AppData) -> String {
    let transactions = &data.transactions;
    let totals = kpis(transactions);
    let pending = pending_summary(transactions).pending;

    let top_categories = category_breakdown(transactions)
        .into_iter()
        .take(5)
        .map(|c| format!("{}: {}", c.category, format_currency(c.amount)))
        .collect::<Vec<_>>()
        .join(", ");

    let recent_months = monthly_series(transactions)
        .into_iter()
        .rev()
        .take(3)
        .map(|m| {
            format!(
                "{}: Receitas {}, Despesas {}, Resultado {}",
                m.month,
                format_currency(m.revenue),
                format_currency(m.expenses),
                format_currency(m.net)
            )
        })
        .collect::<Vec<_>>()
        .join(" | ");

    let average_ticket = if totals.transaction_count > 0 {
        totals.total_revenue / Decimal::from(totals.transaction_count)
    } else {
        Decimal::ZERO
    };

    format!(
        "RESUMO FINANCEIRO:
- Total de Transações: {}
- Receitas Totais: {}
- Despesas Totais: {}
- Resultado Líquido: {}
- Transações Pendentes: {}

PRINCIPAIS CATEGORIAS DE DESPESA:
{}

HISTÓRICO MENSAL (últimos 3 meses):
{}

ANÁLISE:
- Margem: {}%
- Ticket Médio: {}",
        totals.transaction_count,
        format_currency(totals.total_revenue),
        format_currency(totals.total_expenses),
        format_currency(totals.net_result),
        pending,
        if top_categories.is_empty() {
            "Nenhuma categoria classificada".to_string()
        } else {
            top_categories
        },
        if recent_months.is_empty() {
            "Dados mensais indisponíveis".to_string()
        } else {
            recent_months
        },
        format_percent(totals.net_result, totals.total_revenue),
        format_currency(average_ticket),
    )
}

pub fn build_prompt(context: &str, message: &str) -> String {
    format!(
        "{}\n\nDADOS DISPONÍVEIS:\n{}\n\n{}\n\nUSUÁRIO: {}",
        SYSTEM_PROMPT, context, INSTRUCTIONS, message
    )
}

#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: Client,
    settings: GeminiSettings,
    api_key: String,
}

impl GeminiClient {
    /// Fails with a disabled-assistant error when the key is blank.
    pub fn new(settings: GeminiSettings, api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into().trim().to_string();
        if api_key.is_empty() {
            return Err(assistant_error(
                AssistantFailure::Disabled,
                "no Gemini API key configured",
            ));
        }
        let http = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            settings,
            api_key,
        })
    }

    pub fn from_data(settings: GeminiSettings, data: &AppData) -> Result<Self> {
        Self::new(settings, data.settings.gemini_api_key.clone())
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.settings.base_url.trim_end_matches('/'),
            self.settings.model
        )
    }

    async fn generate(&self, request: &GenerateRequest) -> Result<String> {
        tracing::debug!("Sending request to Gemini model {}", self.settings.model);
        let response = self
            .http
            .post(self.endpoint())
            .query(&[("key", self.api_key.as_str())])
            .json(request)
            .send()
            .await
            .map_err(|e| assistant_error(AssistantFailure::Other, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let err = classify_failure(status, &body);
            tracing::warn!("Gemini request failed: {}", err);
            return Err(err);
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| assistant_error(AssistantFailure::InvalidResponse, e.to_string()))?;

        parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .and_then(|content| content.parts.into_iter().next())
            .and_then(|part| part.text)
            .ok_or_else(|| {
                assistant_error(AssistantFailure::InvalidResponse, "Resposta inválida da API")
            })
    }

    /// Asks a question about the ledger and returns the model's answer.
    pub async fn chat(&self, data: &AppData, message: &str) -> Result<String> {
        let message = message.trim();
        if message.is_empty() {
            return Err(CfoError::validation("The message is empty"));
        }
        let prompt = build_prompt(&financial_context(data), message);
        let answer = self.generate(&GenerateRequest::chat(prompt)).await?;
        tracing::info!("Gemini answered with {} characters", answer.len());
        Ok(answer)
    }

    pub async fn test_connection(&self) -> Result<()> {
        self.generate(&GenerateRequest::prompt(PROBE_PROMPT.to_string()))
            .await
            .map(|_| ())
    }
}

/// Probes the API with `key` and stores it in the settings when it works.
pub async fn test_and_save_key<S: Storage>(
    store: &mut AppStore<S>,
    settings: &GeminiSettings,
    key: &str,
) -> Result<()> {
    let client = GeminiClient::new(settings.clone(), key)?;
    client.test_connection().await?;
    store.set_setting("gemini_api_key", key.trim()).await?;
    tracing::info!("Gemini connection verified; API key saved");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_lists_totals_and_months() {
        let data = AppData::example();
        let context = financial_context(&data);
        assert!(context.contains("- Total de Transações: 5"));
        assert!(context.contains("- Receitas Totais: R$ 46.824,91"));
        assert!(context.contains("- Transações Pendentes: 1"));
        assert!(context.contains("2.0 CUSTOS E DESPESAS OPERACIONAIS: R$ 1.370,30"));
        assert!(context.contains("2025-01: Receitas R$ 46.824,91"));
        assert!(context.contains("- Margem: 97.1%"));
    }

    #[test]
    fn empty_context_has_placeholders() {
        let data = AppData {
            transactions: Vec::new(),
            ..Default::default()
        };
        let context = financial_context(&data);
        assert!(context.contains("Nenhuma categoria classificada"));
        assert!(context.contains("Dados mensais indisponíveis"));
        assert!(context.contains("- Margem: 0.0%"));
    }

    #[test]
    fn chat_request_shape() {
        let body = serde_json::to_value(GenerateRequest::chat("oi".to_string())).unwrap();
        assert_eq!(body["contents"][0]["parts"][0]["text"], "oi");
        assert_eq!(body["generationConfig"]["topK"], 40);
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 2048);
        assert_eq!(body["safetySettings"].as_array().unwrap().len(), 4);

        let probe = serde_json::to_value(GenerateRequest::prompt("OK".to_string())).unwrap();
        assert!(probe.get("generationConfig").is_none());
        assert!(probe.get("safetySettings").is_none());
    }

    #[test]
    fn failure_classification() {
        let kind = |status: u16, body: &str| match classify_failure(
            StatusCode::from_u16(status).unwrap(),
            body,
        ) {
            CfoError::AssistantError { kind, .. } => kind,
            other => panic!("unexpected {:?}", other),
        };
        assert_eq!(
            kind(400, r#"{"error":{"message":"API key not valid","details":[{"reason":"API_KEY_INVALID"}]}}"#),
            AssistantFailure::InvalidKey
        );
        assert_eq!(kind(403, "{}"), AssistantFailure::PermissionDenied);
        assert_eq!(kind(429, ""), AssistantFailure::QuotaExceeded);
        assert_eq!(kind(500, "QUOTA_EXCEEDED"), AssistantFailure::QuotaExceeded);
        assert_eq!(kind(503, "busy"), AssistantFailure::Other);
    }

    #[test]
    fn blank_key_disables_chat() {
        let err = GeminiClient::new(GeminiSettings::default(), "  ").unwrap_err();
        assert!(matches!(
            err,
            CfoError::AssistantError {
                kind: AssistantFailure::Disabled,
                ..
            }
        ));
    }
}
