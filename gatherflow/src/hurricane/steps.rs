//! Hurricane report steps.

use super::feed::StormSource;
use super::record::StormRecord;
use super::{HurricaneState, HurricaneUpdate};
use crate::config::Locale;
use crate::errors::StepError;
use crate::providers::TextGenerator;
use crate::state::require;
use crate::steps::Step;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

/// Fixed synthesis used when no storm is active.
#[must_use]
pub fn no_active_storms(locale: Locale) -> &'static str {
    match locale {
        Locale::Portuguese => "Nenhum sistema tropical ativo detectado no momento no Caribe.",
        Locale::English => "No active tropical systems detected in the Caribbean at this time.",
    }
}

/// Loads the active storm list into `storms_data`.
pub struct FetchStorms {
    source: Arc<dyn StormSource>,
    locale: Locale,
}

impl FetchStorms {
    /// Step name.
    pub const NAME: &'static str = "fetch";

    /// Creates the step.
    #[must_use]
    pub fn new(source: Arc<dyn StormSource>, locale: Locale) -> Self {
        Self { source, locale }
    }
}

impl std::fmt::Debug for FetchStorms {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchStorms")
            .field("locale", &self.locale)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Step<HurricaneState> for FetchStorms {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn requires(&self) -> &[&'static str] {
        &[]
    }

    fn produces(&self) -> &[&'static str] {
        &["storms_data"]
    }

    fn progress_message(&self, _state: &HurricaneState) -> Option<String> {
        Some(
            match self.locale {
                Locale::Portuguese => "Buscando dados de furacões ativos no Caribe...",
                Locale::English => "Fetching active hurricane data for the Caribbean...",
            }
            .to_string(),
        )
    }

    async fn run(&self, _state: &HurricaneState) -> Result<HurricaneUpdate, StepError> {
        let storms = self.source.active_storms().await?;
        info!(count = storms.len(), "Active storms loaded");
        Ok(HurricaneUpdate {
            storms_data: Some(storms),
            ..Default::default()
        })
    }
}

/// Turns `storms_data` into a meteorological summary.
///
/// An empty storm list yields [`no_active_storms`] without calling the model.
pub struct SummarizeStorms {
    generator: Arc<dyn TextGenerator>,
    locale: Locale,
}

impl SummarizeStorms {
    /// Step name.
    pub const NAME: &'static str = "summarize";

    /// Creates the step.
    #[must_use]
    pub fn new(generator: Arc<dyn TextGenerator>, locale: Locale) -> Self {
        Self { generator, locale }
    }
}

impl std::fmt::Debug for SummarizeStorms {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SummarizeStorms")
            .field("locale", &self.locale)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Step<HurricaneState> for SummarizeStorms {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn requires(&self) -> &[&'static str] {
        &["question", "storms_data"]
    }

    fn produces(&self) -> &[&'static str] {
        &["synthesis"]
    }

    fn progress_message(&self, _state: &HurricaneState) -> Option<String> {
        Some(
            match self.locale {
                Locale::Portuguese => "Gerando resumo meteorológico...",
                Locale::English => "Generating weather summary...",
            }
            .to_string(),
        )
    }

    async fn run(&self, state: &HurricaneState) -> Result<HurricaneUpdate, StepError> {
        let question = require(&state.question, Self::NAME, "question")?;
        let storms = require(&state.storms_data, Self::NAME, "storms_data")?;

        let synthesis = if storms.is_empty() {
            debug!("No active storms, using sentinel synthesis");
            no_active_storms(self.locale).to_string()
        } else {
            let prompt = summary_prompt(question, storms, self.locale);
            self.generator.generate(&prompt).await?.content
        };

        Ok(HurricaneUpdate {
            synthesis: Some(synthesis),
            ..Default::default()
        })
    }
}

fn or_unknown(value: Option<&str>, locale: Locale) -> &str {
    value.unwrap_or(match locale {
        Locale::Portuguese => "n/d",
        Locale::English => "n/a",
    })
}

/// Renders one block per storm with the feed values quoted as reported.
pub fn storm_context(storms: &[StormRecord], locale: Locale) -> String {
    let mut context = String::new();
    for storm in storms {
        let v = |value: &Option<String>| or_unknown(value.as_deref(), locale).to_string();
        let name = v(&storm.name);
        let label = storm.classification.label(locale);
        let (lat, lon) = (v(&storm.location.latitude_text), v(&storm.location.longitude_text));
        let (dir, speed) = (
            v(&storm.movement.direction_degrees),
            v(&storm.movement.speed_knots),
        );
        let (wind, pressure) = (v(&storm.wind_mph), v(&storm.pressure_mb));
        let (updated, advisory) = (v(&storm.last_update), v(&storm.links.public_advisory));

        context.push_str(&match locale {
            Locale::Portuguese => format!(
                "\n{name} ({label})\n\
                 - Intensidade: {wind} mph\n\
                 - Pressão: {pressure} mb\n\
                 - Localização: {lat}, {lon}\n\
                 - Movimento: {dir}° a {speed} nós\n\
                 - Última atualização: {updated}\n\
                 - Fontes: {advisory}\n"
            ),
            Locale::English => format!(
                "\n{name} ({label})\n\
                 - Intensity: {wind} mph\n\
                 - Pressure: {pressure} mb\n\
                 - Location: {lat}, {lon}\n\
                 - Movement: {dir}° at {speed} knots\n\
                 - Last update: {updated}\n\
                 - Sources: {advisory}\n"
            ),
        });
    }
    context
}

/// Builds the summary prompt.
pub fn summary_prompt(question: &str, storms: &[StormRecord], locale: Locale) -> String {
    let context = storm_context(storms, locale);
    match locale {
        Locale::Portuguese => format!(
            "Você é um meteorologista experiente especializado em sistemas tropicais.\n\
             Pergunta: {question}\n\
             Abaixo estão os dados mais recentes da NOAA sobre furacões ativos:\n\
             {context}\n\
             Gere um resumo técnico e claro sobre o estado atual dos furacões e tempestades \
             tropicais no Atlântico e Caribe, incluindo:\n\
             - Nome e tipo do sistema (ex: Furacão Categoria 3)\n\
             - Localização geográfica\n\
             - Direção e velocidade\n\
             - Intensidade e pressão\n\
             - Possíveis regiões em risco\n\
             - Links úteis (se disponíveis)\n"
        ),
        Locale::English => format!(
            "You are an experienced meteorologist specialized in tropical systems.\n\
             Question: {question}\n\
             Below is the latest NOAA data on active storms:\n\
             {context}\n\
             Write a clear technical summary of the current hurricanes and tropical storms \
             in the Atlantic and Caribbean, including:\n\
             - System name and type (e.g. Category 3 Hurricane)\n\
             - Geographic location\n\
             - Heading and speed\n\
             - Intensity and pressure\n\
             - Regions possibly at risk\n\
             - Useful links (if available)\n"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hurricane::feed::MockStormSource;
    use crate::providers::{LlmResponse, MockTextGenerator};

    fn test_storm() -> StormRecord {
        let mut storm = StormRecord::new("Test", "HU");
        storm.wind_mph = Some("105".to_string());
        storm.pressure_mb = Some("968".to_string());
        storm
    }

    fn state(storms: Vec<StormRecord>) -> HurricaneState {
        HurricaneState {
            question: Some("x".to_string()),
            storms_data: Some(storms),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_fetch_stores_records() {
        let mut source = MockStormSource::new();
        source
            .expect_active_storms()
            .times(1)
            .returning(|| Ok(vec![StormRecord::new("Test", "TS")]));

        let step = FetchStorms::new(Arc::new(source), Locale::Portuguese);
        let update = step.run(&HurricaneState::default()).await.unwrap();

        assert_eq!(update.storms_data.unwrap()[0].name.as_deref(), Some("Test"));
        assert!(update.synthesis.is_none());
    }

    #[tokio::test]
    async fn test_empty_storms_skip_model() {
        let mut generator = MockTextGenerator::new();
        generator.expect_generate().times(0);

        let step = SummarizeStorms::new(Arc::new(generator), Locale::Portuguese);
        let update = step.run(&state(Vec::new())).await.unwrap();

        assert_eq!(
            update.synthesis.as_deref(),
            Some("Nenhum sistema tropical ativo detectado no momento no Caribe.")
        );
    }

    #[tokio::test]
    async fn test_prompt_quotes_storm_values() {
        let mut generator = MockTextGenerator::new();
        generator
            .expect_generate()
            .withf(|prompt: &str| {
                prompt.contains("Test (Furacão)")
                    && prompt.contains("105 mph")
                    && prompt.contains("968 mb")
            })
            .times(1)
            .returning(|_| Ok(LlmResponse::new("resumo", "gpt-4o-mini", "mock")));

        let step = SummarizeStorms::new(Arc::new(generator), Locale::Portuguese);
        let update = step.run(&state(vec![test_storm()])).await.unwrap();
        assert_eq!(update.synthesis.as_deref(), Some("resumo"));
    }

    #[test]
    fn test_english_context() {
        let context = storm_context(&[test_storm()], Locale::English);
        assert!(context.contains("Test (Hurricane)"));
        assert!(context.contains("- Location: n/a, n/a"));
    }

    #[tokio::test]
    async fn test_missing_storms_field() {
        let step = SummarizeStorms::new(Arc::new(MockTextGenerator::new()), Locale::English);
        let err = step
            .run(&HurricaneState {
                question: Some("x".to_string()),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StepError::Schema(_)));
    }
}
