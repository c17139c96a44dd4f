//! Presenter - progressive display of an analysis
//!
//! Turns the team's turn stream into display updates: one update per turn
//! with the transcript so far, then a final update carrying the verdict.
//! Failures never reach the user as errors, only as the error sentinel.

use async_stream::stream;
use futures::{Stream, StreamExt};
use serde::Serialize;
use tracing::{error, info, warn};

use minerva_core::{verdict_text, AnalysisVerdict, ImageInput, Turn, ANALYSIS_ERROR_MESSAGE};

use crate::formatter::{to_display, to_html};
use crate::{Minerva, NewResult, ResultStore};

/// One display update
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Prediction {
    /// Verdict text, empty until the run ends
    pub text: String,
    /// Transcript so far as HTML
    pub html: String,
    /// Display text of the turn behind a progress update
    pub latest: Option<String>,
}

impl Prediction {
    fn progress(html: String, latest: String) -> Self {
        Self {
            text: String::new(),
            html,
            latest: Some(latest),
        }
    }

    fn failed() -> Self {
        Self {
            text: ANALYSIS_ERROR_MESSAGE.to_string(),
            html: String::new(),
            latest: None,
        }
    }

    /// Whether this is the last update of a run
    pub fn is_final(&self) -> bool {
        !self.text.is_empty()
    }
}

/// Analyze a screenshot on a fresh team, streaming display updates
pub fn predict<'a>(
    minerva: &'a Minerva,
    image: ImageInput,
    store: Option<&'a ResultStore>,
) -> impl Stream<Item = Prediction> + 'a {
    stream! {
        let mut team = minerva.team();
        let mut turns: Vec<Turn> = Vec::new();
        let mut messages: Vec<String> = Vec::new();
        let mut failed = false;

        {
            let analysis = minerva.analyze(&mut team, image);
            futures::pin_mut!(analysis);

            while let Some(result) = analysis.next().await {
                match result {
                    Ok(turn) => {
                        let display = to_display(Some(&turn));
                        messages.push(display.clone());
                        turns.push(turn);
                        yield Prediction::progress(to_html(&messages), display);
                    }
                    Err(e) => {
                        error!("Error during analysis: {}", e);
                        failed = true;
                        break;
                    }
                }
            }
        }

        if failed {
            yield Prediction::failed();
            return;
        }

        if let (Some(store), Some(result)) = (store, storable_result(&turns)) {
            match store.store_result(&result).await {
                Ok(id) => info!("Saved analysis result {}", id),
                Err(e) => warn!("Failed to save analysis result: {}", e),
            }
        }

        yield Prediction {
            text: verdict_text(turns.last()),
            html: to_html(&messages),
            latest: None,
        };
    }
}

/// Verdict to persist: text from the final turn, determination and confidence
/// from the latest turn that states them
fn storable_result(turns: &[Turn]) -> Option<NewResult> {
    let mut verdict = AnalysisVerdict::from_turn(turns.last())?;

    if !verdict.is_determined() || verdict.confidence_level.is_none() {
        let earlier = turns
            .iter()
            .rev()
            .skip(1)
            .filter_map(|t| AnalysisVerdict::from_turn(Some(t)))
            .find(|v| v.is_determined());

        if let Some(earlier) = earlier {
            verdict.is_scam = verdict.is_scam.or(earlier.is_scam);
            verdict.confidence_level = verdict.confidence_level.or(earlier.confidence_level);
        }
    }

    NewResult::from_verdict(&verdict)
}
