//! Transition selection for segment changes

use crate::config::TransitionConfig;
use crate::models::{Segment, TransitionSpec};

/// Pick the transition used to bring `incoming` on air
///
/// Precedence: the segment's own transition, then into/out-of break rules,
/// then the show default, then a zero-length cut.
pub fn select_transition(
    incoming: &Segment,
    outgoing: Option<&Segment>,
    config: Option<&TransitionConfig>,
) -> TransitionSpec {
    if let Some(own) = &incoming.transition {
        return own.clone();
    }

    let leaving_break = outgoing.is_some_and(Segment::is_break);

    if let Some(config) = config {
        if incoming.is_break() && !leaving_break {
            if let Some(t) = &config.into_break {
                return t.clone();
            }
        }
        if leaving_break && !incoming.is_break() {
            if let Some(t) = &config.out_of_break {
                return t.clone();
            }
        }
        if let Some(t) = &config.default {
            return t.clone();
        }
    }

    TransitionSpec::cut()
}
