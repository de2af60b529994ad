use crate::{CrawlPhase, CrawlState, Effect, Msg};

/// Pure update function: applies a message to state and returns any effects.
///
/// Messages that do not fit the current phase leave the state untouched and
/// produce no effects.
pub fn update(mut state: CrawlState, msg: Msg) -> (CrawlState, Vec<Effect>) {
    let effects = match msg {
        Msg::Start => {
            if state.phase() != CrawlPhase::Idle {
                return (state, Vec::new());
            }
            if state.history().is_empty() {
                state.set_phase(CrawlPhase::Seeding);
                state.seed();
            }
            state.set_phase(CrawlPhase::Visiting);
            next_step(&mut state)
        }
        Msg::PageExported { url, links } => {
            if state.phase() != CrawlPhase::Visiting || !state.take_in_flight(&url) {
                return (state, Vec::new());
            }
            state.finish_page(&url);
            state.enqueue_discovered(links);
            next_step(&mut state)
        }
        Msg::PageFailed { url, reason } => {
            if state.phase() != CrawlPhase::Visiting || !state.take_in_flight(&url) {
                return (state, Vec::new());
            }
            state.record_failure(&url, reason);
            state.finish_page(&url);
            next_step(&mut state)
        }
        Msg::Stop { reason } => match state.phase() {
            CrawlPhase::Idle | CrawlPhase::Seeding | CrawlPhase::Visiting => {
                state.set_stop_reason(reason);
                state.set_phase(CrawlPhase::Draining);
                vec![Effect::Drain]
            }
            CrawlPhase::Draining | CrawlPhase::Done => Vec::new(),
        },
        Msg::Drained => {
            if state.phase() != CrawlPhase::Draining {
                return (state, Vec::new());
            }
            state.set_phase(CrawlPhase::Done);
            vec![Effect::Finished]
        }
    };

    (state, effects)
}

fn next_step(state: &mut CrawlState) -> Vec<Effect> {
    match state.claim_head() {
        Some((index, url)) => vec![Effect::ExportPage { index, url }],
        None => {
            state.set_phase(CrawlPhase::Draining);
            vec![Effect::Drain]
        }
    }
}
