//! Drives a [`RopeEditor`] through a [`Script`] and records what the bridge's
//! subscribers receive.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, debug_span};

use crate::bridge::{BridgeOptions, BridgeStats, EditorSnapshot, EditorStateBridge};
use crate::editor::{DocState, EditorError, EditorState, RopeEditor};
use crate::script::{Command, Script};
use crate::store::Subscription;

/// One snapshot delivered to one subscriber.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Delivery {
    /// Script line being executed, 0 before the first step.
    pub step: usize,
    pub subscriber: usize,
    pub version: u64,
    pub text: String,
    pub cursor: (usize, usize),
    pub empty: bool,
}

impl Delivery {
    fn new(step: usize, subscriber: usize, state: &DocState) -> Self {
        Self {
            step,
            subscriber,
            version: state.version(),
            text: state.text(),
            cursor: state.cursor().position(),
            empty: state.is_empty(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReplayReport {
    pub deliveries: Vec<Delivery>,
    pub stats: BridgeStats,
    /// Number of script steps executed.
    pub steps: usize,
}

impl ReplayReport {
    /// Deliveries received by one subscriber, in order.
    pub fn for_subscriber(&self, subscriber: usize) -> impl Iterator<Item = &Delivery> {
        self.deliveries
            .iter()
            .filter(move |d| d.subscriber == subscriber)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReplayError {
    #[error("activation failed")]
    Activate(#[source] EditorError),

    #[error("line {line}: activation failed")]
    ActivateAt {
        line: usize,
        #[source]
        source: EditorError,
    },
}

/// Run `script` against a fresh, empty editor.
///
/// `subscribers` observers subscribe before the bridge is activated; the
/// script's `subscribe` command adds more later.
///
/// # Errors
/// Returns the editor's error if an activation is refused.
pub fn replay(
    script: &Script,
    options: BridgeOptions,
    subscribers: usize,
) -> Result<ReplayReport, ReplayError> {
    let editor = Rc::new(RopeEditor::new());
    let bridge = EditorStateBridge::new(Rc::clone(&editor), options);
    let recorder = Recorder::default();

    let mut subscriptions: Vec<Subscription> = (0..subscribers)
        .map(|id| recorder.attach(&bridge, id))
        .collect();
    bridge.activate().map_err(ReplayError::Activate)?;

    for step in script.steps() {
        let _span = debug_span!("step", line = step.line).entered();
        recorder.step.set(step.line);
        match &step.command {
            Command::Load(text) => {
                editor.load(text);
            }
            Command::Insert(text) => {
                editor.insert(text);
            }
            Command::Newline => {
                editor.newline();
            }
            Command::Backspace => {
                editor.backspace();
            }
            Command::Delete => {
                editor.delete();
            }
            Command::Move(motion) => {
                editor.move_cursor(*motion);
            }
            Command::Goto { line, col } => {
                editor.move_to(*line, *col);
            }
            Command::Subscribe => {
                let id = subscriptions.len();
                subscriptions.push(recorder.attach(&bridge, id));
            }
            Command::Activate => {
                bridge
                    .activate()
                    .map_err(|source| ReplayError::ActivateAt {
                        line: step.line,
                        source,
                    })?;
            }
            Command::Deactivate => bridge.deactivate(),
            Command::Dispose => editor.dispose(),
        }
    }

    let stats = bridge.stats();
    debug!(?stats, subscribers = subscriptions.len(), "replay finished");
    drop(subscriptions);
    Ok(ReplayReport {
        deliveries: recorder.deliveries.take(),
        stats,
        steps: script.len(),
    })
}

#[derive(Default)]
struct Recorder {
    step: Rc<Cell<usize>>,
    deliveries: Rc<RefCell<Vec<Delivery>>>,
}

impl Recorder {
    fn attach(&self, bridge: &EditorStateBridge<RopeEditor>, id: usize) -> Subscription {
        let step = Rc::clone(&self.step);
        let sink = Rc::clone(&self.deliveries);
        bridge.subscribe(move |snapshot: &EditorSnapshot<RopeEditor>| {
            sink.borrow_mut()
                .push(Delivery::new(step.get(), id, &snapshot.editor_state));
        })
    }
}
