//! Orchestration state: file selection, the displayed tree and the selected node.
//!
//! [`Shell`] is a plain state machine. Callers feed it user actions
//! (`select_files`, `submit`, `click`) and extraction events (`apply`); it
//! never performs I/O itself. Every tree update replaces the whole tree.

use serde::Serialize;

use crate::document::{CandidateFile, Document, EncodedDocument, IntakePolicy};
use crate::error::InputRejected;
use crate::extract::ExtractionEvent;
use crate::schema::{ExtractionResult, PartialExtractionResult};
use crate::tree::{Node, Placeholders, ROOT_ID, project};

/// A user-visible notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "level", content = "message", rename_all = "lowercase")]
pub enum Notice {
    Warning(String),
    Error(String),
}

impl Notice {
    pub fn message(&self) -> &str {
        match self {
            Notice::Warning(m) | Notice::Error(m) => m,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Loading,
    Done,
    Failed,
}

#[derive(Debug)]
pub struct Shell {
    policy: IntakePolicy,
    files: Vec<Document>,
    mind_map: Node,
    content: Option<PartialExtractionResult>,
    selected_node: Option<Node>,
    phase: Phase,
    notices: Vec<Notice>,
    result: Option<ExtractionResult>,
}

impl Shell {
    pub fn new(policy: IntakePolicy) -> Self {
        Self {
            policy,
            files: Vec::new(),
            mind_map: Node {
                id: ROOT_ID.to_string(),
                label: String::new(),
                children: Vec::new(),
            },
            content: None,
            selected_node: None,
            phase: Phase::Idle,
            notices: Vec::new(),
            result: None,
        }
    }

    /// Replace the selection with the candidates that pass intake.
    ///
    /// Rejected candidates produce one warning notice and are returned so the
    /// caller can report details. Ignored while an extraction is in flight.
    pub fn select_files(&mut self, candidates: Vec<CandidateFile>) -> Vec<InputRejected> {
        if self.is_loading() {
            return Vec::new();
        }
        let selection = self.policy.select(candidates);
        if !selection.rejected.is_empty() {
            self.notices
                .push(Notice::Warning(self.policy.rejection_notice()));
        }
        self.files = selection.accepted;
        selection.rejected
    }

    pub fn files(&self) -> &[Document] {
        &self.files
    }

    /// Start an extraction of the first selected file.
    ///
    /// Returns the payload to send, or `None` when nothing is selected or a
    /// previous extraction is still running.
    pub fn submit(&mut self) -> Option<EncodedDocument> {
        if self.is_loading() {
            return None;
        }
        let document = self.files.first()?.encode();
        self.phase = Phase::Loading;
        self.result = None;
        Some(document)
    }

    /// Fold one extraction event into the state. Returns true if the tree,
    /// the selection or the notices changed.
    ///
    /// Only the first terminal event of a submission is honored; anything
    /// arriving afterwards is ignored.
    pub fn apply(&mut self, event: ExtractionEvent) -> bool {
        if !self.is_loading() {
            return false;
        }
        match event {
            ExtractionEvent::Delta(_) => false,
            ExtractionEvent::Partial(partial) => {
                if !partial.has_content() {
                    return false;
                }
                self.mind_map = project(&partial, Placeholders::STREAMING);
                self.content = Some(partial);
                true
            }
            ExtractionEvent::Complete(result) => {
                let content = PartialExtractionResult::from(&result);
                self.mind_map = project(&content, Placeholders::FINAL);
                self.content = Some(content);
                self.result = Some(result);
                self.phase = Phase::Done;
                true
            }
            ExtractionEvent::Failed(error) => {
                self.notices
                    .push(Notice::Error(error.user_message().to_string()));
                self.files.clear();
                self.phase = Phase::Failed;
                true
            }
        }
    }

    /// Record a node activation from the renderer. Unknown ids are ignored.
    ///
    /// For renderers driven in-process. The browser page keeps its own
    /// selection and only receives trees from the SSE relay.
    pub fn click(&mut self, id: &str) -> Option<&Node> {
        let node = self.mind_map.find(id)?.clone();
        self.selected_node = Some(node);
        self.selected_node.as_ref()
    }

    pub fn mind_map(&self) -> &Node {
        &self.mind_map
    }

    /// The snapshot behind the current tree, without placeholders. Feeds
    /// the title and key point list shown beside the map.
    pub fn content(&self) -> Option<&PartialExtractionResult> {
        self.content.as_ref()
    }

    pub fn selected_node(&self) -> Option<&Node> {
        self.selected_node.as_ref()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_loading(&self) -> bool {
        self.phase == Phase::Loading
    }

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    /// Drain notices, for relays that forward each one once.
    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    /// The validated result of the last successful extraction.
    pub fn result(&self) -> Option<&ExtractionResult> {
        self.result.as_ref()
    }
}
