use serde_json::Value;

use crate::document::EncodedDocument;
use crate::schema::response_schema;

pub const SYSTEM_INSTRUCTION: &str = "You are a document analyzer. Extract the most important points from the provided PDF document. Focus on key information, main ideas, and significant details, such as any anecdotes or statistics or past cited studies by other authors. If it's a book, do one high level point per chapter.";

pub const USER_INSTRUCTION: &str = "Please read this PDF and extract the key points. For each key point, include subarguments or subpoints that are relevant to the key point. These may be statistics, anecdotes, or other details that flesh out the key point. Be VERY specific, for example, don't say `discusses the importance of X`, say what it discussed about X and what it said specifically about X.";

/// Everything a provider needs for one structured-generation call.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub system: String,
    pub user: String,
    pub document: EncodedDocument,
    pub response_schema: Value,
}

impl GenerationRequest {
    /// The fixed key-point extraction request for `document`.
    pub fn for_document(document: EncodedDocument) -> Self {
        Self {
            system: SYSTEM_INSTRUCTION.to_string(),
            user: USER_INSTRUCTION.to_string(),
            document,
            response_schema: response_schema(),
        }
    }
}
