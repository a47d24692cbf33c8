use serde_json::Value;

use crate::capability::Capability;

#[derive(Debug, Clone, PartialEq, Eq)]
/// One discovered artifact file, prior to payload parsing.
pub struct ArtifactFile {
    pub capability: Capability,
    pub ordinal: Option<u32>,
    pub file_name: String,
}

#[derive(Debug, Clone, PartialEq)]
/// One parsed artifact: a declarative intent for a single side effect.
pub struct OutputArtifact {
    pub capability: Capability,
    pub ordinal: Option<u32>,
    pub file_name: String,
    pub payload: Value,
}

/// Parse `<capability>[-<ordinal>].json` for the given capability. Returns
/// `None` when the file belongs to another capability or is not an artifact.
/// An absent ordinal denotes the single implicit instance.
pub fn parse_artifact_file_name(capability: Capability, file_name: &str) -> Option<ArtifactFile> {
    let stem = file_name.strip_suffix(".json")?;
    let remainder = stem.strip_prefix(capability.as_str())?;
    let ordinal = if remainder.is_empty() {
        None
    } else {
        let digits = remainder.strip_prefix('-')?;
        if digits.is_empty() || !digits.bytes().all(|byte| byte.is_ascii_digit()) {
            return None;
        }
        Some(digits.parse::<u32>().ok()?)
    };
    Some(ArtifactFile {
        capability,
        ordinal,
        file_name: file_name.to_string(),
    })
}
