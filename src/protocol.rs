use serde::Deserialize;

// One frame from the controller = one JSON object with a "type" tag.
// Anything with a tag we don't know is deliberately ignored, not an error:
// the controller speaks to more than one kind of listener.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type")]
pub enum Command {
    #[serde(rename = "terminal-update", rename_all = "camelCase")]
    TerminalUpdate { shell_command: String },
    #[serde(rename = "file-update")]
    FileUpdate(FileUpdate),
    #[serde(other)]
    Unknown,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FileUpdate {
    pub full_path: String,
    pub file_content: String,
}
