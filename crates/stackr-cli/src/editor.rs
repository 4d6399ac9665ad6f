//! Interactive commit message editing.

use inquire::{Editor, InquireError};
use stackr_core::{MessageEditor, Result};

/// Opens the user's editor on the message template.
pub struct InteractiveEditor;

impl MessageEditor for InteractiveEditor {
    fn edit(&self, template: &str) -> Result<String> {
        match Editor::new("Commit message:")
            .with_predefined_text(template)
            .with_file_extension(".txt")
            .prompt()
        {
            Ok(text) => Ok(text),
            // An aborted edit counts as an empty message.
            Err(InquireError::OperationCanceled | InquireError::OperationInterrupted) => {
                Ok(String::new())
            }
            Err(InquireError::IO(e)) => Err(e.into()),
            Err(e) => Err(std::io::Error::other(e.to_string()).into()),
        }
    }
}
