mod command_input;
mod confirm;
mod form_dialog;
mod input;
mod key_result;

pub use command_input::{CommandEvent, CommandInput};
pub use confirm::{ConfirmDialog, ConfirmEvent};
pub use form_dialog::{centered, render_form};
pub use input::{InputResult, TextInput};
pub use key_result::KeyResult;
