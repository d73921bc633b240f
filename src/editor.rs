//! Host editor boundary.
//!
//! The editor owns the card being edited and its clipboard; this crate only
//! reads and writes fields through this trait.  Field identity is
//! positional — the host decides what each ordinal index means.

use crate::pipeline::FieldMap;

/// The card currently open in the host editor.
pub trait CardEditor {
    /// Text of the field at `index`, or `None` when the card has no such
    /// field.
    fn field_text(&self, index: usize) -> Option<String>;

    /// Write every entry of `fields` into the card.  Indices the card does
    /// not have are the host's problem to ignore.
    fn write_fields(&mut self, fields: &FieldMap);

    /// Place `text` on the host clipboard.
    fn copy_to_clipboard(&mut self, text: &str);
}
