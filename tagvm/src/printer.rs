/// Render values as text for diagnostics
use itertools::join;

use crate::error::RuntimeError;
use crate::flex::FlexKind;
use crate::headers::{BuiltinType, TypeTag};
use crate::runtime::Interpreter;
use crate::value::Value;

// Containers nested deeper than this print as "..."
const MAX_DEPTH: usize = 8;

impl Interpreter {
    pub fn inspect(&self, value: Value) -> Result<String, RuntimeError> {
        self.inspect_at(value, 0)
    }

    fn inspect_at(&self, value: Value, depth: usize) -> Result<String, RuntimeError> {
        if !value.is_ref() {
            return Ok(format!("{}", value));
        }
        if depth >= MAX_DEPTH {
            return Ok(String::from("..."));
        }

        let tag = self.kind_of(value);

        let text = match tag.builtin() {
            Some(BuiltinType::String) => format!("\"{}\"", self.string_text(value)?),
            Some(BuiltinType::Bytes) => format!("b\"{}\"", self.string_text(value)?),
            Some(BuiltinType::Number) => self.decimal_value(value)?.to_string(),
            Some(BuiltinType::Tuple) => {
                let items = self
                    .tuple_items(value)?
                    .into_iter()
                    .map(|item| self.inspect_at(item, depth + 1))
                    .collect::<Result<Vec<String>, RuntimeError>>()?;
                format!("({})", join(items, ", "))
            }
            Some(BuiltinType::Flex) => match self.flex_kind(value)? {
                FlexKind::Bytes => format!("<flex {} bytes>", self.flex_len(value)?),
                FlexKind::Values => format!("<flex {} values>", self.flex_len(value)?),
            },
            Some(BuiltinType::WeakRef) => {
                let target = self.weak_get(value)?;
                format!("<ref {}>", self.inspect_at(target, depth + 1)?)
            }
            Some(BuiltinType::Closure) => format!("<closure {}>", self.closure_native(value)?.name),
            Some(BuiltinType::VTable) => {
                format!("<vtable {}>", self.type_name(self.vtable_tag(value)?)?)
            }
            Some(BuiltinType::File) => format!("<file {}>", self.file_path(value)?),
            Some(BuiltinType::Data) => format!("<data {} bytes>", self.data_bytes(value)?.len()),
            Some(BuiltinType::Lobby) => String::from("Lobby"),
            _ => self.inspect_type(tag)?,
        };

        Ok(text)
    }

    fn inspect_type(&self, tag: TypeTag) -> Result<String, RuntimeError> {
        Ok(format!("<{}>", self.type_name(tag)?))
    }
}
