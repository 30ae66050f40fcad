pub(crate) mod parse;

use crate::errors::CodecError;
use crate::types::DataType;

/// Checks that a column holding a value to decode is of the custom type
/// implemented by marshaller `class_name`.
pub(crate) fn validate_custom_type(typ: &DataType, class_name: &str) -> Result<(), CodecError> {
    if typ.is_custom_of(class_name) {
        Ok(())
    } else {
        Err(CodecError::BadParams(format!(
            "expected a value of type '{}', got {}",
            class_name, typ
        )))
    }
}
