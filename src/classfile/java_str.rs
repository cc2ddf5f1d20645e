use std::borrow::Cow;
use std::sync::Arc;

use cesu8_str::java as cesu8_java;

use crate::error::{Error, Result};

/// Decodes a modified UTF-8 byte sequence from a class file into UTF-8.
pub(crate) fn decode_utf8(bytes: &[u8]) -> Result<Arc<str>> {
    let java_str = cesu8_java::JavaStr::from_java_cesu8(bytes)
        .map_err(|e| Error::format(format!("malformed modified UTF-8: {e:?}")))?;

    Ok(match cesu8_java::from_java_cesu8(java_str) {
        Cow::Borrowed(text) => Arc::from(text),
        Cow::Owned(text) => Arc::from(text),
    })
}
