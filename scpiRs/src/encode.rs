//! Encoding of a command and its arguments into one outgoing line.

use crate::{ScpiError, TERMINATOR, Value};

/// Encode a command mnemonic and its arguments into a line that is ready to be sent.
///
/// The first value is the command mnemonic. The first argument after it is separated by a space,
/// all further arguments by a comma. A single terminator `\n` ends the line. If the text form of
/// any value ends with a carriage return, it is stripped.
///
/// ```
/// use scpirs::encode;
///
/// let line = encode(&["APPL".into(), 5.0.into(), 1.2.into()]).unwrap();
/// assert_eq!(line, b"APPL 5.0,1.2\n");
/// ```
///
/// # Errors
/// * [`ScpiError::EmptyCommand`] if no values are given at all.
/// * [`ScpiError::InvalidArgument`] if a value contains the line terminator.
pub fn encode(args: &[Value]) -> Result<Vec<u8>, ScpiError> {
    if args.is_empty() {
        return Err(ScpiError::EmptyCommand);
    }

    let mut line = Vec::new();
    for (idx, arg) in args.iter().enumerate() {
        let text = arg.to_string();
        let mut chunk = text.as_bytes();
        if chunk.contains(&TERMINATOR) {
            return Err(ScpiError::InvalidArgument(format!(
                "Argument {text:?} contains the line terminator."
            )));
        }
        if let Some(stripped) = chunk.strip_suffix(b"\r") {
            chunk = stripped;
        }

        match idx {
            0 => {}
            1 => line.push(b' '),
            _ => line.push(b','),
        }
        line.extend_from_slice(chunk);
    }
    line.push(TERMINATOR);

    Ok(line)
}
