//! # AT templates
//!
//! Commands and responses are described by byte string templates. Literal bytes are sent or expected verbatim,
//! placeholders get substituted or captured:
//!
//! * `%u`: unsigned decimal integer ([Arg::Uint], [Capture::Uint])
//! * `%s`: text ([Arg::Str], [Capture::Str])
//!
//! Arguments and captures are matched positionally against the placeholders of the template.
use crate::engine::Error;
use heapless::Vec;
use numtoa::NumToA;

/// Line terminator appended to every composed command
pub(crate) const END_CHARACTER: u8 = b'\r';

/// Max. digit count of a captured integer
pub const MAX_DIGITS: usize = 10;

/// Value substituted for a placeholder of a command template
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Arg<'a> {
    /// Substitutes `%u`
    Uint(u32),

    /// Substitutes `%s`
    Str(&'a str),
}

/// Destination of a `%s` capture
pub trait TextSink {
    /// Removes all previously captured bytes
    fn clear(&mut self);

    /// Appends a byte. Returns false if the sink is full and the byte was not stored.
    fn push_byte(&mut self, byte: u8) -> bool;
}

impl<const N: usize> TextSink for Vec<u8, N> {
    fn clear(&mut self) {
        Vec::clear(self)
    }

    fn push_byte(&mut self, byte: u8) -> bool {
        self.push(byte).is_ok()
    }
}

/// Destination for a placeholder of a response template
pub enum Capture<'a> {
    /// Receives a `%u` value
    Uint(&'a mut u32),

    /// Receives `%s` text. Capturing stops at the template byte following the placeholder (NUL if the placeholder
    /// ends the template) or when the sink is full.
    Str(&'a mut dyn TextSink),
}

/// Expands the template into `command` and terminates it with [END_CHARACTER]
pub(crate) fn compose<const N: usize>(
    command: &mut Vec<u8, N>,
    template: &[u8],
    args: &[Arg<'_>],
) -> Result<(), Error> {
    let mut args = args.iter();
    let mut position = 0;

    while position < template.len() {
        if template[position] != b'%' {
            append(command, &template[position..=position])?;
            position += 1;
            continue;
        }

        let kind = template.get(position + 1).copied();
        position += 2;

        match (kind, args.next()) {
            (Some(b'u'), Some(Arg::Uint(value))) => {
                let mut digits = [0x0; 20];
                append(command, (*value).numtoa(10, &mut digits))?;
            }
            (Some(b's'), Some(Arg::Str(text))) => append(command, text.as_bytes())?,
            _ => return Err(Error::FormatNotSupported),
        }
    }

    append(command, &[END_CHARACTER])
}

fn append<const N: usize>(command: &mut Vec<u8, N>, bytes: &[u8]) -> Result<(), Error> {
    command.extend_from_slice(bytes).map_err(|_| Error::BufferOverflow)
}

/// Byte supply for [match_template]
pub(crate) trait ByteSource {
    /// Reads the first byte of a match attempt
    fn first(&mut self) -> Result<u8, Error>;

    /// Reads any following byte
    fn next(&mut self) -> Result<u8, Error>;
}

/// Consumes bytes from the source until the template is matched.
///
/// On a literal mismatch matching restarts at the beginning of the template (captures included). The byte which
/// failed comparison is not tested against the template start again, matching continues with the next byte.
pub(crate) fn match_template<S: ByteSource>(
    source: &mut S,
    template: &[u8],
    captures: &mut [Capture<'_>],
) -> Result<(), Error> {
    let mut byte = source.first()?;
    let mut position = 0;
    let mut capture_index = 0;

    while position < template.len() {
        if template[position] != b'%' {
            let expected = template[position];
            position += 1;

            if byte != expected {
                position = 0;
                capture_index = 0;
            }

            if position < template.len() {
                byte = source.next()?;
            }
            continue;
        }

        let kind = template.get(position + 1).copied();
        position += 2;

        match (kind, captures.get_mut(capture_index)) {
            (Some(b'u'), Some(Capture::Uint(value))) => {
                **value = read_number(source, &mut byte)?;
            }
            (Some(b's'), Some(Capture::Str(sink))) => {
                // A trailing placeholder ends at NUL
                let terminator = template.get(position).copied().unwrap_or(0);
                sink.clear();

                while byte != terminator && sink.push_byte(byte) {
                    byte = source.next()?;
                }
            }
            _ => return Err(Error::FormatNotSupported),
        }

        capture_index += 1;
    }

    Ok(())
}

/// Reads consecutive decimal digits, starting with the current byte. `byte` holds the first non-digit afterwards.
fn read_number<S: ByteSource>(source: &mut S, byte: &mut u8) -> Result<u32, Error> {
    let mut value = Some(0u32);
    let mut digits = 0;

    while byte.is_ascii_digit() && digits < MAX_DIGITS {
        let digit = u32::from(*byte - b'0');
        value = value.and_then(|value| value.checked_mul(10)).and_then(|value| value.checked_add(digit));
        digits += 1;
        *byte = source.next()?;
    }

    if digits == MAX_DIGITS && byte.is_ascii_digit() {
        return Err(Error::BufferOverflow);
    }

    value.ok_or(Error::BufferOverflow)
}

/// Replays already received bytes, e.g. the last line buffer
pub(crate) struct Replay<'a> {
    bytes: &'a [u8],
    position: usize,
}

impl<'a> Replay<'a> {
    pub(crate) fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, position: 0 }
    }
}

impl ByteSource for Replay<'_> {
    fn first(&mut self) -> Result<u8, Error> {
        self.next()
    }

    fn next(&mut self) -> Result<u8, Error> {
        let byte = self.bytes.get(self.position).copied().ok_or(Error::UnexpectedResponse)?;
        self.position += 1;
        Ok(byte)
    }
}
