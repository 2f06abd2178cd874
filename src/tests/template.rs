use crate::engine::Error;
use crate::template::{compose, match_template, Arg, Capture, Replay};
use heapless::Vec;

fn composed<const N: usize>(template: &[u8], args: &[Arg<'_>]) -> Result<Vec<u8, N>, Error> {
    let mut command = Vec::new();
    compose(&mut command, template, args)?;
    Ok(command)
}

#[test]
fn test_compose_literal() {
    let command: Vec<u8, 32> = composed(b"+CMEE=1", &[]).unwrap();
    assert_eq!(b"+CMEE=1\r", command.as_slice());
}

#[test]
fn test_compose_uint() {
    let command: Vec<u8, 32> = composed(b"+UHTTP=0,5,%u", &[Arg::Uint(443)]).unwrap();
    assert_eq!(b"+UHTTP=0,5,443\r", command.as_slice());
}

#[test]
fn test_compose_uint_zero_single_digit() {
    let command: Vec<u8, 32> = composed(b"+URAT=%u", &[Arg::Uint(0)]).unwrap();
    assert_eq!(b"+URAT=0\r", command.as_slice());
}

#[test]
fn test_compose_uint_max() {
    let command: Vec<u8, 32> = composed(b"%u", &[Arg::Uint(u32::MAX)]).unwrap();
    assert_eq!(b"4294967295\r", command.as_slice());
}

#[test]
fn test_compose_uint_reparse() {
    for value in [1, 9, 10, 99, 100, 65_535, 1_000_000, 123_456_789, u32::MAX] {
        let command: Vec<u8, 16> = composed(b"%u", &[Arg::Uint(value)]).unwrap();
        let digits = core::str::from_utf8(&command[..command.len() - 1]).unwrap();

        assert!(!digits.starts_with('0'));
        assert_eq!(value, digits.parse::<u32>().unwrap());
    }
}

#[test]
fn test_compose_multiple_args() {
    let command: Vec<u8, 64> = composed(
        b"+UHTTPC=0,1,\"%s\",\"%s\"",
        &[Arg::Str("/firmware"), Arg::Str("TEMP.DAT")],
    )
    .unwrap();
    assert_eq!(b"+UHTTPC=0,1,\"/firmware\",\"TEMP.DAT\"\r", command.as_slice());
}

#[test]
fn test_compose_unknown_placeholder() {
    let result: Result<Vec<u8, 32>, _> = composed(b"+CMD=%d", &[Arg::Uint(1)]);
    assert_eq!(Error::FormatNotSupported, result.unwrap_err());
}

#[test]
fn test_compose_type_mismatch() {
    let result: Result<Vec<u8, 32>, _> = composed(b"+URAT=%u", &[Arg::Str("1")]);
    assert_eq!(Error::FormatNotSupported, result.unwrap_err());
}

#[test]
fn test_compose_missing_arg() {
    let result: Result<Vec<u8, 32>, _> = composed(b"+UPSD=0,1,\"%s\"", &[]);
    assert_eq!(Error::FormatNotSupported, result.unwrap_err());
}

#[test]
fn test_compose_trailing_percent() {
    let result: Result<Vec<u8, 32>, _> = composed(b"+CMD%", &[]);
    assert_eq!(Error::FormatNotSupported, result.unwrap_err());
}

#[test]
fn test_compose_overflow() {
    let result: Result<Vec<u8, 8>, _> = composed(b"+UPSD=0,1,\"%s\"", &[Arg::Str("internet")]);
    assert_eq!(Error::BufferOverflow, result.unwrap_err());
}

#[test]
fn test_compose_terminator_overflow() {
    let result: Result<Vec<u8, 4>, _> = composed(b"+CSQ", &[]);
    assert_eq!(Error::BufferOverflow, result.unwrap_err());
}

#[test]
fn test_match_literal() {
    let mut source = Replay::new(b"\r\nOK\r\n");
    match_template(&mut source, b"OK", &mut []).unwrap();
}

#[test]
fn test_match_single_garbage_byte() {
    let mut source = Replay::new(b"Xfoo");
    match_template(&mut source, b"foo", &mut []).unwrap();
}

#[test]
fn test_match_mismatched_byte_not_retested() {
    // Second 'f' fails against 'o' and is not taken as a new template start
    let mut source = Replay::new(b"ffoo");
    assert_eq!(Error::UnexpectedResponse, match_template(&mut source, b"foo", &mut []).unwrap_err());

    let mut source = Replay::new(b"ffoo foo");
    match_template(&mut source, b"foo", &mut []).unwrap();
}

#[test]
fn test_match_uint_captures() {
    let (mut power, mut quality) = (0, 0);
    let mut source = Replay::new(b"\r\n+CSQ: 17,99\r\n");

    match_template(
        &mut source,
        b"+CSQ: %u,%u",
        &mut [Capture::Uint(&mut power), Capture::Uint(&mut quality)],
    )
    .unwrap();

    assert_eq!(17, power);
    assert_eq!(99, quality);
}

#[test]
fn test_match_uint_ten_digits() {
    let mut value = 0;
    let mut source = Replay::new(b"MCC:4294967295\r");

    match_template(&mut source, b"MCC:%u", &mut [Capture::Uint(&mut value)]).unwrap();
    assert_eq!(u32::MAX, value);
}

#[test]
fn test_match_uint_eleven_digits() {
    let mut value = 0;
    let mut source = Replay::new(b"MCC:12345678901\r");

    let result = match_template(&mut source, b"MCC:%u", &mut [Capture::Uint(&mut value)]);
    assert_eq!(Error::BufferOverflow, result.unwrap_err());
}

#[test]
fn test_match_uint_exceeding_u32() {
    let mut value = 0;
    let mut source = Replay::new(b"MCC:4294967296\r");

    let result = match_template(&mut source, b"MCC:%u", &mut [Capture::Uint(&mut value)]);
    assert_eq!(Error::BufferOverflow, result.unwrap_err());
}

#[test]
fn test_match_str_until_terminator() {
    let mut operator: Vec<u8, 25> = Vec::new();
    let (mut mode, mut format, mut technology) = (0, 0, 0);
    let mut source = Replay::new(b"\r\n+COPS: 0,0,\"vodafone UK\",2\r\n");

    match_template(
        &mut source,
        b"+COPS: %u,%u,\"%s\",%u",
        &mut [
            Capture::Uint(&mut mode),
            Capture::Uint(&mut format),
            Capture::Str(&mut operator),
            Capture::Uint(&mut technology),
        ],
    )
    .unwrap();

    assert_eq!(b"vodafone UK", operator.as_slice());
    assert_eq!(2, technology);
}

#[test]
fn test_match_str_until_capacity() {
    let mut imsi: Vec<u8, 15> = Vec::new();
    let mut source = Replay::new(b"\r\n234150000000001\r\n");

    match_template(&mut source, b"\r\n%s", &mut [Capture::Str(&mut imsi)]).unwrap();
    assert_eq!(b"234150000000001", imsi.as_slice());
}

#[test]
fn test_match_trailing_str_until_nul() {
    let mut text: Vec<u8, 8> = Vec::new();
    let mut source = Replay::new(b"ab\0cd");

    match_template(&mut source, b"%s", &mut [Capture::Str(&mut text)]).unwrap();
    assert_eq!(b"ab", text.as_slice());
}

#[test]
fn test_match_str_exact_capacity() {
    let mut name: Vec<u8, 4> = Vec::new();
    let mut size = 0;
    let mut source = Replay::new(b"+URDFILE: \"TEMP\",512,\"");

    match_template(
        &mut source,
        b"+URDFILE: \"%s\",%u,\"",
        &mut [Capture::Str(&mut name), Capture::Uint(&mut size)],
    )
    .unwrap();

    assert_eq!(b"TEMP", name.as_slice());
    assert_eq!(512, size);
}

#[test]
fn test_match_capture_missing() {
    let mut source = Replay::new(b"+CSQ: 17,99\r\n");
    let result = match_template(&mut source, b"+CSQ: %u,%u", &mut []);
    assert_eq!(Error::FormatNotSupported, result.unwrap_err());
}

#[test]
fn test_match_capture_type_mismatch() {
    let mut text: Vec<u8, 8> = Vec::new();
    let mut source = Replay::new(b"+CSQ: 17\r\n");

    let result = match_template(&mut source, b"+CSQ: %u", &mut [Capture::Str(&mut text)]);
    assert_eq!(Error::FormatNotSupported, result.unwrap_err());
}

#[test]
fn test_match_exhausted() {
    let mut source = Replay::new(b"\r\nERROR\r\n");
    assert_eq!(Error::UnexpectedResponse, match_template(&mut source, b"OK", &mut []).unwrap_err());
}

#[test]
fn test_match_empty_source() {
    let mut source = Replay::new(b"");
    assert_eq!(Error::UnexpectedResponse, match_template(&mut source, b"OK", &mut []).unwrap_err());
}
