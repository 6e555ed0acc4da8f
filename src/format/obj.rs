use crate::format::FormatError;
use crate::module::ObjectModule;

pub const CMD_END: u16 = 0x0000;
pub const CMD_SOURCE_FILE: u16 = 0xd000;
pub const CMD_CODE: u16 = 0x1000;
pub const CMD_EXPORT: u16 = 0xb200;
pub const CMD_USE: u16 = 0x4000;
pub const CMD_IMPORT: u16 = 0xb0ff;

/// Largest number of words one code command can carry.
const MAX_CODE_RUN: usize = 0x100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectFile {
    pub commands: Vec<Command>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    End,
    SourceFile { name: String },
    Code(Vec<u16>),
    Export { position: u16, name: String },
    Use { position: u16 },
    Import { position: u16, name: String },
}

/// Parses one object stream into structured commands.
///
/// # Errors
/// Returns `FormatError` when the stream is malformed or contains unsupported commands.
pub fn parse_object(input: &[u8]) -> Result<ObjectFile, FormatError> {
    let mut reader = Reader::new(input);
    let mut commands = Vec::new();

    while !reader.is_eof() {
        let code = reader.read_u16_be()?;
        match code {
            CMD_END => {
                commands.push(Command::End);
                break;
            }
            CMD_SOURCE_FILE => {
                let name = reader.read_name()?;
                commands.push(Command::SourceFile { name });
            }
            CMD_EXPORT => {
                let position = reader.read_u16_be()?;
                let name = reader.read_name()?;
                commands.push(Command::Export { position, name });
            }
            CMD_USE => {
                let position = reader.read_u16_be()?;
                commands.push(Command::Use { position });
            }
            CMD_IMPORT => {
                let position = reader.read_u16_be()?;
                let name = reader.read_name()?;
                commands.push(Command::Import { position, name });
            }
            _ if (code & 0xff00) == CMD_CODE => {
                let count = usize::from(code.to_be_bytes()[1]) + 1;
                let mut words = Vec::with_capacity(count);
                for _ in 0..count {
                    words.push(reader.read_u16_be()?);
                }
                commands.push(Command::Code(words));
            }
            _ => return Err(FormatError::UnsupportedCommand(code)),
        }
    }

    let rest = reader.remaining();
    if !rest.is_empty() {
        return Err(FormatError::TrailingData(rest.len()));
    }
    Ok(ObjectFile { commands })
}

/// Encodes a module as an object stream that `parse_object` accepts.
#[must_use]
pub fn encode_object(module: &ObjectModule) -> Vec<u8> {
    let mut out = Vec::new();
    if let Some(name) = &module.name {
        out.extend_from_slice(&CMD_SOURCE_FILE.to_be_bytes());
        put_name(&mut out, name);
    }
    for chunk in module.object_code.chunks(MAX_CODE_RUN) {
        // chunks() never yields an empty slice
        let count = u16::try_from(chunk.len() - 1).unwrap_or(0xff);
        out.extend_from_slice(&(CMD_CODE | count).to_be_bytes());
        for word in chunk {
            out.extend_from_slice(&word.to_be_bytes());
        }
    }
    for (name, position) in &module.exported_labels {
        out.extend_from_slice(&CMD_EXPORT.to_be_bytes());
        out.extend_from_slice(&position.to_be_bytes());
        put_name(&mut out, name);
    }
    for position in &module.used_labels {
        out.extend_from_slice(&CMD_USE.to_be_bytes());
        out.extend_from_slice(&position.to_be_bytes());
    }
    for (position, name) in &module.imported_labels {
        out.extend_from_slice(&CMD_IMPORT.to_be_bytes());
        out.extend_from_slice(&position.to_be_bytes());
        put_name(&mut out, name);
    }
    out.extend_from_slice(&CMD_END.to_be_bytes());
    out
}

fn put_name(out: &mut Vec<u8>, name: &str) {
    out.extend_from_slice(name.as_bytes());
    out.push(0);
    if out.len() % 2 != 0 {
        out.push(0);
    }
}

struct Reader<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(input: &'a [u8]) -> Self {
        Self { input, pos: 0 }
    }

    fn is_eof(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn read_u16_be(&mut self) -> Result<u16, FormatError> {
        let bytes = self.read_bytes(2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    fn read_bytes(&mut self, size: usize) -> Result<&'a [u8], FormatError> {
        if self.pos + size > self.input.len() {
            return Err(FormatError::UnexpectedEof);
        }
        let begin = self.pos;
        self.pos += size;
        Ok(&self.input[begin..self.pos])
    }

    fn read_cstring_even(&mut self) -> Result<Vec<u8>, FormatError> {
        let begin = self.pos;
        while self.pos < self.input.len() {
            if self.input[self.pos] == 0 {
                let value = self.input[begin..self.pos].to_vec();
                self.pos += 1;
                self.align_even();
                return Ok(value);
            }
            self.pos += 1;
        }
        Err(FormatError::UnterminatedString)
    }

    fn read_name(&mut self) -> Result<String, FormatError> {
        let raw = self.read_cstring_even()?;
        String::from_utf8(raw).map_err(|err| FormatError::InvalidLabelName(err.into_bytes()))
    }

    fn align_even(&mut self) {
        if self.pos % 2 != 0 && self.pos < self.input.len() {
            self.pos += 1;
        }
    }

    fn remaining(&self) -> &'a [u8] {
        &self.input[self.pos..]
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::{encode_object, parse_object, Command};
    use crate::format::FormatError;
    use crate::module::ObjectModule;

    #[test]
    fn parses_minimal_supported_stream() {
        let data: &[u8] = &[
            // d0 00 name="a.o" even
            0xd0, 0x00, b'a', b'.', b'o', 0x00,
            // 10 01 two words
            0x10, 0x01, 0x7f, 0x81, 0x00, 0x00,
            // b2 00 pos=0 name="start" even
            0xb2, 0x00, 0x00, 0x00, b's', b't', b'a', b'r', b't', 0x00,
            // 40 00 pos=1
            0x40, 0x00, 0x00, 0x01,
            // end
            0x00, 0x00,
        ];

        let object = parse_object(data).expect("parse should succeed");
        assert_eq!(
            object.commands,
            vec![
                Command::SourceFile {
                    name: "a.o".to_string()
                },
                Command::Code(vec![0x7f81, 0x0000]),
                Command::Export {
                    position: 0,
                    name: "start".to_string()
                },
                Command::Use { position: 1 },
                Command::End,
            ]
        );
    }

    #[test]
    fn parses_import_with_odd_length_name() {
        let data: &[u8] = &[
            // b0 ff pos=3 name="fn" + pad
            0xb0, 0xff, 0x00, 0x03, b'f', b'n', 0x00, 0x00,
            0x00, 0x00,
        ];
        let object = parse_object(data).expect("parse should succeed");
        assert!(matches!(
            &object.commands[0],
            Command::Import { position: 3, name } if name == "fn"
        ));
        assert!(matches!(object.commands[1], Command::End));
    }

    #[test]
    fn rejects_truncated_and_trailing_streams() {
        let err = parse_object(&[0x10, 0x01, 0x00, 0x01]).expect_err("missing second word");
        assert!(matches!(err, FormatError::UnexpectedEof));

        let err = parse_object(&[0xb2, 0x00, 0x00, 0x00, b'x']).expect_err("no terminator");
        assert!(matches!(err, FormatError::UnterminatedString));

        let err = parse_object(&[0x00, 0x00, 0xde, 0xad]).expect_err("bytes after end");
        assert!(matches!(err, FormatError::TrailingData(2)));
    }

    #[test]
    fn rejects_non_utf8_label() {
        let err = parse_object(&[0xb2, 0x00, 0x00, 0x00, 0xff, 0x00]).expect_err("bad name");
        assert!(matches!(err, FormatError::InvalidLabelName(ref raw) if raw == &[0xff]));
    }

    #[test]
    fn encodes_long_code_in_multiple_runs() {
        let module = ObjectModule::new((0..0x180).collect())
            .named("big.o")
            .export("end", 0x180)
            .use_local(2)
            .import(5, "ext");

        let bytes = encode_object(&module);
        let object = parse_object(&bytes).expect("encoded stream must parse");
        let runs = object
            .commands
            .iter()
            .filter_map(|cmd| match cmd {
                Command::Code(words) => Some(words.len()),
                _ => None,
            })
            .collect::<Vec<_>>();
        assert_eq!(runs, vec![0x100, 0x80]);
        assert!(matches!(object.commands.last(), Some(Command::End)));
    }
}
