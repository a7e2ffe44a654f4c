//! Little-endian NBT as stored in sub-chunk palettes.
//!
//! Values are decoded into [`fastnbt::Value`] so the rest of the workspace
//! can use one NBT value model regardless of byte order.

use std::collections::HashMap;
use std::io::{self, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use fastnbt::{ByteArray, IntArray, LongArray, Value};

pub const TAG_END: u8 = 0;
pub const TAG_COMPOUND: u8 = 10;

const MAX_DEPTH: usize = 512;

fn invalid(msg: impl Into<String>) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg.into())
}

/// Read one named tag. Returns `None` for an end tag.
pub fn read_named<R: Read>(reader: &mut R) -> io::Result<Option<(String, Value)>> {
    read_named_at(reader, 0)
}

/// Read a named root compound, as used for palette entries.
pub fn read_compound<R: Read>(reader: &mut R) -> io::Result<HashMap<String, Value>> {
    match read_named(reader)? {
        Some((_, Value::Compound(map))) => Ok(map),
        Some((_, other)) => Err(invalid(format!("expected compound root, got tag {}", tag_id(&other)))),
        None => Err(invalid("expected compound root, got end tag")),
    }
}

fn read_named_at<R: Read>(reader: &mut R, depth: usize) -> io::Result<Option<(String, Value)>> {
    let type_id = reader.read_u8()?;
    if type_id == TAG_END {
        return Ok(None);
    }
    let name = read_string(reader)?;
    let value = read_payload(reader, type_id, depth)?;
    Ok(Some((name, value)))
}

fn read_string<R: Read>(reader: &mut R) -> io::Result<String> {
    let length = reader.read_u16::<LittleEndian>()?;
    let mut bytes = vec![0u8; length as usize];
    reader.read_exact(&mut bytes)?;
    String::from_utf8(bytes).map_err(|e| invalid(e.to_string()))
}

fn read_len<R: Read>(reader: &mut R) -> io::Result<usize> {
    let length = reader.read_i32::<LittleEndian>()?;
    usize::try_from(length).map_err(|_| invalid(format!("negative length {}", length)))
}

fn read_payload<R: Read>(reader: &mut R, type_id: u8, depth: usize) -> io::Result<Value> {
    if depth > MAX_DEPTH {
        return Err(invalid("nesting too deep"));
    }
    match type_id {
        1 => Ok(Value::Byte(reader.read_i8()?)),
        2 => Ok(Value::Short(reader.read_i16::<LittleEndian>()?)),
        3 => Ok(Value::Int(reader.read_i32::<LittleEndian>()?)),
        4 => Ok(Value::Long(reader.read_i64::<LittleEndian>()?)),
        5 => Ok(Value::Float(reader.read_f32::<LittleEndian>()?)),
        6 => Ok(Value::Double(reader.read_f64::<LittleEndian>()?)),
        7 => {
            let length = read_len(reader)?;
            let mut bytes = vec![0u8; length];
            reader.read_exact(&mut bytes)?;
            Ok(Value::ByteArray(ByteArray::new(bytes.into_iter().map(|b| b as i8).collect())))
        }
        8 => Ok(Value::String(read_string(reader)?)),
        9 => {
            let list_type = reader.read_u8()?;
            let length = read_len(reader)?;
            if list_type == TAG_END && length > 0 {
                return Err(invalid("non-empty list of end tags"));
            }
            let mut list = Vec::with_capacity(length.min(1024));
            for _ in 0..length {
                list.push(read_payload(reader, list_type, depth + 1)?);
            }
            Ok(Value::List(list))
        }
        10 => {
            let mut compound = HashMap::new();
            while let Some((name, value)) = read_named_at(reader, depth + 1)? {
                compound.insert(name, value);
            }
            Ok(Value::Compound(compound))
        }
        11 => {
            let length = read_len(reader)?;
            let mut ints = Vec::with_capacity(length.min(1024));
            for _ in 0..length {
                ints.push(reader.read_i32::<LittleEndian>()?);
            }
            Ok(Value::IntArray(IntArray::new(ints)))
        }
        12 => {
            let length = read_len(reader)?;
            let mut longs = Vec::with_capacity(length.min(1024));
            for _ in 0..length {
                longs.push(reader.read_i64::<LittleEndian>()?);
            }
            Ok(Value::LongArray(LongArray::new(longs)))
        }
        _ => Err(invalid(format!("invalid tag type: {}", type_id))),
    }
}

pub fn tag_id(value: &Value) -> u8 {
    match value {
        Value::Byte(_) => 1,
        Value::Short(_) => 2,
        Value::Int(_) => 3,
        Value::Long(_) => 4,
        Value::Float(_) => 5,
        Value::Double(_) => 6,
        Value::ByteArray(_) => 7,
        Value::String(_) => 8,
        Value::List(_) => 9,
        Value::Compound(_) => 10,
        Value::IntArray(_) => 11,
        Value::LongArray(_) => 12,
    }
}

/// Write a named tag in little-endian NBT.
pub fn write_named<W: Write>(writer: &mut W, name: &str, value: &Value) -> io::Result<()> {
    writer.write_u8(tag_id(value))?;
    write_string(writer, name)?;
    write_payload(writer, value)
}

fn write_string<W: Write>(writer: &mut W, s: &str) -> io::Result<()> {
    let length = u16::try_from(s.len()).map_err(|_| invalid("string too long"))?;
    writer.write_u16::<LittleEndian>(length)?;
    writer.write_all(s.as_bytes())
}

fn write_payload<W: Write>(writer: &mut W, value: &Value) -> io::Result<()> {
    match value {
        Value::Byte(v) => writer.write_i8(*v),
        Value::Short(v) => writer.write_i16::<LittleEndian>(*v),
        Value::Int(v) => writer.write_i32::<LittleEndian>(*v),
        Value::Long(v) => writer.write_i64::<LittleEndian>(*v),
        Value::Float(v) => writer.write_f32::<LittleEndian>(*v),
        Value::Double(v) => writer.write_f64::<LittleEndian>(*v),
        Value::ByteArray(bytes) => {
            writer.write_i32::<LittleEndian>(bytes.len() as i32)?;
            for b in bytes.iter() {
                writer.write_i8(*b)?;
            }
            Ok(())
        }
        Value::String(s) => write_string(writer, s),
        Value::List(list) => {
            writer.write_u8(list.first().map(tag_id).unwrap_or(TAG_END))?;
            writer.write_i32::<LittleEndian>(list.len() as i32)?;
            for item in list {
                write_payload(writer, item)?;
            }
            Ok(())
        }
        Value::Compound(map) => {
            for (name, item) in map {
                write_named(writer, name, item)?;
            }
            writer.write_u8(TAG_END)
        }
        Value::IntArray(ints) => {
            writer.write_i32::<LittleEndian>(ints.len() as i32)?;
            for v in ints.iter() {
                writer.write_i32::<LittleEndian>(*v)?;
            }
            Ok(())
        }
        Value::LongArray(longs) => {
            writer.write_i32::<LittleEndian>(longs.len() as i32)?;
            for v in longs.iter() {
                writer.write_i64::<LittleEndian>(*v)?;
            }
            Ok(())
        }
    }
}
