/* Dex file index structures */

use crate::dex::error::DexError;
use crate::dex::{DexSource, Endian};
use log::{debug, warn};
use serde::Serialize;

use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek};
use std::path::Path;

/* Constants */
pub const DEX_FILE_MAGIC_035: [u8; 8] = [ 0x64, 0x65, 0x78, 0x0a, 0x30, 0x33, 0x35, 0x00 ];
pub const DEX_FILE_MAGIC_036: [u8; 8] = [ 0x64, 0x65, 0x78, 0x0a, 0x30, 0x33, 0x36, 0x00 ];
pub const ENDIAN_CONSTANT: u32 = 0x12345678;
pub const REVERSE_ENDIAN_CONSTANT: u32 = 0x78563412;

// magic + checksum + signature
const FILE_SIZE_OFF: u64 = 8 + 4 + 20;
// ... + file_size + header_size
const ENDIAN_TAG_OFF: u64 = FILE_SIZE_OFF + 4 + 4;

pub type StringId = u32;
pub type TypeId = u32;

/// The size/offset fields of `header_item` that locate the index tables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Header {
    pub magic: [u8; 8],
    pub endian: Endian,
    pub file_size: u32,
    pub header_size: u32,
    pub string_ids_size: u32,
    pub string_ids_off: u32,
    pub type_ids_size: u32,
    pub type_ids_off: u32,
    pub proto_ids_size: u32,
    pub proto_ids_off: u32,
    pub field_ids_size: u32,
    pub field_ids_off: u32,
    pub method_ids_size: u32,
    pub method_ids_off: u32,
    pub class_defs_size: u32,
    pub class_defs_off: u32,
}

impl Header
{
    /// Parses the header and switches `source` to the byte order its endian tag declares.
    ///
    /// A wrong magic is rejected straight after the first eight bytes are read.
    pub fn read<R: Read + Seek>(source: &mut DexSource<R>) -> Result<Header, DexError>
    {
        source.seek_to(0)?;
        let mut magic = [0u8; 8];
        source.read_x(&mut magic)?;
        if !verify_magic(&magic)
        {
            fail!(MalformedHeader, "magic number is wrong ({:02x?}), are you sure this is a DEX file?", magic);
        }

        source.set_endian(Endian::Little);
        source.seek_to(ENDIAN_TAG_OFF)?;
        let endian = match source.read_u4()?
        {
            ENDIAN_CONSTANT => Endian::Little,
            REVERSE_ENDIAN_CONSTANT => Endian::Big,
            other => fail!(UnsupportedEndianness, "endian constant has unexpected value {:x}", other),
        };
        source.set_endian(endian);
        debug!("DEX magic {:02x?}, {:?} endian", magic, endian);

        source.seek_to(FILE_SIZE_OFF)?;
        let file_size = source.read_u4()?;
        let header_size = source.read_u4()?;
        let _endian_tag = source.read_u4()?;
        let _link_size = source.read_u4()?;
        let _link_off = source.read_u4()?;
        let _map_off = source.read_u4()?;

        let header = Header {
            magic,
            endian,
            file_size,
            header_size,
            string_ids_size: source.read_u4()?,
            string_ids_off: source.read_u4()?,
            type_ids_size: source.read_u4()?,
            type_ids_off: source.read_u4()?,
            proto_ids_size: source.read_u4()?,
            proto_ids_off: source.read_u4()?,
            field_ids_size: source.read_u4()?,
            field_ids_off: source.read_u4()?,
            method_ids_size: source.read_u4()?,
            method_ids_off: source.read_u4()?,
            class_defs_size: source.read_u4()?,
            class_defs_off: source.read_u4()?,
        };

        let _data_size = source.read_u4()?;
        let _data_off = source.read_u4()?;

        debug!(
            "strings {} types {} protos {} fields {} methods {} class defs {}",
            header.string_ids_size, header.type_ids_size, header.proto_ids_size,
            header.field_ids_size, header.method_ids_size, header.class_defs_size
        );
        Ok(header)
    }

    /// Format revision from the magic, 35 or 36; `None` if those bytes are not digits.
    pub fn version(&self) -> Option<u32>
    {
        self.magic[4..7].iter().try_fold(0u32, |acc, &d| {
            d.checked_sub(b'0').filter(|v| *v <= 9).map(|v| acc * 10 + v as u32)
        })
    }
}

pub fn verify_magic(magic: &[u8; 8]) -> bool
{
    *magic == DEX_FILE_MAGIC_036 || *magic == DEX_FILE_MAGIC_035
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypeItem {
    pub descriptor_idx: StringId,
    /// Declared in this file, or a primitive or array type.
    pub internal: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrototypeItem {
    pub shorty_idx: StringId,
    pub return_type_idx: TypeId,
    pub parameters_off: u32,
    pub parameters: Vec<u16>,
}

impl PrototypeItem
{
    /// Reads the fixed part; `parameters` is filled in later from `parameters_off`.
    pub fn read<R: Read + Seek>(source: &mut DexSource<R>) -> Result<PrototypeItem, DexError>
    {
        Ok(PrototypeItem {
            shorty_idx: source.read_u4()?,
            return_type_idx: source.read_u4()?,
            parameters_off: source.read_u4()?,
            parameters: vec![],
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldItem {
    pub class_idx: u16,
    pub type_idx: u16,
    pub name_idx: StringId,
}

impl FieldItem
{
    pub fn read<R: Read + Seek>(source: &mut DexSource<R>) -> Result<FieldItem, DexError>
    {
        Ok(FieldItem {
            class_idx: source.read_u2()?,
            type_idx: source.read_u2()?,
            name_idx: source.read_u4()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MethodItem {
    pub class_idx: u16,
    pub proto_idx: u16,
    pub name_idx: StringId,
}

impl MethodItem
{
    pub fn read<R: Read + Seek>(source: &mut DexSource<R>) -> Result<MethodItem, DexError>
    {
        Ok(MethodItem {
            class_idx: source.read_u2()?,
            proto_idx: source.read_u2()?,
            name_idx: source.read_u4()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassDefItem {
    pub class_idx: TypeId,
}

// Table sizes come straight from the header; don't trust them for allocation.
fn capacity_hint(count: u32) -> usize
{
    count.min(0x1_0000) as usize
}

fn in_context<T>(result: Result<T, DexError>, context: &str, index: u32) -> Result<T, DexError>
{
    result.map_err(|e| DexError::with_context(e, format!("{} #{}", context, index)))
}

/// Reads the string table: all `string_id_item` offsets first, then each payload.
pub fn load_strings<R: Read + Seek>(source: &mut DexSource<R>, header: &Header) -> Result<Vec<String>, DexError>
{
    let count = header.string_ids_size;
    source.seek_to(header.string_ids_off as u64)?;
    let mut offsets = Vec::with_capacity(capacity_hint(count));
    for i in 0..count
    {
        offsets.push(in_context(source.read_u4(), "string id", i)?);
    }

    let mut strings = Vec::with_capacity(offsets.len());
    for (i, offset) in offsets.into_iter().enumerate()
    {
        // no-op when payloads are laid out in id order
        source.seek_to(offset as u64)?;
        strings.push(in_context(read_string(source), "string", i as u32)?);
    }
    Ok(strings)
}

/// Reads one `string_data_item`.
///
/// The UTF-16 length only sizes a worst-case buffer; the payload ends at the
/// first NUL or once that buffer is full.
fn read_string<R: Read + Seek>(source: &mut DexSource<R>) -> Result<String, DexError>
{
    let utf16_len = source.read_uleb128()? as usize;
    let limit = utf16_len.saturating_mul(3);
    let mut v = Vec::with_capacity(limit.min(0x1000));
    while v.len() < limit
    {
        let u = source.read_u1()?;
        if u == 0 { break; }
        v.push(u);
    }

    Ok(match cesu8::from_java_cesu8(&v)
    {
        Ok(s) => s.into_owned(),
        Err(_) => {
            warn!("string payload is not valid modified UTF-8: {:02x?}", v);
            String::from_utf8_lossy(&v).into_owned()
        }
    })
}

pub fn load_type_ids<R: Read + Seek>(source: &mut DexSource<R>, header: &Header) -> Result<Vec<TypeItem>, DexError>
{
    source.seek_to(header.type_ids_off as u64)?;
    let mut types = Vec::with_capacity(capacity_hint(header.type_ids_size));
    for i in 0..header.type_ids_size
    {
        let descriptor_idx = in_context(source.read_u4(), "type id", i)?;
        types.push(TypeItem { descriptor_idx, internal: false });
    }
    Ok(types)
}

/// Reads the `proto_id_item`s, then goes back for each parameter `type_list`.
pub fn load_proto_ids<R: Read + Seek>(source: &mut DexSource<R>, header: &Header) -> Result<Vec<PrototypeItem>, DexError>
{
    source.seek_to(header.proto_ids_off as u64)?;
    let mut protos = Vec::with_capacity(capacity_hint(header.proto_ids_size));
    for i in 0..header.proto_ids_size
    {
        protos.push(in_context(PrototypeItem::read(source), "proto id", i)?);
    }

    for (i, proto) in protos.iter_mut().enumerate()
    {
        if proto.parameters_off == 0 { continue; }
        proto.parameters = in_context(read_type_list(source, proto.parameters_off), "type list of proto", i as u32)?;
    }
    Ok(protos)
}

fn read_type_list<R: Read + Seek>(source: &mut DexSource<R>, offset: u32) -> Result<Vec<u16>, DexError>
{
    source.seek_to(offset as u64)?;
    let size = source.read_u4()?;
    let mut v = Vec::with_capacity(capacity_hint(size));
    for _ in 0..size { v.push(source.read_u2()?); }
    Ok(v)
}

pub fn load_field_ids<R: Read + Seek>(source: &mut DexSource<R>, header: &Header) -> Result<Vec<FieldItem>, DexError>
{
    source.seek_to(header.field_ids_off as u64)?;
    let mut fields = Vec::with_capacity(capacity_hint(header.field_ids_size));
    for i in 0..header.field_ids_size
    {
        fields.push(in_context(FieldItem::read(source), "field id", i)?);
    }
    Ok(fields)
}

pub fn load_method_ids<R: Read + Seek>(source: &mut DexSource<R>, header: &Header) -> Result<Vec<MethodItem>, DexError>
{
    source.seek_to(header.method_ids_off as u64)?;
    let mut methods = Vec::with_capacity(capacity_hint(header.method_ids_size));
    for i in 0..header.method_ids_size
    {
        methods.push(in_context(MethodItem::read(source), "method id", i)?);
    }
    Ok(methods)
}

/// Reads `class_def_item`s, keeping only the declared type.
pub fn load_class_defs<R: Read + Seek>(source: &mut DexSource<R>, header: &Header) -> Result<Vec<ClassDefItem>, DexError>
{
    source.seek_to(header.class_defs_off as u64)?;
    let mut class_defs = Vec::with_capacity(capacity_hint(header.class_defs_size));
    for i in 0..header.class_defs_size
    {
        let class_idx = in_context(source.read_u4(), "class def", i)?;
        // access_flags, superclass_idx, interfaces_off, source_file_idx,
        // annotations_off, class_data_off, static_values_off
        let mut rest = [0u8; 28];
        in_context(source.read_x(&mut rest), "class def", i)?;
        class_defs.push(ClassDefItem { class_idx });
    }
    Ok(class_defs)
}

/// The index tables of one DEX image, fully loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DexFile {
    pub header: Header,
    pub strings: Vec<String>,
    pub types: Vec<TypeItem>,
    pub prototypes: Vec<PrototypeItem>,
    pub fields: Vec<FieldItem>,
    pub methods: Vec<MethodItem>,
    pub class_defs: Vec<ClassDefItem>,
}

impl DexFile {

    /// Loads every table from `source`, or fails as a unit.
    pub fn read<R: Read + Seek>(source: &mut R) -> Result<DexFile, DexError>
    {
        let mut source = DexSource::new(source);
        let header = Header::read(&mut source)?;

        let mut dex = DexFile {
            strings: load_strings(&mut source, &header)?,
            types: load_type_ids(&mut source, &header)?,
            prototypes: load_proto_ids(&mut source, &header)?,
            fields: load_field_ids(&mut source, &header)?,
            methods: load_method_ids(&mut source, &header)?,
            class_defs: load_class_defs(&mut source, &header)?,
            header,
        };
        dex.mark_internal_classes()?;
        Ok(dex)
    }

    /// Flags type ids defined in this file, then primitive and array types.
    fn mark_internal_classes(&mut self) -> Result<(), DexError>
    {
        let type_count = self.types.len();
        for class_def in &self.class_defs
        {
            match self.types.get_mut(class_def.class_idx as usize)
            {
                Some(t) => t.internal = true,
                None => fail!(IndexOutOfRange, "class def declares type #{} of {}", class_def.class_idx, type_count),
            }
        }

        for (i, type_id) in self.types.iter_mut().enumerate()
        {
            let descriptor = match self.strings.get(type_id.descriptor_idx as usize)
            {
                Some(s) => s,
                None => fail!(IndexOutOfRange, "type #{} names string #{} of {}", i, type_id.descriptor_idx, self.strings.len()),
            };
            if descriptor.len() == 1 || descriptor.starts_with('[')
            {
                type_id.internal = true;
            }
        }
        Ok(())
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<DexFile, DexError>
    {
        DexFile::read(&mut Cursor::new(bytes))
    }

    pub fn from_file(path: &Path) -> Result<DexFile, DexError>
    {
        let file = File::open(path).map_err(|e| err!(IoFailure, "cannot open {}: {}", path.display(), e))?;
        DexFile::read(&mut BufReader::new(file))
    }
}
