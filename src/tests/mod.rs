mod malformed;

use crate::dex::dex_file::{DEX_FILE_MAGIC_035, ENDIAN_CONSTANT};
use crate::dex::leb::encode_uleb128;

const HEADER_SIZE: usize = 0x70;
const NO_INDEX: u32 = 0xffffffff;

/// Writes u2/u4 values in the byte order of the image being built.
struct ImageWriter {
    buf: Vec<u8>,
    big_endian: bool,
}

impl ImageWriter {
    fn new(big_endian: bool) -> Self {
        ImageWriter { buf: vec![], big_endian }
    }

    fn u2(&mut self, v: u16) {
        let b = if self.big_endian { v.to_be_bytes() } else { v.to_le_bytes() };
        self.buf.extend_from_slice(&b);
    }

    fn u4(&mut self, v: u32) {
        let b = if self.big_endian { v.to_be_bytes() } else { v.to_le_bytes() };
        self.buf.extend_from_slice(&b);
    }

    fn usize4(&mut self, v: usize) {
        self.u4(v as u32);
    }

    fn align4(&mut self) {
        while self.buf.len() % 4 != 0 {
            self.buf.push(0);
        }
    }
}

/// A minimal DEX image described by its index tables.
///
/// Only the parts the reader looks at are emitted: header, id tables, class
/// defs, string data and parameter type lists.
pub(crate) struct DexImage {
    pub magic: [u8; 8],
    pub big_endian: bool,
    pub strings: Vec<String>,
    /// descriptor string index per type id
    pub types: Vec<u32>,
    /// (shorty, return type, parameter types)
    pub protos: Vec<(u32, u32, Vec<u16>)>,
    /// (class, type, name)
    pub fields: Vec<(u16, u16, u32)>,
    /// (class, proto, name)
    pub methods: Vec<(u16, u16, u32)>,
    /// declared type id per class def
    pub class_defs: Vec<u32>,
}

impl DexImage {
    /// Two app classes calling into java.lang, android.util and an int array.
    pub fn sample() -> DexImage {
        let strings = [
            "<init>",                       // 0
            "I",                            // 1
            "Lcom/example/app/Main;",       // 2
            "Lcom/example/app/Main$Inner;", // 3
            "Ljava/lang/Object;",           // 4
            "Ljava/lang/String;",           // 5
            "V",                            // 6
            "[I",                           // 7
            "count",                        // 8
            "toString",                     // 9
            "valueOf",                      // 10
            "Landroid/util/Log;",           // 11
            "d",                            // 12
            "clone",                        // 13
            "TAG",                          // 14
            "L",                            // 15
            "LI",                           // 16
            "ILL",                          // 17
        ];

        DexImage {
            magic: DEX_FILE_MAGIC_035,
            big_endian: false,
            strings: strings.iter().map(|s| s.to_string()).collect(),
            // I, Main, Main$Inner, Object, String, V, [I, Log
            types: vec![1, 2, 3, 4, 5, 6, 7, 11],
            protos: vec![
                (6, 5, vec![]),     // ()V
                (15, 4, vec![]),    // ()String
                (16, 4, vec![0]),   // (I)String
                (15, 3, vec![]),    // ()Object
                (17, 0, vec![4, 4]), // (String, String)I
            ],
            fields: vec![
                (1, 4, 14), // Main.TAG
                (2, 0, 8),  // Main$Inner.count
                (7, 4, 14), // Log.TAG
            ],
            methods: vec![
                (1, 0, 0),  // Main.<init>
                (2, 0, 0),  // Main$Inner.<init>
                (3, 0, 0),  // Object.<init>
                (4, 2, 10), // String.valueOf(I)
                (6, 3, 13), // int[].clone
                (7, 4, 12), // Log.d
                (1, 1, 9),  // Main.toString
            ],
            class_defs: vec![1, 2],
        }
    }

    pub fn build(&self) -> Vec<u8> {
        let string_ids_off = HEADER_SIZE;
        let type_ids_off = string_ids_off + 4 * self.strings.len();
        let proto_ids_off = type_ids_off + 4 * self.types.len();
        let field_ids_off = proto_ids_off + 12 * self.protos.len();
        let method_ids_off = field_ids_off + 8 * self.fields.len();
        let class_defs_off = method_ids_off + 8 * self.methods.len();
        let data_off = class_defs_off + 32 * self.class_defs.len();

        let mut data = ImageWriter::new(self.big_endian);
        let mut string_offsets = vec![];
        for s in &self.strings {
            string_offsets.push(data_off + data.buf.len());
            data.buf.extend(encode_uleb128(s.encode_utf16().count() as u32));
            data.buf.extend_from_slice(&cesu8::to_java_cesu8(s));
            data.buf.push(0);
        }
        data.align4();

        let mut parameter_offsets = vec![];
        for (_, _, params) in &self.protos {
            if params.is_empty() {
                parameter_offsets.push(0);
                continue;
            }
            parameter_offsets.push(data_off + data.buf.len());
            data.usize4(params.len());
            for p in params {
                data.u2(*p);
            }
            data.align4();
        }
        let data = data.buf;

        let mut w = ImageWriter::new(self.big_endian);
        w.buf.extend_from_slice(&self.magic);
        w.u4(0); // checksum
        w.buf.extend_from_slice(&[0u8; 20]); // signature
        w.usize4(data_off + data.len()); // file_size
        w.usize4(HEADER_SIZE);
        w.u4(ENDIAN_CONSTANT);
        w.u4(0); // link_size
        w.u4(0); // link_off
        w.u4(0); // map_off
        for (size, off) in [
            (self.strings.len(), string_ids_off),
            (self.types.len(), type_ids_off),
            (self.protos.len(), proto_ids_off),
            (self.fields.len(), field_ids_off),
            (self.methods.len(), method_ids_off),
            (self.class_defs.len(), class_defs_off),
            (data.len(), data_off),
        ] {
            w.usize4(size);
            w.usize4(off);
        }
        assert_eq!(w.buf.len(), HEADER_SIZE);

        for off in string_offsets {
            w.usize4(off);
        }
        for t in &self.types {
            w.u4(*t);
        }
        for ((shorty, ret, _), params_off) in self.protos.iter().zip(parameter_offsets) {
            w.u4(*shorty);
            w.u4(*ret);
            w.usize4(params_off);
        }
        for (class_idx, type_idx, name_idx) in &self.fields {
            w.u2(*class_idx);
            w.u2(*type_idx);
            w.u4(*name_idx);
        }
        for (class_idx, proto_idx, name_idx) in &self.methods {
            w.u2(*class_idx);
            w.u2(*proto_idx);
            w.u4(*name_idx);
        }
        for class_idx in &self.class_defs {
            w.u4(*class_idx);
            w.u4(0x1); // access_flags
            w.u4(NO_INDEX); // superclass_idx
            w.u4(0); // interfaces_off
            w.u4(NO_INDEX); // source_file_idx
            w.u4(0); // annotations_off
            w.u4(0); // class_data_off
            w.u4(0); // static_values_off
        }
        assert_eq!(w.buf.len(), data_off);

        w.buf.extend_from_slice(&data);
        w.buf
    }
}
