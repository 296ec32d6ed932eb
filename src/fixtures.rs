//! In-memory file builders shared by the unit tests

use byteorder::{BigEndian, LittleEndian, WriteBytesExt};

pub(crate) fn put_str(buf: &mut Vec<u8>, s: &str) {
    buf.write_i32::<LittleEndian>(s.len() as i32).unwrap();
    buf.extend_from_slice(s.as_bytes());
}

pub(crate) fn put_fixed(buf: &mut Vec<u8>, s: &str, width: usize) {
    let mut field = s.as_bytes().to_vec();
    field.resize(width, 0);
    buf.extend_from_slice(&field);
}

// ==================== CEL ====================

/// A CEL v4 file whose cell `i` has intensity `100 + i + 0.26` and stddev `i / 4`
pub(crate) struct CelV4 {
    pub cols: i32,
    pub rows: i32,
    pub num_cells: Option<i32>,
    pub version: i32,
    pub header: String,
    pub algorithm: String,
    pub params: String,
    pub masked: Vec<(u16, u16)>,
    pub outliers: Vec<(u16, u16)>,
    pub subgrids: i32,
}

impl CelV4 {
    pub fn new(cols: i32, rows: i32) -> Self {
        Self {
            cols,
            rows,
            num_cells: None,
            version: 4,
            header: format!(
                "Cols={cols}\nRows={rows}\nDatHeader=[0..46095]  Test3:CLS=1164 RWS=1164 XIN=3 YIN=3 VE=17 2.0 07/29/03 14:35:42  Test3.1sq  6\n"
            ),
            algorithm: "Percentile".to_string(),
            params: "Percentile:75;CellMargin:2;OutlierHigh:1.500;OutlierLow:1.004".to_string(),
            masked: Vec::new(),
            outliers: Vec::new(),
            subgrids: 0,
        }
    }

    pub fn intensity(i: usize) -> f32 {
        100.0 + i as f32 + 0.26
    }

    pub fn stddev(i: usize) -> f32 {
        i as f32 / 4.0
    }

    pub fn build(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.write_i32::<LittleEndian>(64).unwrap();
        buf.write_i32::<LittleEndian>(self.version).unwrap();
        buf.write_i32::<LittleEndian>(self.cols).unwrap();
        buf.write_i32::<LittleEndian>(self.rows).unwrap();
        buf.write_i32::<LittleEndian>(self.num_cells.unwrap_or(self.cols * self.rows))
            .unwrap();
        put_str(&mut buf, &self.header);
        put_str(&mut buf, &self.algorithm);
        put_str(&mut buf, &self.params);
        buf.write_i32::<LittleEndian>(2).unwrap();
        buf.write_u32::<LittleEndian>(self.outliers.len() as u32).unwrap();
        buf.write_u32::<LittleEndian>(self.masked.len() as u32).unwrap();
        buf.write_i32::<LittleEndian>(self.subgrids).unwrap();

        for i in 0..(self.cols * self.rows) as usize {
            buf.write_f32::<LittleEndian>(Self::intensity(i)).unwrap();
            buf.write_f32::<LittleEndian>(Self::stddev(i)).unwrap();
            buf.write_u16::<LittleEndian>(16).unwrap();
        }
        for &(x, y) in self.masked.iter().chain(self.outliers.iter()) {
            buf.write_u16::<LittleEndian>(x).unwrap();
            buf.write_u16::<LittleEndian>(y).unwrap();
        }
        for g in 0..self.subgrids {
            buf.write_i32::<LittleEndian>(g).unwrap();
            buf.write_i32::<LittleEndian>(g + 1).unwrap();
            for corner in 0..8 {
                buf.write_f32::<LittleEndian>(corner as f32 * 10.0).unwrap();
            }
            for bound in 0..4 {
                buf.write_i32::<LittleEndian>(bound).unwrap();
            }
        }
        buf
    }
}

/// A text CEL v3 file with the same cell values as [`CelV4`]
pub(crate) fn cel_v3(cols: u32, rows: u32, masked: &[(u32, u32)], outliers: &[(u32, u32)]) -> Vec<u8> {
    let mut text = String::new();
    text.push_str("[CEL]\r\nVersion=3\r\n\r\n[HEADER]\r\n");
    text.push_str(&format!("Cols={cols}\r\nRows={rows}\r\nTotalX={cols}\r\nTotalY={rows}\r\n"));
    text.push_str("Algorithm=Percentile\r\nAlgorithmParameters=Percentile:75;CellMargin:2\r\n");
    text.push_str("DatHeader=[0..46095]  Test3:CLS=1164 RWS=1164 XIN=3  Test3.1sq  6\r\n\r\n");
    text.push_str(&format!(
        "[INTENSITY]\r\nNumberCells={}\r\nCellHeader=X\tY\tMEAN\tSTDV\tNPIXELS\r\n",
        cols * rows
    ));
    for i in 0..(cols * rows) as usize {
        let x = i as u32 % cols;
        let y = i as u32 / cols;
        text.push_str(&format!(
            "{x:3}\t{y:3}\t{:.2}\t{:.2}\t 16\r\n",
            CelV4::intensity(i),
            CelV4::stddev(i)
        ));
    }
    for (name, list) in [("MASKS", masked), ("OUTLIERS", outliers)] {
        text.push_str(&format!(
            "\r\n[{name}]\r\nNumberCells={}\r\nCellHeader=X\tY\r\n",
            list.len()
        ));
        for (x, y) in list {
            text.push_str(&format!("{x}\t{y}\r\n"));
        }
    }
    text.push_str("\r\n[MODIFIED]\r\nNumberCells=0\r\nCellHeader=X\tY\tORIGMEAN\r\n");
    text.into_bytes()
}

// ==================== CDF ====================

pub(crate) struct XdaCell {
    pub atom: i32,
    pub x: u16,
    pub y: u16,
    pub index: i32,
    pub pbase: u8,
    pub tbase: u8,
}

pub(crate) struct XdaBlock {
    pub name: String,
    pub cells: Vec<XdaCell>,
}

pub(crate) struct XdaUnit {
    pub name: String,
    pub number: i32,
    pub unit_type: u16,
    pub direction: u8,
    pub blocks: Vec<XdaBlock>,
}

pub(crate) struct CdfXda {
    pub cols: u16,
    pub rows: u16,
    pub reference: String,
    pub qc_units: Vec<(u16, Vec<(u16, u16, u8, u8, u8)>)>,
    pub units: Vec<XdaUnit>,
}

impl CdfXda {
    /// Two expression units; the second is named `NONE` and takes its block name
    pub fn sample() -> Self {
        let cell = |atom: i32, x: u16, y: u16| XdaCell {
            atom,
            x,
            y,
            index: i32::from(x) * 10,
            pbase: b'A',
            tbase: b'T',
        };
        Self {
            cols: 8,
            rows: 8,
            reference: String::new(),
            qc_units: vec![(7, vec![(0, 0, 25, 1, 0), (1, 0, 25, 0, 1)])],
            units: vec![
                XdaUnit {
                    name: "AFFX-BioB-5_at".to_string(),
                    number: 1000,
                    unit_type: 3,
                    direction: 1,
                    blocks: vec![XdaBlock {
                        name: "AFFX-BioB-5_at".to_string(),
                        cells: vec![cell(0, 2, 3), cell(0, 2, 4), cell(1, 3, 3)],
                    }],
                },
                XdaUnit {
                    name: "NONE".to_string(),
                    number: 1001,
                    unit_type: 3,
                    direction: 1,
                    blocks: vec![XdaBlock {
                        name: "1000_at".to_string(),
                        cells: vec![cell(0, 5, 5), cell(0, 5, 6)],
                    }],
                },
            ],
        }
    }

    pub fn build(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.write_i32::<LittleEndian>(67).unwrap();
        buf.write_i32::<LittleEndian>(1).unwrap();
        buf.write_u16::<LittleEndian>(self.cols).unwrap();
        buf.write_u16::<LittleEndian>(self.rows).unwrap();
        buf.write_i32::<LittleEndian>(self.units.len() as i32).unwrap();
        buf.write_i32::<LittleEndian>(self.qc_units.len() as i32).unwrap();
        put_str(&mut buf, &self.reference);

        for unit in &self.units {
            put_fixed(&mut buf, &unit.name, 64);
        }
        for i in 0..self.qc_units.len() {
            buf.write_i32::<LittleEndian>(i as i32 * 100).unwrap();
        }
        for i in 0..self.units.len() {
            buf.write_i32::<LittleEndian>(i as i32 * 1000).unwrap();
        }

        for (qc_type, cells) in &self.qc_units {
            buf.write_u16::<LittleEndian>(*qc_type).unwrap();
            buf.write_i32::<LittleEndian>(cells.len() as i32).unwrap();
            for &(x, y, len, pm, bg) in cells {
                buf.write_u16::<LittleEndian>(x).unwrap();
                buf.write_u16::<LittleEndian>(y).unwrap();
                buf.extend_from_slice(&[len, pm, bg]);
            }
        }

        for unit in &self.units {
            let cells: usize = unit.blocks.iter().map(|b| b.cells.len()).sum();
            buf.write_u16::<LittleEndian>(unit.unit_type).unwrap();
            buf.write_u8(unit.direction).unwrap();
            buf.write_i32::<LittleEndian>(cells as i32).unwrap();
            buf.write_i32::<LittleEndian>(unit.blocks.len() as i32).unwrap();
            buf.write_i32::<LittleEndian>(cells as i32).unwrap();
            buf.write_i32::<LittleEndian>(unit.number).unwrap();
            buf.write_u8(1).unwrap();
            for block in &unit.blocks {
                buf.write_i32::<LittleEndian>(block.cells.len() as i32).unwrap();
                buf.write_i32::<LittleEndian>(block.cells.len() as i32).unwrap();
                buf.write_u8(1).unwrap();
                buf.write_u8(unit.direction).unwrap();
                buf.write_i32::<LittleEndian>(0).unwrap();
                buf.write_i32::<LittleEndian>(block.cells.len() as i32 - 1).unwrap();
                put_fixed(&mut buf, &block.name, 64);
                for cell in &block.cells {
                    buf.write_i32::<LittleEndian>(cell.atom).unwrap();
                    buf.write_u16::<LittleEndian>(cell.x).unwrap();
                    buf.write_u16::<LittleEndian>(cell.y).unwrap();
                    buf.write_i32::<LittleEndian>(cell.index).unwrap();
                    buf.extend_from_slice(&[cell.pbase, cell.tbase]);
                }
            }
        }
        buf
    }
}

/// The text rendition of [`CdfXda::sample`]
pub(crate) const CDF_TEXT: &str = "[CDF]
Version=GC3.0

[Chip]
Name=Test3
Rows=8
Cols=8
NumberOfUnits=2
MaxUnit=1001
NumQCUnits=1
ChipReference=

[QC1]
Type=7
NumberCells=2
CellHeader=X\tY\tPROBE\tPLEN\tATOM\tINDEX\tPMFLAG\tBGFLAG
Cell1=0\t0\tN\t25\t0\t0\t1\t0
Cell2=1\t0\tN\t25\t1\t1\t0\t1

[Unit1000]
Name=NONE
Direction=1
NumAtoms=3
NumCells=3
UnitNumber=1000
UnitType=3
NumberBlocks=1

[Unit1000_Block1]
Name=AFFX-BioB-5_at
BlockNumber=1
NumAtoms=2
NumCells=3
StartPosition=0
StopPosition=1
CellHeader=X\tY\tPROBE\tFEAT\tQUAL\tEXPOS\tPOS\tCBASE\tPBASE\tTBASE\tATOM\tINDEX\tCODONIND\tCODON\tREGIONTYPE\tREGION
Cell1=2\t3\tN\tcontrol\tAFFX-BioB-5_at\t0\t13\tA\tA\tT\t0\t26\t-1\t-1\t99\t
Cell2=2\t4\tN\tcontrol\tAFFX-BioB-5_at\t0\t13\tA\tA\tT\t0\t34\t-1\t-1\t99\t
Cell3=3\t3\tN\tcontrol\tAFFX-BioB-5_at\t1\t14\tA\tA\tT\t1\t27\t-1\t-1\t99\t

[Unit1001]
Name=1000_at
Direction=1
NumAtoms=1
NumCells=2
UnitNumber=1001
UnitType=3
NumberBlocks=1

[Unit1001_Block1]
Name=1000_at
BlockNumber=1
NumAtoms=1
NumCells=2
StartPosition=0
StopPosition=0
CellHeader=X\tY\tPROBE\tFEAT\tQUAL\tEXPOS\tPOS\tCBASE\tPBASE\tTBASE\tATOM\tINDEX\tCODONIND\tCODON\tREGIONTYPE\tREGION
Cell1=5\t5\tN\tcontrol\t1000_at\t0\t13\tC\tC\tG\t0\t45\t-1\t-1\t99\t
Cell2=5\t6\tN\tcontrol\t1000_at\t0\t13\tC\tC\tG\t0\t53\t-1\t-1\t99\t
";

// ==================== CHP ====================

/// An XDA CHP header; the caller appends the body after `analysis_type`
pub(crate) struct ChpXda {
    pub num_cells: i32,
    pub results_type: i32,
    pub params: Vec<(String, String)>,
    pub summary: Vec<(String, String)>,
    pub zones: i32,
    pub analysis_type: Option<u8>,
    pub record_size: i32,
}

impl ChpXda {
    pub fn new(results_type: i32, num_cells: i32, record_size: i32) -> Self {
        Self {
            num_cells,
            results_type,
            params: vec![("Alpha1".to_string(), "0.04".to_string())],
            summary: vec![
                ("RawQ".to_string(), "2.31".to_string()),
                ("Noise".to_string(), "X:1.2,Y:3.4".to_string()),
            ],
            zones: 2,
            analysis_type: if results_type == 0 { Some(0) } else { None },
            record_size,
        }
    }

    pub fn build(&self, body: &[u8]) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.write_i32::<LittleEndian>(65).unwrap();
        buf.write_i32::<LittleEndian>(1).unwrap();
        buf.write_u16::<LittleEndian>(8).unwrap();
        buf.write_u16::<LittleEndian>(8).unwrap();
        buf.write_i32::<LittleEndian>(self.num_cells).unwrap();
        buf.write_i32::<LittleEndian>(4).unwrap();
        buf.write_i32::<LittleEndian>(self.results_type).unwrap();
        put_str(&mut buf, "GeneChip.CallGEBaseCall.1");
        put_str(&mut buf, "Test3.CEL");
        put_str(&mut buf, "Test3");
        put_str(&mut buf, "ExpressionStat");
        put_str(&mut buf, "5.0");
        for block in [&self.params, &self.summary] {
            buf.write_i32::<LittleEndian>(block.len() as i32).unwrap();
            for (name, value) in block {
                put_str(&mut buf, name);
                put_str(&mut buf, value);
            }
        }
        buf.write_i32::<LittleEndian>(self.zones).unwrap();
        buf.write_f32::<LittleEndian>(100.0).unwrap();
        for z in 0..self.zones {
            buf.write_f32::<LittleEndian>(z as f32).unwrap();
            buf.write_f32::<LittleEndian>(z as f32 + 0.5).unwrap();
            buf.write_f32::<LittleEndian>(40.0).unwrap();
        }
        if let Some(analysis_type) = self.analysis_type {
            buf.write_u8(analysis_type).unwrap();
        }
        buf.write_i32::<LittleEndian>(self.record_size).unwrap();
        buf.extend_from_slice(body);
        buf
    }
}

pub(crate) fn expression_record(buf: &mut Vec<u8>, detection: u8, p: f32, signal: f32) {
    buf.write_u8(detection).unwrap();
    buf.write_f32::<LittleEndian>(p).unwrap();
    buf.write_f32::<LittleEndian>(signal).unwrap();
    buf.write_u16::<LittleEndian>(16).unwrap();
    buf.write_u16::<LittleEndian>(15).unwrap();
}

pub(crate) fn comparison_tail(buf: &mut Vec<u8>, change: u8, slr: f32) {
    buf.write_u8(change).unwrap();
    buf.write_f32::<LittleEndian>(0.002_5).unwrap();
    buf.write_f32::<LittleEndian>(slr).unwrap();
    buf.write_f32::<LittleEndian>(slr - 0.25).unwrap();
    buf.write_f32::<LittleEndian>(slr + 0.25).unwrap();
    buf.write_u16::<LittleEndian>(14).unwrap();
}

pub(crate) fn genotyping_record(buf: &mut Vec<u8>, call: u8, p: f32, extra: [f32; 4]) {
    buf.write_u8(call).unwrap();
    buf.write_f32::<LittleEndian>(p).unwrap();
    for v in extra {
        buf.write_f32::<LittleEndian>(v).unwrap();
    }
}

/// A legacy GDAC CHP file of `records` expression records
pub(crate) fn chp_gdac(version: i32, records: &[(u8, f32, f32)]) -> Vec<u8> {
    let mut buf = b"GeneChip Sequence File".to_vec();
    buf.write_i32::<LittleEndian>(version).unwrap();
    put_str(&mut buf, "ExpressionStat");
    put_str(&mut buf, "5.0");
    put_str(&mut buf, "Alpha1=0.04;Alpha2=0.06");
    put_str(&mut buf, "RawQ=2.31;Noise=X:1.2,Y:3.4");
    buf.write_u16::<LittleEndian>(8).unwrap();
    buf.write_u16::<LittleEndian>(8).unwrap();
    buf.write_i32::<LittleEndian>(records.len() as i32).unwrap();
    buf.write_i32::<LittleEndian>(20).unwrap();
    buf.write_i32::<LittleEndian>(0).unwrap();
    buf.write_i32::<LittleEndian>(0).unwrap();
    put_str(&mut buf, "Test3");
    put_str(&mut buf, "Test3.CEL");
    if version != 8 {
        put_str(&mut buf, "GeneChip.CallGEBaseCall.1");
    }
    for &(detection, p, signal) in records {
        expression_record(&mut buf, detection, p, signal);
        if version == 13 {
            comparison_tail(&mut buf, 1, 0.75);
        }
    }
    buf
}

// ==================== Generic ====================

pub(crate) fn put_be_str(buf: &mut Vec<u8>, s: &str) {
    buf.write_i32::<BigEndian>(s.len() as i32).unwrap();
    buf.extend_from_slice(s.as_bytes());
}

pub(crate) fn put_be_wstr(buf: &mut Vec<u8>, s: &str) {
    let units: Vec<u16> = s.encode_utf16().collect();
    buf.write_i32::<BigEndian>(units.len() as i32).unwrap();
    for u in units {
        buf.write_u16::<BigEndian>(u).unwrap();
    }
}

/// A parameter value encoded as `text/plain` (UTF-16BE)
pub(crate) fn text_param(name: &str, value: &str) -> (String, Vec<u8>, String) {
    let mut bytes = Vec::new();
    for u in value.encode_utf16() {
        bytes.write_u16::<BigEndian>(u).unwrap();
    }
    bytes.extend_from_slice(&[0, 0]);
    (name.to_string(), bytes, "text/plain".to_string())
}

pub(crate) fn int_param(name: &str, value: i32) -> (String, Vec<u8>, String) {
    let mut bytes = Vec::new();
    bytes.write_i32::<BigEndian>(value).unwrap();
    bytes.resize(16, 0);
    (name.to_string(), bytes, "text/x-calvin-integer-32".to_string())
}

pub(crate) fn float_param(name: &str, value: f32) -> (String, Vec<u8>, String) {
    let mut bytes = Vec::new();
    bytes.write_f32::<BigEndian>(value).unwrap();
    bytes.resize(16, 0);
    (name.to_string(), bytes, "text/x-calvin-float".to_string())
}

fn put_params(buf: &mut Vec<u8>, params: &[(String, Vec<u8>, String)]) {
    buf.write_i32::<BigEndian>(params.len() as i32).unwrap();
    for (name, value, mime) in params {
        put_be_wstr(buf, name);
        buf.write_i32::<BigEndian>(value.len() as i32).unwrap();
        buf.extend_from_slice(value);
        put_be_wstr(buf, mime);
    }
}

pub(crate) struct GenericHeader {
    pub data_type_id: String,
    pub params: Vec<(String, Vec<u8>, String)>,
    pub parents: Vec<GenericHeader>,
}

impl GenericHeader {
    fn write(&self, buf: &mut Vec<u8>) {
        put_be_str(buf, &self.data_type_id);
        put_be_str(buf, "0000065535-1165936224-0000032612-0000026484-0000024052");
        put_be_wstr(buf, "2006-12-12T15:43:44Z");
        put_be_wstr(buf, "en-US");
        put_params(buf, &self.params);
        buf.write_i32::<BigEndian>(self.parents.len() as i32).unwrap();
        for parent in &self.parents {
            parent.write(buf);
        }
    }
}

pub(crate) struct GenericSet {
    pub name: String,
    pub params: Vec<(String, Vec<u8>, String)>,
    /// `(name, type tag, width)`
    pub columns: Vec<(String, u8, i32)>,
    pub num_rows: u32,
    pub rows: Vec<u8>,
}

pub(crate) struct GenericFile {
    pub header: GenericHeader,
    pub groups: Vec<(String, Vec<GenericSet>)>,
}

impl GenericFile {
    /// The `(id:uint, call:byte, signal:float)` data set with rows `(1,0,5.5)` and `(2,2,1.1)`
    pub fn calls() -> Self {
        let mut rows = Vec::new();
        for (id, call, signal) in [(1u32, 0i8, 5.5f32), (2, 2, 1.1)] {
            rows.write_u32::<BigEndian>(id).unwrap();
            rows.write_i8(call).unwrap();
            rows.write_f32::<BigEndian>(signal).unwrap();
        }
        Self {
            header: GenericHeader {
                data_type_id: "affymetrix-expression-probeset-analysis".to_string(),
                params: vec![text_param("affymetrix-algorithm-name", "MAS5")],
                parents: vec![GenericHeader {
                    data_type_id: "affymetrix-calvin-intensity".to_string(),
                    params: vec![
                        text_param("affymetrix-array-type", "HG-U133A"),
                        int_param("affymetrix-cel-rows", 712),
                        int_param("affymetrix-cel-cols", 712),
                    ],
                    parents: Vec::new(),
                }],
            },
            groups: vec![(
                "Calls".to_string(),
                vec![GenericSet {
                    name: "Calls".to_string(),
                    params: vec![float_param("scale", 1.5)],
                    columns: vec![
                        ("id".to_string(), 5, 4),
                        ("call".to_string(), 0, 1),
                        ("signal".to_string(), 6, 4),
                    ],
                    num_rows: 2,
                    rows,
                }],
            )],
        }
    }

    pub fn build(&self) -> Vec<u8> {
        let mut header = Vec::new();
        self.header.write(&mut header);

        let mut buf = Vec::new();
        buf.write_u8(59).unwrap();
        buf.write_u8(1).unwrap();
        buf.write_i32::<BigEndian>(self.groups.len() as i32).unwrap();
        let first_group_pos = 10 + header.len() as u32;
        buf.write_u32::<BigEndian>(first_group_pos).unwrap();
        buf.extend_from_slice(&header);

        for (g, (group_name, sets)) in self.groups.iter().enumerate() {
            let group_pos = buf.len();
            let mut group = Vec::new();
            group.write_u32::<BigEndian>(0).unwrap();
            group.write_u32::<BigEndian>(0).unwrap();
            group.write_i32::<BigEndian>(sets.len() as i32).unwrap();
            put_be_wstr(&mut group, group_name);
            let first_set_pos = (group_pos + group.len()) as u32;
            group[4..8].copy_from_slice(&first_set_pos.to_be_bytes());
            buf.extend_from_slice(&group);

            for set in sets {
                let set_pos = buf.len();
                let mut head = Vec::new();
                head.write_u32::<BigEndian>(0).unwrap();
                head.write_u32::<BigEndian>(0).unwrap();
                put_be_wstr(&mut head, &set.name);
                put_params(&mut head, &set.params);
                head.write_u32::<BigEndian>(set.columns.len() as u32).unwrap();
                for (name, tag, width) in &set.columns {
                    put_be_wstr(&mut head, name);
                    head.write_u8(*tag).unwrap();
                    head.write_i32::<BigEndian>(*width).unwrap();
                }
                head.write_u32::<BigEndian>(set.num_rows).unwrap();
                let first_element = (set_pos + head.len()) as u32;
                let next_set = first_element + set.rows.len() as u32;
                head[0..4].copy_from_slice(&first_element.to_be_bytes());
                head[4..8].copy_from_slice(&next_set.to_be_bytes());
                buf.extend_from_slice(&head);
                buf.extend_from_slice(&set.rows);
            }

            if g + 1 < self.groups.len() {
                let next = buf.len() as u32;
                buf[group_pos..group_pos + 4].copy_from_slice(&next.to_be_bytes());
            }
        }
        buf
    }
}
